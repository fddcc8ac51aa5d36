//! Azure provisioning layer for skyforge
//!
//! This crate creates the cloud resources a k3s cluster runs on: a resource
//! group, a network security group with the cluster's inbound rules, a
//! virtual network and subnet, and per instance a public address, a network
//! interface, the compute instance itself and (optionally) a DNS record.
//!
//! Cloud access goes through the `az` CLI via the [`CloudApi`] trait, so the
//! provisioning sequence can be exercised against a fake in tests.
//!
//! # Requirements
//!
//! - `az` CLI must be installed and logged in (`az login`)
//!
//! # Example
//!
//! ```ignore
//! use skyforge_cloud::{AzCli, Provisioner, ProvisionRequest};
//! use std::sync::Arc;
//!
//! let provisioner = Provisioner::new(Arc::new(AzCli::new()));
//! let instances = provisioner.provision(&request).await?;
//! ```

pub mod api;
pub mod az;
pub mod error;
pub mod provisioner;

pub use api::{CloudApi, InstanceSpec, NetworkLayout, SecurityRule};
pub use az::AzCli;
pub use error::{CloudError, Result};
pub use provisioner::{InstanceRecord, ProvisionError, ProvisionRequest, Provisioner};
