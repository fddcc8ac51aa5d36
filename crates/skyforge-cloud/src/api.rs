//! Cloud management API abstraction
//!
//! The primitive create-or-update operations the provisioner drives. `AzCli`
//! implements this against Azure; tests substitute a fake.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One inbound firewall rule on the shared security group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRule {
    pub name: String,
    pub port: u16,
    pub priority: u16,
}

impl SecurityRule {
    pub fn new(name: impl Into<String>, port: u16, priority: u16) -> Self {
        Self {
            name: name.into(),
            port,
            priority,
        }
    }
}

/// Address ranges for the shared virtual network.
///
/// The defaults match the original deployment layout. Overriding them lets
/// two deployments share a region without colliding.
#[derive(Debug, Clone)]
pub struct NetworkLayout {
    pub network_prefix: String,
    pub subnet_prefix: String,
}

impl Default for NetworkLayout {
    fn default() -> Self {
        Self {
            network_prefix: "10.0.0.0/16".to_string(),
            subnet_prefix: "10.0.0.0/24".to_string(),
        }
    }
}

/// Parameters for a single compute instance.
#[derive(Debug, Clone)]
pub struct InstanceSpec {
    pub name: String,
    pub size: String,
    pub image: String,
    pub admin_username: String,
    pub admin_password: String,
    pub interface: String,
}

/// Cloud management API operations
///
/// All operations have create-or-update semantics and block until the cloud
/// side reports completion, matching the synchronous-wait variants of the
/// underlying management API.
#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn create_resource_group(&self, name: &str, location: &str) -> Result<()>;

    async fn create_security_group(
        &self,
        group: &str,
        name: &str,
        location: &str,
        rules: &[SecurityRule],
    ) -> Result<()>;

    async fn create_virtual_network(
        &self,
        group: &str,
        name: &str,
        location: &str,
        address_prefix: &str,
    ) -> Result<()>;

    async fn create_subnet(
        &self,
        group: &str,
        network: &str,
        name: &str,
        address_prefix: &str,
    ) -> Result<()>;

    async fn create_public_address(&self, group: &str, name: &str, location: &str) -> Result<()>;

    async fn create_interface(
        &self,
        group: &str,
        name: &str,
        network: &str,
        subnet: &str,
        security_group: &str,
        public_address: &str,
    ) -> Result<()>;

    async fn create_instance(&self, group: &str, spec: &InstanceSpec) -> Result<()>;

    /// Read back the IP assigned to a public address.
    async fn get_public_address(&self, group: &str, name: &str) -> Result<String>;

    /// Add an A record to a DNS zone. Returns the fully-qualified name.
    async fn create_dns_record(
        &self,
        group: &str,
        zone: &str,
        record: &str,
        address: &str,
    ) -> Result<String>;
}
