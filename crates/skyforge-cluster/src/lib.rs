//! k3s bootstrap and chart installation for skyforge
//!
//! Turns a bare provisioned instance into a cluster node and installs the
//! application charts on it, over the [`skyforge_remote::RemoteShell`]
//! channel. Every remote command's result is checked; a failed install can
//! never report success.

pub mod error;
pub mod helm;
pub mod k3s;

pub use error::{ClusterError, Result};
pub use helm::PostgresOptions;
