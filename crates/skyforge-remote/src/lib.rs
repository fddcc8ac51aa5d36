//! SSH remote execution channel for skyforge
//!
//! Opens password-authenticated SSH sessions to provisioned instances and
//! runs shell commands on them, returning captured stdout/stderr and the
//! remote exit status.
//!
//! Host keys are never trusted silently: every connection goes through a
//! [`HostKeyPolicy`], and an unknown or changed key is a first-class error.
//!
//! The [`RemoteShell`] and [`Connect`] traits are the seams higher layers
//! program against, so command sequences can be tested with scripted fakes.

pub mod error;
pub mod hostkey;
pub mod shell;
pub mod ssh;

pub use error::{RemoteError, Result};
pub use hostkey::{HostKeyPolicy, KnownHostsStore};
pub use shell::{Connect, ExecOutput, RemoteShell};
pub use ssh::{SshConnector, SshSession};
