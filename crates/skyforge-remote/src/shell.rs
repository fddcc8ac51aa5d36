//! Remote shell abstraction
//!
//! Higher layers issue commands through [`RemoteShell`] and obtain sessions
//! through [`Connect`], so cluster bootstrap logic never depends on a live
//! transport.

use crate::error::{RemoteError, Result};
use async_trait::async_trait;

/// Captured result of one remote command.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// Exit status as reported by the remote side, if it reported one.
    pub exit_status: Option<u32>,
}

impl ExecOutput {
    /// Treat a non-zero exit status or any error-stream text as failure.
    ///
    /// The remote side not reporting an exit status at all is tolerated as
    /// long as stderr stayed empty.
    pub fn check(self) -> Result<Self> {
        let failed_exit = self.exit_status.is_some_and(|code| code != 0);
        if failed_exit || !self.stderr.trim().is_empty() {
            return Err(RemoteError::RemoteCommand {
                command: self.command,
                exit_status: self.exit_status,
                stderr: self.stderr.trim().to_string(),
            });
        }
        Ok(self)
    }
}

/// An open remote session commands can be issued on.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    async fn exec(&self, command: &str) -> Result<ExecOutput>;

    /// Close the session. Sessions are scoped to one operation; callers
    /// close them once the command sequence is done.
    async fn close(&self) -> Result<()>;
}

/// Session factory held by the request surface.
#[async_trait]
pub trait Connect: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn RemoteShell>>;
}
