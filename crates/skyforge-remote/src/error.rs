//! Remote channel error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("SSH transport error: {0}")]
    Transport(#[from] russh::Error),

    #[error("Authentication failed for {0}")]
    AuthenticationFailed(String),

    #[error("Unknown host key for {host} (fingerprint {fingerprint})")]
    UnknownHostKey { host: String, fingerprint: String },

    #[error("Host key mismatch for {host}: known {known}, presented {presented}")]
    HostKeyMismatch {
        host: String,
        known: String,
        presented: String,
    },

    #[error("Remote command failed (exit {exit_status:?}): {command}: {stderr}")]
    RemoteCommand {
        command: String,
        exit_status: Option<u32>,
        stderr: String,
    },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RemoteError>;
