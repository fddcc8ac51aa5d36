//! Cloud layer error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("az CLI not found. Please install: https://aka.ms/azure-cli")]
    AzNotFound,

    #[error("az command failed: {0}")]
    CommandFailed(String),

    #[error("Resource already exists with conflicting parameters: {0}")]
    AlreadyExists(String),

    #[error("Public address {0} has no IP assigned")]
    AddressUnassigned(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
