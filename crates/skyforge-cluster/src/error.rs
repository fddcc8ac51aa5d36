//! Cluster layer error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error(transparent)]
    Remote(#[from] skyforge_remote::RemoteError),

    #[error("Primary node returned an empty join token")]
    EmptyToken,
}

pub type Result<T> = std::result::Result<T, ClusterError>;
