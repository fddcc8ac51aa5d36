//! HTTP error mapping
//!
//! Every component failure maps to a 500 response whose body keeps the
//! typed error kind, so callers can tell a transport failure from a failed
//! remote install. A partial provisioning failure additionally reports the
//! instances that did come up.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use skyforge_cloud::{InstanceRecord, ProvisionError};
use skyforge_cluster::ClusterError;
use skyforge_remote::RemoteError;

#[derive(Debug)]
pub struct ApiError {
    kind: &'static str,
    message: String,
    created: Option<Vec<InstanceRecord>>,
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Response body as JSON.
    pub fn body(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "kind": self.kind,
            "error": self.message,
        });
        if let Some(ref created) = self.created {
            body["created"] = serde_json::json!(created);
        }
        body
    }
}

impl From<ProvisionError> for ApiError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::Partial {
                created,
                failed,
                source,
            } => Self {
                kind: "provisioning_partial",
                message: format!("provisioning aborted at {failed}: {source}"),
                created: Some(created),
            },
            ProvisionError::Cloud(source) => Self {
                kind: "provisioning",
                message: source.to_string(),
                created: None,
            },
        }
    }
}

impl From<RemoteError> for ApiError {
    fn from(err: RemoteError) -> Self {
        let kind = match err {
            RemoteError::Transport(_) | RemoteError::Io(_) | RemoteError::Timeout(_) => {
                "transport"
            }
            RemoteError::AuthenticationFailed(_) => "authentication",
            RemoteError::UnknownHostKey { .. } | RemoteError::HostKeyMismatch { .. } => "host_key",
            RemoteError::RemoteCommand { .. } => "remote_command",
        };
        Self {
            kind,
            message: err.to_string(),
            created: None,
        }
    }
}

impl From<ClusterError> for ApiError {
    fn from(err: ClusterError) -> Self {
        match err {
            ClusterError::Remote(remote) => remote.into(),
            ClusterError::EmptyToken => Self {
                kind: "bootstrap",
                message: err.to_string(),
                created: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(kind = self.kind, error = %self.message, "operation failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyforge_cloud::CloudError;

    #[test]
    fn partial_provisioning_reports_created_instances() {
        let err: ApiError = ProvisionError::Partial {
            created: vec![InstanceRecord {
                name: "instance-1".to_string(),
                public_ip: "198.51.100.1".to_string(),
                dns_name: None,
            }],
            failed: "instance-2".to_string(),
            source: CloudError::CommandFailed("quota exceeded".to_string()),
        }
        .into();

        assert_eq!(err.kind(), "provisioning_partial");
        let body = err.body();
        assert_eq!(body["created"][0]["instance_name"], "instance-1");
        assert_eq!(body["created"][0]["public_ip"], "198.51.100.1");
    }

    #[test]
    fn error_kinds_stay_distinguishable() {
        let transport: ApiError = RemoteError::Timeout("connecting".to_string()).into();
        assert_eq!(transport.kind(), "transport");

        let host_key: ApiError = RemoteError::UnknownHostKey {
            host: "h".to_string(),
            fingerprint: "fp".to_string(),
        }
        .into();
        assert_eq!(host_key.kind(), "host_key");

        let remote: ApiError = RemoteError::RemoteCommand {
            command: "helm install".to_string(),
            exit_status: Some(1),
            stderr: "boom".to_string(),
        }
        .into();
        assert_eq!(remote.kind(), "remote_command");
    }
}
