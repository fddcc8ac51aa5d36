//! HTTP routes and handlers
//!
//! Route paths are the published interface of the original service and are
//! kept verbatim, trailing slashes and casing included.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use skyforge_cloud::{InstanceRecord, ProvisionRequest, Provisioner};
use skyforge_cluster::{PostgresOptions, helm, k3s};
use skyforge_remote::RemoteShell;
use std::future::Future;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/create-vms", post(create_vms))
        .route("/setup-k3s-primary", post(setup_k3s_primary))
        .route("/join-k3s-node", post(join_k3s_node))
        .route("/install-helm", post(install_helm))
        .route("/Clone-helm-chart/", post(clone_helm_chart))
        .route("/deploy-postgres/", post(deploy_postgres))
        .route("/install-monitoring/", post(install_monitoring))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "K3s Cluster Setup API" }))
}

#[derive(Debug, Deserialize)]
pub struct CreateVmsRequest {
    pub vm_count: u32,
    pub resource_group: String,
    pub location: String,
    pub vm_size: String,
    pub username: String,
    pub password: String,
    pub dns_zone_name: Option<String>,
    #[serde(default)]
    pub expose_db_nodeport: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateVmsResponse {
    pub status: String,
    pub instances: Vec<InstanceRecord>,
}

pub async fn create_vms(
    State(state): State<AppState>,
    Json(request): Json<CreateVmsRequest>,
) -> Result<Json<CreateVmsResponse>, ApiError> {
    let provisioner = Provisioner::new(state.cloud.clone());
    let instances = provisioner
        .provision(&ProvisionRequest {
            vm_count: request.vm_count,
            resource_group: request.resource_group,
            location: request.location,
            vm_size: request.vm_size,
            username: request.username,
            password: request.password,
            dns_zone: request.dns_zone_name,
            expose_db_nodeport: request.expose_db_nodeport,
        })
        .await?;

    Ok(Json(CreateVmsResponse {
        status: format!("{} VMs created successfully", instances.len()),
        instances,
    }))
}

/// Target of a remote operation.
#[derive(Debug, Deserialize)]
pub struct NodeTarget {
    pub ip_address: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub status: String,
    pub token: String,
}

/// Run `operation` on a fresh session against `host`, closing the session
/// either way. Sessions never outlive one request.
async fn with_session<T, F, Fut>(
    state: &AppState,
    host: &str,
    username: &str,
    password: &str,
    operation: F,
) -> Result<T, ApiError>
where
    F: FnOnce(Box<dyn RemoteShell>) -> Fut,
    Fut: Future<Output = (Box<dyn RemoteShell>, Result<T, ApiError>)>,
{
    let shell = state.connector.connect(host, username, password).await?;
    let (shell, result) = operation(shell).await;
    if let Err(err) = shell.close().await {
        tracing::debug!(%host, error = %err, "session close failed");
    }
    result
}

pub async fn setup_k3s_primary(
    State(state): State<AppState>,
    Json(target): Json<NodeTarget>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = with_session(
        &state,
        &target.ip_address,
        &target.username,
        &target.password,
        move |shell| async move {
            let result = k3s::install_primary(shell.as_ref()).await;
            (shell, result.map_err(ApiError::from))
        },
    )
    .await?;

    Ok(Json(TokenResponse {
        status: "K3s installed on primary node".to_string(),
        token,
    }))
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub ip_address: String,
    pub username: String,
    pub password: String,
    pub token: String,
    pub server_ip: String,
}

pub async fn join_k3s_node(
    State(state): State<AppState>,
    Json(request): Json<JoinRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let JoinRequest {
        ip_address,
        username,
        password,
        token,
        server_ip,
    } = request;

    with_session(&state, &ip_address, &username, &password, move |shell| {
        async move {
            let result = k3s::join_node(shell.as_ref(), &server_ip, &token).await;
            (shell, result.map_err(ApiError::from))
        }
    })
    .await?;

    Ok(Json(StatusResponse {
        status: "Node joined to K3s cluster".to_string(),
    }))
}

pub async fn install_helm(
    State(state): State<AppState>,
    Json(target): Json<NodeTarget>,
) -> Result<Json<StatusResponse>, ApiError> {
    with_session(
        &state,
        &target.ip_address,
        &target.username,
        &target.password,
        move |shell| async move {
            let result = helm::install_helm(shell.as_ref()).await;
            (shell, result.map_err(ApiError::from))
        },
    )
    .await?;

    Ok(Json(StatusResponse {
        status: "Helm installed on node".to_string(),
    }))
}

pub async fn clone_helm_chart(
    State(state): State<AppState>,
    Json(target): Json<NodeTarget>,
) -> Result<Json<StatusResponse>, ApiError> {
    with_session(
        &state,
        &target.ip_address,
        &target.username,
        &target.password,
        move |shell| async move {
            let result = helm::clone_charts(shell.as_ref()).await;
            (shell, result.map_err(ApiError::from))
        },
    )
    .await?;

    Ok(Json(StatusResponse {
        status: "Chart repository cloned".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeployPostgresRequest {
    pub ip_address: String,
    pub username: String,
    pub password: String,
    #[serde(flatten)]
    pub options: PostgresOptions,
}

pub async fn deploy_postgres(
    State(state): State<AppState>,
    Json(request): Json<DeployPostgresRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let DeployPostgresRequest {
        ip_address,
        username,
        password,
        options,
    } = request;

    with_session(&state, &ip_address, &username, &password, move |shell| {
        async move {
            let result = helm::deploy_postgres(shell.as_ref(), &options).await;
            (shell, result.map_err(ApiError::from))
        }
    })
    .await?;

    Ok(Json(StatusResponse {
        status: "PostgreSQL chart deployed".to_string(),
    }))
}

/// This endpoint's request shape predates the others; it takes `ip`.
#[derive(Debug, Deserialize)]
pub struct MonitoringRequest {
    pub ip: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MonitoringResponse {
    pub status: String,
    pub output: String,
}

pub async fn install_monitoring(
    State(state): State<AppState>,
    Json(request): Json<MonitoringRequest>,
) -> Result<Json<MonitoringResponse>, ApiError> {
    let output = with_session(
        &state,
        &request.ip,
        &request.username,
        &request.password,
        move |shell| async move {
            let result = helm::install_monitoring(shell.as_ref()).await;
            (shell, result.map_err(ApiError::from))
        },
    )
    .await?;

    Ok(Json(MonitoringResponse {
        status: "Monitoring stack installed".to_string(),
        output,
    }))
}
