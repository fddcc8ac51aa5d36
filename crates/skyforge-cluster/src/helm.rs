//! Helm client installation and chart deployment
//!
//! Installs the helm client on a bootstrapped node, fetches the chart
//! source, and installs the database and monitoring charts. Caller
//! parameters are injected as `--set` override flags; everything else is
//! fixed.

use crate::error::Result;
use serde::Deserialize;
use skyforge_remote::RemoteShell;

pub const HELM_INSTALL_SCRIPT_URL: &str =
    "https://raw.githubusercontent.com/helm/helm/main/scripts/get-helm-3";

/// Kubeconfig written by the k3s server install (mode 644).
pub const KUBECONFIG_PATH: &str = "/etc/rancher/k3s/k3s.yaml";

pub const CHART_REPO_URL: &str = "https://github.com/bitnami/charts.git";
pub const CHART_CLONE_DIR: &str = "charts";
pub const POSTGRES_CHART_PATH: &str = "charts/bitnami/postgresql";
pub const POSTGRES_RELEASE: &str = "pg-cluster";

pub const MONITORING_NAMESPACE: &str = "monitoring";

/// Caller-supplied parameters for the database chart.
#[derive(Debug, Clone, Deserialize)]
pub struct PostgresOptions {
    pub user_name: String,
    pub db_name: String,
    pub db_password: String,
    pub storage_size: String,
    pub nodeport: String,
    #[serde(default = "default_replica_count")]
    pub replica_count: u32,
    #[serde(default)]
    pub autoscaling_enabled: bool,
    #[serde(default = "default_min_replicas")]
    pub min_replicas: u32,
    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,
    #[serde(default = "default_cpu_utilization")]
    pub cpu_utilization: u32,
}

fn default_replica_count() -> u32 {
    1
}
fn default_min_replicas() -> u32 {
    1
}
fn default_max_replicas() -> u32 {
    3
}
fn default_cpu_utilization() -> u32 {
    80
}

/// Prefix `command` so the package manager can reach the bootstrapped
/// runtime. Each exec is a fresh channel, so the variable is exported
/// inline rather than once per session.
fn with_kubeconfig(command: &str) -> String {
    format!("export KUBECONFIG={KUBECONFIG_PATH} && {command}")
}

pub fn install_helm_command() -> String {
    format!("curl -fsSL {HELM_INSTALL_SCRIPT_URL} | bash")
}

/// `-q` keeps git's progress chatter off stderr, which would otherwise
/// read as a failure.
pub fn clone_charts_command() -> String {
    format!("git clone -q {CHART_REPO_URL} {CHART_CLONE_DIR}")
}

pub fn postgres_install_command(options: &PostgresOptions) -> String {
    with_kubeconfig(&format!(
        "helm install {POSTGRES_RELEASE} {POSTGRES_CHART_PATH} \
         --set replicaCount={} \
         --set auth.username={} \
         --set auth.password={} \
         --set auth.database={} \
         --set persistence.size={} \
         --set service.type=NodePort \
         --set service.nodePorts.postgresql={} \
         --set autoscaling.enabled={} \
         --set autoscaling.minReplicas={} \
         --set autoscaling.maxReplicas={} \
         --set autoscaling.targetCPUUtilizationPercentage={}",
        options.replica_count,
        options.user_name,
        options.db_password,
        options.db_name,
        options.storage_size,
        options.nodeport,
        options.autoscaling_enabled,
        options.min_replicas,
        options.max_replicas,
        options.cpu_utilization,
    ))
}

/// The fixed monitoring sequence: two chart repositories, two installs into
/// a dedicated namespace, and a patch exposing grafana on a NodePort.
pub fn monitoring_commands() -> Vec<String> {
    vec![
        with_kubeconfig(
            "helm repo add prometheus-community https://prometheus-community.github.io/helm-charts",
        ),
        with_kubeconfig("helm repo add grafana https://grafana.github.io/helm-charts"),
        with_kubeconfig("helm repo update"),
        with_kubeconfig(&format!(
            "helm install prometheus prometheus-community/prometheus --namespace {MONITORING_NAMESPACE} --create-namespace"
        )),
        with_kubeconfig(&format!(
            "helm install grafana grafana/grafana --namespace {MONITORING_NAMESPACE}"
        )),
        with_kubeconfig(&format!(
            r#"kubectl patch svc grafana --namespace {MONITORING_NAMESPACE} -p '{{"spec": {{"type": "NodePort"}}}}'"#
        )),
    ]
}

/// Install the helm client on the node.
pub async fn install_helm(shell: &dyn RemoteShell) -> Result<()> {
    tracing::info!("installing helm client");
    shell.exec(&install_helm_command()).await?.check()?;
    Ok(())
}

/// Fetch the chart source onto the node.
pub async fn clone_charts(shell: &dyn RemoteShell) -> Result<()> {
    tracing::info!("cloning chart repository");
    shell.exec(&clone_charts_command()).await?.check()?;
    Ok(())
}

/// Install the database chart with the caller's overrides.
pub async fn deploy_postgres(shell: &dyn RemoteShell, options: &PostgresOptions) -> Result<()> {
    tracing::info!(db = %options.db_name, replicas = options.replica_count, "deploying postgres chart");
    shell
        .exec(&postgres_install_command(options))
        .await?
        .check()?;
    Ok(())
}

/// Install the monitoring stack, returning the combined remote output.
pub async fn install_monitoring(shell: &dyn RemoteShell) -> Result<String> {
    tracing::info!("installing monitoring stack");
    let mut captured = String::new();
    for command in monitoring_commands() {
        let output = shell.exec(&command).await?.check()?;
        if !output.stdout.is_empty() {
            captured.push_str(&output.stdout);
            if !output.stdout.ends_with('\n') {
                captured.push('\n');
            }
        }
    }
    Ok(captured)
}
