use clap::Parser;
use skyforge_cloud::{AzCli, CloudApi};
use skyforge_remote::{Connect, HostKeyPolicy, SshConnector};
use skyforged::{AppState, api};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skyforged")]
#[command(about = "K3s cluster setup daemon", long_about = None)]
struct Args {
    /// Listen address
    #[arg(long, env = "SKYFORGE_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Known-hosts store used for SSH host key pinning
    #[arg(long, env = "SKYFORGE_KNOWN_HOSTS", default_value = "skyforge_known_hosts")]
    known_hosts: PathBuf,

    /// Record host keys on first contact instead of rejecting unknown hosts
    #[arg(long)]
    trust_on_first_use: bool,

    /// Disable host key verification entirely (throwaway environments only)
    #[arg(long)]
    insecure_accept_any_host_key: bool,

    /// SSH connect timeout in seconds
    #[arg(long, env = "SKYFORGE_SSH_CONNECT_TIMEOUT", default_value = "30")]
    ssh_connect_timeout: u64,

    /// Upper bound for a single remote command in seconds (0 = unbounded)
    #[arg(long, env = "SKYFORGE_SSH_COMMAND_TIMEOUT", default_value = "900")]
    ssh_command_timeout: u64,

    /// Azure subscription to scope all az commands to
    #[arg(long, env = "SKYFORGE_SUBSCRIPTION")]
    subscription: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let az = match args.subscription {
        Some(subscription) => AzCli::with_subscription(subscription),
        None => AzCli::new(),
    };
    if let Err(err) = az.check_auth().await {
        tracing::warn!(error = %err, "az CLI preflight failed; provisioning calls will error");
    }
    let cloud: Arc<dyn CloudApi> = Arc::new(az);

    let policy = if args.insecure_accept_any_host_key {
        HostKeyPolicy::InsecureAcceptAny
    } else if args.trust_on_first_use {
        HostKeyPolicy::TrustOnFirstUse(args.known_hosts)
    } else {
        HostKeyPolicy::KnownHosts(args.known_hosts)
    };

    let command_timeout =
        (args.ssh_command_timeout > 0).then(|| Duration::from_secs(args.ssh_command_timeout));
    let connector: Arc<dyn Connect> = Arc::new(
        SshConnector::new(policy)
            .connect_timeout(Duration::from_secs(args.ssh_connect_timeout))
            .command_timeout(command_timeout),
    );

    let app = api::router(AppState::new(cloud, connector));

    tracing::info!(listen = %args.listen, "skyforged listening");
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
