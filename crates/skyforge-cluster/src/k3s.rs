//! k3s node bootstrap
//!
//! Primary install runs the vendor install script in cluster-init mode and
//! reads the join token off the primary's filesystem. Secondaries run the
//! same script in agent mode with the server address and token passed as
//! environment variables, exactly as the script expects.

use crate::error::{ClusterError, Result};
use skyforge_remote::RemoteShell;

pub const INSTALL_SCRIPT_URL: &str = "https://get.k3s.io";
pub const TOKEN_PATH: &str = "/var/lib/rancher/k3s/server/node-token";
pub const SERVER_PORT: u16 = 6443;

pub fn primary_install_command() -> String {
    format!("curl -sfL {INSTALL_SCRIPT_URL} | sh -s - server --cluster-init --write-kubeconfig-mode 644")
}

pub fn token_read_command() -> String {
    format!("sudo cat {TOKEN_PATH}")
}

/// The token is embedded verbatim; k3s accepts both the full node-token
/// format and the bare secret, so no validation happens here.
pub fn join_command(server_ip: &str, token: &str) -> String {
    format!(
        "curl -sfL {INSTALL_SCRIPT_URL} | K3S_URL=https://{server_ip}:{SERVER_PORT} K3S_TOKEN={token} sh -s -"
    )
}

/// Install a cluster-init server on the instance and return its join token.
pub async fn install_primary(shell: &dyn RemoteShell) -> Result<String> {
    tracing::info!("installing k3s server (cluster-init)");
    let install = shell.exec(&primary_install_command()).await?.check()?;
    if !install.stdout.is_empty() {
        tracing::info!(output = %install.stdout.trim(), "k3s install output");
    }

    let output = shell.exec(&token_read_command()).await?.check()?;
    let token = output.stdout.trim().to_string();
    if token.is_empty() {
        return Err(ClusterError::EmptyToken);
    }
    Ok(token)
}

/// Join the instance to the primary at `server_ip` as an agent.
pub async fn join_node(shell: &dyn RemoteShell, server_ip: &str, token: &str) -> Result<()> {
    tracing::info!(%server_ip, "joining k3s cluster");
    shell.exec(&join_command(server_ip, token)).await?.check()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeShell;
    use skyforge_remote::ExecOutput;

    #[tokio::test]
    async fn primary_install_returns_trimmed_token() {
        let shell = FakeShell::new();
        shell.push_stdout("[INFO]  systemd: Starting k3s\n");
        shell.push_stdout("K10abc::server:deadbeef\n");

        let token = install_primary(&shell).await.unwrap();
        assert_eq!(token, "K10abc::server:deadbeef");

        let commands = shell.commands();
        assert!(commands[0].contains("server --cluster-init"));
        assert_eq!(commands[1], "sudo cat /var/lib/rancher/k3s/server/node-token");
    }

    #[tokio::test]
    async fn primary_install_fails_when_token_read_reports_error() {
        let shell = FakeShell::new();
        shell.push_stdout("");
        shell.push(ExecOutput {
            stderr: "cat: /var/lib/rancher/k3s/server/node-token: No such file".to_string(),
            exit_status: Some(1),
            ..Default::default()
        });

        let err = install_primary(&shell).await.unwrap_err();
        assert!(matches!(err, ClusterError::Remote(_)));
    }

    #[tokio::test]
    async fn primary_install_rejects_empty_token() {
        let shell = FakeShell::new();
        shell.push_stdout("");
        shell.push_stdout("   \n");

        let err = install_primary(&shell).await.unwrap_err();
        assert!(matches!(err, ClusterError::EmptyToken));
    }

    #[tokio::test]
    async fn join_embeds_server_and_token_verbatim() {
        let shell = FakeShell::new();
        // Whatever string the primary returned must go through unmodified.
        let token = "K10abc::server:deadbeef==/odd";
        join_node(&shell, "20.198.96.12", token).await.unwrap();

        let command = &shell.commands()[0];
        assert!(command.contains("K3S_URL=https://20.198.96.12:6443"));
        assert!(command.contains(&format!("K3S_TOKEN={token}")));
    }

    #[tokio::test]
    async fn join_propagates_remote_failure() {
        let shell = FakeShell::new();
        shell.push(ExecOutput {
            stderr: "curl: (7) Failed to connect".to_string(),
            exit_status: Some(7),
            ..Default::default()
        });

        assert!(join_node(&shell, "20.198.96.12", "tok").await.is_err());
    }
}
