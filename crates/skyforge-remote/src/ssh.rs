//! russh-backed session implementation

use crate::error::{RemoteError, Result};
use crate::hostkey::HostKeyPolicy;
use crate::shell::{Connect, ExecOutput, RemoteShell};
use async_trait::async_trait;
use russh::client;
use russh::{ChannelMsg, Disconnect};
use russh_keys::key;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const SSH_PORT: u16 = 22;

/// Opens password-authenticated SSH sessions.
pub struct SshConnector {
    policy: HostKeyPolicy,
    connect_timeout: Duration,
    command_timeout: Option<Duration>,
    inactivity_timeout: Option<Duration>,
}

impl SshConnector {
    pub fn new(policy: HostKeyPolicy) -> Self {
        Self {
            policy,
            connect_timeout: Duration::from_secs(30),
            command_timeout: None,
            inactivity_timeout: Some(Duration::from_secs(600)),
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Upper bound for a single remote command. k3s and chart installs can
    /// legitimately run for minutes; unset means no bound.
    pub fn command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }
}

#[async_trait]
impl Connect for SshConnector {
    async fn connect(
        &self,
        host: &str,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn RemoteShell>> {
        let config = Arc::new(client::Config {
            inactivity_timeout: self.inactivity_timeout,
            ..Default::default()
        });

        let handler = HostKeyHandler {
            host: host.to_string(),
            policy: self.policy.clone(),
        };

        tracing::debug!(%host, %username, "opening SSH session");

        let mut handle = tokio::time::timeout(
            self.connect_timeout,
            client::connect(config, (host, SSH_PORT), handler),
        )
        .await
        .map_err(|_| RemoteError::Timeout(format!("connecting to {host}")))??;

        let authenticated = handle.authenticate_password(username, password).await?;
        if !authenticated {
            return Err(RemoteError::AuthenticationFailed(format!(
                "{username}@{host}"
            )));
        }

        Ok(Box::new(SshSession {
            host: host.to_string(),
            handle: Mutex::new(handle),
            command_timeout: self.command_timeout,
        }))
    }
}

/// One authenticated session. Scoped to a single operation; the daemon
/// opens and closes a fresh session per request.
pub struct SshSession {
    host: String,
    handle: Mutex<client::Handle<HostKeyHandler>>,
    command_timeout: Option<Duration>,
}

impl SshSession {
    async fn run(
        handle: &mut client::Handle<HostKeyHandler>,
        command: &str,
    ) -> Result<ExecOutput> {
        let mut channel = handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
                _ => {}
            }
        }

        Ok(ExecOutput {
            command: command.to_string(),
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            exit_status,
        })
    }
}

#[async_trait]
impl RemoteShell for SshSession {
    async fn exec(&self, command: &str) -> Result<ExecOutput> {
        tracing::debug!(host = %self.host, %command, "executing remote command");

        let mut handle = self.handle.lock().await;
        let output = match self.command_timeout {
            Some(limit) => tokio::time::timeout(limit, Self::run(&mut handle, command))
                .await
                .map_err(|_| {
                    RemoteError::Timeout(format!("command on {}: {command}", self.host))
                })??,
            None => Self::run(&mut handle, command).await?,
        };

        if !output.stderr.trim().is_empty() {
            tracing::warn!(host = %self.host, stderr = %output.stderr.trim(), "remote stderr");
        }

        Ok(output)
    }

    async fn close(&self) -> Result<()> {
        let mut handle = self.handle.lock().await;
        handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await?;
        Ok(())
    }
}

/// Verifies the server's key against the configured policy during the
/// handshake. Rejection surfaces as the policy's error, not a generic
/// transport failure.
struct HostKeyHandler {
    host: String,
    policy: HostKeyPolicy,
}

#[async_trait]
impl client::Handler for HostKeyHandler {
    type Error = RemoteError;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        self.policy.verify(&self.host, &fingerprint)?;
        Ok(true)
    }
}
