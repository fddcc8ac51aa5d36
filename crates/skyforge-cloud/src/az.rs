//! az CLI wrapper
//!
//! Wraps the `az` CLI for Azure management operations. Every call requests
//! JSON output and parses the fields it needs.

use crate::api::{CloudApi, InstanceSpec, SecurityRule};
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

/// az CLI wrapper
pub struct AzCli {
    subscription: Option<String>,
}

impl AzCli {
    pub fn new() -> Self {
        Self { subscription: None }
    }

    /// Scope all commands to a specific subscription.
    pub fn with_subscription(subscription: impl Into<String>) -> Self {
        Self {
            subscription: Some(subscription.into()),
        }
    }

    /// Check that the az CLI is installed and a login session exists.
    pub async fn check_auth(&self) -> Result<AzAccount> {
        let which = Command::new("which").arg("az").output().await?;

        if !which.status.success() {
            return Err(CloudError::AzNotFound);
        }

        let output = self.run_command(&["account", "show"]).await?;
        let account: AzAccount = serde_json::from_str(&output)?;
        Ok(account)
    }

    /// Run an az command and return stdout.
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("az");
        cmd.args(args);
        cmd.args(["--output", "json"]);
        if let Some(ref sub) = self.subscription {
            cmd.arg("--subscription").arg(sub);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: az {}", args.join(" "));

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            // az reports naming conflicts as Conflict errors; keep them
            // distinguishable from other failures.
            if stderr.contains("Conflict") || stderr.contains("already exists") {
                return Err(CloudError::AlreadyExists(stderr));
            }
            return Err(CloudError::CommandFailed(stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Default for AzCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CloudApi for AzCli {
    async fn create_resource_group(&self, name: &str, location: &str) -> Result<()> {
        self.run_command(&["group", "create", "--name", name, "--location", location])
            .await?;
        Ok(())
    }

    async fn create_security_group(
        &self,
        group: &str,
        name: &str,
        location: &str,
        rules: &[SecurityRule],
    ) -> Result<()> {
        self.run_command(&[
            "network",
            "nsg",
            "create",
            "--resource-group",
            group,
            "--name",
            name,
            "--location",
            location,
        ])
        .await?;

        for rule in rules {
            let port = rule.port.to_string();
            let priority = rule.priority.to_string();
            self.run_command(&[
                "network",
                "nsg",
                "rule",
                "create",
                "--resource-group",
                group,
                "--nsg-name",
                name,
                "--name",
                &rule.name,
                "--priority",
                &priority,
                "--direction",
                "Inbound",
                "--access",
                "Allow",
                "--protocol",
                "Tcp",
                "--destination-port-ranges",
                &port,
            ])
            .await?;
        }

        Ok(())
    }

    async fn create_virtual_network(
        &self,
        group: &str,
        name: &str,
        location: &str,
        address_prefix: &str,
    ) -> Result<()> {
        self.run_command(&[
            "network",
            "vnet",
            "create",
            "--resource-group",
            group,
            "--name",
            name,
            "--location",
            location,
            "--address-prefix",
            address_prefix,
        ])
        .await?;
        Ok(())
    }

    async fn create_subnet(
        &self,
        group: &str,
        network: &str,
        name: &str,
        address_prefix: &str,
    ) -> Result<()> {
        self.run_command(&[
            "network",
            "vnet",
            "subnet",
            "create",
            "--resource-group",
            group,
            "--vnet-name",
            network,
            "--name",
            name,
            "--address-prefix",
            address_prefix,
        ])
        .await?;
        Ok(())
    }

    async fn create_public_address(&self, group: &str, name: &str, location: &str) -> Result<()> {
        self.run_command(&[
            "network",
            "public-ip",
            "create",
            "--resource-group",
            group,
            "--name",
            name,
            "--location",
            location,
            "--sku",
            "Standard",
            "--allocation-method",
            "Static",
        ])
        .await?;
        Ok(())
    }

    async fn create_interface(
        &self,
        group: &str,
        name: &str,
        network: &str,
        subnet: &str,
        security_group: &str,
        public_address: &str,
    ) -> Result<()> {
        self.run_command(&[
            "network",
            "nic",
            "create",
            "--resource-group",
            group,
            "--name",
            name,
            "--vnet-name",
            network,
            "--subnet",
            subnet,
            "--network-security-group",
            security_group,
            "--public-ip-address",
            public_address,
        ])
        .await?;
        Ok(())
    }

    async fn create_instance(&self, group: &str, spec: &InstanceSpec) -> Result<()> {
        self.run_command(&[
            "vm",
            "create",
            "--resource-group",
            group,
            "--name",
            &spec.name,
            "--size",
            &spec.size,
            "--image",
            &spec.image,
            "--admin-username",
            &spec.admin_username,
            "--admin-password",
            &spec.admin_password,
            "--authentication-type",
            "password",
            "--nics",
            &spec.interface,
        ])
        .await?;
        Ok(())
    }

    async fn get_public_address(&self, group: &str, name: &str) -> Result<String> {
        let output = self
            .run_command(&[
                "network",
                "public-ip",
                "show",
                "--resource-group",
                group,
                "--name",
                name,
            ])
            .await?;

        let info: PublicAddressInfo = serde_json::from_str(&output)?;
        info.ip_address
            .ok_or_else(|| CloudError::AddressUnassigned(name.to_string()))
    }

    async fn create_dns_record(
        &self,
        group: &str,
        zone: &str,
        record: &str,
        address: &str,
    ) -> Result<String> {
        let output = self
            .run_command(&[
                "network",
                "dns",
                "record-set",
                "a",
                "add-record",
                "--resource-group",
                group,
                "--zone-name",
                zone,
                "--record-set-name",
                record,
                "--ipv4-address",
                address,
            ])
            .await?;

        let info: DnsRecordInfo = serde_json::from_str(&output)?;
        Ok(info.fqdn())
    }
}

/// Login session information from `az account show`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzAccount {
    pub id: String,
    pub name: String,

    #[serde(rename = "tenantId")]
    pub tenant_id: Option<String>,
}

/// Public address information from `az network public-ip show`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicAddressInfo {
    #[serde(rename = "ipAddress")]
    pub ip_address: Option<String>,
}

/// DNS record set information from `az network dns record-set a add-record`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsRecordInfo {
    pub fqdn: Option<String>,
    pub name: Option<String>,
}

impl DnsRecordInfo {
    /// The fully-qualified name, without the zone root dot.
    pub fn fqdn(&self) -> String {
        self.fqdn
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_default()
            .trim_end_matches('.')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_address_parse() {
        let info: PublicAddressInfo =
            serde_json::from_str(r#"{"ipAddress": "20.198.96.12", "name": "instance-1-ip"}"#)
                .unwrap();
        assert_eq!(info.ip_address.as_deref(), Some("20.198.96.12"));
    }

    #[test]
    fn test_public_address_unassigned() {
        let info: PublicAddressInfo =
            serde_json::from_str(r#"{"ipAddress": null}"#).unwrap();
        assert!(info.ip_address.is_none());
    }

    #[test]
    fn test_dns_record_fqdn_trims_root_dot() {
        let info: DnsRecordInfo =
            serde_json::from_str(r#"{"fqdn": "instance-1.example.com.", "name": "instance-1"}"#)
                .unwrap();
        assert_eq!(info.fqdn(), "instance-1.example.com");
    }

    #[test]
    fn test_dns_record_falls_back_to_name() {
        let info: DnsRecordInfo = serde_json::from_str(r#"{"name": "instance-1"}"#).unwrap();
        assert_eq!(info.fqdn(), "instance-1");
    }
}
