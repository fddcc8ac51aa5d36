//! Cluster infrastructure provisioning
//!
//! Drives the fixed ordering the cluster layout requires: resource group,
//! security group, network, subnet, then per instance a public address, a
//! network interface, the instance itself and (optionally) a DNS record.
//!
//! Instance creation is sequential. A failure at instance `i` leaves
//! instances `1..i-1` running; the error carries their records so callers
//! can report partial success instead of losing them.

use crate::api::{CloudApi, InstanceSpec, NetworkLayout, SecurityRule};
use crate::error::CloudError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Image every instance boots from.
pub const INSTANCE_IMAGE: &str = "Canonical:UbuntuServer:18.04-LTS:latest";

/// Port the cluster API listens on.
pub const CLUSTER_API_PORT: u16 = 6443;

/// NodePort the database service is exposed on when requested.
pub const DB_NODEPORT: u16 = 30000;

#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Instance creation failed mid-loop. `created` holds the instances
    /// that were already up when `failed` aborted the run.
    #[error("provisioning aborted at {failed} after {} instance(s): {source}", created.len())]
    Partial {
        created: Vec<InstanceRecord>,
        failed: String,
        source: CloudError,
    },

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

/// What the caller asks for.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionRequest {
    pub vm_count: u32,
    pub resource_group: String,
    pub location: String,
    pub vm_size: String,
    pub username: String,
    pub password: String,
    pub dns_zone: Option<String>,
    #[serde(default)]
    pub expose_db_nodeport: bool,
}

/// One provisioned instance, as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    #[serde(rename = "instance_name")]
    pub name: String,
    pub public_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
}

/// Infrastructure provisioner
pub struct Provisioner {
    cloud: Arc<dyn CloudApi>,
    layout: NetworkLayout,
}

impl Provisioner {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self {
            cloud,
            layout: NetworkLayout::default(),
        }
    }

    pub fn with_layout(cloud: Arc<dyn CloudApi>, layout: NetworkLayout) -> Self {
        Self { cloud, layout }
    }

    /// The fixed inbound rule set shared by every instance.
    pub fn inbound_rules(expose_db_nodeport: bool) -> Vec<SecurityRule> {
        let mut rules = vec![
            SecurityRule::new("AllowSSH", 22, 100),
            SecurityRule::new("AllowClusterApi", CLUSTER_API_PORT, 200),
        ];
        if expose_db_nodeport {
            rules.push(SecurityRule::new("AllowDbNodePort", DB_NODEPORT, 300));
        }
        rules
    }

    /// Provision `vm_count` instances plus the shared network resources.
    ///
    /// With `vm_count = 0` the shared resources are still created and an
    /// empty list is returned.
    pub async fn provision(
        &self,
        request: &ProvisionRequest,
    ) -> Result<Vec<InstanceRecord>, ProvisionError> {
        let group = &request.resource_group;
        let security_group = format!("{group}-nsg");
        let network = format!("{group}-vnet");
        let subnet = format!("{group}-subnet");

        tracing::info!(
            resource_group = %group,
            location = %request.location,
            count = request.vm_count,
            "provisioning cluster infrastructure"
        );

        self.cloud
            .create_resource_group(group, &request.location)
            .await?;

        let rules = Self::inbound_rules(request.expose_db_nodeport);
        self.cloud
            .create_security_group(group, &security_group, &request.location, &rules)
            .await?;

        self.cloud
            .create_virtual_network(group, &network, &request.location, &self.layout.network_prefix)
            .await?;
        self.cloud
            .create_subnet(group, &network, &subnet, &self.layout.subnet_prefix)
            .await?;

        let mut created = Vec::new();

        for i in 1..=request.vm_count {
            let name = format!("instance-{i}");
            let address = format!("instance-{i}-ip");
            let interface = format!("instance-{i}-nic");

            match self
                .provision_instance(request, &name, &address, &interface, &security_group, &network, &subnet)
                .await
            {
                Ok(record) => {
                    tracing::info!(instance = %record.name, ip = %record.public_ip, "instance up");
                    created.push(record);
                }
                Err(source) => {
                    // No rollback: earlier instances keep running and are
                    // reported through the error.
                    return Err(ProvisionError::Partial {
                        created,
                        failed: name,
                        source,
                    });
                }
            }
        }

        Ok(created)
    }

    #[allow(clippy::too_many_arguments)]
    async fn provision_instance(
        &self,
        request: &ProvisionRequest,
        name: &str,
        address: &str,
        interface: &str,
        security_group: &str,
        network: &str,
        subnet: &str,
    ) -> Result<InstanceRecord, CloudError> {
        let group = &request.resource_group;

        self.cloud
            .create_public_address(group, address, &request.location)
            .await?;

        self.cloud
            .create_interface(group, interface, network, subnet, security_group, address)
            .await?;

        let spec = InstanceSpec {
            name: name.to_string(),
            size: request.vm_size.clone(),
            image: INSTANCE_IMAGE.to_string(),
            admin_username: request.username.clone(),
            admin_password: request.password.clone(),
            interface: interface.to_string(),
        };
        self.cloud.create_instance(group, &spec).await?;

        let public_ip = self.cloud.get_public_address(group, address).await?;

        let dns_name = match &request.dns_zone {
            Some(zone) => Some(
                self.cloud
                    .create_dns_record(group, zone, name, &public_ip)
                    .await?,
            ),
            None => None,
        };

        Ok(InstanceRecord {
            name: name.to_string(),
            public_ip,
            dns_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CloudApi;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every call and can be told to fail a specific instance.
    struct FakeCloud {
        calls: Mutex<Vec<String>>,
        rules_seen: Mutex<Vec<SecurityRule>>,
        fail_instance: Option<String>,
    }

    impl FakeCloud {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                rules_seen: Mutex::new(Vec::new()),
                fail_instance: None,
            }
        }

        fn failing_at(name: &str) -> Self {
            Self {
                fail_instance: Some(name.to_string()),
                ..Self::new()
            }
        }

        fn log(&self, entry: String) {
            self.calls.lock().unwrap().push(entry);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CloudApi for FakeCloud {
        async fn create_resource_group(&self, name: &str, _location: &str) -> Result<()> {
            self.log(format!("group {name}"));
            Ok(())
        }

        async fn create_security_group(
            &self,
            _group: &str,
            name: &str,
            _location: &str,
            rules: &[SecurityRule],
        ) -> Result<()> {
            self.log(format!("nsg {name}"));
            self.rules_seen.lock().unwrap().extend(rules.iter().cloned());
            Ok(())
        }

        async fn create_virtual_network(
            &self,
            _group: &str,
            name: &str,
            _location: &str,
            prefix: &str,
        ) -> Result<()> {
            self.log(format!("vnet {name} {prefix}"));
            Ok(())
        }

        async fn create_subnet(
            &self,
            _group: &str,
            _network: &str,
            name: &str,
            prefix: &str,
        ) -> Result<()> {
            self.log(format!("subnet {name} {prefix}"));
            Ok(())
        }

        async fn create_public_address(
            &self,
            _group: &str,
            name: &str,
            _location: &str,
        ) -> Result<()> {
            self.log(format!("ip {name}"));
            Ok(())
        }

        async fn create_interface(
            &self,
            _group: &str,
            name: &str,
            _network: &str,
            _subnet: &str,
            _security_group: &str,
            _public_address: &str,
        ) -> Result<()> {
            self.log(format!("nic {name}"));
            Ok(())
        }

        async fn create_instance(&self, _group: &str, spec: &InstanceSpec) -> Result<()> {
            if self.fail_instance.as_deref() == Some(spec.name.as_str()) {
                return Err(CloudError::CommandFailed(format!(
                    "quota exceeded creating {}",
                    spec.name
                )));
            }
            self.log(format!("vm {}", spec.name));
            Ok(())
        }

        async fn get_public_address(&self, _group: &str, name: &str) -> Result<String> {
            // instance-{i}-ip -> 198.51.100.{i}
            let index: String = name.chars().filter(|c| c.is_ascii_digit()).collect();
            Ok(format!("198.51.100.{index}"))
        }

        async fn create_dns_record(
            &self,
            _group: &str,
            zone: &str,
            record: &str,
            address: &str,
        ) -> Result<String> {
            self.log(format!("dns {record} -> {address}"));
            Ok(format!("{record}.{zone}"))
        }
    }

    fn request(count: u32) -> ProvisionRequest {
        ProvisionRequest {
            vm_count: count,
            resource_group: "demo".to_string(),
            location: "centralindia".to_string(),
            vm_size: "Standard_B1s".to_string(),
            username: "azureuser".to_string(),
            password: "Secret123!".to_string(),
            dns_zone: None,
            expose_db_nodeport: false,
        }
    }

    #[tokio::test]
    async fn provisions_n_uniquely_named_instances() {
        let cloud = Arc::new(FakeCloud::new());
        let provisioner = Provisioner::new(cloud.clone());

        let records = provisioner.provision(&request(3)).await.unwrap();

        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["instance-1", "instance-2", "instance-3"]);

        let mut ips: Vec<_> = records.iter().map(|r| r.public_ip.clone()).collect();
        ips.sort();
        ips.dedup();
        assert_eq!(ips.len(), 3, "public addresses must be distinct");
    }

    #[tokio::test]
    async fn zero_count_still_creates_shared_resources() {
        let cloud = Arc::new(FakeCloud::new());
        let provisioner = Provisioner::new(cloud.clone());

        let records = provisioner.provision(&request(0)).await.unwrap();
        assert!(records.is_empty());

        let calls = cloud.calls();
        assert_eq!(
            calls,
            [
                "group demo",
                "nsg demo-nsg",
                "vnet demo-vnet 10.0.0.0/16",
                "subnet demo-subnet 10.0.0.0/24",
            ]
        );
    }

    #[tokio::test]
    async fn per_instance_resources_are_created_in_order() {
        let cloud = Arc::new(FakeCloud::new());
        let provisioner = Provisioner::new(cloud.clone());

        provisioner.provision(&request(1)).await.unwrap();

        let calls = cloud.calls();
        let tail = &calls[calls.len() - 3..];
        assert_eq!(tail, ["ip instance-1-ip", "nic instance-1-nic", "vm instance-1"]);
    }

    #[tokio::test]
    async fn mid_loop_failure_reports_created_instances() {
        let cloud = Arc::new(FakeCloud::failing_at("instance-2"));
        let provisioner = Provisioner::new(cloud.clone());

        let err = provisioner.provision(&request(3)).await.unwrap_err();
        match err {
            ProvisionError::Partial {
                created, failed, ..
            } => {
                assert_eq!(failed, "instance-2");
                assert_eq!(created.len(), 1);
                assert_eq!(created[0].name, "instance-1");
                assert_eq!(created[0].public_ip, "198.51.100.1");
            }
            other => panic!("expected partial failure, got {other}"),
        }
    }

    #[tokio::test]
    async fn dns_records_are_created_when_zone_given() {
        let cloud = Arc::new(FakeCloud::new());
        let provisioner = Provisioner::new(cloud.clone());

        let mut req = request(1);
        req.dns_zone = Some("example.com".to_string());

        let records = provisioner.provision(&req).await.unwrap();
        assert_eq!(records[0].dns_name.as_deref(), Some("instance-1.example.com"));
        assert!(cloud
            .calls()
            .contains(&"dns instance-1 -> 198.51.100.1".to_string()));
    }

    #[tokio::test]
    async fn rule_set_is_fixed() {
        let cloud = Arc::new(FakeCloud::new());
        let provisioner = Provisioner::new(cloud.clone());
        provisioner.provision(&request(0)).await.unwrap();

        let rules = cloud.rules_seen.lock().unwrap().clone();
        assert_eq!(
            rules,
            [
                SecurityRule::new("AllowSSH", 22, 100),
                SecurityRule::new("AllowClusterApi", 6443, 200),
            ]
        );
    }

    #[tokio::test]
    async fn nodeport_rule_is_added_on_request() {
        let cloud = Arc::new(FakeCloud::new());
        let provisioner = Provisioner::new(cloud.clone());

        let mut req = request(0);
        req.expose_db_nodeport = true;
        provisioner.provision(&req).await.unwrap();

        let rules = cloud.rules_seen.lock().unwrap().clone();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[2], SecurityRule::new("AllowDbNodePort", 30000, 300));
    }
}
