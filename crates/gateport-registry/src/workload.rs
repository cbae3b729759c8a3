//! Workload discovery
//!
//! Workloads are containers whose descriptions the container runtime
//! writes under its own etcd prefix. gateport only reads them: the
//! interesting part is the `PortBindings` table, which says which host
//! port an internal port (like `80/tcp` or `22/tcp`) was bound to.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::error::RegistryError;
use crate::store::KvStore;

/// Keyspace owned by the container runtime (read-only for gateport).
pub const WORKLOAD_PREFIX: &str = "/gpu-docker-api/apis/v1/containers/";

/// On-the-wire shape of a workload document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkloadDocument {
    #[serde(default)]
    container_name: String,
    #[serde(default)]
    create_time: String,
    #[serde(default = "crate::default_version")]
    version: i64,
    #[serde(default)]
    config: WorkloadConfig,
    #[serde(default)]
    host_config: WorkloadHostConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WorkloadConfig {
    #[serde(default)]
    image: String,
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    env: Vec<String>,
    #[serde(default)]
    exposed_ports: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WorkloadHostConfig {
    #[serde(default)]
    port_bindings: BTreeMap<String, Vec<PortBinding>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PortBinding {
    #[serde(default)]
    host_ip: String,
    #[serde(default)]
    host_port: String,
}

/// A discovered workload
#[derive(Debug, Clone)]
pub struct WorkloadRecord {
    pub service_name: String,
    pub container_name: String,
    pub image: String,
    pub create_time: String,
    pub version: i64,
    pub hostname: String,
    pub env: Vec<String>,
    /// Internal ports the image declares, e.g. `"80/tcp"`.
    pub exposed_ports: Vec<String>,
    port_bindings: BTreeMap<String, Vec<PortBinding>>,
}

impl WorkloadRecord {
    fn from_document(service_name: &str, doc: WorkloadDocument) -> Self {
        Self {
            service_name: service_name.to_string(),
            container_name: doc.container_name,
            image: doc.config.image,
            create_time: doc.create_time,
            version: doc.version,
            hostname: doc.config.hostname,
            env: doc.config.env,
            exposed_ports: doc.config.exposed_ports.keys().cloned().collect(),
            port_bindings: doc.host_config.port_bindings,
        }
    }

    /// Mapping `"<port>/<proto>"` -> bound host port, first binding wins.
    pub fn service_ports(&self) -> BTreeMap<String, String> {
        let mut ports = BTreeMap::new();
        for (internal, bindings) in &self.port_bindings {
            if let Some(binding) = bindings.iter().find(|b| !b.host_port.is_empty()) {
                ports.insert(internal.clone(), binding.host_port.clone());
            }
        }
        ports
    }

    /// Host port bound for `internal_port`, any protocol.
    pub fn host_port(&self, internal_port: u16) -> Option<u16> {
        let wanted = format!("{}/", internal_port);
        self.service_ports()
            .iter()
            .find(|(internal, _)| internal.starts_with(&wanted))
            .and_then(|(_, host_port)| host_port.parse().ok())
    }
}

/// Read-only view of the workload namespace
pub struct WorkloadDirectory {
    store: Arc<dyn KvStore>,
    prefix: String,
}

impl WorkloadDirectory {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_prefix(store, WORKLOAD_PREFIX)
    }

    pub fn with_prefix(store: Arc<dyn KvStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub async fn lookup(
        &self,
        service_name: &str,
    ) -> Result<Option<WorkloadRecord>, RegistryError> {
        let key = format!("{}{}", self.prefix, service_name);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        let doc: WorkloadDocument =
            serde_json::from_str(&raw).map_err(|source| RegistryError::InvalidRecord { key, source })?;
        Ok(Some(WorkloadRecord::from_document(service_name, doc)))
    }

    /// All workloads currently described under the prefix. Undecodable
    /// entries are logged and skipped.
    pub async fn list(&self) -> Result<Vec<WorkloadRecord>, RegistryError> {
        let mut records = Vec::new();
        for (key, raw) in self.store.list_prefix(&self.prefix).await? {
            let service_name = key.strip_prefix(&self.prefix).unwrap_or(&key);
            match serde_json::from_str::<WorkloadDocument>(&raw) {
                Ok(doc) => records.push(WorkloadRecord::from_document(service_name, doc)),
                Err(e) => warn!("skipping undecodable workload at {}: {}", key, e),
            }
        }
        Ok(records)
    }
}
