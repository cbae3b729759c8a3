//! Registered service records
//!
//! After a registration saga completes, the resulting public endpoint is
//! written back under a gateport-owned namespace, one JSON document per
//! service. The registry is the source of truth for "is this service
//! currently exposed" -- the orchestrator checks here before touching any
//! proxy control plane.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::RegistryError;
use crate::store::KvStore;

pub const HTTP_SERVICE_PREFIX: &str = "/gateway-client/services/http/";
pub const SSH_SERVICE_PREFIX: &str = "/gateway-client/services/ssh/";

const CREATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Public HTTP endpoint record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpServiceRecord {
    pub service_name: String,
    pub container_name: String,
    /// The workload's bound host port for its internal 80/tcp.
    pub http_port: u16,
    /// `<service_name>.<http_domain>`
    pub http_endpoint: String,
    pub create_time: String,
    #[serde(default = "crate::default_version")]
    pub version: i64,
}

/// Public SSH endpoint record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshServiceRecord {
    pub service_name: String,
    pub container_name: String,
    /// The workload's bound host port for its internal 22/tcp (the tunnel
    /// source, not the public port).
    pub ssh_port: u16,
    /// `<ssh_domain>:<external_port>`
    pub ssh_endpoint: String,
    pub create_time: String,
    #[serde(default = "crate::default_version")]
    pub version: i64,
}

/// Typed client for the HTTP service namespace
pub struct HttpServiceRegistry {
    store: Arc<dyn KvStore>,
    prefix: String,
    domain: String,
}

impl HttpServiceRegistry {
    pub fn new(store: Arc<dyn KvStore>, domain: impl Into<String>) -> Self {
        Self::with_prefix(store, HTTP_SERVICE_PREFIX, domain)
    }

    pub fn with_prefix(
        store: Arc<dyn KvStore>,
        prefix: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            domain: domain.into(),
        }
    }

    /// Public endpoint a service will be reachable at once registered.
    pub fn endpoint_for(&self, service_name: &str) -> String {
        format!("{}.{}", service_name, self.domain)
    }

    pub async fn register(
        &self,
        service_name: &str,
        container_name: &str,
        http_port: u16,
    ) -> Result<HttpServiceRecord, RegistryError> {
        let record = HttpServiceRecord {
            service_name: service_name.to_string(),
            container_name: container_name.to_string(),
            http_port,
            http_endpoint: self.endpoint_for(service_name),
            create_time: chrono::Local::now().format(CREATE_TIME_FORMAT).to_string(),
            version: 1,
        };

        let key = format!("{}{}", self.prefix, service_name);
        let value = serde_json::to_string_pretty(&record)
            .map_err(|source| RegistryError::InvalidRecord { key: key.clone(), source })?;
        self.store.put(&key, &value).await?;

        info!(
            "registered HTTP service {} -> {}",
            service_name, record.http_endpoint
        );
        Ok(record)
    }

    pub async fn lookup(
        &self,
        service_name: &str,
    ) -> Result<Option<HttpServiceRecord>, RegistryError> {
        let key = format!("{}{}", self.prefix, service_name);
        let Some(raw) = self.store.get(&key).await? else {
            debug!("HTTP service {} is not registered", service_name);
            return Ok(None);
        };
        let record =
            serde_json::from_str(&raw).map_err(|source| RegistryError::InvalidRecord { key, source })?;
        Ok(Some(record))
    }

    /// Remove the record. `false` means there was nothing to remove.
    pub async fn remove(&self, service_name: &str) -> Result<bool, RegistryError> {
        let key = format!("{}{}", self.prefix, service_name);
        let removed = self.store.delete(&key).await?;
        if removed {
            info!("removed HTTP service {}", service_name);
        } else {
            warn!("HTTP service {} was not registered", service_name);
        }
        Ok(removed)
    }

    pub async fn list(&self) -> Result<Vec<HttpServiceRecord>, RegistryError> {
        let mut records = Vec::new();
        for (key, raw) in self.store.list_prefix(&self.prefix).await? {
            match serde_json::from_str(&raw) {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping undecodable HTTP record at {}: {}", key, e),
            }
        }
        Ok(records)
    }
}

/// Typed client for the SSH service namespace
pub struct SshServiceRegistry {
    store: Arc<dyn KvStore>,
    prefix: String,
    domain: String,
}

impl SshServiceRegistry {
    pub fn new(store: Arc<dyn KvStore>, domain: impl Into<String>) -> Self {
        Self::with_prefix(store, SSH_SERVICE_PREFIX, domain)
    }

    pub fn with_prefix(
        store: Arc<dyn KvStore>,
        prefix: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            domain: domain.into(),
        }
    }

    /// Public endpoint for a tunnel landing on `external_port`.
    pub fn endpoint_for(&self, external_port: u16) -> String {
        format!("{}:{}", self.domain, external_port)
    }

    pub async fn register(
        &self,
        service_name: &str,
        container_name: &str,
        source_port: u16,
        external_port: u16,
    ) -> Result<SshServiceRecord, RegistryError> {
        let record = SshServiceRecord {
            service_name: service_name.to_string(),
            container_name: container_name.to_string(),
            ssh_port: source_port,
            ssh_endpoint: self.endpoint_for(external_port),
            create_time: chrono::Local::now().format(CREATE_TIME_FORMAT).to_string(),
            version: 1,
        };

        let key = format!("{}{}", self.prefix, service_name);
        let value = serde_json::to_string_pretty(&record)
            .map_err(|source| RegistryError::InvalidRecord { key: key.clone(), source })?;
        self.store.put(&key, &value).await?;

        info!(
            "registered SSH service {} -> {}",
            service_name, record.ssh_endpoint
        );
        Ok(record)
    }

    pub async fn lookup(
        &self,
        service_name: &str,
    ) -> Result<Option<SshServiceRecord>, RegistryError> {
        let key = format!("{}{}", self.prefix, service_name);
        let Some(raw) = self.store.get(&key).await? else {
            debug!("SSH service {} is not registered", service_name);
            return Ok(None);
        };
        let record =
            serde_json::from_str(&raw).map_err(|source| RegistryError::InvalidRecord { key, source })?;
        Ok(Some(record))
    }

    pub async fn remove(&self, service_name: &str) -> Result<bool, RegistryError> {
        let key = format!("{}{}", self.prefix, service_name);
        let removed = self.store.delete(&key).await?;
        if removed {
            info!("removed SSH service {}", service_name);
        } else {
            warn!("SSH service {} was not registered", service_name);
        }
        Ok(removed)
    }

    pub async fn list(&self) -> Result<Vec<SshServiceRecord>, RegistryError> {
        let mut records = Vec::new();
        for (key, raw) in self.store.list_prefix(&self.prefix).await? {
            match serde_json::from_str(&raw) {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping undecodable SSH record at {}: {}", key, e),
            }
        }
        Ok(records)
    }
}
