//! Reverse-proxy driver (Kong admin API)
//!
//! An HTTP exposure is a pair of Kong objects sharing one name: a service
//! (the upstream target) and a route under it (the public host match).
//! They are created and deleted together; the admin API is per-object, so
//! the driver owns the pairing discipline.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::ProxyError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Declarative create/delete of a named (service, route) pair
#[async_trait]
pub trait ReverseProxy: Send + Sync {
    /// Materialize the pair: requests for `domain` are proxied to
    /// `host:port`. Never leaves an orphaned service behind on failure.
    async fn add(&self, name: &str, host: &str, port: u16, domain: &str) -> Result<(), ProxyError>;

    /// Tear the pair down. Succeeds if at least one of the two objects
    /// was actually removed; an object that is already absent is not an
    /// error for that sub-step.
    async fn delete(&self, name: &str) -> Result<(), ProxyError>;
}

/// Kong admin API client
pub struct KongAdmin {
    base_url: String,
    client: reqwest::Client,
}

impl KongAdmin {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Both Kong objects carry this name.
    fn object_name(name: &str) -> String {
        format!("http-{}", name)
    }

    async fn create_service(
        &self,
        name: &str,
        protocol: &str,
        host: &str,
        port: u16,
    ) -> Result<(), ProxyError> {
        let url = format!("{}/services", self.base_url);
        let body = json!({
            "name": Self::object_name(name),
            "protocol": protocol,
            "host": host,
            "port": port,
        });
        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProxyError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("created Kong service {}", Self::object_name(name));
            Ok(())
        } else {
            Err(ProxyError::Admin {
                status: status.as_u16(),
                detail: response.text().await.unwrap_or_default(),
            })
        }
    }

    async fn create_route(&self, name: &str, domain: &str) -> Result<(), ProxyError> {
        let url = format!(
            "{}/services/{}/routes",
            self.base_url,
            Self::object_name(name)
        );
        let body = json!({
            "name": Self::object_name(name),
            "protocols": ["http"],
            "hosts": [domain],
        });
        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProxyError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("created Kong route {} -> {}", Self::object_name(name), domain);
            Ok(())
        } else {
            Err(ProxyError::Admin {
                status: status.as_u16(),
                detail: response.text().await.unwrap_or_default(),
            })
        }
    }

    /// Delete one object. `Ok(false)` means it was already absent.
    async fn delete_object(&self, collection: &str, name: &str) -> Result<bool, ProxyError> {
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            collection,
            Self::object_name(name)
        );
        let response = self
            .client
            .delete(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProxyError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status.as_u16() == 404 {
            debug!("Kong {} {} already absent", collection, Self::object_name(name));
            Ok(false)
        } else {
            Err(ProxyError::Admin {
                status: status.as_u16(),
                detail: response.text().await.unwrap_or_default(),
            })
        }
    }

    async fn get_object(&self, collection: &str, name: &str) -> Result<Option<Value>, ProxyError> {
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            collection,
            Self::object_name(name)
        );
        let response = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProxyError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let value = response
                .json()
                .await
                .map_err(|e| ProxyError::Unavailable(format!("invalid reply: {}", e)))?;
            Ok(Some(value))
        } else if status.as_u16() == 404 {
            Ok(None)
        } else {
            Err(ProxyError::Admin {
                status: status.as_u16(),
                detail: response.text().await.unwrap_or_default(),
            })
        }
    }

    /// The materialized service object, for operators inspecting skew
    /// after a partial teardown.
    pub async fn service_info(&self, name: &str) -> Result<Option<Value>, ProxyError> {
        self.get_object("services", name).await
    }

    pub async fn route_info(&self, name: &str) -> Result<Option<Value>, ProxyError> {
        self.get_object("routes", name).await
    }
}

#[async_trait]
impl ReverseProxy for KongAdmin {
    async fn add(&self, name: &str, host: &str, port: u16, domain: &str) -> Result<(), ProxyError> {
        self.create_service(name, "http", host, port).await?;

        if let Err(e) = self.create_route(name, domain).await {
            // The service must not outlive a failed route creation.
            warn!("route creation for {} failed, removing service: {}", name, e);
            if let Err(cleanup) = self.delete_object("services", name).await {
                warn!("service cleanup for {} also failed: {}", name, cleanup);
            }
            return Err(e);
        }

        info!("added HTTP proxy {} -> {}:{} ({})", name, host, port, domain);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), ProxyError> {
        // Route first, then service; each sub-step tolerates absence so a
        // partially-cleaned-up pair from an earlier failure still goes away.
        let route = self.delete_object("routes", name).await;
        let service = self.delete_object("services", name).await;

        if let Err(e) = &route {
            warn!("route deletion for {} failed: {}", name, e);
        }
        if let Err(e) = &service {
            warn!("service deletion for {} failed: {}", name, e);
        }

        let removed_any =
            matches!(route, Ok(true)) || matches!(service, Ok(true));
        if removed_any {
            info!("deleted HTTP proxy {}", name);
            return Ok(());
        }

        match (route, service) {
            (Err(e), _) | (_, Err(e)) => Err(e),
            _ => Err(ProxyError::UnknownProxy(name.to_string())),
        }
    }
}
