use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use gateport_registry::{HttpServiceRecord, SshServiceRecord};

/// Envelope every gateway operation answers with
///
/// Operations always return HTTP 200; `success` carries the outcome and
/// `message` is human-readable. Callers never see a raw error chain.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ServiceData>,
}

impl ServiceResponse {
    pub fn ok(message: impl Into<String>, data: ServiceData) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Operation payload; only the fields relevant to the operation are set
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ServiceData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_endpoint: Option<String>,
    /// Public tunnel port handed out by the pool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_port: Option<u16>,
}

/// A registered HTTP service
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HttpServiceEntry {
    pub service_name: String,
    pub container_name: String,
    pub http_port: u16,
    pub http_endpoint: String,
    pub create_time: String,
    pub version: i64,
}

impl From<HttpServiceRecord> for HttpServiceEntry {
    fn from(record: HttpServiceRecord) -> Self {
        Self {
            service_name: record.service_name,
            container_name: record.container_name,
            http_port: record.http_port,
            http_endpoint: record.http_endpoint,
            create_time: record.create_time,
            version: record.version,
        }
    }
}

/// List of registered HTTP services
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HttpServiceList {
    pub services: Vec<HttpServiceEntry>,
    pub total: usize,
}

/// A registered SSH service
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SshServiceEntry {
    pub service_name: String,
    pub container_name: String,
    pub ssh_port: u16,
    pub ssh_endpoint: String,
    pub create_time: String,
    pub version: i64,
}

impl From<SshServiceRecord> for SshServiceEntry {
    fn from(record: SshServiceRecord) -> Self {
        Self {
            service_name: record.service_name,
            container_name: record.container_name,
            ssh_port: record.ssh_port,
            ssh_endpoint: record.ssh_endpoint,
            create_time: record.create_time,
            version: record.version,
        }
    }
}

/// List of registered SSH services
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SshServiceList {
    pub services: Vec<SshServiceEntry>,
    pub total: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Root banner listing the operation routes
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceBanner {
    pub message: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

/// Error payload for non-operation endpoints
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
