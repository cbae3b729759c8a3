use gateport_proxy::{PoolExhausted, ProxyError};
use gateport_registry::RegistryError;
use thiserror::Error;

/// Failure of a registration or deregistration operation
///
/// Every orchestration step's failure lands here and is reported to the
/// caller as data; a non-success result always means no new
/// externally-visible resource was left behind beyond what compensation
/// could undo.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The workload (on register) or the record (on unregister) is absent.
    #[error("service {0} not found")]
    NotFound(String),

    /// The workload does not bind the internal port the exposure needs.
    #[error("service {service} has no {port}/tcp host binding")]
    PortNotExposed { service: String, port: u16 },

    #[error(transparent)]
    PoolExhausted(#[from] PoolExhausted),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),
}
