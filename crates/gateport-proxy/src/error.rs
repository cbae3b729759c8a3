use thiserror::Error;

/// Errors surfaced by the proxy control planes
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The admin endpoint is unreachable or timed out.
    #[error("proxy control plane unavailable: {0}")]
    Unavailable(String),

    /// The admin endpoint answered with a non-success status.
    #[error("proxy admin call failed with {status}: {detail}")]
    Admin { status: u16, detail: String },

    /// The named proxy object does not exist on the control plane.
    #[error("no proxy named {0}")]
    UnknownProxy(String),
}
