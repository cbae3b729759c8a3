use thiserror::Error;

/// Errors surfaced by registry access
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The store is unreachable or answered with a non-success status.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// A directly-addressed key held a document that does not decode.
    ///
    /// Prefix scans never produce this: undecodable entries are logged
    /// and skipped so one bad record cannot hide the rest.
    #[error("undecodable record at {key}")]
    InvalidRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
