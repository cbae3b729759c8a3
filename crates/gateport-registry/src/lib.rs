//! Registry access for gateport
//!
//! Everything gateport knows about the outside world lives in an etcd
//! keyspace: workload descriptions written by the container runtime
//! (read-only here), plus the HTTP and SSH service records this process
//! writes back after provisioning proxies. Access goes through the
//! [`KvStore`] trait so the orchestrator can be exercised against an
//! in-memory store.

pub mod error;
pub mod services;
pub mod store;
pub mod workload;

pub use error::RegistryError;
pub use services::{
    HttpServiceRecord, HttpServiceRegistry, SshServiceRecord, SshServiceRegistry,
    HTTP_SERVICE_PREFIX, SSH_SERVICE_PREFIX,
};
pub use store::{EtcdStore, KvStore, MemoryStore};
pub use workload::{WorkloadDirectory, WorkloadRecord, WORKLOAD_PREFIX};

/// Records written before the `version` field existed deserialize as v1.
pub(crate) fn default_version() -> i64 {
    1
}
