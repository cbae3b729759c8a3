//! The registration orchestrator
//!
//! Ordering discipline, both directions anchored on the registry as the
//! source of truth:
//!
//! - register: proxy objects are created first and the registry record is
//!   written last, so a record never references proxy state that is not
//!   there. A failed write tears the proxy objects back down (and returns
//!   the SSH port) before reporting the failure.
//! - unregister: the registry record is deleted first; once it is gone the
//!   service is unregistered no matter what the proxy teardown does, so a
//!   teardown failure is only a warning.
//!
//! Compensations run to completion and are never themselves compensated; a
//! failed compensation is logged and the original error stands.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};

use gateport_proxy::{PortPool, ReverseProxy, TunnelProxy};
use gateport_registry::{
    HttpServiceRecord, HttpServiceRegistry, SshServiceRecord, SshServiceRegistry,
    WorkloadDirectory,
};

use crate::error::GatewayError;

/// Internal port an HTTP exposure forwards to.
const HTTP_INTERNAL_PORT: u16 = 80;
/// Internal port an SSH exposure tunnels to.
const SSH_INTERNAL_PORT: u16 = 22;

/// Tunnel proxy entries are namespaced away from the HTTP objects.
fn tunnel_proxy_name(service_name: &str) -> String {
    format!("ssh-{}", service_name)
}

/// Outcome of an HTTP registration
#[derive(Debug, Clone)]
pub struct HttpRegistration {
    pub record: HttpServiceRecord,
    /// `false` when the service was already registered for the same
    /// container and nothing was written.
    pub created: bool,
}

/// Outcome of an SSH registration
#[derive(Debug, Clone)]
pub struct SshRegistration {
    pub record: SshServiceRecord,
    /// The pooled public port, when this process knows it.
    pub external_port: Option<u16>,
    pub created: bool,
}

/// Outcome of an HTTP deregistration
#[derive(Debug, Clone)]
pub struct HttpUnregistration {
    pub record: HttpServiceRecord,
}

/// Outcome of an SSH deregistration
#[derive(Debug, Clone)]
pub struct SshUnregistration {
    pub record: SshServiceRecord,
    pub released_port: Option<u16>,
}

/// The saga coordinator
///
/// Holds every component by explicit reference -- nothing here is a
/// process-wide singleton. The port pool and the per-service advisory
/// locks are the only mutable state.
pub struct Gateway {
    workloads: WorkloadDirectory,
    http_services: HttpServiceRegistry,
    ssh_services: SshServiceRegistry,
    reverse_proxy: Arc<dyn ReverseProxy>,
    tunnel: Arc<dyn TunnelProxy>,
    ports: Mutex<PortPool>,
    service_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    local_ip: String,
}

impl Gateway {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workloads: WorkloadDirectory,
        http_services: HttpServiceRegistry,
        ssh_services: SshServiceRegistry,
        reverse_proxy: Arc<dyn ReverseProxy>,
        tunnel: Arc<dyn TunnelProxy>,
        ports: PortPool,
        local_ip: impl Into<String>,
    ) -> Self {
        Self {
            workloads,
            http_services,
            ssh_services,
            reverse_proxy,
            tunnel,
            ports: Mutex::new(ports),
            service_locks: Mutex::new(HashMap::new()),
            local_ip: local_ip.into(),
        }
    }

    pub fn http_services(&self) -> &HttpServiceRegistry {
        &self.http_services
    }

    pub fn ssh_services(&self) -> &SshServiceRegistry {
        &self.ssh_services
    }

    /// Serialize operations per service name so two rollbacks cannot race
    /// on the same external objects.
    async fn lock_service(&self, service_name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.service_locks.lock().unwrap();
            Arc::clone(locks.entry(service_name.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Register an HTTP exposure for `service_name`.
    pub async fn register_http(
        &self,
        service_name: &str,
    ) -> Result<HttpRegistration, GatewayError> {
        let _guard = self.lock_service(service_name).await;

        let workload = self
            .workloads
            .lookup(service_name)
            .await?
            .ok_or_else(|| GatewayError::NotFound(service_name.to_string()))?;

        // Same container already registered: nothing to do, no writes.
        if let Some(existing) = self.http_services.lookup(service_name).await? {
            if existing.container_name == workload.container_name {
                info!(
                    "HTTP service {} already registered at {}",
                    service_name, existing.http_endpoint
                );
                return Ok(HttpRegistration {
                    record: existing,
                    created: false,
                });
            }
        }

        let http_port =
            workload
                .host_port(HTTP_INTERNAL_PORT)
                .ok_or_else(|| GatewayError::PortNotExposed {
                    service: service_name.to_string(),
                    port: HTTP_INTERNAL_PORT,
                })?;

        let endpoint = self.http_services.endpoint_for(service_name);
        self.reverse_proxy
            .add(service_name, &self.local_ip, http_port, &endpoint)
            .await?;

        match self
            .http_services
            .register(service_name, &workload.container_name, http_port)
            .await
        {
            Ok(record) => {
                info!(
                    "HTTP service {} registered: {}:{} -> {}",
                    service_name, self.local_ip, http_port, record.http_endpoint
                );
                Ok(HttpRegistration {
                    record,
                    created: true,
                })
            }
            Err(e) => {
                warn!(
                    "registry write for {} failed, removing reverse proxy: {}",
                    service_name, e
                );
                if let Err(cleanup) = self.reverse_proxy.delete(service_name).await {
                    warn!(
                        "reverse proxy compensation for {} failed: {}",
                        service_name, cleanup
                    );
                }
                Err(e.into())
            }
        }
    }

    /// Remove an HTTP exposure.
    pub async fn unregister_http(
        &self,
        service_name: &str,
    ) -> Result<HttpUnregistration, GatewayError> {
        let _guard = self.lock_service(service_name).await;

        let record = self
            .http_services
            .lookup(service_name)
            .await?
            .ok_or_else(|| GatewayError::NotFound(service_name.to_string()))?;

        if !self.http_services.remove(service_name).await? {
            return Err(GatewayError::NotFound(service_name.to_string()));
        }

        // Registry is updated; a teardown failure no longer fails the
        // operation.
        match self.reverse_proxy.delete(service_name).await {
            Ok(()) => info!("HTTP service {} unregistered", service_name),
            Err(e) => warn!(
                "reverse proxy teardown for {} failed: {}",
                service_name, e
            ),
        }

        Ok(HttpUnregistration { record })
    }

    /// Register an SSH exposure for `service_name`.
    pub async fn register_ssh(&self, service_name: &str) -> Result<SshRegistration, GatewayError> {
        let _guard = self.lock_service(service_name).await;

        let workload = self
            .workloads
            .lookup(service_name)
            .await?
            .ok_or_else(|| GatewayError::NotFound(service_name.to_string()))?;

        if let Some(existing) = self.ssh_services.lookup(service_name).await? {
            if existing.container_name == workload.container_name {
                info!(
                    "SSH service {} already registered at {}",
                    service_name, existing.ssh_endpoint
                );
                let external_port = self.ports.lock().unwrap().port_for(service_name);
                return Ok(SshRegistration {
                    record: existing,
                    external_port,
                    created: false,
                });
            }
        }

        let source_port =
            workload
                .host_port(SSH_INTERNAL_PORT)
                .ok_or_else(|| GatewayError::PortNotExposed {
                    service: service_name.to_string(),
                    port: SSH_INTERNAL_PORT,
                })?;

        let external_port = self.ports.lock().unwrap().assign(service_name)?;

        let proxy_name = tunnel_proxy_name(service_name);
        if let Err(e) = self
            .tunnel
            .add_tcp_proxy(&proxy_name, &self.local_ip, source_port, external_port)
            .await
        {
            self.ports.lock().unwrap().release(service_name);
            return Err(e.into());
        }

        match self
            .ssh_services
            .register(
                service_name,
                &workload.container_name,
                source_port,
                external_port,
            )
            .await
        {
            Ok(record) => {
                info!(
                    "SSH service {} registered: {}:{} -> {}",
                    service_name, self.local_ip, source_port, record.ssh_endpoint
                );
                Ok(SshRegistration {
                    record,
                    external_port: Some(external_port),
                    created: true,
                })
            }
            Err(e) => {
                warn!(
                    "registry write for {} failed, removing tunnel proxy: {}",
                    service_name, e
                );
                if let Err(cleanup) = self.tunnel.remove_proxy(&proxy_name).await {
                    warn!(
                        "tunnel compensation for {} failed: {}",
                        service_name, cleanup
                    );
                }
                self.ports.lock().unwrap().release(service_name);
                Err(e.into())
            }
        }
    }

    /// Remove an SSH exposure.
    pub async fn unregister_ssh(
        &self,
        service_name: &str,
    ) -> Result<SshUnregistration, GatewayError> {
        let _guard = self.lock_service(service_name).await;

        let record = self
            .ssh_services
            .lookup(service_name)
            .await?
            .ok_or_else(|| GatewayError::NotFound(service_name.to_string()))?;

        if !self.ssh_services.remove(service_name).await? {
            return Err(GatewayError::NotFound(service_name.to_string()));
        }

        let proxy_name = tunnel_proxy_name(service_name);
        match self.tunnel.remove_proxy(&proxy_name).await {
            Ok(()) => info!("tunnel proxy {} removed", proxy_name),
            Err(e) => warn!("tunnel teardown for {} failed: {}", service_name, e),
        }

        let released_port = self.ports.lock().unwrap().release(service_name);
        if let Some(port) = released_port {
            info!("released external port {} from {}", port, service_name);
        }

        Ok(SshUnregistration {
            record,
            released_port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use gateport_proxy::ProxyError;
    use gateport_registry::{KvStore, MemoryStore, RegistryError};

    const WORKLOAD_PREFIX: &str = "/workloads/";

    /// Store wrapper that can be told to reject writes.
    struct FlakyStore {
        inner: MemoryStore,
        fail_puts: AtomicBool,
        puts: AtomicUsize,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                fail_puts: AtomicBool::new(false),
                puts: AtomicUsize::new(0),
            }
        }

        fn fail_puts(&self, fail: bool) {
            self.fail_puts.store(fail, Ordering::SeqCst);
        }

        fn put_count(&self) -> usize {
            self.puts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KvStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<String>, RegistryError> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: &str) -> Result<(), RegistryError> {
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(RegistryError::Unavailable("injected put failure".into()));
            }
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.inner.put(key, value).await
        }

        async fn delete(&self, key: &str) -> Result<bool, RegistryError> {
            self.inner.delete(key).await
        }

        async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, RegistryError> {
            self.inner.list_prefix(prefix).await
        }
    }

    #[derive(Default)]
    struct FakeReverseProxy {
        adds: AtomicUsize,
        deletes: AtomicUsize,
        fail_add: AtomicBool,
        fail_delete: AtomicBool,
    }

    #[async_trait]
    impl ReverseProxy for FakeReverseProxy {
        async fn add(
            &self,
            _name: &str,
            _host: &str,
            _port: u16,
            _domain: &str,
        ) -> Result<(), ProxyError> {
            if self.fail_add.load(Ordering::SeqCst) {
                return Err(ProxyError::Unavailable("injected add failure".into()));
            }
            self.adds.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn delete(&self, name: &str) -> Result<(), ProxyError> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(ProxyError::Unavailable("injected delete failure".into()));
            }
            if self.adds.load(Ordering::SeqCst) <= self.deletes.load(Ordering::SeqCst) {
                return Err(ProxyError::UnknownProxy(name.to_string()));
            }
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeTunnel {
        desired: Mutex<HashSet<String>>,
        reconciles: AtomicUsize,
        fail_add: AtomicBool,
        fail_remove: AtomicBool,
    }

    impl FakeTunnel {
        fn contains(&self, name: &str) -> bool {
            self.desired.lock().unwrap().contains(name)
        }
    }

    #[async_trait]
    impl TunnelProxy for FakeTunnel {
        async fn add_tcp_proxy(
            &self,
            name: &str,
            _local_ip: &str,
            _local_port: u16,
            _remote_port: u16,
        ) -> Result<(), ProxyError> {
            if self.fail_add.load(Ordering::SeqCst) {
                return Err(ProxyError::Unavailable("injected add failure".into()));
            }
            self.desired.lock().unwrap().insert(name.to_string());
            self.reconciles.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn remove_proxy(&self, name: &str) -> Result<(), ProxyError> {
            if self.fail_remove.load(Ordering::SeqCst) {
                return Err(ProxyError::Unavailable("injected remove failure".into()));
            }
            if !self.desired.lock().unwrap().remove(name) {
                return Err(ProxyError::UnknownProxy(name.to_string()));
            }
            self.reconciles.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<FlakyStore>,
        reverse_proxy: Arc<FakeReverseProxy>,
        tunnel: Arc<FakeTunnel>,
        gateway: Gateway,
    }

    fn fixture(pool_start: u16, pool_end: u16) -> Fixture {
        let store = Arc::new(FlakyStore::new());
        let reverse_proxy = Arc::new(FakeReverseProxy::default());
        let tunnel = Arc::new(FakeTunnel::default());

        let kv: Arc<dyn KvStore> = store.clone();
        let gateway = Gateway::new(
            WorkloadDirectory::with_prefix(kv.clone(), WORKLOAD_PREFIX),
            HttpServiceRegistry::new(kv.clone(), "example.com"),
            SshServiceRegistry::new(kv, "connect.example.com"),
            reverse_proxy.clone(),
            tunnel.clone(),
            PortPool::new(pool_start, pool_end),
            "10.0.0.5",
        );

        Fixture {
            store,
            reverse_proxy,
            tunnel,
            gateway,
        }
    }

    async fn seed_workload(store: &FlakyStore, service_name: &str, ports: &[(u16, u16)]) {
        let bindings: serde_json::Map<String, serde_json::Value> = ports
            .iter()
            .map(|(internal, host)| {
                (
                    format!("{}/tcp", internal),
                    serde_json::json!([{ "HostIp": "0.0.0.0", "HostPort": host.to_string() }]),
                )
            })
            .collect();

        let doc = serde_json::json!({
            "containerName": format!("{}-0", service_name),
            "createTime": "2024-05-01 10:20:30",
            "version": 1,
            "config": { "Image": "nginx:latest" },
            "hostConfig": { "PortBindings": bindings },
        });

        store
            .put(
                &format!("{}{}", WORKLOAD_PREFIX, service_name),
                &doc.to_string(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn http_registration_provisions_proxy_and_record() {
        let f = fixture(40000, 40009);
        seed_workload(&f.store, "web1", &[(80, 8080)]).await;

        let registration = f.gateway.register_http("web1").await.unwrap();
        assert!(registration.created);
        assert_eq!(registration.record.http_endpoint, "web1.example.com");
        assert_eq!(registration.record.http_port, 8080);
        assert_eq!(registration.record.container_name, "web1-0");

        assert_eq!(f.reverse_proxy.adds.load(Ordering::SeqCst), 1);
        let stored = f.gateway.http_services().lookup("web1").await.unwrap();
        assert_eq!(stored.unwrap().http_port, 8080);
    }

    #[tokio::test]
    async fn http_registration_is_idempotent_for_same_container() {
        let f = fixture(40000, 40009);
        seed_workload(&f.store, "web1", &[(80, 8080)]).await;

        let first = f.gateway.register_http("web1").await.unwrap();
        let writes_after_first = f.store.put_count();
        let second = f.gateway.register_http("web1").await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.record.http_endpoint, second.record.http_endpoint);
        // Proxy and registry were written exactly once.
        assert_eq!(f.reverse_proxy.adds.load(Ordering::SeqCst), 1);
        assert_eq!(f.store.put_count(), writes_after_first);
    }

    #[tokio::test]
    async fn http_registration_reregisters_when_container_changed() {
        let f = fixture(40000, 40009);
        seed_workload(&f.store, "web1", &[(80, 8080)]).await;
        f.gateway.register_http("web1").await.unwrap();

        // The workload was recreated under a new container identity.
        let doc = serde_json::json!({
            "containerName": "web1-1",
            "hostConfig": { "PortBindings": { "80/tcp": [{ "HostPort": "8081" }] } },
        });
        f.store
            .put(&format!("{}web1", WORKLOAD_PREFIX), &doc.to_string())
            .await
            .unwrap();

        let second = f.gateway.register_http("web1").await.unwrap();
        assert!(second.created);
        assert_eq!(second.record.container_name, "web1-1");
        assert_eq!(second.record.http_port, 8081);
        assert_eq!(f.reverse_proxy.adds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn http_registration_fails_without_port_binding() {
        let f = fixture(40000, 40009);
        seed_workload(&f.store, "web1", &[(443, 8443)]).await;

        let err = f.gateway.register_http("web1").await.unwrap_err();
        assert!(matches!(err, GatewayError::PortNotExposed { port: 80, .. }));

        // Nothing was provisioned or persisted.
        assert_eq!(f.reverse_proxy.adds.load(Ordering::SeqCst), 0);
        assert!(f
            .gateway
            .http_services()
            .lookup("web1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn http_registration_fails_for_unknown_workload() {
        let f = fixture(40000, 40009);
        let err = f.gateway.register_http("ghost").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn http_registration_aborts_when_proxy_add_fails() {
        let f = fixture(40000, 40009);
        seed_workload(&f.store, "web1", &[(80, 8080)]).await;
        f.reverse_proxy.fail_add.store(true, Ordering::SeqCst);

        let err = f.gateway.register_http("web1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Proxy(_)));
        assert!(f
            .gateway
            .http_services()
            .lookup("web1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn http_registration_compensates_failed_registry_write() {
        let f = fixture(40000, 40009);
        seed_workload(&f.store, "web1", &[(80, 8080)]).await;
        f.store.fail_puts(true);

        let err = f.gateway.register_http("web1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Registry(_)));

        // The proxy pair created in step one was torn back down.
        assert_eq!(f.reverse_proxy.adds.load(Ordering::SeqCst), 1);
        assert_eq!(f.reverse_proxy.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn http_unregistration_requires_existing_record() {
        let f = fixture(40000, 40009);
        let err = f.gateway.unregister_http("never").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn http_unregistration_tolerates_proxy_teardown_failure() {
        let f = fixture(40000, 40009);
        seed_workload(&f.store, "web1", &[(80, 8080)]).await;
        f.gateway.register_http("web1").await.unwrap();

        f.reverse_proxy.fail_delete.store(true, Ordering::SeqCst);
        let outcome = f.gateway.unregister_http("web1").await.unwrap();
        assert_eq!(outcome.record.service_name, "web1");

        // The registry is already empty, so a retry reports NotFound.
        let err = f.gateway.unregister_http("web1").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn ssh_registration_allocates_port_and_tunnel() {
        let f = fixture(40000, 40001);
        seed_workload(&f.store, "web1", &[(22, 2222)]).await;

        let registration = f.gateway.register_ssh("web1").await.unwrap();
        assert!(registration.created);
        assert_eq!(registration.external_port, Some(40000));
        assert_eq!(
            registration.record.ssh_endpoint,
            "connect.example.com:40000"
        );
        // The record keeps the workload-side source port.
        assert_eq!(registration.record.ssh_port, 2222);
        assert!(f.tunnel.contains("ssh-web1"));
    }

    #[tokio::test]
    async fn ssh_registration_exhausts_and_recovers_pool() {
        let f = fixture(40000, 40001);
        for name in ["a", "b", "c"] {
            seed_workload(&f.store, name, &[(22, 2222)]).await;
        }

        assert_eq!(
            f.gateway.register_ssh("a").await.unwrap().external_port,
            Some(40000)
        );
        assert_eq!(
            f.gateway.register_ssh("b").await.unwrap().external_port,
            Some(40001)
        );

        let err = f.gateway.register_ssh("c").await.unwrap_err();
        assert!(matches!(err, GatewayError::PoolExhausted(_)));

        // Releasing one slot lets exactly one more registration through.
        let outcome = f.gateway.unregister_ssh("a").await.unwrap();
        assert_eq!(outcome.released_port, Some(40000));
        assert_eq!(
            f.gateway.register_ssh("c").await.unwrap().external_port,
            Some(40000)
        );
    }

    #[tokio::test]
    async fn ssh_registration_releases_port_when_tunnel_fails() {
        let f = fixture(40000, 40001);
        seed_workload(&f.store, "web1", &[(22, 2222)]).await;
        f.tunnel.fail_add.store(true, Ordering::SeqCst);

        let err = f.gateway.register_ssh("web1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Proxy(_)));

        // The allocated port went back to the pool.
        f.tunnel.fail_add.store(false, Ordering::SeqCst);
        seed_workload(&f.store, "web2", &[(22, 2223)]).await;
        let next = f.gateway.register_ssh("web2").await.unwrap();
        assert_eq!(next.external_port, Some(40000));
    }

    #[tokio::test]
    async fn ssh_registration_rolls_back_tunnel_and_port_on_registry_failure() {
        let f = fixture(40000, 40001);
        seed_workload(&f.store, "web1", &[(22, 2222)]).await;
        f.store.fail_puts(true);

        let err = f.gateway.register_ssh("web1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Registry(_)));

        // Tunnel entry gone and port back in the pool.
        assert!(!f.tunnel.contains("ssh-web1"));
        f.store.fail_puts(false);
        let retry = f.gateway.register_ssh("web1").await.unwrap();
        assert_eq!(retry.external_port, Some(40000));
    }

    #[tokio::test]
    async fn ssh_registration_requires_ssh_binding() {
        let f = fixture(40000, 40001);
        seed_workload(&f.store, "web1", &[(80, 8080)]).await;

        let err = f.gateway.register_ssh("web1").await.unwrap_err();
        assert!(matches!(err, GatewayError::PortNotExposed { port: 22, .. }));
    }

    #[tokio::test]
    async fn ssh_unregistration_tolerates_tunnel_failure_but_frees_port() {
        let f = fixture(40000, 40001);
        seed_workload(&f.store, "web1", &[(22, 2222)]).await;
        f.gateway.register_ssh("web1").await.unwrap();

        f.tunnel.fail_remove.store(true, Ordering::SeqCst);
        let outcome = f.gateway.unregister_ssh("web1").await.unwrap();
        assert_eq!(outcome.released_port, Some(40000));

        let err = f.gateway.unregister_ssh("web1").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn ssh_registration_is_idempotent_for_same_container() {
        let f = fixture(40000, 40001);
        seed_workload(&f.store, "web1", &[(22, 2222)]).await;

        let first = f.gateway.register_ssh("web1").await.unwrap();
        let second = f.gateway.register_ssh("web1").await.unwrap();

        assert!(!second.created);
        assert_eq!(second.external_port, first.external_port);
        assert_eq!(f.tunnel.reconciles.load(Ordering::SeqCst), 1);
    }
}
