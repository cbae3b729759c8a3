//! gateport server
//!
//! This binary wires the registry, the port pool and the two proxy control
//! planes into the registration orchestrator and serves the gateway API.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateport_api::{ApiServer, ApiServerConfig};
use gateport_core::Gateway;
use gateport_proxy::{FrpAdmin, KongAdmin, PortPool};
use gateport_registry::{
    EtcdStore, HttpServiceRegistry, KvStore, SshServiceRegistry, WorkloadDirectory,
};

/// gateport - register workloads as public HTTP/SSH endpoints
#[derive(Parser, Debug)]
#[command(name = "gateport")]
#[command(about = "Service-endpoint registration gateway", long_about = None)]
#[command(version = env!("GIT_TAG"))]
#[command(long_version = concat!(env!("GIT_TAG"), "\nCommit: ", env!("GIT_HASH"), "\nBuilt: ", env!("BUILD_TIME")))]
struct ServerArgs {
    /// API server bind address
    #[arg(long, env = "GATEPORT_BIND", default_value = "0.0.0.0:2381")]
    bind_addr: String,

    /// Host address proxies forward to (where workload host ports live)
    #[arg(long, env = "LOCAL_IP", default_value = "127.0.0.1")]
    local_ip: String,

    /// etcd server host
    #[arg(long, env = "ETCD_HOST", default_value = "localhost")]
    etcd_host: String,

    /// etcd server port (gRPC-JSON gateway)
    #[arg(long, env = "ETCD_PORT", default_value = "2379")]
    etcd_port: u16,

    /// Public TCP port range for SSH tunnels (format: "40000-40099", inclusive)
    #[arg(long, env = "TUNNEL_PORT_RANGE", default_value = "40000-40099")]
    tunnel_port_range: String,

    /// Public domain HTTP services are exposed under ({name}.{domain})
    #[arg(long, env = "HTTP_DOMAIN", default_value = "example.com")]
    http_domain: String,

    /// Public host SSH tunnels are exposed on ({domain}:{port})
    #[arg(long, env = "SSH_DOMAIN", default_value = "connect.example.com")]
    ssh_domain: String,

    /// frp client admin host
    #[arg(long, env = "FRP_HOST", default_value = "localhost")]
    frp_host: String,

    /// frp client admin port
    #[arg(long, env = "FRP_PORT", default_value = "7400")]
    frp_port: u16,

    /// frp admin username
    #[arg(long, env = "FRP_USERNAME", default_value = "admin")]
    frp_username: String,

    /// frp admin password
    #[arg(long, env = "FRP_PASSWORD", default_value = "123456")]
    frp_password: String,

    /// Kong admin API base URL
    #[arg(long, env = "KONG_ADMIN_URL", default_value = "http://127.0.0.1:8001")]
    kong_admin_url: String,

    /// Enable permissive CORS on the API (for development)
    #[arg(long, env = "ENABLE_CORS")]
    enable_cors: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();

    init_logging(&args.log_level)?;

    info!("🚀 Starting gateport");
    info!("API endpoint: {}", args.bind_addr);
    info!("etcd: {}:{}", args.etcd_host, args.etcd_port);
    info!("HTTP services will be: {{name}}.{}", args.http_domain);

    let (pool_start, pool_end) = parse_port_range(&args.tunnel_port_range)?;
    info!(
        "SSH tunnel port range: {}-{} ({} ports available)",
        pool_start,
        pool_end,
        pool_end - pool_start + 1
    );

    let store: Arc<dyn KvStore> = Arc::new(EtcdStore::new(&args.etcd_host, args.etcd_port));

    let gateway = Arc::new(Gateway::new(
        WorkloadDirectory::new(store.clone()),
        HttpServiceRegistry::new(store.clone(), args.http_domain.clone()),
        SshServiceRegistry::new(store, args.ssh_domain.clone()),
        Arc::new(KongAdmin::new(args.kong_admin_url.clone())),
        Arc::new(FrpAdmin::new(
            &args.frp_host,
            args.frp_port,
            &args.frp_username,
            &args.frp_password,
        )),
        PortPool::new(pool_start, pool_end),
        args.local_ip.clone(),
    ));
    info!("✅ Registration orchestrator initialized");

    let bind_addr: SocketAddr = args.bind_addr.parse()?;
    let api_config = ApiServerConfig {
        bind_addr,
        enable_cors: args.enable_cors,
    };
    let api_server = ApiServer::new(api_config, gateway);

    let api_handle = tokio::spawn(async move {
        if let Err(e) = api_server.start().await {
            error!("API server error: {}", e);
        }
    });

    info!("✅ gateport is running");
    info!("Press Ctrl+C to stop");

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping server...");
        }
        Err(err) => {
            error!("Error listening for shutdown signal: {}", err);
        }
    }

    api_handle.abort();
    info!("✅ gateport stopped");

    Ok(())
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

fn parse_port_range(range_str: &str) -> Result<(u16, u16)> {
    let parts: Vec<&str> = range_str.split('-').collect();
    if parts.len() != 2 {
        return Err(anyhow::anyhow!(
            "Invalid port range format. Expected: START-END (e.g., 40000-40099)"
        ));
    }

    let start: u16 = parts[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid start port: {}", parts[0]))?;
    let end: u16 = parts[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid end port: {}", parts[1]))?;

    if start > end {
        return Err(anyhow::anyhow!("Start port must not exceed end port"));
    }

    Ok((start, end))
}
