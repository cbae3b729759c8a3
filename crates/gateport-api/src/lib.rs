//! HTTP surface for gateport
//!
//! Thin axum layer over the orchestrator: four gateway operations plus
//! list/health/banner endpoints. Operation handlers always answer 200 with
//! a [`models::ServiceResponse`] envelope; the orchestrator's error
//! taxonomy is flattened into its `message`.

pub mod handlers;
pub mod models;

use axum::{
    routing::get,
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use utoipa::OpenApi;

use gateport_core::Gateway;

/// Application state shared across handlers
pub struct AppState {
    pub gateway: Arc<Gateway>,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gateport API",
        version = "0.1.0",
        description = "Service-endpoint registration gateway",
        contact(
            name = "Gateport Team",
            email = "team@gateport.io"
        )
    ),
    paths(
        handlers::register_http_service,
        handlers::unregister_http_service,
        handlers::register_ssh_service,
        handlers::unregister_ssh_service,
        handlers::list_http_services,
        handlers::list_ssh_services,
        handlers::health_check,
        handlers::root,
    ),
    components(
        schemas(
            models::ServiceResponse,
            models::ServiceData,
            models::HttpServiceEntry,
            models::HttpServiceList,
            models::SshServiceEntry,
            models::SshServiceList,
            models::HealthResponse,
            models::ServiceBanner,
            models::ErrorResponse,
        )
    ),
    tags(
        (name = "gateway", description = "Service registration endpoints"),
        (name = "system", description = "System health and info endpoints")
    )
)]
struct ApiDoc;

/// API server configuration
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Enable permissive CORS (for development)
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:2381".parse().unwrap(),
            enable_cors: false,
        }
    }
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, gateway: Arc<Gateway>) -> Self {
        let state = Arc::new(AppState { gateway });
        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/api/v1/gateway/http", get(handlers::list_http_services))
            .route(
                "/api/v1/gateway/http/{service_name}",
                get(handlers::register_http_service).delete(handlers::unregister_http_service),
            )
            .route("/api/v1/gateway/ssh", get(handlers::list_ssh_services))
            .route(
                "/api/v1/gateway/ssh/{service_name}",
                get(handlers::register_ssh_service).delete(handlers::unregister_ssh_service),
            )
            .route("/health", get(handlers::health_check))
            .route("/", get(handlers::root))
            .route("/api/openapi.json", get(handlers::openapi_spec))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            router = router.layer(CorsLayer::permissive());
        }

        router
    }

    /// Start the API server
    pub async fn start(self) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        info!("Starting API server on {}", self.config.bind_addr);
        info!(
            "OpenAPI spec: http://{}/api/openapi.json",
            self.config.bind_addr
        );

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        axum::serve(listener, router)
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }
}
