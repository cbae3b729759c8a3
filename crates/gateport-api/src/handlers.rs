use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::models::*;
use crate::{ApiDoc, AppState};

/// Register an HTTP exposure for a workload
#[utoipa::path(
    get,
    path = "/api/v1/gateway/http/{service_name}",
    params(
        ("service_name" = String, Path, description = "Workload service name")
    ),
    responses(
        (status = 200, description = "Registration outcome", body = ServiceResponse)
    ),
    tag = "gateway"
)]
pub async fn register_http_service(
    State(state): State<Arc<AppState>>,
    Path(service_name): Path<String>,
) -> Json<ServiceResponse> {
    info!("HTTP registration requested for {}", service_name);

    match state.gateway.register_http(&service_name).await {
        Ok(registration) => {
            let message = if registration.created {
                format!("HTTP service {} registered", service_name)
            } else {
                format!("service {} already registered", service_name)
            };
            Json(ServiceResponse::ok(
                message,
                ServiceData {
                    service_name: Some(service_name),
                    container_name: Some(registration.record.container_name.clone()),
                    http_endpoint: Some(registration.record.http_endpoint.clone()),
                    http_port: registration.created.then_some(registration.record.http_port),
                    ..Default::default()
                },
            ))
        }
        Err(e) => Json(ServiceResponse::failure(e.to_string())),
    }
}

/// Unregister an HTTP exposure
#[utoipa::path(
    delete,
    path = "/api/v1/gateway/http/{service_name}",
    params(
        ("service_name" = String, Path, description = "Workload service name")
    ),
    responses(
        (status = 200, description = "Deregistration outcome", body = ServiceResponse)
    ),
    tag = "gateway"
)]
pub async fn unregister_http_service(
    State(state): State<Arc<AppState>>,
    Path(service_name): Path<String>,
) -> Json<ServiceResponse> {
    info!("HTTP deregistration requested for {}", service_name);

    match state.gateway.unregister_http(&service_name).await {
        Ok(_) => Json(ServiceResponse::ok(
            format!("HTTP service {} unregistered", service_name),
            ServiceData {
                service_name: Some(service_name),
                ..Default::default()
            },
        )),
        Err(e) => Json(ServiceResponse::failure(e.to_string())),
    }
}

/// Register an SSH exposure for a workload
#[utoipa::path(
    get,
    path = "/api/v1/gateway/ssh/{service_name}",
    params(
        ("service_name" = String, Path, description = "Workload service name")
    ),
    responses(
        (status = 200, description = "Registration outcome", body = ServiceResponse)
    ),
    tag = "gateway"
)]
pub async fn register_ssh_service(
    State(state): State<Arc<AppState>>,
    Path(service_name): Path<String>,
) -> Json<ServiceResponse> {
    info!("SSH registration requested for {}", service_name);

    match state.gateway.register_ssh(&service_name).await {
        Ok(registration) => {
            let message = if registration.created {
                format!("SSH service {} registered", service_name)
            } else {
                format!("service {} already registered", service_name)
            };
            Json(ServiceResponse::ok(
                message,
                ServiceData {
                    service_name: Some(service_name),
                    container_name: Some(registration.record.container_name.clone()),
                    ssh_endpoint: Some(registration.record.ssh_endpoint.clone()),
                    ssh_port: if registration.created {
                        registration.external_port
                    } else {
                        None
                    },
                    ..Default::default()
                },
            ))
        }
        Err(e) => Json(ServiceResponse::failure(e.to_string())),
    }
}

/// Unregister an SSH exposure
#[utoipa::path(
    delete,
    path = "/api/v1/gateway/ssh/{service_name}",
    params(
        ("service_name" = String, Path, description = "Workload service name")
    ),
    responses(
        (status = 200, description = "Deregistration outcome", body = ServiceResponse)
    ),
    tag = "gateway"
)]
pub async fn unregister_ssh_service(
    State(state): State<Arc<AppState>>,
    Path(service_name): Path<String>,
) -> Json<ServiceResponse> {
    info!("SSH deregistration requested for {}", service_name);

    match state.gateway.unregister_ssh(&service_name).await {
        Ok(_) => Json(ServiceResponse::ok(
            format!("SSH service {} unregistered", service_name),
            ServiceData {
                service_name: Some(service_name),
                ..Default::default()
            },
        )),
        Err(e) => Json(ServiceResponse::failure(e.to_string())),
    }
}

/// List registered HTTP services
#[utoipa::path(
    get,
    path = "/api/v1/gateway/http",
    responses(
        (status = 200, description = "Registered HTTP services", body = HttpServiceList),
        (status = 500, description = "Registry unavailable", body = ErrorResponse)
    ),
    tag = "gateway"
)]
pub async fn list_http_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HttpServiceList>, (StatusCode, Json<ErrorResponse>)> {
    debug!("listing registered HTTP services");

    let records = state.gateway.http_services().list().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
                code: Some("REGISTRY_UNAVAILABLE".to_string()),
            }),
        )
    })?;

    let services: Vec<HttpServiceEntry> = records.into_iter().map(Into::into).collect();
    let total = services.len();
    Ok(Json(HttpServiceList { services, total }))
}

/// List registered SSH services
#[utoipa::path(
    get,
    path = "/api/v1/gateway/ssh",
    responses(
        (status = 200, description = "Registered SSH services", body = SshServiceList),
        (status = 500, description = "Registry unavailable", body = ErrorResponse)
    ),
    tag = "gateway"
)]
pub async fn list_ssh_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SshServiceList>, (StatusCode, Json<ErrorResponse>)> {
    debug!("listing registered SSH services");

    let records = state.gateway.ssh_services().list().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
                code: Some("REGISTRY_UNAVAILABLE".to_string()),
            }),
        )
    })?;

    let services: Vec<SshServiceEntry> = records.into_iter().map(Into::into).collect();
    let total = services.len();
    Ok(Json(SshServiceList { services, total }))
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "gateport".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Root banner
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service banner", body = ServiceBanner)
    ),
    tag = "system"
)]
pub async fn root() -> Json<ServiceBanner> {
    Json(ServiceBanner {
        message: "gateport gateway API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: vec![
            "GET /api/v1/gateway/http/{service-name} - register HTTP service".to_string(),
            "DELETE /api/v1/gateway/http/{service-name} - unregister HTTP service".to_string(),
            "GET /api/v1/gateway/ssh/{service-name} - register SSH service".to_string(),
            "DELETE /api/v1/gateway/ssh/{service-name} - unregister SSH service".to_string(),
        ],
    })
}

/// The OpenAPI document
pub async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
