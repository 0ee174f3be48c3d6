//! HTTP surface: `/health`, `/predict`, `/metadata`

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gk_core::RegressionMetrics;
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::errors::ServiceError;
use crate::service::PredictionService;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    status: &'static str,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    fn service_unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(message) => Self::service_unavailable(message),
            err if err.is_client_error() => Self::bad_request(err.to_string()),
            err => Self::internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "request failed");
        } else {
            warn!(status = %self.status, error = %self.message, "request rejected");
        }

        let payload = Json(ErrorResponse {
            error: self.message,
            status: "error",
        });
        (self.status, payload).into_response()
    }
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    prediction: f64,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct MetadataResponse {
    model_type: String,
    metrics: RegressionMetrics,
    features: Vec<String>,
    status: &'static str,
}

/// Router with request tracing; shares `service` across handlers
pub fn build_router(service: PredictionService) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/predict", post(handle_predict))
        .route("/metadata", get(handle_metadata))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serve until ctrl-c
pub async fn start_server(service: PredictionService, addr: &str) -> Result<()> {
    let app = build_router(service);
    let listener = bind_listener(addr).await?;
    info!("GK service listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("GK service terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind listener on {addr}"))
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        return;
    }
    info!("Shutdown signal received");
}

async fn handle_health(State(service): State<PredictionService>) -> Response {
    let health = service.health();
    let status = if health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health)).into_response()
}

async fn handle_predict(
    State(service): State<PredictionService>,
    body: Bytes,
) -> Result<Json<PredictResponse>, ApiError> {
    if !service.is_ready() {
        return Err(ApiError::service_unavailable("Model not loaded"));
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::bad_request("Empty request body"));
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|err| ApiError::bad_request(format!("Invalid JSON body: {err}")))?;

    let features = payload
        .get("features")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            ApiError::bad_request("Invalid input format. Expected 'features' object in request")
        })?;

    let prediction = service.predict(features)?;
    Ok(Json(PredictResponse {
        prediction,
        status: "success",
    }))
}

async fn handle_metadata(
    State(service): State<PredictionService>,
) -> Result<Json<MetadataResponse>, ApiError> {
    let info = service.metadata()?;
    Ok(Json(MetadataResponse {
        model_type: info.model_type,
        metrics: info.metrics,
        features: info.features,
        status: "success",
    }))
}
