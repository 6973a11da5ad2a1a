//! Health check endpoints
//!
//! Kubernetes-style probes:
//! - /health, /healthz - liveness (is the process up?)
//! - /ready, /readyz - readiness (is MongoDB connected?)
//!
//! In dev mode the readiness probe passes without MongoDB so the server
//! can be exercised as a bare HTTP shell.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::routes::respond::json_response;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub uptime: u64,
    pub mode: String,
    #[serde(rename = "nodeId")]
    pub node_id: String,
    pub mongo: MongoHealth,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct MongoHealth {
    pub connected: bool,
}

/// Liveness probe, 200 whenever the process is serving
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let body = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        mode: if state.args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        node_id: state.args.node_id.to_string(),
        mongo: MongoHealth {
            connected: state.mongo.is_some(),
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    json_response(StatusCode::OK, &body)
}

/// Readiness probe, 200 only when traffic can be served
pub fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let ready = state.mongo.is_some() || state.args.dev_mode;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    json_response(
        status,
        &serde_json::json!({
            "ready": ready,
            "mongoConnected": state.mongo.is_some(),
        }),
    )
}

/// Version info for deployment verification
pub fn version_info() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}
