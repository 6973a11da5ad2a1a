//! Shared response and body helpers for route handlers

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::types::LumenError;

/// JSON response with CORS headers
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let payload = serde_json::to_string(body).unwrap_or_else(|e| {
        warn!("Failed to serialize response: {}", e);
        r#"{"error":"Internal Server Error"}"#.to_string()
    });

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(payload)))
        .unwrap()
}

/// Map a service error onto its HTTP status and JSON body
pub fn error_response(err: &LumenError) -> Response<Full<Bytes>> {
    let (status, body) = match err {
        LumenError::NotFound(entity) => (
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": "Not Found", "entity": entity }),
        ),
        LumenError::InsufficientFunds {
            required,
            available,
        } => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({
                "error": "Insufficient credits",
                "required": required,
                "available": available,
            }),
        ),
        LumenError::InvalidInput(msg) => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": "Bad Request", "message": msg }),
        ),
        LumenError::Conflict(msg) => (
            StatusCode::CONFLICT,
            serde_json::json!({ "error": "Conflict", "message": msg }),
        ),
        LumenError::Storage(msg) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({ "error": "Service Unavailable", "message": msg }),
        ),
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// 503 answered by every data route while MongoDB is absent (dev mode)
pub fn storage_unavailable_response() -> Response<Full<Bytes>> {
    error_response(&LumenError::storage("MongoDB not connected"))
}

/// Read and deserialize a JSON request body, or produce the 400 to send
pub async fn parse_body<T: DeserializeOwned>(
    req: Request<Incoming>,
) -> std::result::Result<T, Response<Full<Bytes>>> {
    let bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            return Err(error_response(&LumenError::invalid_input(
                "failed to read request body",
            )));
        }
    };

    serde_json::from_slice(&bytes).map_err(|e| {
        error_response(&LumenError::invalid_input(format!(
            "malformed JSON body: {}",
            e
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_funds_maps_to_400_with_amounts() {
        let response = error_response(&LumenError::InsufficientFunds {
            required: 50,
            available: 20,
        });
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            error_response(&LumenError::not_found("user x")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_response(&LumenError::conflict("dup")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            error_response(&LumenError::storage("down")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            error_response(&LumenError::invalid_input("bad")).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
