//! Analytics routes

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;

use crate::routes::respond::{error_response, json_response, storage_unavailable_response};
use crate::server::AppState;

pub async fn platform_summary(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    match services.analytics.platform_summary().await {
        Ok(summary) => json_response(StatusCode::OK, &summary),
        Err(e) => error_response(&e),
    }
}
