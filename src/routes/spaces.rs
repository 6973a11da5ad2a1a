//! Space routes
//!
//! Space creation and joins are gated on the `vr_spaces` feature, so
//! free-tier users are turned away with the access decision body.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use crate::routes::gamification::query_param;
use crate::routes::respond::{
    error_response, json_response, parse_body, storage_unavailable_response,
};
use crate::server::AppState;
use crate::services::spaces::ENVIRONMENT_TEMPLATES;

#[derive(Deserialize)]
pub struct CreateSpaceRequest {
    pub creator_id: String,
    pub environment_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
pub struct SpaceUserRequest {
    pub user_id: String,
}

/// The static environment catalog
pub fn space_templates() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &ENVIRONMENT_TEMPLATES)
}

pub async fn list_spaces(state: Arc<AppState>, query: Option<&str>) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let limit = query_param(query, "limit")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(50)
        .clamp(1, 100);

    match services.spaces.list_public(limit).await {
        Ok(spaces) => json_response(StatusCode::OK, &spaces),
        Err(e) => error_response(&e),
    }
}

pub async fn create_space(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let body: CreateSpaceRequest = match parse_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match services
        .access
        .check_feature_access(&body.creator_id, "vr_spaces")
        .await
    {
        Ok(decision) if !decision.access => {
            return json_response(StatusCode::FORBIDDEN, &decision);
        }
        Ok(_) => {}
        Err(e) => return error_response(&e),
    }

    match services
        .spaces
        .create_space(
            &body.creator_id,
            &body.environment_type,
            body.name,
            body.is_public,
        )
        .await
    {
        Ok(space) => json_response(StatusCode::CREATED, &space),
        Err(e) => error_response(&e),
    }
}

pub async fn join_space(
    state: Arc<AppState>,
    space_id: &str,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let body: SpaceUserRequest = match parse_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match services
        .access
        .check_feature_access(&body.user_id, "vr_spaces")
        .await
    {
        Ok(decision) if !decision.access => {
            return json_response(StatusCode::FORBIDDEN, &decision);
        }
        Ok(_) => {}
        Err(e) => return error_response(&e),
    }

    match services.spaces.join_space(&body.user_id, space_id).await {
        Ok(join) => json_response(StatusCode::OK, &join),
        Err(e) => error_response(&e),
    }
}

pub async fn leave_space(
    state: Arc<AppState>,
    space_id: &str,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let body: SpaceUserRequest = match parse_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match services.spaces.leave_space(&body.user_id, space_id).await {
        Ok(()) => json_response(StatusCode::OK, &serde_json::json!({ "left": true })),
        Err(e) => error_response(&e),
    }
}
