//! Subscription and premium feature routes

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::schemas::SubscriptionTier;
use crate::routes::respond::{
    error_response, json_response, parse_body, storage_unavailable_response,
};
use crate::server::AppState;

#[derive(Deserialize)]
pub struct SubscribeRequest {
    pub tier: SubscriptionTier,
}

pub async fn subscribe(
    state: Arc<AppState>,
    user_id: &str,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let body: SubscribeRequest = match parse_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match services.monetization.subscribe(user_id, body.tier).await {
        Ok(receipt) => json_response(StatusCode::OK, &receipt),
        Err(e) => error_response(&e),
    }
}

pub async fn cancel_subscription(state: Arc<AppState>, user_id: &str) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    match services.monetization.cancel(user_id).await {
        Ok(()) => json_response(StatusCode::OK, &serde_json::json!({ "cancelled": true })),
        Err(e) => error_response(&e),
    }
}

pub async fn unlock_feature(
    state: Arc<AppState>,
    user_id: &str,
    feature_id: &str,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    match services
        .monetization
        .unlock_feature(user_id, feature_id)
        .await
    {
        Ok(unlock) => json_response(StatusCode::OK, &unlock),
        Err(e) => error_response(&e),
    }
}

pub async fn revenue_summary(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    match services.monetization.revenue_summary().await {
        Ok(summary) => json_response(StatusCode::OK, &summary),
        Err(e) => error_response(&e),
    }
}
