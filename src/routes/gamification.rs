//! Experience, access, engagement, and credit routes

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::schemas::TransactionKind;
use crate::routes::respond::{
    error_response, json_response, parse_body, storage_unavailable_response,
};
use crate::server::AppState;

/// Value of `key` in a raw query string, if present
pub fn query_param<'a>(query: Option<&'a str>, key: &str) -> Option<&'a str> {
    query?.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

#[derive(Deserialize)]
pub struct AwardExperienceRequest {
    pub amount: i64,
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "manual".to_string()
}

#[derive(Deserialize)]
pub struct CreditsRequest {
    pub amount: i64,
}

pub async fn award_experience(
    state: Arc<AppState>,
    user_id: &str,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let body: AwardExperienceRequest = match parse_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match services
        .progression
        .award_experience(user_id, body.amount, &body.reason)
        .await
    {
        Ok(result) => json_response(StatusCode::OK, &result),
        Err(e) => error_response(&e),
    }
}

pub async fn check_access(
    state: Arc<AppState>,
    user_id: &str,
    feature: &str,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    match services.access.check_feature_access(user_id, feature).await {
        Ok(decision) => json_response(StatusCode::OK, &decision),
        Err(e) => error_response(&e),
    }
}

pub async fn record_usage(
    state: Arc<AppState>,
    user_id: &str,
    feature: &str,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    match services.access.record_usage(user_id, feature).await {
        Ok(()) => json_response(
            StatusCode::CREATED,
            &serde_json::json!({ "recorded": true, "feature": feature }),
        ),
        Err(e) => error_response(&e),
    }
}

pub async fn engagement_score(state: Arc<AppState>, user_id: &str) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    match services.engagement.compute_engagement_score(user_id).await {
        Ok(score) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "userId": user_id, "engagementScore": score }),
        ),
        Err(e) => error_response(&e),
    }
}

pub async fn user_stats(state: Arc<AppState>, user_id: &str) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    match services.social.user_stats(user_id).await {
        Ok(stats) => json_response(StatusCode::OK, &stats),
        Err(e) => error_response(&e),
    }
}

pub async fn purchase_credits(
    state: Arc<AppState>,
    user_id: &str,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let body: CreditsRequest = match parse_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match services
        .monetization
        .purchase_credits(user_id, body.amount)
        .await
    {
        Ok(balance) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "creditsPurchased": body.amount, "newBalance": balance }),
        ),
        Err(e) => error_response(&e),
    }
}

pub async fn spend_credits(
    state: Arc<AppState>,
    user_id: &str,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let body: CreditsRequest = match parse_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match services
        .ledger
        .debit_balance(user_id, body.amount, TransactionKind::Credits, None)
        .await
    {
        Ok(receipt) => json_response(StatusCode::OK, &receipt),
        Err(e) => error_response(&e),
    }
}

pub async fn transaction_history(
    state: Arc<AppState>,
    user_id: &str,
    query: Option<&str>,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let limit = query_param(query, "limit")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(50)
        .clamp(1, 200);

    match services.ledger.transaction_history(user_id, limit).await {
        Ok(history) => json_response(StatusCode::OK, &history),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_param_extracts_pairs() {
        assert_eq!(query_param(Some("limit=20&cursor=abc"), "limit"), Some("20"));
        assert_eq!(query_param(Some("limit=20&cursor=abc"), "cursor"), Some("abc"));
        assert_eq!(query_param(Some("limit=20"), "missing"), None);
        assert_eq!(query_param(None, "limit"), None);
    }
}
