//! Social and challenge routes
//!
//! Challenge joins run through the access gate first: a free-tier user
//! with three participations today is turned away before the join.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::schemas::Difficulty;
use crate::routes::gamification::query_param;
use crate::routes::respond::{
    error_response, json_response, parse_body, storage_unavailable_response,
};
use crate::server::AppState;

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub user_id: String,
    pub content: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_content_type() -> String {
    "text".to_string()
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub user_id: String,
    pub content: String,
}

#[derive(Deserialize)]
pub struct UserIdRequest {
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct ConnectionRequestBody {
    pub requester_id: String,
    pub target_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateChallengeRequest {
    pub creator_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
}

pub async fn create_post(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let body: CreatePostRequest = match parse_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match services
        .social
        .create_post(&body.user_id, body.content, body.content_type, body.tags)
        .await
    {
        Ok(post) => json_response(StatusCode::CREATED, &post),
        Err(e) => error_response(&e),
    }
}

pub async fn create_comment(
    state: Arc<AppState>,
    post_id: &str,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let body: CreateCommentRequest = match parse_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match services
        .social
        .create_comment(&body.user_id, post_id, body.content)
        .await
    {
        Ok(comment) => json_response(StatusCode::CREATED, &comment),
        Err(e) => error_response(&e),
    }
}

pub async fn toggle_like(
    state: Arc<AppState>,
    post_id: &str,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let body: UserIdRequest = match parse_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match services.social.toggle_like(&body.user_id, post_id).await {
        Ok(liked) => json_response(StatusCode::OK, &serde_json::json!({ "liked": liked })),
        Err(e) => error_response(&e),
    }
}

pub async fn get_feed(
    state: Arc<AppState>,
    user_id: &str,
    query: Option<&str>,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let limit = query_param(query, "limit")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(20)
        .clamp(1, 100);
    let cursor = query_param(query, "cursor");

    match services.social.get_feed(user_id, limit, cursor).await {
        Ok(feed) => json_response(StatusCode::OK, &feed),
        Err(e) => error_response(&e),
    }
}

pub async fn request_connection(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let body: ConnectionRequestBody = match parse_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    // The connection cap is a gated feature on the requester's tier
    match services
        .access
        .check_feature_access(&body.requester_id, "social_connections")
        .await
    {
        Ok(decision) if !decision.access => {
            return json_response(StatusCode::FORBIDDEN, &decision);
        }
        Ok(_) => {}
        Err(e) => return error_response(&e),
    }

    match services
        .social
        .send_connection_request(&body.requester_id, &body.target_id, body.message)
        .await
    {
        Ok(connection) => json_response(StatusCode::CREATED, &connection),
        Err(e) => error_response(&e),
    }
}

pub async fn accept_connection(
    state: Arc<AppState>,
    connection_id: &str,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    match services.social.accept_connection(connection_id).await {
        Ok(connection) => json_response(StatusCode::OK, &connection),
        Err(e) => error_response(&e),
    }
}

pub async fn leaderboard(state: Arc<AppState>, query: Option<&str>) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let category = query_param(query, "category").unwrap_or("xp");
    let limit = query_param(query, "limit")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(50)
        .clamp(1, 100);

    match services.social.leaderboard(category, limit).await {
        Ok(board) => json_response(StatusCode::OK, &board),
        Err(e) => error_response(&e),
    }
}

pub async fn create_challenge(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let body: CreateChallengeRequest = match parse_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match services
        .social
        .create_challenge(
            &body.creator_id,
            body.title,
            body.description,
            body.category,
            body.difficulty,
        )
        .await
    {
        Ok(challenge) => json_response(StatusCode::CREATED, &challenge),
        Err(e) => error_response(&e),
    }
}

pub async fn join_challenge(
    state: Arc<AppState>,
    challenge_id: &str,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let body: UserIdRequest = match parse_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match services
        .access
        .check_feature_access(&body.user_id, "challenge_participation")
        .await
    {
        Ok(decision) if !decision.access => {
            return json_response(StatusCode::FORBIDDEN, &decision);
        }
        Ok(_) => {}
        Err(e) => return error_response(&e),
    }

    match services
        .social
        .join_challenge(&body.user_id, challenge_id)
        .await
    {
        Ok(()) => json_response(StatusCode::OK, &serde_json::json!({ "joined": true })),
        Err(e) => error_response(&e),
    }
}

pub async fn complete_challenge(
    state: Arc<AppState>,
    challenge_id: &str,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let Some(services) = state.services.as_ref() else {
        return storage_unavailable_response();
    };

    let body: UserIdRequest = match parse_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match services
        .social
        .complete_challenge(&body.user_id, challenge_id)
        .await
    {
        Ok(completion) => json_response(StatusCode::OK, &completion),
        Err(e) => error_response(&e),
    }
}
