//! User CRUD routes

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::{UserDoc, USER_COLLECTION};
use crate::routes::respond::{
    error_response, json_response, parse_body, storage_unavailable_response,
};
use crate::server::AppState;
use crate::types::LumenError;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub profile_visibility: Option<String>,
}

pub async fn create_user(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let Some(mongo) = state.mongo.clone() else {
        return storage_unavailable_response();
    };

    let body: CreateUserRequest = match parse_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    if body.username.trim().is_empty() {
        return error_response(&LumenError::invalid_input("username is required"));
    }

    let users = match mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };

    match users.find_one(bson::doc! { "username": &body.username }).await {
        Ok(Some(_)) => {
            return error_response(&LumenError::conflict("username already taken"));
        }
        Ok(None) => {}
        Err(e) => return error_response(&e),
    }

    let user = UserDoc::new(body.username, body.email, body.display_name);
    if let Err(e) = users.insert_one(user.clone()).await {
        return error_response(&e);
    }

    info!(user_id = %user.id, username = %user.username, "user created");
    json_response(StatusCode::CREATED, &user)
}

pub async fn get_user(state: Arc<AppState>, user_id: &str) -> Response<Full<Bytes>> {
    let Some(mongo) = state.mongo.clone() else {
        return storage_unavailable_response();
    };

    let users = match mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };

    match users.find_one(bson::doc! { "id": user_id }).await {
        Ok(Some(user)) => json_response(StatusCode::OK, &user),
        Ok(None) => error_response(&LumenError::not_found(format!("user {}", user_id))),
        Err(e) => error_response(&e),
    }
}

pub async fn update_user(
    state: Arc<AppState>,
    user_id: &str,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let Some(mongo) = state.mongo.clone() else {
        return storage_unavailable_response();
    };

    let body: UpdateUserRequest = match parse_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    if let Some(ref visibility) = body.profile_visibility {
        if !matches!(visibility.as_str(), "public" | "friends" | "private") {
            return error_response(&LumenError::invalid_input(
                "profile_visibility must be public, friends, or private",
            ));
        }
    }

    let mut set = bson::doc! { "metadata.updated_at": bson::DateTime::now() };
    if let Some(display_name) = body.display_name {
        set.insert("display_name", display_name);
    }
    if let Some(bio) = body.bio {
        set.insert("bio", bio);
    }
    if let Some(avatar_url) = body.avatar_url {
        set.insert("avatar_url", avatar_url);
    }
    if let Some(visibility) = body.profile_visibility {
        set.insert("profile_visibility", visibility);
    }

    let users = match mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };

    match users
        .update_one(bson::doc! { "id": user_id }, bson::doc! { "$set": set })
        .await
    {
        Ok(result) if result.matched_count == 0 => {
            error_response(&LumenError::not_found(format!("user {}", user_id)))
        }
        Ok(_) => match users.find_one(bson::doc! { "id": user_id }).await {
            Ok(Some(user)) => json_response(StatusCode::OK, &user),
            Ok(None) => error_response(&LumenError::not_found(format!("user {}", user_id))),
            Err(e) => error_response(&e),
        },
        Err(e) => error_response(&e),
    }
}

pub async fn delete_user(state: Arc<AppState>, user_id: &str) -> Response<Full<Bytes>> {
    let Some(mongo) = state.mongo.clone() else {
        return storage_unavailable_response();
    };

    let users = match mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };

    match users.soft_delete(bson::doc! { "id": user_id }).await {
        Ok(result) if result.matched_count == 0 => {
            error_response(&LumenError::not_found(format!("user {}", user_id)))
        }
        Ok(_) => {
            info!(user_id, "user deleted");
            json_response(StatusCode::OK, &serde_json::json!({ "deleted": true }))
        }
        Err(e) => error_response(&e),
    }
}
