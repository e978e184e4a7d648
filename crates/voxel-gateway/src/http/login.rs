use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    #[serde(default)]
    pub avatar_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Same value as `user_id`; clients pass it back as `?userId=` on /ws.
    pub token: String,
    pub user_id: String,
}

/// POST /login: find the account by username, creating it on first use.
pub async fn login_handler(State(state): State<Arc<AppState>>, Json(req): Json<LoginRequest>) -> impl IntoResponse {
    let username = req.username.trim().to_string();
    if username.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "username is required" })),
        )
            .into_response();
    }

    match state.store.find_or_create_user(username, req.avatar_url).await {
        Ok(user) => {
            info!(user_id = %user.id, username = %user.username, "login");
            Json(LoginResponse {
                token: user.id.clone(),
                user_id: user.id,
            })
            .into_response()
        }
        Err(e) => {
            warn!(error = %e, code = e.code(), "login failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to create user" })),
            )
                .into_response()
        }
    }
}
