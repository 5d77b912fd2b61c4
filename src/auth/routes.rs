//! Account endpoints: register, login, and admin-only user management.

use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use uuid::Uuid;

use super::model::{Login, Register, Role, UpdateUser, User};
use super::token::{
    TokenKeys, check_password_strength, extract_bearer, hash_password, normalize_email,
    verify_password,
};
use crate::error::{AuthError, StoreError};
use crate::store::UserStore;

/// Shared state for account routes.
#[derive(Clone)]
pub struct AuthRouteState {
    pub users: Arc<dyn UserStore>,
    pub keys: TokenKeys,
}

fn auth_error(e: &AuthError) -> (StatusCode, Json<serde_json::Value>) {
    let code = match e {
        AuthError::InvalidEmail | AuthError::WeakPassword => StatusCode::BAD_REQUEST,
        AuthError::InvalidCredentials | AuthError::TokenMissing => StatusCode::UNAUTHORIZED,
        AuthError::TokenInvalid | AuthError::Forbidden => StatusCode::FORBIDDEN,
        AuthError::EmailTaken => StatusCode::CONFLICT,
        AuthError::Hash(_) | AuthError::TokenIssue(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, Json(serde_json::json!({ "error": e.to_string() })))
}

fn store_error(e: &StoreError) -> (StatusCode, Json<serde_json::Value>) {
    let code = match e {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::Constraint(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, Json(serde_json::json!({ "error": e.to_string() })))
}

/// POST /api/auth/register
async fn register(
    State(state): State<AuthRouteState>,
    Json(req): Json<Register>,
) -> impl IntoResponse {
    if req.name.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "name, email and password are required"})),
        );
    }

    let email = match normalize_email(&req.email) {
        Ok(email) => email,
        Err(e) => return auth_error(&e),
    };
    if let Err(e) = check_password_strength(&req.password) {
        return auth_error(&e);
    }

    match state.users.find_user_by_email(&email).await {
        Ok(Some(_)) => return auth_error(&AuthError::EmailTaken),
        Ok(None) => {}
        Err(e) => return store_error(&e),
    }

    let hash = match hash_password(&req.password) {
        Ok(hash) => hash,
        Err(e) => return auth_error(&e),
    };

    let user = User::new(req.name.trim(), email, hash, req.role.unwrap_or_default());
    match state.users.create_user(&user).await {
        Ok(()) => (StatusCode::CREATED, Json(serde_json::json!(user))),
        // Lost a race with a concurrent registration for the same email.
        Err(StoreError::Constraint(_)) => auth_error(&AuthError::EmailTaken),
        Err(e) => store_error(&e),
    }
}

/// POST /api/auth/login
async fn login(State(state): State<AuthRouteState>, Json(req): Json<Login>) -> impl IntoResponse {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "email and password are required"})),
        );
    }

    // A malformed email can never match a stored one, so lookups skip
    // validation and unknown emails collapse into the same 401.
    let email = req.email.trim().to_lowercase();
    let user = match state.users.find_user_by_email(&email).await {
        Ok(Some(user)) => user,
        Ok(None) => return auth_error(&AuthError::InvalidCredentials),
        Err(e) => return store_error(&e),
    };

    match verify_password(&req.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => return auth_error(&AuthError::InvalidCredentials),
        Err(e) => return auth_error(&e),
    }

    let token = match state.keys.issue(&user) {
        Ok(token) => token,
        Err(e) => return auth_error(&e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({ "token": token, "user": user })),
    )
}

/// GET /api/auth/users
async fn list_users(State(state): State<AuthRouteState>) -> impl IntoResponse {
    match state.users.list_users().await {
        Ok(users) => (StatusCode::OK, Json(serde_json::json!(users))),
        Err(e) => store_error(&e),
    }
}

/// PATCH /api/auth/users/{id}
async fn update_user(
    State(state): State<AuthRouteState>,
    Path(id): Path<String>,
    Json(mut req): Json<UpdateUser>,
) -> impl IntoResponse {
    let user_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid user ID"})),
            );
        }
    };

    if let Some(email) = &req.email {
        match normalize_email(email) {
            Ok(normalized) => req.email = Some(normalized),
            Err(e) => return auth_error(&e),
        }
    }

    match state.users.update_user(user_id, &req).await {
        Ok(user) => (StatusCode::OK, Json(serde_json::json!(user))),
        Err(StoreError::Constraint(_)) => auth_error(&AuthError::EmailTaken),
        Err(e) => store_error(&e),
    }
}

/// DELETE /api/auth/users/{id}
async fn delete_user(State(state): State<AuthRouteState>, Path(id): Path<String>) -> impl IntoResponse {
    let user_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid user ID"})),
            );
        }
    };

    match state.users.delete_user(user_id).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"ok": true}))),
        Err(e) => store_error(&e),
    }
}

/// Gate requests behind a valid admin token.
///
/// A missing or malformed header is a 401; a bad token or a non-admin
/// role is a 403.
async fn require_admin(
    State(state): State<AuthRouteState>,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let claims = match extract_bearer(header).and_then(|token| state.keys.verify(token)) {
        Ok(claims) => claims,
        Err(e) => return auth_error(&e).into_response(),
    };
    if claims.role != Role::Admin {
        return auth_error(&AuthError::Forbidden).into_response();
    }

    next.run(request).await
}

pub fn auth_routes(state: AuthRouteState) -> Router {
    let admin = Router::new()
        .route("/api/auth/users", get(list_users))
        .route("/api/auth/users/{id}", patch(update_user).delete(delete_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .merge(admin)
        .with_state(state)
}
