//! REST surface for broadcast control.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use super::engine::DispatchEngine;
use crate::error::DispatchError;

/// Shared state for dispatch routes.
#[derive(Clone)]
pub struct DispatchRouteState {
    pub engine: Arc<DispatchEngine>,
}

/// A recipient entry. Clients send either a bare chat ID or the group
/// object they got from the groups endpoint; entries without an ID are
/// dropped rather than rejected.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GroupRef {
    Id(String),
    Object { id: Option<String> },
}

impl GroupRef {
    fn into_id(self) -> Option<String> {
        match self {
            GroupRef::Id(id) => Some(id),
            GroupRef::Object { id } => id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    #[serde(default)]
    groups: Vec<GroupRef>,
    /// Seconds between deliveries. Clamped to at least one.
    #[serde(default, alias = "intervalSec")]
    interval_secs: Option<u64>,
}

/// POST /api/dispatch/start
async fn start_dispatch(
    State(state): State<DispatchRouteState>,
    Json(req): Json<StartRequest>,
) -> impl IntoResponse {
    let groups: Vec<String> = req
        .groups
        .into_iter()
        .filter_map(GroupRef::into_id)
        .filter(|id| !id.is_empty())
        .collect();

    match state.engine.start(groups, req.interval_secs).await {
        Ok(()) => {
            let status = state.engine.status().await;
            (
                StatusCode::OK,
                Json(serde_json::json!({ "ok": true, "status": status })),
            )
        }
        Err(e) => {
            let code = match &e {
                DispatchError::InvalidInput(_) | DispatchError::EmptyQueue => {
                    StatusCode::BAD_REQUEST
                }
                DispatchError::AlreadyRunning => StatusCode::CONFLICT,
                DispatchError::ClientInit(_) => StatusCode::BAD_GATEWAY,
                DispatchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                code,
                Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
            )
        }
    }
}

/// POST /api/dispatch/stop
async fn stop_dispatch(State(state): State<DispatchRouteState>) -> impl IntoResponse {
    state.engine.stop().await;
    let status = state.engine.status().await;
    Json(serde_json::json!({ "ok": true, "status": status }))
}

/// GET /api/dispatch/status
async fn dispatch_status(State(state): State<DispatchRouteState>) -> impl IntoResponse {
    let status = state.engine.status().await;
    Json(serde_json::json!({ "ok": true, "status": status }))
}

pub fn dispatch_routes(state: DispatchRouteState) -> Router {
    Router::new()
        .route("/api/dispatch/start", post(start_dispatch))
        .route("/api/dispatch/stop", post(stop_dispatch))
        .route("/api/dispatch/status", get(dispatch_status))
        .with_state(state)
}
