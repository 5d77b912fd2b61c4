//! REST endpoint for the recipient directory.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use super::client::Messenger;

/// Shared state for WhatsApp routes.
#[derive(Clone)]
pub struct WaRouteState {
    pub messenger: Arc<dyn Messenger>,
}

/// GET /api/wa/groups
///
/// Brings the gateway session up if needed and returns the groups the
/// connected account can broadcast to.
async fn get_groups(State(state): State<WaRouteState>) -> impl IntoResponse {
    if let Err(e) = state.messenger.ensure_ready().await {
        tracing::error!(error = %e, "Gateway session unavailable for group listing");
        return (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({"error": format!("Gateway unavailable: {e}")})),
        )
            .into_response();
    }

    match state.messenger.list_groups().await {
        Ok(groups) => Json(groups).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list groups");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"error": format!("Could not fetch groups: {e}")})),
            )
                .into_response()
        }
    }
}

/// Build the WhatsApp gateway routes.
pub fn wa_routes(state: WaRouteState) -> Router {
    Router::new()
        .route("/api/wa/groups", get(get_groups))
        .with_state(state)
}
