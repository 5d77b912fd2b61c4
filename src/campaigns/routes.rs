//! REST endpoints for campaigns and their cards.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use uuid::Uuid;

use super::model::{Campaign, Card, CreateCampaign, CreateCard, UpdateCampaign, UpdateCard};
use crate::error::StoreError;
use crate::store::CampaignStore;

/// Shared state for campaign routes.
#[derive(Clone)]
pub struct CampaignRouteState {
    pub store: Arc<dyn CampaignStore>,
}

fn store_error(e: &StoreError) -> (StatusCode, Json<serde_json::Value>) {
    let code = match e {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::Constraint(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, Json(serde_json::json!({ "error": e.to_string() })))
}

/// POST /api/campaigns
async fn create_campaign(
    State(state): State<CampaignRouteState>,
    Json(req): Json<CreateCampaign>,
) -> impl IntoResponse {
    let title = req.title.trim();
    if title.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Title is required"})),
        );
    }

    let campaign = Campaign::new(title, req.send);
    match state.store.create_campaign(&campaign).await {
        Ok(()) => (StatusCode::CREATED, Json(serde_json::json!(campaign))),
        Err(e) => store_error(&e),
    }
}

/// GET /api/campaigns
async fn list_campaigns(State(state): State<CampaignRouteState>) -> impl IntoResponse {
    match state.store.list_campaigns().await {
        Ok(campaigns) => (StatusCode::OK, Json(serde_json::json!(campaigns))),
        Err(e) => store_error(&e),
    }
}

/// GET /api/campaigns/{campaign_id}
async fn get_campaign(
    State(state): State<CampaignRouteState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let campaign_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid campaign ID"})),
            );
        }
    };

    match state.store.get_campaign(campaign_id).await {
        Ok(campaign) => (StatusCode::OK, Json(serde_json::json!(campaign))),
        Err(e) => store_error(&e),
    }
}

/// PUT /api/campaigns/{campaign_id}
async fn update_campaign(
    State(state): State<CampaignRouteState>,
    Path(id): Path<String>,
    Json(mut req): Json<UpdateCampaign>,
) -> impl IntoResponse {
    let campaign_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid campaign ID"})),
            );
        }
    };

    if let Some(title) = &req.title {
        let title = title.trim();
        if title.is_empty() {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Title is required"})),
            );
        }
        req.title = Some(title.to_string());
    }

    if let Err(e) = state.store.update_campaign(campaign_id, &req).await {
        return store_error(&e);
    }
    // Re-read so the response carries the cards, like the other reads.
    match state.store.get_campaign(campaign_id).await {
        Ok(campaign) => (StatusCode::OK, Json(serde_json::json!(campaign))),
        Err(e) => store_error(&e),
    }
}

/// DELETE /api/campaigns/{campaign_id}
async fn delete_campaign(
    State(state): State<CampaignRouteState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let campaign_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid campaign ID"})),
            );
        }
    };

    match state.store.delete_campaign(campaign_id).await {
        Ok(deleted_cards) => (
            StatusCode::OK,
            Json(serde_json::json!({ "ok": true, "deleted_cards": deleted_cards })),
        ),
        Err(e) => store_error(&e),
    }
}

/// POST /api/campaigns/{campaign_id}/cards
async fn add_card(
    State(state): State<CampaignRouteState>,
    Path(id): Path<String>,
    Json(req): Json<CreateCard>,
) -> impl IntoResponse {
    let campaign_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid campaign ID"})),
            );
        }
    };

    if req.image.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Image is required"})),
        );
    }
    if req.price.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Price is required"})),
        );
    }

    let card = Card::new(
        campaign_id,
        req.name,
        req.gender,
        req.price,
        req.image,
        req.message,
        req.send,
    );
    match state.store.add_card(&card).await {
        Ok(()) => (StatusCode::CREATED, Json(serde_json::json!(card))),
        Err(e) => store_error(&e),
    }
}

/// PUT /api/campaigns/{campaign_id}/cards/{card_id}
async fn update_card(
    State(state): State<CampaignRouteState>,
    Path((campaign_id, card_id)): Path<(String, String)>,
    Json(req): Json<UpdateCard>,
) -> impl IntoResponse {
    if Uuid::parse_str(&campaign_id).is_err() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Invalid campaign ID"})),
        );
    }
    let card_id = match Uuid::parse_str(&card_id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid card ID"})),
            );
        }
    };

    match state.store.update_card(card_id, &req).await {
        Ok(card) => (StatusCode::OK, Json(serde_json::json!(card))),
        Err(e) => store_error(&e),
    }
}

/// DELETE /api/campaigns/{campaign_id}/cards/{card_id}
async fn delete_card(
    State(state): State<CampaignRouteState>,
    Path((campaign_id, card_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let campaign_id = match Uuid::parse_str(&campaign_id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid campaign ID"})),
            );
        }
    };
    let card_id = match Uuid::parse_str(&card_id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid card ID"})),
            );
        }
    };

    match state.store.delete_card(campaign_id, card_id).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"ok": true}))),
        Err(e) => store_error(&e),
    }
}

pub fn campaign_routes(state: CampaignRouteState) -> Router {
    Router::new()
        .route("/api/campaigns", post(create_campaign).get(list_campaigns))
        .route(
            "/api/campaigns/{campaign_id}",
            get(get_campaign)
                .put(update_campaign)
                .delete(delete_campaign),
        )
        .route("/api/campaigns/{campaign_id}/cards", post(add_card))
        .route(
            "/api/campaigns/{campaign_id}/cards/{card_id}",
            put(update_card).delete(delete_card),
        )
        .with_state(state)
}
