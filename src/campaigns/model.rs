//! Campaign and card data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audience tag on a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    /// Men's product line.
    Male,
    /// Women's product line.
    Female,
    /// Not gendered.
    Either,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Male => write!(f, "male"),
            Self::Female => write!(f, "female"),
            Self::Either => write!(f, "either"),
        }
    }
}

impl std::str::FromStr for Gender {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "either" => Ok(Self::Either),
            _ => Err(format!("Unknown gender: {}", s)),
        }
    }
}

/// One product card inside a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    /// Unique card ID.
    pub id: Uuid,
    /// Campaign this card belongs to.
    pub campaign_id: Uuid,
    /// Product name. May be empty; the caption falls back to other fields.
    pub name: String,
    /// Audience tag.
    pub gender: Gender,
    /// Price as entered by the operator (decimal-as-text, no currency symbol).
    pub price: String,
    /// Transport-ready image payload: an http(s) URL or a base64 data URL.
    pub image: String,
    /// Caption override. When non-blank it replaces the generated caption.
    pub message: String,
    /// Whether this card participates in a broadcast.
    pub send: bool,
    /// When the card was created.
    pub created_at: DateTime<Utc>,
    /// When the card was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Create a new card for a campaign.
    pub fn new(
        campaign_id: Uuid,
        name: impl Into<String>,
        gender: Gender,
        price: impl Into<String>,
        image: impl Into<String>,
        message: impl Into<String>,
        send: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            name: name.into(),
            gender,
            price: price.into(),
            image: image.into(),
            message: message.into(),
            send,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A named batch of cards broadcast together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique campaign ID.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Whether this campaign participates in a broadcast.
    pub send: bool,
    /// Cards in creation order.
    #[serde(default)]
    pub cards: Vec<Card>,
    /// When the campaign was created.
    pub created_at: DateTime<Utc>,
    /// When the campaign was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Create a new campaign with no cards.
    pub fn new(title: impl Into<String>, send: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            send,
            cards: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A campaign flagged for sending, as captured at broadcast start.
///
/// Cards come through unfiltered; the dispatch engine applies the
/// card-level `send` filter itself.
#[derive(Debug, Clone)]
pub struct SendableCampaign {
    pub title: String,
    pub cards: Vec<Card>,
}

// ── API payloads ────────────────────────────────────────────────────────

/// POST /api/campaigns body.
#[derive(Debug, Deserialize)]
pub struct CreateCampaign {
    pub title: String,
    #[serde(default)]
    pub send: bool,
}

/// PUT /api/campaigns/{id} body. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateCampaign {
    pub title: Option<String>,
    pub send: Option<bool>,
}

/// POST /api/campaigns/{id}/cards body.
#[derive(Debug, Deserialize)]
pub struct CreateCard {
    #[serde(default)]
    pub name: String,
    pub gender: Gender,
    pub price: String,
    pub image: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub send: bool,
}

/// PUT /api/campaigns/{campaign_id}/cards/{card_id} body. Absent fields
/// are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateCard {
    pub name: Option<String>,
    pub gender: Option<Gender>,
    pub price: Option<String>,
    pub image: Option<String>,
    pub message: Option<String>,
    pub send: Option<bool>,
}
