//! Async persistence traits for campaigns and user accounts.
//!
//! The dispatch engine only depends on `CampaignStore::snapshot_sendable`,
//! so tests can swap in a canned in-memory implementation.

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::model::{UpdateUser, User};
use crate::campaigns::model::{Campaign, Card, SendableCampaign, UpdateCampaign, UpdateCard};
use crate::error::StoreError;

/// Campaign and card persistence.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    // ── Broadcast snapshot ──────────────────────────────────────────

    /// Campaigns flagged for sending, in creation order, each carrying all
    /// of its cards in creation order. The card-level `send` filter is the
    /// caller's job.
    async fn snapshot_sendable(&self) -> Result<Vec<SendableCampaign>, StoreError>;

    // ── Campaigns ───────────────────────────────────────────────────

    /// Insert a new campaign.
    async fn create_campaign(&self, campaign: &Campaign) -> Result<(), StoreError>;

    /// All campaigns with their cards, newest campaign first.
    async fn list_campaigns(&self) -> Result<Vec<Campaign>, StoreError>;

    /// Get a campaign with its cards. `NotFound` when missing.
    async fn get_campaign(&self, id: Uuid) -> Result<Campaign, StoreError>;

    /// Apply a partial update. Returns the updated campaign without cards.
    async fn update_campaign(
        &self,
        id: Uuid,
        update: &UpdateCampaign,
    ) -> Result<Campaign, StoreError>;

    /// Delete a campaign and all of its cards. Returns the number of cards
    /// deleted alongside it.
    async fn delete_campaign(&self, id: Uuid) -> Result<usize, StoreError>;

    // ── Cards ───────────────────────────────────────────────────────

    /// Insert a new card. The parent campaign must exist.
    async fn add_card(&self, card: &Card) -> Result<(), StoreError>;

    /// Apply a partial update. Returns the updated card.
    async fn update_card(&self, card_id: Uuid, update: &UpdateCard) -> Result<Card, StoreError>;

    /// Delete one card from a campaign. The campaign must exist; deleting a
    /// card that is already gone is not an error.
    async fn delete_card(&self, campaign_id: Uuid, card_id: Uuid) -> Result<(), StoreError>;
}

/// User account persistence.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with `Constraint` on a duplicate email.
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    /// Look up a user by normalized email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// All users, oldest first.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Apply a partial update. Returns the updated user.
    async fn update_user(&self, id: Uuid, update: &UpdateUser) -> Result<User, StoreError>;

    /// Delete a user. `NotFound` when missing.
    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError>;
}
