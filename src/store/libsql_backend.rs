//! libSQL backend — async implementation of the store traits.
//!
//! Supports local file and in-memory databases. Migrations run on open.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::model::{Role, UpdateUser, User};
use crate::campaigns::model::{
    Campaign, Card, Gender, SendableCampaign, UpdateCampaign, UpdateCard,
};
use crate::error::StoreError;
use crate::store::migrations;
use crate::store::traits::{CampaignStore, UserStore};

const CAMPAIGN_COLUMNS: &str = "id, title, send, created_at, updated_at";
const CARD_COLUMNS: &str =
    "id, campaign_id, name, gender, price, image, message, send, created_at, updated_at";
const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("Failed to create database directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// A campaign row without its cards, or None.
    async fn campaign_row(&self, id: Uuid) -> Result<Option<Campaign>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("campaign_row: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row_to_campaign(&row)
                    .map_err(|e| StoreError::Query(format!("campaign_row parse: {e}")))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("campaign_row: {e}"))),
        }
    }

    /// All cards of one campaign, in creation order.
    async fn campaign_cards(&self, campaign_id: Uuid) -> Result<Vec<Card>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {CARD_COLUMNS} FROM cards WHERE campaign_id = ?1 ORDER BY created_at ASC"
                ),
                params![campaign_id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("campaign_cards: {e}")))?;

        let mut cards = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_card(&row) {
                Ok(card) => cards.push(card),
                Err(e) => tracing::warn!("Skipping card row: {e}"),
            }
        }
        Ok(cards)
    }

    async fn card_row(&self, id: Uuid) -> Result<Option<Card>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("card_row: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row_to_card(&row).map_err(|e| StoreError::Query(format!("card_row parse: {e}")))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("card_row: {e}"))),
        }
    }

    async fn user_row(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("user_row: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row_to_user(&row).map_err(|e| StoreError::Query(format!("user_row parse: {e}")))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("user_row: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn row_to_campaign(row: &libsql::Row) -> Result<Campaign, libsql::Error> {
    let id_str: String = row.get(0)?;
    let title: String = row.get(1)?;
    let send: i64 = row.get(2)?;
    let created_str: String = row.get(3)?;
    let updated_str: String = row.get(4)?;

    Ok(Campaign {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        title,
        send: send != 0,
        cards: Vec::new(),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

fn row_to_card(row: &libsql::Row) -> Result<Card, libsql::Error> {
    let id_str: String = row.get(0)?;
    let campaign_str: String = row.get(1)?;
    let name: String = row.get(2)?;
    let gender_str: String = row.get(3)?;
    let price: String = row.get(4)?;
    let image: String = row.get(5)?;
    let message: String = row.get(6)?;
    let send: i64 = row.get(7)?;
    let created_str: String = row.get(8)?;
    let updated_str: String = row.get(9)?;

    Ok(Card {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        campaign_id: Uuid::parse_str(&campaign_str).unwrap_or_else(|_| Uuid::nil()),
        name,
        gender: gender_str.parse().unwrap_or(Gender::Either),
        price,
        image,
        message,
        send: send != 0,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

fn row_to_user(row: &libsql::Row) -> Result<User, libsql::Error> {
    let id_str: String = row.get(0)?;
    let name: String = row.get(1)?;
    let email: String = row.get(2)?;
    let password_hash: String = row.get(3)?;
    let role_str: String = row.get(4)?;
    let created_str: String = row.get(5)?;
    let updated_str: String = row.get(6)?;

    Ok(User {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        name,
        email,
        password_hash,
        role: role_str.parse().unwrap_or(Role::User),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// True if the error is a UNIQUE constraint violation.
fn is_unique_violation(e: &libsql::Error) -> bool {
    e.to_string().contains("UNIQUE constraint failed")
}

// ── CampaignStore ───────────────────────────────────────────────────

#[async_trait]
impl CampaignStore for LibSqlBackend {
    async fn snapshot_sendable(&self) -> Result<Vec<SendableCampaign>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE send = 1 ORDER BY created_at ASC"
                ),
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("snapshot_sendable: {e}")))?;

        let mut campaigns = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_campaign(&row) {
                Ok(campaign) => campaigns.push(campaign),
                Err(e) => tracing::warn!("Skipping campaign row: {e}"),
            }
        }

        let mut snapshot = Vec::with_capacity(campaigns.len());
        for campaign in campaigns {
            let cards = self.campaign_cards(campaign.id).await?;
            snapshot.push(SendableCampaign {
                title: campaign.title,
                cards,
            });
        }
        Ok(snapshot)
    }

    async fn create_campaign(&self, campaign: &Campaign) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO campaigns (id, title, send, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    campaign.id.to_string(),
                    campaign.title.clone(),
                    campaign.send as i64,
                    campaign.created_at.to_rfc3339(),
                    campaign.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("create_campaign: {e}")))?;

        debug!(campaign_id = %campaign.id, title = %campaign.title, "Campaign created");
        Ok(())
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY created_at DESC"),
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("list_campaigns: {e}")))?;

        let mut campaigns = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_campaign(&row) {
                Ok(campaign) => campaigns.push(campaign),
                Err(e) => tracing::warn!("Skipping campaign row: {e}"),
            }
        }

        for campaign in &mut campaigns {
            campaign.cards = self.campaign_cards(campaign.id).await?;
        }
        Ok(campaigns)
    }

    async fn get_campaign(&self, id: Uuid) -> Result<Campaign, StoreError> {
        let Some(mut campaign) = self.campaign_row(id).await? else {
            return Err(StoreError::NotFound {
                entity: "campaign",
                id: id.to_string(),
            });
        };
        campaign.cards = self.campaign_cards(id).await?;
        Ok(campaign)
    }

    async fn update_campaign(
        &self,
        id: Uuid,
        update: &UpdateCampaign,
    ) -> Result<Campaign, StoreError> {
        let Some(mut campaign) = self.campaign_row(id).await? else {
            return Err(StoreError::NotFound {
                entity: "campaign",
                id: id.to_string(),
            });
        };

        if let Some(title) = &update.title {
            campaign.title = title.clone();
        }
        if let Some(send) = update.send {
            campaign.send = send;
        }
        campaign.updated_at = Utc::now();

        self.conn()
            .execute(
                "UPDATE campaigns SET title = ?1, send = ?2, updated_at = ?3 WHERE id = ?4",
                params![
                    campaign.title.clone(),
                    campaign.send as i64,
                    campaign.updated_at.to_rfc3339(),
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("update_campaign: {e}")))?;

        debug!(campaign_id = %id, "Campaign updated");
        Ok(campaign)
    }

    async fn delete_campaign(&self, id: Uuid) -> Result<usize, StoreError> {
        if self.campaign_row(id).await?.is_none() {
            return Err(StoreError::NotFound {
                entity: "campaign",
                id: id.to_string(),
            });
        }

        let deleted_cards = self
            .conn()
            .execute(
                "DELETE FROM cards WHERE campaign_id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("delete_campaign cards: {e}")))?;

        self.conn()
            .execute("DELETE FROM campaigns WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(|e| StoreError::Query(format!("delete_campaign: {e}")))?;

        info!(campaign_id = %id, deleted_cards, "Campaign deleted");
        Ok(deleted_cards as usize)
    }

    async fn add_card(&self, card: &Card) -> Result<(), StoreError> {
        if self.campaign_row(card.campaign_id).await?.is_none() {
            return Err(StoreError::NotFound {
                entity: "campaign",
                id: card.campaign_id.to_string(),
            });
        }

        self.conn()
            .execute(
                "INSERT INTO cards (id, campaign_id, name, gender, price, image, message, send, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    card.id.to_string(),
                    card.campaign_id.to_string(),
                    card.name.clone(),
                    card.gender.to_string(),
                    card.price.clone(),
                    card.image.clone(),
                    card.message.clone(),
                    card.send as i64,
                    card.created_at.to_rfc3339(),
                    card.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("add_card: {e}")))?;

        debug!(card_id = %card.id, campaign_id = %card.campaign_id, "Card added");
        Ok(())
    }

    async fn update_card(&self, card_id: Uuid, update: &UpdateCard) -> Result<Card, StoreError> {
        let Some(mut card) = self.card_row(card_id).await? else {
            return Err(StoreError::NotFound {
                entity: "card",
                id: card_id.to_string(),
            });
        };

        if let Some(name) = &update.name {
            card.name = name.clone();
        }
        if let Some(gender) = update.gender {
            card.gender = gender;
        }
        if let Some(price) = &update.price {
            card.price = price.clone();
        }
        if let Some(image) = &update.image {
            card.image = image.clone();
        }
        if let Some(message) = &update.message {
            card.message = message.clone();
        }
        if let Some(send) = update.send {
            card.send = send;
        }
        card.updated_at = Utc::now();

        self.conn()
            .execute(
                "UPDATE cards SET name = ?1, gender = ?2, price = ?3, image = ?4, message = ?5, send = ?6, updated_at = ?7 WHERE id = ?8",
                params![
                    card.name.clone(),
                    card.gender.to_string(),
                    card.price.clone(),
                    card.image.clone(),
                    card.message.clone(),
                    card.send as i64,
                    card.updated_at.to_rfc3339(),
                    card_id.to_string(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("update_card: {e}")))?;

        debug!(card_id = %card_id, "Card updated");
        Ok(card)
    }

    async fn delete_card(&self, campaign_id: Uuid, card_id: Uuid) -> Result<(), StoreError> {
        if self.campaign_row(campaign_id).await?.is_none() {
            return Err(StoreError::NotFound {
                entity: "campaign",
                id: campaign_id.to_string(),
            });
        }

        self.conn()
            .execute(
                "DELETE FROM cards WHERE id = ?1 AND campaign_id = ?2",
                params![card_id.to_string(), campaign_id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("delete_card: {e}")))?;

        debug!(card_id = %card_id, campaign_id = %campaign_id, "Card deleted");
        Ok(())
    }
}

// ── UserStore ───────────────────────────────────────────────────────

#[async_trait]
impl UserStore for LibSqlBackend {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id.to_string(),
                    user.name.clone(),
                    user.email.clone(),
                    user.password_hash.clone(),
                    user.role.to_string(),
                    user.created_at.to_rfc3339(),
                    user.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Constraint(format!("email already registered: {}", user.email))
                } else {
                    StoreError::Query(format!("create_user: {e}"))
                }
            })?;

        info!(user_id = %user.id, email = %user.email, "User created");
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
            )
            .await
            .map_err(|e| StoreError::Query(format!("find_user_by_email: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row_to_user(&row)
                    .map_err(|e| StoreError::Query(format!("find_user_by_email parse: {e}")))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("find_user_by_email: {e}"))),
        }
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"),
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("list_users: {e}")))?;

        let mut users = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_user(&row) {
                Ok(user) => users.push(user),
                Err(e) => tracing::warn!("Skipping user row: {e}"),
            }
        }
        Ok(users)
    }

    async fn update_user(&self, id: Uuid, update: &UpdateUser) -> Result<User, StoreError> {
        let Some(mut user) = self.user_row(id).await? else {
            return Err(StoreError::NotFound {
                entity: "user",
                id: id.to_string(),
            });
        };

        if let Some(name) = &update.name {
            user.name = name.clone();
        }
        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        user.updated_at = Utc::now();

        self.conn()
            .execute(
                "UPDATE users SET name = ?1, email = ?2, role = ?3, updated_at = ?4 WHERE id = ?5",
                params![
                    user.name.clone(),
                    user.email.clone(),
                    user.role.to_string(),
                    user.updated_at.to_rfc3339(),
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Constraint(format!("email already registered: {}", user.email))
                } else {
                    StoreError::Query(format!("update_user: {e}"))
                }
            })?;

        debug!(user_id = %id, "User updated");
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let affected = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(|e| StoreError::Query(format!("delete_user: {e}")))?;

        if affected == 0 {
            return Err(StoreError::NotFound {
                entity: "user",
                id: id.to_string(),
            });
        }

        info!(user_id = %id, "User deleted");
        Ok(())
    }
}
