//! Messaging client abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// A WhatsApp group the connected account can broadcast to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Channel-native group ID (e.g. "1234567890-987654@g.us").
    pub id: String,
    /// Human-readable group name.
    pub name: String,
    /// Number of participants.
    pub participants: usize,
}

/// Messaging client used by the dispatch engine — pure delivery, no
/// queueing or pacing.
///
/// One long-lived instance is shared process-wide behind an `Arc`.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Bring the underlying session up. Idempotent and memoized: concurrent
    /// callers share a single initialization, later callers return
    /// immediately.
    async fn ensure_ready(&self) -> Result<(), ClientError>;

    /// Deliver plain text to one recipient.
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ClientError>;

    /// Deliver an image with an optional caption. `payload` is an http(s)
    /// URL or a base64 data URL, passed through unchanged.
    async fn send_image(
        &self,
        recipient: &str,
        payload: &str,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<(), ClientError>;

    /// Groups the connected account can send to.
    async fn list_groups(&self) -> Result<Vec<GroupInfo>, ClientError>;
}
