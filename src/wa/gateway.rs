//! WhatsApp HTTP gateway client.
//!
//! Talks to a self-hosted gateway (one named session per connected phone)
//! over its REST API: session start, sendText, sendImage, group listing.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio::sync::OnceCell;

use crate::config::GatewayConfig;
use crate::error::ClientError;
use crate::wa::client::{GroupInfo, Messenger};

/// HTTP client for the WhatsApp gateway.
pub struct GatewayClient {
    config: GatewayConfig,
    client: reqwest::Client,
    /// Set once the session handshake has succeeded. `get_or_try_init`
    /// single-flights concurrent initializers and leaves the cell empty on
    /// failure, so a later start can retry.
    session_ready: OnceCell<()>,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            session_ready: OnceCell::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.post(self.api_url(path));
        if let Some(key) = &self.config.api_key {
            req = req.header("X-Api-Key", key.expose_secret());
        }
        req
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.get(self.api_url(path));
        if let Some(key) = &self.config.api_key {
            req = req.header("X-Api-Key", key.expose_secret());
        }
        req
    }

    async fn start_session(&self) -> Result<(), ClientError> {
        let body = serde_json::json!({ "name": self.config.session });

        let resp = self
            .post("/api/sessions/start")
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::SessionInit(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ClientError::SessionInit(format!("{status}: {err}")));
        }

        tracing::info!(session = %self.config.session, "Gateway session started");
        Ok(())
    }
}

/// Build the sendImage request body. The caption key is omitted entirely
/// when there is no caption, so the gateway does not render an empty one.
fn image_body(
    session: &str,
    recipient: &str,
    payload: &str,
    filename: &str,
    caption: Option<&str>,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "session": session,
        "chatId": recipient,
        "file": payload,
        "filename": filename,
    });
    if let Some(caption) = caption {
        body["caption"] = serde_json::Value::String(caption.to_string());
    }
    body
}

/// Map one raw gateway group entry to `GroupInfo`.
///
/// Gateways disagree on the shape: the ID may be a plain string or an
/// object with a `_serialized` field, and the name may live under `name`
/// or `subject`. Entries without a usable ID are dropped.
fn parse_group(value: &serde_json::Value) -> Option<GroupInfo> {
    let id_field = value.get("id")?;
    let id = id_field
        .as_str()
        .map(str::to_string)
        .or_else(|| {
            id_field
                .get("_serialized")
                .and_then(|s| s.as_str())
                .map(str::to_string)
        })?;

    let name = value
        .get("name")
        .or_else(|| value.get("subject"))
        .and_then(|n| n.as_str())
        .unwrap_or("")
        .to_string();

    let participants = value
        .get("participants")
        .and_then(|p| p.as_array())
        .map(|a| a.len())
        .unwrap_or(0);

    Some(GroupInfo {
        id,
        name,
        participants,
    })
}

#[async_trait]
impl Messenger for GatewayClient {
    async fn ensure_ready(&self) -> Result<(), ClientError> {
        self.session_ready
            .get_or_try_init(|| self.start_session())
            .await?;
        Ok(())
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ClientError> {
        let body = serde_json::json!({
            "session": self.config.session,
            "chatId": recipient,
            "text": text,
        });

        let resp = self
            .post("/api/sendText")
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::SendFailed {
                recipient: recipient.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ClientError::SendFailed {
                recipient: recipient.to_string(),
                reason: format!("sendText failed ({status}): {err}"),
            });
        }

        Ok(())
    }

    async fn send_image(
        &self,
        recipient: &str,
        payload: &str,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<(), ClientError> {
        let body = image_body(&self.config.session, recipient, payload, filename, caption);

        let resp = self
            .post("/api/sendImage")
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::SendFailed {
                recipient: recipient.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ClientError::SendFailed {
                recipient: recipient.to_string(),
                reason: format!("sendImage failed ({status}): {err}"),
            });
        }

        Ok(())
    }

    async fn list_groups(&self) -> Result<Vec<GroupInfo>, ClientError> {
        let path = format!("/api/{}/groups", self.config.session);

        let resp = self
            .get(&path)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ClientError::Http(format!(
                "group listing failed ({status}): {err}"
            )));
        }

        let values: Vec<serde_json::Value> = resp
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        Ok(values.iter().filter_map(parse_group).collect())
    }
}
