//! Integration tests for the REST API.
//!
//! Each test spins up an Axum server on a random port backed by an
//! in-memory database and a stub gateway, then exercises the real HTTP
//! contract with reqwest.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::routing::get;
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;

use wa_blast::auth::{AuthRouteState, TokenKeys, auth_routes};
use wa_blast::campaigns::{CampaignRouteState, campaign_routes};
use wa_blast::dispatch::{DispatchEngine, DispatchRouteState, dispatch_routes};
use wa_blast::error::ClientError;
use wa_blast::store::{CampaignStore, LibSqlBackend, UserStore};
use wa_blast::wa::{GroupInfo, Messenger, WaRouteState, wa_routes};

/// Maximum time any test is allowed to run before we consider it hung.
/// Generous because register/login hash passwords with bcrypt.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

const JWT_SECRET: &str = "integration-test-secret-0123456789";

/// Stub gateway for integration tests (no real WhatsApp traffic).
struct StubGateway {
    fail_init: AtomicBool,
    texts: Mutex<Vec<(String, String)>>,
    groups: Vec<GroupInfo>,
}

impl StubGateway {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_init: AtomicBool::new(false),
            texts: Mutex::new(Vec::new()),
            groups: vec![
                GroupInfo {
                    id: "123@g.us".into(),
                    name: "Friends".into(),
                    participants: 12,
                },
                GroupInfo {
                    id: "456@g.us".into(),
                    name: "Customers".into(),
                    participants: 87,
                },
            ],
        })
    }
}

#[async_trait]
impl Messenger for StubGateway {
    async fn ensure_ready(&self) -> Result<(), ClientError> {
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(ClientError::SessionInit("stub gateway down".into()));
        }
        Ok(())
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ClientError> {
        self.texts
            .lock()
            .unwrap()
            .push((recipient.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_image(
        &self,
        recipient: &str,
        _payload: &str,
        _filename: &str,
        caption: Option<&str>,
    ) -> Result<(), ClientError> {
        self.texts
            .lock()
            .unwrap()
            .push((recipient.to_string(), caption.unwrap_or("").to_string()));
        Ok(())
    }

    async fn list_groups(&self) -> Result<Vec<GroupInfo>, ClientError> {
        Ok(self.groups.clone())
    }
}

/// Start the full router on a random port, return (port, gateway stub).
async fn start_server() -> (u16, Arc<StubGateway>) {
    let backend = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let campaign_store: Arc<dyn CampaignStore> = backend.clone();
    let user_store: Arc<dyn UserStore> = backend.clone();

    let gateway = StubGateway::new();
    let messenger: Arc<dyn Messenger> = gateway.clone();
    let engine = Arc::new(DispatchEngine::new(
        Arc::clone(&campaign_store),
        Arc::clone(&messenger),
    ));
    let keys = TokenKeys::new(&SecretString::from(JWT_SECRET));

    let app = Router::new()
        .route(
            "/health",
            get(|| async { Json(serde_json::json!({"status": "ok"})) }),
        )
        .merge(campaign_routes(CampaignRouteState {
            store: campaign_store,
        }))
        .merge(auth_routes(AuthRouteState {
            users: user_store,
            keys,
        }))
        .merge(wa_routes(WaRouteState { messenger }))
        .merge(dispatch_routes(DispatchRouteState { engine }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, gateway)
}

/// Helper: create a campaign over the API, return its ID.
async fn create_campaign(client: &reqwest::Client, port: u16, title: &str) -> String {
    let resp = client
        .post(format!("http://127.0.0.1:{port}/api/campaigns"))
        .json(&serde_json::json!({"title": title, "send": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

/// Helper: add a sendable card to a campaign, return its ID.
async fn add_card(client: &reqwest::Client, port: u16, campaign_id: &str, name: &str) -> String {
    let resp = client
        .post(format!(
            "http://127.0.0.1:{port}/api/campaigns/{campaign_id}/cards"
        ))
        .json(&serde_json::json!({
            "name": name,
            "gender": "either",
            "price": "20",
            "image": "https://example.com/shoes.jpg",
            "send": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

/// Helper: register a user and log in, returning the access token.
async fn register_and_login(
    client: &reqwest::Client,
    port: u16,
    email: &str,
    role: &str,
) -> String {
    let resp = client
        .post(format!("http://127.0.0.1:{port}/api/auth/register"))
        .json(&serde_json::json!({
            "name": "Test Operator",
            "email": email,
            "password": "abc123",
            "role": role
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = client
        .post(format!("http://127.0.0.1:{port}/api/auth/login"))
        .json(&serde_json::json!({"email": email, "password": "abc123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

// ── Health ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    })
    .await
    .expect("test timed out");
}

// ── Campaigns ────────────────────────────────────────────────────────

#[tokio::test]
async fn campaign_crud_roundtrip() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let client = reqwest::Client::new();

        let id = create_campaign(&client, port, "Summer Sale").await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/api/campaigns"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let list: Vec<Value> = resp.json().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["title"], "Summer Sale");

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/api/campaigns/{id}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["id"], id);
        assert!(body["cards"].as_array().unwrap().is_empty());

        let resp = client
            .put(format!("http://127.0.0.1:{port}/api/campaigns/{id}"))
            .json(&serde_json::json!({"title": "  Winter Sale  "}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["title"], "Winter Sale");
        // The send flag was not in the patch, so it is unchanged.
        assert_eq!(body["send"], true);

        let resp = client
            .delete(format!("http://127.0.0.1:{port}/api/campaigns/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/api/campaigns/{id}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn campaign_title_is_required() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let client = reqwest::Client::new();

        for title in ["", "   "] {
            let resp = client
                .post(format!("http://127.0.0.1:{port}/api/campaigns"))
                .json(&serde_json::json!({"title": title}))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 400);
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn campaign_invalid_id_returns_400() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;

        let resp = reqwest::get(format!(
            "http://127.0.0.1:{port}/api/campaigns/not-a-uuid"
        ))
        .await
        .unwrap();
        assert_eq!(resp.status(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn deleting_a_campaign_reports_removed_cards() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let client = reqwest::Client::new();

        let id = create_campaign(&client, port, "Promo").await;
        add_card(&client, port, &id, "Shoes").await;
        add_card(&client, port, &id, "Hat").await;

        let resp = client
            .delete(format!("http://127.0.0.1:{port}/api/campaigns/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["deleted_cards"], 2);
    })
    .await
    .expect("test timed out");
}

// ── Cards ────────────────────────────────────────────────────────────

#[tokio::test]
async fn card_requires_image_and_price() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let client = reqwest::Client::new();

        let id = create_campaign(&client, port, "Promo").await;

        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/campaigns/{id}/cards"))
            .json(&serde_json::json!({"gender": "male", "price": "20", "image": ""}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/campaigns/{id}/cards"))
            .json(&serde_json::json!({"gender": "male", "price": "  ", "image": "abc"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn card_for_unknown_campaign_returns_404() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let client = reqwest::Client::new();

        let fake_id = uuid::Uuid::new_v4();
        let resp = client
            .post(format!(
                "http://127.0.0.1:{port}/api/campaigns/{fake_id}/cards"
            ))
            .json(&serde_json::json!({"gender": "female", "price": "20", "image": "abc"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn card_update_and_delete() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let client = reqwest::Client::new();

        let campaign_id = create_campaign(&client, port, "Promo").await;
        let card_id = add_card(&client, port, &campaign_id, "Shoes").await;

        let resp = client
            .put(format!(
                "http://127.0.0.1:{port}/api/campaigns/{campaign_id}/cards/{card_id}"
            ))
            .json(&serde_json::json!({"name": "Boots", "send": false}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["name"], "Boots");
        assert_eq!(body["send"], false);
        // Untouched fields survive the partial update.
        assert_eq!(body["price"], "20");

        let resp = client
            .delete(format!(
                "http://127.0.0.1:{port}/api/campaigns/{campaign_id}/cards/{card_id}"
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = reqwest::get(format!(
            "http://127.0.0.1:{port}/api/campaigns/{campaign_id}"
        ))
        .await
        .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert!(body["cards"].as_array().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

// ── Accounts ─────────────────────────────────────────────────────────

#[tokio::test]
async fn register_rejects_weak_passwords_and_duplicates() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let client = reqwest::Client::new();

        // No digit.
        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/auth/register"))
            .json(&serde_json::json!({
                "name": "Ana", "email": "ana@example.com", "password": "abcdef"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/auth/register"))
            .json(&serde_json::json!({
                "name": "Ana", "email": "ana@example.com", "password": "abc123"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["role"], "user");
        assert!(body.get("password_hash").is_none());

        // Same email, different case.
        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/auth/register"))
            .json(&serde_json::json!({
                "name": "Ana Again", "email": "ANA@example.com", "password": "abc123"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let client = reqwest::Client::new();

        register_and_login(&client, port, "op@example.com", "user").await;

        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/auth/login"))
            .json(&serde_json::json!({"email": "op@example.com", "password": "wrong1"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);

        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/auth/login"))
            .json(&serde_json::json!({"email": "ghost@example.com", "password": "abc123"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn user_management_requires_an_admin_token() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let client = reqwest::Client::new();

        let admin_token = register_and_login(&client, port, "admin@example.com", "admin").await;
        let user_token = register_and_login(&client, port, "user@example.com", "user").await;

        let url = format!("http://127.0.0.1:{port}/api/auth/users");

        // No token.
        let resp = client.get(&url).send().await.unwrap();
        assert_eq!(resp.status(), 401);

        // Garbage token.
        let resp = client
            .get(&url)
            .header("Authorization", "Bearer not.a.token")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 403);

        // Valid token, wrong role.
        let resp = client
            .get(&url)
            .header("Authorization", format!("Bearer {user_token}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 403);

        // Admin token.
        let resp = client
            .get(&url)
            .header("Authorization", format!("Bearer {admin_token}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let users: Vec<Value> = resp.json().await.unwrap();
        assert_eq!(users.len(), 2);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn admin_can_update_and_delete_users() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let client = reqwest::Client::new();

        let admin_token = register_and_login(&client, port, "admin@example.com", "admin").await;

        let resp = client
            .get(format!("http://127.0.0.1:{port}/api/auth/users"))
            .header("Authorization", format!("Bearer {admin_token}"))
            .send()
            .await
            .unwrap();
        let users: Vec<Value> = resp.json().await.unwrap();
        let target_id = users[0]["id"].as_str().unwrap().to_string();

        let resp = client
            .patch(format!(
                "http://127.0.0.1:{port}/api/auth/users/{target_id}"
            ))
            .header("Authorization", format!("Bearer {admin_token}"))
            .json(&serde_json::json!({"name": "Renamed Operator"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["name"], "Renamed Operator");

        let resp = client
            .delete(format!(
                "http://127.0.0.1:{port}/api/auth/users/{target_id}"
            ))
            .header("Authorization", format!("Bearer {admin_token}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        // Deleting again is a 404.
        let resp = client
            .delete(format!(
                "http://127.0.0.1:{port}/api/auth/users/{target_id}"
            ))
            .header("Authorization", format!("Bearer {admin_token}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

// ── Gateway directory ────────────────────────────────────────────────

#[tokio::test]
async fn groups_endpoint_lists_gateway_groups() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/api/wa/groups"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let groups: Vec<Value> = resp.json().await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0]["id"], "123@g.us");
        assert_eq!(groups[0]["participants"], 12);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn groups_endpoint_maps_gateway_outage_to_502() {
    timeout(TEST_TIMEOUT, async {
        let (port, gateway) = start_server().await;
        gateway.fail_init.store(true, Ordering::SeqCst);

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/api/wa/groups"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 502);
    })
    .await
    .expect("test timed out");
}

// ── Dispatch lifecycle ───────────────────────────────────────────────

#[tokio::test]
async fn dispatch_start_status_stop_lifecycle() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let client = reqwest::Client::new();

        let campaign_id = create_campaign(&client, port, "Promo").await;
        add_card(&client, port, &campaign_id, "Shoes").await;

        // Long interval so nothing is delivered while we inspect state.
        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/dispatch/start"))
            .json(&serde_json::json!({
                "groups": ["123@g.us", {"id": "456@g.us", "name": "Customers"}],
                "interval_secs": 3600
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["status"]["running"], true);
        assert_eq!(body["status"]["queued"], 2);

        // A second start conflicts.
        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/dispatch/start"))
            .json(&serde_json::json!({"groups": ["123@g.us"]}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/api/dispatch/status"))
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"]["running"], true);
        assert_eq!(body["status"]["queued"], 2);

        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/dispatch/stop"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"]["running"], false);
        assert_eq!(body["status"]["queued"], 0);

        // Stop is idempotent.
        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/dispatch/stop"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn dispatch_start_validates_input() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let client = reqwest::Client::new();

        // No groups at all.
        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/dispatch/start"))
            .json(&serde_json::json!({"groups": []}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        // Groups present but nothing sendable in the store.
        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/dispatch/start"))
            .json(&serde_json::json!({"groups": ["123@g.us"]}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().contains("Nothing to send"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn dispatch_start_maps_gateway_outage_to_502() {
    timeout(TEST_TIMEOUT, async {
        let (port, gateway) = start_server().await;
        let client = reqwest::Client::new();

        let campaign_id = create_campaign(&client, port, "Promo").await;
        add_card(&client, port, &campaign_id, "Shoes").await;

        gateway.fail_init.store(true, Ordering::SeqCst);

        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/dispatch/start"))
            .json(&serde_json::json!({"groups": ["123@g.us"]}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 502);

        // Nothing was queued by the failed start.
        let resp = reqwest::get(format!("http://127.0.0.1:{port}/api/dispatch/status"))
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"]["running"], false);
        assert_eq!(body["status"]["queued"], 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn dispatch_delivers_composed_captions() {
    timeout(TEST_TIMEOUT, async {
        let (port, gateway) = start_server().await;
        let client = reqwest::Client::new();

        let campaign_id = create_campaign(&client, port, "Promo").await;
        add_card(&client, port, &campaign_id, "Shoes").await;

        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/dispatch/start"))
            .json(&serde_json::json!({"groups": ["123@g.us"], "interval_secs": 1}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        // One item at a one-second pace: drained within a few seconds.
        let mut drained = false;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let resp = reqwest::get(format!("http://127.0.0.1:{port}/api/dispatch/status"))
                .await
                .unwrap();
            let body: Value = resp.json().await.unwrap();
            if body["status"]["running"] == false {
                assert_eq!(body["status"]["sent"], 1);
                assert_eq!(body["status"]["failed"], 0);
                drained = true;
                break;
            }
        }
        assert!(drained, "run never drained");

        let texts = gateway.texts.lock().unwrap().clone();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].0, "123@g.us");
        assert_eq!(texts[0].1, "Shoes\n\n$20");
    })
    .await
    .expect("test timed out");
}
