use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use wa_blast::auth::{AuthRouteState, TokenKeys, auth_routes};
use wa_blast::campaigns::{CampaignRouteState, campaign_routes};
use wa_blast::config::{GatewayConfig, ServiceConfig};
use wa_blast::dispatch::{DispatchEngine, DispatchRouteState, dispatch_routes};
use wa_blast::store::{CampaignStore, LibSqlBackend, UserStore};
use wa_blast::wa::{GatewayClient, Messenger, WaRouteState, wa_routes};

/// Request bodies carry base64 data URLs for card images, so the default
/// 2 MB limit is far too small.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("  export WA_BLAST_JWT_SECRET=<at least 16 characters>");
        std::process::exit(1);
    });
    let gateway_config = GatewayConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("  export WA_GATEWAY_URL=http://localhost:3000");
        std::process::exit(1);
    });

    eprintln!("📣 WA Blast v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api", config.port);
    eprintln!("   Gateway: {} (session: {})", gateway_config.base_url, gateway_config.session);

    // ── Database ─────────────────────────────────────────────────────────
    let db_path = config.db_path.clone();
    let backend = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", db_path, e);
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", db_path);

    let campaign_store: Arc<dyn CampaignStore> = backend.clone();
    let user_store: Arc<dyn UserStore> = backend.clone();

    // ── Messaging gateway and dispatch engine ────────────────────────────
    let messenger: Arc<dyn Messenger> = Arc::new(GatewayClient::new(gateway_config));
    let engine = Arc::new(DispatchEngine::new(
        Arc::clone(&campaign_store),
        Arc::clone(&messenger),
    ));

    let keys = TokenKeys::new(&config.jwt_secret);

    // ── HTTP surface ─────────────────────────────────────────────────────
    let app = Router::new()
        .route(
            "/health",
            get(|| async { Json(serde_json::json!({"status": "ok"})) }),
        )
        .merge(campaign_routes(CampaignRouteState {
            store: Arc::clone(&campaign_store),
        }))
        .merge(auth_routes(AuthRouteState {
            users: user_store,
            keys,
        }))
        .merge(wa_routes(WaRouteState {
            messenger: Arc::clone(&messenger),
        }))
        .merge(dispatch_routes(DispatchRouteState {
            engine: Arc::clone(&engine),
        }))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "HTTP server started");

    let shutdown_engine = Arc::clone(&engine);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            eprintln!("\nShutting down");
            shutdown_engine.stop().await;
        })
        .await?;

    Ok(())
}
