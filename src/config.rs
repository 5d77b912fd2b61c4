//! Configuration types.

use secrecy::SecretString;

use crate::error::{ConfigError, Result};

/// Service configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// TCP port the HTTP API listens on.
    pub port: u16,
    /// Path to the sqlite database file.
    pub db_path: String,
    /// Secret used to sign session tokens.
    pub jwt_secret: SecretString,
}

impl ServiceConfig {
    /// Build config from environment variables.
    ///
    /// `WA_BLAST_JWT_SECRET` is required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        let port: u16 = std::env::var("WA_BLAST_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3200);

        let db_path =
            std::env::var("WA_BLAST_DB_PATH").unwrap_or_else(|_| "wa_blast.db".to_string());

        let jwt_secret = std::env::var("WA_BLAST_JWT_SECRET")
            .map_err(|_| ConfigError::MissingEnvVar("WA_BLAST_JWT_SECRET".to_string()))?;
        if jwt_secret.len() < 16 {
            return Err(ConfigError::InvalidValue {
                key: "WA_BLAST_JWT_SECRET".to_string(),
                message: "must be at least 16 characters".to_string(),
            }
            .into());
        }

        Ok(Self {
            port,
            db_path,
            jwt_secret: SecretString::from(jwt_secret),
        })
    }
}

/// WhatsApp gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway HTTP API.
    pub base_url: String,
    /// Named session on the gateway, one per connected phone.
    pub session: String,
    /// Optional API key sent as `X-Api-Key`.
    pub api_key: Option<SecretString>,
}

impl GatewayConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("WA_GATEWAY_URL")
            .map_err(|_| ConfigError::MissingEnvVar("WA_GATEWAY_URL".to_string()))?;

        let session = std::env::var("WA_GATEWAY_SESSION").unwrap_or_else(|_| "default".to_string());

        let api_key = std::env::var("WA_GATEWAY_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .map(SecretString::from);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            api_key,
        })
    }
}
