//! Error types for wa-blast.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Gateway error: {0}")]
    Client(#[from] ClientError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// WhatsApp gateway client errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Gateway session init failed: {0}")]
    SessionInit(String),

    #[error("Delivery to {recipient} failed: {reason}")]
    SendFailed { recipient: String, reason: String },

    #[error("Gateway request failed: {0}")]
    Http(String),

    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),
}

/// Broadcast lifecycle errors surfaced by `DispatchEngine::start`.
///
/// Per-recipient delivery failures never appear here: the tick loop logs and
/// counts them, then moves on to the next queued item.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("A broadcast is already running")]
    AlreadyRunning,

    #[error("Nothing to send: no sendable campaign cards matched")]
    EmptyQueue,

    #[error("Messaging client failed to initialize: {0}")]
    ClientInit(#[source] ClientError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Authentication and authorization errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password must be at least 6 characters and contain a letter and a digit")]
    WeakPassword,

    #[error("Missing or malformed Authorization header")]
    TokenMissing,

    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("Token issuing failed: {0}")]
    TokenIssue(String),

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Password hashing failed: {0}")]
    Hash(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
