//! Persistence layer — libSQL-backed storage for campaigns, cards, and users.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{CampaignStore, UserStore};
