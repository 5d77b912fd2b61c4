//! WA Blast — campaign broadcast service for WhatsApp groups.

pub mod auth;
pub mod campaigns;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod store;
pub mod wa;
