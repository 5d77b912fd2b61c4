//! WhatsApp messaging — client abstraction, HTTP gateway implementation,
//! and the recipient directory endpoint.

pub mod client;
pub mod gateway;
pub mod routes;

pub use client::{GroupInfo, Messenger};
pub use gateway::GatewayClient;
pub use routes::{WaRouteState, wa_routes};
