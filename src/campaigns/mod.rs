//! Campaigns and the product cards they broadcast.

pub mod model;
pub mod routes;

pub use model::{Campaign, Card, Gender, SendableCampaign};
pub use routes::{CampaignRouteState, campaign_routes};
