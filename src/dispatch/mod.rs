//! Broadcast dispatch: queue construction, pacing, and run control.

pub mod composer;
pub mod engine;
pub mod routes;

pub use engine::{DEFAULT_SEND_INTERVAL_SECS, DispatchEngine, DispatchStatus, QueueItem};
pub use routes::{DispatchRouteState, dispatch_routes};
