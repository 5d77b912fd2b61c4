//! User accounts: registration, login, tokens, and the admin guard.

pub mod model;
pub mod routes;
pub mod token;

pub use model::{Role, User};
pub use routes::{AuthRouteState, auth_routes};
pub use token::TokenKeys;
