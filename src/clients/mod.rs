//! Typed request builders for each server resource. Clients hold no state
//! beyond the shared session and never keep what they return.

pub mod auth;
pub mod federation;
pub mod post;
pub mod user;

pub use auth::AuthClient;
pub use federation::FederationClient;
pub use post::PostClient;
pub use user::UserClient;
