//! Claroz - federated social feed client core
//!
//! This library holds the session and feed synchronization core of the
//! Claroz client: everything between a UI intent and the REST server.
//!
//! ## Architecture
//!
//! Leaves first:
//! - **credential_store**: durable single-slot bearer token storage
//! - **session**: attaches the credential, refreshes once on 401, replays once
//! - **clients**: typed builders for users, posts, federation and auth
//! - **feed**: merges local and federated posts into one sorted, deduplicated snapshot
//! - **mutation**: optimistic like/comment/follow with commit or rollback
//! - **resolver**: federation handle -> canonical identity -> feed insertion
//!
//! All work is cooperative: state is only touched between await points and
//! every change is a whole-value replace.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -- login --email me@example.com
//! cargo run -- feed --watch
//! ```

pub mod app;
pub mod clients;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod feed;
pub mod models;
pub mod mutation;
pub mod resolver;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use app::App;
pub use config::{CliArgs, Config};
pub use error::{ClientError, Result};
pub use feed::{FeedAggregator, FeedSnapshot};
pub use models::{Comment, Credential, FederatedIdentity, Post, Provenance, User};
pub use mutation::{MutationController, MutationEvent, MutationKind, MutationPhase};
pub use resolver::IdentityResolver;
pub use session::{SessionManager, SessionState};
