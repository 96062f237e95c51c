use crate::error::Result;
use crate::models::{Post, PostQuery, Provenance, User};
use crate::session::SessionManager;
use crate::transport::{segment, Request};
use serde_json::json;
use std::sync::Arc;

/// Remote (federated) profiles and posts. Posts are tagged
/// `Provenance::Federated`.
#[derive(Clone)]
pub struct FederationClient {
    session: Arc<SessionManager>,
}

impl FederationClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Map a handle to the server's record of the remote profile.
    pub async fn resolve(&self, handle: &str) -> Result<User> {
        let request = Request::post("/federation/resolve").json(&json!({ "handle": handle }))?;
        self.session.send(request).await?.decode()
    }

    pub async fn sync(&self, did: &str) -> Result<User> {
        let request = Request::post("/federation/sync").json(&json!({ "did": did }))?;
        self.session.send(request).await?.decode()
    }

    pub async fn profile(&self, did: &str) -> Result<User> {
        let path = format!("/federation/profile/{}", segment(did));
        self.session.send(Request::get(path)).await?.decode()
    }

    /// Federated posts for one identity, or for everything the user follows
    /// when `did` is `None`.
    pub async fn posts(&self, did: Option<&str>, query: &PostQuery) -> Result<Vec<Post>> {
        let path = match did {
            Some(did) => format!("/federation/posts/{}", segment(did)),
            None => "/federation/posts".to_string(),
        };
        let request = Request::get(path).query(query.pairs());
        let posts: Vec<Post> = self.session.send(request).await?.decode()?;
        log::debug!(
            "[federation] fetched {} posts for {}",
            posts.len(),
            did.unwrap_or("followed identities")
        );
        Ok(posts
            .into_iter()
            .map(|p| p.with_provenance(Provenance::Federated))
            .collect())
    }
}
