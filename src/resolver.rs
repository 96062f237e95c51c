//! Federation handle resolution.
//!
//! A handle either resolves to a complete identity (canonical `did:` plus
//! handle) or fails as a whole with `Resolution`. Feeding the result into
//! the aggregator happens strictly after resolution completes.

use crate::clients::FederationClient;
use crate::error::{ClientError, Result};
use crate::feed::{FeedAggregator, FeedSnapshot};
use crate::models::{FederatedIdentity, PostQuery, User};
use futures::future::join;
use std::sync::Arc;

const MIN_HANDLE_LEN: usize = 3;

/// Trim, drop one leading `@`, lowercase, and check the character set.
pub fn normalize_handle(raw: &str) -> std::result::Result<String, String> {
    let trimmed = raw.trim();
    let handle = trimmed.strip_prefix('@').unwrap_or(trimmed).to_ascii_lowercase();
    if handle.chars().count() < MIN_HANDLE_LEN {
        return Err(format!("handle must be at least {MIN_HANDLE_LEN} characters"));
    }
    if let Some(bad) = handle
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':')))
    {
        return Err(format!("handle contains invalid character '{bad}'"));
    }
    if handle.chars().all(|c| c == '.') {
        return Err("handle must contain a name".to_string());
    }
    Ok(handle)
}

fn identity_from_profile(profile: User) -> std::result::Result<FederatedIdentity, String> {
    if !profile.did.starts_with("did:") || profile.did.len() <= "did:".len() {
        return Err("response did not include a canonical identifier".to_string());
    }
    if profile.handle.trim().is_empty() {
        return Err("response did not include a handle".to_string());
    }
    let non_empty = |s: String| if s.trim().is_empty() { None } else { Some(s) };
    Ok(FederatedIdentity {
        did: profile.did,
        handle: profile.handle,
        display_name: non_empty(profile.full_name),
        avatar: non_empty(profile.avatar),
    })
}

pub struct IdentityResolver {
    federation: FederationClient,
    feed: Arc<FeedAggregator>,
}

impl IdentityResolver {
    pub fn new(federation: FederationClient, feed: Arc<FeedAggregator>) -> Self {
        Self { federation, feed }
    }

    pub async fn resolve(&self, handle: &str) -> Result<FederatedIdentity> {
        let failed = |reason: String| ClientError::Resolution {
            handle: handle.trim().to_string(),
            reason,
        };

        let normalized = normalize_handle(handle).map_err(failed)?;
        log::info!("🔎 [resolver] resolving {normalized}");

        let profile = match self.federation.resolve(&normalized).await {
            Ok(profile) => profile,
            // The session is gone, not the handle.
            Err(ClientError::AuthExpired) => return Err(ClientError::AuthExpired),
            Err(e) => return Err(failed(e.to_string())),
        };

        let identity = identity_from_profile(profile).map_err(failed)?;
        log::info!("✅ [resolver] {} -> {}", identity.handle, identity.did);
        Ok(identity)
    }

    /// Resolve, then merge that identity's posts into the feed.
    pub async fn follow_handle(&self, handle: &str) -> Result<(FederatedIdentity, FeedSnapshot)> {
        let identity = self.resolve(handle).await?;
        let snapshot = self.feed.insert_resolved_identity(&identity).await?;
        Ok((identity, snapshot))
    }

    /// Ask the server to re-sync a remote profile, then pull the refreshed
    /// profile and posts together and reconcile them with the feed.
    pub async fn sync_identity(
        &self,
        identity: &FederatedIdentity,
    ) -> Result<(FederatedIdentity, FeedSnapshot)> {
        self.federation.sync(&identity.did).await?;

        let everything = PostQuery::default();
        let (profile, posts) = join(
            self.federation.profile(&identity.did),
            self.federation.posts(Some(&identity.did), &everything),
        )
        .await;
        let posts = posts?;
        let refreshed = identity_from_profile(profile?).map_err(|reason| {
            ClientError::Resolution {
                handle: identity.handle.clone(),
                reason,
            }
        })?;

        log::info!("🔁 [resolver] synced {} ({} posts)", refreshed.handle, posts.len());
        Ok((refreshed, self.feed.reconcile_posts(posts)))
    }
}
