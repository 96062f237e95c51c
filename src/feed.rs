//! Feed aggregation: local and federated posts merged into one timeline.
//!
//! A [`FeedSnapshot`] is always sorted newest first (stable, so ties keep
//! their concatenation order) and never holds two posts with the same id.
//! Both sources are fetched concurrently and the whole load fails if either
//! one does; there is no partial feed.
//!
//! TODO: offer partial degradation (show the source that succeeded plus a
//! per-source error) behind an explicit opt-in, keeping all-or-nothing as
//! the default.

use crate::clients::{FederationClient, PostClient};
use crate::error::{ClientError, Result};
use crate::models::{AuthorRef, FederatedIdentity, Post, PostQuery, Provenance};
use futures::future::{join, join_all};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeedSnapshot {
    posts: Vec<Post>,
}

impl FeedSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local first, then federated, then one sort-and-dedupe pass.
    pub fn from_sources(local: Vec<Post>, federated: Vec<Post>) -> Self {
        Self::default().merged_with(local.into_iter().chain(federated)).0
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn into_posts(self) -> Vec<Post> {
        self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn get(&self, post_id: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == post_id)
    }

    pub fn contains(&self, post_id: &str) -> bool {
        self.get(post_id).is_some()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.posts.iter().map(|p| p.id.as_str()).collect()
    }

    /// Append `incoming` after the current posts, drop ids already present
    /// (the existing entry wins), and re-sort. Returns the new snapshot and
    /// how many posts were actually added.
    pub fn merged_with(&self, incoming: impl IntoIterator<Item = Post>) -> (Self, usize) {
        let mut seen: HashSet<String> = self.posts.iter().map(|p| p.id.clone()).collect();
        let mut posts = self.posts.clone();
        let before = posts.len();
        for post in incoming {
            if seen.insert(post.id.clone()) {
                posts.push(post);
            }
        }
        let added = posts.len() - before;
        // Vec::sort_by is stable.
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        (Self { posts }, added)
    }

    /// Replace one post. `None` when the id is not in the snapshot.
    /// The id and provenance of the existing entry are kept, and the entry
    /// only moves if its timestamp changed.
    pub fn patched(&self, post_id: &str, updated: Post) -> Option<Self> {
        let idx = self.posts.iter().position(|p| p.id == post_id)?;
        let mut posts = self.posts.clone();
        let existing = &posts[idx];
        let mut replacement = updated.with_provenance(existing.provenance());
        replacement.id = existing.id.clone();
        posts[idx] = replacement;
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Some(Self { posts })
    }

    pub fn without(&self, post_id: &str) -> Self {
        Self {
            posts: self
                .posts
                .iter()
                .filter(|p| p.id != post_id)
                .cloned()
                .collect(),
        }
    }
}

#[derive(Default)]
struct FeedState {
    snapshot: FeedSnapshot,
    next_page: u32,
    exhausted: bool,
    identities: Vec<FederatedIdentity>,
}

pub struct FeedAggregator {
    posts: PostClient,
    federation: FederationClient,
    page_size: u32,
    state: Mutex<FeedState>,
}

impl FeedAggregator {
    pub fn new(posts: PostClient, federation: FederationClient, page_size: u32) -> Self {
        Self {
            posts,
            federation,
            page_size: page_size.max(1),
            state: Mutex::new(FeedState {
                next_page: 1,
                ..FeedState::default()
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut FeedState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.with_state(|s| s.snapshot.clone())
    }

    pub fn post(&self, post_id: &str) -> Option<Post> {
        self.with_state(|s| s.snapshot.get(post_id).cloned())
    }

    pub fn is_exhausted(&self) -> bool {
        self.with_state(|s| s.exhausted)
    }

    pub fn tracked_identities(&self) -> Vec<FederatedIdentity> {
        self.with_state(|s| s.identities.clone())
    }

    /// First page of both sources; replaces everything the feed knew.
    pub async fn load_initial(&self) -> Result<FeedSnapshot> {
        let (local, federated) = self.fetch_page(1).await.map_err(ClientError::feed_load)?;
        let (n_local, n_fed) = (local.len(), federated.len());
        let snapshot = FeedSnapshot::from_sources(local, federated);
        log::info!(
            "📰 [feed] loaded {} posts ({} local, {} federated)",
            snapshot.len(),
            n_local,
            n_fed
        );
        self.with_state(|s| {
            *s = FeedState {
                snapshot: snapshot.clone(),
                next_page: 2,
                exhausted: false,
                identities: Vec::new(),
            };
        });
        Ok(snapshot)
    }

    /// Re-fetch the first page plus the posts of every identity inserted
    /// this session, all at once. Any failure leaves the feed untouched.
    pub async fn refresh(&self) -> Result<FeedSnapshot> {
        let identities = self.tracked_identities();
        let everything = PostQuery::default();
        let first_page = self.fetch_page(1);
        let tracked = join_all(
            identities
                .iter()
                .map(|id| self.federation.posts(Some(&id.did), &everything)),
        );
        let (first_page, tracked) = join(first_page, tracked).await;

        let (local, mut federated) = first_page.map_err(ClientError::feed_load)?;
        for posts in tracked {
            federated.extend(posts.map_err(ClientError::feed_load)?);
        }

        let fetched = FeedSnapshot::from_sources(local, federated);
        Ok(self.with_state(|s| {
            // Identities inserted while this refresh was in flight keep the
            // posts they brought in.
            let late: HashSet<&str> = s
                .identities
                .iter()
                .map(|i| i.did.as_str())
                .filter(|did| !identities.iter().any(|i| i.did == *did))
                .collect();
            let kept = s.snapshot.posts().iter().filter(|p| match p.author_ref() {
                AuthorRef::Federated(did) => late.contains(did.as_str()),
                AuthorRef::Local(_) => false,
            });
            let (snapshot, _) = fetched.merged_with(kept.cloned());
            log::info!(
                "🔄 [feed] refreshed: {} posts ({} tracked identities)",
                snapshot.len(),
                s.identities.len()
            );
            s.snapshot = snapshot;
            s.next_page = 2;
            s.exhausted = false;
            s.snapshot.clone()
        }))
    }

    /// Next page of both sources appended through the same sort-and-dedupe
    /// pass. Federated pages are not guaranteed to be server-ordered.
    pub async fn load_more(&self) -> Result<FeedSnapshot> {
        let (page, exhausted) = self.with_state(|s| (s.next_page.max(1), s.exhausted));
        if exhausted {
            return Ok(self.snapshot());
        }

        let (local, federated) = self.fetch_page(page).await.map_err(ClientError::feed_load)?;
        Ok(self.with_state(|s| {
            let (snapshot, added) = s.snapshot.merged_with(local.into_iter().chain(federated));
            s.snapshot = snapshot;
            s.next_page = s.next_page.max(page + 1);
            s.exhausted = added == 0;
            log::info!("📜 [feed] page {page} added {added} posts");
            s.snapshot.clone()
        }))
    }

    /// Merge one newly resolved identity's posts into the current feed.
    pub async fn insert_resolved_identity(
        &self,
        identity: &FederatedIdentity,
    ) -> Result<FeedSnapshot> {
        let posts = self
            .federation
            .posts(Some(&identity.did), &PostQuery::default())
            .await
            .map_err(ClientError::feed_load)?;

        Ok(self.with_state(|s| {
            let (snapshot, added) = s.snapshot.merged_with(posts);
            s.snapshot = snapshot;
            if !s.identities.iter().any(|i| i.did == identity.did) {
                s.identities.push(identity.clone());
            }
            log::info!("➕ [feed] {} added {} posts", identity.handle, added);
            s.snapshot.clone()
        }))
    }

    /// Replace one post's fields. No-op when the id is not displayed.
    pub fn apply_post_patch(&self, post_id: &str, updated: Post) -> FeedSnapshot {
        self.with_state(|s| {
            match s.snapshot.patched(post_id, updated) {
                Some(snapshot) => s.snapshot = snapshot,
                None => log::debug!("[feed] patch for {post_id} ignored, not in feed"),
            }
            s.snapshot.clone()
        })
    }

    /// Read-modify-write of one displayed post under the feed lock.
    pub(crate) fn update_post(&self, post_id: &str, f: impl FnOnce(&mut Post)) -> Option<Post> {
        self.with_state(|s| {
            let mut post = s.snapshot.get(post_id)?.clone();
            f(&mut post);
            let snapshot = s.snapshot.patched(post_id, post.clone())?;
            s.snapshot = snapshot;
            Some(post)
        })
    }

    /// Refetch a single post from the source it came from and patch it in.
    pub async fn reload_post(&self, post: &Post) -> Result<Post> {
        let fresh = match post.provenance() {
            Provenance::Local => self.posts.get(&post.id).await?,
            Provenance::Federated => {
                let did = match post.author_ref() {
                    AuthorRef::Federated(did) => Some(did),
                    AuthorRef::Local(_) => None,
                };
                self.federation
                    .posts(did.as_deref(), &PostQuery::default())
                    .await?
                    .into_iter()
                    .find(|p| p.id == post.id)
                    .ok_or_else(|| ClientError::Server {
                        status: 404,
                        message: format!("post {} is no longer available", post.id),
                    })?
            }
        };
        self.apply_post_patch(&post.id, fresh.clone());
        Ok(self
            .post(&post.id)
            .unwrap_or_else(|| fresh.with_provenance(post.provenance())))
    }

    /// Patch posts already shown and merge the rest.
    pub fn reconcile_posts(&self, posts: Vec<Post>) -> FeedSnapshot {
        self.with_state(|s| {
            let mut fresh = Vec::new();
            for post in posts {
                let id = post.id.clone();
                match s.snapshot.patched(&id, post.clone()) {
                    Some(snapshot) => s.snapshot = snapshot,
                    None => fresh.push(post),
                }
            }
            s.snapshot = s.snapshot.merged_with(fresh).0;
            s.snapshot.clone()
        })
    }

    pub fn add_post(&self, post: Post) -> FeedSnapshot {
        self.with_state(|s| {
            s.snapshot = s.snapshot.merged_with(std::iter::once(post)).0;
            s.snapshot.clone()
        })
    }

    pub fn remove_post(&self, post_id: &str) -> FeedSnapshot {
        self.with_state(|s| {
            s.snapshot = s.snapshot.without(post_id);
            s.snapshot.clone()
        })
    }

    /// Both sources for one page, issued together. Both are awaited even if
    /// one fails early so an in-flight credential refresh is never dropped.
    async fn fetch_page(&self, page: u32) -> Result<(Vec<Post>, Vec<Post>)> {
        let query = PostQuery::page(page, self.page_size);
        let (local, federated) =
            join(self.posts.list(&query), self.federation.posts(None, &query)).await;
        if let Err(e) = &local {
            log::warn!("⚠️ [feed] local posts failed: {e}");
        }
        if let Err(e) = &federated {
            log::warn!("⚠️ [feed] federated posts failed: {e}");
        }
        Ok((local?, federated?))
    }
}
