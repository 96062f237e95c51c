//! Optimistic mutations against the displayed feed.
//!
//! Each mutation moves `Pending -> Committed | RolledBack` and every
//! transition is broadcast, so a presentation layer can follow along
//! without the controller knowing about it.
//!
//! The local state change happens before the first await. A like-toggle,
//! follow or delete for a target that already has one pending is rejected
//! with `MutationInProgress` and changes nothing.

use crate::clients::{PostClient, UserClient};
use crate::error::{ClientError, Result};
use crate::feed::FeedAggregator;
use crate::models::Post;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Like,
    Comment,
    Follow,
    Publish,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MutationKind::Like => "like",
            MutationKind::Comment => "comment",
            MutationKind::Follow => "follow",
            MutationKind::Publish => "publish",
            MutationKind::Delete => "delete",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationPhase {
    Pending,
    Committed,
    RolledBack,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationEvent {
    pub kind: MutationKind,
    /// Post id, user id, or `"new"` for a post being published.
    pub target: String,
    pub phase: MutationPhase,
}

type PendingSet = Mutex<HashSet<(MutationKind, String)>>;

/// Holds a pending slot for as long as the mutation future lives, including
/// when it is dropped mid-flight.
struct PendingGuard<'a> {
    pending: &'a PendingSet,
    key: (MutationKind, String),
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

pub struct MutationController {
    posts: PostClient,
    users: UserClient,
    feed: Arc<FeedAggregator>,
    pending: PendingSet,
    events: broadcast::Sender<MutationEvent>,
}

impl MutationController {
    pub fn new(posts: PostClient, users: UserClient, feed: Arc<FeedAggregator>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            posts,
            users,
            feed,
            pending: Mutex::new(HashSet::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.events.subscribe()
    }

    pub fn is_pending(&self, kind: MutationKind, target: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(kind, target.to_string()))
    }

    fn begin(&self, kind: MutationKind, target: &str) -> Result<PendingGuard<'_>> {
        let key = (kind, target.to_string());
        let inserted = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        if !inserted {
            log::debug!("[mutation] {kind} on {target} rejected, one already pending");
            return Err(ClientError::MutationInProgress {
                kind,
                target: target.to_string(),
            });
        }
        Ok(PendingGuard {
            pending: &self.pending,
            key,
        })
    }

    fn emit(&self, kind: MutationKind, target: &str, phase: MutationPhase) {
        // No subscribers is fine.
        let _ = self.events.send(MutationEvent {
            kind,
            target: target.to_string(),
            phase,
        });
    }

    /// Flip the liked flag and count now, then confirm with the server.
    /// On failure both fields go back to their pre-call values.
    pub async fn toggle_like(&self, post: &Post) -> Result<Post> {
        let _guard = self.begin(MutationKind::Like, &post.id)?;

        let before = self.feed.post(&post.id).unwrap_or_else(|| post.clone());
        let optimistic = before.with_like_toggled();
        self.feed.update_post(&post.id, |p| {
            p.is_liked = optimistic.is_liked;
            p.likes_count = optimistic.likes_count;
        });
        self.emit(MutationKind::Like, &post.id, MutationPhase::Pending);

        let outcome = if before.is_liked {
            self.posts.unlike(&post.id).await
        } else {
            self.posts.like(&post.id).await
        };

        match outcome {
            Ok(()) => {
                self.emit(MutationKind::Like, &post.id, MutationPhase::Committed);
                log::debug!(
                    "[mutation] like on {} committed (liked: {})",
                    post.id,
                    optimistic.is_liked
                );
                Ok(self.feed.post(&post.id).unwrap_or(optimistic))
            }
            Err(e) => {
                // Leave the entry alone if a refresh already replaced it.
                self.feed.update_post(&post.id, |p| {
                    if p.is_liked == optimistic.is_liked && p.likes_count == optimistic.likes_count
                    {
                        p.is_liked = before.is_liked;
                        p.likes_count = before.likes_count;
                    }
                });
                self.emit(MutationKind::Like, &post.id, MutationPhase::RolledBack);
                log::warn!("⚠️ [mutation] like on {} rolled back: {e}", post.id);
                Err(e)
            }
        }
    }

    /// Post a comment, then refetch the post so ids and timestamps come from
    /// the server. Nothing is inserted locally beforehand.
    pub async fn submit_comment(&self, post: &Post, text: &str) -> Result<Post> {
        let content = text.trim();
        if content.is_empty() {
            return Err(ClientError::validation("comment cannot be empty"));
        }

        self.emit(MutationKind::Comment, &post.id, MutationPhase::Pending);
        if let Err(e) = self.posts.add_comment(&post.id, content).await {
            self.emit(MutationKind::Comment, &post.id, MutationPhase::RolledBack);
            log::warn!("⚠️ [mutation] comment on {} failed: {e}", post.id);
            return Err(e);
        }
        self.emit(MutationKind::Comment, &post.id, MutationPhase::Committed);

        let current = self.feed.post(&post.id).unwrap_or_else(|| post.clone());
        self.feed.reload_post(&current).await
    }

    /// Returns the new following flag.
    pub async fn toggle_follow(&self, user_id: &str, currently_following: bool) -> Result<bool> {
        let _guard = self.begin(MutationKind::Follow, user_id)?;
        self.emit(MutationKind::Follow, user_id, MutationPhase::Pending);

        let outcome = if currently_following {
            self.users.unfollow(user_id).await
        } else {
            self.users.follow(user_id).await
        };

        match outcome {
            Ok(()) => {
                self.emit(MutationKind::Follow, user_id, MutationPhase::Committed);
                Ok(!currently_following)
            }
            Err(e) => {
                self.emit(MutationKind::Follow, user_id, MutationPhase::RolledBack);
                log::warn!("⚠️ [mutation] follow toggle on {user_id} failed: {e}");
                Err(e)
            }
        }
    }

    pub async fn create_post(&self, content: &str) -> Result<Post> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ClientError::validation("post content cannot be empty"));
        }

        self.emit(MutationKind::Publish, "new", MutationPhase::Pending);
        match self.posts.create(content).await {
            Ok(post) => {
                self.feed.add_post(post.clone());
                self.emit(MutationKind::Publish, "new", MutationPhase::Committed);
                log::info!("📝 [mutation] published {}", post.id);
                Ok(post)
            }
            Err(e) => {
                self.emit(MutationKind::Publish, "new", MutationPhase::RolledBack);
                Err(e)
            }
        }
    }

    /// Removed from the feed only once the server confirms.
    pub async fn delete_post(&self, post_id: &str) -> Result<()> {
        let _guard = self.begin(MutationKind::Delete, post_id)?;
        self.emit(MutationKind::Delete, post_id, MutationPhase::Pending);

        match self.posts.delete(post_id).await {
            Ok(()) => {
                self.feed.remove_post(post_id);
                self.emit(MutationKind::Delete, post_id, MutationPhase::Committed);
                Ok(())
            }
            Err(e) => {
                self.emit(MutationKind::Delete, post_id, MutationPhase::RolledBack);
                Err(e)
            }
        }
    }
}
