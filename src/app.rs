use crate::clients::{AuthClient, FederationClient, PostClient, UserClient};
use crate::config::Config;
use crate::credential_store::CredentialStore;
use crate::error::Result;
use crate::feed::FeedAggregator;
use crate::models::Post;
use crate::mutation::MutationController;
use crate::resolver::IdentityResolver;
use crate::session::SessionManager;
use crate::transport::{HttpTransport, Transport};
use std::sync::Arc;

/// Every component wired around one session.
pub struct App {
    pub session: Arc<SessionManager>,
    pub auth: AuthClient,
    pub users: UserClient,
    pub posts: PostClient,
    pub federation: FederationClient,
    pub feed: Arc<FeedAggregator>,
    pub mutations: MutationController,
    pub resolver: IdentityResolver,
}

impl App {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        feed_page_size: u32,
    ) -> Self {
        let session = Arc::new(SessionManager::new(transport, store));
        let auth = AuthClient::new(session.clone());
        let users = UserClient::new(session.clone());
        let posts = PostClient::new(session.clone());
        let federation = FederationClient::new(session.clone());
        let feed = Arc::new(FeedAggregator::new(
            posts.clone(),
            federation.clone(),
            feed_page_size,
        ));
        let mutations = MutationController::new(posts.clone(), users.clone(), feed.clone());
        let resolver = IdentityResolver::new(federation.clone(), feed.clone());

        Self {
            session,
            auth,
            users,
            posts,
            federation,
            feed,
            mutations,
            resolver,
        }
    }

    /// Real HTTP transport from configuration.
    pub fn connect(cfg: &Config, store: Arc<dyn CredentialStore>) -> Self {
        let transport = Arc::new(HttpTransport::new(
            cfg.api_url.clone(),
            cfg.request_timeout_ms,
        ));
        Self::new(transport, store, cfg.feed_page_size)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.state().is_authenticated()
    }

    /// Look a post up in a freshly loaded feed, which keeps its provenance,
    /// then fall back to the local endpoint. An expired session ends the
    /// lookup; any other feed failure is logged before the fallback.
    pub async fn find_post(&self, post_id: &str) -> Result<Post> {
        match self.feed.load_initial().await {
            Ok(snapshot) => {
                if let Some(post) = snapshot.get(post_id) {
                    return Ok(post.clone());
                }
            }
            Err(e) if e.is_auth_expired() => return Err(e),
            Err(e) => {
                log::warn!("⚠️ [app] feed unavailable ({e}), fetching {post_id} directly");
            }
        }
        self.posts.get(post_id).await
    }
}
