use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque bearer token. Expiry is decided by the server and never tracked here.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

// Never print the token itself.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({} chars)", self.0.len())
    }
}

/// Which feed source a post came from. Fixed at fetch time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Provenance {
    #[default]
    Local,
    Federated,
}

/// Who wrote a post or comment, in the form the feed needs to address them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AuthorRef {
    Local(String),
    Federated(String),
}

/// User summary embedded in posts, comments and follower lists.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub did: Option<String>,
    #[serde(default, alias = "federation_type")]
    pub federation_type: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Author {
    pub fn is_remote(&self) -> bool {
        self.federation_type.as_deref() == Some("remote")
    }

    pub fn author_ref(&self) -> AuthorRef {
        match self.did.as_deref() {
            Some(did) if self.is_remote() && !did.is_empty() => {
                AuthorRef::Federated(did.to_string())
            }
            _ => AuthorRef::Local(self.id.clone()),
        }
    }

    /// Username, with the federated handle appended for remote authors.
    pub fn display_name(&self) -> String {
        match (&self.handle, self.is_remote()) {
            (Some(handle), true) => format!("{} ({handle})", self.username),
            _ => self.username.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    #[serde(default, alias = "post_id")]
    pub post_id: String,
    #[serde(default)]
    pub user: Author,
    pub content: String,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    #[serde(default, alias = "author")]
    pub user: Author,
    #[serde(default, alias = "caption")]
    pub content: String,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "likes_count")]
    pub likes_count: u64,
    #[serde(default, alias = "is_liked")]
    pub is_liked: bool,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(skip)]
    provenance: Provenance,
}

impl Post {
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn is_federated(&self) -> bool {
        self.provenance == Provenance::Federated
    }

    pub fn author_ref(&self) -> AuthorRef {
        self.user.author_ref()
    }

    /// Only resource clients and the feed decide where a post came from.
    pub(crate) fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Flag and count flipped together.
    pub fn with_like_toggled(&self) -> Self {
        let mut next = self.clone();
        if self.is_liked {
            next.is_liked = false;
            next.likes_count = self.likes_count.saturating_sub(1);
        } else {
            next.is_liked = true;
            next.likes_count = self.likes_count.saturating_add(1);
        }
        next
    }
}

/// Full profile as returned by the user and federation endpoints.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "full_name")]
    pub full_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub did: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default, alias = "federation_type")]
    pub federation_type: String,
    #[serde(default)]
    pub followers: Vec<Author>,
    #[serde(default)]
    pub following: Vec<Author>,
}

impl User {
    pub fn is_followed_by(&self, user_id: &str) -> bool {
        self.followers.iter().any(|f| f.id == user_id)
    }
}

/// Canonical remote identity produced by the resolver.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FederatedIdentity {
    pub did: String,
    pub handle: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

// --- Wire payloads ----------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub user: Option<User>,
}

/// Filter accepted by the post listing endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub user_id: Option<String>,
}

impl PostQuery {
    pub fn page(page: u32, page_size: u32) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
            user_id: None,
        }
    }

    pub(crate) fn pairs(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Some(p) = self.page {
            out.push(("page".to_string(), p.to_string()));
        }
        if let Some(s) = self.page_size {
            out.push(("pageSize".to_string(), s.to_string()));
        }
        if let Some(u) = &self.user_id {
            out.push(("userId".to_string(), u.clone()));
        }
        out
    }
}
