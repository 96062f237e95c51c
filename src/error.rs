//! Error taxonomy shared by every component of the client core.
//!
//! Each operation has exactly one terminal error path per failure class.
//! Only the mutation controller recovers locally (rollback); everything
//! else is handed to the caller for presentation.

use thiserror::Error;

use crate::mutation::MutationKind;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Transport unreachable, timed out, or the body could not be read.
    #[error("network error: {0}")]
    Network(String),

    /// The credential could not be refreshed; the session is gone.
    #[error("session expired, please log in again")]
    AuthExpired,

    /// Non-2xx answer (or unusable body) from a valid session.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Local precondition failure; never reaches the network.
    #[error("invalid input: {0}")]
    Validation(String),

    /// One of the feed sources failed, so no partial feed is produced.
    #[error("failed to load feed: {0}")]
    FeedLoad(#[source] Box<ClientError>),

    /// Handle resolution failed as a whole.
    #[error("failed to resolve '{handle}': {reason}")]
    Resolution { handle: String, reason: String },

    /// A mutation of the same kind is still pending for this target.
    #[error("{kind} already in progress for {target}")]
    MutationInProgress { kind: MutationKind, target: String },
}

impl ClientError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn feed_load(source: ClientError) -> Self {
        Self::FeedLoad(Box::new(source))
    }

    /// True when the session was torn down, even if wrapped by a feed failure.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::AuthExpired => true,
            Self::FeedLoad(inner) => inner.is_auth_expired(),
            _ => false,
        }
    }

    /// HTTP status carried by a server error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::FeedLoad(inner) => inner.status(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_expired_is_visible_through_feed_load() {
        let err = ClientError::feed_load(ClientError::AuthExpired);
        assert!(err.is_auth_expired());
        assert!(!ClientError::Network("down".into()).is_auth_expired());
    }

    #[test]
    fn status_is_reported_for_server_errors() {
        let err = ClientError::feed_load(ClientError::Server {
            status: 503,
            message: "maintenance".into(),
        });
        assert_eq!(err.status(), Some(503));
        assert_eq!(ClientError::AuthExpired.status(), None);
    }

    #[test]
    fn mutation_in_progress_names_kind_and_target() {
        let err = ClientError::MutationInProgress {
            kind: MutationKind::Like,
            target: "p1".into(),
        };
        assert_eq!(err.to_string(), "like already in progress for p1");
    }
}
