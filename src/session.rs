//! Session manager: attaches the current credential to every outbound
//! request and performs at most one refresh-and-replay per request.
//!
//! - The credential is read from the store on every attempt, never captured.
//! - Refresh and replay are strictly sequential.
//! - A refresh that finishes after the session was cleared (or replaced by a
//!   new login) is discarded.
//! - A refresh that fails after a concurrent one succeeded replays with the
//!   winner's credential instead of clearing it.
use crate::credential_store::CredentialStore;
use crate::error::{ClientError, Result};
use crate::models::Credential;
use crate::transport::{Request, Response, StatusClass, Transport, AUTHORIZATION};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const REFRESH_PATH: &str = "/auth/refresh";

/// The session as an explicit value: the credential slot plus a generation
/// that changes whenever a login or logout replaces the session wholesale.
pub struct SessionState {
    store: Arc<dyn CredentialStore>,
    generation: AtomicU64,
}

impl SessionState {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            generation: AtomicU64::new(0),
        }
    }

    pub fn credential(&self) -> Option<Credential> {
        self.store.get().filter(|c| !c.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential().is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// New session after login/register.
    pub fn establish(&self, credential: Credential) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.store.set(Some(credential));
    }

    /// Logout.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.store.set(None);
    }

    /// Store a refreshed credential unless the session it belongs to is gone.
    fn replace_if_current(&self, generation: u64, credential: Credential) -> bool {
        if self.generation() != generation || self.credential().is_none() {
            return false;
        }
        self.store.set(Some(credential));
        true
    }

    /// Tear the session down unless a login, logout or another refresh
    /// already replaced the credential that was presented.
    fn clear_if_current(&self, generation: u64, presented: Option<&Credential>) {
        if self.generation() == generation && self.credential().as_ref() == presented {
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.store.set(None);
        }
    }
}

/// Retry bookkeeping threaded through a single `send`, instead of a flag
/// stored on the request itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Attempt {
    refreshed: bool,
}

impl Attempt {
    const FIRST: Attempt = Attempt { refreshed: false };
    const REPLAY: Attempt = Attempt { refreshed: true };
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    token: String,
}

pub struct SessionManager {
    transport: Arc<dyn Transport>,
    state: SessionState,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            transport,
            state: SessionState::new(store),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Send an authenticated request. Returns the successful response
    /// unchanged; any non-2xx answer becomes an error.
    pub async fn send(&self, request: Request) -> Result<Response> {
        let response = self.dispatch(&request, Attempt::FIRST).await?;
        if response.class() != StatusClass::Unauthorized {
            return into_result(response);
        }

        log::info!("🔑 [session] {} unauthorized, refreshing", request.label());
        self.refresh().await?;

        let replay = self.dispatch(&request, Attempt::REPLAY).await?;
        if replay.class() == StatusClass::Unauthorized {
            log::warn!(
                "⚠️ [session] {} still unauthorized after refresh, not retrying",
                request.label()
            );
        }
        into_result(replay)
    }

    /// Send without credential and without refresh (login, register).
    pub async fn send_anonymous(&self, request: Request) -> Result<Response> {
        let response = self.transport.execute(request).await?;
        into_result(response)
    }

    async fn dispatch(&self, request: &Request, attempt: Attempt) -> Result<Response> {
        let mut outbound = request.clone();
        match self.state.credential() {
            Some(c) => outbound.headers.insert(AUTHORIZATION.to_string(), c.bearer()),
            None => outbound.headers.remove(AUTHORIZATION),
        };
        log::debug!(
            "[session] {} (replay: {})",
            request.label(),
            attempt.refreshed
        );
        self.transport.execute(outbound).await
    }

    /// Exactly one refresh call. On any failure the session is torn down.
    async fn refresh(&self) -> Result<()> {
        let generation = self.state.generation();
        let presented = self.state.credential();
        let mut request = Request::post(REFRESH_PATH);
        if let Some(c) = &presented {
            request = request.header(AUTHORIZATION, c.bearer());
        }

        let token = match self.transport.execute(request).await {
            Ok(res) if res.is_success() => res
                .decode::<RefreshResponse>()
                .map(|r| r.token)
                .unwrap_or_default(),
            Ok(res) => {
                log::warn!("⚠️ [session] refresh rejected: http {}", res.status);
                String::new()
            }
            Err(e) => {
                log::warn!("⚠️ [session] refresh failed: {e}");
                String::new()
            }
        };

        let credential = Credential::new(token);
        if credential.is_empty() {
            if self.state.generation() == generation
                && self.state.credential().is_some()
                && self.state.credential() != presented
            {
                // A concurrent refresh won; replay with its credential.
                log::info!("[session] credential refreshed elsewhere, reusing it");
                return Ok(());
            }
            self.state.clear_if_current(generation, presented.as_ref());
            log::error!("❌ [session] credential refresh exhausted, session cleared");
            return Err(ClientError::AuthExpired);
        }

        if !self.state.replace_if_current(generation, credential) {
            log::info!("[session] session changed during refresh, discarding new credential");
            return Err(ClientError::AuthExpired);
        }
        log::info!("✅ [session] credential refreshed");
        Ok(())
    }
}

fn into_result(response: Response) -> Result<Response> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(response.into_server_error())
    }
}
