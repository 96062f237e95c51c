//! Login, registration and logout. Auth endpoints are called without a
//! credential and never trigger a refresh.
use crate::error::{ClientError, Result};
use crate::models::{AuthResponse, Credential, LoginRequest, RegisterRequest};
use crate::session::SessionManager;
use crate::transport::Request;
use std::sync::Arc;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone)]
pub struct AuthClient {
    session: Arc<SessionManager>,
}

impl AuthClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ClientError::validation("email and password are required"));
        }
        let body = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let request = Request::post("/auth/login").json(&body)?;
        self.authenticate(request).await
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<AuthResponse> {
        if username.trim().is_empty() {
            return Err(ClientError::validation("username is required"));
        }
        if !email.contains('@') {
            return Err(ClientError::validation("a valid email is required"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ClientError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let body = RegisterRequest {
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
            full_name: full_name.trim().to_string(),
        };
        let request = Request::post("/auth/register").json(&body)?;
        self.authenticate(request).await
    }

    pub fn logout(&self) {
        self.session.state().clear();
        log::info!("[auth] logged out");
    }

    async fn authenticate(&self, request: Request) -> Result<AuthResponse> {
        let label = request.label();
        let response: AuthResponse = self.session.send_anonymous(request).await?.decode()?;
        let credential = Credential::new(response.token.clone());
        if credential.is_empty() {
            return Err(ClientError::Server {
                status: 200,
                message: format!("{label} returned no token"),
            });
        }
        self.session.state().establish(credential);
        log::info!("✅ [auth] session established via {label}");
        Ok(response)
    }
}
