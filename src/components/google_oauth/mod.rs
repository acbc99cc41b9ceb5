//! OAuth2 authorization-code flow against Google, with the resulting token
//! bundle kept in the server-side session.

pub mod client_secrets;
pub mod completion;

pub use client_secrets::ClientSecrets;
pub use completion::popup_page;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::components::session::{SessionStore, TokenBundle};
use crate::config::Config;
use crate::error::{config_error, token_exchange_error, AppResult};

/// Response body of `GET /auth/status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,
}

/// Token endpoint response; every field is optional so a partial answer is
/// reported as a failed exchange rather than a decode error
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

/// Drives the login flow and owns the token bundle stored in each session
pub struct AuthSessionManager {
    store: Arc<dyn SessionStore>,
    client: Client,
    credentials_path: PathBuf,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl AuthSessionManager {
    pub fn new(config: &Config, store: Arc<dyn SessionStore>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            store,
            client,
            credentials_path: config.credentials_path.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
        })
    }

    /// Start a login: remember a fresh anti-forgery nonce in the session and
    /// return the consent-screen URL to redirect to
    pub async fn begin_login(&self, session_id: &str) -> AppResult<Url> {
        let secrets = ClientSecrets::load(&self.credentials_path).await?;

        let state = URL_SAFE_NO_PAD.encode(rand::random::<[u8; 24]>());

        let mut url = Url::parse(&secrets.auth_uri)
            .map_err(|e| config_error(&format!("Invalid auth_uri in credentials file: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &secrets.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", &state)
            .append_pair("access_type", "offline")
            .append_pair("include_granted_scopes", "true")
            // Without a fresh consent Google omits the refresh token on repeat logins
            .append_pair("prompt", "consent");

        let mut session = self.store.load(session_id).await?;
        session.pending_state = Some(state);
        self.store.save(session_id, &session).await?;

        info!("Login started for session {}", short_id(session_id));
        Ok(url)
    }

    /// Finish a login from the provider's redirect back to us
    pub async fn handle_callback(&self, session_id: &str, callback_url: &Url) -> AppResult<TokenBundle> {
        let mut session = self.store.load(session_id).await?;

        // The nonce is single-use whatever happens next
        let pending = session.pending_state.take();
        if pending.is_some() {
            self.store.save(session_id, &session).await?;
        }

        let params: HashMap<String, String> = callback_url.query_pairs().into_owned().collect();

        if let Some(provider_error) = params.get("error") {
            warn!("Provider refused authorization: {}", provider_error);
            return Err(token_exchange_error(&format!(
                "authorization denied by provider: {}",
                provider_error
            )));
        }

        let expected = pending.ok_or_else(|| {
            warn!("Callback for session {} without a pending login", short_id(session_id));
            token_exchange_error("no login in progress for this session")
        })?;

        match params.get("state") {
            Some(state) if *state == expected => {}
            _ => {
                warn!("State mismatch on callback for session {}", short_id(session_id));
                return Err(token_exchange_error("state mismatch"));
            }
        }

        let code = params
            .get("code")
            .filter(|code| !code.is_empty())
            .ok_or_else(|| token_exchange_error("no authorization code in callback"))?;

        let secrets = ClientSecrets::load(&self.credentials_path).await?;
        let bundle = self.exchange_code(&secrets, code).await?;

        session.token = Some(bundle.clone());
        self.store.save(session_id, &session).await?;

        info!("Session {} authenticated", short_id(session_id));
        Ok(bundle)
    }

    /// Exchange an authorization code for a complete token bundle
    async fn exchange_code(&self, secrets: &ClientSecrets, code: &str) -> AppResult<TokenBundle> {
        let response = self
            .client
            .post(&secrets.token_uri)
            .form(&[
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| token_exchange_error(&format!("token endpoint unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(token_exchange_error(&format!(
                "HTTP {} - {}",
                status, error_body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| token_exchange_error(&format!("unreadable token response: {}", e)))?;

        let access_token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| token_exchange_error("token response missing 'access_token'"))?;
        let refresh_token = token
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| token_exchange_error("token response missing 'refresh_token'"))?;

        let scopes: BTreeSet<String> = match token.scope {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => self.scopes.iter().cloned().collect(),
        };

        Ok(TokenBundle {
            access_token,
            refresh_token,
            token_uri: secrets.token_uri.clone(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            scopes,
        })
    }

    /// Token bundle stored in the session, if it is complete
    pub async fn current_credentials(&self, session_id: &str) -> AppResult<Option<TokenBundle>> {
        let session = self.store.load(session_id).await?;
        Ok(session.credentials().cloned())
    }

    /// Forget the session's credentials; safe to call repeatedly
    pub async fn logout(&self, session_id: &str) -> AppResult<()> {
        let mut session = self.store.load(session_id).await?;
        if session.is_empty() {
            return Ok(());
        }

        session.token = None;
        session.pending_state = None;
        self.store.save(session_id, &session).await?;

        info!("Session {} logged out", short_id(session_id));
        Ok(())
    }

    pub async fn status(&self, session_id: &str) -> AppResult<AuthStatus> {
        Ok(AuthStatus {
            authenticated: self.current_credentials(session_id).await?.is_some(),
        })
    }
}

/// Enough of a session id to correlate log lines without leaking it
fn short_id(session_id: &str) -> &str {
    session_id.get(..8).unwrap_or(session_id)
}
