use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Credentials needed to call the calendar API on a user's behalf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: BTreeSet<String>,
}

impl TokenBundle {
    /// All five token fields are present and non-empty
    pub fn is_complete(&self) -> bool {
        [
            &self.access_token,
            &self.refresh_token,
            &self.token_uri,
            &self.client_id,
            &self.client_secret,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

/// Server-side state for one browser session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The only place a token bundle is ever stored
    #[serde(default)]
    pub token: Option<TokenBundle>,
    /// Anti-forgery nonce issued at login, consumed by the callback
    #[serde(default)]
    pub pending_state: Option<String>,
}

/// Where a session is in the login flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    PendingCallback,
    Authenticated,
}

impl Session {
    pub fn credentials(&self) -> Option<&TokenBundle> {
        self.token.as_ref().filter(|bundle| bundle.is_complete())
    }

    pub fn auth_state(&self) -> AuthState {
        if self.credentials().is_some() {
            AuthState::Authenticated
        } else if self.pending_state.is_some() {
            AuthState::PendingCallback
        } else {
            AuthState::Unauthenticated
        }
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.pending_state.is_none()
    }
}

#[cfg(test)]
pub(crate) fn sample_bundle() -> TokenBundle {
    TokenBundle {
        access_token: "ya29.access".to_string(),
        refresh_token: "1//refresh".to_string(),
        token_uri: "https://oauth2.googleapis.com/token".to_string(),
        client_id: "client-id.apps.googleusercontent.com".to_string(),
        client_secret: "client-secret".to_string(),
        scopes: ["https://www.googleapis.com/auth/calendar".to_string()]
            .into_iter()
            .collect(),
    }
}
