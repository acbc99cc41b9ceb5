use serde::Deserialize;
use std::path::Path;
use tracing::error;

use crate::error::{config_error, AppResult};

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client credentials as downloaded from the Google Cloud console
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The descriptor wraps the secrets in a `web` or `installed` section
#[derive(Debug, Deserialize)]
struct SecretsFile {
    web: Option<ClientSecrets>,
    installed: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Read a `credentials.json` descriptor
    pub async fn load(path: &Path) -> AppResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            error!("Credentials file not found at {}: {}", path.display(), e);
            config_error("Google OAuth credentials file not found")
        })?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> AppResult<Self> {
        let file: SecretsFile = serde_json::from_str(content)
            .map_err(|e| config_error(&format!("Invalid Google OAuth credentials file: {}", e)))?;

        let secrets = file
            .web
            .or(file.installed)
            .ok_or_else(|| config_error("Credentials file has no 'web' or 'installed' section"))?;

        if secrets.client_id.trim().is_empty() || secrets.client_secret.trim().is_empty() {
            return Err(config_error("Credentials file is missing client_id or client_secret"));
        }

        Ok(secrets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_parse_web_section() {
        let secrets = ClientSecrets::parse(
            r#"{"web":{"client_id":"id","client_secret":"secret",
                "auth_uri":"https://example.com/auth","token_uri":"https://example.com/token",
                "redirect_uris":["http://localhost:5000/auth/oauth2callback"]}}"#,
        )
        .unwrap();

        assert_eq!(secrets.client_id, "id");
        assert_eq!(secrets.token_uri, "https://example.com/token");
        assert_eq!(secrets.redirect_uris.len(), 1);
    }

    #[test]
    fn test_parse_installed_section_with_defaults() {
        let secrets =
            ClientSecrets::parse(r#"{"installed":{"client_id":"id","client_secret":"secret"}}"#)
                .unwrap();

        assert_eq!(secrets.auth_uri, DEFAULT_AUTH_URI);
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_parse_rejects_missing_section() {
        let result = ClientSecrets::parse(r#"{"other":{}}"#);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_missing_file_is_configuration_error() {
        let result = ClientSecrets::load(Path::new("/definitely/not/here.json")).await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
