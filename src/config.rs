use crate::error::{config_error, env_error, AppResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Optional file with non-secret settings, overridden by the environment
pub const CONFIG_FILE: &str = "config/eventelf.toml";

pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
pub const DEFAULT_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Longest session lifetime accepted (one year)
pub const MAX_SESSION_TTL_MINUTES: i64 = 60 * 24 * 365;

/// Calendar read/write, nothing else
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// How the OAuth callback hands control back to the front end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionMode {
    /// Post the access token to `window.opener` and close the popup
    #[default]
    Popup,
    /// Redirect the browser to the front-end URL
    Redirect,
}

impl FromStr for CompletionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "popup" => Ok(CompletionMode::Popup),
            "redirect" => Ok(CompletionMode::Redirect),
            other => Err(format!("unknown completion mode '{}'", other)),
        }
    }
}

/// Main configuration structure for the server
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP listener to
    pub host: String,
    pub port: u16,
    /// Where the browser ends up after login (and the postMessage target origin)
    pub frontend_url: String,
    pub completion_mode: CompletionMode,
    /// Google client-credential descriptor (credentials.json)
    pub credentials_path: PathBuf,
    /// Must match one of the redirect URIs registered for the OAuth client
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub calendar_api_base: String,
    pub calendar_id: String,
    /// Upper bound for every remote call
    pub request_timeout: Duration,
    /// Retries per event insert; zero disables retries and dedup ids
    pub insert_retries: u32,
    pub session_ttl_minutes: i64,
    /// Key material used to sign session cookies
    pub session_secret: Vec<u8>,
    pub redis_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
}

/// Settings that may come from `config/eventelf.toml`
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    host: Option<String>,
    port: Option<u16>,
    frontend_url: Option<String>,
    completion_mode: Option<CompletionMode>,
    credentials_path: Option<PathBuf>,
    redirect_uri: Option<String>,
    calendar_api_base: Option<String>,
    calendar_id: Option<String>,
    request_timeout_secs: Option<u64>,
    insert_retries: Option<u32>,
    session_ttl_minutes: Option<i64>,
    session_secret_file: Option<PathBuf>,
    gemini_model: Option<String>,
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let file = match fs::read_to_string(CONFIG_FILE) {
            Ok(content) => toml::from_str::<FileConfig>(&content)?,
            Err(_) => FileConfig::default(),
        };

        let host = env::var("HOST")
            .ok()
            .or(file.host)
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let port = match env::var("PORT") {
            Ok(p) => p.parse::<u16>().map_err(|_| env_error("PORT"))?,
            Err(_) => file.port.unwrap_or(5000),
        };

        let frontend_url = env::var("FRONTEND_URL")
            .ok()
            .or(file.frontend_url)
            .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string());

        let completion_mode = match env::var("COMPLETION_MODE") {
            Ok(mode) => mode.parse::<CompletionMode>().map_err(|e| config_error(&e))?,
            Err(_) => file.completion_mode.unwrap_or_default(),
        };

        let credentials_path = env::var("GOOGLE_CREDENTIALS_PATH")
            .ok()
            .map(PathBuf::from)
            .or(file.credentials_path)
            .unwrap_or_else(|| PathBuf::from("config/credentials.json"));

        let redirect_uri = env::var("OAUTH_REDIRECT_URI")
            .ok()
            .or(file.redirect_uri)
            .unwrap_or_else(|| format!("http://localhost:{}/auth/oauth2callback", port));

        let calendar_api_base = env::var("CALENDAR_API_BASE")
            .ok()
            .or(file.calendar_api_base)
            .unwrap_or_else(|| DEFAULT_CALENDAR_API_BASE.to_string());
        let calendar_id = env::var("GOOGLE_CALENDAR_ID")
            .ok()
            .or(file.calendar_id)
            .unwrap_or_else(|| "primary".to_string());

        let request_timeout_secs = match env::var("REQUEST_TIMEOUT_SECS") {
            Ok(v) => v.parse::<u64>().map_err(|_| env_error("REQUEST_TIMEOUT_SECS"))?,
            Err(_) => file.request_timeout_secs.unwrap_or(15),
        };
        let insert_retries = match env::var("EVENT_INSERT_RETRIES") {
            Ok(v) => v.parse::<u32>().map_err(|_| env_error("EVENT_INSERT_RETRIES"))?,
            Err(_) => file.insert_retries.unwrap_or(0),
        };
        let session_ttl_minutes = match env::var("SESSION_TTL_MINUTES") {
            Ok(v) => v.parse::<i64>().map_err(|_| env_error("SESSION_TTL_MINUTES"))?,
            Err(_) => file.session_ttl_minutes.unwrap_or(60 * 24),
        };
        let session_ttl_minutes = check_session_ttl(session_ttl_minutes)?;

        let session_secret = match env::var("SESSION_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret.trim().as_bytes().to_vec(),
            _ => {
                let path = env::var("SESSION_SECRET_FILE")
                    .ok()
                    .map(PathBuf::from)
                    .or(file.session_secret_file)
                    .unwrap_or_else(|| PathBuf::from("config/session_secret"));
                load_or_create_secret(&path)?
            }
        };

        let redis_url = env::var("REDIS_URL").ok().filter(|u| !u.trim().is_empty());
        let gemini_api_key = env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty());
        let gemini_model = env::var("GEMINI_MODEL")
            .ok()
            .or(file.gemini_model)
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        Ok(Config {
            host,
            port,
            frontend_url,
            completion_mode,
            credentials_path,
            redirect_uri,
            scopes: vec![CALENDAR_SCOPE.to_string()],
            calendar_api_base,
            calendar_id,
            request_timeout: Duration::from_secs(request_timeout_secs),
            insert_retries,
            session_ttl_minutes,
            session_secret,
            redis_url,
            gemini_api_key,
            gemini_model,
        })
    }

    /// Origin (scheme://host[:port]) of the front-end URL
    pub fn frontend_origin(&self) -> String {
        match url::Url::parse(&self.frontend_url) {
            Ok(url) => url.origin().ascii_serialization(),
            Err(_) => self.frontend_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Session lifetime must be positive and at most [`MAX_SESSION_TTL_MINUTES`]
pub fn check_session_ttl(minutes: i64) -> AppResult<i64> {
    if minutes <= 0 {
        return Err(config_error("session TTL must be positive"));
    }
    if minutes > MAX_SESSION_TTL_MINUTES {
        return Err(config_error(&format!(
            "session TTL of {} minutes exceeds the maximum of {}",
            minutes, MAX_SESSION_TTL_MINUTES
        )));
    }
    Ok(minutes)
}

/// Read the session signing secret, creating it once if it does not exist yet.
///
/// The secret has to survive restarts, otherwise every outstanding session
/// cookie stops validating.
pub fn load_or_create_secret(path: &Path) -> AppResult<Vec<u8>> {
    if let Ok(content) = fs::read_to_string(path) {
        let secret = content.trim();
        if !secret.is_empty() {
            return Ok(secret.as_bytes().to_vec());
        }
    }

    warn!(
        "No session secret found, generating a new one at {}",
        path.display()
    );
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let secret = URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>());
    fs::write(path, &secret)?;
    info!("Session secret written to {}", path.display());

    Ok(secret.into_bytes())
}

#[cfg(test)]
impl Config {
    /// Configuration for unit tests that never touches the environment
    pub fn for_tests() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 5000,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            completion_mode: CompletionMode::Popup,
            credentials_path: PathBuf::from("config/credentials.json"),
            redirect_uri: "http://localhost:5000/auth/oauth2callback".to_string(),
            scopes: vec![CALENDAR_SCOPE.to_string()],
            calendar_api_base: DEFAULT_CALENDAR_API_BASE.to_string(),
            calendar_id: "primary".to_string(),
            request_timeout: Duration::from_secs(5),
            insert_retries: 0,
            session_ttl_minutes: 60,
            session_secret: b"unit-test-secret".to_vec(),
            redis_url: None,
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_completion_mode_parse() {
        assert_eq!("popup".parse::<CompletionMode>(), Ok(CompletionMode::Popup));
        assert_eq!(" Redirect ".parse::<CompletionMode>(), Ok(CompletionMode::Redirect));
        assert!("window".parse::<CompletionMode>().is_err());
    }

    #[test]
    fn test_frontend_origin() {
        let mut config = Config::for_tests();
        config.frontend_url = "http://localhost:5173/app/".to_string();
        assert_eq!(config.frontend_origin(), "http://localhost:5173");
    }

    /// The secret is generated once and then read back unchanged
    #[test]
    fn test_session_secret_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session_secret");

        let first = load_or_create_secret(&path).unwrap();
        let second = load_or_create_secret(&path).unwrap();

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_file_config_parses() {
        let file: FileConfig = toml::from_str(
            r#"
            port = 8080
            completion_mode = "redirect"
            insert_retries = 2
            "#,
        )
        .unwrap();

        assert_eq!(file.port, Some(8080));
        assert_eq!(file.completion_mode, Some(CompletionMode::Redirect));
        assert_eq!(file.insert_retries, Some(2));
        assert!(file.host.is_none());
    }

    #[test]
    fn test_session_ttl_bounds() {
        assert_eq!(check_session_ttl(60).unwrap(), 60);
        assert_eq!(
            check_session_ttl(MAX_SESSION_TTL_MINUTES).unwrap(),
            MAX_SESSION_TTL_MINUTES
        );
        assert!(matches!(check_session_ttl(0), Err(Error::Configuration(_))));
        assert!(matches!(
            check_session_ttl(MAX_SESSION_TTL_MINUTES + 1),
            Err(Error::Configuration(_))
        ));
        assert!(check_session_ttl(i64::MAX).is_err());
    }
}
