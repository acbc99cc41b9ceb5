use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(eventelf::config))]
    Configuration(String),

    #[error("Environment error: {0}")]
    #[diagnostic(code(eventelf::environment))]
    Environment(String),

    #[error("Token exchange failed: {0}")]
    #[diagnostic(code(eventelf::token_exchange))]
    TokenExchange(String),

    #[error("Not authenticated")]
    #[diagnostic(code(eventelf::auth_required))]
    AuthRequired,

    #[error("{0}")]
    #[diagnostic(code(eventelf::empty_input))]
    EmptyInput(String),

    #[error("{0}")]
    #[diagnostic(code(eventelf::invalid_input))]
    InvalidInput(String),

    #[error("Assistant error: {0}")]
    #[diagnostic(code(eventelf::assistant))]
    Assistant(String),

    #[error("Session error: {0}")]
    #[diagnostic(code(eventelf::session))]
    Session(String),

    #[error("HTTP client error: {0}")]
    #[diagnostic(code(eventelf::http))]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    #[diagnostic(code(eventelf::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(eventelf::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(eventelf::other))]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type AppResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Invalid environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Configuration(message.to_string())
}

/// Helper to create token exchange errors
pub fn token_exchange_error(message: &str) -> Error {
    Error::TokenExchange(message.to_string())
}

/// Helper to create session errors
pub fn session_error(message: &str) -> Error {
    Error::Session(message.to_string())
}

/// Helper to create assistant errors
pub fn assistant_error(message: &str) -> Error {
    Error::Assistant(message.to_string())
}

/// Helper to create other errors
pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            // The login and callback paths are browser navigations, so plain text
            Error::Configuration(_) | Error::TokenExchange(_) => {
                error!("{}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
            Error::AuthRequired => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": self.to_string(), "auth_required": true })),
            )
                .into_response(),
            Error::EmptyInput(message) | Error::InvalidInput(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Error::Assistant(_) => {
                error!("{}", self);
                (StatusCode::BAD_GATEWAY, Json(json!({ "error": self.to_string() })))
                    .into_response()
            }
            other => {
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}
