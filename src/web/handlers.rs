use axum::{
    body::Bytes,
    extract::State,
    http::Uri,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::session::SessionId;
use super::AppState;
use crate::components::calendar::CreateEventsResponse;
use crate::components::google_oauth::{popup_page, AuthStatus};
use crate::config::CompletionMode;
use crate::error::{token_exchange_error, AppResult, Error};

#[derive(Debug, Default, Deserialize)]
pub struct ProcessMessageRequest {
    #[serde(default)]
    pub message: String,
}

/// Entries stay raw JSON so one malformed entry cannot reject the batch
#[derive(Debug, Default, Deserialize)]
pub struct CreateEventsRequest {
    #[serde(default)]
    pub events: Option<Vec<Value>>,
}

impl CreateEventsRequest {
    /// Decode a request body; an empty body means no events
    pub fn parse(body: &[u8]) -> AppResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| Error::InvalidInput(format!("Invalid request body: {}", e)))
    }
}

/// Run a chat message through the assistant
pub async fn process_message_handler(
    State(state): State<AppState>,
    Json(request): Json<ProcessMessageRequest>,
) -> AppResult<impl IntoResponse> {
    let reply = state.assistant.run_conversation(&request.message).await?;
    Ok(Json(json!({ "response": reply })))
}

/// Create the requested events with the session's credentials.
///
/// The body is read only after the session is known to be authenticated.
pub async fn create_events_handler(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
    body: Bytes,
) -> AppResult<Json<CreateEventsResponse>> {
    let credentials = state
        .auth
        .current_credentials(&session_id)
        .await?
        .ok_or(Error::AuthRequired)?;

    let request = CreateEventsRequest::parse(&body)?;
    let response = state
        .events
        .create_events_from_json(Some(&credentials), &request.events.unwrap_or_default())
        .await?;
    Ok(Json(response))
}

/// Redirect to the provider's consent screen
pub async fn login_handler(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
) -> AppResult<Redirect> {
    let url = state.auth.begin_login(&session_id).await?;
    Ok(Redirect::to(url.as_str()))
}

/// Provider redirect target; completes the token exchange
pub async fn oauth2callback_handler(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
    uri: Uri,
) -> AppResult<Response> {
    let mut callback_url = Url::parse(&state.config.redirect_uri)
        .map_err(|e| token_exchange_error(&format!("invalid redirect URI: {}", e)))?;
    callback_url.set_query(uri.query());

    let bundle = state.auth.handle_callback(&session_id, &callback_url).await?;

    let response = match state.config.completion_mode {
        CompletionMode::Popup => Html(popup_page(
            &bundle.access_token,
            &state.config.frontend_origin(),
        ))
        .into_response(),
        CompletionMode::Redirect => Redirect::to(&state.config.frontend_url).into_response(),
    };
    Ok(response)
}

/// Drop the session's credentials and go back to the site root
pub async fn logout_handler(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
) -> AppResult<Redirect> {
    state.auth.logout(&session_id).await?;
    Ok(Redirect::to("/"))
}

pub async fn status_handler(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
) -> AppResult<Json<AuthStatus>> {
    Ok(Json(state.auth.status(&session_id).await?))
}

// Liveness check
pub async fn test_handler() -> &'static str {
    "EventElf server is running correctly!"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_events_body() {
        assert!(CreateEventsRequest::parse(b"").unwrap().events.is_none());
        assert!(CreateEventsRequest::parse(b"{\"events\": null}").unwrap().events.is_none());

        let request = CreateEventsRequest::parse(br#"{"events": [{"title": 1}, "x"]}"#).unwrap();
        assert_eq!(request.events.map(|e| e.len()), Some(2));

        assert!(matches!(
            CreateEventsRequest::parse(b"{not json"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            CreateEventsRequest::parse(br#"{"events": "A"}"#),
            Err(Error::InvalidInput(_))
        ));
    }
}
