use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::error;

use super::AppState;
use crate::components::session::SessionKeys;

/// Session id of the current request, set by [`session_middleware`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for SessionId {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<SessionId>().cloned().ok_or_else(|| {
            error!("Session middleware is not installed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }
}

/// Attach a session id to every request, issuing a signed cookie for new ones
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    let existing = state.session_keys.session_id_from(&jar);
    let is_new = existing.is_none();
    let session_id = existing.unwrap_or_else(SessionKeys::new_session_id);

    req.extensions_mut().insert(SessionId(session_id.clone()));
    let mut response = next.run(req).await;

    if is_new {
        match state.session_keys.cookie_for(&session_id) {
            Ok(cookie) => match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(e) => error!("Unusable session cookie: {}", e),
            },
            Err(e) => return e.into_response(),
        }
    }

    response
}
