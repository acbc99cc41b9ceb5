pub mod handlers;
pub mod session;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::components::assistant::Assistant;
use crate::components::calendar::{CalendarApi, EventRequestBuilder};
use crate::components::google_oauth::AuthSessionManager;
use crate::components::session::{SessionKeys, SessionStore};
use crate::config::Config;
use crate::error::AppResult;
use handlers::{
    create_events_handler, logout_handler, login_handler, oauth2callback_handler,
    process_message_handler, status_handler, test_handler,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Login flow and per-session credentials
    pub auth: Arc<AuthSessionManager>,
    /// Calendar event creation
    pub events: Arc<EventRequestBuilder>,
    pub assistant: Arc<dyn Assistant>,
    /// Signs and verifies the session cookie
    pub session_keys: Arc<SessionKeys>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn SessionStore>,
        calendar: Arc<dyn CalendarApi>,
        assistant: Arc<dyn Assistant>,
    ) -> AppResult<Self> {
        let auth = Arc::new(AuthSessionManager::new(&config, store)?);
        let events = Arc::new(EventRequestBuilder::new(calendar, &config));
        let session_keys = Arc::new(SessionKeys::new(
            &config.session_secret,
            config.session_ttl_minutes,
        ));

        Ok(Self {
            config,
            auth,
            events,
            assistant,
            session_keys,
        })
    }
}

/// Build the router with every route and middleware attached
pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/login", get(login_handler))
        .route("/oauth2callback", get(oauth2callback_handler))
        .route("/logout", get(logout_handler))
        .route("/status", get(status_handler));

    Router::new()
        .route("/api/process-message", post(process_message_handler))
        .route("/api/create-events", post(create_events_handler))
        .nest("/auth", auth_routes)
        .route("/test", get(test_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .with_state(state)
}

/// Let the front end call us with its session cookie
fn cors_layer(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    match HeaderValue::from_str(&config.frontend_origin()) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            warn!("Front-end origin is not a valid header value, CORS disabled");
            cors
        }
    }
}
