use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::components::assistant;
use crate::components::calendar::GoogleCalendarApi;
use crate::components::session::{InMemorySessionStore, SessionStore};
use crate::config::Config;
use crate::error::{config_error, other_error, AppResult, Error};
use crate::shutdown;
use crate::web::{self, AppState};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load and initialize the application config
pub fn load_config() -> miette::Result<Arc<Config>> {
    match Config::load() {
        Ok(config) => Ok(Arc::new(config)),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Redis when configured and reachable, otherwise process memory
pub async fn build_session_store(config: &Config) -> Arc<dyn SessionStore> {
    let ttl = Duration::from_secs(config.session_ttl_minutes as u64 * 60);

    #[cfg(feature = "redis-sessions")]
    if let Some(redis_url) = &config.redis_url {
        match crate::components::session::RedisSessionStore::connect(redis_url, ttl.as_secs()).await {
            Ok(store) => {
                info!("Connected to Redis successfully");
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!("Failed to connect to Redis: {}", e);
            }
        }
    }

    info!("Using in-memory session store");
    Arc::new(InMemorySessionStore::new(ttl))
}

/// Wire up the application state from configuration
pub async fn build_state(config: Arc<Config>) -> AppResult<AppState> {
    let store = build_session_store(&config).await;
    let calendar = Arc::new(GoogleCalendarApi::new(
        &config.calendar_api_base,
        config.request_timeout,
    )?);
    let assistant = assistant::from_config(&config);

    AppState::new(config, store, calendar, assistant)
}

/// Bind the listener and serve until a shutdown signal arrives
pub async fn start_server(config: Arc<Config>) -> miette::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|_| config_error(&format!("Invalid bind address {}:{}", config.host, config.port)))?;

    if !config.credentials_path.exists() {
        error!(
            "Credentials file not found at {}; /auth/login will fail until it exists",
            config.credentials_path.display()
        );
    }
    info!("Callback completion mode: {:?}", config.completion_mode);

    let state = build_state(config).await?;
    let app = web::router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(Error::from)?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await
        .map_err(|e| other_error(&format!("Server error: {}", e)))?;

    info!("Server shut down");
    Ok(())
}
