use super::models::Session;
use crate::error::AppResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Storage for server-side sessions, keyed by session id
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Load a session, or an empty one if nothing is stored under `id`
    async fn load(&self, id: &str) -> AppResult<Session>;

    /// Store a session, replacing whatever was there
    async fn save(&self, id: &str, session: &Session) -> AppResult<()>;

    /// Remove a session; removing a missing session is not an error
    async fn delete(&self, id: &str) -> AppResult<()>;
}

/// In-memory implementation of the session store
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, (Session, Instant)>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let sessions = self.sessions.read().await;
        sessions.values().filter(|(_, expires)| *expires > now).count()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(24 * 60 * 60))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &str) -> AppResult<Session> {
        let sessions = self.sessions.read().await;
        let session = match sessions.get(id) {
            Some((session, expires)) if *expires > Instant::now() => session.clone(),
            _ => Session::default(),
        };
        Ok(session)
    }

    async fn save(&self, id: &str, session: &Session) -> AppResult<()> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, (_, expires)| *expires > now);
        if session.is_empty() {
            sessions.remove(id);
        } else {
            sessions.insert(id.to_string(), (session.clone(), now + self.ttl));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id);
        Ok(())
    }
}

#[cfg(feature = "redis-sessions")]
pub use redis_store::RedisSessionStore;

#[cfg(feature = "redis-sessions")]
mod redis_store {
    use super::SessionStore;
    use crate::components::session::models::Session;
    use crate::error::{session_error, AppResult};
    use async_trait::async_trait;
    use redis::{AsyncCommands, Client as RedisClient};
    use tracing::{info, warn};

    /// Redis keys
    mod keys {
        pub const SESSION_PREFIX: &str = "eventelf:session:";
    }

    /// Redis-backed session store; entries expire with the session cookie
    pub struct RedisSessionStore {
        client: RedisClient,
        ttl_seconds: u64,
    }

    impl RedisSessionStore {
        /// Create a store and verify that Redis answers
        pub async fn connect(redis_url: &str, ttl_seconds: u64) -> AppResult<Self> {
            info!("Connecting to Redis session store");

            let client = RedisClient::open(redis_url)
                .map_err(|e| session_error(&format!("Failed to create Redis client: {}", e)))?;

            let store = Self {
                client,
                ttl_seconds,
            };
            let mut conn = store.get_connection().await?;
            let _: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|e| session_error(&format!("Redis PING failed: {}", e)))?;

            Ok(store)
        }

        async fn get_connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
            self.client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| session_error(&format!("Failed to connect to Redis: {}", e)))
        }

        /// Redis key holding the session `id`
        pub fn key(id: &str) -> String {
            format!("{}{}", keys::SESSION_PREFIX, id)
        }

        /// Stored form of a session; `None` means the key should be deleted
        pub(super) fn encode(session: &Session) -> AppResult<Option<String>> {
            if session.is_empty() {
                return Ok(None);
            }
            Ok(Some(serde_json::to_string(session)?))
        }

        /// An unreadable entry counts as logged out, but is never dropped silently
        pub(super) fn decode(id: &str, stored: Option<&str>) -> Session {
            match stored.map(serde_json::from_str::<Session>) {
                Some(Ok(session)) => session,
                Some(Err(e)) => {
                    warn!(
                        "Discarding unreadable session {}: {}",
                        id.get(..8).unwrap_or(id),
                        e
                    );
                    Session::default()
                }
                None => Session::default(),
            }
        }
    }

    #[async_trait]
    impl SessionStore for RedisSessionStore {
        async fn load(&self, id: &str) -> AppResult<Session> {
            let mut conn = self.get_connection().await?;
            let stored: Option<String> = conn
                .get(Self::key(id))
                .await
                .map_err(|e| session_error(&format!("Redis GET error: {}", e)))?;

            Ok(Self::decode(id, stored.as_deref()))
        }

        async fn save(&self, id: &str, session: &Session) -> AppResult<()> {
            let Some(json) = Self::encode(session)? else {
                return self.delete(id).await;
            };

            let mut conn = self.get_connection().await?;
            let _: () = conn
                .set_ex(Self::key(id), json, self.ttl_seconds)
                .await
                .map_err(|e| session_error(&format!("Redis SET error: {}", e)))?;
            Ok(())
        }

        async fn delete(&self, id: &str) -> AppResult<()> {
            let mut conn = self.get_connection().await?;
            let _: () = conn
                .del(Self::key(id))
                .await
                .map_err(|e| session_error(&format!("Redis DEL error: {}", e)))?;
            Ok(())
        }
    }
}
