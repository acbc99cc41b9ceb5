pub mod cookie;
pub mod models;
pub mod store;

pub use cookie::{SessionKeys, SESSION_COOKIE};
pub use models::{AuthState, Session, TokenBundle};
#[cfg(feature = "redis-sessions")]
pub use store::RedisSessionStore;
pub use store::{InMemorySessionStore, SessionStore};
