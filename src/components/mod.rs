// Export components
pub mod assistant;
pub mod calendar;
pub mod google_oauth;
pub mod session;

pub use assistant::{Assistant, AssistantReply};
pub use calendar::EventRequestBuilder;
pub use google_oauth::AuthSessionManager;
pub use session::{SessionStore, TokenBundle};
