pub mod auth;
pub mod config;
pub mod session;
pub mod store;

pub use auth::{AuthProvider, SessionEvent, SessionUser, StaticAuth};
pub use config::SessionConfig;
pub use session::{ChatSession, ChatView, ComposeError, ComposerState, SessionError};
pub use store::{ChatStore, Feed, FeedEvent, MemoryStore, StoreError};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
