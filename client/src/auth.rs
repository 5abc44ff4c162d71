use async_trait::async_trait;
use pairchat_messaging::UserId;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tokio::sync::broadcast;

const SESSION_EVENT_BUFFER: usize = 16;

/// Authenticated identity as reported by the external provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub uid: UserId,
    pub display_name: String,
    pub email: String,
}

/// Session lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedOut,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("sign-out failed: {0}")]
    SignOut(String),
}

/// Port to the external identity provider.
///
/// The current session is handed to components explicitly rather than read
/// from ambient state, so they can be driven with fabricated sessions.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Currently signed-in user, if any.
    fn current_user(&self) -> Option<SessionUser>;

    /// Subscribe to session lifecycle changes.
    fn session_events(&self) -> broadcast::Receiver<SessionEvent>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Fixed-identity provider for tests and embedders that manage credentials
/// themselves.
pub struct StaticAuth {
    user: RwLock<Option<SessionUser>>,
    events: broadcast::Sender<SessionEvent>,
}

impl StaticAuth {
    pub fn signed_in(user: SessionUser) -> Self {
        let (events, _) = broadcast::channel(SESSION_EVENT_BUFFER);
        Self {
            user: RwLock::new(Some(user)),
            events,
        }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<SessionUser> {
        self.user.read().ok().and_then(|user| user.clone())
    }

    fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let mut user = self
            .user
            .write()
            .map_err(|_| AuthError::SignOut("lock poisoned".into()))?;
        *user = None;
        drop(user);

        let _ = self.events.send(SessionEvent::SignedOut);
        Ok(())
    }
}
