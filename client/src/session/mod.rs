//! Live chat session: composes the user directory, the conversation stream,
//! and the message composer behind a single event loop.
//!
//! Presentation talks to [`ChatSession`] only: it issues intents (select,
//! search, draft edits, send, sign-out) and renders the [`ChatView`] it
//! watches. It never derives conversation ids or touches subscriptions
//! directly.

mod composer;
mod directory;
mod runtime;
mod stream;

pub use composer::{ComposeError, ComposerState, MessageComposer};
pub use directory::UserDirectory;
pub use stream::ConversationStream;

use crate::auth::{AuthError, AuthProvider};
use crate::config::SessionConfig;
use crate::store::{ChatStore, StoreError};
use pairchat_messaging::{ChatIdError, Message, MessageId, UserProfile};
use runtime::SessionRuntime;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no signed-in user")]
    NotSignedIn,
    #[error("session runtime is no longer running")]
    Closed,
    #[error(transparent)]
    Identity(#[from] ChatIdError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
}

/// Materialized view of the session, published on every state change.
#[derive(Debug, Clone, Default)]
pub struct ChatView {
    /// All registered users except the session's own, in upstream order.
    pub users: Vec<UserProfile>,
    /// Users matching the current search term; empty when no term is set.
    pub filtered_users: Vec<UserProfile>,
    pub selected_user: Option<UserProfile>,
    /// Messages of the selected conversation in timestamp order.
    pub messages: Vec<Message>,
    pub composer: ComposerState,
    /// Non-blocking indicator of a transient upstream failure; the rest of
    /// the view still holds the last synced state.
    pub sync_error: Option<String>,
}

/// Presentation intents handled by the session runtime.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Select(UserProfile),
    Search(String),
    SetDraft(String),
    PushEmoji(String),
    Send {
        responder: oneshot::Sender<SessionResult<MessageId>>,
    },
    SignOut {
        responder: oneshot::Sender<SessionResult<()>>,
    },
    Shutdown(oneshot::Sender<()>),
}

/// Handle to a running chat session.
///
/// Dropping the handle stops the runtime and releases every live
/// subscription.
pub struct ChatSession {
    command_tx: mpsc::Sender<SessionCommand>,
    view_rx: watch::Receiver<ChatView>,
    runtime_task: tokio::task::JoinHandle<()>,
}

impl ChatSession {
    /// Start the session runtime for the provider's current user.
    pub async fn start(
        config: SessionConfig,
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn ChatStore>,
    ) -> SessionResult<Self> {
        let current = auth.current_user().ok_or(SessionError::NotSignedIn)?;
        let directory = UserDirectory::open(store.as_ref(), current.uid.clone()).await?;

        let (command_tx, command_rx) = mpsc::channel(config.command_buffer);
        let (view_tx, view_rx) = watch::channel(ChatView::default());
        let auth_events = auth.session_events();

        let runtime = SessionRuntime::new(
            current,
            auth,
            store,
            directory,
            command_rx,
            view_tx,
            auth_events,
        );
        let runtime_task = tokio::spawn(runtime.run());

        Ok(Self {
            command_tx,
            view_rx,
            runtime_task,
        })
    }

    /// Latest published view model.
    pub fn view(&self) -> ChatView {
        self.view_rx.borrow().clone()
    }

    /// Watch channel delivering every view update.
    pub fn watch_view(&self) -> watch::Receiver<ChatView> {
        self.view_rx.clone()
    }

    /// Open the conversation with `user`, rebinding the message stream.
    pub async fn select(&self, user: UserProfile) -> SessionResult<()> {
        self.command(SessionCommand::Select(user)).await
    }

    /// Update the directory search term.
    pub async fn search(&self, term: impl Into<String>) -> SessionResult<()> {
        self.command(SessionCommand::Search(term.into())).await
    }

    /// Replace the compose draft with the latest input text.
    pub async fn set_draft(&self, text: impl Into<String>) -> SessionResult<()> {
        self.command(SessionCommand::SetDraft(text.into())).await
    }

    /// Append an emoji to the compose draft.
    pub async fn push_emoji(&self, emoji: impl Into<String>) -> SessionResult<()> {
        self.command(SessionCommand::PushEmoji(emoji.into())).await
    }

    /// Submit the compose draft to the selected conversation.
    pub async fn send(&self) -> SessionResult<MessageId> {
        let (responder, outcome) = oneshot::channel();
        self.command(SessionCommand::Send { responder }).await?;
        outcome.await.map_err(|_| SessionError::Closed)?
    }

    /// Sign out through the identity provider and stop the runtime.
    pub async fn sign_out(&self) -> SessionResult<()> {
        let (responder, outcome) = oneshot::channel();
        self.command(SessionCommand::SignOut { responder }).await?;
        outcome.await.map_err(|_| SessionError::Closed)?
    }

    /// Stop the runtime and release all subscriptions.
    pub async fn shutdown(self) -> SessionResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .command_tx
            .send(SessionCommand::Shutdown(ack_tx))
            .await
            .is_ok()
        {
            let _ = ack_rx.await;
        }
        self.runtime_task.await.map_err(|_| SessionError::Closed)
    }

    async fn command(&self, command: SessionCommand) -> SessionResult<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }
}
