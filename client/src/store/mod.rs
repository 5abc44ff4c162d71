//! Port to the external realtime document store.
//!
//! The store exposes two primitives: live subscriptions on a collection
//! (delivering full-replacement snapshots) and single-document appends.
//! Collections addressed by this client are the top-level [`USERS_COLLECTION`]
//! and one message collection per conversation at
//! `chats/{chat_id}/messages` (see `ChatId::messages_path`), ordered by
//! `timestamp_ms` ascending.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use pairchat_messaging::{ChatId, Message, MessageDraft, MessageId, UserProfile};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

/// Collection holding one profile document per registered user.
pub const USERS_COLLECTION: &str = "users";

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("subscription failed: {0}")]
    Subscription(String),
    #[error("append failed: {0}")]
    Append(String),
}

/// One notification from a live subscription.
#[derive(Debug, Clone)]
pub enum FeedEvent<T> {
    /// Full replacement snapshot of the subscribed collection.
    Snapshot(Vec<T>),
    /// Transient upstream failure; the subscription stays open and may
    /// recover with a later snapshot.
    Error(StoreError),
}

/// A live subscription: an event sequence plus its cancel handle.
///
/// Dropping the feed releases the upstream listener; [`Feed::cancel`] does
/// the same explicitly. There is no other exit path, so a subscription can
/// never outlive the component that acquired it.
#[derive(Debug)]
pub struct Feed<T> {
    events: mpsc::UnboundedReceiver<FeedEvent<T>>,
    cancel: oneshot::Sender<()>,
}

impl<T> Feed<T> {
    pub fn new(
        events: mpsc::UnboundedReceiver<FeedEvent<T>>,
        cancel: oneshot::Sender<()>,
    ) -> Self {
        Self { events, cancel }
    }

    /// Next notification; `None` once the upstream feed closes for good.
    pub async fn next_event(&mut self) -> Option<FeedEvent<T>> {
        self.next().await
    }

    /// Release the upstream listener.
    pub fn cancel(self) {
        let _ = self.cancel.send(());
    }
}

impl<T> Stream for Feed<T> {
    type Item = FeedEvent<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

/// Document store capabilities consumed by the chat session.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Open a live subscription on the [`USERS_COLLECTION`].
    async fn subscribe_users(&self) -> StoreResult<Feed<UserProfile>>;

    /// Open a live subscription on one conversation's message log, ordered
    /// by timestamp ascending.
    async fn subscribe_messages(&self, chat_id: &ChatId) -> StoreResult<Feed<Message>>;

    /// Append one message document to a conversation's log. The store
    /// assigns the id and a monotonically increasing timestamp.
    async fn append_message(
        &self,
        chat_id: &ChatId,
        draft: MessageDraft,
    ) -> StoreResult<MessageId>;
}
