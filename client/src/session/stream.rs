use super::SessionResult;
use crate::store::{ChatStore, Feed, FeedEvent};
use pairchat_messaging::{ChatId, Message, UserId};
use std::future;
use tracing::{debug, warn};

/// Materialized message view for one conversation.
///
/// Opened for a derived [`ChatId`] and tagged with it: every event this
/// stream yields carries the tag, so the orchestrator can discard
/// notifications raced in from a superseded subscription. Dropping the
/// stream releases the subscription.
pub struct ConversationStream {
    chat_id: ChatId,
    feed: Feed<Message>,
    messages: Vec<Message>,
    sync_error: Option<String>,
    feed_closed: bool,
}

impl ConversationStream {
    /// Derive the conversation id for `(me, peer)` and subscribe to its
    /// message log. Re-opening for the same pair replays the full log from
    /// scratch in the same logical order.
    pub async fn open(store: &dyn ChatStore, me: &UserId, peer: &UserId) -> SessionResult<Self> {
        let chat_id = ChatId::for_pair(me, peer)?;
        let feed = store.subscribe_messages(&chat_id).await?;
        debug!(%chat_id, "conversation stream opened");
        Ok(Self {
            chat_id,
            feed,
            messages: Vec::new(),
            sync_error: None,
            feed_closed: false,
        })
    }

    /// Conversation this subscription was opened for.
    pub fn chat_id(&self) -> &ChatId {
        &self.chat_id
    }

    /// Next upstream notification, tagged with this stream's conversation
    /// id. Pends forever once the feed has closed, after yielding `None`
    /// exactly once.
    pub async fn next_event(&mut self) -> Option<(ChatId, FeedEvent<Message>)> {
        if self.feed_closed {
            return future::pending().await;
        }
        match self.feed.next_event().await {
            Some(event) => Some((self.chat_id.clone(), event)),
            None => {
                self.feed_closed = true;
                None
            }
        }
    }

    /// Apply one notification to the materialized view. Snapshots replace
    /// the view, kept in timestamp order; errors leave the last synced view
    /// visible and raise the sync indicator.
    pub fn apply(&mut self, event: FeedEvent<Message>) {
        match event {
            FeedEvent::Snapshot(mut messages) => {
                messages.sort_by_key(|message| message.timestamp_ms);
                self.messages = messages;
                self.sync_error = None;
            }
            FeedEvent::Error(err) => {
                warn!(chat_id = %self.chat_id, %err, "message feed error; keeping last synced view");
                self.sync_error = Some(err.to_string());
            }
        }
    }

    /// Messages in ascending timestamp order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn sync_error(&self) -> Option<&str> {
        self.sync_error.as_deref()
    }
}
