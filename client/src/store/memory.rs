//! In-memory [`ChatStore`] backing the test suites and embedders that need a
//! session without a realtime backend.

use super::{ChatStore, Feed, FeedEvent, StoreError, StoreResult, USERS_COLLECTION};
use async_trait::async_trait;
use pairchat_messaging::{ChatId, Message, MessageDraft, MessageId, UserProfile};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex, RwLock};
use tracing::{debug, warn};

const FEED_BUFFER: usize = 128;

/// In-memory document store with live snapshot fan-out per collection.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    users: RwLock<Vec<UserProfile>>,
    user_feed: broadcast::Sender<FeedEvent<UserProfile>>,
    chats: RwLock<HashMap<ChatId, ChatLog>>,
    // Last assigned timestamp; appends within the same millisecond still get
    // strictly increasing values.
    clock: Mutex<i64>,
    live_feeds: AtomicUsize,
    fail_next_append: AtomicBool,
}

struct ChatLog {
    messages: Vec<Message>,
    feed: broadcast::Sender<FeedEvent<Message>>,
}

impl ChatLog {
    fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_BUFFER);
        Self {
            messages: Vec::new(),
            feed,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (user_feed, _) = broadcast::channel(FEED_BUFFER);
        Self {
            inner: Arc::new(MemoryInner {
                users: RwLock::new(Vec::new()),
                user_feed,
                chats: RwLock::new(HashMap::new()),
                clock: Mutex::new(0),
                live_feeds: AtomicUsize::new(0),
                fail_next_append: AtomicBool::new(false),
            }),
        }
    }

    /// Write a profile document to the users collection, as the external
    /// signup flow does. Re-registering a uid replaces its document in
    /// place, keeping insertion order stable.
    pub async fn register_user(&self, profile: UserProfile) {
        let mut users = self.inner.users.write().await;
        match users.iter_mut().find(|user| user.uid == profile.uid) {
            Some(existing) => *existing = profile,
            None => users.push(profile),
        }
        // Broadcast under the lock: snapshots are full replacements, so they
        // must go out in write order.
        let _ = self
            .inner
            .user_feed
            .send(FeedEvent::Snapshot(users.clone()));
    }

    /// Insert a fully-formed message document, bypassing id and timestamp
    /// assignment. Lets tests drive arrival-order interleavings; the log is
    /// re-sorted so subscribers still observe timestamp order.
    pub async fn seed_message(&self, chat_id: &ChatId, message: Message) {
        let mut chats = self.inner.chats.write().await;
        let log = chats.entry(chat_id.clone()).or_insert_with(ChatLog::new);
        log.messages.push(message);
        log.messages.sort_by_key(|m| m.timestamp_ms);
        let _ = log.feed.send(FeedEvent::Snapshot(log.messages.clone()));
    }

    /// Fault hook: make the next append fail with [`StoreError::Append`].
    pub fn fail_next_append(&self) {
        self.inner.fail_next_append.store(true, Ordering::SeqCst);
    }

    /// Fault hook: push a transient error to one conversation's subscribers.
    pub async fn push_feed_error(&self, chat_id: &ChatId, reason: impl Into<String>) {
        let chats = self.inner.chats.read().await;
        if let Some(log) = chats.get(chat_id) {
            let _ = log
                .feed
                .send(FeedEvent::Error(StoreError::Subscription(reason.into())));
        }
    }

    /// Fault hook: push a transient error to users-collection subscribers.
    pub fn push_users_error(&self, reason: impl Into<String>) {
        let _ = self
            .inner
            .user_feed
            .send(FeedEvent::Error(StoreError::Subscription(reason.into())));
    }

    /// Number of live subscription listeners.
    pub fn live_feeds(&self) -> usize {
        self.inner.live_feeds.load(Ordering::SeqCst)
    }

    async fn next_timestamp_ms(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;

        let mut last = self.inner.clock.lock().await;
        *last = (*last + 1).max(now);
        *last
    }

    fn open_feed<T>(&self, initial: Vec<T>, upstream: broadcast::Receiver<FeedEvent<T>>) -> Feed<T>
    where
        T: Clone + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let _ = event_tx.send(FeedEvent::Snapshot(initial));
        self.inner.live_feeds.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(forward_events(
            upstream,
            event_tx,
            cancel_rx,
            Arc::clone(&self.inner),
        ));

        Feed::new(event_rx, cancel_tx)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn subscribe_users(&self) -> StoreResult<Feed<UserProfile>> {
        // Subscribe while holding the lock so no registration lands between
        // the snapshot and the listener.
        let users = self.inner.users.read().await;
        let snapshot = users.clone();
        let upstream = self.inner.user_feed.subscribe();
        drop(users);

        debug!(collection = USERS_COLLECTION, "subscription opened");
        Ok(self.open_feed(snapshot, upstream))
    }

    async fn subscribe_messages(&self, chat_id: &ChatId) -> StoreResult<Feed<Message>> {
        let mut chats = self.inner.chats.write().await;
        let log = chats.entry(chat_id.clone()).or_insert_with(ChatLog::new);
        let snapshot = log.messages.clone();
        let upstream = log.feed.subscribe();
        drop(chats);

        debug!(collection = %chat_id.messages_path(), "subscription opened");
        Ok(self.open_feed(snapshot, upstream))
    }

    async fn append_message(
        &self,
        chat_id: &ChatId,
        draft: MessageDraft,
    ) -> StoreResult<MessageId> {
        if self.inner.fail_next_append.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Append("store rejected the write".into()));
        }

        let message = Message {
            id: MessageId::new(),
            text: draft.text,
            sender: draft.sender,
            receiver: draft.receiver,
            timestamp_ms: self.next_timestamp_ms().await,
        };
        let message_id = message.id;

        let mut chats = self.inner.chats.write().await;
        let log = chats.entry(chat_id.clone()).or_insert_with(ChatLog::new);
        log.messages.push(message);
        log.messages.sort_by_key(|m| m.timestamp_ms);
        let _ = log.feed.send(FeedEvent::Snapshot(log.messages.clone()));
        drop(chats);

        debug!(%chat_id, %message_id, "message appended");
        Ok(message_id)
    }
}

async fn forward_events<T>(
    mut upstream: broadcast::Receiver<FeedEvent<T>>,
    events: mpsc::UnboundedSender<FeedEvent<T>>,
    mut cancel: oneshot::Receiver<()>,
    inner: Arc<MemoryInner>,
) where
    T: Clone + Send + 'static,
{
    loop {
        tokio::select! {
            _ = &mut cancel => break,
            received = upstream.recv() => match received {
                Ok(event) => {
                    if events.send(event).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Snapshots are full replacements; the next one carries
                    // the complete state.
                    warn!(skipped, "subscription lagged behind the store feed");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    inner.live_feeds.fetch_sub(1, Ordering::SeqCst);
}
