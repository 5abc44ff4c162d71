use crate::store::{ChatStore, Feed, FeedEvent, StoreResult};
use pairchat_messaging::{UserId, UserProfile};
use std::future;
use tracing::{debug, warn};

/// Live view of all registered users except the session's own.
///
/// Holds exactly one subscription on the users collection; dropping the
/// directory releases it.
pub struct UserDirectory {
    me: UserId,
    feed: Feed<UserProfile>,
    users: Vec<UserProfile>,
    sync_error: Option<String>,
    feed_closed: bool,
}

impl UserDirectory {
    pub async fn open(store: &dyn ChatStore, me: UserId) -> StoreResult<Self> {
        let feed = store.subscribe_users().await?;
        Ok(Self {
            me,
            feed,
            users: Vec::new(),
            sync_error: None,
            feed_closed: false,
        })
    }

    /// Next upstream notification. Pends forever once the feed has closed,
    /// after yielding `None` exactly once.
    pub async fn next_event(&mut self) -> Option<FeedEvent<UserProfile>> {
        if self.feed_closed {
            return future::pending().await;
        }
        let event = self.feed.next_event().await;
        if event.is_none() {
            self.feed_closed = true;
        }
        event
    }

    /// Apply one notification: a full replacement of the known user set.
    pub fn apply(&mut self, event: FeedEvent<UserProfile>) {
        match event {
            FeedEvent::Snapshot(profiles) => {
                self.users = profiles
                    .into_iter()
                    .filter(|profile| profile.uid != self.me)
                    .collect();
                self.sync_error = None;
                debug!(count = self.users.len(), "user directory updated");
            }
            FeedEvent::Error(err) => {
                // The last known-good list stays visible.
                warn!(%err, "user feed error");
                self.sync_error = Some(err.to_string());
            }
        }
    }

    /// Known users in upstream order.
    pub fn users(&self) -> &[UserProfile] {
        &self.users
    }

    /// Case-insensitive substring match on display name. An empty term
    /// yields an empty result: filtering is opt-in, the full list is
    /// rendered separately.
    pub fn filter(&self, term: &str) -> Vec<UserProfile> {
        if term.is_empty() {
            return Vec::new();
        }
        let needle = term.to_lowercase();
        self.users
            .iter()
            .filter(|profile| profile.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn sync_error(&self) -> Option<&str> {
        self.sync_error.as_deref()
    }
}
