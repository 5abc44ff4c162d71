//! Conversation identity and document models shared across PairChat clients
//! and services.
//!
//! Anything addressing the same backing store must derive conversation
//! identifiers exactly as [`ChatId::for_pair`] does and serialize documents
//! with the field names defined here.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Separator between the two participant uids inside a [`ChatId`].
///
/// Well-formed uids never contain this character; [`ChatId::for_pair`]
/// rejects uids that do, which keeps distinct pairs from colliding.
pub const CHAT_ID_SEPARATOR: char = '_';

/// Opaque stable identifier issued to a user account at registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Profile document kept in the `users` collection, written once at signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: UserId,
    pub name: String,
    pub email: String,
}

/// Unique identifier assigned to a message document by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier addressing the message log shared by exactly two participants.
///
/// Both participants derive the same identifier regardless of argument
/// order: the lexicographically smaller uid always comes first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(String);

impl ChatId {
    /// Derive the conversation identifier for the unordered pair `(a, b)`.
    ///
    /// Pure and referentially transparent: the same pair always yields the
    /// same identifier, across processes and time.
    pub fn for_pair(a: &UserId, b: &UserId) -> Result<Self> {
        if a.as_str().is_empty() || b.as_str().is_empty() {
            return Err(ChatIdError::InvalidParticipants(
                "participant uid is empty".into(),
            ));
        }
        if a == b {
            return Err(ChatIdError::InvalidParticipants(
                "a conversation needs two distinct participants".into(),
            ));
        }
        if a.as_str().contains(CHAT_ID_SEPARATOR) || b.as_str().contains(CHAT_ID_SEPARATOR) {
            return Err(ChatIdError::InvalidParticipants(format!(
                "uid contains reserved separator {CHAT_ID_SEPARATOR:?}"
            )));
        }

        let (first, second) = if a.as_str() < b.as_str() { (a, b) } else { (b, a) };
        Ok(Self(format!(
            "{}{}{}",
            first.as_str(),
            CHAT_ID_SEPARATOR,
            second.as_str()
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store path of this conversation's message collection.
    pub fn messages_path(&self) -> String {
        format!("chats/{}/messages", self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outgoing message as submitted by a composer; the store assigns the id and
/// timestamp on append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDraft {
    pub text: String,
    pub sender: UserId,
    pub receiver: UserId,
}

/// Message document as read back from a conversation's append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub sender: UserId,
    pub receiver: UserId,
    pub timestamp_ms: i64,
}

impl Message {
    /// Whether this message was sent by `uid`.
    pub fn is_from(&self, uid: &UserId) -> bool {
        self.sender == *uid
    }
}

/// Identity-derivation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChatIdError {
    #[error("invalid participants: {0}")]
    InvalidParticipants(String),
}

pub type Result<T> = std::result::Result<T, ChatIdError>;
