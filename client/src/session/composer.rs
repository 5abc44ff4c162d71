//! Compose buffer and message submission.

use crate::store::{ChatStore, StoreError};
use pairchat_messaging::{ChatId, ChatIdError, MessageDraft, MessageId, UserId};
use tracing::debug;

/// Errors surfaced by [`MessageComposer::submit`].
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("message text is empty")]
    EmptyMessage,
    #[error("no recipient selected")]
    NoRecipient,
    #[error(transparent)]
    Identity(#[from] ChatIdError),
    #[error("append failed: {0}")]
    AppendFailed(#[from] StoreError),
}

/// Compose box state exposed to presentation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposerState {
    pub draft: String,
    pub last_error: Option<String>,
}

/// Compose box: holds the outgoing draft until a send succeeds.
///
/// Submission is fire-and-forget relative to the conversation view: the sent
/// message becomes visible only through the subscription, the same path as
/// everyone else's messages.
#[derive(Debug, Default)]
pub struct MessageComposer {
    draft: String,
    last_error: Option<String>,
}

impl MessageComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Replace the draft with the latest input text.
    pub fn set_draft(&mut self, text: String) {
        self.draft = text;
    }

    /// Append an emoji picked from the emoji widget.
    pub fn push_emoji(&mut self, emoji: &str) {
        self.draft.push_str(emoji);
    }

    pub fn state(&self) -> ComposerState {
        ComposerState {
            draft: self.draft.clone(),
            last_error: self.last_error.clone(),
        }
    }

    /// Validate and append the draft to the conversation with `recipient`.
    ///
    /// Exactly one append is attempted, with no automatic retry. The draft
    /// is cleared only on success; on failure it is preserved so the user
    /// can retry manually.
    pub async fn submit(
        &mut self,
        store: &dyn ChatStore,
        sender: &UserId,
        recipient: Option<&UserId>,
    ) -> Result<MessageId, ComposeError> {
        let outcome = self.try_submit(store, sender, recipient).await;
        match &outcome {
            Ok(message_id) => {
                debug!(%message_id, "message submitted");
                self.draft.clear();
                self.last_error = None;
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
            }
        }
        outcome
    }

    async fn try_submit(
        &self,
        store: &dyn ChatStore,
        sender: &UserId,
        recipient: Option<&UserId>,
    ) -> Result<MessageId, ComposeError> {
        if self.draft.trim().is_empty() {
            return Err(ComposeError::EmptyMessage);
        }
        let receiver = recipient.ok_or(ComposeError::NoRecipient)?;

        let chat_id = ChatId::for_pair(sender, receiver)?;
        let draft = MessageDraft {
            text: self.draft.clone(),
            sender: sender.clone(),
            receiver: receiver.clone(),
        };
        Ok(store.append_message(&chat_id, draft).await?)
    }
}
