use super::composer::MessageComposer;
use super::directory::UserDirectory;
use super::stream::ConversationStream;
use super::{ChatView, SessionCommand, SessionError};
use crate::auth::{AuthProvider, SessionEvent, SessionUser};
use crate::store::{ChatStore, FeedEvent};
use pairchat_messaging::{ChatId, Message, UserProfile};
use std::future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, warn};

/// Owns all session state and drives it from a single `select!` loop, so no
/// locking is needed: every mutation happens on this task, triggered by a
/// presentation intent or an upstream notification.
pub(crate) struct SessionRuntime {
    current: SessionUser,
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn ChatStore>,
    directory: UserDirectory,
    stream: Option<ConversationStream>,
    composer: MessageComposer,
    selected: Option<UserProfile>,
    search_term: String,
    select_error: Option<String>,
    command_rx: mpsc::Receiver<SessionCommand>,
    view_tx: watch::Sender<ChatView>,
    auth_events: Option<broadcast::Receiver<SessionEvent>>,
}

enum Tick {
    Command(Option<SessionCommand>),
    Directory(Option<FeedEvent<UserProfile>>),
    Stream(Option<(ChatId, FeedEvent<Message>)>),
    Auth(Result<SessionEvent, broadcast::error::RecvError>),
}

impl SessionRuntime {
    pub(crate) fn new(
        current: SessionUser,
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn ChatStore>,
        directory: UserDirectory,
        command_rx: mpsc::Receiver<SessionCommand>,
        view_tx: watch::Sender<ChatView>,
        auth_events: broadcast::Receiver<SessionEvent>,
    ) -> Self {
        Self {
            current,
            auth,
            store,
            directory,
            stream: None,
            composer: MessageComposer::new(),
            selected: None,
            search_term: String::new(),
            select_error: None,
            command_rx,
            view_tx,
            auth_events: Some(auth_events),
        }
    }

    pub(crate) async fn run(mut self) {
        self.publish_view();

        loop {
            let tick = {
                let Self {
                    command_rx,
                    directory,
                    stream,
                    auth_events,
                    ..
                } = &mut self;

                tokio::select! {
                    command = command_rx.recv() => Tick::Command(command),
                    event = directory.next_event() => Tick::Directory(event),
                    event = next_stream_event(stream) => Tick::Stream(event),
                    event = next_auth_event(auth_events) => Tick::Auth(event),
                }
            };

            match tick {
                // All session handles dropped.
                Tick::Command(None) => break,
                Tick::Command(Some(command)) => {
                    if self.handle_command(command).await {
                        break;
                    }
                }
                Tick::Directory(Some(event)) => {
                    self.directory.apply(event);
                    self.publish_view();
                }
                Tick::Directory(None) => {}
                Tick::Stream(Some((chat_id, event))) => self.apply_stream_event(chat_id, event),
                Tick::Stream(None) => {}
                Tick::Auth(Ok(SessionEvent::SignedOut)) => {
                    debug!("session signed out upstream");
                    break;
                }
                Tick::Auth(Err(broadcast::error::RecvError::Lagged(_))) => {}
                Tick::Auth(Err(broadcast::error::RecvError::Closed)) => {
                    self.auth_events = None;
                }
            }
        }
        // Dropping the runtime releases the directory and stream feeds.
    }

    /// Returns `true` when the runtime should stop.
    async fn handle_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Select(user) => {
                self.select_user(user).await;
                self.publish_view();
            }
            SessionCommand::Search(term) => {
                self.search_term = term;
                self.publish_view();
            }
            SessionCommand::SetDraft(text) => {
                self.composer.set_draft(text);
                self.publish_view();
            }
            SessionCommand::PushEmoji(emoji) => {
                self.composer.push_emoji(&emoji);
                self.publish_view();
            }
            SessionCommand::Send { responder } => {
                let recipient = self.selected.as_ref().map(|user| &user.uid);
                let outcome = self
                    .composer
                    .submit(self.store.as_ref(), &self.current.uid, recipient)
                    .await;
                let _ = responder.send(outcome.map_err(SessionError::from));
                self.publish_view();
            }
            SessionCommand::SignOut { responder } => {
                let outcome = self.auth.sign_out().await.map_err(SessionError::from);
                let stop = outcome.is_ok();
                let _ = responder.send(outcome);
                return stop;
            }
            SessionCommand::Shutdown(ack) => {
                let _ = ack.send(());
                return true;
            }
        }
        false
    }

    /// Move selection to `user` and rebind the message subscription: the
    /// superseded subscription is dropped before the new one is opened.
    async fn select_user(&mut self, user: UserProfile) {
        if user.uid == self.current.uid {
            warn!(uid = %user.uid, "ignoring selection of the session's own user");
            return;
        }

        self.stream = None;
        self.selected = Some(user.clone());
        match ConversationStream::open(self.store.as_ref(), &self.current.uid, &user.uid).await {
            Ok(stream) => {
                self.select_error = None;
                self.stream = Some(stream);
            }
            Err(err) => {
                warn!(%err, uid = %user.uid, "failed to open conversation stream");
                self.select_error = Some(err.to_string());
            }
        }
    }

    fn apply_stream_event(&mut self, chat_id: ChatId, event: FeedEvent<Message>) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        // Stale notifications from a superseded subscription are discarded,
        // never reordered into the active view.
        if stream.chat_id() != &chat_id {
            debug!(stale = %chat_id, active = %stream.chat_id(), "discarding stale notification");
            return;
        }
        stream.apply(event);
        self.publish_view();
    }

    fn publish_view(&self) {
        let messages = self
            .stream
            .as_ref()
            .map(|stream| stream.messages().to_vec())
            .unwrap_or_default();
        let sync_error = self
            .select_error
            .clone()
            .or_else(|| {
                self.stream
                    .as_ref()
                    .and_then(|stream| stream.sync_error())
                    .map(str::to_owned)
            })
            .or_else(|| self.directory.sync_error().map(str::to_owned));

        let view = ChatView {
            users: self.directory.users().to_vec(),
            filtered_users: self.directory.filter(&self.search_term),
            selected_user: self.selected.clone(),
            messages,
            composer: self.composer.state(),
            sync_error,
        };
        let _ = self.view_tx.send(view);
    }
}

async fn next_stream_event(
    stream: &mut Option<ConversationStream>,
) -> Option<(ChatId, FeedEvent<Message>)> {
    match stream.as_mut() {
        Some(active) => active.next_event().await,
        None => future::pending().await,
    }
}

async fn next_auth_event(
    events: &mut Option<broadcast::Receiver<SessionEvent>>,
) -> Result<SessionEvent, broadcast::error::RecvError> {
    match events.as_mut() {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}
