
use pairchat_client::{AuthProvider, ChatSession, ChatStore, FeedEvent, SessionConfig, StaticAuth};
use pairchat_messaging::{ChatId, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use support::{alice_session, profile, session_user, settle, wait_for_view, ALICE, BOB, CAROL};

#[tokio::test]
async fn directory_excludes_self_and_tracks_registrations_live() -> anyhow::Result<()> {
    let (store, _auth, session) = alice_session().await?;

    let view = wait_for_view(&session, |view| view.users.len() == 2).await?;
    let uids: Vec<_> = view.users.iter().map(|u| u.uid.as_str()).collect();
    assert_eq!(uids, [BOB, CAROL]);

    store.register_user(profile("dave-uid", "Dave")).await;
    let view = wait_for_view(&session, |view| view.users.len() == 3).await?;
    assert_eq!(view.users[2].name, "Dave");

    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn search_is_opt_in_and_case_insensitive() -> anyhow::Result<()> {
    let (_store, _auth, session) = alice_session().await?;
    wait_for_view(&session, |view| view.users.len() == 2).await?;

    session.search("AR").await?;
    let view = wait_for_view(&session, |view| !view.filtered_users.is_empty()).await?;
    let names: Vec<_> = view.filtered_users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["Carol"]);

    session.search("").await?;
    let view = wait_for_view(&session, |view| view.filtered_users.is_empty()).await?;
    assert_eq!(view.users.len(), 2);

    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn send_appends_exactly_one_visible_message() -> anyhow::Result<()> {
    let (store, _auth, session) = alice_session().await?;
    wait_for_view(&session, |view| view.users.len() == 2).await?;

    session.select(profile(BOB, "Bob")).await?;
    session.set_draft("hi").await?;
    session.send().await?;

    let chat_id = ChatId::for_pair(&UserId::new(ALICE), &UserId::new(BOB))?;
    let mut feed = store.subscribe_messages(&chat_id).await?;
    let Some(FeedEvent::Snapshot(messages)) = feed.next_event().await else {
        panic!("expected snapshot");
    };
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "hi");
    assert_eq!(messages[0].sender, UserId::new(ALICE));
    assert_eq!(messages[0].receiver, UserId::new(BOB));

    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn messages_flow_live_in_both_directions() -> anyhow::Result<()> {
    let (store, _auth, alice) = alice_session().await?;
    wait_for_view(&alice, |view| view.users.len() == 2).await?;

    let bob_auth = Arc::new(StaticAuth::signed_in(session_user(BOB, "Bob")));
    let bob = ChatSession::start(
        SessionConfig::default(),
        bob_auth as Arc<dyn AuthProvider>,
        Arc::new(store.clone()),
    )
    .await?;

    alice.select(profile(BOB, "Bob")).await?;
    bob.select(profile(ALICE, "Alice")).await?;

    alice.set_draft("hello bob").await?;
    alice.send().await?;
    wait_for_view(&bob, |view| view.messages.len() == 1).await?;

    bob.set_draft("hello alice").await?;
    bob.send().await?;

    let alice_view = wait_for_view(&alice, |view| view.messages.len() == 2).await?;
    let texts: Vec<_> = alice_view.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["hello bob", "hello alice"]);
    assert!(alice_view.messages[0].timestamp_ms < alice_view.messages[1].timestamp_ms);
    assert!(alice_view.messages[0].is_from(&UserId::new(ALICE)));
    assert!(!alice_view.messages[1].is_from(&UserId::new(ALICE)));

    alice.shutdown().await?;
    bob.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn switching_conversations_never_leaks_stale_messages() -> anyhow::Result<()> {
    let (store, _auth, session) = alice_session().await?;
    wait_for_view(&session, |view| view.users.len() == 2).await?;

    session.select(profile(BOB, "Bob")).await?;
    session.set_draft("first").await?;
    session.send().await?;
    wait_for_view(&session, |view| view.messages.len() == 1).await?;

    // Switch to Carol; a message for the Bob conversation lands afterwards.
    session.select(profile(CAROL, "Carol")).await?;
    wait_for_view(&session, |view| view.messages.is_empty()).await?;

    let bob_chat = ChatId::for_pair(&UserId::new(ALICE), &UserId::new(BOB))?;
    store
        .append_message(
            &bob_chat,
            pairchat_messaging::MessageDraft {
                text: "late".into(),
                sender: UserId::new(BOB),
                receiver: UserId::new(ALICE),
            },
        )
        .await?;
    settle().await;

    let view = session.view();
    assert_eq!(view.selected_user.as_ref().map(|u| u.uid.as_str()), Some(CAROL));
    assert!(view.messages.is_empty(), "stale message leaked into Carol's view");

    // Returning to Bob replays the full log, each message exactly once.
    session.select(profile(BOB, "Bob")).await?;
    let view = wait_for_view(&session, |view| view.messages.len() == 2).await?;
    let texts: Vec<_> = view.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["first", "late"]);
    let ids: HashSet<_> = view.messages.iter().map(|m| m.id).collect();
    assert_eq!(ids.len(), 2);

    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn emoji_appends_to_draft_before_send() -> anyhow::Result<()> {
    let (_store, _auth, session) = alice_session().await?;
    wait_for_view(&session, |view| view.users.len() == 2).await?;

    session.select(profile(BOB, "Bob")).await?;
    session.set_draft("hello").await?;
    session.push_emoji("😊").await?;
    let view = wait_for_view(&session, |view| view.composer.draft == "hello😊").await?;
    assert!(view.composer.last_error.is_none());

    session.send().await?;
    let view = wait_for_view(&session, |view| view.messages.len() == 1).await?;
    assert_eq!(view.messages[0].text, "hello😊");
    assert_eq!(view.composer.draft, "");

    session.shutdown().await?;
    Ok(())
}
