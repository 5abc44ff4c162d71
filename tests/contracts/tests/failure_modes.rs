
use pairchat_client::{AuthProvider, ComposeError, SessionError};
use support::{alice_session, profile, settle, wait_for_view, BOB};

#[tokio::test]
async fn empty_draft_is_rejected_locally() -> anyhow::Result<()> {
    let (_store, _auth, session) = alice_session().await?;
    wait_for_view(&session, |view| view.users.len() == 2).await?;

    session.select(profile(BOB, "Bob")).await?;
    session.set_draft("   ").await?;
    let err = session.send().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Compose(ComposeError::EmptyMessage)
    ));

    let view = wait_for_view(&session, |view| view.composer.last_error.is_some()).await?;
    assert!(view.messages.is_empty());

    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn send_without_selection_is_rejected() -> anyhow::Result<()> {
    let (_store, _auth, session) = alice_session().await?;
    wait_for_view(&session, |view| view.users.len() == 2).await?;

    session.set_draft("hi").await?;
    let err = session.send().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Compose(ComposeError::NoRecipient)
    ));

    let view = session.view();
    assert_eq!(view.composer.draft, "hi");

    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn failed_append_keeps_draft_for_manual_retry() -> anyhow::Result<()> {
    let (store, _auth, session) = alice_session().await?;
    wait_for_view(&session, |view| view.users.len() == 2).await?;

    session.select(profile(BOB, "Bob")).await?;
    session.set_draft("hi bob").await?;

    store.fail_next_append();
    let err = session.send().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Compose(ComposeError::AppendFailed(_))
    ));

    let view = wait_for_view(&session, |view| view.composer.last_error.is_some()).await?;
    assert_eq!(view.composer.draft, "hi bob");
    assert!(view.messages.is_empty());

    // The store recovered; the preserved draft goes through unchanged.
    session.send().await?;
    let view = wait_for_view(&session, |view| view.messages.len() == 1).await?;
    assert_eq!(view.messages[0].text, "hi bob");
    assert_eq!(view.composer.draft, "");
    assert!(view.composer.last_error.is_none());

    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn feed_error_shows_indicator_and_keeps_last_synced_view() -> anyhow::Result<()> {
    let (store, _auth, session) = alice_session().await?;
    wait_for_view(&session, |view| view.users.len() == 2).await?;

    session.select(profile(BOB, "Bob")).await?;
    session.set_draft("hi").await?;
    session.send().await?;
    wait_for_view(&session, |view| view.messages.len() == 1).await?;

    let chat_id = pairchat_messaging::ChatId::for_pair(
        &pairchat_messaging::UserId::new(support::ALICE),
        &pairchat_messaging::UserId::new(BOB),
    )?;
    store.push_feed_error(&chat_id, "backend unavailable").await;

    let view = wait_for_view(&session, |view| view.sync_error.is_some()).await?;
    assert_eq!(view.messages.len(), 1, "synced view was discarded");

    // A later good snapshot clears the indicator.
    session.set_draft("again").await?;
    session.send().await?;
    let view = wait_for_view(&session, |view| view.sync_error.is_none()).await?;
    assert_eq!(view.messages.len(), 2);

    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn users_feed_error_keeps_directory_visible() -> anyhow::Result<()> {
    let (store, _auth, session) = alice_session().await?;
    wait_for_view(&session, |view| view.users.len() == 2).await?;

    store.push_users_error("backend unavailable");
    let view = wait_for_view(&session, |view| view.sync_error.is_some()).await?;
    assert_eq!(view.users.len(), 2, "directory was discarded");

    store.register_user(profile("dave-uid", "Dave")).await;
    let view = wait_for_view(&session, |view| view.sync_error.is_none()).await?;
    assert_eq!(view.users.len(), 3);

    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn shutdown_releases_every_subscription() -> anyhow::Result<()> {
    let (store, _auth, session) = alice_session().await?;
    wait_for_view(&session, |view| view.users.len() == 2).await?;

    session.select(profile(BOB, "Bob")).await?;
    wait_for_view(&session, |view| view.selected_user.is_some()).await?;
    settle().await;
    assert_eq!(store.live_feeds(), 2);

    session.shutdown().await?;
    settle().await;
    assert_eq!(store.live_feeds(), 0);
    Ok(())
}

#[tokio::test]
async fn sign_out_stops_the_session() -> anyhow::Result<()> {
    let (store, auth, session) = alice_session().await?;
    wait_for_view(&session, |view| view.users.len() == 2).await?;

    session.sign_out().await?;
    settle().await;

    assert!(auth.current_user().is_none());
    assert_eq!(store.live_feeds(), 0);
    assert!(matches!(
        session.select(profile(BOB, "Bob")).await,
        Err(SessionError::Closed)
    ));
    Ok(())
}

#[tokio::test]
async fn upstream_sign_out_stops_the_session() -> anyhow::Result<()> {
    let (store, auth, session) = alice_session().await?;
    wait_for_view(&session, |view| view.users.len() == 2).await?;

    // Provider-side sign-out, e.g. from another tab.
    auth.sign_out().await?;
    settle().await;

    assert_eq!(store.live_feeds(), 0);
    assert!(matches!(
        session.search("al").await,
        Err(SessionError::Closed)
    ));
    Ok(())
}
