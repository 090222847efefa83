//! Cross-instance coordination through a shared runtime directory: session
//! marker files, duplicate-login detection, stale-session sweeping and the
//! command files an administrator drops to clear the way.

use std::time::{Duration, SystemTime};

use filetime::FileTime;
use uuid::Uuid;

use ordesk::ipc::{CommandChannel, InstanceContext, SessionKind, SessionRegistry};

fn instance(hostname: &str) -> InstanceContext {
    InstanceContext {
        session_id: Uuid::new_v4(),
        hostname: hostname.to_string(),
    }
}

#[tokio::test]
async fn test_instances_see_each_other_but_not_themselves() {
    let dir = tempfile::tempdir().expect("temp dir");
    let first = SessionRegistry::new(dir.path(), instance("posto-01"));
    let second = SessionRegistry::new(dir.path(), instance("posto-02"));

    first.register("ana", SessionKind::App).await.unwrap();
    second.register("ana", SessionKind::App).await.unwrap();

    let seen = first
        .already_logged_in("ana", false)
        .await
        .expect("duplicate login visible");
    assert_eq!(seen.hostname, "posto-02");
    assert_eq!(seen.session_id, second.session_id());

    let seen = second
        .already_logged_in("ana", false)
        .await
        .expect("duplicate login visible");
    assert_eq!(seen.hostname, "posto-01");

    assert!(first.already_logged_in("rui", false).await.is_none());
    assert_eq!(first.active_sessions().await.len(), 2);
}

#[tokio::test]
async fn test_admin_tool_sessions_can_be_ignored() {
    let dir = tempfile::tempdir().expect("temp dir");
    let app = SessionRegistry::new(dir.path(), instance("posto-01"));
    let admin = SessionRegistry::new(dir.path(), instance("posto-09"));

    app.register("ana", SessionKind::App).await.unwrap();
    admin.register("ana", SessionKind::AdminTool).await.unwrap();

    assert!(app.already_logged_in("ana", true).await.is_none());
    let seen = app
        .already_logged_in("ana", false)
        .await
        .expect("admin tool counts when not ignored");
    assert_eq!(seen.kind, SessionKind::AdminTool);

    assert!(app.admin_session_elsewhere("ana").await.is_some());
    // The admin tool never reports itself.
    assert!(admin.admin_session_elsewhere("ana").await.is_none());
}

#[tokio::test]
async fn test_terminate_is_idempotent() {
    let dir = tempfile::tempdir().expect("temp dir");
    let first = SessionRegistry::new(dir.path(), instance("posto-01"));
    let second = SessionRegistry::new(dir.path(), instance("posto-02"));

    first.register("ana", SessionKind::App).await.unwrap();

    second.terminate(first.session_id()).await.unwrap();
    second.terminate(first.session_id()).await.unwrap();

    assert!(second.active_sessions().await.is_empty());
}

#[tokio::test]
async fn test_stale_sessions_are_swept() {
    let dir = tempfile::tempdir().expect("temp dir");
    let stale = SessionRegistry::new(dir.path(), instance("posto-01"));
    let fresh = SessionRegistry::new(dir.path(), instance("posto-02"));

    stale.register("ana", SessionKind::App).await.unwrap();
    fresh.register("rui", SessionKind::App).await.unwrap();

    let stale_file = stale
        .sessions_dir()
        .join(format!("{}.session", stale.session_id()));
    let past = SystemTime::now() - Duration::from_secs(600);
    filetime::set_file_mtime(&stale_file, FileTime::from_system_time(past)).unwrap();

    assert_eq!(fresh.cleanup_inactive(Duration::from_secs(120)).await, 1);

    let remaining = fresh.active_sessions().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].user, "rui");
}

#[tokio::test]
async fn test_admin_shutdown_signals_then_removes_sessions() {
    let dir = tempfile::tempdir().expect("temp dir");
    let commands = CommandChannel::new(dir.path());
    let app = SessionRegistry::new(dir.path(), instance("posto-01"));
    let admin = SessionRegistry::new(dir.path(), instance("posto-09"));

    app.register("ana", SessionKind::App).await.unwrap();

    assert_eq!(admin.shutdown_sessions_for_user("ana", &commands).await, 1);

    // The targeted instance finds its shutdown order exactly once.
    assert!(commands.take_session_shutdown(app.session_id()).await);
    assert!(!commands.take_session_shutdown(app.session_id()).await);

    assert!(admin.active_sessions().await.is_empty());
}
