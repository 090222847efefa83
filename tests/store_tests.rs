//! End-to-end tests over a real on-disk data directory: the registry with its
//! per-user shards, record mutations flowing through the cached query layer,
//! schema upgrades on legacy shards and the account lifecycle.

use std::sync::Arc;

use sea_orm::ConnectionTrait;

use ordesk::config::StorageConfig;
use ordesk::db::{RecordData, RecordFilter, StoreRegistry, UserStore};
use ordesk::domain::{self, UserSlug};
use ordesk::services::{
    LoginOutcome, MaintenanceService, NewRecord, QueryService, RecordError, RecordPatch,
    RecordService, UserError, UserService,
};

struct TestStores {
    // Held so the directory outlives the registry.
    _dir: tempfile::TempDir,
    registry: Arc<StoreRegistry>,
    queries: Arc<QueryService>,
    records: RecordService,
    users: UserService,
}

async fn spawn_stores() -> TestStores {
    let dir = tempfile::tempdir().expect("temp dir");
    let storage = StorageConfig {
        data_dir: dir.path().join("database").display().to_string(),
        ..StorageConfig::default()
    };

    let registry = Arc::new(StoreRegistry::open(&storage).await.expect("open registry"));
    let queries = Arc::new(QueryService::new(Arc::clone(&registry)));
    let records = RecordService::new(Arc::clone(&registry), Arc::clone(&queries));
    let users = UserService::new(Arc::clone(&registry), Arc::clone(&queries));

    TestStores {
        _dir: dir,
        registry,
        queries,
        records,
        users,
    }
}

fn order(user: &str, client: &str, order_ref: &str, value: &str) -> NewRecord {
    NewRecord {
        user: user.to_string(),
        client: client.to_string(),
        order_ref: order_ref.to_string(),
        item_count: "3".to_string(),
        entry_date: "2025-01-10".to_string(),
        process_date: String::new(),
        cut_time: String::new(),
        notes: String::new(),
        order_value: value.to_string(),
    }
}

fn filter_for(user: &str) -> RecordFilter {
    RecordFilter {
        user: Some(user.to_string()),
        ..RecordFilter::default()
    }
}

#[tokio::test]
async fn test_written_records_show_up_in_cached_listings() {
    let stores = spawn_stores().await;
    let filter = filter_for("Ana");

    assert!(stores.queries.list_records(&filter).await.unwrap().is_empty());

    stores
        .records
        .add_record(order("Ana", "Padaria Central", "FO-1001", "123,45"))
        .await
        .unwrap();

    // The empty listing above was cached; the write must invalidate it.
    let rows = stores.queries.list_records(&filter).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user, "Ana");
    assert_eq!(rows[0].client, "Padaria Central");
    assert!((rows[0].order_value - 123.45).abs() < f64::EPSILON);

    stores
        .records
        .add_record(order("Ana", "Padaria Central", "FO-1002", "67.80"))
        .await
        .unwrap();
    assert_eq!(stores.queries.list_records(&filter).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_rejected_record_leaves_shard_untouched() {
    let stores = spawn_stores().await;

    let mut input = order("Ana", "Padaria Central", "FO-1001", "50");
    input.item_count = "0".to_string();

    let err = stores.records.add_record(input).await.unwrap_err();
    assert!(matches!(err, RecordError::Validation(msg) if msg.contains("positive")));

    let rows = stores.queries.list_records(&filter_for("Ana")).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_update_merges_patch_over_existing_row() {
    let stores = spawn_stores().await;

    let key = stores
        .records
        .add_record(order("Ana", "Padaria Central", "FO-1001", "100"))
        .await
        .unwrap()
        .encode();

    let patch = RecordPatch {
        order_value: Some("200".to_string()),
        notes: Some("urgente".to_string()),
        ..RecordPatch::default()
    };
    stores.records.update_record(&key, patch).await.unwrap();

    let row = stores.records.get_record(&key).await.unwrap();
    assert!((row.order_value - 200.0).abs() < f64::EPSILON);
    assert_eq!(row.notes.as_deref(), Some("urgente"));
    // untouched fields survive the patch
    assert_eq!(row.client, "Padaria Central");
    assert_eq!(row.order_ref, "FO-1001");
}

#[tokio::test]
async fn test_delete_reports_not_found_the_second_time() {
    let stores = spawn_stores().await;

    let key = stores
        .records
        .add_record(order("Ana", "Padaria Central", "FO-1001", "100"))
        .await
        .unwrap()
        .encode();

    stores.records.delete_record(&key).await.unwrap();
    assert!(matches!(
        stores.records.delete_record(&key).await.unwrap_err(),
        RecordError::NotFound
    ));
    assert!(matches!(
        stores.records.get_record(&key).await.unwrap_err(),
        RecordError::NotFound
    ));
    assert!(matches!(
        stores.records.get_record("no-separator").await.unwrap_err(),
        RecordError::BadKey(_)
    ));
}

#[tokio::test]
async fn test_aggregates_ignore_pagination() {
    let stores = spawn_stores().await;

    for (order_ref, items, value) in [("FO-1", "1", "10"), ("FO-2", "2", "20"), ("FO-3", "3", "30")]
    {
        let mut input = order("Ana", "Padaria Central", order_ref, value);
        input.item_count = items.to_string();
        stores.records.add_record(input).await.unwrap();
    }

    let filter = RecordFilter {
        user: Some("Ana".to_string()),
        limit: Some(1),
        ..RecordFilter::default()
    };

    assert_eq!(stores.queries.list_records(&filter).await.unwrap().len(), 1);

    let totals = stores.queries.aggregate_stats(&filter).await.unwrap();
    assert_eq!(totals.total_records, 3);
    assert_eq!(totals.total_items, 6);
    assert!((totals.total_value - 60.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_listings_follow_the_account_lifecycle() {
    let stores = spawn_stores().await;

    stores.users.create_user("Ana", "1234", false).await.unwrap();
    stores.users.create_user("Rui", "1234", false).await.unwrap();
    stores
        .records
        .add_record(order("Ana", "Padaria Central", "FO-1", "10"))
        .await
        .unwrap();
    stores
        .records
        .add_record(order("Rui", "Confeitaria Lima", "FO-2", "20"))
        .await
        .unwrap();

    // No user filter: every active account's shard is consulted.
    let all = RecordFilter::default();
    assert_eq!(stores.queries.list_records(&all).await.unwrap().len(), 2);

    stores.users.archive_user("Rui").await.unwrap();
    let rows = stores.queries.list_records(&all).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user, "Ana");

    // The shard file itself moved into the archived namespace.
    let slug = UserSlug::from_name("Rui");
    assert!(
        stores
            .registry
            .data_dir()
            .join(slug.archived_db_file_name())
            .exists()
    );
    assert!(!domain::user_db_path(stores.registry.data_dir(), &slug).exists());

    stores.users.restore_user("Rui").await.unwrap();
    assert_eq!(stores.queries.list_records(&all).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_shard_scan_separates_active_archived_and_orphan_files() {
    let stores = spawn_stores().await;

    stores.users.create_user("Ana", "1234", false).await.unwrap();
    stores.users.create_user("Rui", "1234", false).await.unwrap();

    // A shard left behind by an account that no longer exists.
    let stray = stores.registry.data_dir().join("usuario_fantasma-00000000.db");
    std::fs::write(&stray, b"").unwrap();

    assert_eq!(stores.registry.user_database_files(false).await.unwrap().len(), 2);
    assert_eq!(stores.registry.user_database_files(true).await.unwrap().len(), 3);

    assert_eq!(stores.registry.cleanup_orphan_databases().await.unwrap(), 1);
    assert!(!stray.exists());
    assert_eq!(stores.registry.user_database_files(true).await.unwrap().len(), 2);

    stores.users.archive_user("Rui").await.unwrap();

    let active: Vec<_> = stores
        .registry
        .user_database_files(false)
        .await
        .unwrap()
        .into_iter()
        .map(|(slug, _)| slug)
        .collect();
    assert_eq!(active, vec![UserSlug::from_name("Ana")]);

    // The wide scan still sees Rui's shard under its archived name.
    let everything = stores.registry.user_database_files(true).await.unwrap();
    assert_eq!(everything.len(), 2);
    assert!(
        everything
            .iter()
            .any(|(slug, path)| *slug == UserSlug::from_name("Rui")
                && path.ends_with(slug.archived_db_file_name()))
    );
}

#[tokio::test]
async fn test_login_covers_archive_and_reset_states() {
    let stores = spawn_stores().await;

    stores
        .users
        .create_user("Marta", "abcd", false)
        .await
        .unwrap();

    match stores.users.verify_login("Marta", "abcd").await.unwrap() {
        LoginOutcome::Success(account) => {
            assert_eq!(account.name, "Marta");
            assert!(!account.is_admin);
        }
        other => panic!("expected success, got {other:?}"),
    }
    assert!(matches!(
        stores.users.verify_login("Marta", "wrong").await.unwrap(),
        LoginOutcome::InvalidCredentials
    ));
    assert!(matches!(
        stores.users.verify_login("Nobody", "abcd").await.unwrap(),
        LoginOutcome::InvalidCredentials
    ));

    stores.users.archive_user("Marta").await.unwrap();
    assert!(matches!(
        stores.users.verify_login("Marta", "abcd").await.unwrap(),
        LoginOutcome::Inactive
    ));
    stores.users.restore_user("Marta").await.unwrap();

    stores.users.reset_password("Marta").await.unwrap();
    assert!(stores.users.password_reset_pending("Marta").await.unwrap());
    assert!(matches!(
        stores.users.verify_login("Marta", "abcd").await.unwrap(),
        LoginOutcome::ResetRequired
    ));

    stores
        .users
        .complete_password_reset("Marta", "nova-senha")
        .await
        .unwrap();
    assert!(matches!(
        stores.users.verify_login("Marta", "nova-senha").await.unwrap(),
        LoginOutcome::Success(_)
    ));
}

#[tokio::test]
async fn test_account_creation_guards() {
    let stores = spawn_stores().await;

    stores.users.create_user("Ana", "1234", false).await.unwrap();
    assert!(matches!(
        stores.users.create_user("Ana", "5678", false).await.unwrap_err(),
        UserError::Duplicate
    ));

    assert!(matches!(
        stores.users.create_user("Rui", "abc", false).await.unwrap_err(),
        UserError::Validation(_)
    ));

    assert!(!stores.users.admin_exists().await.unwrap());
    stores.users.create_user("Chefe", "1234", true).await.unwrap();
    assert!(stores.users.admin_exists().await.unwrap());
    assert!(matches!(
        stores.users.archive_user("Chefe").await.unwrap_err(),
        UserError::Forbidden
    ));
}

#[tokio::test]
async fn test_auto_maintenance_runs_once_per_interval() {
    let stores = spawn_stores().await;
    let runtime_dir = stores._dir.path().join("runtime");

    stores.users.create_user("Ana", "1234", false).await.unwrap();

    let maintenance =
        MaintenanceService::new(Arc::clone(&stores.registry), runtime_dir.clone(), 7);

    assert!(maintenance.run_auto_maintenance().await.unwrap());
    assert!(runtime_dir.join("last_optimization.txt").exists());
    // A second run inside the interval is skipped.
    assert!(!maintenance.run_auto_maintenance().await.unwrap());
}

#[tokio::test]
async fn test_legacy_shard_gains_cut_time_column_on_open() {
    let dir = tempfile::tempdir().expect("temp dir");
    let slug = UserSlug::from_name("Maria");
    let db_path = domain::user_db_path(dir.path(), &slug);

    // A shard from before cut times were tracked: same table, one column short.
    let conn = sea_orm::Database::connect(format!("sqlite://{}?mode=rwc", db_path.display()))
        .await
        .expect("create legacy shard");
    conn.execute_unprepared(
        "CREATE TABLE order_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            user_name TEXT NOT NULL,
            client_name TEXT NOT NULL,
            order_ref TEXT NOT NULL,
            item_count INTEGER NOT NULL,
            entry_date TEXT NOT NULL,
            process_date TEXT,
            notes TEXT,
            order_value REAL NOT NULL,
            created_at TEXT NOT NULL
        )",
    )
    .await
    .expect("legacy schema");
    conn.close().await.expect("close legacy connection");

    let store = UserStore::new(&db_path, slug).await.expect("open upgraded shard");

    let id = store
        .records()
        .insert(RecordData {
            user_name: "Maria".to_string(),
            client_name: "Padaria Central".to_string(),
            order_ref: "FO-9".to_string(),
            item_count: 2,
            entry_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            process_date: None,
            cut_time: Some("07:30:00".to_string()),
            notes: None,
            order_value: 80.0,
        })
        .await
        .expect("insert into upgraded shard");

    let row = store.records().find(id).await.unwrap().expect("row exists");
    assert_eq!(row.cut_time.as_deref(), Some("07:30:00"));
    store.close().await.unwrap();
}
