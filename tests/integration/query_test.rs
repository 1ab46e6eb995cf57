//! Query execution integration tests.
//!
//! Tests statement execution through the connection manager on SQLite.

use dbpane::config::ConnectionConfig;
use dbpane::db::{BackendKind, QueryResult, Value};
use dbpane::output::{render, OutputFormat};
use dbpane::{ConnectionManager, DbError};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Helper to create a manager connected to a fresh SQLite file.
async fn get_test_manager() -> (ConnectionManager, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = ConnectionConfig {
        database: Some(dir.path().join("test.db").to_string_lossy().to_string()),
        ..Default::default()
    };
    let mut manager = ConnectionManager::new();
    manager.connect(BackendKind::Sqlite, &config).await.unwrap();
    (manager, dir)
}

async fn seed_users(manager: &mut ConnectionManager) {
    manager
        .execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL, name TEXT)",
            &[],
        )
        .await
        .unwrap();
    for (email, name) in [
        ("alice@example.com", Value::from("Alice")),
        ("bob@example.com", Value::Null),
    ] {
        manager
            .execute(
                "INSERT INTO users (email, name) VALUES (?, ?)",
                &[Value::from(email), name],
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_insert_then_select() {
    let (mut manager, _dir) = get_test_manager().await;
    manager
        .execute("CREATE TABLE t (id INTEGER)", &[])
        .await
        .unwrap();

    let result = manager.execute("INSERT INTO t VALUES (1)", &[]).await.unwrap();
    assert!(matches!(
        result,
        QueryResult::Acknowledged { rows_affected: 1, .. }
    ));

    let result = manager.execute("SELECT * FROM t", &[]).await.unwrap();
    assert_eq!(result.rows().unwrap().rows, vec![vec![Value::Int(1)]]);

    manager.close().await.unwrap();
}

#[tokio::test]
async fn test_select_with_null() {
    let (mut manager, _dir) = get_test_manager().await;
    seed_users(&mut manager).await;

    let result = manager
        .execute("SELECT id, email, name FROM users ORDER BY id", &[])
        .await
        .unwrap();
    let rows = result.rows().unwrap();

    let names: Vec<&str> = rows.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "email", "name"]);
    assert_eq!(rows.row_count, 2);
    assert_eq!(rows.rows[1][2], Value::Null);
    assert_eq!(
        rows.render_lines(),
        vec![
            "(1, alice@example.com, Alice)".to_string(),
            "(2, bob@example.com, NULL)".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_bound_parameter_filters() {
    let (mut manager, _dir) = get_test_manager().await;
    seed_users(&mut manager).await;

    let result = manager
        .execute(
            "SELECT email FROM users WHERE name = ?",
            &[Value::from("Alice")],
        )
        .await
        .unwrap();

    assert_eq!(
        result.rows().unwrap().rows,
        vec![vec![Value::from("alice@example.com")]]
    );
}

#[tokio::test]
async fn test_parameter_text_is_not_interpolated() {
    let (mut manager, _dir) = get_test_manager().await;
    seed_users(&mut manager).await;

    let result = manager
        .execute(
            "SELECT COUNT(*) FROM users WHERE name = ?",
            &[Value::from("x' OR '1'='1")],
        )
        .await
        .unwrap();

    assert_eq!(result.rows().unwrap().rows, vec![vec![Value::Int(0)]]);
}

#[tokio::test]
async fn test_update_reports_affected_rows() {
    let (mut manager, _dir) = get_test_manager().await;
    seed_users(&mut manager).await;

    let result = manager
        .execute("UPDATE users SET name = 'x'", &[])
        .await
        .unwrap();

    assert_eq!(render(&result, OutputFormat::Text).unwrap(), "OK, 2 row(s) affected");
}

#[tokio::test]
async fn test_query_error_keeps_session_usable() {
    let (mut manager, _dir) = get_test_manager().await;

    let err = manager
        .execute("SELECT * FROM nonexistent_table_xyz", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Query(ref msg) if msg.contains("nonexistent_table_xyz")));

    let result = manager.execute("SELECT 1", &[]).await.unwrap();
    assert_eq!(result.rows().unwrap().rows, vec![vec![Value::Int(1)]]);
}

#[tokio::test]
async fn test_json_output() {
    let (mut manager, _dir) = get_test_manager().await;

    let result = manager
        .execute("SELECT ? AS x", &[Value::Int(42)])
        .await
        .unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&render(&result, OutputFormat::Json).unwrap()).unwrap();

    assert_eq!(json["columns"][0]["name"], "x");
    assert_eq!(json["rows"][0][0], 42);
    assert_eq!(json["row_count"], 1);
}

#[tokio::test]
async fn test_reconnect_sees_committed_data() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConnectionConfig {
        database: Some(dir.path().join("shared.db").to_string_lossy().to_string()),
        ..Default::default()
    };
    let mut manager = ConnectionManager::new();

    manager.connect(BackendKind::Sqlite, &config).await.unwrap();
    manager
        .execute("CREATE TABLE t (id INTEGER)", &[])
        .await
        .unwrap();
    manager.execute("INSERT INTO t VALUES (5)", &[]).await.unwrap();

    manager.connect(BackendKind::Sqlite, &config).await.unwrap();
    let result = manager.execute("SELECT id FROM t", &[]).await.unwrap();

    assert_eq!(result.rows().unwrap().rows, vec![vec![Value::Int(5)]]);
}
