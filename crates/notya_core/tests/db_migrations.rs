use notya_core::db::migrations::{apply_migrations, latest_version};
use notya_core::db::{open_db, open_db_in_memory, DbError};
use notya_core::{DocumentStore, RemoteDocument, SqliteDocumentStore};
use rusqlite::Connection;

#[test]
fn in_memory_store_has_document_schema() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "collections");
    assert_table_exists(&conn, "documents");
}

#[test]
fn reopening_store_file_keeps_documents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notya-remote.db");

    let store = SqliteDocumentStore::open(&path).unwrap();
    store
        .put("notes", &RemoteDocument::note("a.md", "kept"))
        .unwrap();
    drop(store);

    let reopened = SqliteDocumentStore::open(&path).unwrap();
    assert_eq!(schema_version(reopened.connection()), latest_version());
    assert_eq!(
        reopened.get("notes", "a.md").unwrap().unwrap().body,
        "kept"
    );
}

#[test]
fn applying_migrations_twice_is_a_no_op() {
    let mut conn = open_db_in_memory().unwrap();
    assert_eq!(apply_migrations(&mut conn).unwrap(), 0);
    assert_eq!(schema_version(&conn), latest_version());
}

#[test]
fn store_written_by_newer_build_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn deleting_collection_cascades_to_documents() {
    let store = SqliteDocumentStore::in_memory().unwrap();
    store
        .put("notes", &RemoteDocument::note("a.md", "x"))
        .unwrap();

    store
        .connection()
        .execute("DELETE FROM collections WHERE name = 'notes';", [])
        .unwrap();
    assert!(store.list("notes").unwrap().is_empty());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
