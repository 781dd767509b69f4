//! SQLite-backed `DocumentStore`.
//!
//! # Responsibility
//! - Persist remote collections in a shared SQLite file (or in memory).
//! - Keep SQL details behind the `DocumentStore` seam.
//!
//! # Invariants
//! - `(collection, title)` is unique; `put` upserts and keeps the stored id.
//! - Folder deletes and renames touch descendants in the same transaction.

use super::{DocumentKind, DocumentStore, RemoteDocument, RemoteError, RemoteResult};
use crate::db::{open_db, open_db_in_memory, DbResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

const DOCUMENT_SELECT_SQL: &str = "SELECT uuid, title, kind, body FROM documents";
const DESCENDANT_FILTER_SQL: &str =
    "collection = ?1 AND (title = ?2 OR substr(title, 1, length(?2) + 1) = ?2 || '/')";

/// Document store over one SQLite connection.
pub struct SqliteDocumentStore {
    conn: Connection,
}

impl SqliteDocumentStore {
    /// Opens (or creates) a store file and applies schema steps.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    /// Opens a private in-memory store.
    pub fn in_memory() -> DbResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
        })
    }

    /// Wraps a connection that already went through `open_db`.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn collection_exists(&self, collection: &str) -> RemoteResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM collections WHERE name = ?1);",
            [collection],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn create_collection(&self, collection: &str) -> RemoteResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO collections (name) VALUES (?1);",
            [collection],
        )?;
        Ok(())
    }

    fn get(&self, collection: &str, title: &str) -> RemoteResult<Option<RemoteDocument>> {
        let row = self
            .conn
            .query_row(
                &format!("{DOCUMENT_SELECT_SQL} WHERE collection = ?1 AND title = ?2;"),
                params![collection, title],
                read_raw_row,
            )
            .optional()?;
        row.map(parse_raw_row).transpose()
    }

    fn list(&self, collection: &str) -> RemoteResult<Vec<RemoteDocument>> {
        let mut stmt = self.conn.prepare(&format!(
            "{DOCUMENT_SELECT_SQL} WHERE collection = ?1 ORDER BY title ASC;"
        ))?;
        let rows = stmt.query_map([collection], read_raw_row)?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(parse_raw_row(row?)?);
        }
        Ok(documents)
    }

    fn put(&self, collection: &str, document: &RemoteDocument) -> RemoteResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO collections (name) VALUES (?1);",
            [collection],
        )?;
        tx.execute(
            "INSERT INTO documents (uuid, collection, title, kind, body)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (collection, title) DO UPDATE SET
                kind = excluded.kind,
                body = excluded.body,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                document.id.to_string(),
                collection,
                document.title.as_str(),
                kind_to_db(document.kind),
                document.body.as_str(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, collection: &str, title: &str) -> RemoteResult<usize> {
        let removed = self.conn.execute(
            &format!("DELETE FROM documents WHERE {DESCENDANT_FILTER_SQL};"),
            params![collection, title],
        )?;
        Ok(removed)
    }

    fn rename(&self, collection: &str, from: &str, to: &str) -> RemoteResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let moved: Vec<(String, String)> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT uuid, title FROM documents WHERE {DESCENDANT_FILTER_SQL};"
            ))?;
            let rows = stmt.query_map(params![collection, from], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let collected = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            collected
        };

        if moved.is_empty() {
            return Err(RemoteError::Permanent(format!(
                "document not found: {collection}/{from}"
            )));
        }

        for (uuid, title) in moved {
            let renamed = format!("{to}{}", &title[from.len()..]);
            tx.execute(
                "UPDATE documents
                 SET title = ?1, updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?2;",
                params![renamed, uuid],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

struct RawRow {
    uuid: String,
    title: String,
    kind: String,
    body: String,
}

fn read_raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        uuid: row.get("uuid")?,
        title: row.get("title")?,
        kind: row.get("kind")?,
        body: row.get("body")?,
    })
}

fn parse_raw_row(raw: RawRow) -> RemoteResult<RemoteDocument> {
    let id = Uuid::parse_str(&raw.uuid).map_err(|_| {
        RemoteError::Permanent(format!("invalid uuid `{}` in documents.uuid", raw.uuid))
    })?;
    let kind = parse_kind(&raw.kind).ok_or_else(|| {
        RemoteError::Permanent(format!("invalid kind `{}` in documents.kind", raw.kind))
    })?;
    Ok(RemoteDocument {
        id,
        title: raw.title,
        kind,
        body: raw.body,
    })
}

fn kind_to_db(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Note => "note",
        DocumentKind::Folder => "folder",
    }
}

fn parse_kind(value: &str) -> Option<DocumentKind> {
    match value {
        "note" => Some(DocumentKind::Note),
        "folder" => Some(DocumentKind::Folder),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteDocumentStore;
    use crate::remote::{DocumentStore, RemoteDocument, RemoteError};

    fn store() -> SqliteDocumentStore {
        SqliteDocumentStore::in_memory().expect("in-memory store should open")
    }

    #[test]
    fn put_upserts_by_title_and_keeps_id() {
        let store = store();
        let first = RemoteDocument::note("draft.md", "v1");
        store.put("notes", &first).unwrap();

        let second = RemoteDocument::note("draft.md", "v2");
        store.put("notes", &second).unwrap();

        let loaded = store.get("notes", "draft.md").unwrap().unwrap();
        assert_eq!(loaded.id, first.id);
        assert_eq!(loaded.body, "v2");
        assert_eq!(store.list("notes").unwrap().len(), 1);
        assert!(store.collection_exists("notes").unwrap());
    }

    #[test]
    fn delete_removes_folder_descendants_only() {
        let store = store();
        store.put("notes", &RemoteDocument::folder("journal")).unwrap();
        store
            .put("notes", &RemoteDocument::note("journal/a.md", ""))
            .unwrap();
        store
            .put("notes", &RemoteDocument::note("journalist.md", ""))
            .unwrap();

        assert_eq!(store.delete("notes", "journal").unwrap(), 2);
        let titles: Vec<String> = store
            .list("notes")
            .unwrap()
            .into_iter()
            .map(|doc| doc.title)
            .collect();
        assert_eq!(titles, vec!["journalist.md".to_string()]);
    }

    #[test]
    fn rename_moves_descendants() {
        let store = store();
        store.put("notes", &RemoteDocument::folder("old")).unwrap();
        store
            .put("notes", &RemoteDocument::note("old/a.md", "a"))
            .unwrap();

        store.rename("notes", "old", "new").unwrap();
        assert!(store.get("notes", "old").unwrap().is_none());
        assert_eq!(
            store.get("notes", "new/a.md").unwrap().unwrap().body,
            "a".to_string()
        );
    }

    #[test]
    fn rename_of_missing_document_fails_permanently() {
        let store = store();
        let err = store.rename("notes", "ghost.md", "new.md").unwrap_err();
        assert!(matches!(err, RemoteError::Permanent(_)));
    }

    #[test]
    fn collections_are_isolated() {
        let store = store();
        store
            .put("a", &RemoteDocument::note("same.md", "in a"))
            .unwrap();
        store
            .put("b", &RemoteDocument::note("same.md", "in b"))
            .unwrap();
        assert_eq!(store.get("a", "same.md").unwrap().unwrap().body, "in a");
        assert_eq!(store.get("b", "same.md").unwrap().unwrap().body, "in b");
        assert!(!store.collection_exists("c").unwrap());
    }
}
