use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::store::{require_token, RecordStore, Row, StoreError, Table};

/// Local record store backed by a single SQLite file.
///
/// Each table keeps the owner and id as columns and every other field as a
/// JSON object in `data`.
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.init()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        store.init()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn init(&self) -> Result<()> {
        for table in Table::ALL {
            self.conn
                .execute_batch(&format!(
                    r#"
                    CREATE TABLE IF NOT EXISTS "{table}" (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        user_id TEXT NOT NULL,
                        data TEXT NOT NULL,
                        created_at TEXT NOT NULL DEFAULT (datetime('now')),
                        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                    );

                    CREATE INDEX IF NOT EXISTS "idx_{table}_user" ON "{table}"(user_id);
                    "#
                ))
                .with_context(|| format!("Failed to create table {table}"))?;
        }
        Ok(())
    }

    fn owner_of(&self, table: Table, id: i64) -> rusqlite::Result<Option<String>> {
        self.conn
            .query_row(
                &format!(r#"SELECT user_id FROM "{table}" WHERE id = ?1"#),
                [id],
                |row| row.get(0),
            )
            .optional()
    }
}

fn read_failed(table: Table, reason: impl ToString) -> StoreError {
    StoreError::ReadFailed {
        table,
        reason: reason.to_string(),
    }
}

fn write_failed(table: Table, reason: impl ToString) -> StoreError {
    StoreError::WriteFailed {
        table,
        reason: reason.to_string(),
    }
}

/// Splits a row into owner, optional id and the remaining fields.
fn split_row(table: Table, mut row: Row) -> Result<(String, Option<i64>, Row), StoreError> {
    let user_id = match row.remove("user_id") {
        Some(Value::String(user_id)) if !user_id.is_empty() => user_id,
        _ => return Err(write_failed(table, "row has no user_id")),
    };
    let id = match row.remove("id") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value
                .as_i64()
                .ok_or_else(|| write_failed(table, format!("invalid id {value}")))?,
        ),
    };
    Ok((user_id, id, row))
}

fn join_row(id: i64, user_id: &str, mut data: Row) -> Row {
    data.insert("id".to_string(), Value::from(id));
    data.insert("user_id".to_string(), Value::from(user_id));
    data
}

impl RecordStore for SqliteStore {
    fn select(&self, token: &str, table: Table, user_id: &str) -> Result<Vec<Row>, StoreError> {
        require_token(token)?;

        let mut stmt = self
            .conn
            .prepare(&format!(
                r#"SELECT id, data FROM "{table}" WHERE user_id = ?1 ORDER BY id"#
            ))
            .map_err(|e| read_failed(table, e))?;
        let rows = stmt
            .query_map([user_id], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| read_failed(table, e))?;

        let mut out = Vec::new();
        for row in rows {
            let (id, data) = row.map_err(|e| read_failed(table, e))?;
            let data: Row = serde_json::from_str(&data).map_err(|e| read_failed(table, e))?;
            out.push(join_row(id, user_id, data));
        }
        debug!("Selected {} row(s) from {table}", out.len());
        Ok(out)
    }

    fn insert(&self, token: &str, table: Table, row: Row) -> Result<Row, StoreError> {
        require_token(token)?;
        let (user_id, _, data) = split_row(table, row)?;
        let json = serde_json::to_string(&data).map_err(|e| write_failed(table, e))?;

        self.conn
            .execute(
                &format!(r#"INSERT INTO "{table}" (user_id, data) VALUES (?1, ?2)"#),
                params![user_id, json],
            )
            .map_err(|e| write_failed(table, e))?;
        let id = self.conn.last_insert_rowid();
        debug!("Inserted {table} #{id}");

        Ok(join_row(id, &user_id, data))
    }

    fn upsert(&self, token: &str, table: Table, row: Row) -> Result<Row, StoreError> {
        require_token(token)?;
        let (user_id, id, data) = split_row(table, row)?;
        let Some(id) = id else {
            return self.insert(token, table, join_row_without_id(&user_id, data));
        };

        // Never let one user overwrite another user's row.
        match self.owner_of(table, id).map_err(|e| write_failed(table, e))? {
            Some(owner) if owner != user_id => {
                return Err(write_failed(table, format!("record #{id} belongs to another user")));
            }
            _ => {}
        }

        let json = serde_json::to_string(&data).map_err(|e| write_failed(table, e))?;
        self.conn
            .execute(
                &format!(
                    r#"INSERT INTO "{table}" (id, user_id, data) VALUES (?1, ?2, ?3)
                       ON CONFLICT(id) DO UPDATE SET
                           data = excluded.data,
                           updated_at = datetime('now')
                       WHERE "{table}".user_id = excluded.user_id"#
                ),
                params![id, user_id, json],
            )
            .map_err(|e| write_failed(table, e))?;
        debug!("Upserted {table} #{id}");

        Ok(join_row(id, &user_id, data))
    }
}

fn join_row_without_id(user_id: &str, mut data: Row) -> Row {
    data.insert("user_id".to_string(), Value::from(user_id));
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_insert_assigns_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store
            .insert("jwt", Table::Jobs, row(json!({"user_id": "u1", "title": "A"})))
            .unwrap();
        let second = store
            .insert("jwt", Table::Jobs, row(json!({"user_id": "u1", "title": "B"})))
            .unwrap();
        assert_eq!(first.get("id"), Some(&json!(1)));
        assert_eq!(second.get("id"), Some(&json!(2)));
        assert_eq!(second.get("title"), Some(&json!("B")));
    }

    #[test]
    fn test_select_scoped_by_user() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert("jwt", Table::Contacts, row(json!({"user_id": "u1", "name": "Jane"})))
            .unwrap();
        store
            .insert("jwt", Table::Contacts, row(json!({"user_id": "u2", "name": "Joe"})))
            .unwrap();

        let rows = store.select("jwt", Table::Contacts, "u1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&json!("Jane")));
        assert_eq!(rows[0].get("user_id"), Some(&json!("u1")));

        assert!(store.select("jwt", Table::Jobs, "u1").unwrap().is_empty());
    }

    #[test]
    fn test_upsert_replaces_whole_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let created = store
            .insert(
                "jwt",
                Table::Activities,
                row(json!({"user_id": "u1", "name": "Apply", "note": "first"})),
            )
            .unwrap();
        let id = created.get("id").and_then(Value::as_i64).unwrap();

        store
            .upsert(
                "jwt",
                Table::Activities,
                row(json!({"id": id, "user_id": "u1", "name": "Follow up"})),
            )
            .unwrap();

        let rows = store.select("jwt", Table::Activities, "u1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&json!("Follow up")));
        assert_eq!(rows[0].get("note"), None);
    }

    #[test]
    fn test_upsert_creates_missing_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert("jwt", Table::Jobs, row(json!({"id": 13, "user_id": "u1", "title": "A"})))
            .unwrap();
        let rows = store.select("jwt", Table::Jobs, "u1").unwrap();
        assert_eq!(rows[0].get("id"), Some(&json!(13)));
    }

    #[test]
    fn test_upsert_refuses_other_users_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let created = store
            .insert("jwt", Table::Jobs, row(json!({"user_id": "u1", "title": "Mine"})))
            .unwrap();
        let id = created.get("id").and_then(Value::as_i64).unwrap();

        let err = store
            .upsert("jwt", Table::Jobs, row(json!({"id": id, "user_id": "u2", "title": "Stolen"})))
            .unwrap_err();
        assert!(matches!(err, StoreError::WriteFailed { table: Table::Jobs, .. }));

        let rows = store.select("jwt", Table::Jobs, "u1").unwrap();
        assert_eq!(rows[0].get("title"), Some(&json!("Mine")));
    }

    #[test]
    fn test_requires_token_and_owner() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            store.select("", Table::Jobs, "u1"),
            Err(StoreError::Unauthorized)
        ));
        assert!(matches!(
            store.insert("jwt", Table::Jobs, row(json!({"title": "A"}))),
            Err(StoreError::WriteFailed { .. })
        ));
    }

    #[test]
    fn test_open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("seekr.db");
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert!(path.exists());

        store
            .insert("jwt", Table::Jobs, row(json!({"user_id": "u1", "title": "A"})))
            .unwrap();
        drop(store);

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.select("jwt", Table::Jobs, "u1").unwrap().len(), 1);
    }
}
