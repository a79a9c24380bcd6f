//! SQLite-backed store for logs, per-file metadata and API keys.
//!
//! One `activity.db` file in WAL mode. The connection sits behind a
//! mutex so the store can be shared across server handlers.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use gitdrive_core::path::metadata_doc_id;
use gitdrive_core::traits::ActivityLog;
use gitdrive_core::{now_rfc3339, ApiKey, ApiUser, DriveError, FileMetadata, LogEntry};
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS logs (
    rowid INTEGER PRIMARY KEY,
    id TEXT UNIQUE NOT NULL,
    user_name TEXT NOT NULL,
    user_email TEXT NOT NULL,
    user_uid TEXT,
    action TEXT NOT NULL,
    repo_full_name TEXT NOT NULL,
    path TEXT NOT NULL,
    detail TEXT NOT NULL DEFAULT '{}',
    ts TEXT NOT NULL,
    ts_unix INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_logs_ts_unix ON logs(ts_unix DESC);
CREATE INDEX IF NOT EXISTS idx_logs_repo ON logs(repo_full_name);
CREATE INDEX IF NOT EXISTS idx_logs_action ON logs(action);

CREATE TABLE IF NOT EXISTS file_metadata (
    doc_id TEXT PRIMARY KEY,
    repo_full_name TEXT NOT NULL,
    path TEXT NOT NULL,
    expiration TEXT,
    favorite INTEGER
);

CREATE TABLE IF NOT EXISTS api_keys (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    key TEXT UNIQUE NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_api_keys_user ON api_keys(user_id);
";

fn db_err(err: impl std::fmt::Display) -> DriveError {
    DriveError::Storage(err.to_string())
}

pub struct ActivityStore {
    conn: Mutex<Connection>,
}

impl ActivityStore {
    /// Open or create the database, applying pragmas and the idempotent
    /// schema.
    pub fn open_or_create(db_path: &Path) -> Result<Self, DriveError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(db_err)?;
        }
        let conn = Connection::open(db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(db_err)?;
        conn.execute_batch(SCHEMA_SQL).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>, DriveError> {
        self.conn
            .lock()
            .map_err(|_| DriveError::Storage("connection lock poisoned".to_string()))
    }

    // ── Logs ────────────────────────────────────────────────────────

    /// Newest-first page of the log.
    pub fn logs(&self, limit: usize) -> Result<Vec<LogEntry>, DriveError> {
        self.query_logs(
            "SELECT id, user_name, user_email, user_uid, action, repo_full_name,
                    path, detail, ts, ts_unix
             FROM logs ORDER BY ts_unix DESC, rowid DESC LIMIT ?1",
            params![limit as i64],
        )
    }

    pub fn logs_for_repo(&self, repo: &str, limit: usize) -> Result<Vec<LogEntry>, DriveError> {
        self.query_logs(
            "SELECT id, user_name, user_email, user_uid, action, repo_full_name,
                    path, detail, ts, ts_unix
             FROM logs WHERE repo_full_name = ?1
             ORDER BY ts_unix DESC, rowid DESC LIMIT ?2",
            params![repo, limit as i64],
        )
    }

    fn query_logs(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> Result<Vec<LogEntry>, DriveError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(db_err)?;
        let rows = stmt
            .query_map(args, |row| {
                let detail: String = row.get(7)?;
                Ok(LogEntry {
                    id: row.get(0)?,
                    user: ApiUser {
                        name: row.get(1)?,
                        email: row.get(2)?,
                        uid: row.get(3)?,
                    },
                    action: row.get(4)?,
                    repo_full_name: row.get(5)?,
                    path: row.get(6)?,
                    detail: serde_json::from_str(&detail).unwrap_or(serde_json::Value::Null),
                    ts: row.get(8)?,
                    ts_unix: row.get(9)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    // ── File metadata ───────────────────────────────────────────────

    /// Merge `patch` into the stored metadata for a file. Fields absent
    /// from the patch keep their stored value.
    pub fn save_metadata(
        &self,
        repo: &str,
        path: &str,
        patch: &FileMetadata,
    ) -> Result<FileMetadata, DriveError> {
        let current = self.metadata(repo, path)?.unwrap_or_default();
        let merged = FileMetadata {
            expiration: patch.expiration.clone().or(current.expiration),
            favorite: patch.favorite.or(current.favorite),
        };
        let doc_id = metadata_doc_id(repo, path);
        self.conn()?
            .execute(
                "INSERT INTO file_metadata (doc_id, repo_full_name, path, expiration, favorite)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(doc_id) DO UPDATE SET
                     expiration = excluded.expiration,
                     favorite = excluded.favorite",
                params![doc_id, repo, path, merged.expiration, merged.favorite],
            )
            .map_err(db_err)?;
        Ok(merged)
    }

    pub fn metadata(&self, repo: &str, path: &str) -> Result<Option<FileMetadata>, DriveError> {
        let doc_id = metadata_doc_id(repo, path);
        self.conn()?
            .query_row(
                "SELECT expiration, favorite FROM file_metadata WHERE doc_id = ?1",
                params![doc_id],
                |row| {
                    Ok(FileMetadata {
                        expiration: row.get(0)?,
                        favorite: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)
    }

    /// Flip the favorite flag, treating missing metadata as not-favorite.
    /// Returns the new value.
    pub fn toggle_favorite(&self, repo: &str, path: &str) -> Result<bool, DriveError> {
        let current = self
            .metadata(repo, path)?
            .and_then(|m| m.favorite)
            .unwrap_or(false);
        let next = !current;
        self.save_metadata(
            repo,
            path,
            &FileMetadata {
                expiration: None,
                favorite: Some(next),
            },
        )?;
        Ok(next)
    }

    // ── API keys ────────────────────────────────────────────────────

    /// Mint and persist a key: `gd_` plus 48 hex chars.
    pub fn generate_key(&self, user_id: &str) -> Result<ApiKey, DriveError> {
        let mut raw = [0u8; 24];
        rand::thread_rng().fill_bytes(&mut raw);
        let key = ApiKey {
            id: format!("key_{}", ulid::Ulid::new()),
            user_id: user_id.to_string(),
            key: format!("gd_{}", hex::encode(raw)),
            created_at: now_rfc3339(),
        };
        self.conn()?
            .execute(
                "INSERT INTO api_keys (id, user_id, key, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![key.id, key.user_id, key.key, key.created_at],
            )
            .map_err(db_err)?;
        Ok(key)
    }

    pub fn keys_for_user(&self, user_id: &str) -> Result<Vec<ApiKey>, DriveError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, key, created_at FROM api_keys
                 WHERE user_id = ?1 ORDER BY created_at DESC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(ApiKey {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    key: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    /// Delete a key owned by `user_id`. `NotFound` for an unknown id,
    /// `Unauthorized` when the key belongs to someone else.
    pub fn revoke_key(&self, user_id: &str, key_id: &str) -> Result<(), DriveError> {
        let owner: Option<String> = self
            .conn()?
            .query_row(
                "SELECT user_id FROM api_keys WHERE id = ?1",
                params![key_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        match owner {
            None => Err(DriveError::NotFound(format!("key {key_id} not found"))),
            Some(owner) if owner != user_id => Err(DriveError::Unauthorized(
                "key belongs to another user".to_string(),
            )),
            Some(_) => {
                self.conn()?
                    .execute("DELETE FROM api_keys WHERE id = ?1", params![key_id])
                    .map_err(db_err)?;
                Ok(())
            }
        }
    }

    /// Resolve a presented key to its stored document, if any.
    pub fn validate_key(&self, key: &str) -> Result<Option<ApiKey>, DriveError> {
        self.conn()?
            .query_row(
                "SELECT id, user_id, key, created_at FROM api_keys WHERE key = ?1",
                params![key],
                |row| {
                    Ok(ApiKey {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        key: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)
    }
}

impl ActivityLog for ActivityStore {
    fn append(
        &self,
        action: &str,
        user: &ApiUser,
        repo_full_name: &str,
        path: &str,
        detail: serde_json::Value,
    ) -> Result<(), DriveError> {
        let id = format!("log_{}", ulid::Ulid::new());
        let ts = now_rfc3339();
        let ts_unix = time::OffsetDateTime::now_utc().unix_timestamp();
        let detail = detail.to_string();
        self.conn()?
            .execute(
                "INSERT INTO logs (id, user_name, user_email, user_uid, action,
                                   repo_full_name, path, detail, ts, ts_unix)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id,
                    user.name,
                    user.email,
                    user.uid,
                    action,
                    repo_full_name,
                    path,
                    detail,
                    ts,
                    ts_unix
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitdrive_core::action;

    fn store() -> (tempfile::TempDir, ActivityStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ActivityStore::open_or_create(&dir.path().join("activity.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn append_and_page_newest_first() {
        let (_dir, store) = store();
        let user = ApiUser::anonymous();
        for i in 0..3 {
            store
                .append(
                    action::UPLOAD,
                    &user,
                    "acme/store",
                    &format!("f{i}.txt"),
                    serde_json::json!({ "i": i }),
                )
                .unwrap();
        }
        let logs = store.logs(2).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].path, "f2.txt");
        assert_eq!(logs[1].path, "f1.txt");
        assert_eq!(logs[0].detail["i"], 2);
        assert!(logs[0].id.starts_with("log_"));
    }

    #[test]
    fn logs_filtered_by_repo() {
        let (_dir, store) = store();
        let user = ApiUser::anonymous();
        store
            .append(action::UPLOAD, &user, "acme/a", "x.txt", serde_json::json!({}))
            .unwrap();
        store
            .append(action::UPLOAD, &user, "acme/b", "y.txt", serde_json::json!({}))
            .unwrap();
        let logs = store.logs_for_repo("acme/b", 10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].path, "y.txt");
    }

    #[test]
    fn metadata_merges_instead_of_replacing() {
        let (_dir, store) = store();
        store
            .save_metadata(
                "acme/store",
                "a.txt",
                &FileMetadata {
                    expiration: Some("2026-12-31T00:00:00Z".into()),
                    favorite: None,
                },
            )
            .unwrap();
        let merged = store
            .save_metadata(
                "acme/store",
                "a.txt",
                &FileMetadata {
                    expiration: None,
                    favorite: Some(true),
                },
            )
            .unwrap();
        // The earlier expiration survives the favorite-only patch.
        assert_eq!(merged.expiration.as_deref(), Some("2026-12-31T00:00:00Z"));
        assert_eq!(merged.favorite, Some(true));
        let stored = store.metadata("acme/store", "a.txt").unwrap().unwrap();
        assert_eq!(stored, merged);
    }

    #[test]
    fn toggle_favorite_from_missing_metadata() {
        let (_dir, store) = store();
        assert!(store.toggle_favorite("acme/store", "a.txt").unwrap());
        assert!(!store.toggle_favorite("acme/store", "a.txt").unwrap());
    }

    #[test]
    fn key_lifecycle() {
        let (_dir, store) = store();
        let key = store.generate_key("user-1").unwrap();
        assert!(key.key.starts_with("gd_"));
        assert_eq!(key.key.len(), 3 + 48);
        assert_eq!(store.keys_for_user("user-1").unwrap().len(), 1);

        let found = store.validate_key(&key.key).unwrap().unwrap();
        assert_eq!(found.id, key.id);
        assert!(store.validate_key("gd_nope").unwrap().is_none());

        let err = store.revoke_key("user-2", &key.id).unwrap_err();
        assert!(matches!(err, DriveError::Unauthorized(_)));
        store.revoke_key("user-1", &key.id).unwrap();
        assert!(store.validate_key(&key.key).unwrap().is_none());
        let err = store.revoke_key("user-1", &key.id).unwrap_err();
        assert!(err.is_not_found());
    }
}
