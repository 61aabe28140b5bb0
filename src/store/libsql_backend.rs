//! libSQL backend — async implementation of the store traits.
//!
//! Supports local file and in-memory databases. The paired writes behind
//! [`CheckInStore::attach_generated_message`] and the cascade deletes run in
//! a single transaction so the 1:1 check-in/generated-message invariant can
//! never be observed half-applied.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::error::DatabaseError;
use crate::model::{CheckIn, EnergyLevel, GeneratedMessage, Mood, Page, User};
use crate::store::migrations;
use crate::store::traits::{CheckInPatch, CheckInStore, NewCheckIn, UserStore};

/// libSQL backend over a local database file (or `:memory:` in tests).
///
/// Holds one connection for all operations; `libsql::Connection` is
/// `Send + Sync`, so the backend can be shared behind an `Arc`.
pub struct LibSqlBackend {
    // Kept alive for the lifetime of the connection.
    _db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            _db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(&backend.conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            _db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(&backend.conn).await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Convert `Option<f64>` to a libsql Value.
fn opt_real(v: Option<f64>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Real(v),
        None => libsql::Value::Null,
    }
}

/// Map a libsql error, turning UNIQUE violations into `Constraint`.
fn map_write_err(e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(msg)
    } else {
        DatabaseError::Query(msg)
    }
}

/// Map a libsql Row to a CheckIn.
///
/// Column order matches CHECKIN_COLUMNS:
/// 0:id, 1:user_id, 2:mood, 3:energy_level, 4:notes, 5:created_at,
/// 6:generated_message_id
fn row_to_check_in(row: &libsql::Row) -> Result<CheckIn, libsql::Error> {
    let mood_str: String = row.get(2)?;
    let energy_str: String = row.get(3)?;
    let created_str: String = row.get(5)?;

    Ok(CheckIn {
        id: row.get(0)?,
        user_id: row.get(1)?,
        mood: mood_str.parse().unwrap_or(Mood::Neutral),
        energy_level: energy_str.parse().unwrap_or(EnergyLevel::Medium),
        notes: row.get(4).ok(),
        created_at: parse_datetime(&created_str),
        generated_message_id: row.get(6).ok(),
    })
}

/// Map a libsql Row to a GeneratedMessage.
///
/// Column order matches MESSAGE_COLUMNS:
/// 0:id, 1:check_in_id, 2:message, 3:confidence, 4:generated_at
fn row_to_generated_message(row: &libsql::Row) -> Result<GeneratedMessage, libsql::Error> {
    let generated_str: String = row.get(4)?;

    Ok(GeneratedMessage {
        id: row.get(0)?,
        check_in_id: row.get(1)?,
        message: row.get(2)?,
        confidence: row.get(3).ok(),
        generated_at: parse_datetime(&generated_str),
    })
}

/// Map a libsql Row to a User (0:id, 1:username, 2:password_hash).
fn row_to_user(row: &libsql::Row) -> Result<User, libsql::Error> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
    })
}

// ── Trait implementations ───────────────────────────────────────────

const CHECKIN_COLUMNS: &str =
    "id, user_id, mood, energy_level, notes, created_at, generated_message_id";

const MESSAGE_COLUMNS: &str = "id, check_in_id, message, confidence, generated_at";

const USER_COLUMNS: &str = "id, username, password_hash";

#[async_trait]
impl CheckInStore for LibSqlBackend {
    async fn insert_check_in(&self, new: NewCheckIn) -> Result<CheckIn, DatabaseError> {
        let conn = self.conn();
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO checkins (user_id, mood, energy_level, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.user_id,
                new.mood.to_string(),
                new.energy_level.to_string(),
                opt_text(new.notes.as_deref()),
                created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(map_write_err)?;

        Ok(CheckIn {
            id: conn.last_insert_rowid(),
            user_id: new.user_id,
            mood: new.mood,
            energy_level: new.energy_level,
            notes: new.notes,
            created_at,
            generated_message_id: None,
        })
    }

    async fn get_check_in(&self, id: i64) -> Result<Option<CheckIn>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CHECKIN_COLUMNS} FROM checkins WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            Some(row) => Ok(Some(
                row_to_check_in(&row).map_err(|e| DatabaseError::Query(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Page<CheckIn>, DatabaseError> {
        let conn = self.conn();

        let mut count_rows = conn
            .query(
                "SELECT COUNT(*) FROM checkins WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        let total: i64 = match count_rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            Some(row) => row.get(0).map_err(|e| DatabaseError::Query(e.to_string()))?,
            None => 0,
        };

        let offset = i64::from(page) * i64::from(per_page);
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {CHECKIN_COLUMNS} FROM checkins WHERE user_id = ?1
                     ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
                ),
                params![user_id, i64::from(per_page), offset],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut items = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            items.push(row_to_check_in(&row).map_err(|e| DatabaseError::Query(e.to_string()))?);
        }

        Ok(Page {
            items,
            page,
            per_page,
            total: total as u64,
        })
    }

    async fn update_check_in(
        &self,
        id: i64,
        patch: CheckInPatch,
    ) -> Result<Option<CheckIn>, DatabaseError> {
        let Some(existing) = self.get_check_in(id).await? else {
            return Ok(None);
        };

        let mood = patch.mood.unwrap_or(existing.mood);
        let energy_level = patch.energy_level.unwrap_or(existing.energy_level);
        let notes = patch.notes.or(existing.notes);

        self.conn()
            .execute(
                "UPDATE checkins SET mood = ?1, energy_level = ?2, notes = ?3 WHERE id = ?4",
                params![
                    mood.to_string(),
                    energy_level.to_string(),
                    opt_text(notes.as_deref()),
                    id,
                ],
            )
            .await
            .map_err(map_write_err)?;

        Ok(Some(CheckIn {
            mood,
            energy_level,
            notes,
            ..existing
        }))
    }

    async fn delete_check_in(&self, id: i64) -> Result<bool, DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        tx.execute(
            "DELETE FROM generated_messages WHERE check_in_id = ?1",
            params![id],
        )
        .await
        .map_err(map_write_err)?;

        let deleted = tx
            .execute("DELETE FROM checkins WHERE id = ?1", params![id])
            .await
            .map_err(map_write_err)?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        Ok(deleted > 0)
    }

    async fn attach_generated_message(
        &self,
        check_in_id: i64,
        message: &str,
        confidence: Option<f64>,
        generated_at: DateTime<Utc>,
    ) -> Result<GeneratedMessage, DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        // Replace any previous message: the relationship is strictly 1:1.
        tx.execute(
            "DELETE FROM generated_messages WHERE check_in_id = ?1",
            params![check_in_id],
        )
        .await
        .map_err(map_write_err)?;

        tx.execute(
            "INSERT INTO generated_messages (check_in_id, message, confidence, generated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                check_in_id,
                message,
                opt_real(confidence),
                generated_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(map_write_err)?;
        let message_id = tx.last_insert_rowid();

        let updated = tx
            .execute(
                "UPDATE checkins SET generated_message_id = ?1 WHERE id = ?2",
                params![message_id, check_in_id],
            )
            .await
            .map_err(map_write_err)?;

        if updated == 0 {
            // Check-in vanished between load and write; dropping the
            // transaction rolls back the inserted message.
            return Err(DatabaseError::NotFound {
                entity: "CheckIn".into(),
                id: check_in_id.to_string(),
            });
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        Ok(GeneratedMessage {
            id: message_id,
            check_in_id,
            message: message.to_string(),
            confidence,
            generated_at,
        })
    }

    async fn get_generated_message(
        &self,
        check_in_id: i64,
    ) -> Result<Option<GeneratedMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM generated_messages WHERE check_in_id = ?1"
                ),
                params![check_in_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            Some(row) => Ok(Some(
                row_to_generated_message(&row)
                    .map_err(|e| DatabaseError::Query(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl UserStore for LibSqlBackend {
    async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<User, DatabaseError> {
        let conn = self.conn();

        conn.execute(
            "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
            params![username, password_hash],
        )
        .await
        .map_err(map_write_err)?;

        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        })
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            Some(row) => Ok(Some(
                row_to_user(&row).map_err(|e| DatabaseError::Query(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            Some(row) => Ok(Some(
                row_to_user(&row).map_err(|e| DatabaseError::Query(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), DatabaseError> {
        let updated = self
            .conn()
            .execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                params![password_hash, id],
            )
            .await
            .map_err(map_write_err)?;

        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "User".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> Result<bool, DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        tx.execute(
            "DELETE FROM generated_messages WHERE check_in_id IN
             (SELECT id FROM checkins WHERE user_id = ?1)",
            params![id],
        )
        .await
        .map_err(map_write_err)?;

        tx.execute("DELETE FROM checkins WHERE user_id = ?1", params![id])
            .await
            .map_err(map_write_err)?;

        let deleted = tx
            .execute("DELETE FROM users WHERE id = ?1", params![id])
            .await
            .map_err(map_write_err)?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        Ok(deleted > 0)
    }

    async fn list_users(&self, page: u32, per_page: u32) -> Result<Page<User>, DatabaseError> {
        let conn = self.conn();

        let mut count_rows = conn
            .query("SELECT COUNT(*) FROM users", ())
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        let total: i64 = match count_rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            Some(row) => row.get(0).map_err(|e| DatabaseError::Query(e.to_string()))?,
            None => 0,
        };

        let offset = i64::from(page) * i64::from(per_page);
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT ?1 OFFSET ?2"
                ),
                params![i64::from(per_page), offset],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut items = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            items.push(row_to_user(&row).map_err(|e| DatabaseError::Query(e.to_string()))?);
        }

        Ok(Page {
            items,
            page,
            per_page,
            total: total as u64,
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────
