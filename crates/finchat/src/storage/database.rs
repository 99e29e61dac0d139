//! SQLite record store for users, sessions, documents, config, audit, and metrics

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::activity::{ActivityEntry, ActivityResult};
use crate::types::admin::DayCount;
use crate::types::chat::{Message, MessageRole};
use crate::types::document::DocumentRecord;
use crate::types::settings::{ConfigSetting, SettingValue};
use crate::types::user::User;

/// SQLite-backed record store.
///
/// All writes go through a single connection guarded by a mutex; SQLite
/// serializes them, which is what gives the per-session message ordering and
/// the atomic (effect, audit) admin mutations their guarantees.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// A conversation session row
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Database {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::database(format!("Failed to create data dir: {e}")))?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::database(format!("Failed to open database: {e}")))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database (tests and ephemeral deployments)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::database(format!("Failed to open in-memory database: {e}")))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Run schema migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                full_name TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                is_admin INTEGER NOT NULL DEFAULT 0,
                must_reset INTEGER NOT NULL DEFAULT 0,
                reset_token TEXT,
                reset_token_issued_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_login TEXT
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_activity TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_last_activity ON sessions(last_activity);

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_session_ts ON messages(session_id, timestamp);

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                uploader_user_id TEXT NOT NULL,
                uploader_username TEXT NOT NULL,
                upload_date TEXT NOT NULL,
                file_type TEXT NOT NULL,
                chunk_count INTEGER NOT NULL,
                file_size_bytes INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_documents_uploader ON documents(uploader_user_id);

            CREATE TABLE IF NOT EXISTS system_config (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                default_value TEXT NOT NULL,
                data_type TEXT NOT NULL,
                min_value REAL,
                max_value REAL,
                category TEXT NOT NULL,
                description TEXT NOT NULL,
                updated_at TEXT,
                updated_by TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_system_config_category ON system_config(category);

            CREATE TABLE IF NOT EXISTS activity_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                admin_id TEXT NOT NULL,
                admin_username TEXT NOT NULL,
                action TEXT NOT NULL,
                resource_type TEXT NOT NULL,
                resource_id TEXT NOT NULL,
                details TEXT NOT NULL,
                client_addr TEXT,
                timestamp TEXT NOT NULL,
                result TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_activity_admin_ts ON activity_log(admin_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_activity_resource ON activity_log(resource_type, resource_id);

            CREATE TABLE IF NOT EXISTS api_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                endpoint TEXT NOT NULL,
                method TEXT NOT NULL,
                status INTEGER NOT NULL,
                elapsed_ms INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                user_id TEXT,
                error TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_api_metrics_ts ON api_metrics(timestamp);
            "#,
        )
        .map_err(|e| Error::database(format!("Failed to run migrations: {e}")))?;

        tracing::info!("Database migrations complete");
        Ok(())
    }

    /// Run a closure inside a single transaction.
    ///
    /// Used by admin services to commit an effect together with its activity
    /// entry: if either fails, neither is visible.
    pub fn transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::database(format!("Failed to begin transaction: {e}")))?;
        let out = f(&tx)?;
        tx.commit()
            .map_err(|e| Error::database(format!("Failed to commit transaction: {e}")))?;
        Ok(out)
    }

    /// Liveness probe for the health endpoint
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    // ==================== Users ====================

    /// Insert a new user; duplicate username/email maps to `Conflict`
    pub fn insert_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock();
        let result = conn.execute(
            r#"
            INSERT INTO users (
                id, username, email, password_hash, full_name,
                is_active, is_admin, must_reset, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                user.id,
                user.username,
                user.email,
                user.password_hash,
                user.full_name,
                user.is_active,
                user.is_admin,
                user.must_reset,
                ts(&user.created_at),
                ts(&user.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, Some(msg)))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                if msg.contains("username") {
                    Err(Error::Conflict("Username already exists".to_string()))
                } else if msg.contains("email") {
                    Err(Error::Conflict("Email already exists".to_string()))
                } else {
                    Err(Error::Conflict("User already exists".to_string()))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT * FROM users WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT * FROM users WHERE email = ?1",
                params![email],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Update the password hash, optionally clearing the must-reset flag
    pub fn update_password(&self, user_id: &str, hash: &str, clear_must_reset: bool) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET password_hash = ?2, must_reset = CASE WHEN ?3 THEN 0 ELSE must_reset END, updated_at = ?4 WHERE id = ?1",
            params![user_id, hash, clear_must_reset, now_ts()],
        )?;
        Ok(())
    }

    pub fn set_last_login(&self, user_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET last_login = ?2 WHERE id = ?1",
            params![user_id, now_ts()],
        )?;
        Ok(())
    }

    /// Persist an outstanding reset token and its issuance time
    pub fn set_reset_token(&self, user_id: &str, token: &str, issued_at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET reset_token = ?2, reset_token_issued_at = ?3, updated_at = ?4 WHERE id = ?1",
            params![user_id, token, ts(&issued_at), now_ts()],
        )?;
        Ok(())
    }

    /// Atomically consume a reset token: update the hash and clear both reset
    /// fields, but only if the stored token still equals `token`.
    ///
    /// Returns false if the token was already used or never issued.
    pub fn consume_reset_token(&self, user_id: &str, token: &str, new_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            r#"
            UPDATE users
            SET password_hash = ?3,
                reset_token = NULL,
                reset_token_issued_at = NULL,
                must_reset = 0,
                updated_at = ?4
            WHERE id = ?1 AND reset_token = ?2
            "#,
            params![user_id, token, new_hash, now_ts()],
        )?;
        Ok(changed > 0)
    }

    pub fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<bool> {
        let conn = self.conn.lock();
        set_user_active_on(&conn, user_id, is_active)
    }

    pub fn set_admin(&self, user_id: &str, is_admin: bool) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE users SET is_admin = ?2, updated_at = ?3 WHERE id = ?1",
            params![user_id, is_admin, now_ts()],
        )?;
        Ok(changed > 0)
    }

    /// List users with pagination, search, and sorting
    pub fn list_users(
        &self,
        page: i64,
        page_size: i64,
        search: Option<&str>,
        sort_by: &str,
        descending: bool,
    ) -> Result<(Vec<User>, i64)> {
        let conn = self.conn.lock();

        let sort_col = match sort_by {
            "last_login" => "last_login",
            "username" => "username",
            _ => "created_at",
        };
        let direction = if descending { "DESC" } else { "ASC" };
        let pattern = search.map(|s| format!("%{}%", s.to_lowercase()));

        let (total, users) = match &pattern {
            Some(p) => {
                let total: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM users WHERE lower(username) LIKE ?1 OR lower(email) LIKE ?1",
                    params![p],
                    |row| row.get(0),
                )?;
                let mut stmt = conn.prepare(&format!(
                    "SELECT * FROM users WHERE lower(username) LIKE ?1 OR lower(email) LIKE ?1 \
                     ORDER BY {sort_col} {direction} LIMIT ?2 OFFSET ?3"
                ))?;
                let users = stmt
                    .query_map(params![p, page_size, (page - 1) * page_size], row_to_user)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                (total, users)
            }
            None => {
                let total: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
                let mut stmt = conn.prepare(&format!(
                    "SELECT * FROM users ORDER BY {sort_col} {direction} LIMIT ?1 OFFSET ?2"
                ))?;
                let users = stmt
                    .query_map(params![page_size, (page - 1) * page_size], row_to_user)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                (total, users)
            }
        };

        Ok((users, total))
    }

    pub fn count_users(&self) -> Result<i64> {
        let conn = self.conn.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    // ==================== Sessions & messages ====================

    /// Insert a session owned by a user; the id may be caller-supplied
    pub fn insert_session(&self, id: &str, user_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let now = now_ts();
        conn.execute(
            "INSERT INTO sessions (id, user_id, created_at, last_activity) VALUES (?1, ?2, ?3, ?3)",
            params![id, user_id, now],
        )?;
        Ok(())
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        let conn = self.conn.lock();
        let session = conn
            .query_row(
                "SELECT id, user_id, created_at, last_activity FROM sessions WHERE id = ?1",
                params![id],
                |row| {
                    Ok(SessionRecord {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        created_at: parse_ts(&row.get::<_, String>(2)?),
                        last_activity: parse_ts(&row.get::<_, String>(3)?),
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    pub fn touch_session(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sessions SET last_activity = ?2 WHERE id = ?1",
            params![id, now_ts()],
        )?;
        Ok(())
    }

    /// Append a user/assistant message pair in one transaction.
    ///
    /// Timestamps are strictly increasing within the session even when the
    /// wall clock is not: the user message lands at
    /// `max(now, last_message + 1us)` and the assistant message one
    /// microsecond after it.
    pub fn append_message_pair(
        &self,
        session_id: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let last: Option<String> = tx
            .query_row(
                "SELECT MAX(timestamp) FROM messages WHERE session_id = ?1",
                params![session_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();

        let now = Utc::now();
        let user_ts = match last {
            Some(last) => {
                let floor = parse_ts(&last) + Duration::microseconds(1);
                if now > floor {
                    now
                } else {
                    floor
                }
            }
            None => now,
        };
        let assistant_ts = user_ts + Duration::microseconds(1);

        tx.execute(
            "INSERT INTO messages (session_id, role, content, timestamp) VALUES (?1, 'user', ?2, ?3)",
            params![session_id, user_text, ts(&user_ts)],
        )?;
        tx.execute(
            "INSERT INTO messages (session_id, role, content, timestamp) VALUES (?1, 'assistant', ?2, ?3)",
            params![session_id, assistant_text, ts(&assistant_ts)],
        )?;
        tx.execute(
            "UPDATE sessions SET last_activity = ?2 WHERE id = ?1",
            params![session_id, ts(&assistant_ts)],
        )?;

        tx.commit()?;
        Ok((user_ts, assistant_ts))
    }

    /// Most recent `limit` messages of a session, oldest first.
    ///
    /// Older messages are retained but not returned.
    pub fn history(&self, session_id: &str, limit: i64) -> Result<Vec<Message>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT role, content, timestamp FROM messages \
             WHERE session_id = ?1 ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let mut messages = stmt
            .query_map(params![session_id, limit], |row| {
                let role: String = row.get(0)?;
                Ok(Message {
                    role: MessageRole::parse(&role).unwrap_or(MessageRole::User),
                    content: row.get(1)?,
                    timestamp: parse_ts(&row.get::<_, String>(2)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }

    /// Delete sessions idle since before `cutoff`, along with their messages
    pub fn evict_idle_sessions(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM messages WHERE session_id IN (SELECT id FROM sessions WHERE last_activity < ?1)",
            params![ts(&cutoff)],
        )?;
        let evicted = tx.execute(
            "DELETE FROM sessions WHERE last_activity < ?1",
            params![ts(&cutoff)],
        )?;
        tx.commit()?;
        Ok(evicted)
    }

    pub fn count_sessions(&self) -> Result<i64> {
        let conn = self.conn.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?)
    }

    pub fn count_messages(&self) -> Result<i64> {
        let conn = self.conn.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?)
    }

    /// Number of user-role messages issued by a user across their sessions
    pub fn count_queries_by_user(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn.lock();
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM messages m JOIN sessions s ON m.session_id = s.id \
             WHERE s.user_id = ?1 AND m.role = 'user'",
            params![user_id],
            |row| row.get(0),
        )?)
    }

    // ==================== Documents ====================

    pub fn insert_document(&self, doc: &DocumentRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO documents (
                id, filename, uploader_user_id, uploader_username,
                upload_date, file_type, chunk_count, file_size_bytes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                doc.id,
                doc.filename,
                doc.uploader_user_id,
                doc.uploader_username,
                ts(&doc.upload_date),
                doc.file_type,
                doc.chunk_count,
                doc.file_size_bytes,
            ],
        )?;
        Ok(())
    }

    pub fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let conn = self.conn.lock();
        let doc = conn
            .query_row(
                "SELECT * FROM documents WHERE id = ?1",
                params![id],
                row_to_document,
            )
            .optional()?;
        Ok(doc)
    }

    pub fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM documents ORDER BY upload_date DESC")?;
        let docs = stmt
            .query_map([], row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    /// Paginated document listing with filename search
    pub fn list_documents_paged(
        &self,
        page: i64,
        page_size: i64,
        search: Option<&str>,
    ) -> Result<(Vec<DocumentRecord>, i64)> {
        let conn = self.conn.lock();
        let pattern = search.map(|s| format!("%{}%", s.to_lowercase()));

        let (total, docs) = match &pattern {
            Some(p) => {
                let total: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM documents WHERE lower(filename) LIKE ?1",
                    params![p],
                    |row| row.get(0),
                )?;
                let mut stmt = conn.prepare(
                    "SELECT * FROM documents WHERE lower(filename) LIKE ?1 \
                     ORDER BY upload_date DESC LIMIT ?2 OFFSET ?3",
                )?;
                let docs = stmt
                    .query_map(params![p, page_size, (page - 1) * page_size], row_to_document)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                (total, docs)
            }
            None => {
                let total: i64 =
                    conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
                let mut stmt = conn.prepare(
                    "SELECT * FROM documents ORDER BY upload_date DESC LIMIT ?1 OFFSET ?2",
                )?;
                let docs = stmt
                    .query_map(params![page_size, (page - 1) * page_size], row_to_document)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                (total, docs)
            }
        };
        Ok((docs, total))
    }

    pub fn delete_document(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    pub fn count_documents_by_user(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn.lock();
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE uploader_user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?)
    }

    // ==================== System config ====================

    /// Insert a setting definition if it does not already exist
    pub fn seed_setting(&self, setting: &ConfigSetting) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT OR IGNORE INTO system_config (
                name, value, default_value, data_type,
                min_value, max_value, category, description
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                setting.name,
                setting.value.to_json().to_string(),
                setting.default_value.to_json().to_string(),
                setting.data_type,
                setting.min,
                setting.max,
                setting.category,
                setting.description,
            ],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, name: &str) -> Result<Option<ConfigSetting>> {
        let conn = self.conn.lock();
        let setting = conn
            .query_row(
                "SELECT * FROM system_config WHERE name = ?1",
                params![name],
                row_to_setting,
            )
            .optional()?;
        Ok(setting)
    }

    pub fn list_settings(&self) -> Result<Vec<ConfigSetting>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM system_config ORDER BY category, name")?;
        let settings = stmt
            .query_map([], row_to_setting)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(settings)
    }

    // ==================== Activity log ====================

    /// List activity entries with filters, newest first
    pub fn list_activity(
        &self,
        admin_id: Option<&str>,
        action: Option<&str>,
        resource_id: Option<&str>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<ActivityEntry>, i64)> {
        let conn = self.conn.lock();

        let mut clauses = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(admin_id) = admin_id {
            args.push(Box::new(admin_id.to_string()));
            clauses.push(format!("admin_id = ?{}", args.len()));
        }
        if let Some(action) = action {
            args.push(Box::new(action.to_string()));
            clauses.push(format!("action = ?{}", args.len()));
        }
        if let Some(resource_id) = resource_id {
            args.push(Box::new(resource_id.to_string()));
            clauses.push(format!("resource_id = ?{}", args.len()));
        }
        if let Some(start) = start {
            args.push(Box::new(ts(&start)));
            clauses.push(format!("timestamp >= ?{}", args.len()));
        }
        if let Some(end) = end {
            args.push(Box::new(ts(&end)));
            clauses.push(format!("timestamp <= ?{}", args.len()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM activity_log {where_clause}"),
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            |row| row.get(0),
        )?;

        let offset = (page - 1) * page_size;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM activity_log {where_clause} ORDER BY timestamp DESC LIMIT {page_size} OFFSET {offset}"
        ))?;
        let logs = stmt
            .query_map(
                rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
                row_to_activity,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok((logs, total))
    }

    // ==================== API metrics ====================

    /// Record one request sample
    pub fn insert_metric(
        &self,
        endpoint: &str,
        method: &str,
        status: u16,
        elapsed_ms: i64,
        user_id: Option<&str>,
        error: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO api_metrics (endpoint, method, status, elapsed_ms, timestamp, user_id, error)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![endpoint, method, status, elapsed_ms, now_ts(), user_id, error],
        )?;
        Ok(())
    }

    /// Per-endpoint usage rollup since `cutoff`:
    /// (endpoint, method, requests, errors, avg_response_ms)
    pub fn usage_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<(String, String, i64, i64, f64)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT endpoint, method, COUNT(*),
                   SUM(CASE WHEN status >= 400 THEN 1 ELSE 0 END),
                   AVG(elapsed_ms)
            FROM api_metrics
            WHERE timestamp >= ?1
            GROUP BY endpoint, method
            ORDER BY COUNT(*) DESC
            "#,
        )?;
        let rows = stmt
            .query_map(params![ts(&cutoff)], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Error samples (status >= 400) within a window, newest first
    pub fn error_metrics(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        min_status: u16,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<serde_json::Value>, i64)> {
        let conn = self.conn.lock();
        let start = start.map(|s| ts(&s)).unwrap_or_else(|| ts(&DateTime::UNIX_EPOCH));
        let end = end.map(|e| ts(&e)).unwrap_or_else(now_ts);

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM api_metrics WHERE status >= ?1 AND timestamp BETWEEN ?2 AND ?3",
            params![min_status, start, end],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT endpoint, method, status, elapsed_ms, timestamp, user_id, error \
             FROM api_metrics WHERE status >= ?1 AND timestamp BETWEEN ?2 AND ?3 \
             ORDER BY timestamp DESC LIMIT ?4 OFFSET ?5",
        )?;
        let rows = stmt
            .query_map(
                params![min_status, start, end, page_size, (page - 1) * page_size],
                |row| {
                    Ok(serde_json::json!({
                        "endpoint": row.get::<_, String>(0)?,
                        "method": row.get::<_, String>(1)?,
                        "status": row.get::<_, i64>(2)?,
                        "elapsed_ms": row.get::<_, i64>(3)?,
                        "timestamp": row.get::<_, String>(4)?,
                        "user_id": row.get::<_, Option<String>>(5)?,
                        "error": row.get::<_, Option<String>>(6)?,
                    }))
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok((rows, total))
    }

    // ==================== Analytics ====================

    /// Distinct users posting queries per calendar day since `cutoff`
    pub fn daily_active_users(&self, cutoff: DateTime<Utc>) -> Result<Vec<DayCount>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT substr(m.timestamp, 1, 10) AS day, COUNT(DISTINCT s.user_id)
            FROM messages m JOIN sessions s ON m.session_id = s.id
            WHERE m.role = 'user' AND m.timestamp >= ?1
            GROUP BY day ORDER BY day
            "#,
        )?;
        let rows = stmt
            .query_map(params![ts(&cutoff)], |row| {
                Ok(DayCount {
                    date: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Users ranked by query volume since `cutoff`: (user_id, username, count)
    pub fn top_users(&self, cutoff: DateTime<Utc>, limit: i64) -> Result<Vec<(String, String, i64)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT s.user_id, COALESCE(u.username, 'unknown'), COUNT(*) AS queries
            FROM messages m
            JOIN sessions s ON m.session_id = s.id
            LEFT JOIN users u ON u.id = s.user_id
            WHERE m.role = 'user' AND m.timestamp >= ?1
            GROUP BY s.user_id ORDER BY queries DESC LIMIT ?2
            "#,
        )?;
        let rows = stmt
            .query_map(params![ts(&cutoff), limit], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Sessions created per calendar day since `cutoff`
    pub fn session_trend(&self, cutoff: DateTime<Utc>) -> Result<Vec<DayCount>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT substr(created_at, 1, 10) AS day, COUNT(*) FROM sessions \
             WHERE created_at >= ?1 GROUP BY day ORDER BY day",
        )?;
        let rows = stmt
            .query_map(params![ts(&cutoff)], |row| {
                Ok(DayCount {
                    date: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn sessions_since(&self, cutoff: DateTime<Utc>) -> Result<i64> {
        let conn = self.conn.lock();
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE created_at >= ?1",
            params![ts(&cutoff)],
            |row| row.get(0),
        )?)
    }

    pub fn active_users_since(&self, cutoff: DateTime<Utc>) -> Result<i64> {
        let conn = self.conn.lock();
        Ok(conn.query_row(
            r#"
            SELECT COUNT(DISTINCT s.user_id)
            FROM messages m JOIN sessions s ON m.session_id = s.id
            WHERE m.role = 'user' AND m.timestamp >= ?1
            "#,
            params![ts(&cutoff)],
            |row| row.get(0),
        )?)
    }
}

// ==================== Connection-level helpers ====================
//
// These operate on a borrowed connection so admin services can compose an
// effect with its activity entry inside one transaction.

/// Flip a user's active flag on an open connection
pub fn set_user_active_on(conn: &Connection, user_id: &str, is_active: bool) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
        params![user_id, is_active, now_ts()],
    )?;
    Ok(changed > 0)
}

/// Replace a user's password with an admin-issued temporary one
pub fn set_temp_password_on(conn: &Connection, user_id: &str, hash: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?2, must_reset = 1, updated_at = ?3 WHERE id = ?1",
        params![user_id, hash, now_ts()],
    )?;
    Ok(changed > 0)
}

/// Delete a document record on an open connection
pub fn delete_document_on(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

/// Write a setting value on an open connection
pub fn update_setting_value_on(
    conn: &Connection,
    name: &str,
    value: &SettingValue,
    updated_by: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE system_config SET value = ?2, updated_at = ?3, updated_by = ?4 WHERE name = ?1",
        params![name, value.to_json().to_string(), now_ts(), updated_by],
    )?;
    Ok(())
}

/// Append an activity entry on an open connection
pub fn insert_activity_on(
    conn: &Connection,
    admin_id: &str,
    admin_username: &str,
    action: &str,
    resource_type: &str,
    resource_id: &str,
    details: &serde_json::Value,
    client_addr: Option<&str>,
    timestamp: DateTime<Utc>,
    result: ActivityResult,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO activity_log (
            admin_id, admin_username, action, resource_type, resource_id,
            details, client_addr, timestamp, result
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            admin_id,
            admin_username,
            action,
            resource_type,
            resource_id,
            details.to_string(),
            client_addr,
            ts(&timestamp),
            result.as_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ==================== Row mapping ====================

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn now_ts() -> String {
    ts(&Utc::now())
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        full_name: row.get("full_name")?,
        is_active: row.get("is_active")?,
        is_admin: row.get("is_admin")?,
        must_reset: row.get("must_reset")?,
        reset_token: row.get("reset_token")?,
        reset_token_issued_at: row
            .get::<_, Option<String>>("reset_token_issued_at")?
            .map(|s| parse_ts(&s)),
        created_at: parse_ts(&row.get::<_, String>("created_at")?),
        updated_at: parse_ts(&row.get::<_, String>("updated_at")?),
        last_login: row.get::<_, Option<String>>("last_login")?.map(|s| parse_ts(&s)),
    })
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get("id")?,
        filename: row.get("filename")?,
        uploader_user_id: row.get("uploader_user_id")?,
        uploader_username: row.get("uploader_username")?,
        upload_date: parse_ts(&row.get::<_, String>("upload_date")?),
        file_type: row.get("file_type")?,
        chunk_count: row.get("chunk_count")?,
        file_size_bytes: row.get("file_size_bytes")?,
    })
}

fn row_to_setting(row: &rusqlite::Row) -> rusqlite::Result<ConfigSetting> {
    let value_raw: String = row.get("value")?;
    let default_raw: String = row.get("default_value")?;
    let data_type: String = row.get("data_type")?;

    let parse_value = |raw: &str| -> SettingValue {
        serde_json::from_str::<serde_json::Value>(raw)
            .ok()
            .and_then(|v| SettingValue::from_json(&data_type, &v).ok())
            .unwrap_or_else(|| SettingValue::Str(raw.to_string()))
    };

    Ok(ConfigSetting {
        name: row.get("name")?,
        value: parse_value(&value_raw),
        default_value: parse_value(&default_raw),
        data_type,
        min: row.get("min_value")?,
        max: row.get("max_value")?,
        category: row.get("category")?,
        description: row.get("description")?,
        updated_at: row.get::<_, Option<String>>("updated_at")?.map(|s| parse_ts(&s)),
        updated_by: row.get("updated_by")?,
    })
}

fn row_to_activity(row: &rusqlite::Row) -> rusqlite::Result<ActivityEntry> {
    let details_raw: String = row.get("details")?;
    let result_raw: String = row.get("result")?;
    Ok(ActivityEntry {
        id: row.get("id")?,
        admin_id: row.get("admin_id")?,
        admin_username: row.get("admin_username")?,
        action: row.get("action")?,
        resource_type: row.get("resource_type")?,
        resource_id: row.get("resource_id")?,
        details: serde_json::from_str(&details_raw).unwrap_or(serde_json::Value::Null),
        client_addr: row.get("client_addr")?,
        timestamp: parse_ts(&row.get::<_, String>("timestamp")?),
        result: ActivityResult::parse(&result_raw),
    })
}
