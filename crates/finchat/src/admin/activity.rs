//! Append-only audit trail for admin actions

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::storage::{insert_activity_on, Database};
use crate::types::activity::{ActivityEntry, ActivityResult};

/// Records admin actions with monotonic timestamps.
///
/// Admin services call `log_on` with the same connection that carries the
/// mutation, so the entry commits iff the effect commits.
pub struct ActivityLogger {
    db: Arc<Database>,
    /// Last issued timestamp in microseconds, to keep entries ordered even
    /// when the wall clock stalls or steps backwards
    last_ts_micros: AtomicI64,
}

/// Identity of the admin performing an action, plus the client address
#[derive(Debug, Clone)]
pub struct AdminActor {
    pub id: String,
    pub username: String,
    pub client_addr: Option<String>,
}

impl ActivityLogger {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            last_ts_micros: AtomicI64::new(0),
        }
    }

    /// Next strictly-increasing timestamp
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_micros();
        let mut prev = self.last_ts_micros.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self.last_ts_micros.compare_exchange_weak(
                prev,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    return Utc
                        .timestamp_micros(next)
                        .single()
                        .unwrap_or_else(Utc::now)
                }
                Err(actual) => prev = actual,
            }
        }
    }

    /// Append an entry on an open connection, inside the caller's transaction
    #[allow(clippy::too_many_arguments)]
    pub fn log_on(
        &self,
        conn: &Connection,
        actor: &AdminActor,
        action: &str,
        resource_type: &str,
        resource_id: &str,
        details: serde_json::Value,
        result: ActivityResult,
    ) -> Result<i64> {
        let timestamp = self.next_timestamp();
        let id = insert_activity_on(
            conn,
            &actor.id,
            &actor.username,
            action,
            resource_type,
            resource_id,
            &details,
            actor.client_addr.as_deref(),
            timestamp,
            result,
        )?;
        tracing::info!(
            admin = %actor.username,
            action,
            resource_type,
            resource_id,
            result = result.as_str(),
            "activity logged"
        );
        Ok(id)
    }

    /// Append a standalone entry in its own transaction
    #[allow(clippy::too_many_arguments)]
    pub fn log(
        &self,
        actor: &AdminActor,
        action: &str,
        resource_type: &str,
        resource_id: &str,
        details: serde_json::Value,
        result: ActivityResult,
    ) -> Result<i64> {
        self.db
            .transaction(|conn| self.log_on(conn, actor, action, resource_type, resource_id, details, result))
    }

    /// List entries with filters and pagination
    #[allow(clippy::too_many_arguments)]
    pub fn list(
        &self,
        admin_id: Option<&str>,
        action: Option<&str>,
        resource_id: Option<&str>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<ActivityEntry>, i64)> {
        self.db
            .list_activity(admin_id, action, resource_id, start, end, page, page_size)
    }
}
