//! Engagement and session analytics

use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::error::Result;
use crate::storage::Database;
use crate::types::admin::{SessionAnalytics, TopUser, UserAnalytics};

/// Analytics windows are clamped to 1-365 days
pub const MAX_ANALYTICS_WINDOW_DAYS: i64 = 365;

const TOP_USER_LIMIT: i64 = 10;

/// Read-only analytics over users, sessions, and queries
pub struct AnalyticsService {
    db: Arc<Database>,
}

impl AnalyticsService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// User engagement over the last `days` (clamped to 1-365)
    pub fn users(&self, days: i64) -> Result<UserAnalytics> {
        let days = days.clamp(1, MAX_ANALYTICS_WINDOW_DAYS);
        let cutoff = Utc::now() - Duration::days(days);

        Ok(UserAnalytics {
            window_days: days,
            total_users: self.db.count_users()?,
            active_users: self.db.active_users_since(cutoff)?,
            daily_active_users: self.db.daily_active_users(cutoff)?,
            top_users: self
                .db
                .top_users(cutoff, TOP_USER_LIMIT)?
                .into_iter()
                .map(|(user_id, username, query_count)| TopUser {
                    user_id,
                    username,
                    query_count,
                })
                .collect(),
        })
    }

    /// Session volume and trend over the last `days` (clamped to 1-365)
    pub fn sessions(&self, days: i64) -> Result<SessionAnalytics> {
        let days = days.clamp(1, MAX_ANALYTICS_WINDOW_DAYS);
        let cutoff = Utc::now() - Duration::days(days);

        let total_sessions = self.db.count_sessions()?;
        let total_messages = self.db.count_messages()?;

        Ok(SessionAnalytics {
            window_days: days,
            total_sessions: self.db.sessions_since(cutoff)?,
            avg_messages_per_session: if total_sessions > 0 {
                (total_messages as f64 / total_sessions as f64 * 100.0).round() / 100.0
            } else {
                0.0
            },
            session_trend: self.db.session_trend(cutoff)?,
        })
    }
}
