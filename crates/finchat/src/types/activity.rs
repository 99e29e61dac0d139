//! Activity log entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a logged admin action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityResult {
    Success,
    Failure,
}

impl ActivityResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "failure" => Self::Failure,
            _ => Self::Success,
        }
    }
}

/// An append-only record of an admin-originated state change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub admin_id: String,
    pub admin_username: String,
    /// Action type, e.g. "user_disabled", "document_deleted", "config_update"
    pub action: String,
    /// Affected resource kind, e.g. "user", "document", "config"
    pub resource_type: String,
    pub resource_id: String,
    /// Action-specific structured details
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_addr: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub result: ActivityResult,
}
