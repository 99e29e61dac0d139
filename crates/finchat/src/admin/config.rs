//! Dynamic configuration: seeded settings, validated updates, live snapshot

use parking_lot::RwLock;
use std::sync::Arc;

use crate::admin::activity::{ActivityLogger, AdminActor};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::storage::{update_setting_value_on, Database};
use crate::types::activity::ActivityResult;
use crate::types::settings::{ConfigSetting, SettingValue};

/// The live-reloadable subset of configuration.
///
/// Every request reads one snapshot for its whole execution; admin updates
/// swap in a fresh snapshot that takes effect on the next request.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub max_conversation_turns: i64,
    pub max_file_size_mb: i64,
    pub gemini_temperature: f64,
    pub gemini_max_tokens: i64,
    pub chat_model: String,
    pub embedding_model: String,
    pub access_token_expire_minutes: i64,
    pub session_retention_days: i64,
}

impl RuntimeSettings {
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb as usize * 1_000_000
    }
}

/// Manages the `system_config` table and the process-wide snapshot
pub struct ConfigManager {
    db: Arc<Database>,
    activity: Arc<ActivityLogger>,
    snapshot: RwLock<Arc<RuntimeSettings>>,
}

impl ConfigManager {
    /// Seed defaults from startup settings, then build the initial snapshot
    pub fn new(db: Arc<Database>, activity: Arc<ActivityLogger>, startup: &Settings) -> Result<Self> {
        for setting in seed_definitions(startup) {
            db.seed_setting(&setting)?;
        }

        let manager = Self {
            db,
            activity,
            snapshot: RwLock::new(Arc::new(fallback_snapshot(startup))),
        };
        manager.reload()?;
        Ok(manager)
    }

    /// Current settings snapshot
    pub fn snapshot(&self) -> Arc<RuntimeSettings> {
        Arc::clone(&self.snapshot.read())
    }

    /// Rebuild the snapshot from stored values
    pub fn reload(&self) -> Result<()> {
        let settings = self.db.list_settings()?;
        let get_i64 = |name: &str, default: i64| -> i64 {
            settings
                .iter()
                .find(|s| s.name == name)
                .and_then(|s| s.value.as_i64())
                .unwrap_or(default)
        };
        let get_f64 = |name: &str, default: f64| -> f64 {
            settings
                .iter()
                .find(|s| s.name == name)
                .and_then(|s| s.value.as_f64())
                .unwrap_or(default)
        };
        let get_str = |name: &str, default: &str| -> String {
            settings
                .iter()
                .find(|s| s.name == name)
                .and_then(|s| s.value.as_str().map(str::to_string))
                .unwrap_or_else(|| default.to_string())
        };

        let snapshot = RuntimeSettings {
            chunk_size: get_i64("chunk_size", 800) as usize,
            chunk_overlap: get_i64("chunk_overlap", 100) as usize,
            top_k: get_i64("top_k_chunks", 5) as usize,
            similarity_threshold: get_f64("similarity_threshold", 0.7) as f32,
            max_conversation_turns: get_i64("max_conversation_turns", 20),
            max_file_size_mb: get_i64("max_file_size_mb", 10),
            gemini_temperature: get_f64("gemini_temperature", 0.7),
            gemini_max_tokens: get_i64("gemini_max_tokens", 500),
            chat_model: get_str("gemini_chat_model", "models/gemini-2.5-flash"),
            embedding_model: get_str("gemini_embedding_model", "models/text-embedding-004"),
            access_token_expire_minutes: get_i64("jwt_access_token_expire_minutes", 30),
            session_retention_days: get_i64("session_retention_days", 30),
        };

        *self.snapshot.write() = Arc::new(snapshot);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<ConfigSetting> {
        self.db
            .get_setting(name)?
            .ok_or_else(|| Error::NotFound(format!("Setting not found: {name}")))
    }

    pub fn list(&self) -> Result<Vec<ConfigSetting>> {
        self.db.list_settings()
    }

    /// Update a setting: validate against type and range, persist together
    /// with its activity entry, then refresh the snapshot.
    ///
    /// A repeated update to the same value is a no-op on the stored value but
    /// still emits an activity entry.
    pub fn update(
        &self,
        name: &str,
        raw_value: &serde_json::Value,
        actor: &AdminActor,
    ) -> Result<ConfigSetting> {
        let setting = self.get(name)?;
        let new_value = setting.validate_value(raw_value)?;
        let old_value = setting.value.clone();

        self.db.transaction(|conn| {
            update_setting_value_on(conn, name, &new_value, &actor.username)?;
            self.activity.log_on(
                conn,
                actor,
                "config_update",
                "config",
                name,
                serde_json::json!({
                    "setting_name": name,
                    "old_value": old_value.to_json(),
                    "new_value": new_value.to_json(),
                }),
                ActivityResult::Success,
            )?;
            Ok(())
        })?;

        self.reload()?;
        tracing::info!(
            setting = name,
            old = %old_value.to_json(),
            new = %new_value.to_json(),
            admin = %actor.username,
            "config setting updated"
        );
        self.get(name)
    }
}

/// Build a snapshot straight from startup settings, used until the first
/// successful reload
fn fallback_snapshot(startup: &Settings) -> RuntimeSettings {
    RuntimeSettings {
        chunk_size: startup.chunk_size as usize,
        chunk_overlap: startup.chunk_overlap as usize,
        top_k: startup.top_k_chunks as usize,
        similarity_threshold: startup.similarity_threshold as f32,
        max_conversation_turns: startup.max_conversation_turns,
        max_file_size_mb: startup.max_file_size_mb,
        gemini_temperature: startup.gemini_temperature,
        gemini_max_tokens: startup.gemini_max_tokens,
        chat_model: startup.gemini_chat_model.clone(),
        embedding_model: startup.gemini_embedding_model.clone(),
        access_token_expire_minutes: startup.jwt_access_token_expire_minutes,
        session_retention_days: startup.session_retention_days,
    }
}

/// The seeded setting definitions, with current values taken from startup
/// settings and defaults fixed here
fn seed_definitions(startup: &Settings) -> Vec<ConfigSetting> {
    let int = |name: &str,
               value: i64,
               default: i64,
               min: f64,
               max: f64,
               category: &str,
               description: &str| ConfigSetting {
        name: name.to_string(),
        value: SettingValue::Int(value),
        default_value: SettingValue::Int(default),
        data_type: "int".to_string(),
        min: Some(min),
        max: Some(max),
        category: category.to_string(),
        description: description.to_string(),
        updated_at: None,
        updated_by: None,
    };

    vec![
        int(
            "chunk_size",
            startup.chunk_size,
            800,
            100.0,
            2000.0,
            "rag",
            "Size of text chunks in characters for document processing",
        ),
        int(
            "chunk_overlap",
            startup.chunk_overlap,
            100,
            0.0,
            500.0,
            "rag",
            "Overlap between chunks in characters to maintain context",
        ),
        int(
            "top_k_chunks",
            startup.top_k_chunks,
            5,
            1.0,
            20.0,
            "rag",
            "Number of most relevant chunks to retrieve for context",
        ),
        ConfigSetting {
            name: "similarity_threshold".to_string(),
            value: SettingValue::Float(startup.similarity_threshold),
            default_value: SettingValue::Float(0.7),
            data_type: "float".to_string(),
            min: Some(0.0),
            max: Some(1.0),
            category: "rag".to_string(),
            description: "Minimum similarity score (0.0-1.0) for retrieved chunks".to_string(),
            updated_at: None,
            updated_by: None,
        },
        int(
            "max_conversation_turns",
            startup.max_conversation_turns,
            20,
            1.0,
            100.0,
            "rag",
            "Maximum conversation turns to keep in history",
        ),
        int(
            "session_retention_days",
            startup.session_retention_days,
            30,
            1.0,
            365.0,
            "rag",
            "Days of inactivity before a session is evicted",
        ),
        int(
            "max_file_size_mb",
            startup.max_file_size_mb,
            10,
            1.0,
            100.0,
            "document",
            "Maximum file size for document uploads in megabytes",
        ),
        ConfigSetting {
            name: "gemini_temperature".to_string(),
            value: SettingValue::Float(startup.gemini_temperature),
            default_value: SettingValue::Float(0.7),
            data_type: "float".to_string(),
            min: Some(0.0),
            max: Some(2.0),
            category: "llm".to_string(),
            description: "Temperature for LLM generation (0.0-2.0). Higher values make output more random"
                .to_string(),
            updated_at: None,
            updated_by: None,
        },
        int(
            "gemini_max_tokens",
            startup.gemini_max_tokens,
            500,
            1.0,
            8192.0,
            "llm",
            "Maximum tokens for LLM response generation",
        ),
        ConfigSetting {
            name: "gemini_chat_model".to_string(),
            value: SettingValue::Str(startup.gemini_chat_model.clone()),
            default_value: SettingValue::Str("models/gemini-2.5-flash".to_string()),
            data_type: "string".to_string(),
            min: Some(1.0),
            max: Some(100.0),
            category: "llm".to_string(),
            description: "Gemini chat model name to use for response generation".to_string(),
            updated_at: None,
            updated_by: None,
        },
        ConfigSetting {
            name: "gemini_embedding_model".to_string(),
            value: SettingValue::Str(startup.gemini_embedding_model.clone()),
            default_value: SettingValue::Str("models/text-embedding-004".to_string()),
            data_type: "string".to_string(),
            min: Some(1.0),
            max: Some(100.0),
            category: "llm".to_string(),
            description: "Gemini embedding model name for document vectorization".to_string(),
            updated_at: None,
            updated_by: None,
        },
        int(
            "jwt_access_token_expire_minutes",
            startup.jwt_access_token_expire_minutes,
            30,
            1.0,
            1440.0,
            "api",
            "JWT access token expiration time in minutes",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let db = Arc::new(Database::in_memory().unwrap());
        let activity = Arc::new(ActivityLogger::new(Arc::clone(&db)));
        ConfigManager::new(db, activity, &Settings::default()).unwrap()
    }

    fn actor() -> AdminActor {
        AdminActor {
            id: "admin-1".to_string(),
            username: "root".to_string(),
            client_addr: None,
        }
    }

    #[test]
    fn seeds_and_snapshots_defaults() {
        let manager = manager();
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.chunk_size, 800);
        assert_eq!(snapshot.top_k, 5);
        assert_eq!(snapshot.chat_model, "models/gemini-2.5-flash");
    }

    #[test]
    fn update_below_min_is_rejected_and_not_persisted() {
        let manager = manager();
        let err = manager
            .update("chunk_size", &serde_json::json!(50), &actor())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(manager.snapshot().chunk_size, 800);
    }

    #[test]
    fn valid_update_persists_refreshes_snapshot_and_audits() {
        let manager = manager();
        let updated = manager
            .update("chunk_size", &serde_json::json!(1000), &actor())
            .unwrap();
        assert_eq!(updated.value, SettingValue::Int(1000));
        assert_eq!(updated.updated_by.as_deref(), Some("root"));
        assert_eq!(manager.snapshot().chunk_size, 1000);

        let (entries, total) = manager
            .activity
            .list(None, Some("config_update"), Some("chunk_size"), None, None, 1, 50)
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(entries[0].details["old_value"], serde_json::json!(800));
        assert_eq!(entries[0].details["new_value"], serde_json::json!(1000));
    }

    #[test]
    fn repeated_update_still_emits_an_entry() {
        let manager = manager();
        manager.update("chunk_size", &serde_json::json!(1000), &actor()).unwrap();
        manager.update("chunk_size", &serde_json::json!(1000), &actor()).unwrap();

        let (_, total) = manager
            .activity
            .list(None, Some("config_update"), Some("chunk_size"), None, None, 1, 50)
            .unwrap();
        assert_eq!(total, 2);
    }

    #[test]
    fn unknown_setting_is_not_found() {
        let manager = manager();
        let err = manager
            .update("no_such_setting", &serde_json::json!(1), &actor())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
