//! Domain records and API request/response types

pub mod activity;
pub mod admin;
pub mod chat;
pub mod document;
pub mod settings;
pub mod user;

pub use activity::{ActivityEntry, ActivityResult};
pub use chat::{ChatRequest, ChatResponse, Source};
pub use document::{ChunkMetadata, DocumentRecord, IndexedChunk};
pub use settings::{ConfigSetting, SettingValue};
pub use user::{User, UserView};
