//! Administrative control plane

pub mod activity;
pub mod analytics;
pub mod config;
pub mod documents;
pub mod monitor;
pub mod users;

pub use activity::{ActivityLogger, AdminActor};
pub use analytics::AnalyticsService;
pub use config::{ConfigManager, RuntimeSettings};
pub use documents::AdminDocumentService;
pub use monitor::SystemMonitorService;
pub use users::AdminUserService;
