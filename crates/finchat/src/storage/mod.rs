//! Persistent record store

mod database;

pub use database::{
    delete_document_on, insert_activity_on, set_temp_password_on, set_user_active_on,
    update_setting_value_on, Database, SessionRecord,
};
