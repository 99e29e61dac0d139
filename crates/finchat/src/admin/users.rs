//! Admin user lifecycle operations

use std::sync::Arc;

use crate::admin::activity::{ActivityLogger, AdminActor};
use crate::auth::AuthService;
use crate::error::{Error, Result};
use crate::storage::{set_temp_password_on, set_user_active_on, Database};
use crate::types::activity::ActivityResult;
use crate::types::admin::{clamp_pagination, Page, UserDetail, UserListParams};
use crate::types::user::UserView;

/// User management for the admin surface.
///
/// Every mutation commits together with its activity entry.
pub struct AdminUserService {
    db: Arc<Database>,
    auth: Arc<AuthService>,
    activity: Arc<ActivityLogger>,
}

impl AdminUserService {
    pub fn new(db: Arc<Database>, auth: Arc<AuthService>, activity: Arc<ActivityLogger>) -> Self {
        Self { db, auth, activity }
    }

    /// Paginated user listing with search and sorting
    pub fn list(&self, params: &UserListParams) -> Result<Page<UserView>> {
        let (page, page_size) = clamp_pagination(params.page, params.page_size);
        let sort_by = params.sort_by.as_deref().unwrap_or("created_at");
        let descending = params.sort_order.as_deref() != Some("asc");

        let (users, total) = self.db.list_users(
            page,
            page_size,
            params.search.as_deref().filter(|s| !s.is_empty()),
            sort_by,
            descending,
        )?;

        Ok(Page::new(
            users.iter().map(|u| u.view()).collect(),
            total,
            page,
            page_size,
        ))
    }

    /// Full user detail with document and query counts
    pub fn details(&self, user_id: &str) -> Result<UserDetail> {
        let user = self
            .db
            .get_user(user_id)?
            .ok_or_else(|| Error::NotFound(format!("User not found: {user_id}")))?;

        Ok(UserDetail {
            document_count: self.db.count_documents_by_user(user_id)?,
            query_count: self.db.count_queries_by_user(user_id)?,
            updated_at: user.updated_at,
            user: user.view(),
        })
    }

    /// Enable or disable an account, with audit
    pub fn set_status(
        &self,
        user_id: &str,
        is_active: bool,
        reason: Option<&str>,
        actor: &AdminActor,
    ) -> Result<()> {
        let user = self
            .db
            .get_user(user_id)?
            .ok_or_else(|| Error::NotFound(format!("User not found: {user_id}")))?;

        let action = if is_active { "user_enabled" } else { "user_disabled" };
        self.db.transaction(|conn| {
            set_user_active_on(conn, user_id, is_active)?;
            self.activity.log_on(
                conn,
                actor,
                action,
                "user",
                user_id,
                serde_json::json!({
                    "username": user.username,
                    "reason": reason,
                    "previous_status": user.is_active,
                    "new_status": is_active,
                }),
                ActivityResult::Success,
            )?;
            Ok(())
        })
    }

    /// Force-reset a user's password to a one-time temporary value.
    ///
    /// The temporary password is returned exactly once; the user must change
    /// it on next login.
    pub fn reset_password(&self, user_id: &str, actor: &AdminActor) -> Result<String> {
        let user = self
            .db
            .get_user(user_id)?
            .ok_or_else(|| Error::NotFound(format!("User not found: {user_id}")))?;

        let temp_password = AuthService::generate_temp_password();
        let hash = self.auth.hash(&temp_password)?;

        self.db.transaction(|conn| {
            set_temp_password_on(conn, user_id, &hash)?;
            self.activity.log_on(
                conn,
                actor,
                "password_reset",
                "user",
                user_id,
                serde_json::json!({ "username": user.username }),
                ActivityResult::Success,
            )?;
            Ok(())
        })?;

        Ok(temp_password)
    }

    /// Activity entries touching a given user
    pub fn user_activity(
        &self,
        user_id: &str,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<crate::types::activity::ActivityEntry>, i64)> {
        let (page, page_size) = clamp_pagination(page, page_size);
        self.activity
            .list(None, None, Some(user_id), None, None, page, page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::config::ConfigManager;
    use crate::config::Settings;
    use crate::types::admin::{default_page, default_page_size};

    struct Fixture {
        service: AdminUserService,
        auth: Arc<AuthService>,
        db: Arc<Database>,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(Database::in_memory().unwrap());
        let activity = Arc::new(ActivityLogger::new(Arc::clone(&db)));
        let config = Arc::new(
            ConfigManager::new(Arc::clone(&db), Arc::clone(&activity), &Settings::default())
                .unwrap(),
        );
        let auth = Arc::new(AuthService::new(Arc::clone(&db), config, "secret"));
        Fixture {
            service: AdminUserService::new(Arc::clone(&db), Arc::clone(&auth), activity),
            auth,
            db,
        }
    }

    fn actor() -> AdminActor {
        AdminActor {
            id: "admin-1".to_string(),
            username: "root".to_string(),
            client_addr: None,
        }
    }

    #[test]
    fn status_toggle_emits_exactly_one_entry() {
        let f = fixture();
        let view = f
            .auth
            .register("alice", "alice@example.com", "Aa1!aa1!", None)
            .unwrap();

        f.service
            .set_status(&view.user_id, false, Some("abuse"), &actor())
            .unwrap();

        let user = f.db.get_user(&view.user_id).unwrap().unwrap();
        assert!(!user.is_active);

        let (entries, total) = f.service.user_activity(&view.user_id, 1, 50).unwrap();
        assert_eq!(total, 1);
        assert_eq!(entries[0].action, "user_disabled");
        assert_eq!(entries[0].details["reason"], "abuse");
    }

    #[test]
    fn reset_password_sets_must_reset_and_audits() {
        let f = fixture();
        let view = f
            .auth
            .register("bob", "bob@example.com", "Aa1!aa1!", None)
            .unwrap();

        let temp = f.service.reset_password(&view.user_id, &actor()).unwrap();
        assert_eq!(temp.len(), 12);

        let user = f.db.get_user(&view.user_id).unwrap().unwrap();
        assert!(user.must_reset);

        // The temporary password authenticates
        let (_, logged_in) = f.auth.login("bob", &temp).unwrap();
        assert!(logged_in.must_reset);

        let (entries, total) = f.service.user_activity(&view.user_id, 1, 50).unwrap();
        assert_eq!(total, 1);
        assert_eq!(entries[0].action, "password_reset");
        // Temporary password never lands in the audit details
        assert!(!entries[0].details.to_string().contains(&temp));
    }

    #[test]
    fn unknown_user_mutations_are_not_found_and_unlogged() {
        let f = fixture();
        assert!(matches!(
            f.service.set_status("ghost", false, None, &actor()),
            Err(Error::NotFound(_))
        ));
        let (_, total) = f.service.user_activity("ghost", 1, 50).unwrap();
        assert_eq!(total, 0);
    }

    #[test]
    fn listing_supports_search_and_pagination_clamp() {
        let f = fixture();
        f.auth.register("alice", "alice@example.com", "Aa1!aa1!", None).unwrap();
        f.auth.register("bob", "bob@example.com", "Aa1!aa1!", None).unwrap();

        let page = f
            .service
            .list(&UserListParams {
                page: default_page(),
                page_size: 5, // below the minimum, clamps to 10
                search: Some("ali".to_string()),
                sort_by: None,
                sort_order: None,
            })
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.page_size, 10);
        assert_eq!(page.items[0].username, "alice");
        assert_eq!(default_page_size(), 50);
    }

    #[test]
    fn details_include_query_and_document_counts() {
        let f = fixture();
        let view = f
            .auth
            .register("carol", "carol@example.com", "Aa1!aa1!", None)
            .unwrap();
        f.db.insert_session("s1", &view.user_id).unwrap();
        f.db.append_message_pair("s1", "q", "a").unwrap();

        let details = f.service.details(&view.user_id).unwrap();
        assert_eq!(details.query_count, 1);
        assert_eq!(details.document_count, 0);
    }
}
