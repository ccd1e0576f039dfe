#[cfg(test)]
pub mod test_utils {
    use crate::caller::USER_ID_HEADER;
    use crate::config::{build_app_state, Settings};
    use crate::router::create_router;
    use crate::schemas::AppState;
    use axum::http::{HeaderName, HeaderValue};
    use axum::Router;
    use axum_test::TestServer;
    use chrono::{NaiveDate, Utc};
    use migration::{Migrator, MigratorTrait};
    use model::entities::activity_field::FieldKind;
    use model::entities::user::RoleLevel;
    use model::entities::{
        activity, activity_field, activity_field_assignment, district, district_activity, notification,
        tehsil, tehsil_activity, user, user_district, user_permission, user_tehsil,
    };
    use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    /// Create AppState for testing, backed by an in-memory database and media store
    pub async fn setup_test_app_state() -> AppState {
        build_app_state(setup_test_db().await, Settings::in_memory())
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The log level is taken from RUST_LOG and defaults to WARN.
    pub fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| match level.to_uppercase().as_str() {
                "ERROR" => Some(Level::ERROR),
                "WARN" => Some(Level::WARN),
                "INFO" => Some(Level::INFO),
                "DEBUG" => Some(Level::DEBUG),
                "TRACE" => Some(Level::TRACE),
                _ => None,
            })
            .unwrap_or(Level::WARN);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Create axum app for testing
    pub async fn setup_test_app() -> Router {
        let _guard = init_test_tracing();
        create_router(setup_test_app_state().await)
    }

    /// A test server together with the state it serves, so tests can seed
    /// rows directly.
    pub async fn setup_test_server() -> (TestServer, AppState) {
        let _guard = init_test_tracing();
        let state = setup_test_app_state().await;
        let server = TestServer::new(create_router(state.clone())).expect("Failed to start test server");
        (server, state)
    }

    /// Header identifying the calling user.
    pub fn as_user(user: &user::Model) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static(USER_ID_HEADER),
            HeaderValue::from(user.id),
        )
    }

    pub fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    pub fn days_from_today(days: i64) -> NaiveDate {
        today() + chrono::Duration::days(days)
    }

    pub async fn seed_district(db: &DatabaseConnection, name: &str) -> district::Model {
        district::ActiveModel {
            name: Set(name.to_string()),
            franchising_phase_no: Set(Some(1)),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create district")
    }

    pub async fn seed_tehsil(db: &DatabaseConnection, district_id: i32, name: &str, is_active: bool) -> tehsil::Model {
        tehsil::ActiveModel {
            district_id: Set(district_id),
            name: Set(name.to_string()),
            is_active: Set(is_active),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create tehsil")
    }

    pub async fn seed_activity(db: &DatabaseConnection, name: &str) -> activity::Model {
        activity::ActiveModel {
            name: Set(name.to_string()),
            sort_order: Set(1),
            is_active: Set(true),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create activity")
    }

    /// Creates a field and appends it to the activity's form.
    pub async fn seed_form_field(
        db: &DatabaseConnection,
        activity_id: i32,
        name: &str,
        kind: FieldKind,
        is_required: bool,
        position: i32,
    ) -> activity_field::Model {
        let field = activity_field::ActiveModel {
            title: Set(name.replace('_', " ")),
            name: Set(name.to_string()),
            field_type: Set(kind),
            is_required: Set(is_required),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create activity field");

        activity_field_assignment::ActiveModel {
            activity_id: Set(activity_id),
            activity_field_id: Set(field.id),
            position: Set(position),
        }
        .insert(db)
        .await
        .expect("Failed to assign activity field");

        field
    }

    /// Creates a user with the given permissions and assigned area.
    pub async fn seed_user(
        db: &DatabaseConnection,
        username: &str,
        role_name: &str,
        level: RoleLevel,
        permissions: &[&str],
        districts: &[i32],
        tehsils: &[i32],
    ) -> user::Model {
        let user = user::ActiveModel {
            username: Set(username.to_string()),
            name: Set(username.to_string()),
            role_name: Set(role_name.to_string()),
            role_level: Set(level),
            is_active: Set(true),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create user");

        for permission in permissions {
            user_permission::ActiveModel {
                user_id: Set(user.id),
                permission: Set(permission.to_string()),
            }
            .insert(db)
            .await
            .expect("Failed to grant permission");
        }
        for district_id in districts {
            user_district::ActiveModel {
                user_id: Set(user.id),
                district_id: Set(*district_id),
            }
            .insert(db)
            .await
            .expect("Failed to assign district");
        }
        for tehsil_id in tehsils {
            user_tehsil::ActiveModel {
                user_id: Set(user.id),
                tehsil_id: Set(*tehsil_id),
            }
            .insert(db)
            .await
            .expect("Failed to assign tehsil");
        }
        user
    }

    /// A super admin holding every permission named in `permissions`.
    pub async fn seed_admin(db: &DatabaseConnection, permissions: &[&str]) -> user::Model {
        seed_user(db, "admin", crate::caller::SUPER_ADMIN_ROLE, RoleLevel::Admin, permissions, &[], &[]).await
    }

    pub async fn seed_notification(db: &DatabaseConnection, user_id: i32, title: &str) -> notification::Model {
        notification::ActiveModel {
            user_id: Set(user_id),
            kind: Set("schedule_created".to_string()),
            title: Set(title.to_string()),
            body: Set(format!("{title} body")),
            data: Set(serde_json::json!({})),
            read_at: Set(None),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create notification")
    }

    /// Inserts a schedule directly, bypassing window validation. Each entry of
    /// `tehsils` is a tehsil id and whether its row is assigned.
    pub async fn seed_schedule(
        db: &DatabaseConnection,
        district_id: i32,
        activity_id: i32,
        created_by: i32,
        from_date: NaiveDate,
        to_date: NaiveDate,
        tehsils: &[(i32, bool)],
    ) -> (district_activity::Model, Vec<tehsil_activity::Model>) {
        let now = Utc::now().naive_utc();
        let schedule = district_activity::ActiveModel {
            district_id: Set(district_id),
            activity_id: Set(activity_id),
            from_date: Set(from_date),
            to_date: Set(to_date),
            is_unscheduled: Set(false),
            created_by: Set(created_by),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create schedule");

        let mut rows = Vec::with_capacity(tehsils.len());
        for (tehsil_id, is_assigned) in tehsils {
            let row = tehsil_activity::ActiveModel {
                district_activity_id: Set(schedule.id),
                district_id: Set(district_id),
                tehsil_id: Set(Some(*tehsil_id)),
                activity_id: Set(activity_id),
                is_assigned: Set(*is_assigned),
                assigned_at: Set(is_assigned.then_some(now)),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await
            .expect("Failed to create tehsil activity");
            rows.push(row);
        }
        (schedule, rows)
    }
}
