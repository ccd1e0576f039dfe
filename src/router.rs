use crate::handlers::{
    activities::{
        create_activity, delete_activity, get_activities, get_activity, get_activity_form_fields,
        set_activity_form_fields, update_activity, update_activity_status,
    },
    activity_fields::{
        create_activity_field, delete_activity_field, get_activity_fields, update_activity_field,
    },
    calendar::get_calendar,
    complaints::{act_on_complaint, create_complaint, get_complaint, get_complaints},
    dashboard::{get_dashboard, get_trend},
    feedbacks::{create_feedback, get_feedbacks},
    frequencies::{create_frequency, get_frequencies},
    geography::{
        create_district, create_tehsil, get_district_tehsils, get_districts, get_hierarchy,
        update_district, update_tehsil,
    },
    health::health_check,
    media::get_media_gallery,
    notifications::{get_notifications, mark_notification_read},
    reports::{export_performed_report, get_activities_report, get_performed_report},
    schedules::{create_schedule, delete_schedule, get_schedule, get_schedules},
    submissions::{create_submission, get_perform_form, get_submission, get_submissions},
    tehsil_activities::{assign_tehsil_activity, delete_tehsil_activity},
    unscheduled::create_unscheduled_activity,
    users::{
        create_user, delete_user, get_me, get_user, get_users, set_user_districts,
        set_user_permissions, set_user_tehsils, update_user,
    },
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Geography
        .route("/api/v1/districts", get(get_districts).post(create_district))
        .route("/api/v1/districts/hierarchy", get(get_hierarchy))
        .route("/api/v1/districts/:district_id", put(update_district))
        .route("/api/v1/districts/:district_id/tehsils", get(get_district_tehsils))
        .route("/api/v1/tehsils", post(create_tehsil))
        .route("/api/v1/tehsils/:tehsil_id", put(update_tehsil))
        // Users
        .route("/api/v1/me", get(get_me))
        .route("/api/v1/users", post(create_user).get(get_users))
        .route(
            "/api/v1/users/:user_id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/api/v1/users/:user_id/permissions", put(set_user_permissions))
        .route("/api/v1/users/:user_id/districts", put(set_user_districts))
        .route("/api/v1/users/:user_id/tehsils", put(set_user_tehsils))
        // Activity catalogue
        .route("/api/v1/frequencies", get(get_frequencies).post(create_frequency))
        .route(
            "/api/v1/activity-fields",
            get(get_activity_fields).post(create_activity_field),
        )
        .route(
            "/api/v1/activity-fields/:field_id",
            put(update_activity_field).delete(delete_activity_field),
        )
        .route("/api/v1/activities", get(get_activities).post(create_activity))
        .route(
            "/api/v1/activities/:activity_id",
            get(get_activity).put(update_activity).delete(delete_activity),
        )
        .route(
            "/api/v1/activities/:activity_id/status",
            patch(update_activity_status),
        )
        .route(
            "/api/v1/activities/:activity_id/fields",
            get(get_activity_form_fields).put(set_activity_form_fields),
        )
        // Scheduling
        .route("/api/v1/schedules", post(create_schedule).get(get_schedules))
        .route(
            "/api/v1/schedules/:schedule_id",
            get(get_schedule).delete(delete_schedule),
        )
        .route(
            "/api/v1/tehsil-activities/:tehsil_activity_id",
            delete(delete_tehsil_activity),
        )
        .route(
            "/api/v1/tehsil-activities/:tehsil_activity_id/assignment",
            put(assign_tehsil_activity),
        )
        .route(
            "/api/v1/tehsil-activities/:tehsil_activity_id/form",
            get(get_perform_form),
        )
        .route(
            "/api/v1/tehsil-activities/:tehsil_activity_id/submissions",
            post(create_submission).get(get_submissions),
        )
        .route(
            "/api/v1/tehsil-activities/:tehsil_activity_id/submissions/:submission_id",
            get(get_submission),
        )
        .route("/api/v1/unscheduled-activities", post(create_unscheduled_activity))
        // Dashboard and calendar
        .route("/api/v1/dashboard", get(get_dashboard))
        .route("/api/v1/dashboard/trend", get(get_trend))
        .route("/api/v1/calendar", get(get_calendar))
        // Reports
        .route("/api/v1/reports/performed", get(get_performed_report))
        .route("/api/v1/reports/performed/export", get(export_performed_report))
        .route("/api/v1/reports/activities", get(get_activities_report))
        .route("/api/v1/media", get(get_media_gallery))
        // Notifications
        .route("/api/v1/notifications", get(get_notifications))
        .route(
            "/api/v1/notifications/:notification_id/read",
            post(mark_notification_read),
        )
        // Complaints and feedback
        .route("/api/v1/complaints", get(get_complaints).post(create_complaint))
        .route("/api/v1/complaints/:complaint_id", get(get_complaint))
        .route("/api/v1/complaints/:complaint_id/action", post(act_on_complaint))
        .route("/api/v1/feedbacks", get(get_feedbacks).post(create_feedback))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // The recorder is process-global, so tests build routers without it.
    #[cfg(not(test))]
    let router = {
        let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();
        router
            .route("/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer)
    };

    router
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
