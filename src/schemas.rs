use std::sync::Arc;

use crate::config::Settings;
use crate::storage::MediaStore;
use compute::error::FieldErrors;
use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

pub use common::{ApiResponse, NamedRef, Page};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Cache for data that changes rarely
    pub cache: Cache<String, CachedData>,
    /// Where uploaded submission media lives
    pub media: Arc<dyn MediaStore>,
    /// Loaded runtime settings
    pub settings: Arc<Settings>,
}

/// Cached data types
#[derive(Clone, Debug)]
pub enum CachedData {
    Hierarchy(Vec<DistrictNode>),
}

/// An active district with its active tehsils.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DistrictNode {
    pub id: i32,
    pub name: String,
    pub franchising_phase_no: Option<i32>,
    pub tehsils: Vec<NamedRef>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
    /// Per-field validation messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
    /// Media store status, e.g. `local: available`
    pub storage: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::geography::get_districts,
        crate::handlers::geography::create_district,
        crate::handlers::geography::update_district,
        crate::handlers::geography::get_district_tehsils,
        crate::handlers::geography::create_tehsil,
        crate::handlers::geography::update_tehsil,
        crate::handlers::geography::get_hierarchy,
        crate::handlers::users::create_user,
        crate::handlers::users::get_users,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::users::set_user_permissions,
        crate::handlers::users::set_user_districts,
        crate::handlers::users::set_user_tehsils,
        crate::handlers::users::get_me,
        crate::handlers::frequencies::get_frequencies,
        crate::handlers::frequencies::create_frequency,
        crate::handlers::activities::get_activities,
        crate::handlers::activities::create_activity,
        crate::handlers::activities::get_activity,
        crate::handlers::activities::update_activity,
        crate::handlers::activities::update_activity_status,
        crate::handlers::activities::delete_activity,
        crate::handlers::activities::get_activity_form_fields,
        crate::handlers::activities::set_activity_form_fields,
        crate::handlers::activity_fields::get_activity_fields,
        crate::handlers::activity_fields::create_activity_field,
        crate::handlers::activity_fields::update_activity_field,
        crate::handlers::activity_fields::delete_activity_field,
        crate::handlers::schedules::create_schedule,
        crate::handlers::schedules::get_schedules,
        crate::handlers::schedules::get_schedule,
        crate::handlers::schedules::delete_schedule,
        crate::handlers::tehsil_activities::assign_tehsil_activity,
        crate::handlers::tehsil_activities::delete_tehsil_activity,
        crate::handlers::submissions::get_perform_form,
        crate::handlers::submissions::create_submission,
        crate::handlers::submissions::get_submissions,
        crate::handlers::submissions::get_submission,
        crate::handlers::unscheduled::create_unscheduled_activity,
        crate::handlers::dashboard::get_dashboard,
        crate::handlers::dashboard::get_trend,
        crate::handlers::calendar::get_calendar,
        crate::handlers::reports::get_performed_report,
        crate::handlers::reports::get_activities_report,
        crate::handlers::reports::export_performed_report,
        crate::handlers::media::get_media_gallery,
        crate::handlers::notifications::get_notifications,
        crate::handlers::notifications::mark_notification_read,
        crate::handlers::complaints::get_complaints,
        crate::handlers::complaints::get_complaint,
        crate::handlers::complaints::create_complaint,
        crate::handlers::complaints::act_on_complaint,
        crate::handlers::feedbacks::get_feedbacks,
        crate::handlers::feedbacks::create_feedback,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            DistrictNode,
            NamedRef,
            common::StatusCards,
            common::ChartPoint,
            common::BarChart,
            common::MonthPoint,
            compute::schedule::ScheduleStatus,
            compute::trend::TrendKind,
            crate::handlers::geography::DistrictResponse,
            crate::handlers::geography::TehsilResponse,
            crate::handlers::geography::DistrictRequest,
            crate::handlers::geography::TehsilRequest,
            crate::handlers::users::UserResponse,
            crate::handlers::users::CreateUserRequest,
            crate::handlers::users::UpdateUserRequest,
            crate::handlers::users::IdSetRequest,
            crate::handlers::users::PermissionSetRequest,
            crate::handlers::users::CallerResponse,
            crate::handlers::frequencies::FrequencyRequest,
            crate::handlers::activities::ActivityResponse,
            crate::handlers::activities::CreateActivityRequest,
            crate::handlers::activities::UpdateActivityRequest,
            crate::handlers::activities::ActivityStatusRequest,
            crate::handlers::activities::FormFieldsRequest,
            crate::handlers::activity_fields::ActivityFieldResponse,
            crate::handlers::activity_fields::FieldOptionPayload,
            crate::handlers::activity_fields::CreateActivityFieldRequest,
            crate::handlers::activity_fields::UpdateActivityFieldRequest,
            crate::handlers::schedules::CreateScheduleRequest,
            crate::handlers::schedules::ScheduleActivityInput,
            crate::handlers::schedules::CreatedSchedule,
            crate::handlers::schedules::DistrictActivityResponse,
            crate::handlers::schedules::TehsilActivityResponse,
            crate::handlers::schedules::ScheduleListing,
            crate::handlers::schedules::ScheduleView,
            crate::handlers::schedules::ScheduleDetail,
            crate::handlers::tehsil_activities::AssignmentRequest,
            crate::handlers::submissions::SubmissionRequest,
            crate::handlers::submissions::SubmissionResponse,
            crate::handlers::submissions::ResolvedValue,
            crate::handlers::submissions::MediaLink,
            crate::handlers::submissions::PerformFormResponse,
            crate::handlers::submissions::FormView,
            crate::handlers::unscheduled::UnscheduledActivityRequest,
            crate::handlers::unscheduled::UnscheduledActivityResponse,
            crate::handlers::dashboard::DashboardResponse,
            crate::handlers::dashboard::RecentSubmission,
            crate::handlers::dashboard::TrendResponse,
            crate::handlers::calendar::CalendarResponse,
            crate::handlers::calendar::CalendarEvent,
            crate::handlers::calendar::ActivityType,
            crate::handlers::calendar::AssignmentFilter,
            crate::handlers::reports::PerformedRow,
            crate::handlers::reports::ActivityRow,
            crate::handlers::media::MediaGroup,
            crate::handlers::notifications::NotificationResponse,
            crate::handlers::complaints::ComplaintResponse,
            crate::handlers::complaints::ComplaintHistoryResponse,
            crate::handlers::complaints::ComplaintDetail,
            crate::handlers::complaints::ComplaintCounts,
            crate::handlers::complaints::ComplaintListResponse,
            crate::handlers::complaints::CreateComplaintRequest,
            crate::handlers::complaints::ComplaintActionRequest,
            crate::handlers::feedbacks::FeedbackResponse,
            crate::handlers::feedbacks::CreateFeedbackRequest,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "geography", description = "Districts and tehsils"),
        (name = "users", description = "Users and their reach"),
        (name = "activities", description = "Activity catalogue and form definitions"),
        (name = "schedules", description = "Scheduling, assignment and performing of activities"),
        (name = "dashboard", description = "Dashboard, calendar and trends"),
        (name = "reports", description = "Line lists, exports and media gallery"),
        (name = "notifications", description = "In-app notifications"),
        (name = "complaints", description = "Call-centre complaints and feedback"),
    ),
    info(
        title = "FieldOps API",
        description = "Advocacy field-operations service: scheduling, assignment and reporting of outreach activities across districts and tehsils",
        version = "0.1.0",
    )
)]
pub struct ApiDoc;
