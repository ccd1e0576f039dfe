//! Performing tehsil activities: the perform form and its submissions.

use crate::caller::{permissions, Caller};
use crate::error::{ApiError, ApiResult};
use crate::handlers::activity_fields::{activity_form, field_specs, ActivityFieldResponse};
use crate::handlers::lookups::{Names, Wanted};
use crate::handlers::schedules::{find_schedule, InstancePresenter, TehsilActivityResponse};
use crate::handlers::tehsil_activities::find_instance;
use crate::notify::{self, Event};
use crate::schemas::{ApiResponse, AppState, NamedRef, Page};
use crate::storage::{self, MediaStore};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use common::PageRequest;
use compute::form::validate_submission;
use compute::schedule::{PerformBlock, ScheduleFacts};
use model::entities::user::RoleLevel;
use model::entities::user_activity::{FieldValue, FieldValues};
use model::entities::{activity, tehsil_activity, user_activity};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Values keyed by field name. Uploads are `{file_name, content_type, data}`
/// objects with base64 `data`; multi-image fields take an array of them.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SubmissionRequest {
    #[schema(value_type = Object)]
    pub values: Map<String, Value>,
}

/// A stored object and where it can be fetched.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct MediaLink {
    pub key: String,
    pub url: String,
}

impl MediaLink {
    pub fn resolve(store: &dyn MediaStore, key: &str) -> Self {
        Self {
            key: key.to_string(),
            url: store.url(key),
        }
    }
}

/// A submitted value with media keys resolved to URLs.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ResolvedValue {
    Text(String),
    Integer(i64),
    Date(NaiveDate),
    File(MediaLink),
    Images(Vec<MediaLink>),
    Choices(Vec<String>),
    Choice(String),
}

impl ResolvedValue {
    pub fn resolve(store: &dyn MediaStore, value: &FieldValue) -> Self {
        match value {
            FieldValue::Text(s) => ResolvedValue::Text(s.clone()),
            FieldValue::Integer(n) => ResolvedValue::Integer(*n),
            FieldValue::Date(d) => ResolvedValue::Date(*d),
            FieldValue::File(key) => ResolvedValue::File(MediaLink::resolve(store, key)),
            FieldValue::Images(keys) => {
                ResolvedValue::Images(keys.iter().map(|k| MediaLink::resolve(store, k)).collect())
            }
            FieldValue::Choices(items) => ResolvedValue::Choices(items.clone()),
            FieldValue::Choice(s) => ResolvedValue::Choice(s.clone()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmissionResponse {
    pub id: i32,
    pub tehsil_activity_id: i32,
    pub district: Option<NamedRef>,
    pub tehsil: Option<NamedRef>,
    pub activity: Option<NamedRef>,
    pub user: Option<NamedRef>,
    pub is_unscheduled: bool,
    #[schema(value_type = Object)]
    pub values: std::collections::BTreeMap<String, ResolvedValue>,
    pub created_at: NaiveDateTime,
}

/// Which page the perform form resolves to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormView {
    NotAssigned,
    ScheduleExpired,
    UpcomingSchedule,
    PerformActivity,
}

impl From<PerformBlock> for FormView {
    fn from(block: PerformBlock) -> Self {
        match block {
            PerformBlock::NotAssigned => FormView::NotAssigned,
            PerformBlock::NotStarted => FormView::UpcomingSchedule,
            PerformBlock::Expired => FormView::ScheduleExpired,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PerformFormResponse {
    pub view: FormView,
    pub tehsil_activity: TehsilActivityResponse,
    pub current_date: NaiveDate,
    /// Empty unless the view is `perform_activity`
    pub fields: Vec<ActivityFieldResponse>,
    pub submissions: Vec<SubmissionResponse>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams, Validate)]
pub struct SubmissionQuery {
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub page_length: Option<u64>,
}

/// Turns stored submissions into responses, resolving names and media.
pub async fn present_submissions<C: sea_orm::ConnectionTrait>(
    db: &C,
    store: &dyn MediaStore,
    rows: Vec<user_activity::Model>,
) -> Result<Vec<SubmissionResponse>, sea_orm::DbErr> {
    let mut wanted = Wanted::default();
    for row in &rows {
        wanted
            .district(row.district_id)
            .tehsil(row.tehsil_id)
            .activity(row.activity_id)
            .user(Some(row.user_id));
    }
    let names = Names::load(db, &wanted).await?;
    Ok(rows
        .into_iter()
        .map(|row| SubmissionResponse {
            id: row.id,
            tehsil_activity_id: row.tehsil_activity_id,
            district: names.district(row.district_id),
            tehsil: names.tehsil(row.tehsil_id),
            activity: names.activity(row.activity_id),
            user: names.user(Some(row.user_id)),
            is_unscheduled: row.is_unscheduled,
            values: row
                .field_values
                .0
                .iter()
                .map(|(name, value)| (name.clone(), ResolvedValue::resolve(store, value)))
                .collect(),
            created_at: row.created_at,
        })
        .collect())
}

fn own_submissions_only(caller: &Caller) -> bool {
    caller.level() == RoleLevel::Tehsil
}

/// Get the perform form of a tehsil activity
#[utoipa::path(
    get,
    path = "/api/v1/tehsil-activities/{tehsil_activity_id}/form",
    tag = "schedules",
    params(("tehsil_activity_id" = i32, Path, description = "TehsilActivity ID")),
    responses(
        (status = 200, description = "Form retrieved successfully", body = ApiResponse<PerformFormResponse>),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 404, description = "Tehsil activity not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_perform_form(
    State(state): State<AppState>,
    caller: Caller,
    Path(tehsil_activity_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<PerformFormResponse>>> {
    trace!("Entering get_perform_form function");
    caller.require(permissions::PERFORM)?;
    let row = find_instance(&state.db, tehsil_activity_id).await?;
    caller.ensure_visible(Some(row.district_id), row.tehsil_id)?;

    let parent = find_schedule(&state.db, row.district_activity_id).await?;
    let evaluator = compute::default_evaluator(None);
    let facts = ScheduleFacts::for_tehsil_activity(&row, Some(&parent));
    let view = match evaluator.check_perform(&facts) {
        Ok(()) => FormView::PerformActivity,
        Err(block) => FormView::from(block),
    };
    debug!("Perform form for tehsil activity {} resolves to {:?}", row.id, view);

    let fields = if view == FormView::PerformActivity {
        activity_form(&state.db, row.activity_id)
            .await?
            .into_iter()
            .map(|(field, options)| ActivityFieldResponse::new(field, &options))
            .collect()
    } else {
        Vec::new()
    };

    let mut prior = user_activity::Entity::find()
        .filter(user_activity::Column::TehsilActivityId.eq(row.id))
        .order_by_desc(user_activity::Column::Id);
    if own_submissions_only(&caller) {
        prior = prior.filter(user_activity::Column::UserId.eq(caller.id()));
    }
    let prior = prior.all(&state.db).await?;
    let submissions = present_submissions(&state.db, state.media.as_ref(), prior).await?;

    let presenter = InstancePresenter::load(&state.db, &caller, evaluator, std::slice::from_ref(&row)).await?;
    Ok(Json(ApiResponse::ok(
        PerformFormResponse {
            view,
            tehsil_activity: presenter.present(row),
            current_date: evaluator.today(),
            fields,
            submissions,
        },
        "Form retrieved successfully",
    )))
}

/// Perform a tehsil activity
///
/// Validates every value against the activity's form before anything is
/// stored. Uploads are written to the media store, then the submission is
/// recorded, the row marked performed and the district notified in one
/// transaction. Uploads are removed again if that transaction fails.
#[utoipa::path(
    post,
    path = "/api/v1/tehsil-activities/{tehsil_activity_id}/submissions",
    tag = "schedules",
    params(("tehsil_activity_id" = i32, Path, description = "TehsilActivity ID")),
    request_body = SubmissionRequest,
    responses(
        (status = 201, description = "Activity performed successfully", body = ApiResponse<SubmissionResponse>),
        (status = 403, description = "Not allowed, unassigned, not started or expired", body = ErrorResponse),
        (status = 404, description = "Tehsil activity not found", body = ErrorResponse),
        (status = 422, description = "Invalid form values", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_submission(
    State(state): State<AppState>,
    caller: Caller,
    Path(tehsil_activity_id): Path<i32>,
    Json(request): Json<SubmissionRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<SubmissionResponse>>)> {
    trace!("Entering create_submission function");
    caller.require(permissions::PERFORM)?;
    let row = find_instance(&state.db, tehsil_activity_id).await?;
    caller.ensure_visible(Some(row.district_id), row.tehsil_id)?;

    let parent = find_schedule(&state.db, row.district_activity_id).await?;
    let evaluator = compute::default_evaluator(None);
    if let Err(block) = evaluator.check_perform(&ScheduleFacts::for_tehsil_activity(&row, Some(&parent))) {
        warn!("Perform on tehsil activity {} blocked: {:?}", row.id, block);
        return Err(ApiError::Forbidden(block.message().to_string()));
    }

    let form = activity_form(&state.db, row.activity_id).await?;
    let accepted = validate_submission(&field_specs(&form), &request.values)?;

    let (values, written) = storage::persist_form(state.media.as_ref(), caller.id(), accepted).await?;
    debug!("Stored {} uploads for tehsil activity {}", written.len(), row.id);

    let activity_name = activity::Entity::find_by_id(row.activity_id)
        .one(&state.db)
        .await?
        .map(|a| a.name)
        .unwrap_or_default();
    let performer_id = caller.id();
    let performer_name = caller.user.name.clone();

    let outcome = state
        .db
        .transaction::<_, user_activity::Model, ApiError>(|txn| {
            Box::pin(async move {
                let now = Utc::now().naive_utc();
                let submission = record_submission(txn, &row, performer_id, values, false, now).await?;
                notify::notify(
                    txn,
                    &Event::ActivityPerformed {
                        tehsil_activity_id: row.id,
                        user_activity_id: submission.id,
                        district_id: row.district_id,
                        activity_name,
                        performed_by: performer_name,
                    },
                )
                .await?;
                Ok(submission)
            })
        })
        .await;

    let submission = match outcome {
        Ok(submission) => submission,
        Err(e) => {
            warn!("Recording submission failed, removing {} uploads", written.len());
            storage::discard(state.media.as_ref(), &written).await;
            return Err(e.into());
        }
    };

    info!("Tehsil activity {} performed by user {}", tehsil_activity_id, performer_id);
    let response = present_submissions(&state.db, state.media.as_ref(), vec![submission])
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal("submission missing after insert".to_string()))?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(response, "Activity performed successfully")),
    ))
}

/// Inserts a submission and marks its tehsil instance performed. The first
/// performance time is kept when an instance is performed repeatedly.
pub async fn record_submission<C: sea_orm::ConnectionTrait>(
    db: &C,
    row: &tehsil_activity::Model,
    user_id: i32,
    values: FieldValues,
    is_unscheduled: bool,
    now: NaiveDateTime,
) -> Result<user_activity::Model, sea_orm::DbErr> {
    let submission = user_activity::ActiveModel {
        tehsil_activity_id: Set(row.id),
        district_id: Set(row.district_id),
        tehsil_id: Set(row.tehsil_id),
        activity_id: Set(row.activity_id),
        user_id: Set(user_id),
        field_values: Set(values),
        is_unscheduled: Set(is_unscheduled),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    if !row.is_performed {
        let mut active = row.clone().into_active_model();
        active.is_performed = Set(true);
        active.performed_at = Set(Some(now));
        active.performed_by = Set(Some(user_id));
        active.update(db).await?;
    }
    Ok(submission)
}

/// List submissions of a tehsil activity
#[utoipa::path(
    get,
    path = "/api/v1/tehsil-activities/{tehsil_activity_id}/submissions",
    tag = "schedules",
    params(
        ("tehsil_activity_id" = i32, Path, description = "TehsilActivity ID"),
        SubmissionQuery
    ),
    responses(
        (status = 200, description = "Submissions retrieved successfully", body = ApiResponse<Page<SubmissionResponse>>),
        (status = 404, description = "Tehsil activity not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_submissions(
    State(state): State<AppState>,
    caller: Caller,
    Path(tehsil_activity_id): Path<i32>,
    Valid(Query(query)): Valid<Query<SubmissionQuery>>,
) -> ApiResult<Json<ApiResponse<Page<SubmissionResponse>>>> {
    caller.require_any(&[
        permissions::PERFORM,
        permissions::VIEW_SCHEDULE,
        permissions::LINE_LIST_REPORT,
    ])?;
    let row = find_instance(&state.db, tehsil_activity_id).await?;
    caller.ensure_visible(Some(row.district_id), row.tehsil_id)?;

    let mut select = user_activity::Entity::find()
        .filter(user_activity::Column::TehsilActivityId.eq(row.id))
        .order_by_desc(user_activity::Column::Id);
    if own_submissions_only(&caller) {
        select = select.filter(user_activity::Column::UserId.eq(caller.id()));
    }

    let paging = PageRequest::new(query.page, query.page_length);
    let paginator = select.paginate(&state.db, paging.page_length);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(paging.index()).await?;
    debug!("Retrieved {} of {} submissions", rows.len(), total);

    let items = present_submissions(&state.db, state.media.as_ref(), rows).await?;
    Ok(Json(ApiResponse::ok(
        Page::new(items, paging, total),
        "Submissions retrieved successfully",
    )))
}

/// Get one submission with media URLs
#[utoipa::path(
    get,
    path = "/api/v1/tehsil-activities/{tehsil_activity_id}/submissions/{submission_id}",
    tag = "schedules",
    params(
        ("tehsil_activity_id" = i32, Path, description = "TehsilActivity ID"),
        ("submission_id" = i32, Path, description = "UserActivity ID")
    ),
    responses(
        (status = 200, description = "Submission retrieved successfully", body = ApiResponse<SubmissionResponse>),
        (status = 404, description = "Submission not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_submission(
    State(state): State<AppState>,
    caller: Caller,
    Path((tehsil_activity_id, submission_id)): Path<(i32, i32)>,
) -> ApiResult<Json<ApiResponse<SubmissionResponse>>> {
    caller.require_any(&[
        permissions::PERFORM,
        permissions::VIEW_SCHEDULE,
        permissions::LINE_LIST_REPORT,
    ])?;
    let submission = user_activity::Entity::find_by_id(submission_id)
        .filter(user_activity::Column::TehsilActivityId.eq(tehsil_activity_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Submission", submission_id))?;
    caller.ensure_visible(Some(submission.district_id), submission.tehsil_id)?;
    if own_submissions_only(&caller) && submission.user_id != caller.id() {
        return Err(ApiError::not_found("Submission", submission_id));
    }

    let response = present_submissions(&state.db, state.media.as_ref(), vec![submission])
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal("submission missing".to_string()))?;
    Ok(Json(ApiResponse::ok(response, "Submission retrieved successfully")))
}
