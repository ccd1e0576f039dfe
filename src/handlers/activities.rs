use crate::caller::{permissions, Caller};
use crate::error::{ApiError, ApiResult};
use crate::handlers::activity_fields::{activity_form, ActivityFieldResponse};
use crate::schemas::{ApiResponse, AppState, NamedRef, Page};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{NaiveDateTime, Utc};
use common::PageRequest;
use model::entities::{activity, activity_field, activity_field_assignment, activity_frequency, district_activity, frequency};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, LoaderTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityOrderBy {
    #[default]
    Name,
    Id,
    SortOrder,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

/// Query parameters for listing activities
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct ActivityQuery {
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub page_length: Option<u64>,
    pub search: Option<String>,
    pub order: Option<SortDirection>,
    pub order_by: Option<ActivityOrderBy>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateActivityRequest {
    #[validate(length(min = 3, max = 100))]
    pub name: String,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
    #[validate(length(min = 1))]
    pub frequency_ids: Vec<i32>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateActivityRequest {
    #[validate(length(min = 3, max = 100))]
    pub name: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
    #[validate(length(min = 1))]
    pub frequency_ids: Option<Vec<i32>>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct ActivityStatusRequest {
    pub is_active: bool,
}

/// Ordered list of field ids making up an activity's form
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct FormFieldsRequest {
    pub field_ids: Vec<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivityResponse {
    pub id: i32,
    pub name: String,
    pub sort_order: i32,
    pub is_active: bool,
    pub frequencies: Vec<NamedRef>,
    pub created_at: NaiveDateTime,
}

impl ActivityResponse {
    fn new(model: activity::Model, frequencies: Vec<frequency::Model>) -> Self {
        Self {
            id: model.id,
            name: model.name,
            sort_order: model.sort_order,
            is_active: model.is_active,
            frequencies: frequencies
                .into_iter()
                .map(|f| NamedRef { id: f.id, name: f.name })
                .collect(),
            created_at: model.created_at,
        }
    }
}

pub async fn find_activity<C: ConnectionTrait>(db: &C, activity_id: i32) -> ApiResult<activity::Model> {
    activity::Entity::find_by_id(activity_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Activity", activity_id))
}

async fn load_response<C: ConnectionTrait>(db: &C, model: activity::Model) -> ApiResult<ActivityResponse> {
    let mut frequencies = vec![model.clone()]
        .load_many_to_many(frequency::Entity, activity_frequency::Entity, db)
        .await?;
    Ok(ActivityResponse::new(model, frequencies.pop().unwrap_or_default()))
}

async fn ensure_frequencies_exist<C: ConnectionTrait>(db: &C, ids: &[i32]) -> ApiResult<BTreeSet<i32>> {
    let wanted: BTreeSet<i32> = ids.iter().copied().collect();
    let found = frequency::Entity::find()
        .filter(frequency::Column::Id.is_in(wanted.iter().copied()))
        .count(db)
        .await?;
    if wanted.is_empty() || found as usize != wanted.len() {
        return Err(ApiError::field("frequency_ids", "The selected frequency ids is invalid."));
    }
    Ok(wanted)
}

async fn ensure_name_free<C: ConnectionTrait>(db: &C, name: &str, except: Option<i32>) -> ApiResult<()> {
    let mut select = activity::Entity::find().filter(activity::Column::Name.eq(name));
    if let Some(id) = except {
        select = select.filter(activity::Column::Id.ne(id));
    }
    if select.one(db).await?.is_some() {
        return Err(ApiError::field("name", "The name has already been taken."));
    }
    Ok(())
}

async fn sync_frequencies<C: ConnectionTrait>(db: &C, activity_id: i32, ids: BTreeSet<i32>) -> Result<(), sea_orm::DbErr> {
    activity_frequency::Entity::delete_many()
        .filter(activity_frequency::Column::ActivityId.eq(activity_id))
        .exec(db)
        .await?;
    activity_frequency::Entity::insert_many(ids.into_iter().map(|frequency_id| activity_frequency::ActiveModel {
        activity_id: Set(activity_id),
        frequency_id: Set(frequency_id),
    }))
    .exec(db)
    .await?;
    Ok(())
}

/// Get activities
#[utoipa::path(
    get,
    path = "/api/v1/activities",
    tag = "activities",
    params(ActivityQuery),
    responses(
        (status = 200, description = "Activities retrieved successfully", body = ApiResponse<Page<ActivityResponse>>),
        (status = 403, description = "Not allowed", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_activities(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Query(query)): Valid<Query<ActivityQuery>>,
) -> ApiResult<Json<ApiResponse<Page<ActivityResponse>>>> {
    trace!("Entering get_activities function");
    caller.require_any(&[permissions::VIEW_ACTIVITIES, permissions::CREATE_SCHEDULE])?;

    let paging = PageRequest::new(query.page, query.page_length);
    let mut select = activity::Entity::find();
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        select = select.filter(activity::Column::Name.contains(search));
    }
    let order: Order = query.order.unwrap_or_default().into();
    let column = match query.order_by.unwrap_or_default() {
        ActivityOrderBy::Name => activity::Column::Name,
        ActivityOrderBy::Id => activity::Column::Id,
        ActivityOrderBy::SortOrder => activity::Column::SortOrder,
    };

    let paginator = select.order_by(column, order).paginate(&state.db, paging.page_length);
    let total = paginator.num_items().await?;
    let activities = paginator.fetch_page(paging.index()).await?;
    let frequencies = activities
        .load_many_to_many(frequency::Entity, activity_frequency::Entity, &state.db)
        .await?;
    debug!("Retrieved {} of {} activities", activities.len(), total);

    let items = activities
        .into_iter()
        .zip(frequencies)
        .map(|(a, f)| ActivityResponse::new(a, f))
        .collect();
    Ok(Json(ApiResponse::ok(
        Page::new(items, paging, total),
        "Activities retrieved successfully",
    )))
}

/// Create an activity
#[utoipa::path(
    post,
    path = "/api/v1/activities",
    tag = "activities",
    request_body = CreateActivityRequest,
    responses(
        (status = 201, description = "Activity created successfully", body = ApiResponse<ActivityResponse>),
        (status = 422, description = "Invalid request", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_activity(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Json(request)): Valid<Json<CreateActivityRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ActivityResponse>>)> {
    trace!("Entering create_activity function");
    caller.require(permissions::CREATE_ACTIVITIES)?;

    let name = request.name.trim().to_string();
    ensure_name_free(&state.db, &name, None).await?;
    let frequency_ids = ensure_frequencies_exist(&state.db, &request.frequency_ids).await?;

    let model = state
        .db
        .transaction::<_, activity::Model, ApiError>(|txn| {
            Box::pin(async move {
                let model = activity::ActiveModel {
                    name: Set(name),
                    sort_order: Set(request.sort_order.unwrap_or(0)),
                    is_active: Set(request.is_active.unwrap_or(true)),
                    created_at: Set(Utc::now().naive_utc()),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
                sync_frequencies(txn, model.id, frequency_ids).await?;
                Ok(model)
            })
        })
        .await?;

    info!("Activity created successfully with ID: {}, name: {}", model.id, model.name);
    let response = load_response(&state.db, model).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(response, "Activity created successfully"))))
}

/// Get a specific activity by ID
#[utoipa::path(
    get,
    path = "/api/v1/activities/{activity_id}",
    tag = "activities",
    params(("activity_id" = i32, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Activity retrieved successfully", body = ApiResponse<ActivityResponse>),
        (status = 404, description = "Activity not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_activity(
    State(state): State<AppState>,
    caller: Caller,
    Path(activity_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<ActivityResponse>>> {
    caller.require_any(&[permissions::VIEW_ACTIVITIES, permissions::CREATE_SCHEDULE])?;
    let model = find_activity(&state.db, activity_id).await?;
    let response = load_response(&state.db, model).await?;
    Ok(Json(ApiResponse::ok(response, "Activity retrieved successfully")))
}

/// Update an activity
#[utoipa::path(
    put,
    path = "/api/v1/activities/{activity_id}",
    tag = "activities",
    params(("activity_id" = i32, Path, description = "Activity ID")),
    request_body = UpdateActivityRequest,
    responses(
        (status = 200, description = "Activity updated successfully", body = ApiResponse<ActivityResponse>),
        (status = 404, description = "Activity not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_activity(
    State(state): State<AppState>,
    caller: Caller,
    Path(activity_id): Path<i32>,
    Valid(Json(request)): Valid<Json<UpdateActivityRequest>>,
) -> ApiResult<Json<ApiResponse<ActivityResponse>>> {
    caller.require(permissions::EDIT_ACTIVITIES)?;
    let existing = find_activity(&state.db, activity_id).await?;

    let name = request.name.as_deref().map(str::trim).map(str::to_string);
    if let Some(name) = &name {
        ensure_name_free(&state.db, name, Some(activity_id)).await?;
    }
    let frequency_ids = match &request.frequency_ids {
        Some(ids) => Some(ensure_frequencies_exist(&state.db, ids).await?),
        None => None,
    };

    let model = state
        .db
        .transaction::<_, activity::Model, ApiError>(|txn| {
            Box::pin(async move {
                let mut active: activity::ActiveModel = existing.into();
                if let Some(name) = name {
                    active.name = Set(name);
                }
                if let Some(sort_order) = request.sort_order {
                    active.sort_order = Set(sort_order);
                }
                if let Some(is_active) = request.is_active {
                    active.is_active = Set(is_active);
                }
                let model = active.update(txn).await?;
                if let Some(ids) = frequency_ids {
                    sync_frequencies(txn, activity_id, ids).await?;
                }
                Ok(model)
            })
        })
        .await?;

    info!("Activity with ID {} updated successfully", activity_id);
    let response = load_response(&state.db, model).await?;
    Ok(Json(ApiResponse::ok(response, "Activity updated successfully")))
}

/// Toggle an activity's active flag
#[utoipa::path(
    patch,
    path = "/api/v1/activities/{activity_id}/status",
    tag = "activities",
    params(("activity_id" = i32, Path, description = "Activity ID")),
    request_body = ActivityStatusRequest,
    responses(
        (status = 200, description = "Activity status updated successfully", body = ApiResponse<ActivityResponse>),
        (status = 404, description = "Activity not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_activity_status(
    State(state): State<AppState>,
    caller: Caller,
    Path(activity_id): Path<i32>,
    Json(request): Json<ActivityStatusRequest>,
) -> ApiResult<Json<ApiResponse<ActivityResponse>>> {
    caller.require(permissions::EDIT_ACTIVITIES)?;
    let mut active: activity::ActiveModel = find_activity(&state.db, activity_id).await?.into();
    active.is_active = Set(request.is_active);
    let model = active.update(&state.db).await?;

    info!("Activity {} is_active set to {}", activity_id, request.is_active);
    let response = load_response(&state.db, model).await?;
    Ok(Json(ApiResponse::ok(response, "Activity status updated successfully.")))
}

/// Delete an activity
///
/// Activities that have been scheduled are kept; deactivate them instead.
#[utoipa::path(
    delete,
    path = "/api/v1/activities/{activity_id}",
    tag = "activities",
    params(("activity_id" = i32, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Activity deleted successfully", body = ApiResponse<String>),
        (status = 404, description = "Activity not found", body = ErrorResponse),
        (status = 409, description = "Activity has schedules", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_activity(
    State(state): State<AppState>,
    caller: Caller,
    Path(activity_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<String>>> {
    caller.require(permissions::DELETE_ACTIVITIES)?;
    find_activity(&state.db, activity_id).await?;

    let schedules = district_activity::Entity::find()
        .filter(district_activity::Column::ActivityId.eq(activity_id))
        .count(&state.db)
        .await?;
    if schedules > 0 {
        warn!("Refusing to delete activity {} with {} schedules", activity_id, schedules);
        return Err(ApiError::Conflict(
            "The activity has been scheduled; deactivate it instead.".to_string(),
        ));
    }

    activity::Entity::delete_by_id(activity_id).exec(&state.db).await?;
    info!("Activity with ID {} deleted successfully", activity_id);
    Ok(Json(ApiResponse::ok(format!("Activity {} deleted", activity_id), "Activity deleted successfully")))
}

/// Get the ordered form fields of an activity
#[utoipa::path(
    get,
    path = "/api/v1/activities/{activity_id}/fields",
    tag = "activities",
    params(("activity_id" = i32, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Form fields retrieved successfully", body = ApiResponse<Vec<ActivityFieldResponse>>),
        (status = 404, description = "Activity not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_activity_form_fields(
    State(state): State<AppState>,
    caller: Caller,
    Path(activity_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<Vec<ActivityFieldResponse>>>> {
    caller.require_any(&[permissions::VIEW_ACTIVITIES, permissions::ASSIGN_FIELDS])?;
    find_activity(&state.db, activity_id).await?;

    let form = activity_form(&state.db, activity_id).await?;
    let data = form
        .into_iter()
        .map(|(field, options)| ActivityFieldResponse::new(field, &options))
        .collect();
    Ok(Json(ApiResponse::ok(data, "Form fields retrieved successfully")))
}

/// Replace the ordered form fields of an activity
#[utoipa::path(
    put,
    path = "/api/v1/activities/{activity_id}/fields",
    tag = "activities",
    params(("activity_id" = i32, Path, description = "Activity ID")),
    request_body = FormFieldsRequest,
    responses(
        (status = 200, description = "Form fields updated successfully", body = ApiResponse<Vec<ActivityFieldResponse>>),
        (status = 404, description = "Activity not found", body = ErrorResponse),
        (status = 422, description = "Unknown field", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn set_activity_form_fields(
    State(state): State<AppState>,
    caller: Caller,
    Path(activity_id): Path<i32>,
    Json(request): Json<FormFieldsRequest>,
) -> ApiResult<Json<ApiResponse<Vec<ActivityFieldResponse>>>> {
    caller.require(permissions::ASSIGN_FIELDS)?;
    find_activity(&state.db, activity_id).await?;

    // Keep the first occurrence of each id, in request order.
    let mut seen = BTreeSet::new();
    let ordered: Vec<i32> = request.field_ids.into_iter().filter(|id| seen.insert(*id)).collect();
    let found = activity_field::Entity::find()
        .filter(activity_field::Column::Id.is_in(ordered.clone()))
        .count(&state.db)
        .await?;
    if found as usize != ordered.len() {
        return Err(ApiError::field("field_ids", "The selected field ids is invalid."));
    }

    state
        .db
        .transaction::<_, (), ApiError>(|txn| {
            Box::pin(async move {
                activity_field_assignment::Entity::delete_many()
                    .filter(activity_field_assignment::Column::ActivityId.eq(activity_id))
                    .exec(txn)
                    .await?;
                if !ordered.is_empty() {
                    activity_field_assignment::Entity::insert_many(ordered.into_iter().enumerate().map(
                        |(position, field_id)| activity_field_assignment::ActiveModel {
                            activity_id: Set(activity_id),
                            activity_field_id: Set(field_id),
                            position: Set(position as i32),
                        },
                    ))
                    .exec(txn)
                    .await?;
                }
                Ok(())
            })
        })
        .await?;

    let form = activity_form(&state.db, activity_id).await?;
    info!("Activity {} form now has {} fields", activity_id, form.len());
    let data = form
        .into_iter()
        .map(|(field, options)| ActivityFieldResponse::new(field, &options))
        .collect();
    Ok(Json(ApiResponse::ok(data, "Form fields updated successfully")))
}
