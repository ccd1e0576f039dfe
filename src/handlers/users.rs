use crate::caller::{permissions, Caller};
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, Page};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{NaiveDateTime, Utc};
use common::PageRequest;
use model::entities::user::RoleLevel;
use model::entities::{district, tehsil, user, user_activity, user_district, user_permission, user_tehsil};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Request body for creating a new user
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateUserRequest {
    /// Username (must be unique)
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub contact_number: Option<String>,
    /// Display role, e.g. `DG`, `DPWO`, `TPWO`, `Super Admin`
    #[validate(length(min = 2, max = 50))]
    pub role_name: String,
    #[schema(value_type = String, example = "district")]
    pub role_level: RoleLevel,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub district_ids: Vec<i32>,
    #[serde(default)]
    pub tehsil_ids: Vec<i32>,
}

/// Request body for updating a user
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub contact_number: Option<String>,
    #[validate(length(min = 2, max = 50))]
    pub role_name: Option<String>,
    #[schema(value_type = Option<String>)]
    pub role_level: Option<RoleLevel>,
    pub is_active: Option<bool>,
}

/// Replacement set of district or tehsil ids
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct IdSetRequest {
    pub ids: Vec<i32>,
}

/// Replacement set of permission names
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct PermissionSetRequest {
    pub permissions: Vec<String>,
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct UserQuery {
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub page_length: Option<u64>,
    /// Matches username or name
    pub search: Option<String>,
    #[schema(value_type = Option<String>)]
    #[param(value_type = Option<String>)]
    pub role_level: Option<RoleLevel>,
}

/// User response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub contact_number: Option<String>,
    pub role_name: String,
    #[schema(value_type = String)]
    pub role_level: RoleLevel,
    pub is_active: bool,
    pub permissions: Vec<String>,
    pub district_ids: Vec<i32>,
    pub tehsil_ids: Vec<i32>,
    pub created_at: NaiveDateTime,
}

impl From<Caller> for UserResponse {
    fn from(caller: Caller) -> Self {
        let user = caller.user;
        Self {
            id: user.id,
            username: user.username,
            name: user.name,
            email: user.email,
            contact_number: user.contact_number,
            role_name: user.role_name,
            role_level: user.role_level,
            is_active: user.is_active,
            permissions: caller.permissions.into_iter().collect(),
            district_ids: caller.district_ids,
            tehsil_ids: caller.tehsil_ids,
            created_at: user.created_at,
        }
    }
}

/// The current caller, with the scope they operate under
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CallerResponse {
    pub user: UserResponse,
    pub is_super_admin: bool,
    /// `all` for unrestricted callers, otherwise `restricted`
    pub scope: String,
}

async fn load_user<C: ConnectionTrait>(db: &C, user_id: i32) -> ApiResult<Caller> {
    Caller::load(db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", user_id))
}

async fn ensure_districts_exist<C: ConnectionTrait>(db: &C, ids: &[i32]) -> ApiResult<()> {
    let wanted: BTreeSet<i32> = ids.iter().copied().collect();
    if wanted.is_empty() {
        return Ok(());
    }
    let found = district::Entity::find()
        .filter(district::Column::Id.is_in(wanted.iter().copied()))
        .count(db)
        .await?;
    if found as usize != wanted.len() {
        return Err(ApiError::field("district_ids", "The selected district is invalid."));
    }
    Ok(())
}

async fn ensure_tehsils_exist<C: ConnectionTrait>(db: &C, ids: &[i32]) -> ApiResult<()> {
    let wanted: BTreeSet<i32> = ids.iter().copied().collect();
    if wanted.is_empty() {
        return Ok(());
    }
    let found = tehsil::Entity::find()
        .filter(tehsil::Column::Id.is_in(wanted.iter().copied()))
        .count(db)
        .await?;
    if found as usize != wanted.len() {
        return Err(ApiError::field("tehsil_ids", "The selected tehsil is invalid."));
    }
    Ok(())
}

async fn replace_permissions<C: ConnectionTrait>(db: &C, user_id: i32, names: &[String]) -> ApiResult<()> {
    user_permission::Entity::delete_many()
        .filter(user_permission::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    let unique: BTreeSet<&str> = names.iter().map(|p| p.trim()).filter(|p| !p.is_empty()).collect();
    if unique.is_empty() {
        return Ok(());
    }
    user_permission::Entity::insert_many(unique.into_iter().map(|p| user_permission::ActiveModel {
        user_id: Set(user_id),
        permission: Set(p.to_string()),
    }))
    .exec(db)
    .await?;
    Ok(())
}

async fn replace_districts<C: ConnectionTrait>(db: &C, user_id: i32, ids: &[i32]) -> ApiResult<()> {
    user_district::Entity::delete_many()
        .filter(user_district::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    let unique: BTreeSet<i32> = ids.iter().copied().collect();
    if unique.is_empty() {
        return Ok(());
    }
    user_district::Entity::insert_many(unique.into_iter().map(|id| user_district::ActiveModel {
        user_id: Set(user_id),
        district_id: Set(id),
    }))
    .exec(db)
    .await?;
    Ok(())
}

async fn replace_tehsils<C: ConnectionTrait>(db: &C, user_id: i32, ids: &[i32]) -> ApiResult<()> {
    user_tehsil::Entity::delete_many()
        .filter(user_tehsil::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    let unique: BTreeSet<i32> = ids.iter().copied().collect();
    if unique.is_empty() {
        return Ok(());
    }
    user_tehsil::Entity::insert_many(unique.into_iter().map(|id| user_tehsil::ActiveModel {
        user_id: Set(user_id),
        tehsil_id: Set(id),
    }))
    .exec(db)
    .await?;
    Ok(())
}

/// Create a new user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponse>),
        (status = 409, description = "Username already exists", body = ErrorResponse),
        (status = 422, description = "Invalid request", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_user(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Json(request)): Valid<Json<CreateUserRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    trace!("Entering create_user function");
    caller.require(permissions::MANAGE_USERS)?;

    let taken = user::Entity::find()
        .filter(user::Column::Username.eq(request.username.trim()))
        .one(&state.db)
        .await?;
    if taken.is_some() {
        warn!("Username '{}' already exists", request.username);
        return Err(ApiError::Conflict(format!("Username '{}' already exists", request.username)));
    }
    ensure_districts_exist(&state.db, &request.district_ids).await?;
    ensure_tehsils_exist(&state.db, &request.tehsil_ids).await?;

    let user_id = state
        .db
        .transaction::<_, i32, ApiError>(|txn| {
            Box::pin(async move {
                let model = user::ActiveModel {
                    username: Set(request.username.trim().to_string()),
                    name: Set(request.name.trim().to_string()),
                    email: Set(request.email),
                    contact_number: Set(request.contact_number),
                    role_name: Set(request.role_name.trim().to_string()),
                    role_level: Set(request.role_level),
                    is_active: Set(true),
                    created_at: Set(Utc::now().naive_utc()),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
                replace_permissions(txn, model.id, &request.permissions).await?;
                replace_districts(txn, model.id, &request.district_ids).await?;
                replace_tehsils(txn, model.id, &request.tehsil_ids).await?;
                Ok(model.id)
            })
        })
        .await?;

    let created = load_user(&state.db, user_id).await?;
    info!("User created successfully with ID: {}, username: {}", created.user.id, created.user.username);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(UserResponse::from(created), "User created successfully")),
    ))
}

/// Get users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(UserQuery),
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Page<UserResponse>>),
        (status = 403, description = "Not allowed", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_users(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Query(query)): Valid<Query<UserQuery>>,
) -> ApiResult<Json<ApiResponse<Page<UserResponse>>>> {
    trace!("Entering get_users function");
    caller.require(permissions::MANAGE_USERS)?;

    let paging = PageRequest::new(query.page, query.page_length);
    let mut select = user::Entity::find();
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(user::Column::Username.contains(search))
                .add(user::Column::Name.contains(search)),
        );
    }
    if let Some(level) = query.role_level {
        select = select.filter(user::Column::RoleLevel.eq(level));
    }

    let paginator = select.order_by_asc(user::Column::Id).paginate(&state.db, paging.page_length);
    let total = paginator.num_items().await?;
    let users = paginator.fetch_page(paging.index()).await?;
    debug!("Retrieved {} of {} users", users.len(), total);

    let mut items = Vec::with_capacity(users.len());
    for model in users {
        items.push(UserResponse::from(load_user(&state.db, model.id).await?));
    }

    Ok(Json(ApiResponse::ok(
        Page::new(items, paging, total),
        "Users retrieved successfully",
    )))
}

/// Get a specific user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(user_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    caller.require(permissions::MANAGE_USERS)?;
    let found = load_user(&state.db, user_id).await?;
    Ok(Json(ApiResponse::ok(UserResponse::from(found), "User retrieved successfully")))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(("user_id" = i32, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(user_id): Path<i32>,
    Valid(Json(request)): Valid<Json<UpdateUserRequest>>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    trace!("Entering update_user function for user_id: {}", user_id);
    caller.require(permissions::MANAGE_USERS)?;

    let existing = load_user(&state.db, user_id).await?;
    let mut active: user::ActiveModel = existing.user.into();
    let mut updated_fields = Vec::new();

    if let Some(name) = request.name {
        active.name = Set(name.trim().to_string());
        updated_fields.push("name");
    }
    if let Some(email) = request.email {
        active.email = Set(Some(email));
        updated_fields.push("email");
    }
    if let Some(contact) = request.contact_number {
        active.contact_number = Set(Some(contact));
        updated_fields.push("contact_number");
    }
    if let Some(role_name) = request.role_name {
        active.role_name = Set(role_name.trim().to_string());
        updated_fields.push("role_name");
    }
    if let Some(level) = request.role_level {
        active.role_level = Set(level);
        updated_fields.push("role_level");
    }
    if let Some(is_active) = request.is_active {
        active.is_active = Set(is_active);
        updated_fields.push("is_active");
    }

    if updated_fields.is_empty() {
        debug!("No fields to update for user ID: {}", user_id);
    } else {
        active.update(&state.db).await?;
    }

    let updated = load_user(&state.db, user_id).await?;
    info!(
        "User with ID {} updated successfully. Updated fields: {}",
        user_id,
        if updated_fields.is_empty() { "none".to_string() } else { updated_fields.join(", ") }
    );
    Ok(Json(ApiResponse::ok(UserResponse::from(updated), "User updated successfully")))
}

/// Delete a user
///
/// Users who have submitted activities are kept for the record and must be
/// deactivated instead.
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted successfully", body = ApiResponse<String>),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "User has submissions", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(user_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<String>>> {
    caller.require(permissions::MANAGE_USERS)?;
    if user_id == caller.id() {
        return Err(ApiError::BadRequest("You cannot delete your own account.".to_string()));
    }
    load_user(&state.db, user_id).await?;

    let submissions = user_activity::Entity::find()
        .filter(user_activity::Column::UserId.eq(user_id))
        .count(&state.db)
        .await?;
    if submissions > 0 {
        warn!("Refusing to delete user {} with {} submissions", user_id, submissions);
        return Err(ApiError::Conflict(
            "The user has submitted activities; deactivate the account instead.".to_string(),
        ));
    }

    let result = user::Entity::delete_by_id(user_id).exec(&state.db).await?;
    debug!("Delete operation completed. Rows affected: {}", result.rows_affected);
    info!("User with ID {} deleted successfully", user_id);
    Ok(Json(ApiResponse::ok(format!("User {} deleted", user_id), "User deleted successfully")))
}

/// Replace a user's permissions
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}/permissions",
    tag = "users",
    params(("user_id" = i32, Path, description = "User ID")),
    request_body = PermissionSetRequest,
    responses(
        (status = 200, description = "Permissions updated successfully", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn set_user_permissions(
    State(state): State<AppState>,
    caller: Caller,
    Path(user_id): Path<i32>,
    Json(request): Json<PermissionSetRequest>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    caller.require(permissions::MANAGE_USERS)?;
    load_user(&state.db, user_id).await?;

    state
        .db
        .transaction::<_, (), ApiError>(|txn| {
            Box::pin(async move { replace_permissions(txn, user_id, &request.permissions).await })
        })
        .await?;

    let updated = load_user(&state.db, user_id).await?;
    info!("User {} now holds {} permissions", user_id, updated.permissions.len());
    Ok(Json(ApiResponse::ok(UserResponse::from(updated), "Permissions updated successfully")))
}

/// Replace the districts a user is assigned to
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}/districts",
    tag = "users",
    params(("user_id" = i32, Path, description = "User ID")),
    request_body = IdSetRequest,
    responses(
        (status = 200, description = "Districts updated successfully", body = ApiResponse<UserResponse>),
        (status = 422, description = "Unknown district", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn set_user_districts(
    State(state): State<AppState>,
    caller: Caller,
    Path(user_id): Path<i32>,
    Json(request): Json<IdSetRequest>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    caller.require(permissions::MANAGE_USERS)?;
    load_user(&state.db, user_id).await?;
    ensure_districts_exist(&state.db, &request.ids).await?;

    state
        .db
        .transaction::<_, (), ApiError>(|txn| {
            Box::pin(async move { replace_districts(txn, user_id, &request.ids).await })
        })
        .await?;

    let updated = load_user(&state.db, user_id).await?;
    info!("User {} now covers districts {:?}", user_id, updated.district_ids);
    Ok(Json(ApiResponse::ok(UserResponse::from(updated), "Districts updated successfully")))
}

/// Replace the tehsils a user is assigned to
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}/tehsils",
    tag = "users",
    params(("user_id" = i32, Path, description = "User ID")),
    request_body = IdSetRequest,
    responses(
        (status = 200, description = "Tehsils updated successfully", body = ApiResponse<UserResponse>),
        (status = 422, description = "Unknown tehsil", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn set_user_tehsils(
    State(state): State<AppState>,
    caller: Caller,
    Path(user_id): Path<i32>,
    Json(request): Json<IdSetRequest>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    caller.require(permissions::MANAGE_USERS)?;
    load_user(&state.db, user_id).await?;
    ensure_tehsils_exist(&state.db, &request.ids).await?;

    state
        .db
        .transaction::<_, (), ApiError>(|txn| {
            Box::pin(async move { replace_tehsils(txn, user_id, &request.ids).await })
        })
        .await?;

    let updated = load_user(&state.db, user_id).await?;
    info!("User {} now covers tehsils {:?}", user_id, updated.tehsil_ids);
    Ok(Json(ApiResponse::ok(UserResponse::from(updated), "Tehsils updated successfully")))
}

/// Get the current caller
#[utoipa::path(
    get,
    path = "/api/v1/me",
    tag = "users",
    responses(
        (status = 200, description = "Caller retrieved successfully", body = ApiResponse<CallerResponse>),
        (status = 401, description = "Unknown caller", body = ErrorResponse)
    )
)]
#[instrument(skip(caller))]
pub async fn get_me(caller: Caller) -> ApiResult<Json<ApiResponse<CallerResponse>>> {
    let is_super_admin = caller.is_super_admin();
    let scope = if caller.scope().is_all() { "all" } else { "restricted" }.to_string();
    Ok(Json(ApiResponse::ok(
        CallerResponse {
            user: UserResponse::from(caller),
            is_super_admin,
            scope,
        },
        "Caller retrieved successfully",
    )))
}
