use crate::caller::{permissions, Caller};
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, CachedData, DistrictNode, NamedRef};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use compute::scope::Scope;
use model::entities::{district, tehsil};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

const HIERARCHY_KEY: &str = "hierarchy";

/// Query parameters for geography listings
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct GeographyQuery {
    /// Only active rows (default: true)
    pub active: Option<bool>,
    /// Case-insensitive name filter
    #[validate(length(max = 100))]
    pub search: Option<String>,
}

/// Request body for creating or updating a district
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct DistrictRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    pub franchising_phase_no: Option<i32>,
    pub is_active: Option<bool>,
}

/// Request body for creating or updating a tehsil
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct TehsilRequest {
    pub district_id: i32,
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DistrictResponse {
    pub id: i32,
    pub name: String,
    pub franchising_phase_no: Option<i32>,
    pub is_active: bool,
}

impl From<district::Model> for DistrictResponse {
    fn from(model: district::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            franchising_phase_no: model.franchising_phase_no,
            is_active: model.is_active,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TehsilResponse {
    pub id: i32,
    pub district_id: i32,
    pub name: String,
    pub is_active: bool,
}

impl From<tehsil::Model> for TehsilResponse {
    fn from(model: tehsil::Model) -> Self {
        Self {
            id: model.id,
            district_id: model.district_id,
            name: model.name,
            is_active: model.is_active,
        }
    }
}

/// Look up a district or fail with 404.
pub async fn find_district<C: ConnectionTrait>(db: &C, district_id: i32) -> ApiResult<district::Model> {
    district::Entity::find_by_id(district_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("District", district_id))
}

/// Active districts with their active tehsils, cached.
pub async fn hierarchy(state: &AppState) -> ApiResult<Vec<DistrictNode>> {
    if let Some(CachedData::Hierarchy(nodes)) = state.cache.get(HIERARCHY_KEY).await {
        trace!("Hierarchy served from cache");
        return Ok(nodes);
    }

    debug!("Building district hierarchy");
    let districts = district::Entity::find()
        .filter(district::Column::IsActive.eq(true))
        .order_by_asc(district::Column::Name)
        .find_with_related(tehsil::Entity)
        .all(&state.db)
        .await?;

    let nodes: Vec<DistrictNode> = districts
        .into_iter()
        .map(|(d, tehsils)| {
            let mut tehsils: Vec<NamedRef> = tehsils
                .into_iter()
                .filter(|t| t.is_active)
                .map(|t| NamedRef { id: t.id, name: t.name })
                .collect();
            tehsils.sort_by(|a, b| a.name.cmp(&b.name));
            DistrictNode {
                id: d.id,
                name: d.name,
                franchising_phase_no: d.franchising_phase_no,
                tehsils,
            }
        })
        .collect();

    state
        .cache
        .insert(HIERARCHY_KEY.to_string(), CachedData::Hierarchy(nodes.clone()))
        .await;
    Ok(nodes)
}

async fn invalidate_hierarchy(state: &AppState) {
    trace!("Invalidating hierarchy cache");
    state.cache.invalidate(HIERARCHY_KEY).await;
}

/// Prune a hierarchy down to what `scope` may see.
pub fn visible_hierarchy(nodes: Vec<DistrictNode>, scope: &Scope) -> Vec<DistrictNode> {
    nodes
        .into_iter()
        .filter_map(|mut node| {
            if scope.allows(Some(node.id), None) {
                return Some(node);
            }
            node.tehsils.retain(|t| scope.allows(None, Some(t.id)));
            (!node.tehsils.is_empty()).then_some(node)
        })
        .collect()
}

/// Get districts visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/districts",
    tag = "geography",
    params(GeographyQuery),
    responses(
        (status = 200, description = "Districts retrieved successfully", body = ApiResponse<Vec<DistrictResponse>>),
        (status = 401, description = "Unknown caller", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_districts(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Query(query)): Valid<Query<GeographyQuery>>,
) -> ApiResult<Json<ApiResponse<Vec<DistrictResponse>>>> {
    trace!("Entering get_districts function");

    let mut select = district::Entity::find().filter(caller.scope().district_rows());
    if query.active.unwrap_or(true) {
        select = select.filter(district::Column::IsActive.eq(true));
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        select = select.filter(district::Column::Name.contains(search.trim()));
    }

    let districts = select.order_by_asc(district::Column::Name).all(&state.db).await?;
    debug!("Retrieved {} districts", districts.len());

    Ok(Json(ApiResponse::ok(
        districts.into_iter().map(DistrictResponse::from).collect(),
        "Districts retrieved successfully",
    )))
}

/// Create a district
#[utoipa::path(
    post,
    path = "/api/v1/districts",
    tag = "geography",
    request_body = DistrictRequest,
    responses(
        (status = 201, description = "District created successfully", body = ApiResponse<DistrictResponse>),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 409, description = "Name already taken", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_district(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Json(request)): Valid<Json<DistrictRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<DistrictResponse>>)> {
    caller.require(permissions::MANAGE_GEOGRAPHY)?;

    let model = district::ActiveModel {
        name: Set(request.name.trim().to_string()),
        franchising_phase_no: Set(request.franchising_phase_no),
        is_active: Set(request.is_active.unwrap_or(true)),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    invalidate_hierarchy(&state).await;

    info!("District created successfully with ID: {}, name: {}", model.id, model.name);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(DistrictResponse::from(model), "District created successfully")),
    ))
}

/// Update a district
#[utoipa::path(
    put,
    path = "/api/v1/districts/{district_id}",
    tag = "geography",
    params(("district_id" = i32, Path, description = "District ID")),
    request_body = DistrictRequest,
    responses(
        (status = 200, description = "District updated successfully", body = ApiResponse<DistrictResponse>),
        (status = 404, description = "District not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_district(
    State(state): State<AppState>,
    caller: Caller,
    Path(district_id): Path<i32>,
    Valid(Json(request)): Valid<Json<DistrictRequest>>,
) -> ApiResult<Json<ApiResponse<DistrictResponse>>> {
    caller.require(permissions::MANAGE_GEOGRAPHY)?;

    let mut active: district::ActiveModel = find_district(&state.db, district_id).await?.into();
    active.name = Set(request.name.trim().to_string());
    active.franchising_phase_no = Set(request.franchising_phase_no);
    if let Some(is_active) = request.is_active {
        active.is_active = Set(is_active);
    }
    let model = active.update(&state.db).await?;
    invalidate_hierarchy(&state).await;

    info!("District with ID {} updated successfully", district_id);
    Ok(Json(ApiResponse::ok(DistrictResponse::from(model), "District updated successfully")))
}

/// Get the tehsils of a district visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/districts/{district_id}/tehsils",
    tag = "geography",
    params(("district_id" = i32, Path, description = "District ID"), GeographyQuery),
    responses(
        (status = 200, description = "Tehsils retrieved successfully", body = ApiResponse<Vec<TehsilResponse>>),
        (status = 404, description = "District not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_district_tehsils(
    State(state): State<AppState>,
    caller: Caller,
    Path(district_id): Path<i32>,
    Valid(Query(query)): Valid<Query<GeographyQuery>>,
) -> ApiResult<Json<ApiResponse<Vec<TehsilResponse>>>> {
    trace!("Entering get_district_tehsils for district {}", district_id);
    find_district(&state.db, district_id).await?;

    let mut select = tehsil::Entity::find()
        .filter(tehsil::Column::DistrictId.eq(district_id))
        .filter(caller.scope().tehsil_rows());
    if query.active.unwrap_or(true) {
        select = select.filter(tehsil::Column::IsActive.eq(true));
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        select = select.filter(tehsil::Column::Name.contains(search.trim()));
    }

    let tehsils = select.order_by_asc(tehsil::Column::Name).all(&state.db).await?;
    debug!("Retrieved {} tehsils for district {}", tehsils.len(), district_id);

    Ok(Json(ApiResponse::ok(
        tehsils.into_iter().map(TehsilResponse::from).collect(),
        "Tehsils retrieved successfully",
    )))
}

/// Create a tehsil
#[utoipa::path(
    post,
    path = "/api/v1/tehsils",
    tag = "geography",
    request_body = TehsilRequest,
    responses(
        (status = 201, description = "Tehsil created successfully", body = ApiResponse<TehsilResponse>),
        (status = 422, description = "Unknown district", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_tehsil(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Json(request)): Valid<Json<TehsilRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<TehsilResponse>>)> {
    caller.require(permissions::MANAGE_GEOGRAPHY)?;

    if district::Entity::find_by_id(request.district_id).one(&state.db).await?.is_none() {
        warn!("Tehsil create referenced unknown district {}", request.district_id);
        return Err(ApiError::field("district_id", "The selected district is invalid."));
    }

    let model = tehsil::ActiveModel {
        district_id: Set(request.district_id),
        name: Set(request.name.trim().to_string()),
        is_active: Set(request.is_active.unwrap_or(true)),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    invalidate_hierarchy(&state).await;

    info!("Tehsil created successfully with ID: {}, name: {}", model.id, model.name);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(TehsilResponse::from(model), "Tehsil created successfully")),
    ))
}

/// Update a tehsil
#[utoipa::path(
    put,
    path = "/api/v1/tehsils/{tehsil_id}",
    tag = "geography",
    params(("tehsil_id" = i32, Path, description = "Tehsil ID")),
    request_body = TehsilRequest,
    responses(
        (status = 200, description = "Tehsil updated successfully", body = ApiResponse<TehsilResponse>),
        (status = 404, description = "Tehsil not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_tehsil(
    State(state): State<AppState>,
    caller: Caller,
    Path(tehsil_id): Path<i32>,
    Valid(Json(request)): Valid<Json<TehsilRequest>>,
) -> ApiResult<Json<ApiResponse<TehsilResponse>>> {
    caller.require(permissions::MANAGE_GEOGRAPHY)?;

    let existing = tehsil::Entity::find_by_id(tehsil_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Tehsil", tehsil_id))?;
    if district::Entity::find_by_id(request.district_id).one(&state.db).await?.is_none() {
        return Err(ApiError::field("district_id", "The selected district is invalid."));
    }

    let mut active: tehsil::ActiveModel = existing.into();
    active.district_id = Set(request.district_id);
    active.name = Set(request.name.trim().to_string());
    if let Some(is_active) = request.is_active {
        active.is_active = Set(is_active);
    }
    let model = active.update(&state.db).await?;
    invalidate_hierarchy(&state).await;

    info!("Tehsil with ID {} updated successfully", tehsil_id);
    Ok(Json(ApiResponse::ok(TehsilResponse::from(model), "Tehsil updated successfully")))
}

/// Get the district/tehsil hierarchy visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/districts/hierarchy",
    tag = "geography",
    responses(
        (status = 200, description = "Hierarchy retrieved successfully", body = ApiResponse<Vec<DistrictNode>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_hierarchy(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<ApiResponse<Vec<DistrictNode>>>> {
    let nodes = visible_hierarchy(hierarchy(&state).await?, &caller.scope());
    debug!("Hierarchy has {} visible districts", nodes.len());
    Ok(Json(ApiResponse::ok(nodes, "Hierarchy retrieved successfully")))
}
