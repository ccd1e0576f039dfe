use crate::caller::{permissions, Caller};
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, NamedRef};
use axum::{extract::State, http::StatusCode, response::Json};
use axum_valid::Valid;
use model::entities::frequency;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct FrequencyRequest {
    #[validate(length(min = 2, max = 50))]
    pub name: String,
}

/// Get all frequencies
#[utoipa::path(
    get,
    path = "/api/v1/frequencies",
    tag = "activities",
    responses(
        (status = 200, description = "Frequencies retrieved successfully", body = ApiResponse<Vec<NamedRef>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_frequencies(
    State(state): State<AppState>,
    _caller: Caller,
) -> ApiResult<Json<ApiResponse<Vec<NamedRef>>>> {
    let rows = frequency::Entity::find()
        .order_by_asc(frequency::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(ApiResponse::ok(
        rows.into_iter().map(|f| NamedRef { id: f.id, name: f.name }).collect(),
        "Frequencies retrieved successfully",
    )))
}

/// Create a frequency
#[utoipa::path(
    post,
    path = "/api/v1/frequencies",
    tag = "activities",
    request_body = FrequencyRequest,
    responses(
        (status = 201, description = "Frequency created successfully", body = ApiResponse<NamedRef>),
        (status = 422, description = "Name already taken", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_frequency(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Json(request)): Valid<Json<FrequencyRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<NamedRef>>)> {
    caller.require(permissions::CREATE_ACTIVITIES)?;

    let name = request.name.trim().to_string();
    let taken = frequency::Entity::find()
        .filter(frequency::Column::Name.eq(name.as_str()))
        .one(&state.db)
        .await?;
    if taken.is_some() {
        warn!("Frequency '{}' already exists", name);
        return Err(ApiError::field("name", "The name has already been taken."));
    }

    let model = frequency::ActiveModel {
        name: Set(name),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Frequency created successfully with ID: {}", model.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(NamedRef { id: model.id, name: model.name }, "Frequency created successfully")),
    ))
}
