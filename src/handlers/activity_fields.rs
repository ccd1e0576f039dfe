use crate::caller::{permissions, Caller};
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{NaiveDateTime, Utc};
use compute::form::FieldSpec;
use model::entities::activity_field::FieldKind;
use model::entities::{activity_field, activity_field_assignment, activity_field_option, user_activity};
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Field names are stored as submission keys: lowercase ascii, digits and `_`.
fn validate_field_name(name: &str) -> Result<(), ValidationError> {
    let valid = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && name.chars().next().is_some_and(|c| c.is_ascii_lowercase());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("field_name"))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate, PartialEq, Eq)]
pub struct FieldOptionPayload {
    /// Label shown to the user
    #[validate(length(min = 1, max = 100))]
    pub option: String,
    /// Stored value
    #[validate(length(min = 1, max = 100))]
    pub value: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateActivityFieldRequest {
    #[validate(length(min = 2, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 25), custom(function = "validate_field_name"))]
    pub name: String,
    #[schema(value_type = String, example = "multi_images")]
    pub field_type: FieldKind,
    #[serde(default)]
    pub is_required: bool,
    pub default_value: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub options: Vec<FieldOptionPayload>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateActivityFieldRequest {
    #[validate(length(min = 2, max = 100))]
    pub title: Option<String>,
    #[schema(value_type = Option<String>)]
    pub field_type: Option<FieldKind>,
    pub is_required: Option<bool>,
    pub default_value: Option<String>,
    /// Replaces the option list when present
    #[validate(nested)]
    pub options: Option<Vec<FieldOptionPayload>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivityFieldResponse {
    pub id: i32,
    pub title: String,
    pub name: String,
    #[schema(value_type = String)]
    pub field_type: FieldKind,
    pub is_required: bool,
    pub default_value: Option<String>,
    pub options: Vec<FieldOptionPayload>,
    pub created_at: NaiveDateTime,
}

impl ActivityFieldResponse {
    pub fn new(field: activity_field::Model, options: &[activity_field_option::Model]) -> Self {
        Self {
            id: field.id,
            title: field.title,
            name: field.name,
            field_type: field.field_type,
            is_required: field.is_required,
            default_value: field.default_value,
            options: options
                .iter()
                .map(|o| FieldOptionPayload {
                    option: o.option.clone(),
                    value: o.value.clone(),
                })
                .collect(),
            created_at: field.created_at,
        }
    }
}

/// A field definition together with its options.
pub type FieldWithOptions = (activity_field::Model, Vec<activity_field_option::Model>);

async fn options_by_field<C: ConnectionTrait>(
    db: &C,
    field_ids: impl IntoIterator<Item = i32>,
) -> Result<HashMap<i32, Vec<activity_field_option::Model>>, sea_orm::DbErr> {
    let ids: Vec<i32> = field_ids.into_iter().collect();
    let mut grouped: HashMap<i32, Vec<activity_field_option::Model>> = HashMap::new();
    if ids.is_empty() {
        return Ok(grouped);
    }
    let options = activity_field_option::Entity::find()
        .filter(activity_field_option::Column::ActivityFieldId.is_in(ids))
        .order_by_asc(activity_field_option::Column::Id)
        .all(db)
        .await?;
    for option in options {
        grouped.entry(option.activity_field_id).or_default().push(option);
    }
    Ok(grouped)
}

/// The ordered form of an activity.
pub async fn activity_form<C: ConnectionTrait>(db: &C, activity_id: i32) -> Result<Vec<FieldWithOptions>, sea_orm::DbErr> {
    let assignments = activity_field_assignment::Entity::find()
        .filter(activity_field_assignment::Column::ActivityId.eq(activity_id))
        .order_by_asc(activity_field_assignment::Column::Position)
        .all(db)
        .await?;
    if assignments.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i32> = assignments.iter().map(|a| a.activity_field_id).collect();
    let mut fields: HashMap<i32, activity_field::Model> = activity_field::Entity::find()
        .filter(activity_field::Column::Id.is_in(ids.clone()))
        .all(db)
        .await?
        .into_iter()
        .map(|f| (f.id, f))
        .collect();
    let mut options = options_by_field(db, ids.iter().copied()).await?;

    Ok(ids
        .into_iter()
        .filter_map(|id| fields.remove(&id).map(|f| (f, options.remove(&id).unwrap_or_default())))
        .collect())
}

/// Validation specs for an activity's form.
pub fn field_specs(form: &[FieldWithOptions]) -> Vec<FieldSpec> {
    form.iter()
        .map(|(field, options)| FieldSpec::from_model(field, options))
        .collect()
}

/// Whether any stored submission holds a value for the field other than its default.
async fn field_has_data<C: ConnectionTrait>(db: &C, field: &activity_field::Model) -> Result<bool, sea_orm::DbErr> {
    let submissions = user_activity::Entity::find()
        .filter(
            user_activity::Column::ActivityId.in_subquery(
                Query::select()
                    .column(activity_field_assignment::Column::ActivityId)
                    .from(activity_field_assignment::Entity)
                    .and_where(activity_field_assignment::Column::ActivityFieldId.eq(field.id))
                    .to_owned(),
            ),
        )
        .all(db)
        .await?;

    let default = field.default_value.as_deref().unwrap_or("");
    Ok(submissions.iter().any(|s| {
        s.field_values
            .get(&field.name)
            .is_some_and(|v| v.display() != default)
    }))
}

fn check_options(kind: FieldKind, options: &[FieldOptionPayload]) -> ApiResult<()> {
    if kind.requires_options() && options.is_empty() {
        return Err(ApiError::field("options", "The options field is required for this field type."));
    }
    Ok(())
}

async fn replace_options<C: ConnectionTrait>(db: &C, field_id: i32, options: &[FieldOptionPayload]) -> Result<(), sea_orm::DbErr> {
    activity_field_option::Entity::delete_many()
        .filter(activity_field_option::Column::ActivityFieldId.eq(field_id))
        .exec(db)
        .await?;
    if options.is_empty() {
        return Ok(());
    }
    activity_field_option::Entity::insert_many(options.iter().map(|o| activity_field_option::ActiveModel {
        activity_field_id: Set(field_id),
        option: Set(o.option.trim().to_string()),
        value: Set(o.value.trim().to_string()),
        ..Default::default()
    }))
    .exec(db)
    .await?;
    Ok(())
}

async fn find_field<C: ConnectionTrait>(db: &C, field_id: i32) -> ApiResult<activity_field::Model> {
    activity_field::Entity::find_by_id(field_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Activity field", field_id))
}

/// Get all activity fields
#[utoipa::path(
    get,
    path = "/api/v1/activity-fields",
    tag = "activities",
    responses(
        (status = 200, description = "Activity fields retrieved successfully", body = ApiResponse<Vec<ActivityFieldResponse>>),
        (status = 403, description = "Not allowed", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_activity_fields(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<ApiResponse<Vec<ActivityFieldResponse>>>> {
    caller.require(permissions::ASSIGN_FIELDS)?;

    let fields = activity_field::Entity::find()
        .order_by_asc(activity_field::Column::Title)
        .all(&state.db)
        .await?;
    let mut options = options_by_field(&state.db, fields.iter().map(|f| f.id)).await?;
    debug!("Retrieved {} activity fields", fields.len());

    let data = fields
        .into_iter()
        .map(|f| {
            let opts = options.remove(&f.id).unwrap_or_default();
            ActivityFieldResponse::new(f, &opts)
        })
        .collect();
    Ok(Json(ApiResponse::ok(data, "Activity fields retrieved successfully")))
}

/// Create an activity field
#[utoipa::path(
    post,
    path = "/api/v1/activity-fields",
    tag = "activities",
    request_body = CreateActivityFieldRequest,
    responses(
        (status = 201, description = "Activity field created successfully", body = ApiResponse<ActivityFieldResponse>),
        (status = 422, description = "Invalid request", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_activity_field(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Json(request)): Valid<Json<CreateActivityFieldRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ActivityFieldResponse>>)> {
    trace!("Entering create_activity_field function");
    caller.require(permissions::ASSIGN_FIELDS)?;
    check_options(request.field_type, &request.options)?;

    let title_taken = activity_field::Entity::find()
        .filter(activity_field::Column::Title.eq(request.title.trim()))
        .one(&state.db)
        .await?
        .is_some();
    if title_taken {
        return Err(ApiError::field("title", "The title has already been taken."));
    }
    let name_taken = activity_field::Entity::find()
        .filter(activity_field::Column::Name.eq(request.name.as_str()))
        .one(&state.db)
        .await?
        .is_some();
    if name_taken {
        return Err(ApiError::field("name", "The name has already been taken."));
    }

    let field_id = state
        .db
        .transaction::<_, i32, ApiError>(|txn| {
            Box::pin(async move {
                let model = activity_field::ActiveModel {
                    title: Set(request.title.trim().to_string()),
                    name: Set(request.name),
                    field_type: Set(request.field_type),
                    is_required: Set(request.is_required),
                    default_value: Set(request.default_value),
                    created_at: Set(Utc::now().naive_utc()),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
                replace_options(txn, model.id, &request.options).await?;
                Ok(model.id)
            })
        })
        .await?;

    let field = find_field(&state.db, field_id).await?;
    let options = options_by_field(&state.db, [field_id]).await?.remove(&field_id).unwrap_or_default();
    info!("Activity field created successfully with ID: {}, name: {}", field.id, field.name);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            ActivityFieldResponse::new(field, &options),
            "Activity field created successfully",
        )),
    ))
}

/// Update an activity field
///
/// Changing the type of a field that already holds submitted data is refused.
#[utoipa::path(
    put,
    path = "/api/v1/activity-fields/{field_id}",
    tag = "activities",
    params(("field_id" = i32, Path, description = "Activity field ID")),
    request_body = UpdateActivityFieldRequest,
    responses(
        (status = 200, description = "Activity field updated successfully", body = ApiResponse<ActivityFieldResponse>),
        (status = 404, description = "Activity field not found", body = ErrorResponse),
        (status = 409, description = "Field already holds data", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_activity_field(
    State(state): State<AppState>,
    caller: Caller,
    Path(field_id): Path<i32>,
    Valid(Json(request)): Valid<Json<UpdateActivityFieldRequest>>,
) -> ApiResult<Json<ApiResponse<ActivityFieldResponse>>> {
    caller.require(permissions::ASSIGN_FIELDS)?;
    let existing = find_field(&state.db, field_id).await?;

    let kind = request.field_type.unwrap_or(existing.field_type);
    if kind != existing.field_type && field_has_data(&state.db, &existing).await? {
        warn!("Refusing type change of field {} which holds data", existing.name);
        return Err(ApiError::Conflict(format!(
            "The field '{}' already holds submitted data; its type cannot be changed.",
            existing.name
        )));
    }
    let current_options = options_by_field(&state.db, [field_id]).await?.remove(&field_id).unwrap_or_default();
    let options_after = match &request.options {
        Some(options) => options.clone(),
        None => current_options
            .iter()
            .map(|o| FieldOptionPayload { option: o.option.clone(), value: o.value.clone() })
            .collect(),
    };
    check_options(kind, &options_after)?;

    if let Some(title) = request.title.as_deref().map(str::trim) {
        let taken = activity_field::Entity::find()
            .filter(activity_field::Column::Title.eq(title))
            .filter(activity_field::Column::Id.ne(field_id))
            .one(&state.db)
            .await?
            .is_some();
        if taken {
            return Err(ApiError::field("title", "The title has already been taken."));
        }
    }

    state
        .db
        .transaction::<_, (), ApiError>(|txn| {
            Box::pin(async move {
                let mut active: activity_field::ActiveModel = existing.into();
                if let Some(title) = request.title {
                    active.title = Set(title.trim().to_string());
                }
                active.field_type = Set(kind);
                if let Some(is_required) = request.is_required {
                    active.is_required = Set(is_required);
                }
                if request.default_value.is_some() {
                    active.default_value = Set(request.default_value);
                }
                active.update(txn).await?;
                if let Some(options) = request.options {
                    replace_options(txn, field_id, &options).await?;
                }
                Ok(())
            })
        })
        .await?;

    let field = find_field(&state.db, field_id).await?;
    let options = options_by_field(&state.db, [field_id]).await?.remove(&field_id).unwrap_or_default();
    info!("Activity field with ID {} updated successfully", field_id);
    Ok(Json(ApiResponse::ok(
        ActivityFieldResponse::new(field, &options),
        "Activity field updated successfully",
    )))
}

/// Delete an activity field
#[utoipa::path(
    delete,
    path = "/api/v1/activity-fields/{field_id}",
    tag = "activities",
    params(("field_id" = i32, Path, description = "Activity field ID")),
    responses(
        (status = 200, description = "Activity field deleted successfully", body = ApiResponse<String>),
        (status = 404, description = "Activity field not found", body = ErrorResponse),
        (status = 409, description = "Field already holds data", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_activity_field(
    State(state): State<AppState>,
    caller: Caller,
    Path(field_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<String>>> {
    caller.require(permissions::ASSIGN_FIELDS)?;
    let existing = find_field(&state.db, field_id).await?;

    if field_has_data(&state.db, &existing).await? {
        warn!("Refusing to delete field {} which holds data", existing.name);
        return Err(ApiError::Conflict(format!(
            "The field '{}' already holds submitted data and cannot be deleted.",
            existing.name
        )));
    }

    activity_field::Entity::delete_by_id(field_id).exec(&state.db).await?;
    info!("Activity field with ID {} deleted successfully", field_id);
    Ok(Json(ApiResponse::ok(
        format!("Activity field {} deleted", field_id),
        "Activity field deleted successfully",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_are_snake_case_identifiers() {
        assert!(validate_field_name("event_photos").is_ok());
        assert!(validate_field_name("venue2").is_ok());
        assert!(validate_field_name("Event").is_err());
        assert!(validate_field_name("2venue").is_err());
        assert!(validate_field_name("with space").is_err());
    }

    #[test]
    fn choice_kinds_need_options() {
        assert!(check_options(FieldKind::Radio, &[]).is_err());
        assert!(check_options(FieldKind::Select2, &[]).is_ok());
        assert!(check_options(FieldKind::Text, &[]).is_ok());
    }
}
