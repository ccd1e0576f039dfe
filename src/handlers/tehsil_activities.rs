use crate::caller::{permissions, Caller};
use crate::error::{ApiError, ApiResult};
use crate::handlers::schedules::{find_schedule, media_keys_under, InstancePresenter, TehsilActivityResponse};
use crate::notify::{self, Event};
use crate::schemas::{ApiResponse, AppState};
use crate::storage;
use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{NaiveDate, Utc};
use compute::schedule::{ScheduleFacts, ScheduleWindow};
use model::entities::{activity, tehsil_activity, user_activity};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, IntoActiveModel, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;

/// Window a district gives one of its tehsils.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AssignmentRequest {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

/// Loads a tehsil instance, refusing the district-level row.
pub async fn find_instance<C: ConnectionTrait>(db: &C, id: i32) -> ApiResult<tehsil_activity::Model> {
    let row = tehsil_activity::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Tehsil activity", id))?;
    if row.is_header() {
        return Err(ApiError::BadRequest(
            "The district-level schedule row cannot be used here.".to_string(),
        ));
    }
    Ok(row)
}

/// Assign a tehsil activity
///
/// Sets the tehsil's own window and marks it assigned. Tehsil users with the
/// perform permission are notified.
#[utoipa::path(
    put,
    path = "/api/v1/tehsil-activities/{tehsil_activity_id}/assignment",
    tag = "schedules",
    params(("tehsil_activity_id" = i32, Path, description = "TehsilActivity ID")),
    request_body = AssignmentRequest,
    responses(
        (status = 200, description = "Activity assigned successfully", body = ApiResponse<TehsilActivityResponse>),
        (status = 400, description = "District-level row", body = ErrorResponse),
        (status = 403, description = "Not allowed or schedule expired", body = ErrorResponse),
        (status = 404, description = "Tehsil activity not found", body = ErrorResponse),
        (status = 409, description = "Already performed", body = ErrorResponse),
        (status = 422, description = "Invalid dates", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn assign_tehsil_activity(
    State(state): State<AppState>,
    caller: Caller,
    Path(tehsil_activity_id): Path<i32>,
    Json(request): Json<AssignmentRequest>,
) -> ApiResult<Json<ApiResponse<TehsilActivityResponse>>> {
    trace!("Entering assign_tehsil_activity function");
    caller.require(permissions::ASSIGN_TO_TEHSILS)?;

    let row = find_instance(&state.db, tehsil_activity_id).await?;
    caller.ensure_visible(Some(row.district_id), row.tehsil_id)?;
    if row.is_performed {
        return Err(ApiError::Conflict(
            "Activity has already been performed and cannot be reassigned.".to_string(),
        ));
    }

    let parent = find_schedule(&state.db, row.district_activity_id).await?;
    let evaluator = compute::default_evaluator(None);
    if evaluator.is_expired_for_assigning(&ScheduleFacts::for_district_activity(&parent))
        && !state.settings.schedule.backdate_scheduling
    {
        warn!("Refusing assignment on expired schedule {}", parent.id);
        return Err(ApiError::Forbidden("Schedule has been expired.".to_string()));
    }

    let window = ScheduleWindow::new(request.from_date, request.to_date)?;
    let activity_name = activity::Entity::find_by_id(row.activity_id)
        .one(&state.db)
        .await?
        .map(|a| a.name)
        .unwrap_or_default();
    debug!(
        "Assigning tehsil activity {} from {} to {}",
        row.id,
        window.from(),
        window.to()
    );

    let updated = state
        .db
        .transaction::<_, tehsil_activity::Model, ApiError>(|txn| {
            Box::pin(async move {
                let tehsil_id = row.tehsil_id;
                let mut active = row.into_active_model();
                active.from_date = Set(Some(window.from()));
                active.to_date = Set(Some(window.to()));
                active.is_assigned = Set(true);
                active.assigned_at = Set(Some(Utc::now().naive_utc()));
                let updated = active.update(txn).await?;

                if let Some(tehsil_id) = tehsil_id {
                    notify::notify(
                        txn,
                        &Event::ActivityAssigned {
                            tehsil_activity_id: updated.id,
                            tehsil_id,
                            activity_name,
                            from_date: window.from(),
                            to_date: window.to(),
                        },
                    )
                    .await?;
                }
                Ok(updated)
            })
        })
        .await?;

    let presenter = InstancePresenter::load(&state.db, &caller, evaluator, std::slice::from_ref(&updated)).await?;
    info!("Tehsil activity {} assigned", updated.id);
    Ok(Json(ApiResponse::ok(
        presenter.present(updated),
        "Activity assigned successfully",
    )))
}

/// Delete a tehsil activity together with its submissions
#[utoipa::path(
    delete,
    path = "/api/v1/tehsil-activities/{tehsil_activity_id}",
    tag = "schedules",
    params(("tehsil_activity_id" = i32, Path, description = "TehsilActivity ID")),
    responses(
        (status = 200, description = "Schedule deleted successfully", body = ApiResponse<String>),
        (status = 400, description = "District-level row", body = ErrorResponse),
        (status = 404, description = "Tehsil activity not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_tehsil_activity(
    State(state): State<AppState>,
    caller: Caller,
    Path(tehsil_activity_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<String>>> {
    caller.require(permissions::DELETE_SCHEDULE)?;
    let row = find_instance(&state.db, tehsil_activity_id).await?;
    caller.ensure_visible(Some(row.district_id), row.tehsil_id)?;

    let keys = media_keys_under(
        &state.db,
        Condition::all().add(user_activity::Column::TehsilActivityId.eq(row.id)),
    )
    .await?;
    let result = tehsil_activity::Entity::delete_by_id(row.id).exec(&state.db).await?;
    debug!("Delete operation completed. Rows affected: {}", result.rows_affected);
    storage::discard(state.media.as_ref(), &keys).await;

    info!("Tehsil activity with ID {} deleted successfully", row.id);
    Ok(Json(ApiResponse::ok(
        format!("Tehsil activity {} deleted", row.id),
        "Schedule deleted successfully",
    )))
}
