//! Ad-hoc activities recorded directly as performed.

use crate::caller::{permissions, Caller};
use crate::error::{ApiError, ApiResult};
use crate::handlers::activity_fields::{activity_form, field_specs};
use crate::handlers::submissions::{present_submissions, record_submission, SubmissionResponse};
use crate::notify::{self, Event};
use crate::schemas::{ApiResponse, AppState};
use crate::storage;
use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use compute::form::validate_submission;
use model::entities::user::RoleLevel;
use model::entities::{activity, district, district_activity, frequency, tehsil, tehsil_activity};
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UnscheduledActivityRequest {
    pub activity_id: i32,
    pub frequency_id: Option<i32>,
    /// Honoured for admin-level callers only
    pub district_id: Option<i32>,
    /// Honoured for admin- and district-level callers
    pub tehsil_id: Option<i32>,
    #[schema(value_type = Object)]
    pub values: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnscheduledActivityResponse {
    pub district_activity_id: i32,
    pub tehsil_activity_id: i32,
    pub submission: SubmissionResponse,
}

/// Works out where an ad-hoc activity happened.
///
/// Admins may name any district and tehsil. District users work in their
/// first district and may name one of its tehsils. Everyone else uses their
/// own first tehsil and its district.
pub async fn resolve_location<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    requested_district: Option<i32>,
    requested_tehsil: Option<i32>,
) -> ApiResult<(district::Model, tehsil::Model)> {
    let (district_id, tehsil_id) = match caller.level() {
        RoleLevel::Admin => (requested_district, requested_tehsil),
        RoleLevel::District => (
            caller.district_ids.first().copied(),
            requested_tehsil.or_else(|| caller.tehsil_ids.first().copied()),
        ),
        RoleLevel::Tehsil | RoleLevel::CallCenter => {
            (caller.district_ids.first().copied(), caller.tehsil_ids.first().copied())
        }
    };

    let tehsil = match tehsil_id {
        Some(id) => Some(
            tehsil::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| ApiError::field("tehsil_id", "Tehsil not exist."))?,
        ),
        None => None,
    };

    let district_id = district_id.or_else(|| tehsil.as_ref().map(|t| t.district_id));
    let Some(district_id) = district_id else {
        return Err(ApiError::field("district_id", "No district could be resolved for this activity."));
    };
    let district = district::Entity::find_by_id(district_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::field("district_id", "District not exist."))?;

    let Some(tehsil) = tehsil else {
        return Err(ApiError::field("tehsil_id", "No tehsil could be resolved for this activity."));
    };
    if tehsil.district_id != district.id {
        return Err(ApiError::field("tehsil_id", "The tehsil does not belong to the district."));
    }
    Ok((district, tehsil))
}

/// Perform an unscheduled activity
///
/// Creates a one-day schedule, its tehsil instance and the submission in a
/// single transaction. The instance is assigned and performed at once.
#[utoipa::path(
    post,
    path = "/api/v1/unscheduled-activities",
    tag = "schedules",
    request_body = UnscheduledActivityRequest,
    responses(
        (status = 201, description = "Activity performed successfully", body = ApiResponse<UnscheduledActivityResponse>),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 422, description = "Invalid request", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_unscheduled_activity(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<UnscheduledActivityRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<UnscheduledActivityResponse>>)> {
    trace!("Entering create_unscheduled_activity function");
    caller.require_permission(permissions::PERFORM_UNSCHEDULED)?;

    let activity = activity::Entity::find_by_id(request.activity_id)
        .one(&state.db)
        .await?
        .filter(|a| a.is_active)
        .ok_or_else(|| ApiError::field("activity_id", "The selected activity id is invalid."))?;
    if let Some(frequency_id) = request.frequency_id {
        if frequency::Entity::find_by_id(frequency_id).one(&state.db).await?.is_none() {
            return Err(ApiError::field("frequency_id", "Frequencies not exist."));
        }
    }

    let (district, tehsil) =
        resolve_location(&state.db, &caller, request.district_id, request.tehsil_id).await?;
    caller.ensure_visible(Some(district.id), Some(tehsil.id))?;
    debug!(
        "Recording unscheduled '{}' in district {} tehsil {}",
        activity.name, district.id, tehsil.id
    );

    let form = activity_form(&state.db, activity.id).await?;
    let accepted = validate_submission(&field_specs(&form), &request.values)?;
    let (values, written) = storage::persist_form(state.media.as_ref(), caller.id(), accepted).await?;

    let performer_id = caller.id();
    let performer_name = caller.user.name.clone();
    let frequency_id = request.frequency_id;
    let outcome = state
        .db
        .transaction::<_, (i32, tehsil_activity::Model, model::entities::user_activity::Model), ApiError>(|txn| {
            Box::pin(async move {
                let now = Utc::now().naive_utc();
                let today = now.date();
                let schedule = district_activity::ActiveModel {
                    district_id: Set(district.id),
                    activity_id: Set(activity.id),
                    frequency_id: Set(frequency_id),
                    from_date: Set(today),
                    to_date: Set(today),
                    description: Set(None),
                    is_unscheduled: Set(true),
                    created_by: Set(performer_id),
                    updated_by: Set(Some(performer_id)),
                    created_at: Set(now),
                    updated_at: Set(Some(now)),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                let instance = tehsil_activity::ActiveModel {
                    district_activity_id: Set(schedule.id),
                    district_id: Set(district.id),
                    tehsil_id: Set(Some(tehsil.id)),
                    activity_id: Set(activity.id),
                    frequency_id: Set(frequency_id),
                    from_date: Set(Some(today)),
                    to_date: Set(Some(today)),
                    is_assigned: Set(true),
                    assigned_at: Set(Some(now)),
                    is_performed: Set(false),
                    performed_at: Set(None),
                    performed_by: Set(None),
                    is_unscheduled: Set(true),
                    created_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                let submission = record_submission(txn, &instance, performer_id, values, true, now).await?;
                notify::notify(
                    txn,
                    &Event::ActivityPerformed {
                        tehsil_activity_id: instance.id,
                        user_activity_id: submission.id,
                        district_id: district.id,
                        activity_name: activity.name,
                        performed_by: performer_name,
                    },
                )
                .await?;
                Ok((schedule.id, instance, submission))
            })
        })
        .await;

    let (district_activity_id, instance, submission) = match outcome {
        Ok(created) => created,
        Err(e) => {
            warn!("Recording unscheduled activity failed, removing {} uploads", written.len());
            storage::discard(state.media.as_ref(), &written).await;
            return Err(e.into());
        }
    };

    info!("Unscheduled activity recorded as tehsil activity {}", instance.id);
    let submission = present_submissions(&state.db, state.media.as_ref(), vec![submission])
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal("submission missing after insert".to_string()))?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            UnscheduledActivityResponse {
                district_activity_id,
                tehsil_activity_id: instance.id,
                submission,
            },
            "Activity performed successfully",
        )),
    ))
}
