//! Call-centre complaints and inquiries.

use crate::caller::{permissions, Caller};
use crate::error::{ApiError, ApiResult};
use crate::handlers::lookups::{Names, Wanted};
use crate::handlers::reports::day_range;
use crate::schemas::{ApiResponse, AppState, NamedRef, Page};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use common::PageRequest;
use model::entities::complaint::{CallType, ComplaintSource, ComplaintStatus};
use model::entities::{complaint, complaint_history, district, tehsil};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams, Validate)]
pub struct ComplaintQuery {
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub page_length: Option<u64>,
    /// Matches complainant, subject or description
    pub search: Option<String>,
    #[schema(value_type = Option<String>)]
    #[param(value_type = Option<String>)]
    pub call_type: Option<CallType>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComplaintResponse {
    pub id: i32,
    pub complainant_name: String,
    pub complainant_contact: Option<String>,
    pub district: Option<NamedRef>,
    pub tehsil: Option<NamedRef>,
    pub subject: String,
    pub description: String,
    #[schema(value_type = String)]
    pub source: ComplaintSource,
    #[schema(value_type = String)]
    pub call_type: CallType,
    #[schema(value_type = String)]
    pub status: ComplaintStatus,
    pub marked_by: Option<NamedRef>,
    pub remarks: Option<String>,
    pub created_by: Option<NamedRef>,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComplaintHistoryResponse {
    pub id: i32,
    #[schema(value_type = String)]
    pub status: ComplaintStatus,
    pub remarks: Option<String>,
    pub acted_by: Option<NamedRef>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComplaintDetail {
    pub complaint: ComplaintResponse,
    pub history: Vec<ComplaintHistoryResponse>,
}

/// Summary counts over the filtered complaints.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ComplaintCounts {
    pub overall: u64,
    pub call_center: u64,
    pub mobile: u64,
    pub pending: u64,
    pub resolved: u64,
    pub reopened_rejected: u64,
    pub inquiries: u64,
}

impl ComplaintCounts {
    pub fn tally(rows: impl IntoIterator<Item = (ComplaintSource, ComplaintStatus, CallType)>) -> Self {
        let mut counts = Self::default();
        for (source, status, call_type) in rows {
            counts.overall += 1;
            match source {
                ComplaintSource::CallCenter => counts.call_center += 1,
                ComplaintSource::Mobile => counts.mobile += 1,
            }
            match status {
                ComplaintStatus::Pending => counts.pending += 1,
                ComplaintStatus::Resolved => counts.resolved += 1,
                ComplaintStatus::Reopened | ComplaintStatus::Rejected => counts.reopened_rejected += 1,
            }
            if call_type == CallType::Inquiry {
                counts.inquiries += 1;
            }
        }
        counts
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComplaintListResponse {
    pub counts: ComplaintCounts,
    pub complaints: Page<ComplaintResponse>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateComplaintRequest {
    #[validate(length(min = 1, max = 255))]
    pub complainant_name: String,
    #[validate(length(max = 30))]
    pub complainant_contact: Option<String>,
    pub district_id: Option<i32>,
    pub tehsil_id: Option<i32>,
    #[validate(length(min = 1, max = 255))]
    pub subject: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[schema(value_type = String)]
    pub call_type: CallType,
}

/// Outcome an officer can record on a complaint.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintAction {
    Resolved,
    Rejected,
    Reopened,
}

impl From<ComplaintAction> for ComplaintStatus {
    fn from(action: ComplaintAction) -> Self {
        match action {
            ComplaintAction::Resolved => ComplaintStatus::Resolved,
            ComplaintAction::Rejected => ComplaintStatus::Rejected,
            ComplaintAction::Reopened => ComplaintStatus::Reopened,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct ComplaintActionRequest {
    pub status: ComplaintAction,
    #[validate(length(max = 2000))]
    pub remarks: Option<String>,
}

/// Agents see the complaints they logged; everyone else sees their area.
fn visible_complaints(caller: &Caller) -> Condition {
    if caller.is_call_center_agent() {
        Condition::all().add(complaint::Column::CreatedBy.eq(caller.id()))
    } else {
        caller.scope().complaints()
    }
}

async fn present_complaints<C: ConnectionTrait>(
    db: &C,
    rows: Vec<complaint::Model>,
) -> Result<Vec<ComplaintResponse>, DbErr> {
    let mut wanted = Wanted::default();
    for row in &rows {
        wanted.tehsil(row.tehsil_id).user(row.marked_by).user(Some(row.created_by));
        if let Some(id) = row.district_id {
            wanted.district(id);
        }
    }
    let names = Names::load(db, &wanted).await?;
    Ok(rows
        .into_iter()
        .map(|row| ComplaintResponse {
            id: row.id,
            complainant_name: row.complainant_name,
            complainant_contact: row.complainant_contact,
            district: row.district_id.and_then(|id| names.district(id)),
            tehsil: names.tehsil(row.tehsil_id),
            subject: row.subject,
            description: row.description,
            source: row.source,
            call_type: row.call_type,
            status: row.status,
            marked_by: names.user(row.marked_by),
            remarks: row.remarks,
            created_by: names.user(Some(row.created_by)),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .collect())
}

async fn find_visible_complaint<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    id: i32,
) -> ApiResult<complaint::Model> {
    complaint::Entity::find_by_id(id)
        .filter(visible_complaints(caller))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Complaint", id))
}

async fn detail<C: ConnectionTrait>(db: &C, row: complaint::Model) -> ApiResult<ComplaintDetail> {
    let history = complaint_history::Entity::find()
        .filter(complaint_history::Column::ComplaintId.eq(row.id))
        .order_by_asc(complaint_history::Column::Id)
        .all(db)
        .await?;
    let mut wanted = Wanted::default();
    for h in &history {
        wanted.user(Some(h.acted_by));
    }
    let names = Names::load(db, &wanted).await?;
    let history = history
        .into_iter()
        .map(|h| ComplaintHistoryResponse {
            id: h.id,
            status: h.status,
            remarks: h.remarks,
            acted_by: names.user(Some(h.acted_by)),
            created_at: h.created_at,
        })
        .collect();
    let complaint = present_complaints(db, vec![row])
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal("complaint missing".to_string()))?;
    Ok(ComplaintDetail { complaint, history })
}

/// List complaints with summary counts
#[utoipa::path(
    get,
    path = "/api/v1/complaints",
    tag = "complaints",
    params(ComplaintQuery),
    responses(
        (status = 200, description = "Complaints retrieved successfully", body = ApiResponse<ComplaintListResponse>),
        (status = 403, description = "Not allowed", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_complaints(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Query(query)): Valid<Query<ComplaintQuery>>,
) -> ApiResult<Json<ApiResponse<ComplaintListResponse>>> {
    trace!("Entering get_complaints function");
    caller.require_any(&[permissions::VIEW_COMPLAINTS, permissions::CALLCENTER])?;

    let mut condition = Condition::all().add(visible_complaints(&caller));
    if let Some(call_type) = query.call_type {
        condition = condition.add(complaint::Column::CallType.eq(call_type));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(
            Condition::any()
                .add(complaint::Column::ComplainantName.contains(search))
                .add(complaint::Column::Subject.contains(search))
                .add(complaint::Column::Description.contains(search)),
        );
    }
    let (start, end) = day_range(query.from_date, query.to_date);
    if let Some(start) = start {
        condition = condition.add(complaint::Column::CreatedAt.gte(start));
    }
    if let Some(end) = end {
        condition = condition.add(complaint::Column::CreatedAt.lt(end));
    }

    let facets: Vec<(ComplaintSource, ComplaintStatus, CallType)> = complaint::Entity::find()
        .filter(condition.clone())
        .select_only()
        .columns([
            complaint::Column::Source,
            complaint::Column::Status,
            complaint::Column::CallType,
        ])
        .into_tuple()
        .all(&state.db)
        .await?;
    let counts = ComplaintCounts::tally(facets);

    let paging = PageRequest::new(query.page, query.page_length);
    let paginator = complaint::Entity::find()
        .filter(condition)
        .order_by_desc(complaint::Column::Id)
        .paginate(&state.db, paging.page_length);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(paging.index()).await?;
    debug!("Retrieved {} of {} complaints", rows.len(), total);

    let items = present_complaints(&state.db, rows).await?;
    Ok(Json(ApiResponse::ok(
        ComplaintListResponse {
            counts,
            complaints: Page::new(items, paging, total),
        },
        "Complaints retrieved successfully",
    )))
}

/// Get a complaint with its history
#[utoipa::path(
    get,
    path = "/api/v1/complaints/{complaint_id}",
    tag = "complaints",
    params(("complaint_id" = i32, Path, description = "Complaint ID")),
    responses(
        (status = 200, description = "Complaint retrieved successfully", body = ApiResponse<ComplaintDetail>),
        (status = 404, description = "Complaint not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_complaint(
    State(state): State<AppState>,
    caller: Caller,
    Path(complaint_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<ComplaintDetail>>> {
    caller.require_any(&[permissions::VIEW_COMPLAINTS, permissions::CALLCENTER])?;
    let row = find_visible_complaint(&state.db, &caller, complaint_id).await?;
    let detail = detail(&state.db, row).await?;
    Ok(Json(ApiResponse::ok(detail, "Complaint retrieved successfully")))
}

/// Log a complaint or inquiry from the call centre
#[utoipa::path(
    post,
    path = "/api/v1/complaints",
    tag = "complaints",
    request_body = CreateComplaintRequest,
    responses(
        (status = 201, description = "Complaint created successfully", body = ApiResponse<ComplaintResponse>),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 422, description = "Invalid request", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_complaint(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Json(request)): Valid<Json<CreateComplaintRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ComplaintResponse>>)> {
    caller.require(permissions::CALLCENTER)?;

    if let Some(id) = request.district_id {
        if district::Entity::find_by_id(id).one(&state.db).await?.is_none() {
            return Err(ApiError::field("district_id", "The selected district is invalid."));
        }
    }
    if let Some(id) = request.tehsil_id {
        let tehsil = tehsil::Entity::find_by_id(id)
            .one(&state.db)
            .await?
            .ok_or_else(|| ApiError::field("tehsil_id", "The selected tehsil is invalid."))?;
        if request.district_id.is_some_and(|d| d != tehsil.district_id) {
            return Err(ApiError::field("tehsil_id", "The tehsil does not belong to the district."));
        }
    }

    let created = complaint::ActiveModel {
        complainant_name: Set(request.complainant_name),
        complainant_contact: Set(request.complainant_contact),
        district_id: Set(request.district_id),
        tehsil_id: Set(request.tehsil_id),
        subject: Set(request.subject),
        description: Set(request.description),
        source: Set(ComplaintSource::CallCenter),
        call_type: Set(request.call_type),
        status: Set(ComplaintStatus::Pending),
        marked_by: Set(None),
        remarks: Set(None),
        created_by: Set(caller.id()),
        created_at: Set(Utc::now().naive_utc()),
        updated_at: Set(None),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    info!("Complaint created with ID: {}", created.id);

    let response = present_complaints(&state.db, vec![created])
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal("complaint missing after insert".to_string()))?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(response, "Complaint created successfully")),
    ))
}

/// Record an action on a complaint
#[utoipa::path(
    post,
    path = "/api/v1/complaints/{complaint_id}/action",
    tag = "complaints",
    params(("complaint_id" = i32, Path, description = "Complaint ID")),
    request_body = ComplaintActionRequest,
    responses(
        (status = 200, description = "Complaint updated successfully", body = ApiResponse<ComplaintDetail>),
        (status = 404, description = "Complaint not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn act_on_complaint(
    State(state): State<AppState>,
    caller: Caller,
    Path(complaint_id): Path<i32>,
    Valid(Json(request)): Valid<Json<ComplaintActionRequest>>,
) -> ApiResult<Json<ApiResponse<ComplaintDetail>>> {
    caller.require(permissions::VIEW_COMPLAINTS)?;
    let row = find_visible_complaint(&state.db, &caller, complaint_id).await?;
    let status = ComplaintStatus::from(request.status);
    debug!("Complaint {} moves from {:?} to {:?}", row.id, row.status, status);

    let actor = caller.id();
    let remarks = request.remarks;
    let updated = state
        .db
        .transaction::<_, complaint::Model, ApiError>(|txn| {
            Box::pin(async move {
                let now = Utc::now().naive_utc();
                let mut active = row.into_active_model();
                active.status = Set(status);
                active.marked_by = Set(Some(actor));
                active.remarks = Set(remarks.clone());
                active.updated_at = Set(Some(now));
                let updated = active.update(txn).await?;

                complaint_history::ActiveModel {
                    complaint_id: Set(updated.id),
                    status: Set(status),
                    remarks: Set(remarks),
                    acted_by: Set(actor),
                    created_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
                Ok(updated)
            })
        })
        .await?;

    info!("Complaint {} marked {:?}", updated.id, updated.status);
    let detail = detail(&state.db, updated).await?;
    Ok(Json(ApiResponse::ok(detail, "Complaint updated successfully")))
}
