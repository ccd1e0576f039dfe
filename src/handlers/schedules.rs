//! District schedules and their tehsil instances.

use crate::caller::{permissions, Caller};
use crate::error::{ApiError, ApiResult};
use crate::handlers::lookups::{Names, Wanted};
use crate::notify::{self, Event};
use crate::schemas::{ApiResponse, AppState, NamedRef, Page};
use crate::storage;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use common::PageRequest;
use compute::schedule::{overlaps_condition, ScheduleFacts, ScheduleStatus, ScheduleWindow, StatusEvaluator};
use compute::trend::month_bounds;
use model::entities::user::RoleLevel;
use model::entities::{activity, district, district_activity, tehsil, tehsil_activity, user_activity};
use sea_orm::sea_query::{Expr, Query as SqlQuery};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// One activity to schedule, with its optional frequency and note.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct ScheduleActivityInput {
    pub activity_id: i32,
    pub frequency_id: Option<i32>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

/// Request body for scheduling activities across districts
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateScheduleRequest {
    #[validate(length(min = 1))]
    pub districts: Vec<i32>,
    #[validate(length(min = 1), nested)]
    pub activities: Vec<ScheduleActivityInput>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

/// One DistrictActivity created by a scheduling request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatedSchedule {
    pub id: i32,
    pub district_id: i32,
    pub activity_id: i32,
    /// Tehsil instances created, excluding the district-level row
    pub tehsil_activity_count: u64,
}

/// Query parameters for listing schedules
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams, Validate)]
pub struct ScheduleQuery {
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub page_length: Option<u64>,
    /// Matches the activity name
    pub search: Option<String>,
    pub activity: Option<i32>,
    pub district: Option<i32>,
    pub tehsil: Option<i32>,
    pub frequency: Option<i32>,
    pub assigned: Option<bool>,
    pub performed: Option<bool>,
    pub expired: Option<bool>,
    pub status: Option<ScheduleStatus>,
    /// Only windows overlapping the current month
    pub current_month: Option<bool>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    /// List district schedules instead of tehsil instances
    pub grouped: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TehsilActivityResponse {
    pub id: i32,
    pub district_activity_id: i32,
    pub district: Option<NamedRef>,
    pub tehsil: Option<NamedRef>,
    pub activity: Option<NamedRef>,
    pub frequency: Option<NamedRef>,
    /// Effective window: the row's own dates, or its schedule's
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub is_assigned: bool,
    pub assigned_at: Option<NaiveDateTime>,
    pub is_performed: bool,
    pub performed_at: Option<NaiveDateTime>,
    pub is_unscheduled: bool,
    pub status: ScheduleStatus,
    pub is_upcoming: bool,
    pub is_expired_for_viewing: bool,
    pub is_expired_for_assigning: bool,
    pub performed_activities_count: u64,
    pub can_delete: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DistrictActivityResponse {
    pub id: i32,
    pub district: Option<NamedRef>,
    pub activity: Option<NamedRef>,
    pub frequency: Option<NamedRef>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub description: Option<String>,
    pub is_unscheduled: bool,
    pub tehsil_count: u64,
    pub assigned_count: u64,
    pub performed_count: u64,
    pub is_expired_for_assigning: bool,
    pub created_at: NaiveDateTime,
}

/// Listing payload: tehsil instances, or district schedules when grouped.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScheduleListing {
    pub grouped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<Page<TehsilActivityResponse>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedules: Option<Page<DistrictActivityResponse>>,
}

impl ScheduleListing {
    fn instances(page: Page<TehsilActivityResponse>) -> Self {
        Self {
            grouped: false,
            instances: Some(page),
            schedules: None,
        }
    }

    fn grouped(page: Page<DistrictActivityResponse>) -> Self {
        Self {
            grouped: true,
            instances: None,
            schedules: Some(page),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleView {
    /// The window closed and back-dating is off
    ScheduleExpired,
    /// Tehsil instances ready for assignment
    Assign,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScheduleDetail {
    pub view: ScheduleView,
    pub schedule: DistrictActivityResponse,
    pub current_date: NaiveDate,
    pub tehsil_activities: Vec<TehsilActivityResponse>,
}

/// Tehsil instances the caller may see: scoped, excluding district-level
/// rows, and for tehsil callers only the assigned ones.
pub fn visible_instances(caller: &Caller) -> Select<tehsil_activity::Entity> {
    let mut select = tehsil_activity::Entity::find()
        .join(
            sea_orm::JoinType::InnerJoin,
            tehsil_activity::Relation::DistrictActivity.def(),
        )
        .filter(caller.scope().tehsil_activities())
        .filter(tehsil_activity::Column::TehsilId.is_not_null());
    if caller.level() == RoleLevel::Tehsil {
        select = select.filter(tehsil_activity::Column::IsAssigned.eq(true));
    }
    select
}

/// Rows whose activity name contains `search`.
pub fn activity_name_condition(column: impl ColumnTrait, search: &str) -> Condition {
    Condition::all().add(
        column.in_subquery(
            SqlQuery::select()
                .column(activity::Column::Id)
                .from(activity::Entity)
                .and_where(activity::Column::Name.contains(search))
                .to_owned(),
        ),
    )
}

/// Window bounds for optional from/to filters; a missing side is open.
pub fn filter_window(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Option<(NaiveDate, NaiveDate)> {
    if from.is_none() && to.is_none() {
        return None;
    }
    let open_from = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN);
    let open_to = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX);
    Some((from.unwrap_or(open_from), to.unwrap_or(open_to)))
}

fn instance_filters(query: &ScheduleQuery, evaluator: &StatusEvaluator) -> Condition {
    let mut condition = Condition::all();
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(activity_name_condition(tehsil_activity::Column::ActivityId, search));
    }
    if let Some(id) = query.activity {
        condition = condition.add(tehsil_activity::Column::ActivityId.eq(id));
    }
    if let Some(id) = query.district {
        condition = condition.add(tehsil_activity::Column::DistrictId.eq(id));
    }
    if let Some(id) = query.tehsil {
        condition = condition.add(tehsil_activity::Column::TehsilId.eq(id));
    }
    if let Some(id) = query.frequency {
        condition = condition.add(tehsil_activity::Column::FrequencyId.eq(id));
    }
    if let Some(assigned) = query.assigned {
        condition = condition.add(tehsil_activity::Column::IsAssigned.eq(assigned));
    }
    if let Some(performed) = query.performed {
        condition = condition.add(tehsil_activity::Column::IsPerformed.eq(performed));
    }
    if let Some(expired) = query.expired {
        let expired_rows = evaluator.status_condition(ScheduleStatus::Expired);
        condition = condition.add(if expired { expired_rows } else { expired_rows.not() });
    }
    if let Some(status) = query.status {
        condition = condition.add(evaluator.status_condition(status));
    }
    if query.current_month.unwrap_or(false) {
        let (first, last) = month_bounds(evaluator.today());
        condition = condition.add(overlaps_condition(first, last));
    }
    if let Some((from, to)) = filter_window(query.from_date, query.to_date) {
        condition = condition.add(overlaps_condition(from, to));
    }
    condition
}

fn schedule_filters(query: &ScheduleQuery, evaluator: &StatusEvaluator) -> Condition {
    let mut condition = Condition::all();
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(activity_name_condition(district_activity::Column::ActivityId, search));
    }
    if let Some(id) = query.activity {
        condition = condition.add(district_activity::Column::ActivityId.eq(id));
    }
    if let Some(id) = query.district {
        condition = condition.add(district_activity::Column::DistrictId.eq(id));
    }
    if let Some(id) = query.frequency {
        condition = condition.add(district_activity::Column::FrequencyId.eq(id));
    }
    let window = if query.current_month.unwrap_or(false) {
        Some(month_bounds(evaluator.today()))
    } else {
        filter_window(query.from_date, query.to_date)
    };
    if let Some((from, to)) = window {
        condition = condition
            .add(district_activity::Column::FromDate.lte(to))
            .add(district_activity::Column::ToDate.gte(from));
    }
    condition
}

/// Parents of a set of tehsil instances, by id.
pub async fn parents_of<C: ConnectionTrait>(
    db: &C,
    rows: &[tehsil_activity::Model],
) -> Result<HashMap<i32, district_activity::Model>, DbErr> {
    let ids: BTreeSet<i32> = rows.iter().map(|r| r.district_activity_id).collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(district_activity::Entity::find()
        .filter(district_activity::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect())
}

/// Number of submissions per tehsil instance.
pub async fn submission_counts<C: ConnectionTrait>(db: &C, ids: &[i32]) -> Result<HashMap<i32, u64>, DbErr> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i32, i64)> = user_activity::Entity::find()
        .select_only()
        .column(user_activity::Column::TehsilActivityId)
        .column_as(Expr::col(user_activity::Column::Id).count(), "n")
        .filter(user_activity::Column::TehsilActivityId.is_in(ids.iter().copied()))
        .group_by(user_activity::Column::TehsilActivityId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|(id, n)| (id, n.max(0) as u64)).collect())
}

/// Tehsil instances per schedule matching `extra`, header rows excluded.
async fn instance_counts<C: ConnectionTrait>(
    db: &C,
    parent_ids: &[i32],
    extra: Condition,
) -> Result<HashMap<i32, u64>, DbErr> {
    if parent_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i32, i64)> = tehsil_activity::Entity::find()
        .select_only()
        .column(tehsil_activity::Column::DistrictActivityId)
        .column_as(Expr::col(tehsil_activity::Column::Id).count(), "n")
        .filter(tehsil_activity::Column::DistrictActivityId.is_in(parent_ids.iter().copied()))
        .filter(tehsil_activity::Column::TehsilId.is_not_null())
        .filter(extra)
        .group_by(tehsil_activity::Column::DistrictActivityId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|(id, n)| (id, n.max(0) as u64)).collect())
}

/// Builds instance payloads for a page of rows.
pub struct InstancePresenter {
    evaluator: StatusEvaluator,
    parents: HashMap<i32, district_activity::Model>,
    names: Names,
    submissions: HashMap<i32, u64>,
    may_delete: bool,
}

impl InstancePresenter {
    pub async fn load<C: ConnectionTrait>(
        db: &C,
        caller: &Caller,
        evaluator: StatusEvaluator,
        rows: &[tehsil_activity::Model],
    ) -> Result<Self, DbErr> {
        let parents = parents_of(db, rows).await?;
        let mut wanted = Wanted::default();
        for row in rows {
            wanted
                .district(row.district_id)
                .tehsil(row.tehsil_id)
                .activity(row.activity_id)
                .frequency(row.frequency_id);
        }
        let names = Names::load(db, &wanted).await?;
        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let submissions = submission_counts(db, &ids).await?;
        Ok(Self {
            evaluator,
            parents,
            names,
            submissions,
            may_delete: caller.can(permissions::DELETE_SCHEDULE),
        })
    }

    pub fn parent(&self, row: &tehsil_activity::Model) -> Option<&district_activity::Model> {
        self.parents.get(&row.district_activity_id)
    }

    pub fn names(&self) -> &Names {
        &self.names
    }

    pub fn present(&self, row: tehsil_activity::Model) -> TehsilActivityResponse {
        let parent = self.parent(&row);
        let facts = ScheduleFacts::for_tehsil_activity(&row, parent);
        let performed_activities_count = self.submissions.get(&row.id).copied().unwrap_or(0);
        TehsilActivityResponse {
            id: row.id,
            district_activity_id: row.district_activity_id,
            district: self.names.district(row.district_id),
            tehsil: self.names.tehsil(row.tehsil_id),
            activity: self.names.activity(row.activity_id),
            frequency: self.names.frequency(row.frequency_id),
            from_date: facts.window.map(|w| w.from()),
            to_date: facts.window.map(|w| w.to()),
            description: parent.and_then(|p| p.description.clone()),
            is_assigned: row.is_assigned,
            assigned_at: row.assigned_at,
            is_performed: row.is_performed,
            performed_at: row.performed_at,
            is_unscheduled: row.is_unscheduled,
            status: self.evaluator.status(&facts),
            is_upcoming: self.evaluator.is_upcoming(&facts),
            is_expired_for_viewing: self.evaluator.is_expired_for_viewing(&facts),
            is_expired_for_assigning: self.evaluator.is_expired_for_assigning(&facts),
            performed_activities_count,
            can_delete: self.may_delete,
        }
    }
}

async fn present_schedules<C: ConnectionTrait>(
    db: &C,
    evaluator: &StatusEvaluator,
    schedules: Vec<district_activity::Model>,
) -> Result<Vec<DistrictActivityResponse>, DbErr> {
    let ids: Vec<i32> = schedules.iter().map(|s| s.id).collect();
    let totals = instance_counts(db, &ids, Condition::all()).await?;
    let assigned = instance_counts(db, &ids, Condition::all().add(tehsil_activity::Column::IsAssigned.eq(true))).await?;
    let performed = instance_counts(db, &ids, Condition::all().add(tehsil_activity::Column::IsPerformed.eq(true))).await?;

    let mut wanted = Wanted::default();
    for s in &schedules {
        wanted.district(s.district_id).activity(s.activity_id).frequency(s.frequency_id);
    }
    let names = Names::load(db, &wanted).await?;

    Ok(schedules
        .into_iter()
        .map(|s| {
            let facts = ScheduleFacts::for_district_activity(&s);
            DistrictActivityResponse {
                id: s.id,
                district: names.district(s.district_id),
                activity: names.activity(s.activity_id),
                frequency: names.frequency(s.frequency_id),
                from_date: s.from_date,
                to_date: s.to_date,
                description: s.description,
                is_unscheduled: s.is_unscheduled,
                tehsil_count: totals.get(&s.id).copied().unwrap_or(0),
                assigned_count: assigned.get(&s.id).copied().unwrap_or(0),
                performed_count: performed.get(&s.id).copied().unwrap_or(0),
                is_expired_for_assigning: evaluator.is_expired_for_assigning(&facts),
                created_at: s.created_at,
            }
        })
        .collect())
}

pub async fn find_schedule<C: ConnectionTrait>(db: &C, id: i32) -> ApiResult<district_activity::Model> {
    district_activity::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Schedule", id))
}

/// Storage keys of every submission under the given tehsil instances.
pub async fn media_keys_under<C: ConnectionTrait>(db: &C, condition: Condition) -> Result<Vec<String>, DbErr> {
    let submissions = user_activity::Entity::find().filter(condition).all(db).await?;
    Ok(submissions
        .iter()
        .flat_map(|s| s.field_values.media_keys())
        .map(str::to_string)
        .collect())
}

/// Schedule activities across districts
///
/// For every active district and every listed activity this creates one
/// DistrictActivity, its district-level TehsilActivity row, and one
/// unassigned TehsilActivity per active tehsil, all in one transaction.
#[utoipa::path(
    post,
    path = "/api/v1/schedules",
    tag = "schedules",
    request_body = CreateScheduleRequest,
    responses(
        (status = 201, description = "Schedule created successfully", body = ApiResponse<Vec<CreatedSchedule>>),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 422, description = "Invalid request", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_schedule(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Json(request)): Valid<Json<CreateScheduleRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Vec<CreatedSchedule>>>)> {
    trace!("Entering create_schedule function");
    caller.require(permissions::CREATE_SCHEDULE)?;

    let window = ScheduleWindow::new(request.from_date, request.to_date)?;

    let district_ids: BTreeSet<i32> = request.districts.iter().copied().collect();
    let known = district::Entity::find()
        .filter(district::Column::Id.is_in(district_ids.iter().copied()))
        .all(&state.db)
        .await?;
    if known.len() != district_ids.len() {
        return Err(ApiError::field("districts", "The selected districts is invalid."));
    }
    if let Some(outside) = known.iter().find(|d| !caller.scope().allows(Some(d.id), None)) {
        return Err(ApiError::Forbidden(format!(
            "District '{}' is outside your assigned area.",
            outside.name
        )));
    }
    let districts: Vec<district::Model> = known.into_iter().filter(|d| d.is_active).collect();

    let activity_ids: BTreeSet<i32> = request.activities.iter().map(|a| a.activity_id).collect();
    let activities: HashMap<i32, activity::Model> = activity::Entity::find()
        .filter(activity::Column::Id.is_in(activity_ids.iter().copied()))
        .filter(activity::Column::IsActive.eq(true))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();
    if activities.len() != activity_ids.len() {
        return Err(ApiError::field("activities", "The selected activity is invalid."));
    }

    debug!(
        "Scheduling {} activities across {} active districts from {} to {}",
        request.activities.len(),
        districts.len(),
        window.from(),
        window.to()
    );

    let creator = caller.id();
    let inputs = request.activities;
    let created = state
        .db
        .transaction::<_, Vec<CreatedSchedule>, ApiError>(|txn| {
            Box::pin(async move {
                let now = Utc::now().naive_utc();
                let mut created = Vec::new();
                for district in &districts {
                    let tehsils = tehsil::Entity::find()
                        .filter(tehsil::Column::DistrictId.eq(district.id))
                        .filter(tehsil::Column::IsActive.eq(true))
                        .all(txn)
                        .await?;

                    for input in &inputs {
                        let schedule = district_activity::ActiveModel {
                            district_id: Set(district.id),
                            activity_id: Set(input.activity_id),
                            frequency_id: Set(input.frequency_id),
                            from_date: Set(window.from()),
                            to_date: Set(window.to()),
                            description: Set(input.description.clone()),
                            is_unscheduled: Set(false),
                            created_by: Set(creator),
                            updated_by: Set(Some(creator)),
                            created_at: Set(now),
                            updated_at: Set(Some(now)),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;

                        let header = std::iter::once(None);
                        let instances = header.chain(tehsils.iter().map(|t| Some(t.id))).map(|tehsil_id| {
                            tehsil_activity::ActiveModel {
                                district_activity_id: Set(schedule.id),
                                district_id: Set(district.id),
                                tehsil_id: Set(tehsil_id),
                                activity_id: Set(input.activity_id),
                                frequency_id: Set(input.frequency_id),
                                from_date: Set(None),
                                to_date: Set(None),
                                // The district-level row stands for the district's own assignment.
                                is_assigned: Set(tehsil_id.is_none()),
                                assigned_at: Set(tehsil_id.is_none().then_some(now)),
                                is_performed: Set(false),
                                performed_at: Set(None),
                                performed_by: Set(None),
                                is_unscheduled: Set(false),
                                created_at: Set(now),
                                ..Default::default()
                            }
                        });
                        tehsil_activity::Entity::insert_many(instances).exec(txn).await?;

                        let activity_name = activities
                            .get(&input.activity_id)
                            .map(|a| a.name.clone())
                            .unwrap_or_default();
                        notify::notify(
                            txn,
                            &Event::ScheduleCreated {
                                district_activity_id: schedule.id,
                                district_id: district.id,
                                activity_name,
                                from_date: window.from(),
                                to_date: window.to(),
                            },
                        )
                        .await?;

                        created.push(CreatedSchedule {
                            id: schedule.id,
                            district_id: district.id,
                            activity_id: input.activity_id,
                            tehsil_activity_count: tehsils.len() as u64,
                        });
                    }
                }
                Ok(created)
            })
        })
        .await?;

    info!("Created {} schedules", created.len());
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(created, "Schedule created successfully")),
    ))
}

/// List schedules visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/schedules",
    tag = "schedules",
    params(ScheduleQuery),
    responses(
        (status = 200, description = "Schedules retrieved successfully", body = ApiResponse<ScheduleListing>),
        (status = 403, description = "Not allowed", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_schedules(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Query(query)): Valid<Query<ScheduleQuery>>,
) -> ApiResult<Json<ApiResponse<ScheduleListing>>> {
    trace!("Entering get_schedules function");
    caller.require_any(&[
        permissions::VIEW_SCHEDULE,
        permissions::ASSIGN_TO_TEHSILS,
        permissions::PERFORM,
    ])?;

    let evaluator = compute::default_evaluator(None);
    let paging = PageRequest::new(query.page, query.page_length);

    if query.grouped.unwrap_or(false) {
        if caller.level() == RoleLevel::Tehsil {
            return Err(ApiError::Forbidden(
                "Grouped schedules are only available to district and admin users.".to_string(),
            ));
        }
        let paginator = district_activity::Entity::find()
            .filter(caller.scope().district_activities())
            .filter(schedule_filters(&query, &evaluator))
            .order_by_desc(district_activity::Column::Id)
            .paginate(&state.db, paging.page_length);
        let total = paginator.num_items().await?;
        let schedules = paginator.fetch_page(paging.index()).await?;
        debug!("Retrieved {} of {} grouped schedules", schedules.len(), total);

        let items = present_schedules(&state.db, &evaluator, schedules).await?;
        return Ok(Json(ApiResponse::ok(
            ScheduleListing::grouped(Page::new(items, paging, total)),
            "Schedules retrieved successfully",
        )));
    }

    let paginator = visible_instances(&caller)
        .filter(instance_filters(&query, &evaluator))
        .order_by_desc(tehsil_activity::Column::Id)
        .paginate(&state.db, paging.page_length);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(paging.index()).await?;
    debug!("Retrieved {} of {} tehsil activities", rows.len(), total);

    let presenter = InstancePresenter::load(&state.db, &caller, evaluator, &rows).await?;
    let items = rows.into_iter().map(|r| presenter.present(r)).collect();
    Ok(Json(ApiResponse::ok(
        ScheduleListing::instances(Page::new(items, paging, total)),
        "Schedules retrieved successfully",
    )))
}

/// Get a schedule's assignment view
#[utoipa::path(
    get,
    path = "/api/v1/schedules/{schedule_id}",
    tag = "schedules",
    params(("schedule_id" = i32, Path, description = "DistrictActivity ID")),
    responses(
        (status = 200, description = "Schedule retrieved successfully", body = ApiResponse<ScheduleDetail>),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 404, description = "Schedule not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_schedule(
    State(state): State<AppState>,
    caller: Caller,
    Path(schedule_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<ScheduleDetail>>> {
    caller.require(permissions::ASSIGN_TO_TEHSILS)?;
    let schedule = find_schedule(&state.db, schedule_id).await?;
    caller.ensure_visible(Some(schedule.district_id), None)?;

    let evaluator = compute::default_evaluator(None);
    let expired = evaluator.is_expired_for_assigning(&ScheduleFacts::for_district_activity(&schedule));
    let backdate = state.settings.schedule.backdate_scheduling;

    let (view, rows) = if expired && !backdate {
        debug!("Schedule {} expired on {}", schedule.id, schedule.to_date);
        (ScheduleView::ScheduleExpired, Vec::new())
    } else {
        let rows = tehsil_activity::Entity::find()
            .filter(tehsil_activity::Column::DistrictActivityId.eq(schedule.id))
            .filter(tehsil_activity::Column::TehsilId.is_not_null())
            .order_by_asc(tehsil_activity::Column::Id)
            .all(&state.db)
            .await?;
        (ScheduleView::Assign, rows)
    };

    let presenter = InstancePresenter::load(&state.db, &caller, evaluator, &rows).await?;
    let tehsil_activities = rows.into_iter().map(|r| presenter.present(r)).collect();
    let summary = present_schedules(&state.db, &evaluator, vec![schedule])
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal("schedule summary missing".to_string()))?;

    Ok(Json(ApiResponse::ok(
        ScheduleDetail {
            view,
            schedule: summary,
            current_date: evaluator.today(),
            tehsil_activities,
        },
        "Schedule retrieved successfully",
    )))
}

/// Delete a schedule with all its tehsil instances and submissions
#[utoipa::path(
    delete,
    path = "/api/v1/schedules/{schedule_id}",
    tag = "schedules",
    params(("schedule_id" = i32, Path, description = "DistrictActivity ID")),
    responses(
        (status = 200, description = "Schedule deleted successfully", body = ApiResponse<String>),
        (status = 404, description = "Schedule not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_schedule(
    State(state): State<AppState>,
    caller: Caller,
    Path(schedule_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<String>>> {
    caller.require(permissions::DELETE_SCHEDULE)?;
    let schedule = find_schedule(&state.db, schedule_id).await?;
    caller.ensure_visible(Some(schedule.district_id), None)?;

    let keys = media_keys_under(
        &state.db,
        Condition::all().add(
            user_activity::Column::TehsilActivityId.in_subquery(
                SqlQuery::select()
                    .column(tehsil_activity::Column::Id)
                    .from(tehsil_activity::Entity)
                    .and_where(tehsil_activity::Column::DistrictActivityId.eq(schedule_id))
                    .to_owned(),
            ),
        ),
    )
    .await?;

    let result = district_activity::Entity::delete_by_id(schedule_id).exec(&state.db).await?;
    debug!("Delete operation completed. Rows affected: {}", result.rows_affected);
    if !keys.is_empty() {
        warn!("Removing {} media objects of deleted schedule {}", keys.len(), schedule_id);
        storage::discard(state.media.as_ref(), &keys).await;
    }

    info!("Schedule with ID {} deleted successfully", schedule_id);
    Ok(Json(ApiResponse::ok(format!("Schedule {} deleted", schedule_id), "Schedule deleted successfully")))
}
