//! Line-list reports over submissions and tehsil activities, with CSV export.

use std::collections::{BTreeMap, BTreeSet};

use crate::caller::{permissions, Caller};
use crate::error::{ApiError, ApiResult};
use crate::handlers::calendar::ActivityType;
use crate::handlers::lookups::{Names, Wanted};
use crate::handlers::schedules::{activity_name_condition, visible_instances, InstancePresenter, TehsilActivityResponse};
use crate::schemas::{ApiResponse, AppState, NamedRef, Page};
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Json},
};
use axum_valid::Valid;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use common::PageRequest;
use compute::schedule::ScheduleStatus;
use model::entities::{district, tehsil_activity, user, user_activity};
use sea_orm::sea_query::Query as SqlQuery;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Select,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Default, Clone, Deserialize, ToSchema, IntoParams, Validate)]
pub struct ReportQuery {
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub page_length: Option<u64>,
    pub activity_type: Option<ActivityType>,
    pub district: Option<i32>,
    /// Franchising phase of the district
    pub phase: Option<i32>,
    pub tehsil: Option<i32>,
    pub activity: Option<i32>,
    /// Matches activity or user names
    pub search: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// One submission in the performed line list.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PerformedRow {
    pub id: i32,
    pub tehsil_activity_id: i32,
    pub activity: Option<NamedRef>,
    pub district: Option<NamedRef>,
    pub tehsil: Option<NamedRef>,
    pub user: Option<NamedRef>,
    pub is_unscheduled: bool,
    /// Field values rendered as text
    pub values: BTreeMap<String, String>,
    pub performed_at: NaiveDateTime,
}

/// One tehsil activity in the activities line list.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivityRow {
    pub id: i32,
    pub activity: Option<NamedRef>,
    pub district: Option<NamedRef>,
    pub tehsil: Option<NamedRef>,
    pub frequency: Option<NamedRef>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub status: ScheduleStatus,
    pub is_unscheduled: bool,
    pub performed_at: Option<NaiveDateTime>,
    pub submissions: u64,
}

impl From<TehsilActivityResponse> for ActivityRow {
    fn from(r: TehsilActivityResponse) -> Self {
        Self {
            id: r.id,
            activity: r.activity,
            district: r.district,
            tehsil: r.tehsil,
            frequency: r.frequency,
            from_date: r.from_date,
            to_date: r.to_date,
            status: r.status,
            is_unscheduled: r.is_unscheduled,
            performed_at: r.performed_at,
            submissions: r.performed_activities_count,
        }
    }
}

/// `[from 00:00, to+1 00:00)` as timestamps; a missing side is open.
pub fn day_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
    (
        from.and_then(|d| d.and_hms_opt(0, 0, 0)),
        to.and_then(|d| (d + Duration::days(1)).and_hms_opt(0, 0, 0)),
    )
}

fn within(column: impl ColumnTrait + Copy, range: (Option<NaiveDateTime>, Option<NaiveDateTime>)) -> Condition {
    let mut condition = Condition::all();
    if let Some(start) = range.0 {
        condition = condition.add(column.gte(start));
    }
    if let Some(end) = range.1 {
        condition = condition.add(column.lt(end));
    }
    condition
}

fn districts_in_phase(phase: i32) -> sea_orm::sea_query::SelectStatement {
    SqlQuery::select()
        .column(district::Column::Id)
        .from(district::Entity)
        .and_where(district::Column::FranchisingPhaseNo.eq(phase))
        .to_owned()
}

/// Scoped submissions matching the report filters, newest first.
pub fn performed_select(caller: &Caller, query: &ReportQuery) -> Select<user_activity::Entity> {
    let mut condition = Condition::all()
        .add(caller.scope().user_activities())
        .add(query.activity_type.unwrap_or_default().condition(user_activity::Column::IsUnscheduled));
    if let Some(id) = query.district {
        condition = condition.add(user_activity::Column::DistrictId.eq(id));
    }
    if let Some(phase) = query.phase {
        condition = condition.add(user_activity::Column::DistrictId.in_subquery(districts_in_phase(phase)));
    }
    if let Some(id) = query.tehsil {
        condition = condition.add(user_activity::Column::TehsilId.eq(id));
    }
    if let Some(id) = query.activity {
        condition = condition.add(user_activity::Column::ActivityId.eq(id));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(
            Condition::any()
                .add(activity_name_condition(user_activity::Column::ActivityId, search))
                .add(
                    user_activity::Column::UserId.in_subquery(
                        SqlQuery::select()
                            .column(user::Column::Id)
                            .from(user::Entity)
                            .cond_where(
                                Condition::any()
                                    .add(user::Column::Name.contains(search))
                                    .add(user::Column::Username.contains(search)),
                            )
                            .to_owned(),
                    ),
                ),
        );
    }
    condition = condition.add(within(
        user_activity::Column::CreatedAt,
        day_range(query.from_date, query.to_date),
    ));

    user_activity::Entity::find()
        .filter(condition)
        .order_by_desc(user_activity::Column::Id)
}

async fn performed_rows(
    db: &DatabaseConnection,
    rows: Vec<user_activity::Model>,
) -> Result<Vec<PerformedRow>, DbErr> {
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
        .map(|row| PerformedRow {
            id: row.id,
            tehsil_activity_id: row.tehsil_activity_id,
            activity: names.activity(row.activity_id),
            district: names.district(row.district_id),
            tehsil: names.tehsil(row.tehsil_id),
            user: names.user(Some(row.user_id)),
            is_unscheduled: row.is_unscheduled,
            values: row
                .field_values
                .0
                .iter()
                .map(|(name, value)| (name.clone(), value.display()))
                .collect(),
            performed_at: row.created_at,
        })
        .collect())
}

/// Performed activities line list
#[utoipa::path(
    get,
    path = "/api/v1/reports/performed",
    tag = "reports",
    params(ReportQuery),
    responses(
        (status = 200, description = "Report retrieved successfully", body = ApiResponse<Page<PerformedRow>>),
        (status = 403, description = "Not allowed", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_performed_report(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Query(query)): Valid<Query<ReportQuery>>,
) -> ApiResult<Json<ApiResponse<Page<PerformedRow>>>> {
    trace!("Entering get_performed_report function");
    caller.require(permissions::LINE_LIST_REPORT)?;

    let paging = PageRequest::new(query.page, query.page_length);
    let paginator = performed_select(&caller, &query).paginate(&state.db, paging.page_length);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(paging.index()).await?;
    debug!("Retrieved {} of {} performed rows", rows.len(), total);

    let items = performed_rows(&state.db, rows).await?;
    Ok(Json(ApiResponse::ok(
        Page::new(items, paging, total),
        "Report retrieved successfully",
    )))
}

/// Tehsil activities line list
#[utoipa::path(
    get,
    path = "/api/v1/reports/activities",
    tag = "reports",
    params(ReportQuery),
    responses(
        (status = 200, description = "Report retrieved successfully", body = ApiResponse<Page<ActivityRow>>),
        (status = 403, description = "Not allowed", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_activities_report(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Query(query)): Valid<Query<ReportQuery>>,
) -> ApiResult<Json<ApiResponse<Page<ActivityRow>>>> {
    caller.require(permissions::LINE_LIST_REPORT)?;

    let mut condition = Condition::all()
        .add(query.activity_type.unwrap_or_default().condition(tehsil_activity::Column::IsUnscheduled));
    if let Some(id) = query.district {
        condition = condition.add(tehsil_activity::Column::DistrictId.eq(id));
    }
    if let Some(phase) = query.phase {
        condition = condition.add(tehsil_activity::Column::DistrictId.in_subquery(districts_in_phase(phase)));
    }
    if let Some(id) = query.tehsil {
        condition = condition.add(tehsil_activity::Column::TehsilId.eq(id));
    }
    if let Some(id) = query.activity {
        condition = condition.add(tehsil_activity::Column::ActivityId.eq(id));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(activity_name_condition(tehsil_activity::Column::ActivityId, search));
    }
    let range = day_range(query.from_date, query.to_date);
    if range != (None, None) {
        condition = condition.add(
            Condition::any()
                .add(within(tehsil_activity::Column::CreatedAt, range))
                .add(within(tehsil_activity::Column::PerformedAt, range)),
        );
    }

    let paging = PageRequest::new(query.page, query.page_length);
    let paginator = visible_instances(&caller)
        .filter(condition)
        .order_by_desc(tehsil_activity::Column::Id)
        .paginate(&state.db, paging.page_length);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(paging.index()).await?;
    debug!("Retrieved {} of {} activity rows", rows.len(), total);

    let presenter =
        InstancePresenter::load(&state.db, &caller, compute::default_evaluator(None), &rows).await?;
    let items = rows.into_iter().map(|r| ActivityRow::from(presenter.present(r))).collect();
    Ok(Json(ApiResponse::ok(
        Page::new(items, paging, total),
        "Report retrieved successfully",
    )))
}

/// Renders performed rows as CSV. Field columns follow the fixed columns,
/// one per distinct field name in alphabetical order.
pub fn performed_csv(rows: &[PerformedRow]) -> Result<Vec<u8>, csv::Error> {
    let fields: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.values.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = vec!["ID", "Activity", "District", "Tehsil", "Performed By", "Performed At", "Type"];
    header.extend(fields.iter().copied());
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.id.to_string(),
            Names::label(&row.activity),
            Names::label(&row.district),
            Names::label(&row.tehsil),
            Names::label(&row.user),
            row.performed_at.format("%Y-%m-%d %H:%M").to_string(),
            if row.is_unscheduled { "Unscheduled" } else { "Scheduled" }.to_string(),
        ];
        record.extend(fields.iter().map(|f| row.values.get(*f).cloned().unwrap_or_default()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))
}

/// Export the performed activities line list as CSV
#[utoipa::path(
    get,
    path = "/api/v1/reports/performed/export",
    tag = "reports",
    params(ReportQuery),
    responses(
        (status = 200, description = "CSV export", body = String, content_type = "text/csv"),
        (status = 403, description = "Not allowed", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn export_performed_report(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ReportQuery>,
) -> ApiResult<impl IntoResponse> {
    caller.require(permissions::LINE_LIST_REPORT)?;

    let rows = performed_select(&caller, &query).all(&state.db).await?;
    debug!("Exporting {} performed rows", rows.len());
    let rows = performed_rows(&state.db, rows).await?;
    let body = performed_csv(&rows).map_err(|e| ApiError::Internal(format!("CSV export failed: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"performed-activities.csv\""),
        ],
        body,
    ))
}
