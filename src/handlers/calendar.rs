use crate::caller::{permissions, Caller};
use crate::error::{ApiError, ApiResult};
use crate::handlers::lookups::{Names, Wanted};
use crate::handlers::schedules::{activity_name_condition, parents_of, visible_instances};
use crate::schemas::{ApiResponse, AppState, NamedRef};
use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::NaiveDate;
use compute::schedule::{overlaps_condition, ScheduleFacts, ScheduleStatus};
use compute::trend::month_bounds;
use model::entities::tehsil_activity;
use sea_orm::{ColumnTrait, Condition, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};
use utoipa::{IntoParams, ToSchema};

/// Scheduled, ad-hoc, or both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Scheduled,
    Unscheduled,
    #[default]
    All,
}

impl ActivityType {
    pub fn condition(&self, is_unscheduled: impl ColumnTrait) -> Condition {
        match self {
            ActivityType::Scheduled => Condition::all().add(is_unscheduled.eq(false)),
            ActivityType::Unscheduled => Condition::all().add(is_unscheduled.eq(true)),
            ActivityType::All => Condition::all(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentFilter {
    Assigned,
    Performed,
    /// Assigned, unperformed and past their window
    Expired,
}

/// Widest range one calendar request may cover, in days.
pub const MAX_CALENDAR_DAYS: i64 = 62;

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct CalendarQuery {
    /// Defaults to the first day of the current month
    pub start: Option<NaiveDate>,
    /// Defaults to the last day of the current month
    pub end: Option<NaiveDate>,
    pub activity_type: Option<ActivityType>,
    pub assignment: Option<AssignmentFilter>,
    pub search: Option<String>,
    pub district: Option<i32>,
    pub tehsil: Option<i32>,
    pub activity: Option<i32>,
    pub frequency: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CalendarEvent {
    pub id: i32,
    pub title: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub status: ScheduleStatus,
    pub color: String,
    pub district: Option<NamedRef>,
    pub tehsil: Option<NamedRef>,
    pub activity: Option<NamedRef>,
    pub frequency: Option<NamedRef>,
    pub is_unscheduled: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CalendarResponse {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub events: Vec<CalendarEvent>,
}

fn status_color(status: ScheduleStatus) -> &'static str {
    match status {
        ScheduleStatus::Unassigned => "#9ca3af",
        ScheduleStatus::Upcoming => "#3b82f6",
        ScheduleStatus::Pending => "#ef9722",
        ScheduleStatus::Performed => "#16a34a",
        ScheduleStatus::Expired => "#dc2626",
    }
}

/// Get calendar events
///
/// Returns the caller's visible tehsil activities whose window overlaps the
/// requested range. The range may span at most `MAX_CALENDAR_DAYS` days.
#[utoipa::path(
    get,
    path = "/api/v1/calendar",
    tag = "dashboard",
    params(CalendarQuery),
    responses(
        (status = 200, description = "Calendar retrieved successfully", body = ApiResponse<CalendarResponse>),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 422, description = "Range too wide", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_calendar(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<CalendarQuery>,
) -> ApiResult<Json<ApiResponse<CalendarResponse>>> {
    trace!("Entering get_calendar function");
    caller.require_permission(permissions::VIEW_CALENDAR)?;
    let evaluator = compute::default_evaluator(None);

    let (month_start, month_end) = month_bounds(evaluator.today());
    let start = query.start.unwrap_or(month_start);
    let end = query.end.unwrap_or(month_end).max(start);
    if (end - start).num_days() >= MAX_CALENDAR_DAYS {
        return Err(ApiError::field(
            "end",
            format!("The calendar range may cover at most {MAX_CALENDAR_DAYS} days."),
        ));
    }

    let mut condition = Condition::all()
        .add(overlaps_condition(start, end))
        .add(query.activity_type.unwrap_or_default().condition(tehsil_activity::Column::IsUnscheduled));
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(activity_name_condition(tehsil_activity::Column::ActivityId, search));
    }
    if let Some(id) = query.district {
        condition = condition.add(tehsil_activity::Column::DistrictId.eq(id));
    }
    if let Some(id) = query.tehsil {
        condition = condition
            .add(tehsil_activity::Column::TehsilId.eq(id))
            .add(tehsil_activity::Column::IsAssigned.eq(true));
    }
    if let Some(id) = query.activity {
        condition = condition.add(tehsil_activity::Column::ActivityId.eq(id));
    }
    if let Some(id) = query.frequency {
        condition = condition.add(tehsil_activity::Column::FrequencyId.eq(id));
    }
    match query.assignment {
        Some(AssignmentFilter::Assigned) => {
            condition = condition.add(tehsil_activity::Column::IsAssigned.eq(true));
        }
        Some(AssignmentFilter::Performed) => {
            condition = condition.add(evaluator.status_condition(ScheduleStatus::Performed));
        }
        Some(AssignmentFilter::Expired) => {
            condition = condition.add(evaluator.status_condition(ScheduleStatus::Expired));
        }
        None => {}
    }

    let rows = visible_instances(&caller)
        .filter(condition)
        .order_by_desc(tehsil_activity::Column::Id)
        .all(&state.db)
        .await?;
    debug!("Calendar {}..{} has {} events", start, end, rows.len());

    let parents = parents_of(&state.db, &rows).await?;
    let mut wanted = Wanted::default();
    for row in &rows {
        wanted
            .district(row.district_id)
            .tehsil(row.tehsil_id)
            .activity(row.activity_id)
            .frequency(row.frequency_id);
    }
    let names = Names::load(&state.db, &wanted).await?;

    let events = rows
        .into_iter()
        .filter_map(|row| {
            let facts = ScheduleFacts::for_tehsil_activity(&row, parents.get(&row.district_activity_id));
            let window = facts.window?;
            let status = evaluator.status(&facts);
            let activity = names.activity(row.activity_id);
            let tehsil = names.tehsil(row.tehsil_id);
            Some(CalendarEvent {
                id: row.id,
                title: format!("{} ({})", Names::label(&activity), Names::label(&tehsil)),
                start: window.from(),
                end: window.to(),
                status,
                color: status_color(status).to_string(),
                district: names.district(row.district_id),
                tehsil,
                activity,
                frequency: names.frequency(row.frequency_id),
                is_unscheduled: row.is_unscheduled,
            })
        })
        .collect();

    Ok(Json(ApiResponse::ok(
        CalendarResponse { start, end, events },
        "Calendar retrieved successfully",
    )))
}
