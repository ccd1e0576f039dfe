//! Dashboard cards, charts and monthly trend lines.

use crate::caller::{permissions, Caller};
use crate::error::{ApiError, ApiResult};
use crate::handlers::geography::find_district;
use crate::handlers::lookups::{Names, Wanted};
use crate::handlers::schedules::visible_instances;
use crate::handlers::submissions::MediaLink;
use crate::schemas::{ApiResponse, AppState, NamedRef};
use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::{NaiveDate, NaiveDateTime};
use common::{BarChart, ChartPoint, MonthPoint, StatusCards};
use compute::schedule::{ScheduleStatus, StatusEvaluator};
use compute::trend::{monthly_buckets, trailing_months, TrendKind};
use model::entities::user::RoleLevel;
use model::entities::user_activity::FieldValue;
use model::entities::{tehsil_activity, user_activity};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};
use utoipa::{IntoParams, ToSchema};

const TREND_MONTHS: u32 = 12;
const TOP_DISTRICTS: usize = 10;
const RECENT_SUBMISSIONS: u64 = 3;
const IMAGE_EXTENSIONS: [&str; 4] = ["jpeg", "jpg", "png", "bmp"];

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecentSubmission {
    pub id: i32,
    pub tehsil_activity_id: i32,
    pub activity: Option<NamedRef>,
    pub district: Option<NamedRef>,
    pub tehsil: Option<NamedRef>,
    pub user: Option<NamedRef>,
    pub images: Vec<MediaLink>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub cards: StatusCards,
    pub pie: Vec<ChartPoint>,
    pub bar: BarChart,
    pub recent: Vec<RecentSubmission>,
    pub current_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct TrendQuery {
    pub district: Option<i32>,
    #[serde(rename = "type")]
    pub kind: Option<TrendKind>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrendResponse {
    pub title: String,
    pub district: Option<NamedRef>,
    pub points: Vec<MonthPoint>,
}

/// Card counts over the caller's visible tehsil activities.
pub async fn status_cards(
    db: &DatabaseConnection,
    caller: &Caller,
    evaluator: &StatusEvaluator,
) -> Result<StatusCards, DbErr> {
    let count = |condition: Condition| visible_instances(caller).filter(condition).count(db);
    Ok(StatusCards {
        scheduled: count(Condition::all()).await?,
        unassigned: count(evaluator.status_condition(ScheduleStatus::Unassigned)).await?,
        performed: count(evaluator.status_condition(ScheduleStatus::Performed)).await?,
        pending: count(evaluator.status_condition(ScheduleStatus::Pending)).await?,
        expired: count(evaluator.status_condition(ScheduleStatus::Expired)).await?,
    })
}

/// Performed counts grouped by `column`, largest first.
async fn performed_by(
    db: &DatabaseConnection,
    caller: &Caller,
    column: tehsil_activity::Column,
) -> Result<Vec<(i32, u64)>, DbErr> {
    let rows: Vec<(Option<i32>, i64)> = visible_instances(caller)
        .filter(tehsil_activity::Column::IsPerformed.eq(true))
        .select_only()
        .column(column)
        .column_as(Expr::col((tehsil_activity::Entity, tehsil_activity::Column::Id)).count(), "n")
        .group_by(column)
        .into_tuple()
        .all(db)
        .await?;
    let mut counts: Vec<(i32, u64)> = rows
        .into_iter()
        .filter_map(|(id, n)| id.map(|id| (id, n.max(0) as u64)))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    Ok(counts)
}

async fn bar_chart(db: &DatabaseConnection, caller: &Caller, cards: &StatusCards) -> Result<BarChart, DbErr> {
    match caller.level() {
        RoleLevel::Admin => {
            let mut counts = performed_by(db, caller, tehsil_activity::Column::DistrictId).await?;
            counts.truncate(TOP_DISTRICTS);
            let mut wanted = Wanted::default();
            for (id, _) in &counts {
                wanted.district(*id);
            }
            let names = Names::load(db, &wanted).await?;
            Ok(BarChart {
                title: "Top districts by performed activities".to_string(),
                data: counts
                    .into_iter()
                    .map(|(id, y)| ChartPoint {
                        name: Names::label(&names.district(id)),
                        y,
                    })
                    .collect(),
            })
        }
        RoleLevel::District | RoleLevel::CallCenter => {
            let counts = performed_by(db, caller, tehsil_activity::Column::TehsilId).await?;
            let mut wanted = Wanted::default();
            for (id, _) in &counts {
                wanted.tehsil(Some(*id));
            }
            let names = Names::load(db, &wanted).await?;
            Ok(BarChart {
                title: "Performed activities by tehsil".to_string(),
                data: counts
                    .into_iter()
                    .map(|(id, y)| ChartPoint {
                        name: Names::label(&names.tehsil(Some(id))),
                        y,
                    })
                    .collect(),
            })
        }
        RoleLevel::Tehsil => Ok(BarChart {
            title: "Activities by status".to_string(),
            data: cards.points(),
        }),
    }
}

fn is_image_key(key: &str) -> bool {
    key.rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image keys of a submission: multi-image fields in order, then single image uploads.
pub fn image_keys(values: &model::entities::user_activity::FieldValues) -> Vec<&str> {
    let mut keys = Vec::new();
    for value in values.0.values() {
        match value {
            FieldValue::Images(items) => keys.extend(items.iter().map(String::as_str)),
            FieldValue::File(key) if is_image_key(key) => keys.push(key.as_str()),
            _ => {}
        }
    }
    keys
}

/// Get the dashboard
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    tag = "dashboard",
    responses(
        (status = 200, description = "Dashboard retrieved successfully", body = ApiResponse<DashboardResponse>),
        (status = 403, description = "Not allowed", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_dashboard(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<ApiResponse<DashboardResponse>>> {
    trace!("Entering get_dashboard function");
    caller.require_permission(permissions::VIEW_DASHBOARD)?;
    let evaluator = compute::default_evaluator(None);

    let cards = status_cards(&state.db, &caller, &evaluator).await?;
    debug!("Dashboard cards: {:?}", cards);
    let bar = bar_chart(&state.db, &caller, &cards).await?;

    let recent_rows = user_activity::Entity::find()
        .filter(caller.scope().user_activities())
        .order_by_desc(user_activity::Column::Id)
        .limit(RECENT_SUBMISSIONS)
        .all(&state.db)
        .await?;
    let mut wanted = Wanted::default();
    for row in &recent_rows {
        wanted
            .district(row.district_id)
            .tehsil(row.tehsil_id)
            .activity(row.activity_id)
            .user(Some(row.user_id));
    }
    let names = Names::load(&state.db, &wanted).await?;
    let recent = recent_rows
        .into_iter()
        .map(|row| RecentSubmission {
            id: row.id,
            tehsil_activity_id: row.tehsil_activity_id,
            activity: names.activity(row.activity_id),
            district: names.district(row.district_id),
            tehsil: names.tehsil(row.tehsil_id),
            user: names.user(Some(row.user_id)),
            images: image_keys(&row.field_values)
                .into_iter()
                .map(|key| MediaLink::resolve(state.media.as_ref(), key))
                .collect(),
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse::ok(
        DashboardResponse {
            pie: cards.points(),
            cards,
            bar,
            recent,
            current_date: evaluator.today(),
        },
        "Dashboard retrieved successfully",
    )))
}

/// Get a monthly trend line
///
/// Counts the caller's visible tehsil activities of the requested kind over
/// the last twelve months. Performed activities are bucketed by the month
/// they were performed in, every other kind by creation month.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/trend",
    tag = "dashboard",
    params(TrendQuery),
    responses(
        (status = 200, description = "Trend retrieved successfully", body = ApiResponse<TrendResponse>),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 404, description = "District not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_trend(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<TrendQuery>,
) -> ApiResult<Json<ApiResponse<TrendResponse>>> {
    caller.require_permission(permissions::VIEW_DASHBOARD)?;
    let evaluator = compute::default_evaluator(None);
    let kind = query.kind.unwrap_or_default();

    let district = match query.district {
        Some(id) => {
            let district = find_district(&state.db, id).await?;
            caller.ensure_visible(Some(district.id), None)?;
            Some(NamedRef {
                id: district.id,
                name: district.name,
            })
        }
        None => None,
    };

    let first_month = trailing_months(evaluator.today(), TREND_MONTHS)
        .first()
        .and_then(|(year, month)| NaiveDate::from_ymd_opt(*year, *month, 1))
        .ok_or_else(|| ApiError::Internal("empty trend range".to_string()))?;
    let since = first_month.and_hms_opt(0, 0, 0).unwrap_or_default();

    let mut select = visible_instances(&caller).filter(kind.condition(&evaluator));
    if let Some(d) = &district {
        select = select.filter(tehsil_activity::Column::DistrictId.eq(d.id));
    }
    let dates: Vec<NaiveDate> = if kind.bucketed_by_performance() {
        let rows: Vec<Option<NaiveDateTime>> = select
            .filter(tehsil_activity::Column::PerformedAt.gte(since))
            .select_only()
            .column(tehsil_activity::Column::PerformedAt)
            .into_tuple()
            .all(&state.db)
            .await?;
        rows.into_iter().flatten().map(|at| at.date()).collect()
    } else {
        let rows: Vec<NaiveDateTime> = select
            .filter(tehsil_activity::Column::CreatedAt.gte(since))
            .select_only()
            .column(tehsil_activity::Column::CreatedAt)
            .into_tuple()
            .all(&state.db)
            .await?;
        rows.into_iter().map(|at| at.date()).collect()
    };
    debug!("Bucketing {} {} activities", dates.len(), kind.label());

    let title = match &district {
        Some(d) => format!("{} activities in {}", kind.label(), d.name),
        None => format!("{} activities", kind.label()),
    };
    Ok(Json(ApiResponse::ok(
        TrendResponse {
            title,
            district,
            points: monthly_buckets(evaluator.today(), TREND_MONTHS, dates),
        },
        "Trend retrieved successfully",
    )))
}
