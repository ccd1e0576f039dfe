use crate::caller::{permissions, Caller};
use crate::error::ApiResult;
use crate::handlers::dashboard::image_keys;
use crate::handlers::lookups::{Names, Wanted};
use crate::handlers::reports::day_range;
use crate::handlers::submissions::MediaLink;
use crate::schemas::{ApiResponse, AppState, NamedRef, Page};
use axum::{
    extract::{Query, State},
    response::Json,
};
use axum_valid::Valid;
use chrono::{NaiveDate, NaiveDateTime};
use common::PageRequest;
use model::entities::user_activity;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams, Validate)]
pub struct MediaQuery {
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub page_length: Option<u64>,
    pub district: Option<i32>,
    pub tehsil: Option<i32>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// The images of one submission.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MediaGroup {
    pub submission_id: i32,
    pub tehsil_activity_id: i32,
    pub activity: Option<NamedRef>,
    pub district: Option<NamedRef>,
    pub tehsil: Option<NamedRef>,
    pub images: Vec<MediaLink>,
    pub created_at: NaiveDateTime,
}

/// Image gallery of performed activities
///
/// Only submissions that carry at least one image are listed, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/media",
    tag = "reports",
    params(MediaQuery),
    responses(
        (status = 200, description = "Media retrieved successfully", body = ApiResponse<Page<MediaGroup>>),
        (status = 403, description = "Not allowed", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_media_gallery(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Query(query)): Valid<Query<MediaQuery>>,
) -> ApiResult<Json<ApiResponse<Page<MediaGroup>>>> {
    caller.require_any(&[
        permissions::VIEW_SCHEDULE,
        permissions::VIEW_DASHBOARD,
        permissions::LINE_LIST_REPORT,
    ])?;

    let mut condition = Condition::all().add(caller.scope().user_activities());
    if let Some(id) = query.district {
        condition = condition.add(user_activity::Column::DistrictId.eq(id));
    }
    if let Some(id) = query.tehsil {
        condition = condition.add(user_activity::Column::TehsilId.eq(id));
    }
    let (start, end) = day_range(query.from_date, query.to_date);
    if let Some(start) = start {
        condition = condition.add(user_activity::Column::CreatedAt.gte(start));
    }
    if let Some(end) = end {
        condition = condition.add(user_activity::Column::CreatedAt.lt(end));
    }

    // Images live inside the stored values, so filtering happens after loading.
    let with_images: Vec<user_activity::Model> = user_activity::Entity::find()
        .filter(condition)
        .order_by_desc(user_activity::Column::Id)
        .all(&state.db)
        .await?
        .into_iter()
        .filter(|row| !image_keys(&row.field_values).is_empty())
        .collect();

    let paging = PageRequest::new(query.page, query.page_length);
    let total = with_images.len() as u64;
    let rows: Vec<user_activity::Model> = with_images
        .into_iter()
        .skip((paging.index() * paging.page_length) as usize)
        .take(paging.page_length as usize)
        .collect();
    debug!("Gallery page {} has {} of {} submissions", paging.page, rows.len(), total);

    let mut wanted = Wanted::default();
    for row in &rows {
        wanted.district(row.district_id).tehsil(row.tehsil_id).activity(row.activity_id);
    }
    let names = Names::load(&state.db, &wanted).await?;
    let items = rows
        .into_iter()
        .map(|row| MediaGroup {
            submission_id: row.id,
            tehsil_activity_id: row.tehsil_activity_id,
            activity: names.activity(row.activity_id),
            district: names.district(row.district_id),
            tehsil: names.tehsil(row.tehsil_id),
            images: image_keys(&row.field_values)
                .into_iter()
                .map(|key| MediaLink::resolve(state.media.as_ref(), key))
                .collect(),
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse::ok(
        Page::new(items, paging, total),
        "Media retrieved successfully",
    )))
}
