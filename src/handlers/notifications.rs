use crate::caller::Caller;
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, Page};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use axum_valid::Valid;
use chrono::{NaiveDateTime, Utc};
use common::PageRequest;
use model::entities::notification;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams, Validate)]
pub struct NotificationQuery {
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub page_length: Option<u64>,
    /// Only unread notifications
    pub unread: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationResponse {
    pub id: i32,
    pub kind: String,
    pub title: String,
    pub body: String,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    pub read_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl From<notification::Model> for NotificationResponse {
    fn from(n: notification::Model) -> Self {
        Self {
            id: n.id,
            kind: n.kind,
            title: n.title,
            body: n.body,
            data: n.data,
            read_at: n.read_at,
            created_at: n.created_at,
        }
    }
}

/// List the caller's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "notifications",
    params(NotificationQuery),
    responses(
        (status = 200, description = "Notifications retrieved successfully", body = ApiResponse<Page<NotificationResponse>>),
        (status = 401, description = "Unknown caller", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_notifications(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Query(query)): Valid<Query<NotificationQuery>>,
) -> ApiResult<Json<ApiResponse<Page<NotificationResponse>>>> {
    let mut select = notification::Entity::find()
        .filter(notification::Column::UserId.eq(caller.id()))
        .order_by_desc(notification::Column::Id);
    if query.unread.unwrap_or(false) {
        select = select.filter(notification::Column::ReadAt.is_null());
    }

    let paging = PageRequest::new(query.page, query.page_length);
    let paginator = select.paginate(&state.db, paging.page_length);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(paging.index()).await?;
    debug!("Retrieved {} of {} notifications for user {}", rows.len(), total, caller.id());

    let items = rows.into_iter().map(NotificationResponse::from).collect();
    Ok(Json(ApiResponse::ok(
        Page::new(items, paging, total),
        "Notifications retrieved successfully",
    )))
}

/// Mark one of the caller's notifications as read
#[utoipa::path(
    post,
    path = "/api/v1/notifications/{notification_id}/read",
    tag = "notifications",
    params(("notification_id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked as read", body = ApiResponse<NotificationResponse>),
        (status = 404, description = "Notification not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    caller: Caller,
    Path(notification_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<NotificationResponse>>> {
    // Someone else's notification is reported as missing.
    let existing = notification::Entity::find_by_id(notification_id)
        .filter(notification::Column::UserId.eq(caller.id()))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification", notification_id))?;

    let updated = if existing.read_at.is_some() {
        existing
    } else {
        let mut active = existing.into_active_model();
        active.read_at = Set(Some(Utc::now().naive_utc()));
        active.update(&state.db).await?
    };

    info!("Notification {} marked as read", notification_id);
    Ok(Json(ApiResponse::ok(
        NotificationResponse::from(updated),
        "Notification marked as read",
    )))
}
