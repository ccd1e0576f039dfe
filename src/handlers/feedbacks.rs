use crate::caller::{permissions, Caller};
use crate::error::{ApiError, ApiResult};
use crate::handlers::lookups::{Names, Wanted};
use crate::schemas::{ApiResponse, AppState, NamedRef, Page};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{NaiveDateTime, Utc};
use common::PageRequest;
use model::entities::feedback;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams, Validate)]
pub struct FeedbackQuery {
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub page_length: Option<u64>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateFeedbackRequest {
    #[validate(length(min = 3, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedbackResponse {
    pub id: i32,
    pub user: Option<NamedRef>,
    pub title: String,
    pub description: String,
    pub created_at: NaiveDateTime,
}

/// List feedback from users in the caller's area
#[utoipa::path(
    get,
    path = "/api/v1/feedbacks",
    tag = "complaints",
    params(FeedbackQuery),
    responses(
        (status = 200, description = "Feedbacks retrieved successfully", body = ApiResponse<Page<FeedbackResponse>>),
        (status = 403, description = "Not allowed", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_feedbacks(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Query(query)): Valid<Query<FeedbackQuery>>,
) -> ApiResult<Json<ApiResponse<Page<FeedbackResponse>>>> {
    caller.require(permissions::VIEW_FEEDBACKS)?;

    let mut condition = Condition::all().add(caller.scope().feedbacks());
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(
            Condition::any()
                .add(feedback::Column::Title.contains(search))
                .add(feedback::Column::Description.contains(search)),
        );
    }

    let paging = PageRequest::new(query.page, query.page_length);
    let paginator = feedback::Entity::find()
        .filter(condition)
        .order_by_desc(feedback::Column::Id)
        .paginate(&state.db, paging.page_length);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(paging.index()).await?;
    debug!("Retrieved {} of {} feedbacks", rows.len(), total);

    let mut wanted = Wanted::default();
    for row in &rows {
        wanted.user(Some(row.user_id));
    }
    let names = Names::load(&state.db, &wanted).await?;
    let items = rows
        .into_iter()
        .map(|row| FeedbackResponse {
            id: row.id,
            user: names.user(Some(row.user_id)),
            title: row.title,
            description: row.description,
            created_at: row.created_at,
        })
        .collect();
    Ok(Json(ApiResponse::ok(
        Page::new(items, paging, total),
        "Feedbacks retrieved successfully",
    )))
}

/// Leave feedback
#[utoipa::path(
    post,
    path = "/api/v1/feedbacks",
    tag = "complaints",
    request_body = CreateFeedbackRequest,
    responses(
        (status = 201, description = "Feedback created successfully", body = ApiResponse<FeedbackResponse>),
        (status = 422, description = "Invalid request", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_feedback(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Json(request)): Valid<Json<CreateFeedbackRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<FeedbackResponse>>)> {
    let created = feedback::ActiveModel {
        user_id: Set(caller.id()),
        title: Set(request.title.trim().to_string()),
        description: Set(request.description),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .map_err(ApiError::from)?;
    info!("Feedback created with ID: {}", created.id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            FeedbackResponse {
                id: created.id,
                user: Some(NamedRef {
                    id: caller.id(),
                    name: caller.user.name.clone(),
                }),
                title: created.title,
                description: created.description,
                created_at: created.created_at,
            },
            "Feedback created successfully",
        )),
    ))
}
