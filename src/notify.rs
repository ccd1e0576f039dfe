//! In-app notifications raised by schedule lifecycle events.
//!
//! Notifications are written on the same connection as the change that
//! raised them, so inside a transaction they commit or roll back with it.

use chrono::{NaiveDate, Utc};
use model::entities::user::RoleLevel;
use model::entities::{notification, user, user_district, user_permission, user_tehsil};
use sea_orm::sea_query::Query;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect, Set};
use serde_json::json;
use tracing::{debug, trace};

use crate::caller::permissions;

#[derive(Debug, Clone)]
pub enum Event {
    /// A district received a new schedule.
    ScheduleCreated {
        district_activity_id: i32,
        district_id: i32,
        activity_name: String,
        from_date: NaiveDate,
        to_date: NaiveDate,
    },
    /// A tehsil instance was given its window.
    ActivityAssigned {
        tehsil_activity_id: i32,
        tehsil_id: i32,
        activity_name: String,
        from_date: NaiveDate,
        to_date: NaiveDate,
    },
    /// A submission was recorded.
    ActivityPerformed {
        tehsil_activity_id: i32,
        user_activity_id: i32,
        district_id: i32,
        activity_name: String,
        performed_by: String,
    },
}

impl Event {
    fn kind(&self) -> &'static str {
        match self {
            Event::ScheduleCreated { .. } => "schedule_created",
            Event::ActivityAssigned { .. } => "activity_assigned",
            Event::ActivityPerformed { .. } => "activity_performed",
        }
    }

    fn title(&self) -> String {
        match self {
            Event::ScheduleCreated { activity_name, .. } => format!("New schedule: {}", activity_name),
            Event::ActivityAssigned { activity_name, .. } => format!("Activity assigned: {}", activity_name),
            Event::ActivityPerformed { activity_name, .. } => format!("Activity performed: {}", activity_name),
        }
    }

    fn body(&self) -> String {
        match self {
            Event::ScheduleCreated { from_date, to_date, .. } => format!(
                "A new activity has been scheduled from {} to {}. Assign it to your tehsils.",
                from_date, to_date
            ),
            Event::ActivityAssigned { from_date, to_date, .. } => format!(
                "An activity has been assigned to your tehsil from {} to {}.",
                from_date, to_date
            ),
            Event::ActivityPerformed { performed_by, .. } => {
                format!("{} has submitted the activity.", performed_by)
            }
        }
    }

    fn data(&self) -> serde_json::Value {
        match self {
            Event::ScheduleCreated { district_activity_id, district_id, .. } => {
                json!({ "district_activity_id": district_activity_id, "district_id": district_id })
            }
            Event::ActivityAssigned { tehsil_activity_id, tehsil_id, .. } => {
                json!({ "tehsil_activity_id": tehsil_activity_id, "tehsil_id": tehsil_id })
            }
            Event::ActivityPerformed { tehsil_activity_id, user_activity_id, district_id, .. } => json!({
                "tehsil_activity_id": tehsil_activity_id,
                "user_activity_id": user_activity_id,
                "district_id": district_id,
            }),
        }
    }
}

fn holding(permission: &str) -> sea_orm::sea_query::SelectStatement {
    Query::select()
        .column(user_permission::Column::UserId)
        .from(user_permission::Entity)
        .and_where(user_permission::Column::Permission.eq(permission))
        .to_owned()
}

async fn district_users_with<C: ConnectionTrait>(db: &C, district_id: i32, permission: &str) -> Result<Vec<i32>, DbErr> {
    user::Entity::find()
        .select_only()
        .column(user::Column::Id)
        .filter(user::Column::IsActive.eq(true))
        .filter(
            user::Column::Id.in_subquery(
                Query::select()
                    .column(user_district::Column::UserId)
                    .from(user_district::Entity)
                    .and_where(user_district::Column::DistrictId.eq(district_id))
                    .to_owned(),
            ),
        )
        .filter(user::Column::Id.in_subquery(holding(permission)))
        .into_tuple()
        .all(db)
        .await
}

async fn tehsil_users_with<C: ConnectionTrait>(db: &C, tehsil_id: i32, permission: &str) -> Result<Vec<i32>, DbErr> {
    user::Entity::find()
        .select_only()
        .column(user::Column::Id)
        .filter(user::Column::IsActive.eq(true))
        .filter(
            user::Column::Id.in_subquery(
                Query::select()
                    .column(user_tehsil::Column::UserId)
                    .from(user_tehsil::Entity)
                    .and_where(user_tehsil::Column::TehsilId.eq(tehsil_id))
                    .to_owned(),
            ),
        )
        .filter(user::Column::Id.in_subquery(holding(permission)))
        .into_tuple()
        .all(db)
        .await
}

async fn admins_with<C: ConnectionTrait>(db: &C, permission: &str) -> Result<Vec<i32>, DbErr> {
    user::Entity::find()
        .select_only()
        .column(user::Column::Id)
        .filter(user::Column::IsActive.eq(true))
        .filter(user::Column::RoleLevel.eq(RoleLevel::Admin))
        .filter(user::Column::Id.in_subquery(holding(permission)))
        .into_tuple()
        .all(db)
        .await
}

async fn recipients<C: ConnectionTrait>(db: &C, event: &Event) -> Result<Vec<i32>, DbErr> {
    let mut ids = match event {
        Event::ScheduleCreated { district_id, .. } => {
            district_users_with(db, *district_id, permissions::ASSIGN_TO_TEHSILS).await?
        }
        Event::ActivityAssigned { tehsil_id, .. } => {
            tehsil_users_with(db, *tehsil_id, permissions::PERFORM).await?
        }
        Event::ActivityPerformed { district_id, .. } => {
            let mut ids = district_users_with(db, *district_id, permissions::ASSIGN_TO_TEHSILS).await?;
            ids.extend(admins_with(db, permissions::CREATE_SCHEDULE).await?);
            ids
        }
    };
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Queue `event` for everyone who should hear about it. Returns how many
/// notifications were written.
pub async fn notify<C: ConnectionTrait>(db: &C, event: &Event) -> Result<usize, DbErr> {
    let ids = recipients(db, event).await?;
    if ids.is_empty() {
        trace!("No recipients for {} notification", event.kind());
        return Ok(0);
    }

    let now = Utc::now().naive_utc();
    let (title, body, data) = (event.title(), event.body(), event.data());
    let rows = ids.iter().map(|user_id| notification::ActiveModel {
        user_id: Set(*user_id),
        kind: Set(event.kind().to_string()),
        title: Set(title.clone()),
        body: Set(body.clone()),
        data: Set(data.clone()),
        read_at: Set(None),
        created_at: Set(now),
        ..Default::default()
    });
    notification::Entity::insert_many(rows).exec(db).await?;

    debug!("Queued {} {} notifications", ids.len(), event.kind());
    Ok(ids.len())
}
