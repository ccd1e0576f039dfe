//! Domain rules for field operations, independent of the HTTP layer.

pub mod error;
pub mod form;
pub mod schedule;
pub mod scope;
pub mod trend;

use chrono::{NaiveDate, Utc};
use schedule::StatusEvaluator;

/// Returns the evaluator used by request handlers.
///
/// Uses the provided date as "today", or the current UTC date if none is provided.
pub fn default_evaluator(today: Option<NaiveDate>) -> StatusEvaluator {
    StatusEvaluator::new(today.unwrap_or_else(|| Utc::now().date_naive()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, EntityTrait, QueryFilter, QuerySelect, Set};
    use chrono::Duration;
    use migration::{Migrator, MigratorTrait};
    use model::entities::{activity, district, district_activity, tehsil, tehsil_activity};
    use schedule::{ScheduleFacts, ScheduleStatus};

    #[test]
    fn default_evaluator_uses_given_day() {
        let day = NaiveDate::from_ymd_opt(2026, 6, 22).unwrap();
        assert_eq!(default_evaluator(Some(day)).today(), day);
    }

    /// The SQL status conditions select exactly the rows the evaluator classifies.
    #[tokio::test]
    async fn status_conditions_agree_with_evaluator() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await.unwrap();
        Migrator::up(&db, None).await.expect("Migrations failed.");

        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let now = today.and_hms_opt(9, 0, 0).unwrap();
        let evaluator = default_evaluator(Some(today));

        let d = district::ActiveModel {
            name: Set("Lahore".to_string()),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        let t = tehsil::ActiveModel {
            district_id: Set(d.id),
            name: Set("Cantt".to_string()),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        let a = activity::ActiveModel {
            name: Set("Seminar".to_string()),
            sort_order: Set(0),
            is_active: Set(true),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let windows = [(-20i64, -5i64), (-3, 3), (4, 9)];
        for (parent_from, parent_to) in windows {
            let parent = district_activity::ActiveModel {
                district_id: Set(d.id),
                activity_id: Set(a.id),
                from_date: Set(today + Duration::days(parent_from)),
                to_date: Set(today + Duration::days(parent_to)),
                created_by: Set(1),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&db)
            .await
            .unwrap();
            for own in [None, Some((-2i64, 1i64)), Some((-9, -1)), Some((2, 6))] {
                for (assigned, performed) in [(false, false), (true, false), (true, true)] {
                    tehsil_activity::ActiveModel {
                        district_activity_id: Set(parent.id),
                        district_id: Set(d.id),
                        tehsil_id: Set(Some(t.id)),
                        activity_id: Set(a.id),
                        from_date: Set(own.map(|(f, _)| today + Duration::days(f))),
                        to_date: Set(own.map(|(_, to)| today + Duration::days(to))),
                        is_assigned: Set(assigned),
                        is_performed: Set(performed),
                        created_at: Set(now),
                        ..Default::default()
                    }
                    .insert(&db)
                    .await
                    .unwrap();
                }
            }
        }

        let rows = tehsil_activity::Entity::find()
            .find_also_related(district_activity::Entity)
            .all(&db)
            .await
            .unwrap();
        assert_eq!(rows.len(), 36);

        for status in [
            ScheduleStatus::Unassigned,
            ScheduleStatus::Upcoming,
            ScheduleStatus::Pending,
            ScheduleStatus::Performed,
            ScheduleStatus::Expired,
        ] {
            let mut expected: Vec<i32> = rows
                .iter()
                .filter(|(row, parent)| {
                    evaluator.status(&ScheduleFacts::for_tehsil_activity(row, parent.as_ref())) == status
                })
                .map(|(row, _)| row.id)
                .collect();
            expected.sort();

            let mut selected: Vec<i32> = tehsil_activity::Entity::find()
                .inner_join(district_activity::Entity)
                .filter(evaluator.status_condition(status))
                .select_only()
                .column(tehsil_activity::Column::Id)
                .into_tuple()
                .all(&db)
                .await
                .unwrap();
            selected.sort();

            assert_eq!(selected, expected, "status {status:?}");
        }
    }
}
