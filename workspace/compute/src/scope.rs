//! Role-scoped visibility.
//!
//! A row is visible when the caller is unrestricted, or when its district is
//! one of the caller's districts, or when its tehsil is one of the caller's
//! tehsils. Every listing, count and lookup goes through [`Scope`]; request
//! filters are ANDed on top and can only narrow what the scope admits.

use std::collections::BTreeSet;

use model::entities::{
    complaint, district, district_activity, feedback, tehsil, tehsil_activity, user_activity,
    user_district, user_tehsil,
};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{ColumnTrait, Condition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Admin-level callers see everything.
    All,
    Restricted {
        districts: BTreeSet<i32>,
        tehsils: BTreeSet<i32>,
    },
}

impl Scope {
    pub fn restricted(
        districts: impl IntoIterator<Item = i32>,
        tehsils: impl IntoIterator<Item = i32>,
    ) -> Self {
        Scope::Restricted {
            districts: districts.into_iter().collect(),
            tehsils: tehsils.into_iter().collect(),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Scope::All)
    }

    /// The single visibility predicate.
    pub fn allows(&self, district_id: Option<i32>, tehsil_id: Option<i32>) -> bool {
        match self {
            Scope::All => true,
            Scope::Restricted { districts, tehsils } => {
                district_id.is_some_and(|d| districts.contains(&d))
                    || tehsil_id.is_some_and(|t| tehsils.contains(&t))
            }
        }
    }

    pub fn districts(&self) -> Option<&BTreeSet<i32>> {
        match self {
            Scope::All => None,
            Scope::Restricted { districts, .. } => Some(districts),
        }
    }

    pub fn tehsils(&self) -> Option<&BTreeSet<i32>> {
        match self {
            Scope::All => None,
            Scope::Restricted { tehsils, .. } => Some(tehsils),
        }
    }

    /// The predicate over any table carrying district and tehsil columns.
    pub fn on_columns(&self, district_col: impl ColumnTrait, tehsil_col: impl ColumnTrait) -> Condition {
        match self {
            Scope::All => Condition::all(),
            Scope::Restricted { districts, tehsils } => {
                let mut any = Condition::any();
                if !districts.is_empty() {
                    any = any.add(district_col.is_in(districts.iter().copied()));
                }
                if !tehsils.is_empty() {
                    any = any.add(tehsil_col.is_in(tehsils.iter().copied()));
                }
                admit_nothing_if_empty(any, districts.is_empty() && tehsils.is_empty())
            }
        }
    }

    pub fn tehsil_activities(&self) -> Condition {
        self.on_columns(
            tehsil_activity::Column::DistrictId,
            tehsil_activity::Column::TehsilId,
        )
    }

    pub fn user_activities(&self) -> Condition {
        self.on_columns(user_activity::Column::DistrictId, user_activity::Column::TehsilId)
    }

    pub fn complaints(&self) -> Condition {
        self.on_columns(complaint::Column::DistrictId, complaint::Column::TehsilId)
    }

    /// District schedules are visible through their district, or through any
    /// of their tehsil instances.
    pub fn district_activities(&self) -> Condition {
        match self {
            Scope::All => Condition::all(),
            Scope::Restricted { districts, tehsils } => {
                let mut any = Condition::any();
                if !districts.is_empty() {
                    any = any.add(district_activity::Column::DistrictId.is_in(districts.iter().copied()));
                }
                if !tehsils.is_empty() {
                    any = any.add(
                        district_activity::Column::Id.in_subquery(
                            Query::select()
                                .column(tehsil_activity::Column::DistrictActivityId)
                                .from(tehsil_activity::Entity)
                                .and_where(tehsil_activity::Column::TehsilId.is_in(tehsils.iter().copied()))
                                .to_owned(),
                        ),
                    );
                }
                admit_nothing_if_empty(any, districts.is_empty() && tehsils.is_empty())
            }
        }
    }

    /// Districts a caller may pick from: their own, or those containing their tehsils.
    pub fn district_rows(&self) -> Condition {
        match self {
            Scope::All => Condition::all(),
            Scope::Restricted { districts, tehsils } => {
                let mut any = Condition::any();
                if !districts.is_empty() {
                    any = any.add(district::Column::Id.is_in(districts.iter().copied()));
                }
                if !tehsils.is_empty() {
                    any = any.add(
                        district::Column::Id.in_subquery(
                            Query::select()
                                .column(tehsil::Column::DistrictId)
                                .from(tehsil::Entity)
                                .and_where(tehsil::Column::Id.is_in(tehsils.iter().copied()))
                                .to_owned(),
                        ),
                    );
                }
                admit_nothing_if_empty(any, districts.is_empty() && tehsils.is_empty())
            }
        }
    }

    pub fn tehsil_rows(&self) -> Condition {
        self.on_columns(tehsil::Column::DistrictId, tehsil::Column::Id)
    }

    /// Feedback is visible along its author's geographic reach.
    pub fn feedbacks(&self) -> Condition {
        match self {
            Scope::All => Condition::all(),
            Scope::Restricted { districts, tehsils } => {
                let mut any = Condition::any();
                if !districts.is_empty() {
                    any = any.add(
                        feedback::Column::UserId.in_subquery(
                            Query::select()
                                .column(user_district::Column::UserId)
                                .from(user_district::Entity)
                                .and_where(user_district::Column::DistrictId.is_in(districts.iter().copied()))
                                .to_owned(),
                        ),
                    );
                }
                if !tehsils.is_empty() {
                    any = any.add(
                        feedback::Column::UserId.in_subquery(
                            Query::select()
                                .column(user_tehsil::Column::UserId)
                                .from(user_tehsil::Entity)
                                .and_where(user_tehsil::Column::TehsilId.is_in(tehsils.iter().copied()))
                                .to_owned(),
                        ),
                    );
                }
                admit_nothing_if_empty(any, districts.is_empty() && tehsils.is_empty())
            }
        }
    }
}

fn admit_nothing_if_empty(condition: Condition, empty: bool) -> Condition {
    if empty {
        Condition::all().add(Expr::val(1).eq(0))
    } else {
        condition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{
        ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, Set,
    };

    #[test]
    fn restricted_scope_follows_the_predicate() {
        let scope = Scope::restricted([1], [20]);
        assert!(scope.allows(Some(1), None));
        assert!(scope.allows(Some(1), Some(99)));
        assert!(scope.allows(Some(2), Some(20)));
        assert!(!scope.allows(Some(2), Some(21)));
        assert!(!scope.allows(None, None));
        assert!(Scope::All.allows(None, None));
    }

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await.unwrap();
        Migrator::up(&db, None).await.expect("Migrations failed.");
        db
    }

    async fn seed_schedule(db: &DatabaseConnection, district_name: &str, tehsil_names: &[&str]) -> (i32, Vec<i32>) {
        let now = Utc::now().naive_utc();
        let d = model::entities::district::ActiveModel {
            name: Set(district_name.to_string()),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();

        let activity = model::entities::activity::ActiveModel {
            name: Set(format!("Meeting {district_name}")),
            sort_order: Set(0),
            is_active: Set(true),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();

        let schedule = district_activity::ActiveModel {
            district_id: Set(d.id),
            activity_id: Set(activity.id),
            from_date: Set(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
            to_date: Set(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()),
            created_by: Set(1),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();

        let mut tehsil_ids = Vec::new();
        for name in tehsil_names {
            let t = tehsil::ActiveModel {
                district_id: Set(d.id),
                name: Set(name.to_string()),
                is_active: Set(true),
                ..Default::default()
            }
            .insert(db)
            .await
            .unwrap();
            tehsil_activity::ActiveModel {
                district_activity_id: Set(schedule.id),
                district_id: Set(d.id),
                tehsil_id: Set(Some(t.id)),
                activity_id: Set(activity.id),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await
            .unwrap();
            tehsil_ids.push(t.id);
        }
        (d.id, tehsil_ids)
    }

    #[tokio::test]
    async fn district_scope_hides_foreign_rows_even_when_filtered_for() {
        let db = setup_db().await;
        let (lahore, _) = seed_schedule(&db, "Lahore", &["Model Town", "Cantt"]).await;
        let (multan, _) = seed_schedule(&db, "Multan", &["Shujabad"]).await;

        let scope = Scope::restricted([lahore], []);
        let visible = tehsil_activity::Entity::find()
            .filter(scope.tehsil_activities())
            .all(&db)
            .await
            .unwrap();
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|r| r.district_id == lahore));

        // An explicit filter for a foreign district is intersected, not substituted.
        let filtered = tehsil_activity::Entity::find()
            .filter(scope.tehsil_activities())
            .filter(tehsil_activity::Column::DistrictId.eq(multan))
            .all(&db)
            .await
            .unwrap();
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn tehsil_scope_reaches_parent_schedule() {
        let db = setup_db().await;
        let (_, tehsils) = seed_schedule(&db, "Lahore", &["Model Town", "Cantt"]).await;
        seed_schedule(&db, "Multan", &["Shujabad"]).await;

        let scope = Scope::restricted([], [tehsils[0]]);
        let rows = tehsil_activity::Entity::find()
            .filter(scope.tehsil_activities())
            .all(&db)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tehsil_id, Some(tehsils[0]));

        let schedules = district_activity::Entity::find()
            .filter(scope.district_activities())
            .all(&db)
            .await
            .unwrap();
        assert_eq!(schedules.len(), 1);

        let districts = district::Entity::find()
            .filter(scope.district_rows())
            .all(&db)
            .await
            .unwrap();
        assert_eq!(districts.len(), 1);
        assert_eq!(districts[0].name, "Lahore");
    }

    #[tokio::test]
    async fn empty_restricted_scope_admits_nothing() {
        let db = setup_db().await;
        seed_schedule(&db, "Lahore", &["Model Town"]).await;

        let scope = Scope::restricted([], []);
        let rows = tehsil_activity::Entity::find()
            .filter(scope.tehsil_activities())
            .all(&db)
            .await
            .unwrap();
        assert!(rows.is_empty());

        let all = tehsil_activity::Entity::find()
            .filter(Scope::All.tehsil_activities())
            .all(&db)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }
}
