//! SeaORM entities for the field-operations schema.
//!
//! Geography (`district`, `tehsil`), people and their reach (`user` plus the
//! `user_*` join tables), the activity catalogue with its dynamic form
//! definition, and the schedule tree
//! `district_activity` → `tehsil_activity` → `user_activity`.

pub mod activity;
pub mod activity_field;
pub mod activity_field_assignment;
pub mod activity_field_option;
pub mod activity_frequency;
pub mod complaint;
pub mod complaint_history;
pub mod district;
pub mod district_activity;
pub mod feedback;
pub mod frequency;
pub mod notification;
pub mod tehsil;
pub mod tehsil_activity;
pub mod user;
pub mod user_activity;
pub mod user_district;
pub mod user_permission;
pub mod user_tehsil;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::activity::Entity as Activity;
    pub use super::activity_field::Entity as ActivityField;
    pub use super::activity_field_assignment::Entity as ActivityFieldAssignment;
    pub use super::activity_field_option::Entity as ActivityFieldOption;
    pub use super::activity_frequency::Entity as ActivityFrequency;
    pub use super::complaint::Entity as Complaint;
    pub use super::complaint_history::Entity as ComplaintHistory;
    pub use super::district::Entity as District;
    pub use super::district_activity::Entity as DistrictActivity;
    pub use super::feedback::Entity as Feedback;
    pub use super::frequency::Entity as Frequency;
    pub use super::notification::Entity as Notification;
    pub use super::tehsil::Entity as Tehsil;
    pub use super::tehsil_activity::Entity as TehsilActivity;
    pub use super::user::Entity as User;
    pub use super::user_activity::Entity as UserActivity;
    pub use super::user_district::Entity as UserDistrict;
    pub use super::user_permission::Entity as UserPermission;
    pub use super::user_tehsil::Entity as UserTehsil;
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use chrono::{NaiveDate, Utc};
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{
        ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
        EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, Set,
    };

    use super::*;
    use prelude::*;

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        let db = Database::connect("sqlite::memory:").await?;
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;
        Migrator::up(&db, None).await.expect("Migrations failed.");
        Ok(db)
    }

    fn now() -> chrono::NaiveDateTime {
        Utc::now().naive_utc()
    }

    #[tokio::test]
    async fn test_schedule_tree_integration() -> Result<(), DbErr> {
        let db = setup_db().await?;

        let lahore = district::ActiveModel {
            name: Set("Lahore".to_string()),
            franchising_phase_no: Set(Some(1)),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let model_town = tehsil::ActiveModel {
            district_id: Set(lahore.id),
            name: Set("Model Town".to_string()),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let officer = user::ActiveModel {
            username: Set("tpwo.modeltown".to_string()),
            name: Set("Tehsil Officer".to_string()),
            role_name: Set("TPWO".to_string()),
            role_level: Set(user::RoleLevel::Tehsil),
            is_active: Set(true),
            created_at: Set(now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        user_tehsil::ActiveModel {
            user_id: Set(officer.id),
            tehsil_id: Set(model_town.id),
        }
        .insert(&db)
        .await?;

        let meeting = activity::ActiveModel {
            name: Set("Community Meeting".to_string()),
            sort_order: Set(1),
            is_active: Set(true),
            created_at: Set(now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let schedule = district_activity::ActiveModel {
            district_id: Set(lahore.id),
            activity_id: Set(meeting.id),
            from_date: Set(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
            to_date: Set(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()),
            is_unscheduled: Set(false),
            created_by: Set(officer.id),
            created_at: Set(now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let header = tehsil_activity::ActiveModel {
            district_activity_id: Set(schedule.id),
            district_id: Set(lahore.id),
            tehsil_id: Set(None),
            activity_id: Set(meeting.id),
            is_assigned: Set(true),
            created_at: Set(now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;
        assert!(header.is_header());

        let instance = tehsil_activity::ActiveModel {
            district_activity_id: Set(schedule.id),
            district_id: Set(lahore.id),
            tehsil_id: Set(Some(model_town.id)),
            activity_id: Set(meeting.id),
            created_at: Set(now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;
        assert!(!instance.is_assigned);
        assert!(!instance.is_performed);

        let mut values = BTreeMap::new();
        values.insert(
            "participants".to_string(),
            user_activity::FieldValue::Integer(42),
        );
        values.insert(
            "photos".to_string(),
            user_activity::FieldValue::Images(vec![
                "files/1/a.png".to_string(),
                "files/1/b.png".to_string(),
            ]),
        );

        user_activity::ActiveModel {
            tehsil_activity_id: Set(instance.id),
            district_id: Set(lahore.id),
            tehsil_id: Set(Some(model_town.id)),
            activity_id: Set(meeting.id),
            user_id: Set(officer.id),
            field_values: Set(user_activity::FieldValues(values.clone())),
            is_unscheduled: Set(false),
            created_at: Set(now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        // Typed values survive the JSON column.
        let stored = UserActivity::find()
            .filter(user_activity::Column::TehsilActivityId.eq(instance.id))
            .one(&db)
            .await?
            .expect("submission stored");
        assert_eq!(stored.field_values.0, values);
        assert_eq!(
            stored.field_values.media_keys(),
            vec!["files/1/a.png", "files/1/b.png"]
        );

        let tehsils = schedule.find_related(TehsilActivity).all(&db).await?;
        assert_eq!(tehsils.len(), 2);

        // Deleting the schedule removes the whole tree.
        schedule.delete(&db).await?;
        assert_eq!(TehsilActivity::find().count(&db).await?, 0);
        assert_eq!(UserActivity::find().count(&db).await?, 0);
        assert_eq!(District::find().count(&db).await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_field_options_and_assignments() -> Result<(), DbErr> {
        let db = setup_db().await?;

        let gender = activity_field::ActiveModel {
            title: Set("Audience".to_string()),
            name: Set("audience".to_string()),
            field_type: Set(activity_field::FieldKind::Checkbox),
            is_required: Set(true),
            created_at: Set(now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        for (label, value) in [("Men", "men"), ("Women", "women")] {
            activity_field_option::ActiveModel {
                activity_field_id: Set(gender.id),
                option: Set(label.to_string()),
                value: Set(value.to_string()),
                ..Default::default()
            }
            .insert(&db)
            .await?;
        }

        let walk = activity::ActiveModel {
            name: Set("Awareness Walk".to_string()),
            sort_order: Set(2),
            is_active: Set(true),
            created_at: Set(now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        activity_field_assignment::ActiveModel {
            activity_id: Set(walk.id),
            activity_field_id: Set(gender.id),
            position: Set(0),
        }
        .insert(&db)
        .await?;

        let fields = walk.find_related(ActivityField).all(&db).await?;
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_type, activity_field::FieldKind::Checkbox);
        assert!(fields[0].field_type.requires_options());

        let options = gender.find_related(ActivityFieldOption).all(&db).await?;
        assert_eq!(options.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_join_rows_resolve_both_sides() -> Result<(), DbErr> {
        let db = setup_db().await?;

        let weekly = frequency::ActiveModel {
            name: Set("Weekly".to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await?;
        let seminar = activity::ActiveModel {
            name: Set("Seminar".to_string()),
            sort_order: Set(1),
            is_active: Set(true),
            created_at: Set(now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;
        let link = activity_frequency::ActiveModel {
            activity_id: Set(seminar.id),
            frequency_id: Set(weekly.id),
        }
        .insert(&db)
        .await?;

        let owner = link.find_related(Activity).one(&db).await?;
        assert_eq!(owner.map(|a| a.id), Some(seminar.id));
        let cadence = link.find_related(Frequency).one(&db).await?;
        assert_eq!(cadence.map(|f| f.name), Some("Weekly".to_string()));
        assert_eq!(seminar.find_related(Frequency).count(&db).await?, 1);

        let venue = activity_field::ActiveModel {
            title: Set("Venue".to_string()),
            name: Set("venue".to_string()),
            field_type: Set(activity_field::FieldKind::Text),
            is_required: Set(false),
            created_at: Set(now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;
        let slot = activity_field_assignment::ActiveModel {
            activity_id: Set(seminar.id),
            activity_field_id: Set(venue.id),
            position: Set(0),
        }
        .insert(&db)
        .await?;
        assert_eq!(slot.find_related(ActivityField).one(&db).await?.map(|f| f.id), Some(venue.id));
        assert_eq!(slot.find_related(Activity).one(&db).await?.map(|a| a.id), Some(seminar.id));

        let lahore = district::ActiveModel {
            name: Set("Lahore".to_string()),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&db)
        .await?;
        let cantt = tehsil::ActiveModel {
            district_id: Set(lahore.id),
            name: Set("Cantt".to_string()),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&db)
        .await?;
        let officer = user::ActiveModel {
            username: Set("tpwo".to_string()),
            name: Set("Officer".to_string()),
            role_name: Set("TPWO".to_string()),
            role_level: Set(user::RoleLevel::Tehsil),
            is_active: Set(true),
            created_at: Set(now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;
        let district_grant = user_district::ActiveModel {
            user_id: Set(officer.id),
            district_id: Set(lahore.id),
        }
        .insert(&db)
        .await?;
        let tehsil_grant = user_tehsil::ActiveModel {
            user_id: Set(officer.id),
            tehsil_id: Set(cantt.id),
        }
        .insert(&db)
        .await?;

        assert_eq!(district_grant.find_related(User).one(&db).await?.map(|u| u.id), Some(officer.id));
        assert_eq!(tehsil_grant.find_related(User).one(&db).await?.map(|u| u.id), Some(officer.id));
        assert_eq!(officer.find_related(District).count(&db).await?, 1);

        Ok(())
    }
}
