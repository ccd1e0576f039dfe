pub use sea_orm_migration::prelude::*;

mod m20260101_000001_create_geography_and_users;
mod m20260101_000002_create_activity_catalogue;
mod m20260101_000003_create_schedules;
mod m20260101_000004_create_notifications_complaints_feedback;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_geography_and_users::Migration),
            Box::new(m20260101_000002_create_activity_catalogue::Migration),
            Box::new(m20260101_000003_create_schedules::Migration),
            Box::new(m20260101_000004_create_notifications_complaints_feedback::Migration),
        ]
    }
}
