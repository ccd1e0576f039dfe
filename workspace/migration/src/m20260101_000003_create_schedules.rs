use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260101_000001_create_geography_and_users::{Districts, Tehsils, Users};
use crate::m20260101_000002_create_activity_catalogue::{Activities, Frequencies};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DistrictActivities::Table)
                    .if_not_exists()
                    .col(pk_auto(DistrictActivities::Id))
                    .col(integer(DistrictActivities::DistrictId))
                    .col(integer(DistrictActivities::ActivityId))
                    .col(integer_null(DistrictActivities::FrequencyId))
                    .col(date(DistrictActivities::FromDate))
                    .col(date(DistrictActivities::ToDate))
                    .col(text_null(DistrictActivities::Description))
                    .col(boolean(DistrictActivities::IsUnscheduled).default(false))
                    .col(integer(DistrictActivities::CreatedBy))
                    .col(integer_null(DistrictActivities::UpdatedBy))
                    .col(date_time(DistrictActivities::CreatedAt))
                    .col(date_time_null(DistrictActivities::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_district_activity_district")
                            .from(DistrictActivities::Table, DistrictActivities::DistrictId)
                            .to(Districts::Table, Districts::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_district_activity_activity")
                            .from(DistrictActivities::Table, DistrictActivities::ActivityId)
                            .to(Activities::Table, Activities::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_district_activity_frequency")
                            .from(DistrictActivities::Table, DistrictActivities::FrequencyId)
                            .to(Frequencies::Table, Frequencies::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TehsilActivities::Table)
                    .if_not_exists()
                    .col(pk_auto(TehsilActivities::Id))
                    .col(integer(TehsilActivities::DistrictActivityId))
                    .col(integer(TehsilActivities::DistrictId))
                    .col(integer_null(TehsilActivities::TehsilId))
                    .col(integer(TehsilActivities::ActivityId))
                    .col(integer_null(TehsilActivities::FrequencyId))
                    .col(date_null(TehsilActivities::FromDate))
                    .col(date_null(TehsilActivities::ToDate))
                    .col(boolean(TehsilActivities::IsAssigned).default(false))
                    .col(date_time_null(TehsilActivities::AssignedAt))
                    .col(boolean(TehsilActivities::IsPerformed).default(false))
                    .col(date_time_null(TehsilActivities::PerformedAt))
                    .col(integer_null(TehsilActivities::PerformedBy))
                    .col(boolean(TehsilActivities::IsUnscheduled).default(false))
                    .col(date_time(TehsilActivities::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tehsil_activity_district_activity")
                            .from(TehsilActivities::Table, TehsilActivities::DistrictActivityId)
                            .to(DistrictActivities::Table, DistrictActivities::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tehsil_activity_tehsil")
                            .from(TehsilActivities::Table, TehsilActivities::TehsilId)
                            .to(Tehsils::Table, Tehsils::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tehsil_activities_scope")
                    .table(TehsilActivities::Table)
                    .col(TehsilActivities::DistrictId)
                    .col(TehsilActivities::TehsilId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserActivities::Table)
                    .if_not_exists()
                    .col(pk_auto(UserActivities::Id))
                    .col(integer(UserActivities::TehsilActivityId))
                    .col(integer(UserActivities::DistrictId))
                    .col(integer_null(UserActivities::TehsilId))
                    .col(integer(UserActivities::ActivityId))
                    .col(integer(UserActivities::UserId))
                    .col(json(UserActivities::FieldValues))
                    .col(boolean(UserActivities::IsUnscheduled).default(false))
                    .col(date_time(UserActivities::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_activity_tehsil_activity")
                            .from(UserActivities::Table, UserActivities::TehsilActivityId)
                            .to(TehsilActivities::Table, TehsilActivities::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_activity_user")
                            .from(UserActivities::Table, UserActivities::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(UserActivities::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(TehsilActivities::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(DistrictActivities::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum DistrictActivities {
    Table,
    Id,
    DistrictId,
    ActivityId,
    FrequencyId,
    FromDate,
    ToDate,
    Description,
    IsUnscheduled,
    CreatedBy,
    UpdatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TehsilActivities {
    Table,
    Id,
    DistrictActivityId,
    DistrictId,
    TehsilId,
    ActivityId,
    FrequencyId,
    FromDate,
    ToDate,
    IsAssigned,
    AssignedAt,
    IsPerformed,
    PerformedAt,
    PerformedBy,
    IsUnscheduled,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UserActivities {
    Table,
    Id,
    TehsilActivityId,
    DistrictId,
    TehsilId,
    ActivityId,
    UserId,
    FieldValues,
    IsUnscheduled,
    CreatedAt,
}
