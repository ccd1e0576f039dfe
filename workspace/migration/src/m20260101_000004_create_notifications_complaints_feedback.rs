use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260101_000001_create_geography_and_users::{Districts, Tehsils, Users};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(pk_auto(Notifications::Id))
                    .col(integer(Notifications::UserId))
                    .col(string(Notifications::Kind))
                    .col(string(Notifications::Title))
                    .col(text(Notifications::Body))
                    .col(json(Notifications::Data))
                    .col(date_time_null(Notifications::ReadAt))
                    .col(date_time(Notifications::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_user")
                            .from(Notifications::Table, Notifications::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Complaints::Table)
                    .if_not_exists()
                    .col(pk_auto(Complaints::Id))
                    .col(string(Complaints::ComplainantName))
                    .col(string_null(Complaints::ComplainantContact))
                    .col(integer_null(Complaints::DistrictId))
                    .col(integer_null(Complaints::TehsilId))
                    .col(string(Complaints::Subject))
                    .col(text(Complaints::Description))
                    .col(string_len(Complaints::Source, 20))
                    .col(string_len(Complaints::CallType, 20))
                    .col(integer(Complaints::Status).default(0))
                    .col(integer_null(Complaints::MarkedBy))
                    .col(text_null(Complaints::Remarks))
                    .col(integer(Complaints::CreatedBy))
                    .col(date_time(Complaints::CreatedAt))
                    .col(date_time_null(Complaints::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_district")
                            .from(Complaints::Table, Complaints::DistrictId)
                            .to(Districts::Table, Districts::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_tehsil")
                            .from(Complaints::Table, Complaints::TehsilId)
                            .to(Tehsils::Table, Tehsils::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ComplaintHistories::Table)
                    .if_not_exists()
                    .col(pk_auto(ComplaintHistories::Id))
                    .col(integer(ComplaintHistories::ComplaintId))
                    .col(integer(ComplaintHistories::Status))
                    .col(text_null(ComplaintHistories::Remarks))
                    .col(integer(ComplaintHistories::ActedBy))
                    .col(date_time(ComplaintHistories::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_history_complaint")
                            .from(ComplaintHistories::Table, ComplaintHistories::ComplaintId)
                            .to(Complaints::Table, Complaints::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Feedbacks::Table)
                    .if_not_exists()
                    .col(pk_auto(Feedbacks::Id))
                    .col(integer(Feedbacks::UserId))
                    .col(string(Feedbacks::Title))
                    .col(text(Feedbacks::Description))
                    .col(date_time(Feedbacks::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_feedback_user")
                            .from(Feedbacks::Table, Feedbacks::UserId)
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
        manager.drop_table(Table::drop().table(Feedbacks::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(ComplaintHistories::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Complaints::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Notifications::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Notifications {
    Table,
    Id,
    UserId,
    Kind,
    Title,
    Body,
    Data,
    ReadAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Complaints {
    Table,
    Id,
    ComplainantName,
    ComplainantContact,
    DistrictId,
    TehsilId,
    Subject,
    Description,
    Source,
    CallType,
    Status,
    MarkedBy,
    Remarks,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ComplaintHistories {
    Table,
    Id,
    ComplaintId,
    Status,
    Remarks,
    ActedBy,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Feedbacks {
    Table,
    Id,
    UserId,
    Title,
    Description,
    CreatedAt,
}
