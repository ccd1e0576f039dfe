use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Frequencies::Table)
                    .if_not_exists()
                    .col(pk_auto(Frequencies::Id))
                    .col(string(Frequencies::Name).unique_key())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Activities::Table)
                    .if_not_exists()
                    .col(pk_auto(Activities::Id))
                    .col(string(Activities::Name).unique_key())
                    .col(integer(Activities::SortOrder).default(0))
                    .col(boolean(Activities::IsActive).default(true))
                    .col(date_time(Activities::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ActivityFrequencies::Table)
                    .if_not_exists()
                    .col(integer(ActivityFrequencies::ActivityId))
                    .col(integer(ActivityFrequencies::FrequencyId))
                    .primary_key(
                        Index::create()
                            .name("pk_activity_frequencies")
                            .col(ActivityFrequencies::ActivityId)
                            .col(ActivityFrequencies::FrequencyId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activity_frequencies_activity")
                            .from(ActivityFrequencies::Table, ActivityFrequencies::ActivityId)
                            .to(Activities::Table, Activities::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activity_frequencies_frequency")
                            .from(ActivityFrequencies::Table, ActivityFrequencies::FrequencyId)
                            .to(Frequencies::Table, Frequencies::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ActivityFields::Table)
                    .if_not_exists()
                    .col(pk_auto(ActivityFields::Id))
                    .col(string(ActivityFields::Title).unique_key())
                    .col(string_len(ActivityFields::Name, 25).unique_key())
                    .col(string_len(ActivityFields::FieldType, 20))
                    .col(boolean(ActivityFields::IsRequired).default(false))
                    .col(string_null(ActivityFields::DefaultValue))
                    .col(date_time(ActivityFields::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ActivityFieldOptions::Table)
                    .if_not_exists()
                    .col(pk_auto(ActivityFieldOptions::Id))
                    .col(integer(ActivityFieldOptions::ActivityFieldId))
                    .col(string(ActivityFieldOptions::OptionLabel))
                    .col(string(ActivityFieldOptions::Value))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activity_field_options_field")
                            .from(ActivityFieldOptions::Table, ActivityFieldOptions::ActivityFieldId)
                            .to(ActivityFields::Table, ActivityFields::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ActivityFieldAssignments::Table)
                    .if_not_exists()
                    .col(integer(ActivityFieldAssignments::ActivityId))
                    .col(integer(ActivityFieldAssignments::ActivityFieldId))
                    .col(integer(ActivityFieldAssignments::Position).default(0))
                    .primary_key(
                        Index::create()
                            .name("pk_activity_field_assignments")
                            .col(ActivityFieldAssignments::ActivityId)
                            .col(ActivityFieldAssignments::ActivityFieldId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activity_field_assignments_activity")
                            .from(ActivityFieldAssignments::Table, ActivityFieldAssignments::ActivityId)
                            .to(Activities::Table, Activities::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activity_field_assignments_field")
                            .from(ActivityFieldAssignments::Table, ActivityFieldAssignments::ActivityFieldId)
                            .to(ActivityFields::Table, ActivityFields::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(ActivityFieldAssignments::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(ActivityFieldOptions::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(ActivityFields::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(ActivityFrequencies::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Activities::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Frequencies::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Frequencies {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
pub(crate) enum Activities {
    Table,
    Id,
    Name,
    SortOrder,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ActivityFrequencies {
    Table,
    ActivityId,
    FrequencyId,
}

#[derive(DeriveIden)]
enum ActivityFields {
    Table,
    Id,
    Title,
    Name,
    FieldType,
    IsRequired,
    DefaultValue,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ActivityFieldOptions {
    Table,
    Id,
    ActivityFieldId,
    #[sea_orm(iden = "option")]
    OptionLabel,
    Value,
}

#[derive(DeriveIden)]
enum ActivityFieldAssignments {
    Table,
    ActivityId,
    ActivityFieldId,
    Position,
}
