use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Districts::Table)
                    .if_not_exists()
                    .col(pk_auto(Districts::Id))
                    .col(string(Districts::Name).unique_key())
                    .col(integer_null(Districts::FranchisingPhaseNo))
                    .col(boolean(Districts::IsActive).default(true))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tehsils::Table)
                    .if_not_exists()
                    .col(pk_auto(Tehsils::Id))
                    .col(integer(Tehsils::DistrictId))
                    .col(string(Tehsils::Name))
                    .col(boolean(Tehsils::IsActive).default(true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tehsil_district")
                            .from(Tehsils::Table, Tehsils::DistrictId)
                            .to(Districts::Table, Districts::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string(Users::Username).unique_key())
                    .col(string(Users::Name))
                    .col(string_null(Users::Email))
                    .col(string_null(Users::ContactNumber))
                    .col(string(Users::RoleName))
                    .col(string_len(Users::RoleLevel, 20))
                    .col(boolean(Users::IsActive).default(true))
                    .col(date_time(Users::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserPermissions::Table)
                    .if_not_exists()
                    .col(integer(UserPermissions::UserId))
                    .col(string(UserPermissions::Permission))
                    .primary_key(
                        Index::create()
                            .name("pk_user_permissions")
                            .col(UserPermissions::UserId)
                            .col(UserPermissions::Permission),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_permissions_user")
                            .from(UserPermissions::Table, UserPermissions::UserId)
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
                    .table(UserDistricts::Table)
                    .if_not_exists()
                    .col(integer(UserDistricts::UserId))
                    .col(integer(UserDistricts::DistrictId))
                    .primary_key(
                        Index::create()
                            .name("pk_user_districts")
                            .col(UserDistricts::UserId)
                            .col(UserDistricts::DistrictId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_districts_user")
                            .from(UserDistricts::Table, UserDistricts::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_districts_district")
                            .from(UserDistricts::Table, UserDistricts::DistrictId)
                            .to(Districts::Table, Districts::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserTehsils::Table)
                    .if_not_exists()
                    .col(integer(UserTehsils::UserId))
                    .col(integer(UserTehsils::TehsilId))
                    .primary_key(
                        Index::create()
                            .name("pk_user_tehsils")
                            .col(UserTehsils::UserId)
                            .col(UserTehsils::TehsilId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_tehsils_user")
                            .from(UserTehsils::Table, UserTehsils::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_tehsils_tehsil")
                            .from(UserTehsils::Table, UserTehsils::TehsilId)
                            .to(Tehsils::Table, Tehsils::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(UserTehsils::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(UserDistricts::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(UserPermissions::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Users::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Tehsils::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Districts::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Districts {
    Table,
    Id,
    Name,
    FranchisingPhaseNo,
    IsActive,
}

#[derive(DeriveIden)]
pub(crate) enum Tehsils {
    Table,
    Id,
    DistrictId,
    Name,
    IsActive,
}

#[derive(DeriveIden)]
pub(crate) enum Users {
    Table,
    Id,
    Username,
    Name,
    Email,
    ContactNumber,
    RoleName,
    RoleLevel,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UserPermissions {
    Table,
    UserId,
    Permission,
}

#[derive(DeriveIden)]
enum UserDistricts {
    Table,
    UserId,
    DistrictId,
}

#[derive(DeriveIden)]
enum UserTehsils {
    Table,
    UserId,
    TehsilId,
}
