use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Geographic level a role operates on. Decides how a user's visibility is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum RoleLevel {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "district")]
    District,
    #[sea_orm(string_value = "tehsil")]
    Tehsil,
    #[sea_orm(string_value = "call_center")]
    CallCenter,
}

/// A user of the back office or a field officer.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub contact_number: Option<String>,
    /// Display role, e.g. `super admin`, `DPWO`, `TPWO`.
    pub role_name: String,
    pub role_level: RoleLevel,
    #[sea_orm(default_value = "true")]
    pub is_active: bool,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_permission::Entity")]
    UserPermission,
    #[sea_orm(has_many = "super::user_district::Entity")]
    UserDistrict,
    #[sea_orm(has_many = "super::user_tehsil::Entity")]
    UserTehsil,
    #[sea_orm(has_many = "super::notification::Entity")]
    Notification,
}

impl Related<super::user_permission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserPermission.def()
    }
}

impl Related<super::district::Entity> for Entity {
    fn to() -> RelationDef {
        super::user_district::Relation::District.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::user_district::Relation::User.def().rev())
    }
}

impl Related<super::tehsil::Entity> for Entity {
    fn to() -> RelationDef {
        super::user_tehsil::Relation::Tehsil.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::user_tehsil::Relation::User.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
