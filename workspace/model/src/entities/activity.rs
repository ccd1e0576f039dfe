use sea_orm::entity::prelude::*;

/// An advocacy activity type, e.g. "Community Meeting".
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "activities")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub sort_order: i32,
    #[sea_orm(default_value = "true")]
    pub is_active: bool,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::activity_frequency::Entity")]
    ActivityFrequency,
    #[sea_orm(has_many = "super::activity_field_assignment::Entity")]
    ActivityFieldAssignment,
    #[sea_orm(has_many = "super::district_activity::Entity")]
    DistrictActivity,
}

impl Related<super::frequency::Entity> for Entity {
    fn to() -> RelationDef {
        super::activity_frequency::Relation::Frequency.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::activity_frequency::Relation::Activity.def().rev())
    }
}

impl Related<super::activity_field::Entity> for Entity {
    fn to() -> RelationDef {
        super::activity_field_assignment::Relation::ActivityField.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::activity_field_assignment::Relation::Activity.def().rev())
    }
}

impl Related<super::district_activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DistrictActivity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
