use sea_orm::entity::prelude::*;

/// A district, the upper level of the geographic hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "districts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    /// Franchising phase the district was rolled out in. Used by reports.
    pub franchising_phase_no: Option<i32>,
    #[sea_orm(default_value = "true")]
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tehsil::Entity")]
    Tehsil,
    #[sea_orm(has_many = "super::district_activity::Entity")]
    DistrictActivity,
}

impl Related<super::tehsil::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tehsil.def()
    }
}

impl Related<super::district_activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DistrictActivity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
