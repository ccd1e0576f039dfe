use sea_orm::entity::prelude::*;

/// A tehsil (sub-district). Always belongs to exactly one district.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tehsils")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub district_id: i32,
    pub name: String,
    #[sea_orm(default_value = "true")]
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::district::Entity",
        from = "Column::DistrictId",
        to = "super::district::Column::Id"
    )]
    District,
    #[sea_orm(has_many = "super::tehsil_activity::Entity")]
    TehsilActivity,
}

impl Related<super::district::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::District.def()
    }
}

impl Related<super::tehsil_activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TehsilActivity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
