use sea_orm::entity::prelude::*;

/// How often an activity recurs, e.g. `Weekly` or `Monthly`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "frequencies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::activity_frequency::Entity")]
    ActivityFrequency,
}

impl Related<super::activity::Entity> for Entity {
    fn to() -> RelationDef {
        super::activity_frequency::Relation::Activity.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::activity_frequency::Relation::Frequency.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
