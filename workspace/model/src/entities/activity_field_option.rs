use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "activity_field_options")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub activity_field_id: i32,
    /// Label shown to the user.
    pub option: String,
    pub value: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::activity_field::Entity",
        from = "Column::ActivityFieldId",
        to = "super::activity_field::Column::Id"
    )]
    ActivityField,
}

impl Related<super::activity_field::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivityField.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
