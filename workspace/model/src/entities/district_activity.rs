use sea_orm::entity::prelude::*;

/// An activity scheduled for a district over `[from_date, to_date]`.
///
/// Owns one `tehsil_activity` per active tehsil of the district plus a
/// district-level header row whose `tehsil_id` is `NULL`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "district_activities")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub district_id: i32,
    pub activity_id: i32,
    pub frequency_id: Option<i32>,
    pub from_date: Date,
    pub to_date: Date,
    pub description: Option<String>,
    /// Ad-hoc activity recorded directly as performed.
    #[sea_orm(default_value = "false")]
    pub is_unscheduled: bool,
    pub created_by: i32,
    pub updated_by: Option<i32>,
    pub created_at: DateTime,
    pub updated_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::district::Entity",
        from = "Column::DistrictId",
        to = "super::district::Column::Id"
    )]
    District,
    #[sea_orm(
        belongs_to = "super::activity::Entity",
        from = "Column::ActivityId",
        to = "super::activity::Column::Id"
    )]
    Activity,
    #[sea_orm(
        belongs_to = "super::frequency::Entity",
        from = "Column::FrequencyId",
        to = "super::frequency::Column::Id"
    )]
    Frequency,
    #[sea_orm(has_many = "super::tehsil_activity::Entity")]
    TehsilActivity,
}

impl Related<super::district::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::District.def()
    }
}

impl Related<super::activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Activity.def()
    }
}

impl Related<super::frequency::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Frequency.def()
    }
}

impl Related<super::tehsil_activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TehsilActivity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
