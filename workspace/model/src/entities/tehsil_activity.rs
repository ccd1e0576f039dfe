use sea_orm::entity::prelude::*;

/// The per-tehsil instance of a district schedule.
///
/// `tehsil_id` is `NULL` for the district-level header row. The own
/// `from_date`/`to_date` are set on assignment and override the parent window.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tehsil_activities")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub district_activity_id: i32,
    /// Copied from the parent schedule so scoping needs no join.
    pub district_id: i32,
    pub tehsil_id: Option<i32>,
    pub activity_id: i32,
    pub frequency_id: Option<i32>,
    pub from_date: Option<Date>,
    pub to_date: Option<Date>,
    #[sea_orm(default_value = "false")]
    pub is_assigned: bool,
    pub assigned_at: Option<DateTime>,
    #[sea_orm(default_value = "false")]
    pub is_performed: bool,
    pub performed_at: Option<DateTime>,
    pub performed_by: Option<i32>,
    #[sea_orm(default_value = "false")]
    pub is_unscheduled: bool,
    pub created_at: DateTime,
}

impl Model {
    pub fn is_header(&self) -> bool {
        self.tehsil_id.is_none()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::district_activity::Entity",
        from = "Column::DistrictActivityId",
        to = "super::district_activity::Column::Id",
        on_delete = "Cascade"
    )]
    DistrictActivity,
    #[sea_orm(
        belongs_to = "super::district::Entity",
        from = "Column::DistrictId",
        to = "super::district::Column::Id"
    )]
    District,
    #[sea_orm(
        belongs_to = "super::tehsil::Entity",
        from = "Column::TehsilId",
        to = "super::tehsil::Column::Id"
    )]
    Tehsil,
    #[sea_orm(
        belongs_to = "super::activity::Entity",
        from = "Column::ActivityId",
        to = "super::activity::Column::Id"
    )]
    Activity,
    #[sea_orm(has_many = "super::user_activity::Entity")]
    UserActivity,
}

impl Related<super::district_activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DistrictActivity.def()
    }
}

impl Related<super::district::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::District.def()
    }
}

impl Related<super::tehsil::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tehsil.def()
    }
}

impl Related<super::activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Activity.def()
    }
}

impl Related<super::user_activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserActivity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
