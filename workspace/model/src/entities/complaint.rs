use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    #[sea_orm(num_value = 0)]
    Pending,
    #[sea_orm(num_value = 1)]
    Resolved,
    #[sea_orm(num_value = 2)]
    Reopened,
    #[sea_orm(num_value = 3)]
    Rejected,
}

/// Channel the complaint was raised through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum ComplaintSource {
    #[sea_orm(string_value = "call_center")]
    CallCenter,
    #[sea_orm(string_value = "mobile")]
    Mobile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    #[sea_orm(string_value = "complaint")]
    Complaint,
    #[sea_orm(string_value = "inquiry")]
    Inquiry,
}

/// A citizen complaint or inquiry.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "complaints")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub complainant_name: String,
    pub complainant_contact: Option<String>,
    pub district_id: Option<i32>,
    pub tehsil_id: Option<i32>,
    pub subject: String,
    pub description: String,
    pub source: ComplaintSource,
    pub call_type: CallType,
    pub status: ComplaintStatus,
    pub marked_by: Option<i32>,
    pub remarks: Option<String>,
    pub created_by: i32,
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
        belongs_to = "super::tehsil::Entity",
        from = "Column::TehsilId",
        to = "super::tehsil::Column::Id"
    )]
    Tehsil,
    #[sea_orm(has_many = "super::complaint_history::Entity")]
    ComplaintHistory,
}

impl Related<super::complaint_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ComplaintHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
