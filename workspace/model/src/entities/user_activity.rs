use std::collections::BTreeMap;

use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A single typed value submitted for a form field.
///
/// Media variants hold storage keys, never URLs. URLs are resolved
/// through the media store when the submission is read back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Date(Date),
    File(String),
    Images(Vec<String>),
    Choices(Vec<String>),
    Choice(String),
}

impl FieldValue {
    /// Storage keys referenced by this value.
    pub fn media_keys(&self) -> Vec<&str> {
        match self {
            FieldValue::File(key) => vec![key.as_str()],
            FieldValue::Images(keys) => keys.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Flat textual rendering used by listings and exports.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Text(s) | FieldValue::Choice(s) | FieldValue::File(s) => s.clone(),
            FieldValue::Integer(n) => n.to_string(),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::Images(items) | FieldValue::Choices(items) => items.join(","),
        }
    }
}

/// Submitted values keyed by field name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct FieldValues(pub BTreeMap<String, FieldValue>);

impl FieldValues {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn media_keys(&self) -> Vec<&str> {
        self.0.values().flat_map(FieldValue::media_keys).collect()
    }
}

/// One submission of a performed activity.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_activities")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tehsil_activity_id: i32,
    pub district_id: i32,
    pub tehsil_id: Option<i32>,
    pub activity_id: i32,
    pub user_id: i32,
    #[sea_orm(column_type = "Json")]
    pub field_values: FieldValues,
    #[sea_orm(default_value = "false")]
    pub is_unscheduled: bool,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tehsil_activity::Entity",
        from = "Column::TehsilActivityId",
        to = "super::tehsil_activity::Column::Id",
        on_delete = "Cascade"
    )]
    TehsilActivity,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::tehsil_activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TehsilActivity.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
