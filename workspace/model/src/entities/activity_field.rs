use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The input type of a dynamic form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[sea_orm(string_value = "text")]
    Text,
    #[sea_orm(string_value = "textarea")]
    Textarea,
    #[sea_orm(string_value = "integer")]
    Integer,
    #[sea_orm(string_value = "number")]
    Number,
    #[sea_orm(string_value = "date")]
    Date,
    #[sea_orm(string_value = "file")]
    File,
    #[sea_orm(string_value = "image")]
    Image,
    #[sea_orm(string_value = "audio")]
    Audio,
    #[sea_orm(string_value = "video")]
    Video,
    #[sea_orm(string_value = "multi_images")]
    MultiImages,
    #[sea_orm(string_value = "checkbox")]
    Checkbox,
    #[sea_orm(string_value = "dropdown")]
    Dropdown,
    #[sea_orm(string_value = "radio")]
    Radio,
    #[sea_orm(string_value = "select2")]
    Select2,
}

impl FieldKind {
    /// Kinds that cannot be saved without at least one option.
    pub fn requires_options(self) -> bool {
        matches!(self, FieldKind::Checkbox | FieldKind::Dropdown | FieldKind::Radio)
    }

    /// Kinds whose value is one or more uploaded media objects.
    pub fn is_media(self) -> bool {
        matches!(
            self,
            FieldKind::File | FieldKind::Image | FieldKind::Audio | FieldKind::Video | FieldKind::MultiImages
        )
    }
}

/// An admin-defined form field that activities can collect.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "activity_fields")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub title: String,
    /// Machine name used as the key of submitted values.
    #[sea_orm(unique)]
    pub name: String,
    pub field_type: FieldKind,
    #[sea_orm(default_value = "false")]
    pub is_required: bool,
    pub default_value: Option<String>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::activity_field_option::Entity")]
    ActivityFieldOption,
    #[sea_orm(has_many = "super::activity_field_assignment::Entity")]
    ActivityFieldAssignment,
}

impl Related<super::activity_field_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivityFieldOption.def()
    }
}

impl Related<super::activity::Entity> for Entity {
    fn to() -> RelationDef {
        super::activity_field_assignment::Relation::Activity.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::activity_field_assignment::Relation::ActivityField.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
