//! Batched id-to-name lookups for listing responses.

use std::collections::{BTreeSet, HashMap};

use common::NamedRef;
use model::entities::{activity, district, frequency, tehsil, user};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect};

/// Ids collected from a page of rows.
#[derive(Debug, Default)]
pub struct Wanted {
    pub districts: BTreeSet<i32>,
    pub tehsils: BTreeSet<i32>,
    pub activities: BTreeSet<i32>,
    pub frequencies: BTreeSet<i32>,
    pub users: BTreeSet<i32>,
}

impl Wanted {
    pub fn district(&mut self, id: i32) -> &mut Self {
        self.districts.insert(id);
        self
    }

    pub fn tehsil(&mut self, id: Option<i32>) -> &mut Self {
        self.tehsils.extend(id);
        self
    }

    pub fn activity(&mut self, id: i32) -> &mut Self {
        self.activities.insert(id);
        self
    }

    pub fn frequency(&mut self, id: Option<i32>) -> &mut Self {
        self.frequencies.extend(id);
        self
    }

    pub fn user(&mut self, id: Option<i32>) -> &mut Self {
        self.users.extend(id);
        self
    }
}

#[derive(Debug, Default)]
pub struct Names {
    districts: HashMap<i32, String>,
    tehsils: HashMap<i32, String>,
    activities: HashMap<i32, String>,
    frequencies: HashMap<i32, String>,
    users: HashMap<i32, String>,
}

fn named(map: &HashMap<i32, String>, id: Option<i32>) -> Option<NamedRef> {
    id.and_then(|id| map.get(&id).map(|name| NamedRef { id, name: name.clone() }))
}

impl Names {
    pub async fn load<C: ConnectionTrait>(db: &C, wanted: &Wanted) -> Result<Self, DbErr> {
        let mut names = Names::default();

        if !wanted.districts.is_empty() {
            let rows: Vec<(i32, String)> = district::Entity::find()
                .select_only()
                .columns([district::Column::Id, district::Column::Name])
                .filter(district::Column::Id.is_in(wanted.districts.iter().copied()))
                .into_tuple()
                .all(db)
                .await?;
            names.districts = rows.into_iter().collect();
        }
        if !wanted.tehsils.is_empty() {
            let rows: Vec<(i32, String)> = tehsil::Entity::find()
                .select_only()
                .columns([tehsil::Column::Id, tehsil::Column::Name])
                .filter(tehsil::Column::Id.is_in(wanted.tehsils.iter().copied()))
                .into_tuple()
                .all(db)
                .await?;
            names.tehsils = rows.into_iter().collect();
        }
        if !wanted.activities.is_empty() {
            let rows: Vec<(i32, String)> = activity::Entity::find()
                .select_only()
                .columns([activity::Column::Id, activity::Column::Name])
                .filter(activity::Column::Id.is_in(wanted.activities.iter().copied()))
                .into_tuple()
                .all(db)
                .await?;
            names.activities = rows.into_iter().collect();
        }
        if !wanted.frequencies.is_empty() {
            let rows: Vec<(i32, String)> = frequency::Entity::find()
                .select_only()
                .columns([frequency::Column::Id, frequency::Column::Name])
                .filter(frequency::Column::Id.is_in(wanted.frequencies.iter().copied()))
                .into_tuple()
                .all(db)
                .await?;
            names.frequencies = rows.into_iter().collect();
        }
        if !wanted.users.is_empty() {
            let rows: Vec<(i32, String)> = user::Entity::find()
                .select_only()
                .columns([user::Column::Id, user::Column::Name])
                .filter(user::Column::Id.is_in(wanted.users.iter().copied()))
                .into_tuple()
                .all(db)
                .await?;
            names.users = rows.into_iter().collect();
        }

        Ok(names)
    }

    pub fn district(&self, id: i32) -> Option<NamedRef> {
        named(&self.districts, Some(id))
    }

    pub fn tehsil(&self, id: Option<i32>) -> Option<NamedRef> {
        named(&self.tehsils, id)
    }

    pub fn activity(&self, id: i32) -> Option<NamedRef> {
        named(&self.activities, Some(id))
    }

    pub fn frequency(&self, id: Option<i32>) -> Option<NamedRef> {
        named(&self.frequencies, id)
    }

    pub fn user(&self, id: Option<i32>) -> Option<NamedRef> {
        named(&self.users, id)
    }

    /// Plain name, empty when unknown. Used by exports.
    pub fn label(named: &Option<NamedRef>) -> String {
        named.as_ref().map(|n| n.name.clone()).unwrap_or_default()
    }
}
