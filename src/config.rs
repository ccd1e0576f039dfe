use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use moka::future::Cache;
use sea_orm::{Database, DatabaseConnection};
use serde::Deserialize;

use crate::schemas::AppState;
use crate::storage;

/// Runtime settings.
///
/// Sources, lowest precedence first: built-in defaults, an optional
/// `fieldops.{toml,yaml,json}` file in the working directory, `.env`, then
/// `FIELDOPS__*` environment variables (`FIELDOPS__SCHEDULE__BACKDATE_SCHEDULING=true`).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub bind_address: String,
    pub schedule: ScheduleSettings,
    pub storage: StorageSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSettings {
    /// Lets schedules whose window already closed be (re)assigned.
    pub backdate_scheduling: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageDisk {
    Local,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub disk: StorageDisk,
    pub root: PathBuf,
    /// Prefix under which stored keys are served, e.g. `https://cdn.example.org/media`.
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    pub max_capacity: u64,
}

impl Settings {
    /// Load settings from defaults, file and environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Config::builder()
            .set_default("database_url", "sqlite://fieldops.db?mode=rwc")?
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("schedule.backdate_scheduling", false)?
            .set_default("storage.disk", "local")?
            .set_default("storage.root", "storage")?
            .set_default("storage.public_base_url", "/storage")?
            .set_default("cache.ttl_secs", 300_i64)?
            .set_default("cache.max_capacity", 1000_i64)?
            .add_source(File::with_name("fieldops").required(false))
            .add_source(
                Environment::with_prefix("FIELDOPS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Command-line values win over everything else.
    pub fn with_overrides(mut self, database_url: Option<String>, bind_address: Option<String>) -> Self {
        if let Some(url) = database_url {
            self.database_url = url;
        }
        if let Some(address) = bind_address {
            self.bind_address = address;
        }
        self
    }

    /// In-memory database and media store, used by tests.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            schedule: ScheduleSettings {
                backdate_scheduling: false,
            },
            storage: StorageSettings {
                disk: StorageDisk::Memory,
                root: PathBuf::from("storage"),
                public_base_url: "/storage".to_string(),
            },
            cache: CacheSettings {
                ttl_secs: 300,
                max_capacity: 100,
            },
        }
    }
}

/// Initialize application configuration and state
pub async fn initialize_app_state(settings: Settings) -> Result<AppState> {
    // Connect to database
    tracing::info!("Connecting to database: {}", settings.database_url);
    let db = Database::connect(&settings.database_url).await?;

    Ok(build_app_state(db, settings))
}

/// Assemble the state around an already connected database.
pub fn build_app_state(db: DatabaseConnection, settings: Settings) -> AppState {
    let cache = Cache::builder()
        .max_capacity(settings.cache.max_capacity)
        .time_to_live(Duration::from_secs(settings.cache.ttl_secs))
        .build();

    let media = storage::from_settings(&settings.storage);
    tracing::debug!(
        "Media store ready ({:?}), serving under {}",
        settings.storage.disk,
        settings.storage.public_base_url
    );

    AppState {
        db,
        cache,
        media,
        settings: Arc::new(settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_loaded_values() {
        let settings = Settings::in_memory()
            .with_overrides(Some("sqlite://other.db".to_string()), None);
        assert_eq!(settings.database_url, "sqlite://other.db");
        assert_eq!(settings.bind_address, "127.0.0.1:0");
        assert!(!settings.schedule.backdate_scheduling);
    }

    #[test]
    fn defaults_deserialize_without_any_source() {
        let settings = Settings::load().expect("defaults should deserialize");
        assert!(!settings.bind_address.is_empty());
        assert!(settings.cache.max_capacity > 0);
    }
}
