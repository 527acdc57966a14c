use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::credentials::postgres_password;
use crate::db::SqliteConnection;
use crate::db_postgres::PgStoreConnection;
use crate::queries::DatabaseMode;
use crate::store::StoreConnection;

type DynError = Box<dyn std::error::Error + Send + Sync>;

fn default_cache() -> bool {
    true
}

/// Configuration file structure
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store connection settings (maps to [database] section in TOML)
    pub database: DatabaseConfig,
    /// Model cache settings (maps to [model] section in TOML)
    #[serde(default)]
    pub model: ModelConfig,
}

/// Store connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Backend: sqlite or postgres
    pub mode: DatabaseMode,
    /// Database file (required for sqlite)
    pub sqlite_path: Option<PathBuf>,
    /// Base server URL without password or database, e.g. postgres://user@host:5432 (required for postgres)
    pub postgres_url: Option<String>,
    /// Database name (required for postgres)
    pub database: Option<String>,
    /// Credential profile name to look up the password from ~/.config/coding_store/credentials.toml
    pub credential_profile: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Serve code data from the model cache (default: true)
    #[serde(default = "default_cache")]
    pub cache: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            cache: default_cache(),
        }
    }
}

impl StoreConfig {
    /// Read and parse a TOML config file, then validate it
    pub fn load(path: &Path) -> Result<Self, DynError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;
        let config = Self::parse(&content)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, DynError> {
        let config: StoreConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Ensure the fields needed by the selected mode are present
    pub fn validate(&self) -> Result<(), String> {
        let db = &self.database;
        match db.mode {
            DatabaseMode::Sqlite => {
                if db.sqlite_path.is_none() {
                    return Err("mode is sqlite but sqlite_path is missing in [database]".to_string());
                }
            }
            DatabaseMode::Postgres => {
                for (field, value) in [
                    ("postgres_url", &db.postgres_url),
                    ("database", &db.database),
                    ("credential_profile", &db.credential_profile),
                ] {
                    if value.is_none() {
                        return Err(format!("mode is postgres but {} is missing in [database]", field));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Build an unopened store handle for the configured backend
pub fn connect(config: &DatabaseConfig) -> Result<Box<dyn StoreConnection>, DynError> {
    match config.mode {
        DatabaseMode::Sqlite => {
            let path = config.sqlite_path.as_ref().ok_or("sqlite_path is required for sqlite")?;
            Ok(Box::new(SqliteConnection::new(path)))
        }
        DatabaseMode::Postgres => {
            let base_url = config.postgres_url.as_deref().ok_or("postgres_url is required for postgres")?;
            let database = config.database.as_deref().ok_or("database is required for postgres")?;
            let profile = config
                .credential_profile
                .as_deref()
                .ok_or("credential_profile is required for postgres")?;
            let password = postgres_password(profile)?;
            Ok(Box::new(PgStoreConnection::new(base_url, &password, database)?))
        }
    }
}
