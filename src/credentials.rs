//! PostgreSQL passwords kept out of the config file.
//!
//! ```toml
//! # ~/.config/coding_store/credentials.toml
//! [postgres.lab]
//! password = "..."
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

type DynError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    postgres: HashMap<String, Secret>,
}

#[derive(Debug, Deserialize)]
struct Secret {
    password: String,
}

pub fn credentials_path() -> Result<PathBuf, DynError> {
    let home = std::env::var_os("HOME").ok_or("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config/coding_store/credentials.toml"))
}

/// Password of `[postgres.<profile>]` in the default credentials file
pub fn postgres_password(profile: &str) -> Result<String, DynError> {
    postgres_password_from(&credentials_path()?, profile)
}

pub fn postgres_password_from(path: &Path, profile: &str) -> Result<String, DynError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read credentials file {}: {}", path.display(), e))?;
    let file: CredentialsFile = toml::from_str(&content)
        .map_err(|e| format!("Cannot parse credentials file {}: {}", path.display(), e))?;
    file.postgres
        .get(profile)
        .map(|secret| secret.password.clone())
        .ok_or_else(|| format!("Profile [postgres.{}] not found in {}", profile, path.display()).into())
}
