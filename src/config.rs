// ShelfReader - Library E-Reader Core for Mobile
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Core configuration
//!
//! The host app hands the core a JSON document (or nothing, in which case
//! every field falls back to its default). Unknown fields are ignored so the
//! platform side can ship newer settings ahead of the core.
//!
//! ```json
//! {
//!   "database_path": "/data/user/0/org.shelf/databases/shelf.db",
//!   "age_gate": { "minimum_age": 13 },
//!   "log_filter": "info"
//! }
//! ```

use crate::error::{Result, ShelfError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Minimum age the library content policy asks about
pub const DEFAULT_MINIMUM_AGE: u8 = 13;

/// Top-level configuration for the native core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite database holding account details
    pub database_path: PathBuf,

    /// Age verification settings
    pub age_gate: AgeGateConfig,

    /// `tracing` filter directive used by the desktop CLI
    pub log_filter: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: crate::storage::Database::get_default_path(),
            age_gate: AgeGateConfig::default(),
            log_filter: "warn,shelf_core=info".to_string(),
        }
    }
}

/// Age gate configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgeGateConfig {
    /// Age threshold shown in the prompt ("Are you 13 or older?")
    pub minimum_age: u8,
}

impl Default for AgeGateConfig {
    fn default() -> Self {
        Self {
            minimum_age: DEFAULT_MINIMUM_AGE,
        }
    }
}

impl CoreConfig {
    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    ///
    /// A missing file yields the defaults.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Self::from_json(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file missing, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ShelfError::ConfigurationError(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Write configuration as pretty-printed JSON
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.age_gate.minimum_age == 0 {
            return Err(ShelfError::ConfigurationError(
                "age_gate.minimum_age must be greater than zero".to_string(),
            ));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(ShelfError::ConfigurationError(
                "database_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = CoreConfig::from_json(r#"{"database_path": "/tmp/shelf.db"}"#).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/shelf.db"));
        assert_eq!(config.age_gate.minimum_age, 13);
    }

    #[test]
    fn test_zero_minimum_age_rejected() {
        let result = CoreConfig::from_json(r#"{"age_gate": {"minimum_age": 0}}"#);
        assert!(matches!(result, Err(ShelfError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = CoreConfig::default();
        config.age_gate.minimum_age = 16;
        config.save(&path).await.unwrap();

        let loaded = CoreConfig::load(&path).await.unwrap();
        assert_eq!(loaded.age_gate.minimum_age, 16);
    }

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = CoreConfig::load(dir.path().join("absent.json")).await.unwrap();
        assert_eq!(loaded.age_gate, AgeGateConfig::default());
    }
}
