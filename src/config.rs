// src/config.rs

use crate::bounds::{default_bounds, BoundRule};
use crate::constants::*;
use crate::error::ConfigError;
use chrono::{FixedOffset, Offset, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime knobs for the engine. Every field has a default, so a config file
/// only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub storage_key: String,
    pub debounce_ms: u64,
    /// `None` disables the quota check.
    pub quota_bytes: Option<usize>,
    pub utc_offset_minutes: i32,
    pub bounds: Vec<BoundRule>,
    pub database_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            quota_bytes: Some(DEFAULT_QUOTA_BYTES),
            utc_offset_minutes: 0,
            bounds: default_bounds(),
            database_path: None,
        }
    }
}

impl EngineConfig {
    /// Loads a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!("Config {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Offset used to decide calendar days (streaks, daily stats). Out of
    /// range values fall back to UTC.
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| {
            warn!(
                "utcOffsetMinutes {} out of range, using UTC",
                self.utc_offset_minutes
            );
            Utc.fix()
        })
    }
}
