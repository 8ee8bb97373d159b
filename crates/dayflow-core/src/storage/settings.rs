//! TOML-based planner settings.
//!
//! Stored at `~/.config/dayflow/settings.toml`. Covers the planner
//! time zone, the default availability window, the preview cache TTL,
//! and the query bounds that keep pathological inputs from blowing up
//! a scheduling pass.

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{Result, SettingsError};

/// Planner configuration.
///
/// Serialized to/from TOML at `~/.config/dayflow/settings.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerSettings {
    /// IANA time zone the planner materializes availability in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Default availability window start, `HH:MM`.
    #[serde(default = "default_day_start")]
    pub day_start: String,
    /// Default availability window end, `HH:MM`.
    #[serde(default = "default_day_end")]
    pub day_end: String,
    /// Preview cache TTL in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Maximum candidate tasks considered per scheduling pass.
    #[serde(default = "default_max_tasks")]
    pub max_tasks: u32,
    /// Maximum calendar events considered per scheduling pass.
    #[serde(default = "default_max_events")]
    pub max_events: u32,
    /// Maximum time blocks loaded per analytics query.
    #[serde(default = "default_max_blocks")]
    pub max_blocks: u32,
}

fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_day_start() -> String {
    "09:00".to_string()
}
fn default_day_end() -> String {
    "17:00".to_string()
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_max_tasks() -> u32 {
    500
}
fn default_max_events() -> u32 {
    1000
}
fn default_max_blocks() -> u32 {
    5000
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            day_start: default_day_start(),
            day_end: default_day_end(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_tasks: default_max_tasks(),
            max_events: default_max_events(),
            max_blocks: default_max_blocks(),
        }
    }
}

impl PlannerSettings {
    /// Load from disk or return (and persist) the default.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed, or if
    /// the default cannot be written.
    pub fn load() -> Result<Self> {
        let path = data_dir()?.join("settings.toml");
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let settings: PlannerSettings =
                    toml::from_str(&content).map_err(|e| SettingsError::LoadFailed {
                        path: path.clone(),
                        message: e.to_string(),
                    })?;
                Ok(settings)
            }
            Err(_) => {
                let settings = Self::default();
                settings.save()?;
                Ok(settings)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save(&self) -> Result<()> {
        let path = data_dir()?.join("settings.toml");
        let content = toml::to_string_pretty(self).map_err(|e| SettingsError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Load from disk, falling back to defaults on any error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Parsed time zone.
    ///
    /// # Errors
    /// Returns an error for an unknown IANA zone name.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| {
                SettingsError::InvalidValue {
                    key: "timezone".to_string(),
                    message: format!("unknown time zone '{}'", self.timezone),
                }
                .into()
            })
    }

    /// Parsed default window bounds.
    ///
    /// # Errors
    /// Returns an error when either bound is not `HH:MM`.
    pub fn default_window(&self) -> Result<(NaiveTime, NaiveTime)> {
        Ok((
            parse_hhmm("day_start", &self.day_start)?,
            parse_hhmm("day_end", &self.day_end)?,
        ))
    }
}

/// Parse an `HH:MM` time-of-day string.
pub fn parse_hhmm(key: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| {
        SettingsError::InvalidValue {
            key: key.to_string(),
            message: format!("expected HH:MM, got '{value}'"),
        }
        .into()
    })
}
