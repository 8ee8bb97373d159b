//! CLI command implementations over dayflow-core.

pub mod review;
pub mod schedule;
pub mod setup;
pub mod task;

use std::time::Duration;

use dayflow_core::planner::MokaScheduleCache;
use dayflow_core::{AvailabilityResolver, PlannerDb, PlannerSettings};

pub(crate) type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Shared command context: storage, settings, and the preview cache.
pub(crate) struct Context {
    pub db: PlannerDb,
    pub settings: PlannerSettings,
    pub cache: MokaScheduleCache,
}

impl Context {
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let settings = PlannerSettings::load_or_default();
        let db = PlannerDb::open()?.with_limits(
            settings.max_tasks,
            settings.max_events,
            settings.max_blocks,
        );
        let cache = MokaScheduleCache::new(Duration::from_secs(settings.cache_ttl_secs));
        Ok(Self {
            db,
            settings,
            cache,
        })
    }

    /// Availability resolver configured from settings.
    pub fn resolver(&self) -> Result<AvailabilityResolver, Box<dyn std::error::Error>> {
        let tz = self.settings.tz()?;
        let (start, end) = self.settings.default_window()?;
        Ok(AvailabilityResolver::new()
            .with_timezone(tz)
            .with_default_window(start, end))
    }
}

/// Print any serializable value as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
