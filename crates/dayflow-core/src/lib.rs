//! # Dayflow Core Library
//!
//! Core business logic for the Dayflow productivity planner. The CLI
//! binary is a thin layer over this crate; every operation it exposes
//! lives here.
//!
//! ## Architecture
//!
//! - **Interval arithmetic**: pure window math for subtracting busy
//!   spans, merging, and minimum-fragment filtering
//! - **Availability**: weekly templates plus calendar events resolved
//!   into concrete free windows per date
//! - **Prioritization**: eligibility filtering and priority scoring of
//!   the external task set
//! - **Packing**: priority-ordered tasks laid into free windows with
//!   interleaved breaks
//! - **Planner facade**: day/week orchestration with preview caching,
//!   atomic commits, and replanning
//! - **Analytics**: daily reviews and confidence-scored insights that
//!   feed back into the next scheduling pass
//! - **Storage**: SQLite persistence and TOML settings
//!
//! ## Key Components
//!
//! - [`SmartPlanner`]: scheduling facade (preview / commit / replan)
//! - [`ProductivityAnalyzer`]: reviews, insights, and stats
//! - [`PlannerDb`]: persistence for every planner entity

pub mod analytics;
pub mod availability;
pub mod error;
pub mod interval;
pub mod model;
pub mod packer;
pub mod planner;
pub mod prioritize;
pub mod storage;

pub use analytics::{productivity_score, ProductivityAnalyzer, ProductivityStats};
pub use availability::AvailabilityResolver;
pub use error::{CoreError, DatabaseError, Result, SettingsError, ValidationError};
pub use interval::TimeWindow;
pub use model::{
    AvailabilityTemplate, BlockSource, BlockStatus, BreakPolicy, CalendarEvent, DailyReview,
    InsightKind, Owner, ProductivityInsight, Scope, Task, TaskPriority, TimeBlock, WorkGoal,
};
pub use packer::{BreakPlan, Packer, PlannedBlock, ScheduleResult};
pub use planner::{
    MokaScheduleCache, NullScheduleCache, RescheduleResult, ScheduleCache, SmartPlanner,
    TaskStore, TeamResolver,
};
pub use storage::{PlannerDb, PlannerSettings};
