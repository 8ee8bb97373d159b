//! Domain types for the planner: owners, break policies, availability
//! templates, calendar events, time blocks, work goals, daily reviews,
//! and productivity insights.
//!
//! Every planner-owned entity belongs to exactly one owner (a user or
//! a team) and carries audit timestamps. Soft-delete handling lives
//! outside this crate.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

mod task;

pub use task::{Task, TaskPriority};

/// Unique identifier for a user.
pub type UserId = String;

/// Unique identifier for a team.
pub type TeamId = String;

/// Unique identifier for a task.
pub type TaskId = String;

/// Owner of a planner entity: a single user or a single team.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Owner {
    User(UserId),
    Team(TeamId),
}

impl Owner {
    /// The user id when owned by a user.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Owner::User(id) => Some(id),
            Owner::Team(_) => None,
        }
    }

    /// The team id when owned by a team.
    pub fn team_id(&self) -> Option<&str> {
        match self {
            Owner::User(_) => None,
            Owner::Team(id) => Some(id),
        }
    }
}

/// Planning horizon for a scheduling request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Day,
    Week,
}

impl Scope {
    /// Parse a scope keyword (`day` or `week`).
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "day" => Ok(Scope::Day),
            "week" => Ok(Scope::Week),
            other => Err(ValidationError::InvalidValue {
                field: "scope".to_string(),
                message: format!("expected 'day' or 'week', got '{other}'"),
            }),
        }
    }

    /// First date of the planning period containing `date`.
    ///
    /// Week scope aligns to Monday, matching the availability template
    /// weekday numbering (0=Monday).
    pub fn period_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Scope::Day => date,
            Scope::Week => {
                let offset = date.weekday().num_days_from_monday() as i64;
                date - chrono::Duration::days(offset)
            }
        }
    }

    /// Number of days covered by the planning period.
    pub fn days(&self) -> u32 {
        match self {
            Scope::Day => 1,
            Scope::Week => 7,
        }
    }
}

/// Parse a `YYYY-MM-DD` date, rejecting malformed input up front.
pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate(s.to_string()))
}

/// Lifecycle status of a time block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    Planned,
    Committed,
    Active,
    Completed,
    Cancelled,
}

impl BlockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockStatus::Planned => "planned",
            BlockStatus::Committed => "committed",
            BlockStatus::Active => "active",
            BlockStatus::Completed => "completed",
            BlockStatus::Cancelled => "cancelled",
        }
    }

    /// Parse from storage, defaulting unknown values to `Planned`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "committed" => BlockStatus::Committed,
            "active" => BlockStatus::Active,
            "completed" => BlockStatus::Completed,
            "cancelled" => BlockStatus::Cancelled,
            _ => BlockStatus::Planned,
        }
    }
}

/// Provenance of a time block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockSource {
    Auto,
    Manual,
}

impl BlockSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockSource::Auto => "auto",
            BlockSource::Manual => "manual",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "manual" => BlockSource::Manual,
            _ => BlockSource::Auto,
        }
    }
}

/// Focus/break cadence for an owner.
///
/// At most one active policy is expected per owner; when several exist
/// the first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakPolicy {
    pub id: String,
    pub owner: Owner,
    pub focus_minutes: u32,
    pub break_minutes: u32,
    pub long_break_minutes: u32,
    pub cycle_count: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BreakPolicy {
    /// Create a policy with the standard 25/5/15 cadence.
    pub fn new(owner: Owner) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner,
            focus_minutes: 25,
            break_minutes: 5,
            long_break_minutes: 15,
            cycle_count: 4,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Recurring weekly availability for an owner.
///
/// `day_of_week` uses 0=Monday .. 6=Sunday. An owner may declare any
/// number of windows per weekday; none at all implies the resolver's
/// default window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityTemplate {
    pub id: String,
    pub owner: Owner,
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilityTemplate {
    pub fn new(owner: Owner, day_of_week: u8, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner,
            day_of_week,
            start_time,
            end_time,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A calendar commitment. Only busy events subtract from availability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub owner: Owner,
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_busy: bool,
    /// Free-text provenance tag, e.g. "google" or "manual".
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn new(owner: Owner, title: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner,
            title: title.into(),
            description: String::new(),
            start,
            end,
            is_busy: true,
            source: "manual".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether this event overlaps a half-open time range.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}

/// A scheduled slice of time: a work block tied to a task, or a break.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeBlock {
    pub id: String,
    pub owner: Owner,
    pub task_id: Option<TaskId>,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: BlockStatus,
    pub is_break: bool,
    pub source: BlockSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeBlock {
    /// Block length in whole minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// A named outcome an owner is working toward, optionally tied to a
/// project. Progress fields are recomputed on demand from the linked
/// project's tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkGoal {
    pub id: String,
    pub owner: Owner,
    pub name: String,
    pub description: String,
    pub project_id: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub is_active: bool,
    pub progress_percentage: f64,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkGoal {
    pub fn new(owner: Owner, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner,
            name: name.into(),
            description: String::new(),
            project_id: None,
            target_date: None,
            is_active: true,
            progress_percentage: 0.0,
            total_tasks: 0,
            completed_tasks: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One per (user, date): computed productivity metrics plus free-form
/// journal fields filled in by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReview {
    pub id: String,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub summary: String,
    pub mood: String,
    pub highlights: String,
    pub lessons: String,
    pub tomorrow_top3: Vec<String>,
    pub tasks_planned: u32,
    pub tasks_completed: u32,
    /// Percentage in [0, 100].
    pub completion_rate: f64,
    pub focus_time_minutes: u32,
    pub break_time_minutes: u32,
    /// Weighted score in [0, 100].
    pub productivity_score: f64,
    pub current_streak: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category of a derived productivity insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    PeakHours,
    TaskDuration,
    BreakPattern,
    WeeklyTrend,
    CompletionPattern,
}

impl InsightKind {
    /// All insight categories, in generation order.
    pub const ALL: [InsightKind; 5] = [
        InsightKind::PeakHours,
        InsightKind::TaskDuration,
        InsightKind::BreakPattern,
        InsightKind::WeeklyTrend,
        InsightKind::CompletionPattern,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InsightKind::PeakHours => "peak_hours",
            InsightKind::TaskDuration => "task_duration",
            InsightKind::BreakPattern => "break_pattern",
            InsightKind::WeeklyTrend => "weekly_trend",
            InsightKind::CompletionPattern => "completion_pattern",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "peak_hours" => Some(InsightKind::PeakHours),
            "task_duration" => Some(InsightKind::TaskDuration),
            "break_pattern" => Some(InsightKind::BreakPattern),
            "weekly_trend" => Some(InsightKind::WeeklyTrend),
            "completion_pattern" => Some(InsightKind::CompletionPattern),
            _ => None,
        }
    }
}

/// A statistically derived, confidence-scored scheduling parameter.
///
/// One row per (user, kind); regeneration overwrites the previous row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductivityInsight {
    pub id: String,
    pub user_id: UserId,
    pub kind: InsightKind,
    /// Payload specific to the kind, e.g. `{"hours": [9, 10, 14]}`.
    pub data: serde_json::Value,
    /// Confidence in [0, 100].
    pub confidence_score: f64,
    pub sample_size: u32,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_parsing() {
        assert_eq!(Scope::parse("day").unwrap(), Scope::Day);
        assert_eq!(Scope::parse("week").unwrap(), Scope::Week);
        assert!(Scope::parse("month").is_err());
    }

    #[test]
    fn week_period_aligns_to_monday() {
        // 2024-06-13 is a Thursday
        let thursday = NaiveDate::from_ymd_opt(2024, 6, 13).unwrap();
        let start = Scope::Week.period_start(thursday);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
        assert_eq!(start.weekday().num_days_from_monday(), 0);

        // A Monday maps to itself
        assert_eq!(Scope::Week.period_start(start), start);
    }

    #[test]
    fn date_parsing_rejects_malformed_input() {
        assert!(parse_date("2024-06-13").is_ok());
        assert!(parse_date("13/06/2024").is_err());
        assert!(parse_date("not-a-date").is_err());
        assert!(parse_date("2024-13-45").is_err());
    }

    #[test]
    fn block_status_round_trip() {
        for status in [
            BlockStatus::Planned,
            BlockStatus::Committed,
            BlockStatus::Active,
            BlockStatus::Completed,
            BlockStatus::Cancelled,
        ] {
            assert_eq!(BlockStatus::from_str_lossy(status.as_str()), status);
        }
        assert_eq!(BlockStatus::from_str_lossy("bogus"), BlockStatus::Planned);
    }

    #[test]
    fn insight_kind_round_trip() {
        for kind in InsightKind::ALL {
            assert_eq!(InsightKind::parse(kind.as_str()), Some(kind));
        }
        assert!(InsightKind::parse("unknown").is_none());
    }

    #[test]
    fn owner_accessors() {
        let user = Owner::User("u1".to_string());
        assert_eq!(user.user_id(), Some("u1"));
        assert_eq!(user.team_id(), None);

        let team = Owner::Team("t1".to_string());
        assert_eq!(team.user_id(), None);
        assert_eq!(team.team_id(), Some("t1"));
    }
}
