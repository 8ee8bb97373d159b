//! Task entity consumed by the scheduling engine.
//!
//! Tasks are owned by the surrounding task-management system; the
//! engine reads the scheduling-relevant fields and only ever writes
//! back the `start_at` hint during replanning.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{TaskId, TeamId, UserId};

/// Priority level of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Critical,
    Urgent,
    High,
    Medium,
    Low,
}

impl TaskPriority {
    /// Base weight used by the priority score.
    pub fn weight(&self) -> f64 {
        match self {
            TaskPriority::Critical => 100.0,
            TaskPriority::Urgent => 90.0,
            TaskPriority::High => 70.0,
            TaskPriority::Medium => 40.0,
            TaskPriority::Low => 10.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Critical => "critical",
            TaskPriority::Urgent => "urgent",
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        }
    }

    /// Parse from storage, defaulting unknown values to `Medium`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "critical" => TaskPriority::Critical,
            "urgent" => TaskPriority::Urgent,
            "high" => TaskPriority::High,
            "low" => TaskPriority::Low,
            _ => TaskPriority::Medium,
        }
    }
}

/// A unit of schedulable work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    /// Hard deadlines add urgency on top of the due-date curve.
    pub is_hard_due: bool,
    pub estimated_minutes: Option<u32>,
    pub estimated_hours: Option<u32>,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// Hidden from scheduling until this instant passes the scope end.
    pub snoozed_until: Option<DateTime<Utc>>,
    /// Not schedulable before this date.
    pub backlog_date: Option<NaiveDate>,
    /// Scheduling hint: when the planner last placed this task.
    pub start_at: Option<DateTime<Utc>>,
    /// Ids of tasks that must complete before this one is eligible.
    pub dependencies: Vec<TaskId>,
    pub project_id: Option<String>,
    /// Creator of the linked project, when known.
    pub project_owner: Option<UserId>,
    pub created_by: Option<UserId>,
    pub assigned_to: Option<UserId>,
    pub assigned_team: Option<TeamId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a task with medium priority and no schedule constraints.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            priority: TaskPriority::Medium,
            due_date: None,
            is_hard_due: false,
            estimated_minutes: None,
            estimated_hours: None,
            is_completed: false,
            completed_at: None,
            snoozed_until: None,
            backlog_date: None,
            start_at: None,
            dependencies: Vec::new(),
            project_id: None,
            project_owner: None,
            created_by: None,
            assigned_to: None,
            assigned_team: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_estimated_minutes(mut self, minutes: u32) -> Self {
        self.estimated_minutes = Some(minutes);
        self
    }

    pub fn with_created_by(mut self, user: impl Into<UserId>) -> Self {
        self.created_by = Some(user.into());
        self
    }

    pub fn with_assigned_to(mut self, user: impl Into<UserId>) -> Self {
        self.assigned_to = Some(user.into());
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<TaskId>) -> Self {
        self.dependencies = deps;
        self
    }

    /// Duration to schedule, in minutes.
    ///
    /// Prefers the explicit minute estimate, then the hour estimate,
    /// then the caller-supplied fallback (the learned optimal duration
    /// or the 60-minute default).
    pub fn estimated_duration(&self, fallback_minutes: u32) -> u32 {
        if let Some(minutes) = self.estimated_minutes {
            if minutes > 0 {
                return minutes;
            }
        }
        if let Some(hours) = self.estimated_hours {
            if hours > 0 {
                return hours * 60;
            }
        }
        fallback_minutes
    }

    /// Whether the task is past its due date.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed && self.due_date.is_some_and(|due| now > due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_weights_are_ordered() {
        assert!(TaskPriority::Critical.weight() > TaskPriority::Urgent.weight());
        assert!(TaskPriority::Urgent.weight() > TaskPriority::High.weight());
        assert!(TaskPriority::High.weight() > TaskPriority::Medium.weight());
        assert!(TaskPriority::Medium.weight() > TaskPriority::Low.weight());
    }

    #[test]
    fn estimated_duration_prefers_minutes() {
        let task = Task::new("t").with_estimated_minutes(90);
        assert_eq!(task.estimated_duration(60), 90);
    }

    #[test]
    fn estimated_duration_falls_back_to_hours() {
        let mut task = Task::new("t");
        task.estimated_hours = Some(2);
        assert_eq!(task.estimated_duration(60), 120);
    }

    #[test]
    fn estimated_duration_uses_fallback() {
        let task = Task::new("t");
        assert_eq!(task.estimated_duration(60), 60);
        assert_eq!(task.estimated_duration(45), 45);
    }

    #[test]
    fn overdue_requires_incomplete_and_past_due() {
        let now = Utc::now();
        let task = Task::new("t").with_due_date(now - chrono::Duration::hours(1));
        assert!(task.is_overdue(now));

        let mut done = task.clone();
        done.is_completed = true;
        assert!(!done.is_overdue(now));

        let future = Task::new("t").with_due_date(now + chrono::Duration::hours(1));
        assert!(!future.is_overdue(now));
    }
}
