//! Task eligibility and priority scoring.
//!
//! Eligible tasks are incomplete, visible to the requesting user, not
//! snoozed past the scope, past their backlog date, and have no
//! unfinished dependencies. Scores combine the priority level, due-date
//! urgency, hard-deadline pressure, work-goal linkage, and a quick-win
//! bonus for tasks under the learned optimal duration.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::model::Task;

/// Optimal task duration assumed before any insight has been learned.
pub const DEFAULT_OPTIMAL_MINUTES: u32 = 45;

/// Inputs that shape the priority score.
#[derive(Debug, Clone)]
pub struct ScoreContext {
    pub now: DateTime<Utc>,
    /// Learned optimal duration; tasks under it earn the quick-win bonus.
    pub optimal_minutes: u32,
    /// Projects linked to the user's active work goals.
    pub goal_projects: HashSet<String>,
}

impl ScoreContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            optimal_minutes: DEFAULT_OPTIMAL_MINUTES,
            goal_projects: HashSet::new(),
        }
    }

    pub fn with_optimal_minutes(mut self, minutes: u32) -> Self {
        self.optimal_minutes = minutes;
        self
    }

    pub fn with_goal_projects(mut self, projects: HashSet<String>) -> Self {
        self.goal_projects = projects;
        self
    }
}

/// Filter `tasks` down to the ones schedulable for `user` in the scope
/// `[scope_start, scope_end)`.
///
/// Dependency completion is checked against the supplied slice; a
/// dependency id outside the snapshot is assumed satisfied.
pub fn eligible_tasks<'a>(
    tasks: &'a [Task],
    user: &str,
    team: Option<&str>,
    scope_start: DateTime<Utc>,
    scope_end: DateTime<Utc>,
) -> Vec<&'a Task> {
    let completion: HashMap<&str, bool> = tasks
        .iter()
        .map(|t| (t.id.as_str(), t.is_completed))
        .collect();
    let scope_start_date = scope_start.date_naive();

    tasks
        .iter()
        .filter(|t| !t.is_completed)
        .filter(|t| involves_user(t, user, team))
        .filter(|t| t.snoozed_until.is_none_or(|s| s <= scope_end))
        .filter(|t| t.backlog_date.is_none_or(|b| b <= scope_start_date))
        .filter(|t| dependencies_satisfied(t, &completion))
        .collect()
}

fn involves_user(task: &Task, user: &str, team: Option<&str>) -> bool {
    task.created_by.as_deref() == Some(user)
        || task.assigned_to.as_deref() == Some(user)
        || task.project_owner.as_deref() == Some(user)
        || (team.is_some() && task.assigned_team.as_deref() == team)
}

fn dependencies_satisfied(task: &Task, completion: &HashMap<&str, bool>) -> bool {
    task.dependencies
        .iter()
        .all(|dep| completion.get(dep.as_str()).copied().unwrap_or(true))
}

/// Compute the priority score for a task.
pub fn priority_score(task: &Task, ctx: &ScoreContext) -> f64 {
    let mut score = task.priority.weight();
    score += due_date_urgency(task.due_date, ctx.now);

    if task.is_hard_due {
        score += 50.0;
    }

    if task
        .project_id
        .as_ref()
        .is_some_and(|p| ctx.goal_projects.contains(p))
    {
        score += 30.0;
    }

    if u64::from(task.estimated_duration(60)) < u64::from(ctx.optimal_minutes) {
        score += 20.0;
    }

    score
}

fn due_date_urgency(due: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(due) = due else {
        return 0.0;
    };

    let hours_until_due = (due - now).num_seconds() as f64 / 3600.0;
    if hours_until_due < 0.0 {
        200.0
    } else if hours_until_due < 24.0 {
        100.0
    } else if hours_until_due < 72.0 {
        50.0
    } else {
        (50.0 - hours_until_due / 24.0).max(0.0)
    }
}

/// Sort tasks by score descending; ties break on the earlier due date,
/// with undated tasks sorting as if due a year out.
pub fn sort_by_priority(tasks: &mut [Task], ctx: &ScoreContext) {
    let far_future = ctx.now + Duration::days(365);
    tasks.sort_by(|a, b| {
        let score_a = priority_score(a, ctx);
        let score_b = priority_score(b, ctx);
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let due_a = a.due_date.unwrap_or(far_future);
                let due_b = b.due_date.unwrap_or(far_future);
                due_a.cmp(&due_b)
            })
    });
}

/// Convenience wrapper: filter, clone, and sort in one pass.
pub fn prioritized_tasks(
    tasks: &[Task],
    user: &str,
    team: Option<&str>,
    scope_start: DateTime<Utc>,
    scope_end: DateTime<Utc>,
    ctx: &ScoreContext,
) -> Vec<Task> {
    let mut selected: Vec<Task> = eligible_tasks(tasks, user, team, scope_start, scope_end)
        .into_iter()
        .cloned()
        .collect();
    sort_by_priority(&mut selected, ctx);
    selected
}
