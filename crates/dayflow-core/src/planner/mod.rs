//! Scheduler facade: orchestrates availability resolution, task
//! prioritization, and packing for day or week scope, with preview
//! caching, atomic commits, and replanning.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::availability::AvailabilityResolver;
use crate::error::Result;
use crate::interval::TimeWindow;
use crate::model::{InsightKind, Owner, Scope, Task, TaskId, TeamId, TimeBlock};
use crate::packer::{BreakPlan, Packer, ScheduleResult};
use crate::prioritize::{prioritized_tasks, ScoreContext, DEFAULT_OPTIMAL_MINUTES};
use crate::storage::PlannerDb;

pub mod cache;

pub use cache::{CacheKey, MokaScheduleCache, NullScheduleCache, ScheduleCache};

/// Peak hours assumed before any insight has been learned.
pub const DEFAULT_PEAK_HOURS: [u32; 5] = [9, 10, 11, 14, 15];

/// Duration assumed for unestimated tasks when no insight exists.
const DEFAULT_FALLBACK_MINUTES: u32 = 60;

/// Resolves the team a user schedules under, if any.
pub trait TeamResolver {
    fn team_for_user(&self, user: &str) -> Result<Option<TeamId>>;
}

/// Query surface over the external task store.
///
/// Read-only except for the `start_at` scheduling hint written during
/// replanning.
pub trait TaskStore {
    /// Tasks visible to the user (own, assigned, project-owned, or
    /// team-assigned), bounded by the store's query limit.
    fn candidate_tasks(&self, user: &str, team: Option<&str>) -> Result<Vec<Task>>;

    fn tasks_by_ids(&self, ids: &[TaskId]) -> Result<Vec<Task>>;

    /// Tasks the user completed at or after `since`.
    fn completed_tasks_since(&self, user: &str, since: DateTime<Utc>) -> Result<Vec<Task>>;

    /// Incomplete tasks that have a work block inside `[start, end)`.
    fn incomplete_tasks_scheduled_between(
        &self,
        user: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Task>>;

    fn set_start_hint(&self, task_id: &str, start: DateTime<Utc>) -> Result<()>;
}

/// A task that was moved by a replan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduledTask {
    pub id: TaskId,
    pub title: String,
}

/// Outcome of a replanning pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleResult {
    pub rescheduled_count: usize,
    pub tasks: Vec<RescheduledTask>,
    pub new_schedule: Option<ScheduleResult>,
}

impl RescheduleResult {
    fn empty() -> Self {
        Self {
            rescheduled_count: 0,
            tasks: Vec::new(),
            new_schedule: None,
        }
    }
}

/// Insight-derived parameters feeding back into scheduling.
struct InsightParams {
    peak_hours: Vec<u32>,
    optimal_minutes: Option<u32>,
}

/// Orchestrates one user's scheduling requests.
pub struct SmartPlanner<'a> {
    db: &'a PlannerDb,
    tasks: &'a dyn TaskStore,
    teams: &'a dyn TeamResolver,
    cache: &'a dyn ScheduleCache,
    resolver: AvailabilityResolver,
}

impl<'a> SmartPlanner<'a> {
    pub fn new(
        db: &'a PlannerDb,
        tasks: &'a dyn TaskStore,
        teams: &'a dyn TeamResolver,
        cache: &'a dyn ScheduleCache,
    ) -> Self {
        Self {
            db,
            tasks,
            teams,
            cache,
            resolver: AvailabilityResolver::new(),
        }
    }

    /// Use a resolver with a non-default zone or default window.
    pub fn with_resolver(mut self, resolver: AvailabilityResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Compute (or fetch from cache) the schedule for a scope and date.
    ///
    /// Absence of capacity or of eligible tasks yields an empty
    /// schedule, not an error.
    pub fn preview(&self, user: &str, scope: Scope, date: NaiveDate) -> Result<ScheduleResult> {
        let key = CacheKey::new(user, scope, date);
        if let Some(hit) = self.cache.get(&key) {
            debug!(user, ?scope, %date, "schedule preview served from cache");
            return Ok(hit);
        }

        let result = self.compute(user, scope, date)?;
        self.cache.put(key, result.clone());
        Ok(result)
    }

    /// Persist the previewed schedule as committed time blocks.
    ///
    /// The whole batch is written in one transaction: all blocks
    /// persist or none do.
    pub fn commit(&self, user: &str, scope: Scope, date: NaiveDate) -> Result<Vec<TimeBlock>> {
        let result = self.preview(user, scope, date)?;
        let blocks = self.db.commit_blocks(user, &result.blocks).map_err(|e| {
            error!(user, ?scope, %date, error = %e, "schedule commit failed");
            e
        })?;
        info!(user, ?scope, %date, count = blocks.len(), "schedule committed");
        Ok(blocks)
    }

    /// Move unfinished work from `from` into a fresh week plan.
    ///
    /// Tasks that had blocks on `from` and are still incomplete lose
    /// their future planned blocks and get a new `start_at` hint from
    /// the regenerated schedule.
    pub fn replan(
        &self,
        user: &str,
        from: NaiveDate,
        to: Option<NaiveDate>,
    ) -> Result<RescheduleResult> {
        let day_start = self.resolver.day_start(from);
        let day_end = self.resolver.day_start(from + Duration::days(1));

        let stranded = self
            .tasks
            .incomplete_tasks_scheduled_between(user, day_start, day_end)?;
        if stranded.is_empty() {
            return Ok(RescheduleResult::empty());
        }

        let ids: Vec<TaskId> = stranded.iter().map(|t| t.id.clone()).collect();
        self.db.delete_future_planned_blocks(&ids, day_start)?;

        let target = to.unwrap_or(from + Duration::days(7));
        let schedule = self.preview(user, Scope::Week, target)?;

        let mut rescheduled = Vec::new();
        for task in &stranded {
            let first_block = schedule
                .blocks
                .iter()
                .find(|b| b.task_id.as_deref() == Some(task.id.as_str()));
            if let Some(block) = first_block {
                self.tasks.set_start_hint(&task.id, block.start)?;
                rescheduled.push(RescheduledTask {
                    id: task.id.clone(),
                    title: task.title.clone(),
                });
            }
        }

        info!(user, %from, %target, count = rescheduled.len(), "tasks rescheduled");
        Ok(RescheduleResult {
            rescheduled_count: rescheduled.len(),
            tasks: rescheduled,
            new_schedule: Some(schedule),
        })
    }

    fn compute(&self, user: &str, scope: Scope, date: NaiveDate) -> Result<ScheduleResult> {
        let team = self.teams.team_for_user(user)?;
        let params = self.insight_params(user)?;

        let start_date = scope.period_start(date);
        let days = scope.days();
        let span_start = self.resolver.day_start(start_date);
        let span_end = self
            .resolver
            .day_start(start_date + Duration::days(i64::from(days)));

        let user_templates = self
            .db
            .templates_for_owner(&Owner::User(user.to_string()))?;
        let team_templates = match &team {
            Some(t) => self.db.templates_for_owner(&Owner::Team(t.clone()))?,
            None => Vec::new(),
        };
        let events = self
            .db
            .busy_events_between(user, team.as_deref(), span_start, span_end)?;

        let windows = self.resolver.resolve_range(
            start_date,
            days,
            &user_templates,
            &team_templates,
            &events,
        );
        let windows = self.reorder_for_peak_hours(windows, &params.peak_hours);

        let all_tasks = self.tasks.candidate_tasks(user, team.as_deref())?;
        let ctx = ScoreContext::new(Utc::now())
            .with_optimal_minutes(params.optimal_minutes.unwrap_or(DEFAULT_OPTIMAL_MINUTES))
            .with_goal_projects(self.db.active_goal_projects(user)?);
        let tasks = prioritized_tasks(
            &all_tasks,
            user,
            team.as_deref(),
            span_start,
            span_end,
            &ctx,
        );

        let policy = self.db.active_break_policy(user, team.as_deref())?;
        let packer = Packer::new(BreakPlan::from_policy(policy.as_ref()))
            .with_fallback_minutes(params.optimal_minutes.unwrap_or(DEFAULT_FALLBACK_MINUTES));

        Ok(packer.pack(&tasks, &windows))
    }

    fn insight_params(&self, user: &str) -> Result<InsightParams> {
        let peak_hours = self
            .db
            .active_insight(user, InsightKind::PeakHours)?
            .and_then(|insight| {
                insight.data.get("hours").and_then(|hours| {
                    hours
                        .as_array()
                        .map(|arr| arr.iter().filter_map(|h| h.as_u64().map(|h| h as u32)).collect())
                })
            })
            .unwrap_or_else(|| DEFAULT_PEAK_HOURS.to_vec());

        let optimal_minutes = self
            .db
            .active_insight(user, InsightKind::TaskDuration)?
            .and_then(|insight| insight.data.get("minutes").and_then(|m| m.as_u64()))
            .map(|m| m as u32);

        Ok(InsightParams {
            peak_hours,
            optimal_minutes,
        })
    }

    /// Within each calendar day, move windows that touch a peak hour
    /// ahead of the rest, preserving relative order in both groups.
    /// Date order across days is untouched.
    fn reorder_for_peak_hours(&self, windows: Vec<TimeWindow>, peak_hours: &[u32]) -> Vec<TimeWindow> {
        if windows.is_empty() || peak_hours.is_empty() {
            return windows;
        }

        let tz = self.resolver.timezone();
        let mut result = Vec::with_capacity(windows.len());
        let mut day_group: Vec<TimeWindow> = Vec::new();
        let mut current_date = None;

        let flush = |group: &mut Vec<TimeWindow>, out: &mut Vec<TimeWindow>| {
            let (peak, regular): (Vec<TimeWindow>, Vec<TimeWindow>) = group
                .drain(..)
                .partition(|w| Self::touches_peak_hour(w, peak_hours, tz));
            out.extend(peak);
            out.extend(regular);
        };

        for window in windows {
            let date = window.start.with_timezone(&tz).date_naive();
            if current_date != Some(date) {
                flush(&mut day_group, &mut result);
                current_date = Some(date);
            }
            day_group.push(window);
        }
        flush(&mut day_group, &mut result);

        result
    }

    fn touches_peak_hour(window: &TimeWindow, peak_hours: &[u32], tz: chrono_tz::Tz) -> bool {
        let start_hour = window.start.with_timezone(&tz).hour();
        let end_hour = window.end.with_timezone(&tz).hour();
        peak_hours
            .iter()
            .any(|&peak| peak >= start_hour && peak <= end_hour)
    }
}
