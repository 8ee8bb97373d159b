//! SQLite-based storage for planner entities.
//!
//! One database holds tasks, break policies, availability templates,
//! calendar events, time blocks, work goals, daily reviews, and
//! productivity insights. `PlannerDb` also implements the task-store
//! and team-resolver capabilities the scheduler depends on.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

use super::data_dir;
use crate::error::{DatabaseError, Result};
use crate::model::{
    AvailabilityTemplate, BlockSource, BlockStatus, BreakPolicy, CalendarEvent, DailyReview,
    InsightKind, Owner, ProductivityInsight, Task, TaskId, TaskPriority, TeamId, TimeBlock,
    WorkGoal,
};
use crate::packer::PlannedBlock;
use crate::planner::{TaskStore, TeamResolver};

// === Helper functions ===

/// Split an owner into the (owner_user, owner_team) column pair.
fn owner_columns(owner: &Owner) -> (Option<&str>, Option<&str>) {
    (owner.user_id(), owner.team_id())
}

/// Rebuild an owner from the column pair; a row with neither set is
/// treated as owned by an empty team id rather than rejected.
fn owner_from_columns(user: Option<String>, team: Option<String>) -> Owner {
    match user {
        Some(id) => Owner::User(id),
        None => Owner::Team(team.unwrap_or_default()),
    }
}

/// Parse an RFC 3339 timestamp with fallback to the current time.
fn parse_datetime_fallback(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_opt_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|v| {
        DateTime::parse_from_rfc3339(&v)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

fn parse_date_fallback(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_else(|_| Utc::now().date_naive())
}

fn parse_opt_date(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|v| NaiveDate::parse_from_str(&v, "%Y-%m-%d").ok())
}

/// Parse an `HH:MM` time-of-day column, defaulting to midnight.
fn parse_time_fallback(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .unwrap_or(NaiveTime::MIN)
}

fn format_time(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

fn parse_json_strings(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

const TASK_COLUMNS: &str = "id, title, description, priority, due_date, is_hard_due, \
     estimated_minutes, estimated_hours, is_completed, completed_at, snoozed_until, \
     backlog_date, start_at, dependencies, project_id, project_owner, created_by, \
     assigned_to, assigned_team, created_at, updated_at";

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let priority: String = row.get(3)?;
    let due_date: Option<String> = row.get(4)?;
    let completed_at: Option<String> = row.get(9)?;
    let snoozed_until: Option<String> = row.get(10)?;
    let backlog_date: Option<String> = row.get(11)?;
    let start_at: Option<String> = row.get(12)?;
    let dependencies: String = row.get(13)?;
    let created_at: String = row.get(19)?;
    let updated_at: String = row.get(20)?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        priority: TaskPriority::from_str_lossy(&priority),
        due_date: parse_opt_datetime(due_date),
        is_hard_due: row.get(5)?,
        estimated_minutes: row.get(6)?,
        estimated_hours: row.get(7)?,
        is_completed: row.get(8)?,
        completed_at: parse_opt_datetime(completed_at),
        snoozed_until: parse_opt_datetime(snoozed_until),
        backlog_date: parse_opt_date(backlog_date),
        start_at: parse_opt_datetime(start_at),
        dependencies: parse_json_strings(&dependencies),
        project_id: row.get(14)?,
        project_owner: row.get(15)?,
        created_by: row.get(16)?,
        assigned_to: row.get(17)?,
        assigned_team: row.get(18)?,
        created_at: parse_datetime_fallback(&created_at),
        updated_at: parse_datetime_fallback(&updated_at),
    })
}

const BLOCK_COLUMNS: &str =
    "id, owner_user, owner_team, task_id, title, start_at, end_at, status, is_break, source, \
     created_at, updated_at";

fn row_to_block(row: &rusqlite::Row<'_>) -> rusqlite::Result<TimeBlock> {
    let owner_user: Option<String> = row.get(1)?;
    let owner_team: Option<String> = row.get(2)?;
    let start: String = row.get(5)?;
    let end: String = row.get(6)?;
    let status: String = row.get(7)?;
    let source: String = row.get(9)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(TimeBlock {
        id: row.get(0)?,
        owner: owner_from_columns(owner_user, owner_team),
        task_id: row.get(3)?,
        title: row.get(4)?,
        start: parse_datetime_fallback(&start),
        end: parse_datetime_fallback(&end),
        status: BlockStatus::from_str_lossy(&status),
        is_break: row.get(8)?,
        source: BlockSource::from_str_lossy(&source),
        created_at: parse_datetime_fallback(&created_at),
        updated_at: parse_datetime_fallback(&updated_at),
    })
}

const REVIEW_COLUMNS: &str = "id, owner_user, date, summary, mood, highlights, lessons, \
     tomorrow_top3, tasks_planned, tasks_completed, completion_rate, focus_time_minutes, \
     break_time_minutes, productivity_score, current_streak, created_at, updated_at";

fn row_to_review(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailyReview> {
    let date: String = row.get(2)?;
    let top3: String = row.get(7)?;
    let created_at: String = row.get(15)?;
    let updated_at: String = row.get(16)?;

    Ok(DailyReview {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: parse_date_fallback(&date),
        summary: row.get(3)?,
        mood: row.get(4)?,
        highlights: row.get(5)?,
        lessons: row.get(6)?,
        tomorrow_top3: parse_json_strings(&top3),
        tasks_planned: row.get(8)?,
        tasks_completed: row.get(9)?,
        completion_rate: row.get(10)?,
        focus_time_minutes: row.get(11)?,
        break_time_minutes: row.get(12)?,
        productivity_score: row.get(13)?,
        current_streak: row.get(14)?,
        created_at: parse_datetime_fallback(&created_at),
        updated_at: parse_datetime_fallback(&updated_at),
    })
}

const INSIGHT_COLUMNS: &str = "id, owner_user, insight_type, data, confidence_score, \
     sample_size, valid_from, valid_until, is_active, created_at, updated_at";

fn row_to_insight(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProductivityInsight> {
    let kind: String = row.get(2)?;
    let data: String = row.get(3)?;
    let valid_from: String = row.get(6)?;
    let valid_until: String = row.get(7)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(ProductivityInsight {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: InsightKind::parse(&kind).unwrap_or(InsightKind::PeakHours),
        data: serde_json::from_str(&data).unwrap_or(serde_json::Value::Null),
        confidence_score: row.get(4)?,
        sample_size: row.get(5)?,
        valid_from: parse_date_fallback(&valid_from),
        valid_until: parse_date_fallback(&valid_until),
        is_active: row.get(8)?,
        created_at: parse_datetime_fallback(&created_at),
        updated_at: parse_datetime_fallback(&updated_at),
    })
}

/// Free-form journal fields written by the user, not the analyzer.
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct ReviewJournal {
    pub summary: Option<String>,
    pub mood: Option<String>,
    pub highlights: Option<String>,
    pub lessons: Option<String>,
    pub tomorrow_top3: Option<Vec<String>>,
}

/// Computed daily-review metrics written by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewMetrics {
    pub tasks_planned: u32,
    pub tasks_completed: u32,
    pub completion_rate: f64,
    pub focus_time_minutes: u32,
    pub break_time_minutes: u32,
    pub productivity_score: f64,
    pub current_streak: u32,
}

/// SQLite database for planner storage.
pub struct PlannerDb {
    conn: Connection,
    max_tasks: u32,
    max_events: u32,
    max_blocks: u32,
}

impl PlannerDb {
    /// Open the database at `~/.config/dayflow/dayflow.db`.
    ///
    /// Creates the file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("dayflow.db");
        Self::open_at(&path)
    }

    /// Open (and migrate) a database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(path),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database, mainly for tests.
    ///
    /// # Errors
    /// Returns an error if migration fails.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        super::migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn,
            max_tasks: 500,
            max_events: 1000,
            max_blocks: 5000,
        })
    }

    /// Override the query bounds from settings.
    pub fn with_limits(mut self, max_tasks: u32, max_events: u32, max_blocks: u32) -> Self {
        self.max_tasks = max_tasks;
        self.max_events = max_events;
        self.max_blocks = max_blocks;
        self
    }

    // === Tasks ===

    /// Insert a task row.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn insert_task(&self, task: &Task) -> Result<()> {
        let deps = serde_json::to_string(&task.dependencies)?;
        self.conn.execute(
            &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"),
            params![
                task.id,
                task.title,
                task.description,
                task.priority.as_str(),
                task.due_date.map(|d| d.to_rfc3339()),
                task.is_hard_due,
                task.estimated_minutes,
                task.estimated_hours,
                task.is_completed,
                task.completed_at.map(|d| d.to_rfc3339()),
                task.snoozed_until.map(|d| d.to_rfc3339()),
                task.backlog_date.map(|d| d.to_string()),
                task.start_at.map(|d| d.to_rfc3339()),
                deps,
                task.project_id,
                task.project_owner,
                task.created_by,
                task.assigned_to,
                task.assigned_team,
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Mark a task completed at the given instant.
    pub fn mark_task_completed(&self, task_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE tasks SET is_completed = 1, completed_at = ?2, updated_at = ?3 WHERE id = ?1",
            params![task_id, at.to_rfc3339(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Fetch a single task.
    pub fn task(&self, task_id: &str) -> Result<Option<Task>> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![task_id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    // === Break policies ===

    pub fn insert_break_policy(&self, policy: &BreakPolicy) -> Result<()> {
        let (owner_user, owner_team) = owner_columns(&policy.owner);
        self.conn.execute(
            "INSERT INTO break_policies (id, owner_user, owner_team, focus_minutes, break_minutes,
                 long_break_minutes, cycle_count, active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                policy.id,
                owner_user,
                owner_team,
                policy.focus_minutes,
                policy.break_minutes,
                policy.long_break_minutes,
                policy.cycle_count,
                policy.active,
                policy.created_at.to_rfc3339(),
                policy.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// The active policy for a user, falling back to their team.
    /// First match wins when several are active.
    pub fn active_break_policy(&self, user: &str, team: Option<&str>) -> Result<Option<BreakPolicy>> {
        let user_policy = self.first_active_policy("owner_user", user)?;
        if user_policy.is_some() {
            return Ok(user_policy);
        }
        match team {
            Some(t) => self.first_active_policy("owner_team", t),
            None => Ok(None),
        }
    }

    fn first_active_policy(&self, column: &str, id: &str) -> Result<Option<BreakPolicy>> {
        let policy = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, owner_user, owner_team, focus_minutes, break_minutes,
                            long_break_minutes, cycle_count, active, created_at, updated_at
                     FROM break_policies WHERE {column} = ?1 AND active = 1
                     ORDER BY created_at LIMIT 1"
                ),
                params![id],
                |row| {
                    let owner_user: Option<String> = row.get(1)?;
                    let owner_team: Option<String> = row.get(2)?;
                    let created_at: String = row.get(8)?;
                    let updated_at: String = row.get(9)?;
                    Ok(BreakPolicy {
                        id: row.get(0)?,
                        owner: owner_from_columns(owner_user, owner_team),
                        focus_minutes: row.get(3)?,
                        break_minutes: row.get(4)?,
                        long_break_minutes: row.get(5)?,
                        cycle_count: row.get(6)?,
                        active: row.get(7)?,
                        created_at: parse_datetime_fallback(&created_at),
                        updated_at: parse_datetime_fallback(&updated_at),
                    })
                },
            )
            .optional()?;
        Ok(policy)
    }

    // === Availability templates ===

    pub fn insert_template(&self, template: &AvailabilityTemplate) -> Result<()> {
        let (owner_user, owner_team) = owner_columns(&template.owner);
        self.conn.execute(
            "INSERT INTO availability_templates
                 (id, owner_user, owner_team, day_of_week, start_time, end_time, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                template.id,
                owner_user,
                owner_team,
                template.day_of_week,
                format_time(template.start_time),
                format_time(template.end_time),
                template.created_at.to_rfc3339(),
                template.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All templates declared by an owner, across all weekdays.
    pub fn templates_for_owner(&self, owner: &Owner) -> Result<Vec<AvailabilityTemplate>> {
        let (column, id) = match owner {
            Owner::User(id) => ("owner_user", id.as_str()),
            Owner::Team(id) => ("owner_team", id.as_str()),
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, owner_user, owner_team, day_of_week, start_time, end_time,
                    created_at, updated_at
             FROM availability_templates WHERE {column} = ?1
             ORDER BY day_of_week, start_time"
        ))?;
        let rows = stmt.query_map(params![id], |row| {
            let owner_user: Option<String> = row.get(1)?;
            let owner_team: Option<String> = row.get(2)?;
            let start: String = row.get(4)?;
            let end: String = row.get(5)?;
            let created_at: String = row.get(6)?;
            let updated_at: String = row.get(7)?;
            Ok(AvailabilityTemplate {
                id: row.get(0)?,
                owner: owner_from_columns(owner_user, owner_team),
                day_of_week: row.get(3)?,
                start_time: parse_time_fallback(&start),
                end_time: parse_time_fallback(&end),
                created_at: parse_datetime_fallback(&created_at),
                updated_at: parse_datetime_fallback(&updated_at),
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    // === Calendar events ===

    pub fn insert_event(&self, event: &CalendarEvent) -> Result<()> {
        let (owner_user, owner_team) = owner_columns(&event.owner);
        self.conn.execute(
            "INSERT INTO calendar_events
                 (id, owner_user, owner_team, title, description, start_at, end_at, is_busy,
                  source, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                event.id,
                owner_user,
                owner_team,
                event.title,
                event.description,
                event.start.to_rfc3339(),
                event.end.to_rfc3339(),
                event.is_busy,
                event.source,
                event.created_at.to_rfc3339(),
                event.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Busy events for the user or their team overlapping `[start, end)`.
    pub fn busy_events_between(
        &self,
        user: &str,
        team: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_user, owner_team, title, description, start_at, end_at, is_busy,
                    source, created_at, updated_at
             FROM calendar_events
             WHERE is_busy = 1 AND start_at < ?3 AND end_at > ?4
               AND (owner_user = ?1 OR (?2 IS NOT NULL AND owner_team = ?2))
             ORDER BY start_at LIMIT ?5",
        )?;
        let rows = stmt.query_map(
            params![user, team, end.to_rfc3339(), start.to_rfc3339(), self.max_events],
            |row| {
                let owner_user: Option<String> = row.get(1)?;
                let owner_team: Option<String> = row.get(2)?;
                let start: String = row.get(5)?;
                let end: String = row.get(6)?;
                let created_at: String = row.get(9)?;
                let updated_at: String = row.get(10)?;
                Ok(CalendarEvent {
                    id: row.get(0)?,
                    owner: owner_from_columns(owner_user, owner_team),
                    title: row.get(3)?,
                    description: row.get(4)?,
                    start: parse_datetime_fallback(&start),
                    end: parse_datetime_fallback(&end),
                    is_busy: row.get(7)?,
                    source: row.get(8)?,
                    created_at: parse_datetime_fallback(&created_at),
                    updated_at: parse_datetime_fallback(&updated_at),
                })
            },
        )?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    // === Time blocks ===

    /// Persist a previewed schedule as committed blocks, atomically.
    ///
    /// # Errors
    /// Any failure rolls back the whole batch; no partial schedule is
    /// ever written.
    pub fn commit_blocks(&self, user: &str, blocks: &[PlannedBlock]) -> Result<Vec<TimeBlock>> {
        let now = Utc::now();
        let tx = self.conn.unchecked_transaction()?;

        let mut committed = Vec::with_capacity(blocks.len());
        for block in blocks {
            let record = TimeBlock {
                id: Uuid::new_v4().to_string(),
                owner: Owner::User(user.to_string()),
                task_id: block.task_id.clone(),
                title: block.title.clone(),
                start: block.start,
                end: block.end,
                status: BlockStatus::Committed,
                is_break: block.is_break,
                source: BlockSource::Auto,
                created_at: now,
                updated_at: now,
            };
            tx.execute(
                &format!("INSERT INTO time_blocks ({BLOCK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"),
                params![
                    record.id,
                    record.owner.user_id(),
                    record.owner.team_id(),
                    record.task_id,
                    record.title,
                    record.start.to_rfc3339(),
                    record.end.to_rfc3339(),
                    record.status.as_str(),
                    record.is_break,
                    record.source.as_str(),
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            committed.push(record);
        }

        tx.commit()?;
        Ok(committed)
    }

    /// Insert a single block row (manual blocks, tests, seeds).
    pub fn insert_block(&self, block: &TimeBlock) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO time_blocks ({BLOCK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"),
            params![
                block.id,
                block.owner.user_id(),
                block.owner.team_id(),
                block.task_id,
                block.title,
                block.start.to_rfc3339(),
                block.end.to_rfc3339(),
                block.status.as_str(),
                block.is_break,
                block.source.as_str(),
                block.created_at.to_rfc3339(),
                block.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Advance a block's lifecycle status.
    pub fn update_block_status(&self, block_id: &str, status: BlockStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE time_blocks SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![block_id, status.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// A user's blocks starting inside `[start, end)`, in time order.
    pub fn blocks_between(
        &self,
        user: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeBlock>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM time_blocks
             WHERE owner_user = ?1 AND start_at >= ?2 AND start_at < ?3
             ORDER BY start_at LIMIT ?4"
        ))?;
        let rows = stmt.query_map(
            params![user, start.to_rfc3339(), end.to_rfc3339(), self.max_blocks],
            row_to_block,
        )?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Completed work blocks since `since` (break blocks excluded).
    pub fn completed_focus_blocks_since(
        &self,
        user: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TimeBlock>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM time_blocks
             WHERE owner_user = ?1 AND status = 'completed' AND is_break = 0 AND start_at >= ?2
             ORDER BY start_at LIMIT ?3"
        ))?;
        let rows = stmt.query_map(
            params![user, since.to_rfc3339(), self.max_blocks],
            row_to_block,
        )?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Delete future planned blocks for the given tasks, returning the
    /// number of rows removed.
    pub fn delete_future_planned_blocks(
        &self,
        task_ids: &[TaskId],
        from: DateTime<Utc>,
    ) -> Result<usize> {
        if task_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; task_ids.len()].join(", ");
        let sql = format!(
            "DELETE FROM time_blocks
             WHERE status = 'planned' AND start_at >= ? AND task_id IN ({placeholders})"
        );
        let mut values: Vec<String> = Vec::with_capacity(task_ids.len() + 1);
        values.push(from.to_rfc3339());
        values.extend(task_ids.iter().cloned());
        let deleted = self.conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(deleted)
    }

    // === Work goals ===

    pub fn insert_goal(&self, goal: &WorkGoal) -> Result<()> {
        let (owner_user, owner_team) = owner_columns(&goal.owner);
        self.conn.execute(
            "INSERT INTO work_goals
                 (id, owner_user, owner_team, name, description, project_id, target_date,
                  is_active, progress_percentage, total_tasks, completed_tasks, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                goal.id,
                owner_user,
                owner_team,
                goal.name,
                goal.description,
                goal.project_id,
                goal.target_date.map(|d| d.to_string()),
                goal.is_active,
                goal.progress_percentage,
                goal.total_tasks,
                goal.completed_tasks,
                goal.created_at.to_rfc3339(),
                goal.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Projects linked to the user's active work goals.
    pub fn active_goal_projects(&self, user: &str) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id FROM work_goals
             WHERE owner_user = ?1 AND is_active = 1 AND project_id IS NOT NULL",
        )?;
        let rows = stmt.query_map(params![user], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<HashSet<_>>>().map_err(Into::into)
    }

    /// Recompute a goal's progress from its project's tasks.
    pub fn recompute_goal_progress(&self, goal_id: &str) -> Result<Option<WorkGoal>> {
        let Some(goal) = self.goal(goal_id)? else {
            return Ok(None);
        };

        let (total, completed) = match &goal.project_id {
            Some(project) => self.conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(is_completed), 0) FROM tasks WHERE project_id = ?1",
                params![project],
                |row| Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?)),
            )?,
            None => (0, 0),
        };
        let progress = if total > 0 {
            f64::from(completed) / f64::from(total) * 100.0
        } else {
            0.0
        };

        self.conn.execute(
            "UPDATE work_goals
             SET total_tasks = ?2, completed_tasks = ?3, progress_percentage = ?4, updated_at = ?5
             WHERE id = ?1",
            params![goal_id, total, completed, progress, Utc::now().to_rfc3339()],
        )?;
        self.goal(goal_id)
    }

    fn goal(&self, goal_id: &str) -> Result<Option<WorkGoal>> {
        let goal = self
            .conn
            .query_row(
                "SELECT id, owner_user, owner_team, name, description, project_id, target_date,
                        is_active, progress_percentage, total_tasks, completed_tasks,
                        created_at, updated_at
                 FROM work_goals WHERE id = ?1",
                params![goal_id],
                |row| {
                    let owner_user: Option<String> = row.get(1)?;
                    let owner_team: Option<String> = row.get(2)?;
                    let target_date: Option<String> = row.get(6)?;
                    let created_at: String = row.get(11)?;
                    let updated_at: String = row.get(12)?;
                    Ok(WorkGoal {
                        id: row.get(0)?,
                        owner: owner_from_columns(owner_user, owner_team),
                        name: row.get(3)?,
                        description: row.get(4)?,
                        project_id: row.get(5)?,
                        target_date: parse_opt_date(target_date),
                        is_active: row.get(7)?,
                        progress_percentage: row.get(8)?,
                        total_tasks: row.get(9)?,
                        completed_tasks: row.get(10)?,
                        created_at: parse_datetime_fallback(&created_at),
                        updated_at: parse_datetime_fallback(&updated_at),
                    })
                },
            )
            .optional()?;
        Ok(goal)
    }

    // === Daily reviews ===

    pub fn daily_review(&self, user: &str, date: NaiveDate) -> Result<Option<DailyReview>> {
        let review = self
            .conn
            .query_row(
                &format!("SELECT {REVIEW_COLUMNS} FROM daily_reviews WHERE owner_user = ?1 AND date = ?2"),
                params![user, date.to_string()],
                row_to_review,
            )
            .optional()?;
        Ok(review)
    }

    pub fn count_reviews(&self, user: &str) -> Result<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM daily_reviews WHERE owner_user = ?1",
            params![user],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Reviews on or after `since`, oldest first.
    pub fn reviews_since(&self, user: &str, since: NaiveDate) -> Result<Vec<DailyReview>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REVIEW_COLUMNS} FROM daily_reviews
             WHERE owner_user = ?1 AND date >= ?2 ORDER BY date"
        ))?;
        let rows = stmt.query_map(params![user, since.to_string()], row_to_review)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Get-or-create the (user, date) review and write its metrics.
    ///
    /// Journal fields are preserved on update; the unique index
    /// guarantees a second row is never created.
    pub fn upsert_daily_review(
        &self,
        user: &str,
        date: NaiveDate,
        metrics: &ReviewMetrics,
    ) -> Result<DailyReview> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO daily_reviews
                 (id, owner_user, date, tasks_planned, tasks_completed, completion_rate,
                  focus_time_minutes, break_time_minutes, productivity_score, current_streak,
                  created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
             ON CONFLICT(owner_user, date) DO UPDATE SET
                 tasks_planned = excluded.tasks_planned,
                 tasks_completed = excluded.tasks_completed,
                 completion_rate = excluded.completion_rate,
                 focus_time_minutes = excluded.focus_time_minutes,
                 break_time_minutes = excluded.break_time_minutes,
                 productivity_score = excluded.productivity_score,
                 current_streak = excluded.current_streak,
                 updated_at = excluded.updated_at",
            params![
                Uuid::new_v4().to_string(),
                user,
                date.to_string(),
                metrics.tasks_planned,
                metrics.tasks_completed,
                metrics.completion_rate,
                metrics.focus_time_minutes,
                metrics.break_time_minutes,
                metrics.productivity_score,
                metrics.current_streak,
                now,
            ],
        )?;

        self.daily_review(user, date)?.ok_or_else(|| {
            DatabaseError::QueryFailed("daily review missing after upsert".to_string()).into()
        })
    }

    /// Write journal fields for (user, date), creating the row with
    /// zeroed metrics if the review has not been computed yet.
    ///
    /// Fields left `None` keep their stored value; metrics columns are
    /// never touched here.
    pub fn update_review_journal(
        &self,
        user: &str,
        date: NaiveDate,
        journal: &ReviewJournal,
    ) -> Result<DailyReview> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO daily_reviews (id, owner_user, date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(owner_user, date) DO NOTHING",
            params![Uuid::new_v4().to_string(), user, date.to_string(), now],
        )?;

        let top3 = journal
            .tomorrow_top3
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn.execute(
            "UPDATE daily_reviews SET
                 summary = COALESCE(?3, summary),
                 mood = COALESCE(?4, mood),
                 highlights = COALESCE(?5, highlights),
                 lessons = COALESCE(?6, lessons),
                 tomorrow_top3 = COALESCE(?7, tomorrow_top3),
                 updated_at = ?8
             WHERE owner_user = ?1 AND date = ?2",
            params![
                user,
                date.to_string(),
                journal.summary,
                journal.mood,
                journal.highlights,
                journal.lessons,
                top3,
                now,
            ],
        )?;

        self.daily_review(user, date)?.ok_or_else(|| {
            DatabaseError::QueryFailed("daily review missing after journal update".to_string())
                .into()
        })
    }

    // === Productivity insights ===

    pub fn active_insight(&self, user: &str, kind: InsightKind) -> Result<Option<ProductivityInsight>> {
        let insight = self
            .conn
            .query_row(
                &format!(
                    "SELECT {INSIGHT_COLUMNS} FROM productivity_insights
                     WHERE owner_user = ?1 AND insight_type = ?2 AND is_active = 1"
                ),
                params![user, kind.as_str()],
                row_to_insight,
            )
            .optional()?;
        Ok(insight)
    }

    /// Update-or-create the (user, kind) insight.
    #[allow(clippy::too_many_arguments)]
    pub fn upsert_insight(
        &self,
        user: &str,
        kind: InsightKind,
        data: &serde_json::Value,
        confidence_score: f64,
        sample_size: u32,
        valid_from: NaiveDate,
        valid_until: NaiveDate,
    ) -> Result<ProductivityInsight> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO productivity_insights
                 (id, owner_user, insight_type, data, confidence_score, sample_size,
                  valid_from, valid_until, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9)
             ON CONFLICT(owner_user, insight_type) DO UPDATE SET
                 data = excluded.data,
                 confidence_score = excluded.confidence_score,
                 sample_size = excluded.sample_size,
                 valid_from = excluded.valid_from,
                 valid_until = excluded.valid_until,
                 is_active = 1,
                 updated_at = excluded.updated_at",
            params![
                Uuid::new_v4().to_string(),
                user,
                kind.as_str(),
                serde_json::to_string(data)?,
                confidence_score,
                sample_size,
                valid_from.to_string(),
                valid_until.to_string(),
                now,
            ],
        )?;

        self.active_insight(user, kind)?.ok_or_else(|| {
            DatabaseError::QueryFailed("insight missing after upsert".to_string()).into()
        })
    }

    // === Team membership ===

    /// Record (or replace) a user's team membership.
    pub fn set_team_member(&self, user: &str, team: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO team_members (user_id, team_id) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET team_id = excluded.team_id",
            params![user, team],
        )?;
        Ok(())
    }
}

impl TeamResolver for PlannerDb {
    fn team_for_user(&self, user: &str) -> Result<Option<TeamId>> {
        let team = self
            .conn
            .query_row(
                "SELECT team_id FROM team_members WHERE user_id = ?1",
                params![user],
                |row| row.get(0),
            )
            .optional()?;
        Ok(team)
    }
}

impl TaskStore for PlannerDb {
    fn candidate_tasks(&self, user: &str, team: Option<&str>) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE created_by = ?1 OR assigned_to = ?1 OR project_owner = ?1
                OR (?2 IS NOT NULL AND assigned_team = ?2)
             ORDER BY is_completed, due_date IS NULL, due_date
             LIMIT ?3"
        ))?;
        let rows = stmt.query_map(params![user, team, self.max_tasks], row_to_task)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    fn tasks_by_ids(&self, ids: &[TaskId]) -> Result<Vec<Task>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id IN ({placeholders})"
        ))?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), row_to_task)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    fn completed_tasks_since(&self, user: &str, since: DateTime<Utc>) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE is_completed = 1 AND completed_at >= ?2
               AND (created_by = ?1 OR assigned_to = ?1)
             LIMIT ?3"
        ))?;
        let rows = stmt.query_map(params![user, since.to_rfc3339(), self.max_tasks], row_to_task)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    fn incomplete_tasks_scheduled_between(
        &self,
        user: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT {TASK_COLUMNS} FROM tasks
             WHERE is_completed = 0 AND id IN (
                 SELECT task_id FROM time_blocks
                 WHERE owner_user = ?1 AND is_break = 0 AND task_id IS NOT NULL
                   AND start_at >= ?2 AND start_at < ?3
             )"
        ))?;
        let rows = stmt.query_map(params![user, start.to_rfc3339(), end.to_rfc3339()], row_to_task)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    fn set_start_hint(&self, task_id: &str, start: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE tasks SET start_at = ?2, updated_at = ?3 WHERE id = ?1",
            params![task_id, start.to_rfc3339(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}
