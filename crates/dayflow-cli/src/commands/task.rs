use chrono::{DateTime, NaiveTime, Utc};
use clap::Subcommand;
use dayflow_core::model::{parse_date, Task, TaskPriority};
use dayflow_core::planner::TaskStore;

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task
    Add {
        title: String,
        /// critical | urgent | high | medium | low
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Due instant (RFC 3339) or date (YYYY-MM-DD, due end of day)
        #[arg(long)]
        due: Option<String>,
        /// Treat the due date as a hard deadline
        #[arg(long)]
        hard_due: bool,
        #[arg(long)]
        estimate_minutes: Option<u32>,
        /// Owning user id
        #[arg(long)]
        user: String,
        #[arg(long)]
        project: Option<String>,
        /// Keep out of schedules until this date (YYYY-MM-DD)
        #[arg(long)]
        backlog: Option<String>,
    },
    /// List tasks visible to a user
    List {
        #[arg(long)]
        user: String,
    },
    /// Mark a task completed
    Done {
        id: String,
    },
}

/// Accepts an RFC 3339 instant or a bare date meaning end of that day.
fn parse_due(s: &str) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = parse_date(s)?;
    let end_of_day = date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN));
    Ok(DateTime::from_naive_utc_and_offset(end_of_day, Utc))
}

pub fn run(action: TaskAction) -> CliResult {
    let ctx = Context::open()?;

    match action {
        TaskAction::Add {
            title,
            priority,
            due,
            hard_due,
            estimate_minutes,
            user,
            project,
            backlog,
        } => {
            let mut task = Task::new(title)
                .with_priority(TaskPriority::from_str_lossy(&priority))
                .with_created_by(user);
            if let Some(due) = due {
                task.due_date = Some(parse_due(&due)?);
            }
            task.is_hard_due = hard_due;
            task.estimated_minutes = estimate_minutes;
            task.project_id = project;
            if let Some(backlog) = backlog {
                task.backlog_date = Some(parse_date(&backlog)?);
            }

            ctx.db.insert_task(&task)?;
            print_json(&task)
        }
        TaskAction::List { user } => {
            let team = dayflow_core::planner::TeamResolver::team_for_user(&ctx.db, &user)?;
            let tasks = ctx.db.candidate_tasks(&user, team.as_deref())?;
            print_json(&tasks)
        }
        TaskAction::Done { id } => {
            ctx.db.mark_task_completed(&id, Utc::now())?;
            println!("task {id} completed");
            Ok(())
        }
    }
}
