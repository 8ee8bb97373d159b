use chrono::{DateTime, Utc};
use clap::Subcommand;
use dayflow_core::model::{AvailabilityTemplate, BreakPolicy, CalendarEvent, Owner, WorkGoal};
use dayflow_core::storage::parse_hhmm;

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum SetupAction {
    /// Declare a weekly availability window
    Template {
        /// Owning user id (mutually exclusive with --team)
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        team: Option<String>,
        /// Weekday, 0=Monday .. 6=Sunday
        #[arg(long)]
        day: u8,
        /// Window start, HH:MM
        #[arg(long)]
        start: String,
        /// Window end, HH:MM
        #[arg(long)]
        end: String,
    },
    /// Record a calendar event
    Event {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        team: Option<String>,
        title: String,
        /// Event start (RFC 3339)
        #[arg(long)]
        start: String,
        /// Event end (RFC 3339)
        #[arg(long)]
        end: String,
        /// Mark the event as free time (busy by default)
        #[arg(long)]
        free: bool,
        #[arg(long, default_value = "manual")]
        source: String,
    },
    /// Set the focus/break cadence
    Policy {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        team: Option<String>,
        #[arg(long, default_value_t = 25)]
        focus: u32,
        #[arg(long, default_value_t = 5)]
        brk: u32,
        #[arg(long, default_value_t = 15)]
        long_break: u32,
        #[arg(long, default_value_t = 4)]
        cycles: u32,
    },
    /// Create a work goal, optionally linked to a project
    Goal {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        team: Option<String>,
        name: String,
        #[arg(long)]
        project: Option<String>,
    },
    /// Recompute a goal's progress from its project's tasks
    GoalProgress {
        id: String,
    },
    /// Assign a user to a team
    TeamAssign {
        #[arg(long)]
        user: String,
        #[arg(long)]
        team: String,
    },
}

fn owner_from_args(
    user: Option<String>,
    team: Option<String>,
) -> Result<Owner, Box<dyn std::error::Error>> {
    match (user, team) {
        (Some(u), None) => Ok(Owner::User(u)),
        (None, Some(t)) => Ok(Owner::Team(t)),
        _ => Err("exactly one of --user or --team is required".into()),
    }
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(|_| format!("invalid instant '{s}': expected RFC 3339"))?
        .with_timezone(&Utc))
}

pub fn run(action: SetupAction) -> CliResult {
    let ctx = Context::open()?;

    match action {
        SetupAction::Template {
            user,
            team,
            day,
            start,
            end,
        } => {
            if day > 6 {
                return Err("day must be 0 (Monday) .. 6 (Sunday)".into());
            }
            let template = AvailabilityTemplate::new(
                owner_from_args(user, team)?,
                day,
                parse_hhmm("start", &start)?,
                parse_hhmm("end", &end)?,
            );
            ctx.db.insert_template(&template)?;
            print_json(&template)
        }
        SetupAction::Event {
            user,
            team,
            title,
            start,
            end,
            free,
            source,
        } => {
            let mut event = CalendarEvent::new(
                owner_from_args(user, team)?,
                title,
                parse_instant(&start)?,
                parse_instant(&end)?,
            );
            event.is_busy = !free;
            event.source = source;
            ctx.db.insert_event(&event)?;
            print_json(&event)
        }
        SetupAction::Policy {
            user,
            team,
            focus,
            brk,
            long_break,
            cycles,
        } => {
            let mut policy = BreakPolicy::new(owner_from_args(user, team)?);
            policy.focus_minutes = focus;
            policy.break_minutes = brk;
            policy.long_break_minutes = long_break;
            policy.cycle_count = cycles;
            ctx.db.insert_break_policy(&policy)?;
            print_json(&policy)
        }
        SetupAction::Goal {
            user,
            team,
            name,
            project,
        } => {
            let mut goal = WorkGoal::new(owner_from_args(user, team)?, name);
            goal.project_id = project;
            ctx.db.insert_goal(&goal)?;
            print_json(&goal)
        }
        SetupAction::GoalProgress { id } => {
            match ctx.db.recompute_goal_progress(&id)? {
                Some(goal) => print_json(&goal),
                None => Err(format!("no goal with id '{id}'").into()),
            }
        }
        SetupAction::TeamAssign { user, team } => {
            ctx.db.set_team_member(&user, &team)?;
            println!("{user} assigned to {team}");
            Ok(())
        }
    }
}
