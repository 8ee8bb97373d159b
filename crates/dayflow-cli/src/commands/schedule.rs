use clap::Subcommand;
use dayflow_core::model::{parse_date, Scope};
use dayflow_core::planner::SmartPlanner;

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Compute a schedule without persisting it
    Preview {
        /// User to schedule for
        #[arg(long)]
        user: String,
        /// Planning horizon: day or week
        #[arg(long, default_value = "day")]
        scope: String,
        /// Target date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
    },
    /// Compute and persist the schedule as committed blocks
    Commit {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "day")]
        scope: String,
        #[arg(long)]
        date: String,
    },
    /// Move unfinished work from a date into a fresh week plan
    Replan {
        #[arg(long)]
        user: String,
        /// Date whose unfinished tasks should move (YYYY-MM-DD)
        #[arg(long)]
        from: String,
        /// Target date for the new plan; defaults to from + 7 days
        #[arg(long)]
        to: Option<String>,
    },
}

pub fn run(action: ScheduleAction) -> CliResult {
    let ctx = Context::open()?;
    let resolver = ctx.resolver()?;
    let planner = SmartPlanner::new(&ctx.db, &ctx.db, &ctx.db, &ctx.cache).with_resolver(resolver);

    match action {
        ScheduleAction::Preview { user, scope, date } => {
            let scope = Scope::parse(&scope)?;
            let date = parse_date(&date)?;
            let result = planner.preview(&user, scope, date)?;
            print_json(&result)
        }
        ScheduleAction::Commit { user, scope, date } => {
            let scope = Scope::parse(&scope)?;
            let date = parse_date(&date)?;
            let blocks = planner.commit(&user, scope, date)?;
            print_json(&blocks)
        }
        ScheduleAction::Replan { user, from, to } => {
            let from = parse_date(&from)?;
            let to = to.as_deref().map(parse_date).transpose()?;
            let result = planner.replan(&user, from, to)?;
            print_json(&result)
        }
    }
}
