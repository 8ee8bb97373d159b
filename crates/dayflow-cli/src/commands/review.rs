use clap::Subcommand;
use dayflow_core::model::parse_date;
use dayflow_core::storage::ReviewJournal;
use dayflow_core::ProductivityAnalyzer;

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum ReviewAction {
    /// Recompute the daily review metrics for a date
    Compute {
        #[arg(long)]
        user: String,
        /// Date to review (YYYY-MM-DD)
        #[arg(long)]
        date: String,
    },
    /// Write free-form journal fields for a date
    Journal {
        #[arg(long)]
        user: String,
        /// Date to journal (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        mood: Option<String>,
        #[arg(long)]
        highlights: Option<String>,
        #[arg(long)]
        lessons: Option<String>,
        /// Top priority for tomorrow; repeat up to three times
        #[arg(long = "top3")]
        tomorrow_top3: Vec<String>,
    },
    /// Regenerate productivity insights (needs 7+ review days)
    Insights {
        #[arg(long)]
        user: String,
    },
    /// Rollup of recent review history
    Stats {
        #[arg(long)]
        user: String,
        /// Days of history to aggregate
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}

pub fn run(action: ReviewAction) -> CliResult {
    let ctx = Context::open()?;
    let tz = ctx.settings.tz()?;
    let analyzer = ProductivityAnalyzer::new(&ctx.db, &ctx.db).with_timezone(tz);

    match action {
        ReviewAction::Compute { user, date } => {
            let date = parse_date(&date)?;
            let review = analyzer.compute_daily_review(&user, date)?;
            print_json(&review)
        }
        ReviewAction::Journal {
            user,
            date,
            summary,
            mood,
            highlights,
            lessons,
            tomorrow_top3,
        } => {
            let date = parse_date(&date)?;
            let journal = ReviewJournal {
                summary,
                mood,
                highlights,
                lessons,
                tomorrow_top3: if tomorrow_top3.is_empty() {
                    None
                } else {
                    Some(tomorrow_top3)
                },
            };
            let review = ctx.db.update_review_journal(&user, date, &journal)?;
            print_json(&review)
        }
        ReviewAction::Insights { user } => {
            let insights = analyzer.generate_insights(&user)?;
            if insights.is_empty() {
                println!("{{}}");
                return Ok(());
            }
            print_json(&insights)
        }
        ReviewAction::Stats { user, days } => {
            let stats = analyzer.productivity_stats(&user, days)?;
            print_json(&stats)
        }
    }
}
