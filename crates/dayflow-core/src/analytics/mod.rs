//! Productivity analytics: daily reviews and longer-horizon insights
//! derived from committed time blocks and task completion history.
//!
//! Reviews are recomputed idempotently per (user, date). Insights need
//! at least seven days of review history; below that the generator
//! returns an empty map rather than guessing from noise.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::Result;
use crate::model::{BlockStatus, DailyReview, InsightKind, ProductivityInsight, TaskId};
use crate::planner::{TaskStore, DEFAULT_PEAK_HOURS};
use crate::storage::{PlannerDb, ReviewMetrics};

/// Reviews required before any insight is generated.
pub const MIN_REVIEWS_FOR_INSIGHTS: u32 = 7;

/// Completion rate (percent) that keeps a streak alive.
const STREAK_THRESHOLD: f64 = 70.0;

/// How far back block/task history feeds the 30-day insights.
const INSIGHT_WINDOW_DAYS: i64 = 30;

/// How far back the weekday trend looks (8 weeks).
const TREND_WINDOW_DAYS: i64 = 56;

/// How long a generated insight stays valid.
const INSIGHT_VALIDITY_DAYS: i64 = 30;

/// Rollup of recent reviews for reporting surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductivityStats {
    pub avg_productivity_score: f64,
    pub avg_completion_rate: f64,
    pub current_streak: u32,
    pub total_focus_hours: f64,
    /// "improving", "stable", "declining", or "no_data".
    pub trend: String,
    pub total_days: u32,
}

/// Weighted daily productivity score, clamped to [0, 100].
///
/// Rewards completion rate (40%), focus volume against a five-hour
/// optimum (30 points), a break ratio near 20% (15 points, only when
/// any focus happened), and streak length (15 points).
pub fn productivity_score(
    completion_rate: f64,
    focus_minutes: u32,
    break_minutes: u32,
    streak: u32,
) -> f64 {
    let mut score = completion_rate * 0.4;
    score += (f64::from(focus_minutes) / 300.0).min(1.0) * 30.0;
    if focus_minutes > 0 {
        let break_ratio = f64::from(break_minutes) / f64::from(focus_minutes);
        score += (15.0 - (break_ratio - 0.2).abs() * 75.0).max(0.0);
    }
    score += (f64::from(streak) * 2.0).min(15.0);
    score.clamp(0.0, 100.0)
}

/// Computes daily reviews and regenerates productivity insights.
pub struct ProductivityAnalyzer<'a> {
    db: &'a PlannerDb,
    tasks: &'a dyn TaskStore,
    tz: Tz,
}

impl<'a> ProductivityAnalyzer<'a> {
    pub fn new(db: &'a PlannerDb, tasks: &'a dyn TaskStore) -> Self {
        Self {
            db,
            tasks,
            tz: chrono_tz::UTC,
        }
    }

    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    /// Recompute the review for (user, date).
    ///
    /// Get-or-create semantics: repeated calls with unchanged data
    /// yield the same row and the same metrics.
    pub fn compute_daily_review(&self, user: &str, date: NaiveDate) -> Result<DailyReview> {
        let (start, end) = self.day_span(date);
        let blocks = self.db.blocks_between(user, start, end)?;

        let planned_ids: HashSet<&str> = blocks
            .iter()
            .filter(|b| !b.is_break)
            .filter_map(|b| b.task_id.as_deref())
            .collect();
        let ids: Vec<TaskId> = planned_ids.iter().map(|id| (*id).to_string()).collect();
        let scheduled_tasks = self.tasks.tasks_by_ids(&ids)?;

        let tasks_planned = planned_ids.len() as u32;
        let tasks_completed = scheduled_tasks
            .iter()
            .filter(|t| t.is_completed)
            .filter(|t| t.completed_at.is_some_and(|at| at >= start && at < end))
            .count() as u32;

        let executed = |status: BlockStatus| {
            matches!(status, BlockStatus::Completed | BlockStatus::Active)
        };
        let focus_time_minutes: i64 = blocks
            .iter()
            .filter(|b| !b.is_break && executed(b.status))
            .map(|b| b.duration_minutes())
            .sum();
        let break_time_minutes: i64 = blocks
            .iter()
            .filter(|b| b.is_break && executed(b.status))
            .map(|b| b.duration_minutes())
            .sum();
        let focus_time_minutes = focus_time_minutes.max(0) as u32;
        let break_time_minutes = break_time_minutes.max(0) as u32;

        let completion_rate = if tasks_planned > 0 {
            f64::from(tasks_completed) / f64::from(tasks_planned) * 100.0
        } else {
            0.0
        };

        let prior_streak = self
            .db
            .daily_review(user, date - Duration::days(1))?
            .map(|r| r.current_streak)
            .unwrap_or(0);
        let current_streak = if completion_rate >= STREAK_THRESHOLD {
            prior_streak + 1
        } else {
            0
        };

        let metrics = ReviewMetrics {
            tasks_planned,
            tasks_completed,
            completion_rate,
            focus_time_minutes,
            break_time_minutes,
            productivity_score: productivity_score(
                completion_rate,
                focus_time_minutes,
                break_time_minutes,
                current_streak,
            ),
            current_streak,
        };
        self.db.upsert_daily_review(user, date, &metrics)
    }

    /// Regenerate every insight for a user.
    ///
    /// Returns an empty map with fewer than seven reviews on record.
    pub fn generate_insights(
        &self,
        user: &str,
    ) -> Result<BTreeMap<InsightKind, ProductivityInsight>> {
        let mut insights = BTreeMap::new();

        let review_count = self.db.count_reviews(user)?;
        if review_count < MIN_REVIEWS_FOR_INSIGHTS {
            debug!(user, review_count, "not enough history for insights");
            return Ok(insights);
        }

        let today = self.today();
        insights.insert(InsightKind::PeakHours, self.analyze_peak_hours(user, today)?);
        insights.insert(
            InsightKind::TaskDuration,
            self.analyze_task_duration(user, today)?,
        );
        insights.insert(
            InsightKind::BreakPattern,
            self.analyze_break_pattern(user, today)?,
        );
        insights.insert(
            InsightKind::WeeklyTrend,
            self.analyze_weekly_trend(user, today)?,
        );
        insights.insert(
            InsightKind::CompletionPattern,
            self.analyze_completion_pattern(user, today)?,
        );

        Ok(insights)
    }

    /// Rollup of the last `days` days of reviews.
    pub fn productivity_stats(&self, user: &str, days: u32) -> Result<ProductivityStats> {
        let today = self.today();
        let reviews = self
            .db
            .reviews_since(user, today - Duration::days(i64::from(days)))?;

        if reviews.is_empty() {
            return Ok(ProductivityStats {
                avg_productivity_score: 0.0,
                avg_completion_rate: 0.0,
                current_streak: 0,
                total_focus_hours: 0.0,
                trend: "no_data".to_string(),
                total_days: 0,
            });
        }

        let n = reviews.len() as f64;
        let avg_score = reviews.iter().map(|r| r.productivity_score).sum::<f64>() / n;
        let avg_rate = reviews.iter().map(|r| r.completion_rate).sum::<f64>() / n;
        let focus_hours = reviews
            .iter()
            .map(|r| f64::from(r.focus_time_minutes))
            .sum::<f64>()
            / 60.0;
        let scores: Vec<f64> = reviews.iter().map(|r| r.productivity_score).collect();

        Ok(ProductivityStats {
            avg_productivity_score: avg_score,
            avg_completion_rate: avg_rate,
            current_streak: reviews.last().map(|r| r.current_streak).unwrap_or(0),
            total_focus_hours: focus_hours,
            trend: trend_label(&scores).to_string(),
            total_days: reviews.len() as u32,
        })
    }

    fn analyze_peak_hours(&self, user: &str, today: NaiveDate) -> Result<ProductivityInsight> {
        let since = Utc::now() - Duration::days(INSIGHT_WINDOW_DAYS);
        let blocks = self.db.completed_focus_blocks_since(user, since)?;

        let mut by_hour: HashMap<u32, u32> = HashMap::new();
        for block in &blocks {
            let hour = block.start.with_timezone(&self.tz).hour();
            *by_hour.entry(hour).or_default() += 1;
        }

        let hours: Vec<u32> = if by_hour.is_empty() {
            DEFAULT_PEAK_HOURS.to_vec()
        } else {
            let mut counted: Vec<(u32, u32)> = by_hour.into_iter().collect();
            counted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            // Top 40% of productive hours, at least one.
            let take = (counted.len() * 2 / 5).max(1);
            counted.into_iter().take(take).map(|(hour, _)| hour).collect()
        };

        let sample = blocks.len() as u32;
        self.db.upsert_insight(
            user,
            InsightKind::PeakHours,
            &json!({ "hours": hours }),
            f64::from((sample * 2).min(100)),
            sample,
            today,
            today + Duration::days(INSIGHT_VALIDITY_DAYS),
        )
    }

    fn analyze_task_duration(&self, user: &str, today: NaiveDate) -> Result<ProductivityInsight> {
        let since = Utc::now() - Duration::days(INSIGHT_WINDOW_DAYS);
        let estimates: Vec<u32> = self
            .tasks
            .completed_tasks_since(user, since)?
            .iter()
            .filter_map(|t| t.estimated_minutes)
            .collect();

        let optimal = if estimates.is_empty() {
            crate::prioritize::DEFAULT_OPTIMAL_MINUTES
        } else {
            let sum: u64 = estimates.iter().map(|&m| u64::from(m)).sum();
            (sum / estimates.len() as u64) as u32
        };

        let sample = estimates.len() as u32;
        self.db.upsert_insight(
            user,
            InsightKind::TaskDuration,
            &json!({ "minutes": optimal }),
            f64::from((sample * 5).min(100)),
            sample,
            today,
            today + Duration::days(INSIGHT_VALIDITY_DAYS),
        )
    }

    fn analyze_break_pattern(&self, user: &str, today: NaiveDate) -> Result<ProductivityInsight> {
        let reviews: Vec<DailyReview> = self
            .db
            .reviews_since(user, today - Duration::days(INSIGHT_WINDOW_DAYS))?
            .into_iter()
            .filter(|r| r.focus_time_minutes > 0 && r.break_time_minutes > 0)
            .collect();

        // The break:focus ratio of the single best-scoring day, kept
        // inside a sane band.
        let mut optimal_ratio = 0.2;
        let mut best_score = 0.0;
        for review in &reviews {
            if review.productivity_score > best_score {
                best_score = review.productivity_score;
                optimal_ratio =
                    f64::from(review.break_time_minutes) / f64::from(review.focus_time_minutes);
            }
        }
        let optimal_ratio = optimal_ratio.clamp(0.1, 0.4);

        let sample = reviews.len() as u32;
        self.db.upsert_insight(
            user,
            InsightKind::BreakPattern,
            &json!({ "optimal_break_ratio": optimal_ratio }),
            f64::from((sample * 3).min(100)),
            sample,
            today,
            today + Duration::days(INSIGHT_VALIDITY_DAYS),
        )
    }

    fn analyze_weekly_trend(&self, user: &str, today: NaiveDate) -> Result<ProductivityInsight> {
        let reviews = self
            .db
            .reviews_since(user, today - Duration::days(TREND_WINDOW_DAYS))?;

        let mut by_weekday: HashMap<u32, Vec<f64>> = HashMap::new();
        for review in &reviews {
            let weekday = review.date.weekday().num_days_from_monday();
            by_weekday.entry(weekday).or_default().push(review.productivity_score);
        }

        let mut averages: BTreeMap<String, f64> = BTreeMap::new();
        for (weekday, scores) in by_weekday {
            let avg = scores.iter().sum::<f64>() / scores.len() as f64;
            averages.insert(weekday.to_string(), avg);
        }

        let sample = reviews.len() as u32;
        self.db.upsert_insight(
            user,
            InsightKind::WeeklyTrend,
            &json!({ "weekday_averages": averages }),
            f64::from(sample.min(100)),
            sample,
            today,
            today + Duration::days(INSIGHT_VALIDITY_DAYS),
        )
    }

    fn analyze_completion_pattern(
        &self,
        user: &str,
        today: NaiveDate,
    ) -> Result<ProductivityInsight> {
        let reviews = self
            .db
            .reviews_since(user, today - Duration::days(INSIGHT_WINDOW_DAYS))?;

        let avg_rate = if reviews.is_empty() {
            0.0
        } else {
            reviews.iter().map(|r| r.completion_rate).sum::<f64>() / reviews.len() as f64
        };
        let rates: Vec<f64> = reviews.iter().map(|r| r.completion_rate).collect();

        let sample = reviews.len() as u32;
        self.db.upsert_insight(
            user,
            InsightKind::CompletionPattern,
            &json!({ "avg_completion_rate": avg_rate, "trend": trend_label(&rates) }),
            f64::from((sample * 3).min(100)),
            sample,
            today,
            today + Duration::days(INSIGHT_VALIDITY_DAYS),
        )
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    fn day_span(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.day_start(date), self.day_start(date + Duration::days(1)))
    }

    fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(NaiveTime::MIN)
            .and_local_timezone(self.tz)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| DateTime::from_naive_utc_and_offset(date.and_time(NaiveTime::MIN), Utc))
    }
}

/// Classify an ordered series as improving, declining, or stable by
/// comparing the first and second half means.
fn trend_label(values: &[f64]) -> &'static str {
    if values.len() < 4 {
        return "stable";
    }
    let mid = values.len() / 2;
    let first = values[..mid].iter().sum::<f64>() / mid as f64;
    let second = values[mid..].iter().sum::<f64>() / (values.len() - mid) as f64;
    let delta = second - first;
    if delta > 5.0 {
        "improving"
    } else if delta < -5.0 {
        "declining"
    } else {
        "stable"
    }
}
