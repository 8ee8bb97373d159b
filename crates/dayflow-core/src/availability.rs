//! Availability resolution: weekly templates plus calendar events
//! become concrete free windows for a date or date range.
//!
//! Resolution order per day: the user's templates for that weekday,
//! falling back to the team's templates, falling back to a single
//! default window. Busy calendar events are then subtracted.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::interval::{self, TimeWindow, MIN_FRAGMENT_MINUTES};
use crate::model::{AvailabilityTemplate, CalendarEvent};

/// Default availability window applied when an owner has declared none.
const DEFAULT_DAY_START: (u32, u32) = (9, 0);
const DEFAULT_DAY_END: (u32, u32) = (17, 0);

/// Resolves weekly availability templates into concrete free windows.
#[derive(Debug, Clone)]
pub struct AvailabilityResolver {
    tz: Tz,
    default_start: NaiveTime,
    default_end: NaiveTime,
    min_fragment_minutes: i64,
}

impl Default for AvailabilityResolver {
    fn default() -> Self {
        Self {
            tz: chrono_tz::UTC,
            default_start: NaiveTime::from_hms_opt(DEFAULT_DAY_START.0, DEFAULT_DAY_START.1, 0)
                .unwrap_or(NaiveTime::MIN),
            default_end: NaiveTime::from_hms_opt(DEFAULT_DAY_END.0, DEFAULT_DAY_END.1, 0)
                .unwrap_or(NaiveTime::MIN),
            min_fragment_minutes: MIN_FRAGMENT_MINUTES,
        }
    }
}

impl AvailabilityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the zone templates are materialized in.
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    /// Override the default window used when no templates exist.
    pub fn with_default_window(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.default_start = start;
        self.default_end = end;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Free windows for a single date.
    ///
    /// `user_templates` and `team_templates` may span all weekdays;
    /// only rows matching the date's weekday are considered. Events
    /// must already be scoped to the user and their team (union).
    pub fn resolve_day(
        &self,
        date: NaiveDate,
        user_templates: &[AvailabilityTemplate],
        team_templates: &[AvailabilityTemplate],
        events: &[CalendarEvent],
    ) -> Vec<TimeWindow> {
        let weekday = date.weekday().num_days_from_monday() as u8;

        let mut windows = self.materialize(date, user_templates, weekday);
        if windows.is_empty() {
            windows = self.materialize(date, team_templates, weekday);
        }
        if windows.is_empty() {
            if let Some(w) = self.window_for(date, self.default_start, self.default_end) {
                windows.push(w);
            }
        }

        // Overlapping templates on the same weekday collapse into one span.
        let windows = interval::merge_overlapping(&windows);

        let busy: Vec<TimeWindow> = events
            .iter()
            .filter(|e| e.is_busy)
            .filter(|e| windows.iter().any(|w| w.overlaps(e.start, e.end)))
            .filter_map(|e| TimeWindow::new(e.start, e.end))
            .collect();

        interval::subtract_busy(&windows, &busy, self.min_fragment_minutes)
    }

    /// Free windows for `days` consecutive dates starting at `start`,
    /// concatenated in date order.
    pub fn resolve_range(
        &self,
        start: NaiveDate,
        days: u32,
        user_templates: &[AvailabilityTemplate],
        team_templates: &[AvailabilityTemplate],
        events: &[CalendarEvent],
    ) -> Vec<TimeWindow> {
        let mut all = Vec::new();
        for offset in 0..days {
            let date = start + Duration::days(i64::from(offset));
            all.extend(self.resolve_day(date, user_templates, team_templates, events));
        }
        all
    }

    /// Start of the date in the resolver's zone, as a UTC instant.
    pub fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        self.instant(date, NaiveTime::MIN)
            .unwrap_or_else(|| DateTime::from_naive_utc_and_offset(date.and_time(NaiveTime::MIN), Utc))
    }

    fn materialize(
        &self,
        date: NaiveDate,
        templates: &[AvailabilityTemplate],
        weekday: u8,
    ) -> Vec<TimeWindow> {
        templates
            .iter()
            .filter(|t| t.day_of_week == weekday)
            .filter_map(|t| self.window_for(date, t.start_time, t.end_time))
            .collect()
    }

    fn window_for(&self, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Option<TimeWindow> {
        let start = self.instant(date, start)?;
        let end = self.instant(date, end)?;
        TimeWindow::new(start, end)
    }

    fn instant(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        // DST gaps map to the earliest valid interpretation.
        date.and_time(time)
            .and_local_timezone(self.tz)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Owner;
    use chrono::TimeZone;

    fn template(day_of_week: u8, start: (u32, u32), end: (u32, u32)) -> AvailabilityTemplate {
        AvailabilityTemplate::new(
            Owner::User("u1".to_string()),
            day_of_week,
            NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        )
    }

    // 2024-06-10 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    #[test]
    fn default_window_applies_without_templates() {
        let resolver = AvailabilityResolver::new();
        let windows = resolver.resolve_day(monday(), &[], &[], &[]);

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start, Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap());
        assert_eq!(windows[0].end, Utc.with_ymd_and_hms(2024, 6, 10, 17, 0, 0).unwrap());
    }

    #[test]
    fn user_templates_override_default() {
        let resolver = AvailabilityResolver::new();
        let templates = vec![template(0, (8, 0), (12, 0)), template(0, (13, 0), (18, 0))];

        let windows = resolver.resolve_day(monday(), &templates, &[], &[]);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start, Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap());
        assert_eq!(windows[1].end, Utc.with_ymd_and_hms(2024, 6, 10, 18, 0, 0).unwrap());
    }

    #[test]
    fn team_templates_fill_in_when_user_has_none() {
        let resolver = AvailabilityResolver::new();
        let team = vec![template(0, (10, 0), (16, 0))];

        let windows = resolver.resolve_day(monday(), &[], &team, &[]);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start, Utc.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap());
    }

    #[test]
    fn templates_for_other_weekdays_are_ignored() {
        let resolver = AvailabilityResolver::new();
        // Tuesday template only; Monday falls back to the default.
        let templates = vec![template(1, (6, 0), (8, 0))];

        let windows = resolver.resolve_day(monday(), &templates, &[], &[]);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start, Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap());
    }

    #[test]
    fn busy_events_are_subtracted() {
        let resolver = AvailabilityResolver::new();
        let lunch = CalendarEvent::new(
            Owner::User("u1".to_string()),
            "Lunch",
            Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 10, 13, 0, 0).unwrap(),
        );

        let windows = resolver.resolve_day(monday(), &[], &[], &[lunch]);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].end, Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap());
        assert_eq!(windows[1].start, Utc.with_ymd_and_hms(2024, 6, 10, 13, 0, 0).unwrap());
    }

    #[test]
    fn free_events_do_not_subtract() {
        let resolver = AvailabilityResolver::new();
        let mut event = CalendarEvent::new(
            Owner::User("u1".to_string()),
            "FYI",
            Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 10, 13, 0, 0).unwrap(),
        );
        event.is_busy = false;

        let windows = resolver.resolve_day(monday(), &[], &[], &[event]);
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn fully_booked_day_yields_no_windows() {
        let resolver = AvailabilityResolver::new();
        let all_day = CalendarEvent::new(
            Owner::User("u1".to_string()),
            "Offsite",
            Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 10, 18, 0, 0).unwrap(),
        );

        let windows = resolver.resolve_day(monday(), &[], &[], &[all_day]);
        assert!(windows.is_empty());
    }

    #[test]
    fn range_concatenates_days_in_order() {
        let resolver = AvailabilityResolver::new();
        let windows = resolver.resolve_range(monday(), 3, &[], &[], &[]);

        assert_eq!(windows.len(), 3);
        assert!(windows[0].start < windows[1].start);
        assert!(windows[1].start < windows[2].start);
    }

    #[test]
    fn timezone_shifts_materialized_instants() {
        let resolver = AvailabilityResolver::new().with_timezone(chrono_tz::Europe::Berlin);
        let windows = resolver.resolve_day(monday(), &[], &[], &[]);

        // 09:00 Berlin (CEST, +2) is 07:00 UTC in June.
        assert_eq!(windows[0].start, Utc.with_ymd_and_hms(2024, 6, 10, 7, 0, 0).unwrap());
    }
}
