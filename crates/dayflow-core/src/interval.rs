//! Interval arithmetic over half-open time windows.
//!
//! Free windows are `[start, end)` spans. Subtracting busy intervals
//! splits windows around each overlap and drops fragments shorter than
//! the minimum useful length.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum surviving fragment length, in minutes.
///
/// Applied uniformly on every packing path: a free span shorter than
/// this cannot hold a useful focus block.
pub const MIN_FRAGMENT_MINUTES: i64 = 15;

/// A half-open `[start, end)` span of free time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window; returns `None` unless `end > start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        if end > start {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Window length in whole minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Check whether this window overlaps a half-open range.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}

/// Subtract busy intervals from free windows.
///
/// Each busy interval splits every overlapping window into the parts
/// outside the busy span; windows with no overlap pass through
/// unchanged. Fragments shorter than `min_minutes` are discarded.
/// Output preserves the chronological order of surviving fragments.
///
/// Intervals that merely touch (`busy.end == window.start` or
/// `busy.start == window.end`) do not overlap and produce no
/// zero-length fragments.
pub fn subtract_busy(windows: &[TimeWindow], busy: &[TimeWindow], min_minutes: i64) -> Vec<TimeWindow> {
    let mut free: Vec<TimeWindow> = windows.to_vec();
    free.sort_by_key(|w| w.start);

    for b in busy {
        let mut updated = Vec::with_capacity(free.len() + 1);
        for w in &free {
            if b.end <= w.start || b.start >= w.end {
                updated.push(*w);
                continue;
            }
            if w.start < b.start {
                if let Some(left) = TimeWindow::new(w.start, b.start) {
                    updated.push(left);
                }
            }
            if b.end < w.end {
                if let Some(right) = TimeWindow::new(b.end, w.end) {
                    updated.push(right);
                }
            }
        }
        free = updated
            .into_iter()
            .filter(|w| w.duration_minutes() >= min_minutes)
            .collect();
    }

    free
}

/// Merge overlapping or touching windows into maximal spans.
///
/// Used to normalize availability templates that overlap on the same
/// weekday before any subtraction happens.
pub fn merge_overlapping(windows: &[TimeWindow]) -> Vec<TimeWindow> {
    if windows.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<TimeWindow> = windows.to_vec();
    sorted.sort_by_key(|w| w.start);

    let mut merged: Vec<TimeWindow> = Vec::with_capacity(sorted.len());
    let mut current = sorted[0];
    for w in &sorted[1..] {
        if w.start <= current.end {
            if w.end > current.end {
                current.end = w.end;
            }
        } else {
            merged.push(current);
            current = *w;
        }
    }
    merged.push(current);
    merged
}

/// Total length of a window list, in minutes.
pub fn total_minutes(windows: &[TimeWindow]) -> i64 {
    windows.iter().map(TimeWindow::duration_minutes).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, hour, minute, 0).unwrap()
    }

    fn window(start_h: u32, start_m: u32, end_h: u32, end_m: u32) -> TimeWindow {
        TimeWindow::new(at(start_h, start_m), at(end_h, end_m)).unwrap()
    }

    #[test]
    fn window_rejects_empty_span() {
        assert!(TimeWindow::new(at(9, 0), at(9, 0)).is_none());
        assert!(TimeWindow::new(at(10, 0), at(9, 0)).is_none());
    }

    #[test]
    fn subtract_splits_around_busy_interval() {
        let windows = vec![window(9, 0, 17, 0)];
        let busy = vec![window(12, 0, 13, 0)];

        let free = subtract_busy(&windows, &busy, MIN_FRAGMENT_MINUTES);
        assert_eq!(free, vec![window(9, 0, 12, 0), window(13, 0, 17, 0)]);
    }

    #[test]
    fn subtract_passes_non_overlapping_windows_through() {
        let windows = vec![window(9, 0, 11, 0), window(14, 0, 17, 0)];
        let busy = vec![window(12, 0, 13, 0)];

        let free = subtract_busy(&windows, &busy, MIN_FRAGMENT_MINUTES);
        assert_eq!(free, windows);
    }

    #[test]
    fn touching_intervals_produce_no_fragments() {
        let windows = vec![window(9, 0, 12, 0)];
        // Busy span ends exactly where the window starts, and another
        // starts exactly where it ends.
        let busy = vec![window(8, 0, 9, 0), window(12, 0, 13, 0)];

        let free = subtract_busy(&windows, &busy, MIN_FRAGMENT_MINUTES);
        assert_eq!(free, windows);
    }

    #[test]
    fn busy_covering_window_removes_it() {
        let windows = vec![window(9, 0, 10, 0)];
        let busy = vec![window(8, 30, 10, 30)];

        let free = subtract_busy(&windows, &busy, MIN_FRAGMENT_MINUTES);
        assert!(free.is_empty());
    }

    #[test]
    fn short_fragments_are_discarded() {
        let windows = vec![window(9, 0, 10, 0)];
        // Leaves 10 minutes before and 20 minutes after.
        let busy = vec![window(9, 10, 9, 40)];

        let free = subtract_busy(&windows, &busy, 15);
        assert_eq!(free, vec![window(9, 40, 10, 0)]);
    }

    #[test]
    fn output_preserves_chronological_order() {
        let windows = vec![window(14, 0, 17, 0), window(9, 0, 12, 0)];
        let busy = vec![window(10, 0, 10, 30), window(15, 0, 15, 30)];

        let free = subtract_busy(&windows, &busy, 15);
        let starts: Vec<_> = free.iter().map(|w| w.start).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
    }

    #[test]
    fn merge_joins_touching_and_overlapping_windows() {
        let windows = vec![window(9, 0, 11, 0), window(10, 30, 12, 0), window(12, 0, 13, 0), window(15, 0, 16, 0)];
        let merged = merge_overlapping(&windows);
        assert_eq!(merged, vec![window(9, 0, 13, 0), window(15, 0, 16, 0)]);
    }

    #[test]
    fn total_minutes_sums_windows() {
        let windows = vec![window(9, 0, 10, 0), window(11, 0, 11, 45)];
        assert_eq!(total_minutes(&windows), 105);
    }

    proptest! {
        /// Subtraction conserves time: fragments plus overlap equal the
        /// original window, and no fragment overlaps the busy span.
        #[test]
        fn subtraction_conserves_time(
            w_start in 0i64..600,
            w_len in 1i64..600,
            b_start in 0i64..600,
            b_len in 1i64..600,
        ) {
            let base = at(0, 0);
            let w = TimeWindow::new(
                base + chrono::Duration::minutes(w_start),
                base + chrono::Duration::minutes(w_start + w_len),
            ).unwrap();
            let b = TimeWindow::new(
                base + chrono::Duration::minutes(b_start),
                base + chrono::Duration::minutes(b_start + b_len),
            ).unwrap();

            // min_minutes = 0 so conservation holds exactly.
            let free = subtract_busy(&[w], &[b], 0);

            for f in &free {
                prop_assert!(!f.overlaps(b.start, b.end));
            }

            let overlap_start = w.start.max(b.start);
            let overlap_end = w.end.min(b.end);
            let overlap = (overlap_end - overlap_start).num_minutes().max(0);
            prop_assert_eq!(total_minutes(&free) + overlap, w.duration_minutes());
        }
    }
}
