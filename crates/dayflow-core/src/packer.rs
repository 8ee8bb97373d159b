//! Time-block packing: sorted tasks and free windows become an ordered
//! sequence of work and break blocks.
//!
//! The packer makes a single left-to-right pass. Windows and tasks are
//! consumed in order and never revisited; a task too large for the
//! remaining capacity simply spills into later windows, and tasks that
//! receive no minutes are omitted from the output.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::{self, TimeWindow};
use crate::model::{BreakPolicy, Task, TaskId};

/// Windows whose usable remainder is below this are not fragmented.
pub const MIN_BLOCK_MINUTES: i64 = 10;

/// Focus/break cadence used while packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakPlan {
    pub focus_minutes: u32,
    pub break_minutes: u32,
}

impl Default for BreakPlan {
    fn default() -> Self {
        Self {
            focus_minutes: 25,
            break_minutes: 5,
        }
    }
}

impl BreakPlan {
    /// Cadence from the active policy, or the 25/5 default.
    pub fn from_policy(policy: Option<&BreakPolicy>) -> Self {
        match policy {
            Some(p) => Self {
                focus_minutes: p.focus_minutes,
                break_minutes: p.break_minutes,
            },
            None => Self::default(),
        }
    }
}

/// A block produced by the packer, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedBlock {
    pub task_id: Option<TaskId>,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_break: bool,
}

impl PlannedBlock {
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// The packed schedule plus its capacity metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub blocks: Vec<PlannedBlock>,
    /// Total free-window minutes considered.
    pub window_minutes: i64,
    /// Minutes assigned to work (break blocks excluded).
    pub planned_minutes: i64,
    /// `planned_minutes / window_minutes`, 0 when no windows.
    pub capacity_usage: f64,
}

impl ScheduleResult {
    pub fn empty() -> Self {
        Self {
            blocks: Vec::new(),
            window_minutes: 0,
            planned_minutes: 0,
            capacity_usage: 0.0,
        }
    }
}

/// Packs prioritized tasks into free windows with interleaved breaks.
#[derive(Debug, Clone)]
pub struct Packer {
    plan: BreakPlan,
    /// Duration assumed for tasks without an estimate.
    fallback_minutes: u32,
}

impl Default for Packer {
    fn default() -> Self {
        Self {
            plan: BreakPlan::default(),
            fallback_minutes: 60,
        }
    }
}

impl Packer {
    pub fn new(plan: BreakPlan) -> Self {
        Self {
            plan,
            fallback_minutes: 60,
        }
    }

    /// Use a learned optimal duration for unestimated tasks.
    pub fn with_fallback_minutes(mut self, minutes: u32) -> Self {
        self.fallback_minutes = minutes;
        self
    }

    /// Pack `tasks` (already in priority order) into `windows`
    /// (already in chronological placement order).
    pub fn pack(&self, tasks: &[Task], windows: &[TimeWindow]) -> ScheduleResult {
        let window_minutes = interval::total_minutes(windows);
        if windows.is_empty() || tasks.is_empty() {
            return ScheduleResult {
                window_minutes,
                ..ScheduleResult::empty()
            };
        }

        let focus = i64::from(self.plan.focus_minutes);
        let break_len = i64::from(self.plan.break_minutes);

        let mut blocks: Vec<PlannedBlock> = Vec::new();
        let mut wi = 0usize;
        let mut cursor = windows[0].start;

        'tasks: for task in tasks {
            let mut remaining = i64::from(task.estimated_duration(self.fallback_minutes));

            while remaining > 0 {
                // Advance past exhausted windows.
                while cursor >= windows[wi].end {
                    wi += 1;
                    if wi >= windows.len() {
                        break 'tasks;
                    }
                    cursor = windows[wi].start;
                }

                let window_left = (windows[wi].end - cursor).num_minutes();
                // A sliver too small for a useful focus block: give up on
                // this window rather than fragmenting it. Small task
                // remainders still pack into roomy windows.
                if window_left < MIN_BLOCK_MINUTES {
                    cursor = windows[wi].end;
                    continue;
                }

                let size = remaining.min(window_left).min(focus);
                let block_end = cursor + Duration::minutes(size);
                blocks.push(PlannedBlock {
                    task_id: Some(task.id.clone()),
                    title: task.title.clone(),
                    start: cursor,
                    end: block_end,
                    is_break: false,
                });
                remaining -= size;
                cursor = block_end;

                // Rest between focus blocks of the same task, but only
                // when a full break fits before the window closes.
                if remaining > 0 && cursor + Duration::minutes(break_len) <= windows[wi].end {
                    let break_end = cursor + Duration::minutes(break_len);
                    blocks.push(PlannedBlock {
                        task_id: None,
                        title: "Break".to_string(),
                        start: cursor,
                        end: break_end,
                        is_break: true,
                    });
                    cursor = break_end;
                }
            }
        }

        let planned_minutes: i64 = blocks
            .iter()
            .filter(|b| !b.is_break)
            .map(PlannedBlock::duration_minutes)
            .sum();
        let capacity_usage = if window_minutes > 0 {
            planned_minutes as f64 / window_minutes as f64
        } else {
            0.0
        };

        ScheduleResult {
            blocks,
            window_minutes,
            planned_minutes,
            capacity_usage,
        }
    }
}
