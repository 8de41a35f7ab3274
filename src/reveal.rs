//! Timed sequential record disclosure
//!
//! This module holds the backlog of fetched-but-not-yet-visible records and
//! the progress counters the presentation layer renders. The queue itself is
//! synchronous and cancel-safe: pacing lives in the orchestrator's drain
//! task, which calls [`RevealQueue::tick`] once per cadence interval. A
//! non-interactive caller may instead drain the queue eagerly; the two are
//! observably equivalent apart from the pacing delay.

use crate::records::ExamRecord;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Reveal progress counters
///
/// `total` is recomputed whenever a new stage's batch size becomes known, so
/// `percent` never exceeds 100 and reaches exactly 100 when the backlog
/// empties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Records revealed so far
    pub revealed: usize,
    /// Records known for the current stage (revealed + backlog)
    pub total: usize,
    /// Completion percentage, 0.0..=100.0
    pub percent: f64,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            revealed: 0,
            total: 0,
            percent: 0.0,
        }
    }
}

impl Progress {
    fn recompute(&mut self) {
        self.percent = if self.total == 0 {
            0.0
        } else {
            ((self.revealed as f64 / self.total as f64) * 100.0).min(100.0)
        };
    }
}

/// Backlog of records awaiting disclosure
#[derive(Debug, Default)]
pub struct RevealQueue {
    pending: VecDeque<ExamRecord>,
    progress: Progress,
}

impl RevealQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch to the backlog and recompute the stage total
    pub fn enqueue(&mut self, records: Vec<ExamRecord>) {
        self.pending.extend(records);
        self.progress.total = self.progress.revealed + self.pending.len();
        self.progress.recompute();
    }

    /// Take the next record off the backlog, advancing the revealed count
    pub fn tick(&mut self) -> Option<ExamRecord> {
        let record = self.pending.pop_front()?;
        self.progress.revealed += 1;
        self.progress.recompute();
        Some(record)
    }

    /// Discard any un-revealed backlog and zero the counters
    ///
    /// Triggered by a fresh (non-retry) search; discarded records are never
    /// revealed.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.progress = Progress::default();
    }

    /// Records still awaiting reveal
    pub fn backlog_len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing awaits reveal
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Current progress counters
    pub fn progress(&self) -> Progress {
        self.progress
    }
}
