//! Aggregation state and its observable snapshot
//!
//! One `AggregationState` lives per active search. It is owned exclusively
//! by the orchestrator, which shares it only with its own drain task; the
//! merger and reveal queue receive and return data rather than holding
//! references into it. A fresh (non-retry) submission replaces the state
//! wholesale rather than merging into it.

use crate::exam::Query;
use crate::identifiers::Registration;
use crate::merge;
use crate::records::{ExamRecord, RecordStatus, ShardBatch};
use crate::reveal::{Progress, RevealQueue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Orchestrator state machine phases
///
/// `Failed` is reachable from any fetching phase, but only for unexpected
/// engine faults; expected per-record failures accumulate in the failed set
/// and the walk continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    /// No search submitted yet
    Idle,
    /// Primary shard fetch in flight
    ResolvingTarget,
    /// Target record surfaced; mandatory walk not yet started
    TargetResolved,
    /// Sequential fetch of the remaining mandatory shards
    WalkingMandatoryShards,
    /// Mandatory walk complete; optional shard offered to the caller
    AwaitingOptionalShard,
    /// All fetching done; backlog draining to the visible roster
    Draining,
    /// Backlog empty, search complete
    Done,
    /// Unexpected engine fault
    Failed,
}

/// Serializable projection of the aggregation state
///
/// Exposed to the presentation collaborator after every mutation; document
/// export downstream consumes `target` and `roster` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationSnapshot {
    /// Resolved record for the searched registration, if known
    pub target: Option<ExamRecord>,
    /// Deduplicated, roll-ordered visible roster
    pub roster: Vec<ExamRecord>,
    /// Registrations whose last known status is Error; the retry surface
    pub failed_identifiers: Vec<String>,
    /// Reveal progress counters
    pub progress: Progress,
    /// Current state machine phase
    pub phase: SearchPhase,
    /// True when the optional shard is currently on offer
    pub optional_shard_offered: bool,
}

/// Mutable state for one active search
#[derive(Debug)]
pub struct AggregationState {
    /// Coordinates of the search, kept for retries and the optional shard
    pub query: Option<Query>,
    /// Resolved target record
    pub target: Option<ExamRecord>,
    /// Visible roster
    pub roster: Vec<ExamRecord>,
    /// Backlog of fetched records not yet revealed
    pub reveal: RevealQueue,
    /// Registrations whose last known status is Error
    pub failed: BTreeSet<String>,
    /// State machine phase
    pub phase: SearchPhase,
    /// Whether the optional shard is on offer
    pub optional_offered: bool,
}

impl Default for AggregationState {
    fn default() -> Self {
        Self {
            query: None,
            target: None,
            roster: Vec::new(),
            reveal: RevealQueue::new(),
            failed: BTreeSet::new(),
            phase: SearchPhase::Idle,
            optional_offered: false,
        }
    }
}

impl AggregationState {
    /// Fresh state for a new search
    pub fn for_query(query: Query) -> Self {
        Self {
            query: Some(query),
            phase: SearchPhase::ResolvingTarget,
            ..Self::default()
        }
    }

    /// Prepare an existing state for a retry walk
    ///
    /// The previously-revealed roster and target survive; only the error
    /// list and the reveal backlog are cleared.
    pub fn begin_retry(&mut self) {
        self.failed.clear();
        self.reveal.reset();
        self.optional_offered = false;
        self.phase = SearchPhase::ResolvingTarget;
    }

    /// The target registration, available once a query is set
    pub fn target_registration(&self) -> Option<Registration> {
        self.query.as_ref().map(|q| q.registration.clone())
    }

    /// Merge records directly into the visible roster
    ///
    /// Used for the primary batch (surfaced immediately, unpaced) and for
    /// each single record the drain task reveals.
    pub fn merge_visible(&mut self, records: &[ExamRecord]) {
        let Some(target) = self.target_registration() else {
            return;
        };
        self.roster = merge::merge(&self.roster, records, &target);
        for record in records {
            if record.status.outranks_error() {
                self.failed.remove(&record.registration);
            }
        }
    }

    /// Record per-record failures from a batch into the retry surface
    pub fn absorb_failures(&mut self, batch: &ShardBatch) {
        let mut added = 0usize;
        for registration in batch.failed_registrations() {
            if self.failed.insert(registration.to_string()) {
                added += 1;
            }
        }
        if added > 0 {
            debug!(
                shard = %batch.shard,
                added,
                total = self.failed.len(),
                "recorded failed registrations"
            );
        }
    }

    /// Reveal one backlog record into the visible roster
    ///
    /// Returns false when the backlog was already empty. Transitions
    /// `Draining` to `Done` when the last record is revealed.
    pub fn reveal_one(&mut self) -> bool {
        let Some(record) = self.reveal.tick() else {
            if self.phase == SearchPhase::Draining {
                self.phase = SearchPhase::Done;
            }
            return false;
        };
        self.merge_visible(&[record]);
        if self.reveal.is_empty() && self.phase == SearchPhase::Draining {
            self.phase = SearchPhase::Done;
        }
        true
    }

    /// Drain the entire backlog eagerly
    ///
    /// Observably equivalent to the timed drain, without the pacing delay.
    pub fn drain_pending(&mut self) {
        while self.reveal_one() {}
    }

    /// Whether the searched registration currently resolves successfully
    pub fn target_succeeded(&self) -> bool {
        self.target
            .as_ref()
            .map(|t| t.status == RecordStatus::Success)
            .unwrap_or(false)
    }

    /// Clone the observable projection of this state
    pub fn snapshot(&self) -> AggregationSnapshot {
        AggregationSnapshot {
            target: self.target.clone(),
            roster: self.roster.clone(),
            failed_identifiers: self.failed.iter().cloned().collect(),
            progress: self.reveal.progress(),
            phase: self.phase,
            optional_shard_offered: self.optional_offered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exam::{ExamDescriptor, Semester};
    use crate::identifiers::ShardKey;
    use serde_json::json;

    fn query() -> Query {
        let exam = ExamDescriptor {
            batch_year: 2022,
            semester: Semester::new(4).unwrap(),
            exam_session: "Nov/Dec 2024".to_string(),
            publish_date: None,
        };
        Query::new("22104134070", &exam).unwrap()
    }

    fn success(reg: &str) -> ExamRecord {
        ExamRecord::success(reg, json!({}))
    }

    #[test]
    fn test_fresh_state_is_resolving() {
        let state = AggregationState::for_query(query());
        assert_eq!(state.phase, SearchPhase::ResolvingTarget);
        assert!(state.roster.is_empty());
        assert!(state.target.is_none());
    }

    #[test]
    fn test_retry_keeps_roster_clears_failures() {
        let mut state = AggregationState::for_query(query());
        state.merge_visible(&[success("22104134071")]);
        state.failed.insert("22104134072".to_string());
        state.reveal.enqueue(vec![success("22104134073")]);
        state.phase = SearchPhase::Done;

        state.begin_retry();
        assert_eq!(state.roster.len(), 1);
        assert!(state.failed.is_empty());
        assert!(state.reveal.is_empty());
        assert_eq!(state.phase, SearchPhase::ResolvingTarget);
    }

    #[test]
    fn test_merge_visible_clears_upgraded_failures() {
        let mut state = AggregationState::for_query(query());
        state.failed.insert("22104134071".to_string());
        state.merge_visible(&[success("22104134071")]);
        assert!(state.failed.is_empty());
    }

    #[test]
    fn test_absorb_failures_deduplicates() {
        let mut state = AggregationState::for_query(query());
        let batch = ShardBatch::fetched(
            ShardKey::Reg1,
            vec![
                ExamRecord::error("22104134071", "down"),
                ExamRecord::error("22104134071", "down"),
            ],
        );
        state.absorb_failures(&batch);
        assert_eq!(state.failed.len(), 1);
    }

    #[test]
    fn test_reveal_one_drains_into_roster() {
        let mut state = AggregationState::for_query(query());
        state.reveal.enqueue(vec![success("22104134071"), success("22104134072")]);
        state.phase = SearchPhase::Draining;

        assert!(state.reveal_one());
        assert_eq!(state.roster.len(), 1);
        assert_eq!(state.phase, SearchPhase::Draining);

        assert!(state.reveal_one());
        assert_eq!(state.roster.len(), 2);
        assert_eq!(state.phase, SearchPhase::Done);
        assert!(!state.reveal_one());
    }

    #[test]
    fn test_drain_pending_is_equivalent_to_ticking() {
        let mut state = AggregationState::for_query(query());
        state.reveal.enqueue(vec![success("22104134072"), success("22104134071")]);
        state.phase = SearchPhase::Draining;
        state.drain_pending();

        assert_eq!(state.phase, SearchPhase::Done);
        let regs: Vec<&str> = state.roster.iter().map(|r| r.registration.as_str()).collect();
        assert_eq!(regs, vec!["22104134071", "22104134072"]);
        assert_eq!(state.reveal.progress().percent, 100.0);
    }

    #[test]
    fn test_snapshot_projects_state() {
        let mut state = AggregationState::for_query(query());
        state.target = Some(success("22104134070"));
        state.merge_visible(&[success("22104134070")]);
        state.failed.insert("22104134099".to_string());

        let snapshot = state.snapshot();
        assert_eq!(snapshot.roster.len(), 1);
        assert_eq!(snapshot.failed_identifiers, vec!["22104134099"]);
        assert!(snapshot.target.is_some());
        assert_eq!(snapshot.phase, SearchPhase::ResolvingTarget);
    }
}
