//! End-to-end search orchestration
//!
//! This module drives one query from submission to a fully-revealed roster:
//! it resolves the target registration's own shard first so the caller is
//! never left waiting on unrelated shards for the answer they asked for,
//! then walks the remaining mandatory shards strictly sequentially, merging
//! and enqueueing each batch as it arrives. The optional lateral-entry shard
//! is offered conditionally and fetched only on explicit acceptance.
//!
//! # Concurrency model
//!
//! Single-threaded cooperative scheduling: each shard fetch is awaited
//! before the next begins. The reveal drain is the only periodic operation,
//! a background task that takes one record off the backlog per cadence
//! interval and never blocks the walk. A search generation counter guards
//! every mutation: a fresh submission bumps it, so a stale fetch result or
//! drain tick detects the newer search and drops itself instead of merging.

use crate::config::AggregatorConfig;
use crate::error::RosterexError;
use crate::exam::Query;
use crate::identifiers::ShardKey;
use crate::records::{ExamRecord, RecordStatus, ShardBatch};
use crate::shard_client::ShardFetch;
use crate::state::{AggregationSnapshot, AggregationState, SearchPhase};
use crate::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Drives the shard walk and owns the aggregation state
///
/// All operations take `&self`; the state lives behind a mutex shared only
/// with the orchestrator's own drain task. The lock is never held across an
/// await point.
pub struct SearchOrchestrator<F: ShardFetch + 'static> {
    client: Arc<F>,
    config: AggregatorConfig,
    state: Arc<Mutex<AggregationState>>,
    generation: Arc<AtomicU64>,
    drain_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<F: ShardFetch + 'static> SearchOrchestrator<F> {
    /// Create an orchestrator over a shard client and validated configuration
    pub fn new(client: Arc<F>, config: AggregatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            config,
            state: Arc::new(Mutex::new(AggregationState::default())),
            generation: Arc::new(AtomicU64::new(0)),
            drain_handle: Mutex::new(None),
        })
    }

    /// Current observable snapshot of the search
    pub fn snapshot(&self) -> AggregationSnapshot {
        self.state.lock().snapshot()
    }

    /// Submit a fresh search, tearing down any in-flight one
    ///
    /// The previous search's reveal backlog is discarded and its
    /// not-yet-settled fetches are ignored on arrival. Resolves the target
    /// first, then walks the mandatory shards sequentially.
    pub async fn submit(&self, query: Query) -> Result<()> {
        let generation = self.bump_generation();
        info!(
            registration = %query.registration,
            year = query.year,
            semester = %query.semester,
            "search submitted"
        );
        *self.state.lock() = AggregationState::for_query(query);
        self.spawn_drain_task(generation);
        self.run_walk(generation).await
    }

    /// Re-run the shard walk for the last submitted query
    ///
    /// The previously-revealed roster is kept; only the error list and the
    /// reveal backlog are cleared. The merge rules upgrade any
    /// previously-failed registrations that now succeed.
    pub async fn retry_failed(&self) -> Result<()> {
        let generation = self.bump_generation();
        {
            let mut state = self.state.lock();
            if state.query.is_none() {
                return Err(RosterexError::Internal(
                    "retry requested with no prior search".to_string(),
                ));
            }
            state.begin_retry();
        }
        info!("retrying failed shard walk");
        self.spawn_drain_task(generation);
        self.run_walk(generation).await
    }

    /// Fetch the optional shard after the caller accepts the offer
    ///
    /// A no-op unless the orchestrator is currently awaiting the decision.
    pub async fn accept_optional_shard(&self) -> Result<()> {
        let generation = self.generation.load(Ordering::SeqCst);
        let query = {
            let mut state = self.state.lock();
            if state.phase != SearchPhase::AwaitingOptionalShard {
                debug!(phase = ?state.phase, "optional shard not on offer, ignoring acceptance");
                return Ok(());
            }
            let Some(query) = state.query.clone() else {
                return Ok(());
            };
            state.optional_offered = false;
            query
        };

        let batch = self.fetch_or_fail(ShardKey::LateralEntry, &query, generation).await?;
        let Some(batch) = batch else {
            return Ok(());
        };

        let draining = {
            let mut state = self.state.lock();
            if !self.is_current(generation) {
                return Ok(());
            }
            state.absorb_failures(&batch);
            state.reveal.enqueue(batch.records);
            state.phase = SearchPhase::Draining;
            if state.reveal.is_empty() {
                state.phase = SearchPhase::Done;
            }
            state.phase == SearchPhase::Draining
        };
        // The drain task parks once the backlog empties during the offer, so
        // a fresh one is needed for the accepted shard's records.
        if draining {
            if let Some(handle) = self.drain_handle.lock().take() {
                handle.abort();
            }
            self.spawn_drain_task(generation);
        }
        Ok(())
    }

    /// Decline the optional shard offer; already-enqueued records still
    /// drain to completion
    pub fn decline_optional_shard(&self) {
        let mut state = self.state.lock();
        if state.phase == SearchPhase::AwaitingOptionalShard {
            state.optional_offered = false;
            state.phase = if state.reveal.is_empty() {
                SearchPhase::Done
            } else {
                SearchPhase::Draining
            };
            debug!("optional shard declined");
        }
    }

    /// Drain the reveal backlog eagerly instead of waiting on the cadence
    ///
    /// Observably equivalent to the timed drain; intended for
    /// non-interactive callers and tests.
    pub fn drain_now(&self) {
        self.state.lock().drain_pending();
    }

    fn bump_generation(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(handle) = self.drain_handle.lock().take() {
            handle.abort();
        }
        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Fetch one shard, mapping an unexpected fault to the Failed phase and
    /// a stale completion to `None`
    async fn fetch_or_fail(
        &self,
        key: ShardKey,
        query: &Query,
        generation: u64,
    ) -> Result<Option<ShardBatch>> {
        match self.client.fetch(key, query).await {
            Ok(batch) => {
                if !self.is_current(generation) {
                    debug!(shard = %key, "dropping stale shard response");
                    return Ok(None);
                }
                Ok(Some(batch))
            }
            Err(e) => {
                warn!(shard = %key, error = %e, "unexpected fault during shard fetch");
                let mut state = self.state.lock();
                if self.is_current(generation) {
                    state.phase = SearchPhase::Failed;
                }
                Err(e)
            }
        }
    }

    async fn run_walk(&self, generation: u64) -> Result<()> {
        let query = self
            .state
            .lock()
            .query
            .clone()
            .ok_or_else(|| RosterexError::Internal("walk started without a query".to_string()))?;

        // Primary shard first: the caller must never be left without a
        // target-status update because other shards are slow or failing.
        let Some(primary) = self.fetch_or_fail(ShardKey::User, &query, generation).await? else {
            return Ok(());
        };
        {
            let mut state = self.state.lock();
            if !self.is_current(generation) {
                return Ok(());
            }
            state.target = Some(resolve_target(&primary, &query));
            state.absorb_failures(&primary);
            state.merge_visible(&primary.records);
            state.phase = SearchPhase::TargetResolved;
        }
        info!(registration = %query.registration, "target resolved");

        {
            let mut state = self.state.lock();
            if !self.is_current(generation) {
                return Ok(());
            }
            state.phase = SearchPhase::WalkingMandatoryShards;
        }
        for key in ShardKey::MANDATORY {
            let Some(batch) = self.fetch_or_fail(key, &query, generation).await? else {
                return Ok(());
            };
            let mut state = self.state.lock();
            if !self.is_current(generation) {
                return Ok(());
            }
            state.absorb_failures(&batch);
            state.reveal.enqueue(batch.records);
            debug!(shard = %key, backlog = state.reveal.backlog_len(), "mandatory batch enqueued");
        }

        let mut state = self.state.lock();
        if !self.is_current(generation) {
            return Ok(());
        }
        if self.offer_optional(&state) {
            state.optional_offered = true;
            state.phase = SearchPhase::AwaitingOptionalShard;
            debug!("optional shard offered");
        } else if state.reveal.is_empty() {
            state.phase = SearchPhase::Done;
        } else {
            state.phase = SearchPhase::Draining;
        }
        Ok(())
    }

    /// Coverage heuristic for the optional shard: the target's roll suffix
    /// falls in the optional range, or the target resolved successfully
    fn offer_optional(&self, state: &AggregationState) -> bool {
        let in_range = state
            .target_registration()
            .map(|reg| {
                let (start, end) = self.config.optional_suffix_range;
                (start..=end).contains(&reg.suffix())
            })
            .unwrap_or(false);
        in_range || state.target_succeeded()
    }

    fn spawn_drain_task(&self, generation: u64) {
        let state = Arc::clone(&self.state);
        let generation_counter = Arc::clone(&self.generation);
        let cadence = self.config.reveal_cadence();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let mut guard = state.lock();
                if generation_counter.load(Ordering::SeqCst) != generation {
                    debug!("drain task superseded by newer search");
                    break;
                }
                guard.reveal_one();
                let phase = guard.phase;
                let offer_pending = phase == SearchPhase::AwaitingOptionalShard && guard.reveal.is_empty();
                drop(guard);
                if matches!(phase, SearchPhase::Done | SearchPhase::Failed) {
                    debug!(?phase, "drain task finished");
                    break;
                }
                if offer_pending {
                    // Nothing left to reveal until the caller decides on the
                    // optional shard; acceptance respawns the task.
                    debug!("drain task parked on optional shard offer");
                    break;
                }
            }
        });

        *self.drain_handle.lock() = Some(handle);
    }
}

impl<F: ShardFetch + 'static> Drop for SearchOrchestrator<F> {
    fn drop(&mut self) {
        if let Some(handle) = self.drain_handle.lock().take() {
            handle.abort();
        }
    }
}

/// Resolve the target record from the primary batch
///
/// Preference order: the record matching the query registration, else the
/// batch's first error record (a degraded primary still explains itself),
/// else a synthetic not-found placeholder.
fn resolve_target(primary: &ShardBatch, query: &Query) -> ExamRecord {
    primary
        .records
        .iter()
        .find(|r| r.registration == query.registration.as_str())
        .cloned()
        .or_else(|| {
            primary
                .records
                .iter()
                .find(|r| r.status == RecordStatus::Error)
                .cloned()
        })
        .unwrap_or_else(|| {
            ExamRecord::not_found(
                query.registration.as_str(),
                "not present in initial response",
            )
        })
}
