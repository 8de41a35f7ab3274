//! Core record structures for rosterex
//!
//! This module provides the fundamental data structures flowing through the
//! engine:
//! - ExamRecord: one examinee's outcome for one query
//! - RecordStatus: the per-record outcome taxonomy
//! - ShardBatch: the result of one shard fetch, including degraded batches
//!
//! The academic payload is carried opaquely as JSON; the engine routes and
//! deduplicates records but never interprets payload contents.

use crate::identifiers::{Registration, ShardKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// Per-record outcome reported by a shard or synthesized by the client
///
/// `NotFound` and `RecordNotFound` are distinct: the former means "absent
/// from the batch that should contain it", the latter is a shard's explicit
/// confirmation that no such record exists and triggers roster removal on
/// merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    /// Record retrieved with payload
    #[serde(rename = "success")]
    Success,
    /// Absent from the batch expected to contain it
    #[serde(rename = "Not Found in Batch")]
    NotFound,
    /// Shard explicitly confirms the record does not exist
    #[serde(rename = "Record not found")]
    RecordNotFound,
    /// Transient or shard-level failure, retryable
    #[serde(rename = "Error")]
    Error,
    /// Unrecognized status string from the wire
    #[serde(other)]
    Unknown,
}

impl RecordStatus {
    /// True for statuses that carry real information about the examinee,
    /// i.e. anything a merge must not let an `Error` overwrite
    pub fn outranks_error(&self) -> bool {
        !matches!(self, Self::Error)
    }
}

impl Display for RecordStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::NotFound => "not found in batch",
            Self::RecordNotFound => "record not found",
            Self::Error => "error",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// One examinee's outcome for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamRecord {
    /// Registration number, unique within a query's universe
    #[serde(rename = "regNo")]
    pub registration: String,
    /// Outcome of the lookup for this registration
    pub status: RecordStatus,
    /// Opaque academic payload, present iff status is Success
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Human-readable cause, present iff status is Error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ExamRecord {
    /// Create a successful record carrying a payload
    pub fn success(registration: impl Into<String>, payload: Value) -> Self {
        Self {
            registration: registration.into(),
            status: RecordStatus::Success,
            payload: Some(payload),
            reason: None,
        }
    }

    /// Create a placeholder error record
    pub fn error(registration: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            registration: registration.into(),
            status: RecordStatus::Error,
            payload: None,
            reason: Some(reason.into()),
        }
    }

    /// Create a record for a registration absent from its expected batch
    pub fn not_found(registration: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            registration: registration.into(),
            status: RecordStatus::NotFound,
            payload: None,
            reason: Some(reason.into()),
        }
    }
}

/// The outcome of one shard fetch
///
/// A batch is always returned, never thrown past the client boundary: a
/// fetch that failed entirely degrades to a synthetic batch of placeholder
/// `Error` records spanning the batch's expected identifier range.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardBatch {
    /// Shard this batch came from
    pub shard: ShardKey,
    /// Ordered records as reported by the shard (or synthesized)
    pub records: Vec<ExamRecord>,
    /// True when the batch was fabricated because the shard was unreachable
    pub degraded: bool,
}

impl ShardBatch {
    /// Wrap records returned by a reachable shard
    pub fn fetched(shard: ShardKey, records: Vec<ExamRecord>) -> Self {
        Self {
            shard,
            records,
            degraded: false,
        }
    }

    /// Fabricate a placeholder batch for an unreachable shard
    ///
    /// Produces exactly `batch_size` `Error` records covering the target
    /// registration's batch range, all carrying the same reason, so that
    /// "shard unreachable" flows through merge and failure accounting the
    /// same way as explicit per-record errors.
    pub fn degraded(shard: ShardKey, target: &Registration, batch_size: usize, reason: &str) -> Self {
        let records = target
            .batch_range(batch_size)
            .into_iter()
            .map(|registration| ExamRecord::error(registration, reason))
            .collect();
        Self {
            shard,
            records,
            degraded: true,
        }
    }

    /// Registrations of records the shard reported as failed
    pub fn failed_registrations(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .filter(|r| r.status == RecordStatus::Error)
            .map(|r| r.registration.as_str())
    }
}
