//! Rosterex - a shard-aggregating exam result retrieval engine
//!
//! Rosterex locates one examinee's record inside a sharded, independently
//! fallible result backend and simultaneously reconstructs the surrounding
//! class roster. The engine walks the shards strictly sequentially so the
//! searched-for record always surfaces first, merges and deduplicates
//! heterogeneous per-record outcomes, degrades unreachable shards into
//! placeholder entries, and exposes a monotonically-progressing view of the
//! accumulated roster with a deferred optional shard and a retry-of-failures
//! path.

pub mod config;
pub mod constants;
pub mod error;
pub mod exam;
pub mod identifiers;
pub mod merge;
pub mod orchestrator;
pub mod records;
pub mod reveal;
pub mod shard_client;
pub mod state;

pub use config::AggregatorConfig;
pub use error::RosterexError;
pub use exam::{ExamDescriptor, Query, Semester};
pub use identifiers::{Registration, ShardKey};
pub use merge::merge;
pub use orchestrator::SearchOrchestrator;
pub use records::{ExamRecord, RecordStatus, ShardBatch};
pub use reveal::{Progress, RevealQueue};
pub use shard_client::{HttpShardClient, ShardFetch};
pub use state::{AggregationSnapshot, AggregationState, SearchPhase};

/// Type alias for Results using RosterexError
pub type Result<T> = std::result::Result<T, RosterexError>;
