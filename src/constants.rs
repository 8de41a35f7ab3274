//! Central constants for registration formats and shard coverage
//!
//! This module provides a single source of truth for the magic values shared
//! by the client, merger and orchestrator, eliminating duplication and
//! ensuring consistency.

/// Registration number format
pub mod registration {
    /// Total digit count of a valid registration number
    pub const LENGTH: usize = 11;

    /// Digit count of the trailing roll suffix used for ordering and
    /// batch-range arithmetic
    pub const SUFFIX_LENGTH: usize = 3;
}

/// Shard coverage and pacing defaults
pub mod defaults {
    /// Records covered by one shard batch; a failed fetch degrades to this
    /// many placeholder entries
    pub const BATCH_SIZE: usize = 5;

    /// Interval between single-record reveals, in milliseconds
    pub const REVEAL_CADENCE_MS: u64 = 150;

    /// Inclusive roll-suffix range served by the optional shard
    pub const OPTIONAL_SUFFIX_RANGE: (u32, u32) = (900, 999);

    /// Per-request timeout for shard endpoints, in milliseconds
    pub const REQUEST_TIMEOUT_MS: u64 = 15_000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_shorter_than_registration() {
        assert!(registration::SUFFIX_LENGTH < registration::LENGTH);
    }

    #[test]
    fn test_optional_range_is_ordered() {
        let (lo, hi) = defaults::OPTIONAL_SUFFIX_RANGE;
        assert!(lo <= hi);
    }
}
