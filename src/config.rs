//! Configuration structures for the aggregation engine
//!
//! This module provides the configuration system for rosterex, including
//! parameter validation and builder pattern implementation. Endpoint URLs,
//! batch sizing, reveal pacing and the optional-shard coverage range are all
//! injected here rather than read from module-level globals.

use crate::constants::defaults;
use crate::error::RosterexError;
use crate::identifiers::ShardKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for one aggregation engine instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Base URL per shard key; every walked shard must have an entry
    pub shard_endpoints: HashMap<ShardKey, String>,
    /// Records covered by one shard batch
    pub batch_size: usize,
    /// Interval between single-record reveals, in milliseconds
    pub reveal_cadence_ms: u64,
    /// Inclusive roll-suffix range served by the optional shard
    pub optional_suffix_range: (u32, u32),
    /// Per-request timeout for shard fetches, in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            shard_endpoints: HashMap::new(),
            batch_size: defaults::BATCH_SIZE,
            reveal_cadence_ms: defaults::REVEAL_CADENCE_MS,
            optional_suffix_range: defaults::OPTIONAL_SUFFIX_RANGE,
            request_timeout_ms: defaults::REQUEST_TIMEOUT_MS,
        }
    }
}

impl AggregatorConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint for one shard key
    pub fn shard_endpoint(mut self, key: ShardKey, url: impl Into<String>) -> Self {
        self.shard_endpoints.insert(key, url.into());
        self
    }

    /// Set the batch size
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the reveal cadence in milliseconds
    pub fn reveal_cadence_ms(mut self, cadence_ms: u64) -> Self {
        self.reveal_cadence_ms = cadence_ms;
        self
    }

    /// Set the optional shard's inclusive roll-suffix coverage range
    pub fn optional_suffix_range(mut self, start: u32, end: u32) -> Self {
        self.optional_suffix_range = (start, end);
        self
    }

    /// Set the per-request timeout in milliseconds
    pub fn request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    /// Reveal cadence as a Duration
    pub fn reveal_cadence(&self) -> Duration {
        Duration::from_millis(self.reveal_cadence_ms)
    }

    /// Request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Endpoint for a shard key, or the shard-key fault every caller treats
    /// as unexpected
    pub fn endpoint(&self, key: ShardKey) -> Result<&str, RosterexError> {
        self.shard_endpoints
            .get(&key)
            .map(|s| s.as_str())
            .ok_or_else(|| RosterexError::ShardKey(key.as_str().to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RosterexError> {
        if self.batch_size == 0 {
            return Err(RosterexError::config_error(
                "batch_size",
                "must be greater than 0",
                "Set batch_size to the shard block size (the deployed endpoints use 5)",
            ));
        }

        if self.reveal_cadence_ms == 0 {
            return Err(RosterexError::config_error(
                "reveal_cadence_ms",
                "must be greater than 0",
                "Set reveal_cadence_ms to a positive interval (recommended: 100-500ms)",
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err(RosterexError::config_error(
                "request_timeout_ms",
                "must be greater than 0",
                "Set request_timeout_ms to a positive value in milliseconds",
            ));
        }

        let (start, end) = self.optional_suffix_range;
        if start > end {
            return Err(RosterexError::config_error(
                "optional_suffix_range",
                format!("start ({}) cannot be greater than end ({})", start, end),
                "Ensure the range is ordered, e.g. (900, 999)",
            ));
        }

        for key in [ShardKey::User, ShardKey::Reg1, ShardKey::Reg2, ShardKey::LateralEntry] {
            if let Some(url) = self.shard_endpoints.get(&key) {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(RosterexError::config_error(
                        format!("shard_endpoints.{}", key),
                        "endpoint must be an http or https URL",
                        "Use the full worker URL including the scheme",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Build the configuration after validation
    pub fn build(self) -> Result<Self, RosterexError> {
        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> AggregatorConfig {
        AggregatorConfig::new()
            .shard_endpoint(ShardKey::User, "https://user.example.dev/api/result")
            .shard_endpoint(ShardKey::Reg1, "https://reg1.example.dev/api/result")
            .shard_endpoint(ShardKey::Reg2, "https://reg2.example.dev/api/result")
            .shard_endpoint(ShardKey::LateralEntry, "https://le.example.dev/api/result")
    }

    #[test]
    fn test_default_values() {
        let config = AggregatorConfig::default();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.optional_suffix_range, (900, 999));
        assert!(config.reveal_cadence_ms > 0);
    }

    #[test]
    fn test_builder_chain_validates() {
        let config = configured()
            .batch_size(5)
            .reveal_cadence_ms(200)
            .build()
            .unwrap();
        assert_eq!(config.reveal_cadence(), Duration::from_millis(200));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = configured().batch_size(0).build().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_inverted_suffix_range_rejected() {
        let err = configured().optional_suffix_range(999, 900).build().unwrap_err();
        assert!(err.to_string().contains("optional_suffix_range"));
    }

    #[test]
    fn test_non_http_endpoint_rejected() {
        let err = configured()
            .shard_endpoint(ShardKey::Reg1, "ftp://reg1.example.dev")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("reg1"));
    }

    #[test]
    fn test_missing_endpoint_is_shard_key_fault() {
        let config = AggregatorConfig::new();
        let err = config.endpoint(ShardKey::User).unwrap_err();
        assert!(matches!(err, RosterexError::ShardKey(_)));
    }
}
