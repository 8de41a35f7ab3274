//! Identifier types for rosterex
//!
//! This module provides type-safe wrappers for the two identifier kinds used
//! throughout the engine: the fixed-length numeric registration number that
//! names one examinee, and the shard key that names one backend partition.
//! Wrapping both prevents mixing them with plain strings at API boundaries
//! and centralizes format validation.

use crate::constants::registration;
use crate::error::RosterexError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A validated fixed-length numeric registration number
///
/// Registrations are 11-digit codes whose trailing three digits form the
/// roll suffix. Shards cover contiguous suffix ranges, so the suffix drives
/// batch-range synthesis on degraded fetches and roster ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registration(String);

impl Registration {
    /// Parse and validate a registration number
    pub fn parse(raw: &str) -> Result<Self, RosterexError> {
        if raw.len() != registration::LENGTH {
            return Err(RosterexError::invalid_registration(
                format!("expected {} digits, got {}", registration::LENGTH, raw.len()),
                format!("Enter the full {}-digit registration number", registration::LENGTH),
            ));
        }
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RosterexError::invalid_registration(
                "contains non-digit characters",
                "Registration numbers are numeric only",
            ));
        }
        Ok(Self(raw.to_string()))
    }

    /// The full registration string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The trailing roll suffix as a number, if the identifier is
    /// syntactically valid
    pub fn suffix(&self) -> u32 {
        // Validated at construction, the slice is always numeric
        self.0[self.0.len() - registration::SUFFIX_LENGTH..]
            .parse()
            .unwrap_or(0)
    }

    /// The registration with the roll suffix stripped
    pub fn stem(&self) -> &str {
        &self.0[..self.0.len() - registration::SUFFIX_LENGTH]
    }

    /// The identifiers of the fixed-size batch this registration belongs to
    ///
    /// The batch starts at this registration's own suffix and increments,
    /// holding the suffix length and zero-padding fixed. Used to fabricate
    /// placeholder entries when a whole shard fetch fails.
    pub fn batch_range(&self, batch_size: usize) -> Vec<String> {
        let base = self.suffix();
        (0..batch_size as u32)
            .map(|i| {
                format!(
                    "{}{:0width$}",
                    self.stem(),
                    base + i,
                    width = registration::SUFFIX_LENGTH
                )
            })
            .collect()
    }

    /// Check whether an arbitrary string is a syntactically valid
    /// registration number
    pub fn is_valid(raw: &str) -> bool {
        raw.len() == registration::LENGTH && raw.bytes().all(|b| b.is_ascii_digit())
    }
}

impl Display for Registration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Registration {
    type Err = RosterexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Key naming one backend shard
///
/// The engine walks shards in a fixed declared order: the primary shard
/// holding the target registration first, then each mandatory shard, with
/// the lateral-entry shard deferred behind an explicit acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardKey {
    /// Primary shard expected to contain the target registration
    User,
    /// First mandatory roster shard
    Reg1,
    /// Second mandatory roster shard
    Reg2,
    /// Optional deferred shard covering the lateral-entry suffix range
    LateralEntry,
}

impl ShardKey {
    /// Wire name used in endpoint configuration and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Reg1 => "reg1",
            Self::Reg2 => "reg2",
            Self::LateralEntry => "le",
        }
    }

    /// The mandatory shards fetched after the primary, in walk order
    pub const MANDATORY: [ShardKey; 2] = [ShardKey::Reg1, ShardKey::Reg2];
}

impl Display for ShardKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
