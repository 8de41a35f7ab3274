//! Roster merging and deduplication
//!
//! This module combines an existing record set with a newly-arrived batch,
//! deduplicating by registration with a status-priority tie-break and
//! re-sorting into roll order. Merging is pure with respect to its inputs:
//! it returns a new roster and never mutates the one passed in, which is
//! what lets batches arriving out of numeric order (retries, the deferred
//! optional shard) reconstruct a stable roll-ordered roster.
//!
//! # Merge Rules
//!
//! - `RecordNotFound` for a non-target registration *removes* any existing
//!   entry: a confirmed-absent record carries no information and must not
//!   occupy a roster slot. The search target is exempt so its status line
//!   never disappears.
//! - An existing `Error` entry is replaced by any non-`Error` arrival for
//!   the same registration; an existing non-`Error` entry is never
//!   downgraded by an incoming `Error`.
//! - Same-priority collisions are last-writer-wins (a shard never reports
//!   the same registration twice in one batch).

use crate::identifiers::Registration;
use crate::records::{ExamRecord, RecordStatus};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

/// Merge an incoming batch into an existing roster, returning the new roster
///
/// `target` is the search target's registration; its entry survives an
/// explicit `RecordNotFound` so the caller always has a status to show.
pub fn merge(existing: &[ExamRecord], incoming: &[ExamRecord], target: &Registration) -> Vec<ExamRecord> {
    // Keyed copy of the existing roster. First-seen order is tracked
    // separately so malformed identifiers, which compare equal under the
    // final sort, keep their relative order.
    let mut by_registration: FxHashMap<String, ExamRecord> = FxHashMap::default();
    let mut seen_order: Vec<String> = Vec::new();

    for record in existing {
        if by_registration
            .insert(record.registration.clone(), record.clone())
            .is_none()
        {
            seen_order.push(record.registration.clone());
        }
    }

    for record in incoming {
        if record.status == RecordStatus::RecordNotFound && record.registration != target.as_str() {
            by_registration.remove(&record.registration);
            continue;
        }

        let keep_existing = by_registration
            .get(&record.registration)
            .map(|current| current.status.outranks_error() && record.status == RecordStatus::Error)
            .unwrap_or(false);
        if keep_existing {
            continue;
        }
        if by_registration
            .insert(record.registration.clone(), record.clone())
            .is_none()
        {
            seen_order.push(record.registration.clone());
        }
    }

    let mut roster: Vec<ExamRecord> = seen_order
        .iter()
        .filter_map(|registration| by_registration.remove(registration))
        .collect();
    roster.sort_by(compare_records);
    roster
}

/// Roster ordering: syntactically valid registrations first, ascending by
/// roll suffix, lexicographic tie-break; malformed/placeholder identifiers
/// keep their relative order at the end
pub fn compare_records(a: &ExamRecord, b: &ExamRecord) -> Ordering {
    let a_valid = Registration::is_valid(&a.registration);
    let b_valid = Registration::is_valid(&b.registration);

    match (a_valid, b_valid) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
        (true, true) => {
            let a_suffix = suffix_of(&a.registration);
            let b_suffix = suffix_of(&b.registration);
            match (a_suffix, b_suffix) {
                (Some(x), Some(y)) if x != y => x.cmp(&y),
                _ => a.registration.cmp(&b.registration),
            }
        }
    }
}

fn suffix_of(registration: &str) -> Option<u32> {
    let len = registration.len();
    registration.get(len.saturating_sub(3)..)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target() -> Registration {
        Registration::parse("22104134070").unwrap()
    }

    fn success(reg: &str) -> ExamRecord {
        ExamRecord::success(reg, json!({"name": "x"}))
    }

    fn record_not_found(reg: &str) -> ExamRecord {
        ExamRecord {
            registration: reg.to_string(),
            status: RecordStatus::RecordNotFound,
            payload: None,
            reason: None,
        }
    }

    #[test]
    fn test_merge_is_pure() {
        let existing = vec![success("22104134071")];
        let incoming = vec![success("22104134072")];
        let merged = merge(&existing, &incoming, &target());
        assert_eq!(existing.len(), 1);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_no_duplicate_registrations_after_merge() {
        let existing = vec![success("22104134071"), success("22104134072")];
        let incoming = vec![success("22104134072"), success("22104134073")];
        let merged = merge(&existing, &incoming, &target());
        assert_eq!(merged.len(), 3);
        let mut regs: Vec<&str> = merged.iter().map(|r| r.registration.as_str()).collect();
        regs.dedup();
        assert_eq!(regs.len(), 3);
    }

    #[test]
    fn test_error_never_overwrites_non_error() {
        let existing = vec![success("22104134071")];
        let incoming = vec![ExamRecord::error("22104134071", "worker down")];
        let merged = merge(&existing, &incoming, &target());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].status, RecordStatus::Success);
    }

    #[test]
    fn test_non_error_upgrades_error() {
        let existing = vec![ExamRecord::error("22104134071", "worker down")];
        let incoming = vec![success("22104134071")];
        let merged = merge(&existing, &incoming, &target());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].status, RecordStatus::Success);
    }

    #[test]
    fn test_same_priority_last_writer_wins() {
        let existing = vec![success("22104134071")];
        let incoming = vec![ExamRecord::success("22104134071", json!({"name": "updated"}))];
        let merged = merge(&existing, &incoming, &target());
        assert_eq!(merged[0].payload, Some(json!({"name": "updated"})));
    }

    #[test]
    fn test_record_not_found_removes_non_target() {
        let existing = vec![success("22104134071"), success("22104134072")];
        let incoming = vec![record_not_found("22104134071")];
        let merged = merge(&existing, &incoming, &target());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].registration, "22104134072");
    }

    #[test]
    fn test_record_not_found_keeps_target() {
        let existing = vec![success("22104134070")];
        let incoming = vec![record_not_found("22104134070")];
        let merged = merge(&existing, &incoming, &target());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].registration, "22104134070");
        assert_eq!(merged[0].status, RecordStatus::RecordNotFound);
    }

    #[test]
    fn test_record_not_found_does_not_insert() {
        let merged = merge(&[], &[record_not_found("22104134071")], &target());
        assert!(merged.is_empty());
    }

    #[test]
    fn test_sort_ascending_by_suffix() {
        let incoming = vec![success("22104134073"), success("22104134071"), success("22104134072")];
        let merged = merge(&[], &incoming, &target());
        let regs: Vec<&str> = merged.iter().map(|r| r.registration.as_str()).collect();
        assert_eq!(regs, vec!["22104134071", "22104134072", "22104134073"]);
    }

    #[test]
    fn test_valid_registrations_sort_before_malformed() {
        let incoming = vec![
            ExamRecord::error("Unknown", "degraded"),
            success("22104134071"),
            ExamRecord::error("Error-1", "degraded"),
        ];
        let merged = merge(&[], &incoming, &target());
        assert_eq!(merged[0].registration, "22104134071");
        assert!(!Registration::is_valid(&merged[1].registration));
        assert!(!Registration::is_valid(&merged[2].registration));
    }

    #[test]
    fn test_equal_suffix_falls_back_to_full_compare() {
        // Different stems, same roll suffix
        let incoming = vec![success("23104134071"), success("22104134071")];
        let merged = merge(&[], &incoming, &target());
        let regs: Vec<&str> = merged.iter().map(|r| r.registration.as_str()).collect();
        assert_eq!(regs, vec!["22104134071", "23104134071"]);
    }

    #[test]
    fn test_merge_out_of_order_batches_reconstructs_roll_order() {
        let first = merge(&[], &[success("22104134080"), success("22104134081")], &target());
        let second = merge(&first, &[success("22104134070"), success("22104134071")], &target());
        let regs: Vec<&str> = second.iter().map(|r| r.registration.as_str()).collect();
        assert_eq!(
            regs,
            vec!["22104134070", "22104134071", "22104134080", "22104134081"]
        );
    }
}
