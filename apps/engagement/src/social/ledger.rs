//! Interaction Ledger: per (user, target, kind) boolean "currently active" flags.
//!
//! Stored as one JSON document keyed by kind, each bucket mapping
//! `"{user_id}_{target_id}" -> bool`. Absent key means inactive. Entries are
//! flipped, never removed. The ledger never touches entity counters; that is
//! the job of `social::interaction`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::skill::Counter;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Like,
    Download,
    Upvote,
    Downvote,
    Save,
}

impl InteractionKind {
    pub const ALL: [InteractionKind; 5] = [
        InteractionKind::Like,
        InteractionKind::Download,
        InteractionKind::Upvote,
        InteractionKind::Downvote,
        InteractionKind::Save,
    ];

    /// Mutually exclusive on the same target.
    pub const VOTES: [InteractionKind; 2] = [InteractionKind::Upvote, InteractionKind::Downvote];

    /// The `SharedSkill` counter this kind is mirrored into.
    pub fn counter(&self) -> Counter {
        match self {
            InteractionKind::Like => Counter::Likes,
            InteractionKind::Download => Counter::Downloads,
            InteractionKind::Upvote => Counter::Upvotes,
            InteractionKind::Downvote => Counter::Downvotes,
            InteractionKind::Save => Counter::Saves,
        }
    }
}

pub fn ledger_key(user_id: &str, target_id: &str) -> String {
    format!("{user_id}_{target_id}")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InteractionLedger {
    #[serde(default)]
    likes: BTreeMap<String, bool>,
    #[serde(default)]
    downloads: BTreeMap<String, bool>,
    #[serde(default)]
    upvotes: BTreeMap<String, bool>,
    #[serde(default)]
    downvotes: BTreeMap<String, bool>,
    #[serde(default)]
    saves: BTreeMap<String, bool>,
}

impl InteractionLedger {
    fn bucket(&self, kind: InteractionKind) -> &BTreeMap<String, bool> {
        match kind {
            InteractionKind::Like => &self.likes,
            InteractionKind::Download => &self.downloads,
            InteractionKind::Upvote => &self.upvotes,
            InteractionKind::Downvote => &self.downvotes,
            InteractionKind::Save => &self.saves,
        }
    }

    fn bucket_mut(&mut self, kind: InteractionKind) -> &mut BTreeMap<String, bool> {
        match kind {
            InteractionKind::Like => &mut self.likes,
            InteractionKind::Download => &mut self.downloads,
            InteractionKind::Upvote => &mut self.upvotes,
            InteractionKind::Downvote => &mut self.downvotes,
            InteractionKind::Save => &mut self.saves,
        }
    }

    pub fn is_active(&self, user_id: &str, target_id: &str, kind: InteractionKind) -> bool {
        self.bucket(kind)
            .get(&ledger_key(user_id, target_id))
            .copied()
            .unwrap_or(false)
    }

    /// Sets the flag and returns its previous value.
    pub fn set(&mut self, user_id: &str, target_id: &str, kind: InteractionKind, active: bool) -> bool {
        self.bucket_mut(kind)
            .insert(ledger_key(user_id, target_id), active)
            .unwrap_or(false)
    }

    /// Flips the flag and returns the new state.
    pub fn toggle(&mut self, user_id: &str, target_id: &str, kind: InteractionKind) -> bool {
        let next = !self.is_active(user_id, target_id, kind);
        self.set(user_id, target_id, kind, next);
        next
    }

    /// Activates `kind` and deactivates every other member of `group` for the
    /// same (user, target). Returns the new state of `kind` (always `true`).
    pub fn set_exclusive(
        &mut self,
        user_id: &str,
        target_id: &str,
        kind: InteractionKind,
        group: &[InteractionKind],
    ) -> bool {
        for other in group.iter().filter(|k| **k != kind) {
            if self.is_active(user_id, target_id, *other) {
                self.set(user_id, target_id, *other, false);
            }
        }
        self.set(user_id, target_id, kind, true);
        true
    }

    /// Number of users with `kind` active on `target_id`.
    pub fn active_count(&self, target_id: &str, kind: InteractionKind) -> u64 {
        let suffix = format!("_{target_id}");
        self.bucket(kind)
            .iter()
            .filter(|(key, active)| {
                **active && key.len() > suffix.len() && key.ends_with(suffix.as_str())
            })
            .count() as u64
    }

    /// Every target id mentioned in any bucket for `kind`, with its active count.
    pub fn active_counts_by_target(&self, kind: InteractionKind) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();
        for (key, active) in self.bucket(kind) {
            if !*active {
                continue;
            }
            // Targets are uuids or sample ids, neither contains '_'.
            if let Some((_, target)) = key.rsplit_once('_') {
                *counts.entry(target.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_entry_is_inactive() {
        let ledger = InteractionLedger::default();
        assert!(!ledger.is_active("u1", "s1", InteractionKind::Like));
    }

    #[test]
    fn test_toggle_flips_and_keeps_entry() {
        let mut ledger = InteractionLedger::default();
        assert!(ledger.toggle("u1", "s1", InteractionKind::Like));
        assert!(!ledger.toggle("u1", "s1", InteractionKind::Like));

        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json["likes"]["u1_s1"], false);
    }

    #[test]
    fn test_toggle_is_scoped_per_kind_and_user() {
        let mut ledger = InteractionLedger::default();
        ledger.toggle("u1", "s1", InteractionKind::Like);
        assert!(!ledger.is_active("u1", "s1", InteractionKind::Save));
        assert!(!ledger.is_active("u2", "s1", InteractionKind::Like));
    }

    #[test]
    fn test_set_exclusive_clears_other_vote() {
        let mut ledger = InteractionLedger::default();
        ledger.set_exclusive("u1", "t1", InteractionKind::Upvote, &InteractionKind::VOTES);
        ledger.set_exclusive("u1", "t1", InteractionKind::Downvote, &InteractionKind::VOTES);

        assert!(ledger.is_active("u1", "t1", InteractionKind::Downvote));
        assert!(!ledger.is_active("u1", "t1", InteractionKind::Upvote));
    }

    #[test]
    fn test_active_count_ignores_other_targets_and_inactive() {
        let mut ledger = InteractionLedger::default();
        ledger.set("u1", "s1", InteractionKind::Like, true);
        ledger.set("u2", "s1", InteractionKind::Like, true);
        ledger.set("u3", "s1", InteractionKind::Like, false);
        ledger.set("u1", "xs1", InteractionKind::Like, true);

        assert_eq!(ledger.active_count("s1", InteractionKind::Like), 2);
        let by_target = ledger.active_counts_by_target(InteractionKind::Like);
        assert_eq!(by_target.get("s1"), Some(&2));
        assert_eq!(by_target.get("xs1"), Some(&1));
    }

    #[test]
    fn test_reads_legacy_document_with_missing_buckets() {
        let ledger: InteractionLedger =
            serde_json::from_str(r#"{"likes":{"u1_s1":true}}"#).unwrap();
        assert!(ledger.is_active("u1", "s1", InteractionKind::Like));
        assert!(!ledger.is_active("u1", "s1", InteractionKind::Download));
    }
}
