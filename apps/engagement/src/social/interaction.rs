//! The single reducer that moves ledger flags and denormalized counters together.
//!
//! Every counter change in the store goes through `Interaction::apply`. After
//! each application the touched target is checked against its ledger floor:
//! a counter may exceed the number of active ledger entries (other devices,
//! seeded data) but never fall below it.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::skill::{Counter, EngagementCounters, SharedSkill};
use crate::social::ledger::{InteractionKind, InteractionLedger};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "up" => Some(VoteType::Up),
            "down" => Some(VoteType::Down),
            _ => None,
        }
    }

    pub fn kind(&self) -> InteractionKind {
        match self {
            VoteType::Up => InteractionKind::Upvote,
            VoteType::Down => InteractionKind::Downvote,
        }
    }

    /// The vote currently cast by `user_id` on `target_id`, if any.
    pub fn current(ledger: &InteractionLedger, user_id: &str, target_id: &str) -> Option<Self> {
        if ledger.is_active(user_id, target_id, InteractionKind::Upvote) {
            Some(VoteType::Up)
        } else if ledger.is_active(user_id, target_id, InteractionKind::Downvote) {
            Some(VoteType::Down)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    /// Like or save: flips the flag, moves the counter by one.
    Toggle(InteractionKind),
    /// Exclusive up/down vote. Repeating the current vote clears it.
    Vote(VoteType),
    /// Set-active without toggling back (download).
    Activate(InteractionKind),
    View,
    CommentPosted,
}

/// A counter that disagreed with the ledger or would have gone negative.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Inconsistency {
    pub target_id: String,
    pub counter: Counter,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// State of the interaction's own flag after application.
    pub active: bool,
    pub inconsistencies: Vec<Inconsistency>,
}

/// Anything carrying counters an interaction can move.
pub trait CounterSet {
    fn counter_mut(&mut self, counter: Counter) -> Option<&mut u64>;
}

impl CounterSet for EngagementCounters {
    fn counter_mut(&mut self, counter: Counter) -> Option<&mut u64> {
        Some(self.get_mut(counter))
    }
}

/// The single like counter of a comment or reply.
pub struct LikeCounter<'a>(pub &'a mut u64);

impl CounterSet for LikeCounter<'_> {
    fn counter_mut(&mut self, counter: Counter) -> Option<&mut u64> {
        match counter {
            Counter::Likes => Some(&mut *self.0),
            _ => None,
        }
    }
}

impl Interaction {
    pub fn apply<C: CounterSet>(
        &self,
        user_id: &str,
        target_id: &str,
        ledger: &mut InteractionLedger,
        counters: &mut C,
    ) -> Applied {
        let mut issues = Vec::new();

        let active = match *self {
            Interaction::Toggle(kind) => {
                let active = ledger.toggle(user_id, target_id, kind);
                let delta = if active { 1 } else { -1 };
                adjust(counters, kind.counter(), delta, target_id, &mut issues);
                active
            }
            Interaction::Vote(vote) => {
                let kind = vote.kind();
                if ledger.is_active(user_id, target_id, kind) {
                    ledger.set(user_id, target_id, kind, false);
                    adjust(counters, kind.counter(), -1, target_id, &mut issues);
                    false
                } else {
                    for other in InteractionKind::VOTES.iter().filter(|k| **k != kind) {
                        if ledger.is_active(user_id, target_id, *other) {
                            adjust(counters, other.counter(), -1, target_id, &mut issues);
                        }
                    }
                    ledger.set_exclusive(user_id, target_id, kind, &InteractionKind::VOTES);
                    adjust(counters, kind.counter(), 1, target_id, &mut issues);
                    true
                }
            }
            Interaction::Activate(kind) => {
                if !ledger.set(user_id, target_id, kind, true) {
                    adjust(counters, kind.counter(), 1, target_id, &mut issues);
                }
                true
            }
            Interaction::View => {
                adjust(counters, Counter::Views, 1, target_id, &mut issues);
                false
            }
            Interaction::CommentPosted => {
                adjust(counters, Counter::Comments, 1, target_id, &mut issues);
                false
            }
        };

        enforce_floor(ledger, target_id, counters, &mut issues);

        Applied {
            active,
            inconsistencies: issues,
        }
    }
}

fn adjust<C: CounterSet>(
    counters: &mut C,
    counter: Counter,
    delta: i64,
    target_id: &str,
    issues: &mut Vec<Inconsistency>,
) {
    let Some(value) = counters.counter_mut(counter) else {
        issues.push(report(target_id, counter, "counter not present on target".into()));
        return;
    };

    if delta >= 0 {
        *value = value.saturating_add(delta as u64);
    } else if *value == 0 {
        issues.push(report(
            target_id,
            counter,
            "decrement requested on a counter already at 0".into(),
        ));
    } else {
        *value -= delta.unsigned_abs().min(*value);
    }
}

/// Raises any counter that sits below its ledger-active count.
fn enforce_floor<C: CounterSet>(
    ledger: &InteractionLedger,
    target_id: &str,
    counters: &mut C,
    issues: &mut Vec<Inconsistency>,
) {
    for kind in InteractionKind::ALL {
        let counter = kind.counter();
        let Some(value) = counters.counter_mut(counter) else {
            continue;
        };
        let floor = ledger.active_count(target_id, kind);
        if *value < floor {
            issues.push(report(
                target_id,
                counter,
                format!("counter {value} below ledger floor {floor}; raised"),
            ));
            *value = floor;
        }
    }
}

fn report(target_id: &str, counter: Counter, detail: String) -> Inconsistency {
    warn!("Counter inconsistency on {target_id} ({counter:?}): {detail}");
    Inconsistency {
        target_id: target_id.to_string(),
        counter,
        detail,
    }
}

/// Audit pass over a whole collection. Repairs in place and returns what it fixed.
pub fn reconcile(skills: &mut [SharedSkill], ledger: &InteractionLedger) -> Vec<Inconsistency> {
    let floors: Vec<_> = InteractionKind::ALL
        .iter()
        .map(|kind| (*kind, ledger.active_counts_by_target(*kind)))
        .collect();

    let mut issues = Vec::new();
    for skill in skills.iter_mut() {
        for (kind, counts) in &floors {
            let floor = counts.get(&skill.id).copied().unwrap_or(0);
            let value = skill.counters.get(kind.counter());
            if value < floor {
                issues.push(report(
                    &skill.id,
                    kind.counter(),
                    format!("counter {value} below ledger floor {floor}; raised"),
                ));
                *skill.counters.get_mut(kind.counter()) = floor;
            }
        }
    }
    issues
}
