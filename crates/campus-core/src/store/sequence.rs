// ── Fetch sequencing ─────────────────────────────────────────────────
//
// Every fetch takes a `Ticket` before it awaits the backend. The store
// admits a fetch result only if its epoch is current (no teardown happened
// since it was issued) and its sequence number is newer than the last
// result applied to the same family.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use strum::{Display, EnumIter, EnumString};

/// Independently refreshed parts of the view model.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Family {
    Alerts,
    Counters,
    Health,
    Sensors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub family: Family,
    pub epoch: u64,
    pub seq: u64,
}

/// Provenance of a mutation, checked by the store before it applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    /// Result of a sequenced fetch.
    Fetch(Ticket),
    /// Push event or confirmed command, valid for one epoch.
    Live { epoch: u64 },
}

impl Stamp {
    pub fn epoch(self) -> u64 {
        match self {
            Self::Fetch(ticket) => ticket.epoch,
            Self::Live { epoch } => epoch,
        }
    }
}

/// Issues tickets. The epoch here mirrors `SyncState::epoch`, which is the
/// authoritative copy checked under the store's lock.
#[derive(Debug, Default)]
pub(crate) struct Sequencer {
    epoch: AtomicU64,
    next_seq: AtomicU64,
}

impl Sequencer {
    pub(crate) fn issue(&self, family: Family) -> Ticket {
        Ticket {
            family,
            epoch: self.epoch.load(Ordering::Acquire),
            seq: self.next_seq.fetch_add(1, Ordering::AcqRel) + 1,
        }
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub(crate) fn set_epoch(&self, epoch: u64) {
        self.epoch.store(epoch, Ordering::Release);
    }
}

/// Sequencing state kept inside the view model's lock.
#[derive(Debug, Clone, Default)]
pub(crate) struct SyncState {
    pub(crate) epoch: u64,
    applied: BTreeMap<Family, u64>,
}

impl SyncState {
    /// Decide whether a mutation with `stamp` may apply, recording fetch
    /// sequence numbers that are admitted.
    pub(crate) fn admit(&mut self, stamp: Stamp) -> bool {
        if stamp.epoch() != self.epoch {
            return false;
        }
        match stamp {
            Stamp::Fetch(ticket) => {
                let last = self.applied.entry(ticket.family).or_insert(0);
                if ticket.seq <= *last {
                    return false;
                }
                *last = ticket.seq;
                true
            }
            Stamp::Live { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_are_monotonic() {
        let seq = Sequencer::default();
        let a = seq.issue(Family::Counters);
        let b = seq.issue(Family::Health);
        let c = seq.issue(Family::Counters);
        assert!(a.seq < b.seq && b.seq < c.seq);
    }

    #[test]
    fn older_ticket_is_rejected_after_newer_applied() {
        let seq = Sequencer::default();
        let mut sync = SyncState::default();
        let first = seq.issue(Family::Counters);
        let second = seq.issue(Family::Counters);

        assert!(sync.admit(Stamp::Fetch(second)));
        assert!(!sync.admit(Stamp::Fetch(first)));
    }

    #[test]
    fn families_are_sequenced_independently() {
        let seq = Sequencer::default();
        let mut sync = SyncState::default();
        let health = seq.issue(Family::Health);
        let counters = seq.issue(Family::Counters);

        assert!(sync.admit(Stamp::Fetch(counters)));
        assert!(sync.admit(Stamp::Fetch(health)));
    }

    #[test]
    fn stale_epoch_is_rejected() {
        let seq = Sequencer::default();
        let mut sync = SyncState::default();
        let ticket = seq.issue(Family::Alerts);

        sync.epoch = 1;
        seq.set_epoch(1);
        assert!(!sync.admit(Stamp::Fetch(ticket)));
        assert!(!sync.admit(Stamp::Live { epoch: 0 }));
        assert!(sync.admit(Stamp::Live { epoch: 1 }));
        assert!(sync.admit(Stamp::Fetch(seq.issue(Family::Alerts))));
    }
}
