// ── Store ────────────────────────────────────────────────────────────
//
// Owns the view model behind a `watch` channel. All mutation funnels
// through `Store::apply`, which runs under the channel's write lock, so
// updates are serialized and the staleness check sees the same state the
// mutation does.

pub mod sequence;
pub mod view;

use tokio::sync::watch;

pub use sequence::{Family, Stamp, Ticket};
pub use view::{History, StoreLimits, ViewModel};

use sequence::Sequencer;

pub struct Store {
    tx: watch::Sender<ViewModel>,
    sequencer: Sequencer,
}

impl Store {
    pub fn new(limits: StoreLimits) -> Self {
        let (tx, _rx) = watch::channel(ViewModel::new(limits));
        Self {
            tx,
            sequencer: Sequencer::default(),
        }
    }

    /// Subscribe to view-model changes.
    pub fn subscribe(&self) -> watch::Receiver<ViewModel> {
        self.tx.subscribe()
    }

    /// Clone of the current view model.
    pub fn snapshot(&self) -> ViewModel {
        self.tx.borrow().clone()
    }

    /// Read the current view model without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&ViewModel) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Take a ticket for a fetch about to start.
    pub fn issue(&self, family: Family) -> Ticket {
        self.sequencer.issue(family)
    }

    /// Stamp for push events and confirmed commands in the current epoch.
    pub fn live_stamp(&self) -> Stamp {
        Stamp::Live {
            epoch: self.sequencer.epoch(),
        }
    }

    /// Invalidate every outstanding ticket and stamp.
    pub fn advance_epoch(&self) -> u64 {
        let mut epoch = 0;
        self.tx.send_if_modified(|vm| {
            vm.sync.epoch += 1;
            epoch = vm.sync.epoch;
            false
        });
        self.sequencer.set_epoch(epoch);
        epoch
    }

    /// Apply `mutate` unless `stamp` is stale. Returns `true` if the
    /// mutation was admitted (whether or not it changed anything).
    pub fn apply(&self, stamp: Stamp, mutate: impl FnOnce(&mut ViewModel) -> bool) -> bool {
        let mut admitted = false;
        self.tx.send_if_modified(|vm| {
            if !vm.sync.admit(stamp) {
                tracing::debug!(?stamp, current_epoch = vm.sync.epoch, "dropping stale update");
                return false;
            }
            admitted = true;
            mutate(vm)
        });
        admitted
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreLimits::default())
    }
}
