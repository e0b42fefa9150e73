// ── Reactive view stream ─────────────────────────────────────────────
//
// Subscription handle over the store's view model, for consumers that
// redraw on change (the CLI `watch` command, tests).

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::ViewModel;

/// Point-in-time snapshot plus change notification.
pub struct ViewStream {
    current: ViewModel,
    receiver: watch::Receiver<ViewModel>,
}

impl ViewStream {
    pub(crate) fn new(mut receiver: watch::Receiver<ViewModel>) -> Self {
        let current = receiver.borrow_and_update().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation or by the last `changed()`.
    pub fn current(&self) -> &ViewModel {
        &self.current
    }

    /// The latest view model, which may be newer than `current()`.
    pub fn latest(&self) -> ViewModel {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the reconciler is gone.
    pub async fn changed(&mut self) -> Option<&ViewModel> {
        self.receiver.changed().await.ok()?;
        self.current = self.receiver.borrow_and_update().clone();
        Some(&self.current)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> ViewWatchStream {
        ViewWatchStream {
            inner: WatchStream::from_changes(self.receiver),
        }
    }
}

/// `Stream` adapter yielding a view model per change.
pub struct ViewWatchStream {
    inner: WatchStream<ViewModel>,
}

impl Stream for ViewWatchStream {
    type Item = ViewModel;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::StreamExt;

    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn changed_tracks_store_updates() {
        let store = Store::default();
        let mut stream = ViewStream::new(store.subscribe());
        assert!(stream.current().email_alerts_enabled);

        store.apply(store.live_stamp(), |vm| vm.set_email_alerts(false));
        let vm = stream.changed().await.unwrap();
        assert!(!vm.email_alerts_enabled);
        assert!(!stream.current().email_alerts_enabled);
    }

    #[tokio::test]
    async fn stream_yields_changes_only() {
        let store = Store::default();
        let mut stream = ViewStream::new(store.subscribe()).into_stream();

        store.apply(store.live_stamp(), |vm| vm.set_email_alerts(false));
        let vm = stream.next().await.unwrap();
        assert!(!vm.email_alerts_enabled);

        drop(store);
        assert!(stream.next().await.is_none());
    }
}
