//! In-memory state source implementation for testing.
//!
//! This module provides [`Source`], a thread-safe in-memory implementation of
//! [`StateSource`](super::StateSource) suitable for unit tests and examples.
//!
//! # Example
//!
//! ```
//! use statebind::source::inmemory;
//!
//! let source: inmemory::Source<u32> = inmemory::Source::with_initial(0);
//! source.emit(1);
//! ```

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{SourceSubscription, StateSource};

/// In-memory state source backed by per-subscriber unbounded channels.
///
/// Each subscriber gets its own channel, so emissions are never coalesced or
/// dropped and every subscriber observes values in emission order. Cloning
/// the source clones a handle to the same underlying state (same identity
/// from the controller's point of view only when the same `Arc<Source>` is
/// shared; two `Source::new()` calls are distinct sources).
#[derive(Clone)]
pub struct Source<S> {
    inner: Arc<Mutex<Inner<S>>>,
}

struct Inner<S> {
    current: Option<S>,
    subscribers: Vec<mpsc::UnboundedSender<S>>,
}

impl<S> Source<S> {
    /// Create a source with no current value.
    ///
    /// [`StateSource::snapshot`] returns `None` until the first
    /// [`emit()`](Source::emit).
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                current: None,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Create a source already holding a value.
    #[must_use]
    pub fn with_initial(value: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                current: Some(value),
                subscribers: Vec::new(),
            })),
        }
    }
}

impl<S> Default for Source<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone> Source<S> {
    /// Produce a new state value.
    ///
    /// Updates the snapshot and fans the value out to every live subscriber.
    /// Subscribers whose stream has been dropped are pruned here.
    pub fn emit(&self, value: S) {
        let mut inner = self.inner.lock().expect("in-memory source lock poisoned");
        inner
            .subscribers
            .retain(|tx| tx.send(value.clone()).is_ok());
        tracing::trace!(subscribers = inner.subscribers.len(), "emitted state value");
        inner.current = Some(value);
    }

    /// Number of subscriptions whose stream is still alive.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock().expect("in-memory source lock poisoned");
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }
}

impl<S> StateSource<S> for Source<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn snapshot(&self) -> Option<S> {
        self.inner
            .lock()
            .expect("in-memory source lock poisoned")
            .current
            .clone()
    }

    fn subscribe(&self) -> SourceSubscription<S> {
        // Snapshot and channel registration happen under one lock, so no emit
        // can interleave between them.
        let mut inner = self.inner.lock().expect("in-memory source lock poisoned");
        let (tx, rx) = mpsc::unbounded_channel();
        inner.subscribers.push(tx);
        SourceSubscription {
            snapshot: inner.current.clone(),
            stream: Box::pin(UnboundedReceiverStream::new(rx)),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_stream::StreamExt as _;

    use super::*;

    #[test]
    fn new_has_no_snapshot() {
        let source = Source::<u32>::new();
        assert!(source.snapshot().is_none());
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn with_initial_has_snapshot() {
        let source = Source::with_initial(7u32);
        assert_eq!(source.snapshot(), Some(7));
    }

    #[test]
    fn emit_updates_snapshot() {
        let source = Source::with_initial(0u32);
        source.emit(3);
        assert_eq!(source.snapshot(), Some(3));
    }

    #[tokio::test]
    async fn subscribe_yields_only_later_values() {
        let source = Source::with_initial(0u32);
        let subscription = source.subscribe();

        assert_eq!(subscription.snapshot, Some(0));

        source.emit(1);
        source.emit(2);

        let mut stream = subscription.stream;
        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.next().await, Some(2));
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let source = Source::with_initial(0u32);
        let subscription = source.subscribe();
        assert_eq!(source.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(source.subscriber_count(), 0);

        // Emit after the subscriber is gone must not fail.
        source.emit(1);
        assert_eq!(source.snapshot(), Some(1));
    }
}
