//! State source abstraction.
//!
//! A source owns a piece of state and exposes two views of it: the value it
//! currently holds (readable synchronously at any time) and the sequence of
//! values it will hold in the future (a stream a consumer subscribes to).
//! Sources are owned by the host; the controller only reads from them and
//! subscribes to them.
//!
//! The two views are captured together by [`StateSource::subscribe`], which
//! returns a [`SourceSubscription`] pairing the snapshot with a stream of
//! strictly-later values. The pairing is atomic: no value emitted by the
//! source can fall between the snapshot read and the stream attach, so a
//! consumer never silently loses or double-counts a transition.

use std::pin::Pin;

use futures_core::Stream;

pub mod inmemory;

/// Type alias for the boxed stream of future state values returned by
/// [`StateSource::subscribe`].
pub type StateStream<S> = Pin<Box<dyn Stream<Item = S> + Send>>;

/// A snapshot/stream pair captured atomically at subscribe time.
///
/// The snapshot is the value the source held at the moment the subscription
/// was taken (`None` if the source has not produced a first value yet). The
/// stream yields only values produced *after* that moment — the snapshot
/// itself is never replayed through the stream.
pub struct SourceSubscription<S> {
    /// The source's current value at subscribe time, if any.
    pub snapshot: Option<S>,
    /// Values produced strictly after the subscription was taken.
    pub stream: StateStream<S>,
}

/// An externally owned object holding a piece of observable state.
///
/// Implementations must serialize emissions: values arrive on the stream in
/// the order they were produced, one at a time. `None` from [`snapshot()`] is
/// not an error — it means the source has not produced its first value yet.
///
/// The crate ships [`inmemory::Source`] as a reference implementation
/// suitable for unit tests and examples.
///
/// [`snapshot()`]: StateSource::snapshot
pub trait StateSource<S>: Send + Sync {
    /// Read the source's current value without subscribing.
    fn snapshot(&self) -> Option<S>;

    /// Capture the current value and a stream of all later values.
    ///
    /// The returned stream is cancelled by dropping it; a source must tolerate
    /// subscribers disappearing at any time.
    fn subscribe(&self) -> SourceSubscription<S>;
}
