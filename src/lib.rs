//! One-shot side-effect bindings over observable state sources.
//!
//! This crate connects a state-holding object (a [`StateSource`], which
//! exposes a synchronously readable snapshot plus a stream of future state
//! values) to a side-effect callback that must fire exactly once per
//! qualifying state transition: navigation, showing a transient dialog,
//! triggering a sound, logging. The hard part is the subscription lifecycle,
//! not the callback itself — attaching without replaying the current value,
//! gating deliveries through an optional predicate, rebinding cleanly when
//! the source is swapped for a different instance, and tearing down with no
//! missed or duplicated notifications and no leaked subscriptions.
//!
//! - [`source`] - The [`StateSource`] abstraction and an in-memory
//!   implementation for tests and examples
//! - [`controller`] - [`SubscriptionController`], the subscription lifecycle
//!   state machine
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use statebind::{SubscriptionController, source::inmemory};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let source = Arc::new(inmemory::Source::with_initial(0u32));
//!
//! let mut controller = SubscriptionController::builder(
//!     source.clone(),
//!     (),
//!     |&(): &(), state: &u32| println!("reached {state}"),
//! )
//! .condition(|previous: &u32, current: &u32| current > previous)
//! .attach();
//!
//! // Only values emitted after attach are candidates for the listener;
//! // the snapshot read at attach time seeds the comparison baseline.
//! source.emit(1);
//!
//! controller.detach().await.unwrap();
//! # }
//! ```

pub mod controller;
pub mod source;

pub use controller::{ControllerBuilder, ControllerError, SubscriptionController};
pub use source::{SourceSubscription, StateSource, StateStream};
