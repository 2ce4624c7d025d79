//! Subscription lifecycle state machine.
//!
//! This module provides [`SubscriptionController`], which owns exactly one
//! live subscription to a [`StateSource`] and forwards qualifying state
//! transitions to a host-supplied listener callback.
//!
//! # Overview
//!
//! A controller:
//! 1. Reads the source's snapshot at attach time to seed the comparison
//!    baseline (the snapshot itself is never forwarded to the listener)
//! 2. Evaluates an optional condition `(previous, current) -> bool` per
//!    delivery and invokes the listener when it passes
//! 3. Advances the baseline on *every* delivery, whether or not the listener
//!    fired
//! 4. Rebinds cleanly when the host swaps the source for a different instance
//!
//! # Example
//!
//! ```ignore
//! let mut controller = SubscriptionController::builder(source, ctx, |ctx, state| {
//!     navigate_if_needed(ctx, state);
//! })
//! .condition(|previous, current| previous != current)
//! .attach();
//!
//! // Host detected a different source bound to the same logical slot
//! controller.on_source_changed(other_source).await?;
//!
//! // Later, tear down gracefully
//! controller.detach().await?;
//! ```

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;

use crate::source::{SourceSubscription, StateSource};

/// Type alias for the listener callback.
///
/// The first parameter is an opaque context handle supplied by the host at
/// build time; the controller passes it through unmodified.
type Listener<S, C> = Arc<dyn Fn(&C, &S) + Send + Sync>;

/// Type alias for the condition predicate `(previous, current) -> bool`.
type Condition<S> = Arc<dyn Fn(&S, &S) -> bool + Send + Sync>;

/// Errors that can occur during the subscription lifecycle.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The listener panicked while handling a delivery. The panic killed the
    /// delivery loop; the controller is unbound once this is returned.
    #[error("listener panicked while handling a state delivery")]
    ListenerPanicked,
}

/// The exclusively owned handle to a live subscription.
///
/// At most one of these exists per controller. Stopping sends on the stop
/// channel and joins the delivery-loop task, so no listener invocation can
/// happen after the join resolves.
struct ActiveSubscription {
    stop_tx: Option<tokio::sync::oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ActiveSubscription {
    async fn stop(mut self) -> Result<(), ControllerError> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.task.await.map_err(|_| ControllerError::ListenerPanicked)
    }
}

/// Builder for configuring and attaching a [`SubscriptionController`].
///
/// Created via [`SubscriptionController::builder()`]. Use [`condition()`] to
/// register the optional gating predicate, then call [`attach()`] to bind to
/// the source.
///
/// [`condition()`]: ControllerBuilder::condition
/// [`attach()`]: ControllerBuilder::attach
pub struct ControllerBuilder<S, C> {
    source: Arc<dyn StateSource<S>>,
    context: Arc<C>,
    listener: Listener<S, C>,
    condition: Option<Condition<S>>,
}

impl<S, C> ControllerBuilder<S, C>
where
    S: Clone + Send + 'static,
    C: Send + Sync + 'static,
{
    /// Register the predicate gating listener invocation.
    ///
    /// The predicate receives the previous and the just-delivered state and
    /// returns whether the listener should fire for this transition. When no
    /// condition is registered, every delivery fires the listener.
    ///
    /// Suppression affects only the listener call — the tracked baseline
    /// advances on every delivery regardless.
    #[must_use]
    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&S, &S) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Attach to the source and return the bound controller.
    ///
    /// Reads the source's snapshot to seed the comparison baseline and, if a
    /// snapshot is present, starts the delivery loop. A source with no
    /// snapshot yet leaves the controller inert (no subscription) until a
    /// later [`on_source_changed()`] finds one.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// [`on_source_changed()`]: SubscriptionController::on_source_changed
    #[must_use]
    pub fn attach(self) -> SubscriptionController<S, C> {
        let mut controller = SubscriptionController {
            source: self.source,
            context: self.context,
            listener: self.listener,
            condition: self.condition,
            active: None,
        };
        controller.start_subscription();
        controller
    }
}

/// Binds a [`StateSource`] to a one-shot side-effect listener.
///
/// The controller is the only owner of its subscription: at most one is live
/// at any time, and [`detach()`] (or dropping the controller) releases it.
/// The source itself is shared with the host and never mutated here.
///
/// All lifecycle methods take `&mut self`, so a host cannot interleave
/// `attach`/`on_source_changed`/`detach` calls on one controller without
/// external synchronization — the borrow checker enforces the single
/// execution context this type assumes.
///
/// [`detach()`]: SubscriptionController::detach
pub struct SubscriptionController<S, C = ()> {
    source: Arc<dyn StateSource<S>>,
    context: Arc<C>,
    listener: Listener<S, C>,
    condition: Option<Condition<S>>,
    active: Option<ActiveSubscription>,
}

impl<S, C> SubscriptionController<S, C>
where
    S: Clone + Send + 'static,
    C: Send + Sync + 'static,
{
    /// Start building a controller bound to `source`.
    ///
    /// `context` is an opaque handle passed through to every listener
    /// invocation; hosts with nothing to pass use `()`.
    #[must_use]
    pub fn builder<F>(
        source: Arc<dyn StateSource<S>>,
        context: C,
        listener: F,
    ) -> ControllerBuilder<S, C>
    where
        F: Fn(&C, &S) + Send + Sync + 'static,
    {
        ControllerBuilder {
            source,
            context: Arc::new(context),
            listener: Arc::new(listener),
            condition: None,
        }
    }

    /// Whether a subscription is currently live.
    ///
    /// `false` either after [`detach()`] or when the bound source had no
    /// snapshot at the last attach attempt.
    ///
    /// [`detach()`]: SubscriptionController::detach
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.active.as_ref().is_some_and(|a| !a.task.is_finished())
    }

    /// Rebind after the host detected a source change.
    ///
    /// Sources are compared by identity (`Arc::ptr_eq`), not by value — two
    /// sources holding equal state are still different if they are different
    /// instances. When the identity is unchanged and a subscription is live,
    /// this is a strict no-op: the subscription and its baseline are
    /// preserved, so hosts may call this on every re-render without losing
    /// pending transitions.
    ///
    /// When the identity differs — or the controller is inert because the
    /// previous attach found no snapshot — the old subscription (if any) is
    /// released and joined first, then the baseline is reseeded from
    /// `new_source` and a fresh subscription attached.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::ListenerPanicked`] if the outgoing delivery
    /// loop died from a listener panic. The rebind does not proceed in that
    /// case; call again to bind the new source.
    pub async fn on_source_changed(
        &mut self,
        new_source: Arc<dyn StateSource<S>>,
    ) -> Result<(), ControllerError> {
        if Arc::ptr_eq(&self.source, &new_source) && self.active.is_some() {
            tracing::trace!("source identity unchanged, keeping subscription");
            return Ok(());
        }

        self.release_subscription().await?;
        self.source = new_source;
        self.start_subscription();
        Ok(())
    }

    /// Release the active subscription and wait for the delivery loop to
    /// finish.
    ///
    /// Takes effect for future deliveries only: a listener call already in
    /// progress runs to completion before this resolves. Idempotent —
    /// detaching an unbound controller is a no-op. After this returns, no
    /// further listener invocations occur for this controller.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::ListenerPanicked`] if the delivery loop
    /// died from a listener panic before being stopped.
    pub async fn detach(&mut self) -> Result<(), ControllerError> {
        self.release_subscription().await
    }

    async fn release_subscription(&mut self) -> Result<(), ControllerError> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };
        active.stop().await
    }

    /// Subscribe to the bound source and start the delivery loop.
    ///
    /// Caller must have released any previous subscription first.
    fn start_subscription(&mut self) {
        let SourceSubscription { snapshot, stream } = self.source.subscribe();
        let Some(seed) = snapshot else {
            tracing::debug!("source has no snapshot yet, controller is inert until rebind");
            return;
        };

        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel();
        let listener = Arc::clone(&self.listener);
        let condition = self.condition.clone();
        let context = Arc::clone(&self.context);

        let task = tokio::spawn(async move {
            let mut stream = stream;
            let mut previous = seed;

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => {
                        tracing::debug!("subscription stopped");
                        break;
                    }
                    state = stream.next() => {
                        let Some(state) = state else {
                            tracing::debug!("state stream ended");
                            break;
                        };

                        let notify = condition
                            .as_ref()
                            .is_none_or(|condition| condition(&previous, &state));
                        tracing::trace!(notify, "state delivered");

                        // Baseline advances before the listener runs, so a
                        // suppressed call or a listener panic never skews the
                        // next condition evaluation.
                        previous = state.clone();

                        if notify {
                            listener(&context, &state);
                        }
                    }
                }
            }
        });

        self.active = Some(ActiveSubscription {
            stop_tx: Some(stop_tx),
            task,
        });
        tracing::debug!("subscription attached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::inmemory;

    #[test]
    fn listener_panicked_displays() {
        let err = ControllerError::ListenerPanicked;
        assert!(err.to_string().contains("panicked"));
    }

    #[test]
    fn attach_without_snapshot_is_inert() {
        let source = Arc::new(inmemory::Source::<u32>::new());
        let controller =
            SubscriptionController::builder(source.clone(), (), |&(): &(), _: &u32| {}).attach();

        assert!(!controller.is_attached());
        assert_eq!(source.subscriber_count(), 0);
    }
}
