//! A synchronous store over a [`Registry`].
//!
//! `TestStore` holds the current state tree, dispatches actions through the
//! registry and counts notifications. A notification is recorded only when a
//! dispatch produced a different tree, so tests can observe change detection
//! the way a subscriber would.

use lazy_slices_core::action::Action;
use lazy_slices_core::composition::ReducerMap;
use lazy_slices_core::error::{RegistryError, SliceError};
use lazy_slices_core::reducer::SliceReducer;
use lazy_slices_core::registry::{Injected, Registry};
use lazy_slices_core::selector::{GuardedSelector, Selector};
use lazy_slices_core::state::CombinedState;
use std::sync::Arc;

/// Store used by tests to drive a registry.
///
/// No action is dispatched on creation; the tree starts empty (or with the
/// preloaded state) and slices appear on the first dispatch.
pub struct TestStore<A> {
    registry: Registry<A>,
    state: Arc<CombinedState>,
    history: Vec<String>,
    notifications: usize,
}

impl<A> TestStore<A>
where
    A: Action + 'static,
{
    /// Create a store with an empty state tree
    #[must_use]
    pub fn new(registry: Registry<A>) -> Self {
        Self::with_state(registry, CombinedState::new())
    }

    /// Create a store with a preloaded state tree
    #[must_use]
    pub fn with_state(registry: Registry<A>, state: CombinedState) -> Self {
        Self {
            registry,
            state: Arc::new(state),
            history: Vec::new(),
            notifications: 0,
        }
    }

    /// Dispatch an action, returning whether the state tree changed
    pub fn dispatch(&mut self, action: A) -> bool {
        self.history.push(action.action_type().to_string());

        let next = self.registry.reduce_shared(&self.state, &action);
        let changed = !Arc::ptr_eq(&next, &self.state);
        if changed {
            self.notifications += 1;
            self.state = next;
        }

        tracing::trace!(action = action.action_type(), changed, "Dispatched test action");
        changed
    }

    /// Inject slices into the store's registry.
    ///
    /// The new slices appear in the state tree on the next dispatch.
    ///
    /// # Errors
    ///
    /// Returns whatever [`Registry::inject`] returns.
    pub fn inject(&self, entries: ReducerMap<A>) -> Result<Injected<A>, RegistryError> {
        self.registry.inject(entries)
    }

    /// Run a guarded selector against the current state
    ///
    /// # Errors
    ///
    /// Returns the selector's [`SliceError`].
    pub fn select<S, Args>(
        &self,
        selector: &GuardedSelector<A, S>,
        args: Args,
    ) -> Result<S::Output, SliceError>
    where
        S: Selector<Args>,
    {
        selector.select(&self.state, args)
    }

    /// Current state tree
    #[must_use]
    pub fn state(&self) -> &CombinedState {
        &self.state
    }

    /// Current state tree as a shared handle
    #[must_use]
    pub fn shared_state(&self) -> Arc<CombinedState> {
        Arc::clone(&self.state)
    }

    /// The registry this store reduces with
    #[must_use]
    pub const fn registry(&self) -> &Registry<A> {
        &self.registry
    }

    /// Tags of every dispatched action, in order
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// How many dispatches changed the state tree
    #[must_use]
    pub const fn notifications(&self) -> usize {
        self.notifications
    }
}
