//! # Lazy Slices Core
//!
//! A state container whose set of reducers can grow at runtime.
//!
//! A [`Registry`](registry::Registry) starts from a known set of slices, can
//! declare the shape of slices that will arrive later, and accepts new slice
//! reducers through [`inject`](registry::Registry::inject) while it is
//! already producing state. Selectors built against the registry read slices
//! through typed [`SliceKey`](slice::SliceKey)s and never observe a missing
//! slice as a silently wrong value.
//!
//! ## Core Concepts
//!
//! - **Slice**: an independently reducible region of the state tree, identified by name
//! - **Action**: opaque input passed unchanged to every slice reducer
//! - **Slice reducer**: pure function `(SliceState, Action) → SliceState`
//! - **Combined reducer**: the single reducer derived from every registered slice reducer
//! - **Injection**: registering a slice reducer after the registry already exists
//! - **Declared shape**: a forward reference to a slice that has no reducer yet
//! - **Guarded selector**: a state reader that resolves missing slices by policy
//!
//! ## Example
//!
//! ```
//! use lazy_slices_core::prelude::*;
//!
//! #[derive(Debug, Clone)]
//! struct Tick;
//!
//! impl Action for Tick {
//!     fn action_type(&self) -> &str {
//!         "tick"
//!     }
//! }
//!
//! const COUNT: SliceKey<u64> = SliceKey::from_static("count");
//! const LATE: SliceKey<u64> = SliceKey::from_static("late");
//!
//! let count = Slice::new(COUNT.name().clone(), reducer_fn(0_u64, |n: &u64, _: &Tick| n + 1));
//! let registry = Registry::create(ReducerMap::new().with_slice(&count))?
//!     .with_declared_slices(DeclaredSlices::new().declare(&LATE));
//!
//! let state = registry.reduce(&CombinedState::new(), &Tick);
//! assert_eq!(state.get(&COUNT), Some(&1));
//! assert!(!state.contains(LATE.name().as_str()));
//!
//! let late_reads = registry.selector(selector_fn(|view, ()| Ok(*view.slice(&LATE)?)));
//! assert!(late_reads.select(&state, ()).is_err());
//!
//! let late = Slice::new(LATE.name().clone(), reducer_fn(10_u64, |n: &u64, _: &Tick| n * 2));
//! let injected = registry.inject(ReducerMap::new().with_slice(&late))?;
//! let state = injected.reduce(&state, &Tick);
//! let late_reads = injected.selector(selector_fn(|view, ()| Ok(*view.slice(&LATE)?)));
//! assert_eq!(late_reads.select(&state, ())?, 20);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Combined reducer derivation from registered slice reducers
pub mod composition;

/// Registry configuration
pub mod config;

/// Declared slice shapes for slices that are injected later
pub mod declared;

/// Error types
pub mod error;

/// Memoized selectors
pub mod memo;

/// Metrics emitted by the registry
pub mod metrics;

/// The lazily extensible reducer registry
pub mod registry;

/// Safe slice access for selectors
pub mod selector;

/// Slice names, typed keys and named slices
pub mod slice;

/// The combined state tree
pub mod state;

/// Action module - the opaque input handed to every slice reducer
///
/// The registry never inspects an action beyond its [`Action::action_type`]
/// tag, which is used for log fields and metric labels. Actions are passed
/// by reference to each slice reducer, unchanged.
pub mod action {
    /// An action with a discriminator tag.
    ///
    /// # Example
    ///
    /// ```
    /// use lazy_slices_core::action::Action;
    ///
    /// enum TodoAction {
    ///     Added(String),
    ///     Cleared,
    /// }
    ///
    /// impl Action for TodoAction {
    ///     fn action_type(&self) -> &str {
    ///         match self {
    ///             Self::Added(_) => "todo/added",
    ///             Self::Cleared => "todo/cleared",
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Action {
        /// The discriminator tag of this action
        fn action_type(&self) -> &str;
    }

    impl Action for &'static str {
        fn action_type(&self) -> &str {
            self
        }
    }

    impl Action for String {
        fn action_type(&self) -> &str {
            self.as_str()
        }
    }
}

/// Reducer module - the per-slice business logic trait
///
/// Slice reducers are pure functions: `(SliceState, Action) → SliceState`.
///
/// A reducer never sees the state of sibling slices. When its slice is absent
/// from the incoming state tree (the slice was just injected, or the tree is
/// brand new) the combined reducer starts it from
/// [`SliceReducer::initial_state`].
pub mod reducer {
    use std::marker::PhantomData;
    use std::sync::Arc;

    /// The slice reducer trait
    ///
    /// # Example
    ///
    /// ```
    /// use lazy_slices_core::reducer::SliceReducer;
    ///
    /// enum CounterAction {
    ///     Increment,
    ///     Reset,
    /// }
    ///
    /// struct CounterReducer;
    ///
    /// impl SliceReducer for CounterReducer {
    ///     type State = i64;
    ///     type Action = CounterAction;
    ///
    ///     fn initial_state(&self) -> i64 {
    ///         0
    ///     }
    ///
    ///     fn reduce(&self, state: &i64, action: &CounterAction) -> i64 {
    ///         match action {
    ///             CounterAction::Increment => state + 1,
    ///             CounterAction::Reset => 0,
    ///         }
    ///     }
    /// }
    ///
    /// assert_eq!(CounterReducer.reduce(&41, &CounterAction::Increment), 42);
    /// ```
    pub trait SliceReducer: Send + Sync + 'static {
        /// The state of the slice this reducer owns
        type State: Send + Sync + 'static;

        /// The action type this reducer processes
        type Action;

        /// State used when the slice is not yet part of the state tree
        fn initial_state(&self) -> Self::State;

        /// Reduce an action into the next slice state
        fn reduce(&self, state: &Self::State, action: &Self::Action) -> Self::State;

        /// Reduce a shared slice state.
        ///
        /// Reducers that can tell an action is irrelevant to them may return
        /// `Arc::clone(state)`, which lets the combined reducer report the
        /// whole tree as unchanged.
        fn reduce_shared(
            &self,
            state: &Arc<Self::State>,
            action: &Self::Action,
        ) -> Arc<Self::State> {
            Arc::new(self.reduce(state, action))
        }
    }

    /// A slice reducer built from an initial value and a closure.
    ///
    /// Created by [`reducer_fn`].
    pub struct FnReducer<S, A, F> {
        initial: S,
        reduce: F,
        _phantom: PhantomData<fn(&A)>,
    }

    impl<S, A, F> std::fmt::Debug for FnReducer<S, A, F>
    where
        S: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("FnReducer")
                .field("initial", &self.initial)
                .finish_non_exhaustive()
        }
    }

    /// Build a slice reducer from an initial state and a reduce closure.
    ///
    /// # Example
    ///
    /// ```
    /// use lazy_slices_core::reducer::{reducer_fn, SliceReducer};
    ///
    /// let reducer = reducer_fn(String::new(), |state: &String, action: &&'static str| {
    ///     format!("{state}{action}")
    /// });
    ///
    /// assert_eq!(reducer.initial_state(), "");
    /// assert_eq!(reducer.reduce(&"a".to_string(), &"b"), "ab");
    /// ```
    pub const fn reducer_fn<S, A, F>(initial: S, reduce: F) -> FnReducer<S, A, F>
    where
        F: Fn(&S, &A) -> S,
    {
        FnReducer {
            initial,
            reduce,
            _phantom: PhantomData,
        }
    }

    impl<S, A, F> SliceReducer for FnReducer<S, A, F>
    where
        S: Clone + Send + Sync + 'static,
        A: 'static,
        F: Fn(&S, &A) -> S + Send + Sync + 'static,
    {
        type State = S;
        type Action = A;

        fn initial_state(&self) -> S {
            self.initial.clone()
        }

        fn reduce(&self, state: &S, action: &A) -> S {
            (self.reduce)(state, action)
        }
    }
}

/// Commonly used items
pub mod prelude {
    pub use crate::action::Action;
    pub use crate::composition::{CombinedReducer, ReduceOutcome, ReducerMap};
    pub use crate::config::{FallbackPolicy, RegistryConfig};
    pub use crate::declared::DeclaredSlices;
    pub use crate::error::{IllegalReinjection, RegistryError, SliceError};
    pub use crate::memo::create_selector;
    pub use crate::reducer::{SliceReducer, reducer_fn};
    pub use crate::registry::{InjectReport, Injected, Registry};
    pub use crate::selector::{GuardedSelector, Selector, SliceRef, StateView, selector_fn};
    pub use crate::slice::{Slice, SliceKey, SliceName};
    pub use crate::state::CombinedState;
}

pub use action::Action;
pub use reducer::SliceReducer;
pub use registry::Registry;
pub use state::CombinedState;

#[cfg(test)]
mod tests {
    use super::reducer::{SliceReducer, reducer_fn};
    use std::sync::Arc;

    #[test]
    fn test_fn_reducer_initial_state_is_cloned() {
        let reducer = reducer_fn(vec![1_u8], |state: &Vec<u8>, action: &u8| {
            let mut next = state.clone();
            next.push(*action);
            next
        });

        assert_eq!(reducer.initial_state(), vec![1]);
        assert_eq!(reducer.reduce(&vec![1], &2), vec![1, 2]);
        // initial state is not consumed by reducing
        assert_eq!(reducer.initial_state(), vec![1]);
    }

    #[test]
    fn test_default_reduce_shared_allocates_new_state() {
        let reducer = reducer_fn(0_i32, |state: &i32, _: &()| *state);
        let state = Arc::new(5);

        let next = reducer.reduce_shared(&state, &());

        assert_eq!(*next, 5);
        assert!(!Arc::ptr_eq(&state, &next));
    }
}
