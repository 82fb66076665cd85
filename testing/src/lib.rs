//! # Lazy Slices Testing
//!
//! Testing utilities and helpers for lazy slice registries.
//!
//! This crate provides:
//! - Reducer fixtures ([`mocks`])
//! - A synchronous dispatch loop over a registry ([`TestStore`])
//! - A fluent Given-When-Then harness ([`RegistryTest`])
//! - Property-based testing strategies ([`properties`])
//! - Tracing setup for tests ([`init_test_tracing`])
//!
//! ## Example
//!
//! ```
//! use lazy_slices_core::prelude::*;
//! use lazy_slices_testing::{mocks::{CounterReducer, TestAction}, TestStore};
//!
//! let registry = Registry::create(ReducerMap::new().with_reducer("count", CounterReducer))?;
//! let mut store = TestStore::new(registry);
//!
//! store.dispatch(TestAction::Increment);
//! store.dispatch(TestAction::Add(4));
//!
//! let count: SliceKey<i64> = SliceKey::new("count");
//! assert_eq!(store.state().get(&count), Some(&5));
//! # Ok::<(), RegistryError>(())
//! ```


/// Synchronous dispatch loop
pub mod store;

pub use reducer_test::RegistryTest;
pub use store::TestStore;

/// Install a fmt subscriber for tests, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Reducer fixtures.
pub mod mocks {
    use lazy_slices_core::action::Action;
    use lazy_slices_core::reducer::SliceReducer;
    use std::marker::PhantomData;
    use std::sync::Arc;

    /// Action type shared by the fixtures
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum TestAction {
        /// Add one to counters
        Increment,
        /// Subtract one from counters
        Decrement,
        /// Add an amount to counters
        Add(i64),
        /// Append text to text slices
        Push(String),
        /// Touches nothing
        Noop,
    }

    impl Action for TestAction {
        fn action_type(&self) -> &str {
            match self {
                Self::Increment => "test/increment",
                Self::Decrement => "test/decrement",
                Self::Add(_) => "test/add",
                Self::Push(_) => "test/push",
                Self::Noop => "test/noop",
            }
        }
    }

    /// Always produces the same value, whatever the action.
    ///
    /// Once its slice exists it hands back the same allocation, so it never
    /// marks the tree as changed.
    pub struct ConstReducer<T, A> {
        value: T,
        _phantom: PhantomData<fn(&A)>,
    }

    impl<T, A> ConstReducer<T, A> {
        /// Create a reducer that always produces `value`
        #[must_use]
        pub const fn new(value: T) -> Self {
            Self {
                value,
                _phantom: PhantomData,
            }
        }
    }

    impl<T, A> SliceReducer for ConstReducer<T, A>
    where
        T: Clone + Send + Sync + 'static,
        A: 'static,
    {
        type State = T;
        type Action = A;

        fn initial_state(&self) -> T {
            self.value.clone()
        }

        fn reduce(&self, _state: &T, _action: &A) -> T {
            self.value.clone()
        }

        fn reduce_shared(&self, state: &Arc<T>, _action: &A) -> Arc<T> {
            Arc::clone(state)
        }
    }

    /// Counter over [`TestAction`], starting at zero.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct CounterReducer;

    impl SliceReducer for CounterReducer {
        type State = i64;
        type Action = TestAction;

        fn initial_state(&self) -> i64 {
            0
        }

        fn reduce(&self, state: &i64, action: &TestAction) -> i64 {
            match action {
                TestAction::Increment => state + 1,
                TestAction::Decrement => state - 1,
                TestAction::Add(amount) => state + amount,
                TestAction::Push(_) | TestAction::Noop => *state,
            }
        }

        fn reduce_shared(&self, state: &Arc<i64>, action: &TestAction) -> Arc<i64> {
            match action {
                TestAction::Push(_) | TestAction::Noop => Arc::clone(state),
                _ => Arc::new(self.reduce(state, action)),
            }
        }
    }

    /// Text slice that appends every [`TestAction::Push`].
    #[derive(Debug, Clone, Default)]
    pub struct TextReducer {
        initial: String,
    }

    impl TextReducer {
        /// Create a text reducer starting from `initial`
        #[must_use]
        pub fn new(initial: impl Into<String>) -> Self {
            Self {
                initial: initial.into(),
            }
        }
    }

    impl SliceReducer for TextReducer {
        type State = String;
        type Action = TestAction;

        fn initial_state(&self) -> String {
            self.initial.clone()
        }

        fn reduce(&self, state: &String, action: &TestAction) -> String {
            match action {
                TestAction::Push(text) => format!("{state}{text}"),
                _ => state.clone(),
            }
        }
    }

    /// Records the tag of every action it sees, in order.
    pub struct RecordingReducer<A> {
        _phantom: PhantomData<fn(&A)>,
    }

    impl<A> RecordingReducer<A> {
        /// Create a recording reducer
        #[must_use]
        pub const fn new() -> Self {
            Self {
                _phantom: PhantomData,
            }
        }
    }

    impl<A> Default for RecordingReducer<A> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<A> SliceReducer for RecordingReducer<A>
    where
        A: Action + 'static,
    {
        type State = Vec<String>;
        type Action = A;

        fn initial_state(&self) -> Vec<String> {
            Vec::new()
        }

        fn reduce(&self, state: &Vec<String>, action: &A) -> Vec<String> {
            let mut seen = state.clone();
            seen.push(action.action_type().to_string());
            seen
        }
    }
}

/// Property-based testing strategies using proptest.
pub mod properties {
    use super::mocks::TestAction;
    use proptest::prelude::*;

    /// Distinct slice names, between `min` and `max` of them.
    pub fn slice_names(min: usize, max: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::btree_set("[a-z]{1,8}", min..=max)
            .prop_map(|names| names.into_iter().collect())
    }

    /// Any [`TestAction`]
    pub fn test_action() -> impl Strategy<Value = TestAction> {
        prop_oneof![
            Just(TestAction::Increment),
            Just(TestAction::Decrement),
            (-100_i64..100).prop_map(TestAction::Add),
            "[a-z]{0,4}".prop_map(TestAction::Push),
            Just(TestAction::Noop),
        ]
    }

    /// A sequence of up to `max` actions
    pub fn test_actions(max: usize) -> impl Strategy<Value = Vec<TestAction>> {
        prop::collection::vec(test_action(), 0..=max)
    }
}
