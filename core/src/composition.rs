//! Reducer composition
//!
//! This module turns a set of named slice reducers into one reducer over
//! [`CombinedState`]:
//! - **[`ReducerMap`]**: the named reducers handed to a single registration call
//! - **[`CombinedReducer`]**: the reducer derived from a registry version
//!
//! # Examples
//!
//! ```
//! use lazy_slices_core::composition::{CombinedReducer, ReducerMap};
//! use lazy_slices_core::reducer::reducer_fn;
//! use lazy_slices_core::slice::SliceKey;
//! use lazy_slices_core::state::CombinedState;
//!
//! let count: SliceKey<i32> = SliceKey::new("count");
//! let log: SliceKey<Vec<i32>> = SliceKey::new("log");
//!
//! let reducers = ReducerMap::new()
//!     .with_reducer("count", reducer_fn(0, |n: &i32, delta: &i32| n + delta))
//!     .with_reducer(
//!         "log",
//!         reducer_fn(Vec::new(), |seen: &Vec<i32>, delta: &i32| {
//!             let mut seen = seen.clone();
//!             seen.push(*delta);
//!             seen
//!         }),
//!     );
//!
//! let combined = CombinedReducer::from_map(reducers)?;
//! let state = combined.reduce(&CombinedState::new(), &5);
//! let state = combined.reduce(&state, &-2);
//!
//! assert_eq!(state.get(&count), Some(&3));
//! assert_eq!(state.get(&log), Some(&vec![5, -2]));
//! # Ok::<(), lazy_slices_core::error::RegistryError>(())
//! ```

use crate::error::RegistryError;
use crate::reducer::SliceReducer;
use crate::slice::{Slice, SliceName};
use crate::state::{CombinedState, SliceValue, StateType};
use indexmap::IndexMap;
use indexmap::map::Entry;
use std::fmt;
use std::sync::Arc;

/// Object-safe view of a [`SliceReducer`] over type-erased slice values.
pub trait ErasedReducer<A>: Send + Sync {
    /// State type produced by the reducer
    fn state_type(&self) -> StateType;

    /// The reducer's initial state
    fn initial_value(&self) -> SliceValue;

    /// Reduce `current` (or the initial state when absent) into the next value.
    ///
    /// A current value of the wrong type is treated as absent.
    fn reduce_value(&self, current: Option<&SliceValue>, action: &A) -> SliceValue;
}

impl<R> ErasedReducer<R::Action> for R
where
    R: SliceReducer,
{
    fn state_type(&self) -> StateType {
        StateType::of::<R::State>()
    }

    fn initial_value(&self) -> SliceValue {
        Arc::new(self.initial_state())
    }

    fn reduce_value(&self, current: Option<&SliceValue>, action: &R::Action) -> SliceValue {
        let typed = current.and_then(|value| Arc::clone(value).downcast::<R::State>().ok());
        match typed {
            Some(state) => self.reduce_shared(&state, action),
            None => Arc::new(self.reduce(&self.initial_state(), action)),
        }
    }
}

/// A registered slice reducer. Identity is pointer identity of the `Arc`.
pub type ReducerEntry<A> = Arc<dyn ErasedReducer<A>>;

/// Named slice reducers supplied to one registration call.
///
/// Entries keep the order they were added in. Names are not checked here;
/// a repeated name is rejected when the map is handed to the registry.
pub struct ReducerMap<A> {
    entries: Vec<(SliceName, ReducerEntry<A>)>,
}

impl<A> ReducerMap<A> {
    /// Create an empty map
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a named slice. The slice's reducer is shared, not copied.
    #[must_use]
    pub fn with_slice<R>(mut self, slice: &Slice<R>) -> Self
    where
        R: SliceReducer<Action = A>,
    {
        let entry: ReducerEntry<A> = Arc::clone(slice.reducer()) as ReducerEntry<A>;
        self.entries.push((slice.name().clone(), entry));
        self
    }

    /// Add a reducer under a name.
    #[must_use]
    pub fn with_reducer<R>(self, name: impl Into<SliceName>, reducer: R) -> Self
    where
        R: SliceReducer<Action = A>,
    {
        self.with_entry(name, Arc::new(reducer))
    }

    /// Add an already shared reducer under a name.
    #[must_use]
    pub fn with_entry(mut self, name: impl Into<SliceName>, entry: ReducerEntry<A>) -> Self {
        self.entries.push((name.into(), entry));
        self
    }

    /// Number of entries, counting repeats
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check for repeated names and index the entries.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateSlice`] for the first repeated name.
    pub(crate) fn into_unique(self) -> Result<IndexMap<SliceName, ReducerEntry<A>>, RegistryError> {
        let mut unique = IndexMap::with_capacity(self.entries.len());
        for (name, entry) in self.entries {
            match unique.entry(name) {
                Entry::Occupied(occupied) => {
                    return Err(RegistryError::DuplicateSlice {
                        slice: occupied.key().clone(),
                    });
                },
                Entry::Vacant(vacant) => {
                    vacant.insert(entry);
                },
            }
        }
        Ok(unique)
    }
}

impl<A> Default for ReducerMap<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R> From<&Slice<R>> for ReducerMap<A>
where
    R: SliceReducer<Action = A>,
{
    fn from(slice: &Slice<R>) -> Self {
        Self::new().with_slice(slice)
    }
}

impl<A> fmt::Debug for ReducerMap<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

/// Result of running a [`CombinedReducer`].
#[derive(Debug, Clone)]
pub struct ReduceOutcome {
    /// The next state tree
    pub state: CombinedState,
    /// False when every slice value is pointer-identical to the input and
    /// the set of slices did not change
    pub changed: bool,
}

/// A reducer derived from a registry at one version.
///
/// Slices are reduced in registration order. Each slice reducer only sees
/// its own slice. The output tree holds exactly the registered slices:
/// slices of the input tree with no registered reducer are dropped, and
/// declared-but-uninjected slices are never synthesized.
pub struct CombinedReducer<A> {
    version: u64,
    reducers: Vec<(SliceName, ReducerEntry<A>)>,
}

impl<A> CombinedReducer<A> {
    pub(crate) fn derive(version: u64, entries: &IndexMap<SliceName, ReducerEntry<A>>) -> Self {
        Self {
            version,
            reducers: entries
                .iter()
                .map(|(name, entry)| (name.clone(), Arc::clone(entry)))
                .collect(),
        }
    }

    /// Build a standalone combined reducer from a reducer map.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateSlice`] when a name repeats.
    pub fn from_map(map: ReducerMap<A>) -> Result<Self, RegistryError> {
        Ok(Self::derive(0, &map.into_unique()?))
    }

    /// Registry version this reducer was derived from
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Slice names in processing order
    pub fn slice_names(&self) -> impl Iterator<Item = &SliceName> {
        self.reducers.iter().map(|(name, _)| name)
    }

    /// Reduce an action across every slice.
    #[must_use]
    pub fn apply(&self, state: &CombinedState, action: &A) -> ReduceOutcome {
        let mut next = CombinedState::with_capacity(self.reducers.len());
        let mut changed = state.len() != self.reducers.len();

        for (name, reducer) in &self.reducers {
            let current = state.get_value(name.as_str());
            let value = reducer.reduce_value(current, action);
            changed |= current.is_none_or(|previous| !Arc::ptr_eq(previous, &value));
            next.insert_value(name.clone(), value);
        }

        ReduceOutcome {
            state: next,
            changed,
        }
    }

    /// Reduce an action across every slice, returning only the next tree.
    #[must_use]
    pub fn reduce(&self, state: &CombinedState, action: &A) -> CombinedState {
        self.apply(state, action).state
    }

    /// The tree holding every slice's initial state
    #[must_use]
    pub fn initial_state(&self) -> CombinedState {
        let mut state = CombinedState::with_capacity(self.reducers.len());
        for (name, reducer) in &self.reducers {
            state.insert_value(name.clone(), reducer.initial_value());
        }
        state
    }
}

impl<A> fmt::Debug for CombinedReducer<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombinedReducer")
            .field("version", &self.version)
            .field("slices", &self.reducers.iter().map(|(name, _)| name).collect::<Vec<_>>())
            .finish()
    }
}

/// A combined reducer is itself a slice reducer, so a registry's output can
/// be nested inside a parent tree.
impl<A> SliceReducer for CombinedReducer<A>
where
    A: 'static,
{
    type State = CombinedState;
    type Action = A;

    fn initial_state(&self) -> CombinedState {
        Self::initial_state(self)
    }

    fn reduce(&self, state: &CombinedState, action: &A) -> CombinedState {
        Self::reduce(self, state, action)
    }

    fn reduce_shared(&self, state: &Arc<CombinedState>, action: &A) -> Arc<CombinedState> {
        let outcome = self.apply(state, action);
        if outcome.changed {
            Arc::new(outcome.state)
        } else {
            Arc::clone(state)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests can unwrap
mod tests {
    use super::*;
    use crate::reducer::reducer_fn;
    use crate::slice::SliceKey;

    #[derive(Clone, Copy)]
    enum TestAction {
        Increment,
        Noop,
    }

    /// Counts increments and hands back the same allocation for anything else
    struct SharingCounter;

    impl SliceReducer for SharingCounter {
        type State = u32;
        type Action = TestAction;

        fn initial_state(&self) -> u32 {
            0
        }

        fn reduce(&self, state: &u32, action: &TestAction) -> u32 {
            match action {
                TestAction::Increment => state + 1,
                TestAction::Noop => *state,
            }
        }

        fn reduce_shared(&self, state: &Arc<u32>, action: &TestAction) -> Arc<u32> {
            match action {
                TestAction::Increment => Arc::new(**state + 1),
                TestAction::Noop => Arc::clone(state),
            }
        }
    }

    fn counter_key() -> SliceKey<u32> {
        SliceKey::new("counter")
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let map = ReducerMap::new()
            .with_reducer("counter", SharingCounter)
            .with_reducer("other", SharingCounter)
            .with_reducer("counter", SharingCounter);

        let err = CombinedReducer::from_map(map).err();
        assert_eq!(
            err,
            Some(RegistryError::DuplicateSlice {
                slice: SliceName::from("counter")
            })
        );
    }

    #[test]
    fn test_absent_slice_starts_from_initial_state() {
        let combined =
            CombinedReducer::from_map(ReducerMap::new().with_reducer("counter", SharingCounter)).unwrap();

        let outcome = combined.apply(&CombinedState::new(), &TestAction::Increment);

        assert!(outcome.changed);
        assert_eq!(outcome.state.get(&counter_key()), Some(&1));
    }

    #[test]
    fn test_unchanged_when_reducers_share_values() {
        let combined =
            CombinedReducer::from_map(ReducerMap::new().with_reducer("counter", SharingCounter)).unwrap();

        let state = combined.reduce(&CombinedState::new(), &TestAction::Increment);
        let outcome = combined.apply(&state, &TestAction::Noop);

        assert!(!outcome.changed);
        assert!(outcome.state.shares_all(&state));
    }

    #[test]
    fn test_unregistered_slices_are_dropped() {
        let combined =
            CombinedReducer::from_map(ReducerMap::new().with_reducer("counter", SharingCounter)).unwrap();
        let stray: SliceKey<String> = SliceKey::new("stray");
        let state = CombinedState::new().with_slice(&stray, "left over".to_string());

        let outcome = combined.apply(&state, &TestAction::Noop);

        assert!(outcome.changed);
        assert!(!outcome.state.contains("stray"));
        assert_eq!(outcome.state.get(&counter_key()), Some(&0));
    }

    #[test]
    fn test_wrong_typed_value_restarts_from_initial_state() {
        let combined =
            CombinedReducer::from_map(ReducerMap::new().with_reducer("counter", SharingCounter)).unwrap();
        let as_text: SliceKey<String> = SliceKey::new("counter");
        let state = CombinedState::new().with_slice(&as_text, "seven".to_string());

        let next = combined.reduce(&state, &TestAction::Increment);

        assert_eq!(next.get(&counter_key()), Some(&1));
    }

    #[test]
    fn test_processing_follows_registration_order() {
        let map = ReducerMap::new()
            .with_reducer("b", reducer_fn(0_u8, |n: &u8, _: &()| *n))
            .with_reducer("a", reducer_fn(0_u8, |n: &u8, _: &()| *n));
        let combined = CombinedReducer::from_map(map).unwrap();

        let names: Vec<&str> = combined.slice_names().map(SliceName::as_str).collect();
        assert_eq!(names, ["b", "a"]);

        let state = combined.reduce(&CombinedState::new(), &());
        let names: Vec<&str> = state.names().map(SliceName::as_str).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn test_nested_combined_reducer_keeps_allocation_when_unchanged() {
        let inner =
            CombinedReducer::from_map(ReducerMap::new().with_reducer("counter", SharingCounter)).unwrap();

        let state = Arc::new(SliceReducer::initial_state(&inner));
        let same = inner.reduce_shared(&state, &TestAction::Noop);
        let bumped = inner.reduce_shared(&state, &TestAction::Increment);

        assert!(Arc::ptr_eq(&state, &same));
        assert_eq!(bumped.get(&counter_key()), Some(&1));
    }
}
