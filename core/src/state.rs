//! The combined state tree.
//!
//! [`CombinedState`] maps slice names to type-erased, reference-counted slice
//! values. Reducing never mutates a tree in place; it produces a new tree that
//! shares every slice value that did not change.

use crate::slice::{SliceKey, SliceName};
use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A type-erased slice value
pub type SliceValue = Arc<dyn Any + Send + Sync>;

/// Runtime identity of a slice state type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateType {
    id: TypeId,
    name: &'static str,
}

impl StateType {
    /// The state type of `T`
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Rust type name, for diagnostics only
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether `value` holds this type
    #[must_use]
    pub fn matches(&self, value: &SliceValue) -> bool {
        (**value).type_id() == self.id
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The state tree produced by a combined reducer.
///
/// An empty tree stands for "no state yet"; reducing it yields each
/// registered slice's initial state run through the action.
///
/// # Example
///
/// ```
/// use lazy_slices_core::slice::SliceKey;
/// use lazy_slices_core::state::CombinedState;
///
/// let count: SliceKey<u32> = SliceKey::new("count");
/// let state = CombinedState::new().with_slice(&count, 3);
///
/// assert_eq!(state.get(&count), Some(&3));
/// assert!(state.contains("count"));
/// assert!(!state.contains("other"));
/// ```
#[derive(Clone, Default)]
pub struct CombinedState {
    slices: IndexMap<SliceName, SliceValue>,
}

impl CombinedState {
    /// Create an empty state tree
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slices: IndexMap::with_capacity(capacity),
        }
    }

    /// Builder-style insert, mainly for preloaded state.
    #[must_use]
    pub fn with_slice<T>(mut self, key: &SliceKey<T>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.insert(key, value);
        self
    }

    /// Insert or replace a slice value, returning whether the slice was present.
    pub fn insert<T>(&mut self, key: &SliceKey<T>, value: T) -> bool
    where
        T: Send + Sync + 'static,
    {
        self.insert_value(key.name().clone(), Arc::new(value))
    }

    pub(crate) fn insert_value(&mut self, name: SliceName, value: SliceValue) -> bool {
        self.slices.insert(name, value).is_some()
    }

    /// Read a slice through its typed key.
    ///
    /// Returns `None` when the slice is absent or holds a different type.
    #[must_use]
    pub fn get<T: 'static>(&self, key: &SliceKey<T>) -> Option<&T> {
        self.slices
            .get(key.name().as_str())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Read the type-erased value of a slice
    #[must_use]
    pub fn get_value(&self, name: &str) -> Option<&SliceValue> {
        self.slices.get(name)
    }

    /// Whether the named slice is present
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.slices.contains_key(name)
    }

    /// Slice names in tree order
    pub fn names(&self) -> impl Iterator<Item = &SliceName> {
        self.slices.keys()
    }

    /// Number of slices in the tree
    #[must_use]
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Whether the tree holds no slices
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Whether both trees hold the same names in the same order with
    /// pointer-identical values.
    #[must_use]
    pub fn shares_all(&self, other: &Self) -> bool {
        self.slices.len() == other.slices.len()
            && self
                .slices
                .iter()
                .zip(other.slices.iter())
                .all(|((a_name, a), (b_name, b))| a_name == b_name && Arc::ptr_eq(a, b))
    }
}

impl fmt::Debug for CombinedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.slices.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_with_wrong_type_is_none() {
        let as_string: SliceKey<String> = SliceKey::new("value");
        let as_number: SliceKey<u64> = SliceKey::new("value");

        let state = CombinedState::new().with_slice(&as_string, "text".to_string());

        assert_eq!(state.get(&as_string).map(String::as_str), Some("text"));
        assert_eq!(state.get(&as_number), None);
    }

    #[test]
    fn test_insert_reports_replacement() {
        let key: SliceKey<u8> = SliceKey::new("a");
        let mut state = CombinedState::new();

        assert!(!state.insert(&key, 1));
        assert!(state.insert(&key, 2));
        assert_eq!(state.get(&key), Some(&2));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_shares_all_compares_identity() {
        let key: SliceKey<u8> = SliceKey::new("a");
        let state = CombinedState::new().with_slice(&key, 1);
        let clone = state.clone();
        let rebuilt = CombinedState::new().with_slice(&key, 1);

        assert!(state.shares_all(&clone));
        assert!(!state.shares_all(&rebuilt));
    }

    #[test]
    fn test_state_type_matches_value() {
        let value: SliceValue = Arc::new(7_i32);
        assert!(StateType::of::<i32>().matches(&value));
        assert!(!StateType::of::<i64>().matches(&value));
        assert_eq!(format!("{}", StateType::of::<i32>()), "i32");
    }

    #[test]
    fn test_debug_lists_names() {
        let key: SliceKey<u8> = SliceKey::new("a");
        let state = CombinedState::new().with_slice(&key, 1);
        assert_eq!(format!("{state:?}"), "{SliceName(\"a\")}");
    }
}
