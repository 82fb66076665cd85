//! Declared slice shapes.
//!
//! A declaration says "a slice with this name and this state type will exist
//! later". It never changes what the combined reducer computes. It is used
//! for three things:
//!
//! - the optional fallback value a selector reads while the slice has no reducer
//!   (see [`FallbackPolicy`](crate::config::FallbackPolicy))
//! - the advisory state type check when the slice is injected
//! - the allow-list for injections when strict declarations are enabled

use crate::slice::{SliceKey, SliceName};
use crate::state::{SliceValue, StateType};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// One declared slice.
#[derive(Clone)]
pub struct DeclaredShape {
    state_type: StateType,
    fallback: Option<SliceValue>,
}

impl DeclaredShape {
    /// Declared state type
    #[must_use]
    pub const fn state_type(&self) -> StateType {
        self.state_type
    }

    /// Fallback value, if one was declared
    #[must_use]
    pub const fn fallback(&self) -> Option<&SliceValue> {
        self.fallback.as_ref()
    }
}

impl fmt::Debug for DeclaredShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclaredShape")
            .field("state_type", &self.state_type.name())
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}

/// A set of declared slices, in declaration order.
///
/// # Example
///
/// ```
/// use lazy_slices_core::declared::DeclaredSlices;
/// use lazy_slices_core::slice::SliceKey;
///
/// const SETTINGS: SliceKey<Vec<String>> = SliceKey::from_static("settings");
/// const THEME: SliceKey<String> = SliceKey::from_static("theme");
///
/// let declared = DeclaredSlices::new()
///     .declare(&SETTINGS)
///     .declare_with_fallback(&THEME, "light".to_string());
///
/// assert!(declared.contains("settings"));
/// assert!(declared.get("theme").is_some_and(|shape| shape.fallback().is_some()));
/// ```
#[derive(Clone, Default)]
pub struct DeclaredSlices {
    shapes: IndexMap<SliceName, DeclaredShape>,
}

impl DeclaredSlices {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a slice without a fallback.
    #[must_use]
    pub fn declare<T>(mut self, key: &SliceKey<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.shapes.insert(
            key.name().clone(),
            DeclaredShape {
                state_type: StateType::of::<T>(),
                fallback: None,
            },
        );
        self
    }

    /// Declare a slice with the value selectors read until it is injected.
    #[must_use]
    pub fn declare_with_fallback<T>(mut self, key: &SliceKey<T>, fallback: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.shapes.insert(
            key.name().clone(),
            DeclaredShape {
                state_type: StateType::of::<T>(),
                fallback: Some(Arc::new(fallback)),
            },
        );
        self
    }

    /// Look up a declaration
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DeclaredShape> {
        self.shapes.get(name)
    }

    /// Whether the name is declared
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.shapes.contains_key(name)
    }

    /// Declared names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &SliceName> {
        self.shapes.keys()
    }

    /// Number of declarations
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Whether nothing is declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Combine two sets. Declarations in `other` win on name collisions.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut shapes = self.shapes.clone();
        for (name, shape) in &other.shapes {
            shapes.insert(name.clone(), shape.clone());
        }
        Self { shapes }
    }
}

impl fmt::Debug for DeclaredSlices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.shapes.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_records_type_and_fallback() {
        let baz: SliceKey<String> = SliceKey::new("baz");
        let qux: SliceKey<u32> = SliceKey::new("qux");

        let declared = DeclaredSlices::new()
            .declare(&baz)
            .declare_with_fallback(&qux, 9);

        let baz_shape = declared.get("baz");
        assert_eq!(
            baz_shape.map(DeclaredShape::state_type),
            Some(StateType::of::<String>())
        );
        assert!(baz_shape.is_some_and(|shape| shape.fallback().is_none()));

        let fallback = declared
            .get("qux")
            .and_then(DeclaredShape::fallback)
            .and_then(|value| value.downcast_ref::<u32>());
        assert_eq!(fallback, Some(&9));
    }

    #[test]
    fn test_merged_prefers_later_declarations() {
        let key_a: SliceKey<String> = SliceKey::new("a");
        let key_a_again: SliceKey<u8> = SliceKey::new("a");
        let key_b: SliceKey<u8> = SliceKey::new("b");

        let first = DeclaredSlices::new().declare(&key_a);
        let second = DeclaredSlices::new().declare(&key_a_again).declare(&key_b);

        let merged = first.merged(&second);

        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged.get("a").map(DeclaredShape::state_type),
            Some(StateType::of::<u8>())
        );
        let names: Vec<&str> = merged.names().map(SliceName::as_str).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
