//! Slice names, typed keys and named slices.
//!
//! A [`SliceName`] identifies one region of the state tree. A [`SliceKey`]
//! pairs a name with the type of the state stored under it, so reads through
//! a key are type checked. A [`Slice`] bundles a name with the reducer that
//! owns it.

use crate::reducer::SliceReducer;
use serde::{Deserialize, Serialize};
use std::borrow::{Borrow, Cow};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Unique name of a slice within one registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SliceName(Cow<'static, str>);

impl SliceName {
    /// Create a slice name from a static string.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// The name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SliceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SliceName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SliceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for SliceName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SliceName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&'static str> for SliceName {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for SliceName {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl From<&SliceName> for SliceName {
    fn from(name: &SliceName) -> Self {
        name.clone()
    }
}

/// A slice name tagged with the type of the state stored under it.
///
/// Keys carry no runtime data beyond the name; they exist so that selector
/// code can be written against a slice before its reducer is injected.
///
/// # Example
///
/// ```
/// use lazy_slices_core::slice::SliceKey;
///
/// const TODOS: SliceKey<Vec<String>> = SliceKey::from_static("todos");
/// assert_eq!(TODOS.name().as_str(), "todos");
/// ```
pub struct SliceKey<T> {
    name: SliceName,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SliceKey<T> {
    /// Create a key for the named slice.
    #[must_use]
    pub fn new(name: impl Into<SliceName>) -> Self {
        Self {
            name: name.into(),
            _marker: PhantomData,
        }
    }

    /// Create a key from a static name, usable in `const` items.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self {
            name: SliceName::from_static(name),
            _marker: PhantomData,
        }
    }

    /// The slice name
    #[must_use]
    pub const fn name(&self) -> &SliceName {
        &self.name
    }

    /// Rust type name of the state behind this key
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl<T> Clone for SliceKey<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for SliceKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceKey")
            .field("name", &self.name)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

/// A slice reducer bundled with the name it is registered under.
///
/// Cloning a `Slice` shares the reducer, so injecting a clone of an already
/// injected slice is a no-op.
pub struct Slice<R> {
    name: SliceName,
    reducer: Arc<R>,
}

impl<R: SliceReducer> Slice<R> {
    /// Create a named slice.
    #[must_use]
    pub fn new(name: impl Into<SliceName>, reducer: R) -> Self {
        Self::from_shared(name, Arc::new(reducer))
    }

    /// Create a named slice from a reducer that is already shared.
    #[must_use]
    pub fn from_shared(name: impl Into<SliceName>, reducer: Arc<R>) -> Self {
        Self {
            name: name.into(),
            reducer,
        }
    }

    /// The slice name
    #[must_use]
    pub const fn name(&self) -> &SliceName {
        &self.name
    }

    /// A typed key for reading this slice
    #[must_use]
    pub fn key(&self) -> SliceKey<R::State> {
        SliceKey::new(self.name.clone())
    }

    /// The shared reducer
    #[must_use]
    pub const fn reducer(&self) -> &Arc<R> {
        &self.reducer
    }
}

impl<R> Clone for Slice<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            reducer: Arc::clone(&self.reducer),
        }
    }
}

impl<R> fmt::Debug for Slice<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slice")
            .field("name", &self.name)
            .field("reducer", &std::any::type_name::<R>())
            .finish()
    }
}
