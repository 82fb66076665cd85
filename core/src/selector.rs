//! Safe slice access for selectors.
//!
//! Selectors read slices through a [`StateView`] using typed
//! [`SliceKey`]s. A read of a slice that is missing from the state tree is
//! resolved in this order:
//!
//! 1. present with the requested type: the stored value
//! 2. present with another type: [`SliceError::TypeMismatch`]
//! 3. absent, but a reducer is registered for it: that reducer's initial state
//! 4. absent, declared with a fallback, and the registry uses
//!    [`FallbackPolicy::UseDeclaredFallback`]: the fallback value
//! 5. otherwise: [`SliceError::NotInjected`]
//!
//! Step 3 covers state that was produced before an injection and has not
//! been reduced since. A read never yields a value of the wrong type and
//! never panics.

use crate::config::FallbackPolicy;
use crate::declared::{DeclaredShape, DeclaredSlices};
use crate::error::SliceError;
use crate::metrics;
use crate::registry::{Registry, RegistrySnapshot};
use crate::slice::{SliceKey, SliceName};
use crate::state::{CombinedState, SliceValue};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A state reader.
///
/// Implemented for every `Fn(&StateView<'_>, Args) -> Result<O, SliceError>`
/// and for [`MemoizedSelector`](crate::memo::MemoizedSelector). Use a tuple
/// for several arguments and `()` for none.
pub trait Selector<Args> {
    /// Value produced by the selector
    type Output;

    /// Read from the view.
    ///
    /// # Errors
    ///
    /// Returns a [`SliceError`] when a slice the selector needs cannot be read.
    fn select(&self, view: &StateView<'_>, args: Args) -> Result<Self::Output, SliceError>;
}

impl<F, Args, O> Selector<Args> for F
where
    F: Fn(&StateView<'_>, Args) -> Result<O, SliceError>,
{
    type Output = O;

    fn select(&self, view: &StateView<'_>, args: Args) -> Result<O, SliceError> {
        self(view, args)
    }
}

/// Pin a closure's signature to the selector shape so its argument and
/// error types are inferred.
///
/// # Example
///
/// ```
/// use lazy_slices_core::selector::{selector_fn, Selector, StateView};
/// use lazy_slices_core::slice::SliceKey;
/// use lazy_slices_core::state::CombinedState;
///
/// const NAME: SliceKey<String> = SliceKey::from_static("name");
///
/// let greeting = selector_fn(|view, punctuation: char| {
///     Ok(format!("hello {}{punctuation}", *view.slice(&NAME)?))
/// });
///
/// let state = CombinedState::new().with_slice(&NAME, "ada".to_string());
/// let view = StateView::new(&state);
/// assert_eq!(greeting.select(&view, '!').ok().as_deref(), Some("hello ada!"));
/// ```
pub const fn selector_fn<F, Args, O>(selector: F) -> F
where
    F: Fn(&StateView<'_>, Args) -> Result<O, SliceError>,
{
    selector
}

/// Resolution context of a view built by a registry.
struct Resolution<'a> {
    registered: &'a dyn RegisteredSlices,
    declared: &'a DeclaredSlices,
    policy: FallbackPolicy,
    proven: &'a BTreeSet<SliceName>,
}

/// Registered reducers, seen from a view.
trait RegisteredSlices {
    fn initial_value(&self, name: &str) -> Option<SliceValue>;
}

impl<A> RegisteredSlices for RegistrySnapshot<A> {
    fn initial_value(&self, name: &str) -> Option<SliceValue> {
        Self::initial_value(self, name)
    }
}

/// Read access to a state tree for selectors.
pub struct StateView<'a> {
    state: &'a CombinedState,
    resolution: Option<Resolution<'a>>,
}

impl<'a> StateView<'a> {
    /// A view with no fallbacks: absent slices are always
    /// [`SliceError::NotInjected`].
    #[must_use]
    pub const fn new(state: &'a CombinedState) -> Self {
        Self {
            state,
            resolution: None,
        }
    }

    /// The underlying state tree
    #[must_use]
    pub const fn state(&self) -> &'a CombinedState {
        self.state
    }

    /// Read a slice.
    ///
    /// # Errors
    ///
    /// - [`SliceError::TypeMismatch`] when the slice holds another type
    /// - [`SliceError::NotInjected`] when the slice is absent and no fallback applies
    pub fn slice<T>(&self, key: &SliceKey<T>) -> Result<SliceRef<'a, T>, SliceError>
    where
        T: Send + Sync + 'static,
    {
        let name = key.name();
        let state: &'a CombinedState = self.state;

        if let Some(value) = state.get_value(name.as_str()) {
            return value
                .downcast_ref::<T>()
                .map(SliceRef::Borrowed)
                .ok_or_else(|| mismatch(key));
        }

        let Some(resolution) = &self.resolution else {
            return Err(SliceError::NotInjected { slice: name.clone() });
        };

        if let Some(initial) = resolution.registered.initial_value(name.as_str()) {
            tracing::trace!(
                slice = %name,
                proven = resolution.proven.contains(name),
                "Slice absent from state, reading registered initial state"
            );
            return downcast_shared(initial, key);
        }

        if resolution.policy == FallbackPolicy::UseDeclaredFallback {
            let fallback = resolution
                .declared
                .get(name.as_str())
                .and_then(DeclaredShape::fallback);
            if let Some(fallback) = fallback {
                tracing::trace!(slice = %name, "Slice not injected, reading declared fallback");
                return downcast_shared(Arc::clone(fallback), key);
            }
        }

        Err(SliceError::NotInjected { slice: name.clone() })
    }

    /// Read a slice and clone its value.
    ///
    /// # Errors
    ///
    /// Same as [`slice`](Self::slice).
    pub fn slice_cloned<T>(&self, key: &SliceKey<T>) -> Result<T, SliceError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.slice(key).map(|value| T::clone(&value))
    }
}

impl fmt::Debug for StateView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateView")
            .field("state", self.state)
            .field("resolving", &self.resolution.is_some())
            .finish()
    }
}

fn mismatch<T>(key: &SliceKey<T>) -> SliceError {
    SliceError::TypeMismatch {
        slice: key.name().clone(),
        expected: key.type_name(),
    }
}

fn downcast_shared<'a, T>(value: SliceValue, key: &SliceKey<T>) -> Result<SliceRef<'a, T>, SliceError>
where
    T: Send + Sync + 'static,
{
    value
        .downcast::<T>()
        .map(SliceRef::Shared)
        .map_err(|_| mismatch(key))
}

/// A slice value read through a [`StateView`].
///
/// Borrowed from the state tree when the slice is present, shared otherwise.
pub enum SliceRef<'a, T> {
    /// Value stored in the state tree
    Borrowed(&'a T),
    /// Value resolved from a registered initial state or a declared fallback
    Shared(Arc<T>),
}

impl<T> SliceRef<'_, T> {
    /// Whether the value came from the state tree itself
    #[must_use]
    pub const fn is_borrowed(&self) -> bool {
        matches!(self, Self::Borrowed(_))
    }
}

impl<T> Deref for SliceRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Self::Borrowed(value) => value,
            Self::Shared(value) => value.as_ref(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SliceRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// A selector bound to a registry.
///
/// Created by [`Registry::selector`] or
/// [`Injected::selector`](crate::registry::Injected::selector). Calling it
/// is a plain `select(&state, args)`; the wrapper only decides how missing
/// slices resolve and leaves any caching to the wrapped selector.
pub struct GuardedSelector<A, S> {
    registry: Registry<A>,
    proven: Arc<BTreeSet<SliceName>>,
    selector: S,
}

impl<A, S> GuardedSelector<A, S>
where
    A: 'static,
{
    pub(crate) const fn new(
        registry: Registry<A>,
        proven: Arc<BTreeSet<SliceName>>,
        selector: S,
    ) -> Self {
        Self {
            registry,
            proven,
            selector,
        }
    }

    /// Run the selector against `state`.
    ///
    /// # Errors
    ///
    /// Returns the first [`SliceError`] the selector hits.
    pub fn select<Args>(&self, state: &CombinedState, args: Args) -> Result<S::Output, SliceError>
    where
        S: Selector<Args>,
    {
        let snapshot = self.registry.snapshot();
        let view = StateView {
            state,
            resolution: Some(Resolution {
                registered: &*snapshot,
                declared: self.registry.declared(),
                policy: self.registry.config().fallback_policy,
                proven: &self.proven,
            }),
        };

        self.selector.select(&view, args).inspect_err(|err| {
            tracing::debug!(
                slice = %err.slice(),
                kind = err.kind(),
                version = snapshot.version(),
                "Selector could not read slice"
            );
            if self.registry.config().metrics_enabled {
                metrics::record_selector_error(err.kind());
            }
        })
    }

    /// Names this selector may assume are injected
    pub fn proven_slices(&self) -> impl Iterator<Item = &SliceName> {
        self.proven.iter()
    }

    /// The wrapped selector
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.selector
    }
}

impl<A, S> fmt::Debug for GuardedSelector<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedSelector")
            .field("proven", &self.proven)
            .field("selector", &std::any::type_name::<S>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests can unwrap
mod tests {
    use super::*;
    use crate::composition::ReducerMap;
    use crate::config::RegistryConfig;
    use crate::reducer::reducer_fn;

    const FOO: SliceKey<String> = SliceKey::from_static("foo");
    const BAZ: SliceKey<Vec<u32>> = SliceKey::from_static("baz");

    fn registry(config: RegistryConfig) -> Registry<&'static str> {
        Registry::create_with_config(
            ReducerMap::new().with_reducer(
                "foo",
                reducer_fn("foo".to_string(), |s: &String, _: &&'static str| s.clone()),
            ),
            config,
        )
        .unwrap()
    }

    fn baz_len() -> impl Fn(&StateView<'_>, ()) -> Result<usize, SliceError> {
        selector_fn(|view, ()| Ok(view.slice(&BAZ)?.len()))
    }

    #[test]
    fn test_plain_view_has_no_fallbacks() {
        let state = CombinedState::new();
        let view = StateView::new(&state);

        assert_eq!(
            view.slice(&FOO).err(),
            Some(SliceError::NotInjected {
                slice: FOO.name().clone()
            })
        );
    }

    #[test]
    fn test_type_mismatch_reported() {
        let wrong: SliceKey<u8> = SliceKey::new("foo");
        let state = CombinedState::new().with_slice(&FOO, "text".to_string());
        let view = StateView::new(&state);

        assert_eq!(
            view.slice(&wrong).err(),
            Some(SliceError::TypeMismatch {
                slice: SliceName::from("foo"),
                expected: "u8"
            })
        );
    }

    #[test]
    fn test_present_slice_is_borrowed() {
        let registry = registry(RegistryConfig::default());
        let state = registry.reduce(&CombinedState::new(), &"init");
        let view = StateView::new(&state);

        let value = view.slice(&FOO).unwrap();
        assert!(value.is_borrowed());
        assert_eq!(value.as_str(), "foo");
    }

    #[test]
    fn test_declared_uninjected_fails_fast() {
        let registry = registry(RegistryConfig::default())
            .with_declared_slices(DeclaredSlices::new().declare_with_fallback(&BAZ, vec![1]));
        let guarded = registry.selector(baz_len());

        let state = registry.reduce(&CombinedState::new(), &"init");

        assert_eq!(
            guarded.select(&state, ()),
            Err(SliceError::NotInjected {
                slice: SliceName::from("baz")
            })
        );
    }

    #[test]
    fn test_declared_fallback_used_when_enabled() {
        let config = RegistryConfig::builder()
            .fallback_policy(FallbackPolicy::UseDeclaredFallback)
            .build();
        let registry = registry(config)
            .with_declared_slices(DeclaredSlices::new().declare_with_fallback(&BAZ, vec![1, 2, 3]));
        let guarded = registry.selector(baz_len());

        let state = registry.reduce(&CombinedState::new(), &"init");
        assert_eq!(guarded.select(&state, ()), Ok(3));
    }

    #[test]
    fn test_fallback_policy_without_fallback_value_fails() {
        let config = RegistryConfig::builder()
            .fallback_policy(FallbackPolicy::UseDeclaredFallback)
            .build();
        let registry =
            registry(config).with_declared_slices(DeclaredSlices::new().declare(&BAZ));
        let guarded = registry.selector(baz_len());

        assert!(matches!(
            guarded.select(&CombinedState::new(), ()),
            Err(SliceError::NotInjected { .. })
        ));
    }

    #[test]
    fn test_registered_initial_state_before_first_reduce() {
        let registry = registry(RegistryConfig::default());
        let state = registry.reduce(&CombinedState::new(), &"init");

        let injected = registry
            .inject(ReducerMap::new().with_reducer(
                "baz",
                reducer_fn(vec![4_u32, 5], |v: &Vec<u32>, _: &&'static str| v.clone()),
            ))
            .unwrap();
        let guarded = injected.selector(baz_len());

        // state predates the injection
        assert!(!state.contains("baz"));
        assert_eq!(guarded.select(&state, ()), Ok(2));

        let proven: Vec<&str> = guarded.proven_slices().map(SliceName::as_str).collect();
        assert_eq!(proven, ["baz"]);
    }

    #[test]
    fn test_selector_arguments_are_passed_through() {
        let registry = registry(RegistryConfig::default());
        let guarded = registry.selector(selector_fn(|view, (prefix, repeat): (char, usize)| {
            Ok(format!("{prefix}{}", view.slice(&FOO)?.repeat(repeat)))
        }));

        let state = registry.reduce(&CombinedState::new(), &"init");
        assert_eq!(guarded.select(&state, ('>', 2)).unwrap(), ">foofoo");
    }
}
