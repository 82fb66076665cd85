//! Memoized selectors.
//!
//! [`create_selector`] splits a selector into an *input* step that extracts
//! a comparable value from the state and arguments, and a *combiner* step
//! that derives the result from it. The combiner only runs when the
//! extracted value differs from the previous call's.
//!
//! The cache belongs to the [`MemoizedSelector`]. Wrapping it in a
//! [`GuardedSelector`](crate::selector::GuardedSelector) does not add,
//! reset or share any cache.
//!
//! # Example
//!
//! ```
//! use lazy_slices_core::memo::create_selector;
//! use lazy_slices_core::selector::{Selector, StateView};
//! use lazy_slices_core::slice::SliceKey;
//! use lazy_slices_core::state::CombinedState;
//!
//! const TODOS: SliceKey<Vec<String>> = SliceKey::from_static("todos");
//!
//! let matching = create_selector(
//!     |view: &StateView<'_>, needle: &String| {
//!         Ok((view.slice_cloned(&TODOS)?, needle.clone()))
//!     },
//!     |(todos, needle): &(Vec<String>, String)| {
//!         todos.iter().filter(|todo| todo.contains(needle.as_str())).count()
//!     },
//! );
//!
//! let state = CombinedState::new()
//!     .with_slice(&TODOS, vec!["buy milk".to_string(), "walk".to_string()]);
//! let view = StateView::new(&state);
//!
//! assert_eq!(matching.select(&view, "milk".to_string()).ok(), Some(1));
//! assert_eq!(matching.select(&view, "milk".to_string()).ok(), Some(1));
//! assert_eq!(matching.recomputations(), 1);
//! ```

use crate::error::SliceError;
use crate::selector::{Selector, StateView};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// A selector that caches its last input and result.
///
/// Created by [`create_selector`].
pub struct MemoizedSelector<I, C, K, O> {
    input: I,
    combiner: C,
    last: Mutex<Option<(K, O)>>,
    recomputations: AtomicUsize,
}

/// Build a memoized selector from an input function and a combiner.
///
/// `input` runs on every call; `combiner` runs only when `input` returns a
/// value unequal to the cached one. Errors from `input` are returned as-is
/// and leave the cache untouched.
pub fn create_selector<Args, I, C, K, O>(input: I, combiner: C) -> MemoizedSelector<I, C, K, O>
where
    I: Fn(&StateView<'_>, &Args) -> Result<K, SliceError>,
    C: Fn(&K) -> O,
    K: PartialEq,
    O: Clone,
{
    MemoizedSelector {
        input,
        combiner,
        last: Mutex::new(None),
        recomputations: AtomicUsize::new(0),
    }
}

impl<I, C, K, O> MemoizedSelector<I, C, K, O> {
    /// How many times the combiner has run
    #[must_use]
    pub fn recomputations(&self) -> usize {
        self.recomputations.load(Ordering::Relaxed)
    }

    /// Forget the cached input and result
    pub fn clear_cache(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl<Args, I, C, K, O> Selector<Args> for MemoizedSelector<I, C, K, O>
where
    I: Fn(&StateView<'_>, &Args) -> Result<K, SliceError>,
    C: Fn(&K) -> O,
    K: PartialEq,
    O: Clone,
{
    type Output = O;

    fn select(&self, view: &StateView<'_>, args: Args) -> Result<O, SliceError> {
        let key = (self.input)(view, &args)?;

        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached_key, cached)) = last.as_ref() {
            if *cached_key == key {
                return Ok(cached.clone());
            }
        }

        let output = (self.combiner)(&key);
        self.recomputations.fetch_add(1, Ordering::Relaxed);
        *last = Some((key, output.clone()));
        Ok(output)
    }
}

impl<I, C, K, O> fmt::Debug for MemoizedSelector<I, C, K, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizedSelector")
            .field("recomputations", &self.recomputations())
            .finish_non_exhaustive()
    }
}
