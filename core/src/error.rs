//! Error types for registration and slice access.
//!
//! Registration errors are returned synchronously by the call that caused
//! them and leave the registry untouched. Slice access errors are returned
//! when a selector runs, never when it is built.

use crate::slice::SliceName;
use crate::state::StateType;
use serde::Serialize;
use thiserror::Error;

/// Errors returned by registry construction and injection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The same slice name appeared twice in one registration call
    #[error("slice `{slice}` was supplied more than once in the same registration call")]
    DuplicateSlice {
        /// The repeated name
        slice: SliceName,
    },

    /// Strict declarations are enabled and the slice was never declared
    #[error("slice `{slice}` is neither registered nor declared")]
    UndeclaredSlice {
        /// The undeclared name
        slice: SliceName,
    },
}

/// Errors returned when a selector reads a slice.
///
/// Both variants are recoverable: inject the slice (or fix the reducer that
/// produced the wrong type) and run the selector again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SliceError {
    /// The slice is absent from the state and no fallback applies
    #[error("slice `{slice}` has not been injected")]
    NotInjected {
        /// The missing slice
        slice: SliceName,
    },

    /// The slice is present but holds a different state type
    #[error("slice `{slice}` does not hold a `{expected}`")]
    TypeMismatch {
        /// The slice that was read
        slice: SliceName,
        /// The type the selector asked for
        expected: &'static str,
    },
}

impl SliceError {
    /// The slice this error is about
    #[must_use]
    pub const fn slice(&self) -> &SliceName {
        match self {
            Self::NotInjected { slice } | Self::TypeMismatch { slice, .. } => slice,
        }
    }

    /// Short label used for metrics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotInjected { .. } => "not_injected",
            Self::TypeMismatch { .. } => "type_mismatch",
        }
    }
}

/// Advisory report: a declared slice was injected with a reducer whose state
/// type differs from the declaration.
///
/// Never returned as an `Err`. The injection still takes effect.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("slice `{slice}` was declared as `{declared}` but injected with a reducer producing `{injected}`")]
pub struct IllegalReinjection {
    /// The conflicting slice
    pub slice: SliceName,
    /// Declared state type name
    pub declared: &'static str,
    /// State type name of the injected reducer
    pub injected: &'static str,
}

impl IllegalReinjection {
    pub(crate) fn new(slice: SliceName, declared: StateType, injected: StateType) -> Self {
        Self {
            slice,
            declared: declared.name(),
            injected: injected.name(),
        }
    }
}
