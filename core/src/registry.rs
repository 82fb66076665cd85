//! The lazily extensible reducer registry.
//!
//! A [`Registry`] holds the current mapping from slice name to slice reducer
//! and a version counter. Both live in one immutable snapshot that is
//! replaced atomically on every injection, so a reduce call sees either the
//! whole mapping before an injection or the whole mapping after it.
//!
//! # Lifecycle
//!
//! 1. [`Registry::create`] registers the initial slices (version 0).
//! 2. [`Registry::with_declared_slices`] optionally declares slices that
//!    will be injected later.
//! 3. [`Registry::reduce`] is installed into whatever dispatch loop drives
//!    the state.
//! 4. [`Registry::inject`] adds slice reducers at runtime. Every injection
//!    that changes the mapping bumps the version; re-injecting identical
//!    entries does not.
//!
//! # Concurrency
//!
//! * Reads load the current snapshot without locking.
//! * Injections publish a replacement snapshot with compare-and-swap and
//!   retry from the latest snapshot if another injection won the race.
//! * The combined reducer is cached per version and rebuilt lazily on the
//!   first reduce after a version change.

use crate::action::Action;
use crate::composition::{CombinedReducer, ReduceOutcome, ReducerEntry, ReducerMap};
use crate::config::RegistryConfig;
use crate::declared::DeclaredSlices;
use crate::error::{IllegalReinjection, RegistryError};
use crate::metrics;
use crate::reducer::SliceReducer;
use crate::selector::GuardedSelector;
use crate::slice::SliceName;
use crate::state::{CombinedState, SliceValue};
use arc_swap::{ArcSwap, ArcSwapOption};
use indexmap::IndexMap;
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Immutable published registry state.
pub(crate) struct RegistrySnapshot<A> {
    version: u64,
    entries: IndexMap<SliceName, ReducerEntry<A>>,
}

impl<A> RegistrySnapshot<A> {
    pub(crate) const fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn initial_value(&self, name: &str) -> Option<SliceValue> {
        self.entries.get(name).map(|entry| entry.initial_value())
    }

    fn merged(&self, additions: &IndexMap<SliceName, ReducerEntry<A>>) -> Self {
        let mut entries = self.entries.clone();
        for (name, entry) in additions {
            // Overwriting keeps the name's original position.
            entries.insert(name.clone(), Arc::clone(entry));
        }
        Self {
            version: self.version + 1,
            entries,
        }
    }
}

/// What an injection changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InjectReport {
    /// Registry version after the injection
    pub version: u64,
    /// Names registered for the first time
    pub added: SmallVec<[SliceName; 4]>,
    /// Names whose reducer was replaced by a different one
    pub replaced: SmallVec<[SliceName; 4]>,
    /// Names re-injected with the reducer they already had
    pub unchanged: SmallVec<[SliceName; 4]>,
    /// Advisory conflicts with declared shapes
    pub warnings: Vec<IllegalReinjection>,
}

impl InjectReport {
    fn diff<A>(
        current: &RegistrySnapshot<A>,
        additions: &IndexMap<SliceName, ReducerEntry<A>>,
    ) -> Self {
        let mut report = Self {
            version: current.version,
            ..Self::default()
        };
        for (name, entry) in additions {
            match current.entries.get(name.as_str()) {
                None => report.added.push(name.clone()),
                Some(existing) if Arc::ptr_eq(existing, entry) => {
                    report.unchanged.push(name.clone());
                },
                Some(_) => report.replaced.push(name.clone()),
            }
        }
        if report.changed() {
            report.version += 1;
        }
        report
    }

    /// Whether the injection added or replaced anything
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.replaced.is_empty()
    }
}

struct Shared<A> {
    snapshot: ArcSwap<RegistrySnapshot<A>>,
    combined: ArcSwapOption<CombinedReducer<A>>,
    config: RegistryConfig,
}

/// A reducer registry that accepts new slice reducers at runtime.
///
/// Cloning a `Registry` yields another handle to the same mapping.
/// Declarations added with [`with_declared_slices`](Self::with_declared_slices)
/// belong to the returned handle.
///
/// # Example
///
/// ```
/// use lazy_slices_core::prelude::*;
///
/// const FOO: SliceKey<&'static str> = SliceKey::from_static("foo");
/// const BAR: SliceKey<&'static str> = SliceKey::from_static("bar2");
///
/// let registry = Registry::create(
///     ReducerMap::new().with_reducer("foo", reducer_fn("foo", |_: &&'static str, _: &&'static str| "foo")),
/// )?;
///
/// let state = registry.reduce(&CombinedState::new(), &"any");
/// assert_eq!(state.get(&FOO), Some(&"foo"));
/// assert_eq!(state.len(), 1);
///
/// let report = registry
///     .inject(ReducerMap::new().with_reducer("bar2", reducer_fn("bar", |_: &&'static str, _: &&'static str| "bar")))?
///     .report()
///     .clone();
/// assert_eq!(report.version, 1);
///
/// let state = registry.reduce(&state, &"any");
/// assert_eq!(state.get(&BAR), Some(&"bar"));
/// assert_eq!(state.get(&FOO), Some(&"foo"));
/// # Ok::<(), RegistryError>(())
/// ```
pub struct Registry<A> {
    shared: Arc<Shared<A>>,
    declared: Arc<DeclaredSlices>,
}

impl<A> Clone for Registry<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            declared: Arc::clone(&self.declared),
        }
    }
}

impl<A> fmt::Debug for Registry<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.shared.snapshot.load();
        f.debug_struct("Registry")
            .field("version", &snapshot.version)
            .field("slices", &snapshot.entries.keys().collect::<Vec<_>>())
            .field("declared", &self.declared.names().collect::<Vec<_>>())
            .finish()
    }
}

impl<A> Registry<A>
where
    A: 'static,
{
    /// Create a registry from the initial slices with the default config.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateSlice`] when a name appears twice
    /// in `entries`.
    pub fn create(entries: ReducerMap<A>) -> Result<Self, RegistryError> {
        Self::create_with_config(entries, RegistryConfig::default())
    }

    /// Create a registry from the initial slices.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateSlice`] when a name appears twice
    /// in `entries`.
    pub fn create_with_config(
        entries: ReducerMap<A>,
        config: RegistryConfig,
    ) -> Result<Self, RegistryError> {
        let entries = entries.into_unique()?;

        tracing::debug!(
            slices = ?entries.keys().collect::<Vec<_>>(),
            "Created slice registry"
        );
        if config.metrics_enabled {
            metrics::record_registry_shape(0, entries.len());
        }

        let snapshot = RegistrySnapshot {
            version: 0,
            entries,
        };
        Ok(Self {
            shared: Arc::new(Shared {
                snapshot: ArcSwap::from_pointee(snapshot),
                combined: ArcSwapOption::empty(),
                config,
            }),
            declared: Arc::new(DeclaredSlices::new()),
        })
    }

    /// Registry configuration
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.shared.config
    }

    /// Current version. Starts at 0 and grows with every injection that
    /// changes the mapping.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.shared.snapshot.load().version
    }

    /// Registered slice names in registration order
    #[must_use]
    pub fn slice_names(&self) -> Vec<SliceName> {
        self.shared.snapshot.load().entries.keys().cloned().collect()
    }

    /// Whether a reducer is registered under `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.shared.snapshot.load().entries.contains_key(name)
    }

    /// Number of registered slices
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.snapshot.load().entries.len()
    }

    /// Whether no slice is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.snapshot.load().entries.is_empty()
    }

    /// Declarations visible through this handle
    #[must_use]
    pub fn declared(&self) -> &DeclaredSlices {
        &self.declared
    }

    pub(crate) fn snapshot(&self) -> Arc<RegistrySnapshot<A>> {
        self.shared.snapshot.load_full()
    }

    /// Declare slices that will be injected later.
    ///
    /// The returned handle shares this registry's reducers and version, so
    /// reducing through either handle gives the same result. Only selector
    /// resolution and injection checks see the declarations.
    #[must_use]
    pub fn with_declared_slices(&self, declared: DeclaredSlices) -> Self {
        tracing::debug!(
            declared = ?declared.names().collect::<Vec<_>>(),
            "Declared lazily injected slices"
        );
        Self {
            shared: Arc::clone(&self.shared),
            declared: Arc::new(self.declared.merged(&declared)),
        }
    }

    /// Add slice reducers to the registry.
    ///
    /// Names already registered are overwritten (last write wins) and keep
    /// their processing position. Re-injecting a name with the reducer it
    /// already has changes nothing and does not bump the version.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::DuplicateSlice`] when a name appears twice in `entries`
    /// - [`RegistryError::UndeclaredSlice`] when strict declarations are
    ///   enabled and a name was neither registered nor declared
    ///
    /// The registry is unchanged when an error is returned.
    pub fn inject(&self, entries: ReducerMap<A>) -> Result<Injected<A>, RegistryError> {
        let entries = entries.into_unique()?;
        let config = &self.shared.config;

        if config.strict_declarations {
            self.check_declared(&entries)?;
        }

        let mut report = InjectReport::default();
        self.shared.snapshot.rcu(|current| {
            report = InjectReport::diff(current, &entries);
            if report.changed() {
                Arc::new(current.merged(&entries))
            } else {
                Arc::clone(current)
            }
        });
        if config.validate_declared_shapes {
            report.warnings = self.check_declared_shapes(&entries, &report);
        }

        if report.changed() {
            tracing::debug!(
                version = report.version,
                added = ?report.added,
                replaced = ?report.replaced,
                "Injected slice reducers"
            );
            if config.metrics_enabled {
                metrics::record_injection(report.version, self.len());
            }
        } else {
            tracing::trace!(
                version = report.version,
                unchanged = ?report.unchanged,
                "Injection left registry unchanged"
            );
        }

        let mut proven = BTreeSet::new();
        proven.extend(entries.into_keys());
        Ok(Injected {
            registry: self.clone(),
            proven: Arc::new(proven),
            report,
        })
    }

    fn check_declared(
        &self,
        entries: &IndexMap<SliceName, ReducerEntry<A>>,
    ) -> Result<(), RegistryError> {
        let snapshot = self.shared.snapshot.load();
        let undeclared = entries.keys().find(|name| {
            !snapshot.entries.contains_key(name.as_str()) && !self.declared.contains(name.as_str())
        });
        match undeclared {
            Some(name) => Err(RegistryError::UndeclaredSlice { slice: name.clone() }),
            None => Ok(()),
        }
    }

    /// Shape conflicts among the names this injection added or replaced.
    fn check_declared_shapes(
        &self,
        entries: &IndexMap<SliceName, ReducerEntry<A>>,
        report: &InjectReport,
    ) -> Vec<IllegalReinjection> {
        entries
            .iter()
            .filter(|(name, _)| report.added.contains(*name) || report.replaced.contains(*name))
            .filter_map(|(name, entry)| {
                let declared = self.declared.get(name.as_str())?.state_type();
                let injected = entry.state_type();
                (declared != injected).then(|| {
                    let warning = IllegalReinjection::new(name.clone(), declared, injected);
                    tracing::warn!(
                        slice = %warning.slice,
                        declared = warning.declared,
                        injected = warning.injected,
                        "Injected reducer contradicts declared slice shape"
                    );
                    warning
                })
            })
            .collect()
    }

    /// The combined reducer for the current version.
    ///
    /// Cached per version; a version change since the last call rebuilds it.
    #[must_use]
    pub fn combined(&self) -> Arc<CombinedReducer<A>> {
        let snapshot = self.shared.snapshot.load();
        if let Some(cached) = self.shared.combined.load_full() {
            if cached.version() == snapshot.version {
                return cached;
            }
        }

        let fresh = Arc::new(CombinedReducer::derive(snapshot.version, &snapshot.entries));
        self.shared.combined.store(Some(Arc::clone(&fresh)));

        tracing::debug!(version = snapshot.version, "Rebuilt combined reducer");
        if self.shared.config.metrics_enabled {
            metrics::record_rebuild();
        }
        fresh
    }

    /// The tree holding every registered slice's initial state
    #[must_use]
    pub fn initial_state(&self) -> CombinedState {
        self.combined().initial_state()
    }

    /// Wrap a selector so it resolves missing slices by this registry's
    /// policy.
    ///
    /// The selector is not proven to see any lazily injected slice; use
    /// [`Injected::selector`] for that.
    #[must_use]
    pub fn selector<S>(&self, selector: S) -> GuardedSelector<A, S> {
        GuardedSelector::new(self.clone(), Arc::new(BTreeSet::new()), selector)
    }
}

impl<A> Registry<A>
where
    A: Action + 'static,
{
    /// Reduce an action across every registered slice, reporting whether the
    /// tree changed.
    #[must_use]
    pub fn apply(&self, state: &CombinedState, action: &A) -> ReduceOutcome {
        let combined = self.combined();
        tracing::trace!(
            action = action.action_type(),
            version = combined.version(),
            "Reducing action"
        );
        combined.apply(state, action)
    }

    /// Reduce an action across every registered slice.
    ///
    /// For each registered name `k`, the result's `k` equals the slice
    /// reducer applied to `state[k]` (or its initial state when absent).
    /// Declared-but-uninjected slices are absent from the result.
    #[must_use]
    pub fn reduce(&self, state: &CombinedState, action: &A) -> CombinedState {
        self.apply(state, action).state
    }
}

impl<A> SliceReducer for Registry<A>
where
    A: Action + 'static,
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

/// Proof that an injection ran.
///
/// Returned by [`Registry::inject`]. Selectors built from it record the
/// injected names as proven present, and further injections through it
/// accumulate the proof.
///
/// The proof is informational at runtime: a selector built here resolves
/// slices exactly like one built with [`Registry::selector`]. The proven
/// names only show up in [`GuardedSelector::proven_slices`] and in trace
/// output.
pub struct Injected<A> {
    registry: Registry<A>,
    proven: Arc<BTreeSet<SliceName>>,
    report: InjectReport,
}

impl<A> Injected<A>
where
    A: 'static,
{
    /// What the injection changed
    #[must_use]
    pub const fn report(&self) -> &InjectReport {
        &self.report
    }

    /// Names proven injected by this handle
    pub fn proven_slices(&self) -> impl Iterator<Item = &SliceName> {
        self.proven.iter()
    }

    /// The registry handle the injection ran through
    #[must_use]
    pub const fn registry(&self) -> &Registry<A> {
        &self.registry
    }

    /// Give up the proof and keep the registry handle
    #[must_use]
    pub fn into_registry(self) -> Registry<A> {
        self.registry
    }

    /// Inject more slices, keeping the proof for the earlier ones.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::inject`].
    pub fn inject(&self, entries: ReducerMap<A>) -> Result<Self, RegistryError> {
        let next = self.registry.inject(entries)?;
        let mut proven = (*self.proven).clone();
        proven.extend(next.proven.iter().cloned());
        Ok(Self {
            registry: next.registry,
            proven: Arc::new(proven),
            report: next.report,
        })
    }

    /// Wrap a selector that may assume every proven slice is present.
    #[must_use]
    pub fn selector<S>(&self, selector: S) -> GuardedSelector<A, S> {
        GuardedSelector::new(self.registry.clone(), Arc::clone(&self.proven), selector)
    }
}

impl<A> Deref for Injected<A> {
    type Target = Registry<A>;

    fn deref(&self) -> &Registry<A> {
        &self.registry
    }
}

impl<A> fmt::Debug for Injected<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injected")
            .field("proven", &self.proven)
            .field("report", &self.report)
            .finish()
    }
}
