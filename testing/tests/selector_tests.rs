//! Integration tests for guarded and memoized selectors

#![allow(clippy::unwrap_used)] // Tests can unwrap

use lazy_slices_core::prelude::*;
use lazy_slices_testing::mocks::{ConstReducer, CounterReducer, TestAction, TextReducer};
use lazy_slices_testing::{TestStore, init_test_tracing};

const FOO: SliceKey<&'static str> = SliceKey::from_static("foo");
const BAZ: SliceKey<i64> = SliceKey::from_static("baz");
const NOTES: SliceKey<String> = SliceKey::from_static("notes");

fn declared_registry(config: RegistryConfig) -> Registry<TestAction> {
    Registry::create_with_config(
        ReducerMap::new().with_reducer("foo", ConstReducer::new("foo")),
        config,
    )
    .unwrap()
    .with_declared_slices(
        DeclaredSlices::new()
            .declare(&BAZ)
            .declare_with_fallback(&NOTES, "none yet".to_string()),
    )
}

fn read_baz() -> impl Fn(&StateView<'_>, ()) -> Result<i64, SliceError> {
    selector_fn(|view, (): ()| view.slice_cloned(&BAZ))
}

#[test]
fn test_declared_but_uninjected_read_fails_fast() {
    init_test_tracing();
    let registry = declared_registry(RegistryConfig::default());
    let state = registry.reduce(&CombinedState::new(), &TestAction::Increment);

    let result = registry.selector(read_baz()).select(&state, ());

    assert_eq!(
        result,
        Err(SliceError::NotInjected {
            slice: SliceName::from_static("baz"),
        })
    );
}

#[test]
fn test_proven_selector_reads_injected_slice() {
    init_test_tracing();
    let registry = declared_registry(RegistryConfig::default());
    let mut store = TestStore::new(registry.clone());
    store.dispatch(TestAction::Increment);

    let injected = store
        .inject(ReducerMap::new().with_reducer("baz", CounterReducer))
        .unwrap();
    let baz = injected.selector(read_baz());
    assert_eq!(
        baz.proven_slices().map(SliceName::as_str).collect::<Vec<_>>(),
        ["baz"]
    );

    // before the next dispatch the slice resolves to its initial state
    assert_eq!(store.select(&baz, ()).unwrap(), 0);

    store.dispatch(TestAction::Increment);
    store.dispatch(TestAction::Add(10));
    assert_eq!(store.select(&baz, ()).unwrap(), 11);
}

#[test]
fn test_unproven_selector_resolves_registered_slices() {
    let registry = declared_registry(RegistryConfig::default());
    registry
        .inject(ReducerMap::new().with_reducer("baz", CounterReducer))
        .unwrap();

    // built from the registry, not the injection, and run on a stale tree
    let result = registry.selector(read_baz()).select(&CombinedState::new(), ());

    assert_eq!(result, Ok(0));
}

#[test]
fn test_declared_fallback_only_under_fallback_policy() {
    let read_notes = selector_fn(|view, (): ()| view.slice_cloned(&NOTES));

    let fail_fast = declared_registry(RegistryConfig::default());
    assert_eq!(
        fail_fast.selector(read_notes).select(&CombinedState::new(), ()),
        Err(SliceError::NotInjected {
            slice: SliceName::from_static("notes"),
        })
    );

    let lenient = declared_registry(
        RegistryConfig::builder()
            .fallback_policy(FallbackPolicy::UseDeclaredFallback)
            .build(),
    );
    assert_eq!(
        lenient.selector(read_notes).select(&CombinedState::new(), ()),
        Ok("none yet".to_string())
    );
    // a declaration without fallback still fails
    assert!(lenient.selector(read_baz()).select(&CombinedState::new(), ()).is_err());

    // once injected, the reducer's state wins over the fallback
    lenient
        .inject(ReducerMap::new().with_reducer("notes", TextReducer::new("")))
        .unwrap();
    let state = lenient.reduce(&CombinedState::new(), &TestAction::Push("real".into()));
    assert_eq!(lenient.selector(read_notes).select(&state, ()), Ok("real".to_string()));
}

#[test]
fn test_wrong_type_is_reported_not_returned() {
    let registry = declared_registry(RegistryConfig::default());
    let state = registry.reduce(&CombinedState::new(), &TestAction::Noop);
    let foo_as_number: SliceKey<u8> = SliceKey::new("foo");

    let result = registry
        .selector(selector_fn(|view, (): ()| view.slice_cloned(&foo_as_number)))
        .select(&state, ());

    assert!(matches!(result, Err(SliceError::TypeMismatch { ref slice, .. }) if slice == "foo"));
}

#[test]
fn test_selector_arguments_pass_through() {
    let registry = declared_registry(RegistryConfig::default());
    let state = registry.reduce(&CombinedState::new(), &TestAction::Noop);

    let repeated = registry.selector(selector_fn(|view, times: usize| {
        Ok(view.slice(&FOO)?.repeat(times))
    }));

    assert_eq!(repeated.select(&state, 3), Ok("foofoofoo".to_string()));
}

#[test]
fn test_memoized_selector_keeps_its_cache_when_guarded() {
    let registry = declared_registry(RegistryConfig::default());
    let injected = registry
        .inject(ReducerMap::new().with_reducer("baz", CounterReducer))
        .unwrap();

    let doubled = injected.selector(create_selector(
        |view: &StateView<'_>, (): &()| view.slice_cloned(&BAZ),
        |baz: &i64| baz * 2,
    ));

    let mut store = TestStore::new(registry);
    store.dispatch(TestAction::Add(2));

    assert_eq!(store.select(&doubled, ()), Ok(4));
    assert_eq!(store.select(&doubled, ()), Ok(4));
    assert_eq!(doubled.inner().recomputations(), 1);

    // other slices changing leaves the extracted input equal
    store.dispatch(TestAction::Push("ignored".into()));
    assert_eq!(store.select(&doubled, ()), Ok(4));
    assert_eq!(doubled.inner().recomputations(), 1);

    store.dispatch(TestAction::Increment);
    assert_eq!(store.select(&doubled, ()), Ok(6));
    assert_eq!(doubled.inner().recomputations(), 2);
}

#[test]
fn test_selector_error_is_recoverable_after_injection() {
    let registry = declared_registry(RegistryConfig::default());
    let baz = registry.selector(read_baz());
    let mut store = TestStore::new(registry.clone());
    store.dispatch(TestAction::Increment);

    assert!(store.select(&baz, ()).is_err());

    registry
        .inject(ReducerMap::new().with_reducer("baz", CounterReducer))
        .unwrap();
    store.dispatch(TestAction::Increment);

    assert_eq!(store.select(&baz, ()), Ok(1));
}
