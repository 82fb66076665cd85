//! Metrics emitted by the registry.
//!
//! The registry only talks to the [`metrics`] facade. Installing a recorder
//! or exporter is left to the host application; without one every call here
//! is a no-op.
//!
//! Emission is controlled by
//! [`RegistryConfig::metrics_enabled`](crate::config::RegistryConfig::metrics_enabled).

use metrics::{Unit, counter, describe_counter, describe_gauge, gauge};

/// Counter: injections that changed the registry
pub const INJECTIONS_TOTAL: &str = "lazy_slices_injections_total";

/// Counter: combined reducer rebuilds after a version change
pub const COMBINED_REBUILDS_TOTAL: &str = "lazy_slices_combined_rebuilds_total";

/// Gauge: current registry version
pub const REGISTRY_VERSION: &str = "lazy_slices_registry_version";

/// Gauge: number of registered slices
pub const REGISTERED_SLICES: &str = "lazy_slices_registered_slices";

/// Counter: selector reads that failed, labelled by `kind`
pub const SELECTOR_ERRORS_TOTAL: &str = "lazy_slices_selector_errors_total";

/// Register descriptions for every registry metric.
///
/// Call once after installing a recorder.
pub fn describe_metrics() {
    describe_counter!(
        INJECTIONS_TOTAL,
        Unit::Count,
        "Injections that added or replaced at least one slice reducer"
    );
    describe_counter!(
        COMBINED_REBUILDS_TOTAL,
        Unit::Count,
        "Combined reducer rebuilds caused by a registry version change"
    );
    describe_gauge!(REGISTRY_VERSION, "Current registry version");
    describe_gauge!(REGISTERED_SLICES, Unit::Count, "Registered slice reducers");
    describe_counter!(
        SELECTOR_ERRORS_TOTAL,
        Unit::Count,
        "Selector slice reads that failed"
    );
}

#[allow(clippy::cast_precision_loss)] // gauges are f64
pub(crate) fn record_registry_shape(version: u64, slices: usize) {
    gauge!(REGISTRY_VERSION).set(version as f64);
    gauge!(REGISTERED_SLICES).set(slices as f64);
}

pub(crate) fn record_injection(version: u64, slices: usize) {
    counter!(INJECTIONS_TOTAL).increment(1);
    record_registry_shape(version, slices);
}

pub(crate) fn record_rebuild() {
    counter!(COMBINED_REBUILDS_TOTAL).increment(1);
}

pub(crate) fn record_selector_error(kind: &'static str) {
    counter!(SELECTOR_ERRORS_TOTAL, "kind" => kind).increment(1);
}
