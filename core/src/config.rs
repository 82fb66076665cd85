//! Registry configuration.
//!
//! # Example
//!
//! ```rust
//! use lazy_slices_core::config::{FallbackPolicy, RegistryConfig};
//!
//! let config = RegistryConfig::builder()
//!     .fallback_policy(FallbackPolicy::UseDeclaredFallback)
//!     .strict_declarations(true)
//!     .build();
//!
//! assert!(config.strict_declarations);
//! assert!(config.validate_declared_shapes);
//! ```

use serde::{Deserialize, Serialize};

/// What a selector gets when it reads a slice that is declared but has no
/// reducer yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Fail with [`SliceError::NotInjected`](crate::error::SliceError::NotInjected)
    #[default]
    FailFast,

    /// Return the fallback value given at declaration time, failing only when
    /// the declaration has none
    UseDeclaredFallback,
}

/// Registry configuration.
///
/// # Default Values
///
/// - `fallback_policy`: [`FallbackPolicy::FailFast`]
/// - `validate_declared_shapes`: true
/// - `strict_declarations`: false
/// - `metrics_enabled`: true
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Policy for reads of declared-but-uninjected slices
    pub fallback_policy: FallbackPolicy,
    /// Report injections that contradict a declared state type
    pub validate_declared_shapes: bool,
    /// Reject injection of names that were never declared or registered
    pub strict_declarations: bool,
    /// Emit registry metrics
    pub metrics_enabled: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            fallback_policy: FallbackPolicy::FailFast,
            validate_declared_shapes: true,
            strict_declarations: false,
            metrics_enabled: true,
        }
    }
}

impl RegistryConfig {
    /// Create a new config builder.
    #[must_use]
    pub const fn builder() -> RegistryConfigBuilder {
        RegistryConfigBuilder {
            fallback_policy: None,
            validate_declared_shapes: None,
            strict_declarations: None,
            metrics_enabled: None,
        }
    }
}

/// Builder for [`RegistryConfig`].
#[derive(Debug, Clone)]
pub struct RegistryConfigBuilder {
    fallback_policy: Option<FallbackPolicy>,
    validate_declared_shapes: Option<bool>,
    strict_declarations: Option<bool>,
    metrics_enabled: Option<bool>,
}

impl RegistryConfigBuilder {
    /// Set the fallback policy.
    #[must_use]
    pub const fn fallback_policy(mut self, policy: FallbackPolicy) -> Self {
        self.fallback_policy = Some(policy);
        self
    }

    /// Enable or disable declared shape validation.
    #[must_use]
    pub const fn validate_declared_shapes(mut self, enabled: bool) -> Self {
        self.validate_declared_shapes = Some(enabled);
        self
    }

    /// Enable or disable strict declarations.
    #[must_use]
    pub const fn strict_declarations(mut self, enabled: bool) -> Self {
        self.strict_declarations = Some(enabled);
        self
    }

    /// Enable or disable metrics.
    #[must_use]
    pub const fn metrics_enabled(mut self, enabled: bool) -> Self {
        self.metrics_enabled = Some(enabled);
        self
    }

    /// Build the [`RegistryConfig`].
    #[must_use]
    pub fn build(self) -> RegistryConfig {
        let defaults = RegistryConfig::default();
        RegistryConfig {
            fallback_policy: self.fallback_policy.unwrap_or(defaults.fallback_policy),
            validate_declared_shapes: self
                .validate_declared_shapes
                .unwrap_or(defaults.validate_declared_shapes),
            strict_declarations: self
                .strict_declarations
                .unwrap_or(defaults.strict_declarations),
            metrics_enabled: self.metrics_enabled.unwrap_or(defaults.metrics_enabled),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests can unwrap
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_match_default() {
        assert_eq!(RegistryConfig::builder().build(), RegistryConfig::default());
    }

    #[test]
    fn test_builder_overrides() {
        let config = RegistryConfig::builder()
            .fallback_policy(FallbackPolicy::UseDeclaredFallback)
            .validate_declared_shapes(false)
            .metrics_enabled(false)
            .build();

        assert_eq!(config.fallback_policy, FallbackPolicy::UseDeclaredFallback);
        assert!(!config.validate_declared_shapes);
        assert!(!config.strict_declarations);
        assert!(!config.metrics_enabled);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: RegistryConfig =
            serde_json::from_str(r#"{ "fallback_policy": "use_declared_fallback" }"#).unwrap();

        assert_eq!(config.fallback_policy, FallbackPolicy::UseDeclaredFallback);
        assert!(config.validate_declared_shapes);
        assert!(config.metrics_enabled);
    }
}
