//! Tracing setup for applications embedding `chart-flow`.
//!
//! The engine emits `tracing` events for update cycles, view reconciliation
//! and progressive frames. Nothing is installed unless the host asks for it:
//! either call [`init_tracing`] (with the `telemetry` feature) or wire a
//! subscriber of your own.

use serde::{Deserialize, Serialize};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "chart_flow=info";

/// Subscriber settings for [`init_tracing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TracingConfig {
    /// `EnvFilter` directive applied when `RUST_LOG` is unset.
    pub filter: String,
    pub with_target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_owned(),
            with_target: true,
        }
    }
}

impl TracingConfig {
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }
}

/// Installs a global compact `fmt` subscriber.
///
/// Returns `false` when the `telemetry` feature is disabled or a global
/// subscriber is already set.
#[must_use]
pub fn init_tracing(config: &TracingConfig) -> bool {
    #[cfg(feature = "telemetry")]
    {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.filter));
        return tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.with_target)
            .compact()
            .try_init()
            .is_ok();
    }

    #[cfg(not(feature = "telemetry"))]
    {
        let _ = config;
        false
    }
}

#[must_use]
pub fn init_default_tracing() -> bool {
    init_tracing(&TracingConfig::default())
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_FILTER, TracingConfig};

    #[test]
    fn config_parses_camel_case_with_defaults() {
        let config: TracingConfig =
            serde_json::from_str(r#"{"withTarget":false}"#).expect("parse config");
        assert_eq!(config.filter, DEFAULT_FILTER);
        assert!(!config.with_target);
    }

    #[cfg(not(feature = "telemetry"))]
    #[test]
    fn disabled_feature_installs_nothing() {
        assert!(!super::init_tracing(
            &TracingConfig::default().with_filter("chart_flow=trace")
        ));
    }
}
