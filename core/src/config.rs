//! Core settings loaded via OrthoConfig.
//!
//! Values come from `SAVORLY_*` environment variables, configuration files
//! and command-line flags, in the precedence `ortho_config` applies.

use std::path::PathBuf;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{
    AggregateFailurePolicy, ConcurrencyMode, DEFAULT_MAX_ATTEMPTS, ParseAggregateFailurePolicyError,
    ParseConcurrencyModeError,
};

const DEFAULT_CACHE_DIR: &str = ".savorly-cache";

/// Runtime configuration for counter writes, the reservation saga and the
/// on-disk local cache.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "SAVORLY")]
pub struct CoreSettings {
    /// `unguarded` or `optimistic` counter writes.
    pub metrics_concurrency: Option<String>,
    /// Attempts per counter write in optimistic mode.
    pub metrics_max_attempts: Option<u32>,
    /// `surface` or `best_effort` handling of failed counter steps.
    pub aggregate_failure_policy: Option<String>,
    /// Directory holding the device-local cache.
    pub cache_dir: Option<PathBuf>,
}

impl CoreSettings {
    /// Configured concurrency mode, optimistic with the default retry budget
    /// when unset.
    ///
    /// # Errors
    ///
    /// Returns [`ParseConcurrencyModeError`] for unknown mode names.
    pub fn concurrency_mode(&self) -> Result<ConcurrencyMode, ParseConcurrencyModeError> {
        let mode = self
            .metrics_concurrency
            .as_deref()
            .map_or_else(|| Ok(ConcurrencyMode::default()), str::parse)?;
        Ok(match mode {
            ConcurrencyMode::Optimistic { .. } => ConcurrencyMode::Optimistic {
                max_attempts: self.max_attempts(),
            },
            ConcurrencyMode::Unguarded => ConcurrencyMode::Unguarded,
        })
    }

    /// Attempts per optimistic write, never less than one.
    pub fn max_attempts(&self) -> u32 {
        self.metrics_max_attempts
            .unwrap_or(DEFAULT_MAX_ATTEMPTS)
            .max(1)
    }

    /// Configured saga failure policy, `surface` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`ParseAggregateFailurePolicyError`] for unknown policy names.
    pub fn failure_policy(&self) -> Result<AggregateFailurePolicy, ParseAggregateFailurePolicyError> {
        self.aggregate_failure_policy
            .as_deref()
            .map_or_else(|| Ok(AggregateFailurePolicy::default()), str::parse)
    }

    /// Return the configured cache directory, falling back to the default.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for core configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 4] = [
        "SAVORLY_METRICS_CONCURRENCY",
        "SAVORLY_METRICS_MAX_ATTEMPTS",
        "SAVORLY_AGGREGATE_FAILURE_POLICY",
        "SAVORLY_CACHE_DIR",
    ];

    fn load_from_empty_args() -> CoreSettings {
        CoreSettings::load_from_iter([OsString::from("savorly")]).expect("config should load")
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();
        assert_eq!(
            settings.concurrency_mode().expect("mode"),
            ConcurrencyMode::Optimistic {
                max_attempts: DEFAULT_MAX_ATTEMPTS
            }
        );
        assert_eq!(
            settings.failure_policy().expect("policy"),
            AggregateFailurePolicy::Surface
        );
        assert_eq!(settings.cache_dir(), PathBuf::from(DEFAULT_CACHE_DIR));
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("SAVORLY_METRICS_CONCURRENCY", Some("unguarded".to_owned())),
            ("SAVORLY_METRICS_MAX_ATTEMPTS", None),
            (
                "SAVORLY_AGGREGATE_FAILURE_POLICY",
                Some("best-effort".to_owned()),
            ),
            ("SAVORLY_CACHE_DIR", Some("/tmp/savorly-cache".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(
            settings.concurrency_mode().expect("mode"),
            ConcurrencyMode::Unguarded
        );
        assert_eq!(
            settings.failure_policy().expect("policy"),
            AggregateFailurePolicy::BestEffort
        );
        assert_eq!(settings.cache_dir(), PathBuf::from("/tmp/savorly-cache"));
    }

    #[rstest]
    fn retry_budget_applies_to_optimistic_mode() {
        let _guard = lock_env([
            ("SAVORLY_METRICS_CONCURRENCY", Some("optimistic".to_owned())),
            ("SAVORLY_METRICS_MAX_ATTEMPTS", Some("0".to_owned())),
            ("SAVORLY_AGGREGATE_FAILURE_POLICY", None),
            ("SAVORLY_CACHE_DIR", None),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(
            settings.concurrency_mode().expect("mode"),
            ConcurrencyMode::Optimistic { max_attempts: 1 }
        );
    }

    #[rstest]
    fn unknown_names_are_rejected() {
        let _guard = lock_env([
            ("SAVORLY_METRICS_CONCURRENCY", Some("eventual".to_owned())),
            ("SAVORLY_METRICS_MAX_ATTEMPTS", None),
            ("SAVORLY_AGGREGATE_FAILURE_POLICY", Some("ignore".to_owned())),
            ("SAVORLY_CACHE_DIR", None),
        ]);

        let settings = load_from_empty_args();
        assert!(settings.concurrency_mode().is_err());
        assert!(settings.failure_policy().is_err());
    }
}
