// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! capreg-config
//!
//! The typed settings object every core operation reads from.
//!
//! This crate defines the *shape* of configuration the registry core
//! depends on, matching `spec.md` §6's environment-variable table. The
//! policy of resolving that shape from a bootstrap file, environment
//! variables, or CLI flags — and reconciling conflicts between them — is an
//! external entrypoint's job; [`RegistryConfig::from_env`] is provided only
//! as a thin, ambient convenience for binaries that want the simplest
//! possible wiring (mirroring the separation the teacher draws between
//! `abp-config`'s validated shape and the merging logic living in its CLI).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building or validating a [`RegistryConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable's value could not be parsed into the expected type.
    #[error("invalid value for {var}: {reason}")]
    InvalidValue {
        /// Name of the offending environment variable.
        var: &'static str,
        /// Human-readable parse failure detail.
        reason: String,
    },
}

/// Typed runtime settings consumed by the registry core.
///
/// Field defaults match `spec.md` §6 exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Bus URL used for outbound connections (federation, publishing). `COMMS_URL`.
    pub nats_url: String,
    /// Bus URL advertised to clients (bootstrap snapshots, `resolve` replies).
    /// Falls back to `nats_url` when unset. `NATS_CLIENT_URL`.
    pub client_facing_url: String,
    /// This registry's own service name. `SERVICE_NAME`.
    pub service_name: String,
    /// Subject this registry listens for request envelopes on. `REGISTRY_SUBJECT`.
    pub registry_subject: String,
    /// Subject this registry listens for bootstrap requests on (fixed, not
    /// independently configurable per `spec.md` §6).
    pub bootstrap_subject: String,
    /// Global change-event subject override. `REGISTRY_CHANGE_EVENT_SUBJECT`.
    pub change_event_subject: String,
    /// Per-request deadline ceiling. `REGISTRY_REQUEST_TIMEOUT`.
    pub request_timeout: Duration,
    /// Bound on the health probe's repository read. `HEALTH_CHECK_TIMEOUT`.
    pub health_check_timeout: Duration,
    /// Environment used when a request does not specify one.
    pub default_env: String,
    /// TTL advertised in `resolve` responses, in seconds.
    pub default_ttl_seconds: u64,
    /// Prefix used by the capability subject builder (`spec.md` §6).
    pub subject_prefix: String,
    /// `tracing` filter directive. `LOG_LEVEL`.
    pub log_level: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://127.0.0.1:4222".to_string(),
            client_facing_url: "nats://127.0.0.1:4222".to_string(),
            service_name: "capabilities-registry".to_string(),
            registry_subject: "cap.more0.registry.v1".to_string(),
            bootstrap_subject: "system.registry.bootstrap".to_string(),
            change_event_subject: "registry.changed".to_string(),
            request_timeout: Duration::from_secs(25),
            health_check_timeout: Duration::from_secs(5),
            default_env: "production".to_string(),
            default_ttl_seconds: 300,
            subject_prefix: "cap".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl RegistryConfig {
    /// Build a [`RegistryConfig`] from the environment variables named in
    /// `spec.md` §6, falling back to [`RegistryConfig::default`] for any
    /// variable that is unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `REGISTRY_REQUEST_TIMEOUT` or
    /// `HEALTH_CHECK_TIMEOUT` is set but not a valid duration (`"25s"`,
    /// `"500ms"`, `"2m"`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let comms_url = std::env::var("COMMS_URL").unwrap_or(defaults.nats_url.clone());
        let client_facing_url = std::env::var("NATS_CLIENT_URL").unwrap_or(comms_url.clone());

        Ok(Self {
            client_facing_url,
            nats_url: comms_url,
            service_name: std::env::var("SERVICE_NAME").unwrap_or(defaults.service_name),
            registry_subject: std::env::var("REGISTRY_SUBJECT")
                .unwrap_or(defaults.registry_subject),
            bootstrap_subject: defaults.bootstrap_subject,
            change_event_subject: std::env::var("REGISTRY_CHANGE_EVENT_SUBJECT")
                .unwrap_or(defaults.change_event_subject),
            request_timeout: parse_env_duration(
                "REGISTRY_REQUEST_TIMEOUT",
                defaults.request_timeout,
            )?,
            health_check_timeout: parse_env_duration(
                "HEALTH_CHECK_TIMEOUT",
                defaults.health_check_timeout,
            )?,
            default_env: defaults.default_env,
            default_ttl_seconds: defaults.default_ttl_seconds,
            subject_prefix: defaults.subject_prefix,
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

/// Parse a `"25s"` / `"500ms"` / `"2m"`-shaped duration, falling back to
/// `default` when the environment variable is unset.
fn parse_env_duration(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(var) {
        Err(_) => Ok(default),
        Ok(raw) => parse_duration(&raw).ok_or_else(|| ConfigError::InvalidValue {
            var,
            reason: format!("expected e.g. \"25s\", got {raw:?}"),
        }),
    }
}

/// Parse a simple `<number><unit>` duration string. Supported units: `ms`, `s`, `m`.
fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit) = raw.find(|c: char| !c.is_ascii_digit()).map_or((raw, ""), |idx| {
        (&raw[..idx], &raw[idx..])
    });
    let value: u64 = digits.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" | "" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        _ => None,
    }
}
