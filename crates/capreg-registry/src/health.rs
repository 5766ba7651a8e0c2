//! `health` (`spec.md` §4.3.8, component C10): a liveness probe.

use std::collections::BTreeMap;

use capreg_core::RegistryError;
use capreg_events::EventPublisher;
use capreg_repo::{CapabilityFilters, Repository};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use crate::RegistryCore;

/// Output of [`RegistryCore::health`] (`spec.md` §4.3.8).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOutput {
    /// `"healthy"` when every check passes, else `"unhealthy"`.
    pub status: String,
    /// Individual subsystem checks, keyed by name.
    pub checks: BTreeMap<String, bool>,
    /// When this probe ran.
    pub timestamp: DateTime<Utc>,
}

impl<R: Repository, P: EventPublisher> RegistryCore<R, P> {
    /// Probe repository reachability with a bounded `limit=1` read
    /// (`spec.md` §4.3.8). Never errors: a failed check is reflected in the
    /// output, not in `Err`.
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<HealthOutput, RegistryError> {
        let database = self
            .repo
            .list_capabilities(&CapabilityFilters::default(), 1, 1)
            .await
            .is_ok();

        let mut checks = BTreeMap::new();
        checks.insert("database".to_string(), database);

        Ok(HealthOutput {
            status: if checks.values().all(|ok| *ok) { "healthy" } else { "unhealthy" }.to_string(),
            checks,
            timestamp: chrono::Utc::now(),
        })
    }
}
