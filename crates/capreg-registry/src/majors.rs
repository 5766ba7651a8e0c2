//! `listMajors` (`spec.md` §4.3.7): a per-major rollup of a capability's
//! version history.

use capreg_core::{ErrorCode, RegistryError, VersionStatus};
use capreg_events::EventPublisher;
use capreg_repo::Repository;
use serde::Serialize;
use tracing::instrument;

use crate::RegistryCore;

/// Input to [`RegistryCore::list_majors`].
#[derive(Debug, Clone, Default)]
pub struct ListMajorsRequest {
    /// `"app.name"` capability reference.
    pub cap: String,
    /// Include [`VersionStatus::Disabled`] versions in the rollup.
    pub include_inactive: bool,
}

/// One row of a [`ListMajorsOutput`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MajorSummary {
    /// The major version number.
    pub major: u32,
    /// The highest-precedence version string under this major.
    pub latest_version: String,
    /// The latest version's lifecycle status.
    pub status: VersionStatus,
    /// Count of versions under this major.
    pub version_count: usize,
    /// Whether this major is the configured default for any environment.
    pub is_default: bool,
}

/// Output of [`RegistryCore::list_majors`] (`spec.md` §4.3.7).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMajorsOutput {
    /// Canonical `"app.name"` reference.
    pub cap: String,
    /// Per-major rollups, descending by major.
    pub majors: Vec<MajorSummary>,
}

impl<R: Repository, P: EventPublisher> RegistryCore<R, P> {
    /// Roll up a capability's version history by major (`spec.md` §4.3.7).
    ///
    /// Unless `includeInactive` is set, [`VersionStatus::Disabled`] versions
    /// are dropped before grouping, so a major with at least one
    /// non-disabled version still appears, rolled up from its remaining
    /// versions only; a major only disappears once every one of its
    /// versions is disabled.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::NotFound`] when the capability doesn't exist.
    #[instrument(skip(self, req), fields(cap = %req.cap))]
    pub async fn list_majors(&self, req: ListMajorsRequest) -> Result<ListMajorsOutput, RegistryError> {
        let parsed = capreg_capref::parse(&req.cap)
            .map_err(|e| RegistryError::new(ErrorCode::InvalidArgument, e.to_string()))?;
        let capability = self
            .repo
            .get_capability(&parsed.app, &parsed.name)
            .await
            .map_err(|e| RegistryError::internal(e.to_string()))?
            .ok_or_else(|| {
                RegistryError::new(
                    ErrorCode::NotFound,
                    format!("no such capability {}.{}", parsed.app, parsed.name),
                )
            })?;

        let mut versions = self
            .repo
            .get_versions(&capability.id)
            .await
            .map_err(|e| RegistryError::internal(e.to_string()))?;
        if !req.include_inactive {
            versions.retain(|v| v.status != VersionStatus::Disabled);
        }

        let default_majors = self
            .repo
            .get_default_majors_for_capability(&capability.id)
            .await
            .map_err(|e| RegistryError::internal(e.to_string()))?;

        let majors = capreg_semver::unique_majors(&versions);
        let mut summaries = Vec::with_capacity(majors.len());
        for major in majors {
            let under_major: Vec<_> = versions.iter().filter(|v| v.major == major).collect();
            let Some(latest) = under_major.first() else {
                continue;
            };
            summaries.push(MajorSummary {
                major,
                latest_version: latest.version_string.clone(),
                status: latest.status,
                version_count: under_major.len(),
                is_default: default_majors.contains(&major),
            });
        }

        Ok(ListMajorsOutput {
            cap: format!("{}.{}", capability.app, capability.name),
            majors: summaries,
        })
    }
}
