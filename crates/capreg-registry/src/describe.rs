//! `describe` (`spec.md` §4.3.3): full capability + version + method detail
//! for a single version.

use capreg_core::{CapabilityStatus, ErrorCode, RegistryError};
use capreg_events::EventPublisher;
use capreg_repo::Repository;
use serde::Serialize;
use tracing::instrument;

use crate::shared::{MethodDetail, VersionSummary};
use crate::RegistryCore;

/// Input to [`RegistryCore::describe`].
#[derive(Debug, Clone, Default)]
pub struct DescribeRequest {
    /// `"app.name"` capability reference; no alias or range syntax.
    pub cap: String,
    /// Exact version string to target, e.g. `"2.1.0"`.
    pub version: Option<String>,
    /// Major to target when `version` is absent.
    pub major: Option<u32>,
}

/// Output of [`RegistryCore::describe`] (`spec.md` §4.3.3).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeOutput {
    /// Canonical `"app.name"` reference.
    pub cap: String,
    /// Free-form human description of the capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form classification tags on the capability.
    pub tags: Vec<String>,
    /// Capability lifecycle status.
    pub status: CapabilityStatus,
    /// The targeted version's metadata.
    pub version: VersionSummary,
    /// Every method on the targeted version, fully populated.
    pub methods: Vec<MethodDetail>,
}

impl<R: Repository, P: EventPublisher> RegistryCore<R, P> {
    /// Describe one version of a capability in full (`spec.md` §4.3.3).
    ///
    /// Selects the target version by, in order: an exact `versionString`
    /// match, else the first version under `major`, else the first version
    /// in the (already SemVer-descending) list.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::NotFound`] when the capability doesn't exist, has no
    /// versions, or neither `version` nor `major` match anything.
    #[instrument(skip(self, req), fields(cap = %req.cap))]
    pub async fn describe(&self, req: DescribeRequest) -> Result<DescribeOutput, RegistryError> {
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

        let versions = self
            .repo
            .get_versions(&capability.id)
            .await
            .map_err(|e| RegistryError::internal(e.to_string()))?;

        let target = req
            .version
            .as_deref()
            .and_then(|v| versions.iter().find(|c| c.version_string == v))
            .or_else(|| req.major.and_then(|m| versions.iter().find(|c| c.major == m)))
            .or_else(|| versions.first())
            .ok_or_else(|| {
                RegistryError::new(
                    ErrorCode::NotFound,
                    format!("no matching version for {}.{}", parsed.app, parsed.name),
                )
            })?
            .clone();

        let methods = self
            .repo
            .get_methods(&target.id)
            .await
            .map_err(|e| RegistryError::internal(e.to_string()))?;

        Ok(DescribeOutput {
            cap: format!("{}.{}", capability.app, capability.name),
            description: capability.description,
            tags: capability.tags,
            status: capability.status,
            version: VersionSummary::from(&target),
            methods: methods.iter().map(MethodDetail::from).collect(),
        })
    }
}
