//! `setDefaultMajor`, `deprecate`, and `disable` (`spec.md` §4.3.5/§4.3.6):
//! the three lifecycle mutations that don't touch version content itself.

use capreg_core::{ErrorCode, RegistryChanged, RegistryError};
use capreg_events::EventPublisher;
use capreg_repo::types::{SetDefaultArgs, StatusTransition, UpdateVersionStatusArgs};
use capreg_repo::Repository;
use serde::Serialize;
use tracing::instrument;

use crate::shared::effective_env;
use crate::RegistryCore;

/// Input to [`RegistryCore::set_default_major`].
#[derive(Debug, Clone, Default)]
pub struct SetDefaultMajorRequest {
    /// `"app.name"` capability reference.
    pub cap: String,
    /// The major to make default.
    pub major: u32,
    /// Environment this default applies to; falls back to the configured
    /// default environment when absent.
    pub env: Option<String>,
}

/// Output of [`RegistryCore::set_default_major`] (`spec.md` §4.3.5).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDefaultMajorOutput {
    /// The major that was default before this call, if one was configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_major: Option<u32>,
    /// The major now default.
    pub new_default_major: u32,
    /// The capability's revision after this write.
    pub revision: u64,
    /// `"{capability_id}-{revision}"`.
    pub etag: String,
}

/// Input to [`RegistryCore::deprecate`]/[`RegistryCore::disable`].
#[derive(Debug, Clone, Default)]
pub struct DeprecateOrDisableRequest {
    /// `"app.name"` capability reference.
    pub cap: String,
    /// Exact version string to target; takes priority over `major`.
    pub version: Option<String>,
    /// Major to target when `version` is absent: every version under it.
    pub major: Option<u32>,
    /// Human-readable reason, stored as `deprecationReason`.
    pub reason: String,
}

/// Output of [`RegistryCore::deprecate`]/[`RegistryCore::disable`]
/// (`spec.md` §4.3.6).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleOutput {
    /// Canonical `"app.name"` reference.
    pub cap: String,
    /// Version strings transitioned by this call.
    pub affected_versions: Vec<String>,
    /// Distinct majors transitioned by this call.
    pub affected_majors: Vec<u32>,
    /// The capability's revision after this write.
    pub revision: u64,
    /// `"{capability_id}-{revision}"`.
    pub etag: String,
}

impl<R: Repository, P: EventPublisher> RegistryCore<R, P> {
    /// Change the default major for a capability in one environment
    /// (`spec.md` §4.3.5).
    ///
    /// # Errors
    ///
    /// [`ErrorCode::NotFound`] when the capability doesn't exist.
    #[instrument(skip(self, req), fields(cap = %req.cap))]
    pub async fn set_default_major(
        &self,
        req: SetDefaultMajorRequest,
    ) -> Result<SetDefaultMajorOutput, RegistryError> {
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

        let env = effective_env(req.env.as_deref(), &self.config.default_env);
        let previous_major = self
            .repo
            .get_default(&capability.id, &env)
            .await
            .map_err(|e| RegistryError::internal(e.to_string()))?
            .map(|d| d.default_major);

        self.repo
            .set_default(SetDefaultArgs {
                capability_id: capability.id.clone(),
                env: env.clone(),
                major: req.major,
                actor: "system".to_string(),
            })
            .await
            .map_err(|e| RegistryError::internal(e.to_string()))?;

        let revision = self
            .repo
            .increment_revision(&capability.id)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(capability_id = %capability.id, error = %e, "revision increment failed");
                capability.revision
            });
        let etag = RegistryChanged::make_etag(&capability.id, revision);

        self.events
            .publish(&RegistryChanged {
                app: capability.app,
                capability: capability.name,
                changed_fields: vec!["defaultMajor".to_string()],
                new_default_major: Some(req.major),
                affected_majors: vec![req.major],
                revision,
                etag: etag.clone(),
                timestamp: chrono::Utc::now(),
                env: Some(env),
            })
            .await;

        Ok(SetDefaultMajorOutput {
            previous_major,
            new_default_major: req.major,
            revision,
            etag,
        })
    }

    /// Mark one or every version under a major as deprecated
    /// (`spec.md` §4.3.6).
    ///
    /// # Errors
    ///
    /// [`ErrorCode::NotFound`] when the capability or target version(s)
    /// don't exist.
    #[instrument(skip(self, req), fields(cap = %req.cap))]
    pub async fn deprecate(&self, req: DeprecateOrDisableRequest) -> Result<LifecycleOutput, RegistryError> {
        self.transition(req, StatusTransition::Deprecate, "status".to_string())
            .await
    }

    /// Mark one or every version under a major as disabled
    /// (`spec.md` §4.3.6): disabled versions are excluded from resolution.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::NotFound`] when the capability or target version(s)
    /// don't exist.
    #[instrument(skip(self, req), fields(cap = %req.cap))]
    pub async fn disable(&self, req: DeprecateOrDisableRequest) -> Result<LifecycleOutput, RegistryError> {
        self.transition(req, StatusTransition::Disable, "status".to_string())
            .await
    }

    async fn transition(
        &self,
        req: DeprecateOrDisableRequest,
        transition: StatusTransition,
        changed_field: String,
    ) -> Result<LifecycleOutput, RegistryError> {
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

        let targets: Vec<_> = versions
            .into_iter()
            .filter(|v| match (&req.version, req.major) {
                (Some(vs), _) => &v.version_string == vs,
                (None, Some(major)) => v.major == major,
                (None, None) => true,
            })
            .collect();

        if targets.is_empty() {
            return Err(RegistryError::new(
                ErrorCode::NotFound,
                format!("no matching version for {}.{}", parsed.app, parsed.name),
            ));
        }

        let mut affected_versions = Vec::with_capacity(targets.len());
        let mut affected_majors = Vec::new();
        for target in &targets {
            self.repo
                .update_version_status(UpdateVersionStatusArgs {
                    version_id: target.id.clone(),
                    transition,
                    reason: req.reason.clone(),
                    actor: "system".to_string(),
                })
                .await
                .map_err(|e| RegistryError::internal(e.to_string()))?;
            affected_versions.push(target.version_string.clone());
            if !affected_majors.contains(&target.major) {
                affected_majors.push(target.major);
            }
        }

        let revision = self
            .repo
            .increment_revision(&capability.id)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(capability_id = %capability.id, error = %e, "revision increment failed");
                capability.revision
            });
        let etag = RegistryChanged::make_etag(&capability.id, revision);

        self.events
            .publish(&RegistryChanged {
                app: capability.app.clone(),
                capability: capability.name.clone(),
                changed_fields: vec![changed_field],
                new_default_major: None,
                affected_majors: affected_majors.clone(),
                revision,
                etag: etag.clone(),
                timestamp: chrono::Utc::now(),
                env: None,
            })
            .await;

        Ok(LifecycleOutput {
            cap: format!("{}.{}", capability.app, capability.name),
            affected_versions,
            affected_majors,
            revision,
            etag,
        })
    }
}
