//! `upsert` (`spec.md` §4.3.4): create-or-update a capability version and its
//! methods in one call, with full input validation.

use capreg_core::{RegistryChanged, RegistryError};
use capreg_events::EventPublisher;
use capreg_repo::types::{
    SetDefaultArgs, UpsertCapabilityArgs, UpsertMethodArgs, UpsertVersionArgs,
};
use capreg_repo::Repository;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use crate::shared::VersionSummary;
use crate::RegistryCore;

const MAX_METADATA_BYTES: usize = 64 * 1024;
const MAX_SCHEMA_BYTES: usize = 256 * 1024;
const MAX_EXAMPLES_BYTES: usize = 64 * 1024;
const MAX_METHODS: usize = 200;

/// One method to attach to the upserted version.
#[derive(Debug, Clone, Default)]
pub struct MethodInput {
    /// Method name; validated the same way a capability `name` is.
    pub name: String,
    /// Free-form human description.
    pub description: Option<String>,
    /// Input JSON Schema.
    pub input_schema: Value,
    /// Output JSON Schema.
    pub output_schema: Value,
    /// Invocation modes this method supports.
    pub modes: Vec<capreg_core::MethodMode>,
    /// Free-form classification tags.
    pub tags: Vec<String>,
    /// Arbitrary policy metadata.
    pub policies: Value,
    /// Example invocations.
    pub examples: Vec<Value>,
}

/// The version fields an [`UpsertRequest`] carries.
#[derive(Debug, Clone, Default)]
pub struct VersionInput {
    /// Major component, `[0, 9999]`.
    pub major: u32,
    /// Minor component, `[0, 9999]`.
    pub minor: u32,
    /// Patch component, `[0, 9999]`.
    pub patch: u32,
    /// Prerelease label; an empty string is normalized to `None`.
    pub prerelease: Option<String>,
    /// Free-form human description.
    pub description: Option<String>,
    /// Free-form release notes.
    pub changelog: Option<String>,
    /// Arbitrary metadata, capped at 64 KiB serialized.
    pub metadata: Value,
}

/// Input to [`RegistryCore::upsert`].
#[derive(Debug, Clone, Default)]
pub struct UpsertRequest {
    /// Application/namespace component.
    pub app: String,
    /// Name component.
    pub name: String,
    /// Free-form human description of the capability itself.
    pub description: Option<String>,
    /// Free-form classification tags on the capability.
    pub tags: Vec<String>,
    /// Version fields.
    pub version: VersionInput,
    /// Methods to attach; `1..=200` entries.
    pub methods: Vec<MethodInput>,
    /// When set, also call `setDefaultMajor` for this environment
    /// (`spec.md` §4.3.4 step 7).
    pub set_default_env: Option<String>,
    /// Identity recorded in audit fields.
    pub actor: String,
}

/// Output of [`RegistryCore::upsert`] (`spec.md` §4.3.4).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertOutput {
    /// `"created"` if the capability did not already exist, else `"updated"`.
    pub action: String,
    /// Canonical `"app.name"` reference.
    pub cap: String,
    /// The upserted version's metadata.
    pub version: VersionSummary,
    /// Method names attached to the upserted version.
    pub methods: Vec<String>,
    /// The capability's revision counter after this write.
    pub revision: u64,
    /// `"{capability_id}-{revision}"`.
    pub etag: String,
}

fn validate(req: &UpsertRequest) -> Result<(), RegistryError> {
    if !capreg_capref::validate_app(&req.app) {
        return Err(RegistryError::invalid_argument(format!("invalid app {:?}", req.app)));
    }
    if !capreg_capref::validate_name(&req.name) {
        return Err(RegistryError::invalid_argument(format!("invalid name {:?}", req.name)));
    }
    for field in [req.version.major, req.version.minor, req.version.patch] {
        if field > 9999 {
            return Err(RegistryError::invalid_argument(
                "version components must be in [0, 9999]",
            ));
        }
    }
    if req.methods.is_empty() {
        return Err(RegistryError::invalid_argument("at least one method is required"));
    }
    if req.methods.len() > MAX_METHODS {
        return Err(RegistryError::invalid_argument(format!(
            "at most {MAX_METHODS} methods are allowed, got {}",
            req.methods.len()
        )));
    }
    if json_len(&req.version.metadata) > MAX_METADATA_BYTES {
        return Err(RegistryError::invalid_argument("version metadata exceeds 64KiB"));
    }
    for m in &req.methods {
        if !capreg_capref::validate_name(&m.name) {
            return Err(RegistryError::invalid_argument(format!("invalid method name {:?}", m.name)));
        }
        if json_len(&m.input_schema) > MAX_SCHEMA_BYTES || json_len(&m.output_schema) > MAX_SCHEMA_BYTES {
            return Err(RegistryError::invalid_argument(format!(
                "schema for method {:?} exceeds 256KiB",
                m.name
            )));
        }
        let examples_len: usize = m.examples.iter().map(json_len).sum();
        if examples_len > MAX_EXAMPLES_BYTES {
            return Err(RegistryError::invalid_argument(format!(
                "examples for method {:?} exceed 64KiB",
                m.name
            )));
        }
    }
    Ok(())
}

fn json_len(v: &Value) -> usize {
    serde_json::to_vec(v).map(|b| b.len()).unwrap_or(0)
}

impl<R: Repository, P: EventPublisher> RegistryCore<R, P> {
    /// Create or update a capability version and its methods
    /// (`spec.md` §4.3.4).
    ///
    /// Whether the result is a create or an update is decided by checking
    /// capability existence *before* any write, so a concurrent creator
    /// racing this call does not flip the reported action.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on any validation failure (invalid
    /// `app`/`name`/method name, out-of-range version components, an empty
    /// or oversized method list, an oversized metadata/schema/examples
    /// payload). `InternalError` on a repository failure.
    #[instrument(skip(self, req), fields(app = %req.app, name = %req.name))]
    pub async fn upsert(&self, req: UpsertRequest) -> Result<UpsertOutput, RegistryError> {
        validate(&req)?;

        let existed = self
            .repo
            .get_capability(&req.app, &req.name)
            .await
            .map_err(|e| RegistryError::internal(e.to_string()))?
            .is_some();

        let capability = self
            .repo
            .upsert_capability(UpsertCapabilityArgs {
                app: req.app.clone(),
                name: req.name.clone(),
                description: req.description.clone(),
                tags: if req.tags.is_empty() { None } else { Some(req.tags.clone()) },
                actor: req.actor.clone(),
            })
            .await
            .map_err(|e| RegistryError::internal(e.to_string()))?;

        let version = self
            .repo
            .upsert_version(UpsertVersionArgs {
                capability_id: capability.id.clone(),
                major: req.version.major,
                minor: req.version.minor,
                patch: req.version.patch,
                prerelease: req.version.prerelease.clone(),
                description: req.version.description.clone(),
                changelog: req.version.changelog.clone(),
                metadata: if req.version.metadata.is_null() {
                    None
                } else {
                    Some(req.version.metadata.clone())
                },
                actor: req.actor.clone(),
            })
            .await
            .map_err(|e| RegistryError::internal(e.to_string()))?;

        self.repo
            .delete_methods(&version.id)
            .await
            .map_err(|e| RegistryError::internal(e.to_string()))?;

        let mut method_names = Vec::with_capacity(req.methods.len());
        for m in &req.methods {
            self.repo
                .upsert_method(UpsertMethodArgs {
                    version_id: version.id.clone(),
                    name: m.name.clone(),
                    description: m.description.clone(),
                    input_schema: m.input_schema.clone(),
                    output_schema: m.output_schema.clone(),
                    modes: m.modes.clone(),
                    tags: m.tags.clone(),
                    policies: m.policies.clone(),
                    examples: m.examples.clone(),
                    actor: req.actor.clone(),
                })
                .await
                .map_err(|e| RegistryError::internal(e.to_string()))?;
            method_names.push(m.name.clone());
        }

        if let Some(env) = &req.set_default_env {
            self.repo
                .set_default(SetDefaultArgs {
                    capability_id: capability.id.clone(),
                    env: env.clone(),
                    major: req.version.major,
                    actor: req.actor.clone(),
                })
                .await
                .map_err(|e| RegistryError::internal(e.to_string()))?;
        }

        let revision = match self.repo.increment_revision(&capability.id).await {
            Ok(rev) => rev,
            Err(e) => {
                tracing::error!(
                    capability_id = %capability.id,
                    error = %e,
                    "revision increment failed, event will carry the pre-increment revision"
                );
                capability.revision
            }
        };

        let etag = RegistryChanged::make_etag(&capability.id, revision);
        self.events
            .publish(&RegistryChanged {
                app: capability.app.clone(),
                capability: capability.name.clone(),
                changed_fields: vec!["version".to_string(), "methods".to_string()],
                new_default_major: req.set_default_env.as_ref().map(|_| req.version.major),
                affected_majors: vec![req.version.major],
                revision,
                etag: etag.clone(),
                timestamp: version.audit.updated_at,
                env: req.set_default_env.clone(),
            })
            .await;

        Ok(UpsertOutput {
            action: if existed { "updated" } else { "created" }.to_string(),
            cap: format!("{}.{}", capability.app, capability.name),
            version: VersionSummary::from(&version),
            methods: method_names,
            revision,
            etag,
        })
    }
}
