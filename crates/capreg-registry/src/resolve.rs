//! `resolve` (`spec.md` §4.3.1): turn a capability reference into a concrete
//! subject, version, and transport endpoint.

use std::collections::BTreeMap;
use std::time::Duration;

use capreg_core::{ErrorCode, RegistryChanged, RegistryError, ResolutionContext};
use capreg_events::EventPublisher;
use capreg_repo::Repository;
use serde::Serialize;
use tracing::instrument;

use crate::shared::{effective_env, MethodSchemaPair, MethodSummary};
use crate::RegistryCore;

/// Input to [`RegistryCore::resolve`].
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    /// Capability reference, optionally carrying `@alias/` and `@range` parts.
    pub cap: String,
    /// Overrides any range embedded in `cap` (`spec.md` §4.3.1 step 2).
    pub ver: Option<String>,
    /// Caller context: tenant, environment, audience, features.
    pub ctx: ResolutionContext,
    /// Attach a method summary list to the response.
    pub include_methods: bool,
    /// Attach a decoded per-method schema map to the response.
    pub include_schemas: bool,
    /// Deadline for any federated forward this resolve triggers.
    pub deadline: Duration,
}

/// Output of [`RegistryCore::resolve`] (`spec.md` §4.3.1 step 9–10).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOutput {
    /// Bus subject clients should address requests for this version to.
    pub subject: String,
    /// The resolved version string.
    pub resolved_version: String,
    /// The resolved major.
    pub major: u32,
    /// The resolved version's lifecycle status.
    pub status: String,
    /// Canonical identity string.
    pub canonical_identity: String,
    /// Bus URL clients should connect to.
    pub nats_url: String,
    /// Advertised cache TTL, in seconds.
    pub ttl_seconds: u64,
    /// `"{capability_id}-{revision}"`.
    pub etag: String,
    /// Present only when `includeMethods` was set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<MethodSummary>>,
    /// Present only when `includeSchemas` was set; keyed by method name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schemas: Option<BTreeMap<String, MethodSchemaPair>>,
}

impl<R: Repository, P: EventPublisher> RegistryCore<R, P> {
    /// Resolve a capability reference to a subject + version
    /// (`spec.md` §4.3.1).
    ///
    /// # Errors
    ///
    /// - [`ErrorCode::InvalidArgument`] for a malformed `cap`.
    /// - [`ErrorCode::NotFound`] when the capability, its versions, or a
    ///   matching version under `ver`/the embedded range do not exist.
    /// - [`ErrorCode::Forbidden`] when a tenant rule denies the resolved major.
    /// - Whatever [`ErrorCode`] a federated forward surfaces, when `cap`
    ///   carries a non-default alias.
    #[instrument(skip(self, req), fields(cap = %req.cap))]
    pub async fn resolve(&self, req: ResolveRequest) -> Result<ResolveOutput, RegistryError> {
        let (alias, remainder) = capreg_capref::extract_alias(&req.cap);
        let default_alias = self.default_alias().await?;

        if let Some(alias) = &alias {
            if alias != &default_alias {
                return self.resolve_federated(alias, &req).await;
            }
        }

        let parsed = capreg_capref::parse(remainder)
            .map_err(|e| RegistryError::new(ErrorCode::InvalidArgument, e.to_string()))?;
        let range = match &req.ver {
            Some(v) if !v.is_empty() => v.clone(),
            _ => parsed.range.render(),
        };

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
        if versions.is_empty() {
            return Err(RegistryError::new(
                ErrorCode::NotFound,
                format!("no versions for capability {}.{}", parsed.app, parsed.name),
            ));
        }

        let env = effective_env(req.ctx.env.as_deref(), &self.config.default_env);
        let default_major = self
            .repo
            .get_default(&capability.id, &env)
            .await
            .map_err(|e| RegistryError::internal(e.to_string()))?
            .map(|d| d.default_major);

        let resolved = capreg_semver::resolve(
            &versions,
            &capreg_semver::ResolveParams {
                range: &range,
                default_major,
                include_deprecated: true,
                exclude_disabled: true,
            },
        )
        .ok_or_else(|| {
            RegistryError::new(
                ErrorCode::NotFound,
                format!("No matching version for {}.{}@{range}", parsed.app, parsed.name),
            )
        })?
        .clone();

        if let Some(tenant_id) = req.ctx.tenant_id.as_deref() {
            if !tenant_id.is_empty() {
                self.check_tenant_access(&capability.id, resolved.major, &req.ctx)
                    .await?;
            }
        }

        let subject =
            capreg_subject::build_subject(&self.config.subject_prefix, &parsed.app, &parsed.name, resolved.major);
        let canonical_identity = capreg_subject::canonical_identity(
            &default_alias,
            &parsed.app,
            &parsed.name,
            &resolved.version_string,
        );
        let etag = RegistryChanged::make_etag(&capability.id, capability.revision);

        let mut output = ResolveOutput {
            subject,
            resolved_version: resolved.version_string.clone(),
            major: resolved.major,
            status: format!("{:?}", resolved.status).to_lowercase(),
            canonical_identity,
            nats_url: self.config.nats_url.clone(),
            ttl_seconds: self.config.default_ttl_seconds,
            etag,
            methods: None,
            schemas: None,
        };

        if req.include_methods || req.include_schemas {
            let methods = self
                .repo
                .get_methods(&resolved.id)
                .await
                .map_err(|e| RegistryError::internal(e.to_string()))?;
            if req.include_methods {
                output.methods = Some(methods.iter().map(MethodSummary::from).collect());
            }
            if req.include_schemas {
                let mut schemas = BTreeMap::new();
                for m in &methods {
                    schemas.insert(
                        m.name.clone(),
                        MethodSchemaPair {
                            input: crate::shared::as_object_lenient(&m.input_schema),
                            output: crate::shared::as_object_lenient(&m.output_schema),
                        },
                    );
                }
                output.schemas = Some(schemas);
            }
        }

        Ok(output)
    }

    /// Evaluate tenant rules for `capability_id`/`major` (`spec.md` §4.3.1
    /// step 8). A failure to load rules fails open: logged, treated as an
    /// unconditional allow.
    async fn check_tenant_access(
        &self,
        capability_id: &str,
        major: u32,
        ctx: &ResolutionContext,
    ) -> Result<(), RegistryError> {
        let rules = match self.repo.get_tenant_rules(capability_id, ctx).await {
            Ok(rules) => rules,
            Err(e) => {
                tracing::error!(
                    capability_id,
                    error = %e,
                    "tenant rule load failed, failing open"
                );
                return Ok(());
            }
        };
        let decision = capreg_policy::evaluate(&rules, major, ctx);
        if decision.allowed {
            Ok(())
        } else {
            Err(RegistryError::new(
                ErrorCode::Forbidden,
                decision.reason.unwrap_or_else(|| "denied by tenant rule".to_string()),
            ))
        }
    }

    async fn resolve_federated(
        &self,
        alias: &str,
        req: &ResolveRequest,
    ) -> Result<ResolveOutput, RegistryError> {
        let federator = self.federator.as_ref().ok_or_else(|| {
            RegistryError::new(
                ErrorCode::UnknownAlias,
                format!("no federation configured, cannot resolve alias {alias:?}"),
            )
        })?;

        let (_, remainder) = capreg_capref::extract_alias(&req.cap);
        let reply = federator
            .resolve(alias, remainder, req.ver.as_deref(), None, req.deadline)
            .await?;

        let registry = self
            .repo
            .get_registry_by_alias(alias)
            .await
            .map_err(|e| RegistryError::internal(e.to_string()))?
            .ok_or_else(|| RegistryError::new(ErrorCode::UnknownAlias, format!("unknown alias {alias:?}")))?;
        let nats_url = registry.nats_url.unwrap_or_else(|| self.config.nats_url.clone());

        Ok(ResolveOutput {
            subject: reply.subject,
            resolved_version: reply.resolved_version.clone(),
            major: reply.major,
            status: reply.status,
            canonical_identity: format!("cap:@{alias}/{remainder}@{}", reply.resolved_version),
            nats_url,
            ttl_seconds: reply.ttl_seconds,
            etag: reply.etag,
            methods: None,
            schemas: None,
        })
    }
}
