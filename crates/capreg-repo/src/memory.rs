//! A fully behavioral, thread-safe in-memory [`Repository`]. This is the
//! workspace's stand-in for the external store: every test and
//! `capreg-cli` invocation runs against it rather than a mock.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use capreg_core::{
    AuditFields, Capability, CapabilityDefault, CapabilityStatus, Method, RegistryAlias,
    ResolutionContext, TenantRule, Version, VersionStatus,
};
use chrono::Utc;
use tokio::sync::RwLock;

use crate::types::*;
use crate::{Repository, RepositoryError};

#[derive(Default)]
struct State {
    capabilities: HashMap<String, Capability>,
    capability_by_identity: HashMap<(String, String), String>,
    versions: HashMap<String, Version>,
    versions_by_capability: HashMap<String, Vec<String>>,
    methods: HashMap<String, Method>,
    methods_by_version: HashMap<String, Vec<String>>,
    defaults: HashMap<(String, String), CapabilityDefault>,
    tenant_rules: HashMap<String, Vec<TenantRule>>,
    registries: HashMap<String, RegistryAlias>,
}

/// In-memory [`Repository`] reference implementation.
///
/// A single [`RwLock`] guards all state, matching the contract's
/// requirement that `upsert` behave as one transactional unit (`spec.md`
/// §5): a write holds the lock across every step of the multi-row mutation,
/// so no reader can observe a partial upsert.
pub struct InMemoryRepository {
    state: RwLock<State>,
    next_id: AtomicU64,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    /// An empty repository with no capabilities, aliases, or rules.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Wrap `self` in an `Arc` for sharing across the registry core and the
    /// bus adapter's concurrently-handled requests.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn fresh_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{n}")
    }

    /// Seed a [`RegistryAlias`] directly, bypassing the read/write contract.
    /// Used by test and CLI setup to pre-populate sibling registries.
    pub async fn seed_registry_alias(&self, alias: RegistryAlias) {
        let mut state = self.state.write().await;
        state.registries.insert(alias.alias.clone(), alias);
    }

    /// Seed a [`TenantRule`] directly. Used by test setup.
    pub async fn seed_tenant_rule(&self, rule: TenantRule) {
        let mut state = self.state.write().await;
        state.tenant_rules.entry(rule.capability_id.clone()).or_default().push(rule);
    }
}

fn sort_versions_desc(versions: &mut [Version]) {
    versions.sort_by(|a, b| {
        b.major
            .cmp(&a.major)
            .then(b.minor.cmp(&a.minor))
            .then(b.patch.cmp(&a.patch))
    });
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_capability(
        &self,
        app: &str,
        name: &str,
    ) -> Result<Option<Capability>, RepositoryError> {
        let state = self.state.read().await;
        let key = (app.to_string(), name.to_string());
        Ok(state
            .capability_by_identity
            .get(&key)
            .and_then(|id| state.capabilities.get(id))
            .cloned())
    }

    async fn get_capability_by_id(&self, id: &str) -> Result<Option<Capability>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.capabilities.get(id).cloned())
    }

    async fn upsert_capability(
        &self,
        args: UpsertCapabilityArgs,
    ) -> Result<Capability, RepositoryError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let key = (args.app.clone(), args.name.clone());
        if let Some(id) = state.capability_by_identity.get(&key).cloned() {
            let cap = state.capabilities.get_mut(&id).expect("indexed capability must exist");
            if let Some(description) = args.description {
                cap.description = Some(description);
            }
            if let Some(tags) = args.tags {
                cap.tags = tags;
            }
            cap.audit.touch(args.actor, now);
            return Ok(cap.clone());
        }

        let id = self.fresh_id("cap");
        let capability = Capability {
            id: id.clone(),
            app: args.app.clone(),
            name: args.name.clone(),
            description: args.description,
            tags: args.tags.unwrap_or_default(),
            status: CapabilityStatus::Active,
            revision: 0,
            audit: AuditFields::created_now(args.actor, now),
        };
        state.capability_by_identity.insert(key, id.clone());
        state.capabilities.insert(id, capability.clone());
        Ok(capability)
    }

    async fn list_capabilities(
        &self,
        filters: &CapabilityFilters,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Capability>, u64), RepositoryError> {
        let state = self.state.read().await;
        let mut matched: Vec<Capability> = state
            .capabilities
            .values()
            .filter(|cap| {
                if let Some(app) = &filters.app {
                    if &cap.app != app {
                        return false;
                    }
                }
                if !filters.tags.is_empty() && !filters.tags.iter().all(|t| cap.tags.contains(t)) {
                    return false;
                }
                if let Some(query) = &filters.query {
                    let q = query.to_lowercase();
                    let haystack = format!(
                        "{} {} {}",
                        cap.app,
                        cap.name,
                        cap.description.as_deref().unwrap_or("")
                    )
                    .to_lowercase();
                    if !haystack.contains(&q) {
                        return false;
                    }
                }
                match filters.status.as_deref() {
                    None => cap.status == CapabilityStatus::Active,
                    Some("all") => true,
                    Some(other) => format!("{:?}", cap.status).eq_ignore_ascii_case(other),
                }
            })
            .cloned()
            .collect();

        if let Some(method_name) = &filters.supports_method {
            let mut keep = Vec::new();
            for cap in matched {
                let version_ids = state
                    .versions_by_capability
                    .get(&cap.id)
                    .cloned()
                    .unwrap_or_default();
                let has_method = version_ids.iter().any(|vid| {
                    state
                        .methods_by_version
                        .get(vid)
                        .map(|mids| {
                            mids.iter()
                                .filter_map(|mid| state.methods.get(mid))
                                .any(|m| m.name == *method_name)
                        })
                        .unwrap_or(false)
                });
                if has_method {
                    keep.push(cap);
                }
            }
            matched = keep;
        }

        matched.sort_by(|a, b| a.app.cmp(&b.app).then(a.name.cmp(&b.name)));
        let total = matched.len() as u64;
        let start = ((page.saturating_sub(1)) as usize) * (limit as usize);
        let page_rows = matched.into_iter().skip(start).take(limit as usize).collect();
        Ok((page_rows, total))
    }

    async fn get_versions(&self, capability_id: &str) -> Result<Vec<Version>, RepositoryError> {
        let state = self.state.read().await;
        let mut versions: Vec<Version> = state
            .versions_by_capability
            .get(capability_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.versions.get(id))
            .cloned()
            .collect();
        sort_versions_desc(&mut versions);
        Ok(versions)
    }

    async fn get_versions_by_capability_ids(
        &self,
        capability_ids: &[String],
    ) -> Result<HashMap<String, Vec<Version>>, RepositoryError> {
        let state = self.state.read().await;
        let mut out = HashMap::new();
        for cap_id in capability_ids {
            let mut versions: Vec<Version> = state
                .versions_by_capability
                .get(cap_id)
                .into_iter()
                .flatten()
                .filter_map(|id| state.versions.get(id))
                .cloned()
                .collect();
            sort_versions_desc(&mut versions);
            out.insert(cap_id.clone(), versions);
        }
        Ok(out)
    }

    async fn get_versions_by_major(
        &self,
        capability_id: &str,
        major: u32,
    ) -> Result<Vec<Version>, RepositoryError> {
        let mut versions = self.get_versions(capability_id).await?;
        versions.retain(|v| v.major == major);
        Ok(versions)
    }

    async fn get_version(
        &self,
        args: GetVersionArgs,
    ) -> Result<Option<Version>, RepositoryError> {
        let versions = self.get_versions(&args.capability_id).await?;
        if let Some(version_string) = &args.version_string {
            if let Some(v) = versions.iter().find(|v| &v.version_string == version_string) {
                return Ok(Some(v.clone()));
            }
        }
        if let Some(major) = args.major {
            return Ok(versions.into_iter().find(|v| v.major == major));
        }
        Ok(None)
    }

    async fn upsert_version(
        &self,
        args: UpsertVersionArgs,
    ) -> Result<Version, RepositoryError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let prerelease = Version::normalize_prerelease(args.prerelease);
        let version_string = Version::render_version_string(
            args.major,
            args.minor,
            args.patch,
            prerelease.as_deref(),
        );

        let existing_id = state
            .versions_by_capability
            .get(&args.capability_id)
            .into_iter()
            .flatten()
            .find(|id| {
                state
                    .versions
                    .get(*id)
                    .is_some_and(|v| v.version_string == version_string)
            })
            .cloned();

        if let Some(id) = existing_id {
            let version = state.versions.get_mut(&id).expect("indexed version must exist");
            version.description = args.description.or_else(|| version.description.clone());
            version.changelog = args.changelog.or_else(|| version.changelog.clone());
            if let Some(metadata) = args.metadata {
                version.metadata = metadata;
            }
            version.audit.touch(args.actor, now);
            return Ok(version.clone());
        }

        let id = self.fresh_id("ver");
        let version = Version {
            id: id.clone(),
            capability_id: args.capability_id.clone(),
            major: args.major,
            minor: args.minor,
            patch: args.patch,
            prerelease,
            version_string,
            status: VersionStatus::Active,
            deprecation_reason: None,
            deprecated_at: None,
            disabled_at: None,
            description: args.description,
            changelog: args.changelog,
            metadata: args.metadata.unwrap_or(serde_json::Value::Null),
            audit: AuditFields::created_now(args.actor, now),
        };
        state
            .versions_by_capability
            .entry(args.capability_id)
            .or_default()
            .push(id.clone());
        state.versions.insert(id, version.clone());
        Ok(version)
    }

    async fn update_version_status(
        &self,
        args: UpdateVersionStatusArgs,
    ) -> Result<Version, RepositoryError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let version = state
            .versions
            .get_mut(&args.version_id)
            .ok_or_else(|| RepositoryError::Backend(anyhow::anyhow!("unknown version id")))?;
        version.deprecation_reason = Some(args.reason);
        match args.transition {
            StatusTransition::Deprecate => {
                version.status = VersionStatus::Deprecated;
                version.deprecated_at = Some(now);
            }
            StatusTransition::Disable => {
                version.status = VersionStatus::Disabled;
                version.disabled_at = Some(now);
            }
        }
        version.audit.touch(args.actor, now);
        Ok(version.clone())
    }

    async fn get_methods(&self, version_id: &str) -> Result<Vec<Method>, RepositoryError> {
        let state = self.state.read().await;
        let mut methods: Vec<Method> = state
            .methods_by_version
            .get(version_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.methods.get(id))
            .cloned()
            .collect();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(methods)
    }

    async fn upsert_method(&self, args: UpsertMethodArgs) -> Result<Method, RepositoryError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let id = self.fresh_id("mth");
        let method = Method {
            id: id.clone(),
            version_id: args.version_id.clone(),
            name: args.name,
            description: args.description,
            input_schema: args.input_schema,
            output_schema: args.output_schema,
            modes: args.modes,
            tags: args.tags,
            policies: args.policies,
            examples: args.examples,
            audit: AuditFields::created_now(args.actor, now),
        };
        state
            .methods_by_version
            .entry(args.version_id)
            .or_default()
            .push(id.clone());
        state.methods.insert(id, method.clone());
        Ok(method)
    }

    async fn delete_methods(&self, version_id: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(ids) = state.methods_by_version.remove(version_id) {
            for id in ids {
                state.methods.remove(&id);
            }
        }
        Ok(())
    }

    async fn get_default(
        &self,
        capability_id: &str,
        env: &str,
    ) -> Result<Option<CapabilityDefault>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .defaults
            .get(&(capability_id.to_string(), env.to_string()))
            .cloned())
    }

    async fn get_defaults_batch(
        &self,
        capability_ids: &[String],
        env: &str,
    ) -> Result<HashMap<String, CapabilityDefault>, RepositoryError> {
        let state = self.state.read().await;
        let mut out = HashMap::new();
        for cap_id in capability_ids {
            if let Some(default) = state.defaults.get(&(cap_id.clone(), env.to_string())) {
                out.insert(cap_id.clone(), default.clone());
            }
        }
        Ok(out)
    }

    async fn get_default_majors_for_capability(
        &self,
        capability_id: &str,
    ) -> Result<HashSet<u32>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .defaults
            .iter()
            .filter(|((cap_id, _env), _)| cap_id == capability_id)
            .map(|(_, default)| default.default_major)
            .collect())
    }

    async fn set_default(
        &self,
        args: SetDefaultArgs,
    ) -> Result<CapabilityDefault, RepositoryError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let key = (args.capability_id.clone(), args.env.clone());
        if let Some(existing) = state.defaults.get_mut(&key) {
            existing.default_major = args.major;
            existing.audit.touch(args.actor, now);
            return Ok(existing.clone());
        }
        let default = CapabilityDefault {
            id: self.fresh_id("def"),
            capability_id: args.capability_id,
            default_major: args.major,
            env: args.env,
            audit: AuditFields::created_now(args.actor, now),
        };
        state.defaults.insert(key, default.clone());
        Ok(default)
    }

    async fn get_tenant_rules(
        &self,
        capability_id: &str,
        ctx: &ResolutionContext,
    ) -> Result<Vec<TenantRule>, RepositoryError> {
        let state = self.state.read().await;
        let mut rules: Vec<TenantRule> = state
            .tenant_rules
            .get(capability_id)
            .into_iter()
            .flatten()
            .filter(|r| {
                r.tenant_id.as_deref().is_none_or(|t| Some(t) == ctx.tenant_id.as_deref())
                    && r.env.as_deref().is_none_or(|e| Some(e) == ctx.env.as_deref())
                    && r.aud.as_deref().is_none_or(|a| Some(a) == ctx.aud.as_deref())
            })
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));
        Ok(rules)
    }

    async fn increment_revision(&self, capability_id: &str) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        let cap = state
            .capabilities
            .get_mut(capability_id)
            .ok_or_else(|| RepositoryError::Backend(anyhow::anyhow!("unknown capability id")))?;
        cap.revision += 1;
        Ok(cap.revision)
    }

    async fn get_registry_by_alias(
        &self,
        alias: &str,
    ) -> Result<Option<RegistryAlias>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.registries.get(alias).cloned())
    }

    async fn get_default_registry(&self) -> Result<Option<RegistryAlias>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.registries.values().find(|r| r.is_default).cloned())
    }

    async fn list_registries(&self) -> Result<Vec<RegistryAlias>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.registries.values().cloned().collect())
    }

    async fn list_bootstrap_entries(
        &self,
        env: &str,
    ) -> Result<Vec<BootstrapEntry>, RepositoryError> {
        let state = self.state.read().await;
        let mut out = Vec::new();
        for cap in state.capabilities.values() {
            let mut versions: Vec<Version> = state
                .versions_by_capability
                .get(&cap.id)
                .into_iter()
                .flatten()
                .filter_map(|id| state.versions.get(id))
                .cloned()
                .collect();
            sort_versions_desc(&mut versions);

            let default_major = state
                .defaults
                .get(&(cap.id.clone(), env.to_string()))
                .map(|d| d.default_major);
            let target = match default_major {
                Some(major) => versions.iter().find(|v| v.major == major),
                None => versions.first(),
            };
            out.push(BootstrapEntry {
                app: cap.app.clone(),
                name: cap.name.clone(),
                default_major,
                version_string: target.map(|v| v.version_string.clone()),
                version_id: target.map(|v| v.id.clone()),
                version_status: target.map(|v| v.status),
            });
        }
        out.sort_by(|a, b| a.app.cmp(&b.app).then(a.name.cmp(&b.name)));
        Ok(out)
    }
}
