//! Domain entities (`spec.md` §3). These are semantic records — the durable
//! store's exact row layout is opaque and owned by the external Repository
//! implementation; these types are what the core operates on in memory and
//! what a [`crate::Repository`]-shaped dependency is expected to produce.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Creation/update provenance carried by every persisted entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditFields {
    /// When the row was first created.
    pub created_at: DateTime<Utc>,
    /// When the row was last modified.
    pub updated_at: DateTime<Utc>,
    /// Opaque identity that created the row (`ctx.userId`, default `"system"`).
    pub created_by: String,
    /// Opaque identity that last modified the row.
    pub updated_by: String,
}

impl AuditFields {
    /// A freshly-created audit stamp: `created_by == updated_by == by`, both timestamps `now`.
    #[must_use]
    pub fn created_now(by: impl Into<String>, now: DateTime<Utc>) -> Self {
        let by = by.into();
        Self {
            created_at: now,
            updated_at: now,
            created_by: by.clone(),
            updated_by: by,
        }
    }

    /// Stamp an update: bumps `updated_at`/`updated_by`, keeps `created_*` untouched.
    pub fn touch(&mut self, by: impl Into<String>, now: DateTime<Utc>) {
        self.updated_at = now;
        self.updated_by = by.into();
    }
}

/// Lifecycle status of a [`Capability`]. Serializes capitalized
/// (`"Active"`/`"Deprecated"`/`"Disabled"`) per `spec.md` §9's documented
/// casing inconsistency between Capability and Version status fields —
/// this is mirrored deliberately, not unified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CapabilityStatus {
    /// Normal, fully supported.
    Active,
    /// Still resolvable but flagged for removal.
    Deprecated,
    /// No longer resolvable.
    Disabled,
}

impl Default for CapabilityStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// A named, versioned service contract identified by `app.name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    /// Opaque row identifier.
    pub id: String,
    /// Application/namespace component of the identity.
    pub app: String,
    /// Name component of the identity (may itself contain dots).
    pub name: String,
    /// Free-form human description.
    pub description: Option<String>,
    /// Free-form classification tags.
    pub tags: Vec<String>,
    /// Lifecycle status.
    pub status: CapabilityStatus,
    /// Monotonically non-decreasing mutation counter.
    pub revision: u64,
    /// Creation/update provenance.
    pub audit: AuditFields,
}

/// Lifecycle status of a [`Version`]. Serializes lowercase
/// (`"active"`/`"deprecated"`/`"disabled"`) — distinct casing from
/// [`CapabilityStatus`], see `spec.md` §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    /// Normal, fully supported.
    Active,
    /// Still resolvable but flagged for removal.
    Deprecated,
    /// No longer resolvable.
    Disabled,
}

impl Default for VersionStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// A single concrete `major.minor.patch[-prerelease]` release of a [`Capability`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    /// Opaque row identifier.
    pub id: String,
    /// Owning capability's id.
    pub capability_id: String,
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
    /// Patch component.
    pub patch: u32,
    /// Prerelease label, normalized so that `Some("")` never occurs —
    /// empty string is always collapsed to `None` before storage or
    /// comparison (`spec.md` §9).
    pub prerelease: Option<String>,
    /// Canonical `"M.m.p"` or `"M.m.p-pre"` rendering.
    pub version_string: String,
    /// Lifecycle status.
    pub status: VersionStatus,
    /// Why this version was deprecated, if it was.
    pub deprecation_reason: Option<String>,
    /// When this version was deprecated, if it was.
    pub deprecated_at: Option<DateTime<Utc>>,
    /// When this version was disabled, if it was.
    pub disabled_at: Option<DateTime<Utc>>,
    /// Free-form human description.
    pub description: Option<String>,
    /// Free-form release notes.
    pub changelog: Option<String>,
    /// Arbitrary structured metadata.
    pub metadata: Value,
    /// Creation/update provenance.
    pub audit: AuditFields,
}

impl Version {
    /// Normalize a prerelease label, collapsing `Some("")` to `None`
    /// (`spec.md` §9: `prerelease = null` and `prerelease = ""` are
    /// equivalent and must never diverge in the uniqueness key).
    #[must_use]
    pub fn normalize_prerelease(pre: Option<String>) -> Option<String> {
        match pre {
            Some(ref s) if s.is_empty() => None,
            other => other,
        }
    }

    /// Render the canonical `"M.m.p"` / `"M.m.p-pre"` string for given components.
    #[must_use]
    pub fn render_version_string(major: u32, minor: u32, patch: u32, pre: Option<&str>) -> String {
        match pre {
            Some(p) if !p.is_empty() => format!("{major}.{minor}.{patch}-{p}"),
            _ => format!("{major}.{minor}.{patch}"),
        }
    }

    /// `true` when [`Self::prerelease`] is absent (a "stable" release).
    #[must_use]
    pub fn is_stable(&self) -> bool {
        self.prerelease.is_none()
    }
}

/// A single exposed method contract on a [`Version`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Method {
    /// Opaque row identifier.
    pub id: String,
    /// Owning version's id.
    pub version_id: String,
    /// Method name, unique within its version.
    pub name: String,
    /// Free-form human description.
    pub description: Option<String>,
    /// JSON Schema for the method's input.
    pub input_schema: Value,
    /// JSON Schema for the method's output.
    pub output_schema: Value,
    /// Invocation modes this method supports.
    pub modes: Vec<MethodMode>,
    /// Free-form classification tags.
    pub tags: Vec<String>,
    /// Arbitrary policy metadata (rate limits, required scopes, ...).
    pub policies: Value,
    /// Example invocations, stored as opaque JSON.
    pub examples: Vec<Value>,
    /// Creation/update provenance.
    pub audit: AuditFields,
}

/// How a [`Method`] may be invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodMode {
    /// Request/response.
    Sync,
    /// Fire-and-forget with a later callback/event.
    Async,
    /// Long-lived, multi-message.
    Stream,
}

/// The major version resolved for a given `(capability, env)` pair absent an
/// explicit range in the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDefault {
    /// Opaque row identifier.
    pub id: String,
    /// Owning capability's id.
    pub capability_id: String,
    /// Default major version for this environment.
    pub default_major: u32,
    /// Free-form environment name (`"production"` is the configured default).
    pub env: String,
    /// Creation/update provenance.
    pub audit: AuditFields,
}

/// Allow/deny behavior of a [`TenantRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    /// Grants access, subject to `allowed_majors`.
    Allow,
    /// Denies access, subject to `denied_majors`.
    Deny,
}

/// A priority-ordered allow/deny record gating which majors a
/// tenant/environment/audience tuple may resolve to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRule {
    /// Opaque row identifier.
    pub id: String,
    /// Owning capability's id.
    pub capability_id: String,
    /// Tenant this rule applies to; `None` matches any tenant.
    pub tenant_id: Option<String>,
    /// Environment this rule applies to; `None` matches any environment.
    pub env: Option<String>,
    /// Audience this rule applies to; `None` matches any audience.
    pub aud: Option<String>,
    /// Allow or deny.
    pub rule_type: RuleType,
    /// Majors this rule allows (only meaningful when `rule_type == Allow`).
    pub allowed_majors: Vec<u32>,
    /// Majors this rule denies (only meaningful when `rule_type == Deny`).
    pub denied_majors: Vec<u32>,
    /// Features the caller must present in [`ResolutionContext::features`]
    /// for this rule to apply at all.
    pub required_features: Vec<String>,
    /// Evaluation order — ascending, ties broken by `id`.
    pub priority: i64,
}

/// A sibling registry reachable over the bus, identified by `alias`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryAlias {
    /// Opaque row identifier.
    pub id: String,
    /// Unique alias name (e.g. `"partner"`).
    pub alias: String,
    /// Bus URL for the remote registry, if known.
    pub nats_url: Option<String>,
    /// Remote registry subject to forward `resolve` requests to.
    pub registry_subject: Option<String>,
    /// Whether this is the registry's own default alias.
    pub is_default: bool,
    /// Creation/update provenance.
    pub audit: AuditFields,
}

/// Literal string used as the default alias when no [`RegistryAlias`] row
/// has `is_default = true` (`spec.md` §3).
pub const DEFAULT_ALIAS: &str = "main";

/// Request-scoped caller context. Never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionContext {
    /// Opaque tenant identity.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Environment name (e.g. `"production"`, `"staging"`).
    #[serde(default)]
    pub env: Option<String>,
    /// Audience identifier.
    #[serde(default)]
    pub aud: Option<String>,
    /// Feature flags presented by the caller.
    #[serde(default)]
    pub features: Vec<String>,
}

/// Arbitrary metadata map used for [`Version::metadata`]-shaped fields
/// that require ordered, deterministic serialization (tests, snapshots).
pub type OrderedMap = BTreeMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prerelease_normalization_collapses_empty_string() {
        assert_eq!(Version::normalize_prerelease(Some(String::new())), None);
        assert_eq!(Version::normalize_prerelease(None), None);
        assert_eq!(
            Version::normalize_prerelease(Some("beta.1".into())),
            Some("beta.1".into())
        );
    }

    #[test]
    fn version_string_rendering() {
        assert_eq!(Version::render_version_string(1, 2, 3, None), "1.2.3");
        assert_eq!(Version::render_version_string(1, 2, 3, Some("")), "1.2.3");
        assert_eq!(
            Version::render_version_string(1, 2, 3, Some("rc.1")),
            "1.2.3-rc.1"
        );
    }

    #[test]
    fn capability_status_serializes_pascal_case() {
        let json = serde_json::to_string(&CapabilityStatus::Deprecated).unwrap();
        assert_eq!(json, "\"Deprecated\"");
    }

    #[test]
    fn version_status_serializes_lowercase() {
        let json = serde_json::to_string(&VersionStatus::Deprecated).unwrap();
        assert_eq!(json, "\"deprecated\"");
    }
}
