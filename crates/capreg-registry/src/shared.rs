//! Wire-shaped response fragments reused across more than one operation, and
//! the "decode, never fail" helpers `spec.md` §4.3.1/§4.3.3 require for
//! method schemas and examples that are stored as opaque `serde_json::Value`
//! but must render back out as plain JSON objects even when malformed.

use capreg_core::{Method, MethodMode, Version, VersionStatus};
use serde::Serialize;
use serde_json::{Map, Value};

/// `{name, description, modes, tags}` — the summary shape `resolve`'s
/// `includeMethods` attaches (`spec.md` §4.3.1 step 10).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodSummary {
    /// Method name.
    pub name: String,
    /// Free-form human description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Invocation modes this method supports.
    pub modes: Vec<MethodMode>,
    /// Free-form classification tags.
    pub tags: Vec<String>,
}

impl From<&Method> for MethodSummary {
    fn from(m: &Method) -> Self {
        Self {
            name: m.name.clone(),
            description: m.description.clone(),
            modes: m.modes.clone(),
            tags: m.tags.clone(),
        }
    }
}

/// `{input, output}` — the per-method entry of `resolve`'s `includeSchemas`
/// map (`spec.md` §4.3.1 step 10).
#[derive(Debug, Clone, Serialize)]
pub struct MethodSchemaPair {
    /// Input JSON Schema, decoded into an object map; empty on decode failure.
    pub input: Map<String, Value>,
    /// Output JSON Schema, decoded into an object map; empty on decode failure.
    pub output: Map<String, Value>,
}

/// The fully populated method shape `describe` returns (`spec.md` §4.3.3):
/// schemas, modes, tags, and examples, all decoded leniently.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDetail {
    /// Method name.
    pub name: String,
    /// Free-form human description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Input JSON Schema, decoded into an object map; empty on decode failure.
    pub input_schema: Map<String, Value>,
    /// Output JSON Schema, decoded into an object map; empty on decode failure.
    pub output_schema: Map<String, Value>,
    /// Invocation modes this method supports.
    pub modes: Vec<MethodMode>,
    /// Free-form classification tags.
    pub tags: Vec<String>,
    /// Arbitrary policy metadata.
    pub policies: Map<String, Value>,
    /// Example invocations, each leniently decoded to an object; a
    /// non-object example is dropped rather than failing the whole list.
    pub examples: Vec<Map<String, Value>>,
}

impl From<&Method> for MethodDetail {
    fn from(m: &Method) -> Self {
        Self {
            name: m.name.clone(),
            description: m.description.clone(),
            input_schema: as_object_lenient(&m.input_schema),
            output_schema: as_object_lenient(&m.output_schema),
            modes: m.modes.clone(),
            tags: m.tags.clone(),
            policies: as_object_lenient(&m.policies),
            examples: m
                .examples
                .iter()
                .map(as_object_lenient)
                .filter(|o| !o.is_empty())
                .collect(),
        }
    }
}

/// Coerce a [`Value`] to its object map, or an empty map if it is not a JSON
/// object — "decode failures yield empty maps (never fatal)" (`spec.md`
/// §4.3.1 step 10, §4.3.3).
#[must_use]
pub fn as_object_lenient(v: &Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap_or_default()
}

/// `{versionString, major, minor, patch, status, ...}` — the version summary
/// shape shared by `resolve`, `describe`, and `upsert`'s response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    /// Canonical `"M.m.p"` / `"M.m.p-pre"` rendering.
    pub version_string: String,
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
    /// Patch component.
    pub patch: u32,
    /// Prerelease label, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prerelease: Option<String>,
    /// Lifecycle status.
    pub status: VersionStatus,
    /// Free-form human description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form release notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,
    /// Why this version was deprecated, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation_reason: Option<String>,
}

impl From<&Version> for VersionSummary {
    fn from(v: &Version) -> Self {
        Self {
            version_string: v.version_string.clone(),
            major: v.major,
            minor: v.minor,
            patch: v.patch,
            prerelease: v.prerelease.clone(),
            status: v.status,
            description: v.description.clone(),
            changelog: v.changelog.clone(),
            deprecation_reason: v.deprecation_reason.clone(),
        }
    }
}

/// Resolve the environment to use when a request omits one: `ctx.env` if
/// present and non-empty, else `config.default_env` (`spec.md` §4.3.1 step 5).
#[must_use]
pub fn effective_env(ctx_env: Option<&str>, default_env: &str) -> String {
    match ctx_env {
        Some(env) if !env.is_empty() => env.to_string(),
        _ => default_env.to_string(),
    }
}
