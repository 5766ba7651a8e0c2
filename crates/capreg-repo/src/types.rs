//! Argument and filter structs for [`crate::Repository`] methods. Kept
//! separate from the trait definition so the method list in `lib.rs` stays
//! skimmable.

use serde_json::Value;

/// Filters accepted by `Repository::list_capabilities` (`spec.md` §4.3.2).
#[derive(Debug, Clone, Default)]
pub struct CapabilityFilters {
    /// Restrict to one `app`.
    pub app: Option<String>,
    /// Capability must carry every tag listed here.
    pub tags: Vec<String>,
    /// Free-text match against `app`/`name`/`description`.
    pub query: Option<String>,
    /// Status filter; `None` defaults to `Active`-only, `Some("all")` disables filtering.
    pub status: Option<String>,
    /// Restrict to capabilities exposing a method with this name.
    pub supports_method: Option<String>,
}

/// Arguments for `Repository::upsert_capability`.
#[derive(Debug, Clone)]
pub struct UpsertCapabilityArgs {
    /// Application/namespace component.
    pub app: String,
    /// Name component.
    pub name: String,
    /// `Some(_)` replaces the stored description; `None` keeps it unchanged.
    pub description: Option<String>,
    /// `Some(_)` replaces the stored tag set; `None` keeps it unchanged.
    pub tags: Option<Vec<String>>,
    /// Identity stamped as `created_by`/`updated_by`.
    pub actor: String,
}

/// Selects a single version by exact string or by major, used by both
/// `describe` and the repository's `get_version`.
#[derive(Debug, Clone, Default)]
pub struct GetVersionArgs {
    /// Owning capability id.
    pub capability_id: String,
    /// Exact `version_string` to match, if known.
    pub version_string: Option<String>,
    /// Major to match, if no exact string is known.
    pub major: Option<u32>,
}

/// Arguments for `Repository::upsert_version`.
#[derive(Debug, Clone)]
pub struct UpsertVersionArgs {
    /// Owning capability id.
    pub capability_id: String,
    /// Major component, `[0, 9999]`.
    pub major: u32,
    /// Minor component, `[0, 9999]`.
    pub minor: u32,
    /// Patch component, `[0, 9999]`.
    pub patch: u32,
    /// Prerelease label; empty string and `None` are equivalent.
    pub prerelease: Option<String>,
    /// Free-form human description.
    pub description: Option<String>,
    /// Free-form release notes.
    pub changelog: Option<String>,
    /// Arbitrary structured metadata, JSON-encoded size bounded by the caller.
    pub metadata: Option<Value>,
    /// Identity stamped as `created_by`/`updated_by`.
    pub actor: String,
}

/// The lifecycle transition applied by `Repository::update_version_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    /// Mark the version deprecated.
    Deprecate,
    /// Mark the version disabled.
    Disable,
}

/// Arguments for `Repository::update_version_status`.
#[derive(Debug, Clone)]
pub struct UpdateVersionStatusArgs {
    /// The version row to transition.
    pub version_id: String,
    /// Deprecate or disable.
    pub transition: StatusTransition,
    /// Human-readable reason, stored in `deprecation_reason`.
    pub reason: String,
    /// Identity stamped as `updated_by`.
    pub actor: String,
}

/// Arguments for `Repository::upsert_method`.
#[derive(Debug, Clone)]
pub struct UpsertMethodArgs {
    /// Owning version id.
    pub version_id: String,
    /// Method name, unique within its version.
    pub name: String,
    /// Free-form human description.
    pub description: Option<String>,
    /// JSON Schema for the method's input, already validated for size by the caller.
    pub input_schema: Value,
    /// JSON Schema for the method's output.
    pub output_schema: Value,
    /// Invocation modes this method supports.
    pub modes: Vec<capreg_core::MethodMode>,
    /// Free-form classification tags.
    pub tags: Vec<String>,
    /// Arbitrary policy metadata.
    pub policies: Value,
    /// Example invocations.
    pub examples: Vec<Value>,
    /// Identity stamped as `created_by`/`updated_by`.
    pub actor: String,
}

/// Arguments for `Repository::set_default`.
#[derive(Debug, Clone)]
pub struct SetDefaultArgs {
    /// Owning capability id.
    pub capability_id: String,
    /// Environment this default applies to.
    pub env: String,
    /// The major version to make default.
    pub major: u32,
    /// Identity stamped as `created_by`/`updated_by`.
    pub actor: String,
}

/// A single flattened row used to assemble a bootstrap snapshot
/// (`spec.md` §4.7, `Repository::list_bootstrap_entries`).
#[derive(Debug, Clone)]
pub struct BootstrapEntry {
    /// Application/namespace component.
    pub app: String,
    /// Name component.
    pub name: String,
    /// The default major for this `(app, name, env)`, if configured.
    pub default_major: Option<u32>,
    /// Canonical version string of the resolved default version, if any.
    pub version_string: Option<String>,
    /// Opaque id of the resolved default version, if any.
    pub version_id: Option<String>,
    /// Lifecycle status of the resolved default version, if any.
    pub version_status: Option<capreg_core::VersionStatus>,
}
