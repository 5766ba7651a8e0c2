// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! capreg-repo
//!
//! The narrow read/write contract the registry core depends on
//! (`spec.md` §4.8, component C3), plus a fully behavioral in-memory
//! reference implementation used throughout the workspace's tests and by
//! `capreg-cli`.

pub mod memory;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use types::*;

/// Errors surfaced by a [`Repository`] implementation. Every variant maps to
/// `ErrorCode::InternalError` at the call site (`spec.md` §7) — the
/// repository boundary does not produce structured registry errors itself.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Any failure from the backing store — connection loss, constraint
    /// violation, serialization error, and so on.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// The storage contract the registry core operates against.
///
/// Method names mirror `spec.md` §4.8's indicative naming in `snake_case`;
/// semantics are the contract, not the literal names. `Send + Sync` so a
/// single handle can be shared across every concurrently-handled bus
/// message (`spec.md` §5).
#[async_trait]
pub trait Repository: Send + Sync {
    /// Look up a [`capreg_core::Capability`] by its `(app, name)` identity.
    async fn get_capability(
        &self,
        app: &str,
        name: &str,
    ) -> Result<Option<capreg_core::Capability>, RepositoryError>;

    /// Look up a [`capreg_core::Capability`] by its opaque id.
    async fn get_capability_by_id(
        &self,
        id: &str,
    ) -> Result<Option<capreg_core::Capability>, RepositoryError>;

    /// Insert or update a capability's `description`/`tags`, per the
    /// "replace when provided, keep when null" merge rule (`spec.md` §4.3.4).
    async fn upsert_capability(
        &self,
        args: UpsertCapabilityArgs,
    ) -> Result<capreg_core::Capability, RepositoryError>;

    /// Page through capabilities matching `filters`.
    async fn list_capabilities(
        &self,
        filters: &CapabilityFilters,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<capreg_core::Capability>, u64), RepositoryError>;

    /// All versions of a capability, sorted `(major, minor, patch)` descending.
    async fn get_versions(
        &self,
        capability_id: &str,
    ) -> Result<Vec<capreg_core::Version>, RepositoryError>;

    /// Batched lookup of versions across several capabilities, keyed by
    /// capability id (`spec.md` §4.3.2's batching requirement).
    async fn get_versions_by_capability_ids(
        &self,
        capability_ids: &[String],
    ) -> Result<std::collections::HashMap<String, Vec<capreg_core::Version>>, RepositoryError>;

    /// Versions of a capability restricted to one major.
    async fn get_versions_by_major(
        &self,
        capability_id: &str,
        major: u32,
    ) -> Result<Vec<capreg_core::Version>, RepositoryError>;

    /// Look up a single version by capability id plus an exact
    /// `version_string` or `major`.
    async fn get_version(
        &self,
        args: GetVersionArgs,
    ) -> Result<Option<capreg_core::Version>, RepositoryError>;

    /// Insert or update a version row (`spec.md` §4.3.4 step 2).
    async fn upsert_version(
        &self,
        args: UpsertVersionArgs,
    ) -> Result<capreg_core::Version, RepositoryError>;

    /// Transition a version's status (deprecate/disable), stamping the
    /// matching reason/timestamp field (`spec.md` §4.3.6).
    async fn update_version_status(
        &self,
        args: UpdateVersionStatusArgs,
    ) -> Result<capreg_core::Version, RepositoryError>;

    /// Methods attached to a version, sorted by name.
    async fn get_methods(
        &self,
        version_id: &str,
    ) -> Result<Vec<capreg_core::Method>, RepositoryError>;

    /// Insert or update a single method row.
    async fn upsert_method(
        &self,
        args: UpsertMethodArgs,
    ) -> Result<capreg_core::Method, RepositoryError>;

    /// Delete every method attached to a version (`spec.md` §4.3.4 step 3,
    /// run before inserting the new set).
    async fn delete_methods(&self, version_id: &str) -> Result<(), RepositoryError>;

    /// The `CapabilityDefault` row for `(capability_id, env)`, if any.
    async fn get_default(
        &self,
        capability_id: &str,
        env: &str,
    ) -> Result<Option<capreg_core::CapabilityDefault>, RepositoryError>;

    /// Batched lookup of defaults across several capabilities for one `env`.
    async fn get_defaults_batch(
        &self,
        capability_ids: &[String],
        env: &str,
    ) -> Result<std::collections::HashMap<String, capreg_core::CapabilityDefault>, RepositoryError>;

    /// Insert or update the default-major row for `(capability_id, env)`.
    async fn set_default(
        &self,
        args: SetDefaultArgs,
    ) -> Result<capreg_core::CapabilityDefault, RepositoryError>;

    /// Every major with a `CapabilityDefault` row under `capability_id`, in
    /// any environment (`spec.md` §3: `env` is free-form, not a fixed set).
    async fn get_default_majors_for_capability(
        &self,
        capability_id: &str,
    ) -> Result<std::collections::HashSet<u32>, RepositoryError>;

    /// Tenant rules for a capability matching `ctx`, priority ascending.
    async fn get_tenant_rules(
        &self,
        capability_id: &str,
        ctx: &capreg_core::ResolutionContext,
    ) -> Result<Vec<capreg_core::TenantRule>, RepositoryError>;

    /// Increment and return a capability's revision counter.
    async fn increment_revision(&self, capability_id: &str) -> Result<u64, RepositoryError>;

    /// Look up a [`capreg_core::RegistryAlias`] by its alias name.
    async fn get_registry_by_alias(
        &self,
        alias: &str,
    ) -> Result<Option<capreg_core::RegistryAlias>, RepositoryError>;

    /// The registry alias flagged `is_default`, if any is configured.
    async fn get_default_registry(
        &self,
    ) -> Result<Option<capreg_core::RegistryAlias>, RepositoryError>;

    /// Every configured sibling registry alias.
    async fn list_registries(&self) -> Result<Vec<capreg_core::RegistryAlias>, RepositoryError>;

    /// Flattened `{app, name, default_major, version_string, version_id,
    /// version_status}` rows used to assemble a bootstrap snapshot
    /// (`spec.md` §4.7).
    async fn list_bootstrap_entries(
        &self,
        env: &str,
    ) -> Result<Vec<BootstrapEntry>, RepositoryError>;
}
