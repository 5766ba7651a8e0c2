//! `discover` (`spec.md` §4.3.2): a paginated capability listing.

use capreg_core::{CapabilityStatus, ResolutionContext};
use capreg_core::{ErrorCode, RegistryError};
use capreg_events::EventPublisher;
use capreg_repo::{CapabilityFilters, Repository};
use serde::Serialize;
use tracing::instrument;

use crate::shared::effective_env;
use crate::RegistryCore;

/// Filters accepted by [`DiscoverRequest`], mirroring `spec.md` §4.3.2.
#[derive(Debug, Clone, Default)]
pub struct DiscoverFilters {
    /// Restrict to one `app`.
    pub app: Option<String>,
    /// Capability must carry every tag listed here.
    pub tags: Vec<String>,
    /// Free-text match against `app`/`name`/`description`.
    pub query: Option<String>,
    /// Status filter; `None` defaults to `Active`-only, `Some("all")`
    /// disables filtering.
    pub status: Option<String>,
    /// Restrict to capabilities exposing a method with this name.
    pub supports_method: Option<String>,
}

impl From<DiscoverFilters> for CapabilityFilters {
    fn from(f: DiscoverFilters) -> Self {
        Self {
            app: f.app,
            tags: f.tags,
            query: f.query,
            status: f.status,
            supports_method: f.supports_method,
        }
    }
}

/// Input to [`RegistryCore::discover`].
#[derive(Debug, Clone)]
pub struct DiscoverRequest {
    /// Capability filters.
    pub filters: DiscoverFilters,
    /// Caller context; only `env` is consulted, for default-major lookup.
    pub ctx: Option<ResolutionContext>,
    /// 1-based page number; clamped up to 1.
    pub page: u32,
    /// Page size; clamped to `[1, 500]`.
    pub limit: u32,
}

impl Default for DiscoverRequest {
    fn default() -> Self {
        Self {
            filters: DiscoverFilters::default(),
            ctx: None,
            page: 1,
            limit: 20,
        }
    }
}

/// A single capability row in a [`DiscoverOutput`] page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverItem {
    /// Canonical `"app.name"` reference.
    pub cap: String,
    /// Application/namespace component.
    pub app: String,
    /// Name component.
    pub name: String,
    /// Free-form human description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form classification tags.
    pub tags: Vec<String>,
    /// The default major for this capability in the requested environment.
    pub default_major: u32,
    /// The highest-precedence version string present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
    /// Distinct majors present, descending.
    pub majors: Vec<u32>,
    /// Capability lifecycle status.
    pub status: CapabilityStatus,
}

/// Output of [`RegistryCore::discover`] (`spec.md` §4.3.2).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverOutput {
    /// This page's rows.
    pub items: Vec<DiscoverItem>,
    /// 1-based page number actually served.
    pub page: u32,
    /// Page size actually served.
    pub limit: u32,
    /// Total rows matching the filters, across all pages.
    pub total: u64,
    /// `ceil(total / limit)`.
    pub total_pages: u64,
}

impl<R: Repository, P: EventPublisher> RegistryCore<R, P> {
    /// Page through capabilities matching `req.filters` (`spec.md` §4.3.2).
    ///
    /// Loads versions and defaults for the whole page in two batched reads
    /// rather than once per capability, per the spec's explicit batching
    /// requirement.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::InternalError`] on a repository failure.
    #[instrument(skip(self, req))]
    pub async fn discover(&self, req: DiscoverRequest) -> Result<DiscoverOutput, RegistryError> {
        let page = req.page.max(1);
        let limit = req.limit.clamp(1, 500);
        let env = effective_env(
            req.ctx.as_ref().and_then(|c| c.env.as_deref()),
            &self.config.default_env,
        );

        let (capabilities, total) = self
            .repo
            .list_capabilities(&req.filters.into(), page, limit)
            .await
            .map_err(|e| RegistryError::new(ErrorCode::InternalError, e.to_string()))?;

        let cap_ids: Vec<String> = capabilities.iter().map(|c| c.id.clone()).collect();
        let versions_by_cap = self
            .repo
            .get_versions_by_capability_ids(&cap_ids)
            .await
            .map_err(|e| RegistryError::new(ErrorCode::InternalError, e.to_string()))?;
        let defaults_by_cap = self
            .repo
            .get_defaults_batch(&cap_ids, &env)
            .await
            .map_err(|e| RegistryError::new(ErrorCode::InternalError, e.to_string()))?;

        let items = capabilities
            .into_iter()
            .map(|cap| {
                let versions = versions_by_cap.get(&cap.id).cloned().unwrap_or_default();
                let majors = capreg_semver::unique_majors(&versions);
                let latest_version = versions.first().map(|v| v.version_string.clone());
                // spec.md §9: preserved verbatim as a fallback, including the
                // `1` default when neither a Default row nor any Version exists.
                let default_major = defaults_by_cap
                    .get(&cap.id)
                    .map(|d| d.default_major)
                    .or_else(|| majors.first().copied())
                    .unwrap_or(1);
                DiscoverItem {
                    cap: format!("{}.{}", cap.app, cap.name),
                    app: cap.app,
                    name: cap.name,
                    description: cap.description,
                    tags: cap.tags,
                    default_major,
                    latest_version,
                    majors,
                    status: cap.status,
                }
            })
            .collect();

        Ok(DiscoverOutput {
            items,
            page,
            limit,
            total,
            total_pages: total.div_ceil(u64::from(limit)),
        })
    }
}
