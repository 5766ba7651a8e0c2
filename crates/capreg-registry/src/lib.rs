// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! capreg-registry
//!
//! The registry core (`spec.md` §4.3, component C4): the eight operations
//! (`resolve`, `discover`, `describe`, `upsert`, `setDefaultMajor`,
//! `deprecate`, `disable`, `listMajors`) plus `health` (§4.3.8, C10) and the
//! bootstrap snapshot assembler (§4.7, C9). Every operation is a method on
//! [`RegistryCore`], taking a request struct and returning `Result<Output,
//! RegistryError>` — the shape the teacher's `abp-runtime::Runtime` uses for
//! its own `execute`/`stream` entry points, generalized from one dispatch
//! method to eight named operations plus two ambient ones.

mod bootstrap;
mod describe;
mod discover;
mod health;
mod lifecycle;
mod majors;
mod resolve;
mod shared;
mod upsert;

pub use bootstrap::{BootstrapCapabilityEntry, BootstrapRequest, BootstrapSnapshot};
pub use describe::{DescribeRequest, DescribeOutput};
pub use discover::{DiscoverFilters, DiscoverItem, DiscoverRequest, DiscoverOutput};
pub use health::HealthOutput;
pub use lifecycle::{
    DeprecateOrDisableRequest, LifecycleOutput, SetDefaultMajorOutput, SetDefaultMajorRequest,
};
pub use majors::{ListMajorsOutput, ListMajorsRequest, MajorSummary};
pub use resolve::{ResolveOutput, ResolveRequest};
pub use shared::{MethodDetail, MethodSchemaPair, MethodSummary, VersionSummary};
pub use upsert::{MethodInput, UpsertOutput, UpsertRequest, VersionInput};

use std::sync::Arc;

use capreg_core::{Federator, ResolutionContext};
use capreg_events::EventPublisher;
use capreg_repo::Repository;

/// The eight registry operations, health, and bootstrap, bound to a
/// [`Repository`], an [`EventPublisher`], an optional [`Federator`] (absent
/// in a deployment with no sibling registries configured), and a
/// [`capreg_config::RegistryConfig`].
///
/// Generic over `R`/`P` (rather than trait objects) so a caller that only
/// ever runs against one concrete repository/publisher pair — the common
/// case — pays no dynamic dispatch cost; `Federator` stays a trait object
/// since it is already optional and the federation pool's own generic
/// parameters (`BusConnector`) would otherwise leak into every call site
/// that touches `RegistryCore`.
pub struct RegistryCore<R: Repository, P: EventPublisher> {
    repo: Arc<R>,
    events: Arc<P>,
    federator: Option<Arc<dyn Federator>>,
    config: capreg_config::RegistryConfig,
}

impl<R: Repository, P: EventPublisher> RegistryCore<R, P> {
    /// Build a registry core over `repo`/`events`, with no federation
    /// configured (every alias resolves locally or fails `UNKNOWN_ALIAS`).
    #[must_use]
    pub fn new(repo: Arc<R>, events: Arc<P>, config: capreg_config::RegistryConfig) -> Self {
        Self {
            repo,
            events,
            federator: None,
            config,
        }
    }

    /// Attach a [`Federator`] so non-default aliases are forwarded
    /// (`spec.md` §4.3.1 step 1) instead of resolved locally.
    #[must_use]
    pub fn with_federator(mut self, federator: Arc<dyn Federator>) -> Self {
        self.federator = Some(federator);
        self
    }

    /// The registry's own default alias: the [`capreg_core::RegistryAlias`]
    /// flagged `is_default`, or else the literal `"main"` (`spec.md` §3).
    async fn default_alias(&self) -> Result<String, capreg_core::RegistryError> {
        match self.repo.get_default_registry().await {
            Ok(Some(alias)) => Ok(alias.alias),
            Ok(None) => Ok(capreg_core::DEFAULT_ALIAS.to_string()),
            Err(e) => Err(capreg_core::RegistryError::internal(e.to_string())),
        }
    }
}

/// Re-exported so callers building a [`ResolveRequest`]/`DiscoverRequest`
/// etc. don't need a separate `capreg-core` import purely for this type.
pub type Ctx = ResolutionContext;
