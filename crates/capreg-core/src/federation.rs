//! The federation seam the registry core dispatches through (`spec.md` §4.6,
//! component C6), expressed as a trait so `capreg-registry` never has to
//! depend on the concrete connection-pool crate — only on this contract and
//! the wire shape of a remote reply. Mirrors the way the core already
//! depends on `Repository`/`Bus`/`EventPublisher` as traits rather than
//! concrete implementations.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::envelope::RequestContext;
use crate::RegistryError;

/// The fields of a remote `resolve` reply the local registry carries
/// verbatim into its own response; `natsUrl` and `canonicalIdentity` are
/// derived locally from the alias, never taken from the remote
/// (`spec.md` §4.6 step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedResolveReply {
    /// Subject the remote registry expects requests for this version on.
    pub subject: String,
    /// The remote's resolved version string.
    pub resolved_version: String,
    /// The remote's resolved major.
    pub major: u32,
    /// The remote version's lifecycle status.
    pub status: String,
    /// The remote's advertised cache TTL, in seconds.
    pub ttl_seconds: u64,
    /// The remote's etag for this resolution.
    pub etag: String,
}

/// Forwards a `resolve` to a sibling registry named by alias.
#[async_trait]
pub trait Federator: Send + Sync {
    /// Forward `cap` (with optional version override `ver`) to `alias`,
    /// carrying `ctx` and aborting once `deadline` elapses.
    ///
    /// Implementations must map an unknown alias to
    /// [`crate::ErrorCode::UnknownAlias`] and any transport failure to
    /// [`crate::ErrorCode::RegistryUnavailable`], propagating a structured
    /// remote error verbatim.
    async fn resolve(
        &self,
        alias: &str,
        cap: &str,
        ver: Option<&str>,
        ctx: Option<RequestContext>,
        deadline: Duration,
    ) -> Result<FederatedResolveReply, RegistryError>;
}
