// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! capreg-federation
//!
//! Forwards a `resolve` request to a sibling registry identified by a
//! [`capreg_core::RegistryAlias`] over request/reply (`spec.md` §4.6,
//! component C6). Grounded on the teacher's `abp-host::pool::SidecarPool`
//! for the connection-cache shape ([`pool`]) and on `abp-runtime::multiplex`
//! for the fan-out-free request/reply bookkeeping around a single bus call.

pub mod pool;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use capreg_bus::{Bus, BusError};
use capreg_core::envelope::{RequestContext, RequestEnvelope, ResponseEnvelope};
use capreg_core::federation::{FederatedResolveReply, Federator};
use capreg_core::{ErrorCode, RegistryError};
use capreg_repo::{Repository, RepositoryError};
use serde_json::json;

pub use pool::FederationPool;

/// Opens a connection to a remote bus endpoint, used by [`FederationPool`]
/// on a cache miss or dead connection.
#[async_trait]
pub trait BusConnector: Send + Sync {
    /// Connect to `url`, identifying as `client_name`, retrying up to
    /// `max_reconnects` times spaced `reconnect_wait` apart.
    async fn connect(
        &self,
        url: &str,
        client_name: &str,
        max_reconnects: usize,
        reconnect_wait: Duration,
    ) -> Result<Arc<dyn Bus>, BusError>;
}

/// The production [`BusConnector`]: opens a real `async-nats` connection per alias.
#[derive(Debug, Default, Clone, Copy)]
pub struct NatsConnector;

#[async_trait]
impl BusConnector for NatsConnector {
    async fn connect(
        &self,
        url: &str,
        client_name: &str,
        max_reconnects: usize,
        reconnect_wait: Duration,
    ) -> Result<Arc<dyn Bus>, BusError> {
        let bus = capreg_bus::nats::NatsBus::connect(url, client_name, max_reconnects, reconnect_wait)
            .await?;
        Ok(Arc::new(bus) as Arc<dyn Bus>)
    }
}

/// A test [`BusConnector`] that ignores `url` and hands back a handle onto
/// one shared [`capreg_bus::inprocess::InProcessBroker`], used to simulate a
/// remote registry without a real network hop.
#[derive(Clone)]
pub struct InProcessConnector {
    broker: Arc<capreg_bus::inprocess::InProcessBroker>,
}

impl InProcessConnector {
    /// Build a connector that always resolves to a handle on `broker`.
    #[must_use]
    pub fn new(broker: Arc<capreg_bus::inprocess::InProcessBroker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl BusConnector for InProcessConnector {
    async fn connect(
        &self,
        _url: &str,
        _client_name: &str,
        _max_reconnects: usize,
        _reconnect_wait: Duration,
    ) -> Result<Arc<dyn Bus>, BusError> {
        Ok(Arc::new(capreg_bus::inprocess::InProcessBus::new(
            self.broker.clone(),
        )))
    }
}

/// Binds a [`FederationPool`] to a [`Repository`] (for alias lookup),
/// implementing [`capreg_core::Federator`] so `capreg-registry` can depend
/// on the trait alone rather than this crate's concrete types.
pub struct BusFederator<R: Repository, C: BusConnector> {
    repo: Arc<R>,
    pool: FederationPool<C>,
}

impl<R: Repository, C: BusConnector> BusFederator<R, C> {
    /// Build a federator forwarding through `pool`, looking up aliases via `repo`.
    #[must_use]
    pub fn new(repo: Arc<R>, pool: FederationPool<C>) -> Self {
        Self { repo, pool }
    }

    /// Close every cached connection (`spec.md` §4.6 `CloseAll`), used on shutdown.
    pub async fn close_all(&self) {
        self.pool.close_all().await;
    }
}

#[async_trait]
impl<R: Repository, C: BusConnector> Federator for BusFederator<R, C> {
    async fn resolve(
        &self,
        alias: &str,
        cap: &str,
        ver: Option<&str>,
        ctx: Option<RequestContext>,
        deadline: Duration,
    ) -> Result<FederatedResolveReply, RegistryError> {
        forward_resolve(&self.pool, self.repo.as_ref(), alias, cap, ver, ctx, deadline).await
    }
}

/// Forward a `resolve` for `cap` (with optional version override `ver`) to
/// the sibling registry named by `alias`, looked up via `repo`.
///
/// # Errors
///
/// - [`ErrorCode::UnknownAlias`] if `repo` has no [`capreg_core::RegistryAlias`] for `alias`.
/// - [`ErrorCode::RegistryUnavailable`] if the alias is missing `nats_url`/
///   `registry_subject`, the connection cannot be (re)established, or the
///   remote does not reply within `deadline`.
/// - Whatever structured error the remote registry returned, propagated verbatim.
pub async fn forward_resolve<R: Repository>(
    pool: &FederationPool<impl BusConnector>,
    repo: &R,
    alias: &str,
    cap: &str,
    ver: Option<&str>,
    ctx: Option<RequestContext>,
    deadline: Duration,
) -> Result<FederatedResolveReply, RegistryError> {
    let registry = repo
        .get_registry_by_alias(alias)
        .await
        .map_err(registry_error_from_repo)?
        .ok_or_else(|| RegistryError::new(ErrorCode::UnknownAlias, format!("unknown registry alias {alias:?}")))?;

    let nats_url = registry
        .nats_url
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            RegistryError::new(
                ErrorCode::RegistryUnavailable,
                format!("alias {alias:?} has no nats_url configured"),
            )
        })?;
    let registry_subject = registry
        .registry_subject
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            RegistryError::new(
                ErrorCode::RegistryUnavailable,
                format!("alias {alias:?} has no registry_subject configured"),
            )
        })?;

    let bus = pool.acquire(alias, nats_url).await.map_err(|e| {
        RegistryError::new(
            ErrorCode::RegistryUnavailable,
            format!("could not connect to alias {alias:?}: {e}"),
        )
    })?;

    let request = RequestEnvelope {
        id: next_request_id(),
        kind: "request".to_string(),
        cap: Some(cap.to_string()),
        method: "resolve".to_string(),
        params: json!({ "cap": cap, "ver": ver }),
        ctx,
    };
    let payload = serde_json::to_vec(&request)
        .map(bytes::Bytes::from)
        .map_err(|e| RegistryError::internal(format!("failed to encode federated request: {e}")))?;

    let reply_bytes = bus
        .request(registry_subject, payload, deadline)
        .await
        .map_err(|e| {
            RegistryError::new(
                ErrorCode::RegistryUnavailable,
                format!("federated request to alias {alias:?} failed: {e}"),
            )
        })?;

    let response: ResponseEnvelope = serde_json::from_slice(&reply_bytes).map_err(|e| {
        RegistryError::new(
            ErrorCode::RegistryUnavailable,
            format!("malformed reply from alias {alias:?}: {e}"),
        )
    })?;

    if !response.ok {
        return Err(response.into_registry_error());
    }
    let result = response
        .result
        .ok_or_else(|| RegistryError::internal("federated reply marked ok with no result"))?;
    serde_json::from_value(result)
        .map_err(|e| RegistryError::internal(format!("malformed federated resolve result: {e}")))
}

fn registry_error_from_repo(e: RepositoryError) -> RegistryError {
    RegistryError::internal(e.to_string())
}

fn next_request_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("fed-{millis}-{seq}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use capreg_bus::inprocess::{InProcessBroker, InProcessBus};
    use capreg_core::RegistryAlias;
    use capreg_repo::memory::InMemoryRepository;
    use futures::StreamExt;

    async fn seed_alias(repo: &InMemoryRepository, alias: &str, subject: &str) {
        repo.seed_registry_alias(RegistryAlias {
            id: format!("alias-{alias}"),
            alias: alias.to_string(),
            nats_url: Some("inproc://does-not-matter".to_string()),
            registry_subject: Some(subject.to_string()),
            is_default: false,
            audit: capreg_core::AuditFields::created_now("system", chrono::Utc::now()),
        })
        .await;
    }

    #[tokio::test]
    async fn unknown_alias_yields_unknown_alias_error() {
        let repo = InMemoryRepository::new();
        let broker = InProcessBroker::new();
        let pool = FederationPool::new(InProcessConnector::new(broker));
        let err = forward_resolve(
            &pool,
            &repo,
            "nope",
            "a.b",
            None,
            None,
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownAlias);
    }

    #[tokio::test]
    async fn alias_missing_registry_subject_is_unavailable() {
        let repo = InMemoryRepository::new();
        repo.seed_registry_alias(RegistryAlias {
            id: "alias-partner".into(),
            alias: "partner".into(),
            nats_url: Some("inproc://x".into()),
            registry_subject: None,
            is_default: false,
            audit: capreg_core::AuditFields::created_now("system", chrono::Utc::now()),
        })
        .await;
        let broker = InProcessBroker::new();
        let pool = FederationPool::new(InProcessConnector::new(broker));
        let err = forward_resolve(
            &pool,
            &repo,
            "partner",
            "a.b",
            None,
            None,
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::RegistryUnavailable);
    }

    #[tokio::test]
    async fn successful_forward_returns_remote_fields_verbatim() {
        let repo = InMemoryRepository::new();
        seed_alias(&repo, "partner", "remote.registry.subject").await;

        let broker = InProcessBroker::new();
        let server = InProcessBus::new(broker.clone());
        let mut inbound = server.subscribe("remote.registry.subject").await.unwrap();
        tokio::spawn(async move {
            let msg = inbound.next().await.unwrap();
            let reply_to = msg.reply_to.unwrap();
            let response = ResponseEnvelope::ok(
                "whatever",
                &json!({
                    "subject": "cap.intg.remote_cap.v2",
                    "resolvedVersion": "2.1.0",
                    "major": 2,
                    "status": "active",
                    "ttlSeconds": 300,
                    "etag": "e"
                }),
            );
            let payload = bytes::Bytes::from(serde_json::to_vec(&response).unwrap());
            server.publish(&reply_to, payload).await.unwrap();
        });

        let pool = FederationPool::new(InProcessConnector::new(broker));
        let reply = forward_resolve(
            &pool,
            &repo,
            "partner",
            "intg.remote.cap",
            None,
            None,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(reply.resolved_version, "2.1.0");
        assert_eq!(reply.major, 2);
        assert_eq!(reply.subject, "cap.intg.remote_cap.v2");
    }

    #[tokio::test]
    async fn remote_error_propagates_verbatim() {
        let repo = InMemoryRepository::new();
        seed_alias(&repo, "partner", "remote.registry.subject").await;

        let broker = InProcessBroker::new();
        let server = InProcessBus::new(broker.clone());
        let mut inbound = server.subscribe("remote.registry.subject").await.unwrap();
        tokio::spawn(async move {
            let msg = inbound.next().await.unwrap();
            let reply_to = msg.reply_to.unwrap();
            let response = ResponseEnvelope::err("whatever", &RegistryError::not_found("no such capability"));
            let payload = bytes::Bytes::from(serde_json::to_vec(&response).unwrap());
            server.publish(&reply_to, payload).await.unwrap();
        });

        let pool = FederationPool::new(InProcessConnector::new(broker));
        let err = forward_resolve(
            &pool,
            &repo,
            "partner",
            "intg.remote.cap",
            None,
            None,
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "no such capability");
    }

    #[tokio::test]
    async fn no_responder_times_out_as_unavailable() {
        let repo = InMemoryRepository::new();
        seed_alias(&repo, "partner", "nobody.home").await;
        let broker = InProcessBroker::new();
        let pool = FederationPool::new(InProcessConnector::new(broker));
        let err = forward_resolve(
            &pool,
            &repo,
            "partner",
            "intg.remote.cap",
            None,
            None,
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::RegistryUnavailable);
    }
}
