// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! capreg-daemon
//!
//! Wires [`capreg_registry::RegistryCore`] to a live NATS connection and
//! runs its two bus subscriptions (`spec.md` §4.7, components C8/C9):
//! the registry subject, where every message is dispatched on its own
//! task, and the fixed bootstrap subject, answered synchronously.
//!
//! Grounded on the teacher's `abp-daemon::main` for the overall
//! construct-then-serve shape, generalized from binding an Axum HTTP
//! listener to subscribing a bus client — the registry's actual
//! transport (`spec.md` §6).

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use capreg_bus::nats::NatsBus;
use capreg_bus::Bus;
use capreg_config::RegistryConfig;
use capreg_core::RequestEnvelope;
use capreg_events::BusEventPublisher;
use capreg_federation::{BusFederator, FederationPool, NatsConnector};
use capreg_protocol::{decode_envelope, validate, Dispatcher};
use capreg_registry::{BootstrapRequest, RegistryCore};
use capreg_repo::memory::InMemoryRepository;
use futures::StreamExt;
use tracing::{error, info, warn};

/// A running daemon: its two subscription tasks and the federator they
/// share, kept alive until [`Daemon::shutdown`] is called.
pub struct Daemon {
    registry_handle: tokio::task::JoinHandle<()>,
    bootstrap_handle: tokio::task::JoinHandle<()>,
    federator: Arc<BusFederator<InMemoryRepository, NatsConnector>>,
}

impl Daemon {
    /// Connect to NATS, build the registry core, and subscribe both
    /// subjects (`spec.md` §4.7). The repository backing this daemon is
    /// the in-memory reference implementation (`spec.md` has no
    /// persistence requirement; see `DESIGN.md`).
    pub async fn start(config: RegistryConfig) -> Result<Self> {
        let client_name = format!("{}-daemon", config.service_name);
        let bus: Arc<dyn Bus> = Arc::new(
            NatsBus::connect(&config.nats_url, &client_name, 5, std::time::Duration::from_secs(2))
                .await
                .with_context(|| format!("connect to {}", config.nats_url))?,
        );

        let repo = Arc::new(InMemoryRepository::new());
        let events = Arc::new(BusEventPublisher::new(
            bus.clone(),
            config.change_event_subject.clone(),
        ));

        let pool = FederationPool::new(NatsConnector);
        let federator = Arc::new(BusFederator::new(repo.clone(), pool));

        let registry = Arc::new(
            RegistryCore::new(repo, events, config.clone())
                .with_federator(federator.clone() as Arc<dyn capreg_core::Federator>),
        );
        let dispatcher = Arc::new(Dispatcher::new(registry.clone(), config.clone()));

        let registry_handle = spawn_registry_subscription(bus.clone(), dispatcher, config.registry_subject.clone()).await?;
        let bootstrap_handle = spawn_bootstrap_subscription(bus, registry, config.bootstrap_subject.clone()).await?;

        Ok(Self {
            registry_handle,
            bootstrap_handle,
            federator,
        })
    }

    /// Tear down both subscriptions and every pooled federation
    /// connection (`spec.md` §5: "torn down on shutdown signal").
    pub async fn shutdown(self) {
        self.registry_handle.abort();
        self.bootstrap_handle.abort();
        self.federator.close_all().await;
        info!("daemon shut down");
    }
}

async fn spawn_registry_subscription<R, P>(
    bus: Arc<dyn Bus>,
    dispatcher: Arc<Dispatcher<R, P>>,
    subject: String,
) -> Result<tokio::task::JoinHandle<()>>
where
    R: capreg_repo::Repository + 'static,
    P: capreg_events::EventPublisher + 'static,
{
    let mut messages = bus
        .subscribe(&subject)
        .await
        .with_context(|| format!("subscribe to registry subject {subject}"))?;
    info!(subject = %subject, "subscribed to registry subject");

    Ok(tokio::spawn(async move {
        while let Some(message) = messages.next().await {
            let bus = bus.clone();
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                handle_registry_message(bus, dispatcher, message).await;
            });
        }
        warn!("registry subscription stream ended");
    }))
}

async fn handle_registry_message<R, P>(
    bus: Arc<dyn Bus>,
    dispatcher: Arc<Dispatcher<R, P>>,
    message: capreg_bus::Message,
) where
    R: capreg_repo::Repository + 'static,
    P: capreg_events::EventPublisher + 'static,
{
    let Some(reply_to) = message.reply_to.clone() else {
        warn!("registry message with no reply-to subject, dropping");
        return;
    };

    let response = match validate::check_payload_size(&message.payload) {
        Err(e) => capreg_core::ResponseEnvelope::err("unknown", &e),
        Ok(()) => match decode_envelope(&message.payload) {
            Ok(envelope) => respond(&dispatcher, envelope).await,
            Err(e) => capreg_core::ResponseEnvelope::err("unknown", &e),
        },
    };

    let Ok(encoded) = serde_json::to_vec(&response) else {
        error!("failed to encode response envelope");
        return;
    };

    if let Err(e) = bus.publish(&reply_to, Bytes::from(encoded)).await {
        warn!(reply_to = %reply_to, error = %e, "failed to publish reply");
    }
}

async fn respond<R, P>(
    dispatcher: &Dispatcher<R, P>,
    envelope: RequestEnvelope,
) -> capreg_core::ResponseEnvelope
where
    R: capreg_repo::Repository + 'static,
    P: capreg_events::EventPublisher + 'static,
{
    dispatcher.dispatch(envelope).await
}

async fn spawn_bootstrap_subscription<R, P>(
    bus: Arc<dyn Bus>,
    registry: Arc<RegistryCore<R, P>>,
    subject: String,
) -> Result<tokio::task::JoinHandle<()>>
where
    R: capreg_repo::Repository + 'static,
    P: capreg_events::EventPublisher + 'static,
{
    let mut messages = bus
        .subscribe(&subject)
        .await
        .with_context(|| format!("subscribe to bootstrap subject {subject}"))?;
    info!(subject = %subject, "subscribed to bootstrap subject");

    Ok(tokio::spawn(async move {
        while let Some(message) = messages.next().await {
            let Some(reply_to) = message.reply_to.clone() else {
                warn!("bootstrap request with no reply-to subject, dropping");
                continue;
            };

            let snapshot = registry
                .bootstrap(BootstrapRequest::default())
                .await
                .unwrap_or_else(|e| {
                    error!(error = %e, "bootstrap assembly failed, answering with an empty snapshot");
                    minimal_snapshot()
                });

            let payload = match serde_json::to_vec(&snapshot) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(error = %e, "failed to encode bootstrap snapshot, answering with an empty snapshot");
                    serde_json::to_vec(&serde_json::json!({"capabilities": {}})).unwrap_or_default()
                }
            };

            if let Err(e) = bus.publish(&reply_to, Bytes::from(payload)).await {
                warn!(reply_to = %reply_to, error = %e, "failed to publish bootstrap reply");
            }
        }
        warn!("bootstrap subscription stream ended");
    }))
}

fn minimal_snapshot() -> capreg_registry::BootstrapSnapshot {
    capreg_registry::BootstrapSnapshot {
        name: String::new(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: None,
        minimum_capabilities: Vec::new(),
        capabilities: Default::default(),
        aliases: Vec::new(),
        registry_aliases: Vec::new(),
        default_alias: capreg_core::DEFAULT_ALIAS.to_string(),
        change_event_subjects: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capreg_bus::inprocess::InProcessBus;
    use capreg_core::RequestContext;
    use capreg_events::InMemoryEventPublisher;
    use std::time::Duration;

    fn test_config() -> RegistryConfig {
        RegistryConfig {
            registry_subject: "test.registry".to_string(),
            bootstrap_subject: "test.bootstrap".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn registry_subscription_answers_a_health_request() {
        let bus: Arc<dyn Bus> = Arc::new(InProcessBus::standalone());
        let config = test_config();
        let repo = Arc::new(InMemoryRepository::new());
        let events = Arc::new(InMemoryEventPublisher::new());
        let registry = Arc::new(RegistryCore::new(repo, events, config.clone()));
        let dispatcher = Arc::new(Dispatcher::new(registry, config.clone()));

        let _handle = spawn_registry_subscription(bus.clone(), dispatcher, config.registry_subject.clone())
            .await
            .unwrap();

        let envelope = RequestEnvelope {
            id: "req-1".to_string(),
            kind: "request".to_string(),
            cap: None,
            method: "health".to_string(),
            params: serde_json::json!({}),
            ctx: Some(RequestContext::default()),
        };
        let payload = serde_json::to_vec(&envelope).unwrap();

        let reply = bus
            .request(&config.registry_subject, Bytes::from(payload), Duration::from_secs(1))
            .await
            .unwrap();
        let response: capreg_core::ResponseEnvelope = serde_json::from_slice(&reply).unwrap();
        assert!(response.ok);
        assert_eq!(response.id, "req-1");
    }

    #[tokio::test]
    async fn bootstrap_subscription_answers_with_a_snapshot() {
        let bus: Arc<dyn Bus> = Arc::new(InProcessBus::standalone());
        let config = test_config();
        let repo = Arc::new(InMemoryRepository::new());
        let events = Arc::new(InMemoryEventPublisher::new());
        let registry = Arc::new(RegistryCore::new(repo, events, config.clone()));

        let _handle = spawn_bootstrap_subscription(bus.clone(), registry, config.bootstrap_subject.clone())
            .await
            .unwrap();

        let reply = bus
            .request(&config.bootstrap_subject, Bytes::from_static(b"{}"), Duration::from_secs(1))
            .await
            .unwrap();
        let snapshot: serde_json::Value = serde_json::from_slice(&reply).unwrap();
        assert!(snapshot.get("capabilities").is_some());
    }
}
