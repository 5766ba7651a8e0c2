// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! capreg-events
//!
//! The change-event publisher (`spec.md` §4.5, component C5): two
//! best-effort, at-least-once publishes per successful mutation, to the
//! granular and global subjects. Grounded on the teacher's
//! `abp-runtime::bus::EventBus`, which tracks publish/drop counts rather
//! than treating a failed delivery as fatal — the same stance `spec.md` §7
//! takes here ("logged, not surfaced to the caller").

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use capreg_bus::Bus;
use capreg_core::RegistryChanged;
use tokio::sync::Mutex;

/// Publishes a [`RegistryChanged`] event after a mutation commits.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `event`. Never returns an error: failures are logged and
    /// swallowed (`spec.md` §4.5, §7) since the mutation has already
    /// committed by the time this is called.
    async fn publish(&self, event: &RegistryChanged);
}

/// The production [`EventPublisher`]: publishes to both the granular
/// (`registry.changed.{app}.{capability}`) and global (configurable)
/// subjects over a [`Bus`].
pub struct BusEventPublisher {
    bus: Arc<dyn Bus>,
    change_event_subject: String,
}

impl BusEventPublisher {
    /// Build a publisher over `bus`, publishing globally to
    /// `change_event_subject` (`spec.md` §6's `REGISTRY_CHANGE_EVENT_SUBJECT`).
    #[must_use]
    pub fn new(bus: Arc<dyn Bus>, change_event_subject: impl Into<String>) -> Self {
        Self {
            bus,
            change_event_subject: change_event_subject.into(),
        }
    }
}

#[async_trait]
impl EventPublisher for BusEventPublisher {
    async fn publish(&self, event: &RegistryChanged) {
        let payload = match serde_json::to_vec(event) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode RegistryChanged, dropping event");
                return;
            }
        };

        let granular = RegistryChanged::granular_subject(&event.app, &event.capability);
        if let Err(e) = self.bus.publish(&granular, payload.clone()).await {
            tracing::warn!(subject = %granular, error = %e, "granular change-event publish failed");
        }

        if let Err(e) = self.bus.publish(&self.change_event_subject, payload).await {
            tracing::warn!(
                subject = %self.change_event_subject,
                error = %e,
                "global change-event publish failed"
            );
        }
    }
}

/// A recording test double, used by `capreg-registry`'s test suite to
/// assert that exactly one event reaches each subject per mutation
/// (`spec.md` §8).
#[derive(Default)]
pub struct InMemoryEventPublisher {
    events: Mutex<Vec<RegistryChanged>>,
}

impl InMemoryEventPublisher {
    /// An empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far, in publish order.
    pub async fn events(&self) -> Vec<RegistryChanged> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: &RegistryChanged) {
        self.events.lock().await.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capreg_bus::inprocess::InProcessBus;
    use chrono::Utc;
    use futures::StreamExt;

    fn sample_event() -> RegistryChanged {
        RegistryChanged {
            app: "intg".into(),
            capability: "resolve.cap".into(),
            changed_fields: vec!["version".into()],
            new_default_major: None,
            affected_majors: vec![1],
            revision: 1,
            etag: "cap-1-1".into(),
            timestamp: Utc::now(),
            env: None,
        }
    }

    #[tokio::test]
    async fn bus_publisher_sends_to_both_granular_and_global_subjects() {
        let bus = Arc::new(InProcessBus::standalone());
        let mut granular = bus
            .subscribe("registry.changed.intg.resolve.cap")
            .await
            .unwrap();
        let mut global = bus.subscribe("registry.changed").await.unwrap();

        let publisher = BusEventPublisher::new(bus.clone(), "registry.changed");
        publisher.publish(&sample_event()).await;

        let g1 = granular.next().await.unwrap();
        let g2 = global.next().await.unwrap();
        assert_eq!(g1.payload, g2.payload);
    }

    #[tokio::test]
    async fn in_memory_publisher_records_every_event() {
        let publisher = InMemoryEventPublisher::new();
        publisher.publish(&sample_event()).await;
        publisher.publish(&sample_event()).await;
        assert_eq!(publisher.events().await.len(), 2);
    }
}
