//! An in-memory [`Bus`] over `tokio::sync::broadcast`, used by every test in
//! the workspace and by `capreg-cli`'s local mode. Grounded on the
//! teacher's `abp-runtime::bus::EventBus`: a broadcast sender per topic,
//! counting (rather than failing) when a publish has no subscribers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::BroadcastStream;

use crate::{Bus, BusError, Message};

const CHANNEL_CAPACITY: usize = 1024;

/// The shared state behind every [`InProcessBus`] handle cloned from the
/// same broker — analogous to a single embedded NATS server process.
/// Multiple handles over the same broker simulate distinct bus clients
/// talking to the same transport, which the federation pool's tests use to
/// stand in for a remote registry without a real network hop.
pub struct InProcessBroker {
    channels: RwLock<HashMap<String, broadcast::Sender<Message>>>,
}

impl InProcessBroker {
    /// Create a new, empty broker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: RwLock::new(HashMap::new()),
        })
    }

    async fn sender(&self, subject: &str) -> broadcast::Sender<Message> {
        if let Some(tx) = self.channels.read().await.get(subject) {
            return tx.clone();
        }
        let mut channels = self.channels.write().await;
        if let Some(tx) = channels.get(subject) {
            return tx.clone();
        }
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        channels.insert(subject.to_string(), tx.clone());
        tx
    }
}

/// A [`Bus`] handle over a shared [`InProcessBroker`].
#[derive(Clone)]
pub struct InProcessBus {
    broker: Arc<InProcessBroker>,
}

impl InProcessBus {
    /// Build a new handle sharing `broker`'s channel table.
    #[must_use]
    pub fn new(broker: Arc<InProcessBroker>) -> Self {
        Self { broker }
    }

    /// Convenience constructor: a handle over a fresh, private broker.
    #[must_use]
    pub fn standalone() -> Self {
        Self::new(InProcessBroker::new())
    }
}

#[async_trait]
impl Bus for InProcessBus {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        let msg = Message {
            subject: subject.to_string(),
            payload,
            reply_to: None,
        };
        // A publish with no subscribers is not an error: `send` only fails
        // when the receiver count is zero, which is the common case for a
        // change-event subject nobody happens to be watching yet.
        let _ = self.broker.sender(subject).await.send(msg);
        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<BoxStream<'static, Message>, BusError> {
        let rx = self.broker.sender(subject).await.subscribe();
        let stream = BroadcastStream::new(rx).filter_map(|item| async move { item.ok() });
        Ok(Box::pin(stream))
    }

    async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, BusError> {
        let inbox = format!("_INBOX.{}", uuid::Uuid::new_v4());
        let mut replies = self.subscribe(&inbox).await?;

        let msg = Message {
            subject: subject.to_string(),
            payload,
            reply_to: Some(inbox),
        };
        self.broker
            .sender(subject)
            .await
            .send(msg)
            .map_err(|_| BusError::Request("no subscriber on request subject".into()))?;

        match tokio::time::timeout(timeout, replies.next()).await {
            Ok(Some(reply)) => Ok(reply.payload),
            Ok(None) => Err(BusError::ConnectionClosed),
            Err(_) => Err(BusError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_with_no_subscribers_is_not_an_error() {
        let bus = InProcessBus::standalone();
        bus.publish("no.one.listening", Bytes::from_static(b"hi"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn subscribe_receives_published_messages() {
        let bus = InProcessBus::standalone();
        let mut sub = bus.subscribe("topic.a").await.unwrap();
        bus.publish("topic.a", Bytes::from_static(b"payload"))
            .await
            .unwrap();
        let msg = sub.next().await.unwrap();
        assert_eq!(msg.payload, Bytes::from_static(b"payload"));
    }

    #[tokio::test]
    async fn request_reply_round_trips() {
        let broker = InProcessBroker::new();
        let server = InProcessBus::new(broker.clone());
        let client = InProcessBus::new(broker);

        let mut inbound = server.subscribe("svc.request").await.unwrap();
        tokio::spawn(async move {
            let req = inbound.next().await.unwrap();
            let reply_to = req.reply_to.unwrap();
            server
                .publish(&reply_to, Bytes::from_static(b"reply"))
                .await
                .unwrap();
        });

        let reply = client
            .request(
                "svc.request",
                Bytes::from_static(b"req"),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(reply, Bytes::from_static(b"reply"));
    }

    #[tokio::test]
    async fn request_times_out_with_no_responder() {
        let bus = InProcessBus::standalone();
        let err = bus
            .request(
                "nobody.home",
                Bytes::from_static(b"req"),
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::Request(_)));
    }
}
