// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0

// In-Memory Broker - Pub/Sub for channel envelopes
//
// Provides in-process message delivery using tokio broadcast channels.
// Each subscriber filters the shared stream by its own topic filters.
// Sessions carry an optional last will that is published if the session is
// dropped without a graceful disconnect.
//
// In-memory only: messages published before a subscription exists are not
// replayed.

use crate::domain::config::DEFAULT_BROKER_CAPACITY;
use crate::domain::payload::Envelope;
use crate::domain::topic::TopicFilter;
use crate::domain::transport::{Inbox, Transport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Shared publish/subscribe hub.
#[derive(Clone)]
pub struct InMemoryBroker {
    sender: Arc<broadcast::Sender<Envelope>>,
}

impl InMemoryBroker {
    /// Capacity bounds how many messages each subscriber may fall behind
    /// before the oldest are dropped for it.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_BROKER_CAPACITY)
    }

    /// Open a client session, registering an optional last will.
    pub fn connect(&self, client_id: impl Into<String>, will: Option<Envelope>) -> BrokerSession {
        let client_id = client_id.into();
        debug!("Client connected: {}", client_id);
        BrokerSession {
            client_id,
            broker: self.clone(),
            will: Mutex::new(will),
        }
    }

    pub fn publish(&self, envelope: Envelope) {
        debug!("Publishing on {}", envelope.topic);
        let receiver_count = self.sender.send(envelope).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening");
        }
    }

    pub fn subscribe(&self, filters: Vec<TopicFilter>) -> FilteredReceiver {
        FilteredReceiver {
            receiver: self.sender.subscribe(),
            filters,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// One client's connection to the broker.
pub struct BrokerSession {
    client_id: String,
    broker: InMemoryBroker,
    will: Mutex<Option<Envelope>>,
}

impl BrokerSession {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Drop the connection abruptly; the last will is published.
    pub fn abort(self) {
        drop(self);
    }
}

impl Transport for BrokerSession {
    fn publish(&self, envelope: Envelope) {
        self.broker.publish(envelope);
    }

    fn subscribe(&self, filters: Vec<TopicFilter>) -> Box<dyn Inbox> {
        Box::new(self.broker.subscribe(filters))
    }

    fn disconnect(&self) {
        if self.will.lock().take().is_some() {
            debug!("Client {} disconnected gracefully, last will discarded", self.client_id);
        }
    }
}

impl Drop for BrokerSession {
    fn drop(&mut self) {
        if let Some(will) = self.will.get_mut().take() {
            warn!("Client {} dropped without disconnect, publishing last will", self.client_id);
            self.broker.publish(will);
        }
    }
}

/// Subscriber view of the shared stream, filtered by topic.
pub struct FilteredReceiver {
    receiver: broadcast::Receiver<Envelope>,
    filters: Vec<TopicFilter>,
}

impl FilteredReceiver {
    fn accepts(&self, envelope: &Envelope) -> bool {
        self.filters.iter().any(|f| f.matches(&envelope.topic))
    }

    /// Next matching message without waiting. Returns `Ok(None)` when nothing
    /// matching is buffered.
    pub fn try_recv(&mut self) -> Result<Option<Envelope>, TransportError> {
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) if self.accepts(&envelope) => return Ok(Some(envelope)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(TransportError::Closed),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Subscriber lagged by {} messages", n);
                    return Err(TransportError::Lagged(n));
                }
            }
        }
    }
}

#[async_trait]
impl Inbox for FilteredReceiver {
    async fn recv(&mut self) -> Result<Envelope, TransportError> {
        loop {
            let envelope = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => TransportError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!("Subscriber lagged by {} messages", n);
                    TransportError::Lagged(n)
                }
            })?;

            if self.accepts(&envelope) {
                return Ok(envelope);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broker_filters_by_topic() {
        let broker = InMemoryBroker::new(16);
        let mut beliefs = broker.subscribe(vec![TopicFilter::new("belief/+/+")]);

        broker.publish(Envelope::new("alert/sector1/a", "{}"));
        broker.publish(Envelope::new("belief/sector1/a", "{}"));

        let received = beliefs.recv().await.unwrap();
        assert_eq!(received.topic, "belief/sector1/a");
        assert_eq!(beliefs.try_recv().unwrap(), None);
    }

    #[tokio::test]
    async fn test_default_broker_buffers_configured_capacity() {
        let broker = InMemoryBroker::default();
        let mut all = broker.subscribe(vec![TopicFilter::new("#")]);
        for n in 0..DEFAULT_BROKER_CAPACITY {
            broker.publish(Envelope::new(format!("status/pending/a{n}"), "{}"));
        }
        assert_eq!(all.recv().await.unwrap().topic, "status/pending/a0");
    }

    #[tokio::test]
    async fn test_multiple_subscribers_each_receive() {
        let broker = InMemoryBroker::new(16);
        let mut first = broker.subscribe(vec![TopicFilter::new("#")]);
        let mut second = broker.subscribe(vec![TopicFilter::new("status/#")]);
        assert_eq!(broker.subscriber_count(), 2);

        broker.publish(Envelope::new("status/pending/a", "{}"));

        assert_eq!(first.recv().await.unwrap().topic, "status/pending/a");
        assert_eq!(second.recv().await.unwrap().topic, "status/pending/a");
    }

    #[tokio::test]
    async fn test_last_will_published_on_abrupt_drop() {
        let broker = InMemoryBroker::new(16);
        let mut status = broker.subscribe(vec![TopicFilter::new("status/#")]);

        let session = broker.connect("a", Some(Envelope::new("status/sector1/a", "will")));
        session.abort();

        let will = status.recv().await.unwrap();
        assert_eq!(will.payload, bytes::Bytes::from_static(b"will"));
    }

    #[tokio::test]
    async fn test_graceful_disconnect_discards_will() {
        let broker = InMemoryBroker::new(16);
        let mut status = broker.subscribe(vec![TopicFilter::new("status/#")]);

        let session = broker.connect("a", Some(Envelope::new("status/sector1/a", "will")));
        session.disconnect();
        drop(session);

        assert_eq!(status.try_recv().unwrap(), None);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_reports_loss() {
        let broker = InMemoryBroker::new(2);
        let mut slow = broker.subscribe(vec![TopicFilter::new("#")]);
        for i in 0..5 {
            broker.publish(Envelope::new(format!("data/sector1/{}", i), "{}"));
        }
        assert!(matches!(slow.recv().await, Err(TransportError::Lagged(_))));
        assert!(slow.recv().await.is_ok());
    }
}
