//! In-memory pub/sub broker.
//!
//! Behaves like a topic-based broker: every publish is delivered to every
//! current subscriber of the topic, including the publisher itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use grumpybin_test_utils::MockBroker;
//!
//! let broker = MockBroker::builder()
//!     .fail_subscribes(2)
//!     .build();
//!
//! let transport = broker.transport();
//! // Hand `transport` to a ControlPlaneChannel, then:
//! broker.inject(TEST_TOPIC, get_request());
//! let responses = broker.wait_for_responses(1).await;
//! ```

use async_trait::async_trait;
use grumpybin::channel::{InboundMessage, InboundStream, PubSubTransport};
use grumpybin::errors::BinError;
use grumpybin::protocol::{decode, MessageType, WireMessage};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;

/// How long the `wait_for_*` helpers wait before failing the test.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// One message seen on the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct MockBrokerInner {
    subscribers: Vec<(String, mpsc::UnboundedSender<InboundMessage>)>,
    /// Messages published through the transport (not injected ones).
    published: Vec<PublishedMessage>,
    subscribe_calls: usize,
    failing_subscribes: usize,
    fail_publishes: bool,
}

/// Mock broker for control-plane tests.
#[derive(Debug, Clone)]
pub struct MockBroker {
    inner: Arc<Mutex<MockBrokerInner>>,
    /// Bumped on every change tests may wait for.
    changes: Arc<watch::Sender<u64>>,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBroker {
    /// Create a broker that accepts every subscribe and publish.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(MockBrokerInner::default())),
            changes: Arc::new(changes),
        }
    }

    #[must_use]
    pub fn builder() -> MockBrokerBuilder {
        MockBrokerBuilder::default()
    }

    /// The broker as a transport trait object.
    #[must_use]
    pub fn transport(&self) -> Arc<dyn PubSubTransport> {
        Arc::new(self.clone())
    }

    /// Publish as an external client would. Returns the number of receivers.
    pub fn inject(&self, topic: &str, payload: Vec<u8>) -> usize {
        let delivered = self.deliver(topic, &payload);
        self.bump();
        delivered
    }

    /// End every open subscription stream, as a dropped connection would.
    pub fn disconnect_all(&self) {
        self.inner.lock().unwrap().subscribers.clear();
        self.bump();
    }

    /// Open subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.subscribers.retain(|(_, tx)| !tx.is_closed());
        inner.subscribers.iter().filter(|(t, _)| t == topic).count()
    }

    #[must_use]
    pub fn subscribe_calls(&self) -> usize {
        self.inner.lock().unwrap().subscribe_calls
    }

    /// Everything published through the transport, in order.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.inner.lock().unwrap().published.clone()
    }

    /// Published RESPONSE messages, decoded, in order.
    #[must_use]
    pub fn responses(&self) -> Vec<WireMessage> {
        self.published()
            .iter()
            .filter_map(|m| decode(&m.payload).ok())
            .filter(|m| m.kind == MessageType::Response)
            .collect()
    }

    /// Wait until at least `count` responses were published; panics after
    /// [`WAIT_TIMEOUT`].
    pub async fn wait_for_responses(&self, count: usize) -> Vec<WireMessage> {
        self.wait_until(|broker| broker.responses().len() >= count)
            .await;
        self.responses()
    }

    /// Wait until `topic` has at least `count` open subscriptions; panics
    /// after [`WAIT_TIMEOUT`].
    pub async fn wait_for_subscribers(&self, topic: &str, count: usize) {
        self.wait_until(|broker| broker.subscriber_count(topic) >= count)
            .await;
    }

    async fn wait_until(&self, condition: impl Fn(&Self) -> bool) {
        let mut changes = self.changes.subscribe();
        let wait = async {
            loop {
                if condition(self) {
                    return;
                }
                changes.changed().await.expect("change sender lives in self");
            }
        };
        tokio::time::timeout(WAIT_TIMEOUT, wait)
            .await
            .expect("timed out waiting for mock broker condition");
    }

    fn deliver(&self, topic: &str, payload: &[u8]) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.subscribers.retain(|(_, tx)| !tx.is_closed());
        inner
            .subscribers
            .iter()
            .filter(|(t, _)| t == topic)
            .filter(|(_, tx)| {
                tx.send(InboundMessage {
                    topic: topic.to_string(),
                    payload: payload.to_vec(),
                })
                .is_ok()
            })
            .count()
    }

    fn bump(&self) {
        self.changes.send_modify(|n| *n += 1);
    }
}

#[async_trait]
impl PubSubTransport for MockBroker {
    async fn subscribe(&self, topic: &str) -> Result<InboundStream, BinError> {
        let stream = {
            let mut inner = self.inner.lock().unwrap();
            inner.subscribe_calls += 1;

            if inner.failing_subscribes > 0 {
                inner.failing_subscribes -= 1;
                None
            } else {
                let (tx, rx) = mpsc::unbounded_channel();
                inner.subscribers.push((topic.to_string(), tx));
                Some(rx)
            }
        };
        self.bump();

        match stream {
            Some(rx) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            None => Err(BinError::Transport("mock broker refused subscribe".to_string())),
        }
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BinError> {
        if self.inner.lock().unwrap().fail_publishes {
            return Err(BinError::Transport("mock broker refused publish".to_string()));
        }

        self.deliver(topic, &payload);
        self.inner.lock().unwrap().published.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        self.bump();
        Ok(())
    }
}

/// Builder for MockBroker failure scenarios.
#[derive(Debug, Default)]
pub struct MockBrokerBuilder {
    failing_subscribes: usize,
    fail_publishes: bool,
}

impl MockBrokerBuilder {
    /// Refuse the first `count` subscribe attempts.
    #[must_use]
    pub fn fail_subscribes(mut self, count: usize) -> Self {
        self.failing_subscribes = count;
        self
    }

    /// Refuse every publish.
    #[must_use]
    pub fn fail_publishes(mut self) -> Self {
        self.fail_publishes = true;
        self
    }

    #[must_use]
    pub fn build(self) -> MockBroker {
        let broker = MockBroker::new();
        {
            let mut inner = broker.inner.lock().unwrap();
            inner.failing_subscribes = self.failing_subscribes;
            inner.fail_publishes = self.fail_publishes;
        }
        broker
    }
}
