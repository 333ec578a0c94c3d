//! Control-plane channel.
//!
//! Subscribes to one topic, dispatches every REQUEST it sees and publishes
//! the response back to the same topic. Responses (including our own echoes)
//! and untyped messages are ignored; undecodable payloads are logged and
//! dropped without a reply.
//!
//! # Delivery
//!
//! Publishing is fire-and-forget: a failed publish is logged and counted,
//! never retried. When the inbound stream ends or subscribing fails, the
//! channel waits `resubscribe_backoff` and subscribes again, until cancelled.
//! Messages published while disconnected are lost (at-most-once).

pub mod mqtt;
pub mod redis;

pub use self::mqtt::MqttTransport;
pub use self::redis::RedisTransport;

use crate::errors::BinError;
use crate::observability::metrics;
use crate::protocol::{decode, encode, Command, CommandDispatcher, Response};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// One message received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Stream of inbound messages for one subscription.
pub type InboundStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// Pub/sub transport boundary.
///
/// Connection management is the transport's business; the channel only
/// subscribes, reads the stream until it ends, and publishes.
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    /// Subscribe to `topic`. The stream ends when the subscription is lost.
    async fn subscribe(&self, topic: &str) -> Result<InboundStream, BinError>;

    /// Publish `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BinError>;
}

/// Why a subscription stopped being consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    Cancelled,
    Closed,
}

/// Pub/sub session wrapping the dispatcher.
pub struct ControlPlaneChannel {
    transport: Arc<dyn PubSubTransport>,
    dispatcher: CommandDispatcher,
    topic: String,
    resubscribe_backoff: Duration,
}

impl ControlPlaneChannel {
    #[must_use]
    pub fn new(
        transport: Arc<dyn PubSubTransport>,
        dispatcher: CommandDispatcher,
        topic: impl Into<String>,
        resubscribe_backoff: Duration,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            topic: topic.into(),
            resubscribe_backoff,
        }
    }

    /// Topic this channel serves.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Run the subscribe/consume loop until `cancel_token` fires.
    ///
    /// Never exits on transport errors - keeps resubscribing.
    #[instrument(skip_all, name = "grumpybin.channel", fields(topic = %self.topic))]
    pub async fn run(self, cancel_token: CancellationToken) {
        info!(target: "grumpybin.channel", "Control-plane channel starting");

        loop {
            let subscribed = tokio::select! {
                () = cancel_token.cancelled() => break,
                result = self.transport.subscribe(&self.topic) => result,
            };

            match subscribed {
                Ok(stream) => {
                    info!(target: "grumpybin.channel", "Subscribed to topic");
                    if self.consume(stream, &cancel_token).await == StreamEnd::Cancelled {
                        break;
                    }
                    warn!(target: "grumpybin.channel", "Subscription stream closed, will resubscribe");
                }
                Err(e) => {
                    warn!(
                        target: "grumpybin.channel",
                        error = %e,
                        "Subscribe failed, will retry"
                    );
                }
            }

            tokio::select! {
                () = cancel_token.cancelled() => break,
                () = tokio::time::sleep(self.resubscribe_backoff) => {}
            }
        }

        info!(target: "grumpybin.channel", "Control-plane channel stopped");
    }

    async fn consume(&self, mut stream: InboundStream, cancel_token: &CancellationToken) -> StreamEnd {
        loop {
            tokio::select! {
                () = cancel_token.cancelled() => return StreamEnd::Cancelled,
                next = stream.next() => match next {
                    Some(message) => {
                        self.handle_payload(&message.payload).await;
                    }
                    None => return StreamEnd::Closed,
                },
            }
        }
    }

    /// Handle one inbound payload.
    ///
    /// Returns the response that was published, if the payload was a request.
    pub async fn handle_payload(&self, payload: &[u8]) -> Option<Response> {
        let message = match decode(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    target: "grumpybin.channel",
                    error = %e,
                    payload_len = payload.len(),
                    "Dropping undecodable message"
                );
                metrics::record_decode_failure();
                return None;
            }
        };

        debug!(target: "grumpybin.channel", message = %message, "Received message");

        let Some(command) = Command::from_wire(message) else {
            debug!(target: "grumpybin.channel", "Ignoring non-request message");
            return None;
        };

        let response = self.dispatcher.dispatch(command).await;
        self.publish(&response).await;
        Some(response)
    }

    async fn publish(&self, response: &Response) {
        let payload = match encode(&response.to_wire()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target: "grumpybin.channel", error = %e, "Failed to encode response");
                metrics::record_publish_failure();
                return;
            }
        };

        if let Err(e) = self.transport.publish(&self.topic, payload).await {
            warn!(target: "grumpybin.channel", error = %e, "Failed to publish response");
            metrics::record_publish_failure();
            return;
        }

        debug!(
            target: "grumpybin.channel",
            status = ?response.status,
            "Published response"
        );
    }
}
