//! MQTT transport.
//!
//! Every subscription opens a fresh clean session: a new client and event
//! loop are created, the loop is driven until the broker acknowledges the
//! subscription, and from then on the inbound stream owns the loop. The
//! stream ends on the first connection error so the channel's own backoff
//! decides when to reconnect.
//!
//! Publishing goes through the client of the current session. Requests are
//! queued on the client and leave the socket the next time the inbound
//! stream is polled.
//!
//! # Usage
//!
//! ```rust,ignore
//! let transport = MqttTransport::new("localhost", 1883);
//! let mut stream = transport.subscribe("grumpybin/lines").await?;
//! ```

use super::{InboundMessage, InboundStream, PubSubTransport};
use crate::errors::BinError;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeReasonCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Keep-alive interval negotiated with the broker.
const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Capacity of the client's request queue.
const REQUEST_QUEUE_CAPACITY: usize = 64;

/// MQTT-backed [`PubSubTransport`].
#[derive(Clone)]
pub struct MqttTransport {
    options: MqttOptions,
    /// Client of the current session, `None` until the first subscribe.
    session: Arc<RwLock<Option<AsyncClient>>>,
}

impl MqttTransport {
    /// Create a transport for the broker at `host:port`.
    ///
    /// Nothing is connected until [`PubSubTransport::subscribe`] is called.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let client_id = format!("grumpybin-{:08x}", rand::random::<u32>());
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);

        Self {
            options,
            session: Arc::new(RwLock::new(None)),
        }
    }

    /// Client id presented to the broker.
    #[must_use]
    pub fn client_id(&self) -> String {
        self.options.client_id()
    }
}

/// Drive `eventloop` until the broker acknowledges the subscription.
async fn await_suback(eventloop: &mut EventLoop, topic: &str) -> Result<(), BinError> {
    loop {
        match eventloop.poll().await? {
            Event::Incoming(Packet::ConnAck(ack)) => {
                debug!(target: "grumpybin.channel.mqtt", code = ?ack.code, "Connected");
            }
            Event::Incoming(Packet::SubAck(ack)) => {
                if ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure))
                {
                    return Err(BinError::Transport(format!(
                        "Broker rejected subscription to {topic}"
                    )));
                }
                return Ok(());
            }
            _ => {}
        }
    }
}

/// Turn the event loop into a stream of inbound publishes.
fn inbound_stream(eventloop: EventLoop) -> InboundStream {
    Box::pin(futures::stream::unfold(eventloop, |mut eventloop| async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = InboundMessage {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    };
                    return Some((message, eventloop));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        target: "grumpybin.channel.mqtt",
                        error = %e,
                        "MQTT connection lost"
                    );
                    return None;
                }
            }
        }
    }))
}

#[async_trait]
impl PubSubTransport for MqttTransport {
    async fn subscribe(&self, topic: &str) -> Result<InboundStream, BinError> {
        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), REQUEST_QUEUE_CAPACITY);
        client.subscribe(topic, QoS::AtMostOnce).await?;

        await_suback(&mut eventloop, topic).await?;
        debug!(target: "grumpybin.channel.mqtt", topic = %topic, "Subscribed");

        *self.session.write().await = Some(client);

        Ok(inbound_stream(eventloop))
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BinError> {
        let client = self
            .session
            .read()
            .await
            .clone()
            .ok_or_else(|| BinError::Transport("No MQTT session".to_string()))?;

        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await?;

        debug!(target: "grumpybin.channel.mqtt", topic = %topic, "Published");

        Ok(())
    }
}
