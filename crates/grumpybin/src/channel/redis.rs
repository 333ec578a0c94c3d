//! Redis pub/sub transport.
//!
//! Inbound messages come from a dedicated pub/sub connection per
//! subscription. Publishing goes through a `ConnectionManager`, which
//! reconnects on its own, so a broker restart only costs the in-flight
//! publish.
//!
//! # Usage
//!
//! ```rust,ignore
//! let transport = RedisTransport::connect("redis://localhost:6379").await?;
//! let mut stream = transport.subscribe("grumpybin/lines").await?;
//! ```

use super::{InboundMessage, InboundStream, PubSubTransport};
use crate::errors::BinError;
use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, error};

/// Redis-backed [`PubSubTransport`].
#[derive(Clone)]
pub struct RedisTransport {
    client: Client,
    /// Publishing connection (cheaply cloneable, reconnects automatically).
    publisher: ConnectionManager,
}

impl RedisTransport {
    /// Open a client and the publishing connection.
    ///
    /// # Errors
    ///
    /// Returns `BinError::Transport` if the URL is invalid or the broker is
    /// unreachable.
    pub async fn connect(broker_url: &str) -> Result<Self, BinError> {
        let client = Client::open(broker_url).map_err(|e| {
            error!(
                target: "grumpybin.channel.redis",
                error = %e,
                "Failed to open Redis client"
            );
            BinError::Transport(format!("Failed to open Redis client: {e}"))
        })?;

        let publisher = ConnectionManager::new(client.clone()).await.map_err(|e| {
            error!(
                target: "grumpybin.channel.redis",
                error = %e,
                "Failed to connect to Redis"
            );
            BinError::Transport(format!("Failed to connect to Redis: {e}"))
        })?;

        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl PubSubTransport for RedisTransport {
    async fn subscribe(&self, topic: &str) -> Result<InboundStream, BinError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(topic).await?;

        debug!(target: "grumpybin.channel.redis", topic = %topic, "Subscribed");

        let stream: InboundStream = Box::pin(pubsub.into_on_message().map(|msg| InboundMessage {
            topic: msg.get_channel_name().to_string(),
            payload: msg.get_payload_bytes().to_vec(),
        }));

        Ok(stream)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BinError> {
        // Clone the connection (cheap operation) for this request
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn.publish(topic, payload).await?;

        debug!(
            target: "grumpybin.channel.redis",
            topic = %topic,
            receivers = receivers,
            "Published"
        );

        Ok(())
    }
}
