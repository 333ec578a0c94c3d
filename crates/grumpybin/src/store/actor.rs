//! Line store actor.
//!
//! A single task owns the backend and serves requests from its mailbox one
//! at a time. That is the mutual exclusion the file backend's
//! read-modify-rewrite needs: the control plane (read/write) and the
//! actuation pipeline (read) both talk to the store through a cloned
//! [`LineStoreHandle`] and never touch the backend directly.

use super::LineStore;
use crate::errors::BinError;
use crate::observability::metrics;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Mailbox size for store requests.
const STORE_CHANNEL_BUFFER: usize = 64;

/// Messages handled by the store actor.
enum StoreMessage {
    Add {
        text: String,
        respond_to: oneshot::Sender<Result<i64, BinError>>,
    },
    Modify {
        key: i64,
        text: String,
        respond_to: oneshot::Sender<Result<i64, BinError>>,
    },
    Delete {
        key: i64,
        respond_to: oneshot::Sender<Result<i64, BinError>>,
    },
    List {
        respond_to: oneshot::Sender<Result<Vec<String>, BinError>>,
    },
}

/// Handle to the line store actor.
///
/// Cheap to clone. All methods are async and return results via oneshot
/// channels; once the actor has stopped they fail with `BinError::Internal`.
#[derive(Clone)]
pub struct LineStoreHandle {
    sender: mpsc::Sender<StoreMessage>,
}

impl LineStoreHandle {
    /// Spawn the actor owning `store` and return a handle to it.
    ///
    /// The actor stops when `cancel_token` fires or every handle is dropped.
    #[must_use]
    pub fn spawn(
        store: Box<dyn LineStore>,
        cancel_token: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(STORE_CHANNEL_BUFFER);

        let actor = LineStoreActor {
            store,
            receiver,
            cancel_token,
        };
        let task_handle = tokio::spawn(actor.run());

        (Self { sender }, task_handle)
    }

    /// Append a line, returning its key.
    pub async fn add(&self, text: impl Into<String>) -> Result<i64, BinError> {
        let (tx, rx) = oneshot::channel();
        self.send(StoreMessage::Add {
            text: text.into(),
            respond_to: tx,
        })
        .await?;
        Self::receive(rx).await?
    }

    /// Replace the text of line `key`.
    pub async fn modify(&self, key: i64, text: impl Into<String>) -> Result<i64, BinError> {
        let (tx, rx) = oneshot::channel();
        self.send(StoreMessage::Modify {
            key,
            text: text.into(),
            respond_to: tx,
        })
        .await?;
        Self::receive(rx).await?
    }

    /// Remove line `key`.
    pub async fn delete(&self, key: i64) -> Result<i64, BinError> {
        let (tx, rx) = oneshot::channel();
        self.send(StoreMessage::Delete {
            key,
            respond_to: tx,
        })
        .await?;
        Self::receive(rx).await?
    }

    /// All lines as `"<key>: <text>"` in append order.
    pub async fn list(&self) -> Result<Vec<String>, BinError> {
        let (tx, rx) = oneshot::channel();
        self.send(StoreMessage::List { respond_to: tx }).await?;
        Self::receive(rx).await?
    }

    async fn send(&self, message: StoreMessage) -> Result<(), BinError> {
        self.sender
            .send(message)
            .await
            .map_err(|e| BinError::Internal(format!("store channel send failed: {e}")))
    }

    async fn receive<T>(rx: oneshot::Receiver<T>) -> Result<T, BinError> {
        rx.await
            .map_err(|e| BinError::Internal(format!("store response receive failed: {e}")))
    }
}

/// The store actor: owns the backend and runs the message loop.
struct LineStoreActor {
    store: Box<dyn LineStore>,
    receiver: mpsc::Receiver<StoreMessage>,
    cancel_token: CancellationToken,
}

impl LineStoreActor {
    #[instrument(skip_all, name = "grumpybin.store.actor", fields(backend = %self.store.kind()))]
    async fn run(mut self) {
        info!(target: "grumpybin.store", "Line store actor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: "grumpybin.store", "Line store actor received cancellation signal");
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message).await,
                        None => {
                            debug!(target: "grumpybin.store", "All store handles dropped, exiting");
                            break;
                        }
                    }
                }
            }
        }

        info!(target: "grumpybin.store", "Line store actor stopped");
    }

    async fn handle_message(&self, message: StoreMessage) {
        let start = Instant::now();

        match message {
            StoreMessage::Add { text, respond_to } => {
                let result = self.store.add(&text).await;
                Self::observe("add", &result, start);
                if let Ok(key) = &result {
                    info!(target: "grumpybin.store", key = key, "Added line");
                }
                let _ = respond_to.send(result);
            }

            StoreMessage::Modify {
                key,
                text,
                respond_to,
            } => {
                let result = self.store.modify(key, &text).await;
                Self::observe("modify", &result, start);
                let _ = respond_to.send(result);
            }

            StoreMessage::Delete { key, respond_to } => {
                let result = self.store.delete(key).await;
                Self::observe("delete", &result, start);
                let _ = respond_to.send(result);
            }

            StoreMessage::List { respond_to } => {
                let result = self.store.list().await;
                Self::observe("list", &result, start);
                let _ = respond_to.send(result);
            }
        }
    }

    fn observe<T>(operation: &'static str, result: &Result<T, BinError>, start: Instant) {
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_store_operation(operation, status, start.elapsed());

        if let Err(e) = result {
            warn!(
                target: "grumpybin.store",
                operation = operation,
                error = %e,
                "Line store operation failed"
            );
        }
    }
}
