//! Command dispatcher.
//!
//! Maps one [`Command`] onto one line store operation and turns the outcome
//! into a [`Response`]. Dispatch never fails: every error becomes a single
//! ERROR response carrying the error description.

use super::message::{Command, MessageMethod, Response};
use crate::errors::BinError;
use crate::observability::metrics;
use crate::store::{normalize_text, LineStoreHandle};
use tracing::{debug, info, instrument, warn};

/// Stateless dispatcher over a shared line store.
#[derive(Clone)]
pub struct CommandDispatcher {
    store: LineStoreHandle,
}

impl CommandDispatcher {
    #[must_use]
    pub fn new(store: LineStoreHandle) -> Self {
        Self { store }
    }

    /// Execute `command` and build its response.
    #[instrument(skip_all, name = "grumpybin.dispatch", fields(method = %command.method, key = command.key))]
    pub async fn dispatch(&self, command: Command) -> Response {
        let method = command.method;

        let response = match self.execute(command).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    target: "grumpybin.dispatch",
                    method = %method,
                    error = %e,
                    "Command failed"
                );
                Response::error(e.to_string())
            }
        };

        let status = if response.is_success() { "success" } else { "error" };
        metrics::record_command(method.as_str(), status);

        response
    }

    async fn execute(&self, command: Command) -> Result<Response, BinError> {
        match command.method {
            MessageMethod::Add => {
                let text = normalize_text(&command.text);
                let key = self.store.add(&text).await?;
                info!(target: "grumpybin.dispatch", key = key, "Added line");
                Ok(Response::success(
                    Some(key),
                    format!("Added line: {key}: {text}"),
                ))
            }

            MessageMethod::Edit => {
                let text = normalize_text(&command.text);
                let key = self.store.modify(command.key, &text).await?;
                info!(target: "grumpybin.dispatch", key = key, "Modified line");
                Ok(Response::success(
                    Some(key),
                    format!("Modified line: {key}: {text}"),
                ))
            }

            MessageMethod::Delete => {
                let key = self.store.delete(command.key).await?;
                info!(target: "grumpybin.dispatch", key = key, "Deleted line");
                Ok(Response::success(Some(key), format!("Deleted line: {key}")))
            }

            MessageMethod::Get => {
                let lines = self.store.list().await?;
                debug!(target: "grumpybin.dispatch", count = lines.len(), "Listed lines");
                Ok(Response::success(None, listing_text(&lines)?))
            }

            MessageMethod::None => {
                info!(
                    target: "grumpybin.dispatch",
                    "Received message without method"
                );
                Ok(Response::success(
                    None,
                    format!("Received message: {}", command.text),
                ))
            }
        }
    }
}

/// `Current lines: [...]` with the listing as a JSON array of strings.
fn listing_text(lines: &[String]) -> Result<String, BinError> {
    let array = serde_json::to_string(lines)
        .map_err(|e| BinError::Internal(format!("listing encode failed: {e}")))?;
    Ok(format!("Current lines: {array}"))
}

/// Parse the listing back out of a GET response text.
///
/// Returns `None` if `text` is not a listing.
#[must_use]
pub fn parse_listing(text: &str) -> Option<Vec<String>> {
    let array = text.strip_prefix("Current lines: ")?;
    serde_json::from_str(array).ok()
}
