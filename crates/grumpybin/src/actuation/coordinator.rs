//! Actuation coordinator.
//!
//! Holds the activation guard and the cancellation token of the sequence in
//! flight, both in one `watch` slot: `Some(token)` while a sequence runs,
//! `None` when idle. Claiming the slot is a single check-and-set, so two
//! concurrent fire requests can never both launch.

use super::effects::{pulse_actuator, speak_random_line};
use super::{FireOutcome, PulseConfig};
use crate::devices::{Actuator, Level, SpeechEngine};
use crate::errors::BinError;
use crate::observability::metrics;
use crate::store::LineStoreHandle;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

struct CoordinatorInner {
    /// Activation guard plus the running sequence's token.
    session: watch::Sender<Option<CancellationToken>>,
    shutdown_token: CancellationToken,
    actuator: Arc<dyn Actuator>,
    speech: Arc<dyn SpeechEngine>,
    store: LineStoreHandle,
    pulse: PulseConfig,
}

/// Launches actuation sequences, at most one at a time.
///
/// Cheap to clone; clones share the guard.
#[derive(Clone)]
pub struct ActuationCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl ActuationCoordinator {
    /// Sequence tokens are children of `shutdown_token`.
    #[must_use]
    pub fn new(
        actuator: Arc<dyn Actuator>,
        speech: Arc<dyn SpeechEngine>,
        store: LineStoreHandle,
        pulse: PulseConfig,
        shutdown_token: CancellationToken,
    ) -> Self {
        let (session, _) = watch::channel(None);

        Self {
            inner: Arc::new(CoordinatorInner {
                session,
                shutdown_token,
                actuator,
                speech,
                store,
                pulse,
            }),
        }
    }

    /// Start a sequence unless one is already running. Never blocks.
    ///
    /// Must be called from within the Tokio runtime.
    pub fn fire(&self) -> FireOutcome {
        let token = self.inner.shutdown_token.child_token();

        let claimed = self.inner.session.send_if_modified(|slot| {
            if slot.is_some() {
                false
            } else {
                *slot = Some(token.clone());
                true
            }
        });

        if !claimed {
            debug!(target: "grumpybin.actuation", "Sequence in flight, dropping activation");
            metrics::record_activation(FireOutcome::Dropped.as_str());
            return FireOutcome::Dropped;
        }

        info!(target: "grumpybin.actuation", "Activation, starting sequence");
        metrics::record_activation(FireOutcome::Launched.as_str());

        let release = GuardRelease {
            inner: Arc::clone(&self.inner),
            token: token.clone(),
            started: Instant::now(),
        };
        tokio::spawn(run_sequence(Arc::clone(&self.inner), token, release));

        FireOutcome::Launched
    }

    /// Cancel the sequence in flight, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.inner.session.borrow().as_ref() {
            debug!(target: "grumpybin.actuation", "Cancelling sequence");
            token.cancel();
        }
    }

    /// Whether the activation guard is set.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.session.borrow().is_some()
    }

    /// Resolve once no sequence is in flight.
    pub async fn wait_idle(&self) {
        let mut receiver = self.inner.session.subscribe();
        // The sender lives in `self.inner`, so the channel cannot close here
        let _ = receiver.wait_for(Option::is_none).await;
    }
}

/// Clears the activation guard when dropped, on every exit path of the
/// sequence task.
struct GuardRelease {
    inner: Arc<CoordinatorInner>,
    token: CancellationToken,
    started: Instant,
}

impl Drop for GuardRelease {
    fn drop(&mut self) {
        let cancelled = self.token.is_cancelled();
        metrics::record_actuation_duration(self.started.elapsed(), cancelled);
        self.inner.session.send_replace(None);
        debug!(
            target: "grumpybin.actuation",
            cancelled = cancelled,
            "Activation guard released"
        );
    }
}

#[instrument(skip_all, name = "grumpybin.actuation.sequence")]
async fn run_sequence(
    inner: Arc<CoordinatorInner>,
    cancel_token: CancellationToken,
    release: GuardRelease,
) {
    let _release = release;

    let effects = tokio::spawn(run_effects(Arc::clone(&inner), cancel_token.clone()));

    if let Err(e) = effects.await {
        warn!(
            target: "grumpybin.actuation",
            error = %e,
            "Actuation effects aborted"
        );
        metrics::record_actuation_error("panic");
        report("pulse", inner.actuator.set(Level::Low).await);
    }

    info!(
        target: "grumpybin.actuation",
        cancelled = cancel_token.is_cancelled(),
        "Sequence finished"
    );
}

/// Pulsing and speech as one task group.
async fn run_effects(inner: Arc<CoordinatorInner>, cancel_token: CancellationToken) {
    let (pulsed, spoken) = tokio::join!(
        pulse_actuator(inner.actuator.as_ref(), inner.pulse, &cancel_token),
        speak_random_line(&inner.store, inner.speech.as_ref(), &cancel_token),
    );

    report("pulse", pulsed);
    report("speech", spoken);
}

fn report(effect: &'static str, result: Result<(), BinError>) {
    if let Err(e) = result {
        warn!(
            target: "grumpybin.actuation",
            effect = effect,
            error = %e,
            "Actuation effect failed"
        );
        metrics::record_actuation_error(e.kind());
    }
}
