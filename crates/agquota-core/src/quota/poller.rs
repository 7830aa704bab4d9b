//! Fixed-period quota poller with failure accounting.
//!
//! Phases: `Idle` → `start` → `Polling` → (threshold breach) →
//! `ReconnectRequested` → (next success) → `Polling`; `stop` returns to
//! `Idle` from anywhere. The owner reacts to [`PollerEvent::ReconnectNeeded`]
//! by stopping the poller and re-running discovery.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::parser::parse_user_status;
use super::types::QuotaSnapshot;
use super::QuotaSource;
use crate::client::{LanguageServerClient, UserStatusResponse};
use crate::discovery::ConnectionParameters;
use crate::error::QuotaError;
use crate::i18n::{Language, Translator};

/// Event channel capacity; slow subscribers lag rather than block polling
const EVENT_CAPACITY: usize = 32;

/// Lifecycle phase of a [`QuotaPoller`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollerPhase {
    Idle,
    Polling,
    ReconnectRequested,
}

/// Consecutive failed cycles, reset on success or when the threshold fires
#[derive(Debug, Clone)]
pub struct FailureTracker {
    consecutive: u32,
    threshold: u32,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    /// Count a failed cycle. Returns `true` when the threshold was reached;
    /// the counter then starts over.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive += 1;
        if self.consecutive >= self.threshold {
            self.consecutive = 0;
            return true;
        }
        false
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// Retry and reconnect tuning
#[derive(Debug, Clone)]
pub struct PollerOptions {
    /// Fetch attempts per cycle
    pub max_attempts: u32,
    /// Pause between attempts of one cycle
    pub retry_delay: Duration,
    /// Failed cycles in a row before asking for rediscovery
    pub reconnect_threshold: u32,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_delay: Duration::from_millis(500),
            reconnect_threshold: 3,
        }
    }
}

/// Notification delivered to subscribers
#[derive(Debug, Clone)]
pub enum PollerEvent {
    /// A cycle succeeded
    Snapshot(QuotaSnapshot),
    /// A cycle failed; carries the last attempt's error
    Error(QuotaError),
    /// Too many cycles failed in a row; rediscover the server
    ReconnectNeeded,
}

/// Result of one fetch cycle
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Updated(QuotaSnapshot),
    Failed(QuotaError),
    /// Another cycle was already running
    Skipped,
}

struct Shared<S> {
    source: S,
    translator: Translator,
    options: PollerOptions,
    phase: Mutex<PollerPhase>,
    failures: Mutex<FailureTracker>,
    in_flight: AtomicBool,
    /// Bumped by start/stop; a cycle only reports if it is unchanged
    epoch: AtomicU64,
    events: broadcast::Sender<PollerEvent>,
}

/// Clears the single-flight flag when a cycle ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: QuotaSource> Shared<S> {
    async fn run_cycle(&self, epoch: u64) -> FetchOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Quota fetch already in flight, skipping");
            return FetchOutcome::Skipped;
        }
        let _in_flight = InFlight(&self.in_flight);

        let result = self
            .fetch_with_retry()
            .await
            .map(|response| parse_user_status(&response, Utc::now(), &self.translator));

        if self.epoch.load(Ordering::Acquire) != epoch {
            debug!("Poller stopped during fetch, discarding result");
            return match result {
                Ok(snapshot) => FetchOutcome::Updated(snapshot),
                Err(e) => FetchOutcome::Failed(e),
            };
        }

        match result {
            Ok(snapshot) => {
                self.failures.lock().record_success();
                {
                    let mut phase = self.phase.lock();
                    if *phase == PollerPhase::ReconnectRequested {
                        *phase = PollerPhase::Polling;
                    }
                }
                debug!(models = snapshot.models.len(), "Quota snapshot updated");
                let _ = self.events.send(PollerEvent::Snapshot(snapshot.clone()));
                FetchOutcome::Updated(snapshot)
            }
            Err(e) => {
                let reconnect = self.failures.lock().record_failure();
                warn!("Quota fetch failed: {}", e);
                let _ = self.events.send(PollerEvent::Error(e.clone()));

                if reconnect {
                    {
                        let mut phase = self.phase.lock();
                        if *phase == PollerPhase::Polling {
                            *phase = PollerPhase::ReconnectRequested;
                        }
                    }
                    warn!(
                        threshold = self.options.reconnect_threshold,
                        "Consecutive quota failures, requesting reconnect"
                    );
                    let _ = self.events.send(PollerEvent::ReconnectNeeded);
                }
                FetchOutcome::Failed(e)
            }
        }
    }

    async fn fetch_with_retry(&self) -> Result<UserStatusResponse, QuotaError> {
        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.source.fetch_user_status().await {
                Ok(response) => return Ok(response),
                Err(e) if attempt >= max_attempts => return Err(e),
                Err(e) => {
                    debug!(attempt, max_attempts, "Quota fetch attempt failed: {}", e);
                }
            }
            attempt += 1;
            tokio::time::sleep(self.options.retry_delay).await;
        }
    }
}

/// Polls one language server for quota data.
///
/// Owns its connection for its whole life; a reconnect means dropping this
/// poller and building a new one from fresh [`ConnectionParameters`].
pub struct QuotaPoller<S: QuotaSource> {
    shared: Arc<Shared<S>>,
    timer: Mutex<Option<oneshot::Sender<()>>>,
}

impl QuotaPoller<LanguageServerClient> {
    /// Poller talking HTTPS to a discovered server
    pub fn connect(params: ConnectionParameters, language: Language) -> Result<Self, QuotaError> {
        let client = LanguageServerClient::new(params, language)?;
        Ok(Self::new(client, Translator::new(language)))
    }
}

impl<S: QuotaSource> QuotaPoller<S> {
    pub fn new(source: S, translator: Translator) -> Self {
        Self::with_options(source, translator, PollerOptions::default())
    }

    pub fn with_options(source: S, translator: Translator, options: PollerOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                source,
                translator,
                failures: Mutex::new(FailureTracker::new(options.reconnect_threshold)),
                options,
                phase: Mutex::new(PollerPhase::Idle),
                in_flight: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                events,
            }),
            timer: Mutex::new(None),
        }
    }

    /// Receive snapshots, errors and reconnect requests
    pub fn subscribe(&self) -> broadcast::Receiver<PollerEvent> {
        self.shared.events.subscribe()
    }

    pub fn phase(&self) -> PollerPhase {
        *self.shared.phase.lock()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.shared.failures.lock().consecutive()
    }

    pub fn source(&self) -> &S {
        &self.shared.source
    }

    /// Fetch immediately, then every `interval`.
    ///
    /// Ticks are fixed-period; a tick that falls due while a cycle is still
    /// running is skipped. Calling `start` again replaces the running timer.
    /// Must be called inside a tokio runtime.
    pub fn start(&self, interval: Duration) {
        let interval = interval.max(Duration::from_millis(1));
        let mut timer = self.timer.lock();
        if let Some(stop) = timer.take() {
            let _ = stop.send(());
        }

        let epoch = self.shared.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        *self.shared.phase.lock() = PollerPhase::Polling;

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        shared.run_cycle(epoch).await;
                    }
                }
            }
            debug!(epoch, "Poll timer stopped");
        });
        *timer = Some(stop_tx);

        info!(interval_ms = interval.as_millis() as u64, "Quota polling started");
    }

    /// Cancel the timer. A cycle already in flight finishes but reports nothing.
    pub fn stop(&self) {
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);
        *self.shared.phase.lock() = PollerPhase::Idle;
        if let Some(stop) = self.timer.lock().take() {
            let _ = stop.send(());
            info!("Quota polling stopped");
        }
    }

    /// Run one cycle now (manual refresh)
    pub async fn fetch_once(&self) -> FetchOutcome {
        let epoch = self.shared.epoch.load(Ordering::Acquire);
        self.shared.run_cycle(epoch).await
    }
}

impl<S: QuotaSource> Drop for QuotaPoller<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
