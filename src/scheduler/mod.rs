//! Digest scheduler.
//!
//! A single background loop fires digest cycles on a cron or interval
//! cadence. At most one cycle executes at any instant: scheduled ticks that
//! land while a cycle is running are skipped, and manual triggers are
//! refused with `AlreadyRunning`. `reload` swaps the cadence and re-arms the
//! pending timer without touching an in-flight cycle.

mod cadence;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::DigestConfig;
use crate::digest::{DigestCycle, DigestRun, DispatchError};
use crate::metrics::DigestMetrics;

pub use cadence::Cadence;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("a digest cycle is already running")]
    AlreadyRunning,

    #[error("invalid cadence: {0}")]
    InvalidCadence(String),

    #[error("scheduler loop is not running")]
    Stopped,
}

/// Explicit scheduler configuration, supplied at construction and on reload
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// When false the timer is never armed; manual triggers still work
    pub enabled: bool,
    pub cadence: Cadence,
}

impl SchedulerConfig {
    pub fn from_settings(settings: &DigestConfig) -> Result<Self, SchedulerError> {
        let config = Self {
            enabled: settings.enabled,
            cadence: Cadence::from_settings(settings)?,
        };
        config.validate(Utc::now())?;
        Ok(config)
    }

    /// An enabled cadence must have a future fire time.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        if self.enabled && self.cadence.next_after(now).is_none() {
            return Err(SchedulerError::InvalidCadence(format!(
                "{} never fires after {}",
                self.cadence.describe(),
                now.to_rfc3339()
            )));
        }
        Ok(())
    }

    fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.enabled {
            self.cadence.next_after(now)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerPhase {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunTrigger {
    Scheduled,
    Manual,
}

impl RunTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunTrigger::Scheduled => "scheduled",
            RunTrigger::Manual => "manual",
        }
    }
}

/// A finished cycle and what started it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedRun {
    pub trigger: RunTrigger,
    pub run: DigestRun,
}

/// Result of re-arming the timer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadOutcome {
    pub enabled: bool,
    pub cadence: String,
    pub next_run_at: Option<DateTime<Utc>>,
    /// A cycle was in flight during the reload; it was left alone
    pub cycle_in_flight: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub phase: SchedulerPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_trigger: Option<RunTrigger>,
    pub enabled: bool,
    pub cadence: String,
    /// Whether the background loop is alive
    pub armed: bool,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run: Option<CompletedRun>,
    pub runs_completed: u64,
    pub ticks_skipped: u64,
    pub manual_refused: u64,
}

struct SchedulerState {
    phase: SchedulerPhase,
    active_trigger: Option<RunTrigger>,
    config: SchedulerConfig,
    loop_active: bool,
    /// Pending timer deadline; `None` means "compute on next arm"
    next_run_at: Option<DateTime<Utc>>,
    last_run: Option<CompletedRun>,
    runs_completed: u64,
    ticks_skipped: u64,
    manual_refused: u64,
}

struct Shared {
    cycle: DigestCycle,
    /// Guards the run slot and the cadence together
    state: Mutex<SchedulerState>,
    rearm: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Holds the single run slot; releases it on drop, including on panic.
struct RunGuard {
    shared: Arc<Shared>,
    trigger: RunTrigger,
    started: Instant,
}

impl RunGuard {
    fn complete(&self, run: &DigestRun) {
        DigestMetrics::record_run(self.trigger.as_str(), run.success, self.started.elapsed());

        let mut state = self.shared.lock();
        state.runs_completed += 1;
        state.last_run = Some(CompletedRun {
            trigger: self.trigger,
            run: run.clone(),
        });
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.phase = SchedulerPhase::Idle;
        state.active_trigger = None;
        DigestMetrics::set_running(false);
    }
}

/// Cloneable handle to the scheduler; all clones share one run slot.
#[derive(Clone)]
pub struct DigestScheduler {
    shared: Arc<Shared>,
}

impl DigestScheduler {
    pub fn new(cycle: DigestCycle, config: SchedulerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                cycle,
                state: Mutex::new(SchedulerState {
                    phase: SchedulerPhase::Idle,
                    active_trigger: None,
                    config,
                    loop_active: false,
                    next_run_at: None,
                    last_run: None,
                    runs_completed: 0,
                    ticks_skipped: 0,
                    manual_refused: 0,
                }),
                rearm: Notify::new(),
            }),
        }
    }

    /// Start the timer loop in the background.
    pub fn spawn(&self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        // Mark active before spawning so an immediate reload is accepted
        self.shared.lock().loop_active = true;
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    }

    /// Timer loop. Returns on shutdown; an in-flight cycle is finished first.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        self.shared.lock().loop_active = true;
        tracing::info!(cadence = %self.config().cadence.describe(), "Digest scheduler started");

        loop {
            let deadline = self.arm();
            let wait = async {
                match deadline {
                    Some(at) => {
                        let delay = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                        tokio::time::sleep(delay).await
                    }
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Digest scheduler received shutdown signal");
                    break;
                }
                _ = self.shared.rearm.notified() => {
                    tracing::debug!("Digest timer re-armed");
                }
                _ = wait => {
                    self.shared.lock().next_run_at = None;
                    self.tick().await;
                }
            }
        }

        {
            let mut state = self.shared.lock();
            state.loop_active = false;
            state.next_run_at = None;
        }
        tracing::info!("Digest scheduler stopped");
    }

    /// Run a cycle now, on the caller's behalf.
    ///
    /// Refused with `AlreadyRunning` if any cycle, scheduled or manual, is in flight.
    pub async fn trigger_now(&self) -> Result<DigestRun, SchedulerError> {
        let guard = match self.try_begin(RunTrigger::Manual) {
            Some(guard) => guard,
            None => {
                self.shared.lock().manual_refused += 1;
                tracing::info!("Manual digest refused: a cycle is already running");
                return Err(SchedulerError::AlreadyRunning);
            }
        };

        Ok(self.execute(guard).await)
    }

    /// Replace the cadence and re-arm the pending timer.
    ///
    /// Only future scheduling changes; an in-flight cycle runs to completion.
    pub fn reload(&self, config: SchedulerConfig) -> Result<ReloadOutcome, SchedulerError> {
        let outcome = {
            let mut state = self.shared.lock();
            if !state.loop_active {
                return Err(SchedulerError::Stopped);
            }

            let now = Utc::now();
            config.validate(now)?;
            state.next_run_at = config.next_after(now);
            state.config = config;

            ReloadOutcome {
                enabled: state.config.enabled,
                cadence: state.config.cadence.describe(),
                next_run_at: state.next_run_at,
                cycle_in_flight: state.phase == SchedulerPhase::Running,
            }
        };

        self.shared.rearm.notify_one();
        tracing::info!(
            enabled = outcome.enabled,
            cadence = %outcome.cadence,
            next_run_at = ?outcome.next_run_at,
            cycle_in_flight = outcome.cycle_in_flight,
            "Digest scheduler reloaded"
        );

        Ok(outcome)
    }

    pub fn config(&self) -> SchedulerConfig {
        self.shared.lock().config.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().phase == SchedulerPhase::Running
    }

    pub fn status(&self) -> SchedulerStatus {
        let state = self.shared.lock();
        SchedulerStatus {
            phase: state.phase,
            active_trigger: state.active_trigger,
            enabled: state.config.enabled,
            cadence: state.config.cadence.describe(),
            armed: state.loop_active,
            next_run_at: state.next_run_at,
            last_run: state.last_run.clone(),
            runs_completed: state.runs_completed,
            ticks_skipped: state.ticks_skipped,
            manual_refused: state.manual_refused,
        }
    }

    /// Current deadline, computing a fresh one if none is pending.
    fn arm(&self) -> Option<DateTime<Utc>> {
        let mut state = self.shared.lock();
        if state.next_run_at.is_none() {
            state.next_run_at = state.config.next_after(Utc::now());
        }
        state.next_run_at
    }

    async fn tick(&self) {
        match self.try_begin(RunTrigger::Scheduled) {
            Some(guard) => {
                self.execute(guard).await;
            }
            None => {
                self.shared.lock().ticks_skipped += 1;
                DigestMetrics::record_tick_skipped();
                tracing::info!("Scheduled digest skipped: a cycle is already running");
            }
        }
    }

    /// Claim the run slot if it is free.
    fn try_begin(&self, trigger: RunTrigger) -> Option<RunGuard> {
        let mut state = self.shared.lock();
        if state.phase == SchedulerPhase::Running {
            return None;
        }

        state.phase = SchedulerPhase::Running;
        state.active_trigger = Some(trigger);
        DigestMetrics::set_running(true);

        Some(RunGuard {
            shared: self.shared.clone(),
            trigger,
            started: Instant::now(),
        })
    }

    /// Run the cycle in its own task so a dropped caller cannot cut it short.
    async fn execute(&self, guard: RunGuard) -> DigestRun {
        let shared = self.shared.clone();
        let trigger = guard.trigger;
        let started_at = Utc::now();
        let span = tracing::info_span!("digest.cycle", trigger = trigger.as_str());

        let handle = tokio::spawn(
            async move {
                let run = shared.cycle.run().await;
                guard.complete(&run);
                tracing::info!(
                    run_id = %run.run_id,
                    success = run.success,
                    notification_count = run.notification_count,
                    elapsed_ms = run.duration_ms(),
                    error = ?run.error,
                    "Digest cycle finished"
                );
                run
            }
            .instrument(span),
        );

        match handle.await {
            Ok(run) => run,
            Err(e) => {
                tracing::error!(error = %e, "Digest cycle task failed");
                let run = DigestRun::aborted(started_at, 0, DispatchError::Internal(e.to_string()));
                let mut state = self.shared.lock();
                state.last_run = Some(CompletedRun {
                    trigger,
                    run: run.clone(),
                });
                run
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{MemoryNotificationStore, NotificationStore};
    use crate::provider::{ChannelFactory, ProviderRegistry};

    fn scheduler(config: SchedulerConfig) -> DigestScheduler {
        let store: Arc<dyn NotificationStore> = Arc::new(MemoryNotificationStore::new());
        let registry = Arc::new(ProviderRegistry::new(ChannelFactory::logging()));
        let cycle = DigestCycle::from_settings(store, registry, &DigestConfig::default());
        DigestScheduler::new(cycle, config)
    }

    fn every(ms: u64) -> SchedulerConfig {
        SchedulerConfig {
            enabled: true,
            cadence: Cadence::interval(Duration::from_millis(ms)).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_manual_trigger_records_last_run() {
        let scheduler = scheduler(every(60_000));

        let run = scheduler.trigger_now().await.unwrap();
        assert!(run.success);

        let status = scheduler.status();
        assert_eq!(status.phase, SchedulerPhase::Idle);
        assert_eq!(status.runs_completed, 1);
        assert_eq!(status.last_run.unwrap().trigger, RunTrigger::Manual);
    }

    #[tokio::test]
    async fn test_try_begin_is_exclusive() {
        let scheduler = scheduler(every(60_000));

        let guard = scheduler.try_begin(RunTrigger::Scheduled).unwrap();
        assert!(scheduler.is_running());
        assert!(scheduler.try_begin(RunTrigger::Manual).is_none());
        assert!(matches!(
            scheduler.trigger_now().await,
            Err(SchedulerError::AlreadyRunning)
        ));

        drop(guard);
        assert!(!scheduler.is_running());
        assert!(scheduler.try_begin(RunTrigger::Manual).is_some());
    }

    #[tokio::test]
    async fn test_reload_requires_running_loop() {
        let scheduler = scheduler(every(60_000));
        assert!(matches!(
            scheduler.reload(every(1_000)),
            Err(SchedulerError::Stopped)
        ));
    }

    #[tokio::test]
    async fn test_loop_fires_and_stops() {
        let scheduler = scheduler(every(20));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = scheduler.spawn(shutdown_rx);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(scheduler.status().runs_completed >= 1);
        assert_eq!(
            scheduler.status().last_run.unwrap().trigger,
            RunTrigger::Scheduled
        );

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler should stop")
            .expect("scheduler should not panic");
        assert!(!scheduler.status().armed);
    }

    #[tokio::test]
    async fn test_reload_disables_and_rearms() {
        let scheduler = scheduler(every(60_000));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = scheduler.spawn(shutdown_rx);

        let disabled = SchedulerConfig {
            enabled: false,
            ..every(60_000)
        };
        let outcome = scheduler.reload(disabled).unwrap();
        assert!(!outcome.enabled);
        assert!(outcome.next_run_at.is_none());

        let outcome = scheduler.reload(every(20)).unwrap();
        assert!(outcome.enabled);
        assert!(outcome.next_run_at.is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(scheduler.status().runs_completed >= 1);

        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn test_reload_rejects_cadence_that_never_fires() {
        let scheduler = scheduler(every(60_000));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = scheduler.spawn(shutdown_rx);
        let before = scheduler.reload(every(60_000)).unwrap();

        let expired = SchedulerConfig {
            enabled: true,
            cadence: Cadence::cron("0 0 0 1 1 * 2020").unwrap(),
        };
        assert!(matches!(
            scheduler.reload(expired),
            Err(SchedulerError::InvalidCadence(_))
        ));

        let status = scheduler.status();
        assert_eq!(status.cadence, before.cadence);
        assert_eq!(status.next_run_at, before.next_run_at);

        // Disabled configs need no fire time
        let disabled = SchedulerConfig {
            enabled: false,
            cadence: Cadence::cron("0 0 0 1 1 * 2020").unwrap(),
        };
        assert!(scheduler.reload(disabled).is_ok());

        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }

    #[test]
    fn test_from_settings_rejects_dead_cadences() {
        let expired = DigestConfig {
            cron: Some("0 0 0 1 1 * 2020".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            SchedulerConfig::from_settings(&expired),
            Err(SchedulerError::InvalidCadence(_))
        ));

        let huge = DigestConfig {
            cron: None,
            interval_seconds: u64::MAX,
            ..Default::default()
        };
        assert!(matches!(
            SchedulerConfig::from_settings(&huge),
            Err(SchedulerError::InvalidCadence(_))
        ));
    }
}
