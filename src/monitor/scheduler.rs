// src/monitor/scheduler.rs
use super::TargetRegistry;
use crate::metrics::MetricsCollector;
use crate::probe::{CheckOutcome, ProbeExecutor, Target};
use crate::storage::{ResultSink, StorageError};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::{watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest period the timer loop accepts.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Failed to load known targets: {0}")]
    TargetLoad(#[source] StorageError),

    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Scheduler has been stopped")]
    Stopped,
}

enum Lifecycle {
    Idle,
    Running(JoinHandle<()>),
    Stopped,
}

/// What one cycle produced.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Size of the registry snapshot the cycle probed.
    pub targets: usize,
    /// Outcomes the sink accepted.
    pub persisted: usize,
    pub outcomes: Vec<CheckOutcome>,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn reachable(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_reachable()).count()
    }

    pub fn unreachable(&self) -> usize {
        self.outcomes.len() - self.reachable()
    }
}

/// Owns the monitored targets and probes all of them on a fixed interval.
///
/// Cycles never overlap: the timer loop and manual `run_cycle` calls share
/// one cycle lock. `stop` lets an in-flight cycle finish (probes are bounded
/// by the executor deadline) and returns only after its last sink write.
///
/// The timer loop only holds a weak reference: dropping the last `Arc`
/// without calling `stop` ends the loop at its next wakeup.
pub struct Scheduler {
    registry: TargetRegistry,
    executor: ProbeExecutor,
    sink: Arc<dyn ResultSink>,
    metrics: Option<Arc<MetricsCollector>>,
    interval: Duration,
    lifecycle: Mutex<Lifecycle>,
    cycle_lock: Mutex<()>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(
        executor: ProbeExecutor,
        sink: Arc<dyn ResultSink>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            registry: TargetRegistry::new(),
            executor,
            sink,
            metrics,
            interval: DEFAULT_CHECK_INTERVAL,
            lifecycle: Mutex::new(Lifecycle::Idle),
            cycle_lock: Mutex::new(()),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Sets the cycle period. Values below [`MIN_CHECK_INTERVAL`] are raised to it.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_CHECK_INTERVAL {
            warn!(
                "Check interval {:?} is too short, using {:?}",
                interval, MIN_CHECK_INTERVAL
            );
        }
        self.interval = interval.max(MIN_CHECK_INTERVAL);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Loads stored targets, then spawns the timer loop. The first cycle
    /// runs immediately.
    pub async fn start(self: &Arc<Self>) -> Result<(), SchedulerError> {
        let mut lifecycle = self.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::Running(_) => return Err(SchedulerError::AlreadyRunning),
            Lifecycle::Stopped => return Err(SchedulerError::Stopped),
            Lifecycle::Idle => {}
        }

        let known = self
            .sink
            .list_known_targets()
            .await
            .map_err(SchedulerError::TargetLoad)?;
        let loaded = self.registry.load_initial(known);

        let handle = tokio::spawn(Self::run(
            Arc::downgrade(self),
            self.interval,
            self.shutdown_rx.clone(),
        ));
        *lifecycle = Lifecycle::Running(handle);

        info!(
            "Scheduler started with {} stored targets, interval {:?}, probe timeout {:?}",
            loaded,
            self.interval,
            self.executor.timeout()
        );
        Ok(())
    }

    /// Signals the loop and waits for the in-flight cycle to drain.
    /// Stopping an idle or already stopped scheduler does nothing.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let handle = match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(handle) => handle,
            previous => {
                *lifecycle = previous;
                debug!("Scheduler stop requested while not running");
                return;
            }
        };

        let _ = self.shutdown_tx.send(true);

        if let Err(e) = handle.await {
            error!("Scheduler loop task failed: {}", e);
        }

        // Manually triggered cycles hold the same lock.
        let _cycle = self.cycle_lock.lock().await;
        info!("Scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock().await, Lifecycle::Running(_))
    }

    /// Registers a target for the next cycle. Returns false if it was already known.
    pub fn add_target(&self, target: impl Into<Target>) -> bool {
        let target = target.into();
        let added = self.registry.add(target.clone());
        if added {
            info!("Added target to monitor: {}", target);
        } else {
            debug!("Target already monitored: {}", target);
        }
        added
    }

    pub fn targets(&self) -> Vec<Target> {
        self.registry.snapshot()
    }

    async fn run(
        scheduler: Weak<Self>,
        period: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                biased;
                // Errors once the scheduler, and with it the sender, is dropped.
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let scheduler = match scheduler.upgrade() {
                        Some(scheduler) => scheduler,
                        None => {
                            debug!("Scheduler dropped without stop");
                            break;
                        }
                    };
                    if let Err(e) = scheduler.run_cycle().await {
                        debug!("Check cycle skipped: {}", e);
                        break;
                    }
                }
            }
        }

        info!("Scheduler loop shutting down");
    }

    /// Probes every target in the current snapshot and waits for all of them.
    ///
    /// Dropping the returned future aborts the probes it started, so an
    /// abandoned cycle cannot write to the sink after `stop` returns.
    pub async fn run_cycle(&self) -> Result<CycleReport, SchedulerError> {
        let _cycle = self.cycle_lock.lock().await;
        if *self.shutdown_rx.borrow() {
            return Err(SchedulerError::Stopped);
        }

        let started = Instant::now();
        let targets = self.registry.snapshot();
        let mut tasks = JoinSet::new();

        for target in targets.iter().cloned() {
            let executor = self.executor.clone();
            let sink = self.sink.clone();
            let metrics = self.metrics.clone();
            tasks.spawn(probe_and_record(executor, sink, metrics, target));
        }

        let mut report = CycleReport {
            targets: targets.len(),
            outcomes: Vec::with_capacity(targets.len()),
            ..Default::default()
        };

        // Join barrier: every probe settles before the cycle ends.
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok((outcome, persisted)) => {
                    if persisted {
                        report.persisted += 1;
                    }
                    report.outcomes.push(outcome);
                }
                Err(e) => error!("Probe task join error: {}", e),
            }
        }
        report.elapsed = started.elapsed();

        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(report.targets, report.elapsed);
        }

        info!(
            "Check cycle complete: {} reachable, {} unreachable, {} stored in {:?}",
            report.reachable(),
            report.unreachable(),
            report.persisted,
            report.elapsed
        );

        Ok(report)
    }
}

/// Runs one probe and hands its outcome to the sink. A rejected write is
/// logged and reported as not persisted; it never fails the cycle.
async fn probe_and_record(
    executor: ProbeExecutor,
    sink: Arc<dyn ResultSink>,
    metrics: Option<Arc<MetricsCollector>>,
    target: Target,
) -> (CheckOutcome, bool) {
    let outcome = executor.execute(target).await;

    if let Some(metrics) = &metrics {
        metrics.record_probe(&outcome);
    }

    let persisted = match sink.append(&outcome).await {
        Ok(record) => {
            info!(
                target_url = %record.target,
                status = record.status_code,
                latency_ms = record.latency_ms,
                "Check completed"
            );
            true
        }
        Err(e) => {
            error!("Failed to store check for {}: {}", outcome.target, e);
            if let Some(metrics) = &metrics {
                metrics.record_sink_failure();
            }
            false
        }
    };

    (outcome, persisted)
}
