mod cycle;
pub mod snapshot;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dashboard_core::{QuoteFeed, RefreshError, ScoreFeed, SettingsStore, Snapshot};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use cycle::{run_cycle, CycleDeps};
pub use snapshot::SnapshotStore;

/// What a manual refresh request found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new cycle was started for this request
    Started,
    /// A cycle was already running; the request joins it
    InProgress,
}

impl TriggerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerOutcome::Started => "started",
            TriggerOutcome::InProgress => "in_progress",
        }
    }
}

enum SchedulerMsg {
    Trigger {
        reply: oneshot::Sender<TriggerOutcome>,
        done: Option<oneshot::Sender<()>>,
    },
    Status {
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub worker_count: usize,
    pub symbol_timeout: Duration,
}

/// Background actor that owns the refresh loop. Cycles start from the
/// interval tick or a manual trigger, never concurrently: a trigger
/// that lands mid-cycle joins the running one instead of queueing.
pub struct RefreshScheduler {
    deps: CycleDeps,
    snapshots: SnapshotStore,
    interval: Duration,
    rx: mpsc::Receiver<SchedulerMsg>,
    in_flight: Option<JoinHandle<Snapshot>>,
    waiters: Vec<oneshot::Sender<()>>,
}

impl RefreshScheduler {
    /// Spawn the scheduler task. The first periodic refresh runs one
    /// full interval after startup; callers wanting data sooner
    /// trigger explicitly.
    pub fn spawn(
        config: SchedulerConfig,
        settings: SettingsStore,
        quotes: Arc<dyn QuoteFeed>,
        scores: Arc<dyn ScoreFeed>,
        snapshots: SnapshotStore,
    ) -> SchedulerHandle {
        let (tx, rx) = mpsc::channel(16);
        let actor = Self {
            deps: CycleDeps {
                settings,
                quotes,
                scores,
                worker_count: config.worker_count,
                symbol_timeout: config.symbol_timeout,
            },
            snapshots,
            interval: config.interval,
            rx,
            in_flight: None,
            waiters: Vec::new(),
        };
        tokio::spawn(actor.run());
        SchedulerHandle { tx }
    }

    async fn run(mut self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval_secs = self.interval.as_secs(), "refresh scheduler running");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.in_flight.is_none() {
                        tracing::debug!("interval tick, starting refresh cycle");
                        self.start_cycle();
                    }
                    // ticks that land mid-cycle are dropped
                }
                msg = self.rx.recv() => {
                    match msg {
                        Some(SchedulerMsg::Trigger { reply, done }) => {
                            let outcome = if self.in_flight.is_some() {
                                TriggerOutcome::InProgress
                            } else {
                                self.start_cycle();
                                TriggerOutcome::Started
                            };
                            if let Some(done) = done {
                                self.waiters.push(done);
                            }
                            let _ = reply.send(outcome);
                        }
                        Some(SchedulerMsg::Status { reply }) => {
                            let _ = reply.send(self.in_flight.is_some());
                        }
                        Some(SchedulerMsg::Shutdown) | None => break,
                    }
                }
                finished = join_in_flight(&mut self.in_flight), if self.in_flight.is_some() => {
                    self.in_flight = None;
                    self.finish_cycle(finished);
                }
            }
        }

        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        tracing::info!("refresh scheduler stopped");
    }

    fn start_cycle(&mut self) {
        self.in_flight = Some(tokio::spawn(run_cycle(self.deps.clone())));
    }

    /// Publish the finished cycle and release everyone waiting on it.
    /// A crashed cycle keeps the previous records and surfaces a
    /// system-level error entry instead.
    fn finish_cycle(&mut self, finished: std::result::Result<Snapshot, JoinError>) {
        match finished {
            Ok(snapshot) => self.snapshots.publish(snapshot),
            Err(e) => {
                tracing::error!("refresh cycle crashed: {e}");
                let mut snapshot = (*self.snapshots.current()).clone();
                snapshot.errors = vec![RefreshError::system(format!("refresh cycle crashed: {e}"))];
                self.snapshots.publish(snapshot);
            }
        }
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}

async fn join_in_flight(
    in_flight: &mut Option<JoinHandle<Snapshot>>,
) -> std::result::Result<Snapshot, JoinError> {
    match in_flight {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Cheap cloneable handle for talking to the scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerMsg>,
}

impl SchedulerHandle {
    /// Request a refresh without waiting for it.
    pub async fn trigger(&self) -> Result<TriggerOutcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SchedulerMsg::Trigger {
                reply: reply_tx,
                done: None,
            })
            .await
            .ok()
            .context("refresh scheduler is not running")?;
        reply_rx
            .await
            .context("refresh scheduler dropped the request")
    }

    /// Request a refresh and wait until a cycle (this one, or the one
    /// already running) has published its snapshot.
    pub async fn refresh_and_wait(&self) -> Result<TriggerOutcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(SchedulerMsg::Trigger {
                reply: reply_tx,
                done: Some(done_tx),
            })
            .await
            .ok()
            .context("refresh scheduler is not running")?;
        let outcome = reply_rx
            .await
            .context("refresh scheduler dropped the request")?;
        done_rx
            .await
            .context("refresh scheduler stopped before the cycle finished")?;
        Ok(outcome)
    }

    /// Whether a refresh cycle is executing right now. A stopped
    /// scheduler reports false.
    pub async fn cycle_in_progress(&self) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(SchedulerMsg::Status { reply: reply_tx })
            .await
            .is_err()
        {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(SchedulerMsg::Shutdown).await;
    }
}
