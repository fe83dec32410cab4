//! Fixed-size pool of polling workers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{self, JoinHandle};
use tokio::time::{self, MissedTickBehavior};

use crate::state_machine::StateMachine;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Runs `workers` polling tasks per state machine until shut down.
///
/// Ticks run on the blocking pool because stores do synchronous IO.
pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn the workers on the current tokio runtime.
    #[must_use]
    pub fn start(machines: &[Arc<StateMachine>], workers: usize, poll_interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        let mut handles = Vec::with_capacity(machines.len() * workers);

        for machine in machines {
            for worker in 0..workers.max(1) {
                let machine = Arc::clone(machine);
                let stop = shutdown.subscribe();
                handles.push(tokio::spawn(run_worker(machine, worker, poll_interval, stop)));
            }
        }

        tracing::info!(
            machines = machines.len(),
            tasks = handles.len(),
            poll_interval_ms = poll_interval.as_millis(),
            "Worker pool started"
        );
        Self { shutdown, handles }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signal every worker and wait for in-flight ticks to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "Worker task ended abnormally");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

async fn run_worker(
    machine: Arc<StateMachine>,
    worker: usize,
    poll_interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let process_type = machine.process_type();
    let mut ticker = time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::debug!(%process_type, worker, "Worker started");

    loop {
        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let machine = Arc::clone(&machine);
                match task::spawn_blocking(move || machine.tick()).await {
                    Ok(Ok(0)) => {}
                    Ok(Ok(processed)) => {
                        tracing::debug!(%process_type, worker, processed, "Tick finished");
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(%process_type, worker, error = %err, "Tick failed");
                    }
                    Err(err) => {
                        tracing::error!(%process_type, worker, error = %err, "Tick panicked");
                    }
                }
            }
        }
    }

    tracing::debug!(%process_type, worker, "Worker stopped");
}
