use crossbeam_channel::{never, select, tick, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::context::ServiceContext;
use crate::dispatcher::{RecomputeRequest, TriggerReason};
use crate::engine::RecomputeService;
use crate::metrics;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub threads: usize,
    /// Total deliveries per job, first attempt included.
    pub max_attempts: u32,
    /// Multiplied by the attempt number before a redelivery.
    pub retry_backoff: Duration,
    /// Interval of the background repair recompute. `None` disables it.
    pub repair_interval: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: 2,
            max_attempts: 5,
            retry_backoff: Duration::from_millis(200),
            repair_interval: Some(Duration::from_secs(300)),
        }
    }
}

/// Thread pool consuming recompute jobs from the dispatcher queue.
///
/// A job that fails is re-enqueued with `attempt + 1` until `max_attempts`,
/// then dropped with an error log. Jobs that are already queued when a worker
/// picks one up are folded into the same run, since every recompute reads the
/// whole transaction set anyway.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: Option<Sender<()>>,
}

impl WorkerPool {
    pub fn start(
        config: WorkerConfig,
        recompute: Arc<RecomputeService>,
        jobs: Receiver<RecomputeRequest>,
        redeliver: Sender<RecomputeRequest>,
        ctx: ServiceContext,
    ) -> std::io::Result<Self> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let threads = config.threads.max(1);
        let mut handles = Vec::with_capacity(threads);

        for index in 0..threads {
            let worker = Worker {
                index,
                config: config.clone(),
                recompute: recompute.clone(),
                jobs: jobs.clone(),
                redeliver: redeliver.clone(),
                shutdown: shutdown_rx.clone(),
                ctx: ctx.clone(),
            };
            let handle = thread::Builder::new()
                .name(format!("recompute-{}", index))
                .spawn(move || worker.run())?;
            handles.push(handle);
        }

        info!(
            threads,
            max_attempts = config.max_attempts,
            "🚀 Recompute workers started"
        );
        Ok(Self {
            handles,
            shutdown: Some(shutdown_tx),
        })
    }

    /// Signals every worker and waits for them. A job in progress finishes first.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Dropping the sender disconnects the shutdown channel for all workers.
        if self.shutdown.take().is_none() {
            return;
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("A recompute worker panicked");
            }
        }
        info!("Recompute workers stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    index: usize,
    config: WorkerConfig,
    recompute: Arc<RecomputeService>,
    jobs: Receiver<RecomputeRequest>,
    redeliver: Sender<RecomputeRequest>,
    shutdown: Receiver<()>,
    ctx: ServiceContext,
}

impl Worker {
    fn run(self) {
        // Only the first worker drives the repair ticker.
        let repair = match (self.index, self.config.repair_interval) {
            (0, Some(interval)) => tick(interval),
            _ => never(),
        };

        loop {
            select! {
                recv(self.shutdown) -> _ => break,
                recv(self.jobs) -> msg => match msg {
                    Ok(request) => self.handle(request),
                    Err(_) => break,
                },
                recv(repair) -> _ => {
                    debug!("Running periodic repair recompute");
                    let request = RecomputeRequest {
                        task_id: self.ctx.id.new_id(),
                        reason: TriggerReason::Repair,
                        attempt: 0,
                        enqueued_at: self.ctx.time.now(),
                    };
                    self.handle(request);
                },
            }
        }
        debug!(worker = self.index, "Recompute worker exiting");
    }

    fn handle(&self, request: RecomputeRequest) {
        // Queued jobs ride along with this run. On failure the one with the
        // most deliveries left stands in for all of them.
        let merged: Vec<RecomputeRequest> = self.jobs.try_iter().collect();
        let coalesced = merged.len();

        match self.recompute.recompute() {
            Ok(_) => {
                debug!(
                    task_id = %request.task_id,
                    attempt = request.attempt,
                    coalesced,
                    "Recompute job done"
                );
            }
            Err(e) => {
                let retry = merged
                    .into_iter()
                    .chain(std::iter::once(request))
                    .min_by_key(|r| r.attempt);
                if let Some(retry) = retry {
                    self.retry_or_dead_letter(retry, coalesced, &e.to_string());
                }
            }
        }
    }

    fn retry_or_dead_letter(&self, request: RecomputeRequest, coalesced: usize, cause: &str) {
        if request.attempt + 1 >= self.config.max_attempts {
            error!(
                task_id = %request.task_id,
                attempts = request.attempt + 1,
                coalesced,
                "☠️ Recompute job dead-lettered: {}",
                cause
            );
            metrics::inc_dead_lettered();
            return;
        }

        let delay = self.config.retry_backoff * (request.attempt + 1);
        warn!(
            task_id = %request.task_id,
            attempt = request.attempt,
            coalesced,
            "Recompute failed ({}), redelivering in {:?}",
            cause,
            delay
        );
        thread::sleep(delay);
        let task_id = request.task_id.clone();
        if self
            .redeliver
            .send(request.redelivery(self.ctx.time.now()))
            .is_err()
        {
            error!(task_id = %task_id, "Queue closed, recompute job lost");
            metrics::inc_dead_lettered();
        }
    }
}
