//! Registry of live reminder workers, keyed by order id.
//!
//! A worker's entry stays in the registry until its task has finished, and
//! the task removes its own entry on the way out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tally_core::{Result, TallyError, Termination};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::worker::{ReminderWorker, WorkerContext};

type Workers = Arc<Mutex<HashMap<String, WorkerHandle>>>;

struct WorkerHandle {
    /// Distinguishes successive workers of the same order.
    id: u64,
    stop: watch::Sender<bool>,
    done: watch::Receiver<Option<Termination>>,
    join: JoinHandle<()>,
    started_at: DateTime<Utc>,
}

impl WorkerHandle {
    fn is_live(&self) -> bool {
        self.done.borrow().is_none() && !self.join.is_finished()
    }

    async fn finish(self) -> Termination {
        let _ = self.stop.send(true);
        if let Err(e) = self.join.await {
            warn!(error = %e, "reminder worker task failed");
        }
        let termination = *self.done.borrow();
        termination.unwrap_or(Termination::Stopped)
    }
}

/// Starts at most one reminder worker per order and stops them on demand.
#[derive(Clone)]
pub struct WorkerRegistry {
    ctx: WorkerContext,
    workers: Workers,
    next_id: Arc<AtomicU64>,
}

impl WorkerRegistry {
    pub fn new(ctx: WorkerContext) -> Self {
        Self {
            ctx,
            workers: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Spawn the order's worker.
    ///
    /// Fails with [`TallyError::WorkerAlreadyRunning`] if a live worker exists
    /// for the order; a finished one is replaced.
    pub async fn start(&self, order_id: &str) -> Result<()> {
        let mut workers = self.workers.lock().await;
        workers.retain(|_, handle| handle.is_live());

        if workers.contains_key(order_id) {
            return Err(TallyError::WorkerAlreadyRunning {
                order_id: order_id.to_string(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (stop, stop_rx) = watch::channel(false);
        let (done_tx, done) = watch::channel(None);
        let worker = ReminderWorker::new(order_id, self.ctx.clone());
        let registry = self.workers.clone();
        let key = order_id.to_string();

        let join = tokio::spawn(async move {
            let termination = worker.run(stop_rx).await;
            {
                let mut workers = registry.lock().await;
                if workers.get(&key).is_some_and(|handle| handle.id == id) {
                    workers.remove(&key);
                }
            }
            let _ = done_tx.send(Some(termination));
        });

        workers.insert(
            order_id.to_string(),
            WorkerHandle {
                id,
                stop,
                done,
                join,
                started_at: self.ctx.clock.now(),
            },
        );
        Ok(())
    }

    /// Returns true if the order has a live worker.
    pub async fn is_running(&self, order_id: &str) -> bool {
        let workers = self.workers.lock().await;
        workers.get(order_id).is_some_and(WorkerHandle::is_live)
    }

    /// Live workers and when they started, oldest first.
    pub async fn active_orders(&self) -> Vec<(String, DateTime<Utc>)> {
        let mut workers = self.workers.lock().await;
        workers.retain(|_, handle| handle.is_live());

        let mut active: Vec<(String, DateTime<Utc>)> = workers
            .iter()
            .map(|(order_id, handle)| (order_id.clone(), handle.started_at))
            .collect();
        active.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        active
    }

    /// Wait for the order's worker to terminate.
    ///
    /// The worker stays registered while it runs, so a concurrent
    /// [`start`](Self::start) for the order is still refused.
    pub async fn wait(&self, order_id: &str) -> Option<Termination> {
        let mut done = self.workers.lock().await.get(order_id)?.done.clone();
        let termination = match done.wait_for(Option::is_some).await {
            Ok(termination) => *termination,
            Err(_) => {
                warn!(order_id, "reminder worker task failed");
                None
            }
        };
        termination
    }

    /// Stop the order's worker, keeping its debts.
    pub async fn stop(&self, order_id: &str) -> Option<Termination> {
        let handle = self.workers.lock().await.remove(order_id)?;
        Some(handle.finish().await)
    }

    /// Stop every worker.
    pub async fn shutdown(&self) -> Vec<(String, Termination)> {
        let handles: Vec<(String, WorkerHandle)> =
            self.workers.lock().await.drain().collect();
        info!(count = handles.len(), "stopping reminder workers");

        join_all(handles.into_iter().map(|(order_id, handle)| async move {
            (order_id, handle.finish().await)
        }))
        .await
    }
}
