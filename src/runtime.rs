//! Per-operator dispatch
//!
//! Every operator gets a worker task that handles its events one at a time,
//! so a session is never mutated by two messages at once. Different operators
//! are handled in parallel. Idle workers retire and are respawned on demand.
//! On shutdown, queued events are drained and in-flight uploads finish.

use crate::engine::IntakeEngine;
use crate::intake::{Inbound, OperatorId};
use crate::transport::Transport;
use crate::uploader::Uploader;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::{SendError, TryRecvError};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

type WorkerMap = RwLock<HashMap<OperatorId, mpsc::UnboundedSender<Inbound>>>;

/// Routes inbound events to per-operator workers
pub struct Dispatcher<U, T>
where
    U: Uploader + 'static,
    T: Transport + 'static,
{
    engine: Arc<IntakeEngine<U, T>>,
    workers: Arc<WorkerMap>,
    tracker: TaskTracker,
    idle_timeout: Duration,
}

impl<U, T> Dispatcher<U, T>
where
    U: Uploader + 'static,
    T: Transport + 'static,
{
    pub fn new(engine: Arc<IntakeEngine<U, T>>) -> Self {
        Self {
            engine,
            workers: Arc::new(RwLock::new(HashMap::new())),
            tracker: TaskTracker::new(),
            idle_timeout: WORKER_IDLE_TIMEOUT,
        }
    }

    #[allow(dead_code)] // Used by tests
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Number of live workers
    #[allow(dead_code)] // Used by tests
    pub async fn worker_count(&self) -> usize {
        self.workers.read().await.len()
    }

    /// Hand an event to its operator's worker, spawning one if needed
    pub async fn dispatch(&self, inbound: Inbound) {
        let operator = inbound.operator;

        // Fast path. A send fails only if the worker has already retired.
        let inbound = {
            let workers = self.workers.read().await;
            match workers.get(&operator) {
                Some(tx) => match tx.send(inbound) {
                    Ok(()) => return,
                    Err(SendError(inbound)) => inbound,
                },
                None => inbound,
            }
        };

        let mut workers = self.workers.write().await;
        let inbound = match workers.get(&operator) {
            Some(tx) => match tx.send(inbound) {
                Ok(()) => return,
                Err(SendError(inbound)) => inbound,
            },
            None => inbound,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive, cannot fail
        let _ = tx.send(inbound);
        workers.insert(operator, tx);
        drop(workers);

        tracing::debug!(%operator, "Spawning operator worker");
        self.tracker.spawn(run_worker(
            Arc::clone(&self.engine),
            Arc::clone(&self.workers),
            operator,
            rx,
            self.idle_timeout,
        ));
    }

    /// Dispatch events from the transport until cancelled or the channel
    /// closes, then wait for every worker to finish what it already holds.
    pub async fn run(&self, mut rx: mpsc::UnboundedReceiver<Inbound>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                Some(inbound) = rx.recv() => self.dispatch(inbound).await,
                else => break,
            }
        }

        // Dropping the senders lets each worker drain its queue and exit
        self.workers.write().await.clear();
        self.tracker.close();
        tracing::info!(workers = self.tracker.len(), "Draining operator workers");
        self.tracker.wait().await;
        tracing::info!("Dispatcher stopped");
    }
}

async fn run_worker<U, T>(
    engine: Arc<IntakeEngine<U, T>>,
    workers: Arc<WorkerMap>,
    operator: OperatorId,
    mut rx: mpsc::UnboundedReceiver<Inbound>,
    idle_timeout: Duration,
) where
    U: Uploader + 'static,
    T: Transport + 'static,
{
    loop {
        match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(inbound)) => engine.handle(inbound).await,
            Ok(None) => break,
            Err(_) => {
                // Retire under the write lock so no dispatch can slip a message
                // into a receiver that is about to be dropped.
                let mut map = workers.write().await;
                match rx.try_recv() {
                    Ok(inbound) => {
                        drop(map);
                        engine.handle(inbound).await;
                    }
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => {
                        map.remove(&operator);
                        break;
                    }
                }
            }
        }
    }
    tracing::debug!(%operator, "Operator worker retired");
}
