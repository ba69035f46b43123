//! Worker: a single execution slot in the pool.
//!
//! Each worker owns a capacity-1 inbound slot. It publishes the slot's
//! sender to the manager's free-worker registry, waits for the dispatcher to
//! hand it a task, runs the task through the query processor, and loops.
//! Workers never share mutable state beyond the registry hand-off and the
//! atomically updated counters.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CorralError;
use crate::processor::QueryProcessor;

use super::{Task, TaskResult, TaskSender};

pub(super) struct Worker {
    pub(super) id: usize,
    pub(super) processor: Arc<dyn QueryProcessor>,
    /// Defensive per-task execution bound; the manager's processing timeout
    /// is the authoritative one.
    pub(super) exec_timeout: Duration,
    pub(super) stop: CancellationToken,
    pub(super) registry: mpsc::Sender<TaskSender>,
}

impl Worker {
    pub(super) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        debug!(worker_id = self.id, "worker started");

        let (slot_tx, mut slot_rx) = mpsc::channel::<Task>(1);
        loop {
            // Announce availability. The registry is bounded to the worker
            // count, so this cannot block in practice.
            tokio::select! {
                _ = self.stop.cancelled() => break,
                sent = self.registry.send(slot_tx.clone()) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }

            let task = tokio::select! {
                _ = self.stop.cancelled() => break,
                task = slot_rx.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            self.run_task(task).await;
        }

        debug!(worker_id = self.id, "worker stopped");
    }

    /// Run one task to completion and deliver exactly one result.
    ///
    /// The processor call runs in its own spawned task so a panic is
    /// contained there and reported as an internal error; the worker itself
    /// stays live.
    async fn run_task(&self, task: Task) {
        let Task {
            id,
            query,
            cancel,
            reply,
            created,
        } = task;

        let start = Instant::now();
        debug!(
            worker_id = self.id,
            task_id = %id,
            queued_ms = created.elapsed().as_millis() as u64,
            "processing task"
        );

        let processor = Arc::clone(&self.processor);
        let exec_timeout = self.exec_timeout;
        let exec_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::time::timeout(exec_timeout, processor.process(exec_cancel, &query)).await
        });

        let result: TaskResult = match handle.await {
            Ok(Ok(result)) => result,
            Ok(Err(_elapsed)) => Err(CorralError::ProcessingTimeout(exec_timeout)),
            Err(join_err) if join_err.is_panic() => {
                warn!(worker_id = self.id, task_id = %id, "query processor panicked");
                Err(CorralError::Internal(
                    "query processor panicked".to_string(),
                ))
            }
            Err(_) => Err(CorralError::Internal(
                "query processor task aborted".to_string(),
            )),
        };

        let success = result.is_ok();
        if reply.send(result).is_err() {
            // Caller already timed out or was cancelled.
            debug!(worker_id = self.id, task_id = %id, "reply receiver gone, dropping result");
        }

        debug!(
            worker_id = self.id,
            task_id = %id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            success,
            "task completed"
        );
    }
}
