//! Bounded admission queue and worker pool.
//!
//! The queue manager serializes load onto rate-limited downstream
//! collaborators: submissions buffer in a bounded FIFO queue, a single
//! dispatcher binds queued tasks to free workers, and two layered deadlines
//! (enqueue and processing) bound every wait. Completion order is not
//! guaranteed; dispatch order is.

mod worker;

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CorralError, Result};
use crate::processor::{ChatResponse, QueryProcessor};

use worker::Worker;

/// Admission queue bounds and deadlines. Immutable after construction.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Number of workers (positive).
    pub max_workers: usize,
    /// Task queue capacity (positive).
    pub queue_capacity: usize,
    /// Bound on the admission step alone.
    pub enqueue_timeout: Duration,
    /// End-to-end bound covering queue wait and execution.
    pub processing_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 3,
            queue_capacity: 100,
            enqueue_timeout: Duration::from_secs(10),
            processing_timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of one task; delivered exactly once per accepted task.
pub(crate) type TaskResult = Result<ChatResponse>;

/// Sender half of a worker's capacity-1 inbound slot.
pub(crate) type TaskSender = mpsc::Sender<Task>;

/// Unit of work accepted by `submit`.
pub(crate) struct Task {
    pub id: String,
    pub query: String,
    pub cancel: CancellationToken,
    pub reply: oneshot::Sender<TaskResult>,
    pub created: Instant,
}

impl Task {
    fn fail(self, err: CorralError) {
        let _ = self.reply.send(Err(err));
    }
}

#[derive(Default)]
struct Counters {
    total_submitted: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    // May transiently go negative: the dispatcher can decrement before the
    // submitting side increments.
    in_queue: AtomicI64,
}

/// Snapshot of counters and derived gauges. Reads independent atomics, so a
/// snapshot may observe slight skew between fields.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct QueueStats {
    pub running: bool,
    pub max_workers: usize,
    pub queue_capacity: usize,
    pub total_submitted: u64,
    pub processed: u64,
    pub failed: u64,
    pub in_queue: i64,
    pub free_workers: usize,
}

/// Everything that only exists while the manager is running.
struct RunningState {
    task_tx: mpsc::Sender<Task>,
    free_tx: mpsc::Sender<TaskSender>,
    dispatcher_stop: CancellationToken,
    worker_stop: CancellationToken,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

/// Owns the task queue, the worker set, the dispatcher, and the statistics.
pub struct QueueManager {
    config: QueueConfig,
    processor: Arc<dyn QueryProcessor>,
    running: AtomicBool,
    counters: Arc<Counters>,
    state: StdMutex<Option<RunningState>>,
}

impl QueueManager {
    pub fn new(config: QueueConfig, processor: Arc<dyn QueryProcessor>) -> Self {
        Self {
            config,
            processor,
            running: AtomicBool::new(false),
            counters: Arc::new(Counters::default()),
            state: StdMutex::new(None),
        }
    }

    /// Create and start the workers and the dispatcher.
    ///
    /// Fails with `AlreadyRunning` while running. Must be called from within
    /// a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock().expect("queue manager state poisoned");
        if state.is_some() {
            return Err(CorralError::AlreadyRunning);
        }

        info!(
            max_workers = self.config.max_workers,
            queue_capacity = self.config.queue_capacity,
            "starting queue manager"
        );

        let (task_tx, task_rx) = mpsc::channel::<Task>(self.config.queue_capacity);
        let (free_tx, free_rx) = mpsc::channel::<TaskSender>(self.config.max_workers);
        let dispatcher_stop = CancellationToken::new();
        let worker_stop = CancellationToken::new();

        let workers = (1..=self.config.max_workers)
            .map(|id| {
                Worker {
                    id,
                    processor: Arc::clone(&self.processor),
                    exec_timeout: self.config.processing_timeout,
                    stop: worker_stop.clone(),
                    registry: free_tx.clone(),
                }
                .spawn()
            })
            .collect();

        let dispatcher = tokio::spawn(dispatch(
            task_rx,
            free_rx,
            dispatcher_stop.clone(),
            self.config.enqueue_timeout,
            Arc::clone(&self.counters),
        ));

        *state = Some(RunningState {
            task_tx,
            free_tx,
            dispatcher_stop,
            worker_stop,
            dispatcher,
            workers,
        });
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop accepting work, fail queued tasks with `Shutdown`, let workers
    /// drain their current task, and wait for everything to exit.
    /// Idempotent.
    pub async fn stop(&self) {
        let state = self
            .state
            .lock()
            .expect("queue manager state poisoned")
            .take();
        let Some(state) = state else {
            return;
        };

        self.running.store(false, Ordering::SeqCst);
        info!("stopping queue manager");

        // Close the queue to new admissions and stop the dispatcher; it
        // drains still-queued tasks with Shutdown before exiting.
        drop(state.task_tx);
        state.dispatcher_stop.cancel();
        let _ = state.dispatcher.await;

        state.worker_stop.cancel();
        for handle in state.workers {
            let _ = handle.await;
        }

        info!("queue manager stopped");
    }

    /// The hot path: admit one query and wait for its result.
    pub async fn submit(&self, cancel: CancellationToken, query: &str) -> Result<ChatResponse> {
        if !self.healthy() {
            return Err(CorralError::NotRunning);
        }
        let task_tx = {
            let state = self.state.lock().expect("queue manager state poisoned");
            match state.as_ref() {
                Some(state) => state.task_tx.clone(),
                None => return Err(CorralError::NotRunning),
            }
        };

        self.counters.total_submitted.fetch_add(1, Ordering::Relaxed);

        let id = format!("task-{}", Uuid::new_v4());
        let (reply_tx, reply_rx) = oneshot::channel();
        let task = Task {
            id: id.clone(),
            query: query.to_string(),
            cancel: cancel.clone(),
            reply: reply_tx,
            created: Instant::now(),
        };

        debug!(task_id = %id, query, "submitting request");

        // Enqueue phase: admission, bounded by the enqueue timeout and the
        // caller's cancellation.
        tokio::select! {
            sent = tokio::time::timeout(self.config.enqueue_timeout, task_tx.send(task)) => {
                match sent {
                    Ok(Ok(())) => {
                        self.counters.in_queue.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Err(_closed)) => {
                        self.counters.failed.fetch_add(1, Ordering::Relaxed);
                        return Err(CorralError::NotRunning);
                    }
                    Err(_elapsed) => {
                        self.counters.failed.fetch_add(1, Ordering::Relaxed);
                        return Err(CorralError::QueueFull(self.config.enqueue_timeout));
                    }
                }
            }
            _ = cancel.cancelled() => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                return Err(CorralError::Cancelled);
            }
        }

        // Processing phase: end-to-end wait including execution.
        tokio::select! {
            replied = tokio::time::timeout(self.config.processing_timeout, reply_rx) => {
                match replied {
                    Ok(Ok(Ok(response))) => {
                        self.counters.processed.fetch_add(1, Ordering::Relaxed);
                        Ok(response)
                    }
                    Ok(Ok(Err(e))) => {
                        self.counters.failed.fetch_add(1, Ordering::Relaxed);
                        Err(e)
                    }
                    // Reply sender dropped without a result; only happens
                    // when the task went down with a shutdown.
                    Ok(Err(_recv)) => {
                        self.counters.failed.fetch_add(1, Ordering::Relaxed);
                        Err(CorralError::Shutdown)
                    }
                    Err(_elapsed) => {
                        self.counters.failed.fetch_add(1, Ordering::Relaxed);
                        Err(CorralError::ProcessingTimeout(self.config.processing_timeout))
                    }
                }
            }
            _ = cancel.cancelled() => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                Err(CorralError::Cancelled)
            }
        }
    }

    /// Snapshot of counters and gauges.
    pub fn stats(&self) -> QueueStats {
        let free_workers = {
            let state = self.state.lock().expect("queue manager state poisoned");
            state
                .as_ref()
                .map(|s| s.free_tx.max_capacity() - s.free_tx.capacity())
                .unwrap_or(0)
        };

        QueueStats {
            running: self.healthy(),
            max_workers: self.config.max_workers,
            queue_capacity: self.config.queue_capacity,
            total_submitted: self.counters.total_submitted.load(Ordering::Relaxed),
            processed: self.counters.processed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            in_queue: self.counters.in_queue.load(Ordering::Relaxed),
            free_workers,
        }
    }

    pub fn healthy(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// The single dispatcher loop: one consumer of the queue, preserving FIFO
/// dispatch and making `in_queue` accounting trivial.
async fn dispatch(
    mut task_rx: mpsc::Receiver<Task>,
    mut free_rx: mpsc::Receiver<TaskSender>,
    stop: CancellationToken,
    enqueue_timeout: Duration,
    counters: Arc<Counters>,
) {
    info!("queue dispatcher started");

    loop {
        let task = tokio::select! {
            _ = stop.cancelled() => break,
            task = task_rx.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };

        // Bind a free worker. The timeout here is a safety net; under
        // steady-state conditions workers become free quickly.
        let slot = tokio::select! {
            _ = stop.cancelled() => {
                counters.in_queue.fetch_sub(1, Ordering::Relaxed);
                task.fail(CorralError::Shutdown);
                break;
            }
            slot = tokio::time::timeout(enqueue_timeout, free_rx.recv()) => slot,
        };

        match slot {
            Ok(Some(slot)) => {
                // The slot has capacity 1 and is only published while empty,
                // so the hand-off cannot block; failure means the worker
                // vanished between publishing and hand-off.
                match slot.try_send(task) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Closed(task))
                    | Err(mpsc::error::TrySendError::Full(task)) => {
                        warn!(task_id = %task.id, "worker disappeared during hand-off");
                        task.fail(CorralError::NoWorkerAvailable(enqueue_timeout));
                    }
                }
                counters.in_queue.fetch_sub(1, Ordering::Relaxed);
            }
            Ok(None) => {
                counters.in_queue.fetch_sub(1, Ordering::Relaxed);
                task.fail(CorralError::Shutdown);
                break;
            }
            Err(_elapsed) => {
                warn!(task_id = %task.id, "no worker became free in time");
                counters.in_queue.fetch_sub(1, Ordering::Relaxed);
                task.fail(CorralError::NoWorkerAvailable(enqueue_timeout));
            }
        }
    }

    // Tasks still queued were admitted but will never be dispatched.
    while let Ok(task) = task_rx.try_recv() {
        counters.in_queue.fetch_sub(1, Ordering::Relaxed);
        task.fail(CorralError::Shutdown);
    }

    info!("queue dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::ProcessorStatus;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Configurable stand-in for the agent workflow. Observation handles are
    /// shared so tests can keep clones after the mock moves into the manager.
    struct MockProcessor {
        delay: Duration,
        response: String,
        error: Option<String>,
        panic: bool,
        calls: Arc<AtomicUsize>,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
        order: Arc<StdMutex<Vec<String>>>,
    }

    impl MockProcessor {
        fn respond(response: &str) -> Self {
            Self::with_delay(response, Duration::ZERO)
        }

        fn with_delay(response: &str, delay: Duration) -> Self {
            Self {
                delay,
                response: response.to_string(),
                error: None,
                panic: false,
                calls: Arc::new(AtomicUsize::new(0)),
                active: Arc::new(AtomicUsize::new(0)),
                max_active: Arc::new(AtomicUsize::new(0)),
                order: Arc::new(StdMutex::new(Vec::new())),
            }
        }

        fn failing(message: &str) -> Self {
            let mut mock = Self::respond("");
            mock.error = Some(message.to_string());
            mock
        }

        fn panicking() -> Self {
            let mut mock = Self::respond("");
            mock.panic = true;
            mock
        }
    }

    #[async_trait]
    impl QueryProcessor for MockProcessor {
        async fn process(&self, cancel: CancellationToken, query: &str) -> Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.order.lock().unwrap().push(query.to_string());
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);

            if self.panic {
                self.active.fetch_sub(1, Ordering::SeqCst);
                panic!("mock processor panic");
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => Err(CorralError::Cancelled),
                _ = tokio::time::sleep(self.delay) => match &self.error {
                    Some(message) => Err(CorralError::Processor(message.clone())),
                    None => Ok(ChatResponse::ok(self.response.clone())),
                },
            };

            self.active.fetch_sub(1, Ordering::SeqCst);
            outcome
        }

        async fn status(&self) -> ProcessorStatus {
            ProcessorStatus {
                step: "ready".to_string(),
                tools_healthy: true,
                capabilities: serde_json::json!({}),
            }
        }
    }

    fn config(
        max_workers: usize,
        queue_capacity: usize,
        enqueue_ms: u64,
        processing_ms: u64,
    ) -> QueueConfig {
        QueueConfig {
            max_workers,
            queue_capacity,
            enqueue_timeout: Duration::from_millis(enqueue_ms),
            processing_timeout: Duration::from_millis(processing_ms),
        }
    }

    fn manager(config: QueueConfig, processor: MockProcessor) -> Arc<QueueManager> {
        Arc::new(QueueManager::new(config, Arc::new(processor)))
    }

    #[tokio::test]
    async fn test_basic_submit() {
        let manager = manager(
            config(2, 10, 2_000, 5_000),
            MockProcessor::with_delay("test response", Duration::from_millis(1)),
        );
        manager.start().unwrap();

        let response = manager
            .submit(CancellationToken::new(), "test query")
            .await
            .unwrap();
        assert_eq!(response.response, "test response");

        let stats = manager.stats();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.total_submitted, 1);

        manager.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded_by_worker_count() {
        let processor = MockProcessor::with_delay("r", Duration::from_millis(100));
        let calls = Arc::clone(&processor.calls);
        let max_active = Arc::clone(&processor.max_active);
        let manager = manager(config(3, 20, 2_000, 5_000), processor);
        manager.start().unwrap();

        let start = Instant::now();
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move {
                    manager
                        .submit(CancellationToken::new(), "concurrent query")
                        .await
                })
            })
            .collect();

        for handle in handles {
            let response = handle.await.unwrap().unwrap();
            assert_eq!(response.response, "r");
        }
        let elapsed = start.elapsed();

        // 10 tasks on 3 workers at 100 ms each need at least 4 waves; allow
        // scheduling slack and assert the conservative 300 ms bound.
        assert!(
            elapsed >= Duration::from_millis(300),
            "elapsed {:?} too fast for 3 workers",
            elapsed
        );
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert!(max_active.load(Ordering::SeqCst) <= 3);

        let stats = manager.stats();
        assert_eq!(stats.processed, 10);
        assert_eq!(stats.failed, 0);
        manager.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queue_overflow_rejects_submissions() {
        let processor = MockProcessor::with_delay("slow", Duration::from_secs(2));
        let manager = manager(config(1, 2, 500, 5_000), processor);
        manager.start().unwrap();

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(
                    async move { manager.submit(CancellationToken::new(), "overflow").await },
                )
            })
            .collect();

        let mut queue_full = 0;
        for handle in handles {
            if let Err(CorralError::QueueFull(_)) = handle.await.unwrap() {
                queue_full += 1;
            }
        }
        assert!(queue_full >= 1, "expected at least one QueueFull rejection");

        manager.stop().await;
    }

    #[tokio::test]
    async fn test_processing_timeout() {
        let processor = MockProcessor::with_delay("late", Duration::from_secs(2));
        let manager = manager(config(1, 10, 2_000, 500), processor);
        manager.start().unwrap();

        let start = Instant::now();
        let err = manager
            .submit(CancellationToken::new(), "timeout test")
            .await
            .unwrap_err();
        assert!(matches!(err, CorralError::ProcessingTimeout(_)));
        assert!(start.elapsed() < Duration::from_millis(1_500));
        assert!(err.to_string().contains("request timeout"));

        let stats = manager.stats();
        assert_eq!(stats.failed, 1);
        manager.stop().await;
    }

    #[tokio::test]
    async fn test_processor_error_passes_through() {
        let manager = manager(config(1, 10, 2_000, 5_000), MockProcessor::failing("processor error"));
        manager.start().unwrap();

        let err = manager
            .submit(CancellationToken::new(), "error test")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("processor error"));
        assert_eq!(manager.stats().failed, 1);

        manager.stop().await;
    }

    #[tokio::test]
    async fn test_worker_survives_processor_panic() {
        let manager = manager(config(1, 10, 2_000, 5_000), MockProcessor::panicking());
        manager.start().unwrap();

        let err = manager
            .submit(CancellationToken::new(), "panic test")
            .await
            .unwrap_err();
        assert!(matches!(err, CorralError::Internal(_)));

        // Same (only) worker must still accept work.
        let err = manager
            .submit(CancellationToken::new(), "panic again")
            .await
            .unwrap_err();
        assert!(matches!(err, CorralError::Internal(_)));
        assert_eq!(manager.stats().failed, 2);

        manager.stop().await;
    }

    #[tokio::test]
    async fn test_cancellation_aborts_submit() {
        let processor = MockProcessor::with_delay("slow", Duration::from_secs(5));
        let manager = manager(config(1, 10, 2_000, 10_000), processor);
        manager.start().unwrap();

        let cancel = CancellationToken::new();
        let submit = {
            let manager = Arc::clone(&manager);
            let cancel = cancel.clone();
            tokio::spawn(async move { manager.submit(cancel, "cancelled query").await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        let start = Instant::now();
        cancel.cancel();

        let err = submit.await.unwrap().unwrap_err();
        assert!(matches!(err, CorralError::Cancelled));
        // Liveness: the return is bounded by the cancellation wake-up, not
        // by the processor.
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(manager.stats().failed, 1);

        manager.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fifo_dispatch_order() {
        let processor = MockProcessor::with_delay("ok", Duration::from_millis(30));
        let order = Arc::clone(&processor.order);
        let manager = manager(config(1, 10, 2_000, 5_000), processor);
        manager.start().unwrap();

        let mut handles = Vec::new();
        for i in 0..5 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager
                    .submit(CancellationToken::new(), &format!("q{}", i))
                    .await
            }));
            // Stagger admissions so queue order is deterministic.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let seen = order.lock().unwrap().clone();
        assert_eq!(seen, vec!["q0", "q1", "q2", "q3", "q4"]);

        manager.stop().await;
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let manager = manager(config(2, 10, 2_000, 5_000), MockProcessor::respond("ok"));

        manager.start().unwrap();
        assert!(manager.healthy());

        let err = manager.start().unwrap_err();
        assert!(matches!(err, CorralError::AlreadyRunning));
        assert!(err.to_string().contains("already running"));

        manager.stop().await;
        assert!(!manager.healthy());

        // Second stop is a no-op.
        manager.stop().await;

        let err = manager
            .submit(CancellationToken::new(), "after stop")
            .await
            .unwrap_err();
        assert!(matches!(err, CorralError::NotRunning));
    }

    #[tokio::test]
    async fn test_submit_before_start_fails_fast() {
        let manager = manager(config(2, 10, 2_000, 5_000), MockProcessor::respond("ok"));
        let err = manager
            .submit(CancellationToken::new(), "too early")
            .await
            .unwrap_err();
        assert!(matches!(err, CorralError::NotRunning));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stop_drains_queued_tasks_with_shutdown() {
        let processor = MockProcessor::with_delay("done", Duration::from_millis(300));
        let manager = manager(config(1, 10, 2_000, 5_000), processor);
        manager.start().unwrap();

        // One task runs; two sit in the queue behind it.
        let handles: Vec<_> = (0..3)
            .map(|i| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move {
                    manager
                        .submit(CancellationToken::new(), &format!("drain{}", i))
                        .await
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(100)).await;
        manager.stop().await;

        let mut ok = 0;
        let mut shutdown = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(CorralError::Shutdown) => shutdown += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        // The in-flight task drains; the queued ones are failed.
        assert_eq!(ok, 1);
        assert_eq!(shutdown, 2);

        // After stop, no further results are produced.
        assert_eq!(manager.stats().in_queue, 0);
    }

    #[tokio::test]
    async fn test_stats_gauges() {
        let manager = manager(config(2, 10, 2_000, 5_000), MockProcessor::respond("ok"));
        manager.start().unwrap();

        // Give both workers time to publish their slots.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stats = manager.stats();
        assert!(stats.running);
        assert_eq!(stats.max_workers, 2);
        assert_eq!(stats.queue_capacity, 10);
        assert_eq!(stats.free_workers, 2);
        assert_eq!(stats.in_queue, 0);

        manager.submit(CancellationToken::new(), "one").await.unwrap();
        let stats = manager.stats();
        assert_eq!(stats.total_submitted, 1);
        assert_eq!(stats.processed, 1);

        manager.stop().await;
        assert!(!manager.stats().running);
    }

    #[tokio::test]
    async fn test_counter_consistency() {
        let processor = MockProcessor::with_delay("ok", Duration::from_millis(10));
        let manager = manager(config(2, 10, 2_000, 5_000), processor);
        manager.start().unwrap();

        for i in 0..8 {
            let _ = manager
                .submit(CancellationToken::new(), &format!("c{}", i))
                .await;
        }

        let stats = manager.stats();
        assert_eq!(stats.processed + stats.failed, stats.total_submitted);

        manager.stop().await;
    }
}
