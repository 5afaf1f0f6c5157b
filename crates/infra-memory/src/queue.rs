// In-Memory Queue
// Implements: EngineQueue (waiting list + single consumer loop)

use crate::lock;
use crate::stop::{StopSignal, StopToken};
use async_trait::async_trait;
use molecq_core::domain::{
    EnqueuedJob, Job, JobId, JobOptions, JobPayload, QueueOptions, RemovePolicy,
};
use molecq_core::port::{
    ConnectionErrorCallback, EngineError, EngineQueue, HandlerError, JobConsumer,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How long `obliterate` waits for an in-flight job before aborting it
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Job counts per list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub waiting: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Default)]
struct QueueState {
    waiting: VecDeque<Job>,
    completed: VecDeque<JobId>,
    failed: VecDeque<(JobId, String)>,
    has_consumer: bool,
    closed: bool,
}

impl QueueState {
    fn counts(&self) -> JobCounts {
        JobCounts {
            waiting: self.waiting.len(),
            completed: self.completed.len(),
            failed: self.failed.len(),
        }
    }

    /// Insert by priority (lower value first, unprioritized last);
    /// `lifo` jumps ahead of jobs with the same priority
    fn enqueue(&mut self, job: Job) {
        let key = priority_key(&job);
        let lifo = job.options.lifo.unwrap_or(false);
        let position = self
            .waiting
            .iter()
            .position(|queued| {
                let queued_key = priority_key(queued);
                if lifo {
                    queued_key >= key
                } else {
                    queued_key > key
                }
            })
            .unwrap_or(self.waiting.len());
        self.waiting.insert(position, job);
    }
}

fn priority_key(job: &Job) -> u32 {
    job.options.priority.unwrap_or(u32::MAX)
}

/// Keep, drop or cap terminal records according to `policy` (unset keeps all)
fn retain<T>(records: &mut VecDeque<T>, record: T, policy: Option<RemovePolicy>) {
    match policy {
        Some(RemovePolicy::Remove(true)) => {}
        None | Some(RemovePolicy::Remove(false)) => records.push_back(record),
        Some(RemovePolicy::KeepLast(n)) => {
            records.push_back(record);
            while records.len() as u64 > n {
                records.pop_front();
            }
        }
    }
}

/// Queue held entirely in process memory
pub struct MemoryQueue {
    name: String,
    prefix: String,
    default_job_options: JobOptions,
    state: Arc<tokio::sync::Mutex<QueueState>>,
    notify: Arc<Notify>,
    observers: Mutex<Vec<ConnectionErrorCallback>>,
    stop: StopSignal,
    consumer_task: Mutex<Option<JoinHandle<()>>>,
    drain_grace: Duration,
}

impl MemoryQueue {
    pub(crate) fn new(name: &str, options: &QueueOptions) -> Self {
        Self {
            name: name.to_string(),
            prefix: options.prefix.clone(),
            default_job_options: options.default_job_options.clone(),
            state: Arc::new(tokio::sync::Mutex::new(QueueState::default())),
            notify: Arc::new(Notify::new()),
            observers: Mutex::new(Vec::new()),
            stop: StopSignal::new(),
            consumer_task: Mutex::new(None),
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }

    pub(crate) fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    pub async fn counts(&self) -> JobCounts {
        self.state.lock().await.counts()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Ids of the retained completed jobs, oldest first
    pub async fn completed_ids(&self) -> Vec<JobId> {
        self.state.lock().await.completed.iter().cloned().collect()
    }

    /// Ids and failure reasons of the retained failed jobs, oldest first
    pub async fn failed_jobs(&self) -> Vec<(JobId, String)> {
        self.state.lock().await.failed.iter().cloned().collect()
    }

    /// Simulate a backing-store connection error
    pub fn emit_connection_error(&self, err: EngineError) {
        warn!(queue = %self.name, error = %err, "Connection error raised");
        let observers = lock(&self.observers).clone();
        for observer in observers {
            observer(&err);
        }
    }
}

#[async_trait]
impl EngineQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn add_job(
        &self,
        payload: JobPayload,
        options: JobOptions,
    ) -> Result<EnqueuedJob, EngineError> {
        let options = options.with_defaults(&self.default_job_options);
        let id = options
            .job_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut state = self.state.lock().await;
        if state.closed {
            return Err(EngineError::Closed(self.name.clone()));
        }

        state.enqueue(Job {
            id: id.clone(),
            queue: self.name.clone(),
            payload,
            options: options.clone(),
            attempts_made: 0,
        });
        drop(state);
        self.notify.notify_one();

        debug!(queue = %self.name, job_id = %id, "Job added");
        Ok(EnqueuedJob {
            id,
            queue: self.name.clone(),
            options,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        })
    }

    async fn process(&self, consumer: Arc<dyn JobConsumer>) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(EngineError::Closed(self.name.clone()));
        }
        if state.has_consumer {
            return Err(EngineError::AlreadyProcessing(self.name.clone()));
        }
        state.has_consumer = true;
        drop(state);

        let task = tokio::spawn(run_consumer(
            self.name.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.notify),
            consumer,
            self.stop.token(),
        ));
        *lock(&self.consumer_task) = Some(task);
        Ok(())
    }

    async fn obliterate(&self) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock().await;
            state.closed = true;
            state.waiting.clear();
            state.completed.clear();
            state.failed.clear();
        }
        self.stop.stop();

        let task = lock(&self.consumer_task).take();
        if let Some(mut task) = task {
            // The in-flight job (if any) gets `drain_grace` to finish
            match tokio::time::timeout(self.drain_grace, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(EngineError::Backend(format!(
                        "consumer for {} ended abnormally: {}",
                        self.name, e
                    )));
                }
                Err(_) => {
                    task.abort();
                    warn!(
                        queue = %self.name,
                        grace_ms = self.drain_grace.as_millis() as u64,
                        "Active job aborted on obliterate"
                    );
                    return Err(EngineError::Backend(format!(
                        "queue {} still had active jobs after {}ms",
                        self.name,
                        self.drain_grace.as_millis()
                    )));
                }
            }
        }

        info!(queue = %self.name, prefix = %self.prefix, "Queue obliterated");
        Ok(())
    }

    fn on_connection_error(&self, callback: ConnectionErrorCallback) {
        lock(&self.observers).push(callback);
    }
}

/// Consumer loop: one job at a time until the stop signal fires
async fn run_consumer(
    name: String,
    state: Arc<tokio::sync::Mutex<QueueState>>,
    notify: Arc<Notify>,
    consumer: Arc<dyn JobConsumer>,
    mut stop: StopToken,
) {
    info!(queue = %name, "Consumer started");
    loop {
        if stop.is_stopped() {
            break;
        }

        let next = state.lock().await.waiting.pop_front();
        match next {
            Some(job) => deliver(&name, &state, &consumer, job).await,
            None => {
                tokio::select! {
                    _ = notify.notified() => {},
                    _ = stop.stopped() => break,
                }
            }
        }
    }
    info!(queue = %name, "Consumer stopped");
}

struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn deliver(
    name: &str,
    state: &tokio::sync::Mutex<QueueState>,
    consumer: &Arc<dyn JobConsumer>,
    job: Job,
) {
    let handler = Arc::clone(consumer);
    let delivered = job.clone();
    let timeout_ms = job.options.timeout_ms;

    // Spawned so a panicking handler only fails its own job; aborted with
    // the consumer loop
    let mut run = AbortOnDrop(tokio::spawn(async move {
        match timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), handler.consume(delivered))
                .await
                .unwrap_or_else(|_| Err(HandlerError::failed(format!("timed out after {}ms", ms)))),
            None => handler.consume(delivered).await,
        }
    }));
    let outcome = (&mut run.0).await;

    let result = match outcome {
        Ok(result) => result,
        Err(join_err) => {
            error!(queue = %name, job_id = %job.id, "Handler panicked: {:?}", join_err);
            Err(HandlerError::failed("handler panicked"))
        }
    };

    let mut state = state.lock().await;
    if state.closed {
        return;
    }

    match result {
        Ok(()) => {
            debug!(queue = %name, job_id = %job.id, "Job completed");
            let policy = job.options.remove_on_complete;
            retain(&mut state.completed, job.id, policy);
        }
        Err(e) => {
            let attempts = job.options.attempts.unwrap_or(1);
            if job.attempts_made + 1 < attempts {
                debug!(
                    queue = %name,
                    job_id = %job.id,
                    attempt = job.attempts_made + 1,
                    error = %e,
                    "Job failed, requeued"
                );
                let mut retry = job;
                retry.attempts_made += 1;
                state.waiting.push_back(retry);
            } else {
                warn!(queue = %name, job_id = %job.id, error = %e, "Job failed");
                let policy = job.options.remove_on_fail;
                retain(&mut state.failed, (job.id, e.to_string()), policy);
            }
        }
    }
}
