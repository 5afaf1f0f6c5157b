// Queue Engine Port
// Boundary to the durable, backing-store-based queue engine (not reimplemented here)

use crate::domain::{ConnectionParams, EnqueuedJob, Job, JobOptions, JobPayload, QueueOptions};
use crate::port::job_handler::HandlerError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by the backing engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid queue options: {0}")]
    InvalidOptions(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Queue {0} already has a consumer")]
    AlreadyProcessing(String),

    #[error("Queue {0} is closed")]
    Closed(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Observer for asynchronous connection-level errors
pub type ConnectionErrorCallback = Arc<dyn Fn(&EngineError) + Send + Sync>;

/// Sole consumer of a queue's jobs.
///
/// `Ok(())` signals completion to the engine, `Err` signals failure; what the
/// engine does with a failure (retry, backoff, removal) is its own policy.
#[async_trait]
pub trait JobConsumer: Send + Sync {
    async fn consume(&self, job: Job) -> Result<(), HandlerError>;
}

/// One named queue living in the backing engine
#[async_trait]
pub trait EngineQueue: Send + Sync {
    /// Queue name
    fn name(&self) -> &str;

    /// Key prefix the queue was constructed with
    fn prefix(&self) -> &str;

    /// Add a job and return the engine's pending-job handle
    async fn add_job(
        &self,
        payload: JobPayload,
        options: JobOptions,
    ) -> Result<EnqueuedJob, EngineError>;

    /// Register the sole consumer for this queue
    ///
    /// # Errors
    /// - EngineError::AlreadyProcessing if a consumer is already registered
    async fn process(&self, consumer: Arc<dyn JobConsumer>) -> Result<(), EngineError>;

    /// Remove every stored job and de-register the queue from the backing store
    async fn obliterate(&self) -> Result<(), EngineError>;

    /// Subscribe to connection-level errors raised after construction
    fn on_connection_error(&self, callback: ConnectionErrorCallback);
}

/// Factory side of the backing engine
#[async_trait]
pub trait QueueEngine: Send + Sync {
    /// Construct a named queue bound to the backing store
    ///
    /// # Arguments
    /// * `name` - Queue name
    /// * `connection` - Backing-store connection parameters
    /// * `options` - Queue-level configuration (never carries the connection)
    async fn create_queue(
        &self,
        name: &str,
        connection: &ConnectionParams,
        options: &QueueOptions,
    ) -> Result<Arc<dyn EngineQueue>, EngineError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Recorded `create_queue` call
    #[derive(Debug, Clone)]
    pub struct CreateCall {
        pub name: String,
        pub connection: ConnectionParams,
        pub options: QueueOptions,
    }

    #[derive(Default)]
    struct EngineState {
        creates: Vec<CreateCall>,
        queues: Vec<Arc<MockQueue>>,
        rejected: HashSet<String>,
        failing_obliterate: HashSet<String>,
    }

    /// Mock engine that records every call
    #[derive(Default)]
    pub struct MockQueueEngine {
        state: Mutex<EngineState>,
        create_delay: Option<Duration>,
    }

    impl MockQueueEngine {
        pub fn new() -> Self {
            Self::default()
        }

        /// Sleep inside `create_queue` (widens race windows in concurrency tests)
        pub fn with_create_delay(delay: Duration) -> Self {
            Self {
                create_delay: Some(delay),
                ..Self::default()
            }
        }

        /// Make `create_queue` fail for `name`
        pub fn reject(&self, name: impl Into<String>) {
            self.state.lock().unwrap().rejected.insert(name.into());
        }

        /// Make `obliterate` fail for the queue named `name`
        pub fn fail_obliterate(&self, name: impl Into<String>) {
            self.state
                .lock()
                .unwrap()
                .failing_obliterate
                .insert(name.into());
        }

        pub fn create_count(&self) -> usize {
            self.state.lock().unwrap().creates.len()
        }

        pub fn creates(&self) -> Vec<CreateCall> {
            self.state.lock().unwrap().creates.clone()
        }

        pub fn queue(&self, name: &str) -> Option<Arc<MockQueue>> {
            self.state
                .lock()
                .unwrap()
                .queues
                .iter()
                .find(|q| q.name == name)
                .cloned()
        }

        pub fn total_adds(&self) -> usize {
            self.state
                .lock()
                .unwrap()
                .queues
                .iter()
                .map(|q| q.add_count())
                .sum()
        }
    }

    #[async_trait]
    impl QueueEngine for MockQueueEngine {
        async fn create_queue(
            &self,
            name: &str,
            connection: &ConnectionParams,
            options: &QueueOptions,
        ) -> Result<Arc<dyn EngineQueue>, EngineError> {
            if let Some(delay) = self.create_delay {
                tokio::time::sleep(delay).await;
            }

            let mut state = self.state.lock().unwrap();
            state.creates.push(CreateCall {
                name: name.to_string(),
                connection: connection.clone(),
                options: options.clone(),
            });

            if state.rejected.contains(name) {
                return Err(EngineError::InvalidOptions(format!("rejected {}", name)));
            }

            let queue = Arc::new(MockQueue {
                name: name.to_string(),
                prefix: options.prefix.clone(),
                fail_obliterate: state.failing_obliterate.contains(name),
                adds: Mutex::new(Vec::new()),
                consumer: Mutex::new(None),
                obliterate_calls: Mutex::new(0),
                observers: Mutex::new(Vec::new()),
            });
            state.queues.push(Arc::clone(&queue));
            Ok(queue)
        }
    }

    /// Mock queue that records adds, consumer registration and drains
    pub struct MockQueue {
        name: String,
        prefix: String,
        fail_obliterate: bool,
        adds: Mutex<Vec<(JobPayload, JobOptions)>>,
        consumer: Mutex<Option<Arc<dyn JobConsumer>>>,
        obliterate_calls: Mutex<usize>,
        observers: Mutex<Vec<ConnectionErrorCallback>>,
    }

    impl MockQueue {
        pub fn adds(&self) -> Vec<(JobPayload, JobOptions)> {
            self.adds.lock().unwrap().clone()
        }

        pub fn add_count(&self) -> usize {
            self.adds.lock().unwrap().len()
        }

        pub fn has_consumer(&self) -> bool {
            self.consumer.lock().unwrap().is_some()
        }

        pub fn obliterate_count(&self) -> usize {
            *self.obliterate_calls.lock().unwrap()
        }

        /// Push a job straight into the registered consumer
        pub async fn deliver(&self, job: Job) -> Option<Result<(), HandlerError>> {
            let consumer = self.consumer.lock().unwrap().clone();
            match consumer {
                Some(c) => Some(c.consume(job).await),
                None => None,
            }
        }

        /// Fire a connection error at every registered observer
        pub fn emit_connection_error(&self, error: EngineError) {
            let observers = self.observers.lock().unwrap().clone();
            for observer in observers {
                observer(&error);
            }
        }
    }

    #[async_trait]
    impl EngineQueue for MockQueue {
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
            let mut adds = self.adds.lock().unwrap();
            adds.push((payload, options.clone()));
            Ok(EnqueuedJob {
                id: format!("{}-{}", self.name, adds.len()),
                queue: self.name.clone(),
                options,
                timestamp_ms: 0,
            })
        }

        async fn process(&self, consumer: Arc<dyn JobConsumer>) -> Result<(), EngineError> {
            let mut slot = self.consumer.lock().unwrap();
            if slot.is_some() {
                return Err(EngineError::AlreadyProcessing(self.name.clone()));
            }
            *slot = Some(consumer);
            Ok(())
        }

        async fn obliterate(&self) -> Result<(), EngineError> {
            *self.obliterate_calls.lock().unwrap() += 1;
            if self.fail_obliterate {
                return Err(EngineError::Backend(format!(
                    "obliterate failed for {}",
                    self.name
                )));
            }
            Ok(())
        }

        fn on_connection_error(&self, callback: ConnectionErrorCallback) {
            self.observers.lock().unwrap().push(callback);
        }
    }
}
