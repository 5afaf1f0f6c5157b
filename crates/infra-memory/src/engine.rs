// In-Memory Queue Engine
// Implements: QueueEngine

use crate::lock;
use crate::queue::MemoryQueue;
use async_trait::async_trait;
use molecq_core::domain::{ConnectionParams, QueueOptions};
use molecq_core::port::{EngineError, EngineQueue, QueueEngine};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Recorded queue construction
#[derive(Debug, Clone)]
pub struct CreatedQueue {
    pub name: String,
    pub connection: ConnectionParams,
    pub options: QueueOptions,
}

/// Queue engine that keeps every queue in process memory.
///
/// Each `create_queue` call builds a fresh queue, even for a name seen
/// before; deduplication is the caller's job.
#[derive(Default)]
pub struct MemoryEngine {
    queues: Mutex<Vec<(CreatedQueue, Arc<MemoryQueue>)>>,
    rejected: Mutex<HashSet<String>>,
    drain_grace: Option<Duration>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time each queue's `obliterate` grants an in-flight job before
    /// aborting it (default `DEFAULT_DRAIN_GRACE`)
    pub fn with_drain_grace(grace: Duration) -> Self {
        Self {
            drain_grace: Some(grace),
            ..Self::default()
        }
    }

    /// Refuse to construct queues named `name`
    pub fn reject_queue(&self, name: impl Into<String>) {
        lock(&self.rejected).insert(name.into());
    }

    pub fn created_count(&self) -> usize {
        lock(&self.queues).len()
    }

    pub fn created(&self) -> Vec<CreatedQueue> {
        lock(&self.queues).iter().map(|(c, _)| c.clone()).collect()
    }

    /// Most recently created queue named `name`
    pub fn queue(&self, name: &str) -> Option<Arc<MemoryQueue>> {
        lock(&self.queues)
            .iter()
            .rev()
            .find(|(c, _)| c.name == name)
            .map(|(_, q)| Arc::clone(q))
    }

    fn validate(
        &self,
        name: &str,
        connection: &ConnectionParams,
        options: &QueueOptions,
    ) -> Result<(), EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidOptions("queue name is empty".to_string()));
        }
        if options.prefix.trim().is_empty() {
            return Err(EngineError::InvalidOptions("prefix is empty".to_string()));
        }
        if connection.host.trim().is_empty() || connection.port == 0 {
            return Err(EngineError::InvalidOptions(format!(
                "invalid connection {}:{}",
                connection.host, connection.port
            )));
        }
        if let Some(limiter) = &options.limiter {
            if limiter.max == 0 || limiter.duration_ms == 0 {
                return Err(EngineError::InvalidOptions(
                    "limiter requires max and duration greater than zero".to_string(),
                ));
            }
        }
        if lock(&self.rejected).contains(name) {
            return Err(EngineError::InvalidOptions(format!("queue {} rejected", name)));
        }
        Ok(())
    }
}

#[async_trait]
impl QueueEngine for MemoryEngine {
    async fn create_queue(
        &self,
        name: &str,
        connection: &ConnectionParams,
        options: &QueueOptions,
    ) -> Result<Arc<dyn EngineQueue>, EngineError> {
        if let Err(e) = self.validate(name, connection, options) {
            warn!(queue = %name, error = %e, "Queue construction refused");
            return Err(e);
        }

        let mut queue = MemoryQueue::new(name, options);
        if let Some(grace) = self.drain_grace {
            queue = queue.with_drain_grace(grace);
        }
        let queue = Arc::new(queue);
        lock(&self.queues).push((
            CreatedQueue {
                name: name.to_string(),
                connection: connection.clone(),
                options: options.clone(),
            },
            Arc::clone(&queue),
        ));

        debug!(queue = %name, prefix = %options.prefix, "Memory queue constructed");
        Ok(queue)
    }
}
