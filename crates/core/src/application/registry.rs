// Queue Registry
// Insertion-ordered set of queue handles, at most one per name

use crate::application::factory::QueueFactory;
use crate::application::handle::QueueHandle;
use crate::error::{AppError, Result};
use crate::port::{EngineQueue, JobHandler};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

struct Entries<C> {
    handles: Vec<QueueHandle<C>>,
    // Set once by `close`; no handle is appended afterwards
    closed: bool,
}

/// Registry of live queues owned by one service instance.
///
/// Lookup is a linear scan; the expected number of distinct queues is small.
/// The handle list only ever grows.
pub struct QueueRegistry<C> {
    factory: QueueFactory,
    entries: Mutex<Entries<C>>,
}

impl<C> QueueRegistry<C> {
    pub fn new(factory: QueueFactory) -> Self {
        Self {
            factory,
            entries: Mutex::new(Entries {
                handles: Vec::new(),
                closed: false,
            }),
        }
    }

    pub fn factory(&self) -> &QueueFactory {
        &self.factory
    }

    /// First handle whose name equals `name`
    pub async fn find(&self, name: &str) -> Option<QueueHandle<C>> {
        self.entries
            .lock()
            .await
            .handles
            .iter()
            .find(|h| h.name() == name)
            .cloned()
    }

    /// Return the queue registered under `name`, creating it on first use.
    ///
    /// The lookup and the append happen under the same lock, held across the
    /// factory call, so concurrent callers never construct two queues for one
    /// name. A factory error propagates unchanged and nothing is appended.
    /// New handles start without a handler.
    ///
    /// # Errors
    /// - AppError::InvalidState once the registry is closed and `name` is unknown
    /// - AppError::QueueCreation / AppError::Config from the factory
    pub async fn get_or_create(&self, name: &str) -> Result<Arc<dyn EngineQueue>> {
        let mut entries = self.entries.lock().await;

        if let Some(existing) = entries.handles.iter().find(|h| h.name() == name) {
            debug!(queue = %name, "Reusing registered queue");
            return Ok(Arc::clone(existing.queue()));
        }

        if entries.closed {
            return Err(AppError::InvalidState(format!(
                "cannot create queue {} after the registry closed",
                name
            )));
        }

        let queue = self.factory.create(name).await?;
        entries
            .handles
            .push(QueueHandle::new(name, None, Arc::clone(&queue)));

        Ok(queue)
    }

    /// Record `handler` as the consumer bound to `name`, replacing any previous one
    pub async fn bind_handler(&self, name: &str, handler: Arc<dyn JobHandler<C>>) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.handles.iter_mut().find(|h| h.name() == name) {
            Some(handle) => {
                handle.set_handler(handler);
                true
            }
            None => false,
        }
    }

    /// Refuse new queues from now on and return every handle, in insertion order.
    ///
    /// The snapshot is taken under the same lock that guards creation, so no
    /// queue can be registered after it without being part of it.
    pub async fn close(&self) -> Vec<QueueHandle<C>> {
        let mut entries = self.entries.lock().await;
        entries.closed = true;
        entries.handles.clone()
    }

    pub async fn names(&self) -> Vec<String> {
        self.entries
            .lock()
            .await
            .handles
            .iter()
            .map(|h| h.name().to_string())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.handles.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.handles.is_empty()
    }
}
