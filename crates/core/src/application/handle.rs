// Queue Handle & Declaration

use crate::port::{EngineQueue, JobHandler};
use std::sync::Arc;

/// One named queue: its name, the handler `start` bound to it (if any) and
/// the live engine queue
pub struct QueueHandle<C> {
    name: String,
    handler: Option<Arc<dyn JobHandler<C>>>,
    queue: Arc<dyn EngineQueue>,
}

impl<C> QueueHandle<C> {
    pub fn new(
        name: impl Into<String>,
        handler: Option<Arc<dyn JobHandler<C>>>,
        queue: Arc<dyn EngineQueue>,
    ) -> Self {
        Self {
            name: name.into(),
            handler,
            queue,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> Option<&Arc<dyn JobHandler<C>>> {
        self.handler.as_ref()
    }

    pub fn queue(&self) -> &Arc<dyn EngineQueue> {
        &self.queue
    }

    pub(crate) fn set_handler(&mut self, handler: Arc<dyn JobHandler<C>>) {
        self.handler = Some(handler);
    }
}

impl<C> Clone for QueueHandle<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            handler: self.handler.clone(),
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<C> std::fmt::Debug for QueueHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueHandle")
            .field("name", &self.name)
            .field("prefix", &self.queue.prefix())
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

/// Host-declared queue. Either field may be missing; such entries are
/// skipped at startup rather than rejected.
pub struct QueueDeclaration<C> {
    pub name: Option<String>,
    pub handler: Option<Arc<dyn JobHandler<C>>>,
}

impl<C> QueueDeclaration<C> {
    pub fn new(name: impl Into<String>, handler: Arc<dyn JobHandler<C>>) -> Self {
        Self {
            name: Some(name.into()),
            handler: Some(handler),
        }
    }

    /// Declaration without a consumer (queue used for submission only)
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            handler: None,
        }
    }

    /// Name, if present and non-empty
    pub fn valid_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

impl<C> Clone for QueueDeclaration<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            handler: self.handler.clone(),
        }
    }
}
