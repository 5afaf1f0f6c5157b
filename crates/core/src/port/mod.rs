// Port Layer - Interfaces for external dependencies

pub mod job_handler;
pub mod queue_engine;

// Re-exports
pub use job_handler::{handler_fn, BoundHandler, HandlerError, JobHandler};
pub use queue_engine::{
    ConnectionErrorCallback, EngineError, EngineQueue, JobConsumer, QueueEngine,
};
