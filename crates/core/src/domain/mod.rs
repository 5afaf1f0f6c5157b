// Domain Layer - Plain data: jobs, submission options, configuration

pub mod config;
pub mod job;
pub mod options;

// Re-exports
pub use config::{
    ConnectionParams, QueueOptions, QueueSettings, RateLimit, ResolvedConfig, ServiceConfig,
    ShutdownStrategy, DEFAULT_JOB_NAME,
};
pub use job::{EnqueuedJob, Job, JobId, JobPayload};
pub use options::{Backoff, BackoffKind, JobOptions, RemovePolicy};
