// Submit Use Case

use crate::application::registry::QueueRegistry;
use crate::domain::{EnqueuedJob, JobOptions, JobPayload, RemovePolicy};
use crate::error::Result;
use tracing::debug;

/// Options every submission inherits unless the caller sets the same key:
/// finished and failed jobs are purged from the backing store.
pub fn submission_defaults() -> JobOptions {
    JobOptions::new()
        .remove_on_complete(RemovePolicy::Remove(true))
        .remove_on_fail(RemovePolicy::Remove(true))
}

/// Execute submit use case
///
/// Resolves the queue by name only; it never creates one. An unknown name
/// yields `Ok(None)` without any engine call.
///
/// # Arguments
///
/// * `registry` - Registry owning the target queue
/// * `name` - Queue name
/// * `payload` - Job payload
/// * `options` - Caller options, merged over `submission_defaults()`
pub async fn execute<C>(
    registry: &QueueRegistry<C>,
    name: &str,
    payload: JobPayload,
    options: JobOptions,
) -> Result<Option<EnqueuedJob>> {
    let options = options.with_defaults(&submission_defaults());

    let handle = match registry.find(name).await {
        Some(h) => h,
        None => {
            debug!(queue = %name, "Submission to unknown queue ignored");
            return Ok(None);
        }
    };

    let job = handle.queue().add_job(payload, options).await?;
    debug!(queue = %name, job_id = %job.id, "Job submitted");

    Ok(Some(job))
}
