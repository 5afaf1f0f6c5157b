// molecq Infrastructure - In-Memory Engine Adapter
// Implements: QueueEngine, EngineQueue

mod engine;
mod queue;
mod stop;

pub use engine::{CreatedQueue, MemoryEngine};
pub use queue::{JobCounts, MemoryQueue, DEFAULT_DRAIN_GRACE};

use std::sync::{Mutex, MutexGuard, PoisonError};

// State behind these locks stays consistent across a panicking holder
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
