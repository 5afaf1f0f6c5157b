// Application Layer - Use Cases and Lifecycle

pub mod dispatch;
pub mod factory;
pub mod handle;
pub mod registry;
pub mod submit;

// Re-exports
pub use dispatch::{DrainFailure, QueueService, ServiceState, ShutdownReport};
pub use factory::QueueFactory;
pub use handle::{QueueDeclaration, QueueHandle};
pub use registry::QueueRegistry;
pub use submit::submission_defaults;
