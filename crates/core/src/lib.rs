// molecq Core - Queue Registry, Dispatch Lifecycle & Engine Ports
// NO backing-store dependencies: the queue engine is reached only through ports

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
