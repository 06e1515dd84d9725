mod input;
mod orchestrator;
mod runtime;
mod types;

#[cfg(test)]
mod tests;

pub use input::{FrameSource, JsonLinesSource};
pub use orchestrator::SessionOrchestrator;
pub use runtime::{install_signal_handlers, lifecycle_events, spawn_event_logger, ShutdownHandle};
pub use types::{DriverCommand, OutputRecord, ShutdownReason, TickReport};
