pub mod analyzer;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod geometry;
pub mod session;

pub use analyzer::{
    classify, Cue, DepthLabel, EngineHandle, FormHighlight, FormVerdict, MetricsSnapshot,
    MotionEngine, RepEvent, RepPhase, TickOutcome,
};
pub use app::{
    DriverCommand, FrameSource, JsonLinesSource, OutputRecord, SessionOrchestrator,
    ShutdownHandle, ShutdownReason, TickReport,
};
pub use config::{ExerciseMode, NeuroStrideConfig, ValgusConfig};
pub use error::{EventBusError, NeuroStrideError, Result};
pub use events::{CoachEvent, EventBus, EventFilter, EventReceiver};
pub use frame::{Landmark, LandmarkName, PoseFrame};
pub use geometry::Point;
pub use session::{SessionAggregator, SessionStats, SessionSummary};
