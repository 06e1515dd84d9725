mod classifier;
mod engine;
mod metrics;
mod repetition;
mod smoother;

pub use classifier::{classify, FormVerdict};
pub use engine::{EngineHandle, MotionEngine, RepEvent, TickOutcome};
pub use metrics::{
    detect_knee_valgus, Cue, DepthLabel, FormHighlight, MetricsCalculator, MetricsSnapshot,
};
pub use repetition::{RepPhase, RepStateMachine, RepTransition};
pub use smoother::MovingAverage;
