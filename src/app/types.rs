use crate::analyzer::{FormHighlight, MetricsSnapshot, RepEvent, RepPhase, TickOutcome};
use crate::config::ExerciseMode;
use crate::frame::PoseFrame;
use crate::session::{SessionStats, SessionSummary};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of driver input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DriverCommand {
    /// A tick with a detected subject
    Frame(PoseFrame),
    /// A tick where the pose estimator found nobody
    Absent,
    /// Switch exercise mode
    Mode { mode: ExerciseMode },
    /// Clear the session
    Reset,
}

impl DriverCommand {
    /// Whether this command advances the tick counter
    pub fn is_tick(&self) -> bool {
        matches!(self, DriverCommand::Frame(_) | DriverCommand::Absent)
    }
}

/// Per-tick output line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub session_id: Uuid,
    pub tick: u64,
    pub mode: ExerciseMode,
    pub metrics: Option<MetricsSnapshot>,
    pub highlight: Option<FormHighlight>,
    pub smoothed_angle: Option<f64>,
    pub phase: RepPhase,
    pub rep: Option<RepEvent>,
    pub session: SessionStats,
    pub accuracy_percent: Option<f64>,
}

impl TickReport {
    pub fn from_outcome(outcome: TickOutcome, symmetry_warning_below: f64) -> Self {
        let highlight = outcome
            .snapshot
            .as_ref()
            .map(|s| s.form_highlight(symmetry_warning_below));

        Self {
            session_id: outcome.session_id,
            tick: outcome.tick,
            mode: outcome.mode,
            highlight,
            metrics: outcome.snapshot,
            smoothed_angle: outcome.smoothed_angle,
            phase: outcome.phase,
            rep: outcome.rep,
            accuracy_percent: outcome.stats.accuracy_percent(),
            session: outcome.stats,
        }
    }
}

/// Everything the runner writes to its output stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputRecord {
    Tick(TickReport),
    Summary(SessionSummary),
}

/// Why a session run stopped
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    /// The input stream ended
    InputExhausted,
    /// An OS signal arrived
    Signal(String),
    /// A fatal input or output error
    Error(String),
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::InputExhausted => write!(f, "input exhausted"),
            ShutdownReason::Signal(name) => write!(f, "signal {}", name),
            ShutdownReason::Error(message) => write!(f, "error: {}", message),
        }
    }
}
