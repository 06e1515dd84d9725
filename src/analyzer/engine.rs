use crate::analyzer::classifier::{classify, FormVerdict};
use crate::analyzer::metrics::{DepthLabel, MetricsCalculator, MetricsSnapshot};
use crate::analyzer::repetition::{RepPhase, RepStateMachine, RepTransition};
use crate::analyzer::smoother::MovingAverage;
use crate::config::{ExerciseMode, NeuroStrideConfig};
use crate::error::Result;
use crate::frame::PoseFrame;
use crate::session::{SessionAggregator, SessionStats, SessionSummary};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// A completed repetition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepEvent {
    /// 1-based rep number within the session
    pub number: u64,
    pub verdict: FormVerdict,
    /// Smoothed angle that crossed the up threshold
    pub completed_at_angle: f64,
    /// Lowest raw knee angle seen while Down
    pub bottom_angle: Option<f64>,
    /// Deepest depth label reached during the rep
    pub depth_label: DepthLabel,
    /// Valgus was flagged on at least one tick of the rep
    pub had_valgus: bool,
    pub stats: SessionStats,
}

/// Everything one tick produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickOutcome {
    /// Session the tick was counted in
    pub session_id: Uuid,
    pub tick: u64,
    pub mode: ExerciseMode,
    /// `None` when no subject was detected this tick
    pub snapshot: Option<MetricsSnapshot>,
    pub smoothed_angle: Option<f64>,
    pub phase: RepPhase,
    pub rep: Option<RepEvent>,
    pub stats: SessionStats,
}

/// Extremes observed while a rep is in its Down phase
#[derive(Debug, Clone, Copy, Default)]
struct RepProgress {
    bottom_angle: Option<f64>,
    deepest: DepthLabel,
    had_valgus: bool,
}

impl RepProgress {
    fn observe(&mut self, snapshot: &MetricsSnapshot) {
        if let Some(angle) = snapshot.knee_angle_avg {
            self.bottom_angle = Some(self.bottom_angle.map_or(angle, |b| b.min(angle)));
        }
        self.deepest = self.deepest.deepest(snapshot.depth_label);
        self.had_valgus |= snapshot.has_knee_valgus;
    }
}

/// Per-session motion analysis pipeline.
///
/// Frame → metrics → smoothed knee angle → rep state machine → classifier →
/// session statistics, all synchronously within `process`.
pub struct MotionEngine {
    config: NeuroStrideConfig,
    calculator: MetricsCalculator,
    mode: ExerciseMode,
    smoother: MovingAverage,
    reps: RepStateMachine,
    progress: Option<RepProgress>,
    aggregator: SessionAggregator,
    last_depth: DepthLabel,
    session_id: Uuid,
    started_at: DateTime<Utc>,
    ticks: u64,
}

impl MotionEngine {
    /// Build an engine; refuses to start from an invalid configuration
    pub fn new(config: NeuroStrideConfig) -> Result<Self> {
        config.validate()?;

        let mode = config.engine.mode;
        let engine = Self {
            calculator: MetricsCalculator::new(&config),
            smoother: MovingAverage::new(config.engine.smoothing_window),
            reps: RepStateMachine::new(&config.rep_thresholds(mode)),
            progress: None,
            aggregator: SessionAggregator::new(),
            last_depth: DepthLabel::Unknown,
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ticks: 0,
            mode,
            config,
        };

        info!(
            "Motion engine initialized in {} mode (session {})",
            engine.mode, engine.session_id
        );
        Ok(engine)
    }

    pub fn config(&self) -> &NeuroStrideConfig {
        &self.config
    }

    pub fn mode(&self) -> ExerciseMode {
        self.mode
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn phase(&self) -> RepPhase {
        self.reps.phase()
    }

    pub fn stats(&self) -> SessionStats {
        self.aggregator.snapshot()
    }

    /// Number of samples currently in the smoothing window
    pub fn smoothing_len(&self) -> usize {
        self.smoother.len()
    }

    /// Process one tick. `None` means no subject was detected; that leaves
    /// all session state untouched.
    pub fn process(&mut self, frame: Option<&PoseFrame>) -> TickOutcome {
        self.ticks += 1;

        let Some(frame) = frame else {
            debug!("Tick {}: no subject detected", self.ticks);
            return self.outcome(None, None, None);
        };

        let snapshot = self.calculator.compute(frame, self.mode, self.last_depth);
        self.last_depth = snapshot.depth_label;

        let thresholds = self.config.rep_thresholds(self.mode);
        let mut smoothed_angle = None;
        let mut rep = None;

        if let (true, Some(angle)) = (thresholds.enabled, snapshot.knee_angle_avg) {
            let smoothed = self.smoother.push(angle);
            smoothed_angle = Some(smoothed);

            match self.reps.update(smoothed) {
                RepTransition::Descended => {
                    let mut progress = RepProgress::default();
                    progress.observe(&snapshot);
                    self.progress = Some(progress);
                }
                RepTransition::Completed => {
                    let mut progress = self.progress.take().unwrap_or_default();
                    progress.observe(&snapshot);
                    rep = Some(self.complete_rep(&snapshot, smoothed, progress));
                }
                RepTransition::None => {
                    if let Some(progress) = self.progress.as_mut() {
                        progress.observe(&snapshot);
                    }
                }
            }
        }

        debug!(
            "Tick {}: knee={:?} smoothed={:?} phase={:?} cue={}",
            self.ticks,
            snapshot.knee_angle_avg,
            smoothed_angle,
            self.reps.phase(),
            snapshot.cue
        );

        self.outcome(Some(snapshot), smoothed_angle, rep)
    }

    fn complete_rep(
        &mut self,
        snapshot: &MetricsSnapshot,
        smoothed: f64,
        progress: RepProgress,
    ) -> RepEvent {
        // Grade the rep on what it reached, not just the standing frame
        let graded = MetricsSnapshot {
            depth_label: progress.deepest,
            has_knee_valgus: progress.had_valgus,
            ..snapshot.clone()
        };
        let verdict = classify(&graded);
        let stats = self.aggregator.record_rep(verdict, progress.had_valgus);

        info!(
            "Rep {} complete: {:?}, depth {}, bottom {:?}°, valgus {}",
            stats.total, verdict, progress.deepest, progress.bottom_angle, progress.had_valgus
        );

        RepEvent {
            number: stats.total,
            verdict,
            completed_at_angle: smoothed,
            bottom_angle: progress.bottom_angle,
            depth_label: progress.deepest,
            had_valgus: progress.had_valgus,
            stats,
        }
    }

    fn outcome(
        &self,
        snapshot: Option<MetricsSnapshot>,
        smoothed_angle: Option<f64>,
        rep: Option<RepEvent>,
    ) -> TickOutcome {
        TickOutcome {
            session_id: self.session_id,
            tick: self.ticks,
            mode: self.mode,
            snapshot,
            smoothed_angle,
            phase: self.reps.phase(),
            rep,
            stats: self.aggregator.snapshot(),
        }
    }

    /// Switch exercise mode, starting a fresh session. Returns `false` when
    /// already in `mode`.
    pub fn set_mode(&mut self, mode: ExerciseMode) -> bool {
        if mode == self.mode {
            debug!("Mode already {}, ignoring switch", mode);
            return false;
        }

        info!("Switching mode {} -> {}", self.mode, mode);
        self.mode = mode;
        self.reps.reconfigure(&self.config.rep_thresholds(mode));
        self.reset();
        true
    }

    /// Clear smoothing, rep phase, previous angle and statistics, and start
    /// a new session
    pub fn reset(&mut self) {
        self.smoother.reset();
        self.reps.reset();
        self.progress = None;
        self.aggregator.reset();
        self.last_depth = DepthLabel::Unknown;
        self.session_id = Uuid::new_v4();
        self.started_at = Utc::now();
        self.ticks = 0;

        info!("Session reset (new session {})", self.session_id);
    }

    pub fn summary(&self) -> SessionSummary {
        let stats = self.aggregator.snapshot();
        SessionSummary {
            session_id: self.session_id,
            mode: self.mode,
            started_at: self.started_at,
            ended_at: Utc::now(),
            ticks: self.ticks,
            stats,
            accuracy_percent: stats.accuracy_percent(),
        }
    }
}

/// Shared engine for drivers and controllers running on different tasks.
///
/// Every call holds the lock for its whole duration, so a reset or mode
/// switch is never observed half-done by a tick.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<Mutex<MotionEngine>>,
}

impl EngineHandle {
    pub fn new(engine: MotionEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn process(&self, frame: Option<&PoseFrame>) -> TickOutcome {
        self.inner.lock().process(frame)
    }

    pub fn set_mode(&self, mode: ExerciseMode) -> bool {
        self.inner.lock().set_mode(mode)
    }

    /// Switch mode and report the previous mode and the new session id, read
    /// under the same lock. `None` when already in `mode`.
    pub fn switch_mode(&self, mode: ExerciseMode) -> Option<(ExerciseMode, Uuid)> {
        let mut engine = self.inner.lock();
        let from = engine.mode();
        engine.set_mode(mode).then(|| (from, engine.session_id()))
    }

    /// Reset and return the new session id
    pub fn reset(&self) -> Uuid {
        let mut engine = self.inner.lock();
        engine.reset();
        engine.session_id()
    }

    pub fn mode(&self) -> ExerciseMode {
        self.inner.lock().mode()
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.lock().session_id()
    }

    pub fn stats(&self) -> SessionStats {
        self.inner.lock().stats()
    }

    pub fn summary(&self) -> SessionSummary {
        self.inner.lock().summary()
    }

    /// Symmetry threshold used for form highlighting
    pub fn symmetry_warning_below(&self) -> f64 {
        self.inner.lock().config().gait.symmetry_warning_below
    }
}
