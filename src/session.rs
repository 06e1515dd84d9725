use crate::analyzer::FormVerdict;
use crate::config::ExerciseMode;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Rep statistics for one tracking session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total: u64,
    pub good: u64,
    pub warnings: u64,
}

impl SessionStats {
    /// Share of good reps, `None` before the first rep
    pub fn accuracy(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.good as f64 / self.total as f64)
        }
    }

    /// Accuracy as a whole-number percentage for display
    pub fn accuracy_percent(&self) -> Option<f64> {
        self.accuracy().map(|a| (a * 100.0).round())
    }
}

/// Sole owner of the session counters; `record_rep` is the only mutation,
/// which keeps `good <= total`.
#[derive(Debug, Clone, Default)]
pub struct SessionAggregator {
    stats: SessionStats,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one completed rep. Warnings track valgus independently of the
    /// verdict.
    pub fn record_rep(&mut self, verdict: FormVerdict, has_valgus: bool) -> SessionStats {
        self.stats.total += 1;
        if verdict == FormVerdict::Good {
            self.stats.good += 1;
        }
        if has_valgus {
            self.stats.warnings += 1;
        }

        debug!(
            "Session stats: total={} good={} warnings={}",
            self.stats.total, self.stats.good, self.stats.warnings
        );
        self.stats
    }

    pub fn snapshot(&self) -> SessionStats {
        self.stats
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.stats.accuracy()
    }

    pub fn reset(&mut self) {
        self.stats = SessionStats::default();
    }
}

/// End-of-session report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub mode: ExerciseMode,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub ticks: u64,
    pub stats: SessionStats,
    pub accuracy_percent: Option<f64>,
}

impl SessionSummary {
    pub fn duration_seconds(&self) -> i64 {
        (self.ended_at - self.started_at).num_seconds()
    }
}
