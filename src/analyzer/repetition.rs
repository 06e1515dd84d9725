use crate::config::RepThresholds;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Movement phase of the tracked joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepPhase {
    #[default]
    Up,
    Down,
}

/// Result of feeding one smoothed sample to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepTransition {
    /// No phase change
    None,
    /// Up → Down
    Descended,
    /// Down → Up, one rep completed
    Completed,
}

/// Up/Down phase tracker with hysteresis on a single scalar signal.
///
/// The previous sample lives here and only advances through `update`; no
/// transition can fire on the very first sample.
#[derive(Debug, Clone)]
pub struct RepStateMachine {
    down_below: f64,
    up_above: f64,
    phase: RepPhase,
    previous: Option<f64>,
}

impl RepStateMachine {
    /// `thresholds.down` must be below `thresholds.up`; config validation
    /// enforces it
    pub fn new(thresholds: &RepThresholds) -> Self {
        Self {
            down_below: thresholds.down,
            up_above: thresholds.up,
            phase: RepPhase::Up,
            previous: None,
        }
    }

    pub fn phase(&self) -> RepPhase {
        self.phase
    }

    pub fn previous(&self) -> Option<f64> {
        self.previous
    }

    /// Advance with this tick's smoothed value
    pub fn update(&mut self, smoothed: f64) -> RepTransition {
        let had_previous = self.previous.replace(smoothed).is_some();
        if !had_previous {
            return RepTransition::None;
        }

        match self.phase {
            RepPhase::Up if smoothed < self.down_below => {
                self.phase = RepPhase::Down;
                debug!("Rep phase Up -> Down at {:.1}°", smoothed);
                RepTransition::Descended
            }
            RepPhase::Down if smoothed > self.up_above => {
                self.phase = RepPhase::Up;
                debug!("Rep phase Down -> Up at {:.1}°, rep complete", smoothed);
                RepTransition::Completed
            }
            _ => RepTransition::None,
        }
    }

    /// Back to Up with no previous sample
    pub fn reset(&mut self) {
        self.phase = RepPhase::Up;
        self.previous = None;
    }

    /// Swap thresholds and restart from Up
    pub fn reconfigure(&mut self, thresholds: &RepThresholds) {
        self.down_below = thresholds.down;
        self.up_above = thresholds.up;
        self.reset();
    }
}
