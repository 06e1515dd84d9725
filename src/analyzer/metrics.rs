use crate::config::{ExerciseMode, GaitConfig, NeuroStrideConfig, SquatConfig, ValgusConfig};
use crate::frame::{Legs, LowerBody, PoseFrame};
use crate::geometry::{angle, average};

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// Squat depth bucket derived from the bilateral knee angle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DepthLabel {
    Deep,
    Moderate,
    Shallow,
    #[default]
    Unknown,
}

impl DepthLabel {
    /// Ordering used to keep the deepest label of a rep; Unknown ranks lowest
    pub fn depth_rank(&self) -> u8 {
        match self {
            DepthLabel::Unknown => 0,
            DepthLabel::Shallow => 1,
            DepthLabel::Moderate => 2,
            DepthLabel::Deep => 3,
        }
    }

    /// The deeper of two labels
    pub fn deepest(self, other: DepthLabel) -> DepthLabel {
        if other.depth_rank() > self.depth_rank() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for DepthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepthLabel::Deep => f.write_str("Deep"),
            DepthLabel::Moderate => f.write_str("Moderate"),
            DepthLabel::Shallow => f.write_str("Shallow"),
            DepthLabel::Unknown => f.write_str("-"),
        }
    }
}

/// Coaching cue shown to the athlete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cue {
    #[serde(rename = "face camera")]
    FaceCamera,
    #[serde(rename = "keep knees outward")]
    KeepKneesOutward,
    #[serde(rename = "go deeper")]
    GoDeeper,
    #[serde(rename = "don't go too deep")]
    DontGoTooDeep,
    #[serde(rename = "great form")]
    GreatForm,
    #[serde(rename = "improve knee alignment")]
    ImproveKneeAlignment,
    #[serde(rename = "walk naturally")]
    WalkNaturally,
    #[serde(rename = "increase width")]
    IncreaseWidth,
    #[serde(rename = "reduce width")]
    ReduceWidth,
    #[serde(rename = "good width")]
    GoodWidth,
    #[serde(rename = "improve symmetry")]
    ImproveSymmetry,
}

impl Cue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cue::FaceCamera => "face camera",
            Cue::KeepKneesOutward => "keep knees outward",
            Cue::GoDeeper => "go deeper",
            Cue::DontGoTooDeep => "don't go too deep",
            Cue::GreatForm => "great form",
            Cue::ImproveKneeAlignment => "improve knee alignment",
            Cue::WalkNaturally => "walk naturally",
            Cue::IncreaseWidth => "increase width",
            Cue::ReduceWidth => "reduce width",
            Cue::GoodWidth => "good width",
            Cue::ImproveSymmetry => "improve symmetry",
        }
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Skeleton colouring category for display layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormHighlight {
    Good,
    NeedsImprovement,
    InjuryRisk,
}

/// Metrics derived from one pose frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub mode: ExerciseMode,
    pub left_knee_angle: Option<f64>,
    pub right_knee_angle: Option<f64>,
    pub knee_angle_avg: Option<f64>,
    pub hip_angle_avg: Option<f64>,
    /// Ankle separation as a percentage of the reference width
    pub step_width: Option<f64>,
    pub symmetry: Option<f64>,
    pub has_knee_valgus: bool,
    pub depth_label: DepthLabel,
    pub cue: Cue,
}

impl MetricsSnapshot {
    /// Colour category, given the symmetry warning threshold in use
    pub fn form_highlight(&self, symmetry_warning_below: f64) -> FormHighlight {
        if self.has_knee_valgus {
            FormHighlight::InjuryRisk
        } else if self.depth_label == DepthLabel::Shallow
            || self.symmetry.is_some_and(|s| s < symmetry_warning_below)
        {
            FormHighlight::NeedsImprovement
        } else {
            FormHighlight::Good
        }
    }
}

/// Per-frame metrics derivation.
///
/// Holds only configuration; `compute` is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    confidence_threshold: f64,
    reference_width: f64,
    valgus: ValgusConfig,
    squat: SquatConfig,
    gait: GaitConfig,
}

impl MetricsCalculator {
    pub fn new(config: &NeuroStrideConfig) -> Self {
        Self {
            confidence_threshold: config.engine.confidence_threshold,
            reference_width: config.engine.reference_width,
            valgus: config.valgus,
            squat: config.squat.clone(),
            gait: config.gait.clone(),
        }
    }

    /// Derive a snapshot from `frame`.
    ///
    /// `previous_depth` is the depth label of the last snapshot; a squat
    /// frame showing valgus keeps it instead of computing a new one.
    pub fn compute(
        &self,
        frame: &PoseFrame,
        mode: ExerciseMode,
        previous_depth: DepthLabel,
    ) -> MetricsSnapshot {
        let body = LowerBody::extract(frame, self.confidence_threshold);

        let left_knee_angle = angle(body.left_hip, body.left_knee, body.left_ankle);
        let right_knee_angle = angle(body.right_hip, body.right_knee, body.right_ankle);
        let knee_angle_avg = average(&[left_knee_angle, right_knee_angle]);

        let left_hip_angle = angle(body.left_shoulder, body.left_hip, body.left_knee);
        let right_hip_angle = angle(body.right_shoulder, body.right_hip, body.right_knee);
        let hip_angle_avg = average(&[left_hip_angle, right_hip_angle]);

        let has_knee_valgus = body
            .legs()
            .is_some_and(|legs| detect_knee_valgus(&legs, &self.valgus));

        let step_width = match (body.left_ankle, body.right_ankle) {
            (Some(left), Some(right)) => {
                Some((left.x - right.x).abs() / self.reference_width * 100.0)
            }
            _ => None,
        };

        let symmetry = match (left_knee_angle, right_knee_angle) {
            (Some(left), Some(right)) => Some((100.0 - (left - right).abs()).max(0.0)),
            _ => None,
        };

        let (cue, depth_label) = match mode {
            ExerciseMode::Squat => self.squat_cue(knee_angle_avg, has_knee_valgus, previous_depth),
            ExerciseMode::Walk => (
                self.gait_cue(step_width, symmetry, has_knee_valgus),
                DepthLabel::Unknown,
            ),
        };

        trace!(
            "Metrics: knee={:?} hip={:?} width={:?} symmetry={:?} valgus={} cue={}",
            knee_angle_avg,
            hip_angle_avg,
            step_width,
            symmetry,
            has_knee_valgus,
            cue
        );

        MetricsSnapshot {
            mode,
            left_knee_angle,
            right_knee_angle,
            knee_angle_avg,
            hip_angle_avg,
            step_width,
            symmetry,
            has_knee_valgus,
            depth_label,
            cue,
        }
    }

    /// Depth bucket for a knee angle, independent of the cue dead zone
    pub fn depth_for(&self, knee_angle: f64) -> DepthLabel {
        if knee_angle < self.squat.deep_below {
            DepthLabel::Deep
        } else if knee_angle < self.squat.shallow_from {
            DepthLabel::Moderate
        } else {
            DepthLabel::Shallow
        }
    }

    fn squat_cue(
        &self,
        knee_angle: Option<f64>,
        has_knee_valgus: bool,
        previous_depth: DepthLabel,
    ) -> (Cue, DepthLabel) {
        if has_knee_valgus {
            return (Cue::KeepKneesOutward, previous_depth);
        }

        let Some(knee_angle) = knee_angle else {
            return (Cue::FaceCamera, DepthLabel::Unknown);
        };

        // Wider cue thresholds than depth buckets so the text doesn't flicker
        let cue = if knee_angle > self.squat.cue_go_deeper_above {
            Cue::GoDeeper
        } else if knee_angle < self.squat.cue_too_deep_below {
            Cue::DontGoTooDeep
        } else {
            Cue::GreatForm
        };

        (cue, self.depth_for(knee_angle))
    }

    fn gait_cue(
        &self,
        step_width: Option<f64>,
        symmetry: Option<f64>,
        has_knee_valgus: bool,
    ) -> Cue {
        if has_knee_valgus {
            return Cue::ImproveKneeAlignment;
        }

        if symmetry.is_some_and(|s| s < self.gait.symmetry_warning_below) {
            return Cue::ImproveSymmetry;
        }

        match step_width {
            Some(width) if width < self.gait.min_step_width => Cue::IncreaseWidth,
            Some(width) if width > self.gait.max_step_width => Cue::ReduceWidth,
            Some(_) => Cue::GoodWidth,
            None => Cue::WalkNaturally,
        }
    }
}

/// Horizontal-distance knee valgus heuristic; assumes a roughly frontal view.
pub fn detect_knee_valgus(legs: &Legs, ratios: &ValgusConfig) -> bool {
    let hip_width = (legs.left_hip.x - legs.right_hip.x).abs();
    let knee_width = (legs.left_knee.x - legs.right_knee.x).abs();
    let ankle_width = (legs.left_ankle.x - legs.right_ankle.x).abs();

    // Zero hip width has no meaningful ratio; only the ankle test applies
    let knees_inside_hips = hip_width > 0.0 && knee_width / hip_width < ratios.knee_hip_ratio;
    let knees_inside_ankles = knee_width < ankle_width * ratios.knee_ankle_ratio;

    knees_inside_hips || knees_inside_ankles
}
