use crate::analyzer::metrics::{DepthLabel, MetricsSnapshot};
use serde::{Deserialize, Serialize};

/// Quality verdict for one completed rep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormVerdict {
    Good,
    Warning,
}

/// Grade a rep from its metrics: good only without valgus and with at least
/// moderate depth. Symmetry and step width are not considered.
pub fn classify(snapshot: &MetricsSnapshot) -> FormVerdict {
    let deep_enough = matches!(snapshot.depth_label, DepthLabel::Moderate | DepthLabel::Deep);
    if !snapshot.has_knee_valgus && deep_enough {
        FormVerdict::Good
    } else {
        FormVerdict::Warning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::metrics::Cue;
    use crate::config::ExerciseMode;

    fn snapshot(depth_label: DepthLabel, has_knee_valgus: bool) -> MetricsSnapshot {
        MetricsSnapshot {
            mode: ExerciseMode::Squat,
            left_knee_angle: Some(90.0),
            right_knee_angle: Some(90.0),
            knee_angle_avg: Some(90.0),
            hip_angle_avg: Some(100.0),
            step_width: Some(1.0),
            symmetry: Some(10.0),
            has_knee_valgus,
            depth_label,
            cue: Cue::GreatForm,
        }
    }

    #[test]
    fn test_good_depth_without_valgus() {
        assert_eq!(classify(&snapshot(DepthLabel::Deep, false)), FormVerdict::Good);
        assert_eq!(classify(&snapshot(DepthLabel::Moderate, false)), FormVerdict::Good);
    }

    #[test]
    fn test_shallow_or_unknown_is_warning() {
        assert_eq!(classify(&snapshot(DepthLabel::Shallow, false)), FormVerdict::Warning);
        assert_eq!(classify(&snapshot(DepthLabel::Unknown, false)), FormVerdict::Warning);
    }

    #[test]
    fn test_valgus_is_warning_regardless_of_depth() {
        assert_eq!(classify(&snapshot(DepthLabel::Deep, true)), FormVerdict::Warning);
        assert_eq!(classify(&snapshot(DepthLabel::Moderate, true)), FormVerdict::Warning);
    }
}
