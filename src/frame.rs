use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Anatomical keypoint names produced by the pose estimator (COCO-17 layout)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkName {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl LandmarkName {
    /// Wire name, e.g. `left_knee`
    pub fn as_str(&self) -> &'static str {
        match self {
            LandmarkName::Nose => "nose",
            LandmarkName::LeftEye => "left_eye",
            LandmarkName::RightEye => "right_eye",
            LandmarkName::LeftEar => "left_ear",
            LandmarkName::RightEar => "right_ear",
            LandmarkName::LeftShoulder => "left_shoulder",
            LandmarkName::RightShoulder => "right_shoulder",
            LandmarkName::LeftElbow => "left_elbow",
            LandmarkName::RightElbow => "right_elbow",
            LandmarkName::LeftWrist => "left_wrist",
            LandmarkName::RightWrist => "right_wrist",
            LandmarkName::LeftHip => "left_hip",
            LandmarkName::RightHip => "right_hip",
            LandmarkName::LeftKnee => "left_knee",
            LandmarkName::RightKnee => "right_knee",
            LandmarkName::LeftAnkle => "left_ankle",
            LandmarkName::RightAnkle => "right_ankle",
        }
    }
}

impl fmt::Display for LandmarkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected keypoint with its detection confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub name: LandmarkName,
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

impl Landmark {
    pub fn new(name: LandmarkName, x: f64, y: f64, confidence: f64) -> Self {
        Self {
            name,
            x,
            y,
            confidence,
        }
    }

    /// Whether this landmark is reliable enough to feed the metrics.
    ///
    /// A landmark with a non-finite coordinate is never reliable.
    pub fn is_reliable(&self, min_confidence: f64) -> bool {
        self.confidence >= min_confidence && self.x.is_finite() && self.y.is_finite()
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// All landmarks detected for one subject at one instant.
///
/// A tick without a detected subject has no `PoseFrame` at all; a frame is
/// never zero-filled to stand in for absence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    landmarks: Vec<Landmark>,
}

impl PoseFrame {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    /// First landmark carrying `name`, regardless of confidence
    pub fn landmark(&self, name: LandmarkName) -> Option<&Landmark> {
        self.landmarks.iter().find(|l| l.name == name)
    }

    /// Position of `name` if present and at or above `min_confidence`
    pub fn point(&self, name: LandmarkName, min_confidence: f64) -> Option<Point> {
        self.landmark(name)
            .filter(|l| l.is_reliable(min_confidence))
            .map(Landmark::position)
    }

    /// Number of landmarks that pass `min_confidence`
    pub fn reliable_count(&self, min_confidence: f64) -> usize {
        self.landmarks
            .iter()
            .filter(|l| l.is_reliable(min_confidence))
            .count()
    }
}

/// Joints consumed by the metrics, pulled out of a frame by name.
///
/// A landmark missing from the frame or below the confidence threshold is
/// `None` here.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LowerBody {
    pub left_shoulder: Option<Point>,
    pub right_shoulder: Option<Point>,
    pub left_hip: Option<Point>,
    pub right_hip: Option<Point>,
    pub left_knee: Option<Point>,
    pub right_knee: Option<Point>,
    pub left_ankle: Option<Point>,
    pub right_ankle: Option<Point>,
}

impl LowerBody {
    pub fn extract(frame: &PoseFrame, min_confidence: f64) -> Self {
        let joint = |name| frame.point(name, min_confidence);
        Self {
            left_shoulder: joint(LandmarkName::LeftShoulder),
            right_shoulder: joint(LandmarkName::RightShoulder),
            left_hip: joint(LandmarkName::LeftHip),
            right_hip: joint(LandmarkName::RightHip),
            left_knee: joint(LandmarkName::LeftKnee),
            right_knee: joint(LandmarkName::RightKnee),
            left_ankle: joint(LandmarkName::LeftAnkle),
            right_ankle: joint(LandmarkName::RightAnkle),
        }
    }

    /// Both hips, both knees and both ankles, or `None` if any is missing
    pub fn legs(&self) -> Option<Legs> {
        Some(Legs {
            left_hip: self.left_hip?,
            right_hip: self.right_hip?,
            left_knee: self.left_knee?,
            right_knee: self.right_knee?,
            left_ankle: self.left_ankle?,
            right_ankle: self.right_ankle?,
        })
    }
}

/// Complete bilateral leg geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Legs {
    pub left_hip: Point,
    pub right_hip: Point,
    pub left_knee: Point,
    pub right_knee: Point,
    pub left_ankle: Point,
    pub right_ankle: Point,
}
