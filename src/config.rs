use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NeuroStrideConfig {
    pub engine: EngineConfig,
    pub valgus: ValgusConfig,
    pub squat: SquatConfig,
    pub gait: GaitConfig,
}

/// Exercise being tracked by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseMode {
    Squat,
    Walk,
}

impl fmt::Display for ExerciseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExerciseMode::Squat => f.write_str("squat"),
            ExerciseMode::Walk => f.write_str("walk"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EngineConfig {
    /// Exercise mode a new session starts in
    #[serde(default = "default_mode")]
    pub mode: ExerciseMode,

    /// Number of samples averaged by the angle smoother
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,

    /// Horizontal extent of the keypoint coordinate space, in pixels
    #[serde(default = "default_reference_width")]
    pub reference_width: f64,

    /// Minimum landmark confidence considered reliable
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

/// Knee valgus sensitivity ratios
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct ValgusConfig {
    /// Flag when knee width / hip width falls below this ratio
    #[serde(default = "default_knee_hip_ratio")]
    pub knee_hip_ratio: f64,

    /// Flag when knee width falls below ankle width times this ratio
    #[serde(default = "default_knee_ankle_ratio")]
    pub knee_ankle_ratio: f64,
}

impl ValgusConfig {
    /// Lenient ratios, tuned to avoid false positives
    pub fn lenient() -> Self {
        Self {
            knee_hip_ratio: default_knee_hip_ratio(),
            knee_ankle_ratio: default_knee_ankle_ratio(),
        }
    }

    pub fn strict() -> Self {
        Self {
            knee_hip_ratio: 0.7,
            knee_ankle_ratio: 0.8,
        }
    }
}

/// Hysteresis thresholds for the repetition state machine, in degrees
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct RepThresholds {
    /// Whether reps are counted in this mode
    pub enabled: bool,

    /// Up → Down once the smoothed angle drops below this
    pub down: f64,

    /// Down → Up (rep complete) once the smoothed angle rises above this
    pub up: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SquatConfig {
    #[serde(default = "default_squat_rep")]
    pub rep: RepThresholds,

    /// Knee angle below which depth is Deep
    #[serde(default = "default_deep_below")]
    pub deep_below: f64,

    /// Knee angle from which depth is Shallow
    #[serde(default = "default_shallow_from")]
    pub shallow_from: f64,

    /// Knee angle below which the cue warns about going too deep
    #[serde(default = "default_cue_too_deep_below")]
    pub cue_too_deep_below: f64,

    /// Knee angle above which the cue asks for more depth
    #[serde(default = "default_cue_go_deeper_above")]
    pub cue_go_deeper_above: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GaitConfig {
    #[serde(default = "default_gait_rep")]
    pub rep: RepThresholds,

    /// Lower bound of a good step width, percent of reference width
    #[serde(default = "default_min_step_width")]
    pub min_step_width: f64,

    /// Upper bound of a good step width, percent of reference width
    #[serde(default = "default_max_step_width")]
    pub max_step_width: f64,

    /// Symmetry score below which the cue asks for better symmetry
    #[serde(default = "default_symmetry_warning_below")]
    pub symmetry_warning_below: f64,
}

impl NeuroStrideConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("neurostride.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let squat_rep = default_squat_rep();
        let gait_rep = default_gait_rep();

        let settings = Config::builder()
            .set_default("engine.mode", default_mode().to_string())?
            .set_default("engine.smoothing_window", default_smoothing_window() as i64)?
            .set_default("engine.reference_width", default_reference_width())?
            .set_default("engine.confidence_threshold", default_confidence_threshold())?
            .set_default("valgus.knee_hip_ratio", default_knee_hip_ratio())?
            .set_default("valgus.knee_ankle_ratio", default_knee_ankle_ratio())?
            .set_default("squat.rep.enabled", squat_rep.enabled)?
            .set_default("squat.rep.down", squat_rep.down)?
            .set_default("squat.rep.up", squat_rep.up)?
            .set_default("squat.deep_below", default_deep_below())?
            .set_default("squat.shallow_from", default_shallow_from())?
            .set_default("squat.cue_too_deep_below", default_cue_too_deep_below())?
            .set_default("squat.cue_go_deeper_above", default_cue_go_deeper_above())?
            .set_default("gait.rep.enabled", gait_rep.enabled)?
            .set_default("gait.rep.down", gait_rep.down)?
            .set_default("gait.rep.up", gait_rep.up)?
            .set_default("gait.min_step_width", default_min_step_width())?
            .set_default("gait.max_step_width", default_max_step_width())?
            .set_default(
                "gait.symmetry_warning_below",
                default_symmetry_warning_below(),
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // NEUROSTRIDE_ENGINE__SMOOTHING_WINDOW=7 style overrides
            .add_source(
                Environment::with_prefix("NEUROSTRIDE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: NeuroStrideConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.smoothing_window == 0 {
            return Err(ConfigError::Message(
                "Smoothing window must be greater than 0".to_string(),
            ));
        }

        if !(self.engine.reference_width > 0.0) {
            return Err(ConfigError::Message(
                "Reference width must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.engine.confidence_threshold) {
            return Err(ConfigError::Message(
                "Confidence threshold must be within [0, 1]".to_string(),
            ));
        }

        if !(self.valgus.knee_hip_ratio > 0.0) || !(self.valgus.knee_ankle_ratio > 0.0) {
            return Err(ConfigError::Message(
                "Valgus ratios must be greater than 0".to_string(),
            ));
        }

        validate_rep("squat", &self.squat.rep)?;
        validate_rep("gait", &self.gait.rep)?;

        if self.squat.deep_below >= self.squat.shallow_from {
            return Err(ConfigError::Message(format!(
                "Squat deep_below ({}) must be less than shallow_from ({})",
                self.squat.deep_below, self.squat.shallow_from
            )));
        }

        if self.squat.cue_too_deep_below >= self.squat.cue_go_deeper_above {
            return Err(ConfigError::Message(format!(
                "Squat cue_too_deep_below ({}) must be less than cue_go_deeper_above ({})",
                self.squat.cue_too_deep_below, self.squat.cue_go_deeper_above
            )));
        }

        if self.gait.min_step_width >= self.gait.max_step_width {
            return Err(ConfigError::Message(format!(
                "Gait min_step_width ({}) must be less than max_step_width ({})",
                self.gait.min_step_width, self.gait.max_step_width
            )));
        }

        Ok(())
    }

    /// Rep thresholds for the given mode
    pub fn rep_thresholds(&self, mode: ExerciseMode) -> RepThresholds {
        match mode {
            ExerciseMode::Squat => self.squat.rep,
            ExerciseMode::Walk => self.gait.rep,
        }
    }
}

fn validate_rep(section: &str, rep: &RepThresholds) -> Result<(), ConfigError> {
    if !(rep.down < rep.up) {
        return Err(ConfigError::Message(format!(
            "{} rep down threshold ({}) must be less than up threshold ({})",
            section, rep.down, rep.up
        )));
    }
    Ok(())
}

impl Default for NeuroStrideConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                mode: default_mode(),
                smoothing_window: default_smoothing_window(),
                reference_width: default_reference_width(),
                confidence_threshold: default_confidence_threshold(),
            },
            valgus: ValgusConfig::lenient(),
            squat: SquatConfig {
                rep: default_squat_rep(),
                deep_below: default_deep_below(),
                shallow_from: default_shallow_from(),
                cue_too_deep_below: default_cue_too_deep_below(),
                cue_go_deeper_above: default_cue_go_deeper_above(),
            },
            gait: GaitConfig {
                rep: default_gait_rep(),
                min_step_width: default_min_step_width(),
                max_step_width: default_max_step_width(),
                symmetry_warning_below: default_symmetry_warning_below(),
            },
        }
    }
}

// Default value functions
fn default_mode() -> ExerciseMode {
    ExerciseMode::Squat
}
fn default_smoothing_window() -> usize {
    5
}
fn default_reference_width() -> f64 {
    1280.0
}
fn default_confidence_threshold() -> f64 {
    0.3
}

fn default_knee_hip_ratio() -> f64 {
    0.5
}
fn default_knee_ankle_ratio() -> f64 {
    0.65
}

fn default_squat_rep() -> RepThresholds {
    RepThresholds {
        enabled: true,
        down: 105.0,
        up: 130.0,
    }
}
fn default_deep_below() -> f64 {
    80.0
}
fn default_shallow_from() -> f64 {
    135.0
}
fn default_cue_too_deep_below() -> f64 {
    60.0
}
fn default_cue_go_deeper_above() -> f64 {
    140.0
}

fn default_gait_rep() -> RepThresholds {
    RepThresholds {
        enabled: false,
        down: 150.0,
        up: 165.0,
    }
}
fn default_min_step_width() -> f64 {
    4.0
}
fn default_max_step_width() -> f64 {
    20.0
}
fn default_symmetry_warning_below() -> f64 {
    80.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = NeuroStrideConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.smoothing_window, 5);
        assert_eq!(config.squat.rep.down, 105.0);
        assert_eq!(config.squat.rep.up, 130.0);
        assert_eq!(config.valgus, ValgusConfig::lenient());
        assert!(!config.gait.rep.enabled);
    }

    #[test]
    fn test_zero_smoothing_window_rejected() {
        let mut config = NeuroStrideConfig::default();
        config.engine.smoothing_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_hysteresis_rejected() {
        let mut config = NeuroStrideConfig::default();
        config.squat.rep.down = 130.0;
        assert!(config.validate().is_err());

        config.squat.rep.down = 105.0;
        assert!(config.validate().is_ok());

        config.gait.rep.up = config.gait.rep.down - 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_ordering_rejected() {
        let mut config = NeuroStrideConfig::default();
        config.squat.deep_below = 140.0;
        assert!(config.validate().is_err());

        let mut config = NeuroStrideConfig::default();
        config.squat.cue_too_deep_below = 150.0;
        assert!(config.validate().is_err());

        let mut config = NeuroStrideConfig::default();
        config.gait.min_step_width = 25.0;
        assert!(config.validate().is_err());

        let mut config = NeuroStrideConfig::default();
        config.engine.reference_width = 0.0;
        assert!(config.validate().is_err());

        let mut config = NeuroStrideConfig::default();
        config.engine.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = NeuroStrideConfig::load_from_file("/nonexistent/neurostride.toml").unwrap();
        assert_eq!(config, NeuroStrideConfig::default());
    }

    #[test]
    fn test_load_from_file_overrides() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[engine]
mode = "walk"
smoothing_window = 7

[valgus]
knee_hip_ratio = 0.7
knee_ankle_ratio = 0.8

[gait.rep]
enabled = true
down = 140.0
up = 160.0
"#
        )
        .unwrap();

        let config = NeuroStrideConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.engine.mode, ExerciseMode::Walk);
        assert_eq!(config.engine.smoothing_window, 7);
        assert_eq!(config.engine.reference_width, 1280.0);
        assert_eq!(config.valgus, ValgusConfig::strict());
        assert!(config.gait.rep.enabled);
        assert_eq!(config.rep_thresholds(ExerciseMode::Walk).down, 140.0);
        assert_eq!(config.squat.rep, default_squat_rep());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_toml_roundtrip_is_loadable() {
        let rendered = toml::to_string_pretty(&NeuroStrideConfig::default()).unwrap();
        let parsed: NeuroStrideConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, NeuroStrideConfig::default());
    }
}
