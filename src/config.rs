//! Configuration management for the gaze calibration engine

use crate::{
    constants::{
        DEFAULT_GRID_SIZE, DEFAULT_HOLDOUT_FRACTION, DEFAULT_PULSE_TIME, DEFAULT_TRAINING_TIMEOUT_SECS,
        MAX_GRID_SIZE, MAX_HOLDOUT_FRACTION, MIN_GRID_SIZE,
    },
    filters::PointFilter,
    model::{ridge::RidgeModel, ModelRegistry},
    sequence::{MessageSpec, SequenceSpec, SequenceTemplate, Speed},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Calibration sequence configuration
    pub calibration: CalibrationConfig,

    /// Gaze model configuration
    pub model: ModelConfig,

    /// Prediction smoothing configuration
    pub smoothing: SmoothingConfig,

    /// Training configuration
    pub training: TrainingConfig,
}

/// Calibration sequence parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Grid density (3-7)
    pub grid_size: usize,

    /// Sweep speed: slow, medium or fast
    pub speed: Speed,

    /// Target pattern: scan_xy, scan_x, scan_y, grid or zigzag
    pub template: SequenceTemplate,

    /// Seconds each pulse lasts
    pub pulse_time: f64,

    /// Fraction of samples held out for validation (0.0-0.5)
    pub holdout_fraction: f64,

    /// Message shown before anything else; empty text disables it
    pub intro_text: String,
    pub intro_time: f64,

    /// Message explaining what to do; empty text disables it
    pub instructions_text: String,
    pub instructions_time: f64,

    /// Count the seconds the instructions have been visible
    pub instructions_countdown: bool,
}

/// Gaze model selection and persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Registered model name
    pub name: String,

    /// User the trained model belongs to
    pub user_id: String,

    /// Directory holding persisted model state
    pub store_dir: PathBuf,
}

/// Smoothing applied to every prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Filter spec, e.g. "exponential:0.5", "moving_average:5", "kalman" or "none"
    pub filter: String,
}

/// Training parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Abandon a training attempt after this many seconds
    pub timeout_secs: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            calibration: CalibrationConfig::default(),
            model: ModelConfig::default(),
            smoothing: SmoothingConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        let spec = SequenceSpec::default();
        let (intro_text, intro_time) = spec.intro.map(|m| (m.text, m.time)).unwrap_or_default();
        let (instructions_text, instructions_time, instructions_countdown) = spec
            .instructions
            .map(|m| (m.text, m.time, m.show_elapsed))
            .unwrap_or_default();
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            speed: Speed::default(),
            template: SequenceTemplate::default(),
            pulse_time: DEFAULT_PULSE_TIME,
            holdout_fraction: DEFAULT_HOLDOUT_FRACTION,
            intro_text,
            intro_time,
            instructions_text,
            instructions_time,
            instructions_countdown,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: RidgeModel::NAME.to_string(),
            user_id: "default".to_string(),
            store_dir: PathBuf::from("models"),
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            filter: "exponential:0.5".to_string(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TRAINING_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::IoError(format!("Failed to read {}: {e}", path.display())))?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content).map_err(|e| Error::IoError(e.to_string()))?;

        Ok(())
    }

    /// Calibration timeline description
    #[must_use]
    pub fn sequence_spec(&self) -> SequenceSpec {
        let c = &self.calibration;
        let message = |text: &str, time: f64, show_elapsed: bool| {
            (!text.trim().is_empty()).then(|| MessageSpec {
                text: text.to_string(),
                time,
                show_elapsed,
            })
        };
        SequenceSpec {
            size: c.grid_size,
            speed: c.speed,
            template: c.template,
            pulse_time: c.pulse_time,
            intro: message(&c.intro_text, c.intro_time, false),
            instructions: message(&c.instructions_text, c.instructions_time, c.instructions_countdown),
        }
    }

    /// Create the smoothing filter from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the filter spec is invalid
    pub fn create_filter(&self) -> Result<Box<dyn PointFilter>> {
        crate::filters::create_filter(&self.smoothing.filter)
    }

    /// Training timeout, falling back to the default for unusable values
    #[must_use]
    pub fn training_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.training.timeout_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_TRAINING_TIMEOUT_SECS))
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        // Validate calibration settings
        if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&self.calibration.grid_size) {
            return Err(Error::ConfigError(format!(
                "Grid size must be between {MIN_GRID_SIZE} and {MAX_GRID_SIZE}"
            )));
        }
        if !(0.0..=MAX_HOLDOUT_FRACTION).contains(&self.calibration.holdout_fraction) {
            return Err(Error::ConfigError(format!(
                "Holdout fraction must be between 0.0 and {MAX_HOLDOUT_FRACTION}"
            )));
        }
        self.sequence_spec()
            .validate()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        // Validate model settings
        if self.model.user_id.trim().is_empty() {
            return Err(Error::ConfigError("User id must not be empty".to_string()));
        }
        ModelRegistry::with_builtin().resolve(&self.model.name)?;

        // Validate smoothing filter
        self.create_filter()?;

        // Validate training settings
        if !(self.training.timeout_secs.is_finite() && self.training.timeout_secs > 0.0) {
            return Err(Error::ConfigError("Training timeout must be positive".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Gaze Calibration Configuration

# Calibration sequence
calibration:
  grid_size: 4
  speed: "medium"
  template: "scan_xy"
  pulse_time: 0.75
  holdout_fraction: 0.2
  intro_text: "Calibration is about to start. Keep your head still."
  intro_time: 2.0
  instructions_text: "Follow the dot with your eyes"
  instructions_time: 3.0
  instructions_countdown: true

# Gaze model
model:
  name: "ridge"
  user_id: "default"
  store_dir: "models"

# Prediction smoothing
smoothing:
  filter: "exponential:0.5"

# Training
training:
  timeout_secs: 30.0
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sequence_spec(), SequenceSpec::default());
        assert_eq!(config.training_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_example_config_matches_default() {
        let parsed: Config = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = serde_yaml::from_str("calibration:\n  grid_size: 5\n  speed: fast\n").unwrap();
        assert_eq!(parsed.calibration.grid_size, 5);
        assert_eq!(parsed.calibration.speed, Speed::Fast);
        assert_eq!(parsed.calibration.template, SequenceTemplate::ScanXy);
        assert_eq!(parsed.model.name, "ridge");
    }

    #[test]
    fn test_empty_messages_are_skipped() {
        let mut config = Config::default();
        config.calibration.intro_text = String::new();
        let spec = config.sequence_spec();
        assert!(spec.intro.is_none());
        assert!(spec.instructions.is_some());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::default();
        config.calibration.grid_size = 9;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.smoothing.filter = "median:5".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.name = "svr".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.training.timeout_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.calibration.holdout_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.calibration.holdout_fraction = 0.7;
        assert!(config.validate().is_err());
        config.calibration.holdout_fraction = 0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = Config::default();
        config.model.user_id = "alice".to_string();
        config.to_file(&path).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), config);
        assert!(Config::from_file(dir.path().join("missing.yaml")).is_err());
    }
}
