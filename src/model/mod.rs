//! Trainable gaze regression models.
//!
//! The engine does not prescribe a regression algorithm. A model is anything
//! implementing [`GazeModel`], registered by name in a [`ModelRegistry`] and
//! resolved before use. Models own their temporal smoothing filter, so
//! [`GazeModel::predict`] returns already smoothed points.

/// Ridge regression over eye and iris landmark features
pub mod ridge;

/// Baseline that always predicts the mean training target
pub mod mean;

/// Key-value persistence of trained model state
pub mod store;

use crate::{
    collector::Sample,
    constants::{MAX_HOLDOUT_FRACTION, NUM_FACIAL_LANDMARKS},
    filters::PointFilter,
    landmarks::{LandmarkFrame, Point2D, Point3},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, sync::Arc};

pub use store::{FileModelStore, MemoryModelStore, ModelStore};

/// Held-out validation results of one training attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationStats {
    /// Mean squared Euclidean error on the validation split
    pub mse: f64,
    /// Mean Euclidean error on the validation split
    pub mean_error: f64,
    pub train_samples: usize,
    pub validation_samples: usize,
}

impl ValidationStats {
    /// User-facing accuracy in `[0, 100]` derived from the validation MSE.
    ///
    /// 100 means perfect prediction, 0 means an RMS error as large as the
    /// screen diagonal in normalized units.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if !self.mse.is_finite() {
            return 0.0;
        }
        (100.0 * (1.0 - self.mse.max(0.0).sqrt() / std::f64::consts::SQRT_2)).clamp(0.0, 100.0)
    }
}

/// Average position and spread of one landmark across a batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkStats {
    pub mean: Point3,
    /// Average Euclidean distance from the mean
    pub deviation: f64,
}

/// Descriptive statistics of a sample batch, for diagnostics only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    pub count: usize,
    /// One entry per landmark index
    pub landmarks: Vec<LandmarkStats>,
}

/// Per-landmark average position and average deviation across `samples`
#[must_use]
#[allow(clippy::cast_precision_loss)] // Sample counts are far below 2^52
pub fn sample_stats(samples: &[Sample]) -> SampleStats {
    let count = samples.len();
    if count == 0 {
        return SampleStats {
            count,
            landmarks: Vec::new(),
        };
    }
    let n = count as f64;

    let landmarks = (0..NUM_FACIAL_LANDMARKS)
        .map(|index| {
            let (sx, sy, sz) = samples.iter().fold((0.0, 0.0, 0.0), |(sx, sy, sz), s| {
                let p = s.features.point(index);
                (sx + p.x, sy + p.y, sz + p.z)
            });
            let mean = Point3::new(sx / n, sy / n, sz / n);
            let deviation = samples
                .iter()
                .map(|s| s.features.point(index).distance(&mean))
                .sum::<f64>()
                / n;
            LandmarkStats { mean, deviation }
        })
        .collect();

    SampleStats { count, landmarks }
}

/// Deterministic train/validation split.
///
/// Every `round(1 / holdout_fraction)`-th sample goes to validation. A
/// fraction of zero validates on the training set itself.
///
/// # Errors
///
/// Returns an error for a fraction outside `[0, MAX_HOLDOUT_FRACTION]` or
/// when either side of the split would be empty
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Fraction is validated positive
pub fn split_holdout<'a>(
    samples: &'a [&'a Sample],
    holdout_fraction: f64,
) -> Result<(Vec<&'a Sample>, Vec<&'a Sample>)> {
    if !(0.0..=MAX_HOLDOUT_FRACTION).contains(&holdout_fraction) {
        return Err(Error::TrainingError(format!(
            "Holdout fraction must be in [0, {MAX_HOLDOUT_FRACTION}], got {holdout_fraction}"
        )));
    }
    if samples.is_empty() {
        return Err(Error::TrainingError("No usable samples".to_string()));
    }
    if holdout_fraction == 0.0 {
        log::warn!("No holdout requested, validating on the training set");
        return Ok((samples.to_vec(), samples.to_vec()));
    }

    // Fraction is at most 0.5, so the stride is at least 2
    let stride = (1.0 / holdout_fraction).round() as usize;
    let (validation, train): (Vec<_>, Vec<_>) = samples
        .iter()
        .enumerate()
        .partition(|(i, _)| i % stride == stride - 1);
    let train: Vec<&Sample> = train.into_iter().map(|(_, s)| *s).collect();
    let validation: Vec<&Sample> = validation.into_iter().map(|(_, s)| *s).collect();

    if validation.is_empty() || train.is_empty() {
        return Err(Error::TrainingError(format!(
            "Not enough samples to hold out {holdout_fraction} for validation ({} samples)",
            samples.len()
        )));
    }
    Ok((train, validation))
}

/// Mean squared and mean Euclidean error of `predict` over `samples`
///
/// # Errors
///
/// Propagates the first prediction error
#[allow(clippy::cast_precision_loss)]
pub fn validation_errors<F>(samples: &[&Sample], mut predict: F) -> Result<(f64, f64)>
where
    F: FnMut(&LandmarkFrame) -> Result<Point2D>,
{
    if samples.is_empty() {
        return Err(Error::TrainingError("Empty validation set".to_string()));
    }
    let mut squared = 0.0;
    let mut euclidean = 0.0;
    for sample in samples {
        let distance = predict(&sample.features)?.distance(&sample.target);
        squared += distance * distance;
        euclidean += distance;
    }
    let n = samples.len() as f64;
    Ok((squared / n, euclidean / n))
}

/// A trainable, persistable predictor from landmark frames to screen points
pub trait GazeModel: Send {
    /// Registry name of the implementation
    fn name(&self) -> &str;

    /// Fit on all but a held-out fraction of `samples` and validate on the rest
    ///
    /// # Errors
    ///
    /// Returns an error if fitting or validation fails
    fn train_and_validate(&mut self, samples: &[Sample], holdout_fraction: f64) -> Result<ValidationStats>;

    /// Predict a smoothed screen point for `frame`
    ///
    /// # Errors
    ///
    /// Returns an error if the model is untrained or the frame is unusable
    fn predict(&mut self, frame: &LandmarkFrame) -> Result<Point2D>;

    fn is_trained(&self) -> bool;

    /// Serialize fitted parameters
    ///
    /// # Errors
    ///
    /// Returns an error if the model is untrained or encoding fails
    fn save_state(&self) -> Result<String>;

    /// Restore fitted parameters produced by [`GazeModel::save_state`]
    ///
    /// # Errors
    ///
    /// Returns an error if the state is malformed
    fn load_state(&mut self, state: &str) -> Result<()>;

    /// Forget smoothing history, e.g. after capture was stopped
    fn reset_smoothing(&mut self);
}

/// Builds a fresh, untrained model around a smoothing filter
pub type ModelFactory = Arc<dyn Fn(Box<dyn PointFilter>) -> Box<dyn GazeModel> + Send + Sync>;

/// Name to constructor mapping, resolved once at start-up
#[derive(Clone, Default)]
pub struct ModelRegistry {
    factories: BTreeMap<String, ModelFactory>,
}

impl ModelRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the models shipped in this crate
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            ridge::RidgeModel::NAME,
            Arc::new(|filter: Box<dyn PointFilter>| -> Box<dyn GazeModel> { Box::new(ridge::RidgeModel::new(filter)) }),
        );
        registry.register(
            mean::MeanModel::NAME,
            Arc::new(|filter: Box<dyn PointFilter>| -> Box<dyn GazeModel> { Box::new(mean::MeanModel::new(filter)) }),
        );
        registry
    }

    pub fn register(&mut self, name: &str, factory: ModelFactory) {
        if self.factories.insert(name.to_string(), factory).is_some() {
            log::warn!("Model '{name}' registered twice, keeping the latest");
        }
    }

    /// Constructor registered under `name`
    ///
    /// # Errors
    ///
    /// Returns an error if nothing is registered under `name`
    pub fn resolve(&self, name: &str) -> Result<ModelFactory> {
        self.factories.get(name).cloned().ok_or_else(|| {
            Error::ModelError(format!(
                "Unknown model '{name}', available: {}",
                self.names().join(", ")
            ))
        })
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry").field("models", &self.names()).finish()
    }
}

/// Names of the built-in models
#[must_use]
pub fn available_models() -> Vec<String> {
    ModelRegistry::with_builtin().names().into_iter().map(str::to_string).collect()
}

/// Create a fresh model from the built-in registry
///
/// # Errors
///
/// Returns an error if `name` is unknown or `smoothing` is not a valid filter spec
pub fn create_model(name: &str, smoothing: &str) -> Result<Box<dyn GazeModel>> {
    let factory = ModelRegistry::with_builtin().resolve(name)?;
    Ok(factory(crate::filters::create_filter(smoothing)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MethodId;

    fn sample_at(x: f64) -> Sample {
        let mut frame = LandmarkFrame::empty(640.0, 480.0);
        frame.points_mut()[0] = Point3::new(x, 0.0, 0.0);
        Sample {
            features: frame,
            target: Point2D::new(x, x),
            method: MethodId::from("test"),
        }
    }

    #[test]
    fn test_sample_stats() {
        let samples = vec![sample_at(0.0), sample_at(1.0)];
        let stats = sample_stats(&samples);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.landmarks.len(), NUM_FACIAL_LANDMARKS);
        assert_eq!(stats.landmarks[0].mean, Point3::new(0.5, 0.0, 0.0));
        assert!((stats.landmarks[0].deviation - 0.5).abs() < 1e-12);
        assert_eq!(stats.landmarks[1].deviation, 0.0);
        assert!(sample_stats(&[]).landmarks.is_empty());
    }

    #[test]
    fn test_split_holdout() {
        let samples: Vec<Sample> = (0..10).map(|i| sample_at(f64::from(i))).collect();
        let refs: Vec<&Sample> = samples.iter().collect();

        let (train, validation) = split_holdout(&refs, 0.2).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(validation.len(), 2);

        let (train, validation) = split_holdout(&refs, 0.0).unwrap();
        assert_eq!(train.len(), 10);
        assert_eq!(validation.len(), 10);

        let (train, validation) = split_holdout(&refs, 0.5).unwrap();
        assert_eq!((train.len(), validation.len()), (5, 5));

        // Larger fractions are rejected rather than capped
        assert!(split_holdout(&refs, 0.6).is_err());
        assert!(split_holdout(&refs, 0.9).is_err());
        assert!(split_holdout(&refs, 1.0).is_err());
        assert!(split_holdout(&refs[..1], 0.5).is_err());
    }

    #[test]
    fn test_accuracy_from_mse() {
        let perfect = ValidationStats {
            mse: 0.0,
            mean_error: 0.0,
            train_samples: 1,
            validation_samples: 1,
        };
        assert_eq!(perfect.accuracy(), 100.0);

        let worst = ValidationStats { mse: 2.0, ..perfect.clone() };
        assert!(worst.accuracy().abs() < 1e-9);

        let broken = ValidationStats { mse: f64::NAN, ..perfect };
        assert_eq!(broken.accuracy(), 0.0);
    }

    #[test]
    fn test_registry_resolution() {
        let registry = ModelRegistry::with_builtin();
        assert_eq!(registry.names(), vec!["mean", "ridge"]);
        assert_eq!(available_models(), vec!["mean".to_string(), "ridge".to_string()]);
        assert!(registry.resolve("ridge").is_ok());
        assert!(registry.resolve("svr").is_err());
        assert!(create_model("mean", "none").is_ok());
        assert!(create_model("mean", "bogus").is_err());
    }
}
