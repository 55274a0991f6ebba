//! Ridge regression from eye landmark geometry to screen coordinates.
//!
//! Features are the eye corner, lid and iris landmarks expressed relative to
//! the nose tip and scaled by the face width, plus the head position and
//! size. Both screen axes are fitted jointly with one regularised normal
//! equation solve.

use super::{split_holdout, validation_errors, GazeModel, ValidationStats};
use crate::{
    collector::Sample,
    constants::{DEFAULT_RIDGE_LAMBDA, EPSILON, EYE_FEATURE_LANDMARKS, NOSE_TIP},
    filters::PointFilter,
    landmarks::{LandmarkFrame, Point2D},
    Error, Result,
};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Length of the feature vector
pub const FEATURE_COUNT: usize = EYE_FEATURE_LANDMARKS.len() * 2 + 4;

/// Fewest usable samples worth fitting
const MIN_SAMPLES: usize = 8;

/// Feature vector for one frame
///
/// # Errors
///
/// Returns an error for the zero-filled frame or a collapsed face
pub fn features(frame: &LandmarkFrame) -> Result<Vec<f64>> {
    if frame.is_degenerate() {
        return Err(Error::InvalidInput("No face in frame".to_string()));
    }
    let scale = frame.face_ratio();
    if !scale.is_finite() || scale < EPSILON {
        return Err(Error::InvalidInput(format!("Unusable face width {scale}")));
    }

    let nose = frame.point(NOSE_TIP);
    let mut values = Vec::with_capacity(FEATURE_COUNT);
    for &index in &EYE_FEATURE_LANDMARKS {
        let p = frame.point(index);
        values.push((p.x - nose.x) / scale);
        values.push((p.y - nose.y) / scale);
    }
    values.extend_from_slice(&[nose.x, nose.y, scale, 1.0]);
    Ok(values)
}

#[derive(Debug, Serialize, Deserialize)]
struct RidgeState {
    feature_count: usize,
    lambda: f64,
    /// Column-major `FEATURE_COUNT x 2` weight matrix
    weights: Vec<f64>,
}

pub struct RidgeModel {
    lambda: f64,
    weights: Option<DMatrix<f64>>,
    filter: Box<dyn PointFilter>,
}

impl RidgeModel {
    pub const NAME: &'static str = "ridge";

    pub fn new(filter: Box<dyn PointFilter>) -> Self {
        Self::with_lambda(filter, DEFAULT_RIDGE_LAMBDA)
    }

    pub fn with_lambda(filter: Box<dyn PointFilter>, lambda: f64) -> Self {
        Self {
            lambda,
            weights: None,
            filter,
        }
    }

    fn fit(samples: &[&Sample], lambda: f64) -> Result<DMatrix<f64>> {
        let n = samples.len();
        let mut x = DMatrix::<f64>::zeros(n, FEATURE_COUNT);
        let mut y = DMatrix::<f64>::zeros(n, 2);
        for (row, sample) in samples.iter().enumerate() {
            for (col, value) in features(&sample.features)?.into_iter().enumerate() {
                x[(row, col)] = value;
            }
            y[(row, 0)] = sample.target.x;
            y[(row, 1)] = sample.target.y;
        }

        let xt = x.transpose();
        let normal = &xt * &x + DMatrix::<f64>::identity(FEATURE_COUNT, FEATURE_COUNT) * lambda;
        let cholesky = normal
            .cholesky()
            .ok_or_else(|| Error::TrainingError("Normal equations are not positive definite".to_string()))?;
        Ok(cholesky.solve(&(xt * y)))
    }

    fn predict_raw(weights: &DMatrix<f64>, frame: &LandmarkFrame) -> Result<Point2D> {
        let f = DVector::from_vec(features(frame)?);
        let out = weights.transpose() * f;
        let point = Point2D::new(out[0], out[1]);
        if point.x.is_finite() && point.y.is_finite() {
            Ok(point)
        } else {
            Err(Error::ModelError("Prediction is not finite".to_string()))
        }
    }
}

impl GazeModel for RidgeModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn train_and_validate(&mut self, samples: &[Sample], holdout_fraction: f64) -> Result<ValidationStats> {
        let usable: Vec<&Sample> = samples.iter().filter(|s| !s.features.is_degenerate()).collect();
        if usable.len() < MIN_SAMPLES {
            return Err(Error::TrainingError(format!(
                "Need at least {MIN_SAMPLES} samples with a face, got {}",
                usable.len()
            )));
        }
        log::debug!(
            "Fitting ridge model on {} of {} samples (lambda {})",
            usable.len(),
            samples.len(),
            self.lambda
        );

        let (train, validation) = split_holdout(&usable, holdout_fraction)?;
        let weights = Self::fit(&train, self.lambda)?;
        let (mse, mean_error) = validation_errors(&validation, |frame| Self::predict_raw(&weights, frame))?;

        self.weights = Some(weights);
        self.filter.reset();
        Ok(ValidationStats {
            mse,
            mean_error,
            train_samples: train.len(),
            validation_samples: validation.len(),
        })
    }

    fn predict(&mut self, frame: &LandmarkFrame) -> Result<Point2D> {
        let weights = self
            .weights
            .as_ref()
            .ok_or_else(|| Error::ModelError("Ridge model is not trained".to_string()))?;
        let raw = Self::predict_raw(weights, frame)?;
        Ok(self.filter.apply(raw))
    }

    fn is_trained(&self) -> bool {
        self.weights.is_some()
    }

    fn save_state(&self) -> Result<String> {
        let weights = self
            .weights
            .as_ref()
            .ok_or_else(|| Error::ModelError("Ridge model is not trained".to_string()))?;
        let state = RidgeState {
            feature_count: FEATURE_COUNT,
            lambda: self.lambda,
            weights: weights.as_slice().to_vec(),
        };
        Ok(serde_json::to_string(&state)?)
    }

    fn load_state(&mut self, state: &str) -> Result<()> {
        let state: RidgeState = serde_json::from_str(state)?;
        if state.feature_count != FEATURE_COUNT || state.weights.len() != FEATURE_COUNT * 2 {
            return Err(Error::PersistenceError(format!(
                "Ridge state has {} features and {} weights, expected {FEATURE_COUNT} and {}",
                state.feature_count,
                state.weights.len(),
                FEATURE_COUNT * 2
            )));
        }
        self.lambda = state.lambda;
        self.weights = Some(DMatrix::from_vec(FEATURE_COUNT, 2, state.weights));
        self.filter.reset();
        Ok(())
    }

    fn reset_smoothing(&mut self) {
        self.filter.reset();
    }
}
