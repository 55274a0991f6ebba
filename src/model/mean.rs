use super::{split_holdout, validation_errors, GazeModel, ValidationStats};
use crate::{
    collector::Sample,
    filters::PointFilter,
    landmarks::{LandmarkFrame, Point2D},
    Error, Result,
};

/// Predicts the mean training target for every frame with a face.
///
/// Useful as a baseline when judging whether a real model learned anything.
pub struct MeanModel {
    mean: Option<Point2D>,
    filter: Box<dyn PointFilter>,
}

impl MeanModel {
    pub const NAME: &'static str = "mean";

    pub fn new(filter: Box<dyn PointFilter>) -> Self {
        Self { mean: None, filter }
    }
}

impl GazeModel for MeanModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    #[allow(clippy::cast_precision_loss)]
    fn train_and_validate(&mut self, samples: &[Sample], holdout_fraction: f64) -> Result<ValidationStats> {
        let usable: Vec<&Sample> = samples.iter().filter(|s| !s.features.is_degenerate()).collect();
        let (train, validation) = split_holdout(&usable, holdout_fraction)?;

        let n = train.len() as f64;
        let (sx, sy) = train.iter().fold((0.0, 0.0), |(sx, sy), s| (sx + s.target.x, sy + s.target.y));
        let mean = Point2D::new(sx / n, sy / n);

        let (mse, mean_error) = validation_errors(&validation, |_| Ok(mean))?;
        self.mean = Some(mean);
        self.filter.reset();
        Ok(ValidationStats {
            mse,
            mean_error,
            train_samples: train.len(),
            validation_samples: validation.len(),
        })
    }

    fn predict(&mut self, frame: &LandmarkFrame) -> Result<Point2D> {
        let mean = self
            .mean
            .ok_or_else(|| Error::ModelError("Mean model is not trained".to_string()))?;
        if frame.is_degenerate() {
            return Err(Error::InvalidInput("No face in frame".to_string()));
        }
        Ok(self.filter.apply(mean))
    }

    fn is_trained(&self) -> bool {
        self.mean.is_some()
    }

    fn save_state(&self) -> Result<String> {
        let mean = self
            .mean
            .ok_or_else(|| Error::ModelError("Mean model is not trained".to_string()))?;
        Ok(serde_json::to_string(&mean)?)
    }

    fn load_state(&mut self, state: &str) -> Result<()> {
        self.mean = Some(serde_json::from_str(state)?);
        self.filter.reset();
        Ok(())
    }

    fn reset_smoothing(&mut self) {
        self.filter.reset();
    }
}
