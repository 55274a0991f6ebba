//! Contained, time-bounded training attempts.
//!
//! Training never fails the calibration flow: errors, panics inside a model
//! and timeouts are logged here and reported to the caller as `None`.

use crate::{
    collector::Sample,
    model::{sample_stats, GazeModel, SampleStats, ValidationStats},
};
use log::{error, info};
use serde::Serialize;
use std::{
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

/// Everything learned from one successful attempt
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub model: String,
    pub validation: ValidationStats,
    pub sample_stats: SampleStats,
    #[serde(with = "millis")]
    pub elapsed: Duration,
}

impl TrainingReport {
    /// Accuracy score in `[0, 100]`
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        self.validation.accuracy()
    }
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(duration.as_millis())
    }
}

/// Runs `train_and_validate` on a worker thread with an upper time bound
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    timeout: Duration,
}

impl ModelTrainer {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Train `model` on `samples`, holding out `holdout_fraction` for validation.
    ///
    /// Returns the trained model with its report, or `None` if training
    /// failed, panicked or ran past the timeout. A timed-out worker is left to
    /// finish on its own and its result is discarded.
    pub fn train(
        &self,
        mut model: Box<dyn GazeModel>,
        samples: Vec<Sample>,
        holdout_fraction: f64,
    ) -> Option<(Box<dyn GazeModel>, TrainingReport)> {
        let name = model.name().to_string();
        info!("Training '{name}' on {} samples", samples.len());

        let started = Instant::now();
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new().name("gaze-training".to_string()).spawn(move || {
            let stats = sample_stats(&samples);
            let result = model.train_and_validate(&samples, holdout_fraction);
            // The receiver is gone if we already timed out
            let _ = tx.send((model, result, stats));
        });
        if let Err(e) = spawned {
            error!("Failed to spawn training worker: {e}");
            return None;
        }

        match rx.recv_timeout(self.timeout) {
            Ok((model, Ok(validation), sample_stats)) => {
                let report = TrainingReport {
                    model: name,
                    validation,
                    sample_stats,
                    elapsed: started.elapsed(),
                };
                info!(
                    "Training '{}' finished in {:?}: mse {:.6}, accuracy {:.1}",
                    report.model,
                    report.elapsed,
                    report.validation.mse,
                    report.accuracy()
                );
                Some((model, report))
            }
            Ok((_, Err(e), _)) => {
                error!("Training '{name}' failed: {e}");
                None
            }
            Err(RecvTimeoutError::Timeout) => {
                error!("Training '{name}' exceeded {:?}, discarding", self.timeout);
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("Training '{name}' worker panicked");
                None
            }
        }
    }
}
