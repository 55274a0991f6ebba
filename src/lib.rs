//! Self-calibrating gaze estimation from facial landmarks.
//!
//! This library turns a stream of per-frame facial landmark observations into
//! a smoothed on-screen gaze position. A per-user regression model is trained
//! from a short choreographed sequence of on-screen targets:
//!
//! 1. A [`sequence::CalibrationSequencer`] describes where the target is at
//!    every instant and whether samples should be recorded
//! 2. The [`collector::SampleCollector`] pairs landmark frames with the target
//!    position while recording
//! 3. A [`model::GazeModel`] is trained and validated on those samples by the
//!    [`trainer::ModelTrainer`], then persisted and made active
//! 4. The [`predictor::Predictor`] turns every later frame into a gaze point
//!
//! The [`context::CalibrationContext`] wires these together and shares the
//! camera between competing features through a
//! [`scheduler::CaptureScheduler`].
//!
//! # Examples
//!
//! ## Driving a calibration
//!
//! ```no_run
//! use gaze_calibration::{
//!     config::Config,
//!     context::{CalibrationContext, CalibrationOutcome, CalibrationTick},
//!     model::{MemoryModelStore, ModelRegistry},
//!     sequence::CancellationToken,
//!     simulation::{SimulatedCamera, SyntheticFace},
//! };
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut ctx = CalibrationContext::new(
//!     &Config::default(),
//!     &ModelRegistry::with_builtin(),
//!     Box::new(SimulatedCamera::new()),
//!     Box::new(MemoryModelStore::new()),
//! )?;
//! let face = SyntheticFace::default();
//! let token = CancellationToken::new();
//!
//! ctx.start_calibration()?;
//! for frame_no in 0.. {
//!     let elapsed = Duration::from_secs_f64(f64::from(frame_no) / 30.0);
//!     match ctx.tick(elapsed, &token) {
//!         CalibrationTick::Target(target) => {
//!             if let Some(position) = target.position {
//!                 ctx.on_frame(&face.frame(position));
//!             }
//!         }
//!         CalibrationTick::Finished(CalibrationOutcome::Succeeded { accuracy, .. }) => {
//!             println!("Calibrated, accuracy {accuracy:.1}");
//!             break;
//!         }
//!         _ => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Encoding landmark frames
//!
//! ```
//! use gaze_calibration::{codec, landmarks::LandmarkFrame};
//!
//! let frame = LandmarkFrame::empty(640.0, 480.0);
//! let encoded = codec::serialize(&frame);
//! assert_eq!(encoded.len(), codec::ENCODED_LEN);
//! assert_eq!(codec::deserialize(&encoded), Some(frame));
//! ```

/// Landmark frame data model, framing quality and boundary checks
pub mod landmarks;

/// Fixed-precision string encoding of landmark frames
pub mod codec;

/// Calibration timelines built from composable segments
pub mod sequence;

/// Sample collection during calibration
pub mod collector;

/// Gaze model trait, registry, built-in models and persistence
pub mod model;

/// Contained, time-bounded model training
pub mod trainer;

/// Live prediction and fan-out to listeners
pub mod predictor;

/// Shared control of the frame capture loop
pub mod scheduler;

/// Calibration engine wiring everything together
pub mod context;

/// Signal filtering algorithms for smoothing gaze points
pub mod filters;

/// Deterministic synthetic faces and camera for tests and demos
pub mod simulation;

/// Utility functions for numeric conversions and timeline math
pub mod utils;

/// Error types and result handling
pub mod error;

/// Constants used throughout the library
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
