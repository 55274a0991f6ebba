//! Error handling tests for all modules

use gaze_calibration::{
    collector::Sample,
    config::Config,
    error::{AppError, Result},
    filters::{create_filter, NoFilter},
    landmarks::{LandmarkFrame, Point2D, Point3},
    model::{
        create_model, mean::MeanModel, ridge::RidgeModel, store, GazeModel, MemoryModelStore, ModelRegistry,
        ModelStore,
    },
    sequence::{CalibrationSequencer, SequenceSpec},
    simulation::SyntheticFace,
    utils::safe_cast::*,
};

use test_helpers::grid_samples;

#[test]
fn test_filter_creation_errors() {
    // Test invalid filter type
    let result = create_filter("invalid_filter");
    assert!(result.is_err());

    // Test invalid window size for moving average
    let result = create_filter("movingaverage:0");
    match result {
        Err(AppError::FilterError(msg)) => assert!(msg.contains("Window size")),
        _ => panic!("Expected FilterError"),
    }

    // Test invalid alpha for exponential filter
    let result = create_filter("exponential:2.0");
    match result {
        Err(AppError::FilterError(msg)) => assert!(msg.contains("Alpha")),
        _ => panic!("Expected FilterError"),
    }

    // Test unparsable parameter
    let result = create_filter("exponential:fast");
    match result {
        Err(AppError::FilterError(msg)) => assert!(msg.contains("Invalid parameter")),
        _ => panic!("Expected FilterError"),
    }

    // Test Kalman filter creation (should always succeed)
    assert!(create_filter("kalman").is_ok());
}

#[test]
fn test_config_validation_errors() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    config.calibration.grid_size = 8;
    assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));

    let mut config = Config::default();
    config.calibration.holdout_fraction = 1.0;
    assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));

    let mut config = Config::default();
    config.calibration.pulse_time = 0.0;
    assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));

    let mut config = Config::default();
    config.model.user_id = "  ".to_string();
    assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));

    let mut config = Config::default();
    config.model.name = "svr".to_string();
    assert!(matches!(config.validate(), Err(AppError::ModelError(_))));

    let mut config = Config::default();
    config.smoothing.filter = "median:5".to_string();
    assert!(matches!(config.validate(), Err(AppError::FilterError(_))));

    let mut config = Config::default();
    config.training.timeout_secs = f64::NAN;
    assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
}

#[test]
fn test_config_file_errors() {
    let dir = tempfile::tempdir().unwrap();

    let missing = Config::from_file(dir.path().join("missing.yaml"));
    assert!(matches!(missing, Err(AppError::IoError(_))));

    let path = dir.path().join("broken.yaml");
    std::fs::write(&path, "calibration: [not, a, mapping]").unwrap();
    match Config::from_file(&path) {
        Err(AppError::ConfigError(msg)) => assert!(msg.contains("Failed to parse config")),
        other => panic!("Expected ConfigError, got {other:?}"),
    }
}

#[test]
fn test_sequence_spec_errors() {
    let spec = SequenceSpec {
        pulse_time: -1.0,
        ..SequenceSpec::default()
    };
    assert!(matches!(CalibrationSequencer::build(&spec), Err(AppError::SequenceError(_))));
}

#[test]
fn test_landmark_count_is_checked() {
    let result = LandmarkFrame::new(vec![Point3::default(); 10], 640.0, 480.0);
    match result {
        Err(AppError::InvalidInput(msg)) => assert!(msg.contains("478")),
        _ => panic!("Expected InvalidInput"),
    }
}

#[test]
fn test_unknown_model_errors() {
    let registry = ModelRegistry::with_builtin();
    match registry.resolve("svr") {
        Err(AppError::ModelError(msg)) => assert!(msg.contains("svr")),
        _ => panic!("Expected ModelError"),
    }
    assert!(create_model("svr", "none").is_err());
    assert!(create_model("ridge", "bogus").is_err());
}

#[test]
fn test_untrained_models_refuse_to_predict() {
    let frame = SyntheticFace::default().frame(Point2D::new(0.5, 0.5));
    let mut ridge = RidgeModel::new(Box::new(NoFilter));
    assert!(ridge.predict(&frame).is_err());
    assert!(ridge.save_state().is_err());

    let mut mean = MeanModel::new(Box::new(NoFilter));
    assert!(matches!(mean.predict(&frame), Err(AppError::ModelError(_))));
}

#[test]
fn test_training_errors() {
    let face = SyntheticFace::default();

    // Too few samples for ridge
    let mut ridge = RidgeModel::new(Box::new(NoFilter));
    let few: Vec<Sample> = (0..3).map(|_| face.sample(Point2D::new(0.5, 0.5), "grid")).collect();
    assert!(matches!(ridge.train_and_validate(&few, 0.2), Err(AppError::TrainingError(_))));
    assert!(!ridge.is_trained());

    // Only no-face frames
    let empty: Vec<Sample> = (0..20)
        .map(|_| Sample {
            features: LandmarkFrame::empty(640.0, 480.0),
            target: Point2D::new(0.5, 0.5),
            method: "grid".into(),
        })
        .collect();
    let mut mean = MeanModel::new(Box::new(NoFilter));
    assert!(mean.train_and_validate(&empty, 0.2).is_err());

    // Holdout outside [0, 1)
    let samples = grid_samples(&face, 4);
    let mut mean = MeanModel::new(Box::new(NoFilter));
    assert!(mean.train_and_validate(&samples, 1.5).is_err());
    assert!(mean.train_and_validate(&samples, -0.1).is_err());
}

#[test]
fn test_load_rejects_foreign_or_corrupt_state() -> Result<()> {
    let registry = ModelRegistry::with_builtin();
    let face = SyntheticFace::default();
    let mut memory = MemoryModelStore::new();

    let mut mean = MeanModel::new(Box::new(NoFilter));
    mean.train_and_validate(&grid_samples(&face, 4), 0.25)?;
    store::persist(&mean, &mut memory, "alice")?;

    // Mean state copied under the ridge key
    let raw = memory.get("mean/alice")?.unwrap();
    memory.put("ridge/alice", &raw)?;
    let ridge = registry.resolve("ridge")?;
    let result = store::load("ridge", &ridge, Box::new(NoFilter), &memory, "alice");
    assert!(matches!(result, Err(AppError::PersistenceError(_))));

    memory.put("mean/bob", "{not json")?;
    let mean_factory = registry.resolve("mean")?;
    let result = store::load("mean", &mean_factory, Box::new(NoFilter), &memory, "bob");
    assert!(matches!(result, Err(AppError::Json(_))));

    // Nothing stored is not an error
    assert!(store::load("mean", &mean_factory, Box::new(NoFilter), &memory, "carol")?.is_none());
    Ok(())
}

#[test]
fn test_quantization_saturates_instead_of_failing() {
    assert_eq!(quantize(3e9, 1.0), i32::MAX);
    assert_eq!(quantize(-3e9, 1.0), i32::MIN);
    assert_eq!(quantize(f64::NEG_INFINITY, 1.0), i32::MIN);
    assert_eq!(quantize(f64::NAN, 10_000.0), 0);
    assert_eq!(dequantize(quantize(0.25, 10_000.0), 10_000.0), 0.25);
}

#[test]
fn test_error_display() {
    let err = AppError::FilterError("Window size must be greater than 0".to_string());
    assert_eq!(err.to_string(), "Filter error: Window size must be greater than 0");

    let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(err.to_string().starts_with("IO error"));
}
