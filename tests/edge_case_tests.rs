//! Edge case tests for filters, timelines, frames and prediction

use gaze_calibration::{
    collector::{MethodId, Sample, SampleCollector},
    filters::create_filter,
    landmarks::{Edge, LandmarkFrame, Point2D},
    model::{GazeModel, MemoryModelStore, ValidationStats},
    predictor::Predictor,
    sequence::{
        generators::{pulse, wait},
        grid, CalibrationRun, CalibrationSequencer, CancellationToken, Segment, Tick,
    },
    simulation::SyntheticFace,
    Error, Result,
};
use std::time::Duration;

use test_helpers::test_context;

/// Trained-looking model that panics on every prediction
struct PanickingModel;

impl GazeModel for PanickingModel {
    fn name(&self) -> &str {
        "panicking"
    }

    fn train_and_validate(&mut self, _samples: &[Sample], _holdout: f64) -> Result<ValidationStats> {
        Err(Error::TrainingError("not trainable".to_string()))
    }

    fn predict(&mut self, _frame: &LandmarkFrame) -> Result<Point2D> {
        let weights: Vec<f64> = Vec::new();
        Ok(Point2D::new(weights[0], weights[1]))
    }

    fn is_trained(&self) -> bool {
        true
    }

    fn save_state(&self) -> Result<String> {
        Ok(String::new())
    }

    fn load_state(&mut self, _state: &str) -> Result<()> {
        Ok(())
    }

    fn reset_smoothing(&mut self) {}
}

const FILTERS: [&str; 5] = ["none", "movingaverage:5", "exponential:0.8", "kalman", "movingaverage:1"];

#[test]
fn test_filter_extreme_values() {
    for spec in FILTERS {
        let mut filter = create_filter(spec).unwrap();

        let extreme_values = [
            Point2D::new(f64::INFINITY, f64::NEG_INFINITY),
            Point2D::new(f64::NAN, f64::NAN),
            Point2D::new(f64::MAX, f64::MIN),
            Point2D::new(1e100, -1e100),
            Point2D::new(0.0, 0.0),
        ];

        // Non-finite input may propagate; the filter just must not panic
        for point in extreme_values {
            let _ = filter.apply(point);
        }
    }
}

#[test]
fn test_filter_reset_behavior() {
    for spec in FILTERS {
        let mut filter = create_filter(spec).unwrap();
        for i in 0..10 {
            filter.apply(Point2D::new(f64::from(i) * 0.1, 0.9));
        }

        filter.reset();
        // First point after a reset passes straight through
        let fresh = Point2D::new(0.25, 0.75);
        assert_eq!(filter.apply(fresh), fresh, "{spec} kept history across reset");
    }
}

#[test]
fn test_single_window_moving_average_is_identity() {
    let mut filter = create_filter("movingaverage:1").unwrap();
    for i in 0..5 {
        let p = Point2D::new(f64::from(i), -f64::from(i));
        assert_eq!(filter.apply(p), p);
    }
}

#[test]
fn test_empty_timeline() {
    let empty = Segment::list(Vec::new());
    assert_eq!(empty.duration(), 0.0);
    assert_eq!(empty.point_at(1.0).position, None);
    assert_eq!(grid(0, 1.0).duration(), 0.0);

    let sequencer = CalibrationSequencer::new(Segment::list(vec![Segment::list(Vec::new())]));
    assert_eq!(sequencer.duration(), 0.0);
    assert!(!sequencer.point_at(0.0).recording);

    // A zero-length run completes on its first tick
    let mut run = CalibrationRun::new(sequencer);
    assert_eq!(run.tick(Duration::ZERO, &CancellationToken::new()), Tick::Completed);
}

#[test]
fn test_zero_length_segments_are_skipped() {
    let sequencer = CalibrationSequencer::new(Segment::list(vec![
        pulse(0.0, 0.0, 0.0),
        wait(0.0),
        pulse(1.0, 1.0, 1.0),
    ]));
    assert_eq!(sequencer.duration(), 1.0);
    assert_eq!(sequencer.point_at(0.0).position, Some(Point2D::new(1.0, 1.0)));
}

#[test]
fn test_single_cell_grid_centers_target() {
    let sequencer = CalibrationSequencer::new(grid(1, 1.0));
    assert_eq!(sequencer.point_at(0.5).position, Some(Point2D::new(0.5, 0.5)));
}

#[test]
fn test_no_face_frame() {
    let frame = LandmarkFrame::empty(640.0, 480.0);
    assert!(frame.is_degenerate());
    assert_eq!(frame.face_ratio(), 0.0);
    assert_eq!(frame.quality_metric(), 0.0);
    // Both pupils sit at the origin
    assert_eq!(frame.is_outside(), Some(Edge::Left));
}

#[test]
fn test_zero_height_frame_uses_unit_aspect() {
    let frame = LandmarkFrame::empty(640.0, 0.0);
    assert_eq!(frame.aspect(), 1.0);
    assert!((0.0..=1.0).contains(&frame.quality_metric()));
}

#[test]
fn test_predictor_without_model() {
    let predictor = Predictor::default();
    let frame = SyntheticFace::default().frame(Point2D::new(0.5, 0.5));
    assert!(!predictor.has_model());
    assert_eq!(predictor.process(&frame), None);
    assert_eq!(predictor.on_frame(&frame), None);
    predictor.publish_no_data();
}

#[test]
fn test_collector_without_position_getter() {
    let mut collector = SampleCollector::new();
    collector.start_sampling(MethodId::from("grid"));
    assert!(!collector.on_frame(&LandmarkFrame::empty(640.0, 480.0)));
    assert!(collector.is_empty());
    assert!(collector.take_samples().is_empty());
}

#[test]
fn test_panicking_model_does_not_stop_frame_loop() {
    let (mut ctx, _) = test_context("mean", Box::new(MemoryModelStore::new())).unwrap();
    ctx.predictor().install(Box::new(PanickingModel));
    ctx.set_gaze_enabled(true);

    let face = SyntheticFace::default();
    for _ in 0..3 {
        assert_eq!(ctx.on_frame(&face.frame(Point2D::new(0.5, 0.5))), None);
    }
    assert!(ctx.predictor().has_model());
}
