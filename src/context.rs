//! The calibration engine tying collection, training, prediction and capture
//! together.
//!
//! The host drives two cooperative loops: [`CalibrationContext::on_frame`]
//! once per captured frame and [`CalibrationContext::tick`] once per
//! animation frame while a calibration is shown.

use crate::{
    collector::{MethodId, SampleCollector},
    config::Config,
    filters::{create_filter, PointFilter},
    landmarks::{LandmarkFrame, Point2D},
    model::{store, GazeModel, ModelFactory, ModelRegistry, ModelStore},
    predictor::{PointListener, Predictor},
    scheduler::{CaptureRequester, CaptureScheduler, FrameSource},
    sequence::{CalibrationRun, CalibrationSequencer, CancellationToken, SequenceSpec, TargetPoint, Tick},
    trainer::{ModelTrainer, TrainingReport},
    Result,
};
use log::{debug, error, info, warn};
use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Idle,
    Calibrating,
    Training,
}

/// How a calibration attempt ended
#[derive(Debug, Clone)]
pub enum CalibrationOutcome {
    /// A new model was trained, validated and made active
    Succeeded { accuracy: f64, report: TrainingReport },
    /// Training failed; the previous model stays active
    Failed,
    /// The sequence was cancelled before it completed
    Cancelled,
}

/// What one animation tick produced
#[derive(Debug, Clone)]
pub enum CalibrationTick {
    /// No calibration is running
    Idle,
    /// Render this target
    Target(TargetPoint),
    /// The attempt just ended
    Finished(CalibrationOutcome),
}

struct ActiveCalibration {
    run: CalibrationRun,
    method: MethodId,
}

pub struct CalibrationContext {
    user_id: String,
    model_name: String,
    smoothing: String,
    holdout_fraction: f64,
    sequence: SequenceSpec,
    factory: ModelFactory,
    store: Box<dyn ModelStore>,
    collector: SampleCollector,
    predictor: Predictor,
    scheduler: CaptureScheduler,
    trainer: ModelTrainer,
    state: CalibrationState,
    active: Option<ActiveCalibration>,
    target: Arc<Mutex<Point2D>>,
}

impl CalibrationContext {
    /// Build a context from configuration.
    ///
    /// The model name is resolved against `registry` once, here.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown model, an invalid smoothing filter or an
    /// invalid calibration sequence
    pub fn new(
        config: &Config,
        registry: &ModelRegistry,
        source: Box<dyn FrameSource>,
        store: Box<dyn ModelStore>,
    ) -> Result<Self> {
        let factory = registry.resolve(&config.model.name)?;
        config.create_filter()?;
        let sequence = config.sequence_spec();
        sequence.validate()?;

        let predictor = Predictor::new();
        let mut scheduler = CaptureScheduler::new(source);
        let no_data = predictor.clone();
        scheduler.set_no_data_sink(Box::new(move || no_data.publish_no_data()));

        info!(
            "Calibration context for user '{}' using model '{}'",
            config.model.user_id, config.model.name
        );
        Ok(Self {
            user_id: config.model.user_id.clone(),
            model_name: config.model.name.clone(),
            smoothing: config.smoothing.filter.clone(),
            holdout_fraction: config.calibration.holdout_fraction,
            sequence,
            factory,
            store,
            collector: SampleCollector::new(),
            predictor,
            scheduler,
            trainer: ModelTrainer::new(config.training_timeout()),
            state: CalibrationState::Idle,
            active: None,
            target: Arc::new(Mutex::new(Point2D::default())),
        })
    }

    /// Install the model persisted for this user, if there is one
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or holds unreadable state
    pub fn load_persisted_model(&mut self) -> Result<bool> {
        let filter = self.smoothing_filter()?;
        match store::load(&self.model_name, &self.factory, filter, self.store.as_ref(), &self.user_id)? {
            Some(model) => {
                self.predictor.install(model);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Start the configured calibration sequence
    ///
    /// Returns `false` without side effects while another attempt is active.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured sequence cannot be built
    pub fn start_calibration(&mut self) -> Result<bool> {
        let spec = self.sequence.clone();
        self.start_calibration_with(&spec)
    }

    /// Start a calibration following `spec`
    ///
    /// # Errors
    ///
    /// Returns an error if `spec` is invalid
    pub fn start_calibration_with(&mut self, spec: &SequenceSpec) -> Result<bool> {
        if self.state != CalibrationState::Idle {
            warn!("Calibration already in progress, ignoring start request");
            return Ok(false);
        }
        let sequencer = CalibrationSequencer::build(spec)?;
        Ok(self.start_sequence(sequencer, MethodId::from(spec.template.as_str())))
    }

    /// Start a calibration over an arbitrary timeline, tagging samples with `method`
    pub fn start_sequence(&mut self, sequencer: CalibrationSequencer, method: MethodId) -> bool {
        if self.state != CalibrationState::Idle {
            warn!("Calibration already in progress, ignoring start request");
            return false;
        }
        info!(
            "Starting calibration '{method}' ({:.1}s)",
            sequencer.duration()
        );

        self.collector.clear();
        let target = Arc::clone(&self.target);
        self.collector
            .set_position_getter(Box::new(move || *target.lock().unwrap_or_else(PoisonError::into_inner)));
        self.active = Some(ActiveCalibration {
            run: CalibrationRun::new(sequencer),
            method,
        });
        self.state = CalibrationState::Calibrating;
        self.scheduler.request(CaptureRequester::Calibration, true);
        true
    }

    /// Advance the running calibration to `elapsed` since it started.
    ///
    /// Completing the sequence trains a fresh model synchronously, with capture
    /// suspended, bounded by the training timeout. A cancelled `token` stays
    /// cancelled, so pass a fresh one for each attempt.
    pub fn tick(&mut self, elapsed: Duration, token: &CancellationToken) -> CalibrationTick {
        let Some(active) = self.active.as_mut() else {
            return CalibrationTick::Idle;
        };

        match active.run.tick(elapsed, token) {
            Tick::Running(point) => {
                match (point.recording, point.position) {
                    (true, Some(position)) => {
                        *self.target.lock().unwrap_or_else(PoisonError::into_inner) = position;
                        self.collector.start_sampling(active.method.clone());
                    }
                    _ => self.collector.stop_sampling(),
                }
                CalibrationTick::Target(point)
            }
            Tick::Completed => CalibrationTick::Finished(self.complete()),
            Tick::Cancelled => CalibrationTick::Finished(self.abandon()),
        }
    }

    /// Route a detected frame: into the collector while calibrating, through
    /// the predictor otherwise.
    ///
    /// Returns the published gaze point, if any.
    pub fn on_frame(&mut self, frame: &LandmarkFrame) -> Option<Point2D> {
        if !self.scheduler.is_running() {
            debug!("Dropping frame delivered while capture is stopped");
            return None;
        }
        match self.state {
            CalibrationState::Calibrating => {
                self.collector.on_frame(frame);
                None
            }
            CalibrationState::Training => None,
            CalibrationState::Idle => self.predictor.on_frame(frame),
        }
    }

    /// Turn live gaze prediction on or off
    pub fn set_gaze_enabled(&mut self, enabled: bool) {
        self.scheduler.request(CaptureRequester::GazeToggle, enabled);
    }

    /// Keep capture alive while the diagnostics view is open
    pub fn set_diagnostics_open(&mut self, open: bool) {
        self.scheduler.request(CaptureRequester::Diagnostics, open);
    }

    pub fn subscribe(&self, listener: PointListener) {
        self.predictor.subscribe(listener);
    }

    #[must_use]
    pub const fn state(&self) -> CalibrationState {
        self.state
    }

    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.scheduler.is_running()
    }

    #[must_use]
    pub const fn collector(&self) -> &SampleCollector {
        &self.collector
    }

    #[must_use]
    pub const fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    #[must_use]
    pub const fn scheduler(&self) -> &CaptureScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn smoothing_filter(&self) -> Result<Box<dyn PointFilter>> {
        create_filter(&self.smoothing)
    }

    fn fresh_model(&self) -> Result<Box<dyn GazeModel>> {
        Ok((self.factory)(self.smoothing_filter()?))
    }

    fn end_sequence(&mut self) {
        self.collector.stop_sampling();
        self.collector.clear_position_getter();
        self.active = None;
        self.scheduler.request(CaptureRequester::Calibration, false);
    }

    fn complete(&mut self) -> CalibrationOutcome {
        self.end_sequence();
        self.state = CalibrationState::Training;
        let samples = self.collector.take_samples();
        info!("Calibration sequence finished with {} samples", samples.len());

        let trained = match self.fresh_model() {
            Ok(model) => {
                let _suspended = self.scheduler.suspend();
                self.trainer.train(model, samples, self.holdout_fraction)
            }
            Err(e) => {
                error!("Failed to create model '{}': {e}", self.model_name);
                None
            }
        };
        self.state = CalibrationState::Idle;

        let Some((model, report)) = trained else {
            warn!("Calibration failed, keeping the previous model");
            return CalibrationOutcome::Failed;
        };
        if let Err(e) = store::persist(model.as_ref(), self.store.as_mut(), &self.user_id) {
            warn!("Failed to persist model for '{}': {e}", self.user_id);
        }
        let accuracy = report.accuracy();
        self.predictor.install(model);
        info!("Calibration succeeded with accuracy {accuracy:.1}");
        CalibrationOutcome::Succeeded { accuracy, report }
    }

    fn abandon(&mut self) -> CalibrationOutcome {
        self.end_sequence();
        let discarded = self.collector.take_samples().len();
        self.state = CalibrationState::Idle;
        info!("Calibration cancelled, discarded {discarded} samples");
        CalibrationOutcome::Cancelled
    }
}

impl fmt::Debug for CalibrationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalibrationContext")
            .field("user_id", &self.user_id)
            .field("model_name", &self.model_name)
            .field("state", &self.state)
            .field("collector", &self.collector)
            .field("predictor", &self.predictor)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::MemoryModelStore,
        sequence::grid,
        simulation::{SimulatedCamera, SyntheticFace},
    };

    fn context(model: &str) -> CalibrationContext {
        let mut config = Config::default();
        config.model.name = model.to_string();
        config.smoothing.filter = "none".to_string();
        CalibrationContext::new(
            &config,
            &ModelRegistry::with_builtin(),
            Box::new(SimulatedCamera::new()),
            Box::new(MemoryModelStore::new()),
        )
        .unwrap()
    }

    /// Plays `sequencer` at 30 fps, feeding the face looking at the target
    fn play(ctx: &mut CalibrationContext, token: &CancellationToken, face: &SyntheticFace) -> CalibrationOutcome {
        let mut frame_no = 0u32;
        loop {
            let elapsed = Duration::from_secs_f64(f64::from(frame_no) / 30.0);
            match ctx.tick(elapsed, token) {
                CalibrationTick::Target(point) => {
                    let gaze = point.position.unwrap_or(Point2D::new(0.5, 0.5));
                    ctx.on_frame(&face.frame(gaze));
                }
                CalibrationTick::Finished(outcome) => return outcome,
                CalibrationTick::Idle => panic!("calibration not running"),
            }
            frame_no += 1;
        }
    }

    #[test]
    fn test_second_start_is_ignored() {
        let mut ctx = context("mean");
        assert!(ctx.start_calibration().unwrap());
        assert_eq!(ctx.state(), CalibrationState::Calibrating);
        assert!(!ctx.start_calibration().unwrap());
        assert!(ctx.is_capturing());
    }

    #[test]
    fn test_successful_calibration_installs_model() {
        let mut ctx = context("ridge");
        let face = SyntheticFace::default();
        ctx.start_sequence(CalibrationSequencer::new(grid(3, 1.0)), MethodId::from("grid"));

        let outcome = play(&mut ctx, &CancellationToken::new(), &face);
        let CalibrationOutcome::Succeeded { accuracy, report } = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert!(accuracy > 90.0);
        assert!(report.sample_stats.count > 0);
        assert_eq!(ctx.state(), CalibrationState::Idle);
        assert!(ctx.collector().is_empty());
        assert!(!ctx.is_capturing());

        // Prediction only runs while someone wants capture
        ctx.set_gaze_enabled(true);
        let predicted = ctx.on_frame(&face.frame(Point2D::new(0.5, 0.5))).unwrap();
        assert!(predicted.distance(&Point2D::new(0.5, 0.5)) < 0.05);
    }

    #[test]
    fn test_cancelled_calibration_keeps_previous_model() {
        let mut ctx = context("mean");
        let face = SyntheticFace::default();
        let token = CancellationToken::new();
        ctx.start_sequence(CalibrationSequencer::new(grid(2, 1.0)), MethodId::from("grid"));

        for frame_no in 0..45 {
            ctx.tick(Duration::from_secs_f64(f64::from(frame_no) / 30.0), &token);
            ctx.on_frame(&face.frame(Point2D::new(0.5, 0.5)));
        }
        assert!(!ctx.collector().is_empty());

        token.cancel();
        assert!(matches!(
            ctx.tick(Duration::from_secs(2), &token),
            CalibrationTick::Finished(CalibrationOutcome::Cancelled)
        ));
        assert!(ctx.collector().is_empty());
        assert!(!ctx.predictor().has_model());
        assert_eq!(ctx.state(), CalibrationState::Idle);
        assert!(matches!(ctx.tick(Duration::from_secs(3), &token), CalibrationTick::Idle));
    }

    #[test]
    fn test_failed_training_reports_failure() {
        let mut ctx = context("ridge");
        // No frames delivered, so nothing to train on
        ctx.start_sequence(CalibrationSequencer::new(grid(2, 0.5)), MethodId::from("grid"));
        let outcome = ctx.tick(Duration::from_secs(5), &CancellationToken::new());
        assert!(matches!(outcome, CalibrationTick::Finished(CalibrationOutcome::Failed)));
        assert_eq!(ctx.state(), CalibrationState::Idle);
        assert!(ctx.start_calibration().unwrap());
    }

    #[test]
    fn test_persisted_model_is_reloaded() {
        let mut ctx = context("mean");
        let face = SyntheticFace::default();
        ctx.start_sequence(CalibrationSequencer::new(grid(2, 0.5)), MethodId::from("grid"));
        assert!(matches!(
            play(&mut ctx, &CancellationToken::new(), &face),
            CalibrationOutcome::Succeeded { .. }
        ));

        ctx.predictor().clear_model();
        assert!(ctx.load_persisted_model().unwrap());
        assert!(ctx.predictor().has_model());
    }
}
