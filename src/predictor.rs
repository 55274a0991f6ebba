//! Live gaze prediction from the active model.

use crate::{
    landmarks::{LandmarkFrame, Point2D},
    model::GazeModel,
};
use log::{debug, error};
use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard},
};

/// Receives every published gaze point; `None` means "no gaze available"
pub type PointListener = Box<dyn FnMut(Option<Point2D>) + Send>;

/// Shared fan-out of gaze points to every subscriber.
///
/// New listeners wait in a pending list until the next publish, so a listener
/// may subscribe others from inside its own call. Publishing from inside a
/// listener is not supported.
#[derive(Clone, Default)]
pub struct PointBroadcast {
    listeners: Arc<Mutex<Vec<PointListener>>>,
    pending: Arc<Mutex<Vec<PointListener>>>,
}

impl PointBroadcast {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: PointListener) {
        lock(&self.pending).push(listener);
    }

    pub fn publish(&self, point: Option<Point2D>) {
        let mut listeners = lock(&self.listeners);
        listeners.append(&mut lock(&self.pending));
        for listener in listeners.iter_mut() {
            listener(point);
        }
    }

    #[must_use]
    pub fn subscribers(&self) -> usize {
        let pending = lock(&self.pending).len();
        lock(&self.listeners).len() + pending
    }
}

impl fmt::Debug for PointBroadcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointBroadcast")
            .field("subscribers", &self.subscribers())
            .finish()
    }
}

/// Slot holding the model used for live prediction.
///
/// Swapping a model in is a single locked assignment, so a prediction never
/// observes a half-replaced model.
#[derive(Clone, Default)]
pub struct ModelSlot {
    inner: Arc<Mutex<Option<Box<dyn GazeModel>>>>,
}

impl ModelSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `model` active, returning the model it replaced
    pub fn install(&self, model: Box<dyn GazeModel>) -> Option<Box<dyn GazeModel>> {
        debug!("Installing model '{}'", model.name());
        lock(&self.inner).replace(model)
    }

    pub fn clear(&self) -> Option<Box<dyn GazeModel>> {
        lock(&self.inner).take()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        lock(&self.inner).is_some()
    }

    /// Name of the active model
    #[must_use]
    pub fn model_name(&self) -> Option<String> {
        lock(&self.inner).as_ref().map(|m| m.name().to_string())
    }

    /// Run `f` against the active model, if any
    pub fn with_model<R>(&self, f: impl FnOnce(&mut dyn GazeModel) -> R) -> Option<R> {
        let mut guard = lock(&self.inner);
        guard.as_mut().map(|model| f(model.as_mut()))
    }
}

impl fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSlot").field("model", &self.model_name()).finish()
    }
}

/// Poisoning only means a listener or model panicked mid-call; the data is still usable
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Turns landmark frames into published gaze points
#[derive(Debug, Clone, Default)]
pub struct Predictor {
    slot: ModelSlot,
    broadcast: PointBroadcast,
}

impl Predictor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the active-model slot
    #[must_use]
    pub fn slot(&self) -> &ModelSlot {
        &self.slot
    }

    #[must_use]
    pub fn broadcast(&self) -> &PointBroadcast {
        &self.broadcast
    }

    #[must_use]
    pub fn has_model(&self) -> bool {
        self.slot.is_loaded()
    }

    /// Make `model` the active one
    pub fn install(&self, model: Box<dyn GazeModel>) {
        if let Some(previous) = self.slot.install(model) {
            debug!("Replaced model '{}'", previous.name());
        }
    }

    pub fn clear_model(&self) {
        self.slot.clear();
    }

    pub fn subscribe(&self, listener: PointListener) {
        self.broadcast.subscribe(listener);
    }

    pub fn publish(&self, point: Option<Point2D>) {
        self.broadcast.publish(point);
    }

    /// Predict a gaze point without publishing it.
    ///
    /// Missing models, prediction errors and panicking models all yield `None`.
    pub fn process(&self, frame: &LandmarkFrame) -> Option<Point2D> {
        let outcome = self
            .slot
            .with_model(|model| panic::catch_unwind(AssertUnwindSafe(|| model.predict(frame))))?;
        match outcome {
            Ok(Ok(point)) => Some(point),
            Ok(Err(e)) => {
                debug!("Prediction failed: {e}");
                None
            }
            Err(_) => {
                error!("Model '{}' panicked during prediction", self.slot.model_name().unwrap_or_default());
                None
            }
        }
    }

    /// Predict and publish to every subscriber
    pub fn on_frame(&self, frame: &LandmarkFrame) -> Option<Point2D> {
        let point = self.process(frame);
        self.publish(point);
        point
    }

    /// Tell subscribers gaze is unavailable and forget smoothing history
    pub fn publish_no_data(&self) {
        self.slot.with_model(|model| model.reset_smoothing());
        self.broadcast.publish(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collector::Sample,
        filters::NoFilter,
        model::{mean::MeanModel, GazeModel, ValidationStats},
        simulation::SyntheticFace,
        Result,
    };

    /// Model whose prediction indexes past the end of an empty buffer
    struct BrokenModel {
        weights: Vec<f64>,
    }

    impl GazeModel for BrokenModel {
        fn name(&self) -> &str {
            "broken"
        }

        fn train_and_validate(&mut self, _: &[Sample], _: f64) -> Result<ValidationStats> {
            Err(crate::Error::TrainingError("untrainable".to_string()))
        }

        fn predict(&mut self, _: &LandmarkFrame) -> Result<Point2D> {
            Ok(Point2D::new(self.weights[0], self.weights[1]))
        }

        fn is_trained(&self) -> bool {
            true
        }

        fn save_state(&self) -> Result<String> {
            Ok(String::new())
        }

        fn load_state(&mut self, _: &str) -> Result<()> {
            Ok(())
        }

        fn reset_smoothing(&mut self) {}
    }

    fn trained() -> Box<dyn GazeModel> {
        let face = SyntheticFace::default();
        let samples = vec![face.sample(Point2D::new(0.25, 0.75), "test")];
        let mut model = MeanModel::new(Box::new(NoFilter));
        model.train_and_validate(&samples, 0.0).unwrap();
        Box::new(model)
    }

    #[test]
    fn test_no_model_yields_none() {
        let predictor = Predictor::new();
        let frame = SyntheticFace::default().frame(Point2D::new(0.5, 0.5));
        assert!(!predictor.has_model());
        assert_eq!(predictor.process(&frame), None);
    }

    #[test]
    fn test_publishes_predictions() {
        let predictor = Predictor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        predictor.subscribe(Box::new(move |p| sink.lock().unwrap().push(p)));

        let frame = SyntheticFace::default().frame(Point2D::new(0.5, 0.5));
        predictor.install(trained());
        assert_eq!(predictor.on_frame(&frame), Some(Point2D::new(0.25, 0.75)));

        // Degenerate frame makes the model error, which publishes "no gaze"
        predictor.on_frame(&LandmarkFrame::empty(640.0, 480.0));
        predictor.publish_no_data();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![Some(Point2D::new(0.25, 0.75)), None, None]);
    }

    #[test]
    fn test_install_replaces_previous() {
        let predictor = Predictor::new();
        predictor.slot().install(trained());
        let previous = predictor.slot().install(trained());
        assert!(previous.is_some());
        assert_eq!(predictor.slot().model_name().as_deref(), Some("mean"));
        predictor.clear_model();
        assert!(!predictor.has_model());
    }

    #[test]
    fn test_panicking_model_yields_none() {
        let predictor = Predictor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        predictor.subscribe(Box::new(move |p| sink.lock().unwrap().push(p)));
        predictor.install(Box::new(BrokenModel { weights: Vec::new() }));

        let frame = SyntheticFace::default().frame(Point2D::new(0.5, 0.5));
        assert_eq!(predictor.process(&LandmarkFrame::empty(640.0, 480.0)), None);
        assert_eq!(predictor.on_frame(&frame), None);

        // The slot stays usable after the panic
        assert!(predictor.has_model());
        predictor.install(trained());
        assert_eq!(predictor.process(&frame), Some(Point2D::new(0.25, 0.75)));
        assert_eq!(*seen.lock().unwrap(), vec![None]);
    }

    #[test]
    fn test_listener_may_subscribe_while_publishing() {
        let broadcast = PointBroadcast::new();
        let late_calls = Arc::new(Mutex::new(0));
        let inner = broadcast.clone();
        let counter = Arc::clone(&late_calls);
        let mut subscribed = false;
        broadcast.subscribe(Box::new(move |_| {
            if !subscribed {
                subscribed = true;
                let counter = Arc::clone(&counter);
                inner.subscribe(Box::new(move |_| *counter.lock().unwrap() += 1));
            }
        }));

        broadcast.publish(None);
        assert_eq!(broadcast.subscribers(), 2);
        assert_eq!(*late_calls.lock().unwrap(), 0);
        broadcast.publish(Some(Point2D::new(0.5, 0.5)));
        assert_eq!(*late_calls.lock().unwrap(), 1);
    }
}
