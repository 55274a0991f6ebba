//! Constants used throughout the engine

/// Number of facial landmarks in a full face mesh frame (468 mesh + 10 iris points)
pub const NUM_FACIAL_LANDMARKS: usize = 478;

/// Landmark on the face contour that appears left-most in the video frame
pub const FACE_EDGE_LEFT: usize = 234;

/// Landmark on the face contour that appears right-most in the video frame
pub const FACE_EDGE_RIGHT: usize = 454;

/// Pupil centre that appears on the left of the video frame
pub const PUPIL_LEFT: usize = 468;

/// Pupil centre that appears on the right of the video frame
pub const PUPIL_RIGHT: usize = 473;

/// Nose tip, used as the origin for model features
pub const NOSE_TIP: usize = 1;

/// Eye corners and iris ring points used as regression features
pub const EYE_FEATURE_LANDMARKS: [usize; 16] = [
    33, 133, 159, 145, // left eye corners and lids
    362, 263, 386, 374, // right eye corners and lids
    468, 469, 470, 471, 472, // left iris
    473, 474, 476, // right iris
];

/// Face-to-screen ratio window in which framing is ideal
pub const FACE_RATIO_MIN: f64 = 0.22;
pub const FACE_RATIO_MAX: f64 = 0.33;

/// Dead-band allowed around the frame centre before centring is penalised
pub const CENTERING_TOLERANCE: f64 = 0.12;

/// Fraction of the frame treated as the border band
pub const BORDER_RATIO: f64 = 1.0 / 8.0;

/// Quantization scale for landmark coordinates (1/10000 unit)
pub const COORDINATE_SCALE: f64 = 10_000.0;

/// Quantization scale for frame dimensions (1/10 unit)
pub const DIMENSION_SCALE: f64 = 10.0;

/// Fade duration at either end of a message segment, in seconds
pub const MESSAGE_FADE_SECS: f64 = 0.5;

/// Default pulse duration, in seconds
pub const DEFAULT_PULSE_TIME: f64 = 0.75;

/// Default calibration grid density
pub const DEFAULT_GRID_SIZE: usize = 4;

/// Accepted calibration grid densities
pub const MIN_GRID_SIZE: usize = 3;
pub const MAX_GRID_SIZE: usize = 7;

/// Default fraction of samples held out for validation
pub const DEFAULT_HOLDOUT_FRACTION: f64 = 0.2;

/// At most every other sample can be held out
pub const MAX_HOLDOUT_FRACTION: f64 = 0.5;

/// Default upper bound on a single training attempt, in seconds
pub const DEFAULT_TRAINING_TIMEOUT_SECS: f64 = 30.0;

/// Default exponential smoothing factor for predictions
pub const DEFAULT_EXPONENTIAL_ALPHA: f64 = 0.5;

/// Default moving average window
pub const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 5;

/// Default ridge regularisation strength
pub const DEFAULT_RIDGE_LAMBDA: f64 = 1e-3;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;
