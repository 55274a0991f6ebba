//! Compact fixed-precision encoding of a [`LandmarkFrame`].
//!
//! Layout, all words little-endian `i32`:
//!
//! | word       | content                      |
//! |------------|------------------------------|
//! | 0          | `round(width * 10)`          |
//! | 1          | `round(height * 10)`         |
//! | 2 + 3i ... | `round({x,y,z} * 10000)`     |
//!
//! The byte buffer is base64 encoded into a string of fixed length
//! [`ENCODED_LEN`]. Coordinates survive to within 1/10000 unit and dimensions
//! to within 1/10 unit. The timestamp is not encoded.

use crate::{
    constants::{COORDINATE_SCALE, DIMENSION_SCALE, NUM_FACIAL_LANDMARKS},
    landmarks::{LandmarkDetector, LandmarkFrame, Point3},
    utils::safe_cast::{dequantize, quantize},
};
use base64::{engine::general_purpose::STANDARD, Engine};

const WORD_BYTES: usize = std::mem::size_of::<i32>();

/// Number of words in an encoded frame
pub const FRAME_WORDS: usize = 2 + NUM_FACIAL_LANDMARKS * 3;

/// Number of bytes in an encoded frame before base64
pub const FRAME_BYTES: usize = FRAME_WORDS * WORD_BYTES;

/// Length of every serialized frame string
pub const ENCODED_LEN: usize = FRAME_BYTES.div_ceil(3) * 4;

/// Pack a frame into its fixed-width byte layout
#[must_use]
pub fn encode_bytes(frame: &LandmarkFrame) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(FRAME_BYTES);
    let mut push = |word: i32| bytes.extend_from_slice(&word.to_le_bytes());

    push(quantize(frame.width, DIMENSION_SCALE));
    push(quantize(frame.height, DIMENSION_SCALE));
    for point in frame.points() {
        push(quantize(point.x, COORDINATE_SCALE));
        push(quantize(point.y, COORDINATE_SCALE));
        push(quantize(point.z, COORDINATE_SCALE));
    }
    bytes
}

/// Unpack a fixed-width byte layout; `None` if the length is wrong
#[must_use]
pub fn decode_bytes(bytes: &[u8]) -> Option<LandmarkFrame> {
    if bytes.len() != FRAME_BYTES {
        return None;
    }

    let mut words = bytes.chunks_exact(WORD_BYTES).map(|chunk| {
        let mut word = [0u8; WORD_BYTES];
        word.copy_from_slice(chunk);
        i32::from_le_bytes(word)
    });

    let width = dequantize(words.next()?, DIMENSION_SCALE);
    let height = dequantize(words.next()?, DIMENSION_SCALE);

    let mut points = Vec::with_capacity(NUM_FACIAL_LANDMARKS);
    for _ in 0..NUM_FACIAL_LANDMARKS {
        let x = dequantize(words.next()?, COORDINATE_SCALE);
        let y = dequantize(words.next()?, COORDINATE_SCALE);
        let z = dequantize(words.next()?, COORDINATE_SCALE);
        points.push(Point3::new(x, y, z));
    }

    LandmarkFrame::new(points, width, height).ok()
}

/// Serialize a frame into a fixed-length opaque string
#[must_use]
pub fn serialize(frame: &LandmarkFrame) -> String {
    STANDARD.encode(encode_bytes(frame))
}

/// Deserialize a string produced by [`serialize`].
///
/// Malformed input (wrong length or not base64) yields `None`.
#[must_use]
pub fn deserialize(encoded: &str) -> Option<LandmarkFrame> {
    if encoded.len() != ENCODED_LEN {
        log::debug!("Rejecting frame string of length {} (expected {ENCODED_LEN})", encoded.len());
        return None;
    }
    let bytes = STANDARD.decode(encoded).ok()?;
    decode_bytes(&bytes)
}

/// Detector replaying frames previously recorded with [`serialize`].
///
/// Each input buffer is one UTF-8 frame string. Anything that fails to
/// decode is reported as "no face".
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayDetector;

impl LandmarkDetector for ReplayDetector {
    fn detect(&mut self, image: &[u8], width: u32, height: u32) -> LandmarkFrame {
        std::str::from_utf8(image)
            .ok()
            .and_then(|line| deserialize(line.trim()))
            .unwrap_or_else(|| LandmarkFrame::empty(f64::from(width), f64::from(height)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PUPIL_LEFT;

    #[test]
    fn test_encoded_length_is_fixed() {
        let empty = serialize(&LandmarkFrame::empty(640.0, 480.0));
        assert_eq!(empty.len(), ENCODED_LEN);

        let mut frame = LandmarkFrame::empty(1920.0, 1080.0);
        frame.points_mut()[PUPIL_LEFT] = Point3::new(0.4, 0.5, -0.02);
        assert_eq!(serialize(&frame).len(), ENCODED_LEN);
    }

    #[test]
    fn test_round_trip_quantizes() {
        let mut frame = LandmarkFrame::empty(640.04, 479.96);
        frame.points_mut()[PUPIL_LEFT] = Point3::new(0.123_456, -0.5, 0.000_04);

        let decoded = deserialize(&serialize(&frame)).unwrap();
        assert!((decoded.width - 640.0).abs() < 1e-9);
        assert!((decoded.height - 480.0).abs() < 1e-9);
        let p = decoded.point(PUPIL_LEFT);
        assert!((p.x - 0.1235).abs() < 1e-9);
        assert!((p.y + 0.5).abs() < 1e-9);
        assert!(p.z.abs() < 1e-9);
    }

    #[test]
    fn test_wrong_length_is_none() {
        assert!(deserialize("").is_none());
        assert!(deserialize("abc").is_none());

        let mut encoded = serialize(&LandmarkFrame::empty(640.0, 480.0));
        encoded.pop();
        assert!(deserialize(&encoded).is_none());
        assert!(decode_bytes(&[0u8; 12]).is_none());
    }

    #[test]
    fn test_replay_detector() {
        let mut frame = LandmarkFrame::empty(640.0, 480.0);
        frame.points_mut()[PUPIL_LEFT] = Point3::new(0.25, 0.5, 0.0);
        let line = format!("{}\n", serialize(&frame));

        let mut detector = ReplayDetector;
        let replayed = detector.detect(line.as_bytes(), 640, 480);
        assert_eq!(replayed.point(PUPIL_LEFT), Point3::new(0.25, 0.5, 0.0));

        let missing = detector.detect(b"garbage", 320, 240);
        assert!(missing.is_degenerate());
        assert_eq!(missing.width, 320.0);
    }

    #[test]
    fn test_invalid_alphabet_is_none() {
        let garbage = "!".repeat(ENCODED_LEN);
        assert!(deserialize(&garbage).is_none());
    }
}
