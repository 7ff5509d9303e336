use std::{fmt, time::Instant};

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// Opaque black frame, handy for warm-up runs and tests.
    pub fn blank(width: u32, height: u32) -> Self {
        let mut rgba = vec![0u8; (width as usize) * (height as usize) * 4];
        for px in rgba.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Self::new(rgba, width, height)
    }
}

/// A point on the face surface. `x` and `y` are normalized to the frame size,
/// `z` is relative depth with no unit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_pixel(&self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

/// Output of one completed inference. Holds zero or one face.
#[derive(Clone, Debug)]
pub struct FaceMeshResult {
    face: Option<Vec<Landmark>>,
    /// Submission order of the frame this result was computed from.
    pub sequence: u64,
    pub frame_timestamp: Instant,
}

impl FaceMeshResult {
    pub fn empty(sequence: u64, frame_timestamp: Instant) -> Self {
        Self {
            face: None,
            sequence,
            frame_timestamp,
        }
    }

    pub fn with_face(landmarks: Vec<Landmark>, sequence: u64, frame_timestamp: Instant) -> Self {
        Self {
            face: Some(landmarks),
            sequence,
            frame_timestamp,
        }
    }

    pub fn face(&self) -> Option<&[Landmark]> {
        self.face.as_deref()
    }

    pub fn has_face(&self) -> bool {
        self.face.is_some()
    }
}

/// Percentage horizontal offset between the mouth corners, rounded to two decimals.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct AsymmetryScore(f64);

impl AsymmetryScore {
    /// Rounds to two decimals. Rejects negative and non-finite input.
    pub fn from_percentage(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        Some(Self((value * 100.0).round() / 100.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for AsymmetryScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
}

/// Options handed to the landmark backend when a session starts.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceMeshOptions {
    pub max_faces: usize,
    pub refine_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for FaceMeshOptions {
    fn default() -> Self {
        Self {
            max_faces: 1,
            refine_landmarks: true,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

impl FaceMeshOptions {
    pub fn expected_landmark_count(&self) -> usize {
        if self.refine_landmarks {
            crate::pipeline::topology::REFINED_LANDMARK_COUNT
        } else {
            crate::pipeline::topology::BASE_LANDMARK_COUNT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_rounds_to_two_decimals() {
        let score = AsymmetryScore::from_percentage(12.3456).unwrap();
        assert_eq!(score.value(), 12.35);
        assert_eq!(score.to_string(), "12.35%");
    }

    #[test]
    fn score_rejects_non_finite_and_negative() {
        assert!(AsymmetryScore::from_percentage(f64::INFINITY).is_none());
        assert!(AsymmetryScore::from_percentage(f64::NAN).is_none());
        assert!(AsymmetryScore::from_percentage(-1.0).is_none());
    }

    #[test]
    fn default_options_match_fixed_configuration() {
        let options = FaceMeshOptions::default();
        assert_eq!(options.max_faces, 1);
        assert!(options.refine_landmarks);
        assert_eq!(options.min_detection_confidence, 0.5);
        assert_eq!(options.min_tracking_confidence, 0.5);
        assert_eq!(options.expected_landmark_count(), 478);
    }

    #[test]
    fn blank_frame_is_opaque() {
        let frame = Frame::blank(2, 2);
        assert_eq!(frame.rgba.len(), 16);
        assert!(frame.rgba.chunks_exact(4).all(|px| px == [0, 0, 0, 255]));
    }
}
