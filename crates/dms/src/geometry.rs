//! Eye landmark geometry
//!
//! Landmarks follow the 68-point iBUG 300-W layout produced by dlib-style
//! shape predictors. Each eye is six points, clockwise from the outer corner:
//!
//! ```text
//!       p1   p2
//!  p0             p3
//!       p5   p4
//! ```
//!
//! EAR = (|p1 - p5| + |p2 - p4|) / (2 |p0 - p3|)

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::DmsError;

/// Points per eye
pub const EYE_POINTS: usize = 6;

/// Points per face in the iBUG layout
pub const FACE_LANDMARKS: usize = 68;

/// Subject's right eye (image left)
pub const RIGHT_EYE: Range<usize> = 36..42;

/// Subject's left eye (image right)
pub const LEFT_EYE: Range<usize> = 42..48;

/// 2D landmark in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Eye aspect ratio of one eye.
///
/// Needs exactly six points in the order shown in the module docs.
/// Returns `DegenerateGeometry` when the corners coincide.
pub fn eye_aspect_ratio(eye: &[Point]) -> Result<f64, DmsError> {
    if eye.len() != EYE_POINTS {
        return Err(DmsError::InvalidInput(format!(
            "eye needs {} landmarks, got {}",
            EYE_POINTS,
            eye.len()
        )));
    }

    // Vertical distances
    let a = eye[1].distance(&eye[5]);
    let b = eye[2].distance(&eye[4]);

    // Horizontal distance
    let c = eye[0].distance(&eye[3]);

    if c == 0.0 {
        return Err(DmsError::DegenerateGeometry);
    }

    Ok((a + b) / (2.0 * c))
}

/// Both eyes of one detected face in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    pub left_eye: [Point; EYE_POINTS],
    pub right_eye: [Point; EYE_POINTS],
}

impl FaceObservation {
    /// Pick the eyes out of a full 68-point landmark set
    pub fn from_landmarks(landmarks: &[Point]) -> Result<Self, DmsError> {
        if landmarks.len() < FACE_LANDMARKS {
            return Err(DmsError::InvalidInput(format!(
                "face needs {} landmarks, got {}",
                FACE_LANDMARKS,
                landmarks.len()
            )));
        }

        let eye = |range: Range<usize>| -> Result<[Point; EYE_POINTS], DmsError> {
            <[Point; EYE_POINTS]>::try_from(&landmarks[range])
                .map_err(|e| DmsError::InvalidInput(e.to_string()))
        };

        Ok(Self {
            left_eye: eye(LEFT_EYE)?,
            right_eye: eye(RIGHT_EYE)?,
        })
    }

    pub fn left_ear(&self) -> Result<f64, DmsError> {
        eye_aspect_ratio(&self.left_eye)
    }

    pub fn right_ear(&self) -> Result<f64, DmsError> {
        eye_aspect_ratio(&self.right_eye)
    }

    /// Mean EAR of both eyes, the per-face metric fed to the state machine
    pub fn average_ear(&self) -> Result<f64, DmsError> {
        Ok((self.left_ear()? + self.right_ear()?) / 2.0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Eye 10px wide whose EAR is exactly `ear`
    pub(crate) fn eye_with_ear(origin_x: f64, ear: f64) -> [Point; EYE_POINTS] {
        let half = ear * 10.0 / 2.0;
        [
            Point::new(origin_x, 0.0),
            Point::new(origin_x + 3.0, -half),
            Point::new(origin_x + 7.0, -half),
            Point::new(origin_x + 10.0, 0.0),
            Point::new(origin_x + 7.0, half),
            Point::new(origin_x + 3.0, half),
        ]
    }

    /// Full 68-point face with the given per-eye EARs
    pub(crate) fn face_landmarks(left_ear: f64, right_ear: f64) -> Vec<Point> {
        let mut points = vec![Point::default(); FACE_LANDMARKS];
        points[RIGHT_EYE].copy_from_slice(&eye_with_ear(100.0, right_ear));
        points[LEFT_EYE].copy_from_slice(&eye_with_ear(140.0, left_ear));
        points
    }

    #[test]
    fn test_known_ratio() {
        let ear = eye_aspect_ratio(&eye_with_ear(0.0, 0.3)).unwrap();
        assert!((ear - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_flat_eye_is_zero() {
        // All points on one horizontal line
        let eye: Vec<Point> = (0..6).map(|i| Point::new(i as f64 * 2.0, 5.0)).collect();
        assert_eq!(eye_aspect_ratio(&eye).unwrap(), 0.0);
    }

    #[test]
    fn test_wrong_point_count() {
        let eye = eye_with_ear(0.0, 0.3);
        assert!(matches!(
            eye_aspect_ratio(&eye[..5]),
            Err(DmsError::InvalidInput(_))
        ));
        let mut seven = eye.to_vec();
        seven.push(Point::default());
        assert!(matches!(
            eye_aspect_ratio(&seven),
            Err(DmsError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_coincident_corners_are_degenerate() {
        let mut eye = eye_with_ear(0.0, 0.3);
        eye[3] = eye[0];
        assert!(matches!(
            eye_aspect_ratio(&eye),
            Err(DmsError::DegenerateGeometry)
        ));
    }

    #[test]
    fn test_face_average() {
        let face = FaceObservation::from_landmarks(&face_landmarks(0.2, 0.3)).unwrap();
        assert!((face.left_ear().unwrap() - 0.2).abs() < 1e-12);
        assert!((face.right_ear().unwrap() - 0.3).abs() < 1e-12);
        assert!((face.average_ear().unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_short_landmark_set_rejected() {
        let points = vec![Point::default(); 47];
        assert!(matches!(
            FaceObservation::from_landmarks(&points),
            Err(DmsError::InvalidInput(_))
        ));
    }

    fn point() -> impl Strategy<Value = Point> {
        (-500.0..500.0f64, -500.0..500.0f64).prop_map(|(x, y)| Point::new(x, y))
    }

    proptest! {
        #[test]
        fn prop_ear_non_negative_and_scale_invariant(
            eye in prop::array::uniform6(point()),
            scale in 0.01..100.0f64,
        ) {
            prop_assume!(eye[0].distance(&eye[3]) > 1e-3);

            let ear = eye_aspect_ratio(&eye).unwrap();
            prop_assert!(ear >= 0.0);

            let scaled = eye.map(|p| Point::new(p.x * scale, p.y * scale));
            let scaled_ear = eye_aspect_ratio(&scaled).unwrap();
            prop_assert!((ear - scaled_ear).abs() <= 1e-9 * ear.max(1.0));
        }
    }
}
