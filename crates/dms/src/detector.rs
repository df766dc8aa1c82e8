//! Face detection and landmark extraction

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use camera_capture::frame::VideoFrame;
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::geometry::{Point, FACE_LANDMARKS};
use crate::{DmsConfig, DmsError};

/// Face bounding box in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl FaceRegion {
    /// Integer box clamped to the frame, or `None` if nothing is left
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.max(0.0).floor() as u32;
        let y0 = self.y.max(0.0).floor() as u32;
        let x1 = ((self.x + self.width).ceil().max(0.0) as u32).min(frame_width);
        let y1 = ((self.y + self.height).ceil().max(0.0) as u32).min(frame_height);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }
}

/// Finds faces in a frame.
///
/// Returns every face found, possibly none; each call is independent.
pub trait FaceDetector {
    fn detect_faces(&mut self, frame: &VideoFrame) -> Result<Vec<FaceRegion>, DmsError>;
}

/// Regresses the 68 iBUG landmarks of one face
pub trait LandmarkExtractor {
    fn extract_landmarks(
        &mut self,
        frame: &VideoFrame,
        face: &FaceRegion,
    ) -> Result<Vec<Point>, DmsError>;
}

/// Frontal face detector using the SeetaFace cascade
pub struct SeetaFaceDetector {
    model: rustface::Model,
    min_face_size: u32,
    score_threshold: f64,
}

impl SeetaFaceDetector {
    pub fn new(config: &DmsConfig) -> Result<Self, DmsError> {
        let path = config
            .face_model_path
            .as_deref()
            .ok_or_else(|| DmsError::ModelLoad("no face model path configured".into()))?;

        info!("Loading face detector from {}", path);
        let file = File::open(path)
            .map_err(|e| DmsError::ModelLoad(format!("{}: {}", path, e)))?;
        let model = rustface::read_model(BufReader::new(file))
            .map_err(|e| DmsError::ModelLoad(format!("{}: {}", path, e)))?;

        Ok(Self {
            model,
            min_face_size: config.min_face_size,
            score_threshold: config.face_score_threshold,
        })
    }
}

impl FaceDetector for SeetaFaceDetector {
    fn detect_faces(&mut self, frame: &VideoFrame) -> Result<Vec<FaceRegion>, DmsError> {
        let gray = frame.to_grayscale();

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.min_face_size);
        detector.set_score_thresh(self.score_threshold);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let faces = detector.detect(&rustface::ImageData::new(&gray, frame.width, frame.height));

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceRegion {
                    x: bbox.x() as f32,
                    y: bbox.y() as f32,
                    width: bbox.width() as f32,
                    height: bbox.height() as f32,
                    confidence: face.score() as f32,
                }
            })
            .collect())
    }
}

/// Model input resolution for the landmark regressor
pub const LANDMARK_INPUT_SIZE: u32 = 112;

/// 68-point landmark regressor backed by an ONNX model.
///
/// Expects a 1x3xNxN RGB input in [0, 1] and a flat output of 136 values
/// (x0, y0, x1, y1, ...) normalized to the face crop.
pub struct OnnxLandmarkExtractor {
    session: ort::session::Session,
    input_size: u32,
}

impl OnnxLandmarkExtractor {
    pub fn new(config: &DmsConfig) -> Result<Self, DmsError> {
        let path = config
            .landmark_model_path
            .as_deref()
            .ok_or_else(|| DmsError::ModelLoad("no landmark model path configured".into()))?;
        Self::from_file(Path::new(path))
    }

    pub fn from_file(path: &Path) -> Result<Self, DmsError> {
        info!("Loading facial landmark predictor from {}", path.display());

        let session = ort::session::Session::builder()
            .map_err(|e| DmsError::ModelLoad(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| DmsError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            session,
            input_size: LANDMARK_INPUT_SIZE,
        })
    }
}

impl LandmarkExtractor for OnnxLandmarkExtractor {
    fn extract_landmarks(
        &mut self,
        frame: &VideoFrame,
        face: &FaceRegion,
    ) -> Result<Vec<Point>, DmsError> {
        // 1. Crop the face
        let (x, y, w, h) = face
            .clamp_to(frame.width, frame.height)
            .ok_or_else(|| DmsError::InvalidInput("face region outside frame".into()))?;
        let crop = frame
            .crop(x, y, w, h)
            .ok_or_else(|| DmsError::ImageProcessing("failed to crop face".into()))?;

        // 2. Resize and build the NCHW tensor
        let input = to_tensor(&crop, self.input_size)?;

        // 3. Inference
        let value = ort::value::Tensor::from_array(input)
            .map_err(|e| DmsError::Inference(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs![value])
            .map_err(|e| DmsError::Inference(e.to_string()))?;

        if outputs.len() == 0 {
            return Err(DmsError::Inference("landmark model produced no output".into()));
        }
        let coords = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| DmsError::Inference(e.to_string()))?;
        let coords: Vec<f32> = coords.iter().copied().collect();

        // 4. Map back to frame coordinates
        let points = decode_landmarks(&coords, x, y, w, h)?;
        debug!("Extracted {} landmarks for face at ({}, {})", points.len(), x, y);
        Ok(points)
    }
}

fn to_tensor(crop: &VideoFrame, size: u32) -> Result<Array4<f32>, DmsError> {
    let resized = crop
        .resize(size, size)
        .map_err(|e| DmsError::ImageProcessing(e.to_string()))?;

    let s = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, s, s));
    for (i, pixel) in resized.data.chunks_exact(3).enumerate() {
        let (py, px) = (i / s, i % s);
        for c in 0..3 {
            tensor[[0, c, py, px]] = pixel[c] as f32 / 255.0;
        }
    }
    Ok(tensor)
}

/// Convert crop-normalized (x, y) pairs into frame points
fn decode_landmarks(coords: &[f32], x: u32, y: u32, w: u32, h: u32) -> Result<Vec<Point>, DmsError> {
    if coords.len() < FACE_LANDMARKS * 2 {
        return Err(DmsError::Inference(format!(
            "expected {} landmark values, got {}",
            FACE_LANDMARKS * 2,
            coords.len()
        )));
    }

    Ok(coords
        .chunks_exact(2)
        .take(FACE_LANDMARKS)
        .map(|p| {
            Point::new(
                x as f64 + p[0] as f64 * w as f64,
                y as f64 + p[1] as f64 * h as f64,
            )
        })
        .collect())
}
