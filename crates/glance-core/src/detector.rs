//! Ultra-Light face detector via ONNX Runtime.
//!
//! Runs the Ultra-Light-Fast-Generic-Face-Detector RFB-320 model: a fixed
//! 320x240 input, per-anchor face scores and normalized corner boxes, with
//! NMS post-processing.

use std::path::Path;
use std::sync::Mutex;

use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;

use crate::types::FaceRegion;

// --- Named constants ---
const ULTRAFACE_INPUT_WIDTH: usize = 320;
const ULTRAFACE_INPUT_HEIGHT: usize = 240;
const ULTRAFACE_MEAN: f32 = 127.0;
const ULTRAFACE_STD: f32 = 128.0;
const ULTRAFACE_CONFIDENCE_THRESHOLD: f32 = 0.7;
const ULTRAFACE_NMS_THRESHOLD: f32 = 0.3;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("model file not found: {0} — download version-RFB-320.onnx and place it in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Capability: given a decoded image, return the detected face regions.
///
/// The returned list is ordered by confidence (highest first), possibly
/// empty, and deterministic for a fixed model and confidence threshold.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<Vec<FaceRegion>, DetectError>;
}

/// Candidate detection in original-image coordinates, pre-NMS.
#[derive(Debug, Clone)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

/// Ultra-Light RFB-320 face detector.
///
/// The session is shared process-wide; sessions of the streaming service
/// hold `Arc` references and never re-instantiate the model.
pub struct UltraFaceDetector {
    session: Mutex<Session>,
}

impl UltraFaceDetector {
    /// Load the RFB-320 ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectError> {
        if !Path::new(model_path).exists() {
            return Err(DetectError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded Ultra-Light detection model"
        );

        Ok(Self {
            session: Mutex::new(session),
        })
    }

    /// Preprocess an RGB image into the fixed 320x240 NCHW float tensor.
    fn preprocess(image: &RgbImage) -> Array4<f32> {
        let resized = image::imageops::resize(
            image,
            ULTRAFACE_INPUT_WIDTH as u32,
            ULTRAFACE_INPUT_HEIGHT as u32,
            image::imageops::FilterType::Triangle,
        );

        let mut tensor =
            Array4::<f32>::zeros((1, 3, ULTRAFACE_INPUT_HEIGHT, ULTRAFACE_INPUT_WIDTH));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 - ULTRAFACE_MEAN) / ULTRAFACE_STD;
            }
        }
        tensor
    }
}

impl FaceDetector for UltraFaceDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<FaceRegion>, DetectError> {
        let input = Self::preprocess(image);

        let mut session = self
            .session
            .lock()
            .map_err(|_| DetectError::InferenceFailed("session mutex poisoned".into()))?;

        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::InferenceFailed(format!("boxes: {e}")))?;

        let candidates = decode_detections(
            scores,
            boxes,
            image.width(),
            image.height(),
            ULTRAFACE_CONFIDENCE_THRESHOLD,
        );
        let kept = nms(candidates, ULTRAFACE_NMS_THRESHOLD);

        Ok(kept
            .iter()
            .map(|c| to_region(c, image.width(), image.height()))
            .collect())
    }
}

/// Decode per-anchor outputs into candidates in original-image coordinates.
///
/// `scores` holds [background, face] pairs per anchor; `boxes` holds
/// normalized [x1, y1, x2, y2] corners relative to the full image.
fn decode_detections(
    scores: &[f32],
    boxes: &[f32],
    image_width: u32,
    image_height: u32,
    threshold: f32,
) -> Vec<Candidate> {
    let num_anchors = scores.len() / 2;
    let mut candidates = Vec::new();

    for idx in 0..num_anchors {
        let score = scores[idx * 2 + 1];
        if score <= threshold {
            continue;
        }

        let box_off = idx * 4;
        if box_off + 3 >= boxes.len() {
            break;
        }

        candidates.push(Candidate {
            x1: boxes[box_off] * image_width as f32,
            y1: boxes[box_off + 1] * image_height as f32,
            x2: boxes[box_off + 2] * image_width as f32,
            y2: boxes[box_off + 3] * image_height as f32,
            score,
        });
    }

    candidates
}

/// Non-Maximum Suppression: drop candidates overlapping a stronger one,
/// returning survivors sorted by confidence descending.
fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

/// Intersection-over-Union of two candidates.
fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
    let area_b = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);
    let union = area_a + area_b - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

/// Convert a candidate into a pixel-coordinate region clipped to the image.
fn to_region(candidate: &Candidate, image_width: u32, image_height: u32) -> FaceRegion {
    let max_x = image_width.saturating_sub(1) as f32;
    let max_y = image_height.saturating_sub(1) as f32;

    let x1 = candidate.x1.clamp(0.0, max_x);
    let y1 = candidate.y1.clamp(0.0, max_y);
    let x2 = candidate.x2.clamp(0.0, image_width as f32);
    let y2 = candidate.y2.clamp(0.0, image_height as f32);

    let x = x1.floor() as u32;
    let y = y1.floor() as u32;
    let width = ((x2 - x1).round() as u32).min(image_width - x).max(1);
    let height = ((y2 - y1).round() as u32).min(image_height - y).max(1);

    FaceRegion {
        x,
        y,
        width,
        height,
        confidence: candidate.score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Candidate {
        Candidate { x1, y1, x2, y2, score }
    }

    #[test]
    fn decode_filters_by_face_score() {
        // Two anchors: [bg, face] pairs. Only the second clears 0.7.
        let scores = [0.9, 0.1, 0.05, 0.95];
        let boxes = [0.0, 0.0, 0.1, 0.1, 0.25, 0.25, 0.75, 0.75];

        let dets = decode_detections(&scores, &boxes, 320, 240, 0.7);
        assert_eq!(dets.len(), 1);
        assert!((dets[0].score - 0.95).abs() < 1e-6);
        // Normalized corners scaled to pixel space.
        assert!((dets[0].x1 - 80.0).abs() < 1e-3);
        assert!((dets[0].y1 - 60.0).abs() < 1e-3);
        assert!((dets[0].x2 - 240.0).abs() < 1e-3);
        assert!((dets[0].y2 - 180.0).abs() < 1e-3);
    }

    #[test]
    fn decode_empty_scores() {
        let dets = decode_detections(&[], &[], 320, 240, 0.7);
        assert!(dets.is_empty());
    }

    #[test]
    fn iou_identical() {
        let a = candidate(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_disjoint() {
        let a = candidate(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = candidate(20.0, 20.0, 30.0, 30.0, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn iou_partial_overlap() {
        let a = candidate(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = candidate(5.0, 0.0, 15.0, 10.0, 1.0);
        // Overlap 5x10 = 50, union 100+100-50 = 150.
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn nms_suppresses_overlapping_keeps_strongest() {
        let candidates = vec![
            candidate(0.0, 0.0, 100.0, 100.0, 0.8),
            candidate(5.0, 5.0, 105.0, 105.0, 0.9),
            candidate(200.0, 200.0, 250.0, 250.0, 0.75),
        ];

        let kept = nms(candidates, 0.3);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].score - 0.9).abs() < 1e-6);
        assert!((kept[1].score - 0.75).abs() < 1e-6);
    }

    #[test]
    fn nms_orders_by_confidence_descending() {
        let candidates = vec![
            candidate(0.0, 0.0, 10.0, 10.0, 0.71),
            candidate(100.0, 100.0, 110.0, 110.0, 0.99),
            candidate(200.0, 0.0, 210.0, 10.0, 0.85),
        ];

        let kept = nms(candidates, 0.3);
        let scores: Vec<f32> = kept.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![0.99, 0.85, 0.71]);
    }

    #[test]
    fn region_is_clipped_to_image_bounds() {
        let c = candidate(-10.0, -5.0, 700.0, 500.0, 0.9);
        let region = to_region(&c, 640, 480);
        assert_eq!(region.x, 0);
        assert_eq!(region.y, 0);
        assert_eq!(region.width, 640);
        assert_eq!(region.height, 480);
    }

    #[test]
    fn region_has_minimum_size() {
        let c = candidate(50.0, 50.0, 50.2, 50.2, 0.9);
        let region = to_region(&c, 640, 480);
        assert_eq!(region.width, 1);
        assert_eq!(region.height, 1);
    }

    #[test]
    fn preprocess_shape_and_normalization() {
        let image = RgbImage::from_pixel(64, 48, image::Rgb([127, 127, 127]));
        let tensor = UltraFaceDetector::preprocess(&image);
        assert_eq!(
            tensor.shape(),
            &[1, 3, ULTRAFACE_INPUT_HEIGHT, ULTRAFACE_INPUT_WIDTH]
        );
        // Pixel value 127 normalizes to 0.0 exactly.
        assert!(tensor[[0, 0, 0, 0]].abs() < 1e-6);
        assert!(tensor[[0, 2, 120, 160]].abs() < 1e-6);
    }
}
