//! FaceNet face embedder via ONNX Runtime.
//!
//! Extracts 512-dimensional embeddings from cropped face images. The crop is
//! resized to the model's 160x160 input internally, so callers hand over the
//! raw detection crop.

use std::path::Path;
use std::sync::Mutex;

use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;

use crate::types::Embedding;

// --- Named constants ---
const FACENET_INPUT_SIZE: usize = 160;
const FACENET_MEAN: f32 = 127.5;
const FACENET_STD: f32 = 128.0;
const FACENET_EMBEDDING_DIM: usize = 512;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("model file not found: {0} — download facenet.onnx and place it in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("expected {expected}-dim embedding, got {actual}")]
    UnexpectedDimension { expected: usize, actual: usize },
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Capability: given a cropped face image, return its embedding.
///
/// Output length is fixed for a given model; identical input bytes produce
/// the same vector up to floating-point drift, which the match threshold
/// absorbs.
pub trait FaceEmbedder: Send + Sync {
    fn embed(&self, face: &RgbImage) -> Result<Embedding, EmbedError>;
}

/// FaceNet-based embedder.
pub struct FaceNetEmbedder {
    session: Mutex<Session>,
}

impl FaceNetEmbedder {
    /// Load the FaceNet ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, EmbedError> {
        if !Path::new(model_path).exists() {
            return Err(EmbedError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded FaceNet embedding model"
        );

        Ok(Self {
            session: Mutex::new(session),
        })
    }

    /// Resize a face crop to 160x160 and normalize into a NCHW float tensor.
    fn preprocess(face: &RgbImage) -> Array4<f32> {
        let resized = image::imageops::resize(
            face,
            FACENET_INPUT_SIZE as u32,
            FACENET_INPUT_SIZE as u32,
            image::imageops::FilterType::Triangle,
        );

        let mut tensor =
            Array4::<f32>::zeros((1, 3, FACENET_INPUT_SIZE, FACENET_INPUT_SIZE));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 - FACENET_MEAN) / FACENET_STD;
            }
        }
        tensor
    }
}

impl FaceEmbedder for FaceNetEmbedder {
    fn embed(&self, face: &RgbImage) -> Result<Embedding, EmbedError> {
        let input = Self::preprocess(face);

        let mut session = self
            .session
            .lock()
            .map_err(|_| EmbedError::InferenceFailed("session mutex poisoned".into()))?;

        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != FACENET_EMBEDDING_DIM {
            return Err(EmbedError::UnexpectedDimension {
                expected: FACENET_EMBEDDING_DIM,
                actual: raw.len(),
            });
        }

        Ok(Embedding::new(raw.to_vec()))
    }
}
