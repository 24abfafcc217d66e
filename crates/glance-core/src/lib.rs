//! glance-core — Face detection and recognition primitives.
//!
//! Defines the capability traits the streaming pipeline is built against
//! (detector, embedder, matcher) plus the production implementations:
//! Ultra-Light RFB-320 for detection and FaceNet for embeddings, both
//! running via ONNX Runtime for CPU inference.

pub mod detector;
pub mod embedder;
pub mod matcher;
pub mod types;

pub use detector::{DetectError, FaceDetector, UltraFaceDetector};
pub use embedder::{EmbedError, FaceEmbedder, FaceNetEmbedder};
pub use matcher::{IdentityMatcher, ThresholdMatcher};
pub use types::{Embedding, FaceRegion, Identity, IdentityMatch};
