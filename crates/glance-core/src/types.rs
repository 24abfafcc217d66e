use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box for a detected face, in pixel coordinates.
///
/// Regions are always clipped to the bounds of the image they were detected
/// in; every stage downstream of detection consumes this one shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f32,
}

impl FaceRegion {
    /// Crop this region out of `image`.
    ///
    /// Coordinates are re-clamped against the image dimensions so a region
    /// detected on a different scale can never read out of bounds; the crop
    /// is always at least 1x1.
    pub fn crop_from(&self, image: &RgbImage) -> RgbImage {
        let max_x = image.width().saturating_sub(1);
        let max_y = image.height().saturating_sub(1);
        let x = self.x.min(max_x);
        let y = self.y.min(max_y);
        let width = self.width.min(image.width() - x).max(1);
        let height = self.height.min(image.height() - y).max(1);
        image::imageops::crop_imm(image, x, y, width, height).to_image()
    }
}

/// Face embedding vector (512-dimensional for the FaceNet model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compute cosine distance (`1 - cosine similarity`) to another embedding.
    ///
    /// Returns a value in [0, 2]; smaller means more similar. A zero-norm
    /// vector is maximally distant (1.0) from everything.
    pub fn cosine_distance(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            1.0 - dot / denom
        } else {
            1.0
        }
    }

    /// Serialize to little-endian f32 bytes for storage.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Deserialize from little-endian f32 bytes.
    ///
    /// Returns `None` if the byte length is not a multiple of 4.
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % 4 != 0 {
            return None;
        }
        let values = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Some(Self { values })
    }
}

/// A registered identity as the matcher consumes it.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: i64,
    pub name: String,
    pub embedding: Embedding,
}

/// Outcome of matching one face against the registered identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMatch {
    pub id: i64,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_distance_identical() {
        let a = Embedding::new(vec![1.0, 0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert!(a.cosine_distance(&b).abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_orthogonal() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!((a.cosine_distance(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_opposite() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![-1.0, 0.0]);
        assert!((a.cosine_distance(&b) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_zero_vector() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(a.cosine_distance(&b), 1.0);
    }

    #[test]
    fn cosine_distance_scale_invariant() {
        let a = Embedding::new(vec![1.0, 2.0, 3.0]);
        let b = Embedding::new(vec![2.0, 4.0, 6.0]);
        assert!(a.cosine_distance(&b).abs() < 1e-6);
    }

    #[test]
    fn embedding_byte_roundtrip() {
        let original = Embedding::new(vec![0.25, -1.5, 3.75, f32::MIN_POSITIVE]);
        let bytes = original.to_le_bytes();
        assert_eq!(bytes.len(), 16);
        let restored = Embedding::from_le_bytes(&bytes).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn embedding_from_truncated_bytes() {
        assert!(Embedding::from_le_bytes(&[0u8; 7]).is_none());
        assert_eq!(Embedding::from_le_bytes(&[]).unwrap().len(), 0);
    }

    #[test]
    fn crop_within_bounds() {
        let image = RgbImage::new(100, 80);
        let region = FaceRegion {
            x: 10,
            y: 20,
            width: 30,
            height: 40,
            confidence: 0.9,
        };
        let crop = region.crop_from(&image);
        assert_eq!((crop.width(), crop.height()), (30, 40));
    }

    #[test]
    fn crop_clamps_oversized_region() {
        let image = RgbImage::new(50, 50);
        let region = FaceRegion {
            x: 40,
            y: 45,
            width: 100,
            height: 100,
            confidence: 0.9,
        };
        let crop = region.crop_from(&image);
        assert_eq!((crop.width(), crop.height()), (10, 5));
    }

    #[test]
    fn crop_degenerate_region_is_one_pixel() {
        let image = RgbImage::new(50, 50);
        let region = FaceRegion {
            x: 60,
            y: 60,
            width: 0,
            height: 0,
            confidence: 0.9,
        };
        let crop = region.crop_from(&image);
        assert_eq!((crop.width(), crop.height()), (1, 1));
    }
}
