//! Identity matching against the registered gallery.
//!
//! The baseline matcher is a full linear scan per probe — exact and simple.
//! An approximate-nearest-neighbor index can replace it behind the same
//! trait without touching the pipeline.

use crate::types::{Embedding, Identity, IdentityMatch};

/// Strategy for resolving a probe embedding to a registered identity.
pub trait IdentityMatcher: Send + Sync {
    /// Return the matching identity for `probe`, or `None` if no registered
    /// identity is close enough. A `None` is a normal outcome, not an error.
    fn find_match(&self, probe: &Embedding, gallery: &[Identity]) -> Option<IdentityMatch>;
}

/// Cosine-distance matcher with first-match semantics.
///
/// Scans the gallery in its natural (insertion/id) order and accepts the
/// FIRST identity whose cosine distance to the probe falls below the
/// threshold. A later, closer identity does not win over an earlier
/// qualifying one.
pub struct ThresholdMatcher {
    threshold: f32,
}

impl ThresholdMatcher {
    /// Default operating point for the FaceNet embedding space.
    pub const DEFAULT_THRESHOLD: f32 = 0.4;

    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for ThresholdMatcher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl IdentityMatcher for ThresholdMatcher {
    fn find_match(&self, probe: &Embedding, gallery: &[Identity]) -> Option<IdentityMatch> {
        for identity in gallery {
            // A stored embedding of a different length is corrupt data, not a
            // mismatch: exclude it from the scan rather than comparing.
            if identity.embedding.len() != probe.len() {
                tracing::warn!(
                    id = identity.id,
                    name = %identity.name,
                    stored_len = identity.embedding.len(),
                    probe_len = probe.len(),
                    "embedding length mismatch; excluding identity from matching"
                );
                continue;
            }

            let distance = probe.cosine_distance(&identity.embedding);
            if distance < self.threshold {
                return Some(IdentityMatch {
                    id: identity.id,
                    name: identity.name.clone(),
                });
            }
        }
        None
    }
}
