//! Deterministic embedder stubs for pipeline tests.

use async_trait::async_trait;
use devlens_protocol::{EmbedError, Embedder};

/// Embedder that derives a deterministic vector from the text bytes.
///
/// Equal texts embed identically and nearby texts stay nearby, which is
/// enough for similarity-ranking assertions.
pub struct FixedEmbedder {
    dimension: usize,
}

impl FixedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vector = vec![0.0f32; self.dimension];
        for (index, byte) in text.bytes().enumerate() {
            vector[index % self.dimension] += byte as f32 / 255.0;
        }
        Ok(vector)
    }
}

/// Embedder that fails every call.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn dimension(&self) -> usize {
        0
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
        Err(EmbedError("embedder offline".to_string()))
    }
}
