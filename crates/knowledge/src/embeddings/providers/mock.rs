//! Offline embedding provider built from character n-grams.

use crate::embeddings::provider::EmbeddingProvider;
use hr_core::AppResult;

/// Deterministic, content-dependent embeddings for tests and offline runs.
///
/// Regulation text is mostly CJK without word separators, so features are
/// single characters and adjacent character pairs rather than words. Not
/// semantically meaningful, but texts that share vocabulary land close
/// together.
#[derive(Debug)]
pub struct MockProvider {
    dimensions: usize,
}

impl MockProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, feature: &str, seed: u64) -> usize {
        let hash = feature
            .bytes()
            .fold(seed, |acc, b| acc.wrapping_mul(0x100_0000_01b3).wrapping_add(b as u64));
        (hash % self.dimensions as u64) as usize
    }

    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        let chars: Vec<char> = text
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();

        let mut buf = [0u8; 4];
        for c in &chars {
            let idx = self.bucket(c.encode_utf8(&mut buf), 0xcbf2_9ce4_8422_2325);
            embedding[idx] += 0.5;
        }

        for pair in chars.windows(2) {
            let bigram: String = pair.iter().collect();
            let idx = self.bucket(&bigram, 0x8422_2325_cbf2_9ce4);
            embedding[idx] += 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "char-bigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.generate_embedding(t)).collect())
    }
}
