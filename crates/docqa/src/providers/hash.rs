//! Offline embedder based on feature hashing

use async_trait::async_trait;

use crate::error::Result;

use super::embedding::EmbeddingProvider;

/// Deterministic bag-of-words embedder.
///
/// Each lowercased alphanumeric token is hashed into one of `dimensions`
/// buckets with a hash-derived sign; the result is L2-normalised. Texts sharing
/// words get positive cosine similarity, which is enough to run the pipeline
/// without an embedding service.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Embed synchronously
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimensions];

        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);

        for token in tokens {
            let h = fnv1a(token.as_bytes());
            let idx = (h % self.dimensions as u64) as usize;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vec[idx] += sign;
        }

        // L2 normalize
        let mag: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if mag > 0.0 {
            for v in &mut vec {
                *v /= mag;
            }
        }

        vec
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        h ^= *b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_deterministic_and_normalised() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed_text("The sky is blue");
        assert_eq!(a, embedder.embed_text("the SKY is blue!"));
        assert_eq!(a.len(), 64);
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shared_words_are_closer() {
        let embedder = HashEmbedder::new(256);
        let query = embedder.embed_text("what color is the sky");
        let sky = embedder.embed_text("the sky is blue");
        let grass = embedder.embed_text("grass grows green");
        assert!(cosine(&query, &sky) > cosine(&query, &grass));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(8);
        assert!(embedder.embed_text("  ").iter().all(|v| *v == 0.0));
    }
}
