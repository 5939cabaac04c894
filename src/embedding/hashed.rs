//! Deterministic feature-hashing embedder.
//!
//! Tokenizes text into lowercase alphanumeric words, hashes each unigram and
//! adjacent bigram with FNV-1a into one of [`EMBEDDING_DIM`] buckets with a
//! hash-derived sign, and L2-normalizes the result. Identical text always
//! produces the identical vector; texts sharing tokens land in shared buckets
//! and score high cosine similarity.

use anyhow::Result;

use super::{EmbeddingProvider, EMBEDDING_DIM};

/// Weight given to adjacent-token bigram features relative to unigrams.
const BIGRAM_WEIGHT: f32 = 0.5;

pub struct HashedEmbeddingProvider {
    dims: usize,
}

impl HashedEmbeddingProvider {
    pub fn new() -> Self {
        Self { dims: EMBEDDING_DIM }
    }
}

impl Default for HashedEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for HashedEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = tokenize(text);
        let mut v = vec![0.0f32; self.dims];

        for token in &tokens {
            accumulate(&mut v, token, 1.0);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            accumulate(&mut v, &bigram, BIGRAM_WEIGHT);
        }

        l2_normalize(&mut v);
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Hash a feature into its bucket and add the signed weight.
fn accumulate(v: &mut [f32], feature: &str, weight: f32) {
    let h = fnv1a(feature.as_bytes());
    let idx = (h % v.len() as u64) as usize;
    let sign = if (h >> 32) & 1 == 0 { 1.0 } else { -1.0 };
    v[idx] += sign * weight;
}

/// Lowercase alphanumeric word tokens, in order.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// FNV-1a 64-bit — stable across builds and platforms, unlike the std hasher.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
