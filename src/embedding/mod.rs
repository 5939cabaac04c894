//! Text-to-vector embedding capability.
//!
//! The engine treats embedding as an injected capability behind
//! [`EmbeddingProvider`]: same input text yields a stable vector, and cosine
//! similarity between vectors approximates semantic relatedness. Providers are
//! substitutable without affecting any other component. The default is
//! [`hashed::HashedEmbeddingProvider`], a deterministic feature-hashing
//! embedder with no model runtime.

pub mod hashed;

use anyhow::Result;

/// Number of dimensions in the embedding vectors, fixed per deployment.
pub const EMBEDDING_DIM: usize = 384;

/// Trait for embedding text into vectors.
///
/// Implementations produce L2-normalized vectors of exactly [`EMBEDDING_DIM`]
/// dimensions. All methods are synchronous.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Return the number of dimensions this provider produces.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Create an embedding provider from config.
///
/// Currently only `"hashed"` is supported.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hashed" => Ok(Box::new(hashed::HashedEmbeddingProvider::new())),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: hashed"),
    }
}
