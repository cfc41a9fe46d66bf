use crate::error::ProviderError;

pub mod openai;

/// Default embedding model. Produces 1536-dimensional vectors.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_DIMENSION: usize = 1536;

/// A text embedding provider with a fixed output dimension.
pub trait Embedder {
    #[allow(async_fn_in_trait)]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    fn dimension(&self) -> usize;
}

/// Checks a provider response against the declared dimension.
pub fn check_dimension(embedding: &[f32], expected: usize) -> Result<(), ProviderError> {
    if embedding.is_empty() {
        return Err(ProviderError::malformed("empty embedding vector"));
    }
    if embedding.len() != expected {
        return Err(ProviderError::DimensionMismatch {
            expected,
            actual: embedding.len(),
        });
    }
    Ok(())
}
