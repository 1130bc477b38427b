use crate::provider::ModelProviderError;

/// A dense vector representation of a piece of text.
pub type Embedding = Vec<f32>;

/// A type that turns texts into embeddings.
///
/// The same stateless expectations as [`ModelProvider`] apply here.
///
/// [`ModelProvider`]: crate::ModelProvider
pub trait EmbeddingProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Embeds every input, returning the vectors in input order.
    ///
    /// Implementations must return exactly one embedding per input, and
    /// all embeddings from one provider must share the same dimension.
    fn embed(
        &self,
        inputs: &[String],
    ) -> impl Future<Output = Result<Vec<Embedding>, Self::Error>> + Send + 'static;
}
