use std::pin::Pin;
use std::sync::Arc;

use tulip_model::{Embedding, EmbeddingProvider};

use crate::retry::{BoxedError, RetryPolicy, retry};

type EmbedResult = Result<Vec<Embedding>, BoxedError>;
type BoxedEmbedFuture = Pin<Box<dyn Future<Output = EmbedResult> + Send>>;
type HandlerFn = Arc<dyn Fn(&[String]) -> BoxedEmbedFuture + Send + Sync>;

/// A type-erased embedding provider with retries applied.
#[derive(Clone)]
pub(crate) struct EmbeddingClient {
    handler_fn: HandlerFn,
    retry_policy: RetryPolicy,
}

impl EmbeddingClient {
    pub fn new<P: EmbeddingProvider + 'static>(provider: P) -> Self {
        let handler_fn: HandlerFn = Arc::new(move |inputs: &[String]| {
            let fut = provider.embed(inputs);
            Box::pin(async move {
                fut.await.map_err(|err| Box::new(err) as BoxedError)
            })
        });
        Self {
            handler_fn,
            retry_policy: RetryPolicy::default(),
        }
    }

    #[inline]
    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.retry_policy = policy;
    }

    /// Embeds `inputs`, one vector per input in the same order.
    pub async fn embed(&self, inputs: &[String]) -> EmbedResult {
        if inputs.is_empty() {
            return Ok(vec![]);
        }
        trace!("embedding {} text(s)", inputs.len());
        retry(&self.retry_policy, || (self.handler_fn)(inputs)).await
    }
}
