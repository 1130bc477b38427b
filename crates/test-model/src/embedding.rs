use std::future::ready;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tulip_model::{Embedding, EmbeddingProvider, ErrorKind};

use crate::Error;

const DEFAULT_DIMENSIONS: usize = 256;

/// A deterministic embedder that hashes words into buckets.
///
/// Each lowercased alphanumeric word adds one to the bucket its FNV-1a hash
/// falls into, so texts sharing words end up close in cosine similarity.
/// Good enough to exercise similarity search without a network.
///
/// Clones share the call counter, so keep a clone around to see how many
/// requests the code under test has made.
#[derive(Clone, Debug)]
pub struct TestEmbeddingProvider {
    dimensions: usize,
    fail_with: Option<ErrorKind>,
    fail_from: usize,
    fail_count: Option<usize>,
    calls: Arc<AtomicUsize>,
}

impl TestEmbeddingProvider {
    #[inline]
    pub fn new() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
            fail_with: None,
            fail_from: 0,
            fail_count: None,
            calls: Arc::default(),
        }
    }

    #[inline]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions.max(1);
        self
    }

    /// Makes every request fail with the given error kind.
    #[inline]
    pub fn failing(mut self, kind: ErrorKind) -> Self {
        self.fail_with = Some(kind);
        self
    }

    /// Lets the first `calls` requests succeed before failures start.
    #[inline]
    pub fn starting_after(mut self, calls: usize) -> Self {
        self.fail_from = calls;
        self
    }

    /// Stops failing after `count` failed requests.
    #[inline]
    pub fn limited_to(mut self, count: usize) -> Self {
        self.fail_count = Some(count);
        self
    }

    /// Returns the number of requests received so far.
    #[inline]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> Option<ErrorKind> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let kind = self.fail_with?;
        let failed = call.checked_sub(self.fail_from)?;
        match self.fail_count {
            Some(count) if failed >= count => None,
            _ => Some(kind),
        }
    }

    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut embedding = vec![0.0; self.dimensions];
        for word in text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let bucket = fnv1a(&word.to_ascii_lowercase()) as usize
                % self.dimensions;
            embedding[bucket] += 1.0;
        }
        embedding
    }
}

impl Default for TestEmbeddingProvider {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for TestEmbeddingProvider {
    type Error = crate::Error;

    fn embed(
        &self,
        inputs: &[String],
    ) -> impl Future<Output = Result<Vec<Embedding>, Self::Error>> + Send + 'static
    {
        let failure = self.should_fail();
        let result: Result<Vec<Embedding>, Error> = match failure {
            Some(kind) => Err(Error {
                message: "preset embedding failure",
                kind,
            }),
            None => {
                Ok(inputs.iter().map(|text| self.embed_text(text)).collect())
            }
        };
        ready(result)
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}
