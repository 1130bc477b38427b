//! A searchable library of tools.
//!
//! Every registered tool is indexed by the embedding of its description.
//! Searching embeds the query the same way and ranks tools by cosine
//! similarity, so the model only ever sees the handful of tools relevant
//! to what it is trying to do.

mod error;
mod similarity;

use std::collections::HashMap;
use std::fmt::{self, Debug};

use serde_json::Value;
use tulip_model::{Embedding, EmbeddingProvider, ModelTool};

pub use error::{Error, ErrorKind};
use similarity::cosine_similarity;

use crate::embedding_client::EmbeddingClient;
use crate::retry::RetryPolicy;
use crate::tool::{
    Error as ToolError, Tool, ToolObject, ToolObjectImpl, ToolResult,
};

/// A tool found by a search, with how close its description is to the query.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolMatch {
    /// The descriptor to offer to the model.
    pub tool: ModelTool,
    /// Cosine similarity between the query and the tool description.
    pub similarity: f32,
}

struct Entry {
    tool: Box<dyn ToolObject>,
    embedding: Embedding,
}

/// Registered tools indexed by description embeddings.
pub struct ToolLibrary {
    entries: HashMap<String, Entry>,
    embedding_client: EmbeddingClient,
    similarity_threshold: Option<f32>,
}

impl ToolLibrary {
    /// Creates an empty library that embeds with `provider`.
    pub fn new<P: EmbeddingProvider + 'static>(provider: P) -> Self {
        Self {
            entries: HashMap::new(),
            embedding_client: EmbeddingClient::new(provider),
            similarity_threshold: None,
        }
    }

    /// Drops search results scoring below `threshold`.
    #[inline]
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    /// Sets how failed embedding calls are retried.
    #[inline]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.embedding_client.set_retry_policy(policy);
        self
    }

    /// Returns the configured similarity threshold.
    #[inline]
    pub fn similarity_threshold(&self) -> Option<f32> {
        self.similarity_threshold
    }

    /// Embeds the tool's description and adds it under the tool's name.
    pub async fn register<T: Tool>(&mut self, tool: T) -> Result<(), Error> {
        let name = tool.name().to_owned();
        if self.entries.contains_key(&name) {
            return Err(Error::already_registered(&name));
        }

        let embedding = self.embed_one(tool.description()).await?;
        info!("registered tool `{name}`");
        self.entries.insert(
            name,
            Entry {
                tool: Box::new(ToolObjectImpl(tool)),
                embedding,
            },
        );
        Ok(())
    }

    /// Replaces a registered tool with a new implementation of the same
    /// name, re-embedding its description.
    pub async fn update<T: Tool>(&mut self, tool: T) -> Result<(), Error> {
        let name = tool.name().to_owned();
        if !self.entries.contains_key(&name) {
            return Err(Error::not_found(&name));
        }

        let embedding = self.embed_one(tool.description()).await?;
        info!("updated tool `{name}`");
        self.entries.insert(
            name,
            Entry {
                tool: Box::new(ToolObjectImpl(tool)),
                embedding,
            },
        );
        Ok(())
    }

    /// Removes a tool, returning its descriptor.
    pub fn remove(&mut self, name: &str) -> Result<ModelTool, Error> {
        let entry = self
            .entries
            .remove(name)
            .ok_or_else(|| Error::not_found(name))?;
        info!("removed tool `{name}`");
        Ok(entry.tool.definition())
    }

    /// Returns `true` if a tool named `name` is registered.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the number of registered tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the descriptor of a registered tool.
    pub fn get(&self, name: &str) -> Option<ModelTool> {
        self.entries.get(name).map(|entry| entry.tool.definition())
    }

    /// Returns the descriptors of all tools, ordered by name.
    pub fn definitions(&self) -> Vec<ModelTool> {
        let mut definitions: Vec<_> = self
            .entries
            .values()
            .map(|entry| entry.tool.definition())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Returns up to `top_k` tools whose descriptions are closest to
    /// `description`, most similar first. Equal scores are ordered by name.
    pub async fn search(
        &self,
        description: &str,
        top_k: usize,
    ) -> Result<Vec<ToolMatch>, Error> {
        if top_k == 0 || self.entries.is_empty() {
            return Ok(vec![]);
        }
        let query = self.embed_one(description).await?;
        let matches = self.rank(&query, top_k);
        debug!(
            "search `{description}`: {:?}",
            matches
                .iter()
                .map(|m| (m.tool.name.as_str(), m.similarity))
                .collect::<Vec<_>>()
        );
        Ok(matches)
    }

    /// Searches for each description and merges the results.
    ///
    /// A tool found for several descriptions is returned once, at the
    /// position of its first occurrence.
    pub async fn search_many<S: AsRef<str>>(
        &self,
        descriptions: &[S],
        top_k: usize,
    ) -> Result<Vec<ModelTool>, Error> {
        if top_k == 0 || self.entries.is_empty() || descriptions.is_empty() {
            return Ok(vec![]);
        }

        let inputs: Vec<String> =
            descriptions.iter().map(|d| d.as_ref().to_owned()).collect();
        let queries = self.embed(&inputs).await?;

        let mut found: Vec<ModelTool> = Vec::new();
        for (description, query) in inputs.iter().zip(&queries) {
            let matches = self.rank(query, top_k);
            info!(
                "tools for `{description}`: {:?}",
                matches.iter().map(|m| &m.tool.name).collect::<Vec<_>>()
            );
            for ToolMatch { tool, .. } in matches {
                if !found.iter().any(|t| t.name == tool.name) {
                    found.push(tool);
                }
            }
        }
        Ok(found)
    }

    /// Runs the tool named `name` with JSON `arguments`.
    pub async fn execute(&self, name: &str, arguments: Value) -> ToolResult {
        let Some(entry) = self.entries.get(name) else {
            warn!("model called unknown tool `{name}`");
            return Err(ToolError::not_found()
                .with_reason(format!("no tool named `{name}`")));
        };
        info!("calling `{name}` with {arguments}");
        let result = entry.tool.execute(arguments).await;
        match &result {
            Ok(output) => info!("`{name}` returned: {output}"),
            Err(err) => warn!("`{name}` failed: {err}"),
        }
        result
    }

    fn rank(&self, query: &[f32], top_k: usize) -> Vec<ToolMatch> {
        let mut scored: Vec<(f32, &Entry)> = self
            .entries
            .values()
            .map(|entry| (cosine_similarity(query, &entry.embedding), entry))
            .filter(|(similarity, _)| {
                self.similarity_threshold
                    .is_none_or(|threshold| *similarity >= threshold)
            })
            .collect();
        scored.sort_by(|(sa, a), (sb, b)| {
            sb.total_cmp(sa)
                .then_with(|| a.tool.name().cmp(b.tool.name()))
        });
        scored
            .into_iter()
            .take(top_k)
            .map(|(similarity, entry)| ToolMatch {
                tool: entry.tool.definition(),
                similarity,
            })
            .collect()
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Embedding>, Error> {
        let embeddings = self
            .embedding_client
            .embed(inputs)
            .await
            .map_err(|err| Error::embedding(err.to_string()))?;
        if embeddings.len() != inputs.len() {
            return Err(Error::embedding(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    async fn embed_one(&self, text: &str) -> Result<Embedding, Error> {
        let mut embeddings = self.embed(&[text.to_owned()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| Error::embedding("no embedding returned"))
    }
}

impl Debug for ToolLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("ToolLibrary")
            .field("tools", &names)
            .field("similarity_threshold", &self.similarity_threshold)
            .finish_non_exhaustive()
    }
}
