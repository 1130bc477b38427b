//! The tool-library agent.
//!
//! A query walks through a fixed sequence of stages: the model breaks the
//! request down into steps, searches the tool library for those steps
//! through the `search_tools` function, and then solves the request with the
//! tools it found, calling them as many rounds as it needs.

mod builder;
mod error;
mod search_tool;
mod stage;
#[cfg(test)]
mod tests;

use tulip_model::ModelTool;

pub use builder::AgentBuilder;
pub use error::{Error, ErrorKind};

use crate::conversation::{Conversation, TranscriptSource};
use crate::library::ToolLibrary;
use crate::model_client::ModelClient;
use crate::prompts;
use crate::retry::RetryPolicy;

type TranscriptCallback = Box<dyn Fn(&str, TranscriptSource) + Send + Sync>;

/// How the agent finds the tools it offers to the model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Decompose the request, let the model search the library for each
    /// step, then solve with the tools found.
    #[default]
    Tulip,
    /// Search the library with the raw request, without decomposing it.
    Minimal,
    /// Offer every registered tool.
    AllTools,
    /// Offer no tools at all.
    Base,
}

impl Strategy {
    /// The system prompt used when none is configured.
    pub fn default_system_prompt(self) -> &'static str {
        match self {
            Strategy::Tulip => prompts::TULIP_COT,
            Strategy::Minimal => prompts::TOOL_COT,
            Strategy::AllTools => prompts::TOOL,
            Strategy::Base => prompts::BASE,
        }
    }
}

/// An agent answering queries with the tools of a [`ToolLibrary`].
///
/// Every query starts a fresh conversation, nothing is carried over between
/// two queries.
pub struct Agent {
    model_client: ModelClient,
    library: ToolLibrary,
    strategy: Strategy,
    system_prompt: String,
    top_k: usize,
    max_tool_rounds: usize,
    retry_policy: RetryPolicy,
    on_transcript: Option<TranscriptCallback>,
}

impl Agent {
    /// Answers `prompt`.
    pub async fn query(&self, prompt: &str) -> Result<Response, Error> {
        stage::Query::new(self, prompt).run().await
    }

    /// Returns the tool library.
    #[inline]
    pub fn library(&self) -> &ToolLibrary {
        &self.library
    }

    /// Returns the tool library for registering more tools.
    #[inline]
    pub fn library_mut(&mut self) -> &mut ToolLibrary {
        &mut self.library
    }

    /// Returns the strategy of this agent.
    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Returns the system prompt of this agent.
    #[inline]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}

/// The outcome of a successful query.
#[derive(Clone, Debug)]
pub struct Response {
    answer: String,
    tools: Vec<ModelTool>,
    conversation: Conversation,
}

impl Response {
    /// Returns the final answer.
    #[inline]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Returns the tools that were offered to the model.
    #[inline]
    pub fn tools(&self) -> &[ModelTool] {
        &self.tools
    }

    /// Returns the whole conversation of the query.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Consumes the response, returning the final answer.
    #[inline]
    pub fn into_answer(self) -> String {
        self.answer
    }
}
