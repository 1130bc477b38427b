use tulip_model::ModelProvider;

use super::{Agent, Strategy, TranscriptCallback};
use crate::conversation::TranscriptSource;
use crate::library::ToolLibrary;
use crate::model_client::ModelClient;
use crate::retry::RetryPolicy;

const DEFAULT_TOP_K: usize = 3;
const DEFAULT_MAX_TOOL_ROUNDS: usize = 16;

/// [`Agent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    library: ToolLibrary,
    strategy: Strategy,
    system_prompt: Option<String>,
    top_k: usize,
    max_tool_rounds: usize,
    retry_policy: RetryPolicy,
    on_transcript: Option<TranscriptCallback>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider and the
    /// library to pick tools from.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
        library: ToolLibrary,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            library,
            strategy: Strategy::default(),
            system_prompt: None,
            top_k: DEFAULT_TOP_K,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            retry_policy: RetryPolicy::default(),
            on_transcript: None,
        }
    }

    /// Sets how tools are found.
    #[inline]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Overrides the default system prompt of the strategy.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets how many tools a single search returns.
    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Sets how many rounds of tool calls a query may run.
    #[inline]
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Drops searched tools whose similarity is below `threshold`.
    #[inline]
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.library = self.library.with_similarity_threshold(threshold);
        self
    }

    /// Sets how failed model and embedding calls are retried.
    #[inline]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.library = self.library.with_retry_policy(policy.clone());
        self.retry_policy = policy;
        self
    }

    /// Attaches a callback invoked for every item appended to a query's
    /// conversation.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str, TranscriptSource) + Send + Sync + 'static,
    ) -> Self {
        self.on_transcript = Some(Box::new(on_transcript));
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Agent {
        let Self {
            model_client,
            library,
            strategy,
            system_prompt,
            top_k,
            max_tool_rounds,
            retry_policy,
            on_transcript,
        } = self;

        let system_prompt = system_prompt
            .unwrap_or_else(|| strategy.default_system_prompt().to_owned());
        debug!("building a {strategy:?} agent with {} tools", library.len());
        Agent {
            model_client,
            library,
            strategy,
            system_prompt,
            top_k,
            max_tool_rounds,
            retry_policy,
            on_transcript,
        }
    }
}
