use tulip_core::agent::Error as AgentError;
use tulip_core::library::Error as LibraryError;
use tulip_core::tool::Tool;
use tulip_core::{
    Agent, AgentBuilder, Response, RetryPolicy, Strategy, ToolLibrary,
    TranscriptSource,
};
use tulip_model::{EmbeddingProvider, ModelProvider};

use crate::tools::*;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
}

impl SessionBuilder {
    /// Creates a session builder with a chat model and an embedding model.
    pub fn with_providers<M, E>(
        model_provider: M,
        embedding_provider: E,
    ) -> Self
    where
        M: ModelProvider + 'static,
        E: EmbeddingProvider + 'static,
    {
        let library = ToolLibrary::new(embedding_provider);
        let agent_builder =
            AgentBuilder::with_model_provider(model_provider, library);
        Self { agent_builder }
    }

    /// Sets how the agent finds its tools.
    #[inline]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.agent_builder = self.agent_builder.with_strategy(strategy);
        self
    }

    /// Sets the system prompt for the agent.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.agent_builder = self.agent_builder.with_system_prompt(prompt);
        self
    }

    /// Sets how many tools a single search returns.
    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.agent_builder = self.agent_builder.with_top_k(top_k);
        self
    }

    /// Drops searched tools whose similarity is below `threshold`.
    #[inline]
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.agent_builder =
            self.agent_builder.with_similarity_threshold(threshold);
        self
    }

    /// Sets how failed provider calls are retried.
    #[inline]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.agent_builder = self.agent_builder.with_retry_policy(policy);
        self
    }

    /// Sets how many rounds of tool calls a query may run.
    #[inline]
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.agent_builder = self.agent_builder.with_max_tool_rounds(rounds);
        self
    }

    /// Attaches a callback to be invoked when a transcript is generated.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str, TranscriptSource) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_transcript(on_transcript);
        self
    }

    /// Builds a new session with the built-in tools registered.
    ///
    /// Registering embeds every tool description, so this fails when the
    /// embedding provider does.
    pub async fn build(self) -> Result<Session, LibraryError> {
        let mut session = Session {
            agent: self.agent_builder.build(),
        };
        session.register_tool(CapitalTool::new()).await?;
        session.register_tool(LanguageTool::new()).await?;
        Ok(session)
    }
}

/// A query session over a tool library.
///
/// The session holds a fully configured agent that you can use directly, and it
/// is basically a wrapper around [`Agent`].
pub struct Session {
    agent: Agent,
}

impl Session {
    /// Answers a query.
    #[inline]
    pub async fn query(&self, prompt: &str) -> Result<Response, AgentError> {
        self.agent.query(prompt).await
    }

    /// Adds a tool to the session's library.
    pub async fn register_tool<T: Tool>(
        &mut self,
        tool: T,
    ) -> Result<(), LibraryError> {
        let name = tool.name().to_owned();
        self.agent.library_mut().register(tool).await?;
        debug!("session tool `{name}` is ready");
        Ok(())
    }

    /// Returns the underlying agent.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}
