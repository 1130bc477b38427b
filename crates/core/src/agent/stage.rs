use tulip_model::{
    ModelMessage, ModelRequest, ModelTool, ToolCallRequest, ToolCallResult,
    ToolChoice,
};

use super::search_tool::{self, SearchToolsParameters};
use super::{Agent, Error, ErrorKind, Response, Strategy};
use crate::conversation::{Conversation, TranscriptSource};
use crate::model_client::ModelClientResponse;
use crate::prompts;

#[derive(Debug)]
enum Stage {
    Decompose,
    SearchTools,
    RespondWithTools,
    ExecuteTools(Vec<ToolCallRequest>),
    Done(String),
}

/// The state of a single query.
pub(super) struct Query<'a> {
    agent: &'a Agent,
    prompt: &'a str,
    conversation: Conversation,
    steps: String,
    tools: Vec<ModelTool>,
    instructed: bool,
    tool_rounds: usize,
}

impl<'a> Query<'a> {
    pub fn new(agent: &'a Agent, prompt: &'a str) -> Self {
        let mut query = Self {
            agent,
            prompt,
            conversation: Conversation::default(),
            steps: String::new(),
            tools: vec![],
            instructed: false,
            tool_rounds: 0,
        };
        let system_prompt = agent.system_prompt.clone();
        query.append(
            ModelMessage::System(system_prompt.clone()),
            system_prompt,
            TranscriptSource::System,
        );
        query
    }

    pub async fn run(mut self) -> Result<Response, Error> {
        info!("query: {}", self.prompt);

        let mut stage = match self.agent.strategy {
            Strategy::Tulip => Stage::Decompose,
            Strategy::Minimal => Stage::SearchTools,
            Strategy::AllTools => {
                self.tools = self.agent.library.definitions();
                Stage::RespondWithTools
            }
            Strategy::Base => Stage::RespondWithTools,
        };

        loop {
            trace!("entering stage {stage:?}");
            stage = match stage {
                Stage::Decompose => self.decompose().await?,
                Stage::SearchTools => self.search_tools().await?,
                Stage::RespondWithTools => self.respond().await?,
                Stage::ExecuteTools(calls) => self.execute_tools(calls).await?,
                Stage::Done(answer) => {
                    info!("answer: {answer}");
                    return Ok(Response {
                        answer,
                        tools: self.tools,
                        conversation: self.conversation,
                    });
                }
            };
        }
    }

    async fn decompose(&mut self) -> Result<Stage, Error> {
        self.append_user(prompts::task_decomposition(self.prompt));
        let resp = self
            .send(vec![search_tool::definition()], ToolChoice::None)
            .await?;
        if !resp.tool_calls.is_empty() {
            return Err(Error::protocol(
                "tools were called while decomposing the request",
            ));
        }
        info!("steps:\n{}", resp.transcript);
        self.steps = resp.transcript.clone();
        self.append_response(resp);
        Ok(Stage::SearchTools)
    }

    async fn search_tools(&mut self) -> Result<Stage, Error> {
        if self.agent.strategy == Strategy::Minimal {
            self.tools = self
                .agent
                .library
                .search_many(&[self.prompt], self.agent.top_k)
                .await?;
            return Ok(Stage::RespondWithTools);
        }

        self.append_user(prompts::SEARCH_STEPS.to_owned());
        let resp = self
            .send(
                vec![search_tool::definition()],
                ToolChoice::Function(search_tool::NAME.to_owned()),
            )
            .await?;
        let calls = resp.tool_calls.clone();
        self.append_response(resp);

        let [call] = calls.as_slice() else {
            return Err(Error::protocol(format!(
                "expected exactly one tool search, got {}",
                calls.len()
            )));
        };
        if call.name != search_tool::NAME {
            return Err(Error::protocol(format!(
                "expected a tool search, got a call to `{}`",
                call.name
            )));
        }
        let params: SearchToolsParameters =
            serde_json::from_value(call.arguments.clone()).map_err(|err| {
                Error::protocol(format!("invalid tool search arguments: {err}"))
            })?;

        self.tools = self
            .agent
            .library
            .search_many(&params.action_descriptions, self.agent.top_k)
            .await?;
        info!(
            "offering tools: {:?}",
            self.tools.iter().map(|t| &t.name).collect::<Vec<_>>()
        );
        self.append_tool_result(call, prompts::TOOLS_PROVIDED.to_owned());
        Ok(Stage::RespondWithTools)
    }

    async fn respond(&mut self) -> Result<Stage, Error> {
        if !self.instructed {
            self.instructed = true;
            let instruction = match self.agent.strategy {
                Strategy::Tulip => prompts::solve_with_tools(&self.steps),
                _ => self.prompt.to_owned(),
            };
            self.append_user(instruction);
        }

        let (tools, tool_choice) = if self.tools.is_empty() {
            (vec![], ToolChoice::None)
        } else {
            (self.tools.clone(), ToolChoice::Auto)
        };
        let resp = self.send(tools, tool_choice).await?;
        let calls = resp.tool_calls.clone();
        let transcript = resp.transcript.clone();
        self.append_response(resp);

        if calls.is_empty() {
            Ok(Stage::Done(transcript))
        } else {
            Ok(Stage::ExecuteTools(calls))
        }
    }

    async fn execute_tools(
        &mut self,
        calls: Vec<ToolCallRequest>,
    ) -> Result<Stage, Error> {
        if self.tool_rounds >= self.agent.max_tool_rounds {
            error!("giving up after {} tool rounds", self.tool_rounds);
            return Err(Error::new(
                ErrorKind::ToolRoundsExceeded,
                format!(
                    "still calling tools after {} rounds",
                    self.tool_rounds
                ),
            ));
        }
        self.tool_rounds += 1;

        for call in &calls {
            let content = match self
                .agent
                .library
                .execute(&call.name, call.arguments.clone())
                .await
            {
                Ok(output) => output,
                Err(err) => format!("Error: {}", err.reason()),
            };
            self.append_tool_result(call, content);
        }
        Ok(Stage::RespondWithTools)
    }

    async fn send(
        &self,
        tools: Vec<ModelTool>,
        tool_choice: ToolChoice,
    ) -> Result<ModelClientResponse, Error> {
        let req = ModelRequest {
            messages: self.conversation.messages(),
            tools,
            tool_choice,
        };
        let resp = self
            .agent
            .model_client
            .send_request_with_retry(&req, &self.agent.retry_policy)
            .await
            .map_err(|err| {
                error!("model request failed: {err}");
                Error::new(ErrorKind::Model, err.to_string())
            })?;
        debug!(
            "model finished with {:?} and {} tool call(s)",
            resp.finish_reason,
            resp.tool_calls.len()
        );
        Ok(resp)
    }

    fn append_user(&mut self, text: String) {
        let msg = ModelMessage::User(text.clone());
        self.append(msg, text, TranscriptSource::User);
    }

    fn append_response(&mut self, resp: ModelClientResponse) {
        let transcript = resp.transcript;
        let msg = match resp.opaque_msg {
            Some(opaque_msg) => ModelMessage::Opaque(opaque_msg),
            // Downgrade to a text-only message.
            None => ModelMessage::Assistant(transcript.clone()),
        };
        self.append(msg, transcript, TranscriptSource::Assistant);
    }

    fn append_tool_result(&mut self, call: &ToolCallRequest, content: String) {
        let msg = ModelMessage::Tool(ToolCallResult {
            id: call.id.clone(),
            name: call.name.clone(),
            content: content.clone(),
        });
        self.append(msg, content, TranscriptSource::Tool);
    }

    fn append(
        &mut self,
        msg: ModelMessage,
        transcript: String,
        source: TranscriptSource,
    ) {
        let item = self.conversation.push(msg, transcript, source);
        if let Some(on_transcript) = &self.agent.on_transcript {
            on_transcript(item.transcript(), item.source());
        }
    }
}
