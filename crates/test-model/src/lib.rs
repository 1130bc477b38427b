//! A local fake model and embedder for testing purpose.

mod embedding;
mod preset;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use tokio::time::{Sleep, sleep};
use tulip_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent, OpaqueMessage,
};

pub use embedding::TestEmbeddingProvider;
pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub fn message(&self) -> &str {
        self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    provider: TestModelProvider,
    request: ModelRequest,
    event_idx: usize,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let step_idx = self.request.messages.len();
        if step_idx >= self.provider.conversation_script.len() {
            return Poll::Ready(Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            }));
        }

        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        let step = &this.provider.conversation_script[step_idx];
        let preset = match step {
            ConversationStep::Input => {
                return Poll::Ready(Err(Error {
                    message: "not an assistant response step",
                    kind: ErrorKind::Moderated,
                }));
            }
            ConversationStep::AssistantResponse(response) => response,
        };

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            let preset_events = &preset.events;
            if this.event_idx < preset_events.len() {
                let event = match &preset_events[this.event_idx] {
                    PresetEvent::MessageDelta(msg) => {
                        ModelResponseEvent::MessageDelta(msg.clone())
                    }
                    PresetEvent::ToolCall(req) => {
                        ModelResponseEvent::ToolCall(req.clone())
                    }
                };
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(event)));
            } else if this.event_idx == preset_events.len() {
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                    if preset.has_tool_calls() {
                        ModelFinishReason::ToolCalls
                    } else {
                        ModelFinishReason::Stop
                    },
                ))));
            } else {
                // In case this method is called after completion.
                return Poll::Ready(Ok(None));
            }
        }
        this.sleep = Some(Box::pin(sleep(
            this.provider.delay.unwrap_or(Duration::from_millis(1)),
        )));
        Pin::new(this).poll_next_event(cx)
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        let step_idx = self.request.messages.len();
        let id = format!("msg:{step_idx}");
        Some(OpaqueMessage::new(id.clone(), id))
    }
}

#[derive(Clone)]
enum ConversationStep {
    Input,
    AssistantResponse(PresetResponse),
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script, which
/// is how the model should respond to a request. The step at index `n`
/// describes the `n`-th message of the conversation: input steps stand for
/// messages the caller appends (system, user and tool results), assistant
/// steps are what the model answers to a request carrying `n` messages. If
/// there are no enough steps in the script, an error will be returned.
///
/// Clones share the recorded requests and failure counters, so keep a clone
/// around to inspect what the code under test has sent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    conversation_script: Vec<ConversationStep>,
    delay: Option<Duration>,
    attempts: Arc<Mutex<HashMap<usize, u64>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_assistant_response_step(&mut self, preset: PresetResponse) {
        self.conversation_script
            .push(ConversationStep::AssistantResponse(preset));
    }

    #[inline]
    pub fn add_input_step(&mut self) {
        self.conversation_script.push(ConversationStep::Input);
    }

    #[inline]
    pub fn add_input_steps(&mut self, count: usize) {
        for _ in 0..count {
            self.add_input_step();
        }
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, in order.
    pub fn recorded_requests(&self) -> Vec<ModelRequest> {
        lock(&self.requests).clone()
    }

    fn should_fail(&self, step_idx: usize) -> bool {
        let Some(ConversationStep::AssistantResponse(preset)) =
            self.conversation_script.get(step_idx)
        else {
            return false;
        };
        let Some(failures) = preset.failures else {
            return false;
        };
        let mut attempts = lock(&self.attempts);
        let attempt = attempts.entry(step_idx).or_default();
        *attempt += 1;
        failures == 0 || *attempt <= failures
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        lock(&self.requests).push(req.clone());

        let result = if self.should_fail(req.messages.len()) {
            Err(Error {
                message: "preset failure",
                kind: ErrorKind::RateLimitExceeded,
            })
        } else {
            Ok(TestModelResponse {
                provider: self.clone(),
                request: req.clone(),
                event_idx: 0,
                sleep: None,
            })
        };
        ready(result)
    }
}

#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
