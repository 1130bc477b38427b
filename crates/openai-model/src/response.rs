use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use serde_json::Value;
use tulip_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    OpaqueMessage, ToolCallRequest,
};

use crate::Error;
use crate::io::Sse;
use crate::proto::{ChatCompletionChunk, Delta, Message, ToolCall};

struct PartialState {
    sse: Sse,
    id: Option<String>,
    content: String,
    reasoning_content: Option<String>,
    tool_calls: Vec<ToolCall>,
    // Indices of tool calls that have started streaming but have not been
    // emitted yet. Tool calls are emitted once the finish reason arrives,
    // since their arguments are streamed in pieces.
    pending_tool_call_idx: VecDeque<usize>,
    // Cleared after the response returns the complete event.
    pending_finish_reason: Option<ModelFinishReason>,
    finished: bool,
}

impl PartialState {
    #[inline]
    fn finish(self) -> Option<(String, Message)> {
        let has_tool_calls = !self.tool_calls.is_empty();
        Some((
            self.id?,
            Message::Assistant {
                content: if self.content.is_empty() && has_tool_calls {
                    None
                } else {
                    Some(self.content)
                },
                tool_calls: has_tool_calls.then_some(self.tool_calls),
                reasoning_content: self.reasoning_content,
            },
        ))
    }

    fn apply_delta(&mut self, delta: Delta) -> Option<String> {
        if let Some(reasoning_content) = &delta.reasoning_content {
            self.reasoning_content
                .get_or_insert_default()
                .push_str(reasoning_content);
        }
        for tool_call in delta.tool_calls.into_iter().flatten() {
            self.merge_tool_call(tool_call);
        }
        let content = delta.content.filter(|content| !content.is_empty())?;
        self.content.push_str(&content);
        Some(content)
    }

    fn merge_tool_call(&mut self, tool_call: ToolCall) {
        let Some(partial_tool_call) = self
            .tool_calls
            .iter_mut()
            .find(|t| t.index == tool_call.index)
        else {
            self.pending_tool_call_idx.push_back(self.tool_calls.len());
            self.tool_calls.push(tool_call);
            return;
        };
        if let Some(id) = tool_call.id {
            partial_tool_call.id.get_or_insert_default().push_str(&id);
        }
        if let Some(ty) = tool_call.r#type {
            partial_tool_call.r#type = Some(ty);
        }
        let Some(function) = tool_call.function else {
            return;
        };
        match partial_tool_call.function {
            Some(ref mut partial_func) => {
                if let Some(name) = function.name {
                    partial_func.name.get_or_insert_default().push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    partial_func
                        .arguments
                        .get_or_insert_default()
                        .push_str(&arguments);
                }
            }
            None => partial_tool_call.function = Some(function),
        }
    }

    fn make_tool_call_request(&self, idx: usize) -> ToolCallRequest {
        let tool_call = &self.tool_calls[idx];
        let function = tool_call.function.as_ref();
        let arguments = function
            .and_then(|f| f.arguments.as_deref())
            .filter(|args| !args.trim().is_empty())
            .map(|args| {
                serde_json::from_str::<Value>(args).unwrap_or_else(|err| {
                    warn!("malformed tool call arguments ({err}): {args}");
                    Value::String(args.to_owned())
                })
            })
            .unwrap_or_else(|| Value::Object(Default::default()));
        ToolCallRequest {
            id: tool_call.id.clone().unwrap_or_default(),
            name: function.and_then(|f| f.name.clone()).unwrap_or_default(),
            arguments,
        }
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
        full_msg: Option<(String, Message)>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            id: None,
            content: Default::default(),
            reasoning_content: Default::default(),
            tool_calls: Default::default(),
            pending_tool_call_idx: Default::default(),
            pending_finish_reason: Default::default(),
            finished: false,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
            full_msg: None,
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, partial_state)) => {
                    *this.next_event_fut = None;
                    *this.full_msg = partial_state.finish();
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        self.full_msg
            .as_ref()
            .map(|(id, msg)| OpaqueMessage::new(id, msg.clone()))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    let mut message_delta = None;

    while !partial_state.finished {
        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => {
                partial_state.finished = true;
                break;
            }
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            partial_state.finished = true;
            break;
        }

        let mut chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        if partial_state.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id
        {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        };

        // The usage chunk carries no choices.
        let Some(choice) = chunk.choices.pop() else {
            continue;
        };

        message_delta = partial_state.apply_delta(choice.delta);

        if let Some(finish_reason) = choice.finish_reason {
            let finish_reason = match finish_reason.as_str() {
                "tool_calls" => ModelFinishReason::ToolCalls,
                "content_filter" => {
                    return Err(Error::new(
                        "response blocked by content filter",
                        ErrorKind::Moderated,
                    ));
                }
                _ => ModelFinishReason::Stop,
            };
            partial_state.pending_finish_reason = Some(finish_reason);
            partial_state.finished = true;
        }

        if message_delta.is_some() {
            break;
        }
    }

    // The order of events are important. Always emit message delta first, then
    // emit pending tool calls, and finally emit pending finish reason if any.

    if let Some(message_delta) = message_delta {
        return Ok((
            Some(ModelResponseEvent::MessageDelta(message_delta)),
            partial_state,
        ));
    }

    if let Some(idx) = partial_state.pending_tool_call_idx.pop_front() {
        let request = partial_state.make_tool_call_request(idx);
        return Ok((Some(ModelResponseEvent::ToolCall(request)), partial_state));
    }

    if let Some(finish_reason) = partial_state.pending_finish_reason.take() {
        return Ok((
            Some(ModelResponseEvent::Completed(finish_reason)),
            partial_state,
        ));
    }

    Ok((None, partial_state))
}
