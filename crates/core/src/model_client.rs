use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use tracing::Instrument;
use tulip_model::{
    ModelFinishReason, ModelProvider, ModelRequest, ModelResponse,
    ModelResponseEvent, OpaqueMessage, ToolCallRequest,
};

use crate::retry::{BoxedError, RetryPolicy, retry};

type SendRequestResult = Result<ModelClientResponse, BoxedError>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// A wrapper around a model provider that provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub(crate) struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // Erase `P` so that the agent doesn't need a generic parameter.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and collects the whole streamed response.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn send_request(&self, req: ModelRequest) -> SendRequestResult {
        (self.handler_fn)(req).await
    }

    /// Sends a request, retrying transient failures under `policy`.
    ///
    /// A failure in the middle of a stream discards the partial response
    /// and the whole request is sent again.
    pub async fn send_request_with_retry(
        &self,
        req: &ModelRequest,
        policy: &RetryPolicy,
    ) -> SendRequestResult {
        retry(policy, || self.send_request(req.clone())).await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub(crate) struct ModelClientResponse {
    pub transcript: String,
    pub opaque_msg: Option<OpaqueMessage>,
    /// Tool calls requested by the model.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            debug!("request failed: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut transcript = String::new();
    let opaque_msg;
    let mut tool_calls = Vec::new();
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                debug!("response stream failed: {err:?}");
                return Err(Box::new(err));
            }
        };

        let Some(event) = event else {
            opaque_msg = pinned_resp.make_opaque_message();
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(msg) => {
                transcript.push_str(&msg);
            }
            ModelResponseEvent::ToolCall(req) => {
                tool_calls.push(req);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(ModelClientResponse {
        transcript,
        opaque_msg,
        tool_calls,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tulip_model::{ErrorKind, ModelMessage};
    use tulip_test_model::{PresetEvent, PresetResponse, TestModelProvider};

    use super::*;

    fn hi() -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_input_step();
        model_provider.add_assistant_response_step(
            PresetResponse::with_events([
                PresetEvent::MessageDelta("How ".to_owned()),
                PresetEvent::MessageDelta("are ".to_owned()),
                PresetEvent::MessageDelta("you?".to_owned()),
            ]),
        );

        let model_client = ModelClient::new(model_provider);

        for _ in 0..3 {
            let resp = model_client.send_request(hi()).await.unwrap();
            assert_eq!(resp.transcript, "How are you?");
            assert!(resp.opaque_msg.is_some());
            assert!(resp.tool_calls.is_empty());
            assert_eq!(resp.finish_reason, Some(ModelFinishReason::Stop));
        }
    }

    #[tokio::test]
    async fn test_collects_tool_calls() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_input_step();
        model_provider.add_assistant_response_step(
            PresetResponse::with_events([PresetEvent::ToolCall(
                ToolCallRequest {
                    id: "call_1".to_owned(),
                    name: "capital".to_owned(),
                    arguments: json!({ "country": "France" }),
                },
            )]),
        );

        let resp = ModelClient::new(model_provider)
            .send_request(hi())
            .await
            .unwrap();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "capital");
        assert_eq!(resp.finish_reason, Some(ModelFinishReason::ToolCalls));
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider);
        let resp_or_err = model_client.send_request(hi()).await;
        assert!(resp_or_err.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_rate_limited_requests() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_input_step();
        model_provider.add_assistant_response_step(
            PresetResponse::with_text("Hello!").with_failures(2),
        );
        let recorder = model_provider.clone();

        let policy = RetryPolicy::default()
            .with_max_retries(2)
            .with_initial_interval(Duration::from_millis(10))
            .with_randomization_factor(0.0);
        let model_client = ModelClient::new(model_provider);
        let resp = model_client
            .send_request_with_retry(&hi(), &policy)
            .await
            .unwrap();
        assert_eq!(resp.transcript, "Hello!");
        assert_eq!(recorder.recorded_requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_returns_last_error() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_input_step();
        model_provider.add_assistant_response_step(
            PresetResponse::with_text("Hello!").with_failures(0),
        );
        let recorder = model_provider.clone();

        let policy = RetryPolicy::default()
            .with_max_retries(1)
            .with_randomization_factor(0.0);
        let err = ModelClient::new(model_provider)
            .send_request_with_retry(&hi(), &policy)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert_eq!(recorder.recorded_requests().len(), 2);
    }
}
