use serde::{Deserialize, Serialize};
use tulip_model::ToolCallRequest;

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
}

/// The preset response for an assistant step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request will fail in the first `failures` attempts.
    /// `Some(0)` means the request will fail infinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
        }
    }

    /// Creates a `PresetResponse` with a single text message.
    #[inline]
    pub fn with_text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Returns `true` if this response contains any tool call.
    #[inline]
    pub fn has_tool_calls(&self) -> bool {
        self.events
            .iter()
            .any(|event| matches!(event, PresetEvent::ToolCall(_)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let response = PresetResponse::with_events([
            PresetEvent::MessageDelta("Let me look that up.".to_string()),
            PresetEvent::ToolCall(ToolCallRequest {
                id: "call_1".to_string(),
                name: "capital".to_string(),
                arguments: json!({ "country": "France" }),
            }),
        ])
        .with_failures(2);

        let serialized = serde_json::to_string(&response).unwrap();
        let deserialized: PresetResponse =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(response, deserialized);
        assert!(deserialized.has_tool_calls());
    }

    #[test]
    fn test_failures_are_optional() {
        let deserialized: PresetResponse = serde_json::from_value(json!({
            "events": [{ "type": "message_delta", "data": "Paris" }]
        }))
        .unwrap();
        assert_eq!(deserialized, PresetResponse::with_text("Paris"));
        assert!(!deserialized.has_tool_calls());
    }
}
