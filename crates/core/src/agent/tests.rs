use std::sync::{Arc, Mutex};
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tulip_model::{
    ErrorKind as ProviderErrorKind, ModelMessage, ModelRequest, ToolCallRequest,
    ToolChoice,
};
use tulip_test_model::{
    PresetEvent, PresetResponse, TestEmbeddingProvider, TestModelProvider,
};

use crate::agent::{AgentBuilder, ErrorKind, Strategy};
use crate::conversation::TranscriptSource;
use crate::library::ToolLibrary;
use crate::prompts;
use crate::retry::RetryPolicy;
use crate::tool::{FunctionTool, ToolResult};

#[derive(Deserialize, JsonSchema)]
struct Country {
    /// Name of the country.
    country: String,
}

async fn capital(input: Country) -> ToolResult {
    let capital = match input.country.as_str() {
        "France" => "Paris",
        "Germany" => "Berlin",
        _ => "Unknown",
    };
    Ok(capital.to_owned())
}

async fn language(input: Country) -> ToolResult {
    let language = match input.country.as_str() {
        "France" => "French",
        "Germany" => "German",
        _ => "Unknown",
    };
    Ok(language.to_owned())
}

async fn demo_library() -> ToolLibrary {
    let mut library = ToolLibrary::new(TestEmbeddingProvider::new());
    library
        .register(FunctionTool::new(
            "capital",
            "Returns the capital of a country",
            capital,
        ))
        .await
        .unwrap();
    library
        .register(FunctionTool::new(
            "language",
            "Returns the language spoken in a country",
            language,
        ))
        .await
        .unwrap();
    library
}

fn tool_call(id: &str, name: &str, arguments: Value) -> PresetEvent {
    PresetEvent::ToolCall(ToolCallRequest {
        id: id.to_owned(),
        name: name.to_owned(),
        arguments,
    })
}

fn search_call(actions: &[&str]) -> PresetResponse {
    PresetResponse::with_events([tool_call(
        "call_search",
        "search_tools",
        json!({ "action_descriptions": actions }),
    )])
}

fn capital_call(country: &str) -> PresetResponse {
    PresetResponse::with_events([tool_call(
        "call_capital",
        "capital",
        json!({ "country": country }),
    )])
}

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(max_retries)
        .with_initial_interval(Duration::from_millis(1))
        .with_max_interval(Duration::from_millis(2))
        .with_randomization_factor(0.0)
}

/// Scripts the decomposition and the given search response, leaving the
/// model at the solve instruction (message index 7).
fn script_search(search: PresetResponse) -> TestModelProvider {
    let mut model_provider = TestModelProvider::default();
    // System prompt and decomposition request.
    model_provider.add_input_steps(2);
    model_provider.add_assistant_response_step(PresetResponse::with_text(
        "1. Look up the capital of France.",
    ));
    // Search instruction.
    model_provider.add_input_step();
    model_provider.add_assistant_response_step(search);
    // Search result and solve instruction.
    model_provider.add_input_steps(2);
    model_provider
}

fn script_until_solve(actions: &[&str]) -> TestModelProvider {
    script_search(search_call(actions))
}

fn tool_names(req: &ModelRequest) -> Vec<&str> {
    req.tools.iter().map(|t| t.name.as_str()).collect()
}

async fn agent_builder(model_provider: TestModelProvider) -> AgentBuilder {
    AgentBuilder::with_model_provider(model_provider, demo_library().await)
        .with_retry_policy(fast_retry(0))
}

const QUESTION: &str = "What is the capital of France?";
const CAPITAL_STEP: &str = "Find the capital of France";

#[tokio::test]
async fn test_capital_of_france() {
    let mut model_provider = script_until_solve(&[CAPITAL_STEP]);
    model_provider.add_assistant_response_step(capital_call("France"));
    model_provider.add_input_step();
    model_provider.add_assistant_response_step(PresetResponse::with_text(
        "The capital of France is Paris.",
    ));
    let recorder = model_provider.clone();

    let agent = agent_builder(model_provider).await.with_top_k(1).build();
    let response = agent.query(QUESTION).await.unwrap();

    assert!(response.answer().contains("Paris"));
    assert_eq!(response.tools().len(), 1);
    assert_eq!(response.tools()[0].name, "capital");

    let requests = recorder.recorded_requests();
    assert_eq!(requests.len(), 4);

    assert_eq!(requests[0].messages.len(), 2);
    assert_eq!(
        requests[0].messages[0],
        ModelMessage::System(prompts::TULIP_COT.to_owned())
    );
    assert_eq!(tool_names(&requests[0]), ["search_tools"]);
    assert_eq!(requests[0].tool_choice, ToolChoice::None);
    assert_eq!(
        requests[0].messages[1],
        ModelMessage::User(prompts::task_decomposition(QUESTION))
    );

    assert_eq!(requests[1].messages.len(), 4);
    assert_eq!(
        requests[1].tool_choice,
        ToolChoice::Function("search_tools".to_owned())
    );
    assert_eq!(
        requests[1].messages[3],
        ModelMessage::User(prompts::SEARCH_STEPS.to_owned())
    );

    assert_eq!(requests[2].messages.len(), 7);
    assert_eq!(tool_names(&requests[2]), ["capital"]);
    assert_eq!(requests[2].tool_choice, ToolChoice::Auto);
    let ModelMessage::Tool(search_result) = &requests[2].messages[5] else {
        panic!("expected a tool result");
    };
    assert_eq!(search_result.id, "call_search");
    assert_eq!(search_result.content, prompts::TOOLS_PROVIDED);
    assert_eq!(
        requests[2].messages[6],
        ModelMessage::User(prompts::solve_with_tools(
            "1. Look up the capital of France."
        ))
    );

    let ModelMessage::Tool(capital_result) = &requests[3].messages[8] else {
        panic!("expected a tool result");
    };
    assert_eq!(capital_result.id, "call_capital");
    assert_eq!(capital_result.name, "capital");
    assert_eq!(capital_result.content, "Paris");

    let sources: Vec<_> = response
        .conversation()
        .items()
        .iter()
        .map(|item| item.source())
        .collect();
    assert_eq!(
        sources,
        [
            TranscriptSource::System,
            TranscriptSource::User,
            TranscriptSource::Assistant,
            TranscriptSource::User,
            TranscriptSource::Assistant,
            TranscriptSource::Tool,
            TranscriptSource::User,
            TranscriptSource::Assistant,
            TranscriptSource::Tool,
            TranscriptSource::Assistant,
        ]
    );
}

#[tokio::test]
async fn test_overlapping_searches_offer_each_tool_once() {
    let mut model_provider = script_until_solve(&[
        "Find the capital of France",
        "Find the language spoken in France",
        "capital of France",
    ]);
    model_provider.add_assistant_response_step(PresetResponse::with_text(
        "Paris, where people speak French.",
    ));
    let recorder = model_provider.clone();

    let agent = agent_builder(model_provider).await.with_top_k(1).build();
    let response = agent
        .query("What is the capital of France and what do people speak?")
        .await
        .unwrap();
    assert_eq!(response.answer(), "Paris, where people speak French.");

    let requests = recorder.recorded_requests();
    assert_eq!(tool_names(&requests[2]), ["capital", "language"]);
}

#[tokio::test]
async fn test_search_without_call_fails() {
    let model_provider =
        script_search(PresetResponse::with_text("I don't need any tools."));
    let agent = agent_builder(model_provider).await.build();
    let err = agent.query(QUESTION).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[tokio::test]
async fn test_multiple_searches_fail() {
    let model_provider = script_search(PresetResponse::with_events([
        tool_call(
            "call_1",
            "search_tools",
            json!({ "action_descriptions": ["Find the capital of France"] }),
        ),
        tool_call(
            "call_2",
            "search_tools",
            json!({ "action_descriptions": ["Find the language of France"] }),
        ),
    ]));
    let agent = agent_builder(model_provider).await.build();
    let err = agent.query(QUESTION).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(err.reason().contains("got 2"));
}

#[tokio::test]
async fn test_search_calling_another_tool_fails() {
    let model_provider = script_search(capital_call("France"));
    let agent = agent_builder(model_provider).await.build();
    let err = agent.query(QUESTION).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(err.reason().contains("`capital`"));
}

#[tokio::test]
async fn test_invalid_search_arguments_fail() {
    let model_provider = script_search(PresetResponse::with_events([
        tool_call(
            "call_search",
            "search_tools",
            json!({ "queries": ["Find the capital of France"] }),
        ),
    ]));
    let agent = agent_builder(model_provider).await.build();
    let err = agent.query(QUESTION).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[tokio::test]
async fn test_tool_errors_are_reported_to_the_model() {
    let mut model_provider = script_until_solve(&[CAPITAL_STEP]);
    model_provider.add_assistant_response_step(PresetResponse::with_events([
        tool_call("call_1", "weather", json!({ "city": "Paris" })),
        tool_call("call_2", "capital", json!({ "city": "Paris" })),
    ]));
    model_provider.add_input_steps(2);
    model_provider.add_assistant_response_step(PresetResponse::with_text(
        "Sorry, I could not find that out.",
    ));
    let recorder = model_provider.clone();

    let agent = agent_builder(model_provider).await.build();
    let response = agent.query(QUESTION).await.unwrap();
    assert_eq!(response.answer(), "Sorry, I could not find that out.");

    let requests = recorder.recorded_requests();
    let last = &requests[requests.len() - 1];
    let ModelMessage::Tool(unknown) = &last.messages[8] else {
        panic!("expected a tool result");
    };
    assert_eq!(unknown.id, "call_1");
    assert_eq!(unknown.content, "Error: no tool named `weather`");
    let ModelMessage::Tool(invalid) = &last.messages[9] else {
        panic!("expected a tool result");
    };
    assert_eq!(invalid.id, "call_2");
    assert!(invalid.content.starts_with("Error: "));
    assert!(invalid.content.contains("country"));
}

#[tokio::test]
async fn test_nothing_found_disables_tools() {
    let mut model_provider = script_until_solve(&[CAPITAL_STEP]);
    model_provider.add_assistant_response_step(PresetResponse::with_text(
        "I don't know.",
    ));
    let recorder = model_provider.clone();

    let library = demo_library().await.with_similarity_threshold(0.9);
    let agent = AgentBuilder::with_model_provider(model_provider, library)
        .build();
    let response = agent.query(QUESTION).await.unwrap();
    assert!(response.tools().is_empty());

    let requests = recorder.recorded_requests();
    assert!(requests[2].tools.is_empty());
    assert_eq!(requests[2].tool_choice, ToolChoice::None);
}

#[tokio::test]
async fn test_tool_rounds_are_bounded() {
    let mut model_provider = script_until_solve(&[CAPITAL_STEP]);
    model_provider.add_assistant_response_step(capital_call("France"));
    model_provider.add_input_step();
    model_provider.add_assistant_response_step(capital_call("France"));
    let recorder = model_provider.clone();

    let agent = agent_builder(model_provider)
        .await
        .with_max_tool_rounds(1)
        .build();
    let err = agent.query(QUESTION).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ToolRoundsExceeded);
    assert_eq!(recorder.recorded_requests().len(), 4);
}

fn script_single_answer(answer: PresetResponse) -> TestModelProvider {
    let mut model_provider = TestModelProvider::default();
    // System prompt and the question.
    model_provider.add_input_steps(2);
    model_provider.add_assistant_response_step(answer);
    model_provider
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let model_provider = script_single_answer(
        PresetResponse::with_text("Paris").with_failures(2),
    );
    let recorder = model_provider.clone();

    let agent = agent_builder(model_provider)
        .await
        .with_strategy(Strategy::Base)
        .with_retry_policy(fast_retry(3))
        .build();
    let response = agent.query(QUESTION).await.unwrap();
    assert_eq!(response.answer(), "Paris");
    assert_eq!(recorder.recorded_requests().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_fail_the_query() {
    let model_provider = script_single_answer(
        PresetResponse::with_text("Paris").with_failures(0),
    );
    let recorder = model_provider.clone();

    let agent = agent_builder(model_provider)
        .await
        .with_strategy(Strategy::Base)
        .with_retry_policy(fast_retry(2))
        .build();
    let err = agent.query(QUESTION).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Model);
    assert_eq!(recorder.recorded_requests().len(), 3);
}

#[tokio::test]
async fn test_base_strategy() {
    let model_provider =
        script_single_answer(PresetResponse::with_text("Paris"));
    let recorder = model_provider.clone();

    let transcripts = Arc::new(Mutex::new(Vec::new()));
    let agent = agent_builder(model_provider)
        .await
        .with_strategy(Strategy::Base)
        .on_transcript({
            let transcripts = Arc::clone(&transcripts);
            move |transcript, source| {
                transcripts
                    .lock()
                    .unwrap()
                    .push((transcript.to_owned(), source));
            }
        })
        .build();
    assert_eq!(agent.system_prompt(), prompts::BASE);
    agent.query(QUESTION).await.unwrap();

    let requests = recorder.recorded_requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].tools.is_empty());
    assert_eq!(requests[0].tool_choice, ToolChoice::None);
    assert_eq!(
        *transcripts.lock().unwrap(),
        [
            (prompts::BASE.to_owned(), TranscriptSource::System),
            (QUESTION.to_owned(), TranscriptSource::User),
            ("Paris".to_owned(), TranscriptSource::Assistant),
        ]
    );
}

fn script_direct_capital_call() -> TestModelProvider {
    let mut model_provider = script_single_answer(capital_call("France"));
    model_provider.add_input_step();
    model_provider.add_assistant_response_step(PresetResponse::with_text(
        "The capital of France is Paris.",
    ));
    model_provider
}

#[tokio::test]
async fn test_all_tools_strategy() {
    let model_provider = script_direct_capital_call();
    let recorder = model_provider.clone();

    let agent = agent_builder(model_provider)
        .await
        .with_strategy(Strategy::AllTools)
        .build();
    let response = agent.query(QUESTION).await.unwrap();
    assert!(response.answer().contains("Paris"));

    let requests = recorder.recorded_requests();
    assert_eq!(
        requests[0].messages[0],
        ModelMessage::System(prompts::TOOL.to_owned())
    );
    assert_eq!(tool_names(&requests[0]), ["capital", "language"]);
    assert_eq!(requests[0].tool_choice, ToolChoice::Auto);
}

#[tokio::test]
async fn test_minimal_strategy() {
    let model_provider = script_direct_capital_call();
    let recorder = model_provider.clone();

    let agent = agent_builder(model_provider)
        .await
        .with_strategy(Strategy::Minimal)
        .with_top_k(1)
        .with_system_prompt("Answer briefly.")
        .build();
    let response = agent.query(QUESTION).await.unwrap();
    assert!(response.answer().contains("Paris"));

    let requests = recorder.recorded_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].messages,
        [
            ModelMessage::System("Answer briefly.".to_owned()),
            ModelMessage::User(QUESTION.to_owned()),
        ]
    );
    assert_eq!(tool_names(&requests[0]), ["capital"]);
    let ModelMessage::Tool(result) = &requests[1].messages[3] else {
        panic!("expected a tool result");
    };
    assert_eq!(result.content, "Paris");
}

#[tokio::test]
async fn test_consecutive_tool_rounds() {
    let mut model_provider = script_until_solve(&[CAPITAL_STEP]);
    model_provider.add_assistant_response_step(PresetResponse::with_events([
        tool_call("call_france", "capital", json!({ "country": "France" })),
    ]));
    model_provider.add_input_step();
    model_provider.add_assistant_response_step(PresetResponse::with_events([
        tool_call("call_germany", "capital", json!({ "country": "Germany" })),
    ]));
    model_provider.add_input_step();
    model_provider.add_assistant_response_step(PresetResponse::with_text(
        "Paris and Berlin",
    ));
    let recorder = model_provider.clone();

    let agent = agent_builder(model_provider).await.with_top_k(1).build();
    let response = agent
        .query("What are the capitals of France and Germany?")
        .await
        .unwrap();
    assert_eq!(response.answer(), "Paris and Berlin");

    let requests = recorder.recorded_requests();
    assert_eq!(requests.len(), 5);
    assert_eq!(tool_names(&requests[4]), ["capital"]);
    let ModelMessage::Tool(france) = &requests[4].messages[8] else {
        panic!("expected a tool result");
    };
    assert_eq!(france.id, "call_france");
    assert_eq!(france.content, "Paris");
    let ModelMessage::Tool(germany) = &requests[4].messages[10] else {
        panic!("expected a tool result");
    };
    assert_eq!(germany.id, "call_germany");
    assert_eq!(germany.content, "Berlin");
}

#[tokio::test(start_paused = true)]
async fn test_embedding_failure_during_search_fails_the_query() {
    // Both registrations succeed, every search embedding fails.
    let embedding_provider = TestEmbeddingProvider::new()
        .failing(ProviderErrorKind::RateLimitExceeded)
        .starting_after(2);
    let embedding_calls = embedding_provider.clone();
    let mut library = ToolLibrary::new(embedding_provider);
    library
        .register(FunctionTool::new(
            "capital",
            "Returns the capital of a country",
            capital,
        ))
        .await
        .unwrap();
    library
        .register(FunctionTool::new(
            "language",
            "Returns the language spoken in a country",
            language,
        ))
        .await
        .unwrap();

    let model_provider = script_until_solve(&[CAPITAL_STEP]);
    let recorder = model_provider.clone();
    let agent = AgentBuilder::with_model_provider(model_provider, library)
        .with_retry_policy(fast_retry(1))
        .build();
    let err = agent.query(QUESTION).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Embedding);

    // Two registrations, then the search and its single retry.
    assert_eq!(embedding_calls.calls(), 4);
    assert_eq!(recorder.recorded_requests().len(), 2);
}
