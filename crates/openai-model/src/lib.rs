//! A model provider for OpenAI-compatible APIs.
//!
//! [`OpenAIProvider`] implements both chat completions (streamed over SSE)
//! and embeddings, so one configured client can back the agent and its tool
//! library.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use reqwest::{Client, Response, StatusCode, header};
use tulip_model::{
    Embedding, EmbeddingProvider, ErrorKind, ModelProvider, ModelProviderError,
    ModelRequest,
};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use io::{Chunks, Sse};
use proto::EmbeddingResponse;
use response::OpenAIResponse;

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn from_status(status: StatusCode, body: &str) -> Self {
        let kind = if status == StatusCode::TOO_MANY_REQUESTS {
            ErrorKind::RateLimitExceeded
        } else {
            ErrorKind::Other
        };
        Self::new(format!("HTTP {status}: {body}"), kind)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    /// Returns the configuration of this provider.
    #[inline]
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;
    type Response = OpenAIResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        let resp_fut = self
            .client
            .post(self.config.endpoint("/chat/completions"))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "text/event-stream")
            .json(&openai_req)
            .send();

        async move {
            let resp = check_status(resp_fut.await).await?;

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_event_stream = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.essence_str() == "text/event-stream")
                .unwrap_or(false);
            if !is_event_stream {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::Other,
                ));
            }

            // Here we got a successful response.
            let chunks = Chunks::from_response(resp);
            let sse = Sse::new(chunks);
            Ok(OpenAIResponse::from_sse(sse))
        }
    }
}

impl EmbeddingProvider for OpenAIProvider {
    type Error = Error;

    fn embed(
        &self,
        inputs: &[String],
    ) -> impl Future<Output = Result<Vec<Embedding>, Self::Error>> + Send + 'static
    {
        let expected = inputs.len();
        let resp_fut = self
            .client
            .post(self.config.endpoint("/embeddings"))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .json(&proto::create_embedding_request(inputs, &self.config))
            .send();

        async move {
            let resp = check_status(resp_fut.await).await?;
            let body: EmbeddingResponse = resp.json().await.map_err(|err| {
                Error::new(
                    format!("invalid embedding response: {err}"),
                    ErrorKind::Other,
                )
            })?;
            debug!("received {} embeddings", body.data.len());
            collect_embeddings(body, expected)
        }
    }
}

async fn check_status(
    resp_or_err: Result<Response, reqwest::Error>,
) -> Result<Response, Error> {
    let resp = resp_or_err
        .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::from_status(status, &body))
}

fn collect_embeddings(
    mut body: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Embedding>, Error> {
    if body.data.len() != expected {
        return Err(Error::new(
            format!(
                "expected {expected} embeddings, got {}",
                body.data.len()
            ),
            ErrorKind::Other,
        ));
    }
    body.data.sort_by_key(|data| data.index);
    Ok(body.data.into_iter().map(|data| data.embedding).collect())
}
