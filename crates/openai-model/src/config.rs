use std::fmt::{self, Debug, Formatter};

/// Builder for [`OpenAIConfig`].
#[derive(Clone, PartialEq)]
pub struct OpenAIConfigBuilder {
    api_key: String,
    model: Option<String>,
    embedding_model: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
}

impl OpenAIConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            embedding_model: None,
            base_url: None,
            temperature: None,
        }
    }

    /// Sets the chat model to use.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the model used for embeddings.
    #[inline]
    pub fn with_embedding_model<S: Into<String>>(mut self, model: S) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the sampling temperature.
    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> OpenAIConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        OpenAIConfig {
            api_key: self.api_key,
            model: self.model.unwrap_or_else(|| "gpt-4o".to_string()),
            embedding_model: self
                .embedding_model
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            base_url: base_url.trim_end_matches('/').to_owned(),
            temperature: self.temperature.unwrap_or(0.0),
        }
    }
}

impl Debug for OpenAIConfigBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfigBuilder")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Configuration for the OpenAI-compatible provider.
#[derive(Clone, PartialEq)]
pub struct OpenAIConfig {
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) embedding_model: String,
    pub(crate) base_url: String,
    pub(crate) temperature: f32,
}

impl OpenAIConfig {
    #[inline]
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Debug for OpenAIConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OpenAIConfigBuilder::with_api_key("sk-secret").build();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.embedding_model, "text-embedding-3-small");
        assert_eq!(config.temperature, 0.0);
        assert_eq!(
            config.endpoint("/embeddings"),
            "https://api.openai.com/v1/embeddings"
        );
    }

    #[test]
    fn test_trailing_slash_and_redaction() {
        let config = OpenAIConfigBuilder::with_api_key("sk-secret")
            .with_base_url("http://localhost:11434/v1/")
            .with_model("llama3")
            .build();
        assert_eq!(
            config.endpoint("/chat/completions"),
            "http://localhost:11434/v1/chat/completions"
        );
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("llama3"));
    }
}
