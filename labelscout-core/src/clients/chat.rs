//! OpenAI-compatible chat completions client (OpenRouter by default).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::http_client::{build_http_client, join_url, send_json};
use super::{Completion, CompletionClient, CompletionRequest};
use crate::error::ClientError;

const SERVICE: &str = "chat-completions";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn into_completion(self) -> Completion {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(Completion::text)
            .unwrap_or_default()
    }
}

/// Chat completions over HTTP with bearer authentication.
pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl ChatCompletionsClient {
    #[instrument(level = "debug", skip_all, fields(base_url = %base_url, timeout_ms = timeout.as_millis() as u64))]
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ClientError::Configuration("missing OPENROUTER_API_KEY".into()))?;

        Ok(Self {
            client: build_http_client(timeout)?,
            endpoint: join_url(base_url, "chat/completions"),
            api_key,
            timeout,
        })
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionsClient {
    #[instrument(level = "debug", skip_all, fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ClientError> {
        let http = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request);

        let response: ChatResponse = send_json(http, SERVICE, self.timeout).await?;
        let completion = response.into_completion();
        debug!(has_content = completion.content.is_some(), "Completion received");
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_configuration_error() {
        let result = ChatCompletionsClient::new("https://llm.test", None, Duration::from_secs(1));
        assert!(matches!(result, Err(ClientError::Configuration(_))));

        let result =
            ChatCompletionsClient::new("https://llm.test", Some("  ".into()), Duration::from_secs(1));
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn test_endpoint() {
        let client = ChatCompletionsClient::new(
            "https://openrouter.ai/api/v1/",
            Some("key".into()),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.endpoint, "https://openrouter.ai/api/v1/chat/completions");
    }

    #[test]
    fn test_first_choice_content() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":" SCORE: 80 "}},{"message":{"content":"other"}}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_completion().content.as_deref(), Some("SCORE: 80"));
    }

    #[test]
    fn test_empty_envelope_has_no_content() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(response.into_completion(), Completion::default());

        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(response.into_completion().content, None);

        let response: ChatResponse = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert_eq!(response.into_completion().content, None);
    }
}
