use crate::llm::{ChatMessage, LlmError, LlmErrorKind, ResponseMode, StructuringClient};
use crate::retry::RetryPolicy;
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_TEMPERATURE: f32 = 0.0;
pub const DEFAULT_TOP_P: f32 = 0.95;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        CompletionOptions {
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Azure OpenAI chat completions against a deployment URL.
///
/// `endpoint` is the full `.../openai/deployments/<name>/chat/completions?api-version=...`
/// URL of the deployment.
pub struct AzureOpenAiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    options: CompletionOptions,
    retry: RetryPolicy,
}

impl AzureOpenAiClient {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            LlmError::new(LlmErrorKind::Transport, format!("HTTP client setup failed: {e}"))
        })?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            options: CompletionOptions::default(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn build_payload(&self, messages: &[ChatMessage], mode: ResponseMode) -> Value {
        let mut payload = serde_json::json!({
            "messages": messages,
            "temperature": self.options.temperature,
            "top_p": self.options.top_p,
            "max_tokens": self.options.max_tokens,
        });
        if mode == ResponseMode::Json {
            payload["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        payload
    }

    fn send(&self, payload: &Value) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .json(payload)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::new(LlmErrorKind::Timeout, e.to_string())
                } else {
                    LlmError::new(LlmErrorKind::Transport, e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().unwrap_or_default();
            let mut err = LlmError::from_status(status.as_u16(), &body);
            err.retry_after = retry_after;
            return Err(err);
        }

        let body = response
            .text()
            .map_err(|e| LlmError::new(LlmErrorKind::Transport, e.to_string()))?;
        extract_reply(&body)
    }
}

impl StructuringClient for AzureOpenAiClient {
    #[tracing::instrument(skip(self, messages), fields(messages = messages.len(), mode = ?mode))]
    fn complete(&self, messages: &[ChatMessage], mode: ResponseMode) -> Result<String, LlmError> {
        let payload = self.build_payload(messages, mode);
        let reply = self.retry.run("chat completion", || self.send(&payload))?;
        tracing::debug!(chars = reply.len(), "chat completion received");
        Ok(reply)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Pull the first choice's message text out of a completions response body.
pub fn extract_reply(body: &str) -> Result<String, LlmError> {
    let parsed: CompletionResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::new(
            LlmErrorKind::MalformedResponse,
            format!("response not valid JSON: {e}"),
        )
    })?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::new(LlmErrorKind::NoChoices, "response has no choices"))?;

    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(LlmError::new(
            LlmErrorKind::Api,
            "reply withheld by content filter",
        ));
    }

    choice
        .message
        .and_then(|m| m.content)
        .ok_or_else(|| LlmError::new(LlmErrorKind::MalformedResponse, "choice has no content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AzureOpenAiClient {
        AzureOpenAiClient::new("https://example.invalid/chat", "key", Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn test_extract_reply_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"a\":1}"},"finish_reason":"stop"}]}"#;
        assert_eq!(extract_reply(body).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_extract_reply_no_choices() {
        let err = extract_reply(r#"{"choices":[]}"#).unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::NoChoices);
    }

    #[test]
    fn test_extract_reply_malformed() {
        let err = extract_reply("<html>gateway</html>").unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::MalformedResponse);
        let err = extract_reply(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::MalformedResponse);
    }

    #[test]
    fn test_content_filter_is_api_error() {
        let body = r#"{"choices":[{"message":{"content":null},"finish_reason":"content_filter"}]}"#;
        assert_eq!(extract_reply(body).unwrap_err().kind, LlmErrorKind::Api);
    }

    #[test]
    fn test_json_mode_sets_response_format() {
        let messages = [ChatMessage::system("s"), ChatMessage::user("u")];
        let json = client().build_payload(&messages, ResponseMode::Json);
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["max_tokens"], DEFAULT_MAX_TOKENS);

        let text = client().build_payload(&messages, ResponseMode::Text);
        assert!(text.get("response_format").is_none());
    }
}
