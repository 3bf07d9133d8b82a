pub mod azure_openai;

use crate::retry::Retryable;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Whether the reply must be a JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    Auth,
    RateLimit,
    Server,
    MalformedResponse,
    NoChoices,
    /// Any other API-reported failure (4xx, content filter).
    Api,
    Transport,
    Timeout,
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LlmErrorKind::Auth => "authentication",
            LlmErrorKind::RateLimit => "rate limit",
            LlmErrorKind::Server => "server",
            LlmErrorKind::MalformedResponse => "malformed response",
            LlmErrorKind::NoChoices => "no choices",
            LlmErrorKind::Api => "api",
            LlmErrorKind::Transport => "transport",
            LlmErrorKind::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("LLM {kind} error: {message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        LlmError {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => LlmErrorKind::Auth,
            429 => LlmErrorKind::RateLimit,
            500..=599 => LlmErrorKind::Server,
            _ => LlmErrorKind::Api,
        };
        LlmError::new(kind, format!("status {status} body {body}"))
    }
}

impl Retryable for LlmError {
    fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            LlmErrorKind::RateLimit
                | LlmErrorKind::Server
                | LlmErrorKind::Transport
                | LlmErrorKind::Timeout
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

/// A chat-completion service used to structure OCR output.
pub trait StructuringClient: Send + Sync {
    /// Send the conversation and return the reply text.
    fn complete(&self, messages: &[ChatMessage], mode: ResponseMode) -> Result<String, LlmError>;

    fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.complete(messages, ResponseMode::Text)
    }

    /// Request a JSON object reply and parse it.
    fn chat_json(&self, messages: &[ChatMessage]) -> Result<Value, LlmError> {
        let reply = self.complete(messages, ResponseMode::Json)?;
        parse_json_reply(&reply)
    }
}

/// Remove a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line; the JSON
    // may start on that same line.
    let line_end = body.find('\n').unwrap_or(body.len());
    match body[..line_end].find(['{', '[']) {
        Some(start) => body[start..].trim(),
        None => body[line_end..].trim(),
    }
}

/// Parse a model reply as a JSON object.
pub fn parse_json_reply(reply: &str) -> Result<Value, LlmError> {
    let body = strip_code_fences(reply);
    let value: Value = serde_json::from_str(body).map_err(|e| {
        LlmError::new(
            LlmErrorKind::MalformedResponse,
            format!("model output not JSON: {e}"),
        )
    })?;
    if !value.is_object() {
        return Err(LlmError::new(
            LlmErrorKind::MalformedResponse,
            "model output is not a JSON object",
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```json{\"a\": 1}```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```json {\n\"a\": 1\n}\n```"), "{\n\"a\": 1\n}");
        assert_eq!(strip_code_fences("```json[1]```"), "[1]");
    }

    #[test]
    fn test_parse_json_reply() {
        let value = parse_json_reply("```json\n{\"fields\": []}\n```").unwrap();
        assert!(value["fields"].is_array());

        let err = parse_json_reply("Sorry, I cannot help").unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::MalformedResponse);

        let err = parse_json_reply("[1, 2]").unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::MalformedResponse);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(LlmError::from_status(401, "").kind, LlmErrorKind::Auth);
        assert_eq!(LlmError::from_status(429, "").kind, LlmErrorKind::RateLimit);
        assert_eq!(LlmError::from_status(502, "").kind, LlmErrorKind::Server);
        assert_eq!(LlmError::from_status(400, "").kind, LlmErrorKind::Api);
    }

    #[test]
    fn test_transient_kinds() {
        assert!(LlmError::new(LlmErrorKind::RateLimit, "").is_transient());
        assert!(LlmError::new(LlmErrorKind::Timeout, "").is_transient());
        assert!(!LlmError::new(LlmErrorKind::Auth, "").is_transient());
        assert!(!LlmError::new(LlmErrorKind::MalformedResponse, "").is_transient());
    }

    #[test]
    fn test_message_serializes_lowercase_role() {
        let json = serde_json::to_string(&ChatMessage::system("hi")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"hi"}"#);
    }

    struct Canned(&'static str);

    impl StructuringClient for Canned {
        fn complete(&self, _: &[ChatMessage], _: ResponseMode) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_chat_json_uses_provided_parsing() {
        let client = Canned("```json\n{\"ok\": true}\n```");
        assert_eq!(client.chat_json(&[]).unwrap()["ok"], true);
        assert!(client.chat(&[]).unwrap().starts_with("```"));
    }
}
