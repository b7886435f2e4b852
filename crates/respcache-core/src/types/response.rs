//! Cached model responses

use serde::{Deserialize, Serialize};

/// Token usage reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A model response as stored in the cache.
///
/// The cache treats the content as opaque; usage and finish reason are
/// carried along for savings accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl ModelResponse {
    /// A bare text response
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
            finish_reason: None,
        }
    }

    /// Attach token usage
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

impl From<&str> for ModelResponse {
    fn from(content: &str) -> Self {
        Self::text(content)
    }
}

impl From<String> for ModelResponse {
    fn from(content: String) -> Self {
        Self::text(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_response() {
        let resp = ModelResponse::text("Hi there!");
        assert_eq!(resp.content, "Hi there!");
        assert!(resp.usage.is_none());
    }

    #[test]
    fn test_usage_totals() {
        let usage = TokenUsage::new(12, 30);
        assert_eq!(usage.total_tokens, 42);

        let resp = ModelResponse::text("ok").with_usage(usage);
        assert_eq!(resp.usage.unwrap().completion_tokens, 30);
    }

    #[test]
    fn test_serde_roundtrip() {
        let resp = ModelResponse::text("answer").with_usage(TokenUsage::new(5, 7));
        let json = serde_json::to_string(&resp).unwrap();
        let back: ModelResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(resp, back);
    }
}
