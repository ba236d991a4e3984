//! Completion interface shared by answer synthesis and chunk summaries.

use hr_core::AppResult;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Speaker of one chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// One completion call: an optional system message and a user prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub prompt: String,
    pub model: String,
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            system: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Messages in send order, system first when present.
    pub fn messages(&self) -> Vec<(Role, &str)> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system.as_deref() {
            messages.push((Role::System, system));
        }
        messages.push((Role::User, self.prompt.as_str()));
        messages
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: LlmUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl LlmResponse {
    /// True when the provider stopped at the token limit.
    pub fn is_truncated(&self) -> bool {
        self.finish_reason.as_deref() == Some("length")
    }
}

/// Token counts for one call, or summed over several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LlmUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

impl AddAssign for LlmUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A chat model. Answers come back whole; nothing is streamed.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = LlmRequest::new("問題", "gpt-4-turbo-preview")
            .with_temperature(0.1)
            .with_max_tokens(512)
            .with_system("HR consultant");

        assert_eq!(request.model, "gpt-4-turbo-preview");
        assert_eq!(request.temperature, Some(0.1));
        assert_eq!(request.max_tokens, Some(512));
        assert_eq!(
            request.messages(),
            vec![(Role::System, "HR consultant"), (Role::User, "問題")]
        );
    }

    #[test]
    fn test_messages_without_system() {
        let request = LlmRequest::new("婚假幾天？", "m");
        assert_eq!(request.messages(), vec![(Role::User, "婚假幾天？")]);
    }

    #[test]
    fn test_usage_accumulates() {
        let mut usage = LlmUsage::new(120, 30);
        usage += LlmUsage::new(10, 5);
        assert_eq!(usage, LlmUsage::new(130, 35));
        assert_eq!(usage.total_tokens, 165);
    }

    #[test]
    fn test_truncation_flag() {
        let mut response = LlmResponse {
            content: "答".to_string(),
            model: "m".to_string(),
            usage: LlmUsage::default(),
            finish_reason: Some("length".to_string()),
        };
        assert!(response.is_truncated());
        response.finish_reason = Some("stop".to_string());
        assert!(!response.is_truncated());
    }
}
