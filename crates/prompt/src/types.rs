//! Prompt definitions and rendered prompts.

use serde::{Deserialize, Serialize};

/// A prompt definition loaded from YAML.
///
/// ```yaml
/// id: hr.answer
/// title: HR regulatory answer
/// system: 你是一位專業的人力資源法規顧問
/// variables: [question, context]
/// template: "問題：{{question}}\n{{context}}"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    pub id: String,

    pub title: String,

    /// System message template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Variables that must be supplied when building
    #[serde(default)]
    pub variables: Vec<String>,

    /// User message template (Handlebars)
    pub template: String,

    /// Sampling temperature for this prompt, overriding the configured one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// A rendered prompt ready for the chat model.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPrompt {
    pub prompt_id: String,
    pub system: Option<String>,
    pub user: String,
    pub temperature: Option<f32>,
}
