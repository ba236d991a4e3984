//! Prompt system for the HR advisor.
//!
//! The answer, chunk-summary and table-summary prompts ship as YAML inside
//! the crate. A workspace can override any of them by placing a file with
//! the same id in `.hr-advisor/prompts/`. Templates are rendered with Handlebars.

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_prompt, render_template};
pub use loader::{
    list_prompts, load_prompt, ANSWER_PROMPT_ID, CHUNK_SUMMARY_PROMPT_ID, TABLE_SUMMARY_PROMPT_ID,
};
pub use types::{BuiltPrompt, PromptDefinition};
