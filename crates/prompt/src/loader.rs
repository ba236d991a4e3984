//! Prompt loader for built-in and workspace YAML prompt definitions.

use crate::types::PromptDefinition;
use hr_core::{AppError, AppResult};
use std::path::Path;

/// Final answer prompt.
pub const ANSWER_PROMPT_ID: &str = "hr.answer";

/// Per-chunk summary prompt used by tree summarization.
pub const CHUNK_SUMMARY_PROMPT_ID: &str = "hr.chunk_summary";

/// Table summary embedded in place of the bare table at ingestion.
pub const TABLE_SUMMARY_PROMPT_ID: &str = "hr.table_summary";

const BUILTIN_PROMPTS: &[(&str, &str)] = &[
    (ANSWER_PROMPT_ID, include_str!("../prompts/hr.answer.yml")),
    (
        CHUNK_SUMMARY_PROMPT_ID,
        include_str!("../prompts/hr.chunk_summary.yml"),
    ),
    (
        TABLE_SUMMARY_PROMPT_ID,
        include_str!("../prompts/hr.table_summary.yml"),
    ),
];

/// Load a prompt definition by ID.
///
/// A file named `<id>.yml` in `prompts_dir` takes precedence over the
/// built-in definition with the same ID.
///
/// # Example
/// ```no_run
/// use hr_prompt::{load_prompt, ANSWER_PROMPT_ID};
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new(".hr-advisor/prompts"), ANSWER_PROMPT_ID)?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(prompts_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir.join(format!("{}.yml", prompt_id));

    let definition = if prompt_file.exists() {
        tracing::debug!("Loading prompt override from: {:?}", prompt_file);
        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;
        parse_prompt(&contents, &prompt_file.display().to_string())?
    } else {
        let (_, contents) = BUILTIN_PROMPTS
            .iter()
            .find(|(id, _)| *id == prompt_id)
            .ok_or_else(|| {
                AppError::Prompt(format!(
                    "Prompt not found: {} (no built-in and no file at {:?})",
                    prompt_id, prompt_file
                ))
            })?;
        parse_prompt(contents, "built-in")?
    };

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file declares id '{}' but was loaded as '{}'",
            definition.id, prompt_id
        )));
    }

    tracing::debug!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// List available prompt IDs: built-ins plus workspace files, sorted.
pub fn list_prompts(prompts_dir: &Path) -> AppResult<Vec<String>> {
    let mut prompt_ids: Vec<String> = BUILTIN_PROMPTS
        .iter()
        .map(|(id, _)| id.to_string())
        .collect();

    if prompts_dir.exists() {
        for entry in walkdir::WalkDir::new(prompts_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    prompt_ids.push(stem.to_string());
                }
            }
        }
    }

    prompt_ids.sort();
    prompt_ids.dedup();
    Ok(prompt_ids)
}

fn parse_prompt(contents: &str, origin: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {}: {}", origin, e))
    })?;
    validate_prompt(&definition)?;
    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if let Some(t) = def.temperature {
        if !(0.0..=2.0).contains(&t) {
            return Err(AppError::Prompt(format!(
                "Prompt {} temperature {} is outside 0.0-2.0",
                def.id, t
            )));
        }
    }

    for var in &def.variables {
        if !def.template.contains(&format!("{{{{{}}}}}", var)) {
            return Err(AppError::Prompt(format!(
                "Prompt {} declares variable '{}' that the template never uses",
                def.id, var
            )));
        }
    }

    Ok(())
}
