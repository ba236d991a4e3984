//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use hr_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Every variable listed in the definition's `variables` must be
/// supplied. Both the system and the user template are rendered with the
/// same variables.
///
/// # Example
/// ```no_run
/// use hr_prompt::{build_prompt, PromptDefinition};
/// use std::collections::HashMap;
///
/// # fn example(def: PromptDefinition) -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("question".to_string(), "特休假如何計算？".to_string());
/// vars.insert("context".to_string(), "第38條 ...".to_string());
///
/// let built = build_prompt(&def, vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let missing: Vec<&str> = definition
        .variables
        .iter()
        .filter(|name| !variables.contains_key(name.as_str()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Prompt(format!(
            "Prompt {} is missing variables: {}",
            definition.id,
            missing.join(", ")
        )));
    }

    let user = render_template(&definition.template, &variables)?;
    let system = definition
        .system
        .as_deref()
        .map(|s| render_template(s, &variables))
        .transpose()?;

    Ok(BuiltPrompt {
        prompt_id: definition.id.clone(),
        system,
        user,
        temperature: definition.temperature,
    })
}

/// Render a Handlebars template with variables. HTML escaping is disabled.
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> PromptDefinition {
        PromptDefinition {
            id: "test.prompt".to_string(),
            title: "Test".to_string(),
            system: Some("顧問：{{question}}".to_string()),
            variables: vec!["question".to_string(), "context".to_string()],
            template: "問題：{{question}}\n內容：{{context}}".to_string(),
            temperature: Some(0.0),
        }
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_build_prompt_renders_system_and_user() {
        let built = build_prompt(
            &definition(),
            vars(&[("question", "試用期多久？"), ("context", "第一條 試用期為三個月")]),
        )
        .unwrap();

        assert_eq!(built.user, "問題：試用期多久？\n內容：第一條 試用期為三個月");
        assert_eq!(built.system.as_deref(), Some("顧問：試用期多久？"));
        assert_eq!(built.prompt_id, "test.prompt");
        assert_eq!(built.temperature, Some(0.0));
    }

    #[test]
    fn test_missing_variable_is_error() {
        let result = build_prompt(&definition(), vars(&[("question", "q")]));
        match result {
            Err(AppError::Prompt(msg)) => assert!(msg.contains("context")),
            other => panic!("expected prompt error, got {:?}", other),
        }
    }

    #[test]
    fn test_no_html_escaping() {
        let rendered =
            render_template("{{context}}", &vars(&[("context", "<表> & \"引號\"")])).unwrap();
        assert_eq!(rendered, "<表> & \"引號\"");
    }

    #[test]
    fn test_render_template_missing_variable() {
        // Handlebars renders undeclared variables as empty strings
        let rendered = render_template("Question: {{missing}}", &HashMap::new()).unwrap();
        assert_eq!(rendered, "Question: ");
    }
}
