//! User content composition.

use super::LlmError;
use crate::repo::RepoContext;
use serde_json::{json, Value};

fn pretty(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

fn checked_prompt(system_prompt: &str) -> Result<&str, LlmError> {
    let prompt = system_prompt.trim();
    if prompt.is_empty() {
        return Err(LlmError::Configuration(
            "system prompt cannot be empty or whitespace-only".to_string(),
        ));
    }
    Ok(prompt)
}

/// Composes the labeled user content sent to every backend.
///
/// Sections appear in a fixed order, each followed by pretty-printed JSON,
/// so identical inputs always produce identical text.
///
/// # Errors
///
/// Returns `LlmError::Configuration` if the system prompt is blank.
pub fn compose_user_content(
    system_prompt: &str,
    context: &RepoContext,
    spec_data: &Value,
) -> Result<String, LlmError> {
    let prompt = checked_prompt(system_prompt)?;

    let sections = [
        "=== SYSTEM PROMPT ===".to_string(),
        prompt.to_string(),
        String::new(),
        "=== REPOSITORY TREE ===".to_string(),
        pretty(&context.tree),
        String::new(),
        "=== DEPENDENCIES ===".to_string(),
        pretty(&context.dependencies),
        String::new(),
        "=== FILE SUMMARIES ===".to_string(),
        pretty(&context.file_summaries),
        String::new(),
        "=== SPECIFICATION DATA ===".to_string(),
        pretty(spec_data),
    ];

    Ok(sections.join("\n"))
}

/// Same inputs as [`compose_user_content`], as one JSON object.
///
/// # Errors
///
/// Returns `LlmError::Configuration` if the system prompt is blank.
pub fn compose_structured_content(
    system_prompt: &str,
    context: &RepoContext,
    spec_data: &Value,
) -> Result<Value, LlmError> {
    let prompt = checked_prompt(system_prompt)?;
    Ok(json!({
        "system_prompt": prompt,
        "repository_tree": context.tree,
        "dependencies": context.dependencies,
        "file_summaries": context.file_summaries,
        "specification_data": spec_data,
    }))
}
