//! Compile requests and their validation.

use crate::errors::{FieldError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One specification-compilation request.
///
/// Immutable once validated; lives for a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileTask {
    /// Plan the specification belongs to.
    pub plan_id: String,
    /// Zero-based position of the specification within its plan.
    pub spec_index: i64,
    /// The specification itself; opaque to the pipeline.
    #[serde(rename = "spec")]
    pub spec_payload: Value,
    /// Repository owner (user or organization).
    #[serde(rename = "github_owner")]
    pub repo_owner: String,
    /// Repository name.
    #[serde(rename = "github_repo")]
    pub repo_name: String,
}

/// Typed view of the structured specification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileSpec {
    /// What the specification aims to achieve.
    pub purpose: String,
    /// Desired end state after implementation.
    pub vision: String,
    /// Mandatory requirements.
    pub must: Vec<String>,
    /// Constraints to avoid.
    pub dont: Vec<String>,
    /// Optional enhancements.
    pub nice: Vec<String>,
    /// Preconditions.
    pub assumptions: Vec<String>,
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

impl CompileSpec {
    /// Checks that `purpose` and `vision` carry text.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Fields` naming every blank field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        if blank(&self.purpose) {
            errors.push(FieldError::new("spec.purpose", "cannot be empty or whitespace-only"));
        }
        if blank(&self.vision) {
            errors.push(FieldError::new("spec.vision", "cannot be empty or whitespace-only"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Fields(errors))
        }
    }
}

impl CompileTask {
    /// Creates a new task.
    #[must_use]
    pub fn new(
        plan_id: impl Into<String>,
        spec_index: i64,
        spec_payload: Value,
        repo_owner: impl Into<String>,
        repo_name: impl Into<String>,
    ) -> Self {
        Self {
            plan_id: plan_id.into(),
            spec_index,
            spec_payload,
            repo_owner: repo_owner.into(),
            repo_name: repo_name.into(),
        }
    }

    /// Checks the task's shape.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Fields` listing every offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if blank(&self.plan_id) {
            errors.push(FieldError::new("plan_id", "cannot be empty or whitespace-only"));
        }
        if self.spec_index < 0 {
            errors.push(FieldError::new("spec_index", "must be greater than or equal to 0"));
        }
        if blank(&self.repo_owner) {
            errors.push(FieldError::new("github_owner", "cannot be empty or whitespace-only"));
        }
        if blank(&self.repo_name) {
            errors.push(FieldError::new("github_repo", "cannot be empty or whitespace-only"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Fields(errors))
        }
    }

    /// Interprets the payload as a structured [`CompileSpec`].
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when the payload does not have the
    /// structured shape or its text fields are blank.
    pub fn typed_spec(&self) -> Result<CompileSpec, ValidationError> {
        let spec: CompileSpec = serde_json::from_value(self.spec_payload.clone())
            .map_err(|e| ValidationError::Fields(vec![FieldError::new("spec", e.to_string())]))?;
        spec.validate()?;
        Ok(spec)
    }
}

/// Parses and validates a raw request body.
///
/// Oversized bodies are rejected before parsing. The structured spec shape
/// is enforced here so malformed payloads never become tasks.
///
/// # Errors
///
/// - `ValidationError::TooLarge` if `body.len() > limit`
/// - `ValidationError::Malformed` if the body is not a compile request
/// - `ValidationError::Fields` if any field is invalid
pub fn validate_request_body(body: &[u8], limit: usize) -> Result<CompileTask, ValidationError> {
    if body.len() > limit {
        return Err(ValidationError::TooLarge {
            size: body.len(),
            limit,
        });
    }

    let task: CompileTask =
        serde_json::from_slice(body).map_err(|e| ValidationError::Malformed(e.to_string()))?;

    let mut fields = match task.validate() {
        Ok(()) => Vec::new(),
        Err(e) => e.fields().to_vec(),
    };
    if let Err(e) = task.typed_spec() {
        fields.extend(e.fields().iter().cloned());
    }

    if fields.is_empty() {
        Ok(task)
    } else {
        Err(ValidationError::Fields(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn spec() -> Value {
        json!({
            "purpose": "Add login",
            "vision": "Users can sign in",
            "must": ["OAuth"],
            "dont": [],
            "nice": [],
            "assumptions": []
        })
    }

    fn body(overrides: Value) -> Vec<u8> {
        let mut base = json!({
            "plan_id": "plan-1",
            "spec_index": 0,
            "spec": spec(),
            "github_owner": "acme",
            "github_repo": "widgets"
        });
        if let (Some(base_map), Some(extra)) = (base.as_object_mut(), overrides.as_object()) {
            for (k, v) in extra {
                base_map.insert(k.clone(), v.clone());
            }
        }
        serde_json::to_vec(&base).unwrap()
    }

    #[test]
    fn test_valid_body_parses() {
        let task = validate_request_body(&body(json!({})), 1024).unwrap();
        assert_eq!(task.plan_id, "plan-1");
        assert_eq!(task.repo_owner, "acme");
        assert_eq!(task.repo_name, "widgets");
        assert_eq!(task.typed_spec().unwrap().must, vec!["OAuth".to_string()]);
    }

    #[test]
    fn test_oversized_body_rejected() {
        let raw = body(json!({}));
        let err = validate_request_body(&raw, raw.len() - 1).unwrap_err();
        assert!(matches!(err, ValidationError::TooLarge { .. }));
    }

    #[test]
    fn test_malformed_body_rejected() {
        let err = validate_request_body(b"{not json", 1024).unwrap_err();
        assert!(matches!(err, ValidationError::Malformed(_)));
    }

    #[test]
    fn test_every_bad_field_is_listed() {
        let err = validate_request_body(
            &body(json!({"plan_id": "  ", "spec_index": -1, "github_repo": ""})),
            1024,
        )
        .unwrap_err();
        let names: Vec<&str> = err.fields().iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["plan_id", "spec_index", "github_repo"]);
    }

    #[test]
    fn test_blank_spec_purpose_rejected() {
        let mut bad = spec();
        bad["purpose"] = json!("   ");
        let err = validate_request_body(&body(json!({ "spec": bad })), 4096).unwrap_err();
        assert_eq!(err.fields()[0].field, "spec.purpose");
    }

    #[test]
    fn test_spec_missing_lists_rejected() {
        let err = validate_request_body(&body(json!({"spec": {"purpose": "p"}})), 4096).unwrap_err();
        assert_eq!(err.fields()[0].field, "spec");
    }

    #[test]
    fn test_task_validate_accepts_good_task() {
        let task = CompileTask::new("p", 3, spec(), "o", "r");
        assert!(task.validate().is_ok());
    }
}
