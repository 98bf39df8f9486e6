//! Repository documents and their fallbacks.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Directory holding the analysis documents.
pub const ANALYSIS_OUTPUT_DIR: &str = ".github/repo-analysis-output";

/// One of the three analysis documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoDocument {
    /// `tree.json`, key `tree`.
    Tree,
    /// `dependencies.json`, key `dependencies`.
    Dependencies,
    /// `file-summaries.json`, key `summaries`.
    FileSummaries,
}

impl RepoDocument {
    /// All documents, in context order.
    pub const ALL: [Self; 3] = [Self::Tree, Self::Dependencies, Self::FileSummaries];

    /// File name inside [`ANALYSIS_OUTPUT_DIR`].
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Tree => "tree.json",
            Self::Dependencies => "dependencies.json",
            Self::FileSummaries => "file-summaries.json",
        }
    }

    /// Repository path of the document.
    #[must_use]
    pub fn path(self) -> String {
        format!("{ANALYSIS_OUTPUT_DIR}/{}", self.file_name())
    }

    /// Key holding the list when the document is an object.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::Dependencies => "dependencies",
            Self::FileSummaries => "summaries",
        }
    }

    /// The fixed record substituted when the document is unavailable.
    #[must_use]
    pub fn fallback(self) -> Vec<Value> {
        let record = match self {
            Self::Tree => json!({
                "path": ".",
                "type": "tree",
                "mode": "040000",
                "sha": "unavailable",
                "url": "unavailable",
                "note": "Repository tree data unavailable",
            }),
            Self::Dependencies => json!({
                "name": "unknown",
                "version": "unknown",
                "ecosystem": "unknown",
                "note": "Dependency data unavailable",
            }),
            Self::FileSummaries => json!({
                "path": "unknown",
                "summary": "File summary data unavailable",
                "lines": 0,
                "note": "Unable to fetch or summarize repository files",
            }),
        };
        vec![record]
    }

    /// Pulls the entry list out of a parsed document.
    ///
    /// A top-level list is used as is; an object must carry the list under
    /// [`key`](Self::key).
    ///
    /// # Errors
    ///
    /// Returns a short reason when the document has neither shape.
    pub fn extract(self, document: Value) -> Result<Vec<Value>, String> {
        match document {
            Value::Array(items) => Ok(items),
            Value::Object(mut map) => match map.remove(self.key()) {
                Some(Value::Array(items)) => Ok(items),
                Some(_) => Err(format!("'{}' is not a list", self.key())),
                None => Err(format!("missing '{}' key", self.key())),
            },
            _ => Err("expected a JSON list or object".to_string()),
        }
    }
}

impl fmt::Display for RepoDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tree => write!(f, "tree"),
            Self::Dependencies => write!(f, "dependencies"),
            Self::FileSummaries => write!(f, "file_summaries"),
        }
    }
}

/// Repository context handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoContext {
    /// Repository tree entries.
    pub tree: Vec<Value>,
    /// Dependency records.
    pub dependencies: Vec<Value>,
    /// Per-file summaries.
    pub file_summaries: Vec<Value>,
}

impl RepoContext {
    /// A context made entirely of fallback records.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            tree: RepoDocument::Tree.fallback(),
            dependencies: RepoDocument::Dependencies.fallback(),
            file_summaries: RepoDocument::FileSummaries.fallback(),
        }
    }

    /// Entries for `document`.
    #[must_use]
    pub fn entries(&self, document: RepoDocument) -> &[Value] {
        match document {
            RepoDocument::Tree => &self.tree,
            RepoDocument::Dependencies => &self.dependencies,
            RepoDocument::FileSummaries => &self.file_summaries,
        }
    }

    /// Returns true when `document` holds its fallback record.
    #[must_use]
    pub fn is_fallback(&self, document: RepoDocument) -> bool {
        self.entries(document) == document.fallback().as_slice()
    }
}
