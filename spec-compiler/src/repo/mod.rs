//! Repository context.
//!
//! Three analysis documents are read from the target repository and handed
//! to the model as context. Fetching never fails: any document that cannot
//! be loaded is replaced by a fixed fallback record.

mod client;
mod context;
mod fetcher;

pub use client::{DocumentError, GitHubContentsClient, SourceControlClient};
pub use context::{RepoContext, RepoDocument, ANALYSIS_OUTPUT_DIR};
pub use fetcher::RepoContextFetcher;
