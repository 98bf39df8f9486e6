//! Infallible repository context fetching.

use super::{RepoContext, RepoDocument, SourceControlClient};
use crate::credentials::CachedCredential;
use crate::events::EventSink;
use futures::FutureExt;
use serde_json::{json, Value};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Loads the three analysis documents, substituting fallbacks on failure.
///
/// Every outcome is reported on the event sink:
/// `repo_context.document_loaded`, `repo_context.document_fallback`,
/// `repo_context.total_fallback` and, once per fetch, `repo_context.fetched`.
pub struct RepoContextFetcher {
    client: Arc<dyn SourceControlClient>,
    events: Arc<dyn EventSink>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl RepoContextFetcher {
    /// Creates a fetcher.
    #[must_use]
    pub fn new(client: Arc<dyn SourceControlClient>, events: Arc<dyn EventSink>) -> Self {
        Self { client, events }
    }

    /// Fetches the repository context for `owner/repo`. Never fails.
    pub async fn fetch(&self, owner: &str, repo: &str, credential: &CachedCredential) -> RepoContext {
        let attempt = AssertUnwindSafe(self.fetch_documents(owner, repo, &credential.token))
            .catch_unwind()
            .await;

        let context = match attempt {
            Ok(context) => context,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                tracing::error!(owner, repo, %reason, "Unexpected failure fetching repository context");
                self.events.emit(
                    "repo_context.total_fallback",
                    json!({ "owner": owner, "repo": repo, "reason": reason }),
                );
                RepoContext::fallback()
            }
        };

        let fallbacks: Vec<String> = RepoDocument::ALL
            .iter()
            .filter(|doc| context.is_fallback(**doc))
            .map(ToString::to_string)
            .collect();

        self.events.emit(
            "repo_context.fetched",
            json!({
                "owner": owner,
                "repo": repo,
                "tree_count": context.tree.len(),
                "dependencies_count": context.dependencies.len(),
                "file_summaries_count": context.file_summaries.len(),
                "fallback_documents": fallbacks,
            }),
        );

        context
    }

    async fn fetch_documents(&self, owner: &str, repo: &str, token: &str) -> RepoContext {
        let (tree, dependencies, file_summaries) = futures::join!(
            self.load(RepoDocument::Tree, owner, repo, token),
            self.load(RepoDocument::Dependencies, owner, repo, token),
            self.load(RepoDocument::FileSummaries, owner, repo, token),
        );

        RepoContext {
            tree,
            dependencies,
            file_summaries,
        }
    }

    async fn load(&self, document: RepoDocument, owner: &str, repo: &str, token: &str) -> Vec<Value> {
        let path = document.path();
        let reason = match self.client.get_json_document(owner, repo, &path, token).await {
            Ok(value) => match document.extract(value) {
                Ok(entries) => {
                    self.events.emit(
                        "repo_context.document_loaded",
                        json!({
                            "owner": owner,
                            "repo": repo,
                            "document": document.to_string(),
                            "path": path,
                            "count": entries.len(),
                        }),
                    );
                    return entries;
                }
                Err(reason) => reason,
            },
            Err(e) => e.to_string(),
        };

        self.events.emit(
            "repo_context.document_fallback",
            json!({
                "owner": owner,
                "repo": repo,
                "document": document.to_string(),
                "path": path,
                "reason": reason,
            }),
        );
        document.fallback()
    }
}

impl fmt::Debug for RepoContextFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoContextFetcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::repo::client::MockSourceControlClient;
    use crate::repo::DocumentError;
    use pretty_assertions::assert_eq;

    fn credential() -> CachedCredential {
        CachedCredential::new("tok", "bearer", None)
    }

    fn fetcher(client: MockSourceControlClient) -> (RepoContextFetcher, Arc<CollectingEventSink>) {
        let sink = Arc::new(CollectingEventSink::new());
        (RepoContextFetcher::new(Arc::new(client), sink.clone()), sink)
    }

    fn serve_all(client: &mut MockSourceControlClient) {
        client.expect_get_json_document().returning(|_, _, path, _| {
            if path.ends_with("tree.json") {
                Ok(json!({"tree": [{"path": "src", "type": "tree"}]}))
            } else if path.ends_with("dependencies.json") {
                Ok(json!([{"name": "serde"}, {"name": "tokio"}]))
            } else {
                Ok(json!({"summaries": [{"path": "src/lib.rs", "summary": "entry"}]}))
            }
        });
    }

    #[tokio::test]
    async fn test_all_documents_loaded() {
        let mut client = MockSourceControlClient::new();
        serve_all(&mut client);
        let (fetcher, sink) = fetcher(client);

        let ctx = fetcher.fetch("acme", "widgets", &credential()).await;
        assert_eq!(ctx.tree.len(), 1);
        assert_eq!(ctx.dependencies.len(), 2);
        assert_eq!(ctx.file_summaries[0]["path"], "src/lib.rs");

        assert_eq!(sink.events_named("repo_context.document_loaded").len(), 3);
        let fetched = sink.events_named("repo_context.fetched");
        assert_eq!(fetched[0]["fallback_documents"], json!([]));
    }

    #[tokio::test]
    async fn test_single_document_falls_back_independently() {
        let mut client = MockSourceControlClient::new();
        client.expect_get_json_document().returning(|_, _, path, _| {
            if path.ends_with("dependencies.json") {
                Err(DocumentError::NotFound { path: path.to_string() })
            } else if path.ends_with("tree.json") {
                Ok(json!([{"path": "README.md"}]))
            } else {
                Ok(json!({"summaries": []}))
            }
        });
        let (fetcher, sink) = fetcher(client);

        let ctx = fetcher.fetch("acme", "widgets", &credential()).await;
        assert_eq!(ctx.tree, vec![json!({"path": "README.md"})]);
        assert_eq!(ctx.dependencies, RepoDocument::Dependencies.fallback());
        assert!(ctx.file_summaries.is_empty());

        let fallbacks = sink.events_named("repo_context.document_fallback");
        assert_eq!(fallbacks.len(), 1);
        assert_eq!(fallbacks[0]["document"], "dependencies");
    }

    #[tokio::test]
    async fn test_wrong_shape_falls_back() {
        let mut client = MockSourceControlClient::new();
        client
            .expect_get_json_document()
            .returning(|_, _, _, _| Ok(json!({"unexpected": true})));
        let (fetcher, _) = fetcher(client);

        let ctx = fetcher.fetch("acme", "widgets", &credential()).await;
        assert_eq!(ctx, RepoContext::fallback());
    }

    #[tokio::test]
    async fn test_every_error_kind_falls_back() {
        let mut client = MockSourceControlClient::new();
        client.expect_get_json_document().returning(|_, _, path, _| {
            if path.ends_with("tree.json") {
                Err(DocumentError::Http { status: 500, body: None })
            } else if path.ends_with("dependencies.json") {
                Err(DocumentError::InvalidJson("eof".into()))
            } else {
                Err(DocumentError::Transport("reset".into()))
            }
        });
        let (fetcher, sink) = fetcher(client);

        let ctx = fetcher.fetch("acme", "widgets", &credential()).await;
        assert_eq!(ctx, RepoContext::fallback());
        assert_eq!(sink.events_named("repo_context.document_fallback").len(), 3);
        assert!(sink.events_named("repo_context.total_fallback").is_empty());
    }

    #[tokio::test]
    async fn test_panic_yields_total_fallback() {
        let mut client = MockSourceControlClient::new();
        client
            .expect_get_json_document()
            .returning(|_, _, _, _| panic!("client exploded"));
        let (fetcher, sink) = fetcher(client);

        let ctx = fetcher.fetch("acme", "widgets", &credential()).await;
        assert_eq!(ctx, RepoContext::fallback());

        let total = sink.events_named("repo_context.total_fallback");
        assert_eq!(total.len(), 1);
        assert_eq!(total[0]["reason"], "client exploded");
        assert_eq!(sink.events_named("repo_context.fetched").len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_is_idempotent() {
        let mut client = MockSourceControlClient::new();
        serve_all(&mut client);
        let (fetcher, _) = fetcher(client);

        let first = fetcher.fetch("acme", "widgets", &credential()).await;
        let second = fetcher.fetch("acme", "widgets", &credential()).await;
        assert_eq!(first, second);
    }
}
