//! Ordered, retried publication of plan status events.

use super::transport::{PubSubRestTransport, TopicTransport, TransportCode, TransportError};
use crate::config::PublisherConfig;
use crate::core::StatusEvent;
use crate::pipeline::retry::{retry_classified, RetryConfig};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

/// Errors returned by [`StatusPublisher::publish`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    /// The event could not be serialized.
    #[error("Failed to serialize status event: {0}")]
    Serialization(String),

    /// The bus rejected the event, or retries were exhausted.
    #[error("Failed to publish status event after {attempts} attempt(s): {source}")]
    Transport {
        /// Last transport failure.
        source: TransportError,
        /// Attempts made.
        attempts: usize,
    },
}

impl PublishError {
    /// Bus status code of the last failure, if any.
    #[must_use]
    pub const fn code(&self) -> Option<TransportCode> {
        match self {
            Self::Transport { source, .. } => Some(source.code),
            Self::Serialization(_) => None,
        }
    }

    /// Attempts made before giving up.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        match self {
            Self::Transport { attempts, .. } => *attempts,
            Self::Serialization(_) => 0,
        }
    }
}

/// Result of a successful (or disabled) publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Transport attempts made; zero when publishing is disabled.
    pub attempts: usize,
    /// Bus-assigned id of the delivered message.
    pub message_id: Option<String>,
}

impl PublishReport {
    fn disabled() -> Self {
        Self {
            attempts: 0,
            message_id: None,
        }
    }
}

struct PublishTarget {
    transport: Arc<dyn TopicTransport>,
    topic_path: String,
}

/// Publishes [`StatusEvent`]s with ordering key `plan_id`.
///
/// Publishes that share an ordering key run one at a time in submission
/// order; different keys proceed concurrently. When the project or topic is
/// not configured the publisher is disabled and every publish succeeds
/// without doing anything.
pub struct StatusPublisher {
    target: Option<PublishTarget>,
    retry: RetryConfig,
    publish_timeout: Duration,
    key_locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl StatusPublisher {
    /// Creates a publisher that never publishes.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            target: None,
            retry: RetryConfig::publisher(),
            publish_timeout: Duration::from_secs(10),
            key_locks: DashMap::new(),
        }
    }

    /// Creates a publisher over `transport`.
    ///
    /// Configuration is checked once here; a missing project or topic
    /// yields a disabled publisher.
    #[must_use]
    pub fn new(config: &PublisherConfig, transport: Arc<dyn TopicTransport>) -> Self {
        let (Some(project), Some(topic)) = (
            non_blank(config.project_id.as_ref()),
            non_blank(config.topic.as_ref()),
        ) else {
            tracing::warn!(
                has_project = config.project_id.is_some(),
                has_topic = config.topic.is_some(),
                "Status publisher not configured, status publishing disabled"
            );
            return Self {
                retry: config.retry.clone(),
                publish_timeout: config.publish_timeout(),
                ..Self::disabled()
            };
        };

        let topic_path = format!("projects/{project}/topics/{topic}");
        tracing::info!(
            %topic_path,
            max_attempts = config.retry.max_attempts,
            "Status publisher initialized"
        );

        Self {
            target: Some(PublishTarget {
                transport,
                topic_path,
            }),
            retry: config.retry.clone(),
            publish_timeout: config.publish_timeout(),
            key_locks: DashMap::new(),
        }
    }

    /// Creates a publisher backed by the Pub/Sub REST API.
    ///
    /// If the HTTP client cannot be built the publisher is disabled.
    #[must_use]
    pub fn from_config(config: &PublisherConfig) -> Self {
        match PubSubRestTransport::new(
            config.endpoint.clone(),
            config.access_token.clone(),
            config.publish_timeout(),
        ) {
            Ok(transport) => Self::new(config, Arc::new(transport)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialize status publisher, status publishing disabled");
                Self::disabled()
            }
        }
    }

    /// Returns false when publishing is disabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Publishes one event, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns `PublishError` on a permanent failure or once retries are
    /// exhausted.
    pub async fn publish(&self, event: &StatusEvent) -> Result<PublishReport, PublishError> {
        let Some(target) = &self.target else {
            tracing::debug!(plan_id = %event.plan_id, status = %event.status, "Status publishing disabled, skipping");
            return Ok(PublishReport::disabled());
        };

        let data = event
            .to_json_bytes()
            .map_err(|e| PublishError::Serialization(e.to_string()))?;
        let key = event.ordering_key();

        let key_lock = self.key_lock(key);
        let outcome = {
            let _ordered = key_lock.lock().await;

            tracing::info!(
                plan_id = %event.plan_id,
                spec_index = event.spec_index,
                status = %event.status,
                request_id = %event.request_id,
                ordering_key = key,
                message_size_bytes = data.len(),
                "Publishing plan status message"
            );

            let transport = target.transport.as_ref();
            let topic_path = target.topic_path.as_str();
            let payload = data.as_slice();
            let timeout = self.publish_timeout;

            retry_classified(&self.retry, "status_publish", TransportError::is_transient, move |_| {
                let attempt = transport.publish(topic_path, payload, key);
                async move {
                    tokio::time::timeout(timeout, attempt).await.unwrap_or_else(|_| {
                        Err(TransportError::new(
                            TransportCode::DeadlineExceeded,
                            format!("publish timed out after {}ms", timeout.as_millis()),
                        ))
                    })
                }
            })
            .await
        };
        drop(key_lock);
        self.release_key(key);

        match outcome.result {
            Ok(message_id) => {
                tracing::info!(
                    plan_id = %event.plan_id,
                    status = %event.status,
                    %message_id,
                    attempt = outcome.attempts,
                    "Successfully published plan status message"
                );
                Ok(PublishReport {
                    attempts: outcome.attempts,
                    message_id: Some(message_id),
                })
            }
            Err(source) => {
                tracing::error!(
                    plan_id = %event.plan_id,
                    status = %event.status,
                    request_id = %event.request_id,
                    total_attempts = outcome.attempts,
                    transient = source.is_transient(),
                    error = %source,
                    "Plan status publish failed"
                );
                Err(PublishError::Transport {
                    source,
                    attempts: outcome.attempts,
                })
            }
        }
    }

    /// Publishes one event, logging and swallowing every failure.
    ///
    /// Returns true if the event was delivered or publishing is disabled.
    pub async fn publish_best_effort(&self, event: &StatusEvent) -> bool {
        match self.publish(event).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(
                    plan_id = %event.plan_id,
                    status = %event.status,
                    error = %e,
                    "Status publish failed; continuing"
                );
                false
            }
        }
    }

    fn key_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.key_locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .value(),
        )
    }

    fn release_key(&self, key: &str) {
        // Only the map holds the lock once nobody is waiting on it.
        self.key_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.key_locks.len()
    }
}

impl fmt::Debug for StatusPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusPublisher")
            .field("topic_path", &self.target.as_ref().map(|t| t.topic_path.as_str()))
            .field("retry", &self.retry)
            .field("publish_timeout", &self.publish_timeout)
            .finish_non_exhaustive()
    }
}
