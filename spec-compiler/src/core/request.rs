//! Per-request correlation data.

use crate::utils::{normalize_request_id, truncate_chars};
use serde::{Deserialize, Serialize};

/// Longest idempotency key that is retained.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 100;

/// Correlation data attached to one compile request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Correlation id, always a hyphenated UUID.
    pub request_id: String,
    /// Caller idempotency key. Logged only; no deduplication is performed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl RequestContext {
    /// Builds a context from caller-supplied header values.
    #[must_use]
    pub fn from_headers(request_id: Option<&str>, idempotency_key: Option<&str>) -> Self {
        let idempotency_key = idempotency_key
            .map(|key| truncate_chars(key.trim(), MAX_IDEMPOTENCY_KEY_LEN).trim().to_string())
            .filter(|key| !key.is_empty());

        Self {
            request_id: normalize_request_id(request_id),
            idempotency_key,
        }
    }

    /// Creates a context with a freshly generated request id.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_headers(None, None)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::generate()
    }
}
