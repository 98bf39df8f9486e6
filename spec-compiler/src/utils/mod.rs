//! Utility functions for identifiers, timestamps and message scrubbing.
//!
//! This module provides deterministic helpers for generating request IDs,
//! RFC3339/ISO timestamps, and secret-free bounded error summaries.

pub mod redaction;
pub mod timestamps;
mod uuid_utils;

pub use redaction::{redact_secrets, redacted_excerpt, sanitize_error_message, truncate_chars, MAX_ERROR_MESSAGE_CHARS};
pub use timestamps::{format_iso8601, iso_timestamp, now_utc, parse_timestamp, Timestamp, TimestampError};
pub use uuid_utils::{generate_request_id, normalize_request_id, MAX_REQUEST_ID_LEN};
