//! Request correlation identifiers.

use uuid::Uuid;

/// Longest caller-supplied request id that will be honoured.
pub const MAX_REQUEST_ID_LEN: usize = 100;

/// Generates a new request id (UUID v4, hyphenated).
#[must_use]
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Accepts a caller-supplied request id if it is a well-formed UUID,
/// otherwise generates a fresh one.
///
/// Anything else (empty, oversized, free text) is discarded so that log
/// lines and event payloads never carry caller-controlled strings.
#[must_use]
pub fn normalize_request_id(supplied: Option<&str>) -> String {
    match supplied.map(str::trim) {
        Some(candidate) if !candidate.is_empty() && candidate.len() <= MAX_REQUEST_ID_LEN => {
            Uuid::parse_str(candidate)
                .map_or_else(|_| generate_request_id(), |id| id.hyphenated().to_string())
        }
        _ => generate_request_id(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_uuid_is_kept() {
        let id = "550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_request_id(Some(id)), id);
    }

    #[test]
    fn test_missing_id_is_generated() {
        let id = normalize_request_id(None);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_free_text_is_replaced() {
        let id = normalize_request_id(Some("'; DROP TABLE plans; --"));
        assert_ne!(id, "'; DROP TABLE plans; --");
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_oversized_id_is_replaced() {
        let long = "a".repeat(MAX_REQUEST_ID_LEN + 1);
        let id = normalize_request_id(Some(&long));
        assert_ne!(id, long);
    }
}
