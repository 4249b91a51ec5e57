//! Shared utility functions used across multiple modules.

use uuid::Uuid;

/// Prefix that marks an id as locally generated and not yet confirmed by the server.
pub const TEMP_ID_PREFIX: &str = "temp_";

/// Trimmed text, or `None` when nothing but whitespace is left.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Whether `value` uses an `http` or `https` scheme.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// First 180 characters of a trimmed response body, for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current Unix timestamp in milliseconds.
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a temporary entity id, e.g. `temp_1718000000000_3f2a9c1b`.
///
/// The timestamp keeps ids roughly time-ordered; the random suffix keeps two
/// ids generated in the same millisecond apart.
pub fn temporary_id() -> String {
    let suffix = Uuid::now_v7().simple().to_string();
    let suffix = &suffix[suffix.len() - 8..];
    format!("{TEMP_ID_PREFIX}{}_{suffix}", unix_millis_now())
}

/// Whether `id` was produced by [`temporary_id`].
pub fn is_temporary_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_normalizes_to_none() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some(" \t\n".to_string())), None);
        assert_eq!(
            normalize_text_option(Some("  Town hall  ".to_string())).as_deref(),
            Some("Town hall")
        );
    }

    #[test]
    fn only_http_schemes_count_as_urls() {
        assert!(is_http_url("https://api.fieldsync.test/v1"));
        assert!(!is_http_url("wss://api.fieldsync.test"));
        assert!(!is_http_url("api.fieldsync.test"));
    }

    #[test]
    fn compact_text_caps_long_bodies() {
        let body = format!("  {}  ", "x".repeat(500));
        assert_eq!(compact_text(&body).len(), 180);
    }

    #[test]
    fn temporary_ids_are_recognizable_and_unique() {
        let first = temporary_id();
        let second = temporary_id();
        assert!(is_temporary_id(&first));
        assert!(is_temporary_id(&second));
        assert_ne!(first, second);
        assert!(!is_temporary_id("01890a5d-ac96-774b-bcce-b302099a8057"));
    }
}
