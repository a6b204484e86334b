//! Wall-clock timestamps shared by stored payloads and webhook events.

use time::OffsetDateTime;

/// Current UTC time formatted as RFC 3339.
pub fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
