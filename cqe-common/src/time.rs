//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Render a timestamp in the canonical RFC 3339 form stored in the database
pub fn to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Parse a timestamp from its stored form
pub fn from_db(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
