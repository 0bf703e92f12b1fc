//! Time related utils.

use crate::{Error, Result};
use chrono::Utc;

/// DateTime is the alias for chrono::DateTime<Utc>.
pub type DateTime = chrono::DateTime<Utc>;

/// Create a new DateTime with current time.
pub fn now() -> DateTime {
    Utc::now()
}

/// Format time into date: `2022-03-13`
pub fn format_date(t: DateTime) -> String {
    t.format("%Y-%m-%d").to_string()
}

/// Format time into RFC 1123 http date: `Sun, 13 Mar 2022 07:20:04 GMT`
pub fn format_http_date(t: DateTime) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse RFC 3339 string into DateTime.
pub fn parse_rfc3339(s: &str) -> Result<DateTime> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|v| v.with_timezone(&Utc))
        .map_err(|e| Error::unexpected(format!("invalid rfc3339 time: {s}")).with_source(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_time() -> DateTime {
        parse_rfc3339("2022-03-01T08:12:34Z").unwrap()
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(test_time()), "2022-03-01");
    }

    #[test]
    fn test_format_http_date() {
        assert_eq!(
            format_http_date(test_time()),
            "Tue, 01 Mar 2022 08:12:34 GMT"
        );
    }
}
