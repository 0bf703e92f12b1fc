//! Helpers for keeping secrets out of logs.

use std::fmt::{Debug, Formatter};

/// Debug wrapper for account keys and SAS signatures.
///
/// Secrets shorter than 12 characters print as `***`, longer ones keep
/// three characters on each side. An empty secret prints `EMPTY`.
pub struct Redact<'a>(&'a str);

impl<'a> From<&'a str> for Redact<'a> {
    fn from(value: &'a str) -> Self {
        Redact(value)
    }
}

impl Debug for Redact<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let total = self.0.chars().count();
        match total {
            0 => f.write_str("EMPTY"),
            1..=11 => f.write_str("***"),
            _ => {
                let head: String = self.0.chars().take(3).collect();
                let tail: String = self.0.chars().skip(total - 3).collect();
                write!(f, "{head}***{tail}")
            }
        }
    }
}
