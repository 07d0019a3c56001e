//! Temporally ordered build timestamps.
//!
//! Producers record a `build_time` string in every bundle's metadata
//! sidecar. Version selection must compare these as instants, never as
//! strings: `"2024-2"`-style values order incorrectly under lexicographic
//! comparison. [`BuildStamp`] parses the accepted formats into a UTC
//! instant up front, so a malformed timestamp is rejected at discovery
//! instead of silently mis-ordering a commit.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{Error, Result};

/// Accepted `build_time` formats, tried in order.
const FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y%m%d%H%M%S"];

/// A parsed build timestamp with total temporal ordering.
///
/// Equality and ordering compare the parsed instant only; the original
/// string is retained for display and provenance.
#[derive(Debug, Clone)]
pub struct BuildStamp {
    instant: DateTime<Utc>,
    raw: String,
}

impl BuildStamp {
    /// Parses a `build_time` string.
    ///
    /// Accepts RFC 3339 (`2025-01-15T10:30:00Z`), `YYYY-MM-DD HH:MM:SS`,
    /// compact `YYYYMMDDHHMMSS`, and bare `YYYY-MM-DD` (midnight UTC).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBuildTime`] if no accepted format matches.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Self {
                instant: instant.with_timezone(&Utc),
                raw: raw.to_string(),
            });
        }
        for format in FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Ok(Self {
                    instant: naive.and_utc(),
                    raw: raw.to_string(),
                });
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Ok(Self {
                instant: date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc(),
                raw: raw.to_string(),
            });
        }
        Err(Error::InvalidBuildTime {
            value: raw.to_string(),
            message: "expected RFC 3339, YYYY-MM-DD HH:MM:SS, YYYYMMDDHHMMSS, or YYYY-MM-DD"
                .to_string(),
        })
    }

    /// Returns the current instant as a build stamp.
    #[must_use]
    pub fn now() -> Self {
        let instant = Utc::now();
        Self {
            raw: instant.to_rfc3339(),
            instant,
        }
    }

    /// Returns the parsed UTC instant.
    #[must_use]
    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    /// Returns the compact `YYYYMMDDHHMMSS` form used in trash names.
    #[must_use]
    pub fn compact(&self) -> String {
        self.instant.format("%Y%m%d%H%M%S").to_string()
    }

    /// Returns the original string as recorded by the producer.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for BuildStamp {
    fn eq(&self, other: &Self) -> bool {
        self.instant == other.instant
    }
}

impl Eq for BuildStamp {}

impl PartialOrd for BuildStamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BuildStamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.instant.cmp(&other.instant)
    }
}

impl std::fmt::Display for BuildStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepted_formats() {
        for raw in [
            "2025-01-15T10:30:00Z",
            "2025-01-15 10:30:00",
            "20250115103000",
            "2025-01-15",
        ] {
            let stamp = BuildStamp::parse(raw).unwrap();
            assert_eq!(stamp.compact()[..8].to_string(), "20250115");
        }
    }

    #[test]
    fn test_orders_temporally_across_formats() {
        let earlier = BuildStamp::parse("2024-02-01").unwrap();
        let later = BuildStamp::parse("2024-10-01T00:00:00Z").unwrap();
        // "2024-10-01…" < "2024-2…" lexicographically; temporal order wins.
        assert!(earlier < later);
    }

    #[test]
    fn test_equal_instants_compare_equal() {
        let a = BuildStamp::parse("2025-01-15 10:30:00").unwrap();
        let b = BuildStamp::parse("20250115103000").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_ambiguous_strings() {
        assert!(BuildStamp::parse("2024-2").is_err());
        assert!(BuildStamp::parse("latest").is_err());
        assert!(BuildStamp::parse("").is_err());
    }

    #[test]
    fn test_compact_form() {
        let stamp = BuildStamp::parse("2025-01-15T10:30:00Z").unwrap();
        assert_eq!(stamp.compact(), "20250115103000");
    }
}
