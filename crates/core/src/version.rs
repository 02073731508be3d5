//! Sortable model version identifiers.
//!
//! Format:
//! `<scheme>-YYYYMMDDTHHMMSS.mmmZ`
//!
//! Example:
//! `risk-v1-20260111T143522.045Z`
//!
//! The scheme token may itself contain hyphens; the timestamp never does, so parsing splits on
//! the last `-`. Versions order by timestamp first, which makes the newest training run the
//! greatest version regardless of how the filenames were listed.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid model version format: '{0}'")]
    Format(String),
    #[error("invalid model version timestamp '{value}': {reason}")]
    Timestamp { value: String, reason: String },
}

/// A scheme token plus creation timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelVersion {
    scheme: String,
    created_at: DateTime<Utc>,
}

impl ModelVersion {
    pub fn new(scheme: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        // Keep millisecond precision only, so a version survives a round trip through its string.
        let millis = created_at.timestamp_millis();
        let created_at = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(created_at);
        Self {
            scheme: scheme.into(),
            created_at,
        }
    }

    /// Mints a new version for `scheme` as of `now`.
    ///
    /// If `last` is at or after `now`, the new timestamp is one millisecond past it, so a fresh
    /// version always sorts after the newest one already published.
    pub fn generate(scheme: &str, now: DateTime<Utc>, last: Option<&ModelVersion>) -> Self {
        let candidate = Self::new(scheme, now);
        match last {
            Some(prev) if candidate.created_at <= prev.created_at => {
                Self::new(scheme, prev.created_at + Duration::milliseconds(1))
            }
            _ => candidate,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True if this version belongs to the scheme named by `prefix`. The whole scheme must
    /// match, so `risk-v1` does not select `risk-v10`.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.scheme == prefix
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.scheme,
            self.created_at.format(TIMESTAMP_FORMAT)
        )
    }
}

impl FromStr for ModelVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, ts_str) = s
            .rsplit_once('-')
            .filter(|(scheme, _)| !scheme.is_empty())
            .ok_or_else(|| VersionError::Format(s.to_string()))?;

        let ts_no_z = ts_str
            .strip_suffix('Z')
            .ok_or_else(|| VersionError::Timestamp {
                value: ts_str.to_string(),
                reason: "must end with 'Z'".into(),
            })?;

        let naive = NaiveDateTime::parse_from_str(ts_no_z, "%Y%m%dT%H%M%S%.3f").map_err(|e| {
            VersionError::Timestamp {
                value: ts_str.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self::new(
            scheme,
            DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc),
        ))
    }
}

impl Ord for ModelVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.scheme.cmp(&other.scheme))
    }
}

impl PartialOrd for ModelVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for ModelVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModelVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_display_and_parse_round_trip() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 11, 14, 35, 22).unwrap() + Duration::milliseconds(45);
        let version = ModelVersion::new("risk-v1", ts);

        assert_eq!(version.to_string(), "risk-v1-20260111T143522.045Z");
        let parsed: ModelVersion = "risk-v1-20260111T143522.045Z".parse().unwrap();
        assert_eq!(parsed, version);
        assert_eq!(parsed.scheme(), "risk-v1");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            "nohyphen".parse::<ModelVersion>(),
            Err(VersionError::Format(_))
        ));
        assert!(matches!(
            "risk-v1-20260111T143522.045".parse::<ModelVersion>(),
            Err(VersionError::Timestamp { .. })
        ));
        assert!(matches!(
            "risk-v1-notatimestampZ".parse::<ModelVersion>(),
            Err(VersionError::Timestamp { .. })
        ));
    }

    #[test]
    fn test_ordering_follows_timestamp() {
        let older: ModelVersion = "risk-v1-20250101T000000.000Z".parse().unwrap();
        let newer: ModelVersion = "risk-v1-20260101T000000.000Z".parse().unwrap();
        assert!(newer > older);
    }

    #[test]
    fn test_generate_is_strictly_after_last() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let last = ModelVersion::new("risk-v1", now + Duration::seconds(5));

        let next = ModelVersion::generate("risk-v1", now, Some(&last));
        assert!(next > last);
        assert_eq!(next.created_at(), last.created_at() + Duration::milliseconds(1));

        let fresh = ModelVersion::generate("risk-v1", now, None);
        assert_eq!(fresh.created_at(), now);
    }

    #[test]
    fn test_matches_prefix_needs_whole_scheme() {
        let version: ModelVersion = "risk-v10-20260111T143522.045Z".parse().unwrap();
        assert!(version.matches_prefix("risk-v10"));
        assert!(!version.matches_prefix("risk-v1"));
        assert!(!version.matches_prefix("risk"));
    }

    #[test]
    fn test_serde_as_string() {
        let version: ModelVersion = "risk-v1-20260111T143522.045Z".parse().unwrap();
        let json = serde_json::to_string(&version).unwrap();
        assert_eq!(json, "\"risk-v1-20260111T143522.045Z\"");
        let back: ModelVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, version);
    }
}
