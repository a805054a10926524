//! Normalization of raw producer payloads into typed records.
//!
//! Every default is applied here so nothing downstream ever sees a
//! partially-populated payload.

use std::collections::BTreeMap;

use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{Result, StoreError};
use crate::types::{
    AlertRecord, RawAlert, RawTimestamp, DEFAULT_KIND, DEFAULT_LEVEL, DEFAULT_TITLE,
    UNKNOWN_REGION,
};

/// Maximum accepted length of a record identity.
pub const MAX_ID_LENGTH: usize = 128;

/// Length of a derived identity in hex characters.
const DERIVED_ID_LENGTH: usize = 40;

/// Label hashed into a derived identity when neither title nor kind is set.
const FALLBACK_LABEL: &str = "alert";

/// Region slugs may hold any printable text, accents and punctuation included.
static REGION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\P{Cc}+$").unwrap_or_else(|_| unreachable!()));

/// Valid record identities.
static ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").unwrap_or_else(|_| unreachable!())
});

/// Normalizes a region name into its slug form.
///
/// Trims, lower-cases and joins inner whitespace with `-`. Returns `None`
/// when nothing is left.
#[must_use]
pub fn region_slug(region: &str) -> Option<String> {
    let slug = region
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

/// Returns true if `slug` can be used as an index key component.
///
/// Only empty slugs and control characters are refused.
#[must_use]
pub fn is_valid_region(slug: &str) -> bool {
    REGION_REGEX.is_match(slug)
}

/// Derives a deterministic identity for a payload without one.
///
/// The same region, origination date and label always produce the same id,
/// so re-ingesting one logical event converges on a single index entry.
#[must_use]
pub fn derive_id(region: &str, date: &str, label: &str) -> String {
    let digest = Sha256::digest(format!("{region}|{date}|{label}").as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(DERIVED_ID_LENGTH);
    id
}

/// Normalizes a raw payload into a record.
///
/// `now` is the ingestion time in seconds and fills in a missing timestamp.
/// Identity derivation falls back to the timestamp when no origination date
/// is given.
///
/// # Errors
///
/// Returns [`StoreError::Validation`] if the timestamp is negative or
/// unparseable, or the region or id contain characters that cannot appear in
/// a storage key.
pub fn normalize(raw: RawAlert, now: i64) -> Result<AlertRecord> {
    let region = raw
        .region
        .as_deref()
        .and_then(region_slug)
        .unwrap_or_else(|| UNKNOWN_REGION.to_string());
    if !is_valid_region(&region) {
        return Err(StoreError::validation(format!("invalid region slug: {region:?}")));
    }

    let timestamp = match raw.timestamp {
        Some(ts) => parse_timestamp(&ts)?,
        None => now,
    };

    let date = non_blank(raw.date);
    let title = non_blank(raw.title);
    let kind = non_blank(raw.kind);

    let id = match non_blank(raw.id) {
        Some(id) => {
            if id.len() > MAX_ID_LENGTH {
                return Err(StoreError::validation(format!(
                    "id exceeds {MAX_ID_LENGTH} characters"
                )));
            }
            if !ID_REGEX.is_match(&id) {
                return Err(StoreError::validation(format!("invalid id: {id}")));
            }
            id
        }
        None => {
            let day = date.clone().unwrap_or_else(|| timestamp.to_string());
            let label = title.as_deref().or(kind.as_deref()).unwrap_or(FALLBACK_LABEL);
            derive_id(&region, &day, label)
        }
    };

    let mut metrics = raw.metrics.map(numeric_metrics).unwrap_or_default();
    for (key, value) in [("lat", raw.lat), ("lon", raw.lon)] {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            metrics.insert(key.to_string(), v);
        }
    }

    Ok(AlertRecord {
        id,
        region,
        timestamp,
        date,
        level: non_blank(raw.level).unwrap_or_else(|| DEFAULT_LEVEL.to_string()),
        kind: kind.unwrap_or_else(|| DEFAULT_KIND.to_string()),
        title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        message: raw.message.unwrap_or_default(),
        metrics,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_timestamp(ts: &RawTimestamp) -> Result<i64> {
    let secs = match ts {
        RawTimestamp::Seconds(secs) => *secs,
        RawTimestamp::Fractional(secs) => fractional_secs(*secs)?,
        RawTimestamp::Text(text) => {
            let text = text.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                dt.timestamp()
            } else if let Ok(secs) = text.parse::<i64>() {
                secs
            } else if let Ok(secs) = text.parse::<f64>() {
                fractional_secs(secs)?
            } else {
                return Err(StoreError::validation(format!("unparseable timestamp: {text}")));
            }
        }
    };
    if secs < 0 {
        return Err(StoreError::validation(format!("negative timestamp: {secs}")));
    }
    Ok(secs)
}

fn fractional_secs(secs: f64) -> Result<i64> {
    if !secs.is_finite() || secs >= i64::MAX as f64 {
        return Err(StoreError::validation("timestamp out of range"));
    }
    Ok(secs.floor() as i64)
}

fn numeric_metrics(raw: BTreeMap<String, serde_json::Value>) -> BTreeMap<String, f64> {
    raw.into_iter()
        .filter_map(|(key, value)| {
            value
                .as_f64()
                .filter(|v| v.is_finite())
                .map(|v| (key, v))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    const NOW: i64 = 1_754_041_200; // 2025-08-01T09:40:00Z

    #[test_case(Some("Lazio"), "lazio" ; "capitalized")]
    #[test_case(Some("  veneto \n"), "veneto" ; "padded")]
    #[test_case(Some("Emilia Romagna"), "emilia-romagna" ; "inner space")]
    #[test_case(Some("Valle d'Aosta"), "valle-d'aosta" ; "apostrophe")]
    #[test_case(Some("Sicília"), "sicília" ; "accented")]
    #[test_case(Some("FRIULI-Venezia Giulia"), "friuli-venezia-giulia" ; "mixed separators")]
    #[test_case(Some("   "), "unknown" ; "blank")]
    #[test_case(None, "unknown" ; "missing")]
    fn region_is_normalized(region: Option<&str>, expected: &str) {
        let raw = RawAlert {
            region: region.map(str::to_string),
            ..RawAlert::default()
        };
        let record = normalize(raw, NOW).unwrap();
        assert_eq!(record.region, expected);
    }

    #[test]
    fn defaults_are_applied() {
        let record = normalize(RawAlert::for_region("lazio"), NOW).unwrap();
        assert_eq!(record.level, "info");
        assert_eq!(record.kind, "generic");
        assert_eq!(record.title, "Alert");
        assert_eq!(record.message, "");
        assert!(record.metrics.is_empty());
        assert_eq!(record.timestamp, NOW);
        assert_eq!(record.id.len(), DERIVED_ID_LENGTH);
    }

    #[test]
    fn supplied_id_is_kept() {
        let raw = RawAlert::for_region("lazio").with_id("  abc123  ");
        assert_eq!(normalize(raw, NOW).unwrap().id, "abc123");
    }

    #[test]
    fn undated_events_at_different_times_stay_distinct() {
        let a = RawAlert::for_region("lazio").with_timestamp(NOW);
        let b = RawAlert::for_region("lazio").with_timestamp(NOW - 10);
        assert_ne!(normalize(a, NOW).unwrap().id, normalize(b, NOW).unwrap().id);

        let again = RawAlert::for_region("lazio").with_timestamp(NOW);
        assert_eq!(
            normalize(again, NOW + 60).unwrap().id,
            derive_id("lazio", &NOW.to_string(), "alert")
        );
    }

    #[test]
    fn derived_id_is_stable() {
        let a = RawAlert::for_region("Lazio").with_kind("heat").with_date("2025-08-01");
        let b = RawAlert::for_region("lazio ").with_kind("heat").with_date("2025-08-01");
        assert_eq!(normalize(a, NOW).unwrap().id, normalize(b, NOW + 500).unwrap().id);
    }

    #[test]
    fn derived_id_prefers_title_over_kind() {
        let day = "2025-08-01";
        let with_title = RawAlert::for_region("lazio")
            .with_date(day)
            .with_kind("heat")
            .with_title("Caldo");
        assert_eq!(normalize(with_title, NOW).unwrap().id, derive_id("lazio", day, "Caldo"));

        let kind_only = RawAlert::for_region("lazio").with_date(day).with_kind("heat");
        assert_eq!(normalize(kind_only, NOW).unwrap().id, derive_id("lazio", day, "heat"));

        let bare = RawAlert::for_region("lazio").with_date(day);
        assert_eq!(normalize(bare, NOW).unwrap().id, derive_id("lazio", day, "alert"));
    }

    #[test]
    fn derived_id_uses_origination_date() {
        let day1 = RawAlert::for_region("lazio").with_kind("rain").with_date("2025-08-01");
        let day2 = RawAlert::for_region("lazio").with_kind("rain").with_date("2025-08-02");
        assert_ne!(normalize(day1, NOW).unwrap().id, normalize(day2, NOW).unwrap().id);
    }

    #[test]
    fn text_timestamps_are_parsed() {
        let raw = RawAlert {
            timestamp: Some(RawTimestamp::Text("2025-08-01T09:40:00Z".to_string())),
            ..RawAlert::default()
        };
        assert_eq!(normalize(raw, 0).unwrap().timestamp, NOW);

        let raw = RawAlert {
            timestamp: Some(RawTimestamp::Text("1700000000.9".to_string())),
            ..RawAlert::default()
        };
        assert_eq!(normalize(raw, 0).unwrap().timestamp, 1_700_000_000);
    }

    #[test_case(RawTimestamp::Seconds(-1) ; "negative")]
    #[test_case(RawTimestamp::Fractional(f64::NAN) ; "nan")]
    #[test_case(RawTimestamp::Text("yesterday".to_string()) ; "text")]
    fn bad_timestamps_are_rejected(ts: RawTimestamp) {
        let raw = RawAlert {
            timestamp: Some(ts),
            ..RawAlert::default()
        };
        assert!(matches!(normalize(raw, NOW), Err(StoreError::Validation { .. })));
    }

    #[test_case("lazio", true ; "plain")]
    #[test_case("valle-d'aosta", true ; "apostrophe")]
    #[test_case("sicília", true ; "accented")]
    #[test_case("la\u{0}zio", false ; "nul")]
    #[test_case("", false ; "empty")]
    fn region_validity(slug: &str, valid: bool) {
        assert_eq!(is_valid_region(slug), valid);
    }

    #[test]
    fn bad_keys_are_rejected() {
        assert!(normalize(RawAlert::for_region("la\u{7}zio"), NOW).is_err());
        assert!(normalize(RawAlert::for_region("lazio").with_id("a b"), NOW).is_err());
        let long = "a".repeat(MAX_ID_LENGTH + 1);
        assert!(normalize(RawAlert::for_region("lazio").with_id(long), NOW).is_err());
    }

    #[test]
    fn only_finite_numeric_metrics_survive() {
        let raw = RawAlert::for_region("lazio")
            .with_metric("uv", 9)
            .with_metric("tmax", 38.5)
            .with_metric("sunrise", "06:12")
            .with_metric("wind_dir", json!(null));
        let record = normalize(raw, NOW).unwrap();
        assert_eq!(record.metrics.len(), 2);
        assert_eq!(record.metrics["uv"], 9.0);
        assert_eq!(record.metrics["tmax"], 38.5);
    }

    #[test]
    fn coordinates_become_metrics() {
        let raw = RawAlert {
            lat: Some(41.893),
            lon: Some(12.483),
            ..RawAlert::for_region("lazio")
        };
        let record = normalize(raw, NOW).unwrap();
        assert_eq!(record.metrics["lat"], 41.893);
        assert_eq!(record.metrics["lon"], 12.483);
    }

    #[test]
    fn blank_text_fields_fall_back_to_defaults() {
        let raw = RawAlert::for_region("lazio").with_level("  ").with_title("");
        let record = normalize(raw, NOW).unwrap();
        assert_eq!(record.level, "info");
        assert_eq!(record.title, "Alert");
    }
}
