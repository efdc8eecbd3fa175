//! Inbound reader message decoding.
//!
//! Readers publish JSON payloads shaped like
//! `{"zone_id": 1, "tag_id": "E200...", "timestamp": "2025-10-07T10:30:00"}`.
//! Older firmware still sends `aula_id` and `epc`, which are accepted as
//! aliases. Timestamps without an offset are interpreted in the configured
//! local timezone.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::reading::Reading;
use crate::types::{DbId, Timestamp};

/// Formats tried (after RFC 3339) for timestamps carrying an offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

/// Formats tried for offset-naive timestamps.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Why an inbound message was rejected.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload must be a JSON object")]
    NotAnObject,

    #[error("Required field '{0}' is missing or empty")]
    MissingField(&'static str),

    #[error("Invalid zone id '{0}'")]
    InvalidZoneId(String),

    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),
}

/// Zone ids arrive as JSON numbers from current firmware and as numeric
/// strings from older readers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZoneIdField {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawReading {
    #[serde(default, alias = "aula_id")]
    zone_id: Option<ZoneIdField>,
    #[serde(default, alias = "epc")]
    tag_id: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Decode a raw payload into a validated [`Reading`].
pub fn decode_reading(payload: &[u8], local_tz: Tz) -> Result<Reading, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    let value: serde_json::Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    let raw: RawReading = serde_json::from_value(value)?;

    let zone_id = parse_zone_id(raw.zone_id)?;

    let tag_id = raw
        .tag_id
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(DecodeError::MissingField("tag_id"))?
        .to_string();

    let timestamp = raw
        .timestamp
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(DecodeError::MissingField("timestamp"))?;

    let captured_at = parse_timestamp(timestamp, local_tz)?;

    Ok(Reading {
        tag_id,
        zone_id,
        captured_at,
    })
}

fn parse_zone_id(field: Option<ZoneIdField>) -> Result<DbId, DecodeError> {
    let id = match field {
        None => return Err(DecodeError::MissingField("zone_id")),
        Some(ZoneIdField::Number(n)) => n,
        Some(ZoneIdField::Text(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Err(DecodeError::MissingField("zone_id"));
            }
            s.parse::<DbId>()
                .map_err(|_| DecodeError::InvalidZoneId(s.to_string()))?
        }
    };
    if id <= 0 {
        return Err(DecodeError::InvalidZoneId(id.to_string()));
    }
    Ok(id)
}

/// Parse an ISO-8601 timestamp into UTC.
///
/// Offset-naive values are localized to `local_tz`. During a DST fold the
/// earlier instant is used; wall-clock times skipped by a DST gap are
/// rejected.
pub fn parse_timestamp(raw: &str, local_tz: Tz) -> Result<Timestamp, DecodeError> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return local_tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| DecodeError::InvalidTimestamp(raw.to_string()));
        }
    }

    Err(DecodeError::InvalidTimestamp(raw.to_string()))
}
