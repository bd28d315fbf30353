//! Loosely-typed request bodies and their validation into the model types.
//!
//! Every field is optional on the wire so a missing value is reported with
//! its path instead of a generic decode failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::{
    format_description::well_known::{Iso8601, Rfc3339},
    macros::format_description,
    OffsetDateTime, PrimitiveDateTime,
};

use crate::{AccelerometerReading, AgentReading, GpsReading, ProcessedReading, RoadState};

#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    Missing,
    InvalidTimestamp(String),
    UnknownRoadState(String),
    Malformed(String),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Missing => f.write_str("field required"),
            Violation::InvalidTimestamp(v) => write!(
                f,
                "invalid timestamp {v:?}, expected ISO 8601 (YYYY-MM-DDTHH:MM:SSZ)"
            ),
            Violation::UnknownRoadState(v) => write!(
                f,
                "unknown road state {v:?}, expected one of good, okay, bad, incorrectly entered data"
            ),
            Violation::Malformed(why) => write!(f, "malformed body: {why}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{field}: {violation}")]
pub struct ValidationError {
    pub field: String,
    pub violation: Violation,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, violation: Violation) -> Self {
        Self { field: field.into(), violation }
    }

    pub fn malformed(why: impl Into<String>) -> Self {
        Self::new("body", Violation::Malformed(why.into()))
    }

    fn within(mut self, prefix: &str) -> Self {
        self.field = format!("{prefix}.{}", self.field);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccelerometerPayload {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GpsPayload {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentReadingPayload {
    pub accelerometer: Option<AccelerometerPayload>,
    pub gps: Option<GpsPayload>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessedReadingPayload {
    pub road_state: Option<String>,
    pub agent_data: Option<AgentReadingPayload>,
}

fn required<T>(v: Option<T>, field: &str) -> Result<T, ValidationError> {
    v.ok_or_else(|| ValidationError::new(field, Violation::Missing))
}

impl AccelerometerPayload {
    pub fn validate(self) -> Result<AccelerometerReading, ValidationError> {
        Ok(AccelerometerReading {
            x: required(self.x, "x")?,
            y: required(self.y, "y")?,
            z: required(self.z, "z")?,
        })
    }
}

impl GpsPayload {
    pub fn validate(self) -> Result<GpsReading, ValidationError> {
        Ok(GpsReading {
            latitude: required(self.latitude, "latitude")?,
            longitude: required(self.longitude, "longitude")?,
        })
    }
}

impl AgentReadingPayload {
    pub fn validate(self) -> Result<AgentReading, ValidationError> {
        let accelerometer = required(self.accelerometer, "accelerometer")?
            .validate()
            .map_err(|e| e.within("accelerometer"))?;
        let gps = required(self.gps, "gps")?
            .validate()
            .map_err(|e| e.within("gps"))?;
        let raw = required(self.timestamp, "timestamp")?;
        let timestamp = parse_timestamp(&raw)
            .ok_or_else(|| ValidationError::new("timestamp", Violation::InvalidTimestamp(raw)))?;
        Ok(AgentReading { accelerometer, gps, timestamp })
    }
}

impl ProcessedReadingPayload {
    pub fn validate(self) -> Result<ProcessedReading, ValidationError> {
        let raw = required(self.road_state, "road_state")?;
        let road_state: RoadState = raw
            .parse()
            .map_err(|_| ValidationError::new("road_state", Violation::UnknownRoadState(raw)))?;
        let agent_data = required(self.agent_data, "agent_data")?
            .validate()
            .map_err(|e| e.within("agent_data"))?;
        Ok(ProcessedReading { road_state, agent_data })
    }
}

/// Validates a whole batch; the first bad item fails all of them.
pub fn validate_batch(
    items: Vec<ProcessedReadingPayload>,
) -> Result<Vec<ProcessedReading>, ValidationError> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| item.validate().map_err(|e| e.within(&format!("[{i}]"))))
        .collect()
}

/// Accepts RFC 3339 and ISO 8601 date-times. Values without an offset are taken as UTC.
///
/// Only instants that [`format_timestamp`] can render back are accepted, so
/// expanded years (negative or past 9999) are refused.
pub fn parse_timestamp(s: &str) -> Option<OffsetDateTime> {
    parse_any(s.trim()).filter(|t| format_timestamp(t).is_ok())
}

fn parse_any(s: &str) -> Option<OffsetDateTime> {
    if let Ok(t) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(t);
    }
    if let Ok(t) = OffsetDateTime::parse(s, &Iso8601::DEFAULT) {
        return Some(t);
    }
    if let Ok(t) = PrimitiveDateTime::parse(s, &Iso8601::DEFAULT) {
        return Some(t.assume_utc());
    }
    let spaced = format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    PrimitiveDateTime::parse(s, spaced).ok().map(PrimitiveDateTime::assume_utc)
}

pub fn format_timestamp(t: &OffsetDateTime) -> Result<String, time::error::Format> {
    t.format(&Rfc3339)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn payload(v: serde_json::Value) -> ProcessedReadingPayload {
        serde_json::from_value(v).unwrap()
    }

    fn good_json() -> serde_json::Value {
        json!({
            "road_state": "good",
            "agent_data": {
                "accelerometer": {"x": 1.0, "y": 2.0, "z": 3.0},
                "gps": {"latitude": 50.45, "longitude": 30.52},
                "timestamp": "2024-03-01T10:00:00Z"
            }
        })
    }

    #[test]
    fn valid_payload_becomes_processed_reading() {
        let p = payload(good_json()).validate().unwrap();
        assert_eq!(p.road_state, RoadState::Good);
        assert_eq!(p.agent_data.gps.longitude, 30.52);
        assert_eq!(p.agent_data.timestamp, datetime!(2024-03-01 10:00:00 UTC));
    }

    #[test]
    fn missing_nested_field_reports_path() {
        let mut v = good_json();
        v["agent_data"]["gps"].as_object_mut().unwrap().remove("latitude");
        let err = payload(v).validate().unwrap_err();
        assert_eq!(err.field, "agent_data.gps.latitude");
        assert_eq!(err.violation, Violation::Missing);
    }

    #[test]
    fn bad_timestamp_is_a_validation_error() {
        let mut v = good_json();
        v["agent_data"]["timestamp"] = json!("yesterday at noon");
        let err = payload(v).validate().unwrap_err();
        assert_eq!(err.field, "agent_data.timestamp");
        assert!(matches!(err.violation, Violation::InvalidTimestamp(_)));
    }

    #[test]
    fn unrenderable_year_is_a_validation_error() {
        let mut v = good_json();
        v["agent_data"]["timestamp"] = json!("-000001-01-01T00:00:00Z");
        let err = payload(v).validate().unwrap_err();
        assert_eq!(err.field, "agent_data.timestamp");
        assert!(matches!(err.violation, Violation::InvalidTimestamp(_)));
    }

    #[test]
    fn unknown_road_state_is_rejected() {
        let mut v = good_json();
        v["road_state"] = json!("excellent");
        let err = payload(v).validate().unwrap_err();
        assert_eq!(err.field, "road_state");
    }

    #[test]
    fn batch_error_carries_item_index() {
        let mut bad = good_json();
        bad["agent_data"]["timestamp"] = json!("not-a-date");
        let items = vec![payload(good_json()), payload(bad)];
        let err = validate_batch(items).unwrap_err();
        assert_eq!(err.field, "[1].agent_data.timestamp");
    }

    #[test]
    fn timestamp_forms() {
        assert_eq!(
            parse_timestamp("2024-03-01T10:00:00+02:00"),
            Some(datetime!(2024-03-01 10:00:00 +2))
        );
        assert_eq!(
            parse_timestamp("2024-03-01T10:00:00"),
            Some(datetime!(2024-03-01 10:00:00 UTC))
        );
        assert_eq!(
            parse_timestamp("2024-03-01 10:00:00.5"),
            Some(datetime!(2024-03-01 10:00:00.5 UTC))
        );
        assert_eq!(parse_timestamp("01/03/2024"), None);
        assert_eq!(parse_timestamp("-000001-01-01T00:00:00Z"), None);
        assert_eq!(parse_timestamp("+010000-01-01T00:00:00Z"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
