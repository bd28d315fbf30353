use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use time::OffsetDateTime;

mod payload;

pub use payload::*;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct AccelerometerReading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct GpsReading {
    pub latitude: f64,
    pub longitude: f64,
}

/// Distance to the road surface plus the point where it was measured.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct GroundClearanceReading {
    pub length: f64,
    pub gps: GpsReading,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct AgentReading {
    pub accelerometer: AccelerometerReading,
    pub gps: GpsReading,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// One combined row produced by the telemetry source.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct AggregatedReading {
    pub accelerometer: AccelerometerReading,
    pub gps: GpsReading,
    #[serde(alias = "parking")]
    pub ground_clearance: GroundClearanceReading,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub user_id: u32,
}

/// What the classifier consumes. Unknown fields (e.g. `user_id`) are ignored.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct InputReading {
    pub accelerometer: AccelerometerReading,
    pub gps: GpsReading,
    #[serde(alias = "parking")]
    pub ground_clearance: GroundClearanceReading,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl From<AggregatedReading> for InputReading {
    fn from(a: AggregatedReading) -> Self {
        Self {
            accelerometer: a.accelerometer,
            gps: a.gps,
            ground_clearance: a.ground_clearance,
            timestamp: a.timestamp,
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum RoadState {
    #[serde(rename = "good")]
    Good,
    #[serde(rename = "okay")]
    Okay,
    #[serde(rename = "bad")]
    Bad,
    #[serde(rename = "incorrectly entered data")]
    IncorrectlyEnteredData,
}

impl RoadState {
    pub const ALL: [RoadState; 4] = [
        RoadState::Good,
        RoadState::Okay,
        RoadState::Bad,
        RoadState::IncorrectlyEnteredData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoadState::Good => "good",
            RoadState::Okay => "okay",
            RoadState::Bad => "bad",
            RoadState::IncorrectlyEnteredData => "incorrectly entered data",
        }
    }
}

impl fmt::Display for RoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoadState {
    type Err = UnknownRoadState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoadState::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| UnknownRoadState(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown road state {0:?}")]
pub struct UnknownRoadState(pub String);

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ProcessedReading {
    pub road_state: RoadState,
    pub agent_data: AgentReading,
}

/// Flattened, persisted form of a [`ProcessedReading`].
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct StoredRecord {
    pub id: i64,
    pub road_state: RoadState,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl StoredRecord {
    pub fn new(id: i64, p: &ProcessedReading) -> Self {
        let a = &p.agent_data;
        Self {
            id,
            road_state: p.road_state,
            x: a.accelerometer.x,
            y: a.accelerometer.y,
            z: a.accelerometer.z,
            latitude: a.gps.latitude,
            longitude: a.gps.longitude,
            timestamp: a.timestamp,
        }
    }

    /// Rebuilds the nested shape, dropping the id.
    pub fn to_processed(&self) -> ProcessedReading {
        ProcessedReading {
            road_state: self.road_state,
            agent_data: AgentReading {
                accelerometer: AccelerometerReading { x: self.x, y: self.y, z: self.z },
                gps: GpsReading { latitude: self.latitude, longitude: self.longitude },
                timestamp: self.timestamp,
            },
        }
    }
}
