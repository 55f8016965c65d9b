//! Fire alert projection of the latest reading.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::reading::Reading;

/// Message returned when no reading has been received yet.
pub const NO_SENSOR_DATA_MESSAGE: &str = "No sensor data available";

/// Message returned when the latest reading reports no fire.
pub const NO_FIRE_MESSAGE: &str = "No fire detected";

/// The subset of a reading shown when a fire is detected.
///
/// Copied verbatim from the reading; extensions and `flame_detected` are
/// left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AlertView {
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Raw smoke sensor value.
    pub smoke_level: i64,
    /// Latitude of the sensor.
    pub latitude: f64,
    /// Longitude of the sensor.
    pub longitude: f64,
    /// Timestamp of the reading.
    pub timestamp: String,
}

impl From<&Reading> for AlertView {
    fn from(reading: &Reading) -> Self {
        Self {
            temperature: reading.temperature,
            humidity: reading.humidity,
            smoke_level: reading.smoke_level,
            latitude: reading.latitude,
            longitude: reading.longitude,
            timestamp: reading.timestamp.clone(),
        }
    }
}

/// Result of deriving the fire alert from the history.
#[derive(Debug, Clone, PartialEq)]
pub enum FireAlert {
    /// The history is empty.
    NoData,
    /// The latest reading does not report a fire.
    NoFire,
    /// The latest reading reports a fire.
    Alert(AlertView),
}

impl FireAlert {
    /// Human-readable status for the non-alert outcomes.
    pub const fn message(&self) -> Option<&'static str> {
        match self {
            Self::NoData => Some(NO_SENSOR_DATA_MESSAGE),
            Self::NoFire => Some(NO_FIRE_MESSAGE),
            Self::Alert(_) => None,
        }
    }

    /// Whether a fire is currently reported.
    pub const fn is_alert(&self) -> bool {
        matches!(self, Self::Alert(_))
    }
}
