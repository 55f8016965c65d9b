//! The canonical sensor reading.
//!
//! A [`Reading`] is one telemetry sample from a fire/smoke sensor. The
//! canonical fields are typed; every other key the producer sent is kept in
//! [`Reading::extensions`] and flattened back to the top level when the
//! reading is serialized, so subscribers see exactly what was stored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys with a typed slot on [`Reading`]. Anything else is an extension.
pub const CANONICAL_FIELDS: [&str; 8] = [
    "temperature",
    "humidity",
    "smoke_level",
    "fire_detected",
    "flame_detected",
    "latitude",
    "longitude",
    "timestamp",
];

/// One telemetry sample, canonical fields plus open extensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Raw smoke sensor value, nominally 0-1023.
    pub smoke_level: i64,
    /// Whether the producer's own logic decided there is a fire.
    pub fire_detected: bool,
    /// Whether the flame sensor tripped.
    #[serde(default)]
    pub flame_detected: bool,
    /// Latitude of the sensor.
    #[serde(default)]
    pub latitude: f64,
    /// Longitude of the sensor.
    #[serde(default)]
    pub longitude: f64,
    /// Producer-supplied timestamp, kept verbatim, or `YYYY-MM-DD HH:MM:SS`
    /// assigned at ingestion. Empty only before ingestion stamps it.
    #[serde(default)]
    pub timestamp: String,
    /// Every non-canonical key from the inbound message, untouched.
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl Reading {
    /// Whether a timestamp has been supplied or assigned.
    pub fn has_timestamp(&self) -> bool {
        !self.timestamp.is_empty()
    }
}
