use crate::{codec, error::DecodeError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Sensor name given to readings produced by the bridge itself.
pub const BRIDGE_SENSOR: &str = "bridge";

/// Message type carrying the barometer coefficients.
pub const PRESSURE_MT: &str = "pressure";

/// One decoded telemetry event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorReading {
    pub(crate) uuid: Uuid,
    #[serde(with = "timestamp_format")]
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) bridge_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) sensor: Option<String>,
    pub(crate) mt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) battery: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) signal_rssi: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) temperature_c: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) humidity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) wind_kmh: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) wind_direction: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) rainfall_mm: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) pressure_pa: Option<i64>,
}

impl SensorReading {
    /// An empty reading with a fresh identity, stamped now.
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            timestamp: Utc::now(),
            bridge_id: String::new(),
            sensor: None,
            mt: String::new(),
            battery: None,
            signal_rssi: None,
            temperature_c: None,
            humidity: None,
            wind_kmh: None,
            wind_direction: None,
            rainfall_mm: None,
            pressure_pa: None,
        }
    }

    /// Decode a bridge upload body into a new reading.
    pub fn from_payload(payload: &str) -> Result<Self, DecodeError> {
        codec::decode(payload)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        codec::encode(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        codec::parse(json)
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn bridge_id(&self) -> &str {
        &self.bridge_id
    }

    pub fn sensor(&self) -> Option<&str> {
        self.sensor.as_deref()
    }

    /// Message type, e.g. `"5N1x31"` or `"pressure"`.
    pub fn mt(&self) -> &str {
        &self.mt
    }

    pub fn battery(&self) -> Option<&str> {
        self.battery.as_deref()
    }

    /// Signal quality in percent (0 to 100).
    pub fn signal_rssi(&self) -> Option<i64> {
        self.signal_rssi
    }

    pub fn temperature_c(&self) -> Option<f32> {
        self.temperature_c
    }

    pub fn humidity(&self) -> Option<f32> {
        self.humidity
    }

    pub fn wind_kmh(&self) -> Option<f32> {
        self.wind_kmh
    }

    /// Wind bearing in degrees, 0 being north.
    pub fn wind_direction(&self) -> Option<f32> {
        self.wind_direction
    }

    pub fn rainfall_mm(&self) -> Option<f32> {
        self.rainfall_mm
    }

    pub fn pressure_pa(&self) -> Option<i64> {
        self.pressure_pa
    }

    pub fn is_pressure(&self) -> bool {
        self.mt == PRESSURE_MT
    }
}

impl Default for SensorReading {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UUID={}, Timestamp={}, BridgeID={}, Sensor={}, Mt={}",
            self.uuid,
            timestamp_format::to_string(&self.timestamp),
            self.bridge_id,
            self.sensor.as_deref().unwrap_or_default(),
            self.mt
        )?;

        if let Some(battery) = &self.battery {
            write!(f, ", Battery={}", battery)?;
        }
        if let Some(rssi) = self.signal_rssi {
            write!(f, ", SignalRSSI={}", rssi)?;
        }
        if let Some(t) = self.temperature_c {
            write!(f, ", TemperatureC={:.2}", t)?;
        }
        if let Some(h) = self.humidity {
            write!(f, ", Humidity={:.1}", h)?;
        }
        if let Some(w) = self.wind_kmh {
            write!(f, ", WindKMH={:.2}", w)?;
        }
        if let Some(d) = self.wind_direction {
            write!(f, ", WindDirection={:.1}", d)?;
        }
        if let Some(r) = self.rainfall_mm {
            write!(f, ", RainfallMM={:.3}", r)?;
        }
        if let Some(p) = self.pressure_pa {
            write!(f, ", PressurePA={}", p)?;
        }

        Ok(())
    }
}

/// UTC, whole seconds: `2024-01-31T08:15:00Z`.
pub mod timestamp_format {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn to_string(timestamp: &DateTime<Utc>) -> String {
        timestamp.format(FORMAT).to_string()
    }

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&to_string(timestamp))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
