//! # Telemetry Data Model
//!
//! Raw records from the replay endpoint, partial live payloads, and the
//! normalized [`Pose`] every source is reduced to.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One row served by the CSV-replay endpoint.
///
/// The record is an open mapping of named fields (`Rate`, `Srate`, `Drate`,
/// `Entropy`, `Payload_Length`, `Protocol Type`, ...) plus an integer
/// `index`. Field values may be numbers or strings depending on how the
/// server typed its CSV columns.
///
/// # Examples
///
/// ```
/// use tellotwin::telemetry::TelemetryRecord;
///
/// let record: TelemetryRecord = serde_json::from_str(r#"{"index": 3, "Rate": "45.5"}"#)?;
/// assert_eq!(record.index(), Some(3));
/// assert_eq!(record.number("Rate"), 45.5);
/// assert_eq!(record.number("Srate"), 0.0);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetryRecord {
    fields: Map<String, Value>,
}

impl TelemetryRecord {
    /// Wraps an already-parsed JSON object.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Row index reported by the server, if present and integral.
    pub fn index(&self) -> Option<u64> {
        self.fields.get("index").and_then(Value::as_u64)
    }

    /// Raw field value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Field coerced to a finite number; missing or non-numeric yields 0.
    pub fn number(&self, name: &str) -> f64 {
        self.fields.get(name).map_or(0.0, coerce_number)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Numeric coercion for loosely typed CSV columns.
///
/// Strings are trimmed and parsed (the empty string is 0), booleans map to
/// 1/0, and anything else, including non-finite results, maps to 0.
pub fn coerce_number(value: &Value) -> f64 {
    parse_number(value).unwrap_or(0.0)
}

/// Finite number carried by `value`, if it has one.
///
/// Accepts JSON numbers, numeric strings (trimmed) and booleans.
pub fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };

    n.is_finite().then_some(n)
}

/// Partial update pushed over the live subscription.
///
/// Angles are in degrees, altitude in meters. Absent fields leave the
/// previous value untouched when merged into [`LiveState`], and so do
/// fields whose value cannot be read as a number (or, for `connected`, a
/// boolean).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LivePayload {
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
    pub yaw: Option<f64>,
    pub altitude: Option<f64>,
    pub connected: Option<bool>,
}

impl LivePayload {
    /// Parses one subscription message.
    ///
    /// Each field is read on its own: `{"roll": "12.5", "yaw": 30}` yields
    /// both angles, `{"roll": "level", "yaw": 30}` only the yaw.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::TelloTwinError::Parse`] when the text is not
    /// valid JSON or not a JSON object.
    pub fn parse(text: &str) -> crate::error::Result<Self> {
        let fields: Map<String, Value> = serde_json::from_str(text)?;
        Ok(Self::from_fields(&fields))
    }

    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let number = |name: &str| fields.get(name).and_then(parse_number);

        Self {
            roll: number("roll"),
            pitch: number("pitch"),
            yaw: number("yaw"),
            altitude: number("altitude"),
            connected: fields.get("connected").and_then(Value::as_bool),
        }
    }

    /// Whether the message carried any usable field
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Accumulated live telemetry (degrees and meters, as received).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LiveState {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub altitude: f64,
    pub connected: bool,
}

impl LiveState {
    /// Shallow merge: every field present in `payload` overwrites ours.
    pub fn merge(&mut self, payload: &LivePayload) {
        if let Some(roll) = payload.roll {
            self.roll = roll;
        }
        if let Some(pitch) = payload.pitch {
            self.pitch = pitch;
        }
        if let Some(yaw) = payload.yaw {
            self.yaw = yaw;
        }
        if let Some(altitude) = payload.altitude {
            self.altitude = altitude;
        }
        if let Some(connected) = payload.connected {
            self.connected = connected;
        }
    }
}

/// Normalized orientation (radians) and altitude (meters).
///
/// This is the single representation handed to presentation, whatever the
/// source.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub altitude: f64,
}

impl Pose {
    pub const ZERO: Pose = Pose {
        roll: 0.0,
        pitch: 0.0,
        yaw: 0.0,
        altitude: 0.0,
    };
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "roll: {:.1}°, pitch: {:.1}°, yaw: {:.1}°, alt: {:.2} m",
            self.roll.to_degrees(),
            self.pitch.to_degrees(),
            self.yaw.to_degrees(),
            self.altitude
        )
    }
}
