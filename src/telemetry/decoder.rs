//! # Orientation Decoder
//!
//! Reduces a replay record or the accumulated live state to a [`Pose`].
//!
//! Replay rows carry network-traffic style metrics rather than attitude, so
//! they are folded into bounded, visually plausible angles:
//!
//! | Pose field | Source  | Mapping                              |
//! |------------|---------|--------------------------------------|
//! | roll       | Rate    | `clamp(Rate % 60 - 30, -30, 30)` deg |
//! | pitch      | Srate   | `clamp(Srate % 50 - 25, -25, 25)` deg|
//! | yaw        | Drate   | `Drate % 360 - 180` deg, unclamped   |
//! | altitude   | Entropy | `clamp(Entropy % 2, 0, 2)` m         |
//!
//! Live values are already degrees and only get converted to radians.

use super::types::{LiveState, Pose, TelemetryRecord};

/// Roll half-range in degrees.
pub const ROLL_LIMIT_DEG: f64 = 30.0;
/// Pitch half-range in degrees.
pub const PITCH_LIMIT_DEG: f64 = 25.0;
/// Upper altitude bound in meters.
pub const ALTITUDE_LIMIT_M: f64 = 2.0;

/// Decode a replay record into a pose.
///
/// An absent record decodes to [`Pose::ZERO`].
///
/// # Examples
///
/// ```
/// use tellotwin::telemetry::{decoder::decode_record, TelemetryRecord};
///
/// let record: TelemetryRecord =
///     serde_json::from_str(r#"{"Rate": 45, "Srate": 10, "Drate": 400, "Entropy": 2.5}"#)?;
/// let pose = decode_record(Some(&record));
///
/// assert!((pose.roll.to_degrees() - 15.0).abs() < 1e-9);
/// assert!((pose.pitch.to_degrees() + 15.0).abs() < 1e-9);
/// assert!((pose.yaw.to_degrees() + 140.0).abs() < 1e-9);
/// assert!((pose.altitude - 0.5).abs() < 1e-9);
/// # Ok::<(), serde_json::Error>(())
/// ```
pub fn decode_record(record: Option<&TelemetryRecord>) -> Pose {
    let Some(record) = record else {
        return Pose::ZERO;
    };

    let rate = record.number("Rate");
    let srate = record.number("Srate");
    let drate = record.number("Drate");
    let entropy = record.number("Entropy");

    let roll_deg = (rate % 60.0 - ROLL_LIMIT_DEG).clamp(-ROLL_LIMIT_DEG, ROLL_LIMIT_DEG);
    let pitch_deg = (srate % 50.0 - PITCH_LIMIT_DEG).clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG);
    let yaw_deg = drate % 360.0 - 180.0;
    let altitude = (entropy % 2.0).clamp(0.0, ALTITUDE_LIMIT_M);

    Pose {
        roll: roll_deg.to_radians(),
        pitch: pitch_deg.to_radians(),
        yaw: yaw_deg.to_radians(),
        altitude,
    }
}

/// Decode accumulated live telemetry: degrees to radians, altitude as-is.
pub fn decode_live(state: &LiveState) -> Pose {
    Pose {
        roll: state.roll.to_radians(),
        pitch: state.pitch.to_radians(),
        yaw: state.yaw.to_radians(),
        altitude: state.altitude,
    }
}
