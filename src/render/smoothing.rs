//! # Smoothing Engine
//!
//! Per-frame exponential approach of the displayed pose toward the target.
//!
//! Each frame every scalar closes a fixed fraction of its remaining distance:
//!
//! `current += (target - current) * gain`
//!
//! With `gain = 0.2` telemetry arriving at a few Hz still renders as smooth
//! motion at the display refresh rate. No clamping happens here.
//!
//! ## Usage
//!
//! ```
//! use tellotwin::render::smoothing::{RenderedPose, Smoother};
//! use tellotwin::telemetry::Pose;
//!
//! let smoother = Smoother::default();
//! let mut rendered = RenderedPose::default();
//! let target = Pose { roll: 10.0, ..Pose::ZERO };
//!
//! smoother.step(&mut rendered, &target);
//! assert!((rendered.rotation_z - 2.0).abs() < 1e-12);
//! ```

use crate::telemetry::Pose;

/// Default fraction of the remaining distance closed per frame
pub const DEFAULT_GAIN: f64 = 0.2;

/// Default meters-to-scene-units factor for the vertical offset
pub const DEFAULT_ALTITUDE_SCALE: f64 = 0.05;

/// Pose as currently drawn, in scene terms
///
/// Euler rotation follows the scene axes: `x` is pitch, `y` is yaw and `z`
/// is roll. `position_y` is the vertical offset, not the semantic altitude.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderedPose {
    pub rotation_x: f64,
    pub rotation_y: f64,
    pub rotation_z: f64,
    pub position_y: f64,
}

/// First-order interpolator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoother {
    gain: f64,
    altitude_scale: f64,
}

impl Default for Smoother {
    fn default() -> Self {
        Self {
            gain: DEFAULT_GAIN,
            altitude_scale: DEFAULT_ALTITUDE_SCALE,
        }
    }
}

impl Smoother {
    /// Create a smoother; `gain` is clamped to `0.0..=1.0`
    #[must_use]
    pub fn new(gain: f64, altitude_scale: f64) -> Self {
        Self {
            gain: gain.clamp(0.0, 1.0),
            altitude_scale,
        }
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn altitude_scale(&self) -> f64 {
        self.altitude_scale
    }

    /// Scene pose that `target` settles to
    pub fn target_for(&self, target: &Pose) -> RenderedPose {
        RenderedPose {
            rotation_x: target.pitch,
            rotation_y: target.yaw,
            rotation_z: target.roll,
            position_y: target.altitude * self.altitude_scale,
        }
    }

    /// Advance `current` by one frame toward `target`
    pub fn step(&self, current: &mut RenderedPose, target: &Pose) {
        let goal = self.target_for(target);
        current.rotation_x = approach(current.rotation_x, goal.rotation_x, self.gain);
        current.rotation_y = approach(current.rotation_y, goal.rotation_y, self.gain);
        current.rotation_z = approach(current.rotation_z, goal.rotation_z, self.gain);
        current.position_y = approach(current.position_y, goal.position_y, self.gain);
    }
}

#[inline]
fn approach(current: f64, target: f64, gain: f64) -> f64 {
    current + (target - current) * gain
}
