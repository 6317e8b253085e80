//! # Render Module
//!
//! Everything between the target pose and what the scene draws.
//!
//! This module handles:
//! - Smoothing the displayed pose toward the target every frame
//! - Choosing the drone model or the fallback shape at load time

pub mod asset;
pub mod smoothing;

pub use asset::{FallbackShape, ModelAsset, Renderable};
pub use smoothing::{RenderedPose, Smoother};
