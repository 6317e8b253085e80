//! # Model Asset Selection
//!
//! Decides once, at load time, whether the drone is drawn from its glTF
//! binary or from the built-in fallback shape.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Result, TelloTwinError};

/// Magic bytes opening every binary glTF (`.glb`) file
pub const GLB_MAGIC: &[u8; 4] = b"glTF";

/// Primitive dimensions of the stand-in drone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackShape {
    /// Body box extents (width, height, depth)
    pub body: [f64; 3],
    /// Rotor cylinder radius
    pub rotor_radius: f64,
    /// Rotor cylinder height
    pub rotor_height: f64,
    /// Rotor hub positions relative to the body center
    pub rotors: [[f64; 3]; 4],
}

impl Default for FallbackShape {
    fn default() -> Self {
        Self {
            body: [1.2, 0.2, 1.2],
            rotor_radius: 0.05,
            rotor_height: 0.15,
            rotors: [
                [-0.6, 0.0, -0.6],
                [-0.6, 0.0, 0.6],
                [0.6, 0.0, -0.6],
                [0.6, 0.0, 0.6],
            ],
        }
    }
}

/// A validated model file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAsset {
    path: PathBuf,
}

impl ModelAsset {
    /// Check that `path` exists and holds a binary glTF
    ///
    /// # Errors
    ///
    /// Returns [`TelloTwinError::ModelLoad`] if the file cannot be opened or
    /// does not start with the glTF magic
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .map_err(|e| TelloTwinError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic).map_err(|e| {
            TelloTwinError::ModelLoad(format!("{}: cannot read header: {}", path.display(), e))
        })?;

        if &magic != GLB_MAGIC {
            return Err(TelloTwinError::ModelLoad(format!(
                "{}: not a binary glTF file",
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// What the scene draws for the drone
#[derive(Debug, Clone, PartialEq)]
pub enum Renderable {
    Model(ModelAsset),
    Fallback(FallbackShape),
}

impl Renderable {
    /// Load the model at `path`, substituting the fallback shape on failure
    pub fn resolve<P: AsRef<Path>>(path: P) -> Self {
        match ModelAsset::load(path) {
            Ok(asset) => {
                info!("Loaded drone model from {}", asset.path().display());
                Renderable::Model(asset)
            }
            Err(e) => {
                warn!("{}; rendering fallback shape", e);
                Renderable::Fallback(FallbackShape::default())
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Renderable::Fallback(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_glb() {
        // Header: magic, version 2, total length
        let file = file_with(b"glTF\x02\x00\x00\x00\x0c\x00\x00\x00");
        let asset = ModelAsset::load(file.path()).unwrap();
        assert_eq!(asset.path(), file.path());

        assert!(!Renderable::resolve(file.path()).is_fallback());
    }

    #[test]
    fn test_missing_model_falls_back() {
        let result = ModelAsset::load("/nonexistent/models/tello.glb");
        assert!(matches!(result, Err(TelloTwinError::ModelLoad(_))));

        let renderable = Renderable::resolve("/nonexistent/models/tello.glb");
        assert_eq!(renderable, Renderable::Fallback(FallbackShape::default()));
    }

    #[test]
    fn test_wrong_format_falls_back() {
        let file = file_with(b"{\"asset\": {\"version\": \"2.0\"}}");
        match ModelAsset::load(file.path()) {
            Err(TelloTwinError::ModelLoad(msg)) => assert!(msg.contains("not a binary glTF")),
            other => panic!("Expected ModelLoad error, got: {:?}", other),
        }
        assert!(Renderable::resolve(file.path()).is_fallback());
    }

    #[test]
    fn test_truncated_file_falls_back() {
        let file = file_with(b"gl");
        assert!(ModelAsset::load(file.path()).is_err());
    }

    #[test]
    fn test_fallback_shape_dimensions() {
        let shape = FallbackShape::default();
        assert_eq!(shape.body, [1.2, 0.2, 1.2]);
        assert_eq!(shape.rotor_radius, 0.05);
        assert_eq!(shape.rotor_height, 0.15);

        // One rotor per corner, all in the body plane
        for rotor in shape.rotors {
            assert_eq!(rotor[0].abs(), 0.6);
            assert_eq!(rotor[1], 0.0);
            assert_eq!(rotor[2].abs(), 0.6);
        }
    }
}
