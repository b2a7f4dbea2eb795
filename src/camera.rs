//! Camera and crop identity types
//!
//! Both sets are fixed and enumerable: the deployment has two OAK cameras on
//! the implement and two supported crops. Selection is only ever mutated by
//! explicit operator events.

use std::fmt;
use std::str::FromStr;

/// Identifier of a camera on the implement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraId {
    /// First OAK camera
    Oak0,
    /// Second OAK camera
    Oak1,
}

impl CameraId {
    /// All known cameras, in dropdown order
    pub const ALL: [CameraId; 2] = [CameraId::Oak0, CameraId::Oak1];

    /// Lowercase slug used in endpoint paths
    pub fn slug(&self) -> &'static str {
        match self {
            CameraId::Oak0 => "oak0",
            CameraId::Oak1 => "oak1",
        }
    }

    /// Display name as shown in the camera selector
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraId::Oak0 => "Oak0",
            CameraId::Oak1 => "Oak1",
        }
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Oak0" | "oak0" => Ok(CameraId::Oak0),
            "Oak1" | "oak1" => Ok(CameraId::Oak1),
            other => Err(format!("Unknown camera: '{}'", other)),
        }
    }
}

/// Crop/subject type the operator is inspecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CropKind {
    Strawberry,
    Tomato,
}

impl CropKind {
    /// All supported crops, in dropdown order
    pub const ALL: [CropKind; 2] = [CropKind::Strawberry, CropKind::Tomato];

    pub fn as_str(&self) -> &'static str {
        match self {
            CropKind::Strawberry => "Strawberry",
            CropKind::Tomato => "Tomato",
        }
    }
}

impl fmt::Display for CropKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CropKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Strawberry" | "strawberry" => Ok(CropKind::Strawberry),
            "Tomato" | "tomato" => Ok(CropKind::Tomato),
            other => Err(format!("Unknown crop: '{}'", other)),
        }
    }
}

/// The operator's active camera/crop selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraSelection {
    /// Active camera
    pub camera: CameraId,
    /// Chosen crop type
    pub crop: CropKind,
}

impl CameraSelection {
    /// Create a new selection
    pub fn new(camera: CameraId, crop: CropKind) -> Self {
        Self { camera, crop }
    }
}

impl Default for CameraSelection {
    fn default() -> Self {
        Self {
            camera: CameraId::Oak0,
            crop: CropKind::Strawberry,
        }
    }
}

impl fmt::Display for CameraSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.camera, self.crop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_roundtrip() {
        for camera in CameraId::ALL {
            let parsed: CameraId = camera.as_str().parse().unwrap();
            assert_eq!(parsed, camera);

            let from_slug: CameraId = camera.slug().parse().unwrap();
            assert_eq!(from_slug, camera);
        }

        assert!("Oak9".parse::<CameraId>().is_err());
    }

    #[test]
    fn test_crop_roundtrip() {
        for crop in CropKind::ALL {
            let parsed: CropKind = crop.as_str().parse().unwrap();
            assert_eq!(parsed, crop);
        }

        assert!("Cucumber".parse::<CropKind>().is_err());
    }

    #[test]
    fn test_default_selection() {
        let selection = CameraSelection::default();

        assert_eq!(selection.camera, CameraId::Oak0);
        assert_eq!(selection.crop, CropKind::Strawberry);
        assert_eq!(selection.to_string(), "Oak0/Strawberry");
    }
}
