//! Asset path conventions and the fiducial layout document
//!
//! Field packages follow a fixed directory layout: the accessory model
//! (loose scoring elements) for a field lives two directories up from the
//! primary model under `game_pieces/`, named after the first seven
//! characters of the primary file name. Fiducial markers are described by
//! a JSON layout document shipped alongside the field package.

use serde::{Deserialize, Serialize};

/// Derive the accessory model path from a primary model path.
///
/// Drops the last two path segments, appends `game_pieces/`, then the
/// first seven characters of the primary file name plus the `-GP.glb`
/// suffix. Returns `None` when the path has too few segments to carry
/// the convention.
pub fn accessory_path_for(primary: &str) -> Option<String> {
    let segments: Vec<&str> = primary.split('/').collect();
    if segments.len() < 3 {
        return None;
    }
    let file_name = *segments.last()?;
    if file_name.is_empty() {
        return None;
    }
    let stem: String = file_name.chars().take(7).collect();
    let base = segments[..segments.len() - 2].join("/");
    Some(format!("{base}/game_pieces/{stem}-GP.glb"))
}

/// Texture file name for a fiducial id, zero-padded to five digits.
pub fn tag_texture_name(id: u32) -> String {
    format!("tag36_11_{id:05}.png")
}

/// One fiducial marker placement from the layout document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fiducial {
    pub id: u32,
    /// Marker edge length in render units.
    pub size: f64,
    /// Row-major 4x4 transform, translation in meters at indices
    /// 3, 7 and 11.
    pub transform: [f64; 16],
}

impl Fiducial {
    /// Transform with the translation entries scaled from meters to
    /// render millimeters. Rotation entries pass through.
    pub fn render_transform(&self) -> [f64; 16] {
        let mut t = self.transform;
        t[3] *= 1000.0;
        t[7] *= 1000.0;
        t[11] *= 1000.0;
        t
    }
}

/// The fiducial layout document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiducialLayout {
    pub fiducials: Vec<Fiducial>,
}

impl FiducialLayout {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
