//! Fieldsight Core - Core types, pose conversion, and frame pacing
//!
//! This crate provides the foundational types for the Fieldsight system:
//! - Pose payload parsing and validation for the tracking channel
//! - Source-frame to render-frame coordinate conversion
//! - Asset path derivation and fiducial layout parsing
//! - Frame-pacing clock and render statistics

pub mod assets;
pub mod clock;
pub mod pose;
pub mod settings;
pub mod transform;

pub use assets::{accessory_path_for, tag_texture_name, Fiducial, FiducialLayout};
pub use clock::{FrameClock, RenderStats, StatsSample};
pub use pose::{InvalidPose, PosePayload, RawMatrix, RenderPose};
pub use settings::SettingsDoc;
pub use transform::FieldCalibration;
