//! Pose payload types for the tracking channel
//!
//! The external pose producer pushes one of two payload shapes over the
//! channel: a full 4x4 homogeneous transform, or a bare 3D point for
//! producers that only estimate position. Both shapes are accepted; the
//! serde types enforce dimensions, and [`PosePayload::validate`] rejects
//! non-finite values before anything reaches the render path.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Row-major 4x4 homogeneous transform as carried on the wire.
pub type RawMatrix = [[f64; 4]; 4];

/// Errors raised while validating an inbound pose payload.
///
/// An invalid pose is always recovered locally by dropping the message;
/// it never propagates into scene state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPose {
    /// A matrix or point component is NaN or infinite.
    #[error("pose payload contains a non-finite value")]
    NonFinite,
    /// The payload did not match either protocol variant.
    #[error("malformed pose payload: {0}")]
    Malformed(String),
}

/// Inbound pose payload, matching the two observed wire variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PosePayload {
    /// Full transform variant: `{ "transform_matrix": [[..4]..4] }`.
    Matrix { transform_matrix: RawMatrix },
    /// Degraded point variant: `{ "x": .., "y": .., "z": .. }`.
    Point { x: f64, y: f64, z: f64 },
}

impl PosePayload {
    /// Parse a payload from JSON text, enforcing shape and finiteness.
    pub fn from_json(text: &str) -> Result<Self, InvalidPose> {
        let payload: Self = serde_json::from_str(text)
            .map_err(|e| InvalidPose::Malformed(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    /// Reject payloads carrying NaN or infinite components.
    ///
    /// The rotation sub-block is not checked for orthonormality; the
    /// producer is trusted that far, but non-finite values would render
    /// garbage and are refused outright.
    pub fn validate(&self) -> Result<(), InvalidPose> {
        let finite = match self {
            Self::Matrix { transform_matrix } => transform_matrix
                .iter()
                .flatten()
                .all(|v| v.is_finite()),
            Self::Point { x, y, z } => {
                x.is_finite() && y.is_finite() && z.is_finite()
            }
        };
        if finite {
            Ok(())
        } else {
            Err(InvalidPose::NonFinite)
        }
    }
}

/// A pose already converted into the render-frame convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderPose {
    /// Full transform: replaces the marker's transform wholesale.
    Transform(RawMatrix),
    /// Position only: orientation is left at whatever the marker had.
    Position([f64; 3]),
}

impl RenderPose {
    /// Translation component of the pose, render-frame millimeters.
    pub fn translation(&self) -> [f64; 3] {
        match self {
            Self::Transform(m) => [m[0][3], m[1][3], m[2][3]],
            Self::Position(p) => *p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: RawMatrix = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];

    #[test]
    fn test_parse_matrix_variant() {
        let json = r#"{"transform_matrix":
            [[1,0,0,4],[0,1,0,5],[0,0,1,6],[0,0,0,1]]}"#;
        let payload = PosePayload::from_json(json).unwrap();
        match payload {
            PosePayload::Matrix { transform_matrix } => {
                assert_eq!(transform_matrix[0][3], 4.0);
                assert_eq!(transform_matrix[2][3], 6.0);
            }
            other => panic!("expected matrix variant, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_point_variant() {
        let payload = PosePayload::from_json(r#"{"x":1.5,"y":-2.0,"z":0.25}"#).unwrap();
        assert_eq!(
            payload,
            PosePayload::Point { x: 1.5, y: -2.0, z: 0.25 }
        );
    }

    #[test]
    fn test_reject_wrong_dimensions() {
        // 3x4 matrix
        let json = r#"{"transform_matrix":[[1,0,0,0],[0,1,0,0],[0,0,1,0]]}"#;
        assert!(matches!(
            PosePayload::from_json(json),
            Err(InvalidPose::Malformed(_))
        ));
        // 4x3 rows
        let json = r#"{"transform_matrix":[[1,0,0],[0,1,0],[0,0,1],[0,0,0]]}"#;
        assert!(matches!(
            PosePayload::from_json(json),
            Err(InvalidPose::Malformed(_))
        ));
    }

    #[test]
    fn test_reject_missing_keys() {
        assert!(PosePayload::from_json(r#"{"x":1.0,"y":2.0}"#).is_err());
        assert!(PosePayload::from_json(r#"{}"#).is_err());
        assert!(PosePayload::from_json(r#"{"matrix":[[1]]}"#).is_err());
    }

    #[test]
    fn test_reject_non_numeric_fields() {
        assert!(PosePayload::from_json(r#"{"x":"a","y":2.0,"z":3.0}"#).is_err());
        let json = r#"{"transform_matrix":
            [[1,0,0,"x"],[0,1,0,0],[0,0,1,0],[0,0,0,1]]}"#;
        assert!(PosePayload::from_json(json).is_err());
    }

    #[test]
    fn test_reject_non_finite() {
        let mut m = IDENTITY;
        m[1][3] = f64::NAN;
        let payload = PosePayload::Matrix { transform_matrix: m };
        assert_eq!(payload.validate(), Err(InvalidPose::NonFinite));

        let payload = PosePayload::Point { x: 0.0, y: f64::INFINITY, z: 0.0 };
        assert_eq!(payload.validate(), Err(InvalidPose::NonFinite));
    }

    #[test]
    fn test_valid_payloads_pass() {
        let payload = PosePayload::Matrix { transform_matrix: IDENTITY };
        assert!(payload.validate().is_ok());
        let payload = PosePayload::Point { x: 0.0, y: 0.0, z: 0.0 };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_render_pose_translation() {
        let mut m = IDENTITY;
        m[0][3] = 10.0;
        m[1][3] = 20.0;
        m[2][3] = 30.0;
        assert_eq!(RenderPose::Transform(m).translation(), [10.0, 20.0, 30.0]);
        assert_eq!(
            RenderPose::Position([1.0, 2.0, 3.0]).translation(),
            [1.0, 2.0, 3.0]
        );
    }
}
