//! Source-frame to render-frame pose conversion
//!
//! The pose producer reports field-relative poses in meters with the field
//! origin at one corner; the render scene is millimeter-scaled with the
//! origin at the field center and a different up-axis. Conversion applies,
//! in order: an origin offset correction on two axes, the meter-to-
//! millimeter scale, and a 90 degree rotation about the X axis realized as
//! a row swap (exact, no trigonometry).
//!
//! Pure and deterministic: no I/O, no shared state.

use crate::pose::{InvalidPose, PosePayload, RawMatrix, RenderPose};

/// Field calibration constants relating the source frame to the render
/// frame.
///
/// The offsets are calibration values measured against the deployed field
/// layout; they carry no documented derivation and are kept configurable
/// rather than baked into the conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldCalibration {
    /// Offset subtracted from the source X axis, meters.
    pub offset_x: f64,
    /// Offset subtracted from the source Z axis, meters.
    pub offset_z: f64,
    /// Unit scale from source meters to render millimeters.
    pub meters_to_millimeters: f64,
}

impl Default for FieldCalibration {
    fn default() -> Self {
        Self {
            offset_x: 8.774125,
            offset_z: 4.025901,
            meters_to_millimeters: 1000.0,
        }
    }
}

impl FieldCalibration {
    /// Convert a validated payload into a render-frame pose.
    pub fn render_from_source(
        &self,
        payload: &PosePayload,
    ) -> Result<RenderPose, InvalidPose> {
        payload.validate()?;
        match payload {
            PosePayload::Matrix { transform_matrix } => Ok(RenderPose::Transform(
                self.render_from_matrix(transform_matrix)?,
            )),
            PosePayload::Point { x, y, z } => Ok(RenderPose::Position(
                self.render_from_point(*x, *y, *z)?,
            )),
        }
    }

    /// Convert a full 4x4 source transform into the render frame.
    ///
    /// The translation is re-centered and scaled first, then the whole
    /// matrix is premultiplied by the X-axis quarter turn (new row 1 =
    /// old row 2, new row 2 = negated old row 1). The bottom row passes
    /// through unchanged.
    pub fn render_from_matrix(&self, m: &RawMatrix) -> Result<RawMatrix, InvalidPose> {
        if m.iter().flatten().any(|v| !v.is_finite()) {
            return Err(InvalidPose::NonFinite);
        }

        let s = self.meters_to_millimeters;
        let recentred = [
            [m[0][0], m[0][1], m[0][2], (m[0][3] - self.offset_x) * s],
            [m[1][0], m[1][1], m[1][2], m[1][3] * s],
            [m[2][0], m[2][1], m[2][2], (m[2][3] - self.offset_z) * s],
            m[3],
        ];

        Ok([
            recentred[0],
            recentred[2],
            [
                -recentred[1][0],
                -recentred[1][1],
                -recentred[1][2],
                -recentred[1][3],
            ],
            recentred[3],
        ])
    }

    /// Convert a bare source point into render-frame coordinates.
    pub fn render_from_point(&self, x: f64, y: f64, z: f64) -> Result<[f64; 3], InvalidPose> {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(InvalidPose::NonFinite);
        }

        let s = self.meters_to_millimeters;
        let rx = (x - self.offset_x) * s;
        let ry = y * s;
        let rz = (z - self.offset_z) * s;
        // Same quarter turn as the matrix path: (x, y, z) -> (x, z, -y).
        Ok([rx, rz, -ry])
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

    fn with_translation(t: [f64; 3]) -> RawMatrix {
        let mut m = IDENTITY;
        m[0][3] = t[0];
        m[1][3] = t[1];
        m[2][3] = t[2];
        m
    }

    #[test]
    fn test_field_origin_maps_to_render_origin() {
        // The calibration offsets are defined so that this source point is
        // the render origin.
        let calib = FieldCalibration::default();
        let p = calib
            .render_from_point(8.774125, 0.0, 4.025901)
            .unwrap();
        assert_eq!(p, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_matrix_translation_scaled_and_offset() {
        let calib = FieldCalibration::default();
        let m = calib
            .render_from_matrix(&with_translation([1.0, 2.0, 3.0]))
            .unwrap();
        assert_eq!(m[0][3], (1.0 - 8.774125) * 1000.0);
        assert_eq!(m[1][3], (3.0 - 4.025901) * 1000.0);
        assert_eq!(m[2][3], -2000.0);
        assert_eq!(m[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_axis_remap_rotates_rotation_block() {
        let calib = FieldCalibration::default();
        let m = calib.render_from_matrix(&IDENTITY).unwrap();
        // Identity rotation becomes the quarter turn itself.
        assert_eq!(m[0][..3], [1.0, 0.0, 0.0]);
        assert_eq!(m[1][..3], [0.0, 0.0, 1.0]);
        assert_eq!(m[2][..3], [0.0, -1.0, 0.0]);
    }

    #[test]
    fn test_deterministic() {
        let calib = FieldCalibration::default();
        let src = with_translation([3.25, -1.5, 0.75]);
        let a = calib.render_from_matrix(&src).unwrap();
        let b = calib.render_from_matrix(&src).unwrap();
        for (ra, rb) in a.iter().zip(b.iter()) {
            for (va, vb) in ra.iter().zip(rb.iter()) {
                assert_eq!(va.to_bits(), vb.to_bits());
            }
        }
    }

    #[test]
    fn test_rejects_non_finite_matrix() {
        let calib = FieldCalibration::default();
        let mut m = IDENTITY;
        m[2][1] = f64::NAN;
        assert_eq!(
            calib.render_from_matrix(&m),
            Err(InvalidPose::NonFinite)
        );
        assert_eq!(
            calib.render_from_point(f64::INFINITY, 0.0, 0.0),
            Err(InvalidPose::NonFinite)
        );
    }

    #[test]
    fn test_payload_dispatch() {
        let calib = FieldCalibration::default();
        let pose = calib
            .render_from_source(&PosePayload::Point { x: 0.0, y: 0.0, z: 0.0 })
            .unwrap();
        assert_eq!(
            pose,
            RenderPose::Position([-8774.125, -4025.901, 0.0])
        );

        let payload = PosePayload::Matrix {
            transform_matrix: with_translation([1.0, 2.0, 3.0]),
        };
        let pose = calib.render_from_source(&payload).unwrap();
        assert_eq!(
            pose.translation(),
            [-7774.125, (3.0 - 4.025901) * 1000.0, -2000.0]
        );
    }

    #[test]
    fn test_custom_calibration() {
        let calib = FieldCalibration {
            offset_x: 1.0,
            offset_z: 2.0,
            meters_to_millimeters: 1.0,
        };
        let p = calib.render_from_point(1.0, 5.0, 2.0).unwrap();
        assert_eq!(p, [0.0, 0.0, -5.0]);
    }
}
