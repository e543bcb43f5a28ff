// Transform utilities for DMat4
//
// Extends glam::DMat4 with the queries the transform optimizer needs to
// decide whether a matrix can be folded into a primitive.

use glam::{DMat3, DMat4, DVec3};

use crate::TOLERANCE;

/// Geometric class of an affine matrix, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixKind {
    Identity,
    /// Pure translation.
    Translation,
    /// Rigid motion: orthonormal linear part with determinant +1, plus an
    /// optional translation.
    Rotation,
    /// Axis-aligned scale, plus an optional translation.
    Scale,
    /// Anything else.
    Affine,
}

/// Extension trait for DMat4 to provide additional transform utilities
pub trait TransformExt {
    /// Upper-left 3x3 block.
    fn linear(&self) -> DMat3;

    /// Translation column.
    fn offset(&self) -> DVec3;

    /// Map a surface normal: applies the inverse transpose of the linear
    /// part. `self` must be the inverse of the point transform.
    fn transform_normal(&self, normal: DVec3) -> DVec3;

    /// Classify the matrix.
    fn kind(&self) -> MatrixKind;

    /// Diagonal of the linear part.
    fn scale_factors(&self) -> DVec3;

    /// True when the linear part is a rotation times a uniform scale,
    /// i.e. angles are preserved. Returns the scale factor.
    fn conformal_scale(&self) -> Option<f64>;
}

impl TransformExt for DMat4 {
    fn linear(&self) -> DMat3 {
        DMat3::from_mat4(*self)
    }

    fn offset(&self) -> DVec3 {
        self.w_axis.truncate()
    }

    fn transform_normal(&self, normal: DVec3) -> DVec3 {
        self.linear().transpose() * normal
    }

    fn kind(&self) -> MatrixKind {
        let linear = self.linear();
        let moved = self.offset().length_squared() > TOLERANCE * TOLERANCE;
        if linear.abs_diff_eq(DMat3::IDENTITY, TOLERANCE) {
            return if moved {
                MatrixKind::Translation
            } else {
                MatrixKind::Identity
            };
        }
        let gram = linear.transpose() * linear;
        if gram.abs_diff_eq(DMat3::IDENTITY, TOLERANCE) && linear.determinant() > 0.0 {
            return MatrixKind::Rotation;
        }
        let diagonal = DMat3::from_diagonal(self.scale_factors());
        if linear.abs_diff_eq(diagonal, TOLERANCE) {
            return MatrixKind::Scale;
        }
        MatrixKind::Affine
    }

    fn scale_factors(&self) -> DVec3 {
        DVec3::new(self.x_axis.x, self.y_axis.y, self.z_axis.z)
    }

    fn conformal_scale(&self) -> Option<f64> {
        let linear = self.linear();
        let gram = linear.transpose() * linear;
        let s2 = gram.x_axis.x;
        if s2 <= TOLERANCE {
            return None;
        }
        let tol = TOLERANCE * s2.max(1.0);
        if gram.abs_diff_eq(DMat3::from_diagonal(DVec3::splat(s2)), tol) {
            Some(s2.sqrt())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_kind_identity_and_translation() {
        assert_eq!(DMat4::IDENTITY.kind(), MatrixKind::Identity);
        let m = DMat4::from_translation(DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.kind(), MatrixKind::Translation);
    }

    #[test]
    fn test_kind_rotation() {
        let m = DMat4::from_rotation_y(PI / 5.0);
        assert_eq!(m.kind(), MatrixKind::Rotation);

        let moved = DMat4::from_translation(DVec3::X) * m;
        assert_eq!(moved.kind(), MatrixKind::Rotation);
    }

    #[test]
    fn test_kind_scale() {
        let m = DMat4::from_scale(DVec3::new(2.0, 3.0, 4.0));
        assert_eq!(m.kind(), MatrixKind::Scale);
        assert_eq!(m.scale_factors(), DVec3::new(2.0, 3.0, 4.0));

        // A mirror is a scale, not a rotation.
        let mirror = DMat4::from_scale(DVec3::new(-1.0, 1.0, 1.0));
        assert_eq!(mirror.kind(), MatrixKind::Scale);
    }

    #[test]
    fn test_kind_affine() {
        let m = DMat4::from_rotation_z(0.4) * DMat4::from_scale(DVec3::new(1.0, 2.0, 1.0));
        assert_eq!(m.kind(), MatrixKind::Affine);
    }

    #[test]
    fn test_conformal_scale() {
        let m = DMat4::from_rotation_x(1.0) * DMat4::from_scale(DVec3::splat(3.0));
        let s = m.conformal_scale().unwrap();
        assert!((s - 3.0).abs() < 1e-9);

        let squash = DMat4::from_scale(DVec3::new(1.0, 2.0, 1.0));
        assert!(squash.conformal_scale().is_none());
    }

    #[test]
    fn test_transform_normal_under_squash() {
        // The mapped normal must stay orthogonal to the mapped tangent.
        let m = DMat4::from_scale(DVec3::new(1.0, 0.5, 1.0));
        let inv = m.inverse();
        let normal = DVec3::new(1.0, 1.0, 0.0);
        let tangent = DVec3::new(1.0, -1.0, 0.0);
        let mapped_normal = inv.transform_normal(normal);
        let mapped_tangent = m.transform_vector3(tangent);
        assert!(mapped_normal.dot(mapped_tangent).abs() < 1e-12);
    }
}
