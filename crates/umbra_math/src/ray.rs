use crate::{DMat4, DVec3};

/// A ray in 3D space.
///
/// The direction is not normalized: shadow rays are built so that `t = 1`
/// lands exactly on the light. The reciprocal direction and the squared
/// length are cached because the slab test and most primitives need them.
///
/// Renderers keep one scratch ray per worker and refill it with [`Ray::set`]
/// instead of building a new one per sample. Intersection routines only
/// borrow a ray for the duration of the call.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
    pub inv_direction: DVec3,
    pub squared_length: f64,
}

impl Ray {
    /// Create a new ray.
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self {
            origin,
            direction,
            inv_direction: direction.recip(),
            squared_length: direction.length_squared(),
        }
    }

    /// Ray from `from` to `to`, scaled so that `t = 1` reaches `to`.
    pub fn between(from: DVec3, to: DVec3) -> Self {
        Self::new(from, to - from)
    }

    /// Refill this ray in place.
    #[inline]
    pub fn set(&mut self, origin: DVec3, direction: DVec3) {
        self.origin = origin;
        self.direction = direction;
        self.inv_direction = direction.recip();
        self.squared_length = direction.length_squared();
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }

    /// Length of the direction vector.
    #[inline]
    pub fn length(&self) -> f64 {
        self.squared_length.sqrt()
    }

    /// Map the ray through an affine matrix.
    ///
    /// The parameterization is preserved: a hit at `t` in the transformed
    /// space is the hit at `t` in the original space.
    pub fn transform(&self, matrix: &DMat4) -> Ray {
        Ray::new(
            matrix.transform_point3(self.origin),
            matrix.transform_vector3(self.direction),
        )
    }
}

impl Default for Ray {
    fn default() -> Self {
        Self::new(DVec3::ZERO, DVec3::Z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(DVec3::ZERO, DVec3::X);

        assert_eq!(ray.at(0.0), DVec3::ZERO);
        assert_eq!(ray.at(1.0), DVec3::X);
        assert_eq!(ray.at(2.0), DVec3::new(2.0, 0.0, 0.0));
        assert_eq!(ray.at(-1.0), DVec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_ray_cached_values() {
        let ray = Ray::new(DVec3::ZERO, DVec3::new(2.0, 4.0, -0.5));
        assert_eq!(ray.inv_direction, DVec3::new(0.5, 0.25, -2.0));
        assert_eq!(ray.squared_length, 4.0 + 16.0 + 0.25);
    }

    #[test]
    fn test_ray_between() {
        let from = DVec3::new(1.0, 1.0, 1.0);
        let to = DVec3::new(3.0, -1.0, 5.0);
        let ray = Ray::between(from, to);
        assert_eq!(ray.at(1.0), to);
    }

    #[test]
    fn test_ray_set_refreshes_reciprocal() {
        let mut ray = Ray::default();
        ray.set(DVec3::ONE, DVec3::new(0.0, 2.0, 0.0));
        assert_eq!(ray.origin, DVec3::ONE);
        assert_eq!(ray.inv_direction.y, 0.5);
        assert!(ray.inv_direction.x.is_infinite());
        assert_eq!(ray.squared_length, 4.0);
    }

    #[test]
    fn test_ray_transform_keeps_parameter() {
        let matrix = DMat4::from_scale_rotation_translation(
            DVec3::splat(2.0),
            glam::DQuat::from_rotation_y(0.3),
            DVec3::new(1.0, 2.0, 3.0),
        );
        let ray = Ray::new(DVec3::new(0.5, 0.0, -1.0), DVec3::new(0.0, 1.0, 1.0));
        let moved = ray.transform(&matrix);
        let expected = matrix.transform_point3(ray.at(0.7));
        assert!((moved.at(0.7) - expected).length() < 1e-12);
    }
}
