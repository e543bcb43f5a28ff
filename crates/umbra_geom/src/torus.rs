//! Ray-torus intersection (quartic equation).

use std::sync::Arc;

use umbra_math::solver::solve_quartic;
use umbra_math::{Bounds, DVec3, Interval, MatrixKind, Ray, Roots, TransformExt, EPSILON};

use crate::shape::{Hit, HitInfo};
use crate::transform::Affine;
use crate::Material;

/// A solid torus whose axis of revolution is parallel to Y.
#[derive(Debug, Clone)]
pub struct Torus {
    center: DVec3,
    major_radius: f64,
    minor_radius: f64,
    material: Arc<Material>,
}

impl Torus {
    pub fn new(
        center: DVec3,
        major_radius: f64,
        minor_radius: f64,
        material: Arc<Material>,
    ) -> Self {
        Self {
            center,
            major_radius: major_radius.abs(),
            minor_radius: minor_radius.abs(),
            material,
        }
    }

    pub fn center(&self) -> DVec3 {
        self.center
    }

    pub fn major_radius(&self) -> f64 {
        self.major_radius
    }

    pub fn minor_radius(&self) -> f64 {
        self.minor_radius
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn bounds(&self) -> Bounds {
        let outer = self.major_radius + self.minor_radius;
        let half = DVec3::new(outer, self.minor_radius, outer);
        Bounds::new(self.center - half, self.center + half)
    }

    /// Intersections with the surface, as a monic quartic in t.
    ///
    /// The torus is `(|p|² + R² - r²)² = 4R² (x² + z²)` around its center.
    /// Substituting `p = o + t d` and dividing by `|d|⁴` yields the
    /// coefficients below.
    fn roots(&self, ray: &Ray) -> Roots {
        let o = ray.origin - self.center;
        let d = ray.direction;
        let r2 = self.major_radius * self.major_radius;
        let a = ray.squared_length;
        if !(a > 0.0) {
            return Roots::NONE;
        }
        let b = 2.0 * o.dot(d);
        let c = o.length_squared() + r2 - self.minor_radius * self.minor_radius;
        let four_r2 = 4.0 * r2;
        let inv_a2 = 1.0 / (a * a);

        let a1 = 2.0 * b / a;
        let a2 = (b * b + 2.0 * a * c - four_r2 * (d.x * d.x + d.z * d.z)) * inv_a2;
        let a3 = (2.0 * b * c - 2.0 * four_r2 * (o.x * d.x + o.z * d.z)) * inv_a2;
        let a4 = (c * c - four_r2 * (o.x * o.x + o.z * o.z)) * inv_a2;
        solve_quartic(a1, a2, a3, a4)
    }

    pub fn shadow_test(&self, ray: &Ray) -> bool {
        if !self.bounds().intersects(ray, 1.0) {
            return false;
        }
        self.roots(ray)
            .closest_within(Interval::new(EPSILON, 1.0))
            .is_some()
    }

    pub fn hit_test<'a>(&'a self, ray: &Ray, max_time: f64, info: &mut HitInfo<'a>) -> bool {
        if !self.bounds().intersects(ray, max_time) {
            return false;
        }
        match self.roots(ray).closest(max_time) {
            Some(time) => {
                info.time = time;
                info.hit_point = ray.at(time);
                info.normal = self.get_normal(info.hit_point);
                info.material = self.material();
                true
            }
            None => false,
        }
    }

    pub fn get_hits(&self, ray: &Ray, hits: &mut [Hit<'_>]) -> usize {
        let mut roots = self.roots(ray);
        roots.sort_hits();
        // Tangent rays can leave an odd count after rounding; drop the
        // unmatched crossing.
        let count = roots.count & !1;
        for (slot, &time) in hits.iter_mut().zip(&roots.values[..count]) {
            *slot = Hit::new(time);
        }
        count
    }

    /// Gradient of the implicit function, normalized.
    pub fn get_normal(&self, location: DVec3) -> DVec3 {
        let p = location - self.center;
        let r2 = self.major_radius * self.major_radius;
        let k = p.length_squared() + r2 - self.minor_radius * self.minor_radius;
        let gradient = 4.0 * k * p - 8.0 * r2 * DVec3::new(p.x, 0.0, p.z);
        gradient.normalize_or_zero()
    }

    /// Translations and uniform scales always fold. Rotations fold only
    /// when they keep the axis of revolution parallel to Y.
    pub fn supports(&self, transform: &Affine) -> bool {
        match transform.kind {
            MatrixKind::Identity | MatrixKind::Translation => true,
            _ => match transform.matrix.conformal_scale() {
                Some(scale) => {
                    let axis = transform.matrix.transform_vector3(DVec3::Y) / scale;
                    (axis.y.abs() - 1.0).abs() < 1e-9
                }
                None => false,
            },
        }
    }

    pub fn transformed(self, transform: &Affine) -> Self {
        let scale = transform.matrix.conformal_scale().unwrap_or(1.0);
        Self {
            center: transform.matrix.transform_point3(self.center),
            major_radius: self.major_radius * scale,
            minor_radius: self.minor_radius * scale,
            material: self.material,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring() -> Torus {
        Torus::new(DVec3::ZERO, 2.0, 0.5, Arc::new(Material::default()))
    }

    #[test]
    fn test_torus_four_hits_through_both_tubes() {
        let torus = ring();
        let ray = Ray::new(DVec3::new(-5.0, 0.0, 0.0), DVec3::X);
        let mut hits = [Hit::default(); 4];
        assert_eq!(torus.get_hits(&ray, &mut hits), 4);
        let expected = [2.5, 3.5, 6.5, 7.5];
        for (hit, want) in hits.iter().zip(expected) {
            assert!((hit.time - want).abs() < 1e-6, "{} vs {}", hit.time, want);
        }
    }

    #[test]
    fn test_torus_hole_is_empty() {
        let torus = ring();
        // Straight down through the hole.
        let ray = Ray::new(DVec3::new(0.0, 5.0, 0.0), DVec3::NEG_Y);
        let mut info = HitInfo::default();
        assert!(!torus.hit_test(&ray, 100.0, &mut info));

        // Straight down through the tube.
        let ray = Ray::new(DVec3::new(2.0, 5.0, 0.0), DVec3::NEG_Y);
        assert!(torus.hit_test(&ray, 100.0, &mut info));
        assert!((info.time - 4.5).abs() < 1e-6);
        assert!((info.normal - DVec3::Y).length() < 1e-6);
    }

    #[test]
    fn test_torus_unnormalized_direction() {
        let torus = ring();
        let ray = Ray::new(DVec3::new(-5.0, 0.0, 0.0), DVec3::new(2.0, 0.0, 0.0));
        let mut info = HitInfo::default();
        assert!(torus.hit_test(&ray, 100.0, &mut info));
        assert!((info.time - 1.25).abs() < 1e-6);
        assert!((info.normal - DVec3::NEG_X).length() < 1e-6);
    }

    #[test]
    fn test_torus_shadow() {
        let torus = ring();
        let blocked = Ray::between(DVec3::new(2.0, 3.0, 0.0), DVec3::new(2.0, -3.0, 0.0));
        assert!(torus.shadow_test(&blocked));
        let clear = Ray::between(DVec3::new(0.0, 3.0, 0.0), DVec3::new(0.0, -3.0, 0.0));
        assert!(!torus.shadow_test(&clear));
    }

    #[test]
    fn test_torus_supports() {
        let torus = ring();
        assert!(torus.supports(&Affine::translation(DVec3::X)));
        assert!(torus.supports(&Affine::rotation(DVec3::Y, 0.7)));
        assert!(torus.supports(&Affine::scale(DVec3::splat(3.0))));
        assert!(!torus.supports(&Affine::rotation(DVec3::X, 0.7)));
        assert!(!torus.supports(&Affine::scale(DVec3::new(1.0, 2.0, 1.0))));
    }
}
