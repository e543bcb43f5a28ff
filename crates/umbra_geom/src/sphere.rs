//! Sphere primitive.

use std::sync::Arc;

use umbra_math::{Bounds, DVec3, MatrixKind, Ray, TransformExt, EPSILON};

use crate::shape::{Hit, HitInfo};
use crate::transform::Affine;
use crate::Material;

/// A solid sphere.
#[derive(Debug, Clone)]
pub struct Sphere {
    center: DVec3,
    radius: f64,
    material: Arc<Material>,
}

impl Sphere {
    /// Create a new sphere.
    pub fn new(center: DVec3, radius: f64, material: Arc<Material>) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            material,
        }
    }

    pub fn center(&self) -> DVec3 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_sphere(self.center, self.radius)
    }

    /// Both roots of the ray/sphere quadratic, ascending.
    #[inline]
    fn roots(&self, ray: &Ray) -> Option<(f64, f64)> {
        let oc = ray.origin - self.center;
        let a = ray.squared_length;
        let b = ray.direction.dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = b * b - a * c;
        // Also rejects NaN and zero-length directions.
        if !(discriminant >= 0.0) || !(a > 0.0) {
            return None;
        }
        let sqrtd = discriminant.sqrt();
        Some(((-b - sqrtd) / a, (-b + sqrtd) / a))
    }

    pub fn shadow_test(&self, ray: &Ray) -> bool {
        match self.roots(ray) {
            Some((t0, t1)) => (t0 > EPSILON && t0 < 1.0) || (t1 > EPSILON && t1 < 1.0),
            None => false,
        }
    }

    pub fn hit_test<'a>(&'a self, ray: &Ray, max_time: f64, info: &mut HitInfo<'a>) -> bool {
        let Some((t0, t1)) = self.roots(ray) else {
            return false;
        };
        // Find the nearest root in the acceptable range
        let time = if t0 >= EPSILON && t0 <= max_time {
            t0
        } else if t1 >= EPSILON && t1 <= max_time {
            t1
        } else {
            return false;
        };
        info.time = time;
        info.hit_point = ray.at(time);
        info.normal = (info.hit_point - self.center) / self.radius;
        info.material = self.material();
        true
    }

    pub fn get_hits(&self, ray: &Ray, hits: &mut [Hit<'_>]) -> usize {
        match self.roots(ray) {
            Some((t0, t1)) => {
                hits[0] = Hit::new(t0);
                hits[1] = Hit::new(t1);
                2
            }
            None => 0,
        }
    }

    pub fn get_normal(&self, location: DVec3) -> DVec3 {
        (location - self.center) / self.radius
    }

    /// Spheres absorb any angle-preserving transform.
    pub fn supports(&self, transform: &Affine) -> bool {
        match transform.kind {
            MatrixKind::Identity | MatrixKind::Translation | MatrixKind::Rotation => true,
            MatrixKind::Scale | MatrixKind::Affine => transform.matrix.conformal_scale().is_some(),
        }
    }

    pub fn transformed(self, transform: &Affine) -> Self {
        let scale = transform.matrix.conformal_scale().unwrap_or(1.0);
        Self {
            center: transform.matrix.transform_point3(self.center),
            radius: self.radius * scale,
            material: self.material,
        }
    }
}
