//! Half-space primitives.
//!
//! A plane is a solid: the half-space `normal · p + offset <= 0`. Rays that
//! cross it report one finite boundary and an infinite sentinel for the
//! side that never ends.

use std::sync::Arc;

use umbra_math::{DVec3, Ray, TransformExt, EPSILON, TOLERANCE};

use crate::shape::{Hit, HitInfo, Shape};
use crate::transform::Affine;
use crate::Material;

/// Tolerance under which a plane normal counts as a principal axis.
pub const AXIS_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn unit(self) -> DVec3 {
        match self {
            Axis::X => DVec3::X,
            Axis::Y => DVec3::Y,
            Axis::Z => DVec3::Z,
        }
    }
}

/// Boundaries of a half-space along a ray, given `denom = n · d` and
/// `num = n · o + offset`.
#[inline]
fn half_space_hits(denom: f64, num: f64, hits: &mut [Hit<'_>]) -> usize {
    if denom.abs() < TOLERANCE {
        // Parallel: the ray is either always inside or never.
        if num <= 0.0 {
            hits[0] = Hit::new(f64::NEG_INFINITY);
            hits[1] = Hit::new(f64::INFINITY);
            return 2;
        }
        return 0;
    }
    let t = -num / denom;
    if denom < 0.0 {
        hits[0] = Hit::new(t);
        hits[1] = Hit::new(f64::INFINITY);
    } else {
        hits[0] = Hit::new(f64::NEG_INFINITY);
        hits[1] = Hit::new(t);
    }
    2
}

/// A plane with an arbitrary orientation.
#[derive(Debug, Clone)]
pub struct Plane {
    normal: DVec3,
    offset: f64,
    material: Arc<Material>,
}

impl Plane {
    /// Half-space `normal · p + offset <= 0`. The normal is normalized and
    /// the offset rescaled accordingly. A normal shorter than `EPSILON`
    /// gives a degenerate plane that is never hit.
    pub fn new(normal: DVec3, offset: f64, material: Arc<Material>) -> Self {
        let length = normal.length();
        if !(length > EPSILON) {
            return Self {
                normal: DVec3::ZERO,
                offset,
                material,
            };
        }
        Self {
            normal: normal / length,
            offset: offset / length,
            material,
        }
    }

    /// True for a plane built from a zero-length normal.
    pub fn is_degenerate(&self) -> bool {
        self.normal == DVec3::ZERO
    }

    pub fn normal(&self) -> DVec3 {
        self.normal
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    #[inline]
    fn crossing(&self, ray: &Ray) -> Option<f64> {
        let denom = self.normal.dot(ray.direction);
        if denom.abs() < TOLERANCE {
            return None;
        }
        Some(-(self.normal.dot(ray.origin) + self.offset) / denom)
    }

    pub fn shadow_test(&self, ray: &Ray) -> bool {
        matches!(self.crossing(ray), Some(t) if t > EPSILON && t < 1.0)
    }

    pub fn hit_test<'a>(&'a self, ray: &Ray, max_time: f64, info: &mut HitInfo<'a>) -> bool {
        match self.crossing(ray) {
            Some(t) if t >= EPSILON && t <= max_time => {
                info.time = t;
                info.hit_point = ray.at(t);
                info.normal = self.normal;
                info.material = self.material();
                true
            }
            _ => false,
        }
    }

    pub fn get_hits(&self, ray: &Ray, hits: &mut [Hit<'_>]) -> usize {
        if self.is_degenerate() {
            return 0;
        }
        half_space_hits(
            self.normal.dot(ray.direction),
            self.normal.dot(ray.origin) + self.offset,
            hits,
        )
    }

    pub fn get_normal(&self, _location: DVec3) -> DVec3 {
        self.normal
    }

    /// Planes map to planes under any invertible affine transform.
    pub fn transformed(self, transform: &Affine) -> Plane {
        let anchor = transform.matrix.transform_point3(-self.offset * self.normal);
        let normal = transform
            .inverse
            .transform_normal(self.normal)
            .normalize_or_zero();
        Plane {
            normal,
            offset: -normal.dot(anchor),
            material: self.material,
        }
    }

    /// The axis this plane is perpendicular to, if any, and whether the
    /// normal points along it or against it.
    pub fn principal_axis(&self) -> Option<(Axis, bool)> {
        [Axis::X, Axis::Y, Axis::Z].into_iter().find_map(|axis| {
            let unit = axis.unit();
            if (self.normal - unit).length() < AXIS_TOLERANCE {
                Some((axis, true))
            } else if (self.normal + unit).length() < AXIS_TOLERANCE {
                Some((axis, false))
            } else {
                None
            }
        })
    }

    /// Replace with an [`AxisPlane`] when the normal is a principal axis.
    pub fn specialize(self) -> Shape {
        match self.principal_axis() {
            Some((axis, upward)) => {
                let sign = if upward { 1.0 } else { -1.0 };
                Shape::AxisPlane(AxisPlane {
                    axis,
                    sign,
                    offset: self.offset,
                    material: self.material,
                })
            }
            None => Shape::Plane(self),
        }
    }
}

/// A plane perpendicular to a coordinate axis.
///
/// Same solid as a [`Plane`] with normal `sign * axis`, but intersection
/// needs a single component of the ray instead of two dot products.
#[derive(Debug, Clone)]
pub struct AxisPlane {
    axis: Axis,
    sign: f64,
    offset: f64,
    material: Arc<Material>,
}

impl AxisPlane {
    /// Solid below `axis = position` when `upward` (normal along the axis),
    /// above it otherwise.
    pub fn new(axis: Axis, position: f64, upward: bool, material: Arc<Material>) -> Self {
        let sign = if upward { 1.0 } else { -1.0 };
        Self {
            axis,
            sign,
            offset: -sign * position,
            material,
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Coordinate of the plane along its axis.
    pub fn position(&self) -> f64 {
        -self.sign * self.offset
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn to_plane(self) -> Plane {
        Plane {
            normal: self.axis.unit() * self.sign,
            offset: self.offset,
            material: self.material,
        }
    }

    #[inline]
    fn crossing(&self, ray: &Ray) -> Option<f64> {
        let i = self.axis.index();
        if ray.direction[i].abs() < TOLERANCE {
            return None;
        }
        Some(-(self.sign * ray.origin[i] + self.offset) * self.sign * ray.inv_direction[i])
    }

    pub fn shadow_test(&self, ray: &Ray) -> bool {
        matches!(self.crossing(ray), Some(t) if t > EPSILON && t < 1.0)
    }

    pub fn hit_test<'a>(&'a self, ray: &Ray, max_time: f64, info: &mut HitInfo<'a>) -> bool {
        match self.crossing(ray) {
            Some(t) if t >= EPSILON && t <= max_time => {
                info.time = t;
                info.hit_point = ray.at(t);
                info.normal = self.axis.unit() * self.sign;
                info.material = self.material();
                true
            }
            _ => false,
        }
    }

    pub fn get_hits(&self, ray: &Ray, hits: &mut [Hit<'_>]) -> usize {
        let i = self.axis.index();
        half_space_hits(
            self.sign * ray.direction[i],
            self.sign * ray.origin[i] + self.offset,
            hits,
        )
    }

    pub fn get_normal(&self, _location: DVec3) -> DVec3 {
        self.axis.unit() * self.sign
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mat() -> Arc<Material> {
        Arc::new(Material::default())
    }

    #[test]
    fn test_plane_get_hits_sentinels() {
        // Floor: solid below y = 0.
        let floor = Plane::new(DVec3::Y, 0.0, mat());
        let mut hits = [Hit::default(); 2];

        // Falling into the floor: enter at t = 2, never leave.
        let down = Ray::new(DVec3::new(0.0, 2.0, 0.0), DVec3::NEG_Y);
        assert_eq!(floor.get_hits(&down, &mut hits), 2);
        assert!((hits[0].time - 2.0).abs() < 1e-12);
        assert_eq!(hits[1].time, f64::INFINITY);

        // Rising out of it: always inside until t = 2.
        let up = Ray::new(DVec3::new(0.0, -2.0, 0.0), DVec3::Y);
        assert_eq!(floor.get_hits(&up, &mut hits), 2);
        assert_eq!(hits[0].time, f64::NEG_INFINITY);
        assert!((hits[1].time - 2.0).abs() < 1e-12);

        // Parallel above: nothing. Parallel below: everything.
        let above = Ray::new(DVec3::new(0.0, 1.0, 0.0), DVec3::X);
        assert_eq!(floor.get_hits(&above, &mut hits), 0);
        let below = Ray::new(DVec3::new(0.0, -1.0, 0.0), DVec3::X);
        assert_eq!(floor.get_hits(&below, &mut hits), 2);
        assert_eq!(hits[0].time, f64::NEG_INFINITY);
        assert_eq!(hits[1].time, f64::INFINITY);
    }

    #[test]
    fn test_plane_new_normalizes() {
        let p = Plane::new(DVec3::new(0.0, 2.0, 0.0), -4.0, mat());
        assert_eq!(p.normal(), DVec3::Y);
        assert_eq!(p.offset(), -2.0);
    }

    #[test]
    fn test_zero_normal_plane_is_degenerate() {
        let p = Plane::new(DVec3::ZERO, 1.0, mat());
        assert!(p.is_degenerate());
        assert!(p.normal().is_finite());
        let ray = Ray::new(DVec3::new(0.0, 2.0, 0.0), DVec3::NEG_Y);
        let mut hits = [Hit::default(); 2];
        assert_eq!(p.get_hits(&ray, &mut hits), 0);
        let mut info = HitInfo::default();
        assert!(!p.hit_test(&ray, 100.0, &mut info));
        assert!(Shape::Plane(p).bounds().is_void());
        assert!(!Plane::new(DVec3::Y, 1.0, mat()).is_degenerate());
    }

    #[test]
    fn test_axis_plane_matches_generic_plane() {
        let generic = Plane::new(DVec3::NEG_Z, 3.0, mat());
        let Shape::AxisPlane(special) = generic.clone().specialize() else {
            panic!("normal -Z should specialize");
        };
        assert_eq!(special.axis(), Axis::Z);
        assert_eq!(special.position(), 3.0);

        let ray = Ray::new(DVec3::new(0.3, -0.2, 0.0), DVec3::new(0.1, 0.2, 1.0));
        let mut a = [Hit::default(); 2];
        let mut b = [Hit::default(); 2];
        assert_eq!(generic.get_hits(&ray, &mut a), special.get_hits(&ray, &mut b));
        assert!((a[0].time - b[0].time).abs() < 1e-12);
        assert_eq!(a[1].time, b[1].time);

        let mut info_a = HitInfo::default();
        let mut info_b = HitInfo::default();
        assert!(generic.hit_test(&ray, 100.0, &mut info_a));
        assert!(special.hit_test(&ray, 100.0, &mut info_b));
        assert!((info_a.time - 3.0).abs() < 1e-12);
        assert!((info_a.time - info_b.time).abs() < 1e-12);
        assert_eq!(info_a.normal, info_b.normal);
    }

    #[test]
    fn test_plane_specialize_requires_tolerance() {
        let tilted = Plane::new(DVec3::new(0.01, 1.0, 0.0), 0.0, mat());
        assert!(matches!(tilted.specialize(), Shape::Plane(_)));

        let nearly = Plane::new(DVec3::new(1e-12, 1.0, 0.0), 0.0, mat());
        assert!(matches!(nearly.specialize(), Shape::AxisPlane(_)));
    }

    #[test]
    fn test_plane_transformed() {
        // Floor moved up by 2 and turned on its side.
        let floor = Plane::new(DVec3::Y, 0.0, mat());
        let lifted = floor.clone().transformed(&Affine::translation(DVec3::new(0.0, 2.0, 0.0)));
        assert!((lifted.normal() - DVec3::Y).length() < 1e-12);
        assert!((lifted.offset() + 2.0).abs() < 1e-12);

        let turned = floor.transformed(&Affine::rotation(DVec3::Z, std::f64::consts::FRAC_PI_2));
        assert!((turned.normal() - DVec3::NEG_X).length() < 1e-12);
        assert!(turned.offset().abs() < 1e-12);
    }

    #[test]
    fn test_plane_shadow_window() {
        let floor = Plane::new(DVec3::Y, 0.0, mat());
        let light_above = Ray::between(DVec3::new(0.0, 1.0, 0.0), DVec3::new(0.0, 5.0, 0.0));
        assert!(!floor.shadow_test(&light_above));
        let light_below = Ray::between(DVec3::new(0.0, 1.0, 0.0), DVec3::new(0.0, -5.0, 0.0));
        assert!(floor.shadow_test(&light_below));
    }
}
