use std::ops::{Add, Mul};

use crate::{DMat4, DVec3, Interval, Ray};

/// Axis-aligned bounding box.
///
/// Besides ordinary finite boxes, bounds can be `Void` (the empty set, the
/// neutral element of `+`) or `Universe` (unbounded, the neutral element of
/// `*`). Half-spaces and other infinite shapes report `Universe`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Bounds {
    Void,
    Universe,
    /// Invariant: `from <= to` on every axis.
    Finite { from: DVec3, to: DVec3 },
}

impl Bounds {
    /// Create a box from two arbitrary corner points.
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Bounds::Finite {
            from: a.min(b),
            to: a.max(b),
        }
    }

    /// Box enclosing a sphere.
    pub fn from_sphere(center: DVec3, radius: f64) -> Self {
        let r = DVec3::splat(radius.abs());
        Bounds::Finite {
            from: center - r,
            to: center + r,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Bounds::Void)
    }

    pub fn is_universe(&self) -> bool {
        matches!(self, Bounds::Universe)
    }

    /// Test if a ray crosses the box with some parameter in `[0, max_time]`.
    ///
    /// Slab method. The window shrinks one axis at a time and the test bails
    /// out as soon as it becomes empty. The last axis only needs a comparison.
    pub fn intersects(&self, ray: &Ray, max_time: f64) -> bool {
        let (from, to) = match self {
            Bounds::Void => return false,
            Bounds::Universe => return true,
            Bounds::Finite { from, to } => (from, to),
        };
        let org = ray.origin;
        let inv = ray.inv_direction;

        // X axis
        let (t0, t1) = slab(from.x, to.x, org.x, inv.x);
        let mut t_min = t0.max(0.0);
        let mut t_max = t1.min(max_time);
        if t_max < t_min {
            return false;
        }

        // Y axis
        let (t0, t1) = slab(from.y, to.y, org.y, inv.y);
        if t0 > t_min {
            t_min = t0;
        }
        if t1 < t_max {
            t_max = t1;
        }
        if t_max < t_min {
            return false;
        }

        // Z axis
        let (t0, t1) = slab(from.z, to.z, org.z, inv.z);
        t0.max(t_min) <= t1.min(t_max)
    }

    /// Entry and exit parameters of the full line through the box,
    /// or `None` when the line misses it.
    pub fn slab_window(&self, ray: &Ray) -> Option<Interval> {
        let (from, to) = match self {
            Bounds::Void => return None,
            Bounds::Universe => return Some(Interval::UNIVERSE),
            Bounds::Finite { from, to } => (from, to),
        };
        let mut window = Interval::UNIVERSE;
        for axis in 0..3 {
            let (t0, t1) = slab(from[axis], to[axis], ray.origin[axis], ray.inv_direction[axis]);
            window.clip(t0, t1);
            if window.is_empty() {
                return None;
            }
        }
        Some(window)
    }

    /// Center of the box. Meaningless for `Void` and `Universe`, which
    /// report the origin.
    pub fn center(&self) -> DVec3 {
        match self {
            Bounds::Finite { from, to } => (*from + *to) * 0.5,
            _ => DVec3::ZERO,
        }
    }

    /// Squared radius of the sphere around the box centered at [`Bounds::center`].
    pub fn squared_radius(&self) -> f64 {
        match self {
            Bounds::Void => 0.0,
            Bounds::Universe => f64::INFINITY,
            Bounds::Finite { from, to } => ((*to - *from) * 0.5).length_squared(),
        }
    }

    /// Check whether a point lies inside or on the box.
    pub fn contains(&self, point: DVec3) -> bool {
        match self {
            Bounds::Void => false,
            Bounds::Universe => true,
            Bounds::Finite { from, to } => point.cmpge(*from).all() && point.cmple(*to).all(),
        }
    }

    /// Check whether `other` is entirely inside this box.
    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        match (self, other) {
            (_, Bounds::Void) => true,
            (Bounds::Universe, _) => true,
            (_, Bounds::Universe) | (Bounds::Void, _) => false,
            (Bounds::Finite { from, to }, Bounds::Finite { from: f2, to: t2 }) => {
                f2.cmpge(*from).all() && t2.cmple(*to).all()
            }
        }
    }

    /// Bounds of this box after an affine transform.
    /// Computes the bounding box of all 8 transformed corners.
    pub fn transform(&self, matrix: &DMat4) -> Bounds {
        let (from, to) = match self {
            Bounds::Finite { from, to } => (*from, *to),
            other => return *other,
        };
        let corners = [
            DVec3::new(from.x, from.y, from.z),
            DVec3::new(to.x, from.y, from.z),
            DVec3::new(from.x, to.y, from.z),
            DVec3::new(to.x, to.y, from.z),
            DVec3::new(from.x, from.y, to.z),
            DVec3::new(to.x, from.y, to.z),
            DVec3::new(from.x, to.y, to.z),
            DVec3::new(to.x, to.y, to.z),
        ];

        let first = matrix.transform_point3(corners[0]);
        let (lo, hi) = corners[1..]
            .iter()
            .map(|&c| matrix.transform_point3(c))
            .fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Bounds::Finite { from: lo, to: hi }
    }

    /// Translate the box by an offset vector.
    pub fn translate(&self, offset: DVec3) -> Bounds {
        match self {
            Bounds::Finite { from, to } => Bounds::Finite {
                from: *from + offset,
                to: *to + offset,
            },
            other => *other,
        }
    }
}

#[inline]
fn slab(lo: f64, hi: f64, origin: f64, inv: f64) -> (f64, f64) {
    let t0 = (lo - origin) * inv;
    let t1 = (hi - origin) * inv;
    if inv < 0.0 {
        (t1, t0)
    } else {
        (t0, t1)
    }
}

impl Add for Bounds {
    type Output = Bounds;

    /// Smallest box holding both operands.
    fn add(self, other: Bounds) -> Bounds {
        match (self, other) {
            (Bounds::Void, b) | (b, Bounds::Void) => b,
            (Bounds::Universe, _) | (_, Bounds::Universe) => Bounds::Universe,
            (Bounds::Finite { from: f1, to: t1 }, Bounds::Finite { from: f2, to: t2 }) => {
                Bounds::Finite {
                    from: f1.min(f2),
                    to: t1.max(t2),
                }
            }
        }
    }
}

impl Mul for Bounds {
    type Output = Bounds;

    /// Overlap of both operands.
    fn mul(self, other: Bounds) -> Bounds {
        match (self, other) {
            (Bounds::Void, _) | (_, Bounds::Void) => Bounds::Void,
            (Bounds::Universe, b) | (b, Bounds::Universe) => b,
            (Bounds::Finite { from: f1, to: t1 }, Bounds::Finite { from: f2, to: t2 }) => {
                let from = f1.max(f2);
                let to = t1.min(t2);
                if from.cmple(to).all() {
                    Bounds::Finite { from, to }
                } else {
                    Bounds::Void
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn unit_box() -> Bounds {
        Bounds::new(DVec3::ZERO, DVec3::ONE)
    }

    #[test]
    fn test_bounds_new_orders_corners() {
        let b = Bounds::new(DVec3::new(1.0, -1.0, 5.0), DVec3::new(-1.0, 1.0, 2.0));
        assert_eq!(
            b,
            Bounds::Finite {
                from: DVec3::new(-1.0, -1.0, 2.0),
                to: DVec3::new(1.0, 1.0, 5.0),
            }
        );
    }

    #[test]
    fn test_bounds_slab_exactness() {
        let ray = Ray::new(DVec3::new(-1.0, 0.5, 0.5), DVec3::X);
        assert!(unit_box().intersects(&ray, 10.0));

        let window = unit_box().slab_window(&ray).unwrap();
        assert!((window.min - 1.0).abs() < 1e-12);
        assert!((window.max - 2.0).abs() < 1e-12);

        // Unnormalized direction halves the parameters.
        let ray = Ray::new(DVec3::new(-1.0, 0.5, 0.5), DVec3::new(2.0, 0.0, 0.0));
        let window = unit_box().slab_window(&ray).unwrap();
        assert!((window.min - 0.5).abs() < 1e-12);
        assert!((window.max - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bounds_slab_respects_max_time() {
        let ray = Ray::new(DVec3::new(-1.0, 0.5, 0.5), DVec3::X);
        assert!(!unit_box().intersects(&ray, 0.5));
        assert!(unit_box().intersects(&ray, 1.0));
    }

    #[test]
    fn test_bounds_slab_misses() {
        // Pointing away
        let ray = Ray::new(DVec3::new(-1.0, 0.5, 0.5), DVec3::NEG_X);
        assert!(!unit_box().intersects(&ray, 100.0));

        // Passing beside the box
        let ray = Ray::new(DVec3::new(-1.0, 2.0, 0.5), DVec3::X);
        assert!(!unit_box().intersects(&ray, 100.0));
        assert!(unit_box().slab_window(&ray).is_none());
    }

    #[test]
    fn test_bounds_slab_soundness_from_inside() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let mut vec_in = |lo: f64, hi: f64| {
                DVec3::new(rng.gen_range(lo..hi), rng.gen_range(lo..hi), rng.gen_range(lo..hi))
            };
            let a = vec_in(-5.0, 5.0);
            let size = vec_in(0.1, 3.0);
            let dir = vec_in(-1.0, 1.0);
            let t = vec_in(0.0, 1.0);
            let bounds = Bounds::new(a, a + size);
            let origin = a + size * t;
            let ray = Ray::new(origin, dir);
            assert!(bounds.intersects(&ray, rng.gen_range(1e-3..10.0)));
        }
    }

    #[test]
    fn test_bounds_void_and_universe() {
        let ray = Ray::new(DVec3::ZERO, DVec3::X);
        assert!(!Bounds::Void.intersects(&ray, 1.0));
        assert!(Bounds::Universe.intersects(&ray, 1.0));

        let b = unit_box();
        assert_eq!(b + Bounds::Void, b);
        assert_eq!(b * Bounds::Universe, b);
        assert_eq!(b + Bounds::Universe, Bounds::Universe);
        assert_eq!(b * Bounds::Void, Bounds::Void);
    }

    #[test]
    fn test_bounds_union_and_intersection() {
        let a = Bounds::new(DVec3::ZERO, DVec3::splat(5.0));
        let b = Bounds::new(DVec3::splat(3.0), DVec3::splat(10.0));
        assert_eq!(a + b, Bounds::new(DVec3::ZERO, DVec3::splat(10.0)));
        assert_eq!(a * b, Bounds::new(DVec3::splat(3.0), DVec3::splat(5.0)));

        let far = Bounds::new(DVec3::splat(20.0), DVec3::splat(21.0));
        assert_eq!(a * far, Bounds::Void);
    }

    #[test]
    fn test_bounds_sphere_equivalent() {
        let b = Bounds::new(DVec3::new(-1.0, -2.0, -2.0), DVec3::new(1.0, 2.0, 2.0));
        assert_eq!(b.center(), DVec3::ZERO);
        assert_eq!(b.squared_radius(), 9.0);
        assert_eq!(Bounds::Universe.squared_radius(), f64::INFINITY);
    }

    #[test]
    fn test_bounds_contains() {
        let outer = Bounds::new(DVec3::splat(-2.0), DVec3::splat(2.0));
        assert!(outer.contains(DVec3::ZERO));
        assert!(!outer.contains(DVec3::splat(3.0)));
        assert!(outer.contains_bounds(&unit_box()));
        assert!(!unit_box().contains_bounds(&outer));
        assert!(Bounds::Universe.contains_bounds(&outer));
        assert!(!outer.contains_bounds(&Bounds::Universe));
    }

    #[test]
    fn test_bounds_transform_rotation() {
        let b = Bounds::new(DVec3::new(0.0, 0.0, 0.0), DVec3::new(2.0, 1.0, 1.0));
        let m = DMat4::from_rotation_z(std::f64::consts::FRAC_PI_2);
        match b.transform(&m) {
            Bounds::Finite { from, to } => {
                assert!((from - DVec3::new(-1.0, 0.0, 0.0)).length() < 1e-12);
                assert!((to - DVec3::new(0.0, 2.0, 1.0)).length() < 1e-12);
            }
            other => panic!("unexpected bounds {:?}", other),
        }
        assert_eq!(Bounds::Universe.transform(&m), Bounds::Universe);
    }

    #[test]
    fn test_bounds_translate() {
        let moved = unit_box().translate(DVec3::new(5.0, 0.0, 0.0));
        assert_eq!(moved, Bounds::new(DVec3::new(5.0, 0.0, 0.0), DVec3::new(6.0, 1.0, 1.0)));
    }
}
