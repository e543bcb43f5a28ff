//! The shape protocol: `Shape`, `Hit` and `HitInfo`.
//!
//! Every shape answers two families of queries:
//!
//! - the fast path, [`Shape::shadow_test`] and [`Shape::hit_test`], used
//!   when only the closest surface (or any surface) matters;
//! - the CSG path, [`Shape::get_hits`] and [`Shape::get_normal`], used by
//!   boolean composites that need the full ordered list of enter/exit times.
//!
//! The tree is a sum type: each query is a single `match` over the variants.

use std::sync::Arc;

use umbra_math::{Bounds, DMat4, DVec3, MatrixKind, Ray, EPSILON};

use crate::csg::{Difference, Intersection, Union};
use crate::material::{Material, DEFAULT_MATERIAL};
use crate::plane::{Axis, AxisPlane, Plane};
use crate::sphere::Sphere;
use crate::torus::Torus;
use crate::transform::{Affine, Transform};

/// A boundary crossing reported by [`Shape::get_hits`].
///
/// Hits come in enter/exit pairs. Unbounded solids use infinite times for
/// the missing side of a pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hit<'a> {
    /// Ray parameter of the crossing
    pub time: f64,
    /// Node able to compute the normal at this crossing, in the coordinate
    /// space of the composite that receives the hit
    pub shape: Option<&'a Shape>,
    /// Normal already resolved by a transform node
    pub normal: Option<DVec3>,
    /// Set when the normal must be flipped (subtrahend of a difference)
    pub negated: bool,
}

impl<'a> Hit<'a> {
    pub fn new(time: f64) -> Self {
        Self {
            time,
            ..Default::default()
        }
    }

    /// Outward normal at `location`, with negation applied.
    pub fn normal_at(&self, location: DVec3) -> DVec3 {
        let normal = match (self.normal, self.shape) {
            (Some(n), _) => n,
            (None, Some(shape)) => shape.get_normal(location),
            (None, None) => DVec3::ZERO,
        };
        if self.negated {
            -normal
        } else {
            normal
        }
    }

    /// Material of the owning leaf.
    pub fn material(&self) -> &'a Material {
        self.shape
            .and_then(Shape::material)
            .unwrap_or(&DEFAULT_MATERIAL)
    }
}

/// Surface data of the closest hit found by [`Shape::hit_test`].
#[derive(Debug, Clone)]
pub struct HitInfo<'a> {
    /// Parameter t where the intersection occurs
    pub time: f64,
    /// Point of intersection
    pub hit_point: DVec3,
    /// Outward surface normal (not flipped towards the ray)
    pub normal: DVec3,
    /// Material at the intersection point
    pub material: &'a Material,
}

impl<'a> Default for HitInfo<'a> {
    fn default() -> Self {
        Self {
            time: 0.0,
            hit_point: DVec3::ZERO,
            normal: DVec3::ZERO,
            material: &DEFAULT_MATERIAL,
        }
    }
}

impl<'a> HitInfo<'a> {
    /// Fill in surface data from a boundary picked out of a hit list.
    pub(crate) fn resolve(&mut self, ray: &Ray, hit: &Hit<'a>) {
        self.time = hit.time;
        self.hit_point = ray.at(hit.time);
        self.normal = hit.normal_at(self.hit_point);
        self.material = hit.material();
    }
}

/// Answer to "can this transform be folded into the shape's parameters?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformSupport {
    /// The shape absorbs the transform analytically.
    Ok,
    /// Some descendants can, others need a wrapper. The caller weighs the
    /// count of problematic descendants.
    Depends,
    /// Keep a generic transform node.
    Nope,
}

/// A node of the scene graph.
#[derive(Debug, Clone)]
pub enum Shape {
    Sphere(Sphere),
    Plane(Plane),
    AxisPlane(AxisPlane),
    Torus(Torus),
    Union(Union),
    Intersection(Intersection),
    Difference(Difference),
    Transform(Transform),
}

impl Shape {
    pub fn sphere(center: DVec3, radius: f64, material: Arc<Material>) -> Shape {
        Shape::Sphere(Sphere::new(center, radius, material))
    }

    /// Half-space `normal · p + offset <= 0`.
    pub fn plane(normal: DVec3, offset: f64, material: Arc<Material>) -> Shape {
        Shape::Plane(Plane::new(normal, offset, material))
    }

    /// Half-space below `axis = position` (or above, when `upward` is false).
    pub fn axis_plane(axis: Axis, position: f64, upward: bool, material: Arc<Material>) -> Shape {
        Shape::AxisPlane(AxisPlane::new(axis, position, upward, material))
    }

    pub fn torus(center: DVec3, major: f64, minor: f64, material: Arc<Material>) -> Shape {
        Shape::Torus(Torus::new(center, major, minor, material))
    }

    pub fn union(children: Vec<Shape>) -> Shape {
        Shape::Union(Union::new(children))
    }

    pub fn intersection(children: Vec<Shape>) -> Shape {
        Shape::Intersection(Intersection::new(children))
    }

    pub fn difference(minuend: Shape, subtrahend: Shape) -> Shape {
        Shape::Difference(Difference::new(minuend, subtrahend))
    }

    /// Wrap in a rotation of `angle` radians around `axis`.
    pub fn rotated(self, axis: DVec3, angle: f64) -> Shape {
        Shape::Transform(Transform::new(self, Affine::rotation(axis, angle)))
    }

    /// Wrap in an axis-aligned scale.
    pub fn scaled(self, factors: DVec3) -> Shape {
        Shape::Transform(Transform::new(self, Affine::scale(factors)))
    }

    /// Wrap in a translation.
    pub fn translated(self, offset: DVec3) -> Shape {
        Shape::Transform(Transform::new(self, Affine::translation(offset)))
    }

    /// Wrap in an arbitrary affine matrix.
    pub fn transformed(self, matrix: DMat4) -> Shape {
        Shape::Transform(Transform::new(self, Affine::new(matrix)))
    }

    /// Any surface with time strictly inside `(EPSILON, 1)`.
    ///
    /// The ray is scaled so that `t = 1` reaches the point being tested for
    /// visibility, usually a light.
    pub fn shadow_test(&self, ray: &Ray) -> bool {
        match self {
            Shape::Sphere(s) => s.shadow_test(ray),
            Shape::Plane(p) => p.shadow_test(ray),
            Shape::AxisPlane(p) => p.shadow_test(ray),
            Shape::Torus(t) => t.shadow_test(ray),
            Shape::Union(u) => u.shadow_test(ray),
            Shape::Intersection(i) => i.shadow_test(ray),
            Shape::Difference(d) => d.shadow_test(ray),
            Shape::Transform(t) => t.shadow_test(ray),
        }
    }

    /// Closest hit with time in `[EPSILON, max_time]`.
    ///
    /// Returns true if hit, and fills in the hit record.
    pub fn hit_test<'a>(&'a self, ray: &Ray, max_time: f64, info: &mut HitInfo<'a>) -> bool {
        match self {
            Shape::Sphere(s) => s.hit_test(ray, max_time, info),
            Shape::Plane(p) => p.hit_test(ray, max_time, info),
            Shape::AxisPlane(p) => p.hit_test(ray, max_time, info),
            Shape::Torus(t) => t.hit_test(ray, max_time, info),
            Shape::Union(u) => u.hit_test(ray, max_time, info),
            Shape::Intersection(i) => i.hit_test(ray, max_time, info),
            Shape::Difference(d) => d.hit_test(ray, max_time, info),
            Shape::Transform(t) => t.hit_test(ray, max_time, info),
        }
    }

    /// Write every enter/exit time along the whole line into `hits`,
    /// ascending, and return how many were written.
    ///
    /// `hits` must hold at least [`Shape::max_hits`] entries.
    pub fn get_hits<'a>(&'a self, ray: &Ray, hits: &mut [Hit<'a>]) -> usize {
        let count = match self {
            Shape::Sphere(s) => s.get_hits(ray, hits),
            Shape::Plane(p) => p.get_hits(ray, hits),
            Shape::AxisPlane(p) => p.get_hits(ray, hits),
            Shape::Torus(t) => t.get_hits(ray, hits),
            Shape::Union(u) => return u.get_hits(ray, hits),
            Shape::Intersection(i) => return i.get_hits(ray, hits),
            Shape::Difference(d) => return d.get_hits(ray, hits),
            Shape::Transform(t) if t.shape().owns_normals() => t.get_hits(ray, hits),
            // Normals were resolved eagerly, keep the leaf owners.
            Shape::Transform(t) => return t.get_hits(ray, hits),
        };
        for hit in &mut hits[..count] {
            hit.shape = Some(self);
        }
        count
    }

    /// Outward unit normal at a point of the surface.
    ///
    /// Composites never own a hit and answer with a zero vector.
    pub fn get_normal(&self, location: DVec3) -> DVec3 {
        match self {
            Shape::Sphere(s) => s.get_normal(location),
            Shape::Plane(p) => p.get_normal(location),
            Shape::AxisPlane(p) => p.get_normal(location),
            Shape::Torus(t) => t.get_normal(location),
            Shape::Transform(t) => t.get_normal(location),
            Shape::Union(_) | Shape::Intersection(_) | Shape::Difference(_) => DVec3::ZERO,
        }
    }

    /// Worst-case number of entries written by [`Shape::get_hits`].
    pub fn max_hits(&self) -> usize {
        match self {
            Shape::Sphere(_) | Shape::Plane(_) | Shape::AxisPlane(_) => 2,
            Shape::Torus(_) => 4,
            Shape::Union(u) => u.max_hits(),
            Shape::Intersection(i) => i.max_hits(),
            Shape::Difference(d) => d.max_hits(),
            Shape::Transform(t) => t.shape().max_hits(),
        }
    }

    pub fn bounds(&self) -> Bounds {
        match self {
            Shape::Sphere(s) => s.bounds(),
            Shape::Plane(p) if p.is_degenerate() => Bounds::Void,
            Shape::Plane(_) | Shape::AxisPlane(_) => Bounds::Universe,
            Shape::Torus(t) => t.bounds(),
            Shape::Union(u) => u.bounds(),
            Shape::Intersection(i) => i.bounds(),
            Shape::Difference(d) => d.bounds(),
            Shape::Transform(t) => t.bounds(),
        }
    }

    /// Material of a leaf, seen through any transforms.
    pub fn material(&self) -> Option<&Material> {
        match self {
            Shape::Sphere(s) => Some(s.material()),
            Shape::Plane(p) => Some(p.material()),
            Shape::AxisPlane(p) => Some(p.material()),
            Shape::Torus(t) => Some(t.material()),
            Shape::Transform(t) => t.shape().material(),
            Shape::Union(_) | Shape::Intersection(_) | Shape::Difference(_) => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Shape::Sphere(_) | Shape::Plane(_) | Shape::AxisPlane(_) | Shape::Torus(_)
        )
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            Shape::Union(_) | Shape::Intersection(_) | Shape::Difference(_)
        )
    }

    /// True when [`Shape::get_normal`] is meaningful for hits produced by
    /// this node: leaves, and transforms over leaves.
    pub fn owns_normals(&self) -> bool {
        match self {
            Shape::Transform(t) => t.shape().owns_normals(),
            other => other.is_primitive(),
        }
    }

    /// Number of nodes in the subtree.
    pub fn node_count(&self) -> usize {
        1 + match self {
            Shape::Union(u) => u.children().iter().map(Shape::node_count).sum(),
            Shape::Intersection(i) => i.children().iter().map(Shape::node_count).sum(),
            Shape::Difference(d) => d.minuend().node_count() + d.subtrahend().node_count(),
            Shape::Transform(t) => t.shape().node_count(),
            _ => 0,
        }
    }

    /// Whether fast-path queries run a bounds pre-check first.
    pub fn is_checking(&self) -> bool {
        match self {
            Shape::Union(u) => u.check.enabled,
            Shape::Intersection(i) => i.check.enabled,
            Shape::Difference(d) => d.check.enabled,
            _ => false,
        }
    }

    /// Whether the bounds pre-check can still be switched. It cannot once it
    /// has been negotiated by [`Shape::initialize`].
    pub fn is_check_modifiable(&self) -> bool {
        match self {
            Shape::Union(u) => !u.check.locked,
            Shape::Intersection(i) => !i.check.locked,
            Shape::Difference(d) => !d.check.locked,
            _ => false,
        }
    }

    /// Turn the bounds pre-check on or off. Returns false when the node has
    /// no check or the check is locked.
    pub fn set_checking(&mut self, enabled: bool) -> bool {
        match self {
            Shape::Union(u) => u.check.set(enabled),
            Shape::Intersection(i) => i.check.set(enabled),
            Shape::Difference(d) => d.check.set(enabled),
            _ => false,
        }
    }

    /// Whether a rotation can be folded into this subtree.
    pub fn can_rotate(&self, rotation: &Affine, problems: &mut usize) -> TransformSupport {
        debug_assert!(rotation.kind != MatrixKind::Scale && rotation.kind != MatrixKind::Affine);
        self.can_transform(rotation, problems)
    }

    /// Whether an axis-aligned scale can be folded into this subtree.
    pub fn can_scale(&self, scale: &Affine, problems: &mut usize) -> TransformSupport {
        debug_assert!(scale.kind != MatrixKind::Rotation && scale.kind != MatrixKind::Affine);
        self.can_transform(scale, problems)
    }

    /// Whether `transform` can be folded into this subtree.
    ///
    /// Every leaf that cannot absorb it bumps `problems`.
    pub fn can_transform(&self, transform: &Affine, problems: &mut usize) -> TransformSupport {
        let leaf = |supported: bool, problems: &mut usize| {
            if supported {
                TransformSupport::Ok
            } else {
                *problems += 1;
                TransformSupport::Nope
            }
        };
        match self {
            Shape::Sphere(s) => leaf(s.supports(transform), problems),
            Shape::Plane(_) | Shape::AxisPlane(_) => TransformSupport::Ok,
            Shape::Torus(t) => leaf(t.supports(transform), problems),
            Shape::Transform(_) => TransformSupport::Ok,
            Shape::Union(u) => aggregate(u.children().iter(), transform, problems),
            Shape::Intersection(i) => aggregate(i.children().iter(), transform, problems),
            Shape::Difference(d) => aggregate(
                [d.minuend(), d.subtrahend()].into_iter(),
                transform,
                problems,
            ),
        }
    }

    /// Fold `transform` into this subtree. Leaves that cannot absorb it,
    /// and whole subtrees answering `Nope`, get a transform node.
    pub fn apply_transform(self, transform: &Affine) -> Shape {
        if transform.kind == MatrixKind::Identity {
            return self;
        }
        match self {
            Shape::Sphere(s) if s.supports(transform) => Shape::Sphere(s.transformed(transform)),
            Shape::Torus(t) if t.supports(transform) => Shape::Torus(t.transformed(transform)),
            Shape::Plane(p) => p.transformed(transform).specialize(),
            Shape::AxisPlane(p) => p.to_plane().transformed(transform).specialize(),
            Shape::Union(u) => Shape::Union(u.map_children(|c| c.fold_or_wrap(transform))),
            Shape::Intersection(i) => {
                Shape::Intersection(i.map_children(|c| c.fold_or_wrap(transform)))
            }
            Shape::Difference(d) => {
                Shape::Difference(d.map_children(|c| c.fold_or_wrap(transform)))
            }
            Shape::Transform(t) => Shape::Transform(t.compose(transform)),
            leaf => Shape::Transform(Transform::new(leaf, transform.clone())),
        }
    }

    fn fold_or_wrap(self, transform: &Affine) -> Shape {
        let mut problems = 0;
        match self.can_transform(transform, &mut problems) {
            TransformSupport::Nope => Shape::Transform(Transform::new(self, transform.clone())),
            _ => self.apply_transform(transform),
        }
    }
}

fn aggregate<'a>(
    children: impl Iterator<Item = &'a Shape>,
    transform: &Affine,
    problems: &mut usize,
) -> TransformSupport {
    let mut ok = 0;
    let mut nope = 0;
    let mut total = 0;
    for child in children {
        total += 1;
        match child.can_transform(transform, problems) {
            TransformSupport::Ok => ok += 1,
            TransformSupport::Nope => nope += 1,
            TransformSupport::Depends => {}
        }
    }
    if ok == total {
        TransformSupport::Ok
    } else if nope == total {
        TransformSupport::Nope
    } else {
        TransformSupport::Depends
    }
}

/// First boundary of a sorted hit list with a finite time in
/// `[EPSILON, max_time]`.
pub(crate) fn first_hit<'h, 'a>(hits: &'h [Hit<'a>], max_time: f64) -> Option<&'h Hit<'a>> {
    hits.iter()
        .find(|h| h.time >= EPSILON && h.time <= max_time && h.time.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mat() -> Arc<Material> {
        Arc::new(Material::default())
    }

    #[test]
    fn test_hit_normal_negation() {
        let sphere = Shape::sphere(DVec3::ZERO, 1.0, mat());
        let mut hit = Hit::new(1.0);
        hit.shape = Some(&sphere);
        assert_eq!(hit.normal_at(DVec3::X), DVec3::X);
        hit.negated = true;
        assert_eq!(hit.normal_at(DVec3::X), DVec3::NEG_X);

        hit.normal = Some(DVec3::Y);
        assert_eq!(hit.normal_at(DVec3::X), DVec3::NEG_Y);
    }

    #[test]
    fn test_hit_material_falls_back_to_default() {
        let hit = Hit::new(1.0);
        assert_eq!(hit.material(), &DEFAULT_MATERIAL);
    }

    #[test]
    fn test_max_hits_sums_children() {
        let u = Shape::union(vec![
            Shape::sphere(DVec3::ZERO, 1.0, mat()),
            Shape::torus(DVec3::ZERO, 2.0, 0.5, mat()),
            Shape::plane(DVec3::Y, 0.0, mat()),
        ]);
        assert_eq!(u.max_hits(), 8);
        let d = Shape::difference(u, Shape::sphere(DVec3::ZERO, 0.5, mat()));
        assert_eq!(d.max_hits(), 10);
    }

    #[test]
    fn test_can_transform_aggregates() {
        let spin = Affine::rotation(DVec3::X, 0.5);
        let mut problems = 0;
        let ball = Shape::sphere(DVec3::ZERO, 1.0, mat());
        assert_eq!(ball.can_rotate(&spin, &mut problems), TransformSupport::Ok);

        // A torus only rotates about its own axis.
        let ring = Shape::torus(DVec3::ZERO, 2.0, 0.5, mat());
        assert_eq!(ring.can_rotate(&spin, &mut problems), TransformSupport::Nope);
        assert_eq!(problems, 1);

        let mixed = Shape::union(vec![ball.clone(), ring.clone()]);
        let mut problems = 0;
        assert_eq!(mixed.can_rotate(&spin, &mut problems), TransformSupport::Depends);
        assert_eq!(problems, 1);

        let squash = Affine::scale(DVec3::new(1.0, 2.0, 1.0));
        let both = Shape::union(vec![ball, ring]);
        let mut problems = 0;
        assert_eq!(both.can_scale(&squash, &mut problems), TransformSupport::Nope);
        assert_eq!(problems, 2);
    }

    #[test]
    fn test_owns_normals() {
        let ball = Shape::sphere(DVec3::ZERO, 1.0, mat());
        assert!(ball.owns_normals());
        let moved = ball.clone().scaled(DVec3::new(1.0, 2.0, 3.0));
        assert!(moved.owns_normals());
        let group = Shape::union(vec![ball]).scaled(DVec3::splat(2.0));
        assert!(!group.owns_normals());
    }

    #[test]
    fn test_node_count() {
        let tree = Shape::difference(
            Shape::union(vec![
                Shape::sphere(DVec3::ZERO, 1.0, mat()),
                Shape::sphere(DVec3::X, 1.0, mat()),
            ]),
            Shape::sphere(DVec3::ZERO, 0.5, mat()).translated(DVec3::Y),
        );
        assert_eq!(tree.node_count(), 6);
    }
}
