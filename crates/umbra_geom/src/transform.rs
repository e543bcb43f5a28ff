//! Affine transform nodes.
//!
//! A [`Transform`] maps incoming rays into its child's local space with the
//! inverse matrix and maps results back. Hit times are shared by both
//! spaces because rays are never renormalized.

use umbra_math::{Bounds, DMat4, DVec3, MatrixKind, Ray, TransformExt, EPSILON};

use crate::shape::{Hit, HitInfo, Shape, TransformSupport};

/// An invertible affine matrix with its cached inverse and class.
#[derive(Debug, Clone, PartialEq)]
pub struct Affine {
    pub matrix: DMat4,
    pub inverse: DMat4,
    pub kind: MatrixKind,
}

impl Affine {
    /// Wrap a matrix without inspecting it. The class stays `Affine` until
    /// [`Affine::reclassify`] runs.
    pub fn new(matrix: DMat4) -> Self {
        Self {
            matrix,
            inverse: matrix.inverse(),
            kind: MatrixKind::Affine,
        }
    }

    /// Wrap a matrix and classify it right away.
    pub fn classified(matrix: DMat4) -> Self {
        Self {
            matrix,
            inverse: matrix.inverse(),
            kind: matrix.kind(),
        }
    }

    pub fn identity() -> Self {
        Self {
            matrix: DMat4::IDENTITY,
            inverse: DMat4::IDENTITY,
            kind: MatrixKind::Identity,
        }
    }

    /// Rotation of `angle` radians around `axis`.
    pub fn rotation(axis: DVec3, angle: f64) -> Self {
        Self::classified(DMat4::from_axis_angle(axis.normalize(), angle))
    }

    pub fn scale(factors: DVec3) -> Self {
        Self::classified(DMat4::from_scale(factors))
    }

    pub fn translation(offset: DVec3) -> Self {
        Self::classified(DMat4::from_translation(offset))
    }

    /// `self` followed by `outer`.
    pub fn then(&self, outer: &Affine) -> Affine {
        let matrix = outer.matrix * self.matrix;
        Self {
            matrix,
            inverse: self.inverse * outer.inverse,
            kind: matrix.kind(),
        }
    }

    /// Recompute the class from the matrix. Returns true if it changed.
    pub fn reclassify(&mut self) -> bool {
        let kind = self.matrix.kind();
        let changed = kind != self.kind;
        self.kind = kind;
        changed
    }

    pub fn is_identity(&self) -> bool {
        self.kind == MatrixKind::Identity
    }

    /// True when the matrix flattens space, so that it has no usable
    /// inverse. The determinant is weighed against the column lengths, so
    /// small but regular scales still count as invertible.
    pub fn is_singular(&self) -> bool {
        let linear = self.matrix.linear();
        let volume = linear.x_axis.length() * linear.y_axis.length() * linear.z_axis.length();
        !(linear.determinant().abs() > EPSILON * volume)
    }
}

/// A shape seen through an affine transform. A singular transform encloses
/// nothing and never reports a hit.
#[derive(Debug, Clone)]
pub struct Transform {
    shape: Box<Shape>,
    affine: Affine,
    bounds: Bounds,
}

impl Transform {
    pub fn new(shape: Shape, affine: Affine) -> Self {
        let bounds = if affine.is_singular() {
            Bounds::Void
        } else {
            transformed_bounds(&shape, &affine)
        };
        Self {
            shape: Box::new(shape),
            affine,
            bounds,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub(crate) fn shape_mut(&mut self) -> &mut Shape {
        &mut self.shape
    }

    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    pub fn into_parts(self) -> (Shape, Affine) {
        (*self.shape, self.affine)
    }

    /// Merge an enclosing transform into this node.
    pub fn compose(self, outer: &Affine) -> Transform {
        let affine = self.affine.then(outer);
        Transform::new(*self.shape, affine)
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    #[inline]
    fn local_ray(&self, ray: &Ray) -> Ray {
        ray.transform(&self.affine.inverse)
    }

    #[inline]
    fn world_normal(&self, local_normal: DVec3) -> DVec3 {
        self.affine
            .inverse
            .transform_normal(local_normal)
            .normalize_or_zero()
    }

    pub fn shadow_test(&self, ray: &Ray) -> bool {
        !self.bounds.is_void() && self.shape.shadow_test(&self.local_ray(ray))
    }

    pub fn hit_test<'a>(&'a self, ray: &Ray, max_time: f64, info: &mut HitInfo<'a>) -> bool {
        if self.bounds.is_void() || !self.shape.hit_test(&self.local_ray(ray), max_time, info) {
            return false;
        }
        info.hit_point = ray.at(info.time);
        info.normal = self.world_normal(info.normal);
        true
    }

    /// Hits of the child in local space. Over a composite, the normals are
    /// resolved here, since the hit owners answer in local coordinates.
    pub fn get_hits<'a>(&'a self, ray: &Ray, hits: &mut [Hit<'a>]) -> usize {
        if self.bounds.is_void() {
            return 0;
        }
        let local = self.local_ray(ray);
        let count = self.shape.get_hits(&local, hits);
        if !self.shape.owns_normals() {
            for hit in &mut hits[..count] {
                let normal = hit.normal_at(local.at(hit.time));
                hit.normal = Some(self.world_normal(normal));
                hit.negated = false;
            }
        }
        count
    }

    pub fn get_normal(&self, location: DVec3) -> DVec3 {
        let local = self.affine.inverse.transform_point3(location);
        self.world_normal(self.shape.get_normal(local))
    }
}

/// Bounds of `shape` seen through `affine`. When the whole subtree can
/// absorb the transform, the box of the folded subtree is used: it is exact
/// for rotated spheres and tori, where a rotated box is not.
fn transformed_bounds(shape: &Shape, affine: &Affine) -> Bounds {
    let mut problems = 0;
    match shape.can_transform(affine, &mut problems) {
        TransformSupport::Ok => shape.clone().apply_transform(affine).bounds(),
        _ => shape.bounds().transform(&affine.matrix),
    }
}
