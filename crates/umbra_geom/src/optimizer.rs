//! Scene graph rewriting.
//!
//! Three pure passes run before rendering, each taking the tree by value and
//! returning the rewritten tree:
//!
//! 1. [`simplify`] removes structure that cannot affect the image.
//! 2. [`substitute`] swaps nodes for cheaper equivalents.
//! 3. [`propagate_transforms`] folds transforms into the primitives below
//!    them where possible.
//!
//! [`Shape::initialize`] then settles each composite's bounds pre-check.

use log::{debug, info, warn};
use umbra_math::{Bounds, DVec3, MatrixKind, TransformExt, EPSILON};

use crate::csg::{BoundsCheck, Difference, Intersection, Union};
use crate::shape::{Shape, TransformSupport};
use crate::transform::{Affine, Transform};

/// Scene data visible to [`Shape::initialize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InitContext {
    /// Camera location, in the coordinate space of the node being
    /// initialized.
    pub camera: Option<DVec3>,
}

impl InitContext {
    pub fn new(camera: DVec3) -> Self {
        Self {
            camera: Some(camera),
        }
    }
}

/// A shape that encloses nothing.
fn empty() -> Shape {
    Shape::Union(Union::new(Vec::new()))
}

/// True for shapes that can never be hit.
fn is_degenerate(shape: &Shape) -> bool {
    shape.bounds().is_void()
}

/// Flatten nested composites, drop shapes that enclose nothing, collapse
/// composites with a single child, and remove or merge trivial transforms.
pub fn simplify(shape: Shape) -> Shape {
    match shape {
        Shape::Union(u) => {
            let mut children = Vec::with_capacity(u.children().len());
            for child in u.into_children().into_iter().map(simplify) {
                match child {
                    Shape::Union(inner) => children.extend(inner.into_children()),
                    child if is_degenerate(&child) => {}
                    child => children.push(child),
                }
            }
            collapse(children, |c| Shape::Union(Union::new(c)))
        }
        Shape::Intersection(i) => {
            let mut children = Vec::with_capacity(i.children().len());
            for child in i.into_children().into_iter().map(simplify) {
                match child {
                    Shape::Intersection(inner) if !inner.children().is_empty() => {
                        children.extend(inner.into_children())
                    }
                    child if is_degenerate(&child) => return empty(),
                    child => children.push(child),
                }
            }
            match collapse(children, |c| Shape::Intersection(Intersection::new(c))) {
                result if is_degenerate(&result) => empty(),
                result => result,
            }
        }
        Shape::Difference(d) => {
            let (minuend, subtrahend) = d.into_parts();
            let minuend = simplify(minuend);
            let subtrahend = simplify(subtrahend);
            if is_degenerate(&minuend) {
                empty()
            } else if is_degenerate(&subtrahend)
                || (minuend.bounds() * subtrahend.bounds()).is_void()
            {
                minuend
            } else {
                Shape::Difference(Difference::new(minuend, subtrahend))
            }
        }
        Shape::Transform(t) if t.affine().is_singular() => {
            warn!("dropping singular {:?} transform", t.affine().kind);
            empty()
        }
        Shape::Transform(t) => {
            let (child, affine) = t.into_parts();
            let child = simplify(child);
            if is_degenerate(&child) {
                return empty();
            }
            match child {
                Shape::Transform(inner) => {
                    let merged = inner.compose(&affine);
                    if merged.affine().is_singular() {
                        warn!("dropping singular composed transform");
                        empty()
                    } else if merged.affine().is_identity() {
                        merged.into_parts().0
                    } else {
                        Shape::Transform(merged)
                    }
                }
                child if affine.matrix.kind() == MatrixKind::Identity => child,
                child => Shape::Transform(Transform::new(child, affine)),
            }
        }
        Shape::Sphere(s) if s.radius() <= EPSILON => {
            warn!("dropping sphere with radius {}", s.radius());
            empty()
        }
        Shape::Plane(p) if p.is_degenerate() => {
            warn!("dropping plane with a zero-length normal");
            empty()
        }
        Shape::Torus(t) if t.minor_radius() <= EPSILON => {
            warn!("dropping torus with minor radius {}", t.minor_radius());
            empty()
        }
        leaf => leaf,
    }
}

fn collapse(mut children: Vec<Shape>, build: impl FnOnce(Vec<Shape>) -> Shape) -> Shape {
    if children.len() == 1 {
        if let Some(only) = children.pop() {
            return only;
        }
    }
    build(children)
}

/// Replace nodes by cheaper equivalents: axis-aligned planes become
/// [`AxisPlane`](crate::AxisPlane)s and transform matrices get classified.
pub fn substitute(shape: Shape) -> Shape {
    match shape {
        Shape::Plane(p) => p.specialize(),
        Shape::Union(u) => Shape::Union(u.map_children(substitute)),
        Shape::Intersection(i) => Shape::Intersection(i.map_children(substitute)),
        Shape::Difference(d) => Shape::Difference(d.map_children(substitute)),
        Shape::Transform(t) => {
            let (child, mut affine) = t.into_parts();
            if affine.reclassify() {
                debug!("transform reclassified as {:?}", affine.kind);
            }
            Shape::Transform(Transform::new(substitute(child), affine))
        }
        leaf => leaf,
    }
}

/// Push transforms down into the leaves, bottom-up.
pub fn propagate_transforms(shape: Shape) -> Shape {
    match shape {
        Shape::Union(u) => Shape::Union(u.map_children(propagate_transforms)),
        Shape::Intersection(i) => Shape::Intersection(i.map_children(propagate_transforms)),
        Shape::Difference(d) => Shape::Difference(d.map_children(propagate_transforms)),
        Shape::Transform(t) => {
            let (child, affine) = t.into_parts();
            fold(propagate_transforms(child), affine)
        }
        leaf => leaf,
    }
}

fn fold(child: Shape, affine: Affine) -> Shape {
    if affine.is_identity() {
        return child;
    }
    if affine.is_singular() {
        return Shape::Transform(Transform::new(child, affine));
    }
    // A transform left in place below this one merges into a single node.
    let child = match child {
        Shape::Transform(inner) => {
            let (grandchild, inner_affine) = inner.into_parts();
            return fold(grandchild, inner_affine.then(&affine));
        }
        child => child,
    };

    let mut problems = 0;
    let support = match affine.kind {
        MatrixKind::Identity | MatrixKind::Translation | MatrixKind::Rotation => {
            child.can_rotate(&affine, &mut problems)
        }
        MatrixKind::Scale => child.can_scale(&affine, &mut problems),
        MatrixKind::Affine => child.can_transform(&affine, &mut problems),
    };
    match support {
        TransformSupport::Ok => child.apply_transform(&affine),
        TransformSupport::Depends if problems <= 1 => child.apply_transform(&affine),
        _ => {
            debug!(
                "keeping {:?} transform over {} nodes ({} problems)",
                affine.kind,
                child.node_count(),
                problems
            );
            Shape::Transform(Transform::new(child, affine))
        }
    }
}

/// Run every pass, then initialize the result.
pub fn optimize(shape: Shape, ctx: &InitContext) -> Shape {
    let before = shape.node_count();
    let shape = simplify(shape);
    debug!("simplify: {} -> {} nodes", before, shape.node_count());
    let shape = substitute(shape);
    let mut shape = propagate_transforms(shape);
    shape.initialize(ctx, false, false, None);
    info!(
        "optimized scene: {} -> {} nodes, {} bounds checks",
        before,
        shape.node_count(),
        count_checks(&shape)
    );
    shape
}

fn count_checks(shape: &Shape) -> usize {
    let own = usize::from(shape.is_checking());
    own + match shape {
        Shape::Union(u) => u.children().iter().map(count_checks).sum(),
        Shape::Intersection(i) => i.children().iter().map(count_checks).sum(),
        Shape::Difference(d) => count_checks(d.minuend()) + count_checks(d.subtrahend()),
        Shape::Transform(t) => count_checks(t.shape()),
        _ => 0,
    }
}

/// Decide and lock a composite's check. Returns the resulting setting.
fn negotiate(
    check: &mut BoundsCheck,
    bounds: Bounds,
    ctx: &InitContext,
    in_csg: bool,
    checked: Option<Bounds>,
) -> bool {
    if check.locked {
        return check.enabled;
    }
    let redundant = in_csg
        || bounds.is_universe()
        || checked.is_some_and(|outer| bounds.contains_bounds(&outer))
        || ctx.camera.is_some_and(|eye| bounds.contains(eye));
    check.lock(!redundant);
    check.enabled
}

impl Shape {
    /// Settle scene-dependent state once the tree is final.
    ///
    /// `in_csg` is set below intersections and differences, whose children
    /// are only reached through [`Shape::get_hits`]. `in_transform` is set
    /// below any transform. `checked` carries the bounds of the nearest
    /// ancestor that keeps its pre-check, in this node's coordinate space.
    pub fn initialize(
        &mut self,
        ctx: &InitContext,
        in_csg: bool,
        in_transform: bool,
        checked: Option<Bounds>,
    ) {
        let ctx = if in_transform {
            InitContext::default()
        } else {
            *ctx
        };
        match self {
            Shape::Union(u) => {
                let bounds = u.bounds();
                let hint = if negotiate(&mut u.check, bounds, &ctx, in_csg, checked) {
                    Some(bounds)
                } else {
                    checked
                };
                for child in u.children_mut() {
                    child.initialize(&ctx, in_csg, in_transform, hint);
                }
            }
            Shape::Intersection(i) => {
                let bounds = i.bounds();
                let hint = if negotiate(&mut i.check, bounds, &ctx, in_csg, checked) {
                    Some(bounds)
                } else {
                    checked
                };
                for child in i.children_mut() {
                    child.initialize(&ctx, true, in_transform, hint);
                }
            }
            Shape::Difference(d) => {
                let bounds = d.bounds();
                let hint = if negotiate(&mut d.check, bounds, &ctx, in_csg, checked) {
                    Some(bounds)
                } else {
                    checked
                };
                let (minuend, subtrahend) = d.parts_mut();
                minuend.initialize(&ctx, true, in_transform, hint);
                subtrahend.initialize(&ctx, true, in_transform, hint);
            }
            Shape::Transform(t) => {
                t.shape_mut().initialize(&ctx, in_csg, true, None);
            }
            Shape::Sphere(_) | Shape::Plane(_) | Shape::AxisPlane(_) | Shape::Torus(_) => {}
        }
    }
}
