//! Umbra geometry core.
//!
//! Primitives, boolean composites and affine transforms share one
//! intersection protocol (see [`Shape`]). Before rendering, a scene graph is
//! rewritten by [`optimize`].

mod csg;
mod material;
mod optimizer;
mod plane;
mod shape;
mod sphere;
mod torus;
mod transform;

pub use csg::{BoundsCheck, Difference, Intersection, Union};
pub use material::{Material, DEFAULT_MATERIAL};
pub use optimizer::{optimize, propagate_transforms, simplify, substitute, InitContext};
pub use plane::{Axis, AxisPlane, Plane, AXIS_TOLERANCE};
pub use shape::{Hit, HitInfo, Shape, TransformSupport};
pub use sphere::Sphere;
pub use torus::Torus;
pub use transform::{Affine, Transform};
