// Re-export glam for convenience
pub use glam::*;

// Umbra math types
mod bounds;
mod interval;
mod ray;
pub mod solver;
mod transform;

pub use bounds::Bounds;
pub use interval::Interval;
pub use ray::Ray;
pub use solver::Roots;
pub use transform::{MatrixKind, TransformExt};

/// Minimum ray parameter accepted as a hit. Guards against a surface
/// re-intersecting the ray that just left it.
pub const EPSILON: f64 = 1e-6;

/// Tolerance used when comparing geometric parameters for equality.
pub const TOLERANCE: f64 = 1e-9;

/// Colors are linear RGB triples.
pub type Color = DVec3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dvec3_operations() {
        let a = DVec3::new(1.0, 2.0, 3.0);
        let b = DVec3::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, DVec3::new(5.0, 7.0, 9.0));
        assert_eq!(a.dot(b), 32.0);
    }
}
