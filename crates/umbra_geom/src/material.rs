//! Surface materials.
//!
//! Leaf shapes hand their material to the shading code at hit time. The
//! geometry core never looks inside a material, except for the index of
//! refraction.

use umbra_math::{Color, DVec3};

/// A simple Lambert material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Base color (RGB, 0-1)
    pub color: Color,
    /// Fraction of the scene's ambient light reflected back
    pub ambient: f64,
    /// Diffuse (Lambert) coefficient
    pub diffuse: f64,
    /// Index of refraction, 1.0 for opaque surfaces
    pub refraction_index: f64,
}

/// Material reported by hits that have no owning leaf.
pub static DEFAULT_MATERIAL: Material = Material::DEFAULT;

impl Material {
    pub const DEFAULT: Material = Material {
        color: DVec3::new(0.5, 0.5, 0.5),
        ambient: 0.1,
        diffuse: 0.9,
        refraction_index: 1.0,
    };

    /// Create a new material with the given base color.
    pub fn new(color: Color) -> Self {
        Self {
            color,
            ..Self::DEFAULT
        }
    }

    pub fn with_ambient(mut self, ambient: f64) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn with_diffuse(mut self, diffuse: f64) -> Self {
        self.diffuse = diffuse;
        self
    }

    pub fn with_refraction_index(mut self, index: f64) -> Self {
        self.refraction_index = index;
        self
    }

    /// Index of refraction, used by refraction-aware callers.
    pub fn index_of_refraction(&self) -> f64 {
        self.refraction_index
    }

    /// True when light passes through the surface.
    pub fn is_transparent(&self) -> bool {
        (self.refraction_index - 1.0).abs() > f64::EPSILON
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::DEFAULT
    }
}
