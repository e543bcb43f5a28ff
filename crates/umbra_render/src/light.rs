//! Point lights.

use umbra_math::{Color, DVec3};

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub position: DVec3,
    pub color: Color,
}

impl Light {
    pub fn new(position: DVec3, color: Color) -> Self {
        Self { position, color }
    }

    /// White light of unit intensity.
    pub fn white(position: DVec3) -> Self {
        Self::new(position, Color::ONE)
    }
}
