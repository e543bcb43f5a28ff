//! Camera for ray generation.

use std::fmt;

use umbra_math::{DVec3, Ray};

/// Generates primary rays.
///
/// The renderer keeps one scratch ray per worker and hands it to
/// [`Camera::focus`] for every sample. A camera must fully overwrite it and
/// must not rely on what it held before.
pub trait Camera: Send + Sync + fmt::Debug {
    /// Eye position, in world space.
    fn location(&self) -> DVec3;

    /// Prepare for an image of the given size. Called once per worker
    /// before any ray is generated.
    fn initialize(&mut self, width: u32, height: u32);

    /// Aim `ray` through the raster point `(x, y)`. Pixel `(i, j)` covers
    /// `[i, i + 1) × [j, j + 1)`, rows counted from the top.
    fn focus(&self, ray: &mut Ray, x: f64, y: f64);

    fn clone_box(&self) -> Box<dyn Camera>;
}

impl Clone for Box<dyn Camera> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Pinhole camera with a vertical field of view.
#[derive(Debug, Clone)]
pub struct PinholeCamera {
    // Camera positioning
    look_from: DVec3,
    look_at: DVec3,
    vup: DVec3,

    vfov: f64, // Vertical field of view in degrees

    // Cached computed values (set by initialize())
    pixel00_loc: DVec3,
    pixel_delta_u: DVec3,
    pixel_delta_v: DVec3,
}

impl PinholeCamera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        Self {
            look_from: DVec3::ZERO,
            look_at: DVec3::NEG_Z,
            vup: DVec3::Y,
            vfov: 90.0,
            pixel00_loc: DVec3::ZERO,
            pixel_delta_u: DVec3::ZERO,
            pixel_delta_v: DVec3::ZERO,
        }
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: DVec3, look_at: DVec3, vup: DVec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self
    }

    /// Set the vertical field of view, in degrees.
    pub fn with_fov(mut self, vfov: f64) -> Self {
        self.vfov = vfov;
        self
    }
}

impl Default for PinholeCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera for PinholeCamera {
    fn location(&self) -> DVec3 {
        self.look_from
    }

    fn initialize(&mut self, width: u32, height: u32) {
        let width = width.max(1) as f64;
        let height = height.max(1) as f64;

        // Viewport one unit in front of the eye
        let h = (self.vfov.to_radians() / 2.0).tan();
        let viewport_height = 2.0 * h;
        let viewport_width = viewport_height * (width / height);

        // Camera basis vectors
        let w = (self.look_from - self.look_at).normalize();
        let u = self.vup.cross(w).normalize();
        let v = w.cross(u);

        let viewport_u = viewport_width * u;
        let viewport_v = -viewport_height * v;

        self.pixel_delta_u = viewport_u / width;
        self.pixel_delta_v = viewport_v / height;
        self.pixel00_loc = self.look_from - w - viewport_u / 2.0 - viewport_v / 2.0;
    }

    fn focus(&self, ray: &mut Ray, x: f64, y: f64) {
        let target = self.pixel00_loc + x * self.pixel_delta_u + y * self.pixel_delta_v;
        ray.set(self.look_from, target - self.look_from);
    }

    fn clone_box(&self) -> Box<dyn Camera> {
        Box::new(self.clone())
    }
}
