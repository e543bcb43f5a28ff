//! Scene aggregate and per-worker rendering state.

use log::info;
use thiserror::Error;
use umbra_geom::{optimize, HitInfo, InitContext, Shape};
use umbra_math::{Color, Ray};

use crate::{Camera, JitterSampler, Light, PixelStrip, Sampler};

/// Problems with a scene that stop a render before it starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("Scene has no root shape")]
    MissingRoot,

    #[error("Scene has no camera")]
    MissingCamera,

    #[error("Scene has no lights")]
    MissingLights,

    #[error("Invalid resolution: {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },
}

/// Everything the renderer needs to produce an image.
#[derive(Debug, Clone)]
pub struct Scene {
    root: Shape,
    lights: Vec<Light>,
    camera: Box<dyn Camera>,
    sampler: Box<dyn Sampler>,
    ambient: Color,
    background: Color,
}

impl Scene {
    pub fn builder() -> SceneBuilder {
        SceneBuilder::default()
    }

    pub fn root(&self) -> &Shape {
        &self.root
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn camera(&self) -> &dyn Camera {
        self.camera.as_ref()
    }

    pub fn sampler(&self) -> &dyn Sampler {
        self.sampler.as_ref()
    }

    /// Rewrite the shape tree for rendering.
    pub fn optimize(&mut self) {
        let root = std::mem::replace(&mut self.root, Shape::union(Vec::new()));
        let ctx = InitContext::new(self.camera.location());
        self.root = optimize(root, &ctx);
    }

    /// Color seen along a primary ray: Lambert shading with hard shadows.
    pub fn trace(&self, ray: &Ray, shadows: &mut ShadowCache) -> Color {
        let mut hit = HitInfo::default();
        if !self.root.hit_test(ray, f64::INFINITY, &mut hit) {
            return self.background;
        }
        let material = hit.material;
        // Shade the side facing the viewer.
        let normal = if hit.normal.dot(ray.direction) > 0.0 {
            -hit.normal
        } else {
            hit.normal
        };

        let mut color = material.color * self.ambient * material.ambient;
        for (index, light) in self.lights.iter().enumerate() {
            let to_light = light.position - hit.hit_point;
            let cosine = normal.dot(to_light.normalize_or_zero());
            if cosine <= 0.0 {
                continue;
            }
            let shadow_ray = Ray::between(hit.hit_point, light.position);
            if self.occluded(&shadow_ray, index, shadows) {
                continue;
            }
            color += material.color * light.color * (material.diffuse * cosine);
        }
        color
    }

    /// Shadow test against the root, trying the last occluder of this light
    /// first when the root is a union.
    fn occluded(&self, ray: &Ray, light: usize, shadows: &mut ShadowCache) -> bool {
        let Shape::Union(union) = &self.root else {
            return self.root.shadow_test(ray);
        };
        let children = union.children();
        let last = shadows.last_occluder(light);
        if let Some(child) = last.and_then(|i| children.get(i)) {
            if child.shadow_test(ray) {
                return true;
            }
        }
        for (index, child) in children.iter().enumerate() {
            if Some(index) != last && child.shadow_test(ray) {
                shadows.remember(light, index);
                return true;
            }
        }
        false
    }
}

/// Builder for [`Scene`], in the style of the camera builders.
#[derive(Debug, Default)]
pub struct SceneBuilder {
    root: Option<Shape>,
    lights: Vec<Light>,
    camera: Option<Box<dyn Camera>>,
    sampler: Option<Box<dyn Sampler>>,
    ambient: Option<Color>,
    background: Option<Color>,
}

impl SceneBuilder {
    pub fn root(mut self, root: Shape) -> Self {
        self.root = Some(root);
        self
    }

    pub fn light(mut self, light: Light) -> Self {
        self.lights.push(light);
        self
    }

    pub fn camera(mut self, camera: impl Camera + 'static) -> Self {
        self.camera = Some(Box::new(camera));
        self
    }

    pub fn sampler(mut self, sampler: impl Sampler + 'static) -> Self {
        self.sampler = Some(Box::new(sampler));
        self
    }

    pub fn ambient(mut self, ambient: Color) -> Self {
        self.ambient = Some(ambient);
        self
    }

    pub fn background(mut self, background: Color) -> Self {
        self.background = Some(background);
        self
    }

    pub fn build(self) -> Result<Scene, SceneError> {
        let root = self.root.ok_or(SceneError::MissingRoot)?;
        let camera = self.camera.ok_or(SceneError::MissingCamera)?;
        if self.lights.is_empty() {
            return Err(SceneError::MissingLights);
        }
        info!(
            "scene built: {} nodes, {} lights",
            root.node_count(),
            self.lights.len()
        );
        Ok(Scene {
            root,
            lights: self.lights,
            camera,
            sampler: self
                .sampler
                .unwrap_or_else(|| Box::new(JitterSampler::default())),
            ambient: self.ambient.unwrap_or(Color::ONE),
            background: self.background.unwrap_or(Color::ZERO),
        })
    }
}

/// Per light, the index of the top-level child that last blocked it.
#[derive(Debug, Clone, Default)]
pub struct ShadowCache {
    last: Vec<Option<usize>>,
}

impl ShadowCache {
    pub fn new(lights: usize) -> Self {
        Self {
            last: vec![None; lights],
        }
    }

    pub fn last_occluder(&self, light: usize) -> Option<usize> {
        self.last.get(light).copied().flatten()
    }

    fn remember(&mut self, light: usize, child: usize) {
        if let Some(slot) = self.last.get_mut(light) {
            *slot = Some(child);
        }
    }
}

/// Scratch state owned by one render worker for the duration of a render.
///
/// Holds the worker's own copy of the scene, so that camera and sampler
/// state never cross threads. Dropped when the worker finishes, cache
/// included.
#[derive(Debug)]
pub struct WorkerState {
    scene: Scene,
    ray: Ray,
    shadows: ShadowCache,
    offsets: Vec<(f64, f64)>,
}

impl WorkerState {
    pub fn new(scene: &Scene, width: u32, height: u32) -> Self {
        let mut scene = scene.clone();
        scene.camera.initialize(width, height);
        let shadows = ShadowCache::new(scene.lights.len());
        Self {
            scene,
            ray: Ray::default(),
            shadows,
            offsets: Vec::new(),
        }
    }

    pub fn wants_preview(&self) -> bool {
        self.scene.sampler.wants_preview()
    }

    pub fn shadows(&self) -> &ShadowCache {
        &self.shadows
    }

    /// Average color of pixel (x, y).
    pub fn pixel(&mut self, x: u32, y: u32) -> Color {
        self.scene.sampler.offsets(&mut self.offsets);
        let mut sum = Color::ZERO;
        for &(dx, dy) in &self.offsets {
            self.scene
                .camera
                .focus(&mut self.ray, x as f64 + 0.5 + dx, y as f64 + 0.5 + dy);
            sum += self.scene.trace(&self.ray, &mut self.shadows);
        }
        sum / self.offsets.len().max(1) as f64
    }

    /// Render every row of `strip`. The sampler restarts from a seed
    /// derived from the strip index, so the result does not depend on
    /// which worker gets the strip.
    pub fn render_strip(&mut self, strip: &mut PixelStrip, seed: u64) {
        self.scene.sampler.reseed(strip_seed(seed, strip.index));
        for y in strip.rows.clone() {
            for x in 0..strip.width {
                let color = self.pixel(x, y);
                strip.set(x, y, color);
            }
        }
        strip.complete = true;
    }
}

fn strip_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
