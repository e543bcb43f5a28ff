//! Umbra renderer.
//!
//! Turns an optimized shape tree into pixels: cameras and samplers generate
//! rays, the scene shades them, and the scheduler spreads strips of the
//! image over a pool of worker threads.

mod camera;
mod config;
mod light;
mod sampler;
mod scene;
mod scheduler;
mod strip;

pub use camera::{Camera, PinholeCamera};
pub use config::{ConfigError, RenderConfig};
pub use light::Light;
pub use sampler::{JitterSampler, Sampler};
pub use scene::{Scene, SceneBuilder, SceneError, ShadowCache, WorkerState};
pub use scheduler::{RenderError, RenderListener, RenderOutcome, RenderState, Renderer};
pub use strip::{color_to_rgba, linear_to_gamma, split_rows, PixelMap, PixelStrip};

pub type Result<T, E = RenderError> = std::result::Result<T, E>;
