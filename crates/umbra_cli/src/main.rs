use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use umbra_geom::{Axis, Material, Shape};
use umbra_math::{Color, DVec3};
use umbra_render::{
    JitterSampler, Light, PinholeCamera, RenderConfig, RenderListener, Renderer, Scene,
};

/// Logs progress as whole percentages.
struct LogListener;

impl RenderListener for LogListener {
    fn progress(&self, done_rows: usize, total_rows: usize) {
        let percent = done_rows * 100 / total_rows.max(1);
        log::info!("{}% ({}/{} rows)", percent, done_rows, total_rows);
    }
}

/// A bowl cut out of a sphere, a ring floating above it and a floor.
fn demo_scene(config: &RenderConfig) -> Result<Scene> {
    let clay = Arc::new(Material::new(Color::new(0.8, 0.35, 0.25)));
    let brass = Arc::new(Material::new(Color::new(0.85, 0.7, 0.3)).with_ambient(0.05));
    let floor = Arc::new(Material::new(Color::new(0.6, 0.6, 0.65)));

    let bowl = Shape::difference(
        Shape::sphere(DVec3::ZERO, 1.0, clay.clone()),
        Shape::sphere(DVec3::new(0.0, 0.7, 0.0), 0.9, clay),
    );
    let ring = Shape::torus(DVec3::ZERO, 1.2, 0.25, brass)
        .rotated(DVec3::X, 30f64.to_radians())
        .translated(DVec3::new(0.0, 1.6, 0.0));
    let root = Shape::union(vec![
        Shape::union(vec![bowl, ring]),
        Shape::axis_plane(Axis::Y, -1.0, true, floor),
    ]);

    let scene = Scene::builder()
        .root(root)
        .camera(
            PinholeCamera::new()
                .with_position(DVec3::new(0.0, 2.5, -6.0), DVec3::new(0.0, 0.4, 0.0), DVec3::Y)
                .with_fov(40.0),
        )
        .light(Light::white(DVec3::new(-4.0, 6.0, -5.0)))
        .light(Light::new(DVec3::new(5.0, 3.0, -2.0), Color::splat(0.4)))
        .sampler(JitterSampler::new(config.samples))
        .ambient(Color::splat(0.3))
        .background(Color::new(0.05, 0.05, 0.08))
        .build()?;
    Ok(scene)
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => RenderConfig::load(&path)
            .with_context(|| format!("Failed to load render config {path}"))?,
        None => RenderConfig::default(),
    };
    let output = PathBuf::from(args.next().unwrap_or_else(|| "umbra.png".to_string()));

    log::info!("Starting Umbra");
    let mut scene = demo_scene(&config)?;
    scene.optimize();

    let renderer = Renderer::new(config.clone());
    let outcome = renderer.render(&scene, &LogListener)?;
    if outcome.cancelled {
        log::warn!(
            "Saving partial image ({}/{} strips)",
            outcome.strips_rendered,
            outcome.strips_total
        );
    }

    let image = image::RgbaImage::from_raw(config.width, config.height, outcome.map.to_rgba())
        .context("Pixel buffer does not match the image size")?;
    image
        .save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!("Wrote {}", output.display());

    Ok(())
}
