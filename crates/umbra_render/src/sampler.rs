//! Pixel samplers.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Decides where inside a pixel the camera rays go.
pub trait Sampler: Send + Sync + fmt::Debug {
    /// Rays per pixel.
    fn oversampling(&self) -> usize;

    /// Width of the sampling footprint, in pixels. A hint for light
    /// sampling; geometry never looks at it.
    fn aperture(&self) -> f64;

    /// Whether the renderer should hand finished strips to
    /// [`RenderListener::preview`](crate::RenderListener::preview).
    fn wants_preview(&self) -> bool;

    /// Restart the random sequence. The renderer reseeds once per strip.
    fn reseed(&mut self, seed: u64);

    /// Replace `offsets` with the sample positions for the next pixel,
    /// relative to the pixel center.
    fn offsets(&mut self, offsets: &mut Vec<(f64, f64)>);

    fn clone_box(&self) -> Box<dyn Sampler>;
}

impl Clone for Box<dyn Sampler> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Stratified jitter: the footprint is cut into a square grid and every
/// sample lands at a random spot inside its own cell.
#[derive(Debug, Clone)]
pub struct JitterSampler {
    samples: usize,
    aperture: f64,
    preview: bool,
    rng: StdRng,
}

impl JitterSampler {
    pub fn new(samples: usize) -> Self {
        Self {
            samples: samples.max(1),
            aperture: 1.0,
            preview: false,
            rng: StdRng::seed_from_u64(0),
        }
    }

    pub fn with_aperture(mut self, aperture: f64) -> Self {
        self.aperture = aperture.max(0.0);
        self
    }

    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }
}

impl Default for JitterSampler {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Sampler for JitterSampler {
    fn oversampling(&self) -> usize {
        self.samples
    }

    fn aperture(&self) -> f64 {
        self.aperture
    }

    fn wants_preview(&self) -> bool {
        self.preview
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn offsets(&mut self, offsets: &mut Vec<(f64, f64)>) {
        offsets.clear();
        if self.samples == 1 {
            offsets.push((0.0, 0.0));
            return;
        }
        let grid = (self.samples as f64).sqrt().ceil() as usize;
        let cell = self.aperture / grid as f64;
        for i in 0..self.samples {
            let (col, row) = ((i % grid) as f64, (i / grid) as f64);
            let x = (col + self.rng.gen::<f64>()) * cell - self.aperture / 2.0;
            let y = (row + self.rng.gen::<f64>()) * cell - self.aperture / 2.0;
            offsets.push((x, y));
        }
    }

    fn clone_box(&self) -> Box<dyn Sampler> {
        Box::new(self.clone())
    }
}
