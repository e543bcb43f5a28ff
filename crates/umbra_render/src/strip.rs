//! Strip-based raster storage.
//!
//! The image is cut into horizontal strips of whole rows. Each strip is a
//! unit of work: one thread claims it, renders every row of it and marks it
//! complete. Strips live behind their own lock, so workers never share a
//! row.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use umbra_math::Color;

/// A contiguous band of rows.
#[derive(Debug, Clone)]
pub struct PixelStrip {
    /// Position of this strip, top to bottom
    pub index: usize,
    /// Rows covered, top row first
    pub rows: Range<u32>,
    /// Width of the image in pixels
    pub width: u32,
    /// Pixel colors in row-major order
    pub pixels: Vec<Color>,
    /// Set once every row has been rendered
    pub complete: bool,
}

impl PixelStrip {
    pub fn new(index: usize, rows: Range<u32>, width: u32) -> Self {
        let count = (rows.end - rows.start) as usize * width as usize;
        Self {
            index,
            rows,
            width,
            pixels: vec![Color::ZERO; count],
            complete: false,
        }
    }

    pub fn row_count(&self) -> usize {
        (self.rows.end - self.rows.start) as usize
    }

    /// Get the pixel at image coordinates (x, y).
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[self.offset(x, y)]
    }

    /// Set the pixel at image coordinates (x, y).
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        let offset = self.offset(x, y);
        self.pixels[offset] = color;
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        debug_assert!(self.rows.contains(&y) && x < self.width);
        (y - self.rows.start) as usize * self.width as usize + x as usize
    }
}

/// Split `height` rows into `count` bands whose sizes differ by at most one.
pub fn split_rows(height: u32, count: usize) -> Vec<Range<u32>> {
    let count = count.clamp(1, height.max(1) as usize) as u32;
    let base = height / count;
    let extra = height % count;
    let mut start = 0;
    (0..count)
        .map(|i| {
            let rows = base + u32::from(i < extra);
            let band = start..start + rows;
            start += rows;
            band
        })
        .collect()
}

/// The whole raster, as a set of independently locked strips plus the
/// cursor workers use to claim them.
#[derive(Debug)]
pub struct PixelMap {
    width: u32,
    height: u32,
    strips: Vec<Mutex<PixelStrip>>,
    cursor: AtomicUsize,
}

impl PixelMap {
    pub fn new(width: u32, height: u32, strip_count: usize) -> Self {
        let strips = split_rows(height, strip_count)
            .into_iter()
            .enumerate()
            .map(|(index, rows)| Mutex::new(PixelStrip::new(index, rows, width)))
            .collect();
        Self {
            width,
            height,
            strips,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn strip_count(&self) -> usize {
        self.strips.len()
    }

    /// Take the next unclaimed strip, if any is left.
    pub fn claim(&self) -> Option<usize> {
        let index = self.cursor.fetch_add(1, Ordering::AcqRel);
        (index < self.strips.len()).then_some(index)
    }

    /// Lock one strip. A strip whose writer panicked is still readable.
    pub fn strip(&self, index: usize) -> MutexGuard<'_, PixelStrip> {
        self.strips[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn completed_strips(&self) -> usize {
        (0..self.strips.len())
            .filter(|&i| self.strip(i).complete)
            .count()
    }

    /// Get the pixel at (x, y).
    pub fn get(&self, x: u32, y: u32) -> Color {
        let index = self
            .strips
            .partition_point(|s| {
                let strip = s.lock().unwrap_or_else(PoisonError::into_inner);
                strip.rows.end <= y
            });
        self.strip(index).get(x, y)
    }

    /// Convert to RGBA bytes (for display or saving).
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for i in 0..self.strips.len() {
            for color in &self.strip(i).pixels {
                bytes.extend_from_slice(&color_to_rgba(*color));
            }
        }
        bytes
    }
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f64) -> f64 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a color to 8-bit RGBA.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let channel = |c: f64| (255.0 * linear_to_gamma(c).clamp(0.0, 1.0)) as u8;
    [channel(color.x), channel(color.y), channel(color.z), 255]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_rows_even() {
        let bands = split_rows(12, 4);
        assert_eq!(bands, vec![0..3, 3..6, 6..9, 9..12]);
    }

    #[test]
    fn test_split_rows_uneven_covers_image() {
        let bands = split_rows(10, 4);
        assert_eq!(bands, vec![0..3, 3..6, 6..8, 8..10]);
        let total: u32 = bands.iter().map(|b| b.end - b.start).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn test_split_rows_more_strips_than_rows() {
        let bands = split_rows(3, 10);
        assert_eq!(bands.len(), 3);
        assert!(bands.iter().all(|b| b.end - b.start == 1));
    }

    #[test]
    fn test_claim_each_strip_once() {
        let map = PixelMap::new(8, 8, 3);
        let claimed: Vec<_> = std::iter::from_fn(|| map.claim()).collect();
        assert_eq!(claimed, vec![0, 1, 2]);
        assert!(map.claim().is_none());
    }

    #[test]
    fn test_pixel_access_across_strips() {
        let map = PixelMap::new(4, 10, 4);
        map.strip(2).set(3, 6, Color::ONE);
        assert_eq!(map.get(3, 6), Color::ONE);
        assert_eq!(map.get(3, 5), Color::ZERO);
        assert_eq!(map.completed_strips(), 0);
    }

    #[test]
    fn test_to_rgba() {
        let map = PixelMap::new(2, 1, 1);
        map.strip(0).set(0, 0, Color::new(1.0, 0.25, 0.0));
        assert_eq!(map.to_rgba(), vec![255, 127, 0, 255, 0, 0, 0, 255]);
    }

    #[test]
    fn test_linear_to_gamma() {
        assert_eq!(linear_to_gamma(0.0), 0.0);
        assert!((linear_to_gamma(1.0) - 1.0).abs() < 0.0001);
        assert!((linear_to_gamma(0.25) - 0.5).abs() < 0.0001);
    }
}
