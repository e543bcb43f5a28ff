//! Concurrent strip renderer.
//!
//! A render cuts the raster into strips and runs one claim loop per thread:
//! claim the next strip, render it, repeat until the strips run out or the
//! cancel flag is raised. The calling thread renders the first strip itself
//! and then joins the loop. Progress and preview callbacks are best effort:
//! a thread that finds another one reporting skips its turn instead of
//! waiting.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};
use thiserror::Error;

use crate::{PixelMap, PixelStrip, RenderConfig, Scene, SceneError, WorkerState};

/// Errors that stop a render from starting.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error("Failed to start render threads: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),
}

/// Where a render stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RenderState {
    Idle = 0,
    /// Cutting the raster into strips
    Striping = 1,
    Rendering = 2,
    /// No strip left to claim, waiting for the last ones to finish
    Draining = 3,
    Done = 4,
    Cancelled = 5,
}

impl RenderState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RenderState::Striping,
            2 => RenderState::Rendering,
            3 => RenderState::Draining,
            4 => RenderState::Done,
            5 => RenderState::Cancelled,
            _ => RenderState::Idle,
        }
    }
}

/// Receives feedback while a render runs. Calls come from worker threads,
/// never two at a time for the same kind of callback.
pub trait RenderListener: Sync {
    /// `done_rows` out of `total_rows` are finished.
    fn progress(&self, _done_rows: usize, _total_rows: usize) {}

    /// A strip was just finished. Only called when the sampler asks for
    /// previews.
    fn preview(&self, _strip: &PixelStrip) {}
}

/// A listener that ignores everything.
impl RenderListener for () {}

/// Result of a render, complete or not.
#[derive(Debug)]
pub struct RenderOutcome {
    pub map: PixelMap,
    pub strips_rendered: usize,
    pub strips_total: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Renders scenes with a fixed configuration.
#[derive(Debug)]
pub struct Renderer {
    config: RenderConfig,
    cancel: Arc<AtomicBool>,
    state: AtomicU8,
}

/// Shared by all threads of one render.
struct RenderJob<'a> {
    scene: &'a Scene,
    map: PixelMap,
    listener: &'a dyn RenderListener,
    cancel: &'a AtomicBool,
    state: &'a AtomicU8,
    seed: u64,
    started: Instant,
    interval_ms: u64,
    done_rows: AtomicUsize,
    last_report_ms: AtomicU64,
    reporting: AtomicBool,
    previewing: AtomicBool,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            state: AtomicU8::new(RenderState::Idle as u8),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Flag that stops the current render once the strips in flight are
    /// done. It is cleared when a render starts.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn state(&self) -> RenderState {
        RenderState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Render `scene`, blocking until every thread has stopped.
    ///
    /// Cancellation is not an error: the outcome then carries the strips
    /// finished so far.
    pub fn render(
        &self,
        scene: &Scene,
        listener: &dyn RenderListener,
    ) -> Result<RenderOutcome, RenderError> {
        let (width, height) = (self.config.width, self.config.height);
        if width == 0 || height == 0 {
            return Err(SceneError::InvalidResolution { width, height }.into());
        }
        let threads = self.config.thread_count();
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("umbra-worker-{i}"))
            .build()?;

        self.cancel.store(false, Ordering::Release);
        set_state(&self.state, RenderState::Striping);
        let started = Instant::now();
        let map = PixelMap::new(width, height, self.config.strip_count(threads));
        let strips_total = map.strip_count();
        info!(
            "rendering {}x{} in {} strips on {} threads",
            width, height, strips_total, threads
        );

        let job = RenderJob {
            scene,
            map,
            listener,
            cancel: &self.cancel,
            state: &self.state,
            seed: self.config.seed,
            started,
            interval_ms: self.config.progress_interval_ms,
            done_rows: AtomicUsize::new(0),
            last_report_ms: AtomicU64::new(0),
            reporting: AtomicBool::new(false),
            previewing: AtomicBool::new(false),
        };

        // The first strip is ours.
        let reserved = job.map.claim();
        set_state(&self.state, RenderState::Rendering);
        pool.in_place_scope(|scope| {
            for _ in 0..threads {
                scope.spawn(|_| job.run_worker(None));
            }
            job.run_worker(reserved);
        });

        let strips_rendered = job.map.completed_strips();
        let cancelled = self.cancel.load(Ordering::Acquire) && strips_rendered < strips_total;
        // The last word on progress is never skipped.
        listener.progress(job.done_rows.load(Ordering::Acquire), height as usize);
        let elapsed = started.elapsed();
        if cancelled {
            warn!(
                "render cancelled after {}/{} strips",
                strips_rendered, strips_total
            );
            self.state.store(RenderState::Cancelled as u8, Ordering::Release);
        } else {
            // Every strip made it, even if the flag went up at the very end.
            info!("render finished in {:.2?}", elapsed);
            self.state.store(RenderState::Done as u8, Ordering::Release);
        }

        Ok(RenderOutcome {
            map: job.map,
            strips_rendered,
            strips_total,
            cancelled,
            elapsed,
        })
    }
}

/// Move to `next`, unless the render was already cancelled.
fn set_state(state: &AtomicU8, next: RenderState) {
    let _ = state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
        let current = RenderState::from_u8(current);
        let restarting = matches!(next, RenderState::Striping);
        (restarting || current != RenderState::Cancelled).then_some(next as u8)
    });
}

impl RenderJob<'_> {
    fn run_worker(&self, first: Option<usize>) {
        let mut worker = WorkerState::new(self.scene, self.map.width(), self.map.height());
        let mut next = first;
        let mut rendered = 0;
        loop {
            if self.cancel.load(Ordering::Acquire) {
                set_state(self.state, RenderState::Cancelled);
                break;
            }
            let index = match next.take().or_else(|| self.map.claim()) {
                Some(index) => index,
                None => {
                    let _ = self.state.compare_exchange(
                        RenderState::Rendering as u8,
                        RenderState::Draining as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                    break;
                }
            };
            let mut strip = self.map.strip(index);
            worker.render_strip(&mut strip, self.seed);
            rendered += 1;
            debug!("strip {} done (rows {:?})", index, strip.rows);

            self.done_rows.fetch_add(strip.row_count(), Ordering::AcqRel);
            if worker.wants_preview() {
                self.try_preview(&strip);
            }
            drop(strip);
            self.try_progress();
        }
        debug!("worker leaving after {} strips", rendered);
    }

    /// Report progress if the interval has elapsed and nobody else is
    /// reporting right now.
    fn try_progress(&self) {
        self.try_progress_at(self.started.elapsed().as_millis() as u64);
    }

    /// Reports are at least `interval_ms` apart, whatever clock reading the
    /// caller brings. Returns true if this call reported.
    fn try_progress_at(&self, now: u64) -> bool {
        if !self.report_due(now) {
            return false;
        }
        if self
            .reporting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        // Another thread may have reported between the check and the flag.
        if !self.report_due(now) {
            self.reporting.store(false, Ordering::Release);
            return false;
        }
        self.listener.progress(
            self.done_rows.load(Ordering::Acquire),
            self.map.height() as usize,
        );
        self.last_report_ms.store(now, Ordering::Release);
        self.reporting.store(false, Ordering::Release);
        true
    }

    fn report_due(&self, now: u64) -> bool {
        let last = self.last_report_ms.load(Ordering::Acquire);
        now >= last && now - last >= self.interval_ms
    }

    fn try_preview(&self, strip: &PixelStrip) {
        if self
            .previewing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.listener.preview(strip);
        self.previewing.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};

    use umbra_geom::{Axis, Material, Shape};
    use umbra_math::{Color, DVec3};

    use super::*;
    use crate::{JitterSampler, Light, PinholeCamera};

    fn scene(preview: bool) -> Scene {
        let red = Arc::new(Material::new(Color::new(0.9, 0.2, 0.2)));
        let grey = Arc::new(Material::default());
        let root = Shape::union(vec![
            Shape::difference(
                Shape::sphere(DVec3::ZERO, 1.0, red.clone()),
                Shape::sphere(DVec3::new(0.0, 0.0, -1.0), 0.6, red),
            ),
            Shape::axis_plane(Axis::Y, -1.0, true, grey),
        ]);
        Scene::builder()
            .root(root)
            .camera(PinholeCamera::new().with_position(
                DVec3::new(0.0, 1.0, -4.0),
                DVec3::ZERO,
                DVec3::Y,
            ))
            .light(Light::white(DVec3::new(3.0, 5.0, -3.0)))
            .sampler(JitterSampler::new(4).with_preview(preview))
            .build()
            .unwrap()
    }

    fn config() -> RenderConfig {
        RenderConfig::default()
            .with_resolution(24, 32)
            .with_threads(2)
            .with_strips_per_thread(8)
            .with_progress_interval(0)
            .with_seed(7)
    }

    fn pixels(outcome: &RenderOutcome) -> Vec<Color> {
        (0..outcome.strips_total)
            .flat_map(|i| outcome.map.strip(i).pixels.clone())
            .collect()
    }

    /// Cancels the render as soon as a strip has been reported.
    struct CancelAfterFirst {
        cancel: Arc<AtomicBool>,
        reports: AtomicUsize,
    }

    impl RenderListener for CancelAfterFirst {
        fn progress(&self, done_rows: usize, _total_rows: usize) {
            self.reports.fetch_add(1, Ordering::SeqCst);
            if done_rows > 0 {
                self.cancel.store(true, Ordering::SeqCst);
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        progress: Mutex<Vec<(usize, usize)>>,
        previews: AtomicUsize,
    }

    impl RenderListener for Recorder {
        fn progress(&self, done_rows: usize, total_rows: usize) {
            self.progress.lock().unwrap().push((done_rows, total_rows));
        }

        fn preview(&self, strip: &PixelStrip) {
            assert!(strip.complete);
            self.previews.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_full_render() {
        let renderer = Renderer::new(config());
        assert_eq!(renderer.state(), RenderState::Idle);
        let recorder = Recorder::default();
        let outcome = renderer.render(&scene(false), &recorder).unwrap();

        assert!(!outcome.cancelled);
        assert_eq!(outcome.strips_total, 16);
        assert_eq!(outcome.strips_rendered, 16);
        assert_eq!(renderer.state(), RenderState::Done);
        assert_eq!(recorder.previews.load(Ordering::SeqCst), 0);

        let reports = recorder.progress.lock().unwrap();
        assert_eq!(reports.last(), Some(&(32, 32)));
        assert!(reports.windows(2).all(|w| w[0].0 <= w[1].0));

        // Something in the middle of the frame is lit.
        assert!(outcome.map.get(12, 16).length() > 0.0);
        assert_eq!(outcome.map.to_rgba().len(), 24 * 32 * 4);
    }

    #[test]
    fn test_render_is_deterministic_across_thread_counts() {
        let scene = scene(false);
        // Same strip layout, different number of workers.
        let one = Renderer::new(config().with_threads(1).with_strips_per_thread(12))
            .render(&scene, &())
            .unwrap();
        let three = Renderer::new(config().with_threads(3).with_strips_per_thread(4))
            .render(&scene, &())
            .unwrap();
        assert_eq!(one.strips_total, 12);
        assert_eq!(three.strips_total, 12);
        assert_eq!(pixels(&one), pixels(&three));
    }

    #[test]
    fn test_cancellation_after_first_strip() {
        let scene = scene(false);
        let config = config().with_resolution(24, 64).with_strips_per_thread(32);
        let reference = Renderer::new(config.clone()).render(&scene, &()).unwrap();

        let renderer = Renderer::new(config);
        let listener = CancelAfterFirst {
            cancel: renderer.cancel_handle(),
            reports: AtomicUsize::new(0),
        };
        let outcome = renderer.render(&scene, &listener).unwrap();

        assert_eq!(outcome.strips_total, 64);
        assert!(outcome.cancelled);
        assert!(outcome.strips_rendered >= 1);
        assert!(outcome.strips_rendered < outcome.strips_total);
        assert_eq!(renderer.state(), RenderState::Cancelled);
        assert!(listener.reports.load(Ordering::SeqCst) >= 1);

        // Finished strips are whole and match an uninterrupted render;
        // the rest were never touched.
        for i in 0..outcome.strips_total {
            let strip = outcome.map.strip(i);
            if strip.complete {
                assert_eq!(strip.pixels, reference.map.strip(i).pixels);
            } else {
                assert!(strip.pixels.iter().all(|p| *p == Color::ZERO));
            }
        }
    }

    #[test]
    fn test_cancel_flag_is_cleared_on_start() {
        let renderer = Renderer::new(config());
        renderer.cancel();
        let outcome = renderer.render(&scene(false), &()).unwrap();
        assert!(!outcome.cancelled);
        assert_eq!(outcome.strips_rendered, outcome.strips_total);
    }

    #[test]
    fn test_preview_only_when_sampler_asks() {
        let recorder = Recorder::default();
        let outcome = Renderer::new(config()).render(&scene(true), &recorder).unwrap();
        let previews = recorder.previews.load(Ordering::SeqCst);
        assert!(previews >= 1);
        assert!(previews <= outcome.strips_total);
    }

    fn job<'a>(
        scene: &'a Scene,
        listener: &'a dyn RenderListener,
        cancel: &'a AtomicBool,
        state: &'a AtomicU8,
    ) -> RenderJob<'a> {
        RenderJob {
            scene,
            map: PixelMap::new(4, 4, 1),
            listener,
            cancel,
            state,
            seed: 0,
            started: Instant::now(),
            interval_ms: 100,
            done_rows: AtomicUsize::new(0),
            last_report_ms: AtomicU64::new(0),
            reporting: AtomicBool::new(false),
            previewing: AtomicBool::new(false),
        }
    }

    #[test]
    fn test_progress_reports_respect_interval() {
        let scene = scene(false);
        let recorder = Recorder::default();
        let (cancel, state) = (AtomicBool::new(false), AtomicU8::new(0));
        let job = job(&scene, &recorder, &cancel, &state);

        assert!(!job.try_progress_at(50));
        assert!(job.try_progress_at(150));
        assert!(!job.try_progress_at(200));
        // A clock reading taken before the last report never counts.
        assert!(!job.try_progress_at(120));
        assert!(job.try_progress_at(250));
        assert_eq!(recorder.progress.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_progress_reports_stay_apart() {
        let scene = scene(false);
        let recorder = Recorder::default();
        let (cancel, state) = (AtomicBool::new(false), AtomicU8::new(0));
        let job = job(&scene, &recorder, &cancel, &state);
        let clock = AtomicU64::new(0);

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..2_000 {
                        let now = clock.fetch_add(1, Ordering::SeqCst);
                        job.try_progress_at(now);
                    }
                });
            }
        });
        // Readings run up to 7999, so at most one report per 100 ms window.
        let reports = recorder.progress.lock().unwrap().len();
        assert!(reports >= 1);
        assert!(reports <= 80, "{} reports", reports);
    }

    #[test]
    fn test_invalid_resolution() {
        let renderer = Renderer::new(config().with_resolution(0, 10));
        let err = renderer.render(&scene(false), &()).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Scene(SceneError::InvalidResolution { width: 0, height: 10 })
        ));
        assert_eq!(renderer.state(), RenderState::Idle);
    }
}
