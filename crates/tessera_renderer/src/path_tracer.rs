//! Progressive multi-threaded renderer.
//!
//! [`PathTracer`] owns the accumulation image and a small pool of worker
//! threads. Workers shade tiles on their own; the host calls
//! [`PathTracer::pump_completed_tiles`] once per frame to fold whatever has
//! finished into the image.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::{
    render_tile, AccumulationBuffer, Camera, ClaimResult, Color, DrainResult, Hittable, PassCursor,
    PixelTile, RenderConfig, RenderError, RenderResult, TileQueue,
};

/// State shared with the worker threads.
struct Shared {
    world: Box<dyn Hittable>,
    camera: Camera,
    queue: TileQueue<PassCursor>,
    width: u32,
    height: u32,
    max_depth: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderState {
    Idle,
    Running,
    Finished,
}

/// Progressive tile-scheduled path tracer.
pub struct PathTracer {
    config: RenderConfig,
    shared: Arc<Shared>,
    image: AccumulationBuffer,
    /// Reused harvest buffer for drained tiles
    harvest: PixelTile,
    workers: Vec<JoinHandle<()>>,
    state: RenderState,
    started_at: Option<Instant>,
    merged_pixel_samples: u64,
    completed_passes: u32,
}

impl PathTracer {
    /// Build a renderer for `world` seen through `camera`.
    ///
    /// Allocates the accumulation image and the tile pool up front; fails if
    /// the configuration is unusable or the buffers cannot be reserved.
    pub fn new(
        config: RenderConfig,
        world: impl Hittable + 'static,
        camera: Camera,
    ) -> RenderResult<Self> {
        config.validate()?;

        let image = AccumulationBuffer::new(config.width, config.height)?;
        let cursor = PassCursor::new(
            config.pixel_count(),
            config.tile_size,
            config.samples_per_pixel,
        );
        let queue = TileQueue::new(cursor, config.tile_pool_size, config.tile_size)?;
        let harvest = PixelTile::with_capacity(config.tile_size)?;

        let shared = Arc::new(Shared {
            world: Box::new(world),
            camera,
            queue,
            width: config.width,
            height: config.height,
            max_depth: config.max_depth,
        });

        Ok(Self {
            config,
            shared,
            image,
            harvest,
            workers: Vec::new(),
            state: RenderState::Idle,
            started_at: None,
            merged_pixel_samples: 0,
            completed_passes: 0,
        })
    }

    /// Spawn the worker threads.
    pub fn start_rendering(&mut self) -> RenderResult<()> {
        if self.state != RenderState::Idle {
            return Err(RenderError::AlreadyStarted);
        }

        log::info!(
            "Rendering {}x{} @ {} spp on {} threads",
            self.config.width,
            self.config.height,
            self.config.samples_per_pixel,
            self.config.thread_count
        );

        for index in 0..self.config.thread_count {
            let shared = Arc::clone(&self.shared);
            let seed = self.config.seed;
            let spawned = thread::Builder::new()
                .name(format!("tessera-worker-{index}"))
                .spawn(move || run_worker(&shared, index, seed));

            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(err) => {
                    self.shared.queue.stop();
                    self.join_workers();
                    self.state = RenderState::Finished;
                    return Err(RenderError::ThreadSpawn(err));
                }
            }
        }

        self.state = RenderState::Running;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    /// Stop handing out tiles, wait for the workers and keep what they finished.
    ///
    /// Safe to call more than once.
    pub fn end_rendering(&mut self) {
        match self.state {
            RenderState::Finished => return,
            RenderState::Idle => {
                self.shared.queue.stop();
                self.state = RenderState::Finished;
                return;
            }
            RenderState::Running => {}
        }

        log::debug!("Stopping render workers");
        self.shared.queue.stop();
        self.join_workers();

        // Tiles released after the last pump still belong in the image
        while self.shared.queue.drain_tile(&mut self.harvest) == DrainResult::Drained {
            self.merge_harvest();
        }

        self.state = RenderState::Finished;
        self.log_finished();
    }

    /// Merge every finished tile into the image without blocking.
    ///
    /// Returns the number of tiles merged. Once all samples are in, the
    /// workers are joined and later calls do nothing.
    pub fn pump_completed_tiles(&mut self) -> usize {
        if self.state != RenderState::Running {
            return 0;
        }

        let mut merged = 0;
        loop {
            match self.shared.queue.drain_tile(&mut self.harvest) {
                DrainResult::Drained => {
                    self.merge_harvest();
                    merged += 1;
                }
                DrainResult::NoTileAvailable => {
                    if !self.workers_exited() {
                        break;
                    }
                    // Nobody is left to claim the remaining work
                    log::error!("All render workers exited early, stopping");
                    self.shared.queue.stop();
                }
                DrainResult::RenderingFinished => {
                    self.join_workers();
                    self.state = RenderState::Finished;
                    self.log_finished();
                    break;
                }
            }
        }
        merged
    }

    /// Linear colors, `width * height`, row-major with row 0 at the bottom.
    pub fn image(&self) -> &[Color] {
        self.image.pixels()
    }

    /// The accumulation buffer behind [`PathTracer::image`].
    pub fn accumulation(&self) -> &AccumulationBuffer {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// True once all workers have been joined.
    pub fn is_finished(&self) -> bool {
        self.state == RenderState::Finished
    }

    /// Full-frame passes merged so far.
    pub fn completed_passes(&self) -> u32 {
        self.completed_passes
    }

    /// Fraction of all requested pixel-samples merged into the image.
    pub fn progress(&self) -> f32 {
        let total = self.config.pixel_count() as u64 * self.config.samples_per_pixel as u64;
        (self.merged_pixel_samples as f64 / total as f64) as f32
    }

    /// RGBA bytes with the top row first.
    pub fn to_rgba_top_down(&self) -> Vec<u8> {
        self.image.to_rgba_top_down()
    }

    fn merge_harvest(&mut self) {
        self.image.merge_tile(&self.harvest);
        self.merged_pixel_samples += self.harvest.len() as u64;

        let passes = (self.merged_pixel_samples / self.config.pixel_count() as u64) as u32;
        if passes > self.completed_passes {
            self.completed_passes = passes;
            log::debug!(
                "Sample pass {}/{} rendered",
                passes,
                self.config.samples_per_pixel
            );
        }
    }

    fn workers_exited(&self) -> bool {
        self.workers.iter().all(|handle| handle.is_finished())
    }

    fn join_workers(&mut self) {
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Render worker panicked");
            }
        }
    }

    fn log_finished(&self) {
        let Some(started_at) = self.started_at else {
            return;
        };
        let total = started_at.elapsed().as_secs();
        log::info!(
            "Rendering finished after {} passes in {}h {}m {}s",
            self.completed_passes,
            total / 3600,
            (total / 60) % 60,
            total % 60
        );
    }
}

impl Drop for PathTracer {
    fn drop(&mut self) {
        self.end_rendering();
    }
}

/// Worker loop: claim, shade, release, until the queue says we're done.
fn run_worker(shared: &Shared, index: usize, seed: Option<u64>) {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
        None => StdRng::from_entropy(),
    };
    let mut tiles = 0usize;

    log::debug!("Worker {index} started");
    loop {
        match shared.queue.claim_tile() {
            ClaimResult::Claimed(mut tile) => {
                render_tile(
                    &mut tile,
                    &shared.camera,
                    shared.world.as_ref(),
                    shared.width,
                    shared.height,
                    shared.max_depth,
                    &mut rng,
                );
                shared.queue.release_tile(tile);
                tiles += 1;
            }
            ClaimResult::NoTileAvailable => thread::yield_now(),
            ClaimResult::RenderingFinished => break,
        }
    }
    log::debug!("Worker {index} stopped after {tiles} tiles");
}
