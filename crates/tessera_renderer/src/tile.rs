//! Tile work-queue shared by the render workers and the harvesting host.
//!
//! A fixed pool of reusable pixel tiles cycles through three states:
//!
//! ```text
//! Free --claim--> InProgress --release--> AwaitingHarvest --drain--> Free
//! ```
//!
//! Every state change, and every move of the scheduler's cursor, happens
//! under the queue's single lock. Workers never hold the lock while
//! shading: a claimed tile's pixel buffer is moved out to the worker and
//! moved back on release.

use std::ops::{Deref, DerefMut, Range};

use parking_lot::Mutex;

use crate::{Color, RenderResult};

/// Default tile length in pixels.
pub const DEFAULT_TILE_SIZE: usize = 512;

/// Default number of tiles in the shared pool.
pub const DEFAULT_TILE_POOL_SIZE: usize = 4;

/// A contiguous run of pixels rendered as one unit of work.
///
/// Pixels are addressed by their row-major index into the image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelTile {
    /// Index of the first pixel of the run
    pub start_pixel: usize,
    /// Sample pass this tile belongs to
    pub sample_index: u32,
    pixels: Vec<Color>,
}

impl PixelTile {
    /// Create an empty tile able to hold `capacity` pixels without reallocating.
    pub fn with_capacity(capacity: usize) -> RenderResult<Self> {
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(capacity)?;
        Ok(Self {
            start_pixel: 0,
            sample_index: 0,
            pixels,
        })
    }

    /// Point the tile at a new run of pixels, zeroing its samples.
    pub fn assign(&mut self, start_pixel: usize, length: usize, sample_index: u32) {
        self.start_pixel = start_pixel;
        self.sample_index = sample_index;
        self.pixels.clear();
        self.pixels.resize(length, Color::ZERO);
    }

    /// Number of pixels in the run.
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Image indices covered by this tile.
    pub fn pixel_range(&self) -> Range<usize> {
        self.start_pixel..self.start_pixel + self.pixels.len()
    }

    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Color] {
        &mut self.pixels
    }
}

/// Lifecycle state of a pooled tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileState {
    /// Available for claiming
    #[default]
    Free,
    /// Claimed by a worker that is shading it
    InProgress,
    /// Shaded and waiting for the host to merge it
    AwaitingHarvest,
}

/// The queue's view of its owner.
///
/// Called with the queue lock held, so implementations see a consistent
/// cursor no matter how many workers are claiming.
pub trait TileScheduler: Send {
    /// Whether new tiles may still be handed out.
    fn can_continue(&self) -> bool;

    /// Describe the next unit of work in `tile`.
    ///
    /// Returns false when there is nothing left to dispatch; the tile is
    /// then left untouched and rendering is over.
    fn fill(&mut self, tile: &mut PixelTile) -> bool;

    /// Refuse all further claims. Tiles already in flight still finish.
    fn stop(&mut self);
}

/// Walks the image in row-major tiles, one full pass per sample.
#[derive(Debug, Clone)]
pub struct PassCursor {
    pixel_count: usize,
    tile_size: usize,
    samples: u32,
    cursor: usize,
    sample: u32,
    running: bool,
}

impl PassCursor {
    pub fn new(pixel_count: usize, tile_size: usize, samples: u32) -> Self {
        Self {
            pixel_count,
            tile_size,
            samples,
            cursor: 0,
            sample: 0,
            running: true,
        }
    }

    /// Number of passes whose every tile has been handed out.
    pub fn dispatched_passes(&self) -> u32 {
        self.sample
    }
}

impl TileScheduler for PassCursor {
    fn can_continue(&self) -> bool {
        self.running && self.sample < self.samples
    }

    fn fill(&mut self, tile: &mut PixelTile) -> bool {
        if !self.can_continue() {
            self.running = false;
            return false;
        }

        let start = self.cursor;
        let length = self.tile_size.min(self.pixel_count - start);
        tile.assign(start, length, self.sample);

        self.cursor += length;
        if self.cursor >= self.pixel_count {
            self.cursor = 0;
            self.sample += 1;
            log::trace!("Dispatched sample pass {}/{}", self.sample, self.samples);
        }
        true
    }

    fn stop(&mut self) {
        self.running = false;
    }
}

/// Outcome of [`TileQueue::claim_tile`].
#[derive(Debug)]
pub enum ClaimResult<'q, S: TileScheduler> {
    /// A tile is now owned by the caller until released
    Claimed(ClaimedTile<'q, S>),
    /// Every tile is busy or waiting for harvest; try again
    NoTileAvailable,
    /// Nothing more will be dispatched
    RenderingFinished,
}

/// Outcome of [`TileQueue::drain_tile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainResult {
    /// A finished tile was copied into the caller's buffer
    Drained,
    /// Work is still in flight or pending dispatch
    NoTileAvailable,
    /// Nothing in flight, nothing to harvest, nothing left to dispatch
    RenderingFinished,
}

/// A tile checked out of the pool by a worker.
///
/// Hand it back through [`TileQueue::release_tile`]. A tile dropped without
/// release (a panicking worker, say) frees its slot and its samples are lost,
/// so the queue can still run to completion.
pub struct ClaimedTile<'q, S: TileScheduler> {
    queue: &'q TileQueue<S>,
    slot: usize,
    tile: PixelTile,
    released: bool,
}

impl<S: TileScheduler> ClaimedTile<'_, S> {
    /// Pool slot this tile came from.
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl<S: TileScheduler> std::fmt::Debug for ClaimedTile<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimedTile")
            .field("slot", &self.slot)
            .field("tile", &self.tile)
            .finish()
    }
}

impl<S: TileScheduler> Deref for ClaimedTile<'_, S> {
    type Target = PixelTile;

    fn deref(&self) -> &PixelTile {
        &self.tile
    }
}

impl<S: TileScheduler> DerefMut for ClaimedTile<'_, S> {
    fn deref_mut(&mut self) -> &mut PixelTile {
        &mut self.tile
    }
}

impl<S: TileScheduler> Drop for ClaimedTile<'_, S> {
    fn drop(&mut self) {
        if !self.released {
            log::warn!("Tile in slot {} dropped without release", self.slot);
            self.queue
                .put_back(self.slot, std::mem::take(&mut self.tile), TileState::Free);
        }
    }
}

#[derive(Debug)]
struct TileSlot {
    state: TileState,
    tile: PixelTile,
}

struct QueueInner<S> {
    slots: Vec<TileSlot>,
    scheduler: S,
}

/// Fixed pool of tiles plus the scheduler that fills them, behind one lock.
pub struct TileQueue<S: TileScheduler> {
    inner: Mutex<QueueInner<S>>,
}

impl<S: TileScheduler> TileQueue<S> {
    /// Allocate `pool_size` tiles of up to `tile_size` pixels each.
    pub fn new(scheduler: S, pool_size: usize, tile_size: usize) -> RenderResult<Self> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(pool_size)?;
        for _ in 0..pool_size {
            slots.push(TileSlot {
                state: TileState::Free,
                tile: PixelTile::with_capacity(tile_size)?,
            });
        }

        Ok(Self {
            inner: Mutex::new(QueueInner { slots, scheduler }),
        })
    }

    /// Hand the first free tile to the caller, filled with the next unit of work.
    pub fn claim_tile(&self) -> ClaimResult<'_, S> {
        let mut inner = self.inner.lock();
        let QueueInner { slots, scheduler } = &mut *inner;

        if !scheduler.can_continue() {
            return ClaimResult::RenderingFinished;
        }

        let Some((slot, entry)) = slots
            .iter_mut()
            .enumerate()
            .find(|(_, entry)| entry.state == TileState::Free)
        else {
            return ClaimResult::NoTileAvailable;
        };

        if !scheduler.fill(&mut entry.tile) {
            return ClaimResult::RenderingFinished;
        }

        entry.state = TileState::InProgress;
        ClaimResult::Claimed(ClaimedTile {
            queue: self,
            slot,
            tile: std::mem::take(&mut entry.tile),
            released: false,
        })
    }

    /// Return a shaded tile to the pool, ready for harvest.
    pub fn release_tile(&self, mut claimed: ClaimedTile<'_, S>) {
        debug_assert!(std::ptr::eq(claimed.queue, self));
        claimed.released = true;
        self.put_back(
            claimed.slot,
            std::mem::take(&mut claimed.tile),
            TileState::AwaitingHarvest,
        );
    }

    fn put_back(&self, slot: usize, tile: PixelTile, state: TileState) {
        let mut inner = self.inner.lock();
        let entry = &mut inner.slots[slot];

        debug_assert_eq!(entry.state, TileState::InProgress);
        entry.tile = tile;
        entry.state = state;
    }

    /// Copy the first tile awaiting harvest into `out` and free its slot.
    ///
    /// `out` keeps its allocation between calls.
    pub fn drain_tile(&self, out: &mut PixelTile) -> DrainResult {
        let mut inner = self.inner.lock();
        let mut in_flight = false;

        for entry in inner.slots.iter_mut() {
            match entry.state {
                TileState::AwaitingHarvest => {
                    out.clone_from(&entry.tile);
                    entry.state = TileState::Free;
                    return DrainResult::Drained;
                }
                TileState::InProgress => in_flight = true,
                TileState::Free => {}
            }
        }

        if in_flight || inner.scheduler.can_continue() {
            DrainResult::NoTileAvailable
        } else {
            DrainResult::RenderingFinished
        }
    }

    /// Block new claims; tiles already claimed can still be released and drained.
    pub fn stop(&self) {
        self.inner.lock().scheduler.stop();
    }
}
