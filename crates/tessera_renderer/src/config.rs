//! Render configuration, fixed for a renderer's lifetime.

use serde::{Deserialize, Serialize};

use crate::renderer::MAX_DEPTH;
use crate::tile::{DEFAULT_TILE_POOL_SIZE, DEFAULT_TILE_SIZE};
use crate::{RenderError, RenderResult};

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Number of full-frame sample passes to accumulate
    pub samples_per_pixel: u32,
    /// Number of worker threads
    pub thread_count: usize,
    /// Maximum ray bounce depth
    pub max_depth: u32,
    /// Pixels per tile
    pub tile_size: usize,
    /// Number of reusable tiles shared by the workers
    pub tile_pool_size: usize,
    /// Seed for the per-worker generators; entropy when unset
    pub seed: Option<u64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 720,
            samples_per_pixel: 8,
            thread_count: 2,
            max_depth: MAX_DEPTH,
            tile_size: DEFAULT_TILE_SIZE,
            tile_pool_size: DEFAULT_TILE_POOL_SIZE,
            seed: None,
        }
    }
}

impl RenderConfig {
    /// Set image resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set quality settings.
    pub fn with_quality(mut self, samples: u32, max_depth: u32) -> Self {
        self.samples_per_pixel = samples;
        self.max_depth = max_depth;
        self
    }

    /// Set the worker thread count.
    pub fn with_threads(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }

    /// Seed the worker generators.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Total number of pixels in the image.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Reject configurations the scheduler cannot make progress with.
    pub fn validate(&self) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "image must have non-zero size, got {}x{}",
                self.width, self.height
            )));
        }
        if self.samples_per_pixel == 0 {
            return Err(RenderError::InvalidConfig(
                "samples_per_pixel must be at least 1".to_string(),
            ));
        }
        if self.thread_count == 0 {
            return Err(RenderError::InvalidConfig(
                "thread_count must be at least 1".to_string(),
            ));
        }
        if self.tile_size == 0 {
            return Err(RenderError::InvalidConfig(
                "tile_size must be at least 1".to_string(),
            ));
        }
        if self.tile_pool_size == 0 {
            return Err(RenderError::InvalidConfig(
                "tile_pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.thread_count, 2);
        assert_eq!(config.max_depth, 50);
        assert_eq!(config.tile_size, 512);
        assert_eq!(config.tile_pool_size, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = RenderConfig::default()
            .with_resolution(64, 32)
            .with_quality(4, 10)
            .with_threads(3)
            .with_seed(7);

        assert_eq!(config.pixel_count(), 64 * 32);
        assert_eq!(config.aspect_ratio(), 2.0);
        assert_eq!(config.samples_per_pixel, 4);
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.thread_count, 3);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        let zero_width = RenderConfig::default().with_resolution(0, 10);
        assert!(matches!(
            zero_width.validate(),
            Err(RenderError::InvalidConfig(_))
        ));

        let zero_samples = RenderConfig::default().with_quality(0, 50);
        assert!(zero_samples.validate().is_err());

        let zero_threads = RenderConfig::default().with_threads(0);
        assert!(zero_threads.validate().is_err());

        let zero_tiles = RenderConfig {
            tile_pool_size: 0,
            ..RenderConfig::default()
        };
        assert!(zero_tiles.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RenderConfig =
            serde_json::from_str(r#"{ "width": 320, "height": 240, "seed": 3 }"#).unwrap();

        assert_eq!(config.width, 320);
        assert_eq!(config.height, 240);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.samples_per_pixel, 8);
        assert_eq!(config.tile_size, 512);
    }
}
