//! Light transport and the progressive image.
//!
//! One call to [`render_tile`] adds a single jittered sample to every pixel
//! of a tile; [`AccumulationBuffer`] folds those tiles into running means.

use rand::RngCore;
use rayon::prelude::*;
use tessera_math::Interval;

use crate::{gen_f32, Camera, Color, Hittable, PixelTile, Ray, RenderResult};

/// Default maximum ray bounce depth.
pub const MAX_DEPTH: u32 = 50;

/// Nearest accepted hit distance; keeps bounced rays off their own surface.
pub const T_MIN: f32 = 0.001;

/// Farthest traced hit distance.
pub const T_MAX: f32 = 100.0;

/// Radiance carried back along `ray`.
///
/// Bounces are followed iteratively with a running throughput. A path that
/// is still bouncing after `max_depth` scatters contributes black.
pub fn ray_color(
    ray: &Ray,
    world: &dyn Hittable,
    max_depth: u32,
    rng: &mut dyn RngCore,
) -> Color {
    let mut throughput = Color::ONE;
    let mut ray = *ray;
    let mut depth = 0;

    loop {
        let Some(rec) = world.hit(&ray, Interval::new(T_MIN, T_MAX)) else {
            return throughput * sky_gradient(&ray);
        };

        if depth >= max_depth {
            return Color::ZERO;
        }

        match rec.material.scatter(&ray, &rec, rng) {
            Some(result) => {
                throughput *= result.attenuation;
                ray = result.scattered;
                depth += 1;
            }
            // Absorbed
            None => return Color::ZERO,
        }
    }
}

/// Background seen by rays that escape the scene.
///
/// Blends white at the horizon-down into sky blue straight up.
pub fn sky_gradient(ray: &Ray) -> Color {
    let unit_direction = ray.direction().normalize();
    let a = 0.5 * (unit_direction.y + 1.0);
    let white = Color::new(1.0, 1.0, 1.0);
    let blue = Color::new(0.5, 0.7, 1.0);
    white * (1.0 - a) + blue * a
}

/// Shade every pixel of a tile with one jittered sample each.
pub fn render_tile(
    tile: &mut PixelTile,
    camera: &Camera,
    world: &dyn Hittable,
    width: u32,
    height: u32,
    max_depth: u32,
    rng: &mut dyn RngCore,
) {
    let start = tile.start_pixel;
    let width_f = width as f32;
    let height_f = height as f32;

    for (offset, pixel) in tile.pixels_mut().iter_mut().enumerate() {
        let index = start + offset;
        let x = (index % width as usize) as f32;
        let y = (index / width as usize) as f32;

        let s = (x + gen_f32(rng)) / width_f;
        let t = (y + gen_f32(rng)) / height_f;
        let ray = camera.get_ray(s, t, rng);

        *pixel = ray_color(&ray, world, max_depth, rng);
    }
}

/// Fold one more sample into a running mean of `n` samples.
#[inline]
pub fn accumulate(mean: Color, sample: Color, n: u32) -> Color {
    let n = n as f32;
    (mean * n + sample) / (n + 1.0)
}

/// Gamma 2 encoding; non-positive input maps to 0.
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Gamma-encode and quantize a linear color, alpha fixed at 255.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let quantize = |c: f32| (255.99 * Interval::UNIT.clamp(linear_to_gamma(c))) as u8;
    [quantize(color.x), quantize(color.y), quantize(color.z), 255]
}

/// Progressive image: a running mean per pixel.
///
/// Row 0 is the bottom of the image.
pub struct AccumulationBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
    sample_counts: Vec<u32>,
}

impl AccumulationBuffer {
    /// Create a new buffer filled with black.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        let len = width as usize * height as usize;

        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len)?;
        pixels.resize(len, Color::ZERO);

        let mut sample_counts = Vec::new();
        sample_counts.try_reserve_exact(len)?;
        sample_counts.resize(len, 0);

        Ok(Self {
            width,
            height,
            pixels,
            sample_counts,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Linear colors, row-major, bottom row first.
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    /// Get the pixel at (x, y), with y = 0 at the bottom.
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[pixel_index(self.width, x, y)]
    }

    /// Samples merged into the pixel at row-major `index`.
    pub fn sample_count(&self, index: usize) -> u32 {
        self.sample_counts[index]
    }

    /// Merge a harvested tile into the running means.
    ///
    /// Each pixel tracks its own sample count, so tiles of different passes
    /// may arrive in any order.
    pub fn merge_tile(&mut self, tile: &PixelTile) {
        let range = tile.pixel_range();
        let means = &mut self.pixels[range.clone()];
        let counts = &mut self.sample_counts[range];

        for ((mean, count), &sample) in means.iter_mut().zip(counts.iter_mut()).zip(tile.pixels()) {
            *mean = accumulate(*mean, sample, *count);
            *count += 1;
        }
    }

    /// Convert to RGBA bytes with the top row first (for display or saving).
    ///
    /// Rows are converted in parallel.
    pub fn to_rgba_top_down(&self) -> Vec<u8> {
        let width = self.width as usize;
        let height = self.height as usize;

        let mut bytes = vec![0u8; self.pixels.len() * 4];
        bytes
            .par_chunks_exact_mut(width * 4)
            .enumerate()
            .for_each(|(row, out)| {
                // Row 0 of the buffer is the bottom of the picture
                let start = (height - 1 - row) * width;
                let source = &self.pixels[start..start + width];
                for (px, color) in out.chunks_exact_mut(4).zip(source) {
                    px.copy_from_slice(&color_to_rgba(*color));
                }
            });
        bytes
    }
}

/// Row-major index of `(x, y)`, computed in `usize` so large images don't wrap.
#[inline]
fn pixel_index(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CameraConfig, Dielectric, HittableList, Lambertian, Material, Metal, Sphere, Vec3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn approx_eq(a: Color, b: Color, eps: f32) -> bool {
        (a - b).abs().max_element() < eps
    }

    #[test]
    fn test_sky_gradient() {
        // Ray pointing up is pure sky blue, down is pure white
        let up = sky_gradient(&Ray::new(Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0)));
        let down = sky_gradient(&Ray::new(Vec3::ZERO, Vec3::new(0.0, -2.0, 0.0)));

        assert!(approx_eq(up, Color::new(0.5, 0.7, 1.0), 1e-6));
        assert!(approx_eq(down, Color::ONE, 1e-6));
    }

    #[test]
    fn test_miss_returns_exact_background() {
        let world = HittableList::new();
        let mut rng = StdRng::seed_from_u64(42);

        for direction in [
            Vec3::new(0.3, 0.8, -1.0),
            Vec3::new(-2.0, -0.5, 0.1),
            Vec3::new(0.0, 0.0, -1.0),
        ] {
            let ray = Ray::new(Vec3::new(1.0, 2.0, 3.0), direction);
            let a = 0.5 * (direction.normalize().y + 1.0);
            let expected = (1.0 - a) * Color::ONE + a * Color::new(0.5, 0.7, 1.0);

            assert_eq!(ray_color(&ray, &world, MAX_DEPTH, &mut rng), expected);
        }
    }

    #[test]
    fn test_hits_beyond_t_max_are_ignored() {
        let mut world = HittableList::new();
        world.add(Sphere::new(
            Vec3::new(0.0, 0.0, -200.0),
            1.0,
            Arc::new(Lambertian::new(Color::ZERO)),
        ));
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(ray_color(&ray, &world, MAX_DEPTH, &mut rng), sky_gradient(&ray));
    }

    #[test]
    fn test_absorbing_material_is_black() {
        let mut world = HittableList::new();
        world.add(Sphere::new(
            Vec3::new(0.0, 0.0, -3.0),
            1.0,
            Arc::new(Lambertian::new(Color::ZERO)),
        ));
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(ray_color(&ray, &world, MAX_DEPTH, &mut rng), Color::ZERO);
    }

    #[test]
    fn test_depth_cap_terminates_black() {
        // Two facing mirrors trap the path until the bounce cap
        let mirror: Arc<dyn Material> = Arc::new(Metal::new(Color::ONE, 0.0));
        let mut world = HittableList::new();
        world.add(Sphere::new(Vec3::new(0.0, 0.0, 1002.0), 1000.0, mirror.clone()));
        world.add(Sphere::new(Vec3::new(0.0, 0.0, -1002.0), 1000.0, mirror));

        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(ray_color(&ray, &world, 10, &mut rng), Color::ZERO);
    }

    #[test]
    fn test_zero_depth_still_sees_background() {
        let world = HittableList::new();
        let ray = Ray::new(Vec3::ZERO, Vec3::Y);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(ray_color(&ray, &world, 0, &mut rng), sky_gradient(&ray));
    }

    #[test]
    fn test_glass_is_lossless() {
        // A clear sphere alone in the sky only redirects light
        let mut world = HittableList::new();
        world.add(Sphere::new(
            Vec3::new(0.0, 0.0, -3.0),
            1.0,
            Arc::new(Dielectric::new(1.5)),
        ));
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..32 {
            let color = ray_color(&ray, &world, MAX_DEPTH, &mut rng);
            assert!(color.min_element() >= 0.5 - 1e-6);
            assert!(color.max_element() <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn test_running_mean_is_order_independent() {
        let samples = [
            Color::new(0.1, 0.9, 0.3),
            Color::new(0.7, 0.2, 0.5),
            Color::new(0.4, 0.4, 0.0),
            Color::new(1.0, 0.0, 0.8),
            Color::new(0.25, 0.6, 0.45),
        ];
        let mean = samples.iter().copied().sum::<Color>() / samples.len() as f32;

        let fold = |order: &[usize]| {
            order
                .iter()
                .enumerate()
                .fold(Color::ZERO, |acc, (n, &i)| accumulate(acc, samples[i], n as u32))
        };

        for order in [[0, 1, 2, 3, 4], [4, 3, 2, 1, 0], [2, 0, 4, 1, 3]] {
            assert!(approx_eq(fold(&order), mean, 1e-5));
        }
    }

    #[test]
    fn test_merge_tiles_out_of_pass_order() {
        let mut buffer = AccumulationBuffer::new(4, 2).unwrap();

        let mut later = PixelTile::with_capacity(4).unwrap();
        later.assign(2, 4, 1);
        later.pixels_mut().fill(Color::splat(0.8));

        let mut earlier = PixelTile::with_capacity(4).unwrap();
        earlier.assign(2, 4, 0);
        earlier.pixels_mut().fill(Color::splat(0.2));

        // Pass 1 arrives before pass 0
        buffer.merge_tile(&later);
        buffer.merge_tile(&earlier);

        for i in 2..6 {
            assert!(approx_eq(buffer.pixels()[i], Color::splat(0.5), 1e-6));
            assert_eq!(buffer.sample_count(i), 2);
        }
        assert_eq!(buffer.pixels()[0], Color::ZERO);
        assert_eq!(buffer.sample_count(7), 0);
    }

    #[test]
    fn test_rgba_flips_rows() {
        let mut buffer = AccumulationBuffer::new(1, 2).unwrap();
        let mut bottom = PixelTile::with_capacity(1).unwrap();
        bottom.assign(0, 1, 0);
        bottom.pixels_mut()[0] = Color::ONE;
        buffer.merge_tile(&bottom);

        assert_eq!(buffer.get(0, 0), Color::ONE);
        // Top row first: black, then the white bottom pixel
        assert_eq!(buffer.to_rgba_top_down(), vec![0, 0, 0, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn test_rgba_rows_in_display_order() {
        // 3 wide, 4 tall, each row a different gray
        let mut buffer = AccumulationBuffer::new(3, 4).unwrap();
        let mut tile = PixelTile::with_capacity(12).unwrap();
        tile.assign(0, 12, 0);
        for (i, pixel) in tile.pixels_mut().iter_mut().enumerate() {
            *pixel = Color::splat((i / 3) as f32 / 4.0);
        }
        buffer.merge_tile(&tile);

        let rgba = buffer.to_rgba_top_down();
        assert_eq!(rgba.len(), 3 * 4 * 4);
        for (row, bytes) in rgba.chunks_exact(3 * 4).enumerate() {
            let expected = color_to_rgba(buffer.get(0, 3 - row as u32));
            assert!(bytes.chunks_exact(4).all(|px| px == expected));
        }
    }

    #[test]
    fn test_pixel_index_does_not_wrap() {
        assert_eq!(pixel_index(4, 1, 2), 9);
        // Past u32::MAX pixels: 70_000 * 70_000 = 4.9e9
        assert_eq!(pixel_index(70_000, 5, 70_000), 4_900_000_005);
    }

    #[test]
    fn test_color_to_rgba() {
        assert_eq!(color_to_rgba(Color::ZERO), [0, 0, 0, 255]);
        assert_eq!(color_to_rgba(Color::new(2.0, -1.0, 0.25)), [255, 0, 127, 255]);
    }

    #[test]
    fn test_linear_to_gamma() {
        assert_eq!(linear_to_gamma(0.0), 0.0);
        assert!((linear_to_gamma(1.0) - 1.0).abs() < 0.0001);
        assert!((linear_to_gamma(0.25) - 0.5).abs() < 0.0001);
    }

    #[test]
    fn test_render_tile_wraps_rows() {
        let world = HittableList::new();
        let config = CameraConfig::default()
            .with_position(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y)
            .with_lens(90.0, 0.0, 1.0);
        let camera = Camera::new(&config, 1.0);
        let mut rng = StdRng::seed_from_u64(8);

        // 4x4 image, tile starting mid-row and running to the last pixel
        let mut tile = PixelTile::with_capacity(16).unwrap();
        tile.assign(2, 14, 0);
        render_tile(&mut tile, &camera, &world, 4, 4, MAX_DEPTH, &mut rng);

        // Top row looks up into bluer (less red) sky than the bottom row
        let pixels = tile.pixels();
        assert_eq!(pixels.len(), 14);
        for x in 2..4 {
            let bottom = pixels[x - 2];
            let top = pixels[12 + x - 2];
            assert!(top.x < bottom.x, "column {x}: {top:?} vs {bottom:?}");
        }
    }
}
