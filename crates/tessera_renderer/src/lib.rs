//! Tessera - progressive CPU path tracing.
//!
//! A Monte Carlo path tracer that refines its image over successive
//! full-frame sample passes. Worker threads pull pixel tiles from a small
//! shared pool; the host drains finished tiles into a running-mean
//! accumulation buffer once per frame while rendering continues.

mod camera;
mod config;
mod error;
mod hittable;
mod material;
mod path_tracer;
mod renderer;
mod sphere;
mod tile;

pub use camera::{Camera, CameraConfig};
pub use config::RenderConfig;
pub use error::{RenderError, RenderResult};
pub use hittable::{HitRecord, Hittable, HittableList, Object};
pub use material::{Color, Dielectric, Lambertian, Material, Metal, ScatterResult};
pub use path_tracer::PathTracer;
pub use renderer::{
    accumulate, color_to_rgba, linear_to_gamma, ray_color, render_tile, sky_gradient,
    AccumulationBuffer, MAX_DEPTH, T_MAX, T_MIN,
};
pub use sphere::Sphere;
pub use tile::{
    ClaimResult, ClaimedTile, DrainResult, PassCursor, PixelTile, TileQueue, TileScheduler,
    TileState, DEFAULT_TILE_POOL_SIZE, DEFAULT_TILE_SIZE,
};

/// Re-export Vec3 and common math types from tessera_math
pub use tessera_math::{Interval, Ray, Vec3};

use rand::{Rng, RngCore};

/// Uniform sample in [0, 1) from any generator.
#[inline]
pub(crate) fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    rng.gen::<f32>()
}
