//! Math primitives shared by the renderer: glam vectors plus rays and
//! parameter intervals.

pub use glam::*;

mod interval;
mod ray;
pub use interval::Interval;
pub use ray::Ray;
