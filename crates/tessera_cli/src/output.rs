use std::path::Path;

use anyhow::{Context, Result};
use image::RgbaImage;
use tessera_renderer::PathTracer;

pub fn save_png(tracer: &PathTracer, path: &Path) -> Result<()> {
    let image = RgbaImage::from_raw(tracer.width(), tracer.height(), tracer.to_rgba_top_down())
        .context("Image buffer does not match render dimensions")?;

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    log::info!("Saving {}", path.display());
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tessera_renderer::{Camera, CameraConfig, HittableList, RenderConfig};

    #[test]
    fn test_save_png_writes_top_row_first() {
        let config = RenderConfig::default()
            .with_resolution(7, 5)
            .with_quality(2, 8)
            .with_seed(3);
        let camera = Camera::new(&CameraConfig::default(), config.aspect_ratio());
        let mut tracer = PathTracer::new(config, HittableList::new(), camera).unwrap();

        tracer.start_rendering().unwrap();
        let deadline = Instant::now() + Duration::from_secs(30);
        while !tracer.is_finished() {
            assert!(Instant::now() < deadline);
            tracer.pump_completed_tiles();
            std::thread::yield_now();
        }

        let dir = std::env::temp_dir().join(format!("tessera-png-{}", std::process::id()));
        let path = dir.join("render.png");
        save_png(&tracer, &path).unwrap();

        let saved = image::open(&path).unwrap().to_rgba8();
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(saved.dimensions(), (7, 5));
        assert_eq!(saved.into_raw(), tracer.to_rgba_top_down());
    }
}
