mod output;
mod scene;

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use scene::AvailableScene;
use serde::{Deserialize, Serialize};
use tessera_renderer::{Camera, CameraConfig, PathTracer, RenderConfig};

/// Mixed into `--seed` for the scene layout so it never shares a stream
/// with a render worker (workers use `seed + index`).
const SCENE_SEED_SALT: u64 = 0x5CE7_E5A1_7000_0001;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    width: u32,
    height: u32,
}

impl std::str::FromStr for Dimensions {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((width, height)) = s.split_once('x') else {
            return Err(anyhow::anyhow!("Incorrect format, expected `width`x`height`"));
        };

        Ok(Dimensions {
            width: width.parse()?,
            height: height.parse()?,
        })
    }
}

impl Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Progressive CPU path tracer")]
pub struct Args {
    #[arg(short, long)]
    /// Image dimension in format `width`x`height`
    dimensions: Option<Dimensions>,

    #[arg(long = "spp")]
    /// Samples per pixel
    samples_per_pixel: Option<u32>,

    #[arg(short, long)]
    /// Number of render worker threads
    threads: Option<usize>,

    #[arg(long)]
    /// Seed for the scene layout and the workers' generators
    seed: Option<u64>,

    #[arg(short, long)]
    /// JSON settings file with `render` and `camera` sections
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t)]
    /// Scene selector
    scene: AvailableScene,

    #[arg(short, long, default_value = "output.png")]
    output: PathBuf,

    #[arg(long, default_value_t = 16)]
    /// Milliseconds between two harvests of finished tiles
    frame_ms: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct Settings {
    render: RenderConfig,
    camera: CameraConfig,
}

impl Settings {
    fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    fn apply(&mut self, args: &Args) {
        let render = &mut self.render;
        if let Some(dimensions) = args.dimensions {
            render.width = dimensions.width;
            render.height = dimensions.height;
        }
        if let Some(samples) = args.samples_per_pixel {
            render.samples_per_pixel = samples;
        }
        if let Some(threads) = args.threads {
            render.thread_count = threads;
        }
        if let Some(seed) = args.seed {
            render.seed = Some(seed);
        }
    }
}

fn scene_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ SCENE_SEED_SALT),
        None => StdRng::from_entropy(),
    }
}

fn run(args: Args) -> Result<()> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.apply(&args);
    let Settings { render, camera } = settings;

    let world = args.scene.build(&mut scene_rng(render.seed));
    log::info!("Scene {:?} built with {} objects", args.scene, world.len());

    let camera = Camera::new(&camera, render.aspect_ratio());
    let mut tracer = PathTracer::new(render, world, camera).context("Failed to set up renderer")?;
    tracer
        .start_rendering()
        .context("Failed to start render workers")?;

    let frame = Duration::from_millis(args.frame_ms);
    let mut reported = 0;
    while !tracer.is_finished() {
        tracer.pump_completed_tiles();
        if tracer.completed_passes() > reported {
            reported = tracer.completed_passes();
            log::info!(
                "Pass {}/{} ({:.0}%)",
                reported,
                tracer.config().samples_per_pixel,
                tracer.progress() * 100.0
            );
        }
        std::thread::sleep(frame);
    }

    output::save_png(&tracer, &args.output)?;
    log::info!("Done");
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    run(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimensions() {
        let dims: Dimensions = "640x480".parse().unwrap();
        assert_eq!(dims, Dimensions { width: 640, height: 480 });
        assert_eq!(dims.to_string(), "640x480");

        assert!("640".parse::<Dimensions>().is_err());
        assert!("640xabc".parse::<Dimensions>().is_err());
    }

    #[test]
    fn test_args_override_settings() {
        let args = Args::parse_from(["tessera", "-d", "320x200", "--spp", "4", "--seed", "11"]);
        let mut settings: Settings =
            serde_json::from_str(r#"{ "render": { "thread_count": 6, "samples_per_pixel": 64 } }"#)
                .unwrap();
        settings.apply(&args);

        assert_eq!(settings.render.width, 320);
        assert_eq!(settings.render.height, 200);
        assert_eq!(settings.render.samples_per_pixel, 4);
        assert_eq!(settings.render.thread_count, 6);
        assert_eq!(settings.render.seed, Some(11));
        assert_eq!(settings.camera, CameraConfig::default());
    }

    fn first_draws(mut rng: StdRng) -> Vec<u64> {
        use rand::Rng;
        (0..4).map(|_| rng.gen()).collect()
    }

    #[test]
    fn test_scene_stream_differs_from_workers() {
        let seed = 42;
        let scene = first_draws(scene_rng(Some(seed)));

        // Workers seed with `seed + index`
        for worker in 0..8 {
            let samples = first_draws(StdRng::seed_from_u64(seed + worker));
            assert_ne!(scene, samples, "worker {worker}");
        }

        // Same seed, same layout
        assert_eq!(scene, first_draws(scene_rng(Some(seed))));
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["tessera"]);
        assert_eq!(args.output, PathBuf::from("output.png"));
        assert_eq!(args.frame_ms, 16);
        assert!(matches!(args.scene, AvailableScene::Random));
        assert!(args.config.is_none());
    }
}
