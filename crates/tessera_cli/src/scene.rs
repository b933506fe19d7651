//! Built-in demo scenes.

use std::sync::Arc;

use clap::ValueEnum;
use rand::Rng;
use tessera_renderer::{Color, Dielectric, HittableList, Lambertian, Metal, Sphere, Vec3};

#[derive(Debug, Default, Clone, Copy, ValueEnum)]
pub enum AvailableScene {
    /// Ground, a field of small random spheres and three large ones
    #[default]
    Random,
    /// Ground and one diffuse sphere
    Single,
}

impl AvailableScene {
    pub fn build(self, rng: &mut impl Rng) -> HittableList {
        match self {
            AvailableScene::Random => random_scene(rng),
            AvailableScene::Single => single_scene(),
        }
    }
}

fn ground() -> Sphere {
    Sphere::new(
        Vec3::new(0.0, -1000.0, 0.0),
        1000.0,
        Arc::new(Lambertian::new(Color::splat(0.5))),
    )
}

/// The classic sphere field: up to 22x22 small spheres around three big ones.
pub fn random_scene(rng: &mut impl Rng) -> HittableList {
    let mut world = HittableList::new();
    world.add(ground());

    let glass = Arc::new(Dielectric::new(1.5));
    for a in -11..11 {
        for b in -11..11 {
            let choose_mat: f32 = rng.gen();
            let center = Vec3::new(
                a as f32 + 0.9 * rng.gen::<f32>(),
                0.2,
                b as f32 + 0.9 * rng.gen::<f32>(),
            );

            // Keep clear of the big metal sphere
            if (center - Vec3::new(4.0, 0.2, 0.0)).length() <= 0.9 {
                continue;
            }

            if choose_mat < 0.8 {
                let albedo = Color::new(
                    rng.gen::<f32>() * rng.gen::<f32>(),
                    rng.gen::<f32>() * rng.gen::<f32>(),
                    rng.gen::<f32>() * rng.gen::<f32>(),
                );
                world.add(Sphere::new(center, 0.2, Arc::new(Lambertian::new(albedo))));
            } else if choose_mat < 0.95 {
                let albedo = Color::new(
                    0.5 * (1.0 + rng.gen::<f32>()),
                    0.5 * (1.0 + rng.gen::<f32>()),
                    0.5 * (1.0 + rng.gen::<f32>()),
                );
                let fuzz = 0.5 * rng.gen::<f32>();
                world.add(Sphere::new(center, 0.2, Arc::new(Metal::new(albedo, fuzz))));
            } else {
                world.add(Sphere::new(center, 0.2, glass.clone()));
            }
        }
    }

    world.add(Sphere::new(
        Vec3::new(0.0, 1.0, 0.0),
        1.0,
        Arc::new(Dielectric::new(1.3)),
    ));
    world.add(Sphere::new(
        Vec3::new(-4.0, 1.0, 0.0),
        1.0,
        Arc::new(Lambertian::new(Color::new(0.4, 0.2, 0.1))),
    ));
    world.add(Sphere::new(
        Vec3::new(4.0, 1.0, 0.0),
        1.0,
        Arc::new(Metal::new(Color::new(0.7, 0.6, 0.5), 0.0)),
    ));

    world
}

pub fn single_scene() -> HittableList {
    let mut world = HittableList::new();
    world.add(ground());
    world.add(Sphere::new(
        Vec3::new(0.0, 1.0, 0.0),
        1.0,
        Arc::new(Lambertian::new(Color::new(0.8, 0.3, 0.3))),
    ));
    world
}
