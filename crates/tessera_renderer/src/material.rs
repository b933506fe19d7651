//! Surface scattering models.

use rand::RngCore;
use tessera_math::Vec3;

use crate::{gen_f32, hittable::HitRecord, Ray};

/// Linear RGB.
pub type Color = Vec3;

/// Outcome of a successful scatter.
#[derive(Debug, Clone, Copy)]
pub struct ScatterResult {
    /// Per-channel throughput of the bounce
    pub attenuation: Color,
    /// Continuation of the light path
    pub scattered: Ray,
}

/// How a surface redirects light that reaches it.
pub trait Material: Send + Sync {
    /// Continue the path that arrived along `ray_in`, or `None` to absorb it.
    ///
    /// All randomness comes from `rng`, the calling worker's generator.
    fn scatter(
        &self,
        ray_in: &Ray,
        rec: &HitRecord,
        rng: &mut dyn RngCore,
    ) -> Option<ScatterResult>;
}

/// Ideal diffuse surface.
#[derive(Debug, Clone)]
pub struct Lambertian {
    albedo: Color,
}

impl Lambertian {
    pub fn new(albedo: Color) -> Self {
        Self { albedo }
    }
}

impl Material for Lambertian {
    fn scatter(
        &self,
        _ray_in: &Ray,
        rec: &HitRecord,
        rng: &mut dyn RngCore,
    ) -> Option<ScatterResult> {
        let direction = rec.normal + random_in_unit_sphere(rng);
        Some(ScatterResult {
            attenuation: self.albedo,
            scattered: Ray::new(rec.p, direction),
        })
    }
}

/// Mirror with optional roughness.
#[derive(Debug, Clone)]
pub struct Metal {
    albedo: Color,
    fuzz: f32,
}

impl Metal {
    /// `fuzz` is clamped to `[0, 1]`; 0 is a perfect mirror.
    pub fn new(albedo: Color, fuzz: f32) -> Self {
        Self {
            albedo,
            fuzz: fuzz.clamp(0.0, 1.0),
        }
    }

    pub fn fuzz(&self) -> f32 {
        self.fuzz
    }
}

impl Material for Metal {
    fn scatter(
        &self,
        ray_in: &Ray,
        rec: &HitRecord,
        rng: &mut dyn RngCore,
    ) -> Option<ScatterResult> {
        let reflected = reflect(ray_in.direction().normalize(), rec.normal);
        let direction = reflected + self.fuzz * random_in_unit_sphere(rng);

        // Anything pushed below the surface is absorbed
        if direction.dot(rec.normal) > 0.0 {
            Some(ScatterResult {
                attenuation: self.albedo,
                scattered: Ray::new(rec.p, direction),
            })
        } else {
            None
        }
    }
}

/// Clear refractive medium such as glass or water. Never absorbs.
#[derive(Debug, Clone)]
pub struct Dielectric {
    ior: f32,
}

impl Dielectric {
    /// `ior` is relative to the surrounding air.
    pub fn new(ior: f32) -> Self {
        Self { ior }
    }

    /// Fresnel reflectance at `cosine` incidence (Schlick).
    pub fn reflectance(cosine: f32, ior: f32) -> f32 {
        let r0 = ((1.0 - ior) / (1.0 + ior)).powi(2);
        r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
    }
}

impl Material for Dielectric {
    fn scatter(
        &self,
        ray_in: &Ray,
        rec: &HitRecord,
        rng: &mut dyn RngCore,
    ) -> Option<ScatterResult> {
        let direction = ray_in.direction();
        let cos_in = direction.dot(rec.normal) / direction.length();

        // Leaving the medium when travelling along the outward normal
        let (outward_normal, ni_over_nt, cosine) = if cos_in > 0.0 {
            (-rec.normal, self.ior, cos_in)
        } else {
            (rec.normal, 1.0 / self.ior, -cos_in)
        };

        let reflected = reflect(direction, rec.normal);
        let scattered = match refract(direction, outward_normal, ni_over_nt) {
            Some(refracted) if gen_f32(rng) >= Self::reflectance(cosine, self.ior) => refracted,
            // Total internal reflection, or the Fresnel draw chose the mirror
            _ => reflected,
        };

        Some(ScatterResult {
            attenuation: Color::ONE,
            scattered: Ray::new(rec.p, scattered),
        })
    }
}

/// Mirror `v` about the plane with normal `n`.
#[inline]
fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract a vector through a surface with Snell's law.
///
/// Returns `None` when no real solution exists (total internal reflection).
#[inline]
fn refract(v: Vec3, n: Vec3, ni_over_nt: f32) -> Option<Vec3> {
    let uv = v.normalize();
    let dt = uv.dot(n);
    let discriminant = 1.0 - ni_over_nt * ni_over_nt * (1.0 - dt * dt);
    if discriminant > 0.0 {
        Some(ni_over_nt * (uv - n * dt) - n * discriminant.sqrt())
    } else {
        None
    }
}

/// Random point strictly inside the unit sphere, by rejection sampling.
fn random_in_unit_sphere(rng: &mut dyn RngCore) -> Vec3 {
    loop {
        let p = Vec3::new(
            gen_f32(rng) * 2.0 - 1.0,
            gen_f32(rng) * 2.0 - 1.0,
            gen_f32(rng) * 2.0 - 1.0,
        );
        if p.length_squared() < 1.0 {
            return p;
        }
    }
}
