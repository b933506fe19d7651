//! Scene geometry queries.

use crate::{Material, Ray, Sphere};
use tessera_math::{Interval, Vec3};

/// Closest intersection found by a query.
///
/// Rebuilt for every query; it only borrows from the scene.
#[derive(Clone, Copy)]
pub struct HitRecord<'a> {
    pub t: f32,
    /// `ray.at(t)`
    pub p: Vec3,
    /// Outward surface normal (not flipped towards the ray)
    pub normal: Vec3,
    pub material: &'a dyn Material,
    /// Leaf primitive that was hit, when queried through an [`Object`]
    pub object: Option<&'a Object>,
}

impl std::fmt::Debug for HitRecord<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HitRecord")
            .field("t", &self.t)
            .field("p", &self.p)
            .field("normal", &self.normal)
            .field("object", &self.object.is_some())
            .finish()
    }
}

/// Anything a ray can be intersected with. Shared read-only by all workers.
pub trait Hittable: Send + Sync {
    /// Nearest intersection with `t` strictly inside `ray_t`.
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'_>>;
}

/// A scene node: either a primitive or a nested collection.
pub enum Object {
    Sphere(Sphere),
    List(HittableList),
}

impl Object {
    /// The sphere inside this node, if it is one.
    pub fn as_sphere(&self) -> Option<&Sphere> {
        match self {
            Object::Sphere(sphere) => Some(sphere),
            Object::List(_) => None,
        }
    }
}

impl From<Sphere> for Object {
    fn from(sphere: Sphere) -> Self {
        Object::Sphere(sphere)
    }
}

impl From<HittableList> for Object {
    fn from(list: HittableList) -> Self {
        Object::List(list)
    }
}

impl Hittable for Object {
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'_>> {
        match self {
            Object::Sphere(sphere) => sphere.hit(ray, ray_t).map(|rec| HitRecord {
                object: Some(self),
                ..rec
            }),
            // Nested lists already stamped the leaf they matched
            Object::List(list) => list.hit(ray, ray_t),
        }
    }
}

/// A list of hittable objects.
///
/// Owns its children: clearing or dropping the list drops every primitive.
#[derive(Default)]
pub struct HittableList {
    objects: Vec<Object>,
}

impl HittableList {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    pub fn add(&mut self, object: impl Into<Object>) {
        self.objects.push(object.into());
    }

    /// Drop every child.
    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// The direct children, in insertion order.
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }
}

impl FromIterator<Object> for HittableList {
    fn from_iter<I: IntoIterator<Item = Object>>(iter: I) -> Self {
        Self {
            objects: iter.into_iter().collect(),
        }
    }
}

impl Hittable for HittableList {
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'_>> {
        let mut closest: Option<HitRecord<'_>> = None;

        for object in &self.objects {
            let max = closest.as_ref().map_or(ray_t.max, |rec| rec.t);
            if let Some(rec) = object.hit(ray, ray_t.with_max(max)) {
                closest = Some(rec);
            }
        }

        closest
    }
}
