/// Parameter bounds along a ray.
///
/// Hit queries accept a root only when it lies strictly between `min` and
/// `max`; the lower bound keeps secondary rays from re-hitting the surface
/// they just left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    /// `[0, 1]`
    pub const UNIT: Interval = Interval { min: 0.0, max: 1.0 };

    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Inclusive containment: both bounds are accepted.
    pub fn contains(&self, t: f32) -> bool {
        t >= self.min && t <= self.max
    }

    /// Strict containment: neither bound is accepted.
    pub fn surrounds(&self, t: f32) -> bool {
        t > self.min && t < self.max
    }

    pub fn size(&self) -> f32 {
        self.max - self.min
    }

    pub fn clamp(&self, t: f32) -> f32 {
        t.clamp(self.min, self.max)
    }

    /// Shrink the far bound, e.g. to the closest hit found so far.
    pub fn with_max(&self, max: f32) -> Interval {
        Interval { max, ..*self }
    }
}
