//! Bounding-sphere broad phase (distilled spec §4.7): a cheap over-estimate
//! of a body's extent, used to cull pairs before narrow-phase collision
//! detection (left as an open interface — see `DESIGN.md`).

use glam::DVec3;

use crate::Real;

/// A sphere that bounds some body's extent, for coarse overlap tests.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    /// World-space centre.
    pub centre: DVec3,
    /// Radius; always non-negative.
    pub radius: Real,
}

impl BoundingSphere {
    /// Creates a sphere directly from its centre and radius.
    pub fn new(centre: DVec3, radius: Real) -> Self {
        Self { centre, radius }
    }

    /// Creates the smallest sphere that fully contains both `a` and `b`.
    ///
    /// If one sphere already contains the other, that sphere is returned
    /// unchanged (up to floating point).
    pub fn merge(a: &BoundingSphere, b: &BoundingSphere) -> Self {
        let centre_offset = b.centre - a.centre;
        let distance = centre_offset.length();

        if distance + b.radius <= a.radius {
            return *a;
        }
        if distance + a.radius <= b.radius {
            return *b;
        }

        let radius = (distance + a.radius + b.radius) * 0.5;
        let centre = if distance > 1e-12 {
            a.centre + centre_offset * ((radius - a.radius) / distance)
        } else {
            a.centre
        };

        Self { centre, radius }
    }

    /// Whether `point` lies within the sphere.
    pub fn contains(&self, point: DVec3) -> bool {
        (point - self.centre).length_squared() <= self.radius * self.radius
    }

    /// Whether two spheres overlap (including touching).
    pub fn overlaps(&self, other: &BoundingSphere) -> bool {
        let distance_squared = (self.centre - other.centre).length_squared();
        let radius_sum = self.radius + other.radius;
        distance_squared <= radius_sum * radius_sum
    }

    /// How much `merge(self, other)`'s squared radius would grow relative to
    /// `self`'s. Broad phases use this to decide which pair of leaves to
    /// merge first when building a bounding-volume hierarchy; smaller growth
    /// is a tighter fit.
    pub fn growth(&self, other: &BoundingSphere) -> Real {
        let merged = BoundingSphere::merge(self, other);
        merged.radius * merged.radius - self.radius * self.radius
    }
}
