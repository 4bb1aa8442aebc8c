//! Seedable, reproducible random stream for initial conditions and noise.
//!
//! Not required to be cryptographically strong — only to be reproducible
//! given the same seed, on any platform. Wraps `rand`'s `StdRng`, whose
//! algorithm is a documented, portable stream rather than the OS RNG.

use glam::{DQuat, DVec2, DVec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;

use crate::Real;

/// A reproducible stream of random numbers and vectors.
#[derive(Clone)]
pub struct Random {
    rng: StdRng,
}

impl Random {
    /// Creates a stream seeded deterministically from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform real in `[0, 1)`.
    pub fn random_real(&mut self) -> Real {
        self.rng.gen::<Real>()
    }

    /// Uniform real in `[low, high)`.
    pub fn random_real_range(&mut self, low: Real, high: Real) -> Real {
        self.rng.gen_range(low..high)
    }

    /// Uniform integer in `[low, high)`.
    pub fn random_int(&mut self, low: u32, high: u32) -> u32 {
        self.rng.gen_range(low..high)
    }

    /// Binomially-distributed real in `(-1, 1)`, computed as `U - U` of two
    /// uniform draws in `[0, 1)` — a cheap approximation of a bell curve
    /// without pulling in a distributions crate for one call site.
    pub fn random_binomial(&mut self, scale: Real) -> Real {
        (self.random_real() - self.random_real()) * scale
    }

    /// Uniform vector within `[-bound, bound]` on every axis.
    pub fn random_vector(&mut self, bound: Real) -> DVec3 {
        DVec3::new(
            self.random_binomial(bound),
            self.random_binomial(bound),
            self.random_binomial(bound),
        )
    }

    /// Uniform vector within an axis-aligned cube `[-halfExtent,
    /// halfExtent]` for each axis, taken from a per-axis extent vector.
    pub fn random_vector_in_cube(&mut self, half_extents: DVec3) -> DVec3 {
        DVec3::new(
            self.random_binomial(half_extents.x),
            self.random_binomial(half_extents.y),
            self.random_binomial(half_extents.z),
        )
    }

    /// Uniform vector confined to the XZ plane (`y == 0`).
    pub fn random_xz_vector(&mut self, bound: Real) -> DVec3 {
        let v = DVec2::new(self.random_binomial(bound), self.random_binomial(bound));
        DVec3::new(v.x, 0.0, v.y)
    }

    /// Uniformly-distributed random unit quaternion: a uniform random axis
    /// and a uniform angle in `[0, 2*pi)`, normalised.
    pub fn random_quaternion(&mut self) -> DQuat {
        let axis = loop {
            let v = self.random_vector(1.0);
            if v.length_squared() > 1e-12 {
                break v.normalize();
            }
        };
        let angle = self.random_real_range(0.0, TAU);
        DQuat::from_axis_angle(axis, angle).normalize()
    }
}
