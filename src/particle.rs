//! Point-mass particles: position, velocity, constant acceleration, a
//! per-step force accumulator, inverse mass and damping.

use glam::DVec3;
use tracing::{instrument, trace};

use crate::error::{PhysicsError, PhysicsResult};
use crate::Real;

/// A point mass with no orientation.
///
/// `inverse_mass == 0.0` denotes an immovable (infinite-mass) particle:
/// forces applied to it and calls to [`Particle::integrate`] are no-ops.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    /// World-space position.
    pub position: DVec3,
    /// World-space velocity.
    pub velocity: DVec3,
    /// Constant acceleration applied every step in addition to the force
    /// accumulator (typically gravity, though gravity is more often modeled
    /// as a force generator — see [`crate::force::ParticleForce::Gravity`]).
    pub acceleration: DVec3,
    /// Forces accumulated this frame by force generators; cleared after each
    /// integration step.
    force_accum: DVec3,
    /// `1 / mass`. Zero means infinite mass (immovable).
    pub inverse_mass: Real,
    /// Per-second velocity damping factor, applied as `damping.powf(dt)`.
    /// Must be in `(0, 1]`.
    pub damping: Real,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            velocity: DVec3::ZERO,
            acceleration: DVec3::ZERO,
            force_accum: DVec3::ZERO,
            inverse_mass: 1.0,
            damping: 0.99,
        }
    }
}

impl Particle {
    /// Creates a particle with the given mass (must be positive) at the
    /// origin, at rest.
    pub fn new(mass: Real) -> PhysicsResult<Self> {
        if mass <= 0.0 {
            return Err(PhysicsError::NonPositiveMass { mass });
        }
        Ok(Self {
            inverse_mass: 1.0 / mass,
            ..Default::default()
        })
    }

    /// Creates an immovable particle (infinite mass).
    pub fn immovable() -> Self {
        Self {
            inverse_mass: 0.0,
            ..Default::default()
        }
    }

    /// Whether this particle has finite, positive mass.
    pub fn has_finite_mass(&self) -> bool {
        self.inverse_mass > 0.0
    }

    /// Sets the mass, recomputing `inverse_mass`. Returns an error if `mass`
    /// is not positive.
    pub fn set_mass(&mut self, mass: Real) -> PhysicsResult<()> {
        if mass <= 0.0 {
            return Err(PhysicsError::NonPositiveMass { mass });
        }
        self.inverse_mass = 1.0 / mass;
        Ok(())
    }

    /// Mass, or `Real::INFINITY` if immovable.
    pub fn mass(&self) -> Real {
        if self.inverse_mass == 0.0 {
            Real::INFINITY
        } else {
            1.0 / self.inverse_mass
        }
    }

    /// Adds a world-space force to this frame's accumulator.
    pub fn add_force(&mut self, force: DVec3) {
        self.force_accum += force;
    }

    /// Clears the force accumulator. Called by worlds at the start of each
    /// frame.
    pub fn clear_accumulator(&mut self) {
        self.force_accum = DVec3::ZERO;
    }

    /// Current value of the force accumulator (read-only; used by force
    /// generators that need last-frame data, e.g. the stiff spring
    /// approximation).
    pub fn force_accumulator(&self) -> DVec3 {
        self.force_accum
    }

    /// Semi-implicit Euler integration with drag damping (distilled spec
    /// §4.1). Debug-asserts `dt > 0`; no-op for infinite-mass particles.
    #[instrument(level = "trace", skip_all)]
    pub fn integrate(&mut self, dt: Real) {
        debug_assert!(dt > 0.0, "integrate requires dt > 0, got {dt}");
        if self.inverse_mass <= 0.0 {
            return;
        }

        self.position += self.velocity * dt;

        let acceleration = self.acceleration + self.force_accum * self.inverse_mass;
        self.velocity += acceleration * dt;
        self.velocity *= self.damping.powf(dt);

        trace!(
            position = ?self.position,
            velocity = ?self.velocity,
            "particle integrated"
        );

        self.clear_accumulator();
    }

    /// Fallible variant of [`Particle::integrate`] for callers that want a
    /// `Result` instead of a debug assertion on bad input.
    pub fn try_integrate(&mut self, dt: Real) -> PhysicsResult<()> {
        if dt <= 0.0 {
            return Err(PhysicsError::NonPositiveTimestep { dt });
        }
        self.integrate(dt);
        Ok(())
    }
}
