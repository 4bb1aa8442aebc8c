//! Engine-wide tunables.
//!
//! Collects the handful of named constants the solver and sleep system rely
//! on into one `serde`-friendly struct so a host application can load them
//! from a config file instead of recompiling, the same way
//! [`crate::random`]'s seed is threaded in from the outside rather than
//! pulled from global state.

use crate::Real;
use serde::{Deserialize, Serialize};

/// Kinetic-energy threshold below which a rigid body becomes a sleep
/// candidate.
pub const SLEEP_EPSILON: Real = 0.5;

/// Default cap on the angular share of interpenetration projection, as a
/// fraction of the tangential displacement at the contact point.
pub const ANGULAR_LIMIT: Real = 0.2;

/// Closing velocities below this magnitude have restitution clamped to zero,
/// suppressing micro-bouncing of stacked bodies.
pub const VELOCITY_THRESHOLD: Real = 0.25;

/// Default per-second damping factor applied to particle velocities.
pub const DEFAULT_DAMPING: Real = 0.99;

/// Default epsilon below which a contact's penetration is considered
/// resolved.
pub const DEFAULT_POSITION_EPSILON: Real = 0.01;

/// Default epsilon below which a contact's closing velocity is considered
/// resolved.
pub const DEFAULT_VELOCITY_EPSILON: Real = 0.01;

/// Engine-wide tunables, serializable so a host application can load them
/// from disk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// See [`SLEEP_EPSILON`].
    pub sleep_epsilon: Real,
    /// See [`ANGULAR_LIMIT`].
    pub angular_limit: Real,
    /// See [`VELOCITY_THRESHOLD`].
    pub velocity_threshold: Real,
    /// See [`DEFAULT_DAMPING`].
    pub default_damping: Real,
    /// See [`DEFAULT_POSITION_EPSILON`].
    pub position_epsilon: Real,
    /// See [`DEFAULT_VELOCITY_EPSILON`].
    pub velocity_epsilon: Real,
    /// Multiplier applied to the used-contact count to derive the
    /// particle-world resolver's iteration cap when constructed with
    /// `iterations = 0` (auto mode).
    pub particle_iteration_multiplier: usize,
    /// Same as `particle_iteration_multiplier`, for rigid-body worlds.
    pub rigid_body_iteration_multiplier: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sleep_epsilon: SLEEP_EPSILON,
            angular_limit: ANGULAR_LIMIT,
            velocity_threshold: VELOCITY_THRESHOLD,
            default_damping: DEFAULT_DAMPING,
            position_epsilon: DEFAULT_POSITION_EPSILON,
            velocity_epsilon: DEFAULT_VELOCITY_EPSILON,
            particle_iteration_multiplier: 2,
            rigid_body_iteration_multiplier: 4,
        }
    }
}
