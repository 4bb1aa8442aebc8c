//! Typed errors for the narrow set of fallible operations in this crate.
//!
//! Most of this engine is infallible value-type computation: degenerate
//! geometry and immovable targets are silent skips, not errors (see the
//! module docs on [`crate::force`] and [`crate::contact`]). The few
//! preconditions that are a programmer error to violate are surfaced here so
//! callers can choose to handle them instead of hitting a debug assertion.

use crate::Real;
use thiserror::Error;

/// Errors produced by the fallible entry points of this crate.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum PhysicsError {
    /// A mass (or inverse mass) setter was given a non-positive mass.
    #[error("mass must be positive, got {mass}")]
    NonPositiveMass {
        /// The rejected mass value.
        mass: Real,
    },

    /// An integration step was asked to advance by a non-positive `dt`.
    #[error("timestep must be positive, got {dt}")]
    NonPositiveTimestep {
        /// The rejected timestep.
        dt: Real,
    },

    /// A body-space inertia tensor could not be inverted.
    #[error("inertia tensor is singular (determinant {determinant})")]
    SingularInertiaTensor {
        /// The determinant that triggered the failure.
        determinant: Real,
    },
}

/// Convenience alias for `Result<T, PhysicsError>`.
pub type PhysicsResult<T> = Result<T, PhysicsError>;
