//! Rigid bodies: a [`Particle`]-like point mass extended with orientation,
//! angular velocity, an inertia tensor, and sleep.

use glam::{DMat3, DMat4, DQuat, DVec3};
use tracing::{instrument, trace};

use crate::config::EngineConfig;
use crate::error::{PhysicsError, PhysicsResult};
use crate::Real;

/// Rigid body state: a point mass (position, velocity, damping) plus
/// orientation, angular velocity, and the derived data needed for contact
/// resolution (world-space inverse inertia tensor and transform).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidBody {
    /// World-space position of the centre of mass.
    pub position: DVec3,
    /// Orientation, kept unit-length.
    pub orientation: DQuat,
    /// World-space linear velocity.
    pub velocity: DVec3,
    /// World-space angular velocity.
    pub angular_velocity: DVec3,

    /// Constant linear acceleration applied every step (in addition to the
    /// force accumulator).
    pub acceleration: DVec3,
    /// Linear acceleration captured at the end of the previous integrate
    /// step; used by the contact resolver to subtract non-reactive
    /// acceleration from a resting contact's velocity (distilled spec
    /// §4.5).
    pub last_frame_acceleration: DVec3,

    force_accum: DVec3,
    torque_accum: DVec3,

    /// `1 / mass`. Zero means infinite mass (immovable/static).
    pub inverse_mass: Real,
    /// Body-space inverse inertia tensor.
    pub inverse_inertia_tensor: DMat3,
    /// World-space inverse inertia tensor, `R * bodyInertia^-1 * R^T`.
    /// Recomputed by [`RigidBody::calculate_derived_data`].
    inverse_inertia_tensor_world: DMat3,
    /// World transform (`position`, `orientation`) as a 4x4 matrix.
    /// Recomputed by [`RigidBody::calculate_derived_data`].
    transform: DMat4,

    /// Linear damping, per second, in `(0, 1]`.
    pub linear_damping: Real,
    /// Angular damping, per second, in `(0, 1]`.
    pub angular_damping: Real,

    /// Exponential moving average of kinetic energy, used to decide when to
    /// put the body to sleep.
    motion: Real,
    /// Whether the body is simulated this frame. Sleeping bodies have zero
    /// velocities and skip integration.
    awake: bool,
    /// Whether sleep is permitted at all for this body (some bodies, e.g.
    /// player-controlled ones, should never sleep).
    pub can_sleep: bool,
}

impl Default for RigidBody {
    fn default() -> Self {
        let mut body = Self {
            position: DVec3::ZERO,
            orientation: DQuat::IDENTITY,
            velocity: DVec3::ZERO,
            angular_velocity: DVec3::ZERO,
            acceleration: DVec3::ZERO,
            last_frame_acceleration: DVec3::ZERO,
            force_accum: DVec3::ZERO,
            torque_accum: DVec3::ZERO,
            inverse_mass: 1.0,
            inverse_inertia_tensor: DMat3::IDENTITY,
            inverse_inertia_tensor_world: DMat3::IDENTITY,
            transform: DMat4::IDENTITY,
            linear_damping: 0.99,
            angular_damping: 0.99,
            motion: 0.0,
            awake: true,
            can_sleep: true,
        };
        body.calculate_derived_data();
        body
    }
}

impl RigidBody {
    /// Creates a body with the given mass and body-space inverse inertia
    /// tensor, at the origin with identity orientation.
    pub fn new(mass: Real, inverse_inertia_tensor: DMat3) -> PhysicsResult<Self> {
        if mass <= 0.0 {
            return Err(PhysicsError::NonPositiveMass { mass });
        }
        let mut body = Self {
            inverse_mass: 1.0 / mass,
            inverse_inertia_tensor,
            ..Default::default()
        };
        body.calculate_derived_data();
        Ok(body)
    }

    /// Creates a body from mass and a body-space (non-inverted) inertia
    /// tensor, inverting it here so callers don't have to. Fails if the
    /// tensor is singular.
    pub fn from_inertia_tensor(mass: Real, inertia_tensor: DMat3) -> PhysicsResult<Self> {
        if mass <= 0.0 {
            return Err(PhysicsError::NonPositiveMass { mass });
        }
        let determinant = inertia_tensor.determinant();
        if determinant.abs() < 1e-12 {
            return Err(PhysicsError::SingularInertiaTensor { determinant });
        }
        Self::new(mass, inertia_tensor.inverse())
    }

    /// Creates a static (immovable, non-rotatable) body.
    pub fn immovable() -> Self {
        Self {
            inverse_mass: 0.0,
            inverse_inertia_tensor: DMat3::ZERO,
            ..Default::default()
        }
    }

    /// Mass, or `Real::INFINITY` if immovable.
    pub fn mass(&self) -> Real {
        if self.inverse_mass == 0.0 {
            Real::INFINITY
        } else {
            1.0 / self.inverse_mass
        }
    }

    /// World-space inverse inertia tensor, as last computed by
    /// [`RigidBody::calculate_derived_data`].
    pub fn inverse_inertia_tensor_world(&self) -> DMat3 {
        self.inverse_inertia_tensor_world
    }

    /// World transform, as last computed by
    /// [`RigidBody::calculate_derived_data`].
    pub fn transform(&self) -> DMat4 {
        self.transform
    }

    /// Whether the body is awake (simulated this frame).
    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Puts the body to sleep or wakes it. Waking resets the motion score
    /// above the sleep threshold so the body doesn't immediately re-sleep;
    /// sleeping clamps velocities to zero.
    pub fn set_awake(&mut self, awake: bool) {
        if awake {
            self.awake = true;
            self.motion = 2.0 * crate::config::SLEEP_EPSILON;
        } else {
            self.awake = false;
            self.velocity = DVec3::ZERO;
            self.angular_velocity = DVec3::ZERO;
        }
    }

    /// Transforms a point given in body-local coordinates into world space.
    pub fn point_in_world_space(&self, local_point: DVec3) -> DVec3 {
        self.transform.transform_point3(local_point)
    }

    /// Transforms a point given in world coordinates into body-local space.
    pub fn point_in_body_space(&self, world_point: DVec3) -> DVec3 {
        self.transform.inverse().transform_point3(world_point)
    }

    /// World-space velocity of the material point currently coincident with
    /// `world_point` (i.e. `v + omega x r`).
    pub fn velocity_at_point(&self, world_point: DVec3) -> DVec3 {
        let r = world_point - self.position;
        self.velocity + self.angular_velocity.cross(r)
    }

    /// Adds a force at the centre of mass.
    pub fn add_force(&mut self, force: DVec3) {
        self.force_accum += force;
    }

    /// Adds a force applied at `world_point`, converting the off-centre
    /// component into a torque about the centre of mass.
    pub fn add_force_at_point(&mut self, force: DVec3, world_point: DVec3) {
        let relative_point = world_point - self.position;
        self.force_accum += force;
        self.torque_accum += relative_point.cross(force);
    }

    /// Adds a force applied at a body-space point.
    pub fn add_force_at_body_point(&mut self, force: DVec3, body_point: DVec3) {
        let world_point = self.point_in_world_space(body_point);
        self.add_force_at_point(force, world_point);
    }

    /// Adds a pure torque (no linear component).
    pub fn add_torque(&mut self, torque: DVec3) {
        self.torque_accum += torque;
    }

    /// Clears both accumulators. Called by worlds at the start of each
    /// frame.
    pub fn clear_accumulators(&mut self) {
        self.force_accum = DVec3::ZERO;
        self.torque_accum = DVec3::ZERO;
    }

    /// Current value of the force accumulator (read-only; exposed for
    /// diagnostics and force generators that need last-frame data).
    pub fn force_accumulator(&self) -> DVec3 {
        self.force_accum
    }

    /// Recomputes the world transform and world-space inverse inertia
    /// tensor from `position` and `orientation`. Idempotent: calling twice
    /// in a row yields bitwise-identical results.
    pub fn calculate_derived_data(&mut self) {
        self.orientation = self.orientation.normalize();
        self.transform = DMat4::from_rotation_translation(self.orientation, self.position);

        let rotation = DMat3::from_quat(self.orientation);
        self.inverse_inertia_tensor_world =
            rotation * self.inverse_inertia_tensor * rotation.transpose();
    }

    /// Rigid-body integration (distilled spec §4.1): semi-implicit Euler
    /// extended to rotation, sleep bookkeeping included. No-op if asleep or
    /// immovable.
    #[instrument(level = "trace", skip_all)]
    pub fn integrate(&mut self, dt: Real, config: &EngineConfig) {
        debug_assert!(dt > 0.0, "integrate requires dt > 0, got {dt}");
        if !self.awake || self.inverse_mass <= 0.0 {
            return;
        }

        let linear_acceleration = self.acceleration + self.force_accum * self.inverse_mass;
        self.last_frame_acceleration = linear_acceleration;

        let angular_acceleration = self.inverse_inertia_tensor_world * self.torque_accum;

        self.velocity += linear_acceleration * dt;
        self.angular_velocity += angular_acceleration * dt;

        self.velocity *= self.linear_damping.powf(dt);
        self.angular_velocity *= self.angular_damping.powf(dt);

        self.position += self.velocity * dt;

        let angular_speed = self.angular_velocity.length();
        if angular_speed > 1e-12 {
            let axis = self.angular_velocity / angular_speed;
            let angle = angular_speed * dt;
            let rotation = DQuat::from_axis_angle(axis, angle);
            self.orientation = (rotation * self.orientation).normalize();
        }

        self.calculate_derived_data();

        if self.can_sleep {
            self.update_motion_and_maybe_sleep(dt, config);
        }

        trace!(
            position = ?self.position,
            orientation = ?self.orientation,
            "rigid body integrated"
        );

        self.clear_accumulators();
    }

    fn update_motion_and_maybe_sleep(&mut self, dt: Real, config: &EngineConfig) {
        let bias = 0.5_f64.powf(dt);
        let current_motion = self.velocity.dot(self.velocity) + self.angular_velocity.dot(self.angular_velocity);
        self.motion = bias * self.motion + (1.0 - bias) * current_motion;

        if self.motion < config.sleep_epsilon {
            self.set_awake(false);
        } else if self.motion > 10.0 * config.sleep_epsilon {
            self.motion = 10.0 * config.sleep_epsilon;
        }
    }

    /// Current motion score (exponential moving average of kinetic energy).
    /// Exposed for tests and diagnostics.
    pub fn motion(&self) -> Real {
        self.motion
    }
}
