//! Rigid-body contacts and their impulse/interpenetration mathematics
//! (distilled spec §4.5) — the hardest subsystem in this crate.

use glam::{DMat3, DQuat, DVec3};
use tracing::trace;

use crate::body::RigidBody;
use crate::config::EngineConfig;
use crate::math::{orthonormal_basis, skew_symmetric};
use crate::Real;

/// A contact between two rigid bodies (by index), or between one body and
/// the immovable world (`body[1] == None`).
#[derive(Clone, Copy, Debug)]
pub struct Contact {
    /// The two participating bodies. `body[0]` is always present after
    /// construction; `body[1]` is `None` for a world contact.
    pub body: [Option<usize>; 2],
    /// World-space contact point.
    pub point: DVec3,
    /// World-space contact normal, pointing from body 0's surface toward
    /// body 1.
    pub normal: DVec3,
    /// Penetration depth; positive means overlap.
    pub penetration: Real,
    /// Coulomb friction coefficient, >= 0.
    pub friction: Real,
    /// Coefficient of restitution, in `[0, 1]`.
    pub restitution: Real,

    // --- Derived per-step scratch data. Written by `prepare`; read and
    // mutated by the resolver's propagation passes. Kept on the contact for
    // cache locality, per the distilled spec's re-architecture notes.
    contact_to_world: DMat3,
    relative_contact_position: [DVec3; 2],
    contact_velocity: DVec3,
    desired_delta_velocity: Real,
}

impl Contact {
    /// Creates a new, unprepared contact. If `body_a` is `None`, the bodies
    /// are swapped and the normal negated immediately, per the distilled
    /// spec's invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        body_a: Option<usize>,
        body_b: Option<usize>,
        point: DVec3,
        normal: DVec3,
        penetration: Real,
        friction: Real,
        restitution: Real,
    ) -> Self {
        let (body, normal) = if body_a.is_none() {
            ([body_b, None], -normal)
        } else {
            ([body_a, body_b], normal)
        };
        Self {
            body,
            point,
            normal,
            penetration,
            friction,
            restitution,
            contact_to_world: DMat3::IDENTITY,
            relative_contact_position: [DVec3::ZERO; 2],
            contact_velocity: DVec3::ZERO,
            desired_delta_velocity: 0.0,
        }
    }

    fn inverse_mass(&self, i: usize, bodies: &[RigidBody]) -> Real {
        self.body[i].map(|idx| bodies[idx].inverse_mass).unwrap_or(0.0)
    }

    fn inverse_inertia_world(&self, i: usize, bodies: &[RigidBody]) -> DMat3 {
        self.body[i]
            .map(|idx| bodies[idx].inverse_inertia_tensor_world())
            .unwrap_or(DMat3::ZERO)
    }

    fn local_velocity(&self, i: usize, bodies: &[RigidBody], dt: Real) -> DVec3 {
        let Some(idx) = self.body[i] else {
            return DVec3::ZERO;
        };
        let body = &bodies[idx];
        let velocity = body.velocity + body.angular_velocity.cross(self.relative_contact_position[i]);
        let mut contact_velocity = self.contact_to_world.transpose() * velocity;

        let acc_velocity = body.last_frame_acceleration * dt;
        let mut acc_velocity_contact = self.contact_to_world.transpose() * acc_velocity;
        acc_velocity_contact.x = 0.0;
        contact_velocity += acc_velocity_contact;
        contact_velocity
    }

    /// Recomputes all derived per-step data: contact basis, relative
    /// positions, contact-space velocity, and desired delta-velocity.
    /// Called once per contact per frame before resolution begins.
    pub fn prepare(&mut self, bodies: &[RigidBody], dt: Real, config: &EngineConfig) {
        let (n, t1, t2) = orthonormal_basis(self.normal);
        self.contact_to_world = DMat3::from_cols(n, t1, t2);

        self.relative_contact_position[0] = self.point - bodies[self.body[0].expect("contact body 0 must be set")].position;
        self.relative_contact_position[1] = self
            .body[1]
            .map(|idx| self.point - bodies[idx].position)
            .unwrap_or(DVec3::ZERO);

        let v0 = self.local_velocity(0, bodies, dt);
        let v1 = self.local_velocity(1, bodies, dt);
        self.contact_velocity = v0 - v1;

        self.calculate_desired_delta_velocity(bodies, dt, config);
    }

    fn calculate_desired_delta_velocity(&mut self, bodies: &[RigidBody], dt: Real, config: &EngineConfig) {
        let mut velocity_from_acc = 0.0;
        if let Some(idx) = self.body[0] {
            if bodies[idx].is_awake() {
                velocity_from_acc += (bodies[idx].last_frame_acceleration * dt).dot(self.normal);
            }
        }
        if let Some(idx) = self.body[1] {
            if bodies[idx].is_awake() {
                velocity_from_acc -= (bodies[idx].last_frame_acceleration * dt).dot(self.normal);
            }
        }

        let restitution = if self.contact_velocity.x.abs() < config.velocity_threshold {
            0.0
        } else {
            self.restitution
        };

        self.desired_delta_velocity =
            -self.contact_velocity.x - restitution * (self.contact_velocity.x - velocity_from_acc);
    }

    /// Desired change in contact-normal velocity, as last computed by
    /// [`Contact::prepare`] or by resolver propagation.
    pub fn desired_delta_velocity(&self) -> Real {
        self.desired_delta_velocity
    }

    /// Relative contact position for body slot `i`, used by the resolver to
    /// propagate an applied change to neighbouring contacts.
    pub(crate) fn relative_contact_position(&self, i: usize) -> DVec3 {
        self.relative_contact_position[i]
    }

    fn total_inverse_mass(&self, bodies: &[RigidBody]) -> Real {
        self.inverse_mass(0, bodies) + self.inverse_mass(1, bodies)
    }

    /// Computes and applies a frictionless or frictional velocity impulse,
    /// depending on `self.friction`. Returns the per-body world-space
    /// `(velocity_change, rotation_change)` applied, used by the resolver to
    /// propagate this change to every contact sharing a touched body —
    /// including `self`, whose own `desired_delta_velocity` would otherwise
    /// go stale.
    pub fn apply_velocity_change(&mut self, bodies: &mut [RigidBody]) -> [(DVec3, DVec3); 2] {
        let impulse_contact = if self.friction <= 0.0 {
            self.frictionless_impulse(bodies)
        } else {
            self.frictional_impulse(bodies)
        };

        let impulse_world = self.contact_to_world * impulse_contact;

        let mut changes = [(DVec3::ZERO, DVec3::ZERO); 2];
        for i in 0..2 {
            let Some(idx) = self.body[i] else { continue };
            let sign = if i == 0 { 1.0 } else { -1.0 };
            let impulse = impulse_world * sign;

            let inv_mass = bodies[idx].inverse_mass;
            let inv_inertia = bodies[idx].inverse_inertia_tensor_world();

            let velocity_change = impulse * inv_mass;
            let impulse_torque = self.relative_contact_position[i].cross(impulse);
            let rotation_change = inv_inertia * impulse_torque;

            bodies[idx].velocity += velocity_change;
            bodies[idx].angular_velocity += rotation_change;

            changes[i] = (velocity_change, rotation_change);
        }

        trace!(?impulse_contact, "rigid body contact velocity resolved");
        changes
    }

    fn frictionless_impulse(&self, bodies: &[RigidBody]) -> DVec3 {
        let mut delta_velocity = self.total_inverse_mass(bodies);
        for i in 0..2 {
            if self.body[i].is_none() {
                continue;
            }
            let inv_inertia = self.inverse_inertia_world(i, bodies);
            let r = self.relative_contact_position[i];
            let torque_per_unit_impulse = r.cross(self.normal);
            let rotation_per_unit_impulse = inv_inertia * torque_per_unit_impulse;
            let velocity_per_unit_impulse = rotation_per_unit_impulse.cross(r);
            delta_velocity += velocity_per_unit_impulse.dot(self.normal);
        }

        let impulse_magnitude = if delta_velocity.abs() > 1e-12 {
            self.desired_delta_velocity / delta_velocity
        } else {
            0.0
        };
        DVec3::new(impulse_magnitude, 0.0, 0.0)
    }

    fn frictional_impulse(&self, bodies: &[RigidBody]) -> DVec3 {
        let total_inverse_mass = self.total_inverse_mass(bodies);

        let mut delta_vel_world = DMat3::ZERO;
        for i in 0..2 {
            if self.body[i].is_none() {
                continue;
            }
            let inv_inertia = self.inverse_inertia_world(i, bodies);
            let skew_r = skew_symmetric(self.relative_contact_position[i]);
            let contribution = skew_r * inv_inertia * skew_r * -1.0;
            delta_vel_world += contribution;
        }

        let mut delta_velocity = self.contact_to_world.transpose() * delta_vel_world * self.contact_to_world;
        delta_velocity += DMat3::IDENTITY * total_inverse_mass;

        let determinant = delta_velocity.determinant();
        if determinant.abs() < 1e-12 {
            return self.frictionless_impulse(bodies);
        }
        let impulse_matrix = delta_velocity.inverse();

        let velocity_to_kill = DVec3::new(
            self.desired_delta_velocity,
            -self.contact_velocity.y,
            -self.contact_velocity.z,
        );
        let mut impulse_contact = impulse_matrix * velocity_to_kill;

        let planar_impulse = (impulse_contact.y * impulse_contact.y + impulse_contact.z * impulse_contact.z).sqrt();
        if planar_impulse > impulse_contact.x * self.friction {
            let tangent_y = impulse_contact.y / planar_impulse;
            let tangent_z = impulse_contact.z / planar_impulse;

            let new_x_denominator = delta_velocity.x_axis.x
                + delta_velocity.y_axis.x * self.friction * tangent_y
                + delta_velocity.z_axis.x * self.friction * tangent_z;
            let new_x = if new_x_denominator.abs() > 1e-12 {
                self.desired_delta_velocity / new_x_denominator
            } else {
                0.0
            };

            impulse_contact = DVec3::new(
                new_x,
                tangent_y * self.friction * new_x,
                tangent_z * self.friction * new_x,
            );
        }

        impulse_contact
    }

    fn angular_inertia(&self, i: usize, bodies: &[RigidBody]) -> Real {
        let inv_inertia = self.inverse_inertia_world(i, bodies);
        let r = self.relative_contact_position[i];
        let torque = r.cross(self.normal);
        let rotation = inv_inertia * torque;
        rotation.cross(r).dot(self.normal)
    }

    /// Applies the interpenetration projection (distilled spec §4.5),
    /// including the angular-limit safeguard. Returns the per-body
    /// `(linear_change, angular_change)` applied, used by the resolver to
    /// propagate this change to every contact sharing a touched body's
    /// penetration — including `self`, whose own `penetration` field this
    /// function does not touch directly.
    pub fn apply_position_change(&mut self, bodies: &mut [RigidBody], config: &EngineConfig) -> [(DVec3, DVec3); 2] {
        let mut linear_inertia = [0.0; 2];
        let mut angular_inertia = [0.0; 2];
        let mut total_inertia = 0.0;

        for i in 0..2 {
            if self.body[i].is_none() {
                continue;
            }
            linear_inertia[i] = self.inverse_mass(i, bodies);
            angular_inertia[i] = self.angular_inertia(i, bodies);
            total_inertia += linear_inertia[i] + angular_inertia[i];
        }

        let mut changes = [(DVec3::ZERO, DVec3::ZERO); 2];
        if total_inertia <= 0.0 {
            return changes;
        }

        let mut linear_move = [0.0; 2];
        let mut angular_move = [0.0; 2];

        for i in 0..2 {
            let Some(idx) = self.body[i] else { continue };
            let sign = if i == 0 { 1.0 } else { -1.0 };

            angular_move[i] = sign * self.penetration * (angular_inertia[i] / total_inertia);
            linear_move[i] = sign * self.penetration * (linear_inertia[i] / total_inertia);

            let r = self.relative_contact_position[i];
            let projection = r - self.normal * r.dot(self.normal);
            let max_magnitude = config.angular_limit * projection.length();

            if angular_move[i] < -max_magnitude {
                let total_move = angular_move[i] + linear_move[i];
                angular_move[i] = -max_magnitude;
                linear_move[i] = total_move - angular_move[i];
            } else if angular_move[i] > max_magnitude {
                let total_move = angular_move[i] + linear_move[i];
                angular_move[i] = max_magnitude;
                linear_move[i] = total_move - angular_move[i];
            }

            let angular_change = if angular_move[i].abs() < 1e-12 || angular_inertia[i].abs() < 1e-12 {
                DVec3::ZERO
            } else {
                let inv_inertia = self.inverse_inertia_world(i, bodies);
                let target_direction = inv_inertia * r.cross(self.normal);
                target_direction * (angular_move[i] / angular_inertia[i])
            };
            let linear_change = self.normal * linear_move[i];

            let body = &mut bodies[idx];
            body.position += linear_change;
            body.orientation = add_scaled_vector(body.orientation, angular_change, 1.0);
            if !body.is_awake() {
                body.calculate_derived_data();
            }

            changes[i] = (linear_change, angular_change);
        }

        changes
    }

    /// Recomputes `contact_velocity`'s derived fields after an externally
    /// applied world-space velocity/rotation change at `body_index`,
    /// without recomputing `contact_to_world` or relative positions. Used
    /// by the resolver's velocity-pass propagation.
    pub fn update_contact_velocity(
        &mut self,
        body_index: usize,
        velocity_change: DVec3,
        rotation_change: DVec3,
        bodies: &[RigidBody],
        dt: Real,
        config: &EngineConfig,
    ) {
        let r = self.relative_contact_position[body_index];
        let delta = velocity_change + rotation_change.cross(r);
        let delta_contact = self.contact_to_world.transpose() * delta;
        if body_index == 0 {
            self.contact_velocity += delta_contact;
        } else {
            self.contact_velocity -= delta_contact;
        }
        self.calculate_desired_delta_velocity(bodies, dt, config);
    }
}

/// Small-angle quaternion update matching the distilled spec's
/// `addScaledVector` construction: `q_new = normalize(q + 0.5 * (v*scale, 0) * q)`.
fn add_scaled_vector(q: DQuat, v: DVec3, scale: Real) -> DQuat {
    let scaled = v * scale;
    let pure = DQuat::from_xyzw(scaled.x, scaled.y, scaled.z, 0.0);
    let delta = pure * q;
    let updated = DQuat::from_xyzw(
        q.x + delta.x * 0.5,
        q.y + delta.y * 0.5,
        q.z + delta.z * 0.5,
        q.w + delta.w * 0.5,
    );
    updated.normalize()
}
