//! Sequential position/velocity resolver for rigid-body [`Contact`]s
//! (distilled spec §4.5), with propagation to neighbouring contacts sharing
//! a body.

use tracing::{instrument, trace_span, warn};

use crate::body::RigidBody;
use crate::config::EngineConfig;
use crate::contact::Contact;
use crate::Real;

/// Resolves a batch of rigid-body contacts each frame, in two passes: first
/// interpenetration (position), then closing velocity (impulse).
#[derive(Clone, Copy, Debug)]
pub struct ContactResolver {
    /// Iteration cap for the position pass.
    pub position_iterations: usize,
    /// Iteration cap for the velocity pass.
    pub velocity_iterations: usize,
    /// Penetration below this is considered resolved.
    pub position_epsilon: Real,
    /// Closing velocity below this is considered resolved.
    pub velocity_epsilon: Real,
}

impl ContactResolver {
    /// Creates a resolver with the given iteration caps, using the config's
    /// default epsilons.
    pub fn new(position_iterations: usize, velocity_iterations: usize, config: &EngineConfig) -> Self {
        Self {
            position_iterations,
            velocity_iterations,
            position_epsilon: config.position_epsilon,
            velocity_epsilon: config.velocity_epsilon,
        }
    }

    /// Runs both resolution passes against `contacts` and `bodies`.
    #[instrument(level = "trace", skip_all)]
    pub fn resolve_contacts(&self, contacts: &mut [Contact], bodies: &mut [RigidBody], dt: Real, config: &EngineConfig) {
        if contacts.is_empty() {
            return;
        }
        for contact in contacts.iter_mut() {
            contact.prepare(bodies, dt, config);
        }
        self.adjust_positions(contacts, bodies, config);
        self.adjust_velocities(contacts, bodies, dt, config);
    }

    #[instrument(level = "trace", skip_all)]
    fn adjust_positions(&self, contacts: &mut [Contact], bodies: &mut [RigidBody], config: &EngineConfig) {
        let mut iterations_used = 0;
        while iterations_used < self.position_iterations {
            let span = trace_span!("position iteration", iterations_used);
            let _enter = span.enter();
            let mut worst_index = None;
            let mut worst_penetration = self.position_epsilon;
            for (i, contact) in contacts.iter().enumerate() {
                if contact.penetration > worst_penetration {
                    worst_penetration = contact.penetration;
                    worst_index = Some(i);
                }
            }

            let Some(index) = worst_index else {
                break;
            };

            let bodies_touched = contacts[index].body;
            let changes = contacts[index].apply_position_change(bodies, config);

            // Propagate to every contact sharing a touched body, including
            // the resolved contact's own index: its penetration must be
            // brought down by the same linear+angular displacement as any
            // neighbour, or it goes stale and gets re-selected next
            // iteration (ft_contacts.cpp's adjustPositions does not skip it
            // either).
            for other in contacts.iter_mut() {
                for touched_slot in 0..2 {
                    let Some(body_idx) = bodies_touched[touched_slot] else { continue };
                    let (linear_change, angular_change) = changes[touched_slot];
                    for other_slot in 0..2 {
                        if other.body[other_slot] == Some(body_idx) {
                            let sign = if other_slot == 0 { 1.0 } else { -1.0 };
                            let r = other.relative_contact_position(other_slot);
                            let displacement = linear_change + angular_change.cross(r);
                            other.penetration -= sign * displacement.dot(other.normal);
                        }
                    }
                }
            }

            iterations_used += 1;
        }
        if iterations_used == self.position_iterations && self.position_iterations > 0 {
            warn!(iterations_used, "rigid body position resolver hit iteration cap");
        }
    }

    #[instrument(level = "trace", skip_all)]
    fn adjust_velocities(&self, contacts: &mut [Contact], bodies: &mut [RigidBody], dt: Real, config: &EngineConfig) {
        let mut iterations_used = 0;
        while iterations_used < self.velocity_iterations {
            let span = trace_span!("velocity iteration", iterations_used);
            let _enter = span.enter();
            let mut worst_index = None;
            let mut worst_delta = self.velocity_epsilon;
            for (i, contact) in contacts.iter().enumerate() {
                if contact.desired_delta_velocity() > worst_delta {
                    worst_delta = contact.desired_delta_velocity();
                    worst_index = Some(i);
                }
            }

            let Some(index) = worst_index else {
                break;
            };

            let bodies_touched = contacts[index].body;
            let changes = contacts[index].apply_velocity_change(bodies);

            // Includes the resolved contact's own index: its desired delta
            // velocity must be refreshed from the impulse it just applied,
            // or it stays stale and wins "worst" again next iteration
            // (ft_contacts.cpp's adjustVelocities does not skip it either).
            for other in contacts.iter_mut() {
                for touched_slot in 0..2 {
                    let Some(body_idx) = bodies_touched[touched_slot] else { continue };
                    let (velocity_change, rotation_change) = changes[touched_slot];
                    for other_slot in 0..2 {
                        if other.body[other_slot] == Some(body_idx) {
                            other.update_contact_velocity(other_slot, velocity_change, rotation_change, bodies, dt, config);
                        }
                    }
                }
            }

            iterations_used += 1;
        }
        if iterations_used == self.velocity_iterations && self.velocity_iterations > 0 {
            warn!(iterations_used, "rigid body velocity resolver hit iteration cap");
        }
    }
}
