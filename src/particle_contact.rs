//! Particle contacts, the cable/rod link generators that emit them, and the
//! sequential severity-ordered resolver (distilled spec §4.3/§4.4).

use dyn_clone::DynClone;
use glam::DVec3;
use tracing::{instrument, trace, trace_span, warn};

use crate::particle::Particle;
use crate::Real;

/// A contact between two particles (by index), or between one particle and
/// the immovable world (`particle_b == None`).
#[derive(Clone, Copy, Debug)]
pub struct ParticleContact {
    /// Index of the first particle.
    pub particle_a: usize,
    /// Index of the second particle, or `None` for a world contact.
    pub particle_b: Option<usize>,
    /// Contact normal, by convention from particle 0 toward particle 1.
    pub normal: DVec3,
    /// Penetration depth; positive means overlap.
    pub penetration: Real,
    /// Coefficient of restitution, in `[0, 1]`.
    pub restitution: Real,
    /// Movement applied to particle A by the last resolution pass.
    pub movement_a: DVec3,
    /// Movement applied to particle B by the last resolution pass (zero if
    /// `particle_b` is `None`).
    pub movement_b: DVec3,
}

impl ParticleContact {
    /// Creates a new, unresolved contact.
    pub fn new(
        particle_a: usize,
        particle_b: Option<usize>,
        normal: DVec3,
        penetration: Real,
        restitution: Real,
    ) -> Self {
        Self {
            particle_a,
            particle_b,
            normal,
            penetration,
            restitution,
            movement_a: DVec3::ZERO,
            movement_b: DVec3::ZERO,
        }
    }

    fn inverse_mass(&self, particles: &[Particle]) -> (Real, Real) {
        let a = particles[self.particle_a].inverse_mass;
        let b = self
            .particle_b
            .map(|idx| particles[idx].inverse_mass)
            .unwrap_or(0.0);
        (a, b)
    }

    /// Separating velocity along the contact normal: positive means the
    /// particles are already moving apart.
    pub fn separating_velocity(&self, particles: &[Particle]) -> Real {
        let vel_a = particles[self.particle_a].velocity;
        let vel_b = self
            .particle_b
            .map(|idx| particles[idx].velocity)
            .unwrap_or(DVec3::ZERO);
        (vel_a - vel_b).dot(self.normal)
    }

    fn resolve_velocity(&mut self, particles: &mut [Particle], dt: Real) {
        let separating_velocity = self.separating_velocity(particles);
        if separating_velocity > 0.0 {
            return;
        }

        let mut new_separating_velocity = -self.restitution * separating_velocity;

        // Subtract velocity built up this frame by non-reactive
        // acceleration, so resting contacts don't gain energy every step.
        let acc_a = particles[self.particle_a].acceleration;
        let acc_b = self
            .particle_b
            .map(|idx| particles[idx].acceleration)
            .unwrap_or(DVec3::ZERO);
        let acc_caused_velocity = (acc_a - acc_b).dot(self.normal) * dt;
        if acc_caused_velocity < 0.0 {
            new_separating_velocity += self.restitution * acc_caused_velocity;
            new_separating_velocity = new_separating_velocity.max(0.0);
        }

        let delta_velocity = new_separating_velocity - separating_velocity;

        let (inv_a, inv_b) = self.inverse_mass(particles);
        let total_inverse_mass = inv_a + inv_b;
        if total_inverse_mass <= 0.0 {
            return;
        }

        let impulse = delta_velocity / total_inverse_mass;
        let impulse_per_inverse_mass = self.normal * impulse;

        particles[self.particle_a].velocity += impulse_per_inverse_mass * inv_a;
        if let Some(idx) = self.particle_b {
            particles[idx].velocity += impulse_per_inverse_mass * -inv_b;
        }

        trace!(impulse, "particle contact velocity resolved");
    }

    fn resolve_interpenetration(&mut self, particles: &mut [Particle]) {
        if self.penetration <= 0.0 {
            self.movement_a = DVec3::ZERO;
            self.movement_b = DVec3::ZERO;
            return;
        }

        let (inv_a, inv_b) = self.inverse_mass(particles);
        let total_inverse_mass = inv_a + inv_b;
        if total_inverse_mass <= 0.0 {
            self.movement_a = DVec3::ZERO;
            self.movement_b = DVec3::ZERO;
            return;
        }

        let move_per_inverse_mass = self.normal * (self.penetration / total_inverse_mass);
        self.movement_a = move_per_inverse_mass * inv_a;
        self.movement_b = move_per_inverse_mass * -inv_b;

        particles[self.particle_a].position += self.movement_a;
        if let Some(idx) = self.particle_b {
            particles[idx].position += self.movement_b;
        }
        self.penetration = 0.0;
    }

    fn resolve(&mut self, particles: &mut [Particle], dt: Real) {
        self.resolve_velocity(particles, dt);
        self.resolve_interpenetration(particles);
    }
}

/// Sequential, severity-ordered resolver for [`ParticleContact`]s
/// (distilled spec §4.4): each iteration picks the contact with the worst
/// violation, resolves it, and propagates the induced displacement to every
/// other contact sharing a particle.
#[derive(Clone, Copy, Debug)]
pub struct ParticleContactResolver {
    /// Maximum number of iterations to run. Callers typically pass
    /// `2 * contacts.len()`.
    pub iterations: usize,
}

impl ParticleContactResolver {
    /// Creates a resolver with the given iteration cap.
    pub fn new(iterations: usize) -> Self {
        Self { iterations }
    }

    /// Resolves `contacts` in place against `particles`.
    #[instrument(level = "trace", skip_all)]
    pub fn resolve_contacts(&self, contacts: &mut [ParticleContact], particles: &mut [Particle], dt: Real) {
        let mut iterations_used = 0;
        while iterations_used < self.iterations {
            let span = trace_span!("iteration", iterations_used);
            let _enter = span.enter();
            // Select the contact with the most negative (most closing)
            // separating velocity among those that still need resolving.
            let mut worst_index = None;
            let mut worst_sep_vel = Real::MAX;
            for (i, contact) in contacts.iter().enumerate() {
                let sep_vel = contact.separating_velocity(particles);
                if sep_vel < worst_sep_vel && (sep_vel < 0.0 || contact.penetration > 0.0) {
                    worst_sep_vel = sep_vel;
                    worst_index = Some(i);
                }
            }

            let Some(index) = worst_index else {
                break;
            };

            contacts[index].resolve(particles, dt);
            let movement_a = contacts[index].movement_a;
            let movement_b = contacts[index].movement_b;
            let particle_a = contacts[index].particle_a;
            let particle_b = contacts[index].particle_b;

            for (i, other) in contacts.iter_mut().enumerate() {
                if i == index {
                    continue;
                }
                if other.particle_a == particle_a {
                    other.penetration -= movement_a.dot(other.normal);
                } else if Some(other.particle_a) == particle_b {
                    other.penetration -= movement_b.dot(other.normal);
                }
                if let Some(b) = other.particle_b {
                    if b == particle_a {
                        other.penetration += movement_a.dot(other.normal);
                    } else if Some(b) == particle_b {
                        other.penetration += movement_b.dot(other.normal);
                    }
                }
            }

            iterations_used += 1;
        }
        if iterations_used == self.iterations && self.iterations > 0 {
            warn!(iterations_used, "particle contact resolver hit iteration cap");
        }
    }
}

/// Generates at most one [`ParticleContact`] per call.
///
/// `DynClone` lets a [`crate::world::ParticleWorld`] (which owns a
/// `Vec<Box<dyn ParticleContactGenerator>>`) be cloned as a whole, the same
/// boxed-trait-object pattern this crate's teacher used for its constraint
/// list.
pub trait ParticleContactGenerator: DynClone {
    /// Attempts to write a contact into `out`. Returns the number of
    /// contacts written (0 or 1).
    fn add_contact(&self, particles: &[Particle], out: &mut Vec<ParticleContact>, limit: usize) -> usize;
}

dyn_clone::clone_trait_object!(ParticleContactGenerator);

/// A cable: a maximum-length constraint between two particles (or one
/// particle and a fixed anchor).
#[derive(Clone, Copy, Debug)]
pub struct ParticleCable {
    /// First particle index.
    pub particle_a: usize,
    /// Second particle index, or `None` to anchor to `anchor`.
    pub particle_b: Option<usize>,
    /// Fixed anchor, used only when `particle_b` is `None`.
    pub anchor: DVec3,
    /// Maximum length of the cable.
    pub max_length: Real,
    /// Restitution applied when the cable snaps taut.
    pub restitution: Real,
}

impl ParticleContactGenerator for ParticleCable {
    fn add_contact(&self, particles: &[Particle], out: &mut Vec<ParticleContact>, limit: usize) -> usize {
        if limit == 0 {
            return 0;
        }
        let pos_a = particles[self.particle_a].position;
        let pos_b = self
            .particle_b
            .map(|idx| particles[idx].position)
            .unwrap_or(self.anchor);
        let length = (pos_b - pos_a).length();
        if length < self.max_length {
            return 0;
        }
        let normal = (pos_b - pos_a) / length;
        out.push(ParticleContact::new(
            self.particle_a,
            self.particle_b,
            normal,
            length - self.max_length,
            self.restitution,
        ));
        1
    }
}

/// A rod: a fixed-length, inelastic constraint between two particles (or
/// one particle and a fixed anchor).
#[derive(Clone, Copy, Debug)]
pub struct ParticleRod {
    /// First particle index.
    pub particle_a: usize,
    /// Second particle index, or `None` to anchor to `anchor`.
    pub particle_b: Option<usize>,
    /// Fixed anchor, used only when `particle_b` is `None`.
    pub anchor: DVec3,
    /// Fixed length of the rod.
    pub length: Real,
}

impl ParticleContactGenerator for ParticleRod {
    fn add_contact(&self, particles: &[Particle], out: &mut Vec<ParticleContact>, limit: usize) -> usize {
        if limit == 0 {
            return 0;
        }
        let pos_a = particles[self.particle_a].position;
        let pos_b = self
            .particle_b
            .map(|idx| particles[idx].position)
            .unwrap_or(self.anchor);
        let current_length = (pos_b - pos_a).length();
        if (current_length - self.length).abs() < 1e-9 {
            return 0;
        }
        let (normal, penetration) = if current_length > self.length {
            ((pos_b - pos_a) / current_length, current_length - self.length)
        } else {
            ((pos_a - pos_b) / current_length, self.length - current_length)
        };
        // Rods are inelastic in both directions.
        out.push(ParticleContact::new(
            self.particle_a,
            self.particle_b,
            normal,
            penetration,
            0.0,
        ));
        1
    }
}

/// Generates a contact whenever a particle sinks below a fixed ground
/// plane along the Y axis (distilled spec §8, scenario 1).
#[derive(Clone, Copy, Debug)]
pub struct ParticleGroundContact {
    /// Index of the particle to test against the ground.
    pub particle_index: usize,
    /// Height of the ground plane.
    pub ground_height: Real,
    /// Restitution applied on impact.
    pub restitution: Real,
}

impl ParticleContactGenerator for ParticleGroundContact {
    fn add_contact(&self, particles: &[Particle], out: &mut Vec<ParticleContact>, limit: usize) -> usize {
        if limit == 0 {
            return 0;
        }
        let position = particles[self.particle_index].position;
        if position.y >= self.ground_height {
            return 0;
        }
        out.push(ParticleContact::new(
            self.particle_index,
            None,
            DVec3::new(0.0, 1.0, 0.0),
            self.ground_height - position.y,
            self.restitution,
        ));
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn particle_at(pos: DVec3) -> Particle {
        Particle {
            position: pos,
            ..Particle::new(1.0).unwrap()
        }
    }

    #[test]
    fn cable_at_exactly_max_length_emits_nothing() {
        let particles = vec![particle_at(DVec3::ZERO), particle_at(DVec3::new(10.0, 0.0, 0.0))];
        let cable = ParticleCable {
            particle_a: 0,
            particle_b: Some(1),
            anchor: DVec3::ZERO,
            max_length: 10.0,
            restitution: 0.0,
        };
        let mut out = vec![];
        assert_eq!(cable.add_contact(&particles, &mut out, 1), 0);
    }

    #[test]
    fn cable_past_max_length_emits_one_contact_with_correct_penetration() {
        let particles = vec![particle_at(DVec3::ZERO), particle_at(DVec3::new(10.01, 0.0, 0.0))];
        let cable = ParticleCable {
            particle_a: 0,
            particle_b: Some(1),
            anchor: DVec3::ZERO,
            max_length: 10.0,
            restitution: 0.0,
        };
        let mut out = vec![];
        assert_eq!(cable.add_contact(&particles, &mut out, 1), 1);
        assert_relative_eq!(out[0].penetration, 0.01, epsilon = 1e-9);
    }

    #[test]
    fn rod_at_exact_length_emits_nothing() {
        let particles = vec![particle_at(DVec3::ZERO), particle_at(DVec3::new(1.0, 0.0, 0.0))];
        let rod = ParticleRod {
            particle_a: 0,
            particle_b: Some(1),
            anchor: DVec3::ZERO,
            length: 1.0,
        };
        let mut out = vec![];
        assert_eq!(rod.add_contact(&particles, &mut out, 1), 0);
    }

    #[test]
    fn rod_overextended_and_compressed_have_opposite_normals() {
        let stretched = vec![particle_at(DVec3::ZERO), particle_at(DVec3::new(1.5, 0.0, 0.0))];
        let compressed = vec![particle_at(DVec3::ZERO), particle_at(DVec3::new(0.5, 0.0, 0.0))];
        let rod = ParticleRod {
            particle_a: 0,
            particle_b: Some(1),
            anchor: DVec3::ZERO,
            length: 1.0,
        };
        let mut out_stretched = vec![];
        rod.add_contact(&stretched, &mut out_stretched, 1);
        let mut out_compressed = vec![];
        rod.add_contact(&compressed, &mut out_compressed, 1);
        assert_relative_eq!(out_stretched[0].normal.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(out_compressed[0].normal.x, -1.0, epsilon = 1e-9);
        assert_relative_eq!(out_stretched[0].penetration, 0.5, epsilon = 1e-9);
        assert_relative_eq!(out_compressed[0].penetration, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn resolver_brings_falling_particle_to_rest_on_ground() {
        let mut particles = vec![particle_at(DVec3::new(0.0, 10.0, 0.0))];
        let dt = 0.1;
        for _ in 0..200 {
            particles[0].acceleration = DVec3::new(0.0, -10.0, 0.0);
            particles[0].integrate(dt);
            if particles[0].position.y < 0.0 {
                let penetration = -particles[0].position.y;
                let mut contacts = vec![ParticleContact::new(
                    0,
                    None,
                    DVec3::new(0.0, 1.0, 0.0),
                    penetration,
                    0.0,
                )];
                ParticleContactResolver::new(4).resolve_contacts(&mut contacts, &mut particles, dt);
            }
        }
        assert!(particles[0].position.y >= -1e-6);
        assert!(particles[0].velocity.length() < 0.5);
    }
}
