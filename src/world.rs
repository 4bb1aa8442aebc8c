//! Per-step orchestration (distilled spec §4.9): owns the particles (or
//! rigid bodies), their force registry, contact generators and resolver,
//! and drives one frame end to end.

use tracing::{debug, instrument};

use crate::body::RigidBody;
use crate::broad_phase::BoundingSphere;
use crate::config::EngineConfig;
use crate::contact::Contact;
use crate::error::{PhysicsError, PhysicsResult};
use crate::force::{BodyForceRegistry, ParticleForceRegistry};
use crate::joint::Joint;
use crate::particle::Particle;
use crate::particle_contact::{ParticleContact, ParticleContactGenerator, ParticleContactResolver};
use crate::resolver::ContactResolver;
use crate::Real;

/// Owns a set of particles, the links and force generators acting on them,
/// and drives one integration/resolution step per frame.
#[derive(Clone)]
pub struct ParticleWorld {
    /// The particles themselves. Indices into this vec are the stable
    /// handles used by force registrations and contact generators.
    pub particles: Vec<Particle>,
    /// Force generators keyed by particle index.
    pub force_registry: ParticleForceRegistry,
    /// Cables and rods (and any other contact source) to consult each
    /// frame.
    pub contact_generators: Vec<Box<dyn ParticleContactGenerator>>,
    /// Maximum number of contacts generated in a single frame. Excess
    /// generator output is dropped; see [`ParticleWorld::run_physics`].
    pub max_contacts: usize,
    resolver: ParticleContactResolver,
    config: EngineConfig,
}

impl ParticleWorld {
    /// Creates a world with `max_contacts` of headroom. `iterations = 0`
    /// selects auto mode: the resolver's iteration cap is recomputed each
    /// frame as `config.particle_iteration_multiplier * contacts_used`.
    pub fn new(max_contacts: usize, iterations: usize, config: EngineConfig) -> Self {
        Self {
            particles: Vec::new(),
            force_registry: ParticleForceRegistry::new(),
            contact_generators: Vec::new(),
            max_contacts,
            resolver: ParticleContactResolver::new(iterations),
            config,
        }
    }

    /// Clears every particle's force accumulator. Call once at the start of
    /// each frame before force generators run.
    pub fn start_frame(&mut self) {
        for particle in &mut self.particles {
            particle.clear_accumulator();
        }
    }

    /// Polls every contact generator, writing into a fresh buffer capped at
    /// `max_contacts`.
    pub fn generate_contacts(&self) -> Vec<ParticleContact> {
        let mut contacts = Vec::with_capacity(self.max_contacts);
        for generator in &self.contact_generators {
            if contacts.len() >= self.max_contacts {
                debug!(max_contacts = self.max_contacts, "particle contact buffer full, dropping remaining generators");
                break;
            }
            let limit = self.max_contacts - contacts.len();
            generator.add_contact(&self.particles, &mut contacts, limit);
        }
        contacts
    }

    /// Applies force generators, integrates every particle, then generates
    /// and resolves contacts. The usual single entry point for a frame.
    #[instrument(level = "trace", skip_all)]
    pub fn run_physics(&mut self, dt: Real) -> PhysicsResult<()> {
        if dt <= 0.0 {
            return Err(PhysicsError::NonPositiveTimestep { dt });
        }
        self.force_registry.update_forces(&mut self.particles, dt);
        for particle in &mut self.particles {
            particle.integrate(dt);
        }

        let mut contacts = self.generate_contacts();
        if contacts.is_empty() {
            return Ok(());
        }

        let iterations = if self.resolver.iterations == 0 {
            self.config.particle_iteration_multiplier * contacts.len()
        } else {
            self.resolver.iterations
        };
        ParticleContactResolver::new(iterations).resolve_contacts(&mut contacts, &mut self.particles, dt);
        Ok(())
    }
}

/// Rigid-body analogue of [`ParticleWorld`].
pub struct RigidBodyWorld {
    /// The bodies themselves. Indices into this vec are the stable handles
    /// used by force registrations, joints, and contacts.
    pub bodies: Vec<RigidBody>,
    /// Force generators keyed by body index.
    pub force_registry: BodyForceRegistry,
    /// Joints polled for corrective contacts each frame.
    pub joints: Vec<Joint>,
    /// Bounding spheres for broad-phase culling, kept in sync with `bodies`
    /// by the caller (there is no narrow-phase collision detector in this
    /// crate — see `DESIGN.md`).
    pub bounding_spheres: Vec<BoundingSphere>,
    /// Maximum number of contacts resolved in a single frame.
    pub max_contacts: usize,
    position_iterations: usize,
    velocity_iterations: usize,
    config: EngineConfig,
}

impl RigidBodyWorld {
    /// Creates a world with `max_contacts` of headroom. `iterations = 0`
    /// selects auto mode: both resolver passes get
    /// `config.rigid_body_iteration_multiplier * contacts_used` iterations.
    pub fn new(max_contacts: usize, iterations: usize, config: EngineConfig) -> Self {
        Self {
            bodies: Vec::new(),
            force_registry: BodyForceRegistry::new(),
            joints: Vec::new(),
            bounding_spheres: Vec::new(),
            max_contacts,
            position_iterations: iterations,
            velocity_iterations: iterations,
            config,
        }
    }

    /// Clears every body's force/torque accumulators and refreshes derived
    /// data (world transform, world-space inverse inertia tensor). Call
    /// once at the start of each frame.
    pub fn start_frame(&mut self) {
        for body in &mut self.bodies {
            body.clear_accumulators();
            body.calculate_derived_data();
        }
    }

    /// Polls every joint for a corrective contact, capped at `max_contacts`.
    pub fn generate_contacts(&self) -> Vec<Contact> {
        let mut contacts = Vec::with_capacity(self.max_contacts);
        for joint in &self.joints {
            if contacts.len() >= self.max_contacts {
                debug!(max_contacts = self.max_contacts, "rigid body contact buffer full, dropping remaining joints");
                break;
            }
            joint.add_contact(&self.bodies, &mut contacts);
        }
        contacts
    }

    /// Applies force generators, integrates every body, then generates and
    /// resolves joint contacts. Narrow-phase body-body contacts discovered
    /// externally (e.g. by a host application's collision detector) can be
    /// appended to the buffer this returns before resolution; see
    /// `DESIGN.md` for why that detector is not part of this crate.
    #[instrument(level = "trace", skip_all)]
    pub fn run_physics(&mut self, dt: Real, external_contacts: &mut Vec<Contact>) -> PhysicsResult<()> {
        if dt <= 0.0 {
            return Err(PhysicsError::NonPositiveTimestep { dt });
        }
        self.force_registry.update_forces(&mut self.bodies, dt);
        for body in &mut self.bodies {
            body.integrate(dt, &self.config);
        }

        let mut contacts = self.generate_contacts();
        contacts.append(external_contacts);
        if contacts.len() > self.max_contacts {
            debug!(dropped = contacts.len() - self.max_contacts, "truncating rigid body contacts to max_contacts");
            contacts.truncate(self.max_contacts);
        }
        if contacts.is_empty() {
            return Ok(());
        }

        let position_iterations = if self.position_iterations == 0 {
            self.config.rigid_body_iteration_multiplier * contacts.len()
        } else {
            self.position_iterations
        };
        let velocity_iterations = if self.velocity_iterations == 0 {
            self.config.rigid_body_iteration_multiplier * contacts.len()
        } else {
            self.velocity_iterations
        };

        let resolver = ContactResolver::new(position_iterations, velocity_iterations, &self.config);
        resolver.resolve_contacts(&mut contacts, &mut self.bodies, dt, &self.config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::force::ParticleForce;
    use glam::DVec3;

    #[test]
    fn particle_world_integrates_and_resolves_ground_contact() {
        let mut world = ParticleWorld::new(8, 0, EngineConfig::default());
        world.particles.push(Particle {
            position: DVec3::new(0.0, 5.0, 0.0),
            ..Particle::new(1.0).unwrap()
        });
        world.force_registry.add(
            0,
            ParticleForce::Gravity {
                gravity: DVec3::new(0.0, -9.8, 0.0),
            },
        );

        let dt = 1.0 / 60.0;
        for _ in 0..600 {
            world.start_frame();
            world.run_physics(dt).unwrap();
            if world.particles[0].position.y < 0.0 {
                world.particles[0].position.y = 0.0;
                world.particles[0].velocity.y = 0.0;
            }
        }
        assert!(world.particles[0].position.y >= -1e-6);
    }

    #[test]
    fn rigid_body_world_rejects_non_positive_timestep() {
        let mut world = RigidBodyWorld::new(4, 0, EngineConfig::default());
        world.bodies.push(RigidBody::default());
        let mut external = vec![];
        assert!(world.run_physics(0.0, &mut external).is_err());
    }
}
