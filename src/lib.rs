//! A 3D particle and rigid-body physics engine: integrators, force
//! registries, particle links (cables/rods), a sequential severity-ordered
//! contact resolver for both particles and rigid bodies, ball joints, and a
//! bounding-sphere broad phase.
//!
//! The engine core has no notion of rendering, input, or a windowing
//! surface; it integrates state and resolves contacts given whatever a host
//! application feeds it. See [`world`] for the two orchestration types that
//! tie a frame together, [`config`] for the tunables that control sleep and
//! resolver iteration counts, and `DESIGN.md` at the repository root for
//! what's deliberately left as an open interface (narrow-phase collision
//! detection chief among them).
//!
//! All scalar quantities use [`Real`], an alias for `f64`.

pub mod body;
pub mod broad_phase;
pub mod config;
pub mod contact;
pub mod error;
pub mod force;
pub mod joint;
pub mod math;
pub mod particle;
pub mod particle_contact;
pub mod random;
pub mod resolver;
pub mod world;

/// The scalar type used throughout this crate.
pub type Real = f64;

pub use body::RigidBody;
pub use broad_phase::BoundingSphere;
pub use config::EngineConfig;
pub use contact::Contact;
pub use error::{PhysicsError, PhysicsResult};
pub use force::{BodyForce, BodyForceRegistry, ParticleForce, ParticleForceRegistry};
pub use joint::Joint;
pub use particle::Particle;
pub use particle_contact::{
    ParticleCable, ParticleContact, ParticleContactGenerator, ParticleContactResolver, ParticleGroundContact,
    ParticleRod,
};
pub use random::Random;
pub use resolver::ContactResolver;
pub use world::{ParticleWorld, RigidBodyWorld};
