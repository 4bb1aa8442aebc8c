//! Scenario 1 (distilled spec §8): a particle dropped onto a ground plane
//! comes to rest at y ≈ 0 with small residual speed.

use glam::DVec3;
use physics::{EngineConfig, Particle, ParticleGroundContact, ParticleWorld};

#[test]
fn falling_particle_comes_to_rest_on_ground() {
    let mut world = ParticleWorld::new(4, 4, EngineConfig::default());
    world.particles.push(Particle {
        position: DVec3::new(0.0, 10.0, 0.0),
        velocity: DVec3::ZERO,
        acceleration: DVec3::new(0.0, -10.0, 0.0),
        damping: 1.0,
        ..Particle::new(1.0).unwrap()
    });
    world.contact_generators.push(Box::new(ParticleGroundContact {
        particle_index: 0,
        ground_height: 0.0,
        restitution: 0.0,
    }));

    let dt = 0.1;
    for _ in 0..20 {
        world.start_frame();
        world.run_physics(dt).unwrap();
    }

    let particle = &world.particles[0];
    assert!(particle.position.y >= -1e-6, "particle sank below ground: y = {}", particle.position.y);
    assert!(particle.position.y < 1.0, "particle never reached the ground: y = {}", particle.position.y);
    assert!(particle.velocity.length() < 0.05, "particle still moving: |v| = {}", particle.velocity.length());
}
