//! Scenario 5 (distilled spec §8): a sliding cube with Coulomb friction
//! comes to rest after travelling `v^2 / (2*mu*g)`, within 5%.

use glam::{DMat3, DVec3};
use physics::{BodyForce, Contact, EngineConfig, RigidBody, RigidBodyWorld};

const HALF_EXTENT: f64 = 0.5;
const MU: f64 = 0.5;
const G: f64 = 9.81;

fn cube_inertia(mass: f64, half_extent: f64) -> DMat3 {
    let side = half_extent * 2.0;
    let i = mass * side * side / 6.0;
    DMat3::from_diagonal(DVec3::splat(1.0 / i))
}

fn floor_contact(body: &RigidBody) -> Option<Contact> {
    let bottom = body.position.y - HALF_EXTENT;
    if bottom >= 1e-4 {
        return None;
    }
    Some(Contact::new(
        Some(0),
        None,
        DVec3::new(body.position.x, 0.0, body.position.z),
        DVec3::new(0.0, 1.0, 0.0),
        (-bottom).max(0.0),
        MU,
        0.0,
    ))
}

#[test]
fn sliding_cube_stops_at_expected_distance() {
    let mut world = RigidBodyWorld::new(4, 0, EngineConfig::default());

    let mut cube = RigidBody::new(1.0, cube_inertia(1.0, HALF_EXTENT)).unwrap();
    cube.position = DVec3::new(0.0, HALF_EXTENT, 0.0);
    cube.velocity = DVec3::new(5.0, 0.0, 0.0);
    world.bodies.push(cube);

    world.force_registry.add(0, BodyForce::Gravity { gravity: DVec3::new(0.0, -G, 0.0) });

    let start_x = world.bodies[0].position.x;
    let dt = 1.0 / 240.0;
    for _ in 0..(20 * 240) {
        world.start_frame();
        let mut external = vec![];
        if let Some(c) = floor_contact(&world.bodies[0]) {
            external.push(c);
        }
        world.run_physics(dt, &mut external).unwrap();
        if world.bodies[0].velocity.length() < 1e-3 {
            break;
        }
    }

    let travelled = world.bodies[0].position.x - start_x;
    let expected = 5.0 * 5.0 / (2.0 * MU * G);
    let relative_error = (travelled - expected).abs() / expected;
    assert!(
        relative_error < 0.05,
        "travelled {travelled}, expected {expected} (relative error {relative_error})"
    );
}
