//! Scenario 4 (distilled spec §8): two unit cubes stacked on a fixed floor
//! settle with small relative velocity, small penetration, identity-ish
//! orientation, and no horizontal drift.
//!
//! This crate has no narrow-phase collision detector (see `DESIGN.md`); the
//! test plays that role itself, generating a single face-centre contact per
//! touching pair each frame, the way a host application's detector would
//! feed `RigidBodyWorld::run_physics`'s `external_contacts` buffer.

use glam::{DMat3, DVec3};
use physics::{BodyForce, Contact, EngineConfig, RigidBody, RigidBodyWorld};

const HALF_EXTENT: f64 = 0.5;

fn cube_inertia(mass: f64, half_extent: f64) -> DMat3 {
    let side = half_extent * 2.0;
    let i = mass * side * side / 6.0;
    DMat3::from_diagonal(DVec3::splat(1.0 / i))
}

fn floor_contact(body_index: usize, body: &RigidBody) -> Option<Contact> {
    let bottom = body.position.y - HALF_EXTENT;
    if bottom >= 0.0 {
        return None;
    }
    Some(Contact::new(
        Some(body_index),
        None,
        DVec3::new(body.position.x, 0.0, body.position.z),
        DVec3::new(0.0, 1.0, 0.0),
        -bottom,
        0.5,
        0.0,
    ))
}

fn stack_contact(lower_index: usize, upper_index: usize, bodies: &[RigidBody]) -> Option<Contact> {
    let lower_top = bodies[lower_index].position.y + HALF_EXTENT;
    let upper_bottom = bodies[upper_index].position.y - HALF_EXTENT;
    let penetration = lower_top - upper_bottom;
    if penetration <= 0.0 {
        return None;
    }
    let point = DVec3::new(bodies[upper_index].position.x, (lower_top + upper_bottom) * 0.5, bodies[upper_index].position.z);
    Some(Contact::new(
        Some(lower_index),
        Some(upper_index),
        point,
        DVec3::new(0.0, 1.0, 0.0),
        penetration,
        0.5,
        0.0,
    ))
}

#[test]
fn stacked_cubes_settle_without_drift() {
    let config = EngineConfig::default();
    let mut world = RigidBodyWorld::new(8, 0, config);

    let mut floor = RigidBody::immovable();
    floor.position = DVec3::new(0.0, -HALF_EXTENT, 0.0);
    world.bodies.push(floor);

    let mut bottom_cube = RigidBody::new(1.0, cube_inertia(1.0, HALF_EXTENT)).unwrap();
    bottom_cube.position = DVec3::new(0.0, HALF_EXTENT + 0.05, 0.0);
    world.bodies.push(bottom_cube);

    let mut top_cube = RigidBody::new(1.0, cube_inertia(1.0, HALF_EXTENT)).unwrap();
    top_cube.position = DVec3::new(0.0, 3.0 * HALF_EXTENT + 0.1, 0.0);
    world.bodies.push(top_cube);

    world.force_registry.add(1, BodyForce::Gravity { gravity: DVec3::new(0.0, -9.81, 0.0) });
    world.force_registry.add(2, BodyForce::Gravity { gravity: DVec3::new(0.0, -9.81, 0.0) });

    let dt = 1.0 / 120.0;
    for _ in 0..1200 {
        world.start_frame();
        let mut external = vec![];
        if let Some(c) = floor_contact(1, &world.bodies[1]) {
            external.push(c);
        }
        if let Some(c) = stack_contact(1, 2, &world.bodies) {
            external.push(c);
        }
        world.run_physics(dt, &mut external).unwrap();
    }

    let bottom = &world.bodies[1];
    let top = &world.bodies[2];

    assert!(bottom.velocity.length() < 0.5, "bottom cube still moving: {:?}", bottom.velocity);
    assert!(top.velocity.length() < 0.5, "top cube still moving: {:?}", top.velocity);

    assert!(bottom.orientation.to_axis_angle().1.abs() < 0.05, "bottom cube tilted");
    assert!(top.orientation.to_axis_angle().1.abs() < 0.05, "top cube tilted");

    assert!(bottom.position.x.abs() < 0.1 && bottom.position.z.abs() < 0.1, "bottom cube drifted horizontally");
    assert!(top.position.x.abs() < 0.1 && top.position.z.abs() < 0.1, "top cube drifted horizontally");
}
