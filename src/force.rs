//! Force generators and the registries that dispatch them against
//! particles and rigid bodies each step.
//!
//! Generators are modeled as a tagged enum rather than a trait-object
//! hierarchy (distilled spec §9: "model as a tagged variant over the
//! enumerated generator kinds"), mirroring the `ConstraintEnum` pattern this
//! crate is built on.

use glam::DVec3;
use tracing::{instrument, trace};

use crate::body::RigidBody;
use crate::particle::Particle;
use crate::Real;

/// A force source that can be applied to a [`Particle`].
#[derive(Clone, Debug)]
pub enum ParticleForce {
    /// Constant force `F = m * g`. Skips infinite-mass targets.
    Gravity {
        /// Acceleration due to gravity.
        gravity: DVec3,
    },
    /// Quadratic drag: `c = k1*|v| + k2*|v|^2`, `F = -c * v_hat`.
    Drag {
        /// Linear drag coefficient.
        k1: Real,
        /// Quadratic drag coefficient.
        k2: Real,
    },
    /// Hookean spring to another particle (by index), `F = -k*(|d|-rest)*d_hat`.
    Spring {
        /// Index of the particle at the other end of the spring.
        other: usize,
        /// Spring constant.
        spring_constant: Real,
        /// Rest length.
        rest_length: Real,
    },
    /// Hookean spring to a fixed world-space anchor.
    AnchoredSpring {
        /// World-space anchor point.
        anchor: DVec3,
        /// Spring constant.
        spring_constant: Real,
        /// Rest length.
        rest_length: Real,
    },
    /// Spring that only pulls (never pushes): zero force when compressed.
    Bungee {
        /// Index of the particle at the other end of the bungee.
        other: usize,
        /// Spring constant.
        spring_constant: Real,
        /// Rest length beyond which the bungee engages.
        rest_length: Real,
    },
    /// Archimedes buoyancy, linearly ramped across the partially-submerged
    /// band (distilled spec §4.2 and the operator-precedence note in §9 —
    /// the partial-submersion formula is reproduced exactly as specified).
    Buoyancy {
        /// Maximum submersion depth before buoyancy saturates.
        max_depth: Real,
        /// Volume of the (fully submerged) object.
        volume: Real,
        /// Height of the water surface along the up axis.
        water_height: Real,
        /// Liquid density.
        liquid_density: Real,
    },
    /// Closed-form damped-harmonic-oscillator approximation of a Hookean
    /// spring, for springs whose undamped period would otherwise be shorter
    /// than `dt` (distilled spec §4.2; the dimensional note in §9 applies —
    /// this is a rough-impulse approximation, reproduced as specified, not
    /// independently re-derived).
    StiffSpring {
        /// World-space anchor point.
        anchor: DVec3,
        /// Spring constant.
        spring_constant: Real,
        /// Damping coefficient.
        damping: Real,
    },
}

impl ParticleForce {
    /// Computes and applies this generator's force to `target` (identified
    /// by `target_index` within `particles`) for a step of `dt`.
    pub fn update_force(&self, particles: &mut [Particle], target_index: usize, dt: Real) {
        match self {
            ParticleForce::Gravity { gravity } => {
                let p = &mut particles[target_index];
                if !p.has_finite_mass() {
                    return;
                }
                let force = *gravity * p.mass();
                p.add_force(force);
            }
            ParticleForce::Drag { k1, k2 } => {
                let p = &mut particles[target_index];
                if !p.has_finite_mass() {
                    return;
                }
                let speed = p.velocity.length();
                if speed < 1e-12 {
                    return;
                }
                let drag_coeff = k1 * speed + k2 * speed * speed;
                let force = -p.velocity.normalize() * drag_coeff;
                p.add_force(force);
            }
            ParticleForce::Spring {
                other,
                spring_constant,
                rest_length,
            } => {
                let other_pos = particles[*other].position;
                apply_spring(&mut particles[target_index], other_pos, *spring_constant, *rest_length, false);
            }
            ParticleForce::AnchoredSpring {
                anchor,
                spring_constant,
                rest_length,
            } => {
                apply_spring(&mut particles[target_index], *anchor, *spring_constant, *rest_length, false);
            }
            ParticleForce::Bungee {
                other,
                spring_constant,
                rest_length,
            } => {
                let other_pos = particles[*other].position;
                apply_spring(&mut particles[target_index], other_pos, *spring_constant, *rest_length, true);
            }
            ParticleForce::Buoyancy {
                max_depth,
                volume,
                water_height,
                liquid_density,
            } => {
                let p = &mut particles[target_index];
                if !p.has_finite_mass() {
                    return;
                }
                let depth = p.position.y;
                if depth >= water_height + max_depth {
                    return;
                }
                let force = if depth <= water_height - max_depth {
                    DVec3::new(0.0, liquid_density * volume, 0.0)
                } else {
                    // Reproduced exactly as specified: unusual operator
                    // precedence in the original is intentional here.
                    let magnitude =
                        liquid_density * volume * (depth - max_depth - water_height) / 2.0 * max_depth;
                    DVec3::new(0.0, magnitude, 0.0)
                };
                p.add_force(force);
            }
            ParticleForce::StiffSpring {
                anchor,
                spring_constant,
                damping,
            } => {
                let p = &mut particles[target_index];
                if !p.has_finite_mass() {
                    return;
                }
                let gamma = 4.0 * spring_constant - damping * damping;
                if gamma <= 0.0 {
                    trace!("stiff spring degenerate (4k - c^2 <= 0), skipping");
                    return;
                }
                let gamma = 0.5 * gamma.sqrt();
                let position = p.position - *anchor;
                let c = position * (damping / (2.0 * gamma)) + p.velocity * (1.0 / gamma);
                let mut target = position * (gamma * dt).cos() + c * (gamma * dt).sin();
                target *= (-0.5 * damping * dt).exp();

                let accel = (target - position) * (1.0 / (dt * dt)) - p.velocity * dt;
                let force = accel * p.mass();
                p.add_force(force);
            }
        }
    }
}

fn apply_spring(p: &mut Particle, other: DVec3, spring_constant: Real, rest_length: Real, bungee: bool) {
    if !p.has_finite_mass() {
        return;
    }
    let delta = p.position - other;
    let length = delta.length();
    if length < 1e-12 {
        return;
    }
    if bungee && length <= rest_length {
        return;
    }
    let magnitude = spring_constant * (length - rest_length);
    let force = -delta.normalize() * magnitude;
    p.add_force(force);
}

/// A force source that can be applied to a [`RigidBody`].
#[derive(Clone, Debug)]
pub enum BodyForce {
    /// Constant force applied at the centre of mass.
    Gravity {
        /// Acceleration due to gravity.
        gravity: DVec3,
    },
    /// Hookean spring between a body-space point on this body and a
    /// body-space point on another body (by index).
    Spring {
        /// Body-space connection point on this body.
        connection_point: DVec3,
        /// Index of the other body.
        other: usize,
        /// Body-space connection point on the other body.
        other_connection_point: DVec3,
        /// Spring constant.
        spring_constant: Real,
        /// Rest length.
        rest_length: Real,
    },
    /// Archimedes buoyancy applied at a body-space centre of buoyancy.
    Buoyancy {
        /// Body-space centre of buoyancy.
        centre_of_buoyancy: DVec3,
        /// Maximum submersion depth before buoyancy saturates.
        max_depth: Real,
        /// Volume of the (fully submerged) object.
        volume: Real,
        /// Height of the water surface along the up axis.
        water_height: Real,
        /// Liquid density.
        liquid_density: Real,
    },
    /// Fixed aerodynamic tensor: `F = T * v_body` (body-relative velocity,
    /// including wind).
    Aero {
        /// Aerodynamic tensor, in body space.
        tensor: glam::DMat3,
        /// Body-space point of application.
        application_point: DVec3,
        /// World-space wind velocity, added to the body's velocity before
        /// transforming into body space.
        wind: DVec3,
    },
    /// Aerodynamic tensor interpolated between `min`, `base` and `max` by a
    /// control setting in `[-1, 1]`.
    AeroControl {
        /// Tensor at `control == -1`.
        min: glam::DMat3,
        /// Tensor at `control == 0`.
        base: glam::DMat3,
        /// Tensor at `control == 1`.
        max: glam::DMat3,
        /// Body-space point of application.
        application_point: DVec3,
        /// World-space wind velocity.
        wind: DVec3,
        /// Current control setting, clamped to `[-1, 1]`.
        control: Real,
    },
    /// Placeholder for a radial impulse with falloff (distilled spec §4.2:
    /// "design leaves room for a radial impulse with falloff"). Applies an
    /// inverse-square-falloff force directed away from `origin`, with no
    /// falloff beyond `radius`.
    Explosion {
        /// World-space origin of the explosion.
        origin: DVec3,
        /// Force magnitude at unit distance.
        strength: Real,
        /// Distance beyond which the explosion has no effect.
        radius: Real,
    },
}

impl BodyForce {
    /// Computes and applies this generator's force (and torque, for
    /// off-centre applications) to `target` for a step of `dt`.
    pub fn update_force(&self, bodies: &mut [RigidBody], target_index: usize, _dt: Real) {
        match self {
            BodyForce::Gravity { gravity } => {
                let b = &mut bodies[target_index];
                if b.inverse_mass <= 0.0 {
                    return;
                }
                let force = *gravity * b.mass();
                b.add_force(force);
            }
            BodyForce::Spring {
                connection_point,
                other,
                other_connection_point,
                spring_constant,
                rest_length,
            } => {
                let other_world = bodies[*other].point_in_world_space(*other_connection_point);
                let b = &mut bodies[target_index];
                if b.inverse_mass <= 0.0 {
                    return;
                }
                let world_point = b.point_in_world_space(*connection_point);
                let delta = world_point - other_world;
                let length = delta.length();
                if length < 1e-12 {
                    return;
                }
                let magnitude = spring_constant * (length - rest_length);
                let force = -delta.normalize() * magnitude;
                b.add_force_at_point(force, world_point);
            }
            BodyForce::Buoyancy {
                centre_of_buoyancy,
                max_depth,
                volume,
                water_height,
                liquid_density,
            } => {
                let b = &mut bodies[target_index];
                if b.inverse_mass <= 0.0 {
                    return;
                }
                let world_point = b.point_in_world_space(*centre_of_buoyancy);
                let depth = world_point.y;
                if depth >= water_height + max_depth {
                    return;
                }
                let force = if depth <= water_height - max_depth {
                    DVec3::new(0.0, liquid_density * volume, 0.0)
                } else {
                    let magnitude =
                        liquid_density * volume * (depth - max_depth - water_height) / 2.0 * max_depth;
                    DVec3::new(0.0, magnitude, 0.0)
                };
                b.add_force_at_point(force, world_point);
            }
            BodyForce::Aero {
                tensor,
                application_point,
                wind,
            } => {
                apply_aero_tensor(&mut bodies[target_index], tensor, *application_point, *wind);
            }
            BodyForce::AeroControl {
                min,
                base,
                max,
                application_point,
                wind,
                control,
            } => {
                let control = control.clamp(-1.0, 1.0);
                let tensor = if control < 0.0 {
                    lerp_mat3(*min, *base, control + 1.0)
                } else {
                    lerp_mat3(*base, *max, control)
                };
                apply_aero_tensor(&mut bodies[target_index], &tensor, *application_point, *wind);
            }
            BodyForce::Explosion {
                origin,
                strength,
                radius,
            } => {
                let b = &mut bodies[target_index];
                if b.inverse_mass <= 0.0 {
                    return;
                }
                let delta = b.position - *origin;
                let distance = delta.length();
                if distance < 1e-6 || distance > *radius {
                    return;
                }
                let magnitude = strength / (distance * distance);
                let force = delta.normalize() * magnitude;
                b.add_force(force);
            }
        }
    }
}

fn lerp_mat3(a: glam::DMat3, b: glam::DMat3, t: Real) -> glam::DMat3 {
    glam::DMat3::from_cols(
        a.x_axis.lerp(b.x_axis, t),
        a.y_axis.lerp(b.y_axis, t),
        a.z_axis.lerp(b.z_axis, t),
    )
}

fn apply_aero_tensor(body: &mut RigidBody, tensor: &glam::DMat3, application_point: DVec3, wind: DVec3) {
    if body.inverse_mass <= 0.0 {
        return;
    }
    let world_point = body.point_in_world_space(application_point);
    let body_to_world = glam::DMat3::from_quat(body.orientation);
    let world_to_body = body_to_world.transpose();

    let velocity = body.velocity + wind;
    let body_velocity = world_to_body * velocity;
    let body_force = *tensor * body_velocity;
    let world_force = body_to_world * body_force;

    body.add_force_at_point(world_force, world_point);
}

/// A registry pairing targets (by index) with the force generators that
/// apply to them, dispatched in insertion order each step.
#[derive(Clone, Debug, Default)]
pub struct ParticleForceRegistry {
    registrations: Vec<(usize, ParticleForce)>,
}

impl ParticleForceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `generator` against the particle at `target_index`.
    pub fn add(&mut self, target_index: usize, generator: ParticleForce) {
        self.registrations.push((target_index, generator));
    }

    /// Removes all registrations for `target_index`. No-op if none exist.
    pub fn remove(&mut self, target_index: usize) {
        self.registrations.retain(|(idx, _)| *idx != target_index);
    }

    /// Removes every registration.
    pub fn clear(&mut self) {
        self.registrations.clear();
    }

    /// Dispatches `update_force(target, dt)` for every registration, in
    /// insertion order.
    #[instrument(level = "trace", skip_all)]
    pub fn update_forces(&self, particles: &mut [Particle], dt: Real) {
        for (index, generator) in &self.registrations {
            generator.update_force(particles, *index, dt);
        }
    }
}

/// Rigid-body analogue of [`ParticleForceRegistry`].
#[derive(Clone, Debug, Default)]
pub struct BodyForceRegistry {
    registrations: Vec<(usize, BodyForce)>,
}

impl BodyForceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `generator` against the body at `target_index`.
    pub fn add(&mut self, target_index: usize, generator: BodyForce) {
        self.registrations.push((target_index, generator));
    }

    /// Removes all registrations for `target_index`.
    pub fn remove(&mut self, target_index: usize) {
        self.registrations.retain(|(idx, _)| *idx != target_index);
    }

    /// Removes every registration.
    pub fn clear(&mut self) {
        self.registrations.clear();
    }

    /// Dispatches `update_force(target, dt)` for every registration, in
    /// insertion order.
    #[instrument(level = "trace", skip_all)]
    pub fn update_forces(&self, bodies: &mut [RigidBody], dt: Real) {
        for (index, generator) in &self.registrations {
            generator.update_force(bodies, *index, dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gravity_skips_immovable_particle() {
        let mut particles = vec![Particle::immovable()];
        let gravity = ParticleForce::Gravity {
            gravity: DVec3::new(0.0, -10.0, 0.0),
        };
        gravity.update_force(&mut particles, 0, 0.1);
        assert_eq!(particles[0].force_accumulator(), DVec3::ZERO);
    }

    #[test]
    fn gravity_scales_with_mass() {
        let mut particles = vec![Particle::new(2.0).unwrap()];
        let gravity = ParticleForce::Gravity {
            gravity: DVec3::new(0.0, -10.0, 0.0),
        };
        gravity.update_force(&mut particles, 0, 0.1);
        assert_relative_eq!(particles[0].force_accumulator().y, -20.0);
    }

    #[test]
    fn bungee_is_zero_when_compressed() {
        let mut particles = vec![
            Particle {
                position: DVec3::new(0.0, 0.0, 0.0),
                ..Particle::new(1.0).unwrap()
            },
            Particle {
                position: DVec3::new(0.5, 0.0, 0.0),
                ..Particle::new(1.0).unwrap()
            },
        ];
        let bungee = ParticleForce::Bungee {
            other: 1,
            spring_constant: 10.0,
            rest_length: 1.0,
        };
        bungee.update_force(&mut particles, 0, 0.1);
        assert_eq!(particles[0].force_accumulator(), DVec3::ZERO);
    }

    #[test]
    fn buoyancy_zero_above_surface() {
        let mut particles = vec![Particle {
            position: DVec3::new(0.0, 10.0, 0.0),
            ..Particle::new(1.0).unwrap()
        }];
        let buoyancy = ParticleForce::Buoyancy {
            max_depth: 1.0,
            volume: 1.0,
            water_height: 0.0,
            liquid_density: 1000.0,
        };
        buoyancy.update_force(&mut particles, 0, 0.1);
        assert_eq!(particles[0].force_accumulator(), DVec3::ZERO);
    }

    #[test]
    fn buoyancy_full_force_when_fully_submerged() {
        let mut particles = vec![Particle {
            position: DVec3::new(0.0, -5.0, 0.0),
            ..Particle::new(1.0).unwrap()
        }];
        let buoyancy = ParticleForce::Buoyancy {
            max_depth: 1.0,
            volume: 2.0,
            water_height: 0.0,
            liquid_density: 1000.0,
        };
        buoyancy.update_force(&mut particles, 0, 0.1);
        assert_relative_eq!(particles[0].force_accumulator().y, 1000.0 * 2.0);
    }

    #[test]
    fn stiff_spring_degenerate_gate_applies_no_force() {
        let mut particles = vec![Particle {
            position: DVec3::new(1.0, 0.0, 0.0),
            ..Particle::new(1.0).unwrap()
        }];
        // 4k - c^2 <= 0
        let stiff = ParticleForce::StiffSpring {
            anchor: DVec3::ZERO,
            spring_constant: 1.0,
            damping: 10.0,
        };
        stiff.update_force(&mut particles, 0, 0.01);
        assert_eq!(particles[0].force_accumulator(), DVec3::ZERO);
    }

    #[test]
    fn stiff_spring_non_degenerate_force_matches_closed_form() {
        let spring_constant = 5.0;
        let damping = 2.0;
        let anchor = DVec3::ZERO;
        let start_position = DVec3::new(1.0, 0.0, 0.0);
        let dt = 0.1;

        let mut particles = vec![Particle {
            position: start_position,
            ..Particle::new(1.0).unwrap()
        }];
        let stiff = ParticleForce::StiffSpring {
            anchor,
            spring_constant,
            damping,
        };
        stiff.update_force(&mut particles, 0, dt);

        // Mirrors the damped-harmonic-oscillator closed form directly: this
        // characterises the approximation's actual output rather than an
        // idealized re-derivation from first principles.
        let gamma = 0.5 * (4.0 * spring_constant - damping * damping).sqrt();
        let position = start_position - anchor;
        let c = position * (damping / (2.0 * gamma));
        let mut target = position * (gamma * dt).cos() + c * (gamma * dt).sin();
        target *= (-0.5 * damping * dt).exp();
        let expected_force = (target - position) * (1.0 / (dt * dt));

        let force = particles[0].force_accumulator();
        assert_relative_eq!(force.x, expected_force.x, epsilon = 1e-9);
        assert_relative_eq!(force.y, expected_force.y, epsilon = 1e-9);
        assert_relative_eq!(force.z, expected_force.z, epsilon = 1e-9);
        assert!(force.x < 0.0, "stiff spring should pull back toward the anchor");
    }

    #[test]
    fn stiff_spring_blows_up_for_moving_particle_as_dt_shrinks() {
        // Pins the documented dimensional oddity (distilled spec §9): the
        // accel term subtracts `velocity * dt` where a dimensionally
        // consistent derivation would subtract `velocity / dt` to cancel the
        // `velocity / dt` term hiding inside `(target - position) / dt^2`.
        // Since it doesn't cancel, a moving particle's force diverges as dt
        // shrinks, while a stationary particle's stays bounded.
        let spring_constant = 5.0;
        let damping = 2.0;
        let anchor = DVec3::ZERO;
        let position = DVec3::new(1.0, 0.0, 0.0);
        let velocity = DVec3::new(3.0, 0.0, 0.0);
        let stiff = ParticleForce::StiffSpring {
            anchor,
            spring_constant,
            damping,
        };

        let mut still_coarse = vec![Particle {
            position,
            ..Particle::new(1.0).unwrap()
        }];
        let mut still_fine = vec![Particle {
            position,
            ..Particle::new(1.0).unwrap()
        }];
        let mut moving_coarse = vec![Particle {
            position,
            velocity,
            ..Particle::new(1.0).unwrap()
        }];
        let mut moving_fine = vec![Particle {
            position,
            velocity,
            ..Particle::new(1.0).unwrap()
        }];

        stiff.update_force(&mut still_coarse, 0, 0.1);
        stiff.update_force(&mut still_fine, 0, 0.001);
        stiff.update_force(&mut moving_coarse, 0, 0.1);
        stiff.update_force(&mut moving_fine, 0, 0.001);

        let still_growth = still_fine[0].force_accumulator().length() / still_coarse[0].force_accumulator().length();
        let moving_growth = moving_fine[0].force_accumulator().length() / moving_coarse[0].force_accumulator().length();
        assert!(
            moving_growth > 10.0 * still_growth,
            "a moving particle's force should blow up much faster than a stationary one's as dt shrinks"
        );
    }

    #[test]
    fn registry_dispatches_in_insertion_order() {
        let mut particles = vec![Particle::new(1.0).unwrap()];
        let mut registry = ParticleForceRegistry::new();
        registry.add(
            0,
            ParticleForce::Gravity {
                gravity: DVec3::new(0.0, -1.0, 0.0),
            },
        );
        registry.add(
            0,
            ParticleForce::Gravity {
                gravity: DVec3::new(0.0, -1.0, 0.0),
            },
        );
        registry.update_forces(&mut particles, 0.1);
        assert_relative_eq!(particles[0].force_accumulator().y, -2.0);
        registry.clear();
        particles[0].clear_accumulator();
        registry.update_forces(&mut particles, 0.1);
        assert_eq!(particles[0].force_accumulator(), DVec3::ZERO);
    }
}
