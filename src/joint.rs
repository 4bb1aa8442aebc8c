//! Ball joints (distilled spec §4.6): a soft positional constraint that
//! keeps two points, each fixed in a body's local frame, within `error` of
//! each other by emitting a corrective contact when they drift apart.

use glam::DVec3;

use crate::body::RigidBody;
use crate::contact::Contact;
use crate::Real;

/// Connects a point on one body to a point on another (or to a fixed
/// anchor, when `body_b` is `None`), tolerating up to `error` of drift
/// before emitting a corrective contact.
#[derive(Clone, Copy, Debug)]
pub struct Joint {
    /// First body.
    pub body_a: usize,
    /// Connection point, in `body_a`'s local space.
    pub connection_point_a: DVec3,
    /// Second body, or `None` to anchor to a fixed world-space point.
    pub body_b: Option<usize>,
    /// Connection point, in `body_b`'s local space, or a world-space anchor
    /// if `body_b` is `None`.
    pub connection_point_b: DVec3,
    /// Maximum allowed separation between the two connection points before
    /// the joint resists further drift.
    pub error: Real,
}

impl Joint {
    /// Creates a joint between two bodies' local connection points.
    pub fn new(body_a: usize, connection_point_a: DVec3, body_b: usize, connection_point_b: DVec3, error: Real) -> Self {
        Self {
            body_a,
            connection_point_a,
            body_b: Some(body_b),
            connection_point_b,
            error,
        }
    }

    /// Creates a joint anchoring `body_a` to a fixed world-space point.
    pub fn new_anchored(body_a: usize, connection_point_a: DVec3, anchor: DVec3, error: Real) -> Self {
        Self {
            body_a,
            connection_point_a,
            body_b: None,
            connection_point_b: anchor,
            error,
        }
    }

    /// World-space positions of the two connection points.
    fn world_points(&self, bodies: &[RigidBody]) -> (DVec3, DVec3) {
        let a_pos = bodies[self.body_a].point_in_world_space(self.connection_point_a);
        let b_pos = self
            .body_b
            .map(|idx| bodies[idx].point_in_world_space(self.connection_point_b))
            .unwrap_or(self.connection_point_b);
        (a_pos, b_pos)
    }

    /// Emits a corrective [`Contact`] into `contacts` if the connection
    /// points have drifted apart by more than `error`. Returns the number of
    /// contacts written (0 or 1).
    pub fn add_contact(&self, bodies: &[RigidBody], contacts: &mut Vec<Contact>) -> usize {
        let (a_pos, b_pos) = self.world_points(bodies);
        let delta = b_pos - a_pos;
        let length = delta.length();

        if length <= self.error {
            return 0;
        }

        let normal = delta / length;
        let midpoint = a_pos + delta * 0.5;

        contacts.push(Contact::new(
            Some(self.body_a),
            self.body_b,
            midpoint,
            normal,
            length - self.error,
            1.0,
            0.0,
        ));
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DMat3;

    fn body_at(position: DVec3) -> RigidBody {
        let mut body = RigidBody::new(1.0, DMat3::IDENTITY).unwrap();
        body.position = position;
        body.calculate_derived_data();
        body
    }

    #[test]
    fn joint_within_tolerance_emits_nothing() {
        let bodies = vec![body_at(DVec3::ZERO), body_at(DVec3::new(0.05, 0.0, 0.0))];
        let joint = Joint::new(0, DVec3::ZERO, 1, DVec3::ZERO, 0.1);
        let mut contacts = vec![];
        assert_eq!(joint.add_contact(&bodies, &mut contacts), 0);
    }

    #[test]
    fn joint_past_tolerance_emits_one_contact() {
        let bodies = vec![body_at(DVec3::ZERO), body_at(DVec3::new(1.0, 0.0, 0.0))];
        let joint = Joint::new(0, DVec3::ZERO, 1, DVec3::ZERO, 0.1);
        let mut contacts = vec![];
        assert_eq!(joint.add_contact(&bodies, &mut contacts), 1);
        assert!((contacts[0].penetration - 0.9).abs() < 1e-9);
    }

    #[test]
    fn anchored_joint_resists_drift_from_fixed_point() {
        let bodies = vec![body_at(DVec3::new(2.0, 0.0, 0.0))];
        let joint = Joint::new_anchored(0, DVec3::ZERO, DVec3::ZERO, 0.5);
        let mut contacts = vec![];
        assert_eq!(joint.add_contact(&bodies, &mut contacts), 1);
        assert!((contacts[0].penetration - 1.5).abs() < 1e-9);
    }
}
