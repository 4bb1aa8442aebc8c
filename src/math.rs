//! The handful of linear-algebra helpers `glam` doesn't already provide.
//!
//! Vectors, matrices and quaternions themselves are `glam::DVec3`,
//! `glam::DMat3`, `glam::DMat4` and `glam::DQuat` — there is no point
//! reimplementing what the ecosystem already gets right. This module only
//! adds the two constructions the contact resolver needs repeatedly: a
//! skew-symmetric cross-product matrix, and an orthonormal basis built from
//! a single normal vector.

use glam::{DMat3, DVec3};

/// Builds the skew-symmetric matrix `[v]_x` such that `[v]_x * w == v.cross(w)`
/// for any vector `w`.
pub fn skew_symmetric(v: DVec3) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(0.0, v.z, -v.y),
        DVec3::new(-v.z, 0.0, v.x),
        DVec3::new(v.y, -v.x, 0.0),
    )
}

/// Builds a right-handed orthonormal basis with `normal` as its first
/// column, following the construction in Erin Catto's / Ian Millington's
/// contact resolvers: branch on whichever of the `x`/`y` axes has the
/// smaller normal component to avoid near-degenerate cross products.
///
/// Returns `(normal, tangent1, tangent2)`, each unit length, with
/// `tangent2 == normal.cross(tangent1)`.
pub fn orthonormal_basis(normal: DVec3) -> (DVec3, DVec3, DVec3) {
    let tangent1 = if normal.x.abs() > normal.y.abs() {
        let scale = 1.0 / (normal.x * normal.x + normal.z * normal.z).sqrt();
        DVec3::new(normal.z * scale, 0.0, -normal.x * scale)
    } else {
        let scale = 1.0 / (normal.y * normal.y + normal.z * normal.z).sqrt();
        DVec3::new(0.0, -normal.z * scale, normal.y * scale)
    };
    let tangent2 = normal.cross(tangent1);
    (normal, tangent1, tangent2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn skew_symmetric_matches_cross_product() {
        let v = DVec3::new(1.0, 2.0, 3.0);
        let w = DVec3::new(-2.0, 0.5, 4.0);
        let viaskew = skew_symmetric(v) * w;
        let viacross = v.cross(w);
        assert_relative_eq!(viaskew.x, viacross.x, epsilon = 1e-12);
        assert_relative_eq!(viaskew.y, viacross.y, epsilon = 1e-12);
        assert_relative_eq!(viaskew.z, viacross.z, epsilon = 1e-12);
    }

    #[test]
    fn orthonormal_basis_is_right_handed() {
        for normal in [
            DVec3::X,
            DVec3::Y,
            DVec3::Z,
            DVec3::new(1.0, 1.0, 1.0).normalize(),
            DVec3::new(0.3, -0.8, 0.1).normalize(),
        ] {
            let (n, t1, t2) = orthonormal_basis(normal);
            assert_relative_eq!(t1.length(), 1.0, epsilon = 1e-9);
            assert_relative_eq!(t2.length(), 1.0, epsilon = 1e-9);
            assert_relative_eq!(t1.dot(n), 0.0, epsilon = 1e-9);
            assert_relative_eq!(t2.dot(n), 0.0, epsilon = 1e-9);
            let cross = n.cross(t1);
            assert_relative_eq!(cross.x, t2.x, epsilon = 1e-9);
            assert_relative_eq!(cross.y, t2.y, epsilon = 1e-9);
            assert_relative_eq!(cross.z, t2.z, epsilon = 1e-9);
        }
    }
}
