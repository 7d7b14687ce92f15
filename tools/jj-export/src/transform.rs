//! Object-to-world transform of positions and normals
//!
//! Normals go through the adjugate-transpose of the linear part rather than
//! the inverse-transpose. It needs no division, stays defined for singular
//! matrices, and keeps `adjT(M) * (a x b) == (M a) x (M b)`, so a transformed
//! normal always agrees with the transformed triangle winding.

use glam::{Mat3, Mat4, Vec3, Vec4};

/// Fallback direction for normals that cannot be repaired
pub const UP: Vec3 = Vec3::Y;

/// Largest accepted deviation of an authored normal's length from 1
pub const NORMAL_LENGTH_TOLERANCE: f32 = 1e-3;

/// Adjugate-transpose (cofactor matrix) of a 3x3 matrix
pub fn adjugate_transpose(m: &Mat3) -> Mat3 {
    Mat3::from_cols(
        m.y_axis.cross(m.z_axis),
        m.z_axis.cross(m.x_axis),
        m.x_axis.cross(m.y_axis),
    )
}

/// Adjugate-transpose (cofactor matrix) of a 4x4 matrix
///
/// Entry (r, c) is the signed determinant of the 3x3 minor left after
/// removing row r and column c.
pub fn adjugate_transpose4(m: &Mat4) -> Mat4 {
    let rows = m.transpose().to_cols_array_2d();
    let mut cofactors = [[0.0f32; 4]; 4];

    for (r, cofactor_row) in cofactors.iter_mut().enumerate() {
        for (c, cofactor) in cofactor_row.iter_mut().enumerate() {
            let mut minor = [[0.0f32; 3]; 3];
            for (mr, row) in (0..4).filter(|&i| i != r).enumerate() {
                for (mc, col) in (0..4).filter(|&j| j != c).enumerate() {
                    minor[mr][mc] = rows[row][col];
                }
            }
            // from_cols_array_2d reads columns; the minor's determinant is the
            // same for it and its transpose.
            let det = Mat3::from_cols_array_2d(&minor).determinant();
            let sign = if (r + c) % 2 == 0 { 1.0 } else { -1.0 };
            *cofactor = sign * det;
        }
    }

    Mat4::from_cols(
        Vec4::new(cofactors[0][0], cofactors[1][0], cofactors[2][0], cofactors[3][0]),
        Vec4::new(cofactors[0][1], cofactors[1][1], cofactors[2][1], cofactors[3][1]),
        Vec4::new(cofactors[0][2], cofactors[1][2], cofactors[2][2], cofactors[3][2]),
        Vec4::new(cofactors[0][3], cofactors[1][3], cofactors[2][3], cofactors[3][3]),
    )
}

/// True when an authored normal is not a usable unit vector
pub fn is_degenerate_normal(normal: Vec3) -> bool {
    !normal.is_finite() || (normal.length() - 1.0).abs() > NORMAL_LENGTH_TOLERANCE
}

/// Precomputed object-to-world transform
#[derive(Debug, Clone, Copy)]
pub struct ObjectTransform {
    world: Mat4,
    normal_matrix: Mat3,
}

impl ObjectTransform {
    pub fn new(world: Mat4) -> Self {
        Self {
            world,
            normal_matrix: adjugate_transpose(&Mat3::from_mat4(world)),
        }
    }

    pub fn position(&self, position: Vec3) -> Vec3 {
        self.world.transform_point3(position)
    }

    /// Transform a normal; degenerate input is replaced with [`UP`] first.
    ///
    /// Returns the world normal and whether the input needed repair.
    pub fn normal(&self, normal: Vec3) -> (Vec3, bool) {
        let repaired = is_degenerate_normal(normal);
        let source = if repaired { UP } else { normal };

        let world = (self.normal_matrix * source)
            .try_normalize()
            .or_else(|| (self.normal_matrix * UP).try_normalize())
            .unwrap_or(UP);
        (world, repaired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn assert_vec3_near(a: Vec3, b: Vec3) {
        assert!(a.abs_diff_eq(b, 1e-5), "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_adjugate_of_diagonal() {
        let m = Mat3::from_diagonal(Vec3::new(2.0, 3.0, 4.0));
        let adj = adjugate_transpose(&m);
        assert_eq!(adj, Mat3::from_diagonal(Vec3::new(12.0, 8.0, 6.0)));
    }

    #[test]
    fn test_adjugate_matches_scaled_inverse_transpose() {
        let m = Mat3::from_cols(
            Vec3::new(1.0, 2.0, 0.5),
            Vec3::new(-1.0, 0.5, 2.0),
            Vec3::new(0.3, -2.0, 1.0),
        );
        let expected = m.inverse().transpose() * m.determinant();
        assert!(adjugate_transpose(&m).abs_diff_eq(expected, 1e-4));
    }

    #[test]
    fn test_adjugate4_matches_scaled_inverse_transpose() {
        let m = Mat4::from_scale_rotation_translation(
            Vec3::new(1.0, 2.0, 0.5),
            Quat::from_rotation_y(0.7),
            Vec3::new(3.0, -1.0, 2.0),
        );
        let expected = m.inverse().transpose() * m.determinant();
        assert!(adjugate_transpose4(&m).abs_diff_eq(expected, 1e-4));
    }

    #[test]
    fn test_adjugate4_of_singular_matrix() {
        let m = Mat4::from_scale(Vec3::new(1.0, 1.0, 0.0));
        let adj = adjugate_transpose4(&m);
        assert!(adj.is_finite());
        assert_eq!(adj.z_axis.z, 1.0);
    }

    #[test]
    fn test_non_uniform_scale_normal() {
        // Plane x + y = 0 stretched along x
        let transform = ObjectTransform::new(Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0)));
        let (normal, repaired) = transform.normal(Vec3::new(1.0, 1.0, 0.0).normalize());
        assert!(!repaired);
        assert_vec3_near(normal, Vec3::new(1.0, 2.0, 0.0).normalize());
    }

    #[test]
    fn test_normal_follows_winding() {
        let world = Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0));
        let transform = ObjectTransform::new(world);

        let (a, b, c) = (Vec3::ZERO, Vec3::X, Vec3::Y);
        let face = (b - a).cross(c - a);
        let moved = (transform.position(b) - transform.position(a))
            .cross(transform.position(c) - transform.position(a));

        let (normal, _) = transform.normal(face.normalize());
        assert_vec3_near(normal, moved.normalize());
    }

    #[test]
    fn test_degenerate_normal_repaired() {
        let transform = ObjectTransform::new(Mat4::IDENTITY);

        let (zero, repaired) = transform.normal(Vec3::ZERO);
        assert!(repaired);
        assert_eq!(zero, UP);

        let (nan, repaired) = transform.normal(Vec3::new(f32::NAN, 0.0, 0.0));
        assert!(repaired);
        assert_eq!(nan, UP);

        let (long, repaired) = transform.normal(Vec3::new(0.0, 0.0, 1.01));
        assert!(repaired);
        assert_eq!(long, UP);
    }

    #[test]
    fn test_collapsed_axis_falls_back() {
        // adjT = diag(0, 2, 0): X vanishes, the transformed up direction does not
        let transform = ObjectTransform::new(Mat4::from_scale(Vec3::new(2.0, 0.0, 1.0)));
        let (normal, repaired) = transform.normal(Vec3::X);
        assert!(!repaired);
        assert!(normal.is_normalized());
        assert_vec3_near(normal, Vec3::Y);

        let (normal, _) = transform.normal(Vec3::Z);
        assert_vec3_near(normal, Vec3::Y);
    }

    #[test]
    fn test_fully_singular_matrix_falls_back_to_up() {
        let transform = ObjectTransform::new(Mat4::ZERO);
        let (normal, _) = transform.normal(Vec3::X);
        assert_eq!(normal, UP);
    }

    #[test]
    fn test_position_includes_translation() {
        let transform = ObjectTransform::new(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(transform.position(Vec3::ONE), Vec3::new(2.0, 3.0, 4.0));
    }
}
