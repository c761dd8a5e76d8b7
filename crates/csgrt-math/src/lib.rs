#![warn(missing_docs)]

//! Math types for the csgrt geometry kernel.
//!
//! Points, vectors and directions are nalgebra aliases. [`Transform`] is a
//! homogeneous 4x4 placement matrix, as stored on combination members, and
//! [`Tolerance`] carries the distance and angle epsilons every intersection
//! routine compares against.

use nalgebra::{Matrix3, Matrix4, Unit, Vector3};

/// Point in model space, in millimeters.
pub type Point3 = nalgebra::Point3<f64>;

/// Free vector.
pub type Vec3 = Vector3<f64>;

/// Unit-length direction.
pub type Dir3 = Unit<Vector3<f64>>;

/// Affine placement matrix. The bottom row is always `0 0 0 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Homogeneous matrix, column vectors on the right.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// No-op placement.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Matrix from 16 values in row-major order, as records store them.
    pub fn from_row_slice(values: &[f64; 16]) -> Self {
        Self {
            matrix: Matrix4::from_row_slice(values),
        }
    }

    /// Inverse of [`Transform::from_row_slice`].
    pub fn to_row_array(&self) -> [f64; 16] {
        std::array::from_fn(|i| self.matrix[(i / 4, i % 4)])
    }

    /// Move by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            matrix: Matrix4::new_translation(&Vec3::new(dx, dy, dz)),
        }
    }

    /// Scale each axis about the origin.
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            matrix: Matrix4::new_nonuniform_scaling(&Vec3::new(sx, sy, sz)),
        }
    }

    /// Rotate `angle` radians about `axis` through the origin.
    pub fn rotation(axis: &Dir3, angle: f64) -> Self {
        Self {
            matrix: Matrix4::from_axis_angle(axis, angle),
        }
    }

    /// Reflect through the plane containing `point` with unit normal `normal`.
    pub fn mirror(point: &Point3, normal: &Dir3) -> Self {
        let n = normal.into_inner();
        let householder = Matrix3::identity() - 2.0 * n * n.transpose();
        let shift = 2.0 * n.dot(&point.coords) * n;
        let mut matrix = householder.to_homogeneous();
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&shift);
        Self { matrix }
    }

    /// Composition `self * other`: the result applies `other` first.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Map a point, translation included.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        self.matrix.transform_point(p)
    }

    /// Map a free vector; translation does not apply.
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        self.matrix.transform_vector(v)
    }

    /// Map a surface normal with the inverse transpose of the linear part.
    /// The result is not renormalized. A singular matrix leaves `n` as is.
    pub fn apply_normal(&self, n: &Vec3) -> Vec3 {
        match self.linear_part().try_inverse() {
            Some(inv) => inv.transpose() * n,
            None => *n,
        }
    }

    /// `None` for a singular matrix.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

    /// Every entry within `tol` of the identity.
    pub fn is_identity(&self, tol: f64) -> bool {
        self.matrix
            .iter()
            .zip(Matrix4::<f64>::identity().iter())
            .all(|(a, b)| (a - b).abs() <= tol)
    }

    /// Rotation, scale and shear block.
    pub fn linear_part(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// The scale factor when the linear part is a similarity (rotation or
    /// reflection times a uniform scale).
    ///
    /// `MᵀM` of a similarity is `s²I`; any entry further than `tol`
    /// (relative to `s²`) from that means the transform distorts shape.
    pub fn uniform_scale(&self, tol: f64) -> Option<f64> {
        let m = self.linear_part();
        let gram = m.transpose() * m;
        let s2 = gram.trace() / 3.0;
        if s2 <= tol * tol {
            return None;
        }
        let off = gram - Matrix3::from_diagonal_element(s2);
        off.iter()
            .all(|v| v.abs() <= tol * s2.max(1.0))
            .then(|| s2.sqrt())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Distance and angle epsilons.
///
/// `dist` is in millimeters: ray parameters or points closer than this are
/// the same. `perp` is the largest cosine still counted as perpendicular;
/// `para = 1 - perp` is the smallest cosine counted as parallel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Distance epsilon.
    pub dist: f64,
    /// `dist * dist`.
    pub dist_sq: f64,
    /// Perpendicularity cosine.
    pub perp: f64,
    /// Parallelism cosine.
    pub para: f64,
}

impl Tolerance {
    /// 0.005 mm and 1e-6.
    pub const DEFAULT: Self = Self {
        dist: 0.005,
        dist_sq: 0.005 * 0.005,
        perp: 1e-6,
        para: 1.0 - 1e-6,
    };

    /// Derive `dist_sq` and `para` from the two primary values.
    pub fn new(dist: f64, perp: f64) -> Self {
        Self {
            dist,
            dist_sq: dist * dist,
            perp,
            para: 1.0 - perp,
        }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_translate_moves_points_not_vectors() {
        let t = Transform::translation(10.0, -4.0, 0.5);
        assert_relative_eq!(t.apply_point(&Point3::new(1.0, 1.0, 1.0)), Point3::new(11.0, -3.0, 1.5));
        assert_relative_eq!(t.apply_vec(&Vec3::y()), Vec3::y());
        assert!(!t.is_identity(1e-9));
        assert!(Transform::default().is_identity(0.0));
    }

    #[test]
    fn test_then_applies_argument_first() {
        let grow = Transform::scale(3.0, 3.0, 3.0);
        let shift = Transform::translation(0.0, 1.0, 0.0);
        let p = grow.then(&shift).apply_point(&Point3::origin());
        assert_relative_eq!(p, Point3::new(0.0, 3.0, 0.0));
        let q = shift.then(&grow).apply_point(&Point3::origin());
        assert_relative_eq!(q, Point3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_rotation_quarter_turn() {
        let t = Transform::rotation(&Vec3::x_axis(), FRAC_PI_2);
        assert_relative_eq!(t.apply_vec(&Vec3::y()), Vec3::z(), epsilon = 1e-12);
        let back = t.inverse().unwrap();
        assert!(t.then(&back).is_identity(1e-12));
    }

    #[test]
    fn test_mirror_offset_plane() {
        let m = Transform::mirror(&Point3::new(0.0, 0.0, -1.5), &Vec3::z_axis());
        assert_relative_eq!(
            m.apply_point(&Point3::new(2.0, 7.0, 0.5)),
            Point3::new(2.0, 7.0, -3.5),
            epsilon = 1e-12
        );
        assert_relative_eq!(m.apply_normal(&Vec3::z()), -Vec3::z(), epsilon = 1e-12);
        assert!(m.then(&m).is_identity(1e-12));
        assert_relative_eq!(m.linear_part().determinant(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_normals_under_stretch() {
        // A 45 degree plane stays perpendicular to its surface after stretching x.
        let t = Transform::scale(2.0, 1.0, 1.0);
        let n = t.apply_normal(&Vec3::new(1.0, 1.0, 0.0));
        let along_surface = t.apply_vec(&Vec3::new(1.0, -1.0, 0.0));
        assert_relative_eq!(n.dot(&along_surface), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_uniform_scale() {
        let similar = Transform::rotation(&Vec3::z_axis(), 0.7).then(&Transform::scale(2.5, 2.5, 2.5));
        assert_relative_eq!(similar.uniform_scale(1e-9).unwrap(), 2.5, epsilon = 1e-9);
        let flipped = Transform::mirror(&Point3::origin(), &Vec3::y_axis());
        assert_relative_eq!(flipped.uniform_scale(1e-9).unwrap(), 1.0, epsilon = 1e-12);
        assert!(Transform::scale(1.0, 1.0, 4.0).uniform_scale(1e-9).is_none());
        assert!(Transform::scale(0.0, 0.0, 0.0).uniform_scale(1e-9).is_none());
    }

    #[test]
    fn test_row_major_layout() {
        let t = Transform::translation(4.0, 5.0, 6.0);
        let rows = t.to_row_array();
        assert_eq!((rows[3], rows[7], rows[11], rows[15]), (4.0, 5.0, 6.0, 1.0));
        assert_eq!(Transform::from_row_slice(&rows), t);
    }

    #[test]
    fn test_tolerance_derived_fields() {
        let tol = Tolerance::new(0.01, 1e-5);
        assert_relative_eq!(tol.dist_sq, 1e-4, epsilon = 1e-15);
        assert_relative_eq!(tol.para, 0.99999, epsilon = 1e-12);
        assert_eq!(Tolerance::default(), Tolerance::DEFAULT);
    }
}
