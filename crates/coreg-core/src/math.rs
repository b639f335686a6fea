//! Mathematical utilities and type definitions.
//!
//! This module provides the fundamental types used throughout the workspace
//! and helpers for moving between 3D points and 4x4 homogeneous matrices.

use nalgebra::{Matrix3, Matrix4, Point3, Vector3, Vector4};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 4D (homogeneous) vector with [`Real`] components.
pub type Vec4 = Vector4<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 4×4 matrix with [`Real`] entries.
pub type Mat4 = Matrix4<Real>;

/// Row-major nested array form of a 4×4 matrix, as stored on disk.
pub type Mat4Rows = [[Real; 4]; 4];

/// Convert a 3D point into homogeneous coordinates `(x, y, z, 1)`.
pub fn to_homogeneous(p: &Pt3) -> Vec4 {
    Vec4::new(p.x, p.y, p.z, 1.0)
}

/// Convert a homogeneous 4-vector back to a 3D point.
///
/// The input is interpreted as `(x, y, z, w)` and the result is
/// `(x / w, y / w, z / w)`. The caller is responsible for ensuring `w != 0`.
pub fn from_homogeneous(v: &Vec4) -> Pt3 {
    Pt3::new(v.x / v.w, v.y / v.w, v.z / v.w)
}

/// Homogeneous translation matrix `[I t; 0 1]`.
pub fn translation_matrix(t: &Vec3) -> Mat4 {
    let mut m = Mat4::identity();
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(t);
    m
}

/// Build `[A t; 0 1]` from a linear block and a translation.
pub fn compose_affine(linear: &Mat3, translation: &Vec3) -> Mat4 {
    let mut m = Mat4::identity();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(linear);
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
    m
}

/// Upper-left 3×3 (linear) block of a homogeneous matrix.
pub fn linear_block(m: &Mat4) -> Mat3 {
    m.fixed_view::<3, 3>(0, 0).into_owned()
}

/// Translation column of a homogeneous matrix.
pub fn translation_part(m: &Mat4) -> Vec3 {
    m.fixed_view::<3, 1>(0, 3).into_owned()
}

/// Check that the bottom row equals `[0, 0, 0, 1]` within `tol`.
pub fn is_homogeneous_affine(m: &Mat4, tol: Real) -> bool {
    m[(3, 0)].abs() <= tol
        && m[(3, 1)].abs() <= tol
        && m[(3, 2)].abs() <= tol
        && (m[(3, 3)] - 1.0).abs() <= tol
}

/// Apply a homogeneous affine matrix to a point.
pub fn transform_point(m: &Mat4, p: &Pt3) -> Pt3 {
    from_homogeneous(&(m * to_homogeneous(p)))
}

/// Convert a matrix into row-major nested arrays.
pub fn mat4_to_rows(m: &Mat4) -> Mat4Rows {
    let mut rows = [[0.0; 4]; 4];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, value) in row.iter_mut().enumerate() {
            *value = m[(r, c)];
        }
    }
    rows
}

/// Build a matrix from row-major nested arrays.
pub fn mat4_from_rows(rows: &Mat4Rows) -> Mat4 {
    Mat4::from_fn(|r, c| rows[r][c])
}

/// Centroid of a non-empty point list.
pub fn centroid(points: &[Pt3]) -> Vec3 {
    let n = points.len() as Real;
    let sum: Vec3 = points.iter().map(|p| p.coords).sum();
    sum / n
}
