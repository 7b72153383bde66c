//! Local transforms for spatial nodes.
//!
//! A [`Transform3D`] is expressed in the space of the parent node. Global
//! transforms are obtained by multiplying the chain of ancestors, see
//! [`SceneTree::global_transform`](crate::data_structures::scene_graph::SceneTree::global_transform).

use std::ops::Mul;

use cgmath::{ElementWise, InnerSpace, Matrix4, Vector4};

use crate::data_structures::{
    basis::Basis,
    vector::{self, Vec3},
};

/// Orientation, position and scale of a node relative to its parent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3D {
    pub basis: Basis,
    pub position: Vec3,
    pub scale: Vec3,
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform3D {
    pub const IDENTITY: Transform3D = Transform3D {
        basis: Basis::IDENTITY,
        position: vector::ZERO,
        scale: vector::ONE,
    };

    /// Create a new transform with identity rotation and scale.
    pub fn new() -> Self {
        Self::IDENTITY
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn with_basis(mut self, basis: Basis) -> Self {
        self.basis = basis;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Composes `other` into this frame.
    ///
    /// The position of `other` is rotated by this basis but not scaled by this
    /// transform's scale; scales multiply component-wise.
    pub fn multiply(&self, other: &Transform3D) -> Transform3D {
        Transform3D {
            basis: self.basis.multiply(&other.basis),
            position: self.position + self.basis.apply(other.position),
            scale: self.scale.mul_element_wise(other.scale),
        }
    }

    /// The transform that undoes the rotation and translation of this one.
    ///
    /// Scale is not inverted: the result always has unit scale, so the round
    /// trip is only exact for uniformly scaled transforms.
    pub fn inverse(&self) -> Transform3D {
        let basis = self.basis.inverse();
        Transform3D {
            basis,
            position: basis.apply(-self.position),
            scale: vector::ONE,
        }
    }

    /// Scale, then rotate, then translate `point`.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.basis.apply(point.mul_element_wise(self.scale)) + self.position
    }

    /// Orients the basis towards `target`, a point in the same space as `position`.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        self.basis.look_at(target - self.position, up);
    }

    /// Column-major matrix with the scale folded into the basis columns.
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let basis = self.basis.scaled(self.scale);
        Matrix4::from_cols(
            basis.x.extend(0.0),
            basis.y.extend(0.0),
            basis.z.extend(0.0),
            self.position.extend(1.0),
        )
    }

    /// Decomposes an affine matrix. Shear is lost.
    pub fn from_matrix(matrix: &Matrix4<f64>) -> Transform3D {
        let x = matrix.x.truncate();
        let y = matrix.y.truncate();
        let z = matrix.z.truncate();
        let scale = Vec3::new(x.magnitude(), y.magnitude(), z.magnitude());
        let axis = |v: Vec3, s: f64| if s == 0.0 { v } else { v / s };
        Transform3D {
            basis: Basis::new(axis(x, scale.x), axis(y, scale.y), axis(z, scale.z)),
            position: matrix.w.truncate(),
            scale,
        }
    }
}

impl Mul<Transform3D> for Transform3D {
    type Output = Self;

    fn mul(self, rhs: Transform3D) -> Self::Output {
        self.multiply(&rhs)
    }
}

impl<'a, 'b> Mul<&'b Transform3D> for &'a Transform3D {
    type Output = Transform3D;

    fn mul(self, rhs: &'b Transform3D) -> Self::Output {
        self.multiply(rhs)
    }
}

/// Matrix product followed by the perspective divide.
///
/// Returns the divided point together with the clip-space `w`.
pub fn project_point(matrix: &Matrix4<f64>, point: Vec3) -> (Vec3, f64) {
    let clip: Vector4<f64> = *matrix * point.extend(1.0);
    if clip.w == 0.0 {
        return (clip.truncate(), 0.0);
    }
    (clip.truncate() / clip.w, clip.w)
}

/// Narrows a matrix to the column-major `f32` layout WGSL expects.
pub fn to_gpu(matrix: &Matrix4<f64>) -> [[f32; 4]; 4] {
    let m: [[f64; 4]; 4] = (*matrix).into();
    m.map(|column| column.map(|v| v as f32))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-9);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-9);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-9);
    }

    fn sample() -> Transform3D {
        Transform3D::from_position(Vec3::new(4.0, -2.0, 7.0))
            .with_basis(Basis::IDENTITY.rotated(Vec3::new(0.2, 1.0, 0.5), 1.1))
            .with_scale(Vec3::new(2.0, 2.0, 2.0))
    }

    #[test]
    fn multiply_with_inverse_returns_to_origin() {
        let t = sample();
        let round_trip = t.multiply(&t.inverse());
        assert_vec_eq(round_trip.transform_point(vector::ZERO), vector::ZERO);
        assert_vec_eq(round_trip.basis.x, vector::RIGHT);
        assert_vec_eq(round_trip.basis.y, vector::UP);
        assert_vec_eq(round_trip.basis.z, vector::BACKWARD);
    }

    #[test]
    fn multiply_offsets_child_by_parent_basis() {
        let parent = Transform3D::from_position(Vec3::new(1.0, 0.0, 0.0))
            .with_basis(Basis::IDENTITY.rotated(vector::UP, std::f64::consts::FRAC_PI_2));
        let child = Transform3D::from_position(Vec3::new(1.0, 0.0, 0.0));
        let global = parent * child;
        assert_vec_eq(global.position, Vec3::new(1.0, 0.0, -1.0));
    }

    #[test]
    fn matrix_matches_transform_point() {
        let t = sample();
        let p = Vec3::new(0.5, -1.0, 3.0);
        let (projected, w) = project_point(&t.to_matrix(), p);
        assert_relative_eq!(w, 1.0);
        assert_vec_eq(projected, t.transform_point(p));
    }

    #[test]
    fn matrix_decomposition_round_trip() {
        let t = sample().with_scale(Vec3::new(1.0, 3.0, 0.5));
        let back = Transform3D::from_matrix(&t.to_matrix());
        assert_vec_eq(back.position, t.position);
        assert_vec_eq(back.scale, t.scale);
        assert_vec_eq(back.basis.z, t.basis.z);
    }
}
