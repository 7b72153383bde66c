//! Orientation frames.
//!
//! A [`Basis`] stores the three axis vectors of an orthonormal frame. The
//! engine follows the right handed convention where `forward` is `-z`.

use cgmath::{InnerSpace, Matrix3};

use crate::data_structures::vector::{self, Vec3, VectorExt};

/// An orthonormal 3x3 frame representing a rotation.
///
/// Every operation keeps the axes orthonormal up to floating point error.
/// Callers composing many rotations should call [`Basis::orthonormalized`]
/// now and then.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Basis {
    pub x: Vec3,
    pub y: Vec3,
    pub z: Vec3,
}

impl Default for Basis {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Pitch, yaw and roll in radians relative to the default forward direction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Euler {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl Basis {
    pub const IDENTITY: Basis = Basis {
        x: vector::RIGHT,
        y: vector::UP,
        z: vector::BACKWARD,
    };

    pub fn new(x: Vec3, y: Vec3, z: Vec3) -> Self {
        Self { x, y, z }
    }

    /// A frame looking along `direction` with `up` as the vertical hint.
    ///
    /// Degenerates when `direction` is parallel to `up`.
    pub fn looking_at(direction: Vec3, up: Vec3) -> Self {
        let mut basis = Self::IDENTITY;
        basis.look_at(direction, up);
        basis
    }

    pub fn forward(&self) -> Vec3 {
        -self.z
    }

    pub fn backward(&self) -> Vec3 {
        self.z
    }

    pub fn right(&self) -> Vec3 {
        self.x
    }

    pub fn left(&self) -> Vec3 {
        -self.x
    }

    pub fn up(&self) -> Vec3 {
        self.y
    }

    pub fn down(&self) -> Vec3 {
        -self.y
    }

    /// Points the frame along `direction`, keeping the current `y` as the up hint.
    pub fn set_forward(&mut self, direction: Vec3) {
        let up = self.y;
        self.look_at(direction, up);
    }

    /// Tilts the frame so that `y` equals `up`, keeping `z` as the reference.
    pub fn set_up(&mut self, up: Vec3) {
        self.y = up.normalized();
        self.x = self.y.cross(self.z).normalized();
        self.z = self.x.cross(self.y).normalized();
    }

    pub fn look_at(&mut self, direction: Vec3, up: Vec3) {
        self.z = (-direction).normalized();
        self.x = up.cross(self.z).normalized();
        self.y = self.z.cross(self.x).normalized();
    }

    /// Maps a vector given in this frame's coordinates into the parent space.
    pub fn apply(&self, v: Vec3) -> Vec3 {
        self.x * v.x + self.y * v.y + self.z * v.z
    }

    /// Matrix product `self * other`.
    pub fn multiply(&self, other: &Basis) -> Basis {
        Basis {
            x: self.apply(other.x),
            y: self.apply(other.y),
            z: self.apply(other.z),
        }
    }

    /// The transpose, which is the inverse of an orthonormal frame.
    pub fn inverse(&self) -> Basis {
        Basis {
            x: Vec3::new(self.x.x, self.y.x, self.z.x),
            y: Vec3::new(self.x.y, self.y.y, self.z.y),
            z: Vec3::new(self.x.z, self.y.z, self.z.z),
        }
    }

    /// Rotates every axis around the world space `axis` by `angle` radians.
    pub fn rotate(&mut self, axis: Vec3, angle: f64) {
        let k = axis.normalized();
        let (sin, cos) = angle.sin_cos();
        let rodrigues = |v: Vec3| v * cos + k.cross(v) * sin + k * (k.dot(v) * (1.0 - cos));
        self.x = rodrigues(self.x);
        self.y = rodrigues(self.y);
        self.z = rodrigues(self.z);
    }

    pub fn rotated(mut self, axis: Vec3, angle: f64) -> Basis {
        self.rotate(axis, angle);
        self
    }

    /// Interpolates forward and up directions and rebuilds an orthonormal frame.
    pub fn slerp(&self, other: &Basis, t: f64) -> Basis {
        let forward = self.forward().slerp(other.forward(), t);
        let up = self.y.slerp(other.y, t);
        Basis::looking_at(forward, up)
    }

    /// Scales every axis by the matching component of `scale`.
    pub fn scaled(&self, scale: Vec3) -> Basis {
        Basis {
            x: self.x * scale.x,
            y: self.y * scale.y,
            z: self.z * scale.z,
        }
    }

    /// Gram-Schmidt on `z` then `x`.
    pub fn orthonormalized(&self) -> Basis {
        let z = self.z.normalized();
        let x = (self.x - z * z.dot(self.x)).normalized();
        let y = z.cross(x);
        Basis { x, y, z }
    }

    pub fn euler_relative_to_forward(&self) -> Euler {
        let forward = self.forward();
        Euler {
            pitch: forward.y.clamp(-1.0, 1.0).asin(),
            yaw: (-forward.x).atan2(-forward.z),
            roll: self.x.y.atan2(self.y.y),
        }
    }
}

impl From<Basis> for Matrix3<f64> {
    fn from(basis: Basis) -> Self {
        Matrix3::from_cols(basis.x, basis.y, basis.z)
    }
}
