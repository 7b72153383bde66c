//! Vector aliases and helpers on top of `cgmath`.
//!
//! All CPU-side scene math runs in `f64`. Values are only narrowed to `f32`
//! when they are written into a uniform block.
//!
//! # Key types
//!
//! - [`Vec2`] and [`Vec3`] are plain `cgmath` vectors
//! - [`VectorExt`] adds the zero-safe [`normalized`](VectorExt::normalized), spherical
//!   interpolation and rounding helpers shared by both vector sizes

use cgmath::{InnerSpace, Vector2, Vector3, VectorSpace};

pub type Vec2 = Vector2<f64>;
pub type Vec3 = Vector3<f64>;

pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
pub const ONE: Vec3 = Vec3::new(1.0, 1.0, 1.0);
pub const UP: Vec3 = Vec3::new(0.0, 1.0, 0.0);
pub const DOWN: Vec3 = Vec3::new(0.0, -1.0, 0.0);
pub const LEFT: Vec3 = Vec3::new(-1.0, 0.0, 0.0);
pub const RIGHT: Vec3 = Vec3::new(1.0, 0.0, 0.0);
pub const FORWARD: Vec3 = Vec3::new(0.0, 0.0, -1.0);
pub const BACKWARD: Vec3 = Vec3::new(0.0, 0.0, 1.0);
/// Masks out the vertical component when used with `mul_element_wise`.
pub const XZ: Vec3 = Vec3::new(1.0, 0.0, 1.0);

/// Below this `sin(theta)` spherical interpolation falls back to a linear one.
const SLERP_EPSILON: f64 = 1e-6;

/// Helpers missing from `cgmath` that the engine relies on.
pub trait VectorExt: Sized {
    /// Unit vector in the same direction. The zero vector stays zero instead of
    /// turning into NaNs the way `InnerSpace::normalize` does.
    fn normalized(self) -> Self;

    /// Spherical interpolation between the directions of `self` and `other`.
    fn slerp(self, other: Self, t: f64) -> Self;

    fn floor(self) -> Self;
    fn ceil(self) -> Self;
    fn round(self) -> Self;
}

macro_rules! impl_vector_ext {
    ($vector:ident { $($field:ident),+ }) => {
        impl VectorExt for $vector<f64> {
            fn normalized(self) -> Self {
                let length = self.magnitude();
                if length == 0.0 {
                    return self;
                }
                self / length
            }

            fn slerp(self, other: Self, t: f64) -> Self {
                let cos_theta = self.normalized().dot(other.normalized()).clamp(-1.0, 1.0);
                let theta = cos_theta.acos();
                let sin_theta = theta.sin();
                if sin_theta < SLERP_EPSILON {
                    return self.lerp(other, t);
                }
                let from = ((1.0 - t) * theta).sin() / sin_theta;
                let to = (t * theta).sin() / sin_theta;
                self * from + other * to
            }

            fn floor(self) -> Self {
                $vector::new($(self.$field.floor()),+)
            }

            fn ceil(self) -> Self {
                $vector::new($(self.$field.ceil()),+)
            }

            fn round(self) -> Self {
                $vector::new($(self.$field.round()),+)
            }
        }
    };
}

impl_vector_ext!(Vector2 { x, y });
impl_vector_ext!(Vector3 { x, y, z });

/// Signed angle in radians that rotates `from` onto `to`.
pub fn angle_to(from: Vec2, to: Vec2) -> f64 {
    let cross = from.x * to.y - from.y * to.x;
    cross.atan2(from.dot(to))
}

/// Fractional part of every component, always in `[0, 1)`.
pub fn fract(v: Vec2) -> Vec2 {
    v - VectorExt::floor(v)
}

pub fn min2(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x.min(b.x), a.y.min(b.y))
}

pub fn max2(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x.max(b.x), a.y.max(b.y))
}

/// Narrows to the layout WGSL expects for a `vec3<f32>`.
pub fn to_f32(v: Vec3) -> [f32; 3] {
    [v.x as f32, v.y as f32, v.z as f32]
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use cgmath::{ElementWise, InnerSpace, MetricSpace};

    use super::*;

    #[test]
    fn normalized_has_unit_length() {
        for v in [Vec3::new(3.0, 4.0, 0.0), Vec3::new(-0.001, 2.0, 7.5), UP] {
            assert_relative_eq!(v.normalized().magnitude(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn normalized_zero_stays_zero() {
        assert_eq!(ZERO.normalized(), ZERO);
        assert_eq!(Vec2::new(0.0, 0.0).normalized(), Vec2::new(0.0, 0.0));
    }

    #[test]
    fn slerp_keeps_length_between_unit_vectors() {
        let halfway = RIGHT.slerp(FORWARD, 0.5);
        assert_relative_eq!(halfway.magnitude(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(halfway.x, halfway.z.abs(), epsilon = 1e-12);
    }

    #[test]
    fn slerp_of_parallel_vectors_is_linear() {
        let v = RIGHT.slerp(RIGHT * 3.0, 0.5);
        assert_relative_eq!(v.x, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn rounding_and_distance() {
        let v = Vec3::new(1.5, -1.5, 2.2);
        assert_eq!(VectorExt::floor(v), Vec3::new(1.0, -2.0, 2.0));
        assert_eq!(VectorExt::ceil(v), Vec3::new(2.0, -1.0, 3.0));
        assert_eq!(VectorExt::round(v), Vec3::new(2.0, -2.0, 2.0));
        assert_relative_eq!(ZERO.distance(Vec3::new(0.0, 3.0, 4.0)), 5.0);
        assert_eq!(v.mul_element_wise(XZ), Vec3::new(1.5, 0.0, 2.2));
    }

    #[test]
    fn two_dimensional_helpers() {
        assert_relative_eq!(
            angle_to(Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)),
            std::f64::consts::FRAC_PI_2
        );
        let f = fract(Vec2::new(1.25, -0.25));
        assert_relative_eq!(f.x, 0.25);
        assert_relative_eq!(f.y, 0.75);
        assert_eq!(
            min2(Vec2::new(1.0, 5.0), Vec2::new(2.0, 3.0)),
            Vec2::new(1.0, 3.0)
        );
        assert_eq!(
            max2(Vec2::new(1.0, 5.0), Vec2::new(2.0, 3.0)),
            Vec2::new(2.0, 5.0)
        );
    }
}
