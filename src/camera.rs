//! Camera component and projection math.
//!
//! Projection matrices are built the OpenGL way, with clip space depth in
//! `[-1, 1]`, so screen-space tests on the CPU read like textbook math. The
//! matrices handed to the GPU are corrected to wgpu's `[0, 1]` depth range with
//! [`OPENGL_TO_WGPU_MATRIX`].

use cgmath::{Deg, Matrix4, Rad};

use crate::data_structures::{
    transform::{Transform3D, project_point},
    vector::{Vec2, Vec3},
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f64> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    Perspective,
    /// Extent of the view volume in world units.
    Orthographic { width: f64, height: f64 },
}

/// Camera component. The view comes from the global transform of the owning node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// Vertical field of view in degrees.
    pub fov: f64,
    pub near: f64,
    pub far: f64,
    /// Width over height of the viewport.
    pub aspect: f64,
    pub projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov: 50.0,
            near: 0.1,
            far: 1000.0,
            aspect: 1.0,
            projection: Projection::Perspective,
        }
    }
}

impl Camera {
    pub fn perspective(fov: f64, near: f64, far: f64) -> Self {
        Self {
            fov,
            near,
            far,
            ..Self::default()
        }
    }

    pub fn orthographic(width: f64, height: f64, near: f64, far: f64) -> Self {
        Self {
            near,
            far,
            projection: Projection::Orthographic { width, height },
            ..Self::default()
        }
    }

    /// Updates the aspect ratio. Zero sized viewports are ignored.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f64 / height as f64;
        }
    }

    /// Projection with clip space depth in `[-1, 1]`.
    pub fn projection_matrix(&self) -> Matrix4<f64> {
        match self.projection {
            Projection::Perspective => {
                let f = 1.0 / (Rad::from(Deg(self.fov)).0 / 2.0).tan();
                let nf = 1.0 / (self.near - self.far);
                #[rustfmt::skip]
                let matrix = Matrix4::new(
                    f / self.aspect, 0.0, 0.0, 0.0,
                    0.0, f, 0.0, 0.0,
                    0.0, 0.0, (self.far + self.near) * nf, -1.0,
                    0.0, 0.0, 2.0 * self.far * self.near * nf, 0.0,
                );
                matrix
            }
            Projection::Orthographic { width, height } => cgmath::ortho(
                -width / 2.0,
                width / 2.0,
                -height / 2.0,
                height / 2.0,
                self.near,
                self.far,
            ),
        }
    }

    /// Projection with wgpu's depth range.
    pub fn gpu_projection(&self) -> Matrix4<f64> {
        OPENGL_TO_WGPU_MATRIX * self.projection_matrix()
    }

    /// World to camera space for a camera placed at `global`.
    pub fn view_matrix(global: &Transform3D) -> Matrix4<f64> {
        global.inverse().to_matrix()
    }

    /// Normalized screen coordinates of `point` with the origin in the top left corner.
    ///
    /// Returns `None` for points behind the camera or outside the near/far range.
    pub fn to_screen_position(
        &self,
        global: &Transform3D,
        point: Vec3,
    ) -> Option<Vec2> {
        let view_projection = self.projection_matrix() * Self::view_matrix(global);
        let (ndc, w) = project_point(&view_projection, point);
        if w <= 0.0 || !(-1.0..=1.0).contains(&ndc.z) {
            return None;
        }
        Some(Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::data_structures::vector;

    #[test]
    fn point_ahead_projects_to_center() {
        let camera = Camera::default();
        let screen = camera.to_screen_position(&Transform3D::IDENTITY, Vec3::new(0.0, 0.0, -10.0));
        let screen = screen.unwrap_or(Vec2::new(-1.0, -1.0));
        assert_relative_eq!(screen.x, 0.5, epsilon = 1e-9);
        assert_relative_eq!(screen.y, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn up_is_towards_the_top_of_the_screen() {
        let camera = Camera::default();
        let screen = camera
            .to_screen_position(&Transform3D::IDENTITY, Vec3::new(0.0, 1.0, -10.0))
            .unwrap_or(Vec2::new(0.5, 0.5));
        assert!(screen.y < 0.5);
    }

    #[test]
    fn points_behind_or_past_far_are_rejected() {
        let camera = Camera::default();
        let at = Transform3D::IDENTITY;
        assert_eq!(camera.to_screen_position(&at, vector::BACKWARD * 5.0), None);
        assert_eq!(camera.to_screen_position(&at, vector::FORWARD * 2000.0), None);
    }

    #[test]
    fn follows_the_camera_transform() {
        let camera = Camera::default();
        let mut at = Transform3D::from_position(Vec3::new(0.0, 5.0, 10.0));
        at.look_at(Vec3::new(0.0, 5.0, 0.0), vector::UP);
        let screen = camera.to_screen_position(&at, Vec3::new(0.0, 5.0, 0.0));
        assert!(screen.is_some());
        assert_eq!(camera.to_screen_position(&at, Vec3::new(0.0, 5.0, 20.0)), None);
    }

    #[test]
    fn gpu_projection_maps_near_and_far_to_unit_depth() {
        let camera = Camera::perspective(60.0, 1.0, 100.0);
        let (near, _) = project_point(&camera.gpu_projection(), Vec3::new(0.0, 0.0, -1.0));
        let (far, _) = project_point(&camera.gpu_projection(), Vec3::new(0.0, 0.0, -100.0));
        assert_relative_eq!(near.z, 0.0, epsilon = 1e-9);
        assert_relative_eq!(far.z, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn orthographic_extent() {
        let camera = Camera::orthographic(100.0, 50.0, 0.001, 100.0);
        let screen = camera
            .to_screen_position(&Transform3D::IDENTITY, Vec3::new(50.0, -25.0, -10.0))
            .unwrap_or(Vec2::new(0.0, 0.0));
        assert_relative_eq!(screen.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(screen.y, 1.0, epsilon = 1e-9);
    }
}
