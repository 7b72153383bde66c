//! Directional light with a single orthographic shadow map.

use cgmath::Matrix4;

use crate::{
    camera::Camera,
    data_structures::{
        basis::Basis,
        color::Color,
        transform::Transform3D,
        vector::{self, Vec3},
    },
    shaders::material::Material,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowSettings {
    /// Width and height of the depth texture in texels.
    pub map_size: u32,
    /// Subtracted from the fragment depth before the comparison.
    pub bias: f64,
    /// Per-axis weights of the 5x5 PCF kernel.
    pub kernel: [f64; 5],
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            map_size: 2048,
            bias: 0.0007,
            kernel: [0.06, 0.12, 0.24, 0.12, 0.06],
        }
    }
}

/// Light component. The direction is the forward axis of the owning node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    /// Orthographic volume used to render the shadow map.
    pub camera: Camera,
    pub color: Color,
    pub ambient: Color,
    pub energy: f64,
    pub shadow: ShadowSettings,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            camera: Camera::orthographic(100.0, 100.0, 0.001, 100.0),
            color: Color::WHITE,
            ambient: Color::rgb(0.2, 0.2, 0.2),
            energy: 3.0,
            shadow: ShadowSettings::default(),
        }
    }
}

/// Light space matrices of one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightView {
    pub global: Transform3D,
    pub view: Matrix4<f64>,
    /// Projection with wgpu's depth range.
    pub projection: Matrix4<f64>,
}

impl LightView {
    pub fn direction(&self) -> Vec3 {
        self.global.basis.forward()
    }
}

impl DirectionalLight {
    pub fn new(color: Color, ambient: Color) -> Self {
        Self {
            color,
            ambient,
            ..Self::default()
        }
    }

    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = energy;
        self
    }

    pub fn with_shadow(mut self, shadow: ShadowSettings) -> Self {
        self.shadow = shadow;
        self
    }

    /// Transform for a light node shining along `direction`.
    pub fn facing(direction: Vec3) -> Transform3D {
        let up = if direction.x == 0.0 && direction.z == 0.0 {
            vector::FORWARD
        } else {
            vector::UP
        };
        Transform3D::IDENTITY.with_basis(Basis::looking_at(direction, up))
    }

    /// Centers the shadow volume on the viewer: the light sits half its range
    /// behind `focus` along its own direction.
    pub fn follow(&self, light_global: &Transform3D, focus: Vec3) -> LightView {
        let mut global = *light_global;
        global.position = focus - global.basis.forward() * (self.camera.far * 0.5);
        LightView {
            global,
            view: Camera::view_matrix(&global),
            projection: self.camera.gpu_projection(),
        }
    }

    /// Writes the sun uniforms sampled by the lighting code.
    pub fn assign(&self, view: &LightView, material: &mut Material) {
        material.set_parameter("SUN_SHADOW_BIAS", self.shadow.bias);
        material.set_parameter("SUN_COLOR", self.color);
        material.set_parameter("SUN_DIRECTION", view.direction());
        material.set_parameter("SUN_AMBIENT", self.ambient);
        material.set_parameter("SUN_VIEW_MATRIX", view.view);
        material.set_parameter("SUN_PROJECTION", view.projection);
        material.set_parameter("SUN_ENERGY", self.energy);
    }

    /// Renders from the light's point of view in the depth pass.
    pub fn assign_depth_pass(view: &LightView, material: &mut Material) {
        material.set_parameter("CAMERA_VIEW_MATRIX", view.view);
        material.set_parameter("PROJECTION", view.projection);
    }

    /// Full ambient and no sun, used when the scene has no light.
    pub fn assign_unlit(material: &mut Material) {
        material.set_parameter("SUN_AMBIENT", Color::WHITE);
        material.set_parameter("SUN_ENERGY", 0.0);
        material.set_parameter("SUN_PROJECTION", Matrix4::<f64>::from_scale(0.0));
    }
}
