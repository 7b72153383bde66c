//! Distance fog component.

use crate::{data_structures::color::Color, shaders::material::Material};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FogType {
    #[default]
    Linear,
    Exponential,
}

impl FogType {
    /// Value of the `FOG_TYPE` uniform.
    pub fn as_uniform(self) -> i32 {
        match self {
            FogType::Linear => 0,
            FogType::Exponential => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fog {
    pub fog_type: FogType,
    pub color: Color,
    /// Start distance for linear fog, falloff rate for exponential fog.
    pub density: f64,
    pub enabled: bool,
}

impl Default for Fog {
    fn default() -> Self {
        Self {
            fog_type: FogType::Linear,
            color: Color::WHITE,
            density: 2.0,
            enabled: true,
        }
    }
}

impl Fog {
    pub fn new(fog_type: FogType, color: Color) -> Self {
        Self {
            fog_type,
            color,
            ..Self::default()
        }
    }

    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    /// Visibility in `[0, 1]` at `distance` from the camera, 1 meaning no fog.
    pub fn factor(&self, distance: f64) -> f64 {
        if !self.enabled {
            return 1.0;
        }
        match self.fog_type {
            FogType::Linear => {
                (1.0 - (distance - self.density).max(0.0) / self.density).max(0.0)
            }
            FogType::Exponential => (-self.density * distance).exp(),
        }
    }

    /// The color a surface of `color` has at `distance`, as the fragment shader computes it.
    pub fn apply(&self, color: &Color, distance: f64) -> Color {
        color.mix(&self.color, 1.0 - self.factor(distance))
    }

    pub fn assign(&self, material: &mut Material) {
        material.set_parameter("FOG_COLOR", self.color);
        material.set_parameter("FOG_DENSITY", self.density);
        material.set_parameter("FOG_TYPE", self.fog_type.as_uniform());
        material.set_parameter("FOG_ENABLED", self.enabled);
    }

    /// Turns fog off on a material when the scene has none.
    pub fn assign_disabled(material: &mut Material) {
        material.set_parameter("FOG_ENABLED", false);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn linear_fog_starts_at_density() {
        let fog = Fog::default().with_density(10.0);
        assert_relative_eq!(fog.factor(5.0), 1.0);
        assert_relative_eq!(fog.factor(15.0), 0.5);
        assert_relative_eq!(fog.factor(30.0), 0.0);
    }

    #[test]
    fn exponential_fog_decays() {
        let fog = Fog::new(FogType::Exponential, Color::BLACK).with_density(0.1);
        assert_relative_eq!(fog.factor(0.0), 1.0);
        assert_relative_eq!(fog.factor(10.0), (-1.0f64).exp());
        let faded = fog.apply(&Color::WHITE, 1e6);
        assert_relative_eq!(faded.r, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn disabled_fog_keeps_color() {
        let fog = Fog {
            enabled: false,
            ..Fog::default()
        };
        assert_eq!(fog.apply(&Color::RED, 1000.0), Color::RED);
    }
}
