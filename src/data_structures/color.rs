//! RGB colors used as material parameters.

use thiserror::Error;

use crate::data_structures::vector::Vec3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorParseError {
    #[error("invalid hex color `{0}`, expected #RRGGBB, RRGGBB or #RGB")]
    Format(String),
}

/// Linear RGB color with components in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const YELLOW: Color = Color::rgb(1.0, 1.0, 0.0);
    pub const CYAN: Color = Color::rgb(0.0, 1.0, 1.0);
    pub const MAGENTA: Color = Color::rgb(1.0, 0.0, 1.0);
    pub const ORANGE: Color = Color::rgb(1.0, 0.5, 0.0);

    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB`, `RRGGBB` or the short `#RGB` form.
    pub fn try_from_hex(hex: &str) -> Result<Color, ColorParseError> {
        let digits = hex.trim_start_matches('#');
        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => return Err(ColorParseError::Format(hex.to_string())),
        };
        let channel = |range: std::ops::Range<usize>| {
            expanded
                .get(range)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .map(|v| v as f64 / 255.0)
                .ok_or_else(|| ColorParseError::Format(hex.to_string()))
        };
        Ok(Color::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Parses a hex literal written in code.
    ///
    /// # Panics
    ///
    /// Panics on a malformed string. Use [`Color::try_from_hex`] for user input.
    pub fn from_hex(hex: &str) -> Color {
        match Self::try_from_hex(hex) {
            Ok(color) => color,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn mix(&self, other: &Color, t: f64) -> Color {
        Color::rgb(
            self.r * (1.0 - t) + other.r * t,
            self.g * (1.0 - t) + other.g * t,
            self.b * (1.0 - t) + other.b * t,
        )
    }

    /// Pushes the channels away from (positive) or towards (negative) their luminance.
    pub fn saturation(&self, amount: f64) -> Color {
        let luma = self.luminance();
        let channel = |c: f64| (luma + (c - luma) * (1.0 + amount)).clamp(0.0, 1.0);
        Color::rgb(channel(self.r), channel(self.g), channel(self.b))
    }

    pub fn luminance(&self) -> f64 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<Color> for Vec3 {
    fn from(color: Color) -> Self {
        Vec3::new(color.r, color.g, color.b)
    }
}

impl From<Vec3> for Color {
    fn from(v: Vec3) -> Self {
        Color::rgb(v.x, v.y, v.z)
    }
}

impl From<Color> for wgpu::Color {
    fn from(color: Color) -> Self {
        wgpu::Color {
            r: color.r,
            g: color.g,
            b: color.b,
            a: 1.0,
        }
    }
}
