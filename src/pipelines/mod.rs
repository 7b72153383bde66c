//! GPU pipelines and the environment components feeding them.
//!
//! - `basic` builds render pipelines and bind group layouts from reflected programs
//! - `light` is the directional light with its shadow settings
//! - `fog` is the distance fog component

pub mod basic;
pub mod fog;
pub mod light;
