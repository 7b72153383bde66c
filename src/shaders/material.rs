//! Materials: a shared program plus per-instance parameter values.
//!
//! # Key types
//!
//! - [`ParamValue`] is the loosely typed value a caller hands to a material
//! - [`UniformSink`] receives typed writes; [`UniformBlock`] stages them as
//!   bytes for upload
//! - [`Material`] keeps the parameters and replays them with
//!   [`Material::apply_uniforms`] every frame
//!
//! Setting a name the program does not declare is a silent no-op, so the same
//! parameter set can be fed to programs with different uniform blocks.

use std::{collections::BTreeMap, sync::Arc};

use cgmath::Matrix4;

use crate::{
    data_structures::{
        color::Color,
        vector::{Vec2, Vec3},
    },
    shaders::program::{ShaderProgram, UniformKind, UniformSlot, UniformTable},
};

/// A parameter value. The shape decides how it is written.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// Written as an integer 0 or 1.
    Bool(bool),
    /// Written as a float scalar.
    Number(f64),
    /// 2, 3 or 4 values are written as a vector, 16 values as a column-major matrix.
    Sequence(Vec<f64>),
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Number(value as f64)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Number(value as f64)
    }
}

impl From<Vec2> for ParamValue {
    fn from(v: Vec2) -> Self {
        ParamValue::Sequence(vec![v.x, v.y])
    }
}

impl From<Vec3> for ParamValue {
    fn from(v: Vec3) -> Self {
        ParamValue::Sequence(vec![v.x, v.y, v.z])
    }
}

impl From<Color> for ParamValue {
    fn from(c: Color) -> Self {
        ParamValue::Sequence(c.to_array().to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for ParamValue {
    fn from(values: [f64; N]) -> Self {
        ParamValue::Sequence(values.to_vec())
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(values: Vec<f64>) -> Self {
        ParamValue::Sequence(values)
    }
}

impl From<Matrix4<f64>> for ParamValue {
    fn from(m: Matrix4<f64>) -> Self {
        let columns: [[f64; 4]; 4] = m.into();
        ParamValue::Sequence(columns.iter().flatten().copied().collect())
    }
}

/// Receiver of typed uniform writes.
pub trait UniformSink {
    fn set_int(&mut self, slot: &UniformSlot, value: i32);
    fn set_float(&mut self, slot: &UniformSlot, value: f32);
    fn set_vec(&mut self, slot: &UniformSlot, value: &[f32]);
    fn set_mat4(&mut self, slot: &UniformSlot, value: &[f32; 16]);
}

/// Writes `value` to the slot called `name`.
///
/// Returns false, without touching `sink`, when the name is not declared,
/// refers to a texture or sampler, or the value has an unsupported shape.
pub fn bind_parameter(
    table: &UniformTable,
    sink: &mut dyn UniformSink,
    name: &str,
    value: &ParamValue,
) -> bool {
    let Some(slot @ UniformSlot::Value { .. }) = table.get(name) else {
        log::trace!("Skipping parameter `{name}`: no such uniform");
        return false;
    };
    match value {
        ParamValue::Bool(b) => sink.set_int(slot, *b as i32),
        ParamValue::Number(n) => sink.set_float(slot, *n as f32),
        ParamValue::Sequence(values) => {
            let floats: Vec<f32> = values.iter().map(|v| *v as f32).collect();
            match floats.len() {
                2..=4 => sink.set_vec(slot, &floats),
                16 => {
                    let mut matrix = [0.0f32; 16];
                    matrix.copy_from_slice(&floats);
                    sink.set_mat4(slot, &matrix);
                }
                len => {
                    log::trace!("Skipping parameter `{name}`: {len} values is not a vector or matrix");
                    return false;
                }
            }
        }
    }
    true
}

/// CPU staging bytes for every uniform buffer of a program.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UniformBlock {
    buffers: Vec<Vec<u8>>,
}

impl UniformBlock {
    pub fn for_program(program: &ShaderProgram) -> Self {
        Self {
            buffers: program
                .buffers()
                .iter()
                .map(|layout| vec![0u8; layout.size as usize])
                .collect(),
        }
    }

    pub fn buffer(&self, index: usize) -> Option<&[u8]> {
        self.buffers.get(index).map(Vec::as_slice)
    }

    pub fn buffers(&self) -> &[Vec<u8>] {
        &self.buffers
    }

    /// Reads back a value slot as floats (integers are converted).
    pub fn read(&self, slot: &UniformSlot) -> Option<Vec<f32>> {
        let UniformSlot::Value {
            buffer,
            offset,
            kind,
        } = *slot
        else {
            return None;
        };
        let start = offset as usize;
        let bytes = self.buffers.get(buffer)?.get(start..start + kind.size())?;
        let words = bytes.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]);
        Some(match kind {
            UniformKind::Int => words.map(|w| i32::from_ne_bytes(w) as f32).collect(),
            _ => words.map(f32::from_ne_bytes).collect(),
        })
    }

    fn write(&mut self, slot: &UniformSlot, bytes: &[u8]) {
        let UniformSlot::Value { buffer, offset, .. } = *slot else {
            return;
        };
        let start = offset as usize;
        if let Some(target) = self
            .buffers
            .get_mut(buffer)
            .and_then(|data| data.get_mut(start..start + bytes.len()))
        {
            target.copy_from_slice(bytes);
        }
    }
}

impl UniformSink for UniformBlock {
    fn set_int(&mut self, slot: &UniformSlot, value: i32) {
        match slot.kind() {
            Some(UniformKind::Int) => self.write(slot, bytemuck::bytes_of(&value)),
            Some(UniformKind::Float) => self.write(slot, bytemuck::bytes_of(&(value as f32))),
            kind => log::trace!("Ignoring int written to {kind:?} uniform"),
        }
    }

    fn set_float(&mut self, slot: &UniformSlot, value: f32) {
        match slot.kind() {
            Some(UniformKind::Float) => self.write(slot, bytemuck::bytes_of(&value)),
            Some(UniformKind::Int) => self.write(slot, bytemuck::bytes_of(&(value as i32))),
            kind => log::trace!("Ignoring float written to {kind:?} uniform"),
        }
    }

    fn set_vec(&mut self, slot: &UniformSlot, value: &[f32]) {
        match slot.kind() {
            Some(UniformKind::Vec(n)) if n as usize == value.len() => {
                self.write(slot, bytemuck::cast_slice(value))
            }
            kind => log::trace!("Ignoring vec{} written to {kind:?} uniform", value.len()),
        }
    }

    fn set_mat4(&mut self, slot: &UniformSlot, value: &[f32; 16]) {
        match slot.kind() {
            Some(UniformKind::Mat4) => self.write(slot, bytemuck::cast_slice(value)),
            kind => log::trace!("Ignoring mat4 written to {kind:?} uniform"),
        }
    }
}

/// A program and the parameter values of one surface.
#[derive(Clone, Debug)]
pub struct Material {
    program: Arc<ShaderProgram>,
    params: BTreeMap<String, ParamValue>,
    block: UniformBlock,
}

impl Material {
    pub fn new(program: Arc<ShaderProgram>) -> Self {
        let block = UniformBlock::for_program(&program);
        Self {
            program,
            params: BTreeMap::new(),
            block,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set_param(name, value);
        self
    }

    /// Stores a parameter; it is written on the next [`Material::apply_uniforms`].
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.params.insert(name.into(), value.into());
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }

    /// Writes a value straight into the staged block without storing it.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<ParamValue>) -> bool {
        bind_parameter(self.program.uniforms(), &mut self.block, name, &value.into())
    }

    /// Writes every stored parameter into the staged block.
    pub fn apply_uniforms(&mut self) {
        for (name, value) in &self.params {
            bind_parameter(self.program.uniforms(), &mut self.block, name, value);
        }
    }

    /// Writes every stored parameter to `sink` through this material's uniform table.
    pub fn apply_uniforms_to(&self, sink: &mut dyn UniformSink) {
        for (name, value) in &self.params {
            bind_parameter(self.program.uniforms(), sink, name, value);
        }
    }

    pub fn program(&self) -> &Arc<ShaderProgram> {
        &self.program
    }

    pub fn block(&self) -> &UniformBlock {
        &self.block
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.program.has_uniform(name)
    }

    /// Current staged value of a uniform, read back as floats.
    pub fn uniform_value(&self, name: &str) -> Option<Vec<f32>> {
        self.block.read(self.program.uniform(name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders::program::ResourceKind;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl UniformSink for Recorder {
        fn set_int(&mut self, _slot: &UniformSlot, value: i32) {
            self.calls.push(format!("int {value}"));
        }

        fn set_float(&mut self, _slot: &UniformSlot, value: f32) {
            self.calls.push(format!("float {value}"));
        }

        fn set_vec(&mut self, _slot: &UniformSlot, value: &[f32]) {
            self.calls.push(format!("vec{}", value.len()));
        }

        fn set_mat4(&mut self, _slot: &UniformSlot, _value: &[f32; 16]) {
            self.calls.push("mat4".into());
        }
    }

    fn table() -> UniformTable {
        let value = |offset, kind| UniformSlot::Value {
            buffer: 0,
            offset,
            kind,
        };
        UniformTable::from([
            ("MODEL_MATRIX".to_string(), value(0, UniformKind::Mat4)),
            ("albedo_color".to_string(), value(64, UniformKind::Vec(3))),
            ("shading_hardness".to_string(), value(76, UniformKind::Float)),
            ("specular".to_string(), value(80, UniformKind::Int)),
            (
                "SUN_DEPTH_TEXTURE".to_string(),
                UniformSlot::Resource {
                    group: 0,
                    binding: 1,
                    kind: ResourceKind::DepthTexture,
                },
            ),
        ])
    }

    #[test]
    fn dispatches_on_value_shape() {
        let table = table();
        let mut sink = Recorder::default();
        assert!(bind_parameter(&table, &mut sink, "specular", &true.into()));
        assert!(bind_parameter(&table, &mut sink, "shading_hardness", &3.0.into()));
        assert!(bind_parameter(&table, &mut sink, "albedo_color", &Color::RED.into()));
        assert!(bind_parameter(
            &table,
            &mut sink,
            "MODEL_MATRIX",
            &Matrix4::<f64>::from_scale(2.0).into()
        ));
        assert_eq!(sink.calls, vec!["int 1", "float 3", "vec3", "mat4"]);
    }

    #[test]
    fn missing_names_never_reach_the_sink() {
        let table = table();
        let mut sink = Recorder::default();
        assert!(!bind_parameter(&table, &mut sink, "nope", &1.0.into()));
        assert!(!bind_parameter(&table, &mut sink, "SUN_DEPTH_TEXTURE", &1.0.into()));
        assert!(!bind_parameter(
            &table,
            &mut sink,
            "albedo_color",
            &ParamValue::Sequence(vec![1.0; 5])
        ));
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn block_ignores_shape_mismatches() {
        let table = table();
        let mut block = UniformBlock {
            buffers: vec![vec![0; 96]],
        };
        bind_parameter(&table, &mut block, "albedo_color", &vec![1.0, 1.0].into());
        bind_parameter(&table, &mut block, "MODEL_MATRIX", &2.0.into());
        assert!(block.buffers[0].iter().all(|b| *b == 0));

        bind_parameter(&table, &mut block, "albedo_color", &Color::WHITE.into());
        bind_parameter(&table, &mut block, "specular", &1.0.into());
        let albedo = block.read(&table["albedo_color"]);
        assert_eq!(albedo, Some(vec![1.0, 1.0, 1.0]));
        assert_eq!(block.read(&table["specular"]), Some(vec![1.0]));
    }
}
