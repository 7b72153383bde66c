//! Compiled shader programs and their reflection data.
//!
//! A [`ShaderProgram`] is a vertex and (optionally) a fragment WGSL module that
//! parsed and validated with `naga`. Reflection runs once at compile time and
//! produces:
//!
//! - a [`UniformTable`] mapping every uniform block member and every texture or
//!   sampler binding to a [`UniformSlot`]
//! - the vertex attribute locations by name
//! - the buffer and resource layouts the renderer turns into bind group layouts
//!
//! Programs are immutable after compilation and shared behind an `Arc`.

use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
    hash::{DefaultHasher, Hash, Hasher},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use naga::{
    AddressSpace, Binding, Handle, ImageClass, Module, Scalar, ScalarKind, ShaderStage, Type,
    TypeInner, VectorSize,
    valid::{Capabilities, ValidationFlags, Validator},
};
use thiserror::Error;

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ShaderError {
    #[error("{stage} shader failed to parse at line {line}:\n{message}")]
    Parse {
        stage: Stage,
        line: u32,
        message: String,
    },
    #[error("{stage} shader failed validation at line {line}:\n{message}")]
    Validation {
        stage: Stage,
        line: u32,
        message: String,
    },
    #[error("link error: {0}")]
    Link(String),
    #[error("{stage} shader has no `{entry}` entry point")]
    MissingEntryPoint { stage: Stage, entry: &'static str },
    #[error("`{hook}` hook must be declared as `{signature}`")]
    MissingHook {
        hook: String,
        signature: &'static str,
    },
}

impl ShaderError {
    /// Line of the failing statement in the preprocessed source, when known.
    pub fn line(&self) -> Option<u32> {
        match self {
            ShaderError::Parse { line, .. } | ShaderError::Validation { line, .. } if *line > 0 => {
                Some(*line)
            }
            _ => None,
        }
    }
}

/// Shape of a uniform block member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Int,
    Float,
    /// Float vector with 2, 3 or 4 components.
    Vec(u8),
    Mat4,
    /// Arrays, nested structs and other types that cannot be set by name.
    Unsupported,
}

impl UniformKind {
    /// Bytes written for a value of this kind.
    pub fn size(&self) -> usize {
        match self {
            UniformKind::Int | UniformKind::Float => 4,
            UniformKind::Vec(n) => 4 * *n as usize,
            UniformKind::Mat4 => 64,
            UniformKind::Unsupported => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    DepthTexture,
    Texture,
    Sampler,
    ComparisonSampler,
}

/// Where a named uniform lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformSlot {
    /// A member of the uniform buffer at index `buffer` of [`ShaderProgram::buffers`].
    Value {
        buffer: usize,
        offset: u32,
        kind: UniformKind,
    },
    /// A texture or sampler binding, bound by the renderer rather than written.
    Resource {
        group: u32,
        binding: u32,
        kind: ResourceKind,
    },
}

impl UniformSlot {
    pub fn kind(&self) -> Option<UniformKind> {
        match self {
            UniformSlot::Value { kind, .. } => Some(*kind),
            UniformSlot::Resource { .. } => None,
        }
    }
}

pub type UniformTable = HashMap<String, UniformSlot>;

#[derive(Clone, Debug, PartialEq)]
pub struct BufferLayout {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub size: u64,
    pub visibility: wgpu::ShaderStages,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResourceLayout {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub kind: ResourceKind,
    pub visibility: wgpu::ShaderStages,
}

type Members = Vec<(String, u32, UniformKind)>;

/// Everything reflection extracts from one module.
#[derive(Default)]
struct ModuleReflection {
    buffers: Vec<(BufferLayout, Members)>,
    resources: Vec<ResourceLayout>,
    inputs: BTreeMap<u32, String>,
    outputs: BTreeMap<u32, String>,
}

#[derive(Debug)]
pub struct ShaderProgram {
    id: u64,
    vertex_key: u64,
    vertex_source: String,
    fragment_source: Option<String>,
    uniforms: UniformTable,
    attributes: BTreeMap<String, u32>,
    buffers: Vec<BufferLayout>,
    resources: Vec<ResourceLayout>,
}

impl ShaderProgram {
    /// Parses, validates and links a vertex and a fragment module.
    pub fn compile(vertex: &str, fragment: &str) -> Result<Self, ShaderError> {
        let vertex_reflection = reflect_stage(Stage::Vertex, vertex)?;
        let fragment_reflection = reflect_stage(Stage::Fragment, fragment)?;

        for (location, name) in &fragment_reflection.inputs {
            if !vertex_reflection.outputs.contains_key(location) {
                return Err(ShaderError::Link(format!(
                    "fragment input `{name}` at location {location} is not written by the vertex stage"
                )));
            }
        }

        Self::link(vertex, Some(fragment), vertex_reflection, Some(fragment_reflection))
    }

    /// Compiles a vertex module alone, as used by depth-only passes.
    pub fn compile_vertex_only(vertex: &str) -> Result<Self, ShaderError> {
        let reflection = reflect_stage(Stage::Vertex, vertex)?;
        Self::link(vertex, None, reflection, None)
    }

    /// Like [`ShaderProgram::compile`] but logs the error and returns `None`.
    pub fn compile_or_report(label: &str, vertex: &str, fragment: &str) -> Option<Self> {
        match Self::compile(vertex, fragment) {
            Ok(program) => Some(program),
            Err(e) => {
                log::error!("Shader program `{label}` failed to compile: {e}");
                None
            }
        }
    }

    /// The same vertex module without a fragment stage.
    pub fn depth_variant(&self) -> Result<Self, ShaderError> {
        Self::compile_vertex_only(&self.vertex_source)
    }

    fn link(
        vertex_source: &str,
        fragment_source: Option<&str>,
        vertex: ModuleReflection,
        fragment: Option<ModuleReflection>,
    ) -> Result<Self, ShaderError> {
        let mut buffers: Vec<(BufferLayout, Members)> = vertex.buffers;
        let mut resources = vertex.resources;

        if let Some(fragment) = fragment {
            for (layout, members) in fragment.buffers {
                match buffers
                    .iter_mut()
                    .find(|(b, _)| b.group == layout.group && b.binding == layout.binding)
                {
                    Some((existing, existing_members)) => {
                        if existing.size != layout.size || *existing_members != members {
                            return Err(ShaderError::Link(format!(
                                "uniform `{}` at group {} binding {} is declared differently in the vertex and fragment stages",
                                layout.name, layout.group, layout.binding
                            )));
                        }
                        existing.visibility |= layout.visibility;
                    }
                    None => buffers.push((layout, members)),
                }
            }
            for resource in fragment.resources {
                match resources
                    .iter_mut()
                    .find(|r| r.group == resource.group && r.binding == resource.binding)
                {
                    Some(existing) if existing.kind != resource.kind => {
                        return Err(ShaderError::Link(format!(
                            "resource `{}` at group {} binding {} is declared differently in the vertex and fragment stages",
                            resource.name, resource.group, resource.binding
                        )));
                    }
                    Some(existing) => existing.visibility |= resource.visibility,
                    None => resources.push(resource),
                }
            }
        }

        let mut uniforms = UniformTable::new();
        for (index, (_, members)) in buffers.iter().enumerate() {
            for (name, offset, kind) in members {
                if uniforms.contains_key(name) {
                    log::warn!("Uniform `{name}` is declared more than once, keeping the first");
                    continue;
                }
                uniforms.insert(
                    name.clone(),
                    UniformSlot::Value {
                        buffer: index,
                        offset: *offset,
                        kind: *kind,
                    },
                );
            }
        }
        for resource in &resources {
            uniforms.insert(
                resource.name.clone(),
                UniformSlot::Resource {
                    group: resource.group,
                    binding: resource.binding,
                    kind: resource.kind,
                },
            );
        }

        let attributes = vertex
            .inputs
            .into_iter()
            .map(|(location, name)| (name, location))
            .collect();

        let mut hasher = DefaultHasher::new();
        vertex_source.hash(&mut hasher);

        Ok(Self {
            id: NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed),
            vertex_key: hasher.finish(),
            vertex_source: vertex_source.to_string(),
            fragment_source: fragment_source.map(str::to_string),
            uniforms,
            attributes,
            buffers: buffers.into_iter().map(|(layout, _)| layout).collect(),
            resources,
        })
    }

    /// Unique per compiled program.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Identity of the vertex module, shared by programs compiled from the same vertex source.
    pub fn vertex_key(&self) -> u64 {
        self.vertex_key
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    pub fn fragment_source(&self) -> Option<&str> {
        self.fragment_source.as_deref()
    }

    pub fn uniforms(&self) -> &UniformTable {
        &self.uniforms
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformSlot> {
        self.uniforms.get(name)
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.contains_key(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, u32> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    pub fn buffers(&self) -> &[BufferLayout] {
        &self.buffers
    }

    pub fn resources(&self) -> &[ResourceLayout] {
        &self.resources
    }
}

/// Depth-only variants keyed by vertex module identity.
///
/// Every distinct vertex shader is compiled once; failures are cached too so
/// a broken shader is reported a single time.
#[derive(Debug, Default)]
pub struct DepthPrograms {
    programs: HashMap<u64, Option<Arc<ShaderProgram>>>,
}

impl DepthPrograms {
    pub fn get(&mut self, program: &ShaderProgram) -> Option<Arc<ShaderProgram>> {
        self.programs
            .entry(program.vertex_key())
            .or_insert_with(|| match program.depth_variant() {
                Ok(depth) => Some(Arc::new(depth)),
                Err(e) => {
                    log::error!("Depth variant of program {} failed: {e}", program.id());
                    None
                }
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

fn parse(stage: Stage, source: &str) -> Result<Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Parse {
        stage,
        line: e.location(source).map_or(0, |l| l.line_number),
        message: e.emit_to_string(source),
    })?;
    Validator::new(ValidationFlags::all(), Capabilities::default())
        .validate(&module)
        .map_err(|e| ShaderError::Validation {
            stage,
            line: e.location(source).map_or(0, |l| l.line_number),
            message: e.emit_to_string(source),
        })?;
    Ok(module)
}

fn reflect_stage(stage: Stage, source: &str) -> Result<ModuleReflection, ShaderError> {
    let module = parse(stage, source)?;
    let (entry, naga_stage, visibility) = match stage {
        Stage::Vertex => (VERTEX_ENTRY, ShaderStage::Vertex, wgpu::ShaderStages::VERTEX),
        Stage::Fragment => (FRAGMENT_ENTRY, ShaderStage::Fragment, wgpu::ShaderStages::FRAGMENT),
    };
    let entry_point = module
        .entry_points
        .iter()
        .find(|ep| ep.name == entry && ep.stage == naga_stage)
        .ok_or(ShaderError::MissingEntryPoint { stage, entry })?;

    let mut reflection = ModuleReflection::default();
    for argument in &entry_point.function.arguments {
        collect_locations(
            &module,
            argument.name.as_deref(),
            argument.ty,
            argument.binding.as_ref(),
            &mut reflection.inputs,
        );
    }
    if let Some(result) = &entry_point.function.result {
        collect_locations(
            &module,
            None,
            result.ty,
            result.binding.as_ref(),
            &mut reflection.outputs,
        );
    }

    for (_, global) in module.global_variables.iter() {
        let Some(binding) = &global.binding else {
            continue;
        };
        let name = global.name.clone().unwrap_or_default();
        let inner = &module.types[global.ty].inner;
        match global.space {
            AddressSpace::Uniform => {
                let (size, members) = match inner {
                    TypeInner::Struct { members, span } => (
                        *span,
                        members
                            .iter()
                            .map(|m| {
                                (
                                    m.name.clone().unwrap_or_default(),
                                    m.offset,
                                    uniform_kind(&module.types[m.ty].inner),
                                )
                            })
                            .collect(),
                    ),
                    other => (other.size(module.to_ctx()), vec![(name.clone(), 0, uniform_kind(other))]),
                };
                reflection.buffers.push((
                    BufferLayout {
                        name,
                        group: binding.group,
                        binding: binding.binding,
                        size: size.next_multiple_of(16) as u64,
                        visibility,
                    },
                    members,
                ));
            }
            AddressSpace::Handle => {
                let kind = match inner {
                    TypeInner::Image {
                        class: ImageClass::Depth { .. },
                        ..
                    } => ResourceKind::DepthTexture,
                    TypeInner::Image { .. } => ResourceKind::Texture,
                    TypeInner::Sampler { comparison: true } => ResourceKind::ComparisonSampler,
                    TypeInner::Sampler { comparison: false } => ResourceKind::Sampler,
                    _ => continue,
                };
                reflection.resources.push(ResourceLayout {
                    name,
                    group: binding.group,
                    binding: binding.binding,
                    kind,
                    visibility,
                });
            }
            _ => {}
        }
    }

    Ok(reflection)
}

/// Records `@location` bindings of an entry point argument or result, looking
/// into structs.
fn collect_locations(
    module: &Module,
    name: Option<&str>,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut BTreeMap<u32, String>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => {
            out.insert(*location, name.unwrap_or_default().to_string());
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    if let Some(Binding::Location { location, .. }) = &member.binding {
                        out.insert(*location, member.name.clone().unwrap_or_default());
                    }
                }
            }
        }
    }
}

fn uniform_kind(inner: &TypeInner) -> UniformKind {
    const F32: Scalar = Scalar {
        kind: ScalarKind::Float,
        width: 4,
    };
    match *inner {
        TypeInner::Scalar(F32) => UniformKind::Float,
        TypeInner::Scalar(Scalar {
            kind: ScalarKind::Sint | ScalarKind::Uint,
            width: 4,
        }) => UniformKind::Int,
        TypeInner::Vector { size, scalar: F32 } => UniformKind::Vec(size as u8),
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar: F32,
        } => UniformKind::Mat4,
        _ => UniformKind::Unsupported,
    }
}
