//! Render pipelines built from reflected shader programs.
//!
//! Every [`ShaderProgram`] gets one pipeline for the main pass and, through its
//! depth variant, one for the shadow pass. Bind group layouts come straight from
//! the reflection data so a program can declare any uniform block it likes.

use std::num::NonZeroU64;

use crate::{
    data_structures::{geometry::Vertex, texture::Texture},
    shaders::program::{FRAGMENT_ENTRY, ResourceKind, ShaderProgram, VERTEX_ENTRY},
};

/// Number of bind groups a program uses, one past the highest group index.
pub fn group_count(program: &ShaderProgram) -> u32 {
    let buffers = program.buffers().iter().map(|b| b.group + 1);
    let resources = program.resources().iter().map(|r| r.group + 1);
    buffers.chain(resources).max().unwrap_or(0)
}

/// One bind group layout per group index, built from the program's declarations.
pub fn mk_bind_group_layouts(
    device: &wgpu::Device,
    program: &ShaderProgram,
) -> Vec<wgpu::BindGroupLayout> {
    (0..group_count(program))
        .map(|group| {
            let mut entries: Vec<wgpu::BindGroupLayoutEntry> = program
                .buffers()
                .iter()
                .filter(|buffer| buffer.group == group)
                .map(|buffer| wgpu::BindGroupLayoutEntry {
                    binding: buffer.binding,
                    visibility: buffer.visibility,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(buffer.size),
                    },
                    count: None,
                })
                .collect();
            entries.extend(
                program
                    .resources()
                    .iter()
                    .filter(|resource| resource.group == group)
                    .map(|resource| wgpu::BindGroupLayoutEntry {
                        binding: resource.binding,
                        visibility: resource.visibility,
                        ty: resource_binding_type(resource.kind),
                        count: None,
                    }),
            );
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("Program {} group {group}", program.id())),
                entries: &entries,
            })
        })
        .collect()
}

fn resource_binding_type(kind: ResourceKind) -> wgpu::BindingType {
    match kind {
        ResourceKind::DepthTexture => wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Depth,
        },
        ResourceKind::Texture => wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        ResourceKind::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        ResourceKind::ComparisonSampler => {
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison)
        }
    }
}

/// Layouts and pipeline of one program.
pub struct ProgramPipeline {
    pub bind_group_layouts: Vec<wgpu::BindGroupLayout>,
    pub pipeline: wgpu::RenderPipeline,
}

impl ProgramPipeline {
    /// Main pass pipeline drawing into `color_format`.
    pub fn surface(
        device: &wgpu::Device,
        program: &ShaderProgram,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        Self::build(device, program, Some(color_format))
    }

    /// Depth-only pipeline for the shadow pass.
    pub fn depth(device: &wgpu::Device, program: &ShaderProgram) -> Self {
        Self::build(device, program, None)
    }

    fn build(
        device: &wgpu::Device,
        program: &ShaderProgram,
        color_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        let bind_group_layouts = mk_bind_group_layouts(device, program);
        let layout_refs: Vec<Option<&wgpu::BindGroupLayout>> =
            bind_group_layouts.iter().map(Some).collect();
        let label = format!("Program {}", program.id());
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&label),
            bind_group_layouts: &layout_refs,
            immediate_size: 0,
        });

        let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} vertex")),
            source: wgpu::ShaderSource::Wgsl(program.vertex_source().into()),
        });
        let fragment = match (color_format, program.fragment_source()) {
            (Some(format), Some(source)) => Some((
                format,
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&format!("{label} fragment")),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                }),
            )),
            _ => None,
        };

        let pipeline = mk_render_pipeline(
            device,
            &layout,
            &vertex,
            fragment.as_ref().map(|(format, module)| (module, *format)),
            Texture::DEPTH_FORMAT,
            &[Vertex::desc()],
        );
        Self {
            bind_group_layouts,
            pipeline,
        }
    }
}

/// Triangle list pipeline with depth testing.
///
/// Without a fragment stage the pipeline only writes depth and gets a small
/// slope scaled bias against shadow acne.
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    vertex: &wgpu::ShaderModule,
    fragment: Option<(&wgpu::ShaderModule, wgpu::TextureFormat)>,
    depth_format: wgpu::TextureFormat,
    vertex_layouts: &[wgpu::VertexBufferLayout],
) -> wgpu::RenderPipeline {
    let targets: Vec<Option<wgpu::ColorTargetState>> = fragment
        .iter()
        .map(|(_, format)| {
            Some(wgpu::ColorTargetState {
                format: *format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();
    let depth_only = fragment.is_none();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(if depth_only {
            "Depth Pipeline"
        } else {
            "Render Pipeline"
        }),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vertex,
            entry_point: Some(VERTEX_ENTRY),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: fragment.map(|(module, _)| wgpu::FragmentState {
            module,
            entry_point: Some(FRAGMENT_ENTRY),
            targets: &targets,
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // Generated grids and imported meshes do not agree on winding.
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_format,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::LessEqual),
            stencil: wgpu::StencilState::default(),
            bias: if depth_only {
                wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                }
            } else {
                wgpu::DepthBiasState::default()
            },
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}
