//! Frame rendering of a [`SceneTree`].
//!
//! Each frame runs in three steps:
//!
//! 1. [`RenderContext::resolve`] snapshots the current camera, light and fog
//! 2. every drawable mesh gets its uniforms staged: camera, light and fog from
//!    the snapshot, `MODEL_MATRIX` from the node's global transform
//! 3. the shadow pass draws shadow casters with their depth-only program into
//!    the light's depth texture, then the main pass draws every visible mesh
//!    with its full material
//!
//! # Key types
//!
//! - [`RenderContext`] is the per-frame view of the scene's environment
//! - [`Renderer`] owns pipelines, GPU meshes, uniform buffers and the shadow map

use std::{
    collections::{HashMap, HashSet},
    iter,
    sync::Arc,
};

use crate::{
    camera::Camera,
    context::Context,
    data_structures::{
        color::Color,
        geometry::Aabb,
        scene_graph::{NodeId, SceneTree},
        texture::Texture,
        transform::Transform3D,
    },
    pipelines::{
        basic::{ProgramPipeline, group_count},
        fog::Fog,
        light::{DirectionalLight, LightView, ShadowSettings},
    },
    resources::mesh::GpuMesh,
    shaders::{
        material::{Material, UniformBlock},
        program::{DepthPrograms, ResourceKind, ShaderProgram},
    },
};

/// Camera, light and fog of one frame, resolved once before drawing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderContext {
    pub camera: Option<(Camera, Transform3D)>,
    pub light: Option<(DirectionalLight, LightView)>,
    pub fog: Option<Fog>,
    pub time: f64,
}

impl RenderContext {
    /// Reads the current camera, light and fog of `tree`.
    ///
    /// The light's shadow volume follows the camera; without a camera it stays
    /// centered on the light node.
    pub fn resolve(tree: &SceneTree) -> Self {
        let camera = tree.current_camera().and_then(|id| {
            let camera = tree.get(id)?.camera?;
            Some((camera, tree.global_transform(id).unwrap_or(Transform3D::IDENTITY)))
        });
        let light = tree.current_light().and_then(|id| {
            let light = tree.get(id)?.light?;
            let global = tree.global_transform(id).unwrap_or(Transform3D::IDENTITY);
            let focus = camera.map_or(global.position, |(_, camera)| camera.position);
            Some((light, light.follow(&global, focus)))
        });
        let fog = tree
            .current_fog()
            .and_then(|id| tree.get(id)?.fog)
            .filter(|fog| fog.enabled);
        Self {
            camera,
            light,
            fog,
            time: tree.time(),
        }
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        if let Some((camera, _)) = &mut self.camera {
            camera.set_viewport(width, height);
        }
        self
    }

    /// Stores the material's own parameters, then overrides the environment uniforms.
    pub fn assign(&self, material: &mut Material) {
        material.apply_uniforms();
        if let Some((camera, global)) = &self.camera {
            material.set_parameter("CAMERA_VIEW_MATRIX", Camera::view_matrix(global));
            material.set_parameter("PROJECTION", camera.gpu_projection());
        }
        material.set_parameter("TIME", self.time);
        match &self.light {
            Some((light, view)) => light.assign(view, material),
            None => DirectionalLight::assign_unlit(material),
        }
        match &self.fog {
            Some(fog) => fog.assign(material),
            None => Fog::assign_disabled(material),
        }
    }

    /// Whether a mesh at `model` with the given bounds can be seen.
    ///
    /// Everything counts as visible when there is no camera to cull against.
    pub fn is_visible(&self, bounds: &Aabb, model: &Transform3D) -> bool {
        match &self.camera {
            Some((camera, global)) => bounds.is_in_camera(model, camera, global),
            None => true,
        }
    }
}

/// Device and queue a frame is recorded with.
#[derive(Clone, Copy, Debug)]
pub struct Gpu<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
}

impl<'a> From<&'a Context> for Gpu<'a> {
    fn from(ctx: &'a Context) -> Self {
        Self {
            device: &ctx.device,
            queue: &ctx.queue,
        }
    }
}

/// Color and depth attachments of the main pass.
#[derive(Clone, Copy, Debug)]
pub struct FrameTarget<'a> {
    pub color: &'a wgpu::TextureView,
    pub depth: &'a wgpu::TextureView,
    pub size: (u32, u32),
    pub clear_colour: Color,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Pass {
    Shadow,
    Main,
}

/// Uniform buffers and bind groups of one node in one pass.
struct DrawBindings {
    program: u64,
    buffers: Vec<wgpu::Buffer>,
    bind_groups: Vec<wgpu::BindGroup>,
}

struct PreparedDraw {
    node: NodeId,
    program: u64,
    geometry: u64,
}

/// Draws a [`SceneTree`] with a shadow pre-pass.
pub struct Renderer {
    color_format: wgpu::TextureFormat,
    shadow_map: Texture,
    depth_programs: DepthPrograms,
    pipelines: HashMap<u64, ProgramPipeline>,
    depth_pipelines: HashMap<u64, ProgramPipeline>,
    meshes: HashMap<u64, GpuMesh>,
    bindings: HashMap<(NodeId, Pass), DrawBindings>,
}

impl Renderer {
    pub fn new(device: &wgpu::Device, color_format: wgpu::TextureFormat) -> Self {
        Self {
            color_format,
            shadow_map: Texture::create_shadow_map(device, ShadowSettings::default().map_size),
            depth_programs: DepthPrograms::default(),
            pipelines: HashMap::new(),
            depth_pipelines: HashMap::new(),
            meshes: HashMap::new(),
            bindings: HashMap::new(),
        }
    }

    pub fn shadow_map(&self) -> &Texture {
        &self.shadow_map
    }

    /// Renders one frame of `tree` into `target` and submits it.
    pub fn render(&mut self, gpu: Gpu<'_>, tree: &mut SceneTree, target: &FrameTarget<'_>) {
        let (width, height) = target.size;
        let frame = RenderContext::resolve(tree).with_viewport(width, height);
        if let Some((light, _)) = &frame.light {
            self.ensure_shadow_map(gpu.device, light.shadow.map_size);
        }

        let mut drawables = Vec::new();
        tree.render(|tree, id| {
            let Some(mesh) = tree.get(id).and_then(|node| node.mesh.as_ref()) else {
                return;
            };
            if mesh.material.is_none() {
                return;
            }
            let model = tree.global_transform(id).unwrap_or(Transform3D::IDENTITY);
            let visible = !mesh.cull || frame.is_visible(&mesh.geometry.aabb, &model);
            drawables.push((id, model, visible));
        });

        let mut shadow_draws = Vec::new();
        let mut main_draws = Vec::new();
        let mut used_geometry = HashSet::new();
        for (id, model, visible) in drawables {
            let Some(mesh) = tree.get_mut(id).and_then(|node| node.mesh.as_mut()) else {
                continue;
            };
            let geometry = mesh.geometry.clone();
            let cast_shadows = mesh.cast_shadows;
            let Some(material) = mesh.material.as_mut() else {
                continue;
            };
            frame.assign(material);
            material.set_parameter("MODEL_MATRIX", model.to_matrix());

            used_geometry.insert(geometry.id());
            self.meshes
                .entry(geometry.id())
                .or_insert_with(|| GpuMesh::upload(gpu.device, &geometry));

            if let (true, Some((_, view))) = (cast_shadows, &frame.light) {
                if let Some(program) = self.stage_depth(gpu, id, material, &model, view, frame.time) {
                    shadow_draws.push(PreparedDraw {
                        node: id,
                        program,
                        geometry: geometry.id(),
                    });
                }
            }
            if visible && self.stage_main(gpu, id, material) {
                main_draws.push(PreparedDraw {
                    node: id,
                    program: material.program().id(),
                    geometry: geometry.id(),
                });
            }
        }
        log::trace!(
            "Frame: {} shadow draws, {} main draws",
            shadow_draws.len(),
            main_draws.len()
        );

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut shadow_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow_map.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            self.encode(&mut shadow_pass, Pass::Shadow, &shadow_draws);
        }
        {
            let mut main_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(target.clear_colour.into()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: target.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            self.encode(&mut main_pass, Pass::Main, &main_draws);
        }
        gpu.queue.submit(iter::once(encoder.finish()));

        // Buffers of nodes that were not drawn this frame are released.
        let live: HashSet<(NodeId, Pass)> = shadow_draws
            .iter()
            .map(|d| (d.node, Pass::Shadow))
            .chain(main_draws.iter().map(|d| (d.node, Pass::Main)))
            .collect();
        self.bindings.retain(|key, _| live.contains(key));
        self.meshes.retain(|id, _| used_geometry.contains(id));
    }

    fn encode(&self, pass: &mut wgpu::RenderPass<'_>, kind: Pass, draws: &[PreparedDraw]) {
        let pipelines = match kind {
            Pass::Shadow => &self.depth_pipelines,
            Pass::Main => &self.pipelines,
        };
        for draw in draws {
            let (Some(pipeline), Some(bindings), Some(mesh)) = (
                pipelines.get(&draw.program),
                self.bindings.get(&(draw.node, kind)),
                self.meshes.get(&draw.geometry),
            ) else {
                continue;
            };
            pass.set_pipeline(&pipeline.pipeline);
            for (index, group) in bindings.bind_groups.iter().enumerate() {
                pass.set_bind_group(index as u32, group, &[]);
            }
            mesh.draw(pass);
        }
    }

    fn ensure_shadow_map(&mut self, device: &wgpu::Device, size: u32) {
        if self.shadow_map.size() != [size, size] {
            log::debug!("Resizing the shadow map to {size}x{size}");
            self.shadow_map = Texture::create_shadow_map(device, size);
            // Main pass bind groups still reference the old texture.
            self.bindings.retain(|(_, pass), _| *pass == Pass::Shadow);
        }
    }

    fn stage_main(&mut self, gpu: Gpu<'_>, node: NodeId, material: &Material) -> bool {
        let program = material.program();
        let pipeline = self
            .pipelines
            .entry(program.id())
            .or_insert_with(|| ProgramPipeline::surface(gpu.device, program, self.color_format));
        stage_bindings(
            gpu,
            &mut self.bindings,
            (node, Pass::Main),
            program,
            pipeline,
            &self.shadow_map,
            material.block(),
        )
    }

    /// Stages the depth-only variant of `material` with the light's matrices.
    fn stage_depth(
        &mut self,
        gpu: Gpu<'_>,
        node: NodeId,
        material: &Material,
        model: &Transform3D,
        view: &LightView,
        time: f64,
    ) -> Option<u64> {
        let depth = self.depth_programs.get(material.program())?;
        let depth_material = depth_pass_material(material, depth.clone(), model, view, time);

        let pipeline = self
            .depth_pipelines
            .entry(depth.id())
            .or_insert_with(|| ProgramPipeline::depth(gpu.device, &depth));
        stage_bindings(
            gpu,
            &mut self.bindings,
            (node, Pass::Shadow),
            &depth,
            pipeline,
            &self.shadow_map,
            depth_material.block(),
        )
        .then(|| depth.id())
    }
}

/// `material`'s parameters on its depth-only program, seen from the light.
fn depth_pass_material(
    material: &Material,
    depth: Arc<ShaderProgram>,
    model: &Transform3D,
    view: &LightView,
    time: f64,
) -> Material {
    let mut depth_material = Material::new(depth);
    for (name, value) in material.params() {
        depth_material.set_param(name.clone(), value.clone());
    }
    depth_material.apply_uniforms();
    DirectionalLight::assign_depth_pass(view, &mut depth_material);
    depth_material.set_parameter("MODEL_MATRIX", model.to_matrix());
    depth_material.set_parameter("TIME", time);
    depth_material
}

/// Creates the node's buffers and bind groups on first use and uploads `block`.
fn stage_bindings(
    gpu: Gpu<'_>,
    bindings: &mut HashMap<(NodeId, Pass), DrawBindings>,
    key: (NodeId, Pass),
    program: &ShaderProgram,
    pipeline: &ProgramPipeline,
    shadow_map: &Texture,
    block: &UniformBlock,
) -> bool {
    let stale = bindings
        .get(&key)
        .is_none_or(|existing| existing.program != program.id());
    if stale {
        match create_bindings(gpu.device, program, pipeline, shadow_map) {
            Some(created) => {
                bindings.insert(key, created);
            }
            None => return false,
        }
    }
    let Some(draw) = bindings.get(&key) else {
        return false;
    };
    for (buffer, bytes) in draw.buffers.iter().zip(block.buffers()) {
        gpu.queue.write_buffer(buffer, 0, bytes);
    }
    true
}

fn create_bindings(
    device: &wgpu::Device,
    program: &ShaderProgram,
    pipeline: &ProgramPipeline,
    shadow_map: &Texture,
) -> Option<DrawBindings> {
    let buffers: Vec<wgpu::Buffer> = program
        .buffers()
        .iter()
        .map(|layout| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("Program {} {}", program.id(), layout.name)),
                size: layout.size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })
        .collect();

    let mut bind_groups = Vec::new();
    for group in 0..group_count(program) {
        let mut entries: Vec<wgpu::BindGroupEntry> = program
            .buffers()
            .iter()
            .zip(&buffers)
            .filter(|(layout, _)| layout.group == group)
            .map(|(layout, buffer)| wgpu::BindGroupEntry {
                binding: layout.binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        for resource in program.resources().iter().filter(|r| r.group == group) {
            let binding = match resource.kind {
                ResourceKind::DepthTexture => wgpu::BindingResource::TextureView(&shadow_map.view),
                ResourceKind::ComparisonSampler => {
                    wgpu::BindingResource::Sampler(shadow_map.sampler.as_ref()?)
                }
                ResourceKind::Texture | ResourceKind::Sampler => {
                    log::warn!(
                        "Program {} binds `{}`, only the shadow map can be bound; skipping its draws",
                        program.id(),
                        resource.name
                    );
                    return None;
                }
            };
            entries.push(wgpu::BindGroupEntry {
                binding: resource.binding,
                resource: binding,
            });
        }
        let layout = pipeline.bind_group_layouts.get(group as usize)?;
        bind_groups.push(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("Program {} group {group}", program.id())),
            layout,
            entries: &entries,
        }));
    }

    Some(DrawBindings {
        program: program.id(),
        buffers,
        bind_groups,
    })
}
