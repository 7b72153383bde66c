//! CPU-side meshes and the mesh component.
//!
//! A [`Geometry`] holds positions, normals and triangle indices. It is uploaded
//! to the GPU lazily by the renderer, which caches buffers by [`Geometry::id`].

use std::{
    mem,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use cgmath::InnerSpace;

use crate::{
    camera::Camera,
    data_structures::{
        transform::Transform3D,
        vector::{Vec3, VectorExt},
    },
    shaders::material::Material,
};

static NEXT_GEOMETRY_ID: AtomicU64 = AtomicU64::new(1);

/// Interleaved vertex as laid out in the vertex buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    /// Matches `@location(0) VERTEX` and `@location(1) NORMAL` of the base vertex shader.
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Axis aligned box in local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub center: Vec3,
    pub size: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            center: Vec3::new(0.0, 0.0, 0.0),
            size: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Aabb {
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return Self::default();
        };
        let (min, max) = points.fold((first, first), |(min, max), p| {
            (
                Vec3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z)),
                Vec3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z)),
            )
        });
        Self {
            center: (min + max) * 0.5,
            size: max - min,
        }
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.size * 0.5
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.size * 0.5
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (min, max) = (self.min(), self.max());
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(max.x, max.y, max.z),
            Vec3::new(min.x, max.y, max.z),
        ]
    }

    /// Whether the box placed at `model` may cover part of the camera's screen.
    ///
    /// The eight corners are projected; the box is kept if at least one corner
    /// is in front of the camera and the screen rectangle of the projected
    /// corners overlaps the unit square.
    pub fn is_in_camera(&self, model: &Transform3D, camera: &Camera, camera_global: &Transform3D) -> bool {
        let mut projected = self
            .corners()
            .into_iter()
            .filter_map(|corner| camera.to_screen_position(camera_global, model.transform_point(corner)))
            .peekable();
        if projected.peek().is_none() {
            return false;
        }
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for screen in projected {
            min_x = min_x.min(screen.x);
            min_y = min_y.min(screen.y);
            max_x = max_x.max(screen.x);
            max_y = max_y.max(screen.y);
        }
        max_x >= 0.0 && min_x <= 1.0 && max_y >= 0.0 && min_y <= 1.0
    }
}

#[derive(Debug)]
pub struct Geometry {
    id: u64,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub aabb: Aabb,
}

impl Geometry {
    /// Builds a geometry and fits its bounding box. Missing normals are
    /// filled with averaged face normals.
    pub fn new(positions: Vec<[f32; 3]>, normals: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        let normals = if normals.len() == positions.len() {
            normals
        } else {
            face_normals(&positions, &indices)
        };
        let aabb = Aabb::from_points(
            positions
                .iter()
                .map(|p| Vec3::new(p[0] as f64, p[1] as f64, p[2] as f64)),
        );
        Self {
            id: NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed),
            positions,
            normals,
            indices,
            aabb,
        }
    }

    /// A flat grid of `segments_x` by `segments_z` unit quads at `y = 0`, facing up.
    pub fn plane(segments_x: u32, segments_z: u32, from_center: bool) -> Self {
        let (half_x, half_z) = (segments_x as f32 / 2.0, segments_z as f32 / 2.0);
        let mut positions = Vec::with_capacity(((segments_x + 1) * (segments_z + 1)) as usize);
        for z in 0..=segments_z {
            for x in 0..=segments_x {
                let (mut px, mut pz) = (x as f32, z as f32);
                if from_center {
                    px -= half_x;
                    pz -= half_z;
                }
                positions.push([px, 0.0, pz]);
            }
        }

        let mut indices = Vec::with_capacity((segments_x * segments_z * 6) as usize);
        for z in 0..segments_z {
            for x in 0..segments_x {
                let i1 = z * (segments_x + 1) + x;
                let i2 = i1 + 1;
                let i3 = i1 + segments_x + 1;
                let i4 = i3 + 1;
                indices.extend_from_slice(&[i1, i2, i3, i2, i4, i3]);
            }
        }

        let normals = vec![[0.0, 1.0, 0.0]; positions.len()];
        Self::new(positions, normals, indices)
    }

    /// A box centered on the origin with one set of four vertices per face.
    pub fn cuboid(size: Vec3) -> Self {
        let (w, h, d) = (size.x as f32 / 2.0, size.y as f32 / 2.0, size.z as f32 / 2.0);
        #[rustfmt::skip]
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([0.0, 0.0, 1.0], [[-w, -h, d], [w, -h, d], [w, h, d], [-w, h, d]]),
            ([0.0, 0.0, -1.0], [[w, -h, -d], [-w, -h, -d], [-w, h, -d], [w, h, -d]]),
            ([0.0, 1.0, 0.0], [[-w, h, d], [w, h, d], [w, h, -d], [-w, h, -d]]),
            ([0.0, -1.0, 0.0], [[-w, -h, -d], [w, -h, -d], [w, -h, d], [-w, -h, d]]),
            ([1.0, 0.0, 0.0], [[w, -h, d], [w, -h, -d], [w, h, -d], [w, h, d]]),
            ([-1.0, 0.0, 0.0], [[-w, -h, -d], [-w, -h, d], [-w, h, d], [-w, h, -d]]),
        ];

        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (face, (normal, corners)) in faces.iter().enumerate() {
            let base = face as u32 * 4;
            positions.extend_from_slice(corners);
            normals.extend_from_slice(&[*normal; 4]);
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self::new(positions, normals, indices)
    }

    /// Merges every model of an OBJ file into one geometry.
    pub fn from_obj_models(models: &[tobj::Model]) -> Self {
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut indices = Vec::new();
        let mut complete_normals = true;

        for model in models {
            let mesh = &model.mesh;
            let base = positions.len() as u32;
            let count = mesh.positions.len() / 3;
            positions.extend(
                mesh.positions
                    .chunks_exact(3)
                    .map(|p| [p[0], p[1], p[2]]),
            );
            if mesh.normals.len() == mesh.positions.len() {
                normals.extend(mesh.normals.chunks_exact(3).map(|n| [n[0], n[1], n[2]]));
            } else {
                log::debug!("OBJ model `{}` has no normals, computing them", model.name);
                complete_normals = false;
                normals.extend(std::iter::repeat_n([0.0; 3], count));
            }
            indices.extend(mesh.indices.iter().map(|i| base + i));
        }

        if !complete_normals {
            normals.clear();
        }
        Self::new(positions, normals, indices)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn vertices(&self) -> Vec<Vertex> {
        self.positions
            .iter()
            .zip(&self.normals)
            .map(|(position, normal)| Vertex {
                position: *position,
                normal: *normal,
            })
            .collect()
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

fn face_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut sums = vec![Vec3::new(0.0, 0.0, 0.0); positions.len()];
    let at = |i: u32| {
        positions
            .get(i as usize)
            .map(|p| Vec3::new(p[0] as f64, p[1] as f64, p[2] as f64))
    };
    for triangle in indices.chunks_exact(3) {
        let (Some(a), Some(b), Some(c)) = (at(triangle[0]), at(triangle[1]), at(triangle[2])) else {
            continue;
        };
        let normal = (b - a).cross(c - a);
        for i in triangle {
            if let Some(sum) = sums.get_mut(*i as usize) {
                *sum += normal;
            }
        }
    }
    sums.into_iter()
        .map(|n| {
            let n = n.normalized();
            [n.x as f32, n.y as f32, n.z as f32]
        })
        .collect()
}

/// Mesh component: shared geometry drawn with an optional material.
///
/// Without a material the mesh is skipped, which is also what a failed shader
/// compilation leaves behind.
#[derive(Clone, Debug)]
pub struct MeshInstance {
    pub geometry: Arc<Geometry>,
    pub material: Option<Material>,
    pub cast_shadows: bool,
    /// Skip the draw when the bounding box is off screen.
    pub cull: bool,
}

impl MeshInstance {
    pub fn new(geometry: Arc<Geometry>, material: Option<Material>) -> Self {
        Self {
            geometry,
            material,
            cast_shadows: true,
            cull: true,
        }
    }

    pub fn without_shadows(mut self) -> Self {
        self.cast_shadows = false;
        self
    }

    pub fn without_culling(mut self) -> Self {
        self.cull = false;
        self
    }
}
