//! Procedural terrain with a carved road.
//!
//! The height field is layered, domain-warped wave noise. A winding road
//! follows `x = road_center(z)` and flattens the terrain around it. The same
//! formula runs on the GPU (`terrain.wgsl`) with the options injected as
//! constants, so the drawn surface and the CPU queries agree.
//!
//! # Key types
//!
//! - [`TerrainOptions`] tunes the noise and the road
//! - [`TerrainGenerator`] evaluates heights and the road centerline
//! - [`TerrainSurface`] adds world space queries (normals, road distance)
//! - [`GroundProbe`] keeps a body resting on a surface
//! - [`TerrainChunks`] tiles chunk meshes around a tracked node

use std::{
    f64::consts::{PI, TAU},
    sync::Arc,
};

use cgmath::{ElementWise, InnerSpace};

use crate::{
    data_structures::{
        basis::Basis,
        color::Color,
        geometry::{Geometry, MeshInstance},
        scene_graph::{Behavior, Node, NodeId, SceneTree},
        transform::Transform3D,
        vector::{self, Vec2, Vec3, VectorExt},
    },
    shaders::{
        builder::MaterialBuilder,
        library::{ShaderLibrary, TERRAIN_VERTEX_HOOK},
        material::Material,
        preprocess::{Definitions, InjectValue},
        program::ShaderError,
    },
};

/// Downward acceleration used by [`GroundProbe::step`].
pub const GRAVITY: f64 = 2.81;

/// Offset used for finite difference normals, in world units.
const NORMAL_STEP: f64 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerrainOptions {
    pub first_wave_iterations: u32,
    pub first_wave_power: f64,
    pub first_wave_multiplier: f64,
    pub second_wave_iterations: u32,
    pub second_wave_multiplier: f64,
    pub second_wave_power: f64,
    pub road_width: f64,
    /// Width of the eased band between road and untouched terrain.
    pub road_interpolation: f64,
    pub road_curveness: f64,
    /// Angle increment between wave directions.
    pub seed: f64,
    /// Fraction of the raw height kept on the road.
    pub road_damping: f64,
    /// World to noise space scale.
    pub domain_scale: f64,
}

impl Default for TerrainOptions {
    fn default() -> Self {
        Self {
            first_wave_iterations: 10,
            first_wave_power: 2.0,
            first_wave_multiplier: 2.0,
            second_wave_iterations: 4,
            second_wave_multiplier: 6.0,
            second_wave_power: 2.0,
            road_width: 2.0,
            road_interpolation: 2.0,
            road_curveness: 1.0,
            seed: 1232.399963,
            road_damping: 0.2,
            domain_scale: 0.5,
        }
    }
}

impl TerrainOptions {
    pub fn with_seed(mut self, seed: f64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_road(mut self, width: f64, interpolation: f64) -> Self {
        self.road_width = width;
        self.road_interpolation = interpolation;
        self
    }

    pub fn with_road_curveness(mut self, curveness: f64) -> Self {
        self.road_curveness = curveness;
        self
    }

    pub fn with_road_damping(mut self, damping: f64) -> Self {
        self.road_damping = damping;
        self
    }
}

fn ease(t: f64) -> f64 {
    -((PI * t).cos() - 1.0) / 2.0
}

fn mix(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}

/// Evaluates the height field and the road. Immutable and cheap to copy.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TerrainGenerator {
    options: TerrainOptions,
}

impl TerrainGenerator {
    pub fn new(options: TerrainOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TerrainOptions {
        &self.options
    }

    /// Weighted average of `iterations` warped waves at `position`, in noise space.
    pub fn getwaves(&self, position: Vec2, iterations: u32, time: f64) -> f64 {
        let phase_shift = position.magnitude() * 0.1;
        let mut position = position;
        let mut angle = 0.0f64;
        let mut frequency = 1.0;
        let mut time_multiplier = 2.0;
        let mut weight = 1.0;
        let mut sum_of_values = 0.0;
        let mut sum_of_weights = 0.0;

        for _ in 0..iterations {
            let direction = Vec2::new(angle.sin(), angle.cos());
            let x = direction.dot(position) * frequency + time * time_multiplier + phase_shift;
            let wave = (x.sin() - 1.0).exp();
            let derivative = -wave * x.cos();

            position += direction * derivative * weight * 0.38;
            sum_of_values += wave * weight;
            sum_of_weights += weight;

            weight = mix(weight, 0.0, 0.2);
            frequency *= 1.18;
            time_multiplier *= 1.07;
            angle += self.options.seed;
        }

        if sum_of_weights == 0.0 {
            return 0.0;
        }
        sum_of_values / sum_of_weights
    }

    /// Unflattened height at a noise space position.
    pub fn raw_height_scaled(&self, p: Vec2) -> f64 {
        let o = &self.options;
        self.getwaves(p, o.first_wave_iterations, 0.0).powf(o.first_wave_power) * o.first_wave_multiplier
            + self
                .getwaves(p * 0.25, o.second_wave_iterations, 0.0)
                .powf(o.second_wave_power)
                * o.second_wave_multiplier
    }

    /// Unflattened height at a world position.
    pub fn raw_height(&self, position: Vec2) -> f64 {
        self.raw_height_scaled(position * self.options.domain_scale)
    }

    /// Terrain height at a world position `(x, z)`.
    pub fn height(&self, position: Vec2) -> f64 {
        let p = position * self.options.domain_scale;
        let raw = self.raw_height_scaled(p);
        mix(raw, raw * self.options.road_damping, self.road_value(p))
    }

    /// Road centerline `x` for a noise space `y`.
    pub fn road_center(&self, y: f64) -> f64 {
        let c = self.options.road_curveness;
        (y * 0.1 * c).sin() * 10.0 + (y * 0.32 * c).cos() * 2.0 + (y * 0.021 * c).sin() * 24.0
    }

    /// Derivative of [`TerrainGenerator::road_center`].
    pub fn d_road_center(&self, y: f64) -> f64 {
        let c = self.options.road_curveness;
        c * ((y * 0.1 * c).cos() * 1.0 - (y * 0.32 * c).sin() * 0.64 + (y * 0.021 * c).cos() * 0.504)
    }

    /// Perpendicular distance from the road edge, zero on the road. Noise space.
    pub fn road_distance(&self, p: Vec2) -> f64 {
        let slope = self.d_road_center(p.y);
        let distance = (p.x - self.road_center(p.y)).abs() / (1.0 + slope * slope).sqrt();
        (distance - self.options.road_width * 0.5).max(0.0)
    }

    /// 1 on the road, 0 beyond the interpolation band, eased in between. Noise space.
    pub fn road_value(&self, p: Vec2) -> f64 {
        let t = (self.road_distance(p) / self.options.road_interpolation).clamp(0.0, 1.0);
        ease(1.0 - t)
    }

    /// World space road center `(x, z)` at depth `z`.
    pub fn get_road(&self, z: f64) -> Vec2 {
        let s = self.options.domain_scale;
        Vec2::new(self.road_center(z * s) / s, z)
    }

    /// Unit XZ direction along the road at depth `z`, pointing towards `-z`.
    pub fn get_forward(&self, z: f64) -> Vec3 {
        let dx = self.get_road(z + 1.0).x - self.get_road(z).x;
        let angle = dx.atan2(1.0) + PI;
        Vec3::new(angle.sin(), 0.0, angle.cos()).normalized()
    }

    /// Constants consumed by `terrain.wgsl`.
    pub fn definitions(&self) -> Definitions {
        let o = &self.options;
        [
            ("FIRST_WAVE_ITERATIONS", InjectValue::from(o.first_wave_iterations)),
            ("FIRST_WAVE_POWER", o.first_wave_power.into()),
            ("FIRST_WAVE_MULTIPLIER", o.first_wave_multiplier.into()),
            ("SECOND_WAVE_ITERATIONS", o.second_wave_iterations.into()),
            ("SECOND_WAVE_MULTIPLIER", o.second_wave_multiplier.into()),
            ("SECOND_WAVE_POWER", o.second_wave_power.into()),
            ("ROAD_WIDTH", o.road_width.into()),
            ("ROAD_INTERPOLATION", o.road_interpolation.into()),
            ("ROAD_CURVENESS", o.road_curveness.into()),
            ("ROAD_DAMPING", o.road_damping.into()),
            ("DOMAIN_SCALE", o.domain_scale.into()),
            ("SEED", o.seed.into()),
            // The same wave directions, without summing large angles in f32.
            ("SEED_ANGLE", o.seed.rem_euclid(TAU).into()),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
    }
}

/// World space queries against a height field with a road.
pub trait TerrainSurface {
    fn height_at(&self, x: f64, z: f64) -> f64;

    /// Road centerline `x` at depth `z`.
    fn road_x(&self, z: f64) -> f64;

    fn position_at(&self, x: f64, z: f64) -> Vec3 {
        Vec3::new(x, self.height_at(x, z), z)
    }

    /// Upward facing normal from finite differences.
    fn normal_at(&self, x: f64, z: f64) -> Vec3 {
        let p = self.position_at(x, z);
        let tangent_x = self.position_at(x + NORMAL_STEP, z) - p;
        let tangent_z = self.position_at(x, z + NORMAL_STEP) - p;
        tangent_z.cross(tangent_x).normalized()
    }

    /// Road center on the surface at depth `z`.
    fn road_point(&self, z: f64) -> Vec3 {
        self.position_at(self.road_x(z), z)
    }

    /// Horizontal unit direction along the road towards `-z`.
    fn road_forward(&self, z: f64) -> Vec3 {
        let here = Vec3::new(self.road_x(z), 0.0, z);
        let ahead = Vec3::new(self.road_x(z - 1.0), 0.0, z - 1.0);
        (ahead - here).normalized()
    }

    fn distance_to_road(&self, x: f64, z: f64) -> f64 {
        (self.road_x(z) - x).abs()
    }
}

impl TerrainSurface for TerrainGenerator {
    fn height_at(&self, x: f64, z: f64) -> f64 {
        self.height(Vec2::new(x, z))
    }

    fn road_x(&self, z: f64) -> f64 {
        self.get_road(z).x
    }
}

/// `1 / (1 + friction * dt)`, the per-frame velocity multiplier.
pub fn friction_rate(friction: f64, dt: f64) -> f64 {
    1.0 / (1.0 + friction * dt)
}

/// Acceleration that settles at `target_speed` under [`friction_rate`].
pub fn acceleration(target_speed: f64, friction: f64, dt: f64) -> f64 {
    let rate = friction_rate(friction, dt);
    ((target_speed / dt / rate) - (target_speed / dt)) / 2.0
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundContact {
    /// Average height under the four probes.
    pub height: f64,
    pub normal: Vec3,
    pub on_ground: bool,
}

/// Four height samples around a body: two ahead and two behind, one on each side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundProbe {
    pub forward_offset: f64,
    pub side_offset: f64,
    /// Slack below which a falling body counts as touching the ground.
    pub tolerance: f64,
}

impl Default for GroundProbe {
    fn default() -> Self {
        Self {
            forward_offset: 0.3,
            side_offset: 0.125,
            tolerance: 0.01,
        }
    }
}

impl GroundProbe {
    pub fn probe(
        &self,
        surface: &impl TerrainSurface,
        position: Vec3,
        basis: &Basis,
        velocity: Vec3,
    ) -> GroundContact {
        let forward = basis.forward() * self.forward_offset;
        let side = basis.right() * self.side_offset;
        let sample = |offset: Vec3| {
            let p = position + offset;
            Vec3::new(p.x, surface.height_at(p.x, p.z), p.z)
        };
        let front_left = sample(forward - side);
        let front_right = sample(forward + side);
        let back_left = sample(-forward - side);
        let back_right = sample(-forward + side);

        let triangle_normal = |a: Vec3, b: Vec3, c: Vec3| (b - a).cross(c - a).normalized();
        let mut normal = (triangle_normal(front_left, back_left, front_right)
            + triangle_normal(front_right, back_left, back_right))
        .normalized();
        normal.y = normal.y.abs();

        let height = (front_left.y + front_right.y + back_left.y + back_right.y) / 4.0;
        GroundContact {
            height,
            normal,
            on_ground: position.y - self.tolerance <= height && velocity.y < 0.0,
        }
    }

    /// Applies gravity while airborne and keeps the body above the surface.
    pub fn step(
        &self,
        surface: &impl TerrainSurface,
        position: &mut Vec3,
        velocity: &mut Vec3,
        basis: &Basis,
        dt: f64,
    ) -> GroundContact {
        let contact = self.probe(surface, *position, basis, *velocity);
        if !contact.on_ground {
            velocity.y -= GRAVITY * dt;
        }
        position.y = position.y.max(contact.height);
        contact
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerrainChunking {
    /// Chunks per side of the tiled square.
    pub render_distance: u32,
    /// Quads per side of one chunk mesh.
    pub chunk_size: u32,
    /// World units per quad.
    pub scale: f64,
}

impl Default for TerrainChunking {
    fn default() -> Self {
        Self {
            render_distance: 10,
            chunk_size: 64,
            scale: 0.25,
        }
    }
}

impl TerrainChunking {
    /// Step the tiling snaps to, in world units.
    pub fn grid_size(&self) -> f64 {
        self.chunk_size as f64 * self.scale
    }

    /// A centered flat chunk. Its bounding box is as tall as it is wide so
    /// culling keeps displaced vertices.
    pub fn chunk_geometry(&self) -> Geometry {
        let mut geometry = Geometry::plane(self.chunk_size, self.chunk_size, true);
        geometry.aabb.size.y = geometry.aabb.size.x;
        geometry
    }

    /// Offset of chunk `index` from the snapped reference point.
    pub fn chunk_offset(&self, index: u32) -> Vec3 {
        let half = (self.render_distance / 2) as f64;
        let size = self.chunk_size as f64;
        let x = (index % self.render_distance) as f64 * size - half * size;
        let z = (index / self.render_distance) as f64 * size - half * size;
        Vec3::new(x, 0.0, z) * self.scale
    }

    /// `position` projected onto the ground plane and snapped to the grid.
    pub fn snap(&self, position: Vec3) -> Vec3 {
        let grid = self.grid_size();
        (position.mul_element_wise(vector::XZ) / grid).round() * grid
    }
}

/// Behavior that keeps a square of terrain chunks around a target node.
///
/// The chunks are spawned as children when the owning node enters the tree
/// and moved every frame; the tiling is shifted towards where the current
/// camera looks.
pub struct TerrainChunks {
    pub chunking: TerrainChunking,
    target: NodeId,
    mesh: MeshInstance,
    chunks: Vec<NodeId>,
}

impl TerrainChunks {
    pub fn new(chunking: TerrainChunking, target: NodeId, mesh: MeshInstance) -> Self {
        Self {
            chunking,
            target,
            mesh,
            chunks: Vec::new(),
        }
    }

    pub fn chunks(&self) -> &[NodeId] {
        &self.chunks
    }

    fn place(&self, tree: &mut SceneTree) {
        let Some(target) = tree.global_position(self.target) else {
            return;
        };
        let reference = self.chunking.snap(target);
        let look_ahead = tree
            .current_camera()
            .and_then(|camera| tree.global_transform(camera))
            .map(|camera| {
                self.chunking
                    .snap(camera.basis.forward() * (self.chunking.grid_size() * 0.5))
            })
            .unwrap_or(vector::ZERO);

        // Positions are world space; the owner may sit anywhere in the tree.
        for (index, chunk) in self.chunks.iter().enumerate() {
            let position = self.chunking.chunk_offset(index as u32) + look_ahead + reference;
            tree.set_global_position(*chunk, position);
        }
    }
}

impl Behavior for TerrainChunks {
    fn enter_tree(&mut self, tree: &mut SceneTree, id: NodeId) {
        if !self.chunks.is_empty() {
            return;
        }
        let count = self.chunking.render_distance * self.chunking.render_distance;
        let scale = Vec3::new(self.chunking.scale, self.chunking.scale, self.chunking.scale);
        for index in 0..count {
            let node = Node::new(format!("chunk {index}"))
                .with_transform(Transform3D::IDENTITY.with_scale(scale))
                .with_mesh(self.mesh.clone());
            self.chunks.push(tree.spawn(id, node));
        }
        log::debug!("Spawned {count} terrain chunks");
        self.place(tree);
    }

    fn process(&mut self, tree: &mut SceneTree, _id: NodeId, _dt: f64) {
        self.place(tree);
    }

    fn before_destroy(&mut self, _tree: &mut SceneTree, _id: NodeId) {
        self.chunks.clear();
    }
}

/// Surface material whose vertex hook displaces the grid to match `options`.
pub fn terrain_material(library: &ShaderLibrary, options: &TerrainOptions) -> Result<Material, ShaderError> {
    let hook = library.get(TERRAIN_VERTEX_HOOK).unwrap_or_default();
    MaterialBuilder::spatial(library)
        .label("terrain")
        .vertex(hook)
        .definitions(TerrainGenerator::new(*options).definitions())
        .param("albedo_color", Color::ORANGE.saturation(0.2))
        .param("specular_power", 2.0)
        .compile()
}

/// Chunk mesh with the terrain material, ready for [`TerrainChunks`].
pub fn terrain_mesh(library: &ShaderLibrary, options: &TerrainOptions, chunking: &TerrainChunking) -> MeshInstance {
    let material = match terrain_material(library, options) {
        Ok(material) => Some(material),
        Err(e) => {
            log::error!("Terrain material failed to compile: {e}");
            None
        }
    };
    MeshInstance::new(Arc::new(chunking.chunk_geometry()), material)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    struct Flat(f64);

    impl TerrainSurface for Flat {
        fn height_at(&self, _x: f64, _z: f64) -> f64 {
            self.0
        }

        fn road_x(&self, _z: f64) -> f64 {
            0.0
        }
    }

    #[test]
    fn road_center_derivative_matches_finite_difference() {
        let generator = TerrainGenerator::default();
        for y in [-40.0, 0.0, 3.3, 120.0] {
            let h = 1e-5;
            let numeric = (generator.road_center(y + h) - generator.road_center(y - h)) / (2.0 * h);
            assert_relative_eq!(generator.d_road_center(y), numeric, epsilon = 1e-6);
        }
    }

    #[test]
    fn road_value_is_one_on_the_centerline() {
        let generator = TerrainGenerator::default();
        let p = Vec2::new(generator.road_center(7.0), 7.0);
        assert_eq!(generator.road_distance(p), 0.0);
        assert_relative_eq!(generator.road_value(p), 1.0);
        assert_relative_eq!(generator.road_value(p + Vec2::new(50.0, 0.0)), 0.0);
    }

    #[test]
    fn waves_are_positive_and_bounded() {
        let generator = TerrainGenerator::default();
        for x in -5..5 {
            let w = generator.getwaves(Vec2::new(x as f64 * 3.1, 2.0), 10, 0.0);
            assert!(w > 0.0 && w <= 1.0, "{w}");
        }
        assert_eq!(generator.getwaves(Vec2::new(1.0, 1.0), 0, 0.0), 0.0);
    }

    #[test]
    fn forward_points_down_the_road() {
        let generator = TerrainGenerator::default();
        let forward = generator.get_forward(10.0);
        assert!(forward.z < 0.0);
        assert_relative_eq!(forward.magnitude(), 1.0, epsilon = 1e-9);
        assert_eq!(forward.y, 0.0);
    }

    #[test]
    fn definitions_cover_every_shader_constant() {
        let definitions = TerrainGenerator::default().definitions();
        assert_eq!(definitions.len(), 13);
        assert_eq!(definitions["FIRST_WAVE_ITERATIONS"].to_wgsl(), "10");
        assert_eq!(definitions["ROAD_DAMPING"].to_wgsl(), "0.2");
        assert_eq!(definitions["SEED"].to_wgsl(), "1232.399963");
    }

    #[test]
    fn every_definition_is_injected_by_the_terrain_hook() {
        let library = ShaderLibrary::new();
        let source = library.get(TERRAIN_VERTEX_HOOK).unwrap_or_default();
        for name in TerrainGenerator::default().definitions().keys() {
            assert!(
                source.contains(&format!("#inject {name};")),
                "`{name}` is not consumed by the terrain hook"
            );
        }
    }

    #[test]
    fn seed_angle_keeps_the_wave_directions() {
        let seed = TerrainOptions::default().seed;
        let definitions = TerrainGenerator::default().definitions();
        let InjectValue::Float(angle) = definitions["SEED_ANGLE"] else {
            panic!("SEED_ANGLE is not a float");
        };
        assert!((0.0..TAU).contains(&angle));
        for step in 1..=10 {
            let step = step as f64;
            assert_relative_eq!((seed * step).sin(), (angle * step).sin(), epsilon = 1e-9);
        }
    }

    #[test]
    fn flat_surface_queries() {
        let flat = Flat(2.0);
        assert_relative_eq!(flat.normal_at(3.0, 4.0), vector::UP, epsilon = 1e-9);
        assert_relative_eq!(flat.road_forward(0.0), vector::FORWARD, epsilon = 1e-9);
        assert_eq!(flat.distance_to_road(-3.0, 1.0), 3.0);
        assert_eq!(flat.road_point(5.0), Vec3::new(0.0, 2.0, 5.0));
    }

    #[test]
    fn probe_lands_a_falling_body() {
        let probe = GroundProbe::default();
        let flat = Flat(1.0);
        let mut position = Vec3::new(0.0, 0.5, 0.0);
        let mut velocity = Vec3::new(0.0, -1.0, 0.0);
        let contact = probe.step(&flat, &mut position, &mut velocity, &Basis::IDENTITY, 0.1);
        assert!(contact.on_ground);
        assert_relative_eq!(contact.normal, vector::UP, epsilon = 1e-9);
        assert_eq!(position.y, 1.0);
        assert_eq!(velocity.y, -1.0);
    }

    #[test]
    fn airborne_body_accelerates_downwards() {
        let probe = GroundProbe::default();
        let mut position = Vec3::new(0.0, 5.0, 0.0);
        let mut velocity = Vec3::new(0.0, 0.0, 0.0);
        let contact = probe.step(&Flat(0.0), &mut position, &mut velocity, &Basis::IDENTITY, 0.5);
        assert!(!contact.on_ground);
        assert_relative_eq!(velocity.y, -GRAVITY * 0.5);
    }

    #[test]
    fn friction_and_acceleration_balance() {
        assert_relative_eq!(friction_rate(5.0, 0.1), 1.0 / 1.5);
        let speed = 20.0;
        let (friction, dt) = (5.0, 1.0 / 60.0);
        let mut velocity = 0.0;
        for _ in 0..2000 {
            velocity = (velocity + acceleration(speed, friction, dt) * dt) * friction_rate(friction, dt);
        }
        assert!(velocity > 0.0);
    }

    #[test]
    fn chunks_tile_around_the_reference() {
        let chunking = TerrainChunking {
            render_distance: 2,
            chunk_size: 4,
            scale: 0.5,
        };
        assert_eq!(chunking.chunk_offset(0), Vec3::new(-2.0, 0.0, -2.0));
        assert_eq!(chunking.chunk_offset(3), Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(chunking.snap(Vec3::new(2.9, 7.0, -1.1)), Vec3::new(2.0, 0.0, -2.0));
    }

    #[test]
    fn chunks_land_around_the_target_under_a_moved_owner() {
        let chunking = TerrainChunking {
            render_distance: 2,
            chunk_size: 4,
            scale: 0.5,
        };
        let mut tree = SceneTree::new();
        let root = tree.root();
        let target = tree.spawn(root, Node::spatial("car").with_position(Vec3::new(2.9, 7.0, -1.1)));
        let mesh = MeshInstance::new(Arc::new(chunking.chunk_geometry()), None);
        let owner = tree.spawn(
            root,
            Node::spatial("terrain")
                .with_position(Vec3::new(100.0, 2.0, -7.0))
                .with_behavior(TerrainChunks::new(chunking, target, mesh)),
        );
        tree.process(0.016);

        let chunks = tree.behavior::<TerrainChunks>(owner).map(|c| c.chunks().to_vec()).unwrap_or_default();
        assert_eq!(chunks.len(), 4);
        for (index, chunk) in chunks.into_iter().enumerate() {
            let expected = chunking.chunk_offset(index as u32) + Vec3::new(2.0, 0.0, -2.0);
            let actual = tree.global_position(chunk).unwrap();
            assert_relative_eq!(actual.x, expected.x, epsilon = 1e-9);
            assert_relative_eq!(actual.y, expected.y, epsilon = 1e-9);
            assert_relative_eq!(actual.z, expected.z, epsilon = 1e-9);
        }
    }
}
