//! scene-ngin
//!
//! A small scene-graph engine for native and WASM targets. Nodes are placed in
//! a hierarchy of transforms, drawn with WGSL materials whose uniforms are
//! discovered by reflection, lit by a single directional light with PCF
//! shadows and faded by distance fog. A procedural terrain with a carved road
//! is evaluated identically on the CPU (for ground probes) and in the vertex
//! shader.
//!
//! High-level modules
//! - `camera`: camera component and projection math
//! - `context`: window surface, device and queue
//! - `data_structures`: math, scene graph, geometry and terrain
//! - `flow`: the event loop driving a scene
//! - `pipelines`: render pipelines, the directional light and fog
//! - `render`: per-frame render context and the renderer
//! - `resources`: asset loading and GPU mesh upload
//! - `shaders`: shader preprocessing, compilation and materials

pub mod camera;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod shaders;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use wgpu;
pub use winit::event::DeviceEvent;
pub use winit::event::WindowEvent;
