//! Engine data structures: math, scene graph, geometry and terrain.
//!
//! - `vector`, `basis` and `transform` are the value types every node is placed with
//! - `color` is the RGB value type used by materials, lights and fog
//! - `scene_graph` enables hierarchical scene organization
//! - `state_machine` is a behavior switching between exclusive states
//! - `geometry` holds CPU meshes, bounding boxes and the mesh component
//! - `texture` contains the depth targets of the main and shadow passes
//! - `terrain` is the procedural height field with its road

pub mod basis;
pub mod color;
pub mod geometry;
pub mod scene_graph;
pub mod state_machine;
pub mod terrain;
pub mod texture;
pub mod transform;
pub mod vector;
