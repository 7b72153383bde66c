use std::{cell::Cell, rc::Rc};

use scene_ngin::{
    data_structures::{
        scene_graph::{Behavior, Node, NodeId, SceneTree},
        terrain::TerrainSurface,
    },
    shaders::{
        UniformSink,
        program::UniformSlot,
    },
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Counts how often the tree processes and renders a node.
pub struct Counter {
    pub processed: Rc<Cell<u32>>,
    pub rendered: Rc<Cell<u32>>,
}

impl Behavior for Counter {
    fn process(&mut self, _tree: &mut SceneTree, _id: NodeId, _dt: f64) {
        self.processed.set(self.processed.get() + 1);
    }

    fn render(&self, _tree: &SceneTree, _id: NodeId) {
        self.rendered.set(self.rendered.get() + 1);
    }
}

pub fn counted(name: &str) -> (Node, Rc<Cell<u32>>, Rc<Cell<u32>>) {
    let processed = Rc::new(Cell::new(0));
    let rendered = Rc::new(Cell::new(0));
    let node = Node::new(name).with_behavior(Counter {
        processed: processed.clone(),
        rendered: rendered.clone(),
    });
    (node, processed, rendered)
}

/// Binding layer that only records what it was asked to write.
#[derive(Default)]
pub struct RecordingSink {
    pub calls: Vec<String>,
}

impl UniformSink for RecordingSink {
    fn set_int(&mut self, _slot: &UniformSlot, value: i32) {
        self.calls.push(format!("int {value}"));
    }

    fn set_float(&mut self, _slot: &UniformSlot, value: f32) {
        self.calls.push(format!("float {value}"));
    }

    fn set_vec(&mut self, _slot: &UniformSlot, value: &[f32]) {
        self.calls.push(format!("vec{} {value:?}", value.len()));
    }

    fn set_mat4(&mut self, _slot: &UniformSlot, _value: &[f32; 16]) {
        self.calls.push("mat4".to_string());
    }
}

/// A tilted plane `y = slope * x` with a straight road along `x = 0`.
pub struct Ramp {
    pub slope: f64,
}

impl TerrainSurface for Ramp {
    fn height_at(&self, x: f64, _z: f64) -> f64 {
        self.slope * x
    }

    fn road_x(&self, _z: f64) -> f64 {
        0.0
    }
}
