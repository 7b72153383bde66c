//! Scene graph and hierarchical scene organization.
//!
//! Nodes live in a [`SceneTree`] arena and are addressed by [`NodeId`]. The
//! tree owns every node; parent and child links are plain ids, so detaching a
//! subtree never drops it. A detached subtree stays alive until
//! [`SceneTree::free`] is called on it.
//!
//! # Key types
//!
//! - [`Node`] is a bag of optional components (transform, camera, light, fog,
//!   mesh) plus an optional [`Behavior`] with lifecycle hooks
//! - [`SceneTree`] links nodes, walks them every frame and dispatches
//!   [`NodeEvent`]s to per-node listeners
//! - [`Subscription`] is the handle returned by [`SceneTree::subscribe`]
//!
//! # Lifecycle
//!
//! 1. [`SceneTree::create`] makes a detached node
//! 2. [`SceneTree::add_child`] links it and calls [`Behavior::enter_tree`] on
//!    the new subtree, parents first
//! 3. [`SceneTree::process`] calls [`Behavior::process`] every frame on enabled
//!    nodes reachable from the root
//! 4. [`SceneTree::remove_child`] calls [`Behavior::before_destroy`], children
//!    first, and unlinks the subtree

use std::{any::Any, collections::HashMap, fmt::Debug};

use slotmap::{SlotMap, new_key_type};

use crate::{
    camera::Camera,
    data_structures::{geometry::MeshInstance, transform::Transform3D, vector::Vec3},
    pipelines::{fog::Fog, light::DirectionalLight},
};

new_key_type! {
    /// Handle of a node inside a [`SceneTree`].
    pub struct NodeId;
}

/// Events delivered to node listeners.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeEvent {
    ChildAdded(NodeId),
    ChildRemoved(NodeId),
    StateChanged,
    StateEnded,
    Custom(String),
}

/// What a listener subscribes to. Custom events match on their name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    ChildAdded,
    ChildRemoved,
    StateChanged,
    StateEnded,
    Custom(String),
}

impl NodeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            NodeEvent::ChildAdded(_) => EventKind::ChildAdded,
            NodeEvent::ChildRemoved(_) => EventKind::ChildRemoved,
            NodeEvent::StateChanged => EventKind::StateChanged,
            NodeEvent::StateEnded => EventKind::StateEnded,
            NodeEvent::Custom(name) => EventKind::Custom(name.clone()),
        }
    }
}

pub type Listener = Box<dyn FnMut(&NodeEvent)>;

struct ListenerEntry {
    id: u64,
    kind: EventKind,
    once: bool,
    callback: Listener,
}

/// Disposer for a listener registered with [`SceneTree::subscribe`] or [`SceneTree::once`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Subscription {
    node: NodeId,
    id: u64,
}

/// Per-node logic driven by the tree.
///
/// While a hook runs the behavior is detached from its node, so the hook gets
/// full mutable access to the tree. Looking up the behavior of the running
/// node from inside its own hook returns `None`.
pub trait Behavior: Any {
    /// Called when the node (or one of its ancestors) is attached to a parent.
    fn enter_tree(&mut self, _tree: &mut SceneTree, _id: NodeId) {}

    /// Called before the node (or one of its ancestors) is detached.
    fn before_destroy(&mut self, _tree: &mut SceneTree, _id: NodeId) {}

    /// Called once per frame with the elapsed time in seconds.
    fn process(&mut self, _tree: &mut SceneTree, _id: NodeId, _dt: f64) {}

    /// Called during the draw walk before the node's own components are drawn.
    fn render(&self, _tree: &SceneTree, _id: NodeId) {}
}

/// A scene node: a name, metadata, optional components and an optional behavior.
pub struct Node {
    pub name: String,
    pub enabled: bool,
    pub meta: HashMap<String, String>,
    pub transform: Option<Transform3D>,
    pub camera: Option<Camera>,
    pub light: Option<DirectionalLight>,
    pub fog: Option<Fog>,
    pub mesh: Option<MeshInstance>,
    behavior: Option<Box<dyn Behavior>>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<ListenerEntry>,
}

impl Default for Node {
    fn default() -> Self {
        Self::new("Node")
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("meta", &self.meta)
            .field("transform", &self.transform)
            .field("camera", &self.camera)
            .field("light", &self.light)
            .field("fog", &self.fog)
            .field("mesh", &self.mesh)
            .field("has_behavior", &self.behavior.is_some())
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            meta: HashMap::new(),
            transform: None,
            camera: None,
            light: None,
            fog: None,
            mesh: None,
            behavior: None,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// A node with an identity transform, the usual starting point for anything placed in space.
    pub fn spatial(name: impl Into<String>) -> Self {
        Self::new(name).with_transform(Transform3D::IDENTITY)
    }

    pub fn with_transform(mut self, transform: Transform3D) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform.get_or_insert(Transform3D::IDENTITY).position = position;
        self
    }

    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn with_light(mut self, light: DirectionalLight) -> Self {
        self.light = Some(light);
        self
    }

    pub fn with_fog(mut self, fog: Fog) -> Self {
        self.fog = Some(fog);
        self
    }

    pub fn with_mesh(mut self, mesh: MeshInstance) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_behavior(mut self, behavior: impl Behavior) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena owning every node of a scene.
pub struct SceneTree {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
    current_camera: Option<NodeId>,
    current_light: Option<NodeId>,
    current_fog: Option<NodeId>,
    time: f64,
    next_listener: u64,
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for SceneTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneTree")
            .field("nodes", &self.nodes.len())
            .field("root", &self.root)
            .field("current_camera", &self.current_camera)
            .field("current_light", &self.current_light)
            .field("current_fog", &self.current_fog)
            .field("time", &self.time)
            .finish()
    }
}

impl SceneTree {
    /// A tree holding only its root node, named `Scene`.
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::spatial("Scene"));
        Self {
            nodes,
            root,
            current_camera: None,
            current_light: None,
            current_fog: None,
            time: 0.0,
            next_listener: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Inserts a detached node.
    pub fn create(&mut self, node: Node) -> NodeId {
        self.nodes.insert(node)
    }

    /// Inserts `node` and attaches it under `parent`.
    pub fn spawn(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = self.create(node);
        self.add_child(parent, id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Position of the node among its siblings, `None` for detached nodes.
    pub fn index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Moves the node to `index` among its siblings. Indices past the end move it last.
    ///
    /// # Panics
    ///
    /// Panics when the node has no parent.
    pub fn set_index(&mut self, id: NodeId, index: usize) {
        let parent = self.parent(id);
        assert!(parent.is_some(), "set_index: node {id:?} has no parent");
        let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p)) else {
            return;
        };
        parent.children.retain(|&c| c != id);
        let index = index.min(parent.children.len());
        parent.children.insert(index, id);
    }

    /// The topmost ancestor of `id`, or `id` itself when it has no parent.
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// True when `ancestor` lies on the parent chain of `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// `id` and all its descendants, parents before children.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if !self.contains(node) {
                continue;
            }
            out.push(node);
            stack.extend(self.children(node).iter().rev());
        }
        out
    }

    fn post_order(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for &child in self.children(id) {
            self.post_order(child, out);
        }
        out.push(id);
    }

    /// Attaches `child` as the last child of `parent` and returns it.
    ///
    /// # Panics
    ///
    /// Panics when either id is not a live node, when `child` already has a
    /// parent (or is the tree root) and when the link would create a cycle.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> NodeId {
        assert!(self.contains(parent), "add_child: parent {parent:?} is not a live node");
        assert!(self.contains(child), "add_child: child {child:?} is not a live node");
        assert!(
            child != self.root && self.parent(child).is_none(),
            "add_child: child {child:?} is already attached"
        );
        assert!(
            child != parent && !self.is_ancestor(child, parent),
            "add_child: attaching {child:?} under {parent:?} would create a cycle"
        );

        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);

        for id in self.descendants(child) {
            self.with_behavior(id, |behavior, tree| behavior.enter_tree(tree, id));
        }

        let event = NodeEvent::ChildAdded(child);
        self.trigger(parent, &event);
        let root = self.root_of(parent);
        if root != parent {
            self.trigger(root, &event);
        }
        child
    }

    /// Detaches `child` from `parent`. Returns false, doing nothing, when it is not a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.children(parent).contains(&child) {
            return false;
        }

        let mut order = Vec::new();
        self.post_order(child, &mut order);
        for id in order {
            self.with_behavior(id, |behavior, tree| behavior.before_destroy(tree, id));
        }

        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|&c| c != child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = None;
        }

        let event = NodeEvent::ChildRemoved(child);
        self.trigger(parent, &event);
        let root = self.root_of(parent);
        if root != parent {
            self.trigger(root, &event);
        }
        true
    }

    /// Detaches `id` if needed and drops it together with its subtree.
    pub fn free(&mut self, id: NodeId) {
        if id == self.root {
            log::warn!("Refusing to free the scene root");
            return;
        }
        if let Some(parent) = self.parent(id) {
            self.remove_child(parent, id);
        }
        for node in self.descendants(id) {
            self.nodes.remove(node);
        }
        for current in [
            &mut self.current_camera,
            &mut self.current_light,
            &mut self.current_fog,
        ] {
            if current.is_some_and(|c| !self.nodes.contains_key(c)) {
                *current = None;
            }
        }
    }

    /// First node named `name` in the subtree of `from`, searched depth first.
    pub fn find_by_name(&self, from: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(from)
            .into_iter()
            .find(|&id| self.nodes[id].name == name)
    }

    /// Nodes under the root carrying the metadata key `key`.
    pub fn nodes_with_meta(&self, key: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&id| self.nodes[id].meta.contains_key(key))
            .collect()
    }

    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.enabled = enabled;
        }
    }

    pub fn behavior<T: Behavior>(&self, id: NodeId) -> Option<&T> {
        let behavior: &dyn Any = self.nodes.get(id)?.behavior.as_deref()?;
        behavior.downcast_ref::<T>()
    }

    pub fn behavior_mut<T: Behavior>(&mut self, id: NodeId) -> Option<&mut T> {
        let behavior: &mut dyn Any = self.nodes.get_mut(id)?.behavior.as_deref_mut()?;
        behavior.downcast_mut::<T>()
    }

    pub fn set_behavior(&mut self, id: NodeId, behavior: impl Behavior) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.behavior = Some(Box::new(behavior));
        }
    }

    /// Runs `f` on the behavior of `id` if it is a `T`, detached from the tree
    /// so `f` may mutate the tree freely.
    pub fn with_behavior_mut<T: Behavior, R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut T, &mut SceneTree) -> R,
    ) -> Option<R> {
        let mut result = None;
        self.with_behavior(id, |behavior, tree| {
            let any: &mut dyn Any = behavior;
            if let Some(typed) = any.downcast_mut::<T>() {
                result = Some(f(typed, tree));
            }
        });
        result
    }

    /// Runs `f` with the behavior of `id` temporarily taken out of its node.
    fn with_behavior(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut (dyn Behavior + 'static), &mut SceneTree),
    ) {
        let Some(mut behavior) = self.nodes.get_mut(id).and_then(|n| n.behavior.take()) else {
            return;
        };
        f(behavior.as_mut(), self);
        // The hook may have freed its own node or installed a replacement.
        if let Some(node) = self.nodes.get_mut(id)
            && node.behavior.is_none()
        {
            node.behavior = Some(behavior);
        }
    }

    // Events

    /// Registers `callback` for events of `kind` triggered on `node`.
    pub fn subscribe(
        &mut self,
        node: NodeId,
        kind: EventKind,
        callback: impl FnMut(&NodeEvent) + 'static,
    ) -> Subscription {
        self.add_listener(node, kind, Box::new(callback), false)
    }

    /// Like [`SceneTree::subscribe`] but the listener is dropped after its first call.
    pub fn once(
        &mut self,
        node: NodeId,
        kind: EventKind,
        callback: impl FnMut(&NodeEvent) + 'static,
    ) -> Subscription {
        self.add_listener(node, kind, Box::new(callback), true)
    }

    fn add_listener(
        &mut self,
        node: NodeId,
        kind: EventKind,
        callback: Listener,
        once: bool,
    ) -> Subscription {
        let id = self.next_listener;
        self.next_listener += 1;
        match self.nodes.get_mut(node) {
            Some(n) => n.listeners.push(ListenerEntry {
                id,
                kind,
                once,
                callback,
            }),
            None => log::warn!("Listener registered on missing node {node:?} is ignored"),
        }
        Subscription { node, id }
    }

    /// Removes a listener. Returns false when it was already gone.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let Some(node) = self.nodes.get_mut(subscription.node) else {
            return false;
        };
        let before = node.listeners.len();
        node.listeners.retain(|l| l.id != subscription.id);
        node.listeners.len() != before
    }

    /// Delivers `event` synchronously to the listeners of `node` only.
    pub fn trigger(&mut self, node: NodeId, event: &NodeEvent) {
        let Some(n) = self.nodes.get_mut(node) else {
            return;
        };
        let kind = event.kind();
        n.listeners.retain_mut(|listener| {
            if listener.kind != kind {
                return true;
            }
            (listener.callback)(event);
            !listener.once
        });
    }

    /// Triggers `event` on `node` and then on every ancestor up to the top.
    pub fn trigger_global(&mut self, node: NodeId, event: &NodeEvent) {
        let mut current = Some(node);
        while let Some(id) = current {
            self.trigger(id, event);
            current = self.parent(id);
        }
    }

    // Spatial

    pub fn transform(&self, id: NodeId) -> Option<&Transform3D> {
        self.nodes.get(id)?.transform.as_ref()
    }

    pub fn transform_mut(&mut self, id: NodeId) -> Option<&mut Transform3D> {
        self.nodes.get_mut(id)?.transform.as_mut()
    }

    /// Composes the local transform with its ancestors' up to the first one without a transform.
    pub fn global_transform(&self, id: NodeId) -> Option<Transform3D> {
        let mut global = *self.transform(id)?;
        let mut current = self.parent(id);
        while let Some(parent) = current {
            let Some(transform) = self.transform(parent) else {
                break;
            };
            global = transform.multiply(&global);
            current = self.parent(parent);
        }
        Some(global)
    }

    pub fn global_position(&self, id: NodeId) -> Option<Vec3> {
        self.global_transform(id).map(|t| t.position)
    }

    /// Sets the local position so that the node ends up at `position` in world space.
    pub fn set_global_position(&mut self, id: NodeId, position: Vec3) {
        let parent_global = self.parent(id).and_then(|p| self.global_transform(p));
        let local = match parent_global {
            Some(parent) => parent.inverse().transform_point(position),
            None => position,
        };
        if let Some(transform) = self.transform_mut(id) {
            transform.position = local;
        }
    }

    // Current camera, light and fog

    pub fn make_current_camera(&mut self, id: NodeId) {
        self.current_camera = Some(id);
    }

    pub fn current_camera(&self) -> Option<NodeId> {
        self.current_camera
            .filter(|&id| self.get(id).is_some_and(|n| n.camera.is_some()))
    }

    pub fn make_current_light(&mut self, id: NodeId) {
        self.current_light = Some(id);
    }

    pub fn current_light(&self) -> Option<NodeId> {
        self.current_light
            .filter(|&id| self.get(id).is_some_and(|n| n.light.is_some()))
    }

    pub fn make_current_fog(&mut self, id: NodeId) {
        self.current_fog = Some(id);
    }

    pub fn current_fog(&self) -> Option<NodeId> {
        self.current_fog
            .filter(|&id| self.get(id).is_some_and(|n| n.fog.is_some()))
    }

    // Frame

    /// Seconds accumulated by [`SceneTree::process`].
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Walks the enabled part of the tree, parents before children, calling [`Behavior::process`].
    pub fn process(&mut self, dt: f64) {
        self.time += dt;
        self.process_node(self.root, dt);
    }

    fn process_node(&mut self, id: NodeId, dt: f64) {
        if !self.get(id).is_some_and(|n| n.enabled) {
            return;
        }
        self.with_behavior(id, |behavior, tree| behavior.process(tree, id, dt));
        let children = self.children(id).to_vec();
        for child in children {
            // An earlier sibling's hook may have freed, detached or moved it.
            if self.parent(child) == Some(id) {
                self.process_node(child, dt);
            }
        }
    }

    /// Walks the enabled part of the tree in draw order, calling [`Behavior::render`]
    /// and then `visitor` for every node.
    pub fn render(&self, mut visitor: impl FnMut(&SceneTree, NodeId)) {
        self.render_node(self.root, &mut visitor);
    }

    fn render_node(&self, id: NodeId, visitor: &mut dyn FnMut(&SceneTree, NodeId)) {
        let Some(node) = self.get(id) else {
            return;
        };
        if !node.enabled {
            return;
        }
        if let Some(behavior) = &node.behavior {
            behavior.render(self, id);
        }
        visitor(self, id);
        for &child in &node.children {
            self.render_node(child, visitor);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use approx::assert_relative_eq;

    use super::*;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
    }

    impl Behavior for Recorder {
        fn enter_tree(&mut self, _tree: &mut SceneTree, _id: NodeId) {
            self.log.borrow_mut().push(format!("enter {}", self.name));
        }

        fn before_destroy(&mut self, _tree: &mut SceneTree, _id: NodeId) {
            self.log.borrow_mut().push(format!("destroy {}", self.name));
        }

        fn process(&mut self, _tree: &mut SceneTree, _id: NodeId, _dt: f64) {
            self.log.borrow_mut().push(format!("process {}", self.name));
        }
    }

    fn recorder(name: &'static str, log: &Log) -> Node {
        Node::new(name).with_behavior(Recorder {
            name,
            log: log.clone(),
        })
    }

    #[test]
    fn enter_tree_runs_parents_first() {
        let log = Log::default();
        let mut tree = SceneTree::new();
        let a = tree.create(recorder("a", &log));
        let b = tree.create(recorder("b", &log));
        let c = tree.create(recorder("c", &log));
        tree.add_child(b, c);
        log.borrow_mut().clear();
        tree.add_child(a, b);
        tree.add_child(tree.root(), a);
        assert_eq!(
            *log.borrow(),
            vec!["enter b", "enter c", "enter a", "enter b", "enter c"]
        );
    }

    struct Reaper {
        log: Log,
        victim: NodeId,
        adopted: NodeId,
    }

    impl Behavior for Reaper {
        fn process(&mut self, tree: &mut SceneTree, id: NodeId, _dt: f64) {
            self.log.borrow_mut().push("process reaper".into());
            tree.free(self.victim);
            if let Some(parent) = tree.parent(self.adopted) {
                tree.remove_child(parent, self.adopted);
            }
            tree.add_child(id, self.adopted);
        }
    }

    #[test]
    fn siblings_changed_during_process_are_not_revisited() {
        let log = Log::default();
        let mut tree = SceneTree::new();
        let b = tree.create(recorder("b", &log));
        let c = tree.create(recorder("c", &log));
        tree.spawn(
            tree.root(),
            Node::new("reaper").with_behavior(Reaper {
                log: log.clone(),
                victim: b,
                adopted: c,
            }),
        );
        tree.add_child(tree.root(), b);
        tree.add_child(tree.root(), c);
        log.borrow_mut().clear();

        tree.process(0.1);
        let processed: Vec<String> = log
            .borrow()
            .iter()
            .filter(|line| line.starts_with("process"))
            .cloned()
            .collect();
        assert_eq!(processed, vec!["process reaper", "process c"]);
        assert!(!tree.contains(b));
    }

    #[test]
    fn before_destroy_runs_children_first() {
        let log = Log::default();
        let mut tree = SceneTree::new();
        let a = tree.spawn(tree.root(), recorder("a", &log));
        let b = tree.spawn(a, recorder("b", &log));
        tree.spawn(b, recorder("c", &log));
        log.borrow_mut().clear();
        assert!(tree.remove_child(tree.root(), a));
        assert_eq!(*log.borrow(), vec!["destroy c", "destroy b", "destroy a"]);
        assert_eq!(tree.parent(a), None);
        assert!(tree.contains(b));
    }

    #[test]
    fn remove_of_foreign_child_is_noop() {
        let mut tree = SceneTree::new();
        let a = tree.spawn(tree.root(), Node::new("a"));
        let b = tree.spawn(tree.root(), Node::new("b"));
        assert!(!tree.remove_child(a, b));
        assert_eq!(tree.parent(b), Some(tree.root()));
    }

    #[test]
    #[should_panic(expected = "already attached")]
    fn double_attach_panics() {
        let mut tree = SceneTree::new();
        let a = tree.spawn(tree.root(), Node::new("a"));
        let b = tree.spawn(tree.root(), Node::new("b"));
        tree.add_child(a, b);
    }

    #[test]
    #[should_panic(expected = "cycle")]
    fn cycles_panic() {
        let mut tree = SceneTree::new();
        let a = tree.create(Node::new("a"));
        let b = tree.spawn(a, Node::new("b"));
        let c = tree.spawn(b, Node::new("c"));
        tree.add_child(c, a);
    }

    #[test]
    #[should_panic(expected = "not a live node")]
    fn freed_child_panics() {
        let mut tree = SceneTree::new();
        let a = tree.create(Node::new("a"));
        tree.free(a);
        tree.add_child(tree.root(), a);
    }

    #[test]
    fn disabled_subtree_is_skipped() {
        let log = Log::default();
        let mut tree = SceneTree::new();
        let a = tree.spawn(tree.root(), recorder("a", &log));
        tree.spawn(a, recorder("b", &log));
        tree.spawn(tree.root(), recorder("c", &log));
        log.borrow_mut().clear();
        tree.set_enabled(a, false);
        tree.process(0.016);
        assert_eq!(*log.borrow(), vec!["process c"]);

        let mut visited = Vec::new();
        tree.render(|tree, id| visited.push(tree.get(id).map(|n| n.name.clone())));
        assert_eq!(
            visited,
            vec![Some("Scene".to_string()), Some("c".to_string())]
        );
    }

    #[test]
    fn child_events_reach_parent_and_root() {
        let mut tree = SceneTree::new();
        let added = Rc::new(RefCell::new(Vec::new()));
        let a = tree.spawn(tree.root(), Node::new("a"));
        for node in [tree.root(), a] {
            let added = added.clone();
            tree.subscribe(node, EventKind::ChildAdded, move |event| {
                added.borrow_mut().push(event.clone());
            });
        }
        let b = tree.spawn(a, Node::new("b"));
        assert_eq!(
            *added.borrow(),
            vec![NodeEvent::ChildAdded(b), NodeEvent::ChildAdded(b)]
        );

        added.borrow_mut().clear();
        tree.spawn(tree.root(), Node::new("c"));
        assert_eq!(added.borrow().len(), 1);
    }

    #[test]
    fn once_and_unsubscribe() {
        let mut tree = SceneTree::new();
        let node = tree.spawn(tree.root(), Node::new("n"));
        let hits = Rc::new(RefCell::new(0));
        let counter = hits.clone();
        tree.once(node, EventKind::Custom("ping".into()), move |_| {
            *counter.borrow_mut() += 1;
        });
        let counter = hits.clone();
        let sub = tree.subscribe(node, EventKind::Custom("ping".into()), move |_| {
            *counter.borrow_mut() += 10;
        });
        let ping = NodeEvent::Custom("ping".into());
        tree.trigger(node, &ping);
        tree.trigger(node, &ping);
        assert_eq!(*hits.borrow(), 21);
        assert!(tree.unsubscribe(sub));
        assert!(!tree.unsubscribe(sub));
        tree.trigger(node, &ping);
        tree.trigger(node, &NodeEvent::Custom("pong".into()));
        assert_eq!(*hits.borrow(), 21);
    }

    #[test]
    fn trigger_global_bubbles() {
        let mut tree = SceneTree::new();
        let a = tree.spawn(tree.root(), Node::new("a"));
        let b = tree.spawn(a, Node::new("b"));
        let seen = Rc::new(RefCell::new(0));
        for node in [tree.root(), a, b] {
            let seen = seen.clone();
            tree.subscribe(node, EventKind::StateChanged, move |_| {
                *seen.borrow_mut() += 1;
            });
        }
        tree.trigger_global(b, &NodeEvent::StateChanged);
        assert_eq!(*seen.borrow(), 3);
        tree.trigger(b, &NodeEvent::StateChanged);
        assert_eq!(*seen.borrow(), 4);
    }

    #[test]
    fn index_and_lookup_helpers() {
        let mut tree = SceneTree::new();
        let a = tree.spawn(tree.root(), Node::new("a"));
        let b = tree.spawn(tree.root(), Node::new("b").with_meta("enemy", "1"));
        let c = tree.spawn(b, Node::new("c").with_meta("enemy", "2"));
        assert_eq!(tree.index(b), Some(1));
        tree.set_index(b, 0);
        assert_eq!(tree.children(tree.root()), &[b, a]);
        assert_eq!(tree.find_by_name(tree.root(), "c"), Some(c));
        assert_eq!(tree.find_by_name(a, "c"), None);
        assert_eq!(tree.nodes_with_meta("enemy"), vec![b, c]);
        assert_eq!(tree.root_of(c), tree.root());
    }

    #[test]
    fn global_transform_stops_at_plain_node() {
        let mut tree = SceneTree::new();
        let plain = tree.spawn(tree.root(), Node::new("group"));
        let a = tree.spawn(plain, Node::spatial("a").with_position(Vec3::new(1.0, 0.0, 0.0)));
        let b = tree.spawn(a, Node::spatial("b").with_position(Vec3::new(0.0, 2.0, 0.0)));
        assert_eq!(tree.global_position(a), Some(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(tree.global_position(b), Some(Vec3::new(1.0, 2.0, 0.0)));
        assert_eq!(tree.global_transform(plain), None);
    }

    #[test]
    fn set_global_position_goes_through_parent() {
        let mut tree = SceneTree::new();
        let a = tree.spawn(tree.root(), Node::spatial("a").with_position(Vec3::new(5.0, 0.0, 0.0)));
        let b = tree.spawn(a, Node::spatial("b"));
        tree.set_global_position(b, Vec3::new(1.0, 1.0, 1.0));
        let local = tree.transform(b).map(|t| t.position).unwrap_or_else(|| Vec3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(local.x, -4.0);
        let global = tree.global_position(b).unwrap_or_else(|| Vec3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(global.x, 1.0);
        assert_relative_eq!(global.y, 1.0);
    }

    #[test]
    fn free_drops_subtree_and_current_camera() {
        let mut tree = SceneTree::new();
        let a = tree.spawn(tree.root(), Node::spatial("rig"));
        let cam = tree.spawn(a, Node::spatial("cam").with_camera(Camera::default()));
        tree.make_current_camera(cam);
        assert_eq!(tree.current_camera(), Some(cam));
        tree.free(a);
        assert!(!tree.contains(cam));
        assert_eq!(tree.current_camera(), None);
        assert_eq!(tree.children(tree.root()), &[] as &[NodeId]);
    }

    #[test]
    fn process_accumulates_time() {
        let mut tree = SceneTree::new();
        tree.process(0.5);
        tree.process(0.25);
        assert_relative_eq!(tree.time(), 0.75);
    }
}
