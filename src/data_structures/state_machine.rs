//! A single-active-state machine that runs as a node [`Behavior`].

use std::any::Any;

use crate::data_structures::scene_graph::{Behavior, NodeEvent, NodeId, SceneTree};

/// What a state asks the machine to do after a frame.
pub enum Transition {
    None,
    Switch(Box<dyn State>),
}

/// One state of a [`StateMachine`].
pub trait State: Any {
    /// Called when the state becomes active. `previous` is the state being
    /// replaced, still alive so transitional data can be read from it.
    fn begin(&mut self, _tree: &mut SceneTree, _owner: NodeId, _previous: Option<&(dyn State + 'static)>) {}

    fn process(&mut self, _tree: &mut SceneTree, _owner: NodeId, _dt: f64) -> Transition {
        Transition::None
    }

    fn end(&mut self, _tree: &mut SceneTree, _owner: NodeId) {}
}

impl dyn State {
    pub fn downcast_ref<T: State>(&self) -> Option<&T> {
        let any: &dyn Any = self;
        any.downcast_ref::<T>()
    }
}

/// Holds exactly one active state.
///
/// The initial state begins when the owning node enters the tree. Every switch
/// emits [`NodeEvent::StateEnded`] and then [`NodeEvent::StateChanged`] on the
/// owning node.
pub struct StateMachine {
    state: Box<dyn State>,
    started: bool,
}

impl StateMachine {
    pub fn new(initial: impl State) -> Self {
        Self {
            state: Box::new(initial),
            started: false,
        }
    }

    pub fn state(&self) -> &(dyn State + 'static) {
        self.state.as_ref()
    }

    /// Ends the active state and begins `next` with the old one as `previous`.
    ///
    /// Before the owning node entered the tree nothing has begun yet, so `next`
    /// just replaces the initial state and begins on `enter_tree`.
    pub fn set_state(&mut self, tree: &mut SceneTree, owner: NodeId, next: Box<dyn State>) {
        if !self.started {
            self.state = next;
            return;
        }
        let mut previous = std::mem::replace(&mut self.state, next);
        previous.end(tree, owner);
        tree.trigger(owner, &NodeEvent::StateEnded);
        self.state.begin(tree, owner, Some(previous.as_ref()));
        tree.trigger(owner, &NodeEvent::StateChanged);
    }
}

impl SceneTree {
    /// Switches the [`StateMachine`] of `id` from outside its own hooks.
    ///
    /// Returns false when `id` has no state machine, or when its machine is the
    /// one currently running a hook.
    pub fn set_state(&mut self, id: NodeId, next: Box<dyn State>) -> bool {
        self.with_behavior_mut(id, |machine: &mut StateMachine, tree| {
            machine.set_state(tree, id, next)
        })
        .is_some()
    }
}

impl Behavior for StateMachine {
    fn enter_tree(&mut self, tree: &mut SceneTree, id: NodeId) {
        if !self.started {
            self.started = true;
            self.state.begin(tree, id, None);
        }
    }

    fn process(&mut self, tree: &mut SceneTree, id: NodeId, dt: f64) {
        if let Transition::Switch(next) = self.state.process(tree, id, dt) {
            self.set_state(tree, id, next);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::data_structures::scene_graph::{EventKind, Node};

    type Log = Rc<RefCell<Vec<String>>>;

    struct Idle {
        log: Log,
        frames: u32,
    }

    struct Running {
        log: Log,
        inherited_frames: u32,
    }

    impl State for Idle {
        fn begin(&mut self, _tree: &mut SceneTree, _owner: NodeId, previous: Option<&(dyn State + 'static)>) {
            self.log
                .borrow_mut()
                .push(format!("begin idle (previous: {})", previous.is_some()));
        }

        fn process(&mut self, _tree: &mut SceneTree, _owner: NodeId, _dt: f64) -> Transition {
            self.frames += 1;
            if self.frames < 2 {
                return Transition::None;
            }
            Transition::Switch(Box::new(Running {
                log: self.log.clone(),
                inherited_frames: 0,
            }))
        }

        fn end(&mut self, _tree: &mut SceneTree, _owner: NodeId) {
            self.log.borrow_mut().push("end idle".into());
        }
    }

    impl State for Running {
        fn begin(&mut self, _tree: &mut SceneTree, _owner: NodeId, previous: Option<&(dyn State + 'static)>) {
            if let Some(idle) = previous.and_then(|p| p.downcast_ref::<Idle>()) {
                self.inherited_frames = idle.frames;
            }
            self.log.borrow_mut().push("begin running".into());
        }
    }

    #[test]
    fn initial_state_begins_on_enter_tree() {
        let log = Log::default();
        let mut tree = SceneTree::new();
        let machine = tree.create(Node::new("machine").with_behavior(StateMachine::new(Idle {
            log: log.clone(),
            frames: 0,
        })));
        assert!(log.borrow().is_empty());
        tree.add_child(tree.root(), machine);
        assert_eq!(*log.borrow(), vec!["begin idle (previous: false)"]);
    }

    #[test]
    fn switch_reads_previous_and_emits_events_in_order() {
        let log = Log::default();
        let mut tree = SceneTree::new();
        let machine = tree.spawn(
            tree.root(),
            Node::new("machine").with_behavior(StateMachine::new(Idle {
                log: log.clone(),
                frames: 0,
            })),
        );
        for (kind, label) in [
            (EventKind::StateEnded, "event ended"),
            (EventKind::StateChanged, "event changed"),
        ] {
            let log = log.clone();
            tree.subscribe(machine, kind, move |_| log.borrow_mut().push(label.into()));
        }

        tree.process(0.1);
        tree.process(0.1);

        assert_eq!(
            *log.borrow(),
            vec![
                "begin idle (previous: false)",
                "end idle",
                "event ended",
                "begin running",
                "event changed",
            ]
        );
        let running = tree
            .behavior::<StateMachine>(machine)
            .and_then(|m| m.state().downcast_ref::<Running>())
            .map(|r| r.inherited_frames);
        assert_eq!(running, Some(2));
    }

    #[test]
    fn tree_switches_state_from_outside_the_hooks() {
        let log = Log::default();
        let mut tree = SceneTree::new();
        let machine = tree.spawn(
            tree.root(),
            Node::new("machine").with_behavior(StateMachine::new(Idle {
                log: log.clone(),
                frames: 0,
            })),
        );
        for (kind, label) in [
            (EventKind::StateEnded, "event ended"),
            (EventKind::StateChanged, "event changed"),
        ] {
            let log = log.clone();
            tree.subscribe(machine, kind, move |_| log.borrow_mut().push(label.into()));
        }
        tree.process(0.1);

        let running = Running {
            log: log.clone(),
            inherited_frames: 0,
        };
        assert!(tree.set_state(machine, Box::new(running)));
        assert_eq!(
            *log.borrow(),
            vec![
                "begin idle (previous: false)",
                "end idle",
                "event ended",
                "begin running",
                "event changed",
            ]
        );
        let inherited = tree
            .behavior::<StateMachine>(machine)
            .and_then(|m| m.state().downcast_ref::<Running>())
            .map(|r| r.inherited_frames);
        assert_eq!(inherited, Some(1));

        let plain = tree.spawn(tree.root(), Node::new("plain"));
        let running = Running {
            log: log.clone(),
            inherited_frames: 0,
        };
        assert!(!tree.set_state(plain, Box::new(running)));
    }

    #[test]
    fn switching_before_enter_tree_replaces_the_initial_state() {
        let log = Log::default();
        let mut tree = SceneTree::new();
        let machine = tree.create(Node::new("machine").with_behavior(StateMachine::new(Idle {
            log: log.clone(),
            frames: 0,
        })));
        let changes = Log::default();
        {
            let changes = changes.clone();
            tree.subscribe(machine, EventKind::StateChanged, move |_| {
                changes.borrow_mut().push("changed".into())
            });
        }

        let running = Running {
            log: log.clone(),
            inherited_frames: 7,
        };
        assert!(tree.set_state(machine, Box::new(running)));
        assert!(log.borrow().is_empty());

        tree.add_child(tree.root(), machine);
        assert_eq!(*log.borrow(), vec!["begin running"]);
        assert!(changes.borrow().is_empty());
        let inherited = tree
            .behavior::<StateMachine>(machine)
            .and_then(|m| m.state().downcast_ref::<Running>())
            .map(|r| r.inherited_frames);
        assert_eq!(inherited, Some(7));
    }
}
