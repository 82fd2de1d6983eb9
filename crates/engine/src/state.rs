//! Application states driven by the engine loop.

use bento_renderer::{MeshHandle, Renderer};
use bento_rhi::vertex::Vertex;
use bento_scene::Transform;

use crate::error::EngineResult;

/// A screen or mode of the application.
///
/// The engine keeps states on a stack. Only the top one is updated and
/// rendered each frame.
pub trait State {
    /// Called once, when the engine is initialized and the state is on the
    /// stack. Meshes are usually created here.
    fn start(&mut self, ctx: &mut StateContext<'_>) -> EngineResult<()>;

    /// Advances the state by `dt` seconds.
    fn update(&mut self, _dt: f32) {}

    /// Called after `update`, right before the frame is drawn.
    fn render(&mut self) {}

    fn name(&self) -> &str {
        "state"
    }
}

/// What a starting state may do with the engine.
pub struct StateContext<'a> {
    renderer: &'a mut Renderer,
    spin_degrees: f32,
}

impl<'a> StateContext<'a> {
    pub(crate) fn new(renderer: &'a mut Renderer, spin_degrees: f32) -> Self {
        Self {
            renderer,
            spin_degrees,
        }
    }

    /// Creates a mesh at the origin spinning at the configured rate.
    pub fn create_mesh(&mut self, vertices: &[Vertex], indices: &[u32]) -> EngineResult<MeshHandle> {
        let transform = self.default_transform();
        self.create_mesh_with_transform(vertices, indices, transform)
    }

    /// Creates a mesh with an explicit placement and spin.
    pub fn create_mesh_with_transform(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
        transform: Transform,
    ) -> EngineResult<MeshHandle> {
        Ok(self.renderer.create_mesh(vertices, indices, transform)?)
    }

    /// Transform used by [`StateContext::create_mesh`].
    pub fn default_transform(&self) -> Transform {
        Transform::new().with_spin_degrees(self.spin_degrees)
    }
}

pub(crate) struct StateEntry {
    pub(crate) state: Box<dyn State>,
    pub(crate) started: bool,
}

/// Stack of states; states start lazily once a renderer exists.
#[derive(Default)]
pub(crate) struct StateStack {
    entries: Vec<StateEntry>,
}

impl StateStack {
    pub(crate) fn push(&mut self, state: Box<dyn State>) {
        self.entries.push(StateEntry {
            state,
            started: false,
        });
    }

    pub(crate) fn pop(&mut self) -> Option<Box<dyn State>> {
        self.entries.pop().map(|entry| entry.state)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn top_name(&self) -> Option<&str> {
        self.entries.last().map(|entry| entry.state.name())
    }

    /// Starts every state that has not been started yet, bottom first.
    pub(crate) fn start_pending(&mut self, ctx: &mut StateContext<'_>) -> EngineResult<()> {
        for entry in self.entries.iter_mut().filter(|entry| !entry.started) {
            entry.state.start(ctx)?;
            entry.started = true;
        }
        Ok(())
    }

    /// Updates and renders the top state, if it has been started.
    pub(crate) fn tick(&mut self, dt: f32) {
        if let Some(entry) = self.entries.last_mut().filter(|entry| entry.started) {
            entry.state.update(dt);
            entry.state.render();
        }
    }

    pub(crate) fn clear(&mut self) {
        while self.entries.pop().is_some() {}
    }

    #[cfg(test)]
    pub(crate) fn mark_all_started(&mut self) {
        for entry in &mut self.entries {
            entry.started = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Probe {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl State for Probe {
        fn start(&mut self, _ctx: &mut StateContext<'_>) -> EngineResult<()> {
            self.log.borrow_mut().push(format!("{}:start", self.name));
            Ok(())
        }

        fn update(&mut self, dt: f32) {
            self.log.borrow_mut().push(format!("{}:update:{}", self.name, dt));
        }

        fn render(&mut self) {
            self.log.borrow_mut().push(format!("{}:render", self.name));
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn probe(name: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Box<dyn State> {
        Box::new(Probe {
            name,
            log: log.clone(),
        })
    }

    #[test]
    fn test_push_pop_is_lifo() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stack = StateStack::default();
        stack.push(probe("menu", &log));
        stack.push(probe("game", &log));

        assert_eq!(stack.len(), 2);
        assert_eq!(stack.top_name(), Some("game"));
        assert_eq!(stack.pop().map(|s| s.name().to_string()), Some("game".into()));
        assert_eq!(stack.top_name(), Some("menu"));
    }

    #[test]
    fn test_unstarted_state_is_not_ticked() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stack = StateStack::default();
        stack.push(probe("game", &log));

        stack.tick(0.016);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_tick_updates_then_renders_top_only() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stack = StateStack::default();
        stack.push(probe("menu", &log));
        stack.push(probe("game", &log));
        stack.mark_all_started();

        stack.tick(0.5);

        assert_eq!(*log.borrow(), vec!["game:update:0.5", "game:render"]);
    }

    #[test]
    fn test_clear_empties_stack() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stack = StateStack::default();
        stack.push(probe("a", &log));
        stack.push(probe("b", &log));

        stack.clear();
        assert_eq!(stack.len(), 0);
        assert!(stack.pop().is_none());
        assert_eq!(stack.top_name(), None);
    }
}
