//! Engine facade: initialize, run, clean.

use tracing::{error, info, warn};

use bento_core::{EngineConfig, Timer};
use bento_platform::Window;
use bento_renderer::{MeshHandle, Renderer};
use bento_rhi::vertex::Vertex;
use bento_scene::Transform;

use crate::error::{EngineError, EngineResult};
use crate::state::{State, StateContext, StateStack};

/// Owns the window, the renderer and the state stack.
///
/// # Example
///
/// ```no_run
/// use bento_core::EngineConfig;
/// use bento_engine::Engine;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut engine = Engine::new(EngineConfig::default())?;
/// engine.initialize("bento", 800, 600)?;
/// engine.run()?;
/// engine.clean();
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    // Field order matters: the renderer must drop before the window.
    states: StateStack,
    renderer: Option<Renderer>,
    window: Option<Window>,
    timer: Timer,
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine that has not opened a window yet.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Core`] when the configuration is invalid.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        Ok(Self {
            states: StateStack::default(),
            renderer: None,
            window: None,
            timer: Timer::new(),
            config,
        })
    }

    /// Opens the window, brings up Vulkan and starts any pushed states.
    ///
    /// # Errors
    ///
    /// Every failure here is fatal: a missing display, Vulkan loader,
    /// suitable GPU, shader or texture.
    pub fn initialize(&mut self, title: &str, width: u32, height: u32) -> EngineResult<()> {
        if self.renderer.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }

        let config = self.config.clone().with_window(title, width, height);
        config.validate()?;

        info!("Initializing engine: {} ({}x{})", title, width, height);

        let mut window = Window::new(&config.title, config.width, config.height)?;
        let renderer = Renderer::new(&mut window, &config)?;

        self.window = Some(window);
        self.renderer = Some(renderer);
        self.config = config;
        self.timer.reset();

        self.start_pending_states()?;

        info!("Engine initialized");
        Ok(())
    }

    /// Creates a mesh at the origin that spins at the configured rate.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotInitialized`] before [`Engine::initialize`],
    /// [`EngineError::InvalidMesh`] for unusable geometry.
    pub fn create_mesh(&mut self, vertices: &[Vertex], indices: &[u32]) -> EngineResult<MeshHandle> {
        let transform = Transform::new().with_spin_degrees(self.config.rotation_degrees_per_sec);
        self.create_mesh_with_transform(vertices, indices, transform)
    }

    /// Creates a mesh with an explicit placement and spin.
    pub fn create_mesh_with_transform(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
        transform: Transform,
    ) -> EngineResult<MeshHandle> {
        let renderer = self.renderer.as_mut().ok_or(EngineError::NotInitialized)?;
        Ok(renderer.create_mesh(vertices, indices, transform)?)
    }

    /// Runs the main loop until the window is closed.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error. The device is idled either way.
    pub fn run(&mut self) -> EngineResult<()> {
        let (Some(window), Some(renderer)) = (self.window.as_mut(), self.renderer.as_mut()) else {
            return Err(EngineError::NotInitialized);
        };

        info!("Entering main loop");
        let mut result = Ok(());

        while !window.should_close() {
            window.poll_events();
            if window.should_close() {
                break;
            }
            if window.take_resized() {
                renderer.notify_resized();
            }

            let time = self.timer.tick();
            self.states.tick(time.delta);

            if let Err(e) = renderer.draw_frame(window, time.elapsed) {
                error!("Frame failed: {}", e);
                result = Err(EngineError::from(e));
                break;
            }
        }

        if let Err(e) = renderer.wait_idle() {
            warn!("Device wait idle failed on exit: {}", e);
        }

        info!(
            "Main loop finished after {} frames",
            renderer.scheduler().frames_drawn()
        );
        result
    }

    /// Releases states, GPU resources and the window. Safe to call twice.
    pub fn clean(&mut self) {
        if self.renderer.is_none() && self.window.is_none() && self.states.is_empty() {
            return;
        }

        info!("Cleaning up engine");
        self.states.clear();
        // Renderer first: its Drop idles the device and needs the surface's window.
        self.renderer = None;
        self.window = None;
    }

    /// Pushes a state; it starts right away when the engine is initialized.
    ///
    /// # Errors
    ///
    /// Returns the error from the state's `start`.
    pub fn push_state(&mut self, state: Box<dyn State>) -> EngineResult<()> {
        info!("Pushing state '{}'", state.name());
        self.states.push(state);
        self.start_pending_states()
    }

    /// Removes the top state.
    pub fn pop_state(&mut self) -> Option<Box<dyn State>> {
        let state = self.states.pop();
        if let Some(state) = &state {
            info!("Popped state '{}'", state.name());
        }
        state
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn current_state_name(&self) -> Option<&str> {
        self.states.top_name()
    }

    pub fn is_initialized(&self) -> bool {
        self.renderer.is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn renderer(&self) -> Option<&Renderer> {
        self.renderer.as_ref()
    }

    pub fn renderer_mut(&mut self) -> Option<&mut Renderer> {
        self.renderer.as_mut()
    }

    fn start_pending_states(&mut self) -> EngineResult<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };
        let mut ctx = StateContext::new(renderer, self.config.rotation_degrees_per_sec);
        self.states.start_pending(&mut ctx)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.clean();
    }
}
