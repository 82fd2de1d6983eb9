//! Renderer facade tying the frame scheduler to the swapchain manager.

use tracing::debug;

use bento_core::EngineConfig;
use bento_platform::{FramebufferSource, Window};
use bento_rhi::RhiResult;
use bento_rhi::vertex::Vertex;
use bento_scene::{Camera, Transform};

use crate::error::RenderResult;
use crate::frame_scheduler::{FrameBackend, FrameScheduler, FrameStatus};
use crate::mesh::{MeshFactory, MeshHandle};
use crate::swapchain_manager::SwapchainManager;

/// Draws every mesh once per [`Renderer::draw_frame`] call.
///
/// # Example
///
/// ```no_run
/// use bento_core::EngineConfig;
/// use bento_platform::Window;
/// use bento_renderer::Renderer;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = EngineConfig::default();
/// let mut window = Window::new(&config.title, config.width, config.height)?;
/// let mut renderer = Renderer::new(&mut window, &config)?;
///
/// while !window.should_close() {
///     window.poll_events();
///     if window.take_resized() {
///         renderer.notify_resized();
///     }
///     renderer.draw_frame(&mut window, 0.0)?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Renderer {
    scheduler: FrameScheduler,
    manager: SwapchainManager,
}

impl Renderer {
    /// Initializes Vulkan for `window` and builds the first swapchain.
    ///
    /// # Errors
    ///
    /// Returns a fatal initialization error.
    pub fn new(window: &mut Window, config: &EngineConfig) -> RenderResult<Self> {
        let manager = SwapchainManager::new(window, config)?;
        let scheduler = FrameScheduler::new(manager.image_count());

        Ok(Self { scheduler, manager })
    }

    /// Chooses whether each frame ends with a present-queue wait.
    pub fn set_present_wait(&mut self, enabled: bool) {
        self.scheduler.set_present_wait(enabled);
    }

    /// Uploads a mesh; it is drawn from the next frame on.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid geometry or any GPU failure.
    pub fn create_mesh(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
        transform: Transform,
    ) -> RenderResult<MeshHandle> {
        self.manager.create_mesh(vertices, indices, transform)
    }

    /// Rebuilds the swapchain after the next present.
    pub fn notify_resized(&mut self) {
        debug!("Resize reported");
        self.scheduler.notify_resized();
    }

    /// Renders and presents one frame with meshes posed at `elapsed` seconds.
    ///
    /// # Errors
    ///
    /// Only fatal errors are returned; a stale surface is rebuilt silently.
    pub fn draw_frame<W>(&mut self, window: &mut W, elapsed: f32) -> RhiResult<FrameStatus>
    where
        W: FramebufferSource,
    {
        self.manager.set_elapsed(elapsed);
        self.scheduler.draw_frame(&mut self.manager, window)
    }

    /// Blocks until the GPU has finished all submitted work.
    pub fn wait_idle(&self) -> RhiResult<()> {
        self.manager.wait_idle()
    }

    #[inline]
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    #[inline]
    pub fn swapchain_manager(&self) -> &SwapchainManager {
        &self.manager
    }

    #[inline]
    pub fn swapchain_manager_mut(&mut self) -> &mut SwapchainManager {
        &mut self.manager
    }

    #[inline]
    pub fn meshes(&self) -> &MeshFactory {
        self.manager.meshes()
    }

    #[inline]
    pub fn camera_mut(&mut self) -> &mut Camera {
        self.manager.camera_mut()
    }
}
