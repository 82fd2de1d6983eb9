//! Owned `VkSurfaceKHR`.

use ash::khr::surface;
use ash::vk;
use tracing::debug;

/// A window surface and the loader that destroys it.
///
/// The instance the surface was created from must outlive it.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: surface::Instance,
}

impl Surface {
    pub(crate) fn new(handle: vk::SurfaceKHR, loader: surface::Instance) -> Self {
        Self { handle, loader }
    }

    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Loader for capability, format and present mode queries.
    #[inline]
    pub fn loader(&self) -> &surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: the handle came from ash_window::create_surface on the same
        // instance as the loader and is destroyed only here.
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        debug!("Vulkan surface destroyed");
    }
}
