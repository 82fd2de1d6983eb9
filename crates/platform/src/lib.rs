//! Window, event pumping and Vulkan surface creation.
//!
//! The engine drives its own loop, so the winit event loop is pumped
//! explicitly: [`Window::poll_events`] drains pending events without
//! blocking and [`Window::wait_events`] sleeps until at least one arrives.

mod surface;
mod window;

pub use surface::Surface;
pub use window::{FramebufferSource, Window};
