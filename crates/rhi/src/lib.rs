//! Thin, owning wrappers over Vulkan via `ash`.
//!
//! Every wrapper holds an `Arc<Device>` and destroys its handle on drop, so
//! destruction order follows Rust drop order. It handles:
//! - Instance, physical device selection and logical device creation
//! - Swapchain creation, acquisition and presentation
//! - Buffers, images and one-shot transfers through a staging buffer
//! - Render pass, framebuffers, descriptors and the graphics pipeline
//! - Semaphores and fences

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod framebuffer;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod transfer;
pub mod vertex;

pub use error::{RhiError, RhiResult};

pub use ash::vk;
