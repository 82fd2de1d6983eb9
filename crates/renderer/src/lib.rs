//! Swapchain lifecycle, frame scheduling and mesh resources.
//!
//! This crate is the core of the engine:
//! - [`DeviceContext`]: device, pools, layouts and the shared texture
//! - [`SwapchainManager`]: the swapchain-dependent objects, built and rebuilt
//!   in dependency order by [`recreate`]
//! - [`FrameScheduler`]: the acquire, submit and present loop with
//!   [`MAX_FRAMES_IN_FLIGHT`] frame slots
//! - [`MeshFactory`]: per-mesh buffers, uniforms and descriptor sets
//! - [`Renderer`]: the facade used by the engine

mod arena;
mod context;
mod error;
mod mesh;
mod renderer;
mod swapchain_manager;
mod ubo;

pub mod frame_scheduler;
pub mod recreate;

pub use arena::Arena;
pub use context::{DeviceContext, MAX_SWAPCHAIN_IMAGES, TEXTURE_FORMAT};
pub use error::{RenderError, RenderResult};
pub use frame_scheduler::{
    AcquireOutcome, FrameBackend, FrameScheduler, FrameStatus, MAX_FRAMES_IN_FLIGHT,
    PresentOutcome,
};
pub use mesh::{Mesh, MeshFactory, MeshHandle};
pub use recreate::{RebuildStage, SwapchainStages, TeardownStage};
pub use renderer::Renderer;
pub use swapchain_manager::{PipelineSettings, SwapchainManager};
pub use ubo::{GlobalUbo, ObjectUbo};
