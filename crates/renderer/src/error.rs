//! Renderer error type.

use thiserror::Error;

use bento_assets::AssetError;
use bento_rhi::RhiError;

/// Failures while setting up or driving the renderer.
///
/// Once the renderer is running, only [`RenderError::Rhi`] can occur; the
/// other variants come from startup.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Vulkan or allocator failure
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// Window or surface failure
    #[error(transparent)]
    Platform(#[from] bento_core::Error),

    /// Shader or texture could not be loaded
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// A mesh was given no vertices or no indices
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),
}

/// Result type alias using [`RenderError`].
pub type RenderResult<T> = std::result::Result<T, RenderError>;
