//! Engine error type.

use thiserror::Error;

use bento_assets::AssetError;
use bento_renderer::RenderError;
use bento_rhi::RhiError;

/// Errors surfaced to the application.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Window, surface or configuration failure
    #[error(transparent)]
    Core(#[from] bento_core::Error),

    /// Vulkan or allocator failure
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// Shader or texture could not be loaded
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// The call needs `initialize` to have succeeded first
    #[error("Engine is not initialized")]
    NotInitialized,

    /// `initialize` was called twice
    #[error("Engine is already initialized")]
    AlreadyInitialized,

    /// A mesh was given unusable geometry
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),
}

impl From<RenderError> for EngineError {
    fn from(e: RenderError) -> Self {
        match e {
            RenderError::Rhi(e) => Self::Rhi(e),
            RenderError::Platform(e) => Self::Core(e),
            RenderError::Asset(e) => Self::Asset(e),
            RenderError::InvalidMesh(reason) => Self::InvalidMesh(reason),
        }
    }
}

/// Result type alias using [`EngineError`].
pub type EngineResult<T> = std::result::Result<T, EngineError>;
