//! Application-facing API of the bento engine.
//!
//! An [`Engine`] opens a window, brings up the renderer and drives the main
//! loop. Applications put their content in a [`State`] and push it onto the
//! engine's state stack.

mod engine;
mod error;
mod state;

pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use state::{State, StateContext};

pub use bento_renderer::{FrameStatus, MeshHandle};
pub use bento_rhi::vertex::Vertex;
pub use bento_scene::Transform;
