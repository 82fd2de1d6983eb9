//! Static assets consumed by the renderer.
//!
//! This crate provides:
//! - Built-in primitive shapes (plane, quad, cube)
//! - Texture decoding into tightly packed RGBA8, with a generated fallback
//! - SPIR-V file loading

mod error;

pub mod primitives;
pub mod shader;
pub mod texture;

pub use error::{AssetError, AssetResult};
pub use primitives::{Cube, Plane, Primitive, Quad};
pub use shader::load_spirv;
pub use texture::TextureData;
