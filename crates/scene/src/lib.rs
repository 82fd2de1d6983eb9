//! Camera and object placement.
//!
//! - [`Camera`] produces the view and projection matrices for the frame-global
//!   uniform block
//! - [`Transform`] places a mesh and spins it over time

pub mod camera;
pub mod transform;

pub use camera::Camera;
pub use transform::{DEFAULT_SPIN_AXIS, Transform};
