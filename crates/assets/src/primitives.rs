//! Built-in shapes with per-vertex color and UVs.
//!
//! Indices are 32-bit and index into the shape's own vertex array.

use bento_rhi::vertex::Vertex;
use glam::{Vec2, Vec3};

/// A shape that can be handed straight to mesh creation.
pub trait Primitive {
    fn vertices() -> Vec<Vertex>;
    fn indices() -> Vec<u32>;
}

const fn vertex(position: [f32; 3], color: [f32; 3], uv: [f32; 2]) -> Vertex {
    Vertex::new(
        Vec3::new(position[0], position[1], position[2]),
        Vec3::new(color[0], color[1], color[2]),
        Vec2::new(uv[0], uv[1]),
    )
}

const RED: [f32; 3] = [1.0, 0.0, 0.0];
const GREEN: [f32; 3] = [0.0, 1.0, 0.0];
const BLUE: [f32; 3] = [0.0, 0.0, 1.0];
const WHITE: [f32; 3] = [1.0, 1.0, 1.0];

const TWO_TRIANGLES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Unit square in the XY plane.
pub struct Plane;

impl Primitive for Plane {
    fn vertices() -> Vec<Vertex> {
        vec![
            vertex([-0.5, -0.5, 0.0], RED, [0.0, 0.0]),
            vertex([0.5, -0.5, 0.0], GREEN, [1.0, 0.0]),
            vertex([0.5, 0.5, 0.0], BLUE, [1.0, 1.0]),
            vertex([-0.5, 0.5, 0.0], WHITE, [0.0, 1.0]),
        ]
    }

    fn indices() -> Vec<u32> {
        TWO_TRIANGLES.to_vec()
    }
}

/// Unit square in the XZ plane.
pub struct Quad;

impl Primitive for Quad {
    fn vertices() -> Vec<Vertex> {
        vec![
            vertex([-0.5, 0.0, -0.5], RED, [0.0, 0.0]),
            vertex([0.5, 0.0, -0.5], GREEN, [1.0, 0.0]),
            vertex([0.5, 0.0, 0.5], BLUE, [1.0, 1.0]),
            vertex([-0.5, 0.0, 0.5], WHITE, [0.0, 1.0]),
        ]
    }

    fn indices() -> Vec<u32> {
        TWO_TRIANGLES.to_vec()
    }
}

/// Unit cube centered on the origin, eight shared corners.
pub struct Cube;

impl Primitive for Cube {
    fn vertices() -> Vec<Vertex> {
        vec![
            vertex([-0.5, -0.5, 0.5], RED, [0.0, 0.0]),
            vertex([0.5, -0.5, 0.5], GREEN, [1.0, 0.0]),
            vertex([0.5, 0.5, 0.5], BLUE, [1.0, 1.0]),
            vertex([-0.5, 0.5, 0.5], WHITE, [0.0, 1.0]),
            vertex([-0.5, -0.5, -0.5], RED, [0.0, 0.0]),
            vertex([0.5, -0.5, -0.5], GREEN, [1.0, 0.0]),
            vertex([0.5, 0.5, -0.5], BLUE, [1.0, 1.0]),
            vertex([-0.5, 0.5, -0.5], WHITE, [0.0, 1.0]),
        ]
    }

    fn indices() -> Vec<u32> {
        vec![
            0, 1, 2, 2, 3, 0, // +z
            1, 5, 6, 6, 2, 1, // +x
            0, 4, 7, 7, 3, 0, // -x
            0, 1, 5, 5, 4, 0, // -y
            3, 2, 6, 6, 7, 3, // +y
            4, 5, 6, 6, 7, 4, // -z
        ]
    }
}
