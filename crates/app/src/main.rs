//! toybox: textured cubes spinning in a resizable window.

use anyhow::Result;
use glam::Vec3;
use tracing::info;

use bento_assets::{Cube, Plane, Primitive};
use bento_core::{EngineConfig, init_logging};
use bento_engine::{Engine, EngineResult, State, StateContext};

/// Cube offsets on the XY plane; the camera looks down from (2, 2, 2).
const CUBE_OFFSETS: [Vec3; 3] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(1.6, -1.6, 0.0),
    Vec3::new(-1.6, 1.6, 0.0),
];

struct CubeField {
    frames: u64,
    seconds: f32,
}

impl CubeField {
    fn new() -> Self {
        Self {
            frames: 0,
            seconds: 0.0,
        }
    }
}

impl State for CubeField {
    fn start(&mut self, ctx: &mut StateContext<'_>) -> EngineResult<()> {
        let vertices = Cube::vertices();
        let indices = Cube::indices();

        for offset in CUBE_OFFSETS {
            let transform = ctx
                .default_transform()
                .with_position(offset)
                .with_scale(Vec3::splat(0.5));
            ctx.create_mesh_with_transform(&vertices, &indices, transform)?;
        }

        let floor = ctx
            .default_transform()
            .with_spin_degrees(0.0)
            .with_position(Vec3::new(0.0, 0.0, -0.75))
            .with_scale(Vec3::splat(4.0));
        ctx.create_mesh_with_transform(&Plane::vertices(), &Plane::indices(), floor)?;

        info!("Spawned {} cubes and a floor", CUBE_OFFSETS.len());
        Ok(())
    }

    fn update(&mut self, dt: f32) {
        self.frames += 1;
        self.seconds += dt;
        if self.seconds >= 5.0 {
            info!("{:.1} fps", self.frames as f32 / self.seconds);
            self.frames = 0;
            self.seconds = 0.0;
        }
    }

    fn name(&self) -> &str {
        "cube field"
    }
}

fn main() -> Result<()> {
    init_logging();

    let config = EngineConfig::from_env()?;
    let mut engine = Engine::new(config)?;
    engine.push_state(Box::new(CubeField::new()))?;
    engine.initialize("toybox", 1280, 720)?;

    let result = engine.run();
    engine.clean();

    result?;
    info!("Shutdown complete");
    Ok(())
}
