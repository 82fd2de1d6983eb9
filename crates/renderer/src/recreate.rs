//! Ordered teardown and rebuild of everything that depends on the swapchain.
//!
//! The GPU objects form a chain (swapchain, views, render pass, pipeline,
//! depth buffer, framebuffers, per-image uniforms, command buffers) where
//! each step consumes the previous one. [`recreate`] drives any
//! [`SwapchainStages`] implementation through that chain in a fixed order,
//! so the ordering lives in one place and can be tested without a GPU.

use tracing::{debug, info};

use bento_platform::FramebufferSource;
use bento_rhi::RhiResult;

/// Objects destroyed during recreation, leaves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeardownStage {
    DepthView,
    DepthImage,
    Framebuffers,
    /// Freed back to the pool, not just reset.
    CommandBuffers,
    Pipeline,
    PipelineLayout,
    RenderPass,
    ImageViews,
    Swapchain,
}

/// Objects built during creation and recreation, roots first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RebuildStage {
    Swapchain,
    ImageViews,
    RenderPass,
    /// Pipeline layout and graphics pipeline.
    Pipeline,
    /// Depth image and its view.
    DepthResources,
    Framebuffers,
    /// Frame-global and per-mesh uniform buffers plus descriptor sets, one
    /// per swapchain image.
    MeshResources,
    CommandBuffers,
}

pub const TEARDOWN_ORDER: [TeardownStage; 9] = [
    TeardownStage::DepthView,
    TeardownStage::DepthImage,
    TeardownStage::Framebuffers,
    TeardownStage::CommandBuffers,
    TeardownStage::Pipeline,
    TeardownStage::PipelineLayout,
    TeardownStage::RenderPass,
    TeardownStage::ImageViews,
    TeardownStage::Swapchain,
];

pub const REBUILD_ORDER: [RebuildStage; 8] = [
    RebuildStage::Swapchain,
    RebuildStage::ImageViews,
    RebuildStage::RenderPass,
    RebuildStage::Pipeline,
    RebuildStage::DepthResources,
    RebuildStage::Framebuffers,
    RebuildStage::MeshResources,
    RebuildStage::CommandBuffers,
];

/// The swapchain-dependent object graph, one stage at a time.
pub trait SwapchainStages {
    /// Blocks until no submitted work can reference the objects about to go.
    fn wait_device_idle(&mut self) -> RhiResult<()>;

    /// Destroys the objects of `stage`. Tearing down a stage that is already
    /// empty is a no-op.
    fn teardown(&mut self, stage: TeardownStage);

    /// Builds the objects of `stage` for a framebuffer of `framebuffer_size`.
    fn rebuild(&mut self, stage: RebuildStage, framebuffer_size: (u32, u32)) -> RhiResult<()>;
}

/// Blocks on window events until the framebuffer has a non-zero area.
///
/// A minimized window reports 0x0, which is not a valid swapchain extent.
pub fn wait_for_nonzero_extent<W>(window: &mut W) -> (u32, u32)
where
    W: FramebufferSource + ?Sized,
{
    let mut size = window.framebuffer_size();
    if size.0 == 0 || size.1 == 0 {
        debug!("Framebuffer is {}x{}, waiting for the window", size.0, size.1);
    }
    while size.0 == 0 || size.1 == 0 {
        window.wait_events();
        size = window.framebuffer_size();
    }
    size
}

/// Builds every stage from scratch for `framebuffer_size`.
pub fn build<S>(stages: &mut S, framebuffer_size: (u32, u32)) -> RhiResult<()>
where
    S: SwapchainStages + ?Sized,
{
    for stage in REBUILD_ORDER {
        stages.rebuild(stage, framebuffer_size)?;
    }
    Ok(())
}

/// Tears the swapchain graph down and builds it again for the window's
/// current size.
///
/// Returns the framebuffer size the graph was rebuilt for.
///
/// # Errors
///
/// A failed idle wait or rebuild step is returned as is. The graph is left
/// partially built in that case and the error is fatal to the session.
pub fn recreate<S, W>(stages: &mut S, window: &mut W) -> RhiResult<(u32, u32)>
where
    S: SwapchainStages + ?Sized,
    W: FramebufferSource + ?Sized,
{
    let size = wait_for_nonzero_extent(window);
    stages.wait_device_idle()?;

    for stage in TEARDOWN_ORDER {
        stages.teardown(stage);
    }
    build(stages, size)?;

    info!("Swapchain recreated for {}x{}", size.0, size.1);
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bento_rhi::RhiError;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Idle,
        Down(TeardownStage),
        Up(RebuildStage, (u32, u32)),
    }

    /// Records calls and keeps just enough state to check idempotence.
    #[derive(Default)]
    struct MockGraph {
        events: Vec<Event>,
        built: Vec<RebuildStage>,
        extent: Option<(u32, u32)>,
        fail_on: Option<RebuildStage>,
    }

    impl SwapchainStages for MockGraph {
        fn wait_device_idle(&mut self) -> RhiResult<()> {
            self.events.push(Event::Idle);
            Ok(())
        }

        fn teardown(&mut self, stage: TeardownStage) {
            self.events.push(Event::Down(stage));
            if stage == TeardownStage::Swapchain {
                self.built.clear();
                self.extent = None;
            }
        }

        fn rebuild(&mut self, stage: RebuildStage, size: (u32, u32)) -> RhiResult<()> {
            if self.fail_on == Some(stage) {
                return Err(RhiError::SwapchainError("injected".into()));
            }
            self.events.push(Event::Up(stage, size));
            self.built.push(stage);
            if stage == RebuildStage::Swapchain {
                self.extent = Some(size);
            }
            Ok(())
        }
    }

    /// Window whose size follows a script, then stays at the last entry.
    struct ScriptedWindow {
        sizes: VecDeque<(u32, u32)>,
        waits: usize,
    }

    impl ScriptedWindow {
        fn new(sizes: &[(u32, u32)]) -> Self {
            Self {
                sizes: sizes.iter().copied().collect(),
                waits: 0,
            }
        }
    }

    impl FramebufferSource for ScriptedWindow {
        fn framebuffer_size(&self) -> (u32, u32) {
            self.sizes.front().copied().unwrap_or((0, 0))
        }

        fn wait_events(&mut self) {
            self.waits += 1;
            if self.sizes.len() > 1 {
                self.sizes.pop_front();
            }
        }
    }

    #[test]
    fn test_recreate_runs_idle_then_teardown_then_rebuild() {
        let mut graph = MockGraph::default();
        let mut window = ScriptedWindow::new(&[(800, 600)]);

        let size = recreate(&mut graph, &mut window).unwrap();
        assert_eq!(size, (800, 600));

        let mut expected = vec![Event::Idle];
        expected.extend(TEARDOWN_ORDER.iter().map(|&s| Event::Down(s)));
        expected.extend(REBUILD_ORDER.iter().map(|&s| Event::Up(s, (800, 600))));
        assert_eq!(graph.events, expected);
    }

    #[test]
    fn test_teardown_order_is_dependency_order() {
        assert_eq!(TEARDOWN_ORDER.first(), Some(&TeardownStage::DepthView));
        assert_eq!(TEARDOWN_ORDER.last(), Some(&TeardownStage::Swapchain));

        let pos = |stage| TEARDOWN_ORDER.iter().position(|&s| s == stage).unwrap();
        assert!(pos(TeardownStage::Framebuffers) < pos(TeardownStage::ImageViews));
        assert!(pos(TeardownStage::CommandBuffers) < pos(TeardownStage::Pipeline));
        assert!(pos(TeardownStage::Pipeline) < pos(TeardownStage::PipelineLayout));
        assert!(pos(TeardownStage::PipelineLayout) < pos(TeardownStage::RenderPass));
    }

    #[test]
    fn test_rebuild_order_is_dependency_order() {
        let pos = |stage| REBUILD_ORDER.iter().position(|&s| s == stage).unwrap();
        assert_eq!(pos(RebuildStage::Swapchain), 0);
        assert!(pos(RebuildStage::RenderPass) < pos(RebuildStage::Pipeline));
        assert!(pos(RebuildStage::DepthResources) < pos(RebuildStage::Framebuffers));
        assert!(pos(RebuildStage::MeshResources) < pos(RebuildStage::CommandBuffers));
        assert_eq!(pos(RebuildStage::CommandBuffers), REBUILD_ORDER.len() - 1);
    }

    #[test]
    fn test_minimized_window_blocks_until_nonzero() {
        let mut graph = MockGraph::default();
        let mut window = ScriptedWindow::new(&[(0, 0), (0, 600), (1024, 0), (1024, 768)]);

        let size = recreate(&mut graph, &mut window).unwrap();

        assert_eq!(size, (1024, 768));
        assert_eq!(window.waits, 3);
        assert!(
            graph
                .events
                .iter()
                .all(|e| !matches!(e, Event::Up(_, (w, h)) if *w == 0 || *h == 0))
        );
    }

    #[test]
    fn test_wait_for_nonzero_extent_does_not_wait_when_visible() {
        let mut window = ScriptedWindow::new(&[(640, 480)]);
        assert_eq!(wait_for_nonzero_extent(&mut window), (640, 480));
        assert_eq!(window.waits, 0);
    }

    #[test]
    fn test_recreate_twice_matches_once() {
        let mut once = MockGraph::default();
        build(&mut once, (800, 600)).unwrap();
        recreate(&mut once, &mut ScriptedWindow::new(&[(1280, 720)])).unwrap();

        let mut twice = MockGraph::default();
        build(&mut twice, (800, 600)).unwrap();
        recreate(&mut twice, &mut ScriptedWindow::new(&[(1000, 700)])).unwrap();
        recreate(&mut twice, &mut ScriptedWindow::new(&[(1280, 720)])).unwrap();

        assert_eq!(once.built, twice.built);
        assert_eq!(once.built, REBUILD_ORDER.to_vec());
        assert_eq!(once.extent, Some((1280, 720)));
        assert_eq!(once.extent, twice.extent);
    }

    #[test]
    fn test_rebuild_failure_stops_the_chain() {
        let mut graph = MockGraph {
            fail_on: Some(RebuildStage::Pipeline),
            ..Default::default()
        };
        let mut window = ScriptedWindow::new(&[(800, 600)]);

        let result = recreate(&mut graph, &mut window);

        assert!(matches!(result, Err(RhiError::SwapchainError(_))));
        assert_eq!(
            graph.built,
            vec![
                RebuildStage::Swapchain,
                RebuildStage::ImageViews,
                RebuildStage::RenderPass
            ]
        );
    }
}
