//! Acquire, submit and present loop with frames in flight.
//!
//! The scheduler owns only bookkeeping: which frame slot is current, which
//! slot last submitted work for each swapchain image, and whether a resize
//! was reported. Everything that touches the GPU goes through
//! [`FrameBackend`], so the state machine can be driven by a fake backend.
//!
//! Per call to [`FrameScheduler::draw_frame`], for slot `f`:
//!
//! 1. wait for slot `f`'s fence
//! 2. acquire an image; out-of-date rebuilds the swapchain and returns
//! 3. wait for the slot that still owns that image, then claim it for `f`
//! 4. refresh the frame-global and per-mesh uniforms for the image
//! 5. reset `f`'s fence and submit
//! 6. present; out-of-date, suboptimal or a pending resize rebuilds
//! 7. optionally wait for the present queue to go idle
//! 8. advance to the next slot

use tracing::{debug, trace, warn};

use bento_platform::FramebufferSource;
use bento_rhi::RhiResult;

/// Number of frame slots the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Result of asking the swapchain for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is available. A suboptimal swapchain can still be rendered to.
    Ready { image_index: u32, suboptimal: bool },
    /// The surface changed and the swapchain can no longer be used.
    OutOfDate,
}

/// Result of queueing an image for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// What happened during one [`FrameScheduler::draw_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was submitted and presented.
    Presented,
    /// The frame was presented, then the swapchain was rebuilt.
    PresentedAndRecreated,
    /// Acquisition found the swapchain out of date. Nothing was submitted and
    /// the swapchain was rebuilt.
    Skipped,
}

/// The GPU operations one frame needs.
///
/// Slots are indices in `0..MAX_FRAMES_IN_FLIGHT`. Each slot owns an
/// image-available semaphore, a render-finished semaphore and a fence that
/// starts signaled.
pub trait FrameBackend {
    /// Number of swapchain images, `N`.
    fn image_count(&self) -> usize;

    /// Blocks until the fence of `slot` is signaled.
    fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()>;

    /// Acquires the next image, signaling `slot`'s image-available semaphore.
    fn acquire_image(&mut self, slot: usize) -> RhiResult<AcquireOutcome>;

    /// Writes this frame's uniform data for `image_index`.
    fn update_uniforms(&mut self, image_index: u32) -> RhiResult<()>;

    /// Resets `slot`'s fence and submits the command buffer of `image_index`.
    fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()>;

    /// Presents `image_index` after `slot`'s render-finished semaphore.
    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome>;

    /// Blocks until the present queue has no pending work.
    fn wait_present_idle(&mut self) -> RhiResult<()>;

    /// Tears down and rebuilds the swapchain graph for the window's size.
    fn recreate_swapchain(&mut self, window: &mut dyn FramebufferSource) -> RhiResult<()>;
}

/// Frame-slot bookkeeping for the draw loop.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    current_frame: usize,
    /// For each swapchain image, the slot whose submission last used it.
    image_fences: Vec<Option<usize>>,
    framebuffer_resized: bool,
    present_wait: bool,
    frames_drawn: u64,
}

impl FrameScheduler {
    /// Creates a scheduler for a swapchain with `image_count` images.
    ///
    /// Waiting for the present queue after every frame is on by default.
    pub fn new(image_count: usize) -> Self {
        Self {
            current_frame: 0,
            image_fences: vec![None; image_count],
            framebuffer_resized: false,
            present_wait: true,
            frames_drawn: 0,
        }
    }

    /// Chooses whether each frame ends with a present-queue wait.
    ///
    /// Waiting keeps at most one present in flight at the cost of any overlap
    /// between presentation and the next frame's CPU work.
    pub fn with_present_wait(mut self, enabled: bool) -> Self {
        self.set_present_wait(enabled);
        self
    }

    pub fn set_present_wait(&mut self, enabled: bool) {
        self.present_wait = enabled;
    }

    /// Requests a swapchain rebuild after the next present.
    pub fn notify_resized(&mut self) {
        self.framebuffer_resized = true;
    }

    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    #[inline]
    pub fn image_fences(&self) -> &[Option<usize>] {
        &self.image_fences
    }

    #[inline]
    pub fn resize_pending(&self) -> bool {
        self.framebuffer_resized
    }

    #[inline]
    pub fn present_wait(&self) -> bool {
        self.present_wait
    }

    /// Frames that reached presentation since creation.
    #[inline]
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Runs one acquire, submit and present cycle.
    ///
    /// # Errors
    ///
    /// Any backend error other than an out-of-date or suboptimal surface is
    /// returned and is fatal to the render loop.
    pub fn draw_frame<B, W>(&mut self, backend: &mut B, window: &mut W) -> RhiResult<FrameStatus>
    where
        B: FrameBackend + ?Sized,
        W: FramebufferSource,
    {
        let slot = self.current_frame;

        backend.wait_for_slot(slot)?;

        let image_index = match backend.acquire_image(slot)? {
            AcquireOutcome::Ready {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    debug!("Acquired image {} from a suboptimal swapchain", image_index);
                }
                image_index
            }
            AcquireOutcome::OutOfDate => {
                debug!("Swapchain out of date at acquire, recreating");
                self.recreate(backend, window)?;
                return Ok(FrameStatus::Skipped);
            }
        };

        self.claim_image(backend, slot, image_index)?;

        backend.update_uniforms(image_index)?;
        backend.submit(slot, image_index)?;

        let presented = backend.present(slot, image_index);
        self.current_frame = (slot + 1) % MAX_FRAMES_IN_FLIGHT;
        let outcome = presented?;
        self.frames_drawn += 1;

        let stale = match outcome {
            PresentOutcome::Presented => false,
            PresentOutcome::Suboptimal => {
                warn!("Present reported a suboptimal swapchain");
                true
            }
            PresentOutcome::OutOfDate => {
                debug!("Present reported an out-of-date swapchain");
                true
            }
        };

        let status = if stale || self.framebuffer_resized {
            self.recreate(backend, window)?;
            FrameStatus::PresentedAndRecreated
        } else {
            FrameStatus::Presented
        };

        if self.present_wait {
            backend.wait_present_idle()?;
        }

        trace!("Frame {} done on slot {}", self.frames_drawn, slot);
        Ok(status)
    }

    /// Waits out any other slot still rendering to `image_index`, then records
    /// `slot` as its owner.
    fn claim_image<B>(&mut self, backend: &mut B, slot: usize, image_index: u32) -> RhiResult<()>
    where
        B: FrameBackend + ?Sized,
    {
        let index = image_index as usize;
        if index >= self.image_fences.len() {
            // The backend reported more images than we track; start tracking them.
            self.image_fences.resize(index + 1, None);
        }

        if let Some(owner) = self.image_fences[index] {
            if owner != slot {
                trace!("Image {} still owned by slot {}, waiting", index, owner);
                backend.wait_for_slot(owner)?;
            }
        }
        self.image_fences[index] = Some(slot);
        Ok(())
    }

    fn recreate<B, W>(&mut self, backend: &mut B, window: &mut W) -> RhiResult<()>
    where
        B: FrameBackend + ?Sized,
        W: FramebufferSource,
    {
        self.framebuffer_resized = false;
        backend.recreate_swapchain(window)?;

        // The device is idle after a rebuild, so no image has an owner.
        self.image_fences.clear();
        self.image_fences.resize(backend.image_count(), None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bento_rhi::RhiError;
    use bento_rhi::vk;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Wait(usize),
        Acquire(usize),
        Update(u32),
        Submit(usize, u32),
        Present(usize, u32),
        PresentIdle,
        Recreate,
    }

    /// Fake GPU: fences are signaled by waiting on them, images rotate.
    struct MockBackend {
        calls: Vec<Call>,
        image_count: usize,
        next_image: u32,
        fence_signaled: [bool; MAX_FRAMES_IN_FLIGHT],
        acquire_script: VecDeque<Option<AcquireOutcome>>,
        present_script: VecDeque<RhiResult<PresentOutcome>>,
        image_count_after_recreate: Option<usize>,
        recreated_for: Vec<(u32, u32)>,
    }

    impl MockBackend {
        fn new(image_count: usize) -> Self {
            Self {
                calls: Vec::new(),
                image_count,
                next_image: 0,
                fence_signaled: [true; MAX_FRAMES_IN_FLIGHT],
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                image_count_after_recreate: None,
                recreated_for: Vec::new(),
            }
        }

        fn submits(&self) -> Vec<(usize, u32)> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Submit(slot, image) => Some((*slot, *image)),
                    _ => None,
                })
                .collect()
        }

        fn count(&self, call: &Call) -> usize {
            self.calls.iter().filter(|c| *c == call).count()
        }
    }

    impl FrameBackend for MockBackend {
        fn image_count(&self) -> usize {
            self.image_count
        }

        fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()> {
            self.calls.push(Call::Wait(slot));
            self.fence_signaled[slot] = true;
            Ok(())
        }

        fn acquire_image(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
            self.calls.push(Call::Acquire(slot));
            if let Some(Some(outcome)) = self.acquire_script.pop_front() {
                return Ok(outcome);
            }
            let image_index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count as u32;
            Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal: false,
            })
        }

        fn update_uniforms(&mut self, image_index: u32) -> RhiResult<()> {
            self.calls.push(Call::Update(image_index));
            Ok(())
        }

        fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
            assert!(self.fence_signaled[slot], "submitted on an unsignaled fence");
            self.fence_signaled[slot] = false;
            self.calls.push(Call::Submit(slot, image_index));
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome> {
            self.calls.push(Call::Present(slot, image_index));
            self.present_script
                .pop_front()
                .unwrap_or(Ok(PresentOutcome::Presented))
        }

        fn wait_present_idle(&mut self) -> RhiResult<()> {
            self.calls.push(Call::PresentIdle);
            Ok(())
        }

        fn recreate_swapchain(&mut self, window: &mut dyn FramebufferSource) -> RhiResult<()> {
            self.calls.push(Call::Recreate);
            self.recreated_for.push(window.framebuffer_size());
            if let Some(count) = self.image_count_after_recreate.take() {
                self.image_count = count;
            }
            self.next_image = 0;
            // Rebuilding idles the device.
            self.fence_signaled = [true; MAX_FRAMES_IN_FLIGHT];
            Ok(())
        }
    }

    struct FixedWindow((u32, u32));

    impl FramebufferSource for FixedWindow {
        fn framebuffer_size(&self) -> (u32, u32) {
            self.0
        }

        fn wait_events(&mut self) {}
    }

    fn window() -> FixedWindow {
        FixedWindow((800, 600))
    }

    fn assert_fences_alias_slots(scheduler: &FrameScheduler) {
        for owner in scheduler.image_fences().iter().flatten() {
            assert!(*owner < MAX_FRAMES_IN_FLIGHT);
        }
    }

    #[test]
    fn test_new_scheduler_has_no_image_owners() {
        let scheduler = FrameScheduler::new(3);
        assert_eq!(scheduler.image_fences(), &[None, None, None]);
        assert_eq!(scheduler.current_frame(), 0);
        assert!(scheduler.present_wait());
        assert!(!scheduler.with_present_wait(false).present_wait());
    }

    #[test]
    fn test_single_frame_follows_the_step_order() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::new(3);

        let status = scheduler.draw_frame(&mut backend, &mut window()).unwrap();

        assert_eq!(status, FrameStatus::Presented);
        assert_eq!(
            backend.calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Update(0),
                Call::Submit(0, 0),
                Call::Present(0, 0),
                Call::PresentIdle,
            ]
        );
        assert_eq!(scheduler.image_fences(), &[Some(0), None, None]);
        assert_eq!(scheduler.current_frame(), 1);
    }

    #[test]
    fn test_slots_cycle_over_frames() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::new(3);

        for _ in 0..5 {
            scheduler.draw_frame(&mut backend, &mut window()).unwrap();
            assert_fences_alias_slots(&scheduler);
        }

        let slots: Vec<usize> = backend.submits().iter().map(|(slot, _)| *slot).collect();
        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
        assert_eq!(scheduler.frames_drawn(), 5);
    }

    #[test]
    fn test_image_owned_by_other_slot_is_waited_on() {
        // Frames 1 and 2 take images 0 and 1 on slots 0 and 1. Frame 3 runs on
        // slot 0 but is handed image 1, which slot 1 still owns.
        let mut backend = MockBackend::new(3);
        backend.acquire_script = VecDeque::from([
            None,
            None,
            Some(AcquireOutcome::Ready {
                image_index: 1,
                suboptimal: false,
            }),
        ]);
        let mut scheduler = FrameScheduler::new(3);

        for _ in 0..3 {
            scheduler.draw_frame(&mut backend, &mut window()).unwrap();
        }

        let start = backend
            .calls
            .iter()
            .rposition(|c| *c == Call::Acquire(0))
            .unwrap();
        assert_eq!(
            &backend.calls[start..start + 4],
            &[
                Call::Acquire(0),
                Call::Wait(1),
                Call::Update(1),
                Call::Submit(0, 1)
            ]
        );
        assert_eq!(scheduler.image_fences(), &[Some(0), Some(0), None]);
        assert_fences_alias_slots(&scheduler);
    }

    #[test]
    fn test_out_of_date_acquire_skips_submit_and_recreates() {
        let mut backend = MockBackend::new(3);
        backend.acquire_script =
            VecDeque::from([None, None, Some(AcquireOutcome::OutOfDate)]);
        backend.image_count_after_recreate = Some(4);
        let mut scheduler = FrameScheduler::new(3);
        let mut window = FixedWindow((1024, 768));

        for _ in 0..2 {
            assert_eq!(
                scheduler.draw_frame(&mut backend, &mut window).unwrap(),
                FrameStatus::Presented
            );
        }
        let submits_before = backend.submits().len();
        let slot_before = scheduler.current_frame();

        let status = scheduler.draw_frame(&mut backend, &mut window).unwrap();

        assert_eq!(status, FrameStatus::Skipped);
        assert_eq!(backend.submits().len(), submits_before);
        assert_eq!(backend.count(&Call::Present(0, 0)), 1);
        assert_eq!(backend.recreated_for, vec![(1024, 768)]);
        assert_eq!(scheduler.image_fences(), &[None, None, None, None]);
        // No fence was reset, so the same slot is safe to use again.
        assert_eq!(scheduler.current_frame(), slot_before);

        let status = scheduler.draw_frame(&mut backend, &mut window).unwrap();
        assert_eq!(status, FrameStatus::Presented);
        assert_eq!(backend.submits().last(), Some(&(slot_before, 0)));
    }

    #[test]
    fn test_suboptimal_acquire_still_draws() {
        let mut backend = MockBackend::new(2);
        backend.acquire_script = VecDeque::from([Some(AcquireOutcome::Ready {
            image_index: 1,
            suboptimal: true,
        })]);
        let mut scheduler = FrameScheduler::new(2);

        let status = scheduler.draw_frame(&mut backend, &mut window()).unwrap();

        assert_eq!(status, FrameStatus::Presented);
        assert_eq!(backend.submits(), vec![(0, 1)]);
        assert_eq!(backend.count(&Call::Recreate), 0);
    }

    #[test]
    fn test_stale_present_recreates_after_presenting() {
        for outcome in [PresentOutcome::OutOfDate, PresentOutcome::Suboptimal] {
            let mut backend = MockBackend::new(3);
            backend.present_script = VecDeque::from([Ok(outcome)]);
            let mut scheduler = FrameScheduler::new(3);

            let status = scheduler.draw_frame(&mut backend, &mut window()).unwrap();

            assert_eq!(status, FrameStatus::PresentedAndRecreated);
            let present = backend.calls.iter().position(|c| *c == Call::Present(0, 0));
            let recreate = backend.calls.iter().position(|c| *c == Call::Recreate);
            assert!(present < recreate);
            assert_eq!(scheduler.current_frame(), 1);
            assert!(scheduler.image_fences().iter().all(Option::is_none));
        }
    }

    #[test]
    fn test_resize_flag_recreates_once_and_clears() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::new(3);

        scheduler.notify_resized();
        scheduler.notify_resized();
        assert!(scheduler.resize_pending());

        let status = scheduler.draw_frame(&mut backend, &mut window()).unwrap();
        assert_eq!(status, FrameStatus::PresentedAndRecreated);
        assert!(!scheduler.resize_pending());

        scheduler.draw_frame(&mut backend, &mut window()).unwrap();
        assert_eq!(backend.count(&Call::Recreate), 1);
    }

    #[test]
    fn test_fatal_present_error_still_advances_slot() {
        let mut backend = MockBackend::new(3);
        backend.present_script =
            VecDeque::from([Err(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST))]);
        let mut scheduler = FrameScheduler::new(3);

        let result = scheduler.draw_frame(&mut backend, &mut window());

        assert!(matches!(
            result,
            Err(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST))
        ));
        assert_eq!(scheduler.current_frame(), 1);
        assert_eq!(backend.count(&Call::Recreate), 0);
    }

    #[test]
    fn test_present_wait_can_be_disabled() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::new(3).with_present_wait(false);

        scheduler.draw_frame(&mut backend, &mut window()).unwrap();

        assert_eq!(backend.count(&Call::PresentIdle), 0);
    }

    #[test]
    fn test_slot_fence_is_waited_before_reuse() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::new(3);

        for _ in 0..4 {
            scheduler.draw_frame(&mut backend, &mut window()).unwrap();
        }

        // Every submit on a slot is preceded by a wait on that slot since the
        // previous submit; MockBackend::submit asserts the fence is signaled.
        assert_eq!(backend.submits().len(), 4);
    }
}
