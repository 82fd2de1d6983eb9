//! The swapchain and every object whose size or count follows it.
//!
//! [`SwapchainManager`] owns the presentable images, their views, the depth
//! buffer, the render pass, the pipeline, the framebuffers, the per-image
//! command buffers and the frame-global uniforms. It implements
//! [`SwapchainStages`] so creation and recreation go through the ordered
//! routine in [`crate::recreate`], and [`FrameBackend`] so the
//! [`FrameScheduler`](crate::FrameScheduler) can drive it.

use tracing::{debug, error, info};

use bento_assets::load_spirv;
use bento_core::EngineConfig;
use bento_platform::{FramebufferSource, Window};
use bento_rhi::buffer::{Buffer, BufferUsage};
use bento_rhi::command::CommandBuffer;
use bento_rhi::descriptor::DescriptorSets;
use bento_rhi::framebuffer::{Framebuffer, create_framebuffers};
use bento_rhi::image::{Image, ImageDesc, ImageView, depth_aspect_mask};
use bento_rhi::pipeline::{ColorBlend, GraphicsPipelineBuilder, Pipeline, PipelineLayout, full_scissor};
use bento_rhi::render_pass::RenderPass;
use bento_rhi::shader::{Shader, ShaderStage};
use bento_rhi::swapchain::Swapchain;
use bento_rhi::sync::SlotSync;
use bento_rhi::transfer::transition_image_layout;
use bento_rhi::vertex::Vertex;
use bento_rhi::{RhiError, RhiResult, vk};
use bento_scene::{Camera, Transform};

use crate::context::DeviceContext;
use crate::error::RenderResult;
use crate::frame_scheduler::{AcquireOutcome, FrameBackend, MAX_FRAMES_IN_FLIGHT, PresentOutcome};
use crate::mesh::{MeshFactory, MeshHandle};
use crate::recreate::{self, RebuildStage, SwapchainStages, TeardownStage};
use crate::ubo::GlobalUbo;

/// Fixed-function choices taken from the engine configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub clear_color: [f32; 4],
    pub depth_test: bool,
    pub blending: bool,
    pub cull_back_faces: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            clear_color: config.clear_color,
            depth_test: config.depth_test,
            blending: config.blending,
            cull_back_faces: config.cull_back_faces,
        }
    }

    fn color_blend(&self) -> ColorBlend {
        if self.blending {
            ColorBlend::StraightAlpha
        } else {
            ColorBlend::Opaque
        }
    }

    fn clear_values(&self) -> [vk::ClearValue; 2] {
        [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ]
    }
}

/// Swapchain-dependent GPU objects plus the meshes drawn into them.
pub struct SwapchainManager {
    // Field order is drop order. Everything here holds the device, so the
    // context goes last.
    command_buffers: Vec<vk::CommandBuffer>,
    global_sets: Option<DescriptorSets>,
    global_uniforms: Vec<Buffer>,
    framebuffers: Vec<Framebuffer>,
    depth_view: Option<ImageView>,
    depth_image: Option<Image>,
    pipeline: Option<Pipeline>,
    pipeline_layout: Option<PipelineLayout>,
    render_pass: Option<RenderPass>,
    image_views: Vec<ImageView>,
    swapchain: Option<Swapchain>,
    slots: Vec<SlotSync>,
    meshes: MeshFactory,
    camera: Camera,
    settings: PipelineSettings,
    vertex_spirv: Vec<u8>,
    fragment_spirv: Vec<u8>,
    elapsed: f32,
    ctx: DeviceContext,
}

impl SwapchainManager {
    /// Initializes Vulkan for `window` and builds the first swapchain.
    ///
    /// Blocks while the window is minimized.
    ///
    /// # Errors
    ///
    /// Every error here is a fatal initialization error.
    pub fn new(window: &mut Window, config: &EngineConfig) -> RenderResult<Self> {
        let ctx = DeviceContext::new(window, config)?;
        let vertex_spirv = load_spirv(&config.vertex_shader_path())?;
        let fragment_spirv = load_spirv(&config.fragment_shader_path())?;
        let slots = SlotSync::create_slots(ctx.device(), MAX_FRAMES_IN_FLIGHT)?;

        let mut this = Self {
            command_buffers: Vec::new(),
            global_sets: None,
            global_uniforms: Vec::new(),
            framebuffers: Vec::new(),
            depth_view: None,
            depth_image: None,
            pipeline: None,
            pipeline_layout: None,
            render_pass: None,
            image_views: Vec::new(),
            swapchain: None,
            slots,
            meshes: MeshFactory::new(),
            camera: Camera::new(),
            settings: PipelineSettings::from_config(config),
            vertex_spirv,
            fragment_spirv,
            elapsed: 0.0,
            ctx,
        };

        let size = recreate::wait_for_nonzero_extent(window);
        recreate::build(&mut this, size)?;

        info!(
            "Renderer initialized: {} swapchain images, {} frames in flight",
            this.image_count(),
            MAX_FRAMES_IN_FLIGHT
        );
        Ok(this)
    }

    // ===== Meshes =====

    /// Uploads a mesh and re-records the command buffers so it gets drawn.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid geometry or any GPU failure.
    pub fn create_mesh(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
        transform: Transform,
    ) -> RenderResult<MeshHandle> {
        // The command buffers about to be freed may still be executing.
        self.ctx.device().wait_idle()?;

        let handle = self.meshes.create(&self.ctx, vertices, indices, transform)?;
        self.rebuild_command_buffers()?;
        Ok(handle)
    }

    fn rebuild_command_buffers(&mut self) -> RhiResult<()> {
        let extent = self.ctx.extent();
        self.teardown(TeardownStage::CommandBuffers);
        self.rebuild(RebuildStage::CommandBuffers, (extent.width, extent.height))
    }

    #[inline]
    pub fn meshes(&self) -> &MeshFactory {
        &self.meshes
    }

    #[inline]
    pub fn meshes_mut(&mut self) -> &mut MeshFactory {
        &mut self.meshes
    }

    // ===== Frame inputs =====

    /// Seconds since the session started, used for every mesh this frame.
    pub fn set_elapsed(&mut self, elapsed: f32) {
        self.elapsed = elapsed;
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[inline]
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Reads back the camera data last written for `image_index`.
    pub fn read_global_uniform(&mut self, image_index: usize) -> RhiResult<GlobalUbo> {
        let bytes = self
            .global_uniforms
            .get_mut(image_index)
            .ok_or_else(|| RhiError::InvalidHandle(format!("no global uniform for image {}", image_index)))?
            .read_data()?;
        bytemuck::try_pod_read_unaligned(&bytes)
            .map_err(|e| RhiError::InvalidSize(format!("global uniform readback: {}", e)))
    }

    // ===== Introspection =====

    #[inline]
    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.ctx.extent()
    }

    #[inline]
    pub fn format(&self) -> Option<vk::Format> {
        self.swapchain.as_ref().map(Swapchain::format)
    }

    #[inline]
    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    #[inline]
    pub fn image_view_count(&self) -> usize {
        self.image_views.len()
    }

    #[inline]
    pub fn command_buffer_count(&self) -> usize {
        self.command_buffers.len()
    }

    #[inline]
    pub fn global_uniform_count(&self) -> usize {
        self.global_uniforms.len()
    }

    /// Whether each frame slot's fence is currently signaled.
    pub fn slot_fences_signaled(&self) -> Vec<bool> {
        self.slots.iter().map(|s| s.in_flight().is_signaled()).collect()
    }

    /// Images, views, framebuffers and command buffers all have `N` entries.
    pub fn is_consistent(&self) -> bool {
        let n = self.swapchain.as_ref().map_or(0, Swapchain::image_count);
        n > 0
            && self.image_views.len() == n
            && self.framebuffers.len() == n
            && self.command_buffers.len() == n
            && self.global_uniforms.len() == n
    }

    /// Blocks until the device has finished all submitted work.
    pub fn wait_idle(&self) -> RhiResult<()> {
        self.ctx.device().wait_idle()
    }

    // ===== Stage helpers =====

    fn swapchain(&self) -> RhiResult<&Swapchain> {
        self.swapchain
            .as_ref()
            .ok_or_else(|| missing("swapchain"))
    }

    fn render_pass(&self) -> RhiResult<&RenderPass> {
        self.render_pass
            .as_ref()
            .ok_or_else(|| missing("render pass"))
    }

    fn slot(&self, slot: usize) -> RhiResult<&SlotSync> {
        self.slots
            .get(slot)
            .ok_or_else(|| RhiError::InvalidHandle(format!("no frame slot {}", slot)))
    }

    fn build_swapchain(&mut self, framebuffer_size: (u32, u32)) -> RhiResult<()> {
        let swapchain = Swapchain::new(
            self.ctx.instance(),
            self.ctx.device().clone(),
            self.ctx.surface().loader(),
            self.ctx.surface().handle(),
            framebuffer_size,
        )?;
        let extent = swapchain.extent();

        self.ctx.set_swapchain_info(swapchain.image_count(), extent);
        self.camera.set_viewport(extent.width, extent.height);
        self.swapchain = Some(swapchain);
        Ok(())
    }

    fn build_pipeline(&mut self) -> RhiResult<()> {
        let device = self.ctx.device();
        let vertex = Shader::from_spirv_bytes(device.clone(), &self.vertex_spirv, ShaderStage::Vertex)?;
        let fragment =
            Shader::from_spirv_bytes(device.clone(), &self.fragment_spirv, ShaderStage::Fragment)?;

        let layout = PipelineLayout::new(
            device.clone(),
            &[
                self.ctx.global_layout().handle(),
                self.ctx.object_layout().handle(),
            ],
        )?;

        let pipeline = GraphicsPipelineBuilder::new(&vertex, &fragment)
            .vertex_input(Vertex::binding_description(), &Vertex::attribute_descriptions())
            .extent(self.ctx.extent())
            .cull_back_faces(self.settings.cull_back_faces)
            .blend(self.settings.color_blend())
            .depth_test(self.settings.depth_test)
            .build(device.clone(), &layout, self.render_pass()?.handle())?;

        self.pipeline_layout = Some(layout);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn build_depth_resources(&mut self) -> RhiResult<()> {
        let device = self.ctx.device();
        let format = self.ctx.depth_format();
        let extent = self.ctx.extent();

        let image = Image::new(
            device.clone(),
            &ImageDesc {
                width: extent.width,
                height: extent.height,
                format,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                name: "depth",
            },
        )?;
        let view = ImageView::new(device.clone(), image.handle(), format, depth_aspect_mask(format))?;

        transition_image_layout(
            self.ctx.transfer_pool(),
            image.handle(),
            format,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )?;

        self.depth_image = Some(image);
        self.depth_view = Some(view);
        Ok(())
    }

    fn build_framebuffers(&mut self) -> RhiResult<()> {
        let views: Vec<_> = self.image_views.iter().map(ImageView::handle).collect();
        let depth = self
            .depth_view
            .as_ref()
            .map(ImageView::handle)
            .ok_or_else(|| missing("depth view"))?;

        self.framebuffers = create_framebuffers(
            self.ctx.device(),
            self.render_pass()?.handle(),
            &views,
            Some(depth),
            self.ctx.extent(),
        )?;
        Ok(())
    }

    /// Frame-global uniforms and sets, then every mesh's.
    fn build_uniform_resources(&mut self) -> RhiResult<()> {
        let count = self.ctx.image_count();

        self.global_sets = None;
        self.global_uniforms.clear();

        let uniforms = (0..count)
            .map(|_| {
                Buffer::new(
                    self.ctx.device().clone(),
                    BufferUsage::Uniform,
                    GlobalUbo::SIZE as vk::DeviceSize,
                )
            })
            .collect::<RhiResult<Vec<_>>>()?;
        let sets = DescriptorSets::allocate(self.ctx.descriptor_pool(), self.ctx.global_layout(), count)?;
        let ranges: Vec<_> = uniforms.iter().map(|b| (b.handle(), b.size())).collect();
        sets.write_uniform_and_sampler(&ranges, self.ctx.sampler(), self.ctx.texture_view());

        self.global_uniforms = uniforms;
        self.global_sets = Some(sets);

        self.meshes.rebuild_per_image(&self.ctx)
    }

    fn build_command_buffers(&mut self) -> RhiResult<()> {
        let count = self.framebuffers.len();
        let buffers = self.ctx.command_pool().allocate_command_buffers(count as u32)?;
        // Kept before recording so a failure still frees them on teardown.
        self.command_buffers = buffers;

        for image_index in 0..count {
            self.record_command_buffer(image_index)?;
        }
        debug!("Recorded {} command buffer(s) for {} mesh(es)", count, self.meshes.len());
        Ok(())
    }

    fn record_command_buffer(&self, image_index: usize) -> RhiResult<()> {
        let pipeline = self.pipeline.as_ref().ok_or_else(|| missing("pipeline"))?;
        let layout = self
            .pipeline_layout
            .as_ref()
            .ok_or_else(|| missing("pipeline layout"))?;
        let global_set = self
            .global_sets
            .as_ref()
            .and_then(|sets| sets.get(image_index))
            .ok_or_else(|| missing("global descriptor set"))?;
        let framebuffer = self
            .framebuffers
            .get(image_index)
            .ok_or_else(|| missing("framebuffer"))?;

        let cmd = CommandBuffer::from_handle(
            self.ctx.device().clone(),
            self.command_buffers[image_index],
        );
        cmd.begin_reusable()?;

        let clear_values = self.settings.clear_values();
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass()?.handle())
            .framebuffer(framebuffer.handle())
            .render_area(full_scissor(self.ctx.extent()))
            .clear_values(&clear_values);

        cmd.begin_render_pass(&begin_info);
        cmd.bind_pipeline(pipeline.bind_point(), pipeline.handle());

        for mesh in self.meshes.iter() {
            let object_set = mesh
                .descriptor_set(image_index)
                .ok_or_else(|| missing("mesh descriptor set"))?;

            cmd.bind_descriptor_sets(
                pipeline.bind_point(),
                layout.handle(),
                0,
                &[global_set, object_set],
                &[],
            );
            cmd.bind_vertex_buffers(0, &[mesh.vertex_buffer()], &[0]);
            cmd.bind_index_buffer(mesh.index_buffer(), 0, vk::IndexType::UINT32);
            cmd.draw_indexed(mesh.index_count(), 1, 0, 0, 0);
        }

        cmd.end_render_pass();
        cmd.end()
    }
}

fn missing(what: &str) -> RhiError {
    RhiError::InvalidHandle(format!("{} is not built", what))
}

impl SwapchainStages for SwapchainManager {
    fn wait_device_idle(&mut self) -> RhiResult<()> {
        self.ctx.device().wait_idle()
    }

    fn teardown(&mut self, stage: TeardownStage) {
        match stage {
            TeardownStage::DepthView => self.depth_view = None,
            TeardownStage::DepthImage => self.depth_image = None,
            TeardownStage::Framebuffers => self.framebuffers.clear(),
            TeardownStage::CommandBuffers => {
                if !self.command_buffers.is_empty() {
                    self.ctx
                        .command_pool()
                        .free_command_buffers(&self.command_buffers);
                    self.command_buffers.clear();
                }
            }
            TeardownStage::Pipeline => self.pipeline = None,
            TeardownStage::PipelineLayout => self.pipeline_layout = None,
            TeardownStage::RenderPass => self.render_pass = None,
            TeardownStage::ImageViews => self.image_views.clear(),
            TeardownStage::Swapchain => self.swapchain = None,
        }
    }

    fn rebuild(&mut self, stage: RebuildStage, framebuffer_size: (u32, u32)) -> RhiResult<()> {
        match stage {
            RebuildStage::Swapchain => self.build_swapchain(framebuffer_size),
            RebuildStage::ImageViews => {
                self.image_views = self.swapchain()?.create_image_views()?;
                Ok(())
            }
            RebuildStage::RenderPass => {
                let render_pass = RenderPass::new(
                    self.ctx.device().clone(),
                    self.swapchain()?.format(),
                    Some(self.ctx.depth_format()),
                )?;
                self.render_pass = Some(render_pass);
                Ok(())
            }
            RebuildStage::Pipeline => self.build_pipeline(),
            RebuildStage::DepthResources => self.build_depth_resources(),
            RebuildStage::Framebuffers => self.build_framebuffers(),
            RebuildStage::MeshResources => self.build_uniform_resources(),
            RebuildStage::CommandBuffers => self.build_command_buffers(),
        }
    }
}

impl FrameBackend for SwapchainManager {
    fn image_count(&self) -> usize {
        self.ctx.image_count()
    }

    fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()> {
        self.slot(slot)?.in_flight().wait(u64::MAX)
    }

    fn acquire_image(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
        let semaphore = self.slot(slot)?.image_available().handle();
        match self.swapchain()?.acquire_next_image(semaphore) {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(RhiError::VulkanError(e)),
        }
    }

    fn update_uniforms(&mut self, image_index: u32) -> RhiResult<()> {
        let ubo = GlobalUbo::from_camera(&self.camera);
        self.global_uniforms
            .get_mut(image_index as usize)
            .ok_or_else(|| missing("global uniform buffer"))?
            .write_data(0, bytemuck::bytes_of(&ubo))?;

        self.meshes.update_uniforms(image_index, self.elapsed)
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        let command_buffer = *self
            .command_buffers
            .get(image_index as usize)
            .ok_or_else(|| missing("command buffer"))?;
        let sync = self.slot(slot)?;

        sync.in_flight().reset()?;

        let wait_semaphores = [sync.image_available().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [sync.render_finished().handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the command buffer is fully recorded, the slot's fence was
        // just reset and its semaphores are not used by any pending submit.
        unsafe {
            self.ctx
                .device()
                .submit_graphics(&[submit_info], sync.in_flight().handle())
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome> {
        let wait = self.slot(slot)?.render_finished().handle();
        let result = self
            .swapchain()?
            .present(self.ctx.device().present_queue(), image_index, wait);

        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(RhiError::VulkanError(e)),
        }
    }

    fn wait_present_idle(&mut self) -> RhiResult<()> {
        self.ctx.device().wait_present_idle()
    }

    fn recreate_swapchain(&mut self, window: &mut dyn FramebufferSource) -> RhiResult<()> {
        recreate::recreate(self, window).map(|_| ())
    }
}

impl Drop for SwapchainManager {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.device().wait_idle() {
            error!("Failed to wait for device idle during renderer drop: {}", e);
        }

        self.teardown(TeardownStage::CommandBuffers);
        self.meshes.clear();

        info!("Renderer destroyed");
    }
}
