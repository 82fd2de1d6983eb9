//! Session-wide Vulkan objects shared by every swapchain generation.

use std::sync::Arc;

use tracing::info;

use bento_assets::TextureData;
use bento_core::EngineConfig;
use bento_platform::{Surface, Window};
use bento_rhi::buffer::{Buffer, BufferUsage};
use bento_rhi::command::CommandPool;
use bento_rhi::descriptor::{DescriptorPool, DescriptorSetLayout};
use bento_rhi::device::Device;
use bento_rhi::image::{Image, ImageDesc, ImageView};
use bento_rhi::instance::Instance;
use bento_rhi::physical_device::{find_depth_format, select_physical_device};
use bento_rhi::sampler::Sampler;
use bento_rhi::transfer::{copy_buffer_to_image, transition_image_layout};
use bento_rhi::{RhiResult, vk};

use crate::error::RenderResult;

/// Upper bound on swapchain images used to size the descriptor pool.
pub const MAX_SWAPCHAIN_IMAGES: u32 = 8;

/// Texel format of the shared texture.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Device, queues, pools, layouts and the shared texture.
///
/// Lives for the whole engine session. Only [`DeviceContext::image_count`]
/// and [`DeviceContext::extent`] change, when the swapchain is rebuilt.
pub struct DeviceContext {
    // Field order is drop order: everything created from the device goes
    // first, then the device, the surface and finally the instance.
    texture_view: ImageView,
    texture: Image,
    sampler: Sampler,
    descriptor_pool: Arc<DescriptorPool>,
    global_layout: DescriptorSetLayout,
    object_layout: DescriptorSetLayout,
    transfer_pool: CommandPool,
    command_pool: CommandPool,
    depth_format: vk::Format,
    image_count: usize,
    extent: vk::Extent2D,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,
}

impl DeviceContext {
    /// Creates the instance, surface, device and every session-wide object.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal: missing validation layers, no suitable
    /// GPU, no depth format, a missing texture file or an allocation error.
    pub fn new(window: &Window, config: &EngineConfig) -> RenderResult<Self> {
        let extensions = window.required_extensions()?;
        let instance = Instance::new(&config.title, config.enable_validation, &extensions)?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device)?;
        let depth_format = find_depth_format(instance.handle(), device.physical_device())?;

        let command_pool = CommandPool::new(device.clone(), device.graphics_family())?;
        let transfer_pool = CommandPool::new_transient(device.clone(), device.graphics_family())?;

        let global_layout = DescriptorSetLayout::uniform_with_sampler(device.clone())?;
        let object_layout = DescriptorSetLayout::uniform_with_sampler(device.clone())?;

        // One set per swapchain image for the camera plus one per image for
        // every mesh.
        let max_sets = (config.max_meshes + 1) * MAX_SWAPCHAIN_IMAGES;
        let descriptor_pool = DescriptorPool::for_uniform_sampler_sets(device.clone(), max_sets)?;

        let pixels = TextureData::load_or_default(config.texture_path.as_deref())?;
        let texture = upload_texture(&transfer_pool, &pixels)?;
        let texture_view = ImageView::new(
            device.clone(),
            texture.handle(),
            TEXTURE_FORMAT,
            vk::ImageAspectFlags::COLOR,
        )?;
        let sampler = Sampler::new(device.clone())?;

        info!(
            "Device context ready: depth {:?}, texture {}x{}, descriptor pool for {} sets",
            depth_format, pixels.width, pixels.height, max_sets
        );

        Ok(Self {
            texture_view,
            texture,
            sampler,
            descriptor_pool,
            global_layout,
            object_layout,
            transfer_pool,
            command_pool,
            depth_format,
            image_count: 0,
            extent: vk::Extent2D::default(),
            device,
            surface,
            instance,
        })
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    #[inline]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Pool for the long-lived per-image command buffers.
    #[inline]
    pub fn command_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    /// Transient pool for one-shot transfer commands.
    #[inline]
    pub fn transfer_pool(&self) -> &CommandPool {
        &self.transfer_pool
    }

    #[inline]
    pub fn descriptor_pool(&self) -> &Arc<DescriptorPool> {
        &self.descriptor_pool
    }

    /// Layout of set 0: camera uniform plus texture.
    #[inline]
    pub fn global_layout(&self) -> &DescriptorSetLayout {
        &self.global_layout
    }

    /// Layout of set 1: mesh transform uniform plus texture.
    #[inline]
    pub fn object_layout(&self) -> &DescriptorSetLayout {
        &self.object_layout
    }

    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    #[inline]
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    #[inline]
    pub fn texture_view(&self) -> vk::ImageView {
        self.texture_view.handle()
    }

    #[inline]
    pub fn texture_extent(&self) -> vk::Extent2D {
        self.texture.extent()
    }

    /// Image count of the current swapchain.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.image_count
    }

    /// Extent of the current swapchain.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub(crate) fn set_swapchain_info(&mut self, image_count: usize, extent: vk::Extent2D) {
        self.image_count = image_count;
        self.extent = extent;
    }
}

/// Uploads RGBA8 pixels into a sampled, device-local image.
fn upload_texture(pool: &CommandPool, data: &TextureData) -> RhiResult<Image> {
    let device = pool.device();
    let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, &data.pixels)?;

    let texture = Image::new(
        device.clone(),
        &ImageDesc {
            width: data.width,
            height: data.height,
            format: TEXTURE_FORMAT,
            usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            name: "texture",
        },
    )?;

    transition_image_layout(
        pool,
        texture.handle(),
        TEXTURE_FORMAT,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    )?;
    copy_buffer_to_image(pool, &staging, texture.handle(), data.width, data.height)?;
    transition_image_layout(
        pool,
        texture.handle(),
        TEXTURE_FORMAT,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    )?;

    Ok(texture)
}
