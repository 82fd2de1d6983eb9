//! One-shot transfer commands: buffer copies, buffer-to-image uploads and
//! image layout transitions.
//!
//! Each operation records into a freshly allocated command buffer from a
//! (typically transient) pool, submits it to the graphics queue, waits for
//! the queue to drain and frees the buffer. Nothing is batched.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bento_rhi::buffer::BufferUsage;
//! use bento_rhi::command::CommandPool;
//! use bento_rhi::device::Device;
//! use bento_rhi::transfer::upload_to_device_local;
//!
//! # fn example(device: Arc<Device>, pool: &CommandPool) -> Result<(), bento_rhi::RhiError> {
//! let indices: [u32; 3] = [0, 1, 2];
//! let index_buffer =
//!     upload_to_device_local(pool, BufferUsage::Index, bytemuck::cast_slice(&indices))?;
//! # Ok(())
//! # }
//! ```

use ash::vk;
use tracing::debug;

use crate::buffer::{Buffer, BufferUsage};
use crate::command::{CommandBuffer, CommandPool};
use crate::error::{RhiError, RhiResult};
use crate::image::{depth_aspect_mask, subresource_range};

/// Access masks and pipeline stages for one layout transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionMasks {
    /// Accesses that must complete before the transition
    pub src_access: vk::AccessFlags,
    /// Accesses that wait for the transition
    pub dst_access: vk::AccessFlags,
    /// Stage the barrier waits on
    pub src_stage: vk::PipelineStageFlags,
    /// Stage blocked by the barrier
    pub dst_stage: vk::PipelineStageFlags,
}

/// Barrier recipe for an image layout transition.
///
/// # Errors
///
/// Returns [`RhiError::UnsupportedLayoutTransition`] for any pair other than
/// `UNDEFINED -> TRANSFER_DST_OPTIMAL`,
/// `TRANSFER_DST_OPTIMAL -> SHADER_READ_ONLY_OPTIMAL` and
/// `UNDEFINED -> DEPTH_STENCIL_ATTACHMENT_OPTIMAL`.
pub fn transition_masks(
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> RhiResult<TransitionMasks> {
    use vk::ImageLayout as L;

    match (old, new) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => Ok(TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        }),
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => Ok(TransitionMasks {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        }),
        (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => Ok(TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        }),
        _ => Err(RhiError::UnsupportedLayoutTransition { old, new }),
    }
}

/// Aspect mask an image of `format` is transitioned with when entering `new`.
pub fn transition_aspect(format: vk::Format, new: vk::ImageLayout) -> vk::ImageAspectFlags {
    if new == vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL {
        depth_aspect_mask(format)
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// Command buffer that is freed back to its pool when dropped.
struct OneShot<'a> {
    pool: &'a CommandPool,
    cmd: CommandBuffer,
}

impl Drop for OneShot<'_> {
    fn drop(&mut self) {
        self.pool.free_command_buffers(&[self.cmd.handle()]);
    }
}

/// Records `record` into a one-shot command buffer, submits it to the
/// graphics queue and blocks until the queue is idle.
///
/// # Errors
///
/// Returns an error from allocation, recording, submission or the wait.
pub fn submit_one_shot<F>(pool: &CommandPool, record: F) -> RhiResult<()>
where
    F: FnOnce(&CommandBuffer) -> RhiResult<()>,
{
    let device = pool.device();
    let one_shot = OneShot {
        pool,
        cmd: CommandBuffer::from_handle(device.clone(), pool.allocate_command_buffer()?),
    };

    one_shot.cmd.begin()?;
    record(&one_shot.cmd)?;
    one_shot.cmd.end()?;

    let command_buffers = [one_shot.cmd.handle()];
    let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

    unsafe { device.submit_graphics(&[submit_info], vk::Fence::null())? };
    device.wait_graphics_idle()?;

    Ok(())
}

/// Copies `size` bytes from the start of `src` to the start of `dst`.
pub fn copy_buffer(
    pool: &CommandPool,
    src: &Buffer,
    dst: &Buffer,
    size: vk::DeviceSize,
) -> RhiResult<()> {
    if size > src.size() || size > dst.size() {
        return Err(RhiError::InvalidSize(format!(
            "copy of {} bytes exceeds source ({}) or destination ({})",
            size,
            src.size(),
            dst.size()
        )));
    }

    submit_one_shot(pool, |cmd| {
        let region = vk::BufferCopy::default().size(size);
        cmd.copy_buffer(src.handle(), dst.handle(), &[region]);
        Ok(())
    })
}

/// Copies tightly packed texels from `src` into `image`, which must be in
/// `TRANSFER_DST_OPTIMAL`.
pub fn copy_buffer_to_image(
    pool: &CommandPool,
    src: &Buffer,
    image: vk::Image,
    width: u32,
    height: u32,
) -> RhiResult<()> {
    submit_one_shot(pool, |cmd| {
        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .mip_level(0)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            });
        cmd.copy_buffer_to_image(
            src.handle(),
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        );
        Ok(())
    })
}

/// Transitions `image` from `old` to `new` layout.
///
/// # Errors
///
/// Returns [`RhiError::UnsupportedLayoutTransition`] before recording
/// anything if the pair has no recipe.
pub fn transition_image_layout(
    pool: &CommandPool,
    image: vk::Image,
    format: vk::Format,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> RhiResult<()> {
    let masks = transition_masks(old, new)?;

    submit_one_shot(pool, |cmd| {
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old)
            .new_layout(new)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(subresource_range(transition_aspect(format, new)))
            .src_access_mask(masks.src_access)
            .dst_access_mask(masks.dst_access);
        cmd.pipeline_barrier(masks.src_stage, masks.dst_stage, &[barrier]);
        Ok(())
    })?;

    debug!("Transitioned image {:?}: {:?} -> {:?}", image, old, new);
    Ok(())
}

/// Creates a device-local buffer of `usage` filled with `data` via a
/// temporary staging buffer.
///
/// The staging buffer is released as soon as the copy has completed.
///
/// # Errors
///
/// Returns [`RhiError::InvalidSize`] for empty data, or any allocation or
/// transfer error.
pub fn upload_to_device_local(
    pool: &CommandPool,
    usage: BufferUsage,
    data: &[u8],
) -> RhiResult<Buffer> {
    let device = pool.device();
    let size = data.len() as vk::DeviceSize;

    let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, data)?;
    let buffer = Buffer::new(device.clone(), usage, size)?;
    copy_buffer(pool, &staging, &buffer, size)?;

    debug!("Uploaded {} bytes into device-local {} buffer", size, usage.name());
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_transition_masks() {
        let masks = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap();
        assert_eq!(masks.src_access, vk::AccessFlags::empty());
        assert_eq!(masks.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn test_shader_read_transition_masks() {
        let masks = transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(masks.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn test_depth_transition_masks() {
        let masks = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )
        .unwrap();
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);
        assert!(
            masks
                .dst_access
                .contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        );
    }

    #[test]
    fn test_unsupported_transition_is_error() {
        let result = transition_masks(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        match result {
            Err(RhiError::UnsupportedLayoutTransition { old, new }) => {
                assert_eq!(old, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
                assert_eq!(new, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
            }
            other => panic!("Expected UnsupportedLayoutTransition, got {:?}", other),
        }
    }

    #[test]
    fn test_present_transition_not_supported() {
        assert!(
            transition_masks(
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::PRESENT_SRC_KHR
            )
            .is_err()
        );
    }

    #[test]
    fn test_transition_aspect() {
        assert_eq!(
            transition_aspect(
                vk::Format::R8G8B8A8_SRGB,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL
            ),
            vk::ImageAspectFlags::COLOR
        );
        assert_eq!(
            transition_aspect(
                vk::Format::D24_UNORM_S8_UINT,
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
            ),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
    }
}
