//! Framebuffers binding swapchain views (and the shared depth view) to a
//! render pass.

use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Owned VkFramebuffer.
pub struct Framebuffer {
    device: Arc<Device>,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Creates a single-layer framebuffer over `attachments`.
    ///
    /// Attachment order must match the render pass: color first, then depth.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidSize`] for a zero extent or an empty
    /// attachment list, or a Vulkan error from creation.
    pub fn new(
        device: Arc<Device>,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        if attachments.is_empty() || extent.width == 0 || extent.height == 0 {
            return Err(RhiError::InvalidSize(format!(
                "framebuffer {}x{} with {} attachments",
                extent.width,
                extent.height,
                attachments.len()
            )));
        }

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.handle().create_framebuffer(&create_info, None)? };

        Ok(Self {
            device,
            framebuffer,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Builds one framebuffer per color view, each sharing `depth_view` when set.
///
/// # Errors
///
/// Returns the first creation error. Framebuffers created before it are
/// destroyed.
pub fn create_framebuffers(
    device: &Arc<Device>,
    render_pass: vk::RenderPass,
    color_views: &[vk::ImageView],
    depth_view: Option<vk::ImageView>,
    extent: vk::Extent2D,
) -> RhiResult<Vec<Framebuffer>> {
    color_views
        .iter()
        .map(|&color| {
            let attachments = attachment_list(color, depth_view);
            Framebuffer::new(device.clone(), render_pass, &attachments, extent)
        })
        .collect()
}

fn attachment_list(color: vk::ImageView, depth: Option<vk::ImageView>) -> Vec<vk::ImageView> {
    std::iter::once(color).chain(depth).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_attachment_order_is_color_then_depth() {
        let color = vk::ImageView::from_raw(1);
        let depth = vk::ImageView::from_raw(2);

        assert_eq!(attachment_list(color, Some(depth)), vec![color, depth]);
        assert_eq!(attachment_list(color, None), vec![color]);
    }
}
