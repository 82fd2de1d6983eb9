//! Texture sampler.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Upper bound applied to the device's anisotropy limit.
pub const MAX_ANISOTROPY: f32 = 16.0;

/// Linear, repeating, anisotropic sampler shared by every textured draw.
pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Creates the sampler with anisotropy clamped to the device limit.
    ///
    /// # Errors
    ///
    /// Returns an error if sampler creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let max_anisotropy = clamp_anisotropy(device.physical_device_info().max_sampler_anisotropy());

        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(max_anisotropy)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0);

        let sampler = unsafe { device.handle().create_sampler(&create_info, None)? };
        debug!("Created sampler (anisotropy {})", max_anisotropy);

        Ok(Self { device, sampler })
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
    }
}

fn clamp_anisotropy(device_limit: f32) -> f32 {
    device_limit.clamp(1.0, MAX_ANISOTROPY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_anisotropy() {
        assert_eq!(clamp_anisotropy(0.0), 1.0);
        assert_eq!(clamp_anisotropy(8.0), 8.0);
        assert_eq!(clamp_anisotropy(64.0), MAX_ANISOTROPY);
    }
}
