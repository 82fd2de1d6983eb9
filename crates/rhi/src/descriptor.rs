//! Descriptor layouts, pools and sets.
//!
//! Every set this engine binds has the same shape: binding 0 is a uniform
//! buffer read by the vertex stage, binding 1 a combined image sampler read
//! by the fragment stage. Set 0 carries the camera, set 1 the object.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bento_rhi::device::Device;
//! use bento_rhi::descriptor::{DescriptorPool, DescriptorSetLayout, DescriptorSets};
//!
//! # fn example(device: Arc<Device>) -> Result<(), bento_rhi::RhiError> {
//! let layout = DescriptorSetLayout::uniform_with_sampler(device.clone())?;
//! let pool = DescriptorPool::for_uniform_sampler_sets(device.clone(), 16)?;
//! let sets = DescriptorSets::allocate(&pool, &layout, 3)?;
//! assert_eq!(sets.len(), 3);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, warn};

use crate::device::Device;
use crate::error::RhiResult;

/// Binding index of the uniform buffer in every set.
pub const UNIFORM_BINDING: u32 = 0;
/// Binding index of the combined image sampler in every set.
pub const SAMPLER_BINDING: u32 = 1;

/// Owned VkDescriptorSetLayout.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Creates a layout from explicit bindings.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );

        Ok(Self { device, layout })
    }

    /// Uniform buffer (vertex) at binding 0, sampler (fragment) at binding 1.
    pub fn uniform_with_sampler(device: Arc<Device>) -> RhiResult<Self> {
        Self::new(device, &uniform_with_sampler_bindings())
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Owned VkDescriptorPool that allows freeing individual sets.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
    max_sets: u32,
}

impl DescriptorPool {
    /// Creates a pool with `FREE_DESCRIPTOR_SET`.
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation fails.
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Arc<Self>> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };

        debug!("Created descriptor pool (max_sets={})", max_sets);

        Ok(Arc::new(Self {
            device,
            pool,
            max_sets,
        }))
    }

    /// Pool sized for `max_sets` sets of the uniform + sampler shape.
    pub fn for_uniform_sampler_sets(device: Arc<Device>, max_sets: u32) -> RhiResult<Arc<Self>> {
        Self::new(device, max_sets, &uniform_with_sampler_pool_sizes(max_sets))
    }

    /// Allocates one set per entry in `layouts`.
    ///
    /// # Errors
    ///
    /// Returns `ERROR_OUT_OF_POOL_MEMORY` (wrapped) when the pool is exhausted.
    pub fn allocate(&self, layouts: &[vk::DescriptorSetLayout]) -> RhiResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };
        Ok(sets)
    }

    /// Returns sets to the pool. The sets must not be in use by the GPU.
    pub fn free(&self, sets: &[vk::DescriptorSet]) -> RhiResult<()> {
        if sets.is_empty() {
            return Ok(());
        }
        unsafe {
            self.device.handle().free_descriptor_sets(self.pool, sets)?;
        }
        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_descriptor_pool(self.pool, None);
        }
        debug!("Destroyed descriptor pool");
    }
}

/// A group of sets that returns itself to its pool on drop.
///
/// Holds the pool alive, so sets never outlive the pool they came from.
pub struct DescriptorSets {
    pool: Arc<DescriptorPool>,
    sets: Vec<vk::DescriptorSet>,
}

impl DescriptorSets {
    /// Allocates `count` sets of `layout`.
    pub fn allocate(
        pool: &Arc<DescriptorPool>,
        layout: &DescriptorSetLayout,
        count: usize,
    ) -> RhiResult<Self> {
        let layouts = vec![layout.handle(); count];
        let sets = pool.allocate(&layouts)?;

        Ok(Self {
            pool: pool.clone(),
            sets,
        })
    }

    /// Points every set at its own uniform buffer plus the shared texture.
    ///
    /// `uniform_buffers[i]` is written into set `i`; the slices must have the
    /// same length as the group.
    pub fn write_uniform_and_sampler(
        &self,
        uniform_buffers: &[(vk::Buffer, vk::DeviceSize)],
        sampler: vk::Sampler,
        image_view: vk::ImageView,
    ) {
        debug_assert_eq!(uniform_buffers.len(), self.sets.len());

        for (&set, &(buffer, range)) in self.sets.iter().zip(uniform_buffers) {
            let buffer_infos = [buffer_info(buffer, 0, range)];
            let image_infos = [image_info(
                sampler,
                image_view,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )];

            let writes = [
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(UNIFORM_BINDING)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&buffer_infos),
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(SAMPLER_BINDING)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&image_infos),
            ];

            unsafe {
                self.pool.device().handle().update_descriptor_sets(&writes, &[]);
            }
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<vk::DescriptorSet> {
        self.sets.get(index).copied()
    }

    #[inline]
    pub fn handles(&self) -> &[vk::DescriptorSet] {
        &self.sets
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl Drop for DescriptorSets {
    fn drop(&mut self) {
        if let Err(e) = self.pool.free(&self.sets) {
            warn!("Failed to free {} descriptor set(s): {}", self.sets.len(), e);
        }
    }
}

/// Bindings for the uniform + sampler set shape.
pub fn uniform_with_sampler_bindings() -> [vk::DescriptorSetLayoutBinding<'static>; 2] {
    [
        vk::DescriptorSetLayoutBinding::default()
            .binding(UNIFORM_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX),
        vk::DescriptorSetLayoutBinding::default()
            .binding(SAMPLER_BINDING)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT),
    ]
}

/// Pool sizes covering `max_sets` uniform + sampler sets.
pub fn uniform_with_sampler_pool_sizes(max_sets: u32) -> [vk::DescriptorPoolSize; 2] {
    [
        vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(max_sets),
        vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(max_sets),
    ]
}

#[inline]
pub fn buffer_info(
    buffer: vk::Buffer,
    offset: vk::DeviceSize,
    range: vk::DeviceSize,
) -> vk::DescriptorBufferInfo {
    vk::DescriptorBufferInfo::default()
        .buffer(buffer)
        .offset(offset)
        .range(range)
}

#[inline]
pub fn image_info(
    sampler: vk::Sampler,
    image_view: vk::ImageView,
    image_layout: vk::ImageLayout,
) -> vk::DescriptorImageInfo {
    vk::DescriptorImageInfo::default()
        .sampler(sampler)
        .image_view(image_view)
        .image_layout(image_layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_uniform_with_sampler_bindings() {
        let [uniform, sampler] = uniform_with_sampler_bindings();

        assert_eq!(uniform.binding, UNIFORM_BINDING);
        assert_eq!(uniform.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(uniform.stage_flags, vk::ShaderStageFlags::VERTEX);

        assert_eq!(sampler.binding, SAMPLER_BINDING);
        assert_eq!(
            sampler.descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
        assert_eq!(sampler.stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_pool_sizes_match_set_count() {
        let sizes = uniform_with_sampler_pool_sizes(12);
        assert!(sizes.iter().all(|s| s.descriptor_count == 12));
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[1].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
    }

    #[test]
    fn test_buffer_info_helper() {
        let buffer = vk::Buffer::from_raw(7);
        let info = buffer_info(buffer, 0, 128);
        assert_eq!(info.buffer, buffer);
        assert_eq!(info.range, 128);
    }

    #[test]
    fn test_image_info_helper() {
        let info = image_info(
            vk::Sampler::null(),
            vk::ImageView::null(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        assert_eq!(info.image_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }

    #[test]
    fn test_descriptor_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DescriptorSetLayout>();
        assert_send_sync::<DescriptorPool>();
        assert_send_sync::<DescriptorSets>();
    }
}
