//! GPU buffer management.
//!
//! - [`BufferUsage`] selects Vulkan usage flags and the memory location
//! - [`Buffer`] wraps VkBuffer with gpu-allocator managed memory
//! - [`MappedMemory`] is a scoped CPU view of a host-visible buffer
//!
//! Vertex and index buffers live in device-local memory and are filled
//! through a staging buffer (see [`crate::transfer::upload_to_device_local`]).
//! Uniform and staging buffers are host visible.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bento_rhi::device::Device;
//! use bento_rhi::buffer::{Buffer, BufferUsage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), bento_rhi::RhiError> {
//! let mut ubo = Buffer::new(device, BufferUsage::Uniform, 64)?;
//! {
//!     let mut mapped = ubo.map()?;
//!     mapped[..4].copy_from_slice(&1.0f32.to_ne_bytes());
//! } // flushed and released here
//! # Ok(())
//! # }
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Buffer usage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Device-local vertex data, filled by a transfer
    Vertex,
    /// Device-local index data, filled by a transfer
    Index,
    /// Host-visible shader uniform data rewritten every frame
    Uniform,
    /// Host-visible scratch buffer used as a transfer source
    Staging,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => {
                vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST
            }
        }
    }

    /// Returns the memory location for this buffer type.
    pub fn memory_location(self) -> MemoryLocation {
        match self {
            BufferUsage::Vertex | BufferUsage::Index => MemoryLocation::GpuOnly,
            BufferUsage::Uniform | BufferUsage::Staging => MemoryLocation::CpuToGpu,
        }
    }

    /// Returns whether the CPU can map buffers of this type.
    pub fn is_host_visible(self) -> bool {
        self.memory_location() != MemoryLocation::GpuOnly
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
        }
    }
}

/// GPU buffer wrapper with managed memory.
///
/// Dropping the buffer returns its allocation to the device allocator and
/// destroys the VkBuffer.
pub struct Buffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan buffer handle.
    buffer: vk::Buffer,
    /// GPU memory allocation.
    allocation: Option<Allocation>,
    /// Buffer size in bytes.
    size: vk::DeviceSize,
    /// Buffer usage type.
    usage: BufferUsage,
}

impl Buffer {
    /// Creates a new buffer with the specified size.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidSize`] for a zero size without touching the
    /// allocator, or an error if buffer creation or memory allocation fails.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidSize(format!(
                "{} buffer size must be greater than 0",
                usage.name()
            )));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };

        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = device.allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name: usage.name(),
                    requirements,
                    location: usage.memory_location(),
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(RhiError::from)
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let this = Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        };

        if let Some(allocation) = this.allocation.as_ref() {
            unsafe {
                this.device.handle().bind_buffer_memory(
                    this.buffer,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }

        debug!("Created {} buffer: {} bytes", usage.name(), size);
        Ok(this)
    }

    /// Creates a host-visible buffer and fills it with `data`.
    ///
    /// # Errors
    ///
    /// Fails for device-local usages, empty data, or allocation failure.
    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let mut buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write_data(0, data)?;
        Ok(buffer)
    }

    /// Maps the whole buffer for CPU access.
    ///
    /// The returned guard derefs to the buffer's bytes. Dropping it ends the
    /// access and flushes the written range when the memory is not
    /// host-coherent.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if the buffer is not host visible.
    pub fn map(&mut self) -> RhiResult<MappedMemory<'_>> {
        let allocation = self.allocation.as_ref().ok_or_else(|| {
            RhiError::InvalidHandle("Buffer allocation is not available".to_string())
        })?;

        let mapped_ptr = allocation.mapped_ptr().ok_or_else(|| {
            RhiError::InvalidHandle(format!("{} buffer memory is not host visible", self.usage.name()))
        })?;

        let bytes = unsafe {
            std::slice::from_raw_parts_mut(mapped_ptr.as_ptr().cast::<u8>(), self.size as usize)
        };

        Ok(MappedMemory {
            device: &self.device,
            memory: unsafe { allocation.memory() },
            offset: allocation.offset(),
            coherent: allocation
                .memory_properties()
                .contains(vk::MemoryPropertyFlags::HOST_COHERENT),
            bytes,
        })
    }

    /// Copies `data` into the buffer at `offset` through a scoped mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is not host visible or the write would
    /// exceed the buffer size.
    pub fn write_data(&mut self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let end = offset + data.len() as vk::DeviceSize;
        if end > self.size {
            return Err(RhiError::InvalidSize(format!(
                "Write exceeds buffer size: offset {} + data {} > buffer {}",
                offset,
                data.len(),
                self.size
            )));
        }

        let mut mapped = self.map()?;
        mapped[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    /// Reads the buffer contents back to the CPU.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is not host visible.
    pub fn read_data(&mut self) -> RhiResult<Vec<u8>> {
        let mapped = self.map()?;
        Ok(mapped.to_vec())
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the buffer usage type.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free buffer allocation: {:?}", e);
                    }
                }
                Err(e) => error!("Leaking buffer allocation: {}", e),
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}

/// Scoped CPU view of a host-visible buffer.
///
/// Obtained from [`Buffer::map`]. Holds the buffer mutably borrowed so no
/// other access can interleave with the write.
pub struct MappedMemory<'a> {
    device: &'a Device,
    memory: vk::DeviceMemory,
    offset: vk::DeviceSize,
    coherent: bool,
    bytes: &'a mut [u8],
}

impl Deref for MappedMemory<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

impl DerefMut for MappedMemory<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.bytes
    }
}

impl Drop for MappedMemory<'_> {
    fn drop(&mut self) {
        if self.coherent {
            return;
        }

        let atom = self
            .device
            .physical_device_info()
            .properties
            .limits
            .non_coherent_atom_size
            .max(1);
        let (offset, size) = flush_range(self.offset, self.bytes.len() as u64, atom);
        let range = vk::MappedMemoryRange::default()
            .memory(self.memory)
            .offset(offset)
            .size(size);

        if let Err(e) = unsafe { self.device.handle().flush_mapped_memory_ranges(&[range]) } {
            error!("Failed to flush mapped buffer memory: {:?}", e);
        }
    }
}

/// Expands `[offset, offset + len)` to `atom`-aligned bounds.
fn flush_range(offset: u64, len: u64, atom: u64) -> (u64, u64) {
    let start = offset / atom * atom;
    let end = (offset + len).div_ceil(atom) * atom;
    (start, end - start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_to_vk_usage() {
        assert!(
            BufferUsage::Vertex
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert!(
            BufferUsage::Index
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert!(
            BufferUsage::Uniform
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::UNIFORM_BUFFER)
        );
        assert!(
            BufferUsage::Staging
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::TRANSFER_SRC)
        );
    }

    #[test]
    fn test_geometry_is_device_local() {
        assert_eq!(BufferUsage::Vertex.memory_location(), MemoryLocation::GpuOnly);
        assert_eq!(BufferUsage::Index.memory_location(), MemoryLocation::GpuOnly);
        assert!(!BufferUsage::Vertex.is_host_visible());
    }

    #[test]
    fn test_uniform_and_staging_are_host_visible() {
        assert_eq!(BufferUsage::Uniform.memory_location(), MemoryLocation::CpuToGpu);
        assert_eq!(BufferUsage::Staging.memory_location(), MemoryLocation::CpuToGpu);
        assert!(BufferUsage::Uniform.is_host_visible());
        assert!(BufferUsage::Staging.is_host_visible());
    }

    #[test]
    fn test_buffer_usage_name() {
        assert_eq!(BufferUsage::Vertex.name(), "vertex");
        assert_eq!(BufferUsage::Index.name(), "index");
        assert_eq!(BufferUsage::Uniform.name(), "uniform");
        assert_eq!(BufferUsage::Staging.name(), "staging");
    }

    #[test]
    fn test_flush_range_alignment() {
        assert_eq!(flush_range(0, 64, 64), (0, 64));
        assert_eq!(flush_range(100, 10, 64), (64, 64));
        assert_eq!(flush_range(60, 10, 64), (0, 128));
        assert_eq!(flush_range(5, 3, 1), (5, 3));
    }
}
