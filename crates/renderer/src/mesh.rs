//! Per-mesh GPU resources and the factory that owns them.
//!
//! A mesh's vertex and index buffers are device-local and written once
//! through a staging buffer. Its uniform buffers and descriptor sets come one
//! per swapchain image and are rebuilt whenever the image count may have
//! changed.

use std::sync::{Arc, Weak};

use tracing::{debug, info};

use bento_rhi::buffer::{Buffer, BufferUsage};
use bento_rhi::descriptor::DescriptorSets;
use bento_rhi::transfer::upload_to_device_local;
use bento_rhi::vertex::Vertex;
use bento_rhi::{RhiError, RhiResult, vk};
use bento_scene::Transform;

use crate::arena::Arena;
use crate::context::DeviceContext;
use crate::error::{RenderError, RenderResult};
use crate::ubo::ObjectUbo;

/// Stable reference to a mesh inside its [`MeshFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(usize);

impl MeshHandle {
    /// Position of the mesh in creation order.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Identity of a factory. Meshes keep only a weak reference to it.
#[derive(Debug)]
struct FactoryTag;

/// Uniform buffers and descriptor sets for each swapchain image.
struct PerImage {
    // Sets reference the buffers, so they go first.
    sets: DescriptorSets,
    uniforms: Vec<Buffer>,
}

impl PerImage {
    fn new(ctx: &DeviceContext, image_count: usize) -> RhiResult<Self> {
        let uniforms = (0..image_count)
            .map(|_| {
                Buffer::new(
                    ctx.device().clone(),
                    BufferUsage::Uniform,
                    ObjectUbo::SIZE as vk::DeviceSize,
                )
            })
            .collect::<RhiResult<Vec<_>>>()?;

        let sets = DescriptorSets::allocate(ctx.descriptor_pool(), ctx.object_layout(), image_count)?;
        let ranges: Vec<_> = uniforms
            .iter()
            .map(|buffer| (buffer.handle(), buffer.size()))
            .collect();
        sets.write_uniform_and_sampler(&ranges, ctx.sampler(), ctx.texture_view());

        Ok(Self { sets, uniforms })
    }
}

/// Geometry plus the per-image data needed to draw it.
pub struct Mesh {
    per_image: Option<PerImage>,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    vertex_count: u32,
    index_count: u32,
    transform: Transform,
    factory: Weak<FactoryTag>,
}

impl Mesh {
    fn new(
        ctx: &DeviceContext,
        vertices: &[Vertex],
        indices: &[u32],
        transform: Transform,
        factory: Weak<FactoryTag>,
    ) -> RenderResult<Self> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(RenderError::InvalidMesh(format!(
                "mesh needs vertices and indices, got {} and {}",
                vertices.len(),
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(RenderError::InvalidMesh(format!(
                "index {} out of range for {} vertices",
                bad,
                vertices.len()
            )));
        }

        let pool = ctx.transfer_pool();
        let vertex_buffer =
            upload_to_device_local(pool, BufferUsage::Vertex, bytemuck::cast_slice(vertices))?;
        let index_buffer =
            upload_to_device_local(pool, BufferUsage::Index, bytemuck::cast_slice(indices))?;

        let per_image = match ctx.image_count() {
            0 => None,
            count => Some(PerImage::new(ctx, count)?),
        };

        Ok(Self {
            per_image,
            vertex_buffer,
            index_buffer,
            vertex_count: vertices.len() as u32,
            index_count: indices.len() as u32,
            transform,
            factory,
        })
    }

    /// Replaces the per-image uniforms and sets with fresh ones for the
    /// context's current image count.
    ///
    /// The old sets are returned to the pool before new ones are allocated.
    pub fn rebuild_per_image(&mut self, ctx: &DeviceContext) -> RhiResult<()> {
        self.per_image = None;
        self.per_image = Some(PerImage::new(ctx, ctx.image_count())?);
        Ok(())
    }

    /// Writes the model matrix for `elapsed` seconds into the uniform buffer
    /// of `image_index`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if the index has no buffer.
    pub fn update_uniform_buffer(&mut self, image_index: u32, elapsed: f32) -> RhiResult<()> {
        let ubo = ObjectUbo::new(self.transform.model_matrix(elapsed));
        self.uniform_mut(image_index)?
            .write_data(0, bytemuck::bytes_of(&ubo))
    }

    /// Reads back the transform last written for `image_index`.
    pub fn read_uniform(&mut self, image_index: u32) -> RhiResult<ObjectUbo> {
        let bytes = self.uniform_mut(image_index)?.read_data()?;
        bytemuck::try_pod_read_unaligned(&bytes)
            .map_err(|e| RhiError::InvalidSize(format!("uniform readback: {}", e)))
    }

    fn uniform_mut(&mut self, image_index: u32) -> RhiResult<&mut Buffer> {
        self.per_image
            .as_mut()
            .and_then(|p| p.uniforms.get_mut(image_index as usize))
            .ok_or_else(|| {
                RhiError::InvalidHandle(format!("mesh has no uniform buffer for image {}", image_index))
            })
    }

    /// Descriptor set for set 1 when drawing into `image_index`.
    pub fn descriptor_set(&self, image_index: usize) -> Option<vk::DescriptorSet> {
        self.per_image.as_ref()?.sets.get(image_index)
    }

    /// Number of per-image uniform buffers.
    pub fn uniform_count(&self) -> usize {
        self.per_image.as_ref().map_or(0, |p| p.uniforms.len())
    }

    /// Number of per-image descriptor sets.
    pub fn descriptor_set_count(&self) -> usize {
        self.per_image.as_ref().map_or(0, |p| p.sets.len())
    }

    #[inline]
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    #[inline]
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    #[inline]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }
}

/// Owns every mesh; handles are indices in creation order.
///
/// Meshes are released together, newest first, when the factory is cleared
/// or dropped.
pub struct MeshFactory {
    meshes: Arena<Mesh>,
    tag: Arc<FactoryTag>,
}

impl MeshFactory {
    pub fn new() -> Self {
        Self {
            meshes: Arena::new(),
            tag: Arc::new(FactoryTag),
        }
    }

    /// Uploads a mesh and allocates its per-image resources.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidMesh`] for empty geometry or
    /// out-of-range indices, or any allocation and transfer error.
    pub fn create(
        &mut self,
        ctx: &DeviceContext,
        vertices: &[Vertex],
        indices: &[u32],
        transform: Transform,
    ) -> RenderResult<MeshHandle> {
        let mesh = Mesh::new(ctx, vertices, indices, transform, Arc::downgrade(&self.tag))?;
        let handle = MeshHandle(self.meshes.insert(mesh));

        info!(
            "Created mesh {}: {} vertices, {} indices",
            handle.index(),
            vertices.len(),
            indices.len()
        );
        Ok(handle)
    }

    #[inline]
    pub fn get(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle.0)
    }

    #[inline]
    pub fn get_mut(&mut self, handle: MeshHandle) -> Option<&mut Mesh> {
        self.meshes.get_mut(handle.0)
    }

    /// Whether `mesh` was created by this factory.
    pub fn owns(&self, mesh: &Mesh) -> bool {
        Weak::ptr_eq(&mesh.factory, &Arc::downgrade(&self.tag))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mesh> {
        self.meshes.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Rebuilds every mesh's per-image resources for the context's current
    /// image count.
    pub fn rebuild_per_image(&mut self, ctx: &DeviceContext) -> RhiResult<()> {
        for mesh in self.meshes.iter_mut() {
            mesh.rebuild_per_image(ctx)?;
        }
        debug!(
            "Rebuilt per-image resources of {} mesh(es) for {} images",
            self.meshes.len(),
            ctx.image_count()
        );
        Ok(())
    }

    /// Writes every mesh's transform for `image_index`, all at the same
    /// `elapsed` time.
    pub fn update_uniforms(&mut self, image_index: u32, elapsed: f32) -> RhiResult<()> {
        for mesh in self.meshes.iter_mut() {
            mesh.update_uniform_buffer(image_index, elapsed)?;
        }
        Ok(())
    }

    /// Releases every mesh, newest first.
    pub fn clear(&mut self) {
        if !self.meshes.is_empty() {
            debug!("Destroying {} mesh(es)", self.meshes.len());
        }
        self.meshes.clear();
    }
}

impl Default for MeshFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_index() {
        assert_eq!(MeshHandle(3).index(), 3);
        assert!(MeshHandle(1) < MeshHandle(2));
    }

    #[test]
    fn test_new_factory_is_empty() {
        let mut factory = MeshFactory::new();
        assert!(factory.is_empty());
        assert_eq!(factory.len(), 0);
        assert!(factory.get(MeshHandle(0)).is_none());
        assert!(factory.get_mut(MeshHandle(0)).is_none());
        factory.clear();
    }

    #[test]
    fn test_back_reference_does_not_keep_factory_alive() {
        let factory = MeshFactory::new();
        let weak = Arc::downgrade(&factory.tag);
        assert_eq!(weak.strong_count(), 1);

        drop(factory);
        assert_eq!(weak.strong_count(), 0);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_factories_have_distinct_identities() {
        let a = MeshFactory::new();
        let b = MeshFactory::new();
        assert!(!Weak::ptr_eq(
            &Arc::downgrade(&a.tag),
            &Arc::downgrade(&b.tag)
        ));
    }

    #[test]
    fn test_factory_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<MeshFactory>();
    }
}
