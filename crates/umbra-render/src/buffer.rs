//! Vertex, index, and per-object uniform buffers.

use bytemuck::Pod;
use umbra_scene::{MeshData, Vertex};
use wgpu::util::DeviceExt;

/// Slot stride of dynamic-offset uniform buffers. Matches the default
/// `min_uniform_buffer_offset_alignment`.
pub const UNIFORM_SLOT_ALIGNMENT: u64 = 256;

/// Buffer layout of [`Vertex`]: position, normal, uv, tangent at locations 0-3.
pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Float32x3,
    ];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

/// Position-only view of the same vertex buffer, used by the depth-only pass.
pub fn position_only_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

/// A mesh uploaded to the GPU.
pub struct MeshBuffer {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl MeshBuffer {
    pub fn from_mesh(device: &wgpu::Device, mesh: &MeshData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}-vertices", mesh.name)),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}-indices", mesh.name)),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        }
    }

    /// Bind vertex and index buffers to a render pass.
    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

/// Uploads every mesh of a scene, preserving handle order.
pub fn upload_meshes(device: &wgpu::Device, meshes: &[MeshData]) -> Vec<MeshBuffer> {
    let buffers: Vec<_> = meshes.iter().map(|m| MeshBuffer::from_mesh(device, m)).collect();
    log::debug!("Uploaded {} meshes", buffers.len());
    buffers
}

/// Rounds `size` up to a whole number of uniform slots.
pub fn aligned_slot_size(size: u64) -> u64 {
    size.div_ceil(UNIFORM_SLOT_ALIGNMENT).max(1) * UNIFORM_SLOT_ALIGNMENT
}

/// One uniform buffer holding a `T` per draw at 256-byte strides, bound once
/// with a dynamic offset.
pub struct DynamicUniformBuffer<T: Pod> {
    pub buffer: wgpu::Buffer,
    capacity: usize,
    stride: u64,
    label: &'static str,
    staging: Vec<u8>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Pod> DynamicUniformBuffer<T> {
    pub fn new(device: &wgpu::Device, label: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let stride = aligned_slot_size(std::mem::size_of::<T>() as u64);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            capacity,
            stride,
            label,
            staging: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Binding size seen by the shader.
    pub fn binding_size() -> wgpu::BufferSize {
        wgpu::BufferSize::new(std::mem::size_of::<T>() as u64)
            .unwrap_or(wgpu::BufferSize::MIN)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn offset(&self, index: usize) -> wgpu::DynamicOffset {
        (self.stride * index as u64) as wgpu::DynamicOffset
    }

    /// Writes `items` into consecutive slots. Returns `true` if the buffer had
    /// to grow, in which case bind groups referencing it must be rebuilt.
    pub fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, items: &[T]) -> bool {
        let grew = items.len() > self.capacity;
        if grew {
            let capacity = items.len().next_power_of_two();
            log::debug!("Growing {} to {capacity} slots", self.label);
            *self = Self::new(device, self.label, capacity);
        }
        self.staging.clear();
        self.staging.resize(self.stride as usize * items.len(), 0);
        for (slot, item) in self.staging.chunks_exact_mut(self.stride as usize).zip(items) {
            slot[..std::mem::size_of::<T>()].copy_from_slice(bytemuck::bytes_of(item));
        }
        if !self.staging.is_empty() {
            queue.write_buffer(&self.buffer, 0, &self.staging);
        }
        grew
    }
}
