// Buffer wrappers for vertex, index, and uniform data
//
// Buffer: raw VkBuffer + bound VkDeviceMemory, freed on drop
// StagedBuffer: host-visible staging copy, consumed by the upload into device-local memory
// UniformBuffer: host-visible buffer rewritten every frame

use anyhow::{Context, Result};
use ash::vk;
use bytemuck::Pod;
use std::marker::PhantomData;
use std::sync::Arc;
use super::VulkanDevice;

const HOST_MAPPABLE: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// A GPU buffer with its own memory allocation
pub struct Buffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
    device: Arc<VulkanDevice>,
}

impl Buffer {
    pub fn new(
        device: Arc<VulkanDevice>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        memory_properties: vk::MemoryPropertyFlags,
    ) -> Result<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device.device.create_buffer(&buffer_info, None)
                .context("Failed to create buffer")?
        };

        // Null memory is ignored by vkFreeMemory if allocation fails below
        let mut this = Self {
            buffer,
            memory: vk::DeviceMemory::null(),
            size,
            device,
        };

        let mem_requirements = unsafe {
            this.device.device.get_buffer_memory_requirements(buffer)
        };

        let memory_type_index = find_memory_type(
            &this.device.memory_properties,
            mem_requirements.memory_type_bits,
            memory_properties,
        )?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        this.memory = unsafe {
            this.device.device.allocate_memory(&alloc_info, None)
                .context("Failed to allocate buffer memory")?
        };

        unsafe {
            this.device.device.bind_buffer_memory(buffer, this.memory, 0)
                .context("Failed to bind buffer memory")?;
        }

        Ok(this)
    }

    /// Host-visible, host-coherent buffer
    pub fn host_visible(
        device: Arc<VulkanDevice>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> Result<Self> {
        Self::new(device, size, usage, HOST_MAPPABLE)
    }

    /// Copy `data` to the start of the buffer. Only valid for host-visible memory.
    pub fn write<T: Pod>(&self, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let len = bytes.len() as vk::DeviceSize;
        if len > self.size {
            anyhow::bail!("Write of {} bytes exceeds buffer size {}", len, self.size);
        }

        unsafe {
            let ptr = self.device.device.map_memory(
                self.memory,
                0,
                len,
                vk::MemoryMapFlags::empty(),
            )? as *mut u8;

            ptr.copy_from_nonoverlapping(bytes.as_ptr(), bytes.len());
            self.device.device.unmap_memory(self.memory);
        }

        Ok(())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_buffer(self.buffer, None);
            self.device.device.free_memory(self.memory, None);
        }
    }
}

/// Device-local buffer waiting to be filled from a host-visible staging buffer
pub struct StagedBuffer {
    staging: Buffer,
    device_buffer: Buffer,
}

impl StagedBuffer {
    pub fn new<T: Pod>(
        device: Arc<VulkanDevice>,
        data: &[T],
        usage: vk::BufferUsageFlags,
    ) -> Result<Self> {
        let size = std::mem::size_of_val(data) as vk::DeviceSize;
        if size == 0 {
            anyhow::bail!("Cannot create an empty buffer");
        }

        let staging = Buffer::host_visible(device.clone(), size, vk::BufferUsageFlags::TRANSFER_SRC)?;
        staging.write(data)?;

        let device_buffer = Buffer::new(
            device,
            size,
            vk::BufferUsageFlags::TRANSFER_DST | usage,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        Ok(Self {
            staging,
            device_buffer,
        })
    }

    /// Copy the staging contents into the device-local buffer and wait for it.
    ///
    /// The staging buffer is freed on return; only the device-local buffer
    /// survives.
    pub fn upload(self) -> Result<Buffer> {
        let Self { staging, device_buffer } = self;
        let size = staging.size;

        submit_one_time(&staging.device, |cmd| unsafe {
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size,
            };
            staging.device.device.cmd_copy_buffer(cmd, staging.buffer, device_buffer.buffer, &[region]);
        })?;

        Ok(device_buffer)
    }
}

/// Host-visible uniform buffer holding exactly one `T`
pub struct UniformBuffer<T: Pod> {
    pub buffer: Buffer,
    _marker: PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    pub fn new(device: Arc<VulkanDevice>) -> Result<Self> {
        let size = std::mem::size_of::<T>() as vk::DeviceSize;
        let buffer = Buffer::host_visible(device, size, vk::BufferUsageFlags::UNIFORM_BUFFER)?;
        Ok(Self {
            buffer,
            _marker: PhantomData,
        })
    }

    pub fn update(&self, value: &T) -> Result<()> {
        self.buffer.write(std::slice::from_ref(value))
    }

    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer.buffer,
            offset: 0,
            range: self.buffer.size,
        }
    }
}

/// Record with `record`, submit on the graphics queue and block until done
fn submit_one_time(device: &VulkanDevice, record: impl FnOnce(vk::CommandBuffer)) -> Result<()> {
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(device.command_pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);

    let cmd = unsafe { device.device.allocate_command_buffers(&alloc_info)? }[0];

    let result = unsafe {
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        device.device.begin_command_buffer(cmd, &begin_info)
            .and_then(|_| {
                record(cmd);
                device.device.end_command_buffer(cmd)
            })
            .and_then(|_| {
                let command_buffers = [cmd];
                let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
                device.device.queue_submit(device.graphics_queue, &[submit_info.build()], vk::Fence::null())
            })
            .and_then(|_| device.device.queue_wait_idle(device.graphics_queue))
    };

    unsafe {
        device.device.free_command_buffers(device.command_pool, &[cmd]);
    }

    result.context("Failed to submit one-time command buffer")
}

/// First memory type allowed by `type_filter` that has all of `properties`
pub fn find_memory_type(
    mem_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Result<u32> {
    for i in 0..mem_properties.memory_type_count {
        let has_type = (type_filter & (1 << i)) != 0;
        let has_properties = mem_properties.memory_types[i as usize]
            .property_flags
            .contains(properties);

        if has_type && has_properties {
            return Ok(i);
        }
    }

    anyhow::bail!("Failed to find suitable memory type for {:?}", properties)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, &flags) in props.memory_types.iter_mut().zip(types) {
            slot.property_flags = flags;
        }
        props
    }

    #[test]
    fn picks_first_type_with_all_flags() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            HOST_MAPPABLE,
            HOST_MAPPABLE | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);

        assert_eq!(find_memory_type(&props, u32::MAX, HOST_MAPPABLE).unwrap(), 2);
        assert_eq!(
            find_memory_type(&props, u32::MAX, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
    }

    #[test]
    fn respects_type_filter_bits() {
        let props = memory_properties(&[HOST_MAPPABLE, HOST_MAPPABLE, HOST_MAPPABLE]);
        assert_eq!(find_memory_type(&props, 0b100, HOST_MAPPABLE).unwrap(), 2);
        assert_eq!(find_memory_type(&props, 0b110, HOST_MAPPABLE).unwrap(), 1);
    }

    #[test]
    fn ignores_types_beyond_reported_count() {
        let mut props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        props.memory_types[1].property_flags = HOST_MAPPABLE;
        assert!(find_memory_type(&props, u32::MAX, HOST_MAPPABLE).is_err());
    }

    #[test]
    fn no_match_is_an_error() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        assert!(find_memory_type(&props, 0, vk::MemoryPropertyFlags::DEVICE_LOCAL).is_err());
    }
}
