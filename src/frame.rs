// Frames in flight
//
// Each slot moves through: available for recording -> submitted (fence
// pending) -> fence signaled (reusable). The CPU may record one slot while
// the GPU still works on the other.

use anyhow::Result;
use ash::vk;
use std::sync::Arc;

use crate::backend::buffer::UniformBuffer;
use crate::backend::descriptor::DescriptorPool;
use crate::backend::sync::FrameSync;
use crate::backend::VulkanDevice;
use crate::ubo::UniformBufferObject;

/// Number of frame slots; the loop alternates between them
pub const FRAMES_IN_FLIGHT: usize = 2;

/// Per-slot resources
pub struct Frame {
    pub command_buffer: vk::CommandBuffer,
    pub sync: FrameSync,
    pub descriptor_set: vk::DescriptorSet,
    pub uniform_buffer: UniformBuffer<UniformBufferObject>,
}

impl Frame {
    /// Create all slots, one command buffer and one descriptor set each
    pub fn create_all(
        device: &Arc<VulkanDevice>,
        descriptor_pool: &DescriptorPool,
        set_layout: vk::DescriptorSetLayout,
    ) -> Result<Vec<Frame>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(device.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(FRAMES_IN_FLIGHT as u32);
        let command_buffers = unsafe { device.device.allocate_command_buffers(&alloc_info)? };

        let descriptor_sets = descriptor_pool.allocate(set_layout, FRAMES_IN_FLIGHT)?;

        let mut frames = Vec::with_capacity(FRAMES_IN_FLIGHT);
        for (command_buffer, descriptor_set) in command_buffers.into_iter().zip(descriptor_sets) {
            let uniform_buffer = UniformBuffer::new(device.clone())?;
            descriptor_pool.write_uniform_buffer(descriptor_set, uniform_buffer.descriptor_info());

            frames.push(Frame {
                command_buffer,
                sync: FrameSync::new(device.clone())?,
                descriptor_set,
                uniform_buffer,
            });
        }

        Ok(frames)
    }
}

/// Which slot the next frame records into
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    current: usize,
}

impl FrameCursor {
    pub fn current(&self) -> usize {
        self.current
    }

    /// Move to the other slot
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % FRAMES_IN_FLIGHT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_starts_at_slot_zero() {
        assert_eq!(FrameCursor::default().current(), 0);
    }

    #[test]
    fn cursor_alternates_between_two_slots() {
        let mut cursor = FrameCursor::default();
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(cursor.current());
            cursor.advance();
        }
        assert_eq!(seen, vec![0, 1, 0, 1, 0, 1]);
    }
}
