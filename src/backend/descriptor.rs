// Descriptor pool and per-frame uniform buffer descriptor sets

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;
use super::VulkanDevice;

pub struct DescriptorPool {
    pub pool: vk::DescriptorPool,
    device: Arc<VulkanDevice>,
}

impl DescriptorPool {
    /// Pool with room for `max_sets` sets of one uniform buffer each
    pub fn new(device: Arc<VulkanDevice>, max_sets: u32) -> Result<Self> {
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: max_sets,
        }];

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(max_sets);

        let pool = unsafe {
            device.device.create_descriptor_pool(&pool_info, None)
                .context("Failed to create descriptor pool")?
        };

        Ok(Self { pool, device })
    }

    /// Allocate `count` sets of `layout`. They are freed with the pool.
    pub fn allocate(&self, layout: vk::DescriptorSetLayout, count: usize) -> Result<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout; count];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        unsafe {
            self.device.device.allocate_descriptor_sets(&alloc_info)
                .context("Failed to allocate descriptor sets")
        }
    }

    /// Point binding 0 of `set` at a uniform buffer
    pub fn write_uniform_buffer(&self, set: vk::DescriptorSet, buffer_info: vk::DescriptorBufferInfo) {
        let buffer_infos = [buffer_info];
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(0)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_infos)
            .build();

        unsafe {
            self.device.device.update_descriptor_sets(&[write], &[]);
        }
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}
