// Synchronization primitives
//
// Each frame slot owns two semaphores (GPU-GPU ordering of acquire -> render
// -> present) and one fence (CPU waits before reusing the slot).

use ash::vk;
use anyhow::Result;
use std::sync::Arc;
use super::VulkanDevice;

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
    device: Arc<VulkanDevice>,
}

impl FrameSync {
    pub fn new(device: Arc<VulkanDevice>) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        // Start signaled so the first wait on a fresh slot returns immediately
        let fence_info = vk::FenceCreateInfo::builder()
            .flags(vk::FenceCreateFlags::SIGNALED);

        // Filled in one handle at a time so a failure part way through still
        // frees what was already created (destroying a null handle is a no-op)
        let mut sync = Self {
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight_fence: vk::Fence::null(),
            device,
        };

        unsafe {
            sync.image_available = sync.device.device.create_semaphore(&semaphore_info, None)?;
            sync.render_finished = sync.device.device.create_semaphore(&semaphore_info, None)?;
            sync.in_flight_fence = sync.device.device.create_fence(&fence_info, None)?;
        }

        Ok(sync)
    }

    /// Block until the slot's last submission has retired
    pub fn wait(&self) -> Result<()> {
        unsafe {
            self.device.device.wait_for_fences(&[self.in_flight_fence], true, u64::MAX)?;
        }
        Ok(())
    }

    pub fn reset(&self) -> Result<()> {
        unsafe {
            self.device.device.reset_fences(&[self.in_flight_fence])?;
        }
        Ok(())
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_semaphore(self.image_available, None);
            self.device.device.destroy_semaphore(self.render_finished, None);
            self.device.device.destroy_fence(self.in_flight_fence, None);
        }
    }
}
