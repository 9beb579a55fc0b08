// Swapchain - Window presentation
//
// Owns the presentable images, their views and one framebuffer per image.
// Recreated wholesale when the window is resized or the surface goes out of date.

use anyhow::{Context, Result};
use ash::prelude::VkResult;
use ash::vk;
use std::sync::Arc;
use super::VulkanDevice;

/// Outcome of acquiring a presentable image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    /// Ready to render. A suboptimal image is still presentable this frame.
    Image { index: u32, suboptimal: bool },
    /// The surface changed; rebuild before rendering again
    OutOfDate,
}

/// Outcome of queueing an image for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presented {
    Done,
    /// Out of date or suboptimal; rebuild before the next frame
    NeedsRebuild,
}

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_loader: ash::extensions::khr::Swapchain,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub framebuffers: Vec<vk::Framebuffer>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    device: Arc<VulkanDevice>,
}

impl Swapchain {
    /// Create a swapchain sized to `framebuffer_size`.
    ///
    /// Pass the previous swapchain as `old_swapchain` when recreating so the
    /// driver can hand over resources; it must be destroyed afterwards.
    pub fn new(
        device: Arc<VulkanDevice>,
        surface_format: vk::SurfaceFormatKHR,
        preferred_present_mode: vk::PresentModeKHR,
        render_pass: vk::RenderPass,
        framebuffer_size: (u32, u32),
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self> {
        let surface = &device.surface;
        let details = surface.details(device.physical_device)?;
        let surface_caps = details.capabilities;

        let present_mode = choose_present_mode(&details.present_modes, preferred_present_mode);
        let extent = choose_extent(&surface_caps, framebuffer_size);
        let image_count = choose_image_count(&surface_caps);

        log::info!(
            "Creating swapchain: {}x{}, {} images, {:?}",
            extent.width, extent.height, image_count, present_mode
        );

        let swapchain_loader = ash::extensions::khr::Swapchain::new(&device.instance, &device.device);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe {
            swapchain_loader.create_swapchain(&create_info, None)
        }
        .context("Failed to create swapchain")?;

        // From here on, Drop cleans up whatever was created
        let mut this = Self {
            swapchain,
            swapchain_loader,
            images: Vec::new(),
            image_views: Vec::new(),
            framebuffers: Vec::new(),
            format: surface_format.format,
            extent,
            device,
        };

        this.images = unsafe {
            this.swapchain_loader.get_swapchain_images(swapchain)
        }?;

        for &image in &this.images {
            let view = create_image_view(&this.device, image, this.format)?;
            this.image_views.push(view);
        }

        this.framebuffers = super::pipeline::create_framebuffers(
            &this.device,
            &this.image_views,
            render_pass,
            extent,
        )?;

        log::info!("Created swapchain with {} images", this.images.len());

        Ok(this)
    }

    /// Acquire next image for rendering, signalling `semaphore` when it is ready
    pub fn acquire_next_image(&self, timeout: u64, semaphore: vk::Semaphore) -> Result<Acquired> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout,
                semaphore,
                vk::Fence::null(),
            )
        };
        classify_acquire(result)
    }

    /// Present rendered image to screen
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<Presented> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.swapchain_loader.queue_present(queue, &present_info)
        };
        classify_present(result)
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.device.destroy_framebuffer(framebuffer, None);
            }
            for &view in &self.image_views {
                self.device.device.destroy_image_view(view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

fn create_image_view(device: &VulkanDevice, image: vk::Image, format: vk::Format) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe {
        device.device.create_image_view(&create_info, None)
            .context("Failed to create image view")
    }
}

/// Prefer 8-bit BGRA sRGB, otherwise take whatever the surface lists first
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
        .context("No suitable surface format")
}

/// The preferred mode if the surface offers it. FIFO is always supported.
pub fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if available.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// `current_extent` unless the surface leaves it to us (u32::MAX sentinel)
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, framebuffer_size: (u32, u32)) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    let (width, height) = framebuffer_size;
    vk::Extent2D {
        width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One more than the minimum, capped when the surface has a maximum (0 = none)
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = caps.min_image_count + 1;
    if caps.max_image_count > 0 && image_count > caps.max_image_count {
        caps.max_image_count
    } else {
        image_count
    }
}

pub fn classify_acquire(result: VkResult<(u32, bool)>) -> Result<Acquired> {
    match result {
        Ok((index, suboptimal)) => Ok(Acquired::Image { index, suboptimal }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquired::OutOfDate),
        Err(e) => Err(anyhow::Error::new(e).context("Failed to acquire swapchain image")),
    }
}

pub fn classify_present(result: VkResult<bool>) -> Result<Presented> {
    match result {
        Ok(false) => Ok(Presented::Done),
        Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Presented::NeedsRebuild),
        Err(e) => Err(anyhow::Error::new(e).context("Failed to present swapchain image")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            current_extent: vk::Extent2D { width: current.0, height: current.1 },
            min_image_extent: vk::Extent2D { width: min.0, height: min.1 },
            max_image_extent: vk::Extent2D { width: max.0, height: max.1 },
            ..Default::default()
        }
    }

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    #[test]
    fn srgb_bgra_is_preferred() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn first_format_when_srgb_missing() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::R8G8B8A8_UNORM);
        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&available, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&available, vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn extent_follows_surface_when_fixed() {
        let caps = caps((800, 600), (1, 1), (4096, 4096));
        let extent = choose_extent(&caps, (1920, 1080));
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn extent_clamps_framebuffer_size_when_free() {
        let caps = caps((u32::MAX, u32::MAX), (100, 100), (1000, 1000));
        let extent = choose_extent(&caps, (1920, 50));
        assert_eq!((extent.width, extent.height), (1000, 100));
    }

    #[test]
    fn image_count_is_min_plus_one_within_max() {
        let mut caps = caps((1, 1), (1, 1), (1, 1));
        assert_eq!(choose_image_count(&caps), 3);

        caps.max_image_count = 2;
        assert_eq!(choose_image_count(&caps), 2);

        caps.max_image_count = 8;
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn acquire_out_of_date_is_recoverable() {
        assert_eq!(
            classify_acquire(Ok((2, false))).unwrap(),
            Acquired::Image { index: 2, suboptimal: false }
        );
        assert_eq!(
            classify_acquire(Ok((0, true))).unwrap(),
            Acquired::Image { index: 0, suboptimal: true }
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            Acquired::OutOfDate
        );
        assert!(classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)).is_err());
    }

    #[test]
    fn present_suboptimal_or_out_of_date_requests_rebuild() {
        assert_eq!(classify_present(Ok(false)).unwrap(), Presented::Done);
        assert_eq!(classify_present(Ok(true)).unwrap(), Presented::NeedsRebuild);
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            Presented::NeedsRebuild
        );
        assert!(classify_present(Err(vk::Result::ERROR_SURFACE_LOST_KHR)).is_err());
    }
}
