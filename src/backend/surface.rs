// Window surface - the connection between Vulkan and the native window
//
// ash-window knows which platform extension each windowing system needs
// and how to create the matching VkSurfaceKHR.

use anyhow::{Context, Result};
use ash::{vk, Entry};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::c_char;
use winit::window::Window;

/// Everything a physical device reports about presenting to the surface
pub struct SurfaceDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

pub struct Surface {
    pub loader: ash::extensions::khr::Surface,
    pub handle: vk::SurfaceKHR,
}

impl Surface {
    /// Instance extensions the window system requires to create a surface
    pub fn required_extensions(window: &Window) -> Result<&'static [*const c_char]> {
        ash_window::enumerate_required_extensions(window.raw_display_handle())
            .context("Window system has no Vulkan surface support")
    }

    pub fn new(entry: &Entry, instance: &ash::Instance, window: &Window) -> Result<Self> {
        let loader = ash::extensions::khr::Surface::new(entry, instance);

        // Safety: the window outlives the surface (the renderer holds it)
        let handle = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )
        }
        .context("Failed to create window surface")?;

        Ok(Self { loader, handle })
    }

    pub fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<bool> {
        let supported = unsafe {
            self.loader.get_physical_device_surface_support(
                physical_device,
                queue_family,
                self.handle,
            )
        }?;
        Ok(supported)
    }

    pub fn capabilities(&self, physical_device: vk::PhysicalDevice) -> Result<vk::SurfaceCapabilitiesKHR> {
        let caps = unsafe {
            self.loader
                .get_physical_device_surface_capabilities(physical_device, self.handle)
        }?;
        Ok(caps)
    }

    pub fn details(&self, physical_device: vk::PhysicalDevice) -> Result<SurfaceDetails> {
        let formats = unsafe {
            self.loader
                .get_physical_device_surface_formats(physical_device, self.handle)
        }?;
        let present_modes = unsafe {
            self.loader
                .get_physical_device_surface_present_modes(physical_device, self.handle)
        }?;

        Ok(SurfaceDetails {
            capabilities: self.capabilities(physical_device)?,
            formats,
            present_modes,
        })
    }

    /// Must run before the owning instance is destroyed
    pub fn destroy(&self) {
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
    }
}
