// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Instance creation with validation layers
// - Window surface creation
// - Physical device selection (must present to the surface, prefer discrete GPU)
// - Logical device + queue creation
// - Command pool for per-frame and one-shot command buffers

use anyhow::{Context, Result};
use ash::{vk, Entry};
use std::ffi::{c_char, CStr, CString};
use std::sync::Arc;
use winit::window::Window;

use super::surface::Surface;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan device wrapper with automatic cleanup
pub struct VulkanDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub surface: Surface,
    pub instance: ash::Instance,
    _entry: Entry,

    /// Graphics queue; the same family also presents
    pub graphics_queue: vk::Queue,

    /// RESET_COMMAND_BUFFER pool on the graphics family
    pub command_pool: vk::CommandPool,

    // Debug utils (if validation enabled)
    debug_utils: Option<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,

    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl VulkanDevice {
    /// Create Vulkan device
    ///
    /// # Arguments
    /// * `app_name` - Application name for debugging
    /// * `window` - Window the device must be able to present to
    /// * `enable_validation` - Enable Vulkan validation layers (debug only)
    pub fn new(app_name: &str, window: &Window, enable_validation: bool) -> Result<Arc<Self>> {
        log::info!("Creating Vulkan device: {}", app_name);

        // Step 1: Load Vulkan library
        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;

        // Step 2: Create instance with the window system's extensions
        let instance = Self::create_instance(&entry, app_name, window, enable_validation)?;

        // Step 3: Setup debug messenger if validation enabled
        let debug_utils = if enable_validation {
            Some(Self::setup_debug_messenger(&entry, &instance)?)
        } else {
            None
        };

        // Step 4: Surface (needed to judge which GPUs can present)
        let surface = Surface::new(&entry, &instance, window)?;

        // Step 5: Pick physical device (GPU)
        let (physical_device, graphics_queue_family) =
            Self::pick_physical_device(&instance, &surface)?;

        // Step 6: Create logical device
        let (device, graphics_queue) =
            Self::create_logical_device(&instance, physical_device, graphics_queue_family)?;

        // Step 7: Command pool
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(graphics_queue_family)
            // RESET: per-frame buffers are re-recorded every tick
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe { device.create_command_pool(&pool_info, None) }
            .context("Failed to create command pool")?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        log::info!("Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
                .to_string_lossy());
        log::info!("Graphics/present queue family: {}", graphics_queue_family);
        log::info!("API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version));

        Ok(Arc::new(Self {
            device,
            physical_device,
            surface,
            instance,
            _entry: entry,
            graphics_queue,
            command_pool,
            debug_utils,
            memory_properties,
        }))
    }

    fn create_instance(
        entry: &Entry,
        app_name: &str,
        window: &Window,
        enable_validation: bool,
    ) -> Result<ash::Instance> {
        let app_name_cstr = CString::new(app_name)?;
        let engine_name = CString::new("No Engine")?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_1);

        let mut extensions: Vec<*const c_char> = Surface::required_extensions(window)?.to_vec();
        if enable_validation {
            extensions.push(ash::extensions::ext::DebugUtils::name().as_ptr());
        }

        let layer_names = if enable_validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .context("Failed to create Vulkan instance")?;

        Ok(instance)
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::extensions::ext::DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe {
            debug_utils.create_debug_utils_messenger(&create_info, None)
        }?;

        Ok((debug_utils, messenger))
    }

    fn pick_physical_device(
        instance: &ash::Instance,
        surface: &Surface,
    ) -> Result<(vk::PhysicalDevice, u32)> {
        let devices = unsafe { instance.enumerate_physical_devices() }?;

        if devices.is_empty() {
            anyhow::bail!("No Vulkan-capable GPU found");
        }

        let mut best_device = None;
        let mut best_score = 0;

        for device in devices {
            let Some(queue_family) = Self::check_device(instance, surface, device)? else {
                continue;
            };

            let props = unsafe { instance.get_physical_device_properties(device) };
            let score = device_type_score(props.device_type);

            if score > best_score {
                best_score = score;
                best_device = Some((device, queue_family));
            }
        }

        best_device.ok_or_else(|| anyhow::anyhow!("No suitable GPU found"))
    }

    /// Returns the graphics+present queue family if the device can drive the surface
    fn check_device(
        instance: &ash::Instance,
        surface: &Surface,
        device: vk::PhysicalDevice,
    ) -> Result<Option<u32>> {
        let available = unsafe { instance.enumerate_device_extension_properties(device) }?;
        if !supports_extension(&available, ash::extensions::khr::Swapchain::name()) {
            return Ok(None);
        }

        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut present_error = None;
        let queue_family = find_graphics_queue_family(&queue_families, |index| {
            surface.supports_present(device, index).unwrap_or_else(|e| {
                present_error = Some(e);
                false
            })
        });
        if let Some(e) = present_error {
            return Err(e);
        }
        let Some(queue_family) = queue_family else {
            return Ok(None);
        };

        let details = surface.details(device)?;
        if details.formats.is_empty() || details.present_modes.is_empty() {
            return Ok(None);
        }

        Ok(Some(queue_family))
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        graphics_queue_family: u32,
    ) -> Result<(ash::Device, vk::Queue)> {
        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(graphics_queue_family)
            .queue_priorities(&queue_priorities)
            .build();

        let extensions = [ash::extensions::khr::Swapchain::name().as_ptr()];

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extensions);

        let device = unsafe {
            instance.create_device(physical_device, &create_info, None)
        }
        .context("Failed to create logical device")?;

        let graphics_queue = unsafe {
            device.get_device_queue(graphics_queue_family, 0)
        };

        Ok((device, graphics_queue))
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        let _ = self.wait_idle();

        // Cleanup in reverse order
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);

            self.surface.destroy();

            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// Discrete GPUs first, then integrated, then anything else
pub fn device_type_score(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        _ => 1,
    }
}

/// First family with GRAPHICS that can also present
pub fn find_graphics_queue_family(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> bool,
) -> Option<u32> {
    families
        .iter()
        .enumerate()
        .filter(|(_, props)| props.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|(i, _)| i as u32)
        .find(|&i| supports_present(i))
}

pub fn supports_extension(available: &[vk::ExtensionProperties], name: &CStr) -> bool {
    available.iter().any(|ext| {
        // Safety: the driver fills extension_name with a NUL-terminated string
        let ext_name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
        ext_name == name
    })
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn extension(name: &CStr) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        for (dst, &src) in props.extension_name.iter_mut().zip(name.to_bytes()) {
            *dst = src as c_char;
        }
        props
    }

    #[test]
    fn discrete_beats_integrated_beats_others() {
        let discrete = device_type_score(vk::PhysicalDeviceType::DISCRETE_GPU);
        let integrated = device_type_score(vk::PhysicalDeviceType::INTEGRATED_GPU);
        let cpu = device_type_score(vk::PhysicalDeviceType::CPU);
        assert!(discrete > integrated);
        assert!(integrated > cpu);
        assert!(cpu > 0);
    }

    #[test]
    fn queue_family_must_support_graphics_and_present() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];

        assert_eq!(find_graphics_queue_family(&families, |_| true), Some(1));
        assert_eq!(find_graphics_queue_family(&families, |i| i == 2), Some(2));
        assert_eq!(find_graphics_queue_family(&families, |i| i == 0), None);
    }

    #[test]
    fn present_is_only_queried_for_graphics_families() {
        let families = [family(vk::QueueFlags::COMPUTE), family(vk::QueueFlags::GRAPHICS)];
        let mut queried = Vec::new();
        find_graphics_queue_family(&families, |i| {
            queried.push(i);
            true
        });
        assert_eq!(queried, vec![1]);
    }

    #[test]
    fn swapchain_extension_lookup() {
        let swapchain = ash::extensions::khr::Swapchain::name();
        let available = [extension(c"VK_KHR_maintenance1"), extension(swapchain)];
        assert!(supports_extension(&available, swapchain));
        assert!(!supports_extension(&available[..1], swapchain));
    }
}
