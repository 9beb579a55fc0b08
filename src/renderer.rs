// =============================================================================
// RENDERER - owns every GPU resource and runs the per-frame sequence
// =============================================================================
//
// FRAME TIMELINE (per slot):
// ┌──────────────────────────────────────────────────────────────────────┐
// │  wait_fence ─> acquire_image ─> reset_fence ─> record ─> submit      │
// │      ─> present ─> next slot                                         │
// │                                                                      │
// │  acquire/present out of date -> rebuild swapchain + framebuffers     │
// └──────────────────────────────────────────────────────────────────────┘

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;
use std::time::Instant;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::backend::buffer::{Buffer, StagedBuffer};
use crate::backend::descriptor::DescriptorPool;
use crate::backend::pipeline::Pipeline;
use crate::backend::swapchain::{self, Acquired, Presented};
use crate::backend::{shader, Swapchain, VulkanDevice};
use crate::config::Config;
use crate::frame::{Frame, FrameCursor, FRAMES_IN_FLIGHT};
use crate::mesh::QUAD;
use crate::ubo::UniformBufferObject;

/// All Vulkan state for drawing the quad.
///
/// IMPORTANT: Field order matters for Drop! Fields drop top to bottom, so
/// children come before the pipeline, the device, and finally the window.
pub struct Renderer {
    frames: Vec<Frame>,
    _descriptor_pool: DescriptorPool,
    index_buffer: Buffer,
    vertex_buffer: Buffer,
    swapchain: Swapchain,
    pipeline: Pipeline,
    device: Arc<VulkanDevice>,
    window: Arc<Window>,

    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    clear_color: [f32; 4],
    index_count: u32,
    wait_stages: [vk::PipelineStageFlags; 1],

    cursor: FrameCursor,
    /// Set by the resize callback; forces a rebuild after the next present
    framebuffer_resized: bool,
    start: Instant,
}

impl Renderer {
    /// Initialize all Vulkan resources for `window`.
    ///
    /// 1. Device (instance, surface, GPU, queue, command pool)
    /// 2. Pipeline (render pass, layouts, shaders)
    /// 3. Swapchain (images, views, framebuffers)
    /// 4. Vertex/index buffers, uploaded to device-local memory
    /// 5. Frame slots (command buffer, sync objects, uniform buffer, descriptor set)
    pub fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        log::info!("Initializing Vulkan...");

        let device = VulkanDevice::new(&config.window.title, &window, config.validation_enabled())?;

        let details = device.surface.details(device.physical_device)?;
        let surface_format = swapchain::choose_surface_format(&details.formats)?;
        log::info!("Surface format: {:?} / {:?}", surface_format.format, surface_format.color_space);

        let pipeline = Self::create_pipeline(&device, config, surface_format.format)?;

        let size = window.inner_size();
        let present_mode = config.present_mode();
        let swapchain = Swapchain::new(
            device.clone(),
            surface_format,
            present_mode,
            pipeline.render_pass,
            (size.width, size.height),
            vk::SwapchainKHR::null(),
        )?;

        let vertex_buffer = StagedBuffer::new(device.clone(), QUAD.vertices, vk::BufferUsageFlags::VERTEX_BUFFER)?
            .upload()
            .context("Failed to upload vertex buffer")?;
        let index_buffer = StagedBuffer::new(device.clone(), QUAD.indices, vk::BufferUsageFlags::INDEX_BUFFER)?
            .upload()
            .context("Failed to upload index buffer")?;

        let descriptor_pool = DescriptorPool::new(device.clone(), FRAMES_IN_FLIGHT as u32)?;
        let frames = Frame::create_all(&device, &descriptor_pool, pipeline.descriptor_set_layout)?;

        log::info!("Vulkan initialized successfully!");

        Ok(Self {
            frames,
            _descriptor_pool: descriptor_pool,
            index_buffer,
            vertex_buffer,
            swapchain,
            pipeline,
            device,
            window,
            surface_format,
            present_mode,
            clear_color: config.graphics.clear_color,
            index_count: QUAD.indices.len() as u32,
            wait_stages: [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
            cursor: FrameCursor::default(),
            framebuffer_resized: false,
            start: Instant::now(),
        })
    }

    fn create_pipeline(device: &Arc<VulkanDevice>, config: &Config, format: vk::Format) -> Result<Pipeline> {
        let vert = shader::load_shader_module(device, &config.shaders.vertex)?;
        let frag = match shader::load_shader_module(device, &config.shaders.fragment) {
            Ok(frag) => frag,
            Err(e) => {
                unsafe { device.device.destroy_shader_module(vert, None) };
                return Err(e);
            }
        };

        let pipeline = Pipeline::new(device.clone(), format, vert, frag);

        // Modules are only needed while the pipeline is built
        unsafe {
            device.device.destroy_shader_module(vert, None);
            device.device.destroy_shader_module(frag, None);
        }

        pipeline
    }

    /// Note that the window's framebuffer changed size
    pub fn resized(&mut self) {
        self.framebuffer_resized = true;
    }

    pub fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }

    // =========================================================================
    // RENDER LOOP
    // =========================================================================

    /// Render a single frame.
    ///
    /// Returns `Ok(false)` when nothing was presented (minimized window or a
    /// swapchain rebuild). Any error other than an out-of-date surface is fatal.
    pub fn draw_frame(&mut self) -> Result<bool> {
        if !is_drawable(self.window.inner_size()) {
            return Ok(false);
        }

        let frame = &self.frames[self.cursor.current()];

        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Wait until the GPU retired this slot's previous submission
        // ─────────────────────────────────────────────────────────────────────
        frame.sync.wait()?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Acquire next swapchain image
        // ─────────────────────────────────────────────────────────────────────
        let acquired = self.swapchain.acquire_next_image(u64::MAX, frame.sync.image_available)?;
        let Some(image_index) = image_to_draw(acquired) else {
            log::debug!("Swapchain out of date on acquire");
            self.recreate_swapchain()?;
            return Ok(false);
        };

        // Only reset once work is guaranteed to be submitted, otherwise the
        // early return above would leave the fence unsignaled forever
        frame.sync.reset()?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Update uniforms and re-record
        // ─────────────────────────────────────────────────────────────────────
        let ubo = UniformBufferObject::at(self.start.elapsed().as_secs_f32(), self.swapchain.extent);
        frame.uniform_buffer.update(&ubo)?;
        self.record_command_buffer(frame, image_index)?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 4: Submit
        // ─────────────────────────────────────────────────────────────────────
        let wait_semaphores = [frame.sync.image_available];
        let signal_semaphores = [frame.sync.render_finished];
        let command_buffers = [frame.command_buffer];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)      // Wait for image to be available
            .wait_dst_stage_mask(&self.wait_stages) // before writing color
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores); // Signal when done

        unsafe {
            self.device.device.queue_submit(
                self.device.graphics_queue,
                &[submit_info.build()],
                frame.sync.in_flight_fence,
            )
        }
        .context("Failed to submit draw command buffer")?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 5: Present
        // ─────────────────────────────────────────────────────────────────────
        let presented = self.swapchain.present(
            self.device.graphics_queue,
            image_index,
            &signal_semaphores,
        )?;

        if needs_rebuild(presented, self.framebuffer_resized) {
            self.framebuffer_resized = false;
            self.recreate_swapchain()?;
        }

        // ─────────────────────────────────────────────────────────────────────
        // STEP 6: Advance to the other slot
        // ─────────────────────────────────────────────────────────────────────
        self.cursor.advance();

        Ok(true)
    }

    fn record_command_buffer(&self, frame: &Frame, image_index: u32) -> Result<()> {
        let device = &self.device.device;
        let cmd = frame.command_buffer;
        let extent = self.swapchain.extent;
        let framebuffer = *self.swapchain.framebuffers
            .get(image_index as usize)
            .context("Acquired image has no framebuffer")?;

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue { float32: self.clear_color },
        }];

        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        unsafe {
            device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;

            let begin_info = vk::CommandBufferBeginInfo::builder();
            device.begin_command_buffer(cmd, &begin_info)?;

            let render_pass_info = vk::RenderPassBeginInfo::builder()
                .render_pass(self.pipeline.render_pass)
                .framebuffer(framebuffer)
                .render_area(render_area)
                .clear_values(&clear_values);

            device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle);
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[render_area]);
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.buffer], &[0]);
            device.cmd_bind_index_buffer(cmd, self.index_buffer.buffer, 0, vk::IndexType::UINT16);
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.layout,
                0,
                &[frame.descriptor_set],
                &[],
            );
            device.cmd_draw_indexed(cmd, self.index_count, 1, 0, 0, 0);
            device.cmd_end_render_pass(cmd);

            device.end_command_buffer(cmd)?;
        }

        Ok(())
    }

    /// Rebuild the swapchain and its framebuffers for the current window size.
    ///
    /// Skipped while the window is minimized; the resize that restores it
    /// will trigger another rebuild.
    fn recreate_swapchain(&mut self) -> Result<()> {
        let size = self.window.inner_size();
        if !is_drawable(size) {
            self.framebuffer_resized = true;
            return Ok(());
        }

        // Nothing may still reference the old images
        self.device.wait_idle()?;

        let swapchain = Swapchain::new(
            self.device.clone(),
            self.surface_format,
            self.present_mode,
            self.pipeline.render_pass,
            (size.width, size.height),
            self.swapchain.swapchain,
        )?;

        // The retired swapchain is destroyed here, after its successor exists
        self.swapchain = swapchain;

        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");

        // Wait for GPU to finish before destroying anything; the fields
        // then free themselves in declaration order
        if let Err(e) = self.device.wait_idle() {
            log::warn!("wait_idle failed during cleanup: {:#}", e);
        }
    }
}

/// A window with no area (minimized) has nothing to draw into
pub fn is_drawable(size: PhysicalSize<u32>) -> bool {
    size.width > 0 && size.height > 0
}

/// Image to render into, or `None` when the swapchain must be rebuilt first.
///
/// `None` means no work is submitted this tick, so the slot's fence must be
/// left signaled.
fn image_to_draw(acquired: Acquired) -> Option<u32> {
    match acquired {
        Acquired::Image { index, suboptimal } => {
            if suboptimal {
                log::debug!("Acquired suboptimal swapchain image {}", index);
            }
            Some(index)
        }
        Acquired::OutOfDate => None,
    }
}

/// Rebuild after presenting when the surface asked for it or the window resized
fn needs_rebuild(presented: Presented, resized: bool) -> bool {
    presented == Presented::NeedsRebuild || resized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimized_window_is_not_drawable() {
        assert!(!is_drawable(PhysicalSize::new(0, 0)));
        assert!(!is_drawable(PhysicalSize::new(1280, 0)));
        assert!(!is_drawable(PhysicalSize::new(0, 720)));
        assert!(is_drawable(PhysicalSize::new(1, 1)));
        assert!(is_drawable(PhysicalSize::new(1280, 720)));
    }

    #[test]
    fn out_of_date_acquire_skips_the_frame() {
        assert_eq!(image_to_draw(Acquired::OutOfDate), None);
    }

    #[test]
    fn suboptimal_acquire_still_draws() {
        assert_eq!(image_to_draw(Acquired::Image { index: 1, suboptimal: false }), Some(1));
        assert_eq!(image_to_draw(Acquired::Image { index: 2, suboptimal: true }), Some(2));
    }

    #[test]
    fn rebuild_after_present_when_requested_or_resized() {
        assert!(!needs_rebuild(Presented::Done, false));
        assert!(needs_rebuild(Presented::Done, true));
        assert!(needs_rebuild(Presented::NeedsRebuild, false));
        assert!(needs_rebuild(Presented::NeedsRebuild, true));
    }
}
