//! Per-frame synchronization and command recording
//!
//! One frame slot: an image-available semaphore, a render-finished semaphore,
//! an in-flight fence and one reusable command buffer. The fence is created
//! signaled so the first wait returns immediately. Waiting on it before
//! recording keeps at most one frame in flight.

use ash::vk;

use crate::error::{RenderError, RenderResult, VkResultExt};
use crate::window::PresentationWindow;

/// Opaque black
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Vertices drawn per frame, generated by the vertex shader
pub const TRIANGLE_VERTEX_COUNT: u32 = 3;

/// The GPU operations of one frame, in the order the scheduler issues them
pub trait FrameBackend {
    /// Block until the previous submission has completed
    fn wait_for_fence(&mut self) -> RenderResult<()>;

    /// Return the in-flight fence to unsignaled
    fn reset_fence(&mut self) -> RenderResult<()>;

    /// Get the next presentable image, signaling image-available when ready
    fn acquire_next_image(&mut self) -> RenderResult<u32>;

    /// Re-record the command buffer against `image_index`
    fn record(&mut self, image_index: u32) -> RenderResult<()>;

    /// Submit the command buffer to the graphics queue
    fn submit(&mut self) -> RenderResult<()>;

    /// Queue `image_index` for presentation
    fn present(&mut self, image_index: u32) -> RenderResult<()>;

    /// Block until the device has no work left
    fn wait_idle(&mut self) -> RenderResult<()>;
}

/// Drives the acquire, record, submit, present cycle
#[derive(Debug, Default)]
pub struct FrameScheduler {
    frames_drawn: u64,
}

impl FrameScheduler {
    /// Create a scheduler that has not drawn anything yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames presented so far
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Draw and present one frame. Any failure is returned unchanged.
    pub fn draw_frame<B: FrameBackend>(&mut self, backend: &mut B) -> RenderResult<()> {
        backend.wait_for_fence()?;
        backend.reset_fence()?;

        let image_index = backend.acquire_next_image()?;
        log::debug!("Frame {}: acquired image {image_index}", self.frames_drawn);

        backend.record(image_index)?;
        backend.submit()?;
        backend.present(image_index)?;

        self.frames_drawn += 1;
        Ok(())
    }

    /// Draw frames until the window asks to close, then wait for the device
    /// to go idle.
    ///
    /// The idle wait also runs when a frame fails, so teardown never races
    /// work that was already submitted.
    pub fn run<W, B>(&mut self, window: &mut W, backend: &mut B) -> RenderResult<()>
    where
        W: PresentationWindow,
        B: FrameBackend,
    {
        let result = self.run_until_closed(window, backend);
        let idle = backend.wait_idle();

        log::info!("Frame loop finished after {} frames", self.frames_drawn);
        result.and(idle)
    }

    fn run_until_closed<W, B>(&mut self, window: &mut W, backend: &mut B) -> RenderResult<()>
    where
        W: PresentationWindow,
        B: FrameBackend,
    {
        while !window.should_close() {
            window.poll_events();
            self.draw_frame(backend)?;
        }
        Ok(())
    }
}

/// Native synchronization objects of the single frame slot
#[derive(Debug, Clone, Copy)]
pub struct FrameSync {
    /// Signaled by the presentation engine when the acquired image is ready
    pub image_available: vk::Semaphore,
    /// Signaled by the graphics queue when rendering has finished
    pub render_finished: vk::Semaphore,
    /// Signaled when the submitted command buffer has completed
    pub in_flight: vk::Fence,
}

impl FrameSync {
    /// Create both semaphores and the fence, the fence already signaled.
    ///
    /// Objects created before a failure are destroyed before returning.
    pub fn create(device: &ash::Device) -> RenderResult<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        let image_available =
            unsafe { device.create_semaphore(&semaphore_info, None) }.or_api("vkCreateSemaphore")?;

        let render_finished = match unsafe { device.create_semaphore(&semaphore_info, None) } {
            Ok(semaphore) => semaphore,
            Err(result) => {
                unsafe { device.destroy_semaphore(image_available, None) };
                return Err(RenderError::ApiCall {
                    operation: "vkCreateSemaphore",
                    result,
                });
            }
        };

        let in_flight = match unsafe { device.create_fence(&fence_info, None) } {
            Ok(fence) => fence,
            Err(result) => {
                unsafe {
                    device.destroy_semaphore(render_finished, None);
                    device.destroy_semaphore(image_available, None);
                }
                return Err(RenderError::ApiCall {
                    operation: "vkCreateFence",
                    result,
                });
            }
        };

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    /// Destroy the fence and both semaphores
    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_fence(self.in_flight, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_semaphore(self.image_available, None);
        }
    }
}

/// Create a command pool whose buffers can be reset individually
pub fn create_command_pool(device: &ash::Device, graphics_family: u32) -> RenderResult<vk::CommandPool> {
    let create_info = vk::CommandPoolCreateInfo::builder()
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
        .queue_family_index(graphics_family);

    unsafe { device.create_command_pool(&create_info, None) }.or_api("vkCreateCommandPool")
}

/// Allocate the single primary command buffer reused every frame
pub fn allocate_command_buffer(device: &ash::Device, pool: vk::CommandPool) -> RenderResult<vk::CommandBuffer> {
    let allocate_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);

    let buffers = unsafe { device.allocate_command_buffers(&allocate_info) }.or_api("vkAllocateCommandBuffers")?;
    buffers.into_iter().next().ok_or(RenderError::ApiCall {
        operation: "vkAllocateCommandBuffers",
        result: vk::Result::ERROR_UNKNOWN,
    })
}

/// Viewport covering `extent` with depth range [0, 1]
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Scissor at the origin covering `extent`
pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

/// Everything needed to record the triangle draw for one swapchain image
#[derive(Debug, Clone, Copy)]
pub struct TriangleDraw {
    /// Render pass the framebuffer was created for
    pub render_pass: vk::RenderPass,
    /// Framebuffer wrapping the acquired image
    pub framebuffer: vk::Framebuffer,
    /// Triangle pipeline
    pub pipeline: vk::Pipeline,
    /// Swapchain extent
    pub extent: vk::Extent2D,
}

impl TriangleDraw {
    /// Reset `command_buffer` and record the render pass into it
    pub fn record(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        unsafe {
            device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .or_api("vkResetCommandBuffer")?;

            let begin_info = vk::CommandBufferBeginInfo::builder();
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .or_api("vkBeginCommandBuffer")?;

            let clear_values = [vk::ClearValue {
                color: vk::ClearColorValue { float32: CLEAR_COLOR },
            }];
            let render_pass_info = vk::RenderPassBeginInfo::builder()
                .render_pass(self.render_pass)
                .framebuffer(self.framebuffer)
                .render_area(full_scissor(self.extent))
                .clear_values(&clear_values);

            device.cmd_begin_render_pass(command_buffer, &render_pass_info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
            device.cmd_set_viewport(command_buffer, 0, &[full_viewport(self.extent)]);
            device.cmd_set_scissor(command_buffer, 0, &[full_scissor(self.extent)]);
            device.cmd_draw(command_buffer, TRIANGLE_VERTEX_COUNT, 1, 0, 0);
            device.cmd_end_render_pass(command_buffer);

            device.end_command_buffer(command_buffer).or_api("vkEndCommandBuffer")
        }
    }
}
