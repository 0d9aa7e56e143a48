//! Renderer context
//!
//! Owns every native Vulkan handle the triangle renderer creates. Creation
//! records each object in the caller's [`ResourceLedger`]; teardown is driven
//! by unwinding that ledger into [`RendererContext::destroy`], which tolerates
//! objects that were never created.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;

use crate::config::RendererConfig;
use crate::error::{RenderError, RenderResult, VkResultExt};
use crate::render::device::{create_logical_device, DeviceSelector};
use crate::render::frame::{allocate_command_buffer, create_command_pool, FrameBackend, FrameSync, TriangleDraw};
use crate::render::lifecycle::{LifecycleState, ResourceKind, ResourceLedger};
use crate::render::surface::{create_image_views, create_swapchain, negotiate, SwapchainConfig};
use crate::render::{instance, pipeline};
use crate::window::{PresentationWindow, Window};

/// Aggregate owner of the renderer's native objects
pub struct RendererContext {
    state: LifecycleState,

    entry: Option<ash::Entry>,
    instance: Option<ash::Instance>,
    surface_loader: Option<Surface>,
    surface: vk::SurfaceKHR,
    debug_utils: Option<DebugUtils>,
    debug_messenger: vk::DebugUtilsMessengerEXT,

    device: Option<ash::Device>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,

    swapchain_loader: Option<SwapchainLoader>,
    swapchain: vk::SwapchainKHR,
    swapchain_config: Option<SwapchainConfig>,
    image_views: Vec<vk::ImageView>,

    render_pass: vk::RenderPass,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    framebuffers: Vec<vk::Framebuffer>,

    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    sync: Option<FrameSync>,
}

impl Default for RendererContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererContext {
    /// Create an empty context; no native object exists yet
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Uninitialized,
            entry: None,
            instance: None,
            surface_loader: None,
            surface: vk::SurfaceKHR::null(),
            debug_utils: None,
            debug_messenger: vk::DebugUtilsMessengerEXT::null(),
            device: None,
            graphics_queue: vk::Queue::null(),
            present_queue: vk::Queue::null(),
            swapchain_loader: None,
            swapchain: vk::SwapchainKHR::null(),
            swapchain_config: None,
            image_views: Vec::new(),
            render_pass: vk::RenderPass::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
            framebuffers: Vec::new(),
            command_pool: vk::CommandPool::null(),
            command_buffer: vk::CommandBuffer::null(),
            sync: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Resolved swapchain parameters, once the swapchain exists
    pub fn swapchain_config(&self) -> Option<&SwapchainConfig> {
        self.swapchain_config.as_ref()
    }

    /// Create every Vulkan object, recording each in `ledger` as it succeeds.
    ///
    /// On error the objects created so far stay recorded; unwinding the ledger
    /// destroys exactly those.
    pub fn initialize(
        &mut self,
        window: &Window,
        config: &RendererConfig,
        ledger: &mut ResourceLedger,
    ) -> RenderResult<()> {
        if self.state != LifecycleState::Uninitialized {
            return Err(RenderError::NotInitialized);
        }

        let validation = config.validation_enabled();

        // Instance
        let entry = unsafe { ash::Entry::load() }?;
        let extensions = instance::required_instance_extensions(&window.required_instance_extensions()?, validation);
        let vk_instance = instance::create_instance(&entry, &config.application_name, &extensions, validation)?;
        let surface_loader = Surface::new(&entry, &vk_instance);
        self.entry = Some(entry.clone());
        self.instance = Some(vk_instance.clone());
        self.surface_loader = Some(surface_loader.clone());
        ledger.record(ResourceKind::Instance);

        // Surface
        self.surface = window
            .create_surface(vk_instance.handle())
            .or_api("glfwCreateWindowSurface")?;
        ledger.record(ResourceKind::Surface);

        // Validation messenger
        if validation {
            let debug_utils = DebugUtils::new(&entry, &vk_instance);
            self.debug_messenger = instance::create_debug_messenger(&debug_utils)?;
            self.debug_utils = Some(debug_utils);
            ledger.record(ResourceKind::DebugMessenger);
        }

        // Physical and logical device
        let selected = DeviceSelector::new(&vk_instance, &surface_loader, self.surface).select()?;
        let device = create_logical_device(&vk_instance, &selected)?;
        self.graphics_queue = unsafe { device.get_device_queue(selected.queue_families.graphics, 0) };
        self.present_queue = unsafe { device.get_device_queue(selected.queue_families.present, 0) };
        let swapchain_loader = SwapchainLoader::new(&vk_instance, &device);
        self.device = Some(device.clone());
        self.swapchain_loader = Some(swapchain_loader.clone());
        ledger.record(ResourceKind::Device);

        // Swapchain and its image views
        let swapchain_config = negotiate(&selected.surface, window.framebuffer_size())?;
        log::info!(
            "Swapchain: {:?} / {:?}, {:?}, {}x{}, {} images",
            swapchain_config.surface_format.format,
            swapchain_config.surface_format.color_space,
            swapchain_config.present_mode,
            swapchain_config.extent.width,
            swapchain_config.extent.height,
            swapchain_config.image_count
        );
        self.swapchain = create_swapchain(&swapchain_loader, self.surface, &swapchain_config, selected.queue_families)?;
        self.swapchain_config = Some(swapchain_config);
        ledger.record(ResourceKind::Swapchain);

        let images = unsafe { swapchain_loader.get_swapchain_images(self.swapchain) }.or_api("vkGetSwapchainImagesKHR")?;
        self.image_views = create_image_views(&device, &images, swapchain_config.surface_format.format)?;
        ledger.record(ResourceKind::ImageViews);

        // Pipeline
        self.render_pass = pipeline::create_render_pass(&device, swapchain_config.surface_format.format)?;
        ledger.record(ResourceKind::RenderPass);

        self.pipeline_layout = pipeline::create_pipeline_layout(&device)?;
        ledger.record(ResourceKind::PipelineLayout);

        self.pipeline =
            pipeline::create_graphics_pipeline(&device, self.render_pass, self.pipeline_layout, &config.shaders)?;
        ledger.record(ResourceKind::Pipeline);

        self.framebuffers =
            pipeline::create_framebuffers(&device, self.render_pass, &self.image_views, swapchain_config.extent)?;
        ledger.record(ResourceKind::Framebuffers);

        // Commands and synchronization
        self.command_pool = create_command_pool(&device, selected.queue_families.graphics)?;
        ledger.record(ResourceKind::CommandPool);
        self.command_buffer = allocate_command_buffer(&device, self.command_pool)?;

        self.sync = Some(FrameSync::create(&device)?);
        ledger.record(ResourceKind::SyncObjects);

        self.state.advance(LifecycleState::Initialized);
        log::info!("Renderer initialized");
        Ok(())
    }

    /// Destroy the Vulkan object(s) of `kind`.
    ///
    /// Each step does nothing when its handle is unset, so a kind may be
    /// destroyed any number of times. Window kinds belong to [`Window`] and are
    /// ignored here.
    pub fn destroy(&mut self, kind: ResourceKind) {
        self.state.advance(LifecycleState::Destroyed);

        match kind {
            ResourceKind::WindowSystem | ResourceKind::Window => {}
            ResourceKind::SyncObjects => {
                if let (Some(device), Some(sync)) = (self.device.as_ref(), self.sync.take()) {
                    sync.destroy(device);
                }
            }
            ResourceKind::CommandPool => {
                if let Some(device) = self.device.as_ref() {
                    if self.command_pool != vk::CommandPool::null() {
                        // Frees the command buffer with it
                        unsafe { device.destroy_command_pool(self.command_pool, None) };
                    }
                }
                self.command_pool = vk::CommandPool::null();
                self.command_buffer = vk::CommandBuffer::null();
            }
            ResourceKind::Framebuffers => {
                if let Some(device) = self.device.as_ref() {
                    for framebuffer in self.framebuffers.drain(..) {
                        unsafe { device.destroy_framebuffer(framebuffer, None) };
                    }
                }
            }
            ResourceKind::Pipeline => {
                if let Some(device) = self.device.as_ref() {
                    if self.pipeline != vk::Pipeline::null() {
                        unsafe { device.destroy_pipeline(self.pipeline, None) };
                    }
                }
                self.pipeline = vk::Pipeline::null();
            }
            ResourceKind::PipelineLayout => {
                if let Some(device) = self.device.as_ref() {
                    if self.pipeline_layout != vk::PipelineLayout::null() {
                        unsafe { device.destroy_pipeline_layout(self.pipeline_layout, None) };
                    }
                }
                self.pipeline_layout = vk::PipelineLayout::null();
            }
            ResourceKind::RenderPass => {
                if let Some(device) = self.device.as_ref() {
                    if self.render_pass != vk::RenderPass::null() {
                        unsafe { device.destroy_render_pass(self.render_pass, None) };
                    }
                }
                self.render_pass = vk::RenderPass::null();
            }
            ResourceKind::ImageViews => {
                if let Some(device) = self.device.as_ref() {
                    for view in self.image_views.drain(..) {
                        unsafe { device.destroy_image_view(view, None) };
                    }
                }
            }
            ResourceKind::Swapchain => {
                if let Some(loader) = self.swapchain_loader.as_ref() {
                    if self.swapchain != vk::SwapchainKHR::null() {
                        unsafe { loader.destroy_swapchain(self.swapchain, None) };
                    }
                }
                self.swapchain = vk::SwapchainKHR::null();
                self.swapchain_config = None;
            }
            ResourceKind::Device => {
                self.swapchain_loader = None;
                if let Some(device) = self.device.take() {
                    unsafe { device.destroy_device(None) };
                }
                self.graphics_queue = vk::Queue::null();
                self.present_queue = vk::Queue::null();
            }
            ResourceKind::DebugMessenger => {
                if let Some(debug_utils) = self.debug_utils.take() {
                    if self.debug_messenger != vk::DebugUtilsMessengerEXT::null() {
                        unsafe { debug_utils.destroy_debug_utils_messenger(self.debug_messenger, None) };
                    }
                }
                self.debug_messenger = vk::DebugUtilsMessengerEXT::null();
            }
            ResourceKind::Surface => {
                if let Some(loader) = self.surface_loader.as_ref() {
                    if self.surface != vk::SurfaceKHR::null() {
                        unsafe { loader.destroy_surface(self.surface, None) };
                    }
                }
                self.surface = vk::SurfaceKHR::null();
            }
            ResourceKind::Instance => {
                self.surface_loader = None;
                if let Some(instance) = self.instance.take() {
                    unsafe { instance.destroy_instance(None) };
                }
                self.entry = None;
            }
        }
    }

    /// Destroy everything still alive, in reverse creation order
    pub fn destroy_all(&mut self) {
        for kind in ResourceKind::CREATION_ORDER.into_iter().rev() {
            self.destroy(kind);
        }
    }

    fn frame_handles(&self) -> RenderResult<(&ash::Device, FrameSync)> {
        if self.state != LifecycleState::Initialized {
            return Err(RenderError::NotInitialized);
        }
        match (self.device.as_ref(), self.sync) {
            (Some(device), Some(sync)) => Ok((device, sync)),
            _ => Err(RenderError::NotInitialized),
        }
    }

    fn swapchain_handles(&self) -> RenderResult<(&SwapchainLoader, FrameSync)> {
        let (_, sync) = self.frame_handles()?;
        let loader = self.swapchain_loader.as_ref().ok_or(RenderError::NotInitialized)?;
        Ok((loader, sync))
    }
}

impl FrameBackend for RendererContext {
    fn wait_for_fence(&mut self) -> RenderResult<()> {
        let (device, sync) = self.frame_handles()?;
        unsafe { device.wait_for_fences(&[sync.in_flight], true, u64::MAX) }.or_api("vkWaitForFences")
    }

    fn reset_fence(&mut self) -> RenderResult<()> {
        let (device, sync) = self.frame_handles()?;
        unsafe { device.reset_fences(&[sync.in_flight]) }.or_api("vkResetFences")
    }

    fn acquire_next_image(&mut self) -> RenderResult<u32> {
        let (loader, sync) = self.swapchain_handles()?;
        let (image_index, suboptimal) =
            unsafe { loader.acquire_next_image(self.swapchain, u64::MAX, sync.image_available, vk::Fence::null()) }
                .or_api("vkAcquireNextImageKHR")?;

        if suboptimal {
            log::debug!("Swapchain is suboptimal for the surface");
        }
        Ok(image_index)
    }

    fn record(&mut self, image_index: u32) -> RenderResult<()> {
        let (device, _) = self.frame_handles()?;
        let extent = self.swapchain_config.ok_or(RenderError::NotInitialized)?.extent;
        let framebuffer = self
            .framebuffers
            .get(image_index as usize)
            .copied()
            .ok_or(RenderError::ApiCall {
                operation: "vkAcquireNextImageKHR",
                result: vk::Result::ERROR_OUT_OF_DATE_KHR,
            })?;

        TriangleDraw {
            render_pass: self.render_pass,
            framebuffer,
            pipeline: self.pipeline,
            extent,
        }
        .record(device, self.command_buffer)
    }

    fn submit(&mut self) -> RenderResult<()> {
        let (device, sync) = self.frame_handles()?;

        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.command_buffer];
        let signal_semaphores = [sync.render_finished];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe { device.queue_submit(self.graphics_queue, &[submit_info.build()], sync.in_flight) }
            .or_api("vkQueueSubmit")
    }

    fn present(&mut self, image_index: u32) -> RenderResult<()> {
        let (loader, sync) = self.swapchain_handles()?;

        let wait_semaphores = [sync.render_finished];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let suboptimal = unsafe { loader.queue_present(self.present_queue, &present_info) }.or_api("vkQueuePresentKHR")?;
        if suboptimal {
            log::debug!("Presented to a suboptimal swapchain");
        }
        Ok(())
    }

    fn wait_idle(&mut self) -> RenderResult<()> {
        match self.device.as_ref() {
            Some(device) => unsafe { device.device_wait_idle() }.or_api("vkDeviceWaitIdle"),
            None => Ok(()),
        }
    }
}

impl Drop for RendererContext {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_uninitialized() {
        let context = RendererContext::new();
        assert_eq!(context.state(), LifecycleState::Uninitialized);
        assert!(context.swapchain_config().is_none());
    }

    #[test]
    fn test_destroying_unset_handles_is_noop() {
        let mut context = RendererContext::new();
        for kind in ResourceKind::CREATION_ORDER.into_iter().rev() {
            context.destroy(kind);
        }
        context.destroy_all();

        assert_eq!(context.state(), LifecycleState::Destroyed);
    }

    #[test]
    fn test_frames_refused_before_initialization() {
        let mut context = RendererContext::new();

        assert!(matches!(context.wait_for_fence(), Err(RenderError::NotInitialized)));
        assert!(matches!(context.acquire_next_image(), Err(RenderError::NotInitialized)));
        assert!(matches!(context.submit(), Err(RenderError::NotInitialized)));
        // Nothing to wait for
        assert!(context.wait_idle().is_ok());
    }
}
