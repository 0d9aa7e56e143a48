//! Window management using GLFW
//!
//! Creates the fixed-size native window the swapchain presents into, and
//! exposes the small set of operations the renderer consumes from the
//! windowing system.

use ash::vk;
use thiserror::Error;

use crate::config::WindowConfig;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The native window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// The window was used after it had been destroyed
    #[error("Window already destroyed")]
    Destroyed,

    /// Other GLFW error
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Windowing operations the frame loop and extent resolution depend on
pub trait PresentationWindow {
    /// Whether a close has been requested
    fn should_close(&self) -> bool;

    /// Poll and dispatch pending events
    fn poll_events(&mut self);

    /// Live framebuffer size in pixels
    fn framebuffer_size(&self) -> (u32, u32);
}

/// GLFW window wrapper
///
/// The window and the GLFW library are torn down in two separate steps so the
/// lifecycle ledger can place them last, after every Vulkan object.
pub struct Window {
    glfw: Option<glfw::Glfw>,
    window: Option<glfw::PWindow>,
    events: Option<glfw::GlfwReceiver<(f64, glfw::WindowEvent)>>,
}

impl Window {
    /// Initialize GLFW only; the native window is opened by [`Window::open`]
    pub fn init_system() -> WindowResult<Self> {
        let glfw = glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        Ok(Self {
            glfw: Some(glfw),
            window: None,
            events: None,
        })
    }

    /// Open the native window described by `config`
    pub fn open(&mut self, config: &WindowConfig) -> WindowResult<()> {
        let glfw = self.glfw.as_mut().ok_or(WindowError::Destroyed)?;

        // Vulkan renders without a client API context
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(config.resizable));

        let (mut window, events) = glfw
            .create_window(config.width, config.height, &config.title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        log::info!("Created {}x{} window \"{}\"", config.width, config.height, config.title);

        self.window = Some(window);
        self.events = Some(events);
        Ok(())
    }

    /// Get required Vulkan instance extensions from GLFW
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .as_ref()
            .ok_or(WindowError::Destroyed)?
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Vulkan is not supported by GLFW".to_string()))
    }

    /// Create a Vulkan surface bound to this window
    pub fn create_surface(&self, instance: vk::Instance) -> Result<vk::SurfaceKHR, vk::Result> {
        let Some(window) = self.window.as_ref() else {
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        };

        let mut surface = vk::SurfaceKHR::null();
        let result = window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(result)
        }
    }

    /// Request the frame loop to stop
    pub fn set_should_close(&mut self, should_close: bool) {
        if let Some(window) = self.window.as_mut() {
            window.set_should_close(should_close);
        }
    }

    /// Destroy the native window. No-op when it is already gone.
    pub fn destroy_window(&mut self) {
        self.events = None;
        if self.window.take().is_some() {
            log::debug!("Destroyed window");
        }
    }

    /// Shut GLFW down. No-op when it is already shut down.
    pub fn terminate(&mut self) {
        // Dropping the last Glfw handle terminates the library
        if self.glfw.take().is_some() {
            log::debug!("Terminated GLFW");
        }
    }
}

impl PresentationWindow for Window {
    fn should_close(&self) -> bool {
        self.window.as_ref().map_or(true, |window| window.should_close())
    }

    fn poll_events(&mut self) {
        if let Some(glfw) = self.glfw.as_mut() {
            glfw.poll_events();
        }

        let Some(events) = self.events.as_ref() else {
            return;
        };

        let mut close_requested = false;
        for (_, event) in glfw::flush_messages(events) {
            match event {
                glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => {
                    close_requested = true;
                }
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    log::debug!("Framebuffer resized to {width}x{height}");
                }
                _ => {}
            }
        }

        if close_requested {
            self.set_should_close(true);
        }
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.window.as_ref().map_or((0, 0), |window| {
            let (width, height) = window.get_framebuffer_size();
            (width.max(0) as u32, height.max(0) as u32)
        })
    }
}
