//! Application lifecycle
//!
//! Opens the window, brings the renderer up, runs the frame loop and tears
//! everything down in reverse creation order, whether or not each step
//! succeeded.

use crate::config::AppConfig;
use crate::error::{RenderError, RenderResult};
use crate::render::{FrameScheduler, RendererContext, ResourceKind, ResourceLedger};
use crate::window::Window;

/// The triangle application
pub struct Application {
    config: AppConfig,
    window: Option<Window>,
    renderer: RendererContext,
    scheduler: FrameScheduler,
    ledger: ResourceLedger,
}

impl Application {
    /// Create the application; nothing native is created until [`Application::run`]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            window: None,
            renderer: RendererContext::new(),
            scheduler: FrameScheduler::new(),
            ledger: ResourceLedger::new(),
        }
    }

    /// Initialize, draw until the window closes, then shut down.
    ///
    /// Teardown always runs before this returns, including when
    /// initialization failed part-way.
    pub fn run(&mut self) -> RenderResult<()> {
        let result = self.initialize().and_then(|()| self.main_loop());
        self.shutdown();
        result
    }

    /// Frames presented so far
    pub fn frames_drawn(&self) -> u64 {
        self.scheduler.frames_drawn()
    }

    /// Objects currently alive, in creation order
    pub fn live_resources(&self) -> &[ResourceKind] {
        self.ledger.created()
    }

    fn initialize(&mut self) -> RenderResult<()> {
        let window = self.window.insert(Window::init_system()?);
        self.ledger.record(ResourceKind::WindowSystem);

        window.open(&self.config.window)?;
        self.ledger.record(ResourceKind::Window);

        self.renderer.initialize(window, &self.config.renderer, &mut self.ledger)
    }

    fn main_loop(&mut self) -> RenderResult<()> {
        let window = self.window.as_mut().ok_or(RenderError::NotInitialized)?;
        self.scheduler.run(window, &mut self.renderer)
    }

    /// Destroy every live object, newest first. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if self.ledger.is_empty() {
            return;
        }
        log::info!("Shutting down");

        let Self {
            window,
            renderer,
            ledger,
            ..
        } = self;

        ledger.unwind(|kind| match kind {
            ResourceKind::Window => {
                if let Some(window) = window.as_mut() {
                    window.destroy_window();
                }
            }
            ResourceKind::WindowSystem => {
                if let Some(window) = window.as_mut() {
                    window.terminate();
                }
            }
            gpu_object => renderer.destroy(gpu_object),
        });
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::LifecycleState;

    #[test]
    fn test_new_application_owns_nothing() {
        let app = Application::new(AppConfig::default());
        assert!(app.live_resources().is_empty());
        assert_eq!(app.frames_drawn(), 0);
        assert_eq!(app.renderer.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn test_shutdown_without_run_is_noop() {
        let mut app = Application::new(AppConfig::default());
        app.shutdown();
        app.shutdown();
        assert!(app.live_resources().is_empty());
    }
}
