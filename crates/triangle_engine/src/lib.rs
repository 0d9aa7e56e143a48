//! # Triangle Engine
//!
//! A minimal Vulkan renderer that draws one triangle into a GLFW window.
//!
//! ## Components
//!
//! - **Device selection**: scores every GPU against the window surface
//! - **Surface negotiation**: format, present mode, extent and image count
//! - **Pipeline**: single-subpass render pass and fixed-function pipeline
//! - **Frame scheduling**: one frame in flight, fence and semaphore ordered
//! - **Lifecycle**: teardown in exact reverse creation order
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use triangle_engine::prelude::*;
//!
//! fn main() -> Result<(), RenderError> {
//!     triangle_engine::logging::init();
//!     let config = AppConfig::load_or_default("triangle.toml")?;
//!     Application::new(config).run()
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod render;
pub mod window;

pub use app::Application;
pub use config::{AppConfig, Config, ConfigError, RendererConfig, ShaderConfig, WindowConfig};
pub use error::{RenderError, RenderResult, VkResultExt};
pub use window::{PresentationWindow, Window, WindowError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{AppConfig, Config, RendererConfig, WindowConfig},
        error::{RenderError, RenderResult},
        render::{FrameBackend, FrameScheduler, LifecycleState, ResourceKind, ResourceLedger},
        window::PresentationWindow,
        Application,
    };
}
