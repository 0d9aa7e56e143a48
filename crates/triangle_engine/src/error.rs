//! Renderer error types
//!
//! Every failure in the renderer is fatal. Errors carry enough context (the
//! failing entry point and its native status code) to be reported once at the
//! process boundary.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::window::WindowError;

/// Renderer error kinds
#[derive(Error, Debug)]
pub enum RenderError {
    /// A required instance or device extension is not exposed by the driver
    #[error("Required extension unavailable: {name}")]
    ExtensionUnavailable {
        /// Extension name as reported by Vulkan
        name: String,
    },

    /// The requested validation layer is not installed
    #[error("Validation layer requested but not available: {name}")]
    ValidationLayerUnavailable {
        /// Layer name
        name: String,
    },

    /// No enumerated GPU is able to render to the surface
    #[error("Failed to find a suitable GPU")]
    NoSuitableDevice,

    /// A frame was requested outside the initialized lifetime of the renderer
    #[error("Renderer is not initialized")]
    NotInitialized,

    /// A native API call returned a non-success status
    #[error("{operation} failed: {result:?} ({})", .result.as_raw())]
    ApiCall {
        /// Name of the Vulkan entry point that failed
        operation: &'static str,
        /// Native status code
        result: vk::Result,
    },

    /// A shader bytecode file could not be opened or read
    #[error("Failed to open file: [{}]: {source}", .path.display())]
    ResourceOpen {
        /// Path that was requested
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A shader file was read but is not valid SPIR-V words
    #[error("Invalid shader bytecode in [{}]: {reason}", .path.display())]
    InvalidShader {
        /// Path of the offending file
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// The Vulkan loader library could not be loaded
    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    /// Windowing system failure
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Configuration failure
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Tags a raw Vulkan result with the entry point that produced it
pub trait VkResultExt<T> {
    /// Convert a `vk::Result` error into [`RenderError::ApiCall`]
    fn or_api(self, operation: &'static str) -> RenderResult<T>;
}

impl<T> VkResultExt<T> for Result<T, vk::Result> {
    fn or_api(self, operation: &'static str) -> RenderResult<T> {
        self.map_err(|result| RenderError::ApiCall { operation, result })
    }
}
