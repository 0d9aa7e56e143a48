//! Resource lifecycle ordering
//!
//! Vulkan requires every object to be destroyed before the objects it was
//! created from. Instead of hand-ordering destructor bodies, each successful
//! creation is appended to a [`ResourceLedger`], and teardown unwinds the
//! ledger back to front. Whatever subset of objects was actually created, the
//! destruction order is the exact reverse of the creation order.

use std::fmt;

/// Every object the application creates, in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// GLFW library initialization
    WindowSystem,
    /// Native window
    Window,
    /// Vulkan instance
    Instance,
    /// Presentation surface
    Surface,
    /// Validation debug messenger (debug builds only)
    DebugMessenger,
    /// Logical device and its queues
    Device,
    /// Swapchain
    Swapchain,
    /// One image view per swapchain image
    ImageViews,
    /// Render pass
    RenderPass,
    /// Empty pipeline layout
    PipelineLayout,
    /// Graphics pipeline
    Pipeline,
    /// One framebuffer per image view
    Framebuffers,
    /// Command pool (frees its command buffer with it)
    CommandPool,
    /// Semaphores and fence of the single frame slot
    SyncObjects,
}

impl ResourceKind {
    /// All kinds in the order a full initialization creates them
    pub const CREATION_ORDER: [Self; 14] = [
        Self::WindowSystem,
        Self::Window,
        Self::Instance,
        Self::Surface,
        Self::DebugMessenger,
        Self::Device,
        Self::Swapchain,
        Self::ImageViews,
        Self::RenderPass,
        Self::PipelineLayout,
        Self::Pipeline,
        Self::Framebuffers,
        Self::CommandPool,
        Self::SyncObjects,
    ];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WindowSystem => "window system",
            Self::Window => "window",
            Self::Instance => "instance",
            Self::Surface => "surface",
            Self::DebugMessenger => "debug messenger",
            Self::Device => "logical device",
            Self::Swapchain => "swapchain",
            Self::ImageViews => "image views",
            Self::RenderPass => "render pass",
            Self::PipelineLayout => "pipeline layout",
            Self::Pipeline => "graphics pipeline",
            Self::Framebuffers => "framebuffers",
            Self::CommandPool => "command pool",
            Self::SyncObjects => "sync objects",
        };
        f.write_str(name)
    }
}

/// Renderer lifecycle; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    /// No native object has been created yet, or creation is in progress
    Uninitialized,
    /// Every object exists and the frame loop may run
    Initialized,
    /// Teardown has run
    Destroyed,
}

impl LifecycleState {
    /// Advance to `next`, ignoring attempts to move backwards
    pub fn advance(&mut self, next: Self) {
        if next > *self {
            *self = next;
        }
    }
}

/// Record of successfully created objects
#[derive(Debug, Default)]
pub struct ResourceLedger {
    created: Vec<ResourceKind>,
}

impl ResourceLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `kind` now exists
    pub fn record(&mut self, kind: ResourceKind) {
        log::debug!("Created {kind}");
        self.created.push(kind);
    }

    /// Whether `kind` has been recorded and not yet unwound
    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.created.contains(&kind)
    }

    /// Objects currently alive, in creation order
    pub fn created(&self) -> &[ResourceKind] {
        &self.created
    }

    /// Whether nothing is alive
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    /// Destroy every recorded object, newest first.
    ///
    /// Each kind is handed to `destroy` exactly once. Unwinding an empty ledger
    /// does nothing, so calling this twice is harmless.
    pub fn unwind(&mut self, mut destroy: impl FnMut(ResourceKind)) {
        while let Some(kind) = self.created.pop() {
            log::debug!("Destroying {kind}");
            destroy(kind);
        }
    }
}
