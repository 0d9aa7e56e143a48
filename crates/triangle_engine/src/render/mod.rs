//! Vulkan rendering
//!
//! Device selection, surface negotiation, pipeline construction and the frame
//! loop, plus the lifecycle ledger that orders their teardown.

pub mod context;
pub mod debug;
pub mod device;
pub mod frame;
pub mod instance;
pub mod lifecycle;
pub mod pipeline;
pub mod shader;
pub mod surface;

pub use context::RendererContext;
pub use device::{
    find_queue_families, select_best, DeviceSelector, PhysicalDeviceCandidate, QueueFamilies, QueueFamilyIndices,
    SelectedDevice,
};
pub use frame::{FrameBackend, FrameScheduler, FrameSync};
pub use lifecycle::{LifecycleState, ResourceKind, ResourceLedger};
pub use surface::{negotiate, SurfaceCapabilitySnapshot, SwapchainConfig};
