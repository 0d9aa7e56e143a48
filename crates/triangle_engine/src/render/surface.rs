//! Surface negotiation and swapchain creation
//!
//! Resolves the concrete format, present mode, extent and image count for the
//! swapchain from what the surface reports, then creates the swapchain and
//! one image view per swapchain image.

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;

use crate::error::{RenderError, RenderResult, VkResultExt};
use crate::render::device::QueueFamilies;

/// Format and color space used when the surface offers it
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Low-latency triple-buffering mode, used when available
pub const PREFERRED_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::MAILBOX;

/// The only present mode every implementation must support
pub const FALLBACK_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

/// What a surface supports on a particular physical device
#[derive(Debug, Clone, Default)]
pub struct SurfaceCapabilitySnapshot {
    /// Minimum number of swapchain images
    pub min_image_count: u32,
    /// Maximum number of swapchain images, 0 meaning unbounded
    pub max_image_count: u32,
    /// Current surface extent; `u32::MAX` on both axes when the window decides
    pub current_extent: vk::Extent2D,
    /// Smallest extent the surface accepts
    pub min_image_extent: vk::Extent2D,
    /// Largest extent the surface accepts
    pub max_image_extent: vk::Extent2D,
    /// Transform currently applied by the presentation engine
    pub current_transform: vk::SurfaceTransformFlagsKHR,
    /// Supported format / color space pairs
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceCapabilitySnapshot {
    /// Query the surface support of `device`
    pub fn query(loader: &Surface, device: vk::PhysicalDevice, surface: vk::SurfaceKHR) -> RenderResult<Self> {
        let capabilities = unsafe { loader.get_physical_device_surface_capabilities(device, surface) }
            .or_api("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
        let formats = unsafe { loader.get_physical_device_surface_formats(device, surface) }
            .or_api("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
        let present_modes = unsafe { loader.get_physical_device_surface_present_modes(device, surface) }
            .or_api("vkGetPhysicalDeviceSurfacePresentModesKHR")?;

        Ok(Self::from_capabilities(&capabilities, formats, present_modes))
    }

    /// Build a snapshot from raw capability data
    pub fn from_capabilities(
        capabilities: &vk::SurfaceCapabilitiesKHR,
        formats: Vec<vk::SurfaceFormatKHR>,
        present_modes: Vec<vk::PresentModeKHR>,
    ) -> Self {
        Self {
            min_image_count: capabilities.min_image_count,
            max_image_count: capabilities.max_image_count,
            current_extent: capabilities.current_extent,
            min_image_extent: capabilities.min_image_extent,
            max_image_extent: capabilities.max_image_extent,
            current_transform: capabilities.current_transform,
            formats,
            present_modes,
        }
    }

    /// At least one format and one present mode are offered
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }

    /// Whether the surface dictates its own extent
    pub fn has_defined_extent(&self) -> bool {
        self.current_extent.width != u32::MAX && self.current_extent.height != u32::MAX
    }
}

/// Resolved swapchain parameters
#[derive(Debug, Clone, Copy)]
pub struct SwapchainConfig {
    /// Image format and color space
    pub surface_format: vk::SurfaceFormatKHR,
    /// Presentation mode
    pub present_mode: vk::PresentModeKHR,
    /// Image extent
    pub extent: vk::Extent2D,
    /// Requested number of images
    pub image_count: u32,
    /// Pre-transform, copied from the surface
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

/// Pick the preferred format pair, or the first offered one
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|candidate| {
            candidate.format == PREFERRED_SURFACE_FORMAT.format
                && candidate.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| formats.first())
        .copied()
}

/// Pick mailbox when offered, FIFO otherwise
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&PREFERRED_PRESENT_MODE) {
        PREFERRED_PRESENT_MODE
    } else {
        FALLBACK_PRESENT_MODE
    }
}

/// Use the surface extent when defined, else the framebuffer size clamped
/// into the surface's extent range
pub fn choose_extent(snapshot: &SurfaceCapabilitySnapshot, framebuffer_size: (u32, u32)) -> vk::Extent2D {
    if snapshot.has_defined_extent() {
        return snapshot.current_extent;
    }

    let (width, height) = framebuffer_size;
    vk::Extent2D {
        width: width
            .max(snapshot.min_image_extent.width)
            .min(snapshot.max_image_extent.width),
        height: height
            .max(snapshot.min_image_extent.height)
            .min(snapshot.max_image_extent.height),
    }
}

/// One more than the minimum, bounded by the maximum when there is one
pub fn choose_image_count(min_image_count: u32, max_image_count: u32) -> u32 {
    let desired = min_image_count.saturating_add(1);
    if max_image_count > 0 && desired > max_image_count {
        max_image_count
    } else {
        desired
    }
}

/// Resolve every swapchain parameter from a snapshot
pub fn negotiate(snapshot: &SurfaceCapabilitySnapshot, framebuffer_size: (u32, u32)) -> RenderResult<SwapchainConfig> {
    let surface_format = choose_surface_format(&snapshot.formats).ok_or(RenderError::NoSuitableDevice)?;

    Ok(SwapchainConfig {
        surface_format,
        present_mode: choose_present_mode(&snapshot.present_modes),
        extent: choose_extent(snapshot, framebuffer_size),
        image_count: choose_image_count(snapshot.min_image_count, snapshot.max_image_count),
        pre_transform: snapshot.current_transform,
    })
}

/// Create the swapchain for `config`
pub fn create_swapchain(
    loader: &SwapchainLoader,
    surface: vk::SurfaceKHR,
    config: &SwapchainConfig,
    queue_families: QueueFamilies,
) -> RenderResult<vk::SwapchainKHR> {
    let family_indices = [queue_families.graphics, queue_families.present];

    let create_info = vk::SwapchainCreateInfoKHR::builder()
        .surface(surface)
        .min_image_count(config.image_count)
        .image_format(config.surface_format.format)
        .image_color_space(config.surface_format.color_space)
        .image_extent(config.extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .pre_transform(config.pre_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(config.present_mode)
        .clipped(true)
        .old_swapchain(vk::SwapchainKHR::null());

    // Images are shared between the two families instead of transferring ownership
    let create_info = if queue_families.is_shared() {
        create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
    } else {
        create_info
            .image_sharing_mode(vk::SharingMode::CONCURRENT)
            .queue_family_indices(&family_indices)
    };

    unsafe { loader.create_swapchain(&create_info, None) }.or_api("vkCreateSwapchainKHR")
}

/// Create one color image view per swapchain image.
///
/// On failure the views created so far are destroyed before returning.
pub fn create_image_views(
    device: &ash::Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RenderResult<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());

    for &image in images {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        match unsafe { device.create_image_view(&create_info, None) } {
            Ok(view) => views.push(view),
            Err(result) => {
                for view in views {
                    unsafe { device.destroy_image_view(view, None) };
                }
                return Err(RenderError::ApiCall {
                    operation: "vkCreateImageView",
                    result,
                });
            }
        }
    }

    Ok(views)
}
