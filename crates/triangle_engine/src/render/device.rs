//! Physical device selection and logical device creation
//!
//! Every enumerated GPU is probed into a [`PhysicalDeviceCandidate`] and
//! scored. A candidate scores zero, and can never be picked, when it lacks a
//! graphics or present queue family, does not expose `VK_KHR_swapchain`, or
//! reports no surface formats or present modes for the target surface.
//!
//! Non-zero scores are built from three terms:
//!
//! | term                                   | value                       |
//! |----------------------------------------|-----------------------------|
//! | graphics and present family coincide   | [`SHARED_QUEUE_FAMILY_BONUS`] |
//! | discrete GPU                           | [`DISCRETE_GPU_BONUS`]      |
//! | `limits.max_image_dimension2_d`        | raw value                   |
//!
//! The dimension term is added unscaled, so a large limit can outweigh the
//! discrete bonus: an integrated GPU reporting 16384 outranks a discrete GPU
//! reporting 4096. That weighting is kept as-is for compatibility.

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::CStr;

use crate::error::{RenderError, RenderResult, VkResultExt};
use crate::render::surface::SurfaceCapabilitySnapshot;

/// Score bonus when one queue family handles both graphics and presentation
pub const SHARED_QUEUE_FAMILY_BONUS: u64 = 500;

/// Score bonus for a dedicated GPU
pub const DISCRETE_GPU_BONUS: u64 = 1000;

/// Device extensions a candidate must expose
pub fn required_device_extensions() -> [&'static CStr; 1] {
    [SwapchainLoader::name()]
}

/// Graphics- and present-capable queue family indices of a device
///
/// The two indices are discovered independently and may coincide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// First family exposing graphics capability
    pub graphics: Option<u32>,
    /// First family able to present to the target surface
    pub present: Option<u32>,
}

/// Queue families of a device whose mapping is complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    /// Graphics family index
    pub graphics: u32,
    /// Present family index
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Both indices are known
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Both indices are known and refer to the same family
    pub fn is_shared(&self) -> bool {
        self.is_complete() && self.graphics == self.present
    }

    /// The resolved mapping, when complete
    pub fn complete(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }
}

impl QueueFamilies {
    /// Distinct family indices, in ascending order
    pub fn unique(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = [self.graphics, self.present].into_iter().collect();
        set.into_iter().collect()
    }

    /// Whether graphics and present use the same family
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }
}

/// Walk queue families in index order and record the first graphics-capable
/// and the first present-capable family.
///
/// `supports_present` is asked about each family until a present family has
/// been found; the walk stops as soon as both indices are known.
pub fn find_queue_families<E>(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> Result<bool, E>,
) -> Result<QueueFamilyIndices, E> {
    let mut indices = QueueFamilyIndices::default();

    for (index, family) in (0u32..).zip(families) {
        if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(index);
        }

        if indices.present.is_none() && supports_present(index)? {
            indices.present = Some(index);
        }

        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

/// Everything selection needs to know about one GPU
#[derive(Debug, Clone)]
pub struct PhysicalDeviceCandidate {
    /// Device handle
    pub handle: vk::PhysicalDevice,
    /// Human-readable device name
    pub name: String,
    /// Discrete, integrated, virtual, ...
    pub device_type: vk::PhysicalDeviceType,
    /// `limits.max_image_dimension2_d`
    pub max_image_dimension_2d: u32,
    /// Queue family mapping against the target surface
    pub queue_families: QueueFamilyIndices,
    /// Whether every required device extension is exposed
    pub extensions_supported: bool,
    /// Surface support, only queried when the swapchain extension exists
    pub surface: Option<SurfaceCapabilitySnapshot>,
}

impl PhysicalDeviceCandidate {
    /// Whether the candidate can render and present at all
    pub fn is_suitable(&self) -> bool {
        self.queue_families.is_complete()
            && self.extensions_supported
            && self.surface.as_ref().is_some_and(SurfaceCapabilitySnapshot::is_adequate)
    }

    /// Suitability score; zero means disqualified
    pub fn score(&self) -> u64 {
        if !self.is_suitable() {
            return 0;
        }

        let mut score = 0;
        if self.queue_families.is_shared() {
            score += SHARED_QUEUE_FAMILY_BONUS;
        }
        if self.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
            score += DISCRETE_GPU_BONUS;
        }
        score + u64::from(self.max_image_dimension_2d)
    }
}

/// The winning device
#[derive(Debug, Clone)]
pub struct SelectedDevice {
    /// Device handle
    pub handle: vk::PhysicalDevice,
    /// Device name
    pub name: String,
    /// Score it won with
    pub score: u64,
    /// Complete queue family mapping
    pub queue_families: QueueFamilies,
    /// Surface support captured during selection
    pub surface: SurfaceCapabilitySnapshot,
}

/// Rank candidates and return the best one.
///
/// Candidates are stably sorted by score, so among equal top scores the one
/// enumerated last wins. Fails with [`RenderError::NoSuitableDevice`] when the
/// list is empty or every candidate scored zero.
pub fn select_best(candidates: Vec<PhysicalDeviceCandidate>) -> RenderResult<SelectedDevice> {
    let mut ranked: Vec<(u64, PhysicalDeviceCandidate)> = candidates
        .into_iter()
        .map(|candidate| (candidate.score(), candidate))
        .collect();

    for (score, candidate) in &ranked {
        log::debug!("GPU candidate {} scored {score}", candidate.name);
    }

    ranked.sort_by_key(|(score, _)| *score);

    let (score, best) = ranked.pop().ok_or(RenderError::NoSuitableDevice)?;
    if score == 0 {
        return Err(RenderError::NoSuitableDevice);
    }

    match (best.queue_families.complete(), best.surface) {
        (Some(queue_families), Some(surface)) => Ok(SelectedDevice {
            handle: best.handle,
            name: best.name,
            score,
            queue_families,
            surface,
        }),
        _ => Err(RenderError::NoSuitableDevice),
    }
}

/// Probes GPUs against one surface
pub struct DeviceSelector<'a> {
    instance: &'a ash::Instance,
    surface_loader: &'a Surface,
    surface: vk::SurfaceKHR,
}

impl<'a> DeviceSelector<'a> {
    /// Create a selector for `surface`
    pub fn new(instance: &'a ash::Instance, surface_loader: &'a Surface, surface: vk::SurfaceKHR) -> Self {
        Self {
            instance,
            surface_loader,
            surface,
        }
    }

    /// Enumerate, probe and rank every physical device
    pub fn select(&self) -> RenderResult<SelectedDevice> {
        let devices = unsafe { self.instance.enumerate_physical_devices() }
            .or_api("vkEnumeratePhysicalDevices")?;

        if devices.is_empty() {
            log::error!("No GPU with Vulkan support found");
            return Err(RenderError::NoSuitableDevice);
        }

        let candidates = devices
            .into_iter()
            .map(|device| self.probe(device))
            .collect::<RenderResult<Vec<_>>>()?;

        let selected = select_best(candidates)?;
        log::info!(
            "Selected GPU: {} (score {}, graphics family {}, present family {})",
            selected.name,
            selected.score,
            selected.queue_families.graphics,
            selected.queue_families.present
        );
        Ok(selected)
    }

    /// Gather everything scoring needs about `device`
    pub fn probe(&self, device: vk::PhysicalDevice) -> RenderResult<PhysicalDeviceCandidate> {
        let properties = unsafe { self.instance.get_physical_device_properties(device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        let families = unsafe { self.instance.get_physical_device_queue_family_properties(device) };
        let queue_families = find_queue_families(&families, |index| unsafe {
            self.surface_loader
                .get_physical_device_surface_support(device, index, self.surface)
                .or_api("vkGetPhysicalDeviceSurfaceSupportKHR")
        })?;

        let extensions_supported = self.supports_required_extensions(device)?;

        let surface = if extensions_supported {
            Some(SurfaceCapabilitySnapshot::query(self.surface_loader, device, self.surface)?)
        } else {
            None
        };

        Ok(PhysicalDeviceCandidate {
            handle: device,
            name,
            device_type: properties.device_type,
            max_image_dimension_2d: properties.limits.max_image_dimension2_d,
            queue_families,
            extensions_supported,
            surface,
        })
    }

    fn supports_required_extensions(&self, device: vk::PhysicalDevice) -> RenderResult<bool> {
        let available = unsafe { self.instance.enumerate_device_extension_properties(device) }
            .or_api("vkEnumerateDeviceExtensionProperties")?;

        Ok(required_device_extensions().iter().all(|required| {
            available.iter().any(|extension| {
                let name = unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) };
                name == *required
            })
        }))
    }
}

/// Create the logical device with one queue per unique family
pub fn create_logical_device(instance: &ash::Instance, selected: &SelectedDevice) -> RenderResult<ash::Device> {
    let priorities = [1.0_f32];
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = selected
        .queue_families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&priorities)
                .build()
        })
        .collect();

    let extension_names = required_device_extensions().map(CStr::as_ptr);
    let features = vk::PhysicalDeviceFeatures::default();

    let create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    unsafe { instance.create_device(selected.handle, &create_info, None) }.or_api("vkCreateDevice")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn adequate_surface() -> SurfaceCapabilitySnapshot {
        SurfaceCapabilitySnapshot {
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO],
            ..SurfaceCapabilitySnapshot::default()
        }
    }

    fn candidate(raw: u64, shared: bool, device_type: vk::PhysicalDeviceType, max_dim: u32) -> PhysicalDeviceCandidate {
        PhysicalDeviceCandidate {
            handle: vk::PhysicalDevice::from_raw(raw),
            name: format!("gpu-{raw}"),
            device_type,
            max_image_dimension_2d: max_dim,
            queue_families: QueueFamilyIndices {
                graphics: Some(0),
                present: Some(if shared { 0 } else { 1 }),
            },
            extensions_supported: true,
            surface: Some(adequate_surface()),
        }
    }

    #[test]
    fn test_discovery_stops_once_both_found() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
        ];
        let mut queried = Vec::new();
        let indices = find_queue_families::<()>(&families, |index| {
            queried.push(index);
            Ok(true)
        })
        .unwrap();

        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(0));
        assert_eq!(queried, vec![0]);
    }

    #[test]
    fn test_discovery_finds_separate_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::TRANSFER),
        ];
        let indices = find_queue_families::<()>(&families, |index| Ok(index == 2)).unwrap();

        assert_eq!(indices, QueueFamilyIndices { graphics: Some(0), present: Some(2) });
        assert!(indices.is_complete());
        assert!(!indices.is_shared());
    }

    #[test]
    fn test_discovery_incomplete_without_graphics() {
        let families = [family(vk::QueueFlags::COMPUTE), family(vk::QueueFlags::TRANSFER)];
        let indices = find_queue_families::<()>(&families, |_| Ok(true)).unwrap();

        assert_eq!(indices.graphics, None);
        assert_eq!(indices.present, Some(0));
        assert!(indices.complete().is_none());
    }

    #[test]
    fn test_discovery_propagates_query_error() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let result = find_queue_families(&families, |_| Err(vk::Result::ERROR_SURFACE_LOST_KHR));
        assert_eq!(result, Err(vk::Result::ERROR_SURFACE_LOST_KHR));
    }

    #[test]
    fn test_score_terms() {
        let integrated_shared = candidate(1, true, vk::PhysicalDeviceType::INTEGRATED_GPU, 16384);
        let discrete_separate = candidate(2, false, vk::PhysicalDeviceType::DISCRETE_GPU, 4096);
        let discrete_shared = candidate(3, true, vk::PhysicalDeviceType::DISCRETE_GPU, 8192);

        assert_eq!(integrated_shared.score(), 500 + 16384);
        assert_eq!(discrete_separate.score(), 1000 + 4096);
        assert_eq!(discrete_shared.score(), 500 + 1000 + 8192);
    }

    #[test]
    fn test_missing_extension_disqualifies() {
        let mut gpu = candidate(1, true, vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        gpu.extensions_supported = false;
        gpu.surface = None;
        assert_eq!(gpu.score(), 0);
    }

    #[test]
    fn test_incomplete_families_disqualify() {
        let mut gpu = candidate(1, true, vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        gpu.queue_families.present = None;
        assert_eq!(gpu.score(), 0);
    }

    #[test]
    fn test_empty_surface_lists_disqualify() {
        let mut no_formats = candidate(1, true, vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        no_formats.surface.as_mut().unwrap().formats.clear();
        assert_eq!(no_formats.score(), 0);

        let mut no_modes = candidate(2, true, vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        no_modes.surface.as_mut().unwrap().present_modes.clear();
        assert_eq!(no_modes.score(), 0);
    }

    #[test]
    fn test_tie_goes_to_last_enumerated() {
        let first = candidate(1, true, vk::PhysicalDeviceType::INTEGRATED_GPU, 4096);
        let second = candidate(2, true, vk::PhysicalDeviceType::INTEGRATED_GPU, 4096);

        let selected = select_best(vec![first, second]).unwrap();
        assert_eq!(selected.handle, vk::PhysicalDevice::from_raw(2));
    }

    #[test]
    fn test_no_candidates_fails() {
        assert!(matches!(select_best(Vec::new()), Err(RenderError::NoSuitableDevice)));
    }

    #[test]
    fn test_all_zero_scores_fail() {
        let mut gpu = candidate(1, true, vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        gpu.extensions_supported = false;
        assert!(matches!(select_best(vec![gpu]), Err(RenderError::NoSuitableDevice)));
    }

    #[test]
    fn test_unique_families() {
        let shared = QueueFamilies { graphics: 1, present: 1 };
        let split = QueueFamilies { graphics: 2, present: 0 };
        assert_eq!(shared.unique(), vec![1]);
        assert_eq!(split.unique(), vec![0, 2]);
        assert!(shared.is_shared());
    }
}
