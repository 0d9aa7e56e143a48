//! Instance bring-up
//!
//! Checks that every required extension and the validation layer exist before
//! the instance is created. A missing extension or layer aborts here, before
//! any GPU object exists.

use ash::extensions::ext::DebugUtils;
use ash::vk;
use std::ffi::{CStr, CString};

use crate::error::{RenderError, RenderResult, VkResultExt};
use crate::render::debug;

/// Khronos validation layer
pub const VALIDATION_LAYER: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

/// Engine name reported to the driver
const ENGINE_NAME: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"No Engine\0") };

/// Instance extensions needed: the windowing system's list, plus debug utils
/// when validating
pub fn required_instance_extensions(window_extensions: &[String], validation: bool) -> Vec<String> {
    let mut extensions = window_extensions.to_vec();
    if validation {
        extensions.push(DebugUtils::name().to_string_lossy().into_owned());
    }
    extensions
}

/// First entry of `required` that `available` lacks
pub fn first_missing<'a>(required: &'a [String], available: &[String]) -> Option<&'a String> {
    required.iter().find(|name| !available.contains(*name))
}

fn extension_names(properties: &[vk::ExtensionProperties]) -> Vec<String> {
    properties
        .iter()
        .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }.to_string_lossy().into_owned())
        .collect()
}

fn layer_names(properties: &[vk::LayerProperties]) -> Vec<String> {
    properties
        .iter()
        .map(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) }.to_string_lossy().into_owned())
        .collect()
}

fn to_cstrings(names: &[String]) -> RenderResult<Vec<CString>> {
    names
        .iter()
        .map(|name| {
            CString::new(name.as_str()).map_err(|_| RenderError::ExtensionUnavailable { name: name.clone() })
        })
        .collect()
}

/// Fail with `ExtensionUnavailable` unless every extension in `required` is
/// exposed by the loader
pub fn check_instance_extensions(entry: &ash::Entry, required: &[String]) -> RenderResult<()> {
    let available = entry
        .enumerate_instance_extension_properties(None)
        .or_api("vkEnumerateInstanceExtensionProperties")?;
    let available = extension_names(&available);

    match first_missing(required, &available) {
        Some(name) => Err(RenderError::ExtensionUnavailable { name: name.clone() }),
        None => Ok(()),
    }
}

/// Fail with `ValidationLayerUnavailable` unless the validation layer is installed
pub fn check_validation_layer(entry: &ash::Entry) -> RenderResult<()> {
    let available = entry
        .enumerate_instance_layer_properties()
        .or_api("vkEnumerateInstanceLayerProperties")?;
    let available = layer_names(&available);
    let wanted = VALIDATION_LAYER.to_string_lossy().into_owned();

    if available.contains(&wanted) {
        Ok(())
    } else {
        Err(RenderError::ValidationLayerUnavailable { name: wanted })
    }
}

/// Create the instance.
///
/// With validation on, the layer is enabled and a messenger description is
/// chained so instance creation and destruction are themselves validated.
pub fn create_instance(
    entry: &ash::Entry,
    application_name: &str,
    extensions: &[String],
    validation: bool,
) -> RenderResult<ash::Instance> {
    check_instance_extensions(entry, extensions)?;
    if validation {
        check_validation_layer(entry)?;
    }

    let app_name = CString::new(application_name).map_err(|_| {
        RenderError::Config(crate::config::ConfigError::Invalid(
            "application name contains a NUL byte".to_string(),
        ))
    })?;
    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(ENGINE_NAME)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_0);

    let extension_cstrings = to_cstrings(extensions)?;
    let extension_ptrs: Vec<_> = extension_cstrings.iter().map(|name| name.as_ptr()).collect();

    let layer_ptrs = if validation {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        Vec::new()
    };

    let mut debug_info = debug::messenger_create_info();
    let mut create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extension_ptrs)
        .enabled_layer_names(&layer_ptrs);
    if validation {
        create_info = create_info.push_next(&mut debug_info);
    }

    let instance = unsafe { entry.create_instance(&create_info, None) }.or_api("vkCreateInstance")?;
    log::info!(
        "Created Vulkan instance for \"{application_name}\" (validation {})",
        if validation { "on" } else { "off" }
    );
    Ok(instance)
}

/// Create the persistent debug messenger
pub fn create_debug_messenger(debug_utils: &DebugUtils) -> RenderResult<vk::DebugUtilsMessengerEXT> {
    let create_info = debug::messenger_create_info();
    unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
        .or_api("vkCreateDebugUtilsMessengerEXT")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_debug_utils_added_only_when_validating() {
        let window = names(&["VK_KHR_surface", "VK_KHR_xcb_surface"]);

        let plain = required_instance_extensions(&window, false);
        assert_eq!(plain, window);

        let validating = required_instance_extensions(&window, true);
        assert_eq!(validating.len(), 3);
        assert_eq!(validating.last().map(String::as_str), Some("VK_EXT_debug_utils"));
    }

    #[test]
    fn test_first_missing_extension_reported() {
        let required = names(&["VK_KHR_surface", "VK_KHR_wayland_surface", "VK_EXT_debug_utils"]);
        let available = names(&["VK_KHR_surface", "VK_EXT_debug_utils"]);

        assert_eq!(
            first_missing(&required, &available).map(String::as_str),
            Some("VK_KHR_wayland_surface")
        );
        assert!(first_missing(&required[..1], &available).is_none());
    }

    #[test]
    fn test_validation_layer_name() {
        assert_eq!(VALIDATION_LAYER.to_str().unwrap(), "VK_LAYER_KHRONOS_validation");
    }
}
