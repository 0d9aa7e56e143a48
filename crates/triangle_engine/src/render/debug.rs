//! Validation layer messages
//!
//! The messenger callback turns each record into a multi-line block and sends
//! warnings and errors to the error stream through `log`. Lower severities are
//! dropped.

use ash::vk;
use std::borrow::Cow;
use std::ffi::{c_void, CStr};

/// Severities the messenger subscribes to
pub const MESSAGE_SEVERITIES: vk::DebugUtilsMessageSeverityFlagsEXT = vk::DebugUtilsMessageSeverityFlagsEXT::from_raw(
    vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE.as_raw()
        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING.as_raw()
        | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR.as_raw(),
);

/// Message categories the messenger subscribes to
pub const MESSAGE_TYPES: vk::DebugUtilsMessageTypeFlagsEXT = vk::DebugUtilsMessageTypeFlagsEXT::from_raw(
    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL.as_raw()
        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION.as_raw()
        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE.as_raw(),
);

/// `VK_EXT_device_address_binding_report` message type bit
const DEVICE_ADDRESS_BINDING: vk::DebugUtilsMessageTypeFlagsEXT = vk::DebugUtilsMessageTypeFlagsEXT::from_raw(0x8);

/// Messenger configuration.
///
/// The same value is chained into instance creation, so messages emitted while
/// the instance is created or destroyed are reported too, and then used to
/// create the persistent messenger.
pub fn messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(MESSAGE_SEVERITIES)
        .message_type(MESSAGE_TYPES)
        .pfn_user_callback(Some(validation_callback))
        .build()
}

/// Human-readable severity
pub fn severity_label(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Cow<'static, str> {
    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => "Verbose".into(),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => "Info".into(),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => "Warning".into(),
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => "Error".into(),
        other => format!("Invalid type code: {}", other.as_raw()).into(),
    }
}

/// Human-readable message category
pub fn type_label(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> Cow<'static, str> {
    match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "General".into(),
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "Validation".into(),
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "Performance".into(),
        DEVICE_ADDRESS_BINDING => "Device address binding".into(),
        other => format!("Invalid type code: {}", other.as_raw()).into(),
    }
}

/// Whether a record is important enough to show
pub fn is_reportable(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> bool {
    severity.as_raw() >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING.as_raw()
}

/// Render one validation record
pub fn format_validation_message(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    message: &str,
    object_handles: &[u64],
) -> String {
    let objects = object_handles
        .iter()
        .map(|handle| format!("{handle:x}"))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "-----------------------------------------------\n\
         Vulkan validation:\n\
         {message}\n\n\
         \tSeverity: {}\n\
         \tType: {}\n\
         \tObjects: {objects}",
        severity_label(severity),
        type_label(message_type),
    )
}

unsafe extern "system" fn validation_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    if !is_reportable(message_severity) || callback_data.is_null() {
        return vk::FALSE;
    }

    let data = &*callback_data;
    let message = if data.p_message.is_null() {
        Cow::Borrowed("<no message>")
    } else {
        CStr::from_ptr(data.p_message).to_string_lossy()
    };

    let handles: Vec<u64> = if data.p_objects.is_null() {
        Vec::new()
    } else {
        std::slice::from_raw_parts(data.p_objects, data.object_count as usize)
            .iter()
            .map(|object| object.object_handle)
            .collect()
    };

    let report = format_validation_message(message_severity, message_type, &message, &handles);
    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("{report}");
    } else {
        log::warn!("{report}");
    }

    // Never abort the call that triggered the message
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_labels() {
        assert_eq!(severity_label(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE), "Verbose");
        assert_eq!(severity_label(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING), "Warning");
        assert_eq!(severity_label(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR), "Error");
        assert_eq!(
            severity_label(vk::DebugUtilsMessageSeverityFlagsEXT::from_raw(0x3)),
            "Invalid type code: 3"
        );
    }

    #[test]
    fn test_type_labels() {
        assert_eq!(type_label(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL), "General");
        assert_eq!(type_label(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION), "Validation");
        assert_eq!(
            type_label(DEVICE_ADDRESS_BINDING),
            "Device address binding"
        );
        assert_eq!(
            type_label(vk::DebugUtilsMessageTypeFlagsEXT::from_raw(0x6)),
            "Invalid type code: 6"
        );
    }

    #[test]
    fn test_only_warnings_and_errors_reported() {
        assert!(!is_reportable(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
        assert!(!is_reportable(vk::DebugUtilsMessageSeverityFlagsEXT::INFO));
        assert!(is_reportable(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING));
        assert!(is_reportable(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR));
    }

    #[test]
    fn test_message_block_layout() {
        let text = format_validation_message(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
            "vkDestroyDevice: object still in use",
            &[0xdead_beef, 0x10],
        );

        assert!(text.contains("vkDestroyDevice: object still in use"));
        assert!(text.contains("\tSeverity: Error\n"));
        assert!(text.contains("\tType: Validation\n"));
        assert!(text.ends_with("\tObjects: deadbeef 10"));
    }

    #[test]
    fn test_create_info_carries_callback() {
        let info = messenger_create_info();
        assert!(info.pfn_user_callback.is_some());
        assert!(info.message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR));
        assert!(info.message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION));
    }
}
