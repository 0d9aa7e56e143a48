//! GPU ranking over synthetic candidate sets

use ash::vk::{self, Handle};
use triangle_engine::render::{select_best, PhysicalDeviceCandidate, QueueFamilyIndices, SurfaceCapabilitySnapshot};
use triangle_engine::RenderError;

fn surface() -> SurfaceCapabilitySnapshot {
    SurfaceCapabilitySnapshot {
        min_image_count: 2,
        formats: vec![vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }],
        present_modes: vec![vk::PresentModeKHR::FIFO],
        ..Default::default()
    }
}

fn gpu(
    raw: u64,
    device_type: vk::PhysicalDeviceType,
    graphics: Option<u32>,
    present: Option<u32>,
    max_dim: u32,
) -> PhysicalDeviceCandidate {
    PhysicalDeviceCandidate {
        handle: vk::PhysicalDevice::from_raw(raw),
        name: format!("device {raw}"),
        device_type,
        max_image_dimension_2d: max_dim,
        queue_families: QueueFamilyIndices { graphics, present },
        extensions_supported: true,
        surface: Some(surface()),
    }
}

#[test]
fn integrated_gpu_with_larger_limit_beats_discrete() {
    let device_x = gpu(0xA, vk::PhysicalDeviceType::INTEGRATED_GPU, Some(0), Some(0), 16384);
    let device_y = gpu(0xB, vk::PhysicalDeviceType::DISCRETE_GPU, Some(0), Some(1), 4096);

    assert_eq!(device_x.score(), 16884);
    assert_eq!(device_y.score(), 5096);

    let selected = select_best(vec![device_x, device_y]).unwrap();
    assert_eq!(selected.handle, vk::PhysicalDevice::from_raw(0xA));
    assert_eq!(selected.score, 16884);
    assert!(selected.queue_families.is_shared());
}

#[test]
fn selection_independent_of_enumeration_order_for_distinct_scores() {
    let device_x = gpu(0xA, vk::PhysicalDeviceType::INTEGRATED_GPU, Some(0), Some(0), 16384);
    let device_y = gpu(0xB, vk::PhysicalDeviceType::DISCRETE_GPU, Some(0), Some(1), 4096);

    let selected = select_best(vec![device_y, device_x]).unwrap();
    assert_eq!(selected.handle, vk::PhysicalDevice::from_raw(0xA));
}

#[test]
fn selected_device_always_has_complete_queue_families() {
    let layouts = [
        (None, None),
        (Some(0), None),
        (None, Some(0)),
        (Some(1), Some(0)),
        (Some(0), Some(0)),
    ];

    // Every non-empty subset of the layouts, enumerated in order
    for mask in 1u32..(1 << layouts.len()) {
        let candidates: Vec<_> = layouts
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << *i) != 0)
            .map(|(i, (graphics, present))| {
                gpu(i as u64 + 1, vk::PhysicalDeviceType::DISCRETE_GPU, *graphics, *present, 16384)
            })
            .collect();
        let any_complete = candidates.iter().any(|c| c.queue_families.is_complete());

        match select_best(candidates) {
            Ok(selected) => {
                assert!(any_complete);
                let layout = layouts[selected.handle.as_raw() as usize - 1];
                assert_eq!(layout.0, Some(selected.queue_families.graphics));
                assert_eq!(layout.1, Some(selected.queue_families.present));
            }
            Err(RenderError::NoSuitableDevice) => assert!(!any_complete),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}

#[test]
fn empty_lists_never_score_regardless_of_other_properties() {
    for device_type in [
        vk::PhysicalDeviceType::DISCRETE_GPU,
        vk::PhysicalDeviceType::INTEGRATED_GPU,
        vk::PhysicalDeviceType::CPU,
    ] {
        for max_dim in [0, 4096, 16384, u32::MAX] {
            let mut no_formats = gpu(1, device_type, Some(0), Some(0), max_dim);
            no_formats.surface.as_mut().unwrap().formats.clear();
            assert_eq!(no_formats.score(), 0);

            let mut no_modes = gpu(2, device_type, Some(0), Some(0), max_dim);
            no_modes.surface.as_mut().unwrap().present_modes.clear();
            assert_eq!(no_modes.score(), 0);

            assert!(matches!(
                select_best(vec![no_formats, no_modes]),
                Err(RenderError::NoSuitableDevice)
            ));
        }
    }
}

#[test]
fn equal_scores_pick_last_enumerated() {
    let candidates: Vec<_> = (1..=4)
        .map(|raw| gpu(raw, vk::PhysicalDeviceType::DISCRETE_GPU, Some(0), Some(0), 8192))
        .collect();

    let selected = select_best(candidates).unwrap();
    assert_eq!(selected.handle, vk::PhysicalDevice::from_raw(4));
}
