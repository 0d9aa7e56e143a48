//! Swapchain parameter resolution

use ash::vk;
use triangle_engine::render::surface::{choose_extent, choose_image_count, choose_surface_format, PREFERRED_SURFACE_FORMAT};
use triangle_engine::render::{negotiate, SurfaceCapabilitySnapshot};

const FMT_A: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::R8G8B8A8_UNORM,
    color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
};

fn same(a: vk::SurfaceFormatKHR, b: vk::SurfaceFormatKHR) -> bool {
    a.format == b.format && a.color_space == b.color_space
}

#[test]
fn preferred_format_wins_regardless_of_order() {
    for formats in [[FMT_A, PREFERRED_SURFACE_FORMAT], [PREFERRED_SURFACE_FORMAT, FMT_A]] {
        let chosen = choose_surface_format(&formats).unwrap();
        assert!(same(chosen, PREFERRED_SURFACE_FORMAT));
    }
}

#[test]
fn first_format_used_when_preferred_absent() {
    let other = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    let chosen = choose_surface_format(&[FMT_A, other]).unwrap();
    assert!(same(chosen, FMT_A));
}

#[test]
fn image_count_examples() {
    assert_eq!(choose_image_count(2, 0), 3);
    assert_eq!(choose_image_count(2, 2), 2);
}

#[test]
fn image_count_always_within_bounds() {
    for min in 1..=8 {
        for max in 0..=10 {
            if max != 0 && max < min {
                continue;
            }
            let count = choose_image_count(min, max);
            assert!(count >= min, "min={min} max={max} count={count}");
            if max > 0 {
                assert!(count <= max, "min={min} max={max} count={count}");
            }
        }
    }
}

#[test]
fn defined_extent_is_passed_through_exactly() {
    let snapshot = SurfaceCapabilitySnapshot {
        current_extent: vk::Extent2D { width: 1280, height: 720 },
        min_image_extent: vk::Extent2D { width: 1, height: 1 },
        max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
        ..Default::default()
    };

    for framebuffer in [(0, 0), (800, 600), (10_000, 10_000)] {
        assert_eq!(
            choose_extent(&snapshot, framebuffer),
            vk::Extent2D { width: 1280, height: 720 }
        );
    }
}

#[test]
fn undefined_extent_stays_within_limits() {
    let snapshot = SurfaceCapabilitySnapshot {
        current_extent: vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        },
        min_image_extent: vk::Extent2D { width: 64, height: 32 },
        max_image_extent: vk::Extent2D { width: 2048, height: 1024 },
        ..Default::default()
    };

    for width in [0, 63, 64, 800, 2048, 5000] {
        for height in [0, 31, 32, 600, 1024, 5000] {
            let extent = choose_extent(&snapshot, (width, height));
            assert!((64..=2048).contains(&extent.width));
            assert!((32..=1024).contains(&extent.height));
            if (64..=2048).contains(&width) {
                assert_eq!(extent.width, width);
            }
        }
    }
}

#[test]
fn negotiation_prefers_mailbox() {
    let snapshot = SurfaceCapabilitySnapshot {
        min_image_count: 2,
        max_image_count: 2,
        current_extent: vk::Extent2D { width: 800, height: 600 },
        formats: vec![FMT_A],
        present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        ..Default::default()
    };

    let config = negotiate(&snapshot, (800, 600)).unwrap();
    assert!(same(config.surface_format, FMT_A));
    assert_eq!(config.present_mode, vk::PresentModeKHR::MAILBOX);
    assert_eq!(config.image_count, 2);
    assert_eq!(config.extent, vk::Extent2D { width: 800, height: 600 });
}

#[test]
fn negotiation_without_formats_fails() {
    let snapshot = SurfaceCapabilitySnapshot {
        present_modes: vec![vk::PresentModeKHR::FIFO],
        ..Default::default()
    };
    assert!(negotiate(&snapshot, (800, 600)).is_err());
}
