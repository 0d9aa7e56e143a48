//! Render pass, pipeline and framebuffers
//!
//! A single subpass renders into a single color attachment. The pipeline is
//! fixed-function apart from viewport and scissor, which are set while
//! recording each frame.

use ash::vk;

use crate::config::ShaderConfig;
use crate::error::{RenderError, RenderResult, VkResultExt};
use crate::render::shader::ShaderModule;

/// States set while recording instead of baked into the pipeline
pub const DYNAMIC_STATES: [vk::DynamicState; 2] = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];

/// The swapchain color attachment: cleared on load, kept on store, handed to
/// the presentation engine at the end of the pass
pub fn color_attachment(format: vk::Format) -> vk::AttachmentDescription {
    vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build()
}

/// Dependency on the implicit external subpass.
///
/// The layout transition at the start of the pass waits for the color output
/// stage, which is the stage the image-available semaphore is waited at.
pub fn subpass_dependency() -> vk::SubpassDependency {
    vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        .build()
}

/// Fill mode, back-face culling, clockwise front faces
pub fn rasterization_state() -> vk::PipelineRasterizationStateCreateInfo {
    vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::CLOCKWISE)
        .depth_bias_enable(false)
        .build()
}

/// Blending disabled, every channel written
pub fn color_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false)
        .build()
}

/// Create the single-subpass render pass
pub fn create_render_pass(device: &ash::Device, color_format: vk::Format) -> RenderResult<vk::RenderPass> {
    let attachments = [color_attachment(color_format)];

    let color_attachment_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let subpasses = [vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_attachment_refs)
        .build()];

    let dependencies = [subpass_dependency()];

    let create_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe { device.create_render_pass(&create_info, None) }.or_api("vkCreateRenderPass")
}

/// Create a pipeline layout with no descriptor sets and no push constants
pub fn create_pipeline_layout(device: &ash::Device) -> RenderResult<vk::PipelineLayout> {
    let create_info = vk::PipelineLayoutCreateInfo::builder();
    unsafe { device.create_pipeline_layout(&create_info, None) }.or_api("vkCreatePipelineLayout")
}

/// Build the triangle pipeline from the two SPIR-V stages in `shaders`.
///
/// The shader modules are dropped, and so destroyed, before this returns.
pub fn create_graphics_pipeline(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
    shaders: &ShaderConfig,
) -> RenderResult<vk::Pipeline> {
    log::debug!(
        "Loading shaders {} and {}",
        shaders.vertex_shader_path,
        shaders.fragment_shader_path
    );
    let vertex_shader = ShaderModule::from_file(device, &shaders.vertex_shader_path)?;
    let fragment_shader = ShaderModule::from_file(device, &shaders.fragment_shader_path)?;

    let shader_stages = [
        vertex_shader.stage_info(vk::ShaderStageFlags::VERTEX),
        fragment_shader.stage_info(vk::ShaderStageFlags::FRAGMENT),
    ];

    // Vertices are generated in the vertex shader
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder();

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);

    let rasterizer = rasterization_state();

    let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let color_blend_attachments = [color_blend_attachment()];
    let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .attachments(&color_blend_attachments);

    let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&DYNAMIC_STATES);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipelines = unsafe { device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None) }
        .map_err(|(_, result)| RenderError::ApiCall {
            operation: "vkCreateGraphicsPipelines",
            result,
        })?;

    pipelines.into_iter().next().ok_or(RenderError::ApiCall {
        operation: "vkCreateGraphicsPipelines",
        result: vk::Result::ERROR_UNKNOWN,
    })
}

/// Create one framebuffer per image view, sized to `extent`.
///
/// On failure the framebuffers created so far are destroyed before returning.
pub fn create_framebuffers(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    image_views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> RenderResult<Vec<vk::Framebuffer>> {
    let mut framebuffers = Vec::with_capacity(image_views.len());

    for &view in image_views {
        let attachments = [view];
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        match unsafe { device.create_framebuffer(&create_info, None) } {
            Ok(framebuffer) => framebuffers.push(framebuffer),
            Err(result) => {
                for framebuffer in framebuffers {
                    unsafe { device.destroy_framebuffer(framebuffer, None) };
                }
                return Err(RenderError::ApiCall {
                    operation: "vkCreateFramebuffer",
                    result,
                });
            }
        }
    }

    Ok(framebuffers)
}
