//! Graphics pipeline construction.

use crate::error::{GpuError, Result};
use ash::vk;

/// Shader stages and fixed-function state for one graphics pipeline.
///
/// A config is a plain value: clone one and swap fields to derive pipeline
/// variants. Building reads the config without consuming it, so the same
/// value can build any number of pipelines.
#[derive(Clone)]
pub struct PipelineConfig {
    pub vertex_shader: Vec<u32>,
    pub fragment_shader: Vec<u32>,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub topology: vk::PrimitiveTopology,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: vk::CompareOp,
    /// Fixed viewport and scissor extent; the swapchain never resizes.
    pub extent: vk::Extent2D,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vertex_shader: Vec::new(),
            fragment_shader: Vec::new(),
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            depth_test: true,
            depth_write: true,
            depth_compare: vk::CompareOp::LESS_OR_EQUAL,
            extent: vk::Extent2D {
                width: 0,
                height: 0,
            },
        }
    }
}

impl PipelineConfig {
    /// Check that the config describes a buildable pipeline.
    ///
    /// Both shader stages are mandatory; there is no fallback shader.
    pub fn validate(&self) -> Result<()> {
        if self.vertex_shader.is_empty() {
            return Err(GpuError::PipelineCreation(
                "missing vertex shader stage".to_string(),
            ));
        }
        if self.fragment_shader.is_empty() {
            return Err(GpuError::PipelineCreation(
                "missing fragment shader stage".to_string(),
            ));
        }
        if self.extent.width == 0 || self.extent.height == 0 {
            return Err(GpuError::PipelineCreation(
                "viewport extent is zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Build a graphics pipeline against subpass 0 of `render_pass`.
    ///
    /// The shader modules exist only for the duration of this call; they are
    /// destroyed whether or not pipeline creation succeeds.
    ///
    /// # Safety
    /// The device, layout, and render pass must be valid, and the shader
    /// words must be valid SPIR-V.
    pub unsafe fn build(
        &self,
        device: &ash::Device,
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
    ) -> Result<vk::Pipeline> {
        self.validate()?;

        let vert_module = create_shader_module(device, &self.vertex_shader, "vertex")?;
        let frag_module = match create_shader_module(device, &self.fragment_shader, "fragment") {
            Ok(module) => module,
            Err(e) => {
                device.destroy_shader_module(vert_module, None);
                return Err(e);
            }
        };

        // Shader stages
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert_module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag_module)
                .name(c"main"),
        ];

        // Vertex input
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);

        // Input assembly
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(self.topology)
            .primitive_restart_enable(false);

        // One fixed viewport and scissor covering the whole target
        let viewports = [vk::Viewport::default()
            .x(0.0)
            .y(0.0)
            .width(self.extent.width as f32)
            .height(self.extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0)];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent: self.extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        // Rasterization
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(self.polygon_mode)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face)
            .depth_bias_enable(false)
            .line_width(1.0);

        // Single sample per pixel
        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false);

        // Depth test per config, stencil off
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_write)
            .depth_compare_op(self.depth_compare)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        // Color blending (single attachment, no blending)
        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)];

        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let result =
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None);

        // Modules are compiled into the pipeline; drop them on both paths
        device.destroy_shader_module(vert_module, None);
        device.destroy_shader_module(frag_module, None);

        let pipelines =
            result.map_err(|(_pipelines, e)| GpuError::PipelineCreation(e.to_string()))?;

        Ok(pipelines[0])
    }
}

/// Create a shader module from SPIR-V words.
///
/// # Safety
/// `code` must hold well-formed SPIR-V words.
unsafe fn create_shader_module(
    device: &ash::Device,
    code: &[u32],
    stage: &str,
) -> Result<vk::ShaderModule> {
    let shader_info = vk::ShaderModuleCreateInfo::default().code(code);
    device
        .create_shader_module(&shader_info, None)
        .map_err(|e| GpuError::ShaderCompilation(format!("{stage} stage: {e}")))
}

/// Create a pipeline layout with the given push constant ranges and no
/// descriptor sets.
///
/// # Safety
/// The ranges must fit within the device's push constant limit.
pub unsafe fn create_pipeline_layout(
    device: &ash::Device,
    push_constant_ranges: &[vk::PushConstantRange],
) -> Result<vk::PipelineLayout> {
    let layout_info =
        vk::PipelineLayoutCreateInfo::default().push_constant_ranges(push_constant_ranges);

    let layout = device
        .create_pipeline_layout(&layout_info, None)
        .map_err(|e| GpuError::PipelineCreation(e.to_string()))?;

    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_config() -> PipelineConfig {
        PipelineConfig {
            vertex_shader: vec![0x0723_0203],
            fragment_shader: vec![0x0723_0203],
            extent: vk::Extent2D {
                width: 1700,
                height: 900,
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(complete_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_vertex_stage() {
        let config = PipelineConfig {
            vertex_shader: Vec::new(),
            ..complete_config()
        };
        assert!(matches!(
            config.validate(),
            Err(GpuError::PipelineCreation(_))
        ));
    }

    #[test]
    fn validate_rejects_missing_fragment_stage() {
        let config = PipelineConfig {
            fragment_shader: Vec::new(),
            ..complete_config()
        };
        assert!(matches!(
            config.validate(),
            Err(GpuError::PipelineCreation(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_extent() {
        let config = PipelineConfig {
            extent: vk::Extent2D {
                width: 0,
                height: 0,
            },
            ..complete_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn defaults_describe_an_unculled_filled_triangle_list() {
        let config = PipelineConfig::default();
        assert_eq!(config.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(config.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(config.cull_mode, vk::CullModeFlags::NONE);
        assert_eq!(config.depth_compare, vk::CompareOp::LESS_OR_EQUAL);
        assert!(config.depth_test);
        assert!(config.depth_write);
    }

    #[test]
    fn cloned_config_builds_variants_independently() {
        let base = complete_config();
        let mut red = base.clone();
        red.fragment_shader = vec![0x0723_0203, 0];

        assert_eq!(base.fragment_shader.len(), 1);
        assert_eq!(red.fragment_shader.len(), 2);
        assert!(red.validate().is_ok());
    }
}
