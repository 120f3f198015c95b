//! Engine core: initialization, the per-frame loop, and teardown.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use aster_gpu::command::{record_frame, submit_frame, CommandPool};
use aster_gpu::pipeline::create_pipeline_layout;
use aster_gpu::release::{ReleaseAction, ReleaseContext, ReleaseLedger};
use aster_gpu::render_pass::{
    create_depth_view, create_framebuffers, create_render_pass, depth_image_info,
};
use aster_gpu::swapchain::{calculate_extent, select_surface_format};
use aster_gpu::sync::{FrameSync, FRAME_TIMEOUT_NS};
use aster_gpu::{
    DeviceAllocator, DeviceContext, DeviceContextBuilder, GpuError, PipelineConfig, Placement,
    SurfaceContext, Swapchain,
};
use aster_render::transform::MeshPushConstants;
use aster_render::{load_spirv, obj, Mesh, RenderError, Vertex};
use tracing::{debug, error, info, warn};
use winit::window::Window;

use crate::config::EngineConfig;
use crate::frame::{clear_color, FramePhase};

/// Which of the three built pipelines draws the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    /// Mesh pipeline: vertex input, push constants, depth test.
    Mesh,
    /// Hardcoded colored triangle, no vertex input.
    ColoredTriangle,
    /// Hardcoded red triangle, no vertex input.
    RedTriangle,
}

impl PipelineKind {
    /// The next pipeline in the cycle.
    pub fn next(self) -> Self {
        match self {
            Self::Mesh => Self::ColoredTriangle,
            Self::ColoredTriangle => Self::RedTriangle,
            Self::RedTriangle => Self::Mesh,
        }
    }
}

/// The three graphics pipelines, sharing one render pass.
struct Pipelines {
    triangle: vk::Pipeline,
    red: vk::Pipeline,
    mesh: vk::Pipeline,
    mesh_layout: vk::PipelineLayout,
}

/// Device-bound state created by [`Engine::init`].
///
/// Teardown goes through [`Engine::cleanup`], which drains the ledger. The
/// allocator is declared before `device` so that on the fallback drop path
/// its memory blocks are returned while the device is still alive; `device`
/// stays last.
struct EngineState {
    window: Arc<Window>,
    surface: SurfaceContext,
    ledger: ReleaseLedger<ReleaseAction>,
    allocator: DeviceAllocator,
    swapchain: Swapchain,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    command_buffer: vk::CommandBuffer,
    sync: FrameSync,
    pipelines: Pipelines,
    triangle_mesh: Mesh,
    obj_mesh: Option<Mesh>,
    device: DeviceContext,
}

/// The rendering engine: one window, one device, one frame in flight.
///
/// Construction is cheap; all device work happens in [`Engine::init`]. The
/// frame loop is a strict sequence of wait, acquire, record, submit,
/// present, tracked by a [`FramePhase`] value.
pub struct Engine {
    config: EngineConfig,
    state: Option<EngineState>,
    frame_number: u64,
    phase: FramePhase,
    selected: PipelineKind,
}

impl Engine {
    /// Create an engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: None,
            frame_number: 0,
            phase: FramePhase::Idle,
            selected: PipelineKind::Mesh,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether [`Engine::init`] has completed.
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Number of frames rendered so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// The window, once [`Engine::init`] has run.
    pub fn window(&self) -> Option<&Window> {
        self.state.as_ref().map(|state| state.window.as_ref())
    }

    /// Currently selected pipeline.
    pub fn selected_pipeline(&self) -> PipelineKind {
        self.selected
    }

    /// Cycle to the next pipeline: mesh, colored triangle, red triangle.
    pub fn cycle_pipeline(&mut self) {
        self.selected = self.selected.next();
        info!("Selected pipeline: {:?}", self.selected);
    }

    /// Bring up the device, swapchain, pipelines, and meshes for `window`.
    ///
    /// A second call is a no-op; the engine stays bound to its first window.
    pub fn init(&mut self, window: Arc<Window>) -> anyhow::Result<()> {
        if self.state.is_some() {
            debug!("Engine already initialized; ignoring");
            return Ok(());
        }

        let device = DeviceContextBuilder::new()
            .app_name(&self.config.title)
            .validation(self.config.validation)
            .build()?;

        // SAFETY: the window is kept alive in the engine state, so it
        // outlives the surface
        let surface = unsafe { SurfaceContext::new(&device, window.as_ref())? };

        let mut allocator = unsafe {
            DeviceAllocator::new(
                device.instance(),
                device.shared_device(),
                device.physical_device(),
            )?
        };

        let mut ledger = ReleaseLedger::new();

        // Swapchain and its image views
        let support = surface.support(&device)?;
        let surface_format = select_surface_format(&support.formats);
        let extent = calculate_extent(&support.capabilities, self.config.width, self.config.height);

        let swapchain = unsafe {
            Swapchain::new(
                device.device(),
                &surface.swapchain_loader,
                surface.surface,
                &support.capabilities,
                surface_format,
                extent,
                device.graphics_queue_family(),
            )?
        };
        ledger.register(ReleaseAction::Swapchain(swapchain.swapchain));
        for &view in &swapchain.image_views {
            ledger.register(ReleaseAction::ImageView(view));
        }

        // Depth attachment shared by every framebuffer
        let depth_image = allocator.create_image(
            &mut ledger,
            &depth_image_info(extent),
            Placement::DeviceLocal,
            "depth attachment",
        )?;
        let depth_view = unsafe { create_depth_view(device.device(), depth_image)? };
        ledger.register(ReleaseAction::ImageView(depth_view));

        // Render pass and one framebuffer per swapchain image
        let render_pass = unsafe { create_render_pass(device.device(), swapchain.format)? };
        ledger.register(ReleaseAction::RenderPass(render_pass));

        let framebuffers = unsafe {
            create_framebuffers(
                device.device(),
                render_pass,
                &swapchain.image_views,
                depth_view,
                extent,
            )?
        };
        for &framebuffer in &framebuffers {
            ledger.register(ReleaseAction::Framebuffer(framebuffer));
        }

        // Command pool and the single primary command buffer
        let command_pool =
            unsafe { CommandPool::new(device.device(), device.graphics_queue_family())? };
        ledger.register(ReleaseAction::CommandPool(command_pool.handle()));

        let command_buffer = unsafe { command_pool.allocate_primary(device.device())? };

        // Frame synchronization
        let sync = unsafe { FrameSync::new(device.device())? };
        ledger.register(ReleaseAction::Semaphore(sync.image_acquired));
        ledger.register(ReleaseAction::Semaphore(sync.render_finished));
        ledger.register(ReleaseAction::Fence(sync.in_flight));

        let pipelines = build_pipelines(
            device.device(),
            &mut ledger,
            render_pass,
            extent,
            &self.config.shader_dir,
        )?;

        let (triangle_mesh, obj_mesh) = load_meshes(&self.config, &mut allocator, &mut ledger)?;

        info!("Engine initialized: {}x{}", extent.width, extent.height);

        self.state = Some(EngineState {
            window,
            surface,
            ledger,
            allocator,
            swapchain,
            render_pass,
            framebuffers,
            command_buffer,
            sync,
            pipelines,
            triangle_mesh,
            obj_mesh,
            device,
        });
        Ok(())
    }

    /// Render one frame and present it.
    ///
    /// Before `init` this is a no-op. Every device failure and every
    /// bounded wait that expires propagates out; there is no retry, and
    /// after a failed frame the phase is left mid-cycle so the next `draw`
    /// fails fast instead of submitting on top of unknown state.
    pub fn draw(&mut self) -> anyhow::Result<()> {
        let Some(state) = self.state.as_ref() else {
            return Ok(());
        };

        // Resolve the selected pipeline's draw data before touching the GPU
        let (pipeline, mesh_draw) = match self.selected {
            PipelineKind::Mesh => {
                let mesh = state.obj_mesh.as_ref().unwrap_or(&state.triangle_mesh);
                let buffer = mesh.buffer().ok_or_else(|| {
                    GpuError::InvalidState("mesh pipeline selected but no mesh uploaded".to_string())
                })?;
                (state.pipelines.mesh, Some((buffer, mesh.vertex_count())))
            }
            PipelineKind::ColoredTriangle => (state.pipelines.triangle, None),
            PipelineKind::RedTriangle => (state.pipelines.red, None),
        };

        let device = state.device.device();

        // Wait for the previous frame, bounded; reset only after the wait
        // succeeds
        unsafe {
            state.sync.wait(device)?;
            state.sync.reset(device)?;
        }
        self.phase.advance(FramePhase::Acquiring)?;

        let (image_index, _suboptimal) = unsafe {
            state.swapchain.acquire_next_image(
                &state.surface.swapchain_loader,
                state.sync.image_acquired,
                FRAME_TIMEOUT_NS,
            )?
        };
        self.phase.advance(FramePhase::Recording)?;

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color(self.frame_number),
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let pass_begin = vk::RenderPassBeginInfo::default()
            .render_pass(state.render_pass)
            .framebuffer(state.framebuffers[image_index as usize])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: state.swapchain.extent,
            })
            .clear_values(&clear_values);

        let frame_number = self.frame_number;
        unsafe {
            record_frame(device, state.command_buffer, |cmd| unsafe {
                device.cmd_begin_render_pass(cmd, &pass_begin, vk::SubpassContents::INLINE);
                device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);

                if let Some((buffer, vertex_count)) = mesh_draw {
                    device.cmd_bind_vertex_buffers(cmd, 0, &[buffer], &[0]);

                    let extent = state.swapchain.extent;
                    let aspect = extent.width as f32 / extent.height as f32;
                    let push = MeshPushConstants::for_frame(frame_number, aspect);
                    device.cmd_push_constants(
                        cmd,
                        state.pipelines.mesh_layout,
                        vk::ShaderStageFlags::VERTEX,
                        0,
                        bytemuck::bytes_of(&push),
                    );

                    device.cmd_draw(cmd, vertex_count, 1, 0, 0);
                } else {
                    device.cmd_draw(cmd, 3, 1, 0, 0);
                }

                device.cmd_end_render_pass(cmd);
            })?;
        }

        // The clear cannot start until the acquired image is actually ready
        unsafe {
            submit_frame(
                device,
                state.device.graphics_queue(),
                state.command_buffer,
                state.sync.image_acquired,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                state.sync.render_finished,
                state.sync.in_flight,
            )?;
        }
        self.phase.advance(FramePhase::Submitted)?;

        unsafe {
            state.swapchain.present(
                &state.surface.swapchain_loader,
                state.device.graphics_queue(),
                image_index,
                &[state.sync.render_finished],
            )?;
        }
        self.phase.advance(FramePhase::Presenting)?;

        self.frame_number += 1;
        self.phase.advance(FramePhase::Idle)?;
        Ok(())
    }

    /// Tear down all device state.
    ///
    /// Waits for the frame in flight (bounded), then drains the release
    /// ledger in reverse creation order. A call before `init`, or a second
    /// call, is a no-op.
    pub fn cleanup(&mut self) {
        let Some(mut state) = self.state.take() else {
            debug!("Cleanup skipped; engine not initialized");
            return;
        };

        info!("Starting cleanup after {} frames", self.frame_number);

        unsafe {
            if let Err(e) = state.sync.wait(state.device.device()) {
                warn!("Frame fence wait during cleanup failed: {e}");
            }
        }
        if let Err(e) = state.device.wait_idle() {
            error!("Device idle wait failed: {e}");
        }

        {
            let mut cx = ReleaseContext {
                device: state.device.device(),
                swapchain_loader: &state.surface.swapchain_loader,
                allocator: &mut state.allocator,
            };
            // SAFETY: the device is idle, so nothing in the ledger is still
            // in use
            state
                .ledger
                .drain(|action| unsafe { action.execute(&mut cx) });
        }

        state.allocator.shutdown();

        // SAFETY: the swapchain that used the surface is already gone
        unsafe { state.surface.destroy() };

        info!("Cleanup finished");
        // The device context drops last, destroying device and instance
    }
}

/// Load the five shader modules and build the three pipelines.
///
/// Every variant is a field-for-field clone of one base config; the base
/// builds the colored triangle, the clones swap shaders and vertex input.
fn build_pipelines(
    device: &ash::Device,
    ledger: &mut ReleaseLedger<ReleaseAction>,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    shader_dir: &Path,
) -> anyhow::Result<Pipelines> {
    let colored_vert = load_spirv(&shader_dir.join("colored_triangle.vert.spv"))?;
    let colored_frag = load_spirv(&shader_dir.join("colored_triangle.frag.spv"))?;
    let red_vert = load_spirv(&shader_dir.join("red_triangle.vert.spv"))?;
    let red_frag = load_spirv(&shader_dir.join("red_triangle.frag.spv"))?;
    let mesh_vert = load_spirv(&shader_dir.join("tri_mesh.vert.spv"))?;

    let triangle_layout = unsafe { create_pipeline_layout(device, &[])? };
    ledger.register(ReleaseAction::PipelineLayout(triangle_layout));

    let push_range = vk::PushConstantRange::default()
        .stage_flags(vk::ShaderStageFlags::VERTEX)
        .offset(0)
        .size(std::mem::size_of::<MeshPushConstants>() as u32);
    let mesh_layout =
        unsafe { create_pipeline_layout(device, std::slice::from_ref(&push_range))? };
    ledger.register(ReleaseAction::PipelineLayout(mesh_layout));

    let base = PipelineConfig {
        vertex_shader: colored_vert,
        fragment_shader: colored_frag,
        extent,
        ..PipelineConfig::default()
    };

    let triangle = unsafe { base.build(device, triangle_layout, render_pass)? };
    ledger.register(ReleaseAction::Pipeline(triangle));

    let mut red_config = base.clone();
    red_config.vertex_shader = red_vert;
    red_config.fragment_shader = red_frag;
    let red = unsafe { red_config.build(device, triangle_layout, render_pass)? };
    ledger.register(ReleaseAction::Pipeline(red));

    // The mesh pipeline keeps the colored fragment stage; color comes in
    // through the vertex attributes
    let mut mesh_config = base.clone();
    mesh_config.vertex_shader = mesh_vert;
    mesh_config.vertex_bindings = vec![Vertex::binding_description()];
    mesh_config.vertex_attributes = Vertex::attribute_descriptions().to_vec();
    let mesh = unsafe { mesh_config.build(device, mesh_layout, render_pass)? };
    ledger.register(ReleaseAction::Pipeline(mesh));

    info!("Created graphics pipelines");

    Ok(Pipelines {
        triangle,
        red,
        mesh,
        mesh_layout,
    })
}

/// Upload the builtin triangle, plus the configured OBJ mesh when it loads.
///
/// A missing or unreadable OBJ is not fatal: the engine logs a warning and
/// the mesh pipeline falls back to the triangle.
fn load_meshes(
    config: &EngineConfig,
    allocator: &mut DeviceAllocator,
    ledger: &mut ReleaseLedger<ReleaseAction>,
) -> anyhow::Result<(Mesh, Option<Mesh>)> {
    let mut triangle = Mesh::triangle();
    triangle.upload(allocator, ledger)?;

    let Some(path) = &config.mesh_path else {
        return Ok((triangle, None));
    };

    // Upload decides whether the loaded data is usable; an empty or
    // unreadable file falls back to the builtin triangle.
    let obj_mesh = match obj::load_vertices(path) {
        Ok(vertices) => {
            let mut mesh = Mesh::new(vertices);
            match mesh.upload(allocator, ledger) {
                Ok(()) => {
                    info!(
                        "Loaded mesh {} ({} vertices)",
                        path.display(),
                        mesh.vertex_count()
                    );
                    Some(mesh)
                }
                Err(RenderError::EmptyMesh) => {
                    warn!(
                        "Mesh {} has no vertices; using the builtin triangle",
                        path.display()
                    );
                    None
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(e) => {
            warn!("Failed to load mesh {}: {e}", path.display());
            None
        }
    };

    Ok((triangle, obj_mesh))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_cycle_wraps_around() {
        let mut kind = PipelineKind::Mesh;

        kind = kind.next();
        assert_eq!(kind, PipelineKind::ColoredTriangle);
        kind = kind.next();
        assert_eq!(kind, PipelineKind::RedTriangle);
        kind = kind.next();
        assert_eq!(kind, PipelineKind::Mesh);
    }

    #[test]
    fn new_engine_starts_idle_on_the_mesh_pipeline() {
        let engine = Engine::new(EngineConfig::default());

        assert!(!engine.is_initialized());
        assert_eq!(engine.frame_number(), 0);
        assert_eq!(engine.selected_pipeline(), PipelineKind::Mesh);
        assert!(engine.window().is_none());
    }

    #[test]
    fn draw_before_init_is_a_no_op() {
        let mut engine = Engine::new(EngineConfig::default());

        engine.draw().unwrap();

        assert_eq!(engine.frame_number(), 0);
    }

    #[test]
    fn cleanup_before_init_is_a_no_op() {
        let mut engine = Engine::new(EngineConfig::default());

        engine.cleanup();
        engine.cleanup();

        assert!(!engine.is_initialized());
    }

    #[test]
    fn cycling_visits_every_pipeline() {
        let mut engine = Engine::new(EngineConfig::default());

        engine.cycle_pipeline();
        assert_eq!(engine.selected_pipeline(), PipelineKind::ColoredTriangle);
        engine.cycle_pipeline();
        assert_eq!(engine.selected_pipeline(), PipelineKind::RedTriangle);
        engine.cycle_pipeline();
        assert_eq!(engine.selected_pipeline(), PipelineKind::Mesh);
    }
}
