// vkmarch - minimal compute-then-draw Vulkan renderer
//
// Startup: a compute pass on the compute queue fills a vertex buffer once,
// ownership of that buffer moves to the graphics queue through a
// release/acquire barrier pair, and one command buffer per swapchain image
// is recorded up front.
//
// Frame loop (single thread, GPU async):
//   poll input -> present pre-recorded frame -> integrate camera -> upload uniforms
//
// Every GPU failure, at setup or mid-loop, is fatal by design. The only
// cancellation point is "stop after this iteration" via the quit path.

mod backend;
mod camera;
mod config;
mod frame;
mod input;
mod recorder;

use anyhow::{Context, Result};
use ash::vk;
use backend::{buffer, pipeline, shader, sync::FrameSync, transfer};
use backend::{ComputeGrid, Swapchain, VulkanDevice};
use camera::{CameraState, Uniforms};
use config::Config;
use frame::{FrameTimer, LoopControl};
use glam::Mat4;
use input::InputState;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use recorder::{DrawCall, ScenePass};
use std::process::ExitCode;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{CursorGrabMode, Fullscreen, Window, WindowAttributes},
};

/// Geometry-generation dispatch dimensions; each invocation emits up to
/// 15 vertices (5 triangles) into its slice of the vertex buffer.
const COMPUTE_GRID: ComputeGrid = ComputeGrid {
    width: 32,
    height: 32,
    depth: 32,
    verts_per_invocation: 15,
};

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = Config::load();
    log::info!("Starting vkmarch");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen {
            "fullscreen"
        } else {
            "windowed"
        }
    );

    match run(config) {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            log::error!("Fatal: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> Result<i32> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    if let Some(e) = app.fatal.take() {
        return Err(e);
    }
    Ok(app.control.exit_code())
}

// =============================================================================
// APPLICATION
// =============================================================================

struct App {
    config: Config,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,

    input: InputState,
    camera: CameraState,
    /// Uniform record for the frame being presented; refreshed after each
    /// camera integration and consumed by the next upload.
    uniforms: Uniforms,

    control: LoopControl,
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            window: None,
            renderer: None,
            input: InputState::new(),
            camera: CameraState::new(),
            uniforms: bytemuck::Zeroable::zeroed(),
            control: LoopControl::Running,
            fatal: None,
        }
    }

    fn abort(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        log::error!("{:#}", e);
        self.fatal = Some(e);
        self.control.stop(1);
        event_loop.exit();
    }

    /// One loop iteration: present, measure, integrate, upload.
    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        if self.control.is_stopped() {
            return;
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        let timer = FrameTimer::start();

        if let Err(e) = renderer.render_frame(&self.uniforms) {
            let e = e.context("Frame presentation failed");
            self.abort(event_loop, e);
            return;
        }

        // The time just measured drives this frame's movement delta; the
        // one-frame latency is invisible for continuous motion.
        let frame_time = timer.elapsed_secs();
        let move_delta = self.config.controls.move_speed * frame_time;

        let snapshot = self.input.snapshot();
        self.camera
            .update(&snapshot, move_delta, self.config.controls.mouse_sensitivity);
        self.uniforms = self.camera.uniforms(renderer.proj);

        // The per-image path uploads inside render_frame instead, after the
        // frame fence, so the write cannot land under an in-flight read.
        if !renderer.per_image_uniforms {
            if let Err(e) = renderer.write_shared_uniforms(&self.uniforms) {
                self.abort(event_loop, e);
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));
        if self.config.window.fullscreen {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop.create_window(attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                self.abort(event_loop, anyhow::Error::new(e).context("Could not create window"));
                return;
            }
        };

        window.set_cursor_visible(false);
        // Grab is best-effort; some platforms refuse it
        let _ = window.set_cursor_grab(CursorGrabMode::Confined);

        match Renderer::new(&window, &self.config) {
            Ok(renderer) => {
                self.uniforms = self.camera.uniforms(renderer.proj);
                if let Err(e) = renderer.write_all_uniforms(&self.uniforms) {
                    self.abort(event_loop, e);
                    return;
                }
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => {
                self.abort(event_loop, e.context("Renderer initialization failed"));
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down");
                self.control.stop(0);
                event_loop.exit();
            }

            WindowEvent::RedrawRequested => {
                self.frame(event_loop);
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if let PhysicalKey::Code(key) = event.physical_key {
                    let pressed = event.state.is_pressed();
                    if key == KeyCode::Escape && pressed {
                        log::info!("ESC pressed, exiting");
                        self.control.stop(0);
                        event_loop.exit();
                    } else {
                        self.input.handle_key(key, pressed);
                    }
                }
            }

            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.input.accumulate_mouse(dx, dy);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

// =============================================================================
// RENDERER
// =============================================================================

/// Owns every GPU resource. Created once in `resumed`; the geometry buffer
/// is generated and handed to the graphics queue before this constructor
/// returns, and the command buffers it records are resubmitted unchanged
/// every frame.
struct Renderer {
    device: Arc<VulkanDevice>,
    surface_loader: ash::extensions::khr::Surface,
    surface: vk::SurfaceKHR,
    swapchain: Option<Swapchain>,

    depth_image: vk::Image,
    depth_memory: vk::DeviceMemory,
    depth_view: vk::ImageView,

    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,

    scene_pipeline: vk::Pipeline,
    scene_pipeline_layout: vk::PipelineLayout,

    descriptor_pool: vk::DescriptorPool,
    uniform_set_layout: vk::DescriptorSetLayout,
    storage_set_layout: vk::DescriptorSetLayout,
    uniform_sets: Vec<vk::DescriptorSet>,
    uniform_buffers: Vec<(vk::Buffer, vk::DeviceMemory)>,

    geometry_buffer: vk::Buffer,
    geometry_memory: vk::DeviceMemory,

    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,

    frame_sync: Vec<FrameSync>,
    current_frame: usize,
    wait_stages: [vk::PipelineStageFlags; 1],

    per_image_uniforms: bool,
    proj: Mat4,
}

impl Renderer {
    fn new(window: &Window, config: &Config) -> Result<Self> {
        let display_handle = window.raw_display_handle();
        let window_handle = window.raw_window_handle();

        // ── Device, surface, swapchain ──────────────────────────────────
        let enable_validation = cfg!(debug_assertions) && config.debug.validation_layers;
        let device = VulkanDevice::new(&config.window.title, enable_validation, display_handle)?;

        let surface_loader =
            ash::extensions::khr::Surface::new(&device.entry, &device.instance);
        let surface = unsafe {
            ash_window::create_surface(
                &device.entry,
                &device.instance,
                display_handle,
                window_handle,
                None,
            )
            .context("Could not create surface")?
        };

        let surface_support = unsafe {
            surface_loader.get_physical_device_surface_support(
                device.physical_device,
                device.graphics_queue_family,
                surface,
            )?
        };
        if !surface_support {
            anyhow::bail!("GPU doesn't support presenting to this surface");
        }

        let size = window.inner_size();
        let swapchain = Swapchain::new(
            device.clone(),
            surface,
            &surface_loader,
            size.width,
            size.height,
            config.get_present_mode(),
        )?;
        let image_count = swapchain.images.len();

        let (depth_image, depth_memory, depth_view) =
            buffer::create_depth_buffer(&device, swapchain.extent)?;

        let render_pass = pipeline::create_render_pass(&device, swapchain.format)?;
        let framebuffers = pipeline::create_framebuffers(
            &device,
            &swapchain.image_views,
            depth_view,
            render_pass,
            swapchain.extent,
        )?;

        // ── Descriptors ─────────────────────────────────────────────────
        let per_image_uniforms = config.graphics.per_image_uniforms;
        let uniform_count = if per_image_uniforms { image_count } else { 1 };

        let storage_set_layout = pipeline::create_descriptor_set_layout(
            &device,
            vk::DescriptorType::STORAGE_BUFFER,
            vk::ShaderStageFlags::COMPUTE,
        )?;
        let uniform_set_layout = pipeline::create_descriptor_set_layout(
            &device,
            vk::DescriptorType::UNIFORM_BUFFER,
            vk::ShaderStageFlags::VERTEX,
        )?;
        let descriptor_pool = pipeline::create_descriptor_pool(&device, uniform_count as u32)?;

        // ── Generate geometry on the compute queue ──────────────────────
        let (geometry_buffer, geometry_memory) =
            buffer::create_geometry_buffer(&device, COMPUTE_GRID.buffer_size())?;

        let storage_set =
            pipeline::allocate_descriptor_set(&device, descriptor_pool, storage_set_layout)?;
        pipeline::update_buffer_descriptor(
            &device,
            storage_set,
            0,
            vk::DescriptorType::STORAGE_BUFFER,
            geometry_buffer,
        );

        let compute_shader = shader::load_shader_module(&device, "gen.comp")?;
        let (compute_pipeline, compute_layout) =
            pipeline::create_compute_pipeline(&device, compute_shader, storage_set_layout)?;

        backend::compute::dispatch(
            &device,
            compute_pipeline,
            compute_layout,
            storage_set,
            COMPUTE_GRID,
        )?;

        // Compute queue is idle here; hand the buffer to the graphics family
        transfer::transfer_buffer_ownership(&device, geometry_buffer)?;

        // The compute pipeline ran exactly once and is not needed again
        unsafe {
            device.device.destroy_pipeline(compute_pipeline, None);
            device.device.destroy_pipeline_layout(compute_layout, None);
            device.device.destroy_shader_module(compute_shader, None);
        }

        // ── Scene pipeline ──────────────────────────────────────────────
        let vert_shader = shader::load_shader_module(&device, "scene.vert")?;
        let frag_shader = shader::load_shader_module(&device, "scene.frag")?;

        let (scene_pipeline, scene_pipeline_layout) = pipeline::create_graphics_pipeline(
            &device,
            render_pass,
            swapchain.extent,
            vert_shader,
            frag_shader,
            uniform_set_layout,
            vk::CullModeFlags::NONE,
        )?;

        unsafe {
            device.device.destroy_shader_module(vert_shader, None);
            device.device.destroy_shader_module(frag_shader, None);
        }

        // ── Uniform buffers + sets ──────────────────────────────────────
        let uniform_size = std::mem::size_of::<Uniforms>() as vk::DeviceSize;
        let mut uniform_buffers = Vec::with_capacity(uniform_count);
        let mut uniform_sets = Vec::with_capacity(uniform_count);
        for _ in 0..uniform_count {
            let (buf, mem) = buffer::create_uniform_buffer(&device, uniform_size)?;
            let set =
                pipeline::allocate_descriptor_set(&device, descriptor_pool, uniform_set_layout)?;
            pipeline::update_buffer_descriptor(
                &device,
                set,
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                buf,
            );
            uniform_buffers.push((buf, mem));
            uniform_sets.push(set);
        }

        // ── Record the per-image command buffers, exactly once ──────────
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.graphics_queue_family);
        let command_pool = unsafe {
            device
                .device
                .create_command_pool(&pool_info, None)
                .context("Failed to create command pool")?
        };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(image_count as u32);
        let command_buffers = unsafe { device.device.allocate_command_buffers(&alloc_info)? };

        let scene = ScenePass {
            render_pass,
            extent: swapchain.extent,
            pipeline: scene_pipeline,
            pipeline_layout: scene_pipeline_layout,
            vertex_buffer: geometry_buffer,
            clear_color: config.graphics.clear_color,
        };
        recorder::record_command_buffers(
            &device,
            &scene,
            &framebuffers,
            &uniform_sets,
            &command_buffers,
            DrawCall::for_grid(&COMPUTE_GRID),
        )?;

        let frame_sync = FrameSync::create_set(&device, config.graphics.max_frames_in_flight)?;

        let proj = camera::projection(swapchain.extent.width, swapchain.extent.height);

        log::info!("Renderer initialized");

        Ok(Self {
            device,
            surface_loader,
            surface,
            swapchain: Some(swapchain),
            depth_image,
            depth_memory,
            depth_view,
            render_pass,
            framebuffers,
            scene_pipeline,
            scene_pipeline_layout,
            descriptor_pool,
            uniform_set_layout,
            storage_set_layout,
            uniform_sets,
            uniform_buffers,
            geometry_buffer,
            geometry_memory,
            command_pool,
            command_buffers,
            frame_sync,
            current_frame: 0,
            wait_stages: [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
            per_image_uniforms,
            proj,
        })
    }

    /// Present one frame using the pre-recorded command buffer for the
    /// acquired image.
    fn render_frame(&mut self, uniforms: &Uniforms) -> Result<()> {
        let swapchain = self.swapchain.as_ref().context("Swapchain missing")?;
        let sync = &self.frame_sync[self.current_frame];

        let image_index = swapchain.acquire_next_image(u64::MAX, sync.image_available)?;

        unsafe {
            self.device
                .device
                .wait_for_fences(&[sync.in_flight_fence], true, u64::MAX)?;
            self.device.device.reset_fences(&[sync.in_flight_fence])?;
        }

        if self.per_image_uniforms {
            let (_, memory) = self.uniform_buffers[image_index as usize];
            buffer::write_bytes(&self.device, memory, bytemuck::bytes_of(uniforms))?;
        }

        let cmd = self.command_buffers[image_index as usize];
        let wait_semaphores = [sync.image_available];
        let signal_semaphores = [sync.render_finished];
        let command_buffers = [cmd];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&self.wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .device
                .queue_submit(
                    self.device.graphics_queue,
                    &[submit_info.build()],
                    sync.in_flight_fence,
                )
                .context("Queue submission failed")?;
        }

        swapchain.present(
            self.device.graphics_queue,
            image_index,
            &[sync.render_finished],
        )?;

        self.current_frame = (self.current_frame + 1) % self.frame_sync.len();

        Ok(())
    }

    /// Single-buffer upload path. The GPU may still be reading this buffer
    /// for an in-flight frame; that overlap is a documented simplification,
    /// switched off by `graphics.per_image_uniforms`.
    fn write_shared_uniforms(&self, uniforms: &Uniforms) -> Result<()> {
        let (_, memory) = self.uniform_buffers[0];
        buffer::write_bytes(&self.device, memory, bytemuck::bytes_of(uniforms))
    }

    /// Seed every uniform buffer before the first frame
    fn write_all_uniforms(&self, uniforms: &Uniforms) -> Result<()> {
        for &(_, memory) in &self.uniform_buffers {
            buffer::write_bytes(&self.device, memory, bytemuck::bytes_of(uniforms))?;
        }
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources");

        let _ = self.device.wait_idle();

        unsafe {
            // Destroy in reverse order of creation
            for sync in &self.frame_sync {
                sync.destroy(&self.device.device);
            }

            self.device
                .device
                .destroy_command_pool(self.command_pool, None);

            for &(buf, mem) in &self.uniform_buffers {
                self.device.device.destroy_buffer(buf, None);
                self.device.device.free_memory(mem, None);
            }

            self.device.device.destroy_buffer(self.geometry_buffer, None);
            self.device.device.free_memory(self.geometry_memory, None);

            self.device
                .device
                .destroy_descriptor_pool(self.descriptor_pool, None);
            self.device
                .device
                .destroy_descriptor_set_layout(self.uniform_set_layout, None);
            self.device
                .device
                .destroy_descriptor_set_layout(self.storage_set_layout, None);

            self.device.device.destroy_pipeline(self.scene_pipeline, None);
            self.device
                .device
                .destroy_pipeline_layout(self.scene_pipeline_layout, None);

            for &fb in &self.framebuffers {
                self.device.device.destroy_framebuffer(fb, None);
            }
            self.device.device.destroy_render_pass(self.render_pass, None);

            self.device.device.destroy_image_view(self.depth_view, None);
            self.device.device.destroy_image(self.depth_image, None);
            self.device.device.free_memory(self.depth_memory, None);

            // Swapchain must go before the surface
            self.swapchain = None;
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
