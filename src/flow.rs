//! Application event loop driving a [`SceneTree`].
//!
//! A "flow" owns the game logic around a scene: it builds the tree once the GPU
//! is ready, reacts to input and nudges nodes every frame. The engine owns the
//! tree itself, processes it and renders it.
//!
//! # User-facing types
//!
//! - [`SceneFlow`] is the trait for the logic driving one scene
//! - [`FlowConstructor`] builds a flow asynchronously, so shaders and meshes can
//!   be loaded before the first frame
//!
//! # Frame order
//!
//! Each redraw runs:
//! 1. Collect window/device events and hand them to the flow
//! 2. Call [`SceneFlow::on_update`] with the elapsed time
//! 3. Run [`SceneTree::process`] over the whole tree
//! 4. Render the tree (shadow pass, then main pass)
//! 5. Present frame

use std::{pin::Pin, sync::Arc};

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    context::{Context, ContextSettings, InitContext},
    data_structures::scene_graph::SceneTree,
    render::{FrameTarget, Renderer},
};

/// Logic driving one scene.
///
/// # Lifecycle
///
/// 1. `on_init()` is called once before the first frame; spawn nodes and pick
///    the current camera, light and fog here
/// 2. `on_window_events()` and `on_device_events()` receive every winit input event
/// 3. `on_update()` is called every frame before the tree is processed
pub trait SceneFlow {
    /// Build the scene. This is the only place with mutable access to the [`Context`].
    fn on_init(&mut self, ctx: &mut Context, tree: &mut SceneTree);

    /// Update state every frame with the elapsed time in seconds.
    fn on_update(&mut self, _ctx: &Context, _tree: &mut SceneTree, _dt: f64) {}

    /// Raw device input such as mouse motion.
    fn on_device_events(&mut self, _ctx: &Context, _tree: &mut SceneTree, _event: &DeviceEvent) {}

    /// Window input, seen before the engine reacts to resizes and redraws.
    fn on_window_events(&mut self, _ctx: &Context, _tree: &mut SceneTree, _event: &WindowEvent) {}
}

/// Builds a flow once the GPU handles exist.
pub type FlowConstructor =
    Box<dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = Box<dyn SceneFlow>>>>>;

/// GPU context, renderer and scene of a running app.
struct AppState {
    ctx: Context,
    renderer: Renderer,
    tree: SceneTree,
    is_surface_configured: bool,
}

impl AppState {
    async fn new(window: Arc<Window>, settings: ContextSettings) -> anyhow::Result<Self> {
        let ctx = Context::new(window, settings).await?;
        let renderer = Renderer::new(&ctx.device, ctx.config.format);
        Ok(Self {
            ctx,
            renderer,
            tree: SceneTree::new(),
            is_surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.ctx.resize(width, height) {
            self.is_surface_configured = true;
        }
    }

    fn render(&mut self) {
        self.ctx.window.request_redraw();

        // Nothing to draw into until the first resize configured the surface.
        if !self.is_surface_configured {
            return;
        }

        let output = match self.ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output) => output,
            wgpu::CurrentSurfaceTexture::Suboptimal(output) => {
                log::debug!("Surface is suboptimal, reconfiguring after this frame");
                self.is_surface_configured = false;
                output
            }
            wgpu::CurrentSurfaceTexture::Timeout | wgpu::CurrentSurfaceTexture::Occluded => {
                return;
            }
            wgpu::CurrentSurfaceTexture::Outdated | wgpu::CurrentSurfaceTexture::Lost => {
                let size = self.ctx.window.inner_size();
                self.resize(size.width, size.height);
                return;
            }
            wgpu::CurrentSurfaceTexture::Validation => {
                log::error!("Unable to acquire the next frame");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let target = FrameTarget {
            color: &view,
            depth: self.ctx.depth_view(),
            size: self.ctx.size(),
            clear_colour: self.ctx.settings.clear_colour,
        };
        self.renderer
            .render((&self.ctx).into(), &mut self.tree, &target);
        output.present();

        if !self.is_surface_configured {
            let (width, height) = self.ctx.size();
            self.resize(width, height);
        }
    }
}

struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    proxy: winit::event_loop::EventLoopProxy<FlowEvent>,
    settings: ContextSettings,
    state: Option<AppState>,
    flow: Option<Box<dyn SceneFlow>>,
    // Taken on the first `resumed`.
    constructor: Option<FlowConstructor>,
    last_time: Instant,
}

impl App {
    fn new(
        event_loop: &EventLoop<FlowEvent>,
        constructor: FlowConstructor,
        settings: ContextSettings,
    ) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy,
            settings,
            state: None,
            flow: None,
            constructor: Some(constructor),
            last_time: Instant::now(),
        })
    }

    fn start(&mut self, mut state: AppState, mut flow: Box<dyn SceneFlow>) {
        let size = state.ctx.window.inner_size();
        state.resize(size.width, size.height);
        flow.on_init(&mut state.ctx, &mut state.tree);
        log::info!("Scene initialized with {} nodes", state.tree.len());
        state.ctx.window.request_redraw();
        self.last_time = Instant::now();
        self.state = Some(state);
        self.flow = Some(flow);
    }
}

enum FlowEvent {
    #[allow(dead_code)]
    Initialized {
        state: AppState,
        flow: Box<dyn SceneFlow>,
    },
    #[allow(dead_code)]
    Failed(anyhow::Error),
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(constructor) = self.constructor.take() else {
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("scene-ngin");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID));
            match canvas {
                Some(canvas) => {
                    window_attributes = window_attributes.with_canvas(Some(canvas.unchecked_into()));
                }
                None => log::warn!("No element with id `{CANVAS_ID}`, winit creates its own canvas"),
            }
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Cannot create the main window: {e}");
                event_loop.exit();
                return;
            }
        };

        let settings = self.settings;
        let init_future = async move {
            let app_state = AppState::new(window, settings).await?;
            let flow = constructor((&app_state.ctx).into()).await;
            anyhow::Ok((app_state, flow))
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok((app_state, flow)) => self.start(app_state, flow),
                Err(e) => {
                    log::error!("App initialization failed: {e:#}");
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let event = match init_future.await {
                    Ok((state, flow)) => FlowEvent::Initialized { state, flow },
                    Err(e) => FlowEvent::Failed(e),
                };
                if proxy.send_event(event).is_err() {
                    log::error!("Event loop closed before the scene was initialized");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            // This is the message from our wasm `spawn_local`
            FlowEvent::Initialized { state, flow } => self.start(state, flow),
            FlowEvent::Failed(e) => {
                log::error!("App initialization failed: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let (Some(state), Some(flow)) = (&mut self.state, &mut self.flow) else {
            return;
        };
        flow.on_device_events(&state.ctx, &mut state.tree, &event);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let (Some(state), Some(flow)) = (&mut self.state, &mut self.flow) else {
            return;
        };

        flow.on_window_events(&state.ctx, &mut state.tree, &event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed().as_secs_f64();
                self.last_time = Instant::now();

                flow.on_update(&state.ctx, &mut state.tree, dt);
                state.tree.process(dt);
                state.render();
            }
            _ => {}
        }
    }
}

/// Opens a window and runs `constructor`'s flow until the window closes.
pub fn run(constructor: FlowConstructor, settings: ContextSettings) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            eprintln!("Warning: Could not initialize logger: {e}");
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info)
            .map_err(|e| anyhow::anyhow!("cannot initialize the console logger: {e}"))?;
    }

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, constructor, settings)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}
