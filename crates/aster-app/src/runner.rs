//! Event loop integration.
//!
//! [`Engine::run`] owns the winit loop. The handler forwards redraws and
//! key presses into the engine and records the first fatal error before
//! telling the loop to exit.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::engine::Engine;

impl Engine {
    /// Run the engine until the window closes or a frame fails.
    ///
    /// Initializes logging, creates the window, and drives [`Engine::draw`]
    /// once per redraw. Space cycles the pipeline; Escape or closing the
    /// window ends the loop. A failed frame ends the loop and is returned
    /// as the error. The caller is responsible for [`Engine::cleanup`]
    /// afterwards.
    pub fn run(&mut self) -> anyhow::Result<()> {
        // RUST_LOG wins when set, info otherwise
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();

        info!("Starting {}", self.config().title);

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut runner = EngineRunner {
            engine: self,
            fatal: None,
        };
        event_loop.run_app(&mut runner)?;

        match runner.fatal.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Winit handler driving an [`Engine`].
struct EngineRunner<'a> {
    engine: &'a mut Engine,
    /// First fatal error; set right before the loop is told to exit.
    fatal: Option<anyhow::Error>,
}

impl ApplicationHandler for EngineRunner<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.engine.is_initialized() {
            return;
        }

        // Fixed resolution: the swapchain is never recreated, so the window
        // must not resize either
        let attrs = Window::default_attributes()
            .with_title(&self.engine.config().title)
            .with_inner_size(PhysicalSize::new(
                self.engine.config().width,
                self.engine.config().height,
            ))
            .with_resizable(false);

        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("Failed to create window: {e}");
                self.fatal = Some(e.into());
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.engine.init(window) {
            error!("Failed to initialize engine: {e:#}");
            self.fatal = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Window close requested");
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.engine.draw() {
                    error!("Render error: {e:#}");
                    self.fatal = Some(e);
                    event_loop.exit();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Space) => self.engine.cycle_pipeline(),
                    PhysicalKey::Code(KeyCode::Escape) => {
                        info!("Escape pressed");
                        event_loop.exit();
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.engine.window() {
            window.request_redraw();
        }
    }
}
