//! Application layer for the Aster engine.
//!
//! Owns the window, the event loop, and the single frame in flight. An
//! [`Engine`] is built from an [`EngineConfig`], brings up the whole
//! rendering stack in [`Engine::init`], draws one frame per redraw, and
//! tears everything down through the release ledger in [`Engine::cleanup`].
//!
//! # Example
//!
//! ```no_run
//! use aster_app::{Engine, EngineConfig};
//!
//! let mut engine = Engine::new(EngineConfig::new("Demo").with_size(1280, 720));
//! let result = engine.run();
//! engine.cleanup();
//! result.unwrap();
//! ```

mod config;
mod engine;
mod frame;
mod runner;

pub use config::EngineConfig;
pub use engine::{Engine, PipelineKind};
pub use frame::{clear_color, FramePhase};

// Re-export the window type appearing in the `Engine` API
pub use winit::window::Window;
