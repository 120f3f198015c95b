//! Vulkan plumbing for the Aster engine.
//!
//! Instance and device bring-up, placement-classified memory allocation,
//! render pass and pipeline construction, swapchain image exchange, and the
//! release ledger that tears all of it down again in reverse order.

pub mod command;
pub mod context;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod release;
pub mod render_pass;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use command::CommandPool;
pub use context::{DeviceContext, DeviceContextBuilder};
pub use error::{GpuError, Result};
pub use memory::{DeviceAllocator, Placement};
pub use pipeline::{create_pipeline_layout, PipelineConfig};
pub use release::{ReleaseAction, ReleaseContext, ReleaseLedger};
pub use surface::{SurfaceContext, SurfaceSupport};
pub use swapchain::Swapchain;
pub use sync::{FrameSync, FRAME_TIMEOUT_NS};
