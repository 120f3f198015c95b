//! Error taxonomy for the device-facing layer.
//!
//! Raw `vk::Result` codes convert straight into [`GpuError::Vulkan`]; the
//! named variants exist where the engine can say more than the driver does.

use ash::vk;
use thiserror::Error;

/// Anything that can go wrong talking to the device.
#[derive(Error, Debug)]
pub enum GpuError {
    /// A device call returned a non-success code.
    #[error("Vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),

    /// No physical device passed scoring.
    #[error("No usable Vulkan device")]
    NoSuitableDevice,

    /// The sub-allocator could not satisfy a request.
    #[error("Allocation failed: {0}")]
    AllocationFailed(String),

    /// Surface creation or window-handle access failed.
    #[error("Failed to create surface: {0}")]
    SurfaceCreation(String),

    /// The driver or surface rejected the swapchain build.
    #[error("Failed to create swapchain: {0}")]
    SwapchainCreation(String),

    /// The device rejected a shader module.
    #[error("Failed to create shader module: {0}")]
    ShaderCompilation(String),

    /// Pipeline configuration was incomplete or rejected by the device.
    #[error("Failed to create pipeline: {0}")]
    PipelineCreation(String),

    /// A bounded wait expired before the device signaled.
    #[error("Wait timed out: {0}")]
    Timeout(String),

    /// An operation was issued against the wrong lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Everything else.
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, GpuError>;
