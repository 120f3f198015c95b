//! Window surface plumbing.
//!
//! Wraps the surface handle together with the two extension loaders the
//! engine needs, so callers never touch raw window handles directly.

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::context::DeviceContext;
use crate::error::{GpuError, Result};

/// A presentable surface plus the loaders bound to it.
pub struct SurfaceContext {
    pub surface: vk::SurfaceKHR,
    pub surface_loader: ash::khr::surface::Instance,
    pub swapchain_loader: ash::khr::swapchain::Device,
}

impl SurfaceContext {
    /// Create a surface for `window`.
    ///
    /// # Safety
    /// The window's handles must stay valid for the surface's lifetime.
    pub unsafe fn new<W>(device: &DeviceContext, window: &W) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("no display handle: {e}")))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("no window handle: {e}")))?;

        let surface = ash_window::create_surface(
            device.entry(),
            device.instance(),
            display.as_raw(),
            window_handle.as_raw(),
            None,
        )
        .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?;

        Ok(Self {
            surface,
            surface_loader: ash::khr::surface::Instance::new(device.entry(), device.instance()),
            swapchain_loader: ash::khr::swapchain::Device::new(device.instance(), device.device()),
        })
    }

    /// What the surface supports on the selected physical device.
    ///
    /// Present modes are not queried; the engine always presents FIFO,
    /// which every implementation provides.
    pub fn support(&self, device: &DeviceContext) -> Result<SurfaceSupport> {
        let physical_device = device.physical_device();

        unsafe {
            Ok(SurfaceSupport {
                capabilities: self
                    .surface_loader
                    .get_physical_device_surface_capabilities(physical_device, self.surface)?,
                formats: self
                    .surface_loader
                    .get_physical_device_surface_formats(physical_device, self.surface)?,
            })
        }
    }

    /// Release the surface handle.
    ///
    /// # Safety
    /// Every swapchain created against the surface must already be gone,
    /// and the instance must still be alive.
    pub unsafe fn destroy(&self) {
        self.surface_loader.destroy_surface(self.surface, None);
    }
}

/// Snapshot of what a surface can do on one physical device.
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
}
