//! Device context: instance, physical device, logical device, one queue.

use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;

use crate::error::{GpuError, Result};
use crate::instance::{create_instance, pick_physical_device};

/// Owner of the instance-level and device-level Vulkan objects.
///
/// Everything else in the engine borrows from this, so it is constructed
/// first and dropped last. Dropping it destroys the logical device and then
/// the instance; per-frame objects must already be gone by then, which the
/// release ledger takes care of.
pub struct DeviceContext {
    // Keeps the loaded library alive for as long as the instance
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: Arc<ash::Device>,
    pub(crate) graphics_queue_family: u32,
    pub(crate) graphics_queue: vk::Queue,
}

impl DeviceContext {
    /// Logical device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Shared handle for objects that keep the device alive on their own.
    pub fn shared_device(&self) -> Arc<ash::Device> {
        self.device.clone()
    }

    /// Selected physical device.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub(crate) fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// The single graphics queue; presentation goes through it too.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Queue family index backing [`Self::graphics_queue`].
    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    /// Block until the device has finished all submitted work.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Staged construction for [`DeviceContext`].
pub struct DeviceContextBuilder {
    app_name: String,
    validation: bool,
}

impl Default for DeviceContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Aster".to_string(),
            validation: cfg!(debug_assertions),
        }
    }
}

impl DeviceContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Application name reported to the driver.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Toggle the validation layer.
    pub fn validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Load Vulkan, pick a GPU, and open the logical device.
    pub fn build(self) -> Result<DeviceContext> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::Other(format!("Vulkan library not found: {e}")))?;
        let instance = unsafe { create_instance(&entry, &self.app_name, self.validation)? };

        let physical_device = unsafe { pick_physical_device(&instance)? };
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        tracing::info!("Picked GPU: {}", device_name(&properties));

        let graphics_queue_family = unsafe { graphics_family_index(&instance, physical_device)? };
        let (device, graphics_queue) =
            unsafe { open_device(&instance, physical_device, graphics_queue_family)? };

        Ok(DeviceContext {
            entry,
            instance,
            physical_device,
            device: Arc::new(device),
            graphics_queue_family,
            graphics_queue,
        })
    }
}

/// Readable name and class for the startup log line.
fn device_name(properties: &vk::PhysicalDeviceProperties) -> String {
    // SAFETY: the driver null-terminates device_name
    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };

    let class = match properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "discrete",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "integrated",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "virtual",
        vk::PhysicalDeviceType::CPU => "cpu",
        _ => "other",
    };

    format!("{} ({class})", name.to_string_lossy())
}

/// First queue family with graphics support.
///
/// # Safety
/// `physical_device` must have been enumerated from `instance`.
unsafe fn graphics_family_index(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<u32> {
    instance
        .get_physical_device_queue_family_properties(physical_device)
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| index as u32)
        .ok_or(GpuError::NoSuitableDevice)
}

/// Open the logical device with the swapchain extension and one graphics
/// queue at priority 1.0.
///
/// # Safety
/// `queue_family` must come from [`graphics_family_index`] for this
/// physical device.
unsafe fn open_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_family: u32,
) -> Result<(ash::Device, vk::Queue)> {
    let priorities = [1.0_f32];
    let queue_info = vk::DeviceQueueCreateInfo::default()
        .queue_family_index(queue_family)
        .queue_priorities(&priorities);

    let extension_names = [ash::khr::swapchain::NAME.as_ptr()];

    // Base Vulkan 1.1 is enough for the render pass path; no feature chain
    let features = vk::PhysicalDeviceFeatures::default();

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(std::slice::from_ref(&queue_info))
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    let device = instance.create_device(physical_device, &create_info, None)?;
    let queue = device.get_device_queue(queue_family, 0);

    Ok((device, queue))
}
