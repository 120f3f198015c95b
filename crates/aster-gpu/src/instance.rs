//! Instance bootstrap: surface extensions, layer probing, device scoring.

use std::ffi::{CStr, CString};

use ash::vk;

use crate::error::{GpuError, Result};

/// The one layer the engine ever asks for.
const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Surface extensions for the platforms the engine builds on.
fn surface_extension_names() -> Vec<*const i8> {
    vec![
        ash::khr::surface::NAME.as_ptr(),
        #[cfg(target_os = "linux")]
        ash::khr::xlib_surface::NAME.as_ptr(),
        #[cfg(target_os = "linux")]
        ash::khr::wayland_surface::NAME.as_ptr(),
        #[cfg(target_os = "windows")]
        ash::khr::win32_surface::NAME.as_ptr(),
        #[cfg(target_os = "macos")]
        ash::ext::metal_surface::NAME.as_ptr(),
        #[cfg(target_os = "macos")]
        ash::khr::portability_enumeration::NAME.as_ptr(),
    ]
}

/// Create the Vulkan instance, enabling the validation layer when requested
/// and actually installed.
///
/// # Safety
/// `entry` must stay loaded for as long as the returned instance lives.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    validation: bool,
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name).unwrap();
    let engine_name = CString::new("Aster").unwrap();

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(&engine_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_1);

    let mut layer_names = Vec::new();
    if validation {
        if layer_is_available(entry, VALIDATION_LAYER)? {
            layer_names.push(VALIDATION_LAYER.as_ptr());
        } else {
            tracing::warn!("Validation layer {VALIDATION_LAYER:?} not available");
        }
    }

    let extension_names = surface_extension_names();

    // MoltenVK only enumerates as a portability implementation
    #[cfg(target_os = "macos")]
    let flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let flags = vk::InstanceCreateFlags::empty();

    let create_info = vk::InstanceCreateInfo::default()
        .flags(flags)
        .application_info(&app_info)
        .enabled_layer_names(&layer_names)
        .enabled_extension_names(&extension_names);

    Ok(entry.create_instance(&create_info, None)?)
}

unsafe fn layer_is_available(entry: &ash::Entry, layer: &CStr) -> Result<bool> {
    let properties = entry.enumerate_instance_layer_properties()?;
    Ok(properties
        .iter()
        .any(|props| CStr::from_ptr(props.layer_name.as_ptr()) == layer))
}

/// Pick the physical device with the highest score.
///
/// # Safety
/// `instance` must not have been destroyed.
pub unsafe fn pick_physical_device(instance: &ash::Instance) -> Result<vk::PhysicalDevice> {
    let best = instance
        .enumerate_physical_devices()?
        .into_iter()
        .map(|device| (device_score(instance, device), device))
        .max_by_key(|&(score, _)| score);

    match best {
        Some((score, device)) if score > 0 => Ok(device),
        _ => Err(GpuError::NoSuitableDevice),
    }
}

/// Score one candidate: device class first, device-local memory as the
/// tiebreak. Anything below Vulkan 1.1 is out.
unsafe fn device_score(instance: &ash::Instance, device: vk::PhysicalDevice) -> i64 {
    let properties = instance.get_physical_device_properties(device);

    let version = properties.api_version;
    if (vk::api_version_major(version), vk::api_version_minor(version)) < (1, 1) {
        return -1;
    }

    let class: i64 = match properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 50,
        _ => 0,
    };

    let memory = instance.get_physical_device_memory_properties(device);
    let device_local: u64 = memory.memory_heaps[..memory.memory_heap_count as usize]
        .iter()
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size)
        .sum();

    // One point per GiB
    class + (device_local >> 30) as i64
}
