//! GPU memory allocation policy.
//!
//! Allocation requests are classified by [`Placement`] rather than by raw
//! memory property flags, and every successful allocation registers its own
//! teardown with the release ledger before the handle is returned. Call
//! sites keep only the raw `vk::Buffer` / `vk::Image` handle; the allocation
//! token travels into the ledger entry.

use crate::error::{GpuError, Result};
use crate::release::{ReleaseAction, ReleaseLedger};
use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

/// Placement policy for an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Device-local memory. Never mapped; used for attachments.
    DeviceLocal,
    /// Host-visible memory the CPU writes directly.
    HostVisible,
}

impl Placement {
    /// Map the policy tag onto a gpu-allocator memory location.
    pub fn memory_location(self) -> MemoryLocation {
        match self {
            Self::DeviceLocal => MemoryLocation::GpuOnly,
            Self::HostVisible => MemoryLocation::CpuToGpu,
        }
    }
}

/// Policy layer over gpu-allocator: create, bind, register teardown.
///
/// The inner allocator sits behind an `Option` so [`Self::shutdown`] can
/// retire it while the device is still alive.
pub struct DeviceAllocator {
    allocator: Option<Allocator>,
    device: Arc<ash::Device>,
}

impl DeviceAllocator {
    /// Stand up an allocator over `device`.
    ///
    /// # Safety
    /// `physical_device` must be the device that `device` was created from,
    /// on `instance`.
    pub unsafe fn new(
        instance: &ash::Instance,
        device: Arc<ash::Device>,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: (*device).clone(),
            physical_device,
            // Leak reporting stays on in release builds; the rest only in debug
            debug_settings: gpu_allocator::AllocatorDebugSettings {
                log_memory_information: cfg!(debug_assertions),
                store_stack_traces: cfg!(debug_assertions),
                ..Default::default()
            },
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| GpuError::AllocationFailed(e.to_string()))?;

        Ok(Self {
            allocator: Some(allocator),
            device,
        })
    }

    /// Allocate a buffer and register its teardown with the ledger.
    pub fn create_buffer(
        &mut self,
        ledger: &mut ReleaseLedger<ReleaseAction>,
        size: u64,
        usage: vk::BufferUsageFlags,
        placement: Placement,
        name: &str,
    ) -> Result<vk::Buffer> {
        let (buffer, allocation) = self.allocate_buffer(size, usage, placement, name)?;
        ledger.register(ReleaseAction::Buffer { buffer, allocation });
        Ok(buffer)
    }

    /// Allocate a host-visible buffer and copy `data` into it, then register
    /// its teardown with the ledger.
    ///
    /// The mapped pointer is used only within this call and never escapes.
    pub fn create_buffer_with_data(
        &mut self,
        ledger: &mut ReleaseLedger<ReleaseAction>,
        usage: vk::BufferUsageFlags,
        data: &[u8],
        name: &str,
    ) -> Result<vk::Buffer> {
        let (buffer, allocation) =
            self.allocate_buffer(data.len() as u64, usage, Placement::HostVisible, name)?;

        let Some(ptr) = allocation.mapped_ptr() else {
            // Roll back before surfacing the error; nothing was registered yet.
            self.release_unbound_buffer(buffer, allocation);
            return Err(GpuError::AllocationFailed(
                "host-visible allocation has no mapped pointer".to_string(),
            ));
        };

        // SAFETY: the mapping is at least `data.len()` bytes (the buffer was
        // sized from `data`) and stays valid until the allocation is freed,
        // which cannot happen before the registration below.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.as_ptr().cast::<u8>(), data.len());
        }

        ledger.register(ReleaseAction::Buffer { buffer, allocation });
        Ok(buffer)
    }

    /// Allocate an image and register its teardown with the ledger.
    pub fn create_image(
        &mut self,
        ledger: &mut ReleaseLedger<ReleaseAction>,
        create_info: &vk::ImageCreateInfo,
        placement: Placement,
        name: &str,
    ) -> Result<vk::Image> {
        let image = unsafe {
            self.device
                .create_image(create_info, None)
                .map_err(GpuError::from)?
        };

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };

        let allocation = match self.allocate(&AllocationCreateDesc {
            name,
            requirements,
            location: placement.memory_location(),
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        }) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        } {
            if let Err(free_err) = self.free_allocation(allocation) {
                tracing::warn!("Failed to free allocation after bind failure: {free_err}");
            }
            unsafe { self.device.destroy_image(image, None) };
            return Err(GpuError::from(e));
        }

        ledger.register(ReleaseAction::Image { image, allocation });
        Ok(image)
    }

    /// Retire the inner allocator, returning all device memory.
    ///
    /// Must run while the device is still alive. Anything that never went
    /// through the ledger shows up in the leak report here. Safe to call
    /// more than once; later calls and the eventual drop do nothing.
    pub fn shutdown(&mut self) {
        self.allocator = None;
    }

    /// Return an allocation token to the underlying allocator.
    pub(crate) fn free_allocation(&mut self, allocation: Allocation) -> Result<()> {
        self.inner()?
            .free(allocation)
            .map_err(|e| GpuError::AllocationFailed(e.to_string()))
    }

    fn allocate_buffer(
        &mut self,
        size: u64,
        usage: vk::BufferUsageFlags,
        placement: Placement,
        name: &str,
    ) -> Result<(vk::Buffer, Allocation)> {
        if size == 0 {
            return Err(GpuError::InvalidState(
                "Cannot allocate a zero-sized buffer".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            self.device
                .create_buffer(&buffer_info, None)
                .map_err(GpuError::from)?
        };

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let allocation = match self.allocate(&AllocationCreateDesc {
            name,
            requirements,
            location: placement.memory_location(),
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        }) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        } {
            self.release_unbound_buffer(buffer, allocation);
            return Err(GpuError::from(e));
        }

        Ok((buffer, allocation))
    }

    fn allocate(&mut self, desc: &AllocationCreateDesc<'_>) -> Result<Allocation> {
        self.inner()?
            .allocate(desc)
            .map_err(|e| GpuError::AllocationFailed(e.to_string()))
    }

    fn inner(&mut self) -> Result<&mut Allocator> {
        self.allocator
            .as_mut()
            .ok_or_else(|| GpuError::InvalidState("Allocator already shut down".to_string()))
    }

    fn release_unbound_buffer(&mut self, buffer: vk::Buffer, allocation: Allocation) {
        if let Err(e) = self.free_allocation(allocation) {
            tracing::warn!("Failed to free rolled-back allocation: {e}");
        }
        unsafe { self.device.destroy_buffer(buffer, None) };
    }
}

impl Drop for DeviceAllocator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_local_maps_to_gpu_only() {
        assert_eq!(
            Placement::DeviceLocal.memory_location(),
            MemoryLocation::GpuOnly
        );
    }

    #[test]
    fn host_visible_maps_to_cpu_to_gpu() {
        assert_eq!(
            Placement::HostVisible.memory_location(),
            MemoryLocation::CpuToGpu
        );
    }
}
