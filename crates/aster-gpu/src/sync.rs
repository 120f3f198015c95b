//! Single-frame synchronization.

use ash::vk;

use crate::error::{GpuError, Result};

/// Upper bound for any single GPU wait, in nanoseconds.
///
/// A wait that exceeds this is treated as a device hang and surfaced as
/// [`GpuError::Timeout`] instead of blocking forever.
pub const FRAME_TIMEOUT_NS: u64 = 1_000_000_000;

/// The one fence and two semaphores gating the frame in flight.
pub struct FrameSync {
    /// Signaled by the presentation engine once the acquired image may be
    /// rendered into.
    pub image_acquired: vk::Semaphore,
    /// Signaled by the render submission; presentation waits on it.
    pub render_finished: vk::Semaphore,
    /// Signaled when the whole submission has executed.
    pub in_flight: vk::Fence,
}

impl FrameSync {
    /// Create the semaphore pair and the fence.
    ///
    /// The fence starts signaled so the very first frame does not wait on
    /// work that was never submitted.
    ///
    /// # Safety
    /// The returned handles belong to `device` and must be destroyed
    /// before it.
    pub unsafe fn new(device: &ash::Device) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);

        Ok(Self {
            image_acquired: device.create_semaphore(&semaphore_info, None)?,
            render_finished: device.create_semaphore(&semaphore_info, None)?,
            in_flight: device.create_fence(&fence_info, None)?,
        })
    }

    /// Block until the previous frame's submission has executed, at most
    /// [`FRAME_TIMEOUT_NS`].
    ///
    /// # Safety
    /// `device` must be the device the fence was created on.
    pub unsafe fn wait(&self, device: &ash::Device) -> Result<()> {
        match device.wait_for_fences(&[self.in_flight], true, FRAME_TIMEOUT_NS) {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(GpuError::Timeout(format!(
                "frame fence not signaled within {FRAME_TIMEOUT_NS} ns"
            ))),
            Err(e) => Err(GpuError::from(e)),
        }
    }

    /// Return the fence to the unsignaled state. Only call this after a
    /// successful [`FrameSync::wait`].
    ///
    /// # Safety
    /// The fence must not be attached to a pending submission.
    pub unsafe fn reset(&self, device: &ash::Device) -> Result<()> {
        device.reset_fences(&[self.in_flight])?;
        Ok(())
    }
}
