//! Command pool and frame-recording helpers.
//!
//! The frame loop owns exactly one primary command buffer and re-records it
//! every frame, so the helpers here are shaped around that: a pool whose
//! buffers are individually resettable, one reset-record-end wrapper, and a
//! single-submission entry point.

use crate::error::Result;
use ash::vk;

/// Pool backing the frame's command buffer.
pub struct CommandPool {
    pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool on `queue_family` whose buffers can be reset one at a
    /// time.
    ///
    /// # Safety
    /// `queue_family` must be a queue family index of `device`.
    pub unsafe fn new(device: &ash::Device, queue_family: u32) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family);

        Ok(Self {
            pool: device.create_command_pool(&create_info, None)?,
        })
    }

    /// Raw pool handle, for release registration.
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Allocate one primary command buffer from this pool.
    ///
    /// # Safety
    /// `device` must be the device the pool was created on.
    pub unsafe fn allocate_primary(&self, device: &ash::Device) -> Result<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        Ok(device.allocate_command_buffers(&alloc_info)?[0])
    }
}

/// Reset `cmd` and record one frame's commands into it through `record`.
///
/// The buffer is begun in one-time-submit mode and ended before returning;
/// `record` itself only issues (infallible) recording calls.
///
/// # Safety
/// `cmd` must come from a pool with resettable buffers and must not be
/// pending execution; the fence wait at the top of the frame guarantees the
/// latter.
pub unsafe fn record_frame<F>(device: &ash::Device, cmd: vk::CommandBuffer, record: F) -> Result<()>
where
    F: FnOnce(vk::CommandBuffer),
{
    device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;

    let begin_info = vk::CommandBufferBeginInfo::default()
        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    device.begin_command_buffer(cmd, &begin_info)?;

    record(cmd);

    device.end_command_buffer(cmd)?;
    Ok(())
}

/// Submit one recorded command buffer.
///
/// The submission waits on `wait` at `wait_stage`, signals `signal` when
/// rendering finishes, and signals `fence` when the whole submission
/// completes.
///
/// # Safety
/// All handles must share one device, and `cmd` must be in the executable
/// state.
pub unsafe fn submit_frame(
    device: &ash::Device,
    queue: vk::Queue,
    cmd: vk::CommandBuffer,
    wait: vk::Semaphore,
    wait_stage: vk::PipelineStageFlags,
    signal: vk::Semaphore,
    fence: vk::Fence,
) -> Result<()> {
    let command_buffers = [cmd];
    let wait_semaphores = [wait];
    let wait_stages = [wait_stage];
    let signal_semaphores = [signal];

    let submit_info = vk::SubmitInfo::default()
        .wait_semaphores(&wait_semaphores)
        .wait_dst_stage_mask(&wait_stages)
        .command_buffers(&command_buffers)
        .signal_semaphores(&signal_semaphores);

    device.queue_submit(queue, &[submit_info], fence)?;
    Ok(())
}
