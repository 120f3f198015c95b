//! Scoped release ledger for ordered resource teardown.
//!
//! Vulkan objects must die in the reverse of their creation order: a
//! framebuffer before the render pass it references, an image view before
//! its image. Rather than hand-ordering destructor calls across every init
//! stage, creation sites register a release action with the ledger and
//! shutdown drains it once, newest entry first.

use crate::memory::DeviceAllocator;
use ash::vk;
use gpu_allocator::vulkan::Allocation;

/// An append-only log of pending release actions.
///
/// Entries drain in reverse registration order, so registering actions in
/// creation order yields a correct teardown order for free. The ledger is
/// generic over the action type; the engine instantiates it with
/// [`ReleaseAction`].
pub struct ReleaseLedger<A> {
    entries: Vec<A>,
}

impl<A> ReleaseLedger<A> {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a release action.
    ///
    /// Actions registered later are released earlier.
    pub fn register(&mut self, action: A) {
        self.entries.push(action);
    }

    /// Drain the ledger, invoking `release` on each entry newest-first.
    ///
    /// The ledger is empty afterwards; draining an empty ledger invokes
    /// nothing.
    pub fn drain(&mut self, mut release: impl FnMut(A)) {
        while let Some(action) = self.entries.pop() {
            release(action);
        }
    }

    /// Number of registered actions not yet drained.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger holds no pending actions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A> Default for ReleaseLedger<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed device state needed to execute release actions.
pub struct ReleaseContext<'a> {
    /// The logical device that owns every handle in the ledger.
    pub device: &'a ash::Device,
    /// Swapchain extension loader, needed only for [`ReleaseAction::Swapchain`].
    pub swapchain_loader: &'a ash::khr::swapchain::Device,
    /// Allocator that issued the allocation tokens held by buffer and image
    /// entries.
    pub allocator: &'a mut DeviceAllocator,
}

/// One deferred teardown step for a device object.
///
/// Buffer and image variants carry their allocation token, so executing the
/// action both destroys the handle and returns the memory.
pub enum ReleaseAction {
    /// A buffer together with its backing allocation.
    Buffer {
        buffer: vk::Buffer,
        allocation: Allocation,
    },
    /// An image together with its backing allocation.
    Image {
        image: vk::Image,
        allocation: Allocation,
    },
    /// A bare image view.
    ImageView(vk::ImageView),
    /// A framebuffer.
    Framebuffer(vk::Framebuffer),
    /// A render pass.
    RenderPass(vk::RenderPass),
    /// A pipeline.
    Pipeline(vk::Pipeline),
    /// A pipeline layout.
    PipelineLayout(vk::PipelineLayout),
    /// A command pool, including every command buffer allocated from it.
    CommandPool(vk::CommandPool),
    /// A semaphore.
    Semaphore(vk::Semaphore),
    /// A fence.
    Fence(vk::Fence),
    /// The swapchain itself.
    Swapchain(vk::SwapchainKHR),
}

impl ReleaseAction {
    /// Destroy the underlying object.
    ///
    /// Failures to return memory are logged and swallowed so that one bad
    /// entry cannot abort the rest of a teardown drain.
    ///
    /// # Safety
    /// The object must belong to the device in `cx` and must no longer be
    /// in use by any in-flight work.
    pub unsafe fn execute(self, cx: &mut ReleaseContext<'_>) {
        match self {
            Self::Buffer { buffer, allocation } => {
                if let Err(e) = cx.allocator.free_allocation(allocation) {
                    tracing::warn!("Failed to free buffer allocation: {e}");
                }
                cx.device.destroy_buffer(buffer, None);
            }
            Self::Image { image, allocation } => {
                if let Err(e) = cx.allocator.free_allocation(allocation) {
                    tracing::warn!("Failed to free image allocation: {e}");
                }
                cx.device.destroy_image(image, None);
            }
            Self::ImageView(view) => cx.device.destroy_image_view(view, None),
            Self::Framebuffer(framebuffer) => cx.device.destroy_framebuffer(framebuffer, None),
            Self::RenderPass(render_pass) => cx.device.destroy_render_pass(render_pass, None),
            Self::Pipeline(pipeline) => cx.device.destroy_pipeline(pipeline, None),
            Self::PipelineLayout(layout) => cx.device.destroy_pipeline_layout(layout, None),
            Self::CommandPool(pool) => cx.device.destroy_command_pool(pool, None),
            Self::Semaphore(semaphore) => cx.device.destroy_semaphore(semaphore, None),
            Self::Fence(fence) => cx.device.destroy_fence(fence, None),
            Self::Swapchain(swapchain) => {
                cx.swapchain_loader.destroy_swapchain(swapchain, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_reverse_registration_order() {
        let mut ledger = ReleaseLedger::new();
        for i in 0..5 {
            ledger.register(i);
        }

        let mut order = Vec::new();
        ledger.drain(|i| order.push(i));

        assert_eq!(order, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn drain_leaves_ledger_empty() {
        let mut ledger = ReleaseLedger::new();
        ledger.register("swapchain");
        ledger.register("depth image");
        assert_eq!(ledger.len(), 2);

        ledger.drain(|_| {});

        assert!(ledger.is_empty());
    }

    #[test]
    fn drain_on_empty_ledger_invokes_nothing() {
        let mut ledger: ReleaseLedger<u32> = ReleaseLedger::new();
        let mut calls = 0;

        ledger.drain(|_| calls += 1);
        ledger.drain(|_| calls += 1);

        assert_eq!(calls, 0);
    }

    #[test]
    fn register_after_drain_starts_a_fresh_batch() {
        let mut ledger = ReleaseLedger::new();
        ledger.register(1);
        ledger.drain(|_| {});

        ledger.register(2);
        ledger.register(3);

        let mut order = Vec::new();
        ledger.drain(|i| order.push(i));
        assert_eq!(order, vec![3, 2]);
    }
}
