//! Swapchain creation and per-frame image exchange.
//!
//! The window never resizes, so one swapchain lasts the whole run. There is
//! no rebuild path; a surface that goes out of date turns into an error and
//! ends the session.

use ash::vk;

use crate::error::{GpuError, Result};

/// The presentable images, wrapped with the views framebuffers attach to.
pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    /// One color view per swapchain image, in image-index order.
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

impl Swapchain {
    /// Build the swapchain and a color view for each of its images.
    ///
    /// Present mode is FIFO, the one mode Vulkan guarantees; it also caps
    /// the loop at display rate. The returned handles are the caller's to
    /// tear down, normally by registering them with the release ledger.
    ///
    /// # Safety
    /// `surface` must belong to the instance behind `swapchain_loader`, and
    /// `device` must be the loader's device.
    pub unsafe fn new(
        device: &ash::Device,
        swapchain_loader: &ash::khr::swapchain::Device,
        surface: vk::SurfaceKHR,
        surface_capabilities: &vk::SurfaceCapabilitiesKHR,
        surface_format: vk::SurfaceFormatKHR,
        extent: vk::Extent2D,
        graphics_queue_family: u32,
    ) -> Result<Self> {
        // One image above the minimum so acquisition does not stall on the
        // driver. A max_image_count of zero means no upper bound.
        let image_count = match surface_capabilities.max_image_count {
            0 => surface_capabilities.min_image_count + 1,
            max => (surface_capabilities.min_image_count + 1).min(max),
        };

        let queue_families = [graphics_queue_family];
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .queue_family_indices(&queue_families)
            .pre_transform(surface_capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true);

        let swapchain = swapchain_loader
            .create_swapchain(&create_info, None)
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        let images = swapchain_loader.get_swapchain_images(swapchain)?;
        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            image_views.push(create_color_view(device, image, surface_format.format)?);
        }

        tracing::debug!(
            "Swapchain ready: {}x{} {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            image_views.len()
        );

        Ok(Self {
            swapchain,
            image_views,
            format: surface_format.format,
            extent,
        })
    }

    /// Wait up to `timeout_ns` for the next presentable image.
    ///
    /// Returns the image index plus the driver's suboptimal flag, which
    /// stays false while the window keeps its size.
    ///
    /// # Safety
    /// `semaphore` must be unsignaled and not otherwise in use.
    pub unsafe fn acquire_next_image(
        &self,
        swapchain_loader: &ash::khr::swapchain::Device,
        semaphore: vk::Semaphore,
        timeout_ns: u64,
    ) -> Result<(u32, bool)> {
        let acquired = swapchain_loader.acquire_next_image(
            self.swapchain,
            timeout_ns,
            semaphore,
            vk::Fence::null(),
        );

        match acquired {
            Ok(pair) => Ok(pair),
            Err(vk::Result::TIMEOUT) => Err(GpuError::Timeout(format!(
                "no swapchain image acquired within {timeout_ns} ns"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Queue image `image_index` for presentation after `wait_semaphores`.
    ///
    /// The returned flag mirrors [`Self::acquire_next_image`]'s suboptimal
    /// signal.
    ///
    /// # Safety
    /// `image_index` must come from a successful acquire on this swapchain.
    pub unsafe fn present(
        &self,
        swapchain_loader: &ash::khr::swapchain::Device,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        Ok(swapchain_loader.queue_present(queue, &present_info)?)
    }
}

unsafe fn create_color_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
) -> Result<vk::ImageView> {
    let subresource = vk::ImageSubresourceRange::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .level_count(1)
        .layer_count(1);
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(subresource);

    Ok(device.create_image_view(&view_info, None)?)
}

/// Pick the swapchain format: B8G8R8A8 sRGB when the surface offers it,
/// otherwise whatever the surface lists first.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    available
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .unwrap_or(available[0])
}

/// Resolve the swapchain extent against what the surface allows.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired_width: u32,
    desired_height: u32,
) -> vk::Extent2D {
    // A current_extent of u32::MAX means the surface takes its size from
    // the swapchain rather than dictating it.
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: desired_width.clamp(min.width, max.width),
        height: desired_height.clamp(min.height, max.height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_format_prefers_srgb() {
        let available = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = select_surface_format(&available);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn surface_format_falls_back_to_first() {
        let available = [vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];

        let selected = select_surface_format(&available);
        assert_eq!(selected.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn extent_uses_current_when_fixed_by_surface() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1700,
                height: 900,
            },
            ..Default::default()
        };

        let extent = calculate_extent(&capabilities, 640, 480);
        assert_eq!(extent.width, 1700);
        assert_eq!(extent.height, 900);
    }

    #[test]
    fn extent_clamps_desired_when_surface_is_flexible() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            ..Default::default()
        };

        let extent = calculate_extent(&capabilities, 1700, 900);
        assert_eq!(extent.width, 1280);
        assert_eq!(extent.height, 720);
    }
}
