/// GpuContext - Shared Vulkan state for the graphics device and the swapchain
///
/// Contains everything both sides need:
/// - Instance, physical and logical device for Vulkan API calls
/// - Allocator for image memory
/// - Graphics and present queues
/// - Surface loader for swapchain queries

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::Mutex;

/// Shared GPU context.
///
/// Held through an `Arc` by `VulkanGraphicsDevice` and `VulkanSwapchain`, so
/// the device and instance outlive whichever of the two is dropped last.
/// Objects created from the device must be destroyed by their owners before
/// the last reference goes away.
pub struct GpuContext {
    /// Vulkan entry (keeps the loader library mapped)
    #[allow(dead_code)]
    pub(crate) entry: ash::Entry,

    /// Vulkan instance
    pub(crate) instance: ash::Instance,

    /// Selected physical device
    pub(crate) physical_device: vk::PhysicalDevice,

    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop to ensure it's dropped BEFORE the device is destroyed
    pub allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Graphics queue for command submission
    pub graphics_queue: vk::Queue,

    /// Graphics queue family index
    pub graphics_queue_family: u32,

    /// Present queue (may be the graphics queue)
    pub present_queue: vk::Queue,

    /// Surface extension loader
    pub(crate) surface_loader: ash::khr::surface::Instance,

    /// Debug utils loader (for validation layers)
    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,

    /// Debug messenger handle
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // 1. Drop allocator: free VkDeviceMemory pages BEFORE destroying device
            ManuallyDrop::drop(&mut self.allocator);

            // 2. Cleanup debug config to prevent callbacks during destruction
            #[cfg(feature = "vulkan-validation")]
            crate::debug::cleanup_debug_config();

            // 3. Destroy debug messenger BEFORE device and instance
            if let (Some(debug_utils), Some(messenger)) =
                (&self.debug_utils_loader, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            // 4. Destroy device and instance
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
