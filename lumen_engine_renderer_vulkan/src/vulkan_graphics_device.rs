/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;
use lumen_engine::lumen::render::{
    BlitRegion, CommandContextHandle, ComputePipeline, DescriptorLayoutDesc,
    DescriptorPoolHandle, DescriptorPoolSize, DescriptorSetHandle, DescriptorSetLayoutHandle,
    DrawTarget, DrawTargetDesc, FenceHandle, GpuResource, GraphicsDevice, ImageBarrier,
    ImageHandle, ImageLayout, ImageViewHandle, PipelineHandle, PipelineLayoutHandle,
    SemaphoreHandle, SemaphoreStage, SubmitDesc, WaitStatus,
};
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_err, engine_error, engine_info, engine_warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rustc_hash::FxHashMap;
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::vulkan_config::DeviceConfig;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::*;
use crate::vulkan_swapchain::VulkanSwapchain;

const SOURCE: &str = "lumen::vulkan";

/// Memory and view backing a draw target image
struct DrawTargetMemory {
    view: vk::ImageView,
    allocation: Allocation,
}

/// Vulkan graphics device
///
/// Owns every object it creates until `destroy_resource` hands it back.
/// Engine handles carry the raw Vulkan handle; a command context handle is
/// the raw command buffer, whose pool is looked up on destruction.
pub struct VulkanGraphicsDevice {
    /// Shared GPU context (device, allocator, queues)
    gpu_context: Arc<GpuContext>,

    /// Window surface, handed to the swapchain by `create_swapchain`
    surface: Option<vk::SurfaceKHR>,

    /// Command pool of each live command context, keyed by raw command buffer
    command_pools: FxHashMap<u64, vk::CommandPool>,

    /// Memory of each live draw target, keyed by raw image
    draw_targets: FxHashMap<u64, DrawTargetMemory>,

    config: DeviceConfig,
}

// ===== HANDLE CONVERSIONS =====

fn fence(handle: FenceHandle) -> vk::Fence {
    vk::Fence::from_raw(handle.raw())
}

fn semaphore(handle: SemaphoreHandle) -> vk::Semaphore {
    vk::Semaphore::from_raw(handle.raw())
}

fn command_buffer(handle: CommandContextHandle) -> vk::CommandBuffer {
    vk::CommandBuffer::from_raw(handle.raw())
}

fn image(handle: ImageHandle) -> vk::Image {
    vk::Image::from_raw(handle.raw())
}

fn descriptor_pool(handle: DescriptorPoolHandle) -> vk::DescriptorPool {
    vk::DescriptorPool::from_raw(handle.raw())
}

fn descriptor_set(handle: DescriptorSetHandle) -> vk::DescriptorSet {
    vk::DescriptorSet::from_raw(handle.raw())
}

fn set_layout(handle: DescriptorSetLayoutHandle) -> vk::DescriptorSetLayout {
    vk::DescriptorSetLayout::from_raw(handle.raw())
}

fn pipeline_layout(handle: PipelineLayoutHandle) -> vk::PipelineLayout {
    vk::PipelineLayout::from_raw(handle.raw())
}

/// Map a failed object creation: memory exhaustion keeps its own variant
fn creation_error(what: &str, e: vk::Result) -> Error {
    engine_error!(SOURCE, "Failed to create {}: {:?}", what, e);
    match e {
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            Error::OutOfMemory
        }
        _ => Error::BackendError(format!("Failed to create {}: {:?}", what, e)),
    }
}

fn color_subresource_range(aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: vk::REMAINING_MIP_LEVELS,
        base_array_layer: 0,
        layer_count: vk::REMAINING_ARRAY_LAYERS,
    }
}

/// Physical device and the queue families chosen on it
struct DeviceSelection {
    physical_device: vk::PhysicalDevice,
    graphics_family: u32,
    present_family: u32,
    name: String,
}

/// Pick a Vulkan 1.3 GPU with graphics and present support, preferring discrete GPUs
unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<DeviceSelection> {
    let physical_devices = instance.enumerate_physical_devices().map_err(|e| {
        engine_error!(SOURCE, "Failed to enumerate physical devices: {:?}", e);
        Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
    })?;

    let mut best: Option<(bool, DeviceSelection)> = None;

    for physical_device in physical_devices {
        let properties = instance.get_physical_device_properties(physical_device);
        if properties.api_version < vk::API_VERSION_1_3 {
            continue;
        }

        let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
        let graphics_family = queue_families
            .iter()
            .position(|qf| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|i| i as u32);
        let present_family = (0..queue_families.len() as u32).find(|&i| {
            surface_loader
                .get_physical_device_surface_support(physical_device, i, surface)
                .unwrap_or(false)
        });

        let (Some(graphics_family), Some(present_family)) = (graphics_family, present_family)
        else {
            continue;
        };

        let discrete = properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU;
        if best.as_ref().is_some_and(|(best_discrete, _)| *best_discrete || !discrete) {
            continue;
        }

        let name = properties
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        best = Some((
            discrete,
            DeviceSelection {
                physical_device,
                graphics_family,
                present_family,
                name,
            },
        ));
    }

    best.map(|(_, selection)| selection).ok_or_else(|| {
        engine_error!(SOURCE, "No Vulkan 1.3 GPU with graphics and present support found");
        Error::InitializationFailed(
            "No Vulkan 1.3 GPU with graphics and present support found".to_string(),
        )
    })
}

#[cfg(feature = "vulkan-validation")]
unsafe fn create_debug_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
    config: &DeviceConfig,
) -> Result<(Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>)> {
    if !config.enable_validation {
        return Ok((None, None));
    }

    let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

    crate::debug::init_debug_config(crate::debug::Config {
        severity: config.debug_severity,
        message_filter: config.message_filter,
        break_on_error: config.break_on_validation_error,
        enable_stats: config.enable_validation_stats,
    });

    let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(crate::debug::severity_flags(config.debug_severity))
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

    let messenger = debug_utils
        .create_debug_utils_messenger(&debug_info, None)
        .map_err(|e| {
            engine_error!(SOURCE, "Failed to create debug messenger: {:?}", e);
            Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
        })?;

    Ok((Some(debug_utils), Some(messenger)))
}

#[cfg(not(feature = "vulkan-validation"))]
unsafe fn create_debug_messenger(
    _entry: &ash::Entry,
    _instance: &ash::Instance,
    _config: &DeviceConfig,
) -> Result<(Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>)> {
    Ok((None, None))
}

impl VulkanGraphicsDevice {
    /// Create a new Vulkan device
    ///
    /// # Arguments
    ///
    /// * `window` - Window for surface creation
    /// * `config` - Device configuration
    ///
    /// The surface created here is kept for the swapchain; call
    /// `create_swapchain` once to obtain it.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(
        window: &W,
        config: DeviceConfig,
    ) -> Result<Self> {
        unsafe {
            // Create Vulkan Entry
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!(SOURCE, "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let app_name = CString::new(config.app_name.as_str()).map_err(|e| {
                engine_error!(SOURCE, "Invalid application name: {}", e);
                Error::InitializationFailed(format!("Invalid application name: {}", e))
            })?;

            // Application Info
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Lumen")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            // Get required extensions
            let display_handle = window.display_handle().map_err(|e| {
                engine_error!(SOURCE, "Failed to get display handle: {}", e);
                Error::InitializationFailed(format!("Failed to get display handle: {}", e))
            })?;
            let mut extension_names =
                ash_window::enumerate_required_extensions(display_handle.as_raw())
                    .map_err(|e| {
                        engine_error!(SOURCE, "Failed to get required extensions: {}", e);
                        Error::InitializationFailed(format!(
                            "Failed to get required extensions: {}",
                            e
                        ))
                    })?
                    .to_vec();

            let enable_validation = config.enable_validation && cfg!(feature = "vulkan-validation");

            // Add debug utils extension if validation is enabled
            if enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }

            // Validation layers
            let layer_names = if enable_validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&create_info, None).map_err(|e| {
                engine_error!(SOURCE, "Failed to create Vulkan instance: {:?}", e);
                Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
            })?;

            // Setup debug messenger if validation is enabled
            let (debug_utils_loader, debug_messenger) =
                create_debug_messenger(&entry, &instance, &config)?;

            // Create Surface
            let window_handle = window.window_handle().map_err(|e| {
                engine_error!(SOURCE, "Failed to get window handle: {}", e);
                Error::InitializationFailed(format!("Failed to get window handle: {}", e))
            })?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to create surface: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?;

            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let selection = select_physical_device(&instance, &surface_loader, surface)?;
            engine_info!(
                SOURCE,
                "Selected GPU '{}' (graphics family {}, present family {})",
                selection.name,
                selection.graphics_family,
                selection.present_family
            );

            // Create Logical Device
            let queue_priorities = [1.0];
            let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
                .queue_family_index(selection.graphics_family)
                .queue_priorities(&queue_priorities)];
            if selection.present_family != selection.graphics_family {
                queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(selection.present_family)
                        .queue_priorities(&queue_priorities),
                );
            }

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];

            let mut features13 = vk::PhysicalDeviceVulkan13Features::default()
                .dynamic_rendering(true)
                .synchronization2(true);
            let mut features12 = vk::PhysicalDeviceVulkan12Features::default()
                .buffer_device_address(true)
                .descriptor_indexing(true);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .push_next(&mut features13)
                .push_next(&mut features12);

            let device = instance
                .create_device(selection.physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let graphics_queue = device.get_device_queue(selection.graphics_family, 0);
            let present_queue = device.get_device_queue(selection.present_family, 0);

            // Create GPU allocator
            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device: selection.physical_device,
                debug_settings: Default::default(),
                buffer_device_address: true,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            let gpu_context = Arc::new(GpuContext {
                entry,
                instance,
                physical_device: selection.physical_device,
                device,
                allocator: ManuallyDrop::new(Mutex::new(allocator)),
                graphics_queue,
                graphics_queue_family: selection.graphics_family,
                present_queue,
                surface_loader,
                debug_utils_loader,
                debug_messenger,
            });

            Ok(Self {
                gpu_context,
                surface: Some(surface),
                command_pools: FxHashMap::default(),
                draw_targets: FxHashMap::default(),
                config,
            })
        }
    }

    /// Create the swapchain for the window this device was created with
    ///
    /// Can only be called once; the swapchain takes ownership of the surface.
    pub fn create_swapchain(&mut self) -> Result<VulkanSwapchain> {
        let surface = self.surface.take().ok_or_else(|| {
            engine_error!(SOURCE, "The window surface is already owned by a swapchain");
            Error::InitializationFailed("Swapchain already created for this device".to_string())
        })?;

        VulkanSwapchain::new(
            Arc::clone(&self.gpu_context),
            surface,
            self.config.initial_extent,
            self.config.present_mode,
        )
    }

    /// Shared GPU context
    pub fn gpu_context(&self) -> &Arc<GpuContext> {
        &self.gpu_context
    }

    /// Device configuration this device was created with
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Number of live command contexts
    pub fn command_context_count(&self) -> usize {
        self.command_pools.len()
    }

    /// Number of live draw targets
    pub fn draw_target_count(&self) -> usize {
        self.draw_targets.len()
    }

    fn destroy_draw_target(&mut self, target: DrawTarget) {
        let Some(memory) = self.draw_targets.remove(&target.image.raw()) else {
            engine_warn!(SOURCE, "destroy: unknown draw target image {:#x}", target.image.raw());
            return;
        };

        let device = &self.gpu_context.device;
        unsafe {
            device.destroy_image_view(memory.view, None);
            device.destroy_image(image(target.image), None);
        }

        match self.gpu_context.allocator.lock() {
            Ok(mut allocator) => {
                if let Err(e) = allocator.free(memory.allocation) {
                    engine_error!(SOURCE, "Failed to free draw target memory: {:?}", e);
                }
            }
            Err(_) => engine_error!(SOURCE, "GPU allocator lock poisoned, draw target memory leaked"),
        }
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    // ===== SYNCHRONIZATION =====

    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo::default().flags(flags);

        unsafe {
            self.gpu_context
                .device
                .create_fence(&info, None)
                .map(|f| FenceHandle(f.as_raw()))
                .map_err(|e| creation_error("fence", e))
        }
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle> {
        let info = vk::SemaphoreCreateInfo::default();

        unsafe {
            self.gpu_context
                .device
                .create_semaphore(&info, None)
                .map(|s| SemaphoreHandle(s.as_raw()))
                .map_err(|e| creation_error("semaphore", e))
        }
    }

    fn wait_for_fence(&mut self, handle: FenceHandle, timeout: Duration) -> Result<WaitStatus> {
        let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);

        unsafe {
            match self.gpu_context.device.wait_for_fences(&[fence(handle)], true, timeout_ns) {
                Ok(()) => Ok(WaitStatus::Signaled),
                Err(vk::Result::TIMEOUT) => Ok(WaitStatus::TimedOut),
                Err(e) => Err(engine_err!(SOURCE, "Failed to wait for fence: {:?}", e)),
            }
        }
    }

    fn reset_fence(&mut self, handle: FenceHandle) -> Result<()> {
        unsafe {
            self.gpu_context
                .device
                .reset_fences(&[fence(handle)])
                .map_err(|e| engine_err!(SOURCE, "Failed to reset fence: {:?}", e))
        }
    }

    fn wait_idle(&mut self) -> Result<()> {
        unsafe {
            self.gpu_context
                .device
                .device_wait_idle()
                .map_err(|e| engine_err!(SOURCE, "Failed to wait for device idle: {:?}", e))
        }
    }

    // ===== COMMAND RECORDING =====

    fn create_command_context(&mut self) -> Result<CommandContextHandle> {
        let device = &self.gpu_context.device;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(self.gpu_context.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        unsafe {
            let pool = device
                .create_command_pool(&pool_info, None)
                .map_err(|e| creation_error("command pool", e))?;

            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let buffer = match device.allocate_command_buffers(&alloc_info) {
                Ok(buffers) if !buffers.is_empty() => buffers[0],
                Ok(_) => {
                    device.destroy_command_pool(pool, None);
                    return Err(engine_err!(SOURCE, "Command buffer allocation returned nothing"));
                }
                Err(e) => {
                    device.destroy_command_pool(pool, None);
                    return Err(creation_error("command buffer", e));
                }
            };

            self.command_pools.insert(buffer.as_raw(), pool);
            Ok(CommandContextHandle(buffer.as_raw()))
        }
    }

    fn begin_commands(&mut self, cmd: CommandContextHandle) -> Result<()> {
        let device = &self.gpu_context.device;
        let cb = command_buffer(cmd);

        unsafe {
            device
                .reset_command_buffer(cb, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!(SOURCE, "Failed to reset command buffer: {:?}", e))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            device
                .begin_command_buffer(cb, &begin_info)
                .map_err(|e| engine_err!(SOURCE, "Failed to begin command buffer: {:?}", e))
        }
    }

    fn end_commands(&mut self, cmd: CommandContextHandle) -> Result<()> {
        unsafe {
            self.gpu_context
                .device
                .end_command_buffer(command_buffer(cmd))
                .map_err(|e| engine_err!(SOURCE, "Failed to end command buffer: {:?}", e))
        }
    }

    fn submit(&mut self, submit: &SubmitDesc) -> Result<()> {
        let semaphore_infos = |stages: &[SemaphoreStage]| {
            stages
                .iter()
                .map(|s| {
                    vk::SemaphoreSubmitInfo::default()
                        .semaphore(semaphore(s.semaphore))
                        .stage_mask(stages_to_vk(s.stage))
                        .device_index(0)
                        .value(1)
                })
                .collect::<Vec<_>>()
        };

        let wait_infos = semaphore_infos(submit.wait);
        let signal_infos = semaphore_infos(submit.signal);
        let cmd_infos =
            [vk::CommandBufferSubmitInfo::default().command_buffer(command_buffer(submit.cmd))];

        let submit_info = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .signal_semaphore_infos(&signal_infos)
            .command_buffer_infos(&cmd_infos);

        let submit_fence = submit.fence.map(fence).unwrap_or(vk::Fence::null());

        unsafe {
            self.gpu_context
                .device
                .queue_submit2(self.gpu_context.graphics_queue, &[submit_info], submit_fence)
                .map_err(|e| engine_err!(SOURCE, "Failed to submit commands to GPU queue: {:?}", e))
        }
    }

    fn cmd_pipeline_barrier(&mut self, cmd: CommandContextHandle, barrier: &ImageBarrier) {
        let image_barrier = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(stages_to_vk(barrier.src_stage))
            .src_access_mask(access_to_vk(barrier.src_access))
            .dst_stage_mask(stages_to_vk(barrier.dst_stage))
            .dst_access_mask(access_to_vk(barrier.dst_access))
            .old_layout(layout_to_vk(barrier.old_layout))
            .new_layout(layout_to_vk(barrier.new_layout))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image(barrier.image))
            .subresource_range(color_subresource_range(aspect_to_vk(barrier.aspect)));

        let barriers = [image_barrier];
        let dependency_info = vk::DependencyInfo::default().image_memory_barriers(&barriers);

        unsafe {
            self.gpu_context
                .device
                .cmd_pipeline_barrier2(command_buffer(cmd), &dependency_info);
        }
    }

    fn cmd_blit_image(&mut self, cmd: CommandContextHandle, blit: &BlitRegion) {
        let layers = vk::ImageSubresourceLayers {
            aspect_mask: aspect_to_vk(blit.aspect),
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        };
        let corner = |width: u32, height: u32| vk::Offset3D {
            x: width as i32,
            y: height as i32,
            z: 1,
        };

        let region = vk::ImageBlit2::default()
            .src_subresource(layers)
            .src_offsets([
                vk::Offset3D::default(),
                corner(blit.src_extent.width, blit.src_extent.height),
            ])
            .dst_subresource(layers)
            .dst_offsets([
                vk::Offset3D::default(),
                corner(blit.dst_extent.width, blit.dst_extent.height),
            ]);

        let regions = [region];
        let blit_info = vk::BlitImageInfo2::default()
            .src_image(image(blit.src))
            .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .dst_image(image(blit.dst))
            .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .filter(filter_to_vk(blit.filter))
            .regions(&regions);

        unsafe {
            self.gpu_context
                .device
                .cmd_blit_image2(command_buffer(cmd), &blit_info);
        }
    }

    fn cmd_clear_color_image(
        &mut self,
        cmd: CommandContextHandle,
        target: ImageHandle,
        layout: ImageLayout,
        color: [f32; 4],
    ) {
        let clear_value = vk::ClearColorValue { float32: color };
        let ranges = [color_subresource_range(vk::ImageAspectFlags::COLOR)];

        unsafe {
            self.gpu_context.device.cmd_clear_color_image(
                command_buffer(cmd),
                image(target),
                layout_to_vk(layout),
                &clear_value,
                &ranges,
            );
        }
    }

    fn cmd_bind_compute_pipeline(&mut self, cmd: CommandContextHandle, pipeline: &ComputePipeline) {
        unsafe {
            self.gpu_context.device.cmd_bind_pipeline(
                command_buffer(cmd),
                vk::PipelineBindPoint::COMPUTE,
                vk::Pipeline::from_raw(pipeline.pipeline.raw()),
            );
        }
    }

    fn cmd_bind_compute_descriptor_set(
        &mut self,
        cmd: CommandContextHandle,
        layout: PipelineLayoutHandle,
        set: DescriptorSetHandle,
    ) {
        unsafe {
            self.gpu_context.device.cmd_bind_descriptor_sets(
                command_buffer(cmd),
                vk::PipelineBindPoint::COMPUTE,
                pipeline_layout(layout),
                0,
                &[descriptor_set(set)],
                &[],
            );
        }
    }

    fn cmd_dispatch(&mut self, cmd: CommandContextHandle, x: u32, y: u32, z: u32) {
        unsafe {
            self.gpu_context.device.cmd_dispatch(command_buffer(cmd), x, y, z);
        }
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(
        &mut self,
        max_sets: u32,
        sizes: &[DescriptorPoolSize],
    ) -> Result<DescriptorPoolHandle> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = sizes
            .iter()
            .filter(|s| s.count > 0)
            .map(|s| vk::DescriptorPoolSize {
                ty: descriptor_kind_to_vk(s.kind),
                descriptor_count: s.count,
            })
            .collect();

        let info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        unsafe {
            self.gpu_context
                .device
                .create_descriptor_pool(&info, None)
                .map(|p| DescriptorPoolHandle(p.as_raw()))
                .map_err(|e| match e {
                    vk::Result::ERROR_OUT_OF_HOST_MEMORY
                    | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
                        engine_error!(SOURCE, "Out of memory creating descriptor pool");
                        Error::OutOfMemory
                    }
                    _ => {
                        engine_error!(SOURCE, "Failed to create descriptor pool: {:?}", e);
                        Error::InitializationFailed(format!(
                            "Failed to create descriptor pool: {:?}",
                            e
                        ))
                    }
                })
        }
    }

    fn reset_descriptor_pool(&mut self, pool: DescriptorPoolHandle) -> Result<()> {
        unsafe {
            self.gpu_context
                .device
                .reset_descriptor_pool(descriptor_pool(pool), vk::DescriptorPoolResetFlags::empty())
                .map_err(|e| engine_err!(SOURCE, "Failed to reset descriptor pool: {:?}", e))
        }
    }

    fn allocate_descriptor_set(
        &mut self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle> {
        let layouts = [set_layout(layout)];
        let info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(descriptor_pool(pool))
            .set_layouts(&layouts);

        unsafe {
            match self.gpu_context.device.allocate_descriptor_sets(&info) {
                Ok(sets) => sets
                    .first()
                    .map(|s| DescriptorSetHandle(s.as_raw()))
                    .ok_or_else(|| engine_err!(SOURCE, "Descriptor set allocation returned nothing")),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY)
                | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                    engine_warn!(SOURCE, "Descriptor pool {:#x} is full", pool.raw());
                    Err(Error::PoolExhausted(format!(
                        "device pool {:#x} has no room for another set",
                        pool.raw()
                    )))
                }
                Err(e) => Err(engine_err!(SOURCE, "Failed to allocate descriptor set: {:?}", e)),
            }
        }
    }

    fn create_descriptor_set_layout(
        &mut self,
        desc: &DescriptorLayoutDesc,
    ) -> Result<DescriptorSetLayoutHandle> {
        let stage_flags = shader_stages_to_vk(desc.visibility);
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
            .bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(descriptor_kind_to_vk(b.kind))
                    .descriptor_count(b.count)
                    .stage_flags(stage_flags)
            })
            .collect();

        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

        unsafe {
            self.gpu_context
                .device
                .create_descriptor_set_layout(&info, None)
                .map(|l| DescriptorSetLayoutHandle(l.as_raw()))
                .map_err(|e| creation_error("descriptor set layout", e))
        }
    }

    fn write_storage_image(&mut self, set: DescriptorSetHandle, binding: u32, view: ImageViewHandle) {
        let image_infos = [vk::DescriptorImageInfo::default()
            .image_view(vk::ImageView::from_raw(view.raw()))
            .image_layout(vk::ImageLayout::GENERAL)];

        let write = vk::WriteDescriptorSet::default()
            .dst_set(descriptor_set(set))
            .dst_binding(binding)
            .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
            .image_info(&image_infos);

        unsafe {
            self.gpu_context.device.update_descriptor_sets(&[write], &[]);
        }
    }

    // ===== RESOURCES =====

    fn create_draw_target(&mut self, desc: &DrawTargetDesc) -> Result<DrawTarget> {
        if desc.extent.is_empty() {
            return Err(Error::InvalidResource(format!(
                "draw target extent {}x{} is empty",
                desc.extent.width, desc.extent.height
            )));
        }

        let device = &self.gpu_context.device;
        let format = format_to_vk(desc.format);

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        unsafe {
            let vk_image = device
                .create_image(&image_info, None)
                .map_err(|e| creation_error("draw target image", e))?;

            let requirements = device.get_image_memory_requirements(vk_image);

            let allocation = {
                let mut allocator = match self.gpu_context.allocator.lock() {
                    Ok(allocator) => allocator,
                    Err(_) => {
                        device.destroy_image(vk_image, None);
                        return Err(engine_err!(SOURCE, "GPU allocator lock poisoned"));
                    }
                };
                allocator.allocate(&AllocationCreateDesc {
                    name: "draw target",
                    requirements,
                    location: MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
            };

            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    device.destroy_image(vk_image, None);
                    engine_error!(SOURCE, "Failed to allocate draw target memory: {:?}", e);
                    return Err(Error::OutOfMemory);
                }
            };

            let release = |allocation: Allocation| {
                device.destroy_image(vk_image, None);
                if let Ok(mut allocator) = self.gpu_context.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            };

            if let Err(e) = device.bind_image_memory(vk_image, allocation.memory(), allocation.offset())
            {
                release(allocation);
                return Err(engine_err!(SOURCE, "Failed to bind draw target memory: {:?}", e));
            }

            let view_info = vk::ImageViewCreateInfo::default()
                .image(vk_image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: format_aspect(desc.format),
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = match device.create_image_view(&view_info, None) {
                Ok(view) => view,
                Err(e) => {
                    release(allocation);
                    return Err(creation_error("draw target view", e));
                }
            };

            self.draw_targets
                .insert(vk_image.as_raw(), DrawTargetMemory { view, allocation });

            Ok(DrawTarget {
                image: ImageHandle(vk_image.as_raw()),
                view: ImageViewHandle(view.as_raw()),
                format: desc.format,
                extent: desc.extent,
            })
        }
    }

    fn create_compute_pipeline(
        &mut self,
        spirv: &[u32],
        set_layouts: &[DescriptorSetLayoutHandle],
    ) -> Result<ComputePipeline> {
        let device = &self.gpu_context.device;

        unsafe {
            let module_info = vk::ShaderModuleCreateInfo::default().code(spirv);
            let module = device.create_shader_module(&module_info, None).map_err(|e| {
                engine_error!(SOURCE, "Driver rejected compute shader module: {:?}", e);
                Error::ShaderLoadFailed(format!("Driver rejected shader module: {:?}", e))
            })?;

            let layouts: Vec<vk::DescriptorSetLayout> =
                set_layouts.iter().map(|&l| set_layout(l)).collect();
            let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&layouts);

            let layout = match device.create_pipeline_layout(&layout_info, None) {
                Ok(layout) => layout,
                Err(e) => {
                    device.destroy_shader_module(module, None);
                    return Err(creation_error("compute pipeline layout", e));
                }
            };

            let stage = vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::COMPUTE)
                .module(module)
                .name(c"main");

            let pipeline_info = vk::ComputePipelineCreateInfo::default()
                .layout(layout)
                .stage(stage);

            let result = device.create_compute_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info],
                None,
            );

            // The module is only needed while the pipeline is built
            device.destroy_shader_module(module, None);

            match result {
                Ok(pipelines) if !pipelines.is_empty() => Ok(ComputePipeline {
                    pipeline: PipelineHandle(pipelines[0].as_raw()),
                    layout: PipelineLayoutHandle(layout.as_raw()),
                }),
                Ok(_) => {
                    device.destroy_pipeline_layout(layout, None);
                    Err(engine_err!(SOURCE, "Compute pipeline creation returned nothing"))
                }
                Err((_, e)) => {
                    device.destroy_pipeline_layout(layout, None);
                    Err(creation_error("compute pipeline", e))
                }
            }
        }
    }

    fn destroy_resource(&mut self, resource: GpuResource) {
        let device = &self.gpu_context.device;

        unsafe {
            match resource {
                GpuResource::Fence(f) => device.destroy_fence(fence(f), None),
                GpuResource::Semaphore(s) => device.destroy_semaphore(semaphore(s), None),
                GpuResource::CommandContext(cmd) => match self.command_pools.remove(&cmd.raw()) {
                    // Destroying the pool frees its command buffer
                    Some(pool) => device.destroy_command_pool(pool, None),
                    None => engine_warn!(SOURCE, "destroy: unknown command context {:#x}", cmd.raw()),
                },
                GpuResource::DescriptorPool(p) => {
                    device.destroy_descriptor_pool(descriptor_pool(p), None)
                }
                GpuResource::DescriptorSetLayout(l) => {
                    device.destroy_descriptor_set_layout(set_layout(l), None)
                }
                GpuResource::Pipeline(p) => {
                    device.destroy_pipeline(vk::Pipeline::from_raw(p.raw()), None)
                }
                GpuResource::PipelineLayout(l) => {
                    device.destroy_pipeline_layout(pipeline_layout(l), None)
                }
                GpuResource::DrawTarget(target) => self.destroy_draw_target(target),
            }
        }
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            // Wait for device to finish
            self.gpu_context.device.device_wait_idle().ok();

            if !self.command_pools.is_empty() || !self.draw_targets.is_empty() {
                engine_warn!(
                    SOURCE,
                    "Device dropped with {} command context(s) and {} draw target(s) still alive",
                    self.command_pools.len(),
                    self.draw_targets.len()
                );
            }

            for (_, pool) in self.command_pools.drain() {
                self.gpu_context.device.destroy_command_pool(pool, None);
            }

            let leftover: Vec<u64> = self.draw_targets.keys().copied().collect();
            for raw in leftover {
                if let Some(memory) = self.draw_targets.remove(&raw) {
                    self.gpu_context.device.destroy_image_view(memory.view, None);
                    self.gpu_context
                        .device
                        .destroy_image(vk::Image::from_raw(raw), None);
                    if let Ok(mut allocator) = self.gpu_context.allocator.lock() {
                        allocator.free(memory.allocation).ok();
                    }
                }
            }

            // Surface never handed to a swapchain
            if let Some(surface) = self.surface.take() {
                self.gpu_context.surface_loader.destroy_surface(surface, None);
            }
        }
        // Device, allocator and instance go with the last GpuContext reference
    }
}
