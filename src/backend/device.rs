// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Instance creation with validation layers
// - Physical device selection (prefer discrete GPU)
// - Logical device + graphics and compute queue creation
// - Transient command pools for one-shot submissions

use anyhow::{Context, Result};
use ash::{vk, Entry};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{CStr, CString};
use std::sync::Arc;

/// Vulkan device wrapper with automatic cleanup
pub struct VulkanDevice {
    // Vulkan handles (order matters for drop!)
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub instance: ash::Instance,
    pub entry: Entry,

    // Queue handles
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub compute_queue: vk::Queue,
    pub compute_queue_family: u32,

    // Transient pools for one-shot command buffers, one per queue family
    pub graphics_transient_pool: vk::CommandPool,
    pub compute_transient_pool: vk::CommandPool,

    // Debug utils (if validation enabled)
    debug_utils: Option<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,

    // Device properties (cached for performance)
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl VulkanDevice {
    /// Create Vulkan device
    ///
    /// # Arguments
    /// * `app_name` - Application name for debugging
    /// * `enable_validation` - Enable Vulkan validation layers (debug only)
    /// * `display_handle` - Display the surface extensions are queried for
    pub fn new(
        app_name: &str,
        enable_validation: bool,
        display_handle: RawDisplayHandle,
    ) -> Result<Arc<Self>> {
        log::info!("Creating Vulkan device: {}", app_name);

        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;

        let instance = Self::create_instance(&entry, app_name, enable_validation, display_handle)?;

        let debug_utils = if enable_validation {
            Some(Self::setup_debug_messenger(&entry, &instance)?)
        } else {
            None
        };

        let (physical_device, graphics_queue_family, compute_queue_family) =
            Self::pick_physical_device(&instance)?;

        let (device, graphics_queue, compute_queue) = Self::create_logical_device(
            &instance,
            physical_device,
            graphics_queue_family,
            compute_queue_family,
        )?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        log::info!(
            "Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
        log::info!(
            "Queue families: graphics={}, compute={}",
            graphics_queue_family,
            compute_queue_family
        );

        let graphics_transient_pool =
            Self::create_transient_pool(&device, graphics_queue_family)?;
        let compute_transient_pool = Self::create_transient_pool(&device, compute_queue_family)?;

        Ok(Arc::new(Self {
            device,
            physical_device,
            instance,
            entry,
            graphics_queue,
            graphics_queue_family,
            compute_queue,
            compute_queue_family,
            graphics_transient_pool,
            compute_transient_pool,
            debug_utils,
            properties,
            memory_properties,
        }))
    }

    fn create_instance(
        entry: &Entry,
        app_name: &str,
        enable_validation: bool,
        display_handle: RawDisplayHandle,
    ) -> Result<ash::Instance> {
        let app_name_cstr = CString::new(app_name)?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_1);

        // Surface extensions for the current platform
        let mut extensions = ash_window::enumerate_required_extensions(display_handle)
            .context("No surface extensions for this display")?
            .to_vec();
        if enable_validation {
            extensions.push(ash::extensions::ext::DebugUtils::name().as_ptr());
        }

        let layer_names = if enable_validation {
            vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .context("Failed to create Vulkan instance")?;

        Ok(instance)
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::extensions::ext::DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger =
            unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }?;

        Ok((debug_utils, messenger))
    }

    /// Pick a GPU plus its graphics and compute queue families. A dedicated
    /// compute family is preferred so the generated geometry exercises a real
    /// cross-family ownership transfer; otherwise compute runs on the
    /// graphics family and no transfer is needed.
    fn pick_physical_device(instance: &ash::Instance) -> Result<(vk::PhysicalDevice, u32, u32)> {
        let devices = unsafe { instance.enumerate_physical_devices() }?;

        if devices.is_empty() {
            anyhow::bail!("No Vulkan-capable GPU found");
        }

        let mut best: Option<(vk::PhysicalDevice, u32, u32)> = None;
        let mut best_score = 0;

        for device in devices {
            let props = unsafe { instance.get_physical_device_properties(device) };
            let queue_families =
                unsafe { instance.get_physical_device_queue_family_properties(device) };

            let graphics_family = queue_families
                .iter()
                .enumerate()
                .find(|(_, p)| p.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|(i, _)| i as u32);

            let Some(graphics_family) = graphics_family else {
                continue;
            };

            // Prefer a compute-capable family that is not the graphics family
            let compute_family = queue_families
                .iter()
                .enumerate()
                .filter(|(_, p)| p.queue_flags.contains(vk::QueueFlags::COMPUTE))
                .map(|(i, _)| i as u32)
                .find(|&i| i != graphics_family)
                .or_else(|| {
                    queue_families[graphics_family as usize]
                        .queue_flags
                        .contains(vk::QueueFlags::COMPUTE)
                        .then_some(graphics_family)
                });

            let Some(compute_family) = compute_family else {
                continue;
            };

            // Score device (prefer discrete GPU)
            let score = match props.device_type {
                vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
                vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
                _ => 1,
            };

            if score > best_score {
                best_score = score;
                best = Some((device, graphics_family, compute_family));
            }
        }

        best.ok_or_else(|| anyhow::anyhow!("No GPU with graphics + compute queues found"))
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        graphics_queue_family: u32,
        compute_queue_family: u32,
    ) -> Result<(ash::Device, vk::Queue, vk::Queue)> {
        let queue_priorities = [1.0];
        let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(graphics_queue_family)
            .queue_priorities(&queue_priorities)
            .build()];
        if compute_queue_family != graphics_queue_family {
            queue_create_infos.push(
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(compute_queue_family)
                    .queue_priorities(&queue_priorities)
                    .build(),
            );
        }

        let extensions = vec![ash::extensions::khr::Swapchain::name().as_ptr()];

        let features = vk::PhysicalDeviceFeatures::default();
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device =
            unsafe { instance.create_device(physical_device, &create_info, None) }?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };
        let compute_queue = unsafe { device.get_device_queue(compute_queue_family, 0) };

        Ok((device, graphics_queue, compute_queue))
    }

    fn create_transient_pool(device: &ash::Device, family: u32) -> Result<vk::CommandPool> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);

        let pool = unsafe { device.create_command_pool(&pool_info, None) }
            .context("Failed to create transient command pool")?;
        Ok(pool)
    }

    /// Record a single command buffer on the given transient pool, submit it
    /// and block until the queue drains. Startup-only path; never call this
    /// per frame.
    pub fn submit_one_shot<F>(
        &self,
        pool: vk::CommandPool,
        queue: vk::Queue,
        record: F,
    ) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        unsafe {
            let cmd = self
                .device
                .allocate_command_buffers(&alloc_info)
                .context("Failed to allocate one-shot command buffer")?[0];

            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device.begin_command_buffer(cmd, &begin_info)?;
            record(cmd);
            self.device.end_command_buffer(cmd)?;

            let cmds = [cmd];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&cmds);
            self.device
                .queue_submit(queue, &[submit_info.build()], vk::Fence::null())
                .context("One-shot submission failed")?;
            self.device.queue_wait_idle(queue)?;
            self.device.free_command_buffers(pool, &cmds);
        }

        Ok(())
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        let _ = self.wait_idle();

        // Cleanup in reverse order
        unsafe {
            self.device
                .destroy_command_pool(self.compute_transient_pool, None);
            self.device
                .destroy_command_pool(self.graphics_transient_pool, None);

            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}
