// Shader module loading.
//
// SPIR-V binaries are loaded at runtime from the shaders/ directory by
// name; a missing or malformed binary is a fatal setup error.

use anyhow::{Context, Result};
use ash::vk;
use std::io::Cursor;
use std::path::Path;
use super::VulkanDevice;

/// Load `shaders/<name>.spv` and create a shader module from it
pub fn load_shader_module(device: &VulkanDevice, name: &str) -> Result<vk::ShaderModule> {
    let path = Path::new("shaders").join(format!("{name}.spv"));
    let bytes = std::fs::read(&path)
        .with_context(|| format!("Failed to read shader binary {:?}", path))?;

    let code = ash::util::read_spv(&mut Cursor::new(&bytes))
        .with_context(|| format!("Invalid SPIR-V in {:?}", path))?;

    let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);

    unsafe {
        device
            .device
            .create_shader_module(&create_info, None)
            .with_context(|| format!("Failed to create shader module from {:?}", path))
    }
}
