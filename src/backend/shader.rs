// Shader module loading
//
// Shaders ship as precompiled SPIR-V (see build.rs) and are read from disk
// at startup.

use anyhow::{Context, Result};
use ash::vk;
use std::io::Cursor;
use std::path::Path;
use super::VulkanDevice;

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Decode a SPIR-V binary into aligned 32-bit words
pub fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>> {
    // read_spv handles alignment, length and byte order
    let words = ash::util::read_spv(&mut Cursor::new(bytes))
        .context("Malformed SPIR-V binary")?;

    if words.first() != Some(&SPIRV_MAGIC) {
        anyhow::bail!("Not a SPIR-V binary (bad magic number)");
    }

    Ok(words)
}

/// Create a shader module from SPIR-V words
pub fn create_shader_module(device: &VulkanDevice, code: &[u32]) -> Result<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

    unsafe {
        device.device.create_shader_module(&create_info, None)
            .context("Failed to create shader module")
    }
}

/// Read a compiled shader from `path` and create a module from it
pub fn load_shader_module(device: &VulkanDevice, path: &Path) -> Result<vk::ShaderModule> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read shader {:?} (was it compiled with glslc?)", path))?;
    let words = spirv_words(&bytes)
        .with_context(|| format!("Invalid shader {:?}", path))?;

    log::debug!("Loaded shader {:?} ({} words)", path, words.len());
    create_shader_module(device, &words)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn accepts_spirv_header() {
        let bytes = to_bytes(&[SPIRV_MAGIC, 0x0001_0000, 0, 1, 0]);
        let words = spirv_words(&bytes).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], SPIRV_MAGIC);
    }

    #[test]
    fn rejects_wrong_magic() {
        let bytes = to_bytes(&[0xdead_beef, 0, 0, 0, 0]);
        assert!(spirv_words(&bytes).is_err());
    }

    #[test]
    fn rejects_truncated_word() {
        let mut bytes = to_bytes(&[SPIRV_MAGIC, 0]);
        bytes.pop();
        assert!(spirv_words(&bytes).is_err());
    }
}
