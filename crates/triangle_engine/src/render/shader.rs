//! Shader bytecode loading
//!
//! SPIR-V blobs are produced ahead of time by the build script and read from
//! disk here. Shader modules only live long enough to build the pipeline.

use ash::vk;
use std::ffi::CStr;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::{RenderError, RenderResult, VkResultExt};

/// First word of every SPIR-V module
pub const SPIRV_MAGIC_NUMBER: u32 = 0x0723_0203;

/// Entry point name both stages use
pub const SHADER_ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// Read a SPIR-V file into 32-bit words
pub fn read_bytecode(path: impl AsRef<Path>) -> RenderResult<Vec<u32>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| RenderError::ResourceOpen {
        path: path.to_path_buf(),
        source,
    })?;

    decode_bytecode(path.to_path_buf(), &bytes)
}

fn decode_bytecode(path: PathBuf, bytes: &[u8]) -> RenderResult<Vec<u32>> {
    // read_spv rejects lengths that are not a multiple of four and fixes endianness
    let words = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| RenderError::InvalidShader {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    match words.first() {
        Some(&SPIRV_MAGIC_NUMBER) => Ok(words),
        Some(&word) => Err(RenderError::InvalidShader {
            path,
            reason: format!("bad magic number {word:#010x}"),
        }),
        None => Err(RenderError::InvalidShader {
            path,
            reason: "file is empty".to_string(),
        }),
    }
}

/// Shader module wrapper, destroyed on drop
pub struct ShaderModule {
    device: ash::Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from SPIR-V words
    pub fn from_words(device: &ash::Device, words: &[u32]) -> RenderResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);
        let module = unsafe { device.create_shader_module(&create_info, None) }.or_api("vkCreateShaderModule")?;

        Ok(Self {
            device: device.clone(),
            module,
        })
    }

    /// Load a shader module from a SPIR-V file
    pub fn from_file(device: &ash::Device, path: impl AsRef<Path>) -> RenderResult<Self> {
        let words = read_bytecode(path)?;
        Self::from_words(device, &words)
    }

    /// Stage description referencing this module
    pub fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(SHADER_ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("triangle_shader_{}_{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_resource_open() {
        let result = read_bytecode("no/such/dir/triangle.vert.spv");
        match result {
            Err(RenderError::ResourceOpen { path, .. }) => {
                assert_eq!(path, PathBuf::from("no/such/dir/triangle.vert.spv"));
            }
            other => panic!("expected ResourceOpen, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_words_decode() {
        let mut bytes = SPIRV_MAGIC_NUMBER.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0000u32.to_le_bytes());
        let path = temp_file("valid.spv", &bytes);

        let words = read_bytecode(&path).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC_NUMBER, 0x0001_0000]);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_truncated_word_rejected() {
        let mut bytes = SPIRV_MAGIC_NUMBER.to_le_bytes().to_vec();
        bytes.push(0);
        let path = temp_file("truncated.spv", &bytes);

        assert!(matches!(read_bytecode(&path), Err(RenderError::InvalidShader { .. })));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_wrong_magic_and_empty_rejected() {
        let result = decode_bytecode(PathBuf::from("x.spv"), &[1, 2, 3, 4]);
        assert!(matches!(result, Err(RenderError::InvalidShader { .. })));

        let result = decode_bytecode(PathBuf::from("x.spv"), &[]);
        assert!(matches!(result, Err(RenderError::InvalidShader { .. })));
    }

    #[test]
    fn test_entry_point_name() {
        assert_eq!(SHADER_ENTRY_POINT.to_str().unwrap(), "main");
    }
}
