//! SPIR-V shader binaries

use std::path::Path;
use crate::error::{Error, Result};

/// First word of every SPIR-V module
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Read a SPIR-V binary from disk
///
/// # Errors
///
/// `ShaderLoadFailed` when the file cannot be read or is not SPIR-V.
pub fn load_spirv(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| {
        Error::ShaderLoadFailed(format!("{}: {}", path.display(), e))
    })?;
    spirv_from_bytes(&bytes).map_err(|e| match e {
        Error::ShaderLoadFailed(msg) => {
            Error::ShaderLoadFailed(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Decode SPIR-V words from raw bytes, accepting either byte order
pub fn spirv_from_bytes(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(Error::ShaderLoadFailed(format!(
            "length {} is not a positive multiple of 4",
            bytes.len()
        )));
    }

    let mut words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if words[0] == SPIRV_MAGIC {
        return Ok(words);
    }
    if words[0].swap_bytes() == SPIRV_MAGIC {
        for word in &mut words {
            *word = word.swap_bytes();
        }
        return Ok(words);
    }

    Err(Error::ShaderLoadFailed(format!(
        "bad magic number {:#010x}",
        words[0]
    )))
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
