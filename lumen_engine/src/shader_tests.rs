//! Unit tests for shader.rs

use crate::shader::*;
use crate::error::Error;

fn le_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

#[test]
fn test_little_endian_module() {
    let words = [SPIRV_MAGIC, 0x0001_0600, 0, 8, 0];
    assert_eq!(spirv_from_bytes(&le_bytes(&words)).unwrap(), words.to_vec());
}

#[test]
fn test_big_endian_module_is_swapped() {
    let words = [SPIRV_MAGIC, 0x0001_0600];
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
    assert_eq!(spirv_from_bytes(&bytes).unwrap(), words.to_vec());
}

#[test]
fn test_rejects_bad_length() {
    assert!(matches!(spirv_from_bytes(&[]), Err(Error::ShaderLoadFailed(_))));
    assert!(matches!(spirv_from_bytes(&[3, 2, 35, 7, 0]), Err(Error::ShaderLoadFailed(_))));
}

#[test]
fn test_rejects_bad_magic() {
    let err = spirv_from_bytes(&le_bytes(&[0xdead_beef])).unwrap_err();
    assert!(format!("{}", err).contains("0xdeadbeef"));
}

#[test]
fn test_missing_file_names_the_path() {
    let err = load_spirv("does/not/exist.comp.spv").unwrap_err();
    match err {
        Error::ShaderLoadFailed(msg) => assert!(msg.contains("exist.comp.spv")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_load_from_disk() {
    let path = std::env::temp_dir().join(format!("lumen_shader_test_{}.spv", std::process::id()));
    std::fs::write(&path, le_bytes(&[SPIRV_MAGIC, 1, 2])).unwrap();

    let words = load_spirv(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(words, vec![SPIRV_MAGIC, 1, 2]);
}
