//! SPIR-V shader loading.

use crate::error::RenderError;
use std::path::Path;

/// First word of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Load a compiled SPIR-V module from disk.
///
/// A missing or malformed module is an error; the caller decides whether
/// that is fatal.
pub fn load_spirv(path: &Path) -> Result<Vec<u32>, RenderError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => RenderError::NotFound(path.to_path_buf()),
        _ => RenderError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    words_from_bytes(&bytes)
        .map_err(|reason| RenderError::InvalidSpirv(format!("{}: {reason}", path.display())))
}

/// Convert raw bytes to aligned u32 words (SPIR-V requires 4-byte alignment).
fn words_from_bytes(bytes: &[u8]) -> Result<Vec<u32>, String> {
    if bytes.len() % 4 != 0 {
        return Err(format!("length {} is not a multiple of 4", bytes.len()));
    }

    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        Some(&word) => Err(format!("bad magic number {word:#010x}")),
        None => Err("empty module".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words_to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn accepts_a_module_with_the_magic_header() {
        let bytes = words_to_bytes(&[SPIRV_MAGIC, 0x0001_0000, 42]);
        let words = words_from_bytes(&bytes).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000, 42]);
    }

    #[test]
    fn rejects_misaligned_input() {
        let mut bytes = words_to_bytes(&[SPIRV_MAGIC]);
        bytes.push(0);
        assert!(words_from_bytes(&bytes).is_err());
    }

    #[test]
    fn rejects_a_bad_magic_number() {
        let bytes = words_to_bytes(&[0xdead_beef, 0x0001_0000]);
        assert!(words_from_bytes(&bytes).is_err());
    }

    #[test]
    fn rejects_an_empty_module() {
        assert!(words_from_bytes(&[]).is_err());
    }

    #[test]
    fn missing_file_reports_not_found() {
        let result = load_spirv(Path::new("/definitely/not/here.spv"));
        assert!(matches!(result, Err(RenderError::NotFound(_))));
    }

    #[test]
    fn loads_words_from_disk() {
        let path = std::env::temp_dir().join("aster_shader_load_test.spv");
        std::fs::write(&path, words_to_bytes(&[SPIRV_MAGIC, 0x0001_0000, 7])).unwrap();

        let words = load_spirv(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000, 7]);
    }
}
