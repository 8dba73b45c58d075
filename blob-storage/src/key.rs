use std::ffi::OsString;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use crate::error::{BlobResult, BlobStoreError};

/// Characters the host refuses inside a single file name.
#[cfg(windows)]
const INVALID_FILE_NAME_CHARS: &[char] = &['"', '<', '>', '|', ':', '*', '?', '\\', '/'];
#[cfg(not(windows))]
const INVALID_FILE_NAME_CHARS: &[char] = &['\0', '/'];

fn is_invalid_file_name_char(c: char) -> bool {
    if cfg!(windows) && c.is_ascii_control() && (c as u32) < 32 {
        return true;
    }
    INVALID_FILE_NAME_CHARS.contains(&c)
}

/// Checks that `key` can be used verbatim as one file name under the base directory.
pub fn validate_key(key: &str) -> BlobResult<()> {
    if key.is_empty() {
        return Err(BlobStoreError::invalid("key must not be empty"));
    }
    if key == "." || key == ".." {
        return Err(BlobStoreError::invalid(format!("key {key:?} is a reserved name")));
    }
    if let Some(c) = key.chars().find(|c| is_invalid_file_name_char(*c)) {
        return Err(BlobStoreError::invalid(format!(
            "key {key:?} contains invalid file name character {c:?}"
        )));
    }
    Ok(())
}

/// Maps a key onto its file under `base_path`. Pure; touches nothing on disk.
pub fn resolve(base_path: &Path, key: &str) -> BlobResult<PathBuf> {
    validate_key(key)?;
    Ok(base_path.join(key))
}

/// Sibling path used while a blob is being written: `<stem>.<token>.<ext>`.
pub(crate) fn temp_path_for(target: &Path) -> PathBuf {
    let token = Uuid::new_v4().simple().to_string();

    let mut name = OsString::new();
    if let Some(stem) = target.file_stem() {
        name.push(stem);
    }
    name.push(".");
    name.push(&token);
    if let Some(ext) = target.extension() {
        name.push(".");
        name.push(ext);
    }
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_joins_key_as_single_segment() {
        let base = Path::new("blobs");
        let path = resolve(base, "photo.jpg").unwrap();
        assert_eq!(path, base.join("photo.jpg"));
        assert_eq!(path.parent(), Some(base));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let base = Path::new("blobs");
        assert_eq!(resolve(base, "a").unwrap(), resolve(base, "a").unwrap());
        assert_ne!(resolve(base, "a").unwrap(), resolve(base, "b").unwrap());
    }

    #[test]
    fn test_empty_key_rejected() {
        let err = resolve(Path::new("blobs"), "").unwrap_err();
        assert!(matches!(err, BlobStoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_reserved_names_rejected() {
        for key in [".", ".."] {
            let err = validate_key(key).unwrap_err();
            assert!(matches!(err, BlobStoreError::InvalidArgument(_)), "{key}");
        }
    }

    #[test]
    fn test_separator_and_nul_rejected() {
        for key in ["a/b", "../escape", "nul\0byte"] {
            let err = validate_key(key).unwrap_err();
            assert!(matches!(err, BlobStoreError::InvalidArgument(_)), "{key:?}");
        }
    }

    #[cfg(windows)]
    #[test]
    fn test_windows_reserved_punctuation_rejected() {
        for key in ["a\\b", "c:d", "what?", "star*", "pipe|", "<tag>", "quote\"", "bell\u{7}"] {
            assert!(validate_key(key).is_err(), "{key:?}");
        }
    }

    #[test]
    fn test_ordinary_keys_accepted() {
        for key in ["chunk", "chunk.bin", ".hidden", "with space", "ünïcödé", "a..b"] {
            validate_key(key).unwrap();
        }
    }

    #[test]
    fn test_temp_path_keeps_extension_and_directory() {
        let target = Path::new("blobs").join("report.final.pdf");
        let temp = temp_path_for(&target);

        assert_eq!(temp.parent(), target.parent());
        let name = temp.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("report.final."));
        assert!(name.ends_with(".pdf"));
        // stem + '.' + 32 hex chars + '.' + ext
        assert_eq!(name.len(), "report.final".len() + 1 + 32 + 1 + "pdf".len());
    }

    #[test]
    fn test_temp_path_without_extension() {
        let target = Path::new("blobs").join("chunk");
        let name = temp_path_for(&target).file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("chunk."));
        assert_eq!(name.len(), "chunk".len() + 1 + 32);
    }

    #[test]
    fn test_temp_paths_are_unique() {
        let target = Path::new("blobs").join("chunk.bin");
        assert_ne!(temp_path_for(&target), temp_path_for(&target));
    }
}
