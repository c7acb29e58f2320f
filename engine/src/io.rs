//! Crash-safe file writes.
//!
//! Uses the temp-file + fsync + rename pattern: readers see either the old
//! file or the complete new one, never a partial write.

use std::io::Write;
use std::path::Path;

/// Write `contents` to `target` atomically, creating parent directories.
pub fn write_atomic(target: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    let temp_path = parent.join(format!(".{file_name}.{}.tmp", std::process::id()));

    let mut file = std::fs::File::create(&temp_path)?;
    if let Err(e) = file.write_all(contents).and_then(|()| file.sync_all()) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }
    drop(file);

    std::fs::rename(&temp_path, target).inspect_err(|_| {
        let _ = std::fs::remove_file(&temp_path);
    })
}

/// Write `contents` to `target` only if it does not exist yet
pub fn write_new_atomic(target: &Path, contents: &[u8]) -> std::io::Result<()> {
    if target.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", target.display()),
        ));
    }
    write_atomic(target, contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_creates_and_replaces() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a").join("b").join("file.json");
        write_atomic(&path, b"one").expect("write");
        write_atomic(&path, b"two").expect("rewrite");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "two");

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().expect("parent"))
            .expect("read_dir")
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_write_new_refuses_existing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("payload.json");
        write_new_atomic(&path, b"{}").expect("write");
        let err = write_new_atomic(&path, b"{}").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);
    }
}
