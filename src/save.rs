//! Writing rendered output to disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Where `path` resolves to: `path/default_name` when it is a directory,
/// `path` itself otherwise.
pub fn output_path(path: &Path, default_name: &str) -> PathBuf {
    if path.is_dir() {
        path.join(default_name)
    } else {
        path.to_path_buf()
    }
}

/// Atomically write `bytes` to `path` (see [`output_path`]).
///
/// The parent directory must exist; nothing is created otherwise.
pub fn save(path: &Path, default_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let target = output_path(path, default_name);
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        return Err(Error::Config(format!("directory {} does not exist", dir.display())));
    }

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(&target).map_err(|e| Error::Io(e.error))?;

    log::info!("Wrote {} ({} bytes)", target.display(), bytes.len());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_directory_uses_default_name() {
        let tmp = tempfile::tempdir().unwrap();
        let written = save(tmp.path(), "aws.json", b"{}").unwrap();
        assert_eq!(written, tmp.path().join("aws.json"));
        assert_eq!(fs::read(written).unwrap(), b"{}");
    }

    #[test]
    fn test_explicit_file_is_replaced() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("ranges.txt");
        fs::write(&target, b"old").unwrap();
        save(&target, "ignored.txt", b"new").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert!(!tmp.path().join("ignored.txt").exists());
    }

    #[test]
    fn test_missing_parent_creates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("missing").join("out.json");
        assert!(matches!(save(&target, "x", b"{}"), Err(Error::Config(_))));
        assert!(!tmp.path().join("missing").exists());
    }
}
