//! Safe ZIP extraction.
//!
//! Every entry name is resolved lexically against the destination and the
//! archive is rejected before anything is written if any entry would land
//! outside it.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use crate::error::{Error, Result};

/// Mode used for created directories.
pub const DIR_MODE: u32 = 0o755;

/// Extract `archive` into `dest`, returning the paths of the written files.
///
/// `dest` is created when missing. Directory entries are created
/// recursively and files keep their archived unix mode. Extraction stops at
/// the first failing entry; outputs already written are left in place.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(archive)
        .map_err(|e| Error::Extraction(format!("cannot open {}: {}", archive.display(), e)))?;
    let mut zip = ZipArchive::new(file)?;

    create_dir_all(dest)?;
    let dest = dest
        .canonicalize()
        .map_err(|e| Error::Extraction(format!("cannot resolve {}: {}", dest.display(), e)))?;

    // Validate every entry before touching the filesystem
    let mut targets = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let entry = zip.by_index(i)?;
        let target = resolve_entry(&dest, entry.name())?;
        targets.push(target);
    }

    let mut written = Vec::new();
    for (i, target) in targets.into_iter().enumerate() {
        let mut entry = zip.by_index(i)?;

        if entry.is_dir() {
            create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            create_dir_all(parent)?;
        }

        let mut out = File::create(&target)
            .map_err(|e| Error::Extraction(format!("cannot create {}: {}", target.display(), e)))?;
        io::copy(&mut entry, &mut out)
            .map_err(|e| Error::Extraction(format!("cannot write {}: {}", target.display(), e)))?;

        if let Some(mode) = entry.unix_mode() {
            set_mode(&target, mode)?;
        }

        log::debug!("Extracted {}", target.display());
        written.push(target);
    }

    log::info!(
        "Extracted {} file(s) from {} into {}",
        written.len(),
        archive.display(),
        dest.display()
    );
    Ok(written)
}

/// Join an entry name onto `dest`, rejecting anything that escapes it.
pub fn resolve_entry(dest: &Path, name: &str) -> Result<PathBuf> {
    let mut resolved = dest.to_path_buf();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::Extraction(format!("illegal file path: {}", name)));
            }
        }
    }

    if !resolved.starts_with(dest) || resolved == dest {
        return Err(Error::Extraction(format!("illegal file path: {}", name)));
    }
    Ok(resolved)
}

/// True when every expected file is already present under `root`.
pub fn all_present(root: &Path, expected: &[&str]) -> bool {
    !expected.is_empty() && expected.iter().all(|name| root.join(name).is_file())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

fn create_dir_all(path: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder
        .create(path)
        .map_err(|e| Error::Extraction(format!("cannot create directory {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                writer
                    .start_file(*name, SimpleFileOptions::default().unix_permissions(0o640))
                    .unwrap();
                writer.write_all(data.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extract_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("a.zip");
        build_zip(
            &archive,
            &[("db_20220705/", ""), ("db_20220705/blocks.csv", "network\n10.0.0.0/8\n")],
        );

        let dest = tmp.path().join("out");
        let written = extract_zip(&archive, &dest).unwrap();
        assert_eq!(written.len(), 1);
        let data = fs::read(dest.join("db_20220705/blocks.csv")).unwrap();
        assert_eq!(data, b"network\n10.0.0.0/8\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_preserves_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("a.zip");
        build_zip(&archive, &[("file.csv", "x")]);

        let dest = tmp.path().join("out");
        extract_zip(&archive, &dest).unwrap();
        let mode = fs::metadata(dest.join("file.csv")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn test_traversal_rejected_before_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("evil.zip");
        build_zip(&archive, &[("inner/file.csv", "ok"), ("../escape.csv", "evil")]);

        let dest = tmp.path().join("out");
        let err = extract_zip(&archive, &dest).unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
        assert!(!tmp.path().join("escape.csv").exists());
        assert!(!dest.join("inner/file.csv").exists());
    }

    #[test]
    fn test_resolve_entry() {
        let dest = Path::new("/data/out");
        assert_eq!(resolve_entry(dest, "a/b.csv").unwrap(), PathBuf::from("/data/out/a/b.csv"));
        assert_eq!(resolve_entry(dest, "a/../b.csv").unwrap(), PathBuf::from("/data/out/b.csv"));
        assert!(resolve_entry(dest, "../x.csv").is_err());
        assert!(resolve_entry(dest, "a/../../x.csv").is_err());
        assert!(resolve_entry(dest, "/etc/passwd").is_err());
        assert!(resolve_entry(dest, "..").is_err());
    }

    #[test]
    fn test_all_present() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.csv"), "x").unwrap();
        assert!(all_present(tmp.path(), &["a.csv"]));
        assert!(!all_present(tmp.path(), &["a.csv", "b.csv"]));
        assert!(!all_present(tmp.path(), &[]));
    }

    #[test]
    fn test_not_a_zip() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("bad.zip");
        fs::write(&archive, b"not a zip").unwrap();
        assert!(extract_zip(&archive, &tmp.path().join("out")).is_err());
    }
}
