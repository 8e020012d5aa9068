//! Capability-based filesystem helpers built on `cap-std` and `camino`.
//!
//! Object storage on disk and the CLI's database location both go through
//! these helpers, so every file operation is scoped to an opened directory
//! handle rather than ambient paths.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io;
use std::path::Component;

/// Create `path` (and its ancestors) if needed and open it as a directory.
pub fn open_or_create_dir(path: &Utf8Path) -> io::Result<fs_utf8::Dir> {
    let (base_dir, relative) = base_dir_and_relative(path)?;
    if relative.as_os_str().is_empty() {
        return Ok(base_dir);
    }
    base_dir.create_dir_all(&relative)?;
    base_dir.open_dir(&relative)
}

/// Ensure the parent directory for `path` exists, handling absolute paths safely for cap-std.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }
    open_or_create_dir(parent).map(drop)
}

/// Write `bytes` to `relative` inside `dir`, creating intermediate directories.
pub fn write_in_dir(dir: &fs_utf8::Dir, relative: &Utf8Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = relative.parent()
        && !parent.as_os_str().is_empty()
    {
        dir.create_dir_all(parent)?;
    }
    dir.write(relative, bytes)
}

/// Report whether `relative` names a regular file inside `dir`.
pub fn file_exists_in_dir(dir: &fs_utf8::Dir, relative: &Utf8Path) -> io::Result<bool> {
    match dir.metadata(relative) {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Remove `relative` from `dir`. Returns `false` when it did not exist.
pub fn remove_file_in_dir(dir: &fs_utf8::Dir, relative: &Utf8Path) -> io::Result<bool> {
    match dir.remove_file(relative) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// File names directly inside `relative`, sorted. A missing directory yields
/// an empty list.
pub fn list_file_names(dir: &fs_utf8::Dir, relative: &Utf8Path) -> io::Result<Vec<String>> {
    let entries = match dir.read_dir(relative) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name()?);
        }
    }
    names.sort_unstable();
    Ok(names)
}

/// Split an absolute or relative path into an ambient base directory and a relative suffix.
pub fn base_dir_and_relative(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();

    let (base, relative) = match std_path.components().next() {
        // Windows absolute path with a drive or UNC prefix.
        Some(Component::Prefix(prefix)) => {
            let prefix_str = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;

            let base = Utf8PathBuf::from(prefix_str).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_path
                .strip_prefix(base.as_std_path())
                .or_else(|_| std_path.strip_prefix(prefix.as_os_str()))
                .map_err(|_| io::Error::other("failed to strip prefix from path"))?
                .to_path_buf();
            (base, relative)
        }
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_path
                .strip_prefix(base.as_std_path())
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?
                .to_path_buf();
            (base, relative)
        }
        _ => (Utf8PathBuf::from("."), std_path.to_path_buf()),
    };

    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    let relative =
        Utf8PathBuf::from_path_buf(relative).map_err(|_| io::Error::other("non-UTF-8 path"))?;

    Ok((dir, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn utf8_root(temp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp dir")
    }

    #[rstest]
    fn writes_nested_files_and_lists_them() {
        let temp = TempDir::new().expect("create temp dir");
        let dir = open_or_create_dir(&utf8_root(&temp).join("objects")).expect("open dir");
        write_in_dir(&dir, Utf8Path::new("spots/b.jpg"), b"b").expect("write b");
        write_in_dir(&dir, Utf8Path::new("spots/a.jpg"), b"a").expect("write a");

        let names = list_file_names(&dir, Utf8Path::new("spots")).expect("list");
        assert_eq!(names, vec!["a.jpg".to_owned(), "b.jpg".to_owned()]);
        assert!(file_exists_in_dir(&dir, Utf8Path::new("spots/a.jpg")).expect("stat"));
    }

    #[rstest]
    fn removing_missing_files_reports_false() {
        let temp = TempDir::new().expect("create temp dir");
        let dir = open_or_create_dir(&utf8_root(&temp)).expect("open dir");
        assert!(!remove_file_in_dir(&dir, Utf8Path::new("nope.jpg")).expect("remove"));
        assert!(list_file_names(&dir, Utf8Path::new("absent")).expect("list").is_empty());
    }

    #[rstest]
    fn ensure_parent_dir_creates_missing_ancestors() {
        let temp = TempDir::new().expect("create temp dir");
        let target = utf8_root(&temp).join("a/b/spots.db");
        ensure_parent_dir(&target).expect("create parents");
        assert!(target.parent().expect("parent").is_dir());
    }
}
