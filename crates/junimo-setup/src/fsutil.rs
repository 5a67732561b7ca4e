//! Filesystem helpers.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::Result;

/// Recursively merge `src` into `dst`.
///
/// Directories are created as needed, files overwrite same-named files,
/// and files only present in `dst` are left alone. Nothing is deleted.
pub fn merge_dir(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(std::io::Error::from)?;
        let rel = entry.path().strip_prefix(src).unwrap_or(Path::new(""));
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
