//! Writing tree entries onto the local filesystem.

use crate::util::fs::create_dir_all;
use std::ffi::OsStr;
use std::fs::OpenOptions;
use std::io::Read;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Component, Path, PathBuf};
use vmforge_shared::errors::{ResultExt, VmforgeError, VmforgeResult};

/// Git file mode identifying a symbolic link.
pub const SYMLINK_MODE: u32 = 0o120000;

/// What was written for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    File,
    Symlink,
}

/// Write one entry below `dest`.
///
/// Missing parent directories are created. Symlink entries carry the link
/// target as their content. Regular files are created exclusively: an
/// existing path at the destination is an error, never overwritten.
pub fn materialize_entry<R: Read>(
    dest: &Path,
    relative: &Path,
    mode: u32,
    mut content: R,
) -> VmforgeResult<Materialized> {
    let target = resolve_target(dest, relative)?;

    if let Some(parent) = target.parent() {
        create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    if mode == SYMLINK_MODE {
        let mut link = Vec::new();
        content
            .read_to_end(&mut link)
            .with_context(|| format!("Failed to read link target for {}", relative.display()))?;
        std::os::unix::fs::symlink(OsStr::from_bytes(&link), &target)
            .with_context(|| format!("Failed to create symlink {}", target.display()))?;
        return Ok(Materialized::Symlink);
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode & 0o7777)
        .open(&target)
        .with_context(|| format!("Failed to create file {}", target.display()))?;
    std::io::copy(&mut content, &mut file)
        .with_context(|| format!("Failed to write file {}", target.display()))?;

    Ok(Materialized::File)
}

/// Join `relative` onto `dest`, refusing paths that would escape it.
fn resolve_target(dest: &Path, relative: &Path) -> VmforgeResult<PathBuf> {
    let mut has_name = false;
    for component in relative.components() {
        match component {
            Component::Normal(_) => has_name = true,
            Component::CurDir => {}
            _ => {
                return Err(VmforgeError::Storage(format!(
                    "refusing to write entry outside destination: {}",
                    relative.display()
                )));
            }
        }
    }
    if !has_name {
        return Err(VmforgeError::Storage("empty entry path".into()));
    }
    Ok(dest.join(relative))
}
