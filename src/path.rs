//! Absolute path resolution: walks `/`-separated components from the root
//! inode, one directory lookup per component.

use crate::alloc::{Allocator, InodeKind};
use crate::dir;
use crate::error::{FsError, Result};
use crate::MAX_NAME_LEN;

fn tokenize(path: &str) -> Result<Vec<String>> {
    if !path.starts_with('/') {
        return Err(FsError::InvalidPath);
    }
    if path == "/" {
        return Ok(Vec::new());
    }
    let rest = &path[1..];
    let parts: Vec<&str> = rest.split('/').collect();
    if parts.iter().any(|p| p.is_empty() || p.len() > MAX_NAME_LEN) {
        return Err(FsError::InvalidPath);
    }
    Ok(parts.into_iter().map(str::to_string).collect())
}

/// Resolves an absolute path to its inode number and its parent's inode
/// number. The root directory resolves to `(-1, -1)`. Fails with
/// [`FsError::NotFound`] the moment a component is missing, or
/// [`FsError::InvalidPath`] if a non-final component isn't a directory.
pub(crate) fn resolve(alloc: &Allocator, path: &str) -> Result<(i32, i32)> {
    let parts = tokenize(path)?;
    if parts.is_empty() {
        return Ok((-1, -1));
    }
    let mut current: i32 = -1;
    let mut parent: i32 = -1;
    for part in &parts {
        let dir_inode = alloc.get_inode(current)?;
        if dir_inode.kind != InodeKind::Directory {
            return Err(FsError::InvalidPath);
        }
        match dir::find_entry(alloc, &dir_inode, part)? {
            Some(n) => {
                parent = current;
                current = n as i32;
            }
            None => return Err(FsError::NotFound),
        }
    }
    Ok((current, parent))
}

/// Resolves everything up to but not including the final component, for
/// operations that create a new entry (`mkdir`, file creation via `open`).
/// Returns the parent's inode number and the final component's name.
pub(crate) fn resolve_parent(alloc: &Allocator, path: &str) -> Result<(i32, String)> {
    let mut parts = tokenize(path)?;
    let name = parts.pop().ok_or(FsError::InvalidPath)?;
    let mut current: i32 = -1;
    for part in &parts {
        let dir_inode = alloc.get_inode(current)?;
        if dir_inode.kind != InodeKind::Directory {
            return Err(FsError::InvalidPath);
        }
        match dir::find_entry(alloc, &dir_inode, part)? {
            Some(n) => current = n as i32,
            None => return Err(FsError::NotFound),
        }
    }
    Ok((current, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::Allocator;
    use crate::disk::DiskBackend;
    use tempfile::tempdir;

    fn fresh() -> (tempfile::TempDir, Allocator) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vdisk");
        (dir, Allocator::format(DiskBackend::new(path)).unwrap())
    }

    #[test]
    fn root_resolves_to_sentinel_pair() {
        let (_dir, alloc) = fresh();
        assert_eq!(resolve(&alloc, "/").unwrap(), (-1, -1));
    }

    #[test]
    fn relative_path_is_invalid() {
        let (_dir, alloc) = fresh();
        assert!(matches!(resolve(&alloc, "home").unwrap_err(), FsError::InvalidPath));
    }

    #[test]
    fn missing_component_is_not_found() {
        let (_dir, alloc) = fresh();
        assert!(matches!(resolve(&alloc, "/nope").unwrap_err(), FsError::NotFound));
    }

    #[test]
    fn empty_interior_component_is_invalid() {
        let (_dir, alloc) = fresh();
        assert!(matches!(resolve(&alloc, "/a//b").unwrap_err(), FsError::InvalidPath));
        assert!(matches!(resolve(&alloc, "/a/").unwrap_err(), FsError::InvalidPath));
    }

    #[test]
    fn resolve_parent_splits_final_component() {
        let (_dir, alloc) = fresh();
        let (parent, name) = resolve_parent(&alloc, "/home123").unwrap();
        assert_eq!(parent, -1);
        assert_eq!(name, "home123");
    }
}
