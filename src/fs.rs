//! Bootstrap and public facade: the one type this crate exports.

use std::path::Path;

use log::{debug, trace, warn};

use crate::alloc::{Allocator, Inode, InodeKind};
use crate::dir;
use crate::disk::DiskBackend;
use crate::error::{FsError, Result};
use crate::path;
use crate::session::OpenFile;

/// A mounted virtual disk: directory tree plus at most one open file.
///
/// Constructed with [`FileSystem::open`] (formats a fresh backing file if
/// none exists, mounts otherwise) or [`FileSystem::open_default`].
pub struct FileSystem {
    alloc: Allocator,
    session: Option<OpenFile>,
}

impl FileSystem {
    /// Opens the backing file at `path`, formatting it first if it doesn't
    /// exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let disk = DiskBackend::new(path);
        let alloc = if disk.exists() {
            debug!("mounting existing backing file at {}", path.display());
            Allocator::mount(disk)?
        } else {
            debug!("no backing file at {}, formatting", path.display());
            Allocator::format(disk)?
        };
        Ok(FileSystem { alloc, session: None })
    }

    /// Opens (or formats) `vdisk` in the process's current working
    /// directory, matching the original driver's hardcoded filename.
    pub fn open_default() -> Result<Self> {
        Self::open("vdisk")
    }

    /// Creates a new, empty directory at `path`.
    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        let (parent_num, name) = path::resolve_parent(&self.alloc, path)?;
        let parent_inode = self.alloc.get_inode(parent_num)?;
        if parent_inode.kind != InodeKind::Directory {
            return Err(FsError::InvalidPath);
        }
        if dir::find_entry(&self.alloc, &parent_inode, &name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        if !dir::has_free_slot(&self.alloc, &parent_inode)? {
            warn!("mkdir {path}: parent directory is full");
            return Err(FsError::NoSpace);
        }

        let new_inode_num = self.alloc.get_free_inode().ok_or(FsError::NoSpace)?;
        let data_block = self.alloc.get_free_block().ok_or(FsError::NoSpace)?;
        let block_bytes = dir::new_dir_block(new_inode_num as i32, parent_num);
        self.alloc.write_block(data_block, &block_bytes)?;
        self.alloc.set_inode(new_inode_num, &Inode::new_dir(data_block))?;
        dir::add_entry(&self.alloc, &parent_inode, &name, new_inode_num)?;
        debug!("mkdir {path} -> inode {new_inode_num}");
        Ok(())
    }

    /// Removes the empty directory at `path`.
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        let (inode_num, parent_num) = path::resolve(&self.alloc, path)?;
        if inode_num == -1 {
            return Err(FsError::WrongKind);
        }
        let target = self.alloc.get_inode(inode_num)?;
        if target.kind != InodeKind::Directory {
            return Err(FsError::WrongKind);
        }
        if !dir::is_empty(&self.alloc, &target)? {
            return Err(FsError::NotEmpty);
        }
        let data_block = target.direct[0].get().ok_or(FsError::InvariantViolation)?;
        self.alloc.free_block(data_block)?;
        self.alloc.free_inode(inode_num as u32)?;
        let parent_inode = self.alloc.get_inode(parent_num)?;
        dir::remove_entry_by_inode(&self.alloc, &parent_inode, inode_num as u32)?;
        debug!("rmdir {path}");
        Ok(())
    }

    /// Opens (creating if missing) the file at `path` as the filesystem's
    /// single active session.
    pub fn open_file(&mut self, path: &str) -> Result<()> {
        if self.session.is_some() {
            return Err(FsError::ConflictingState);
        }
        let (inode_num, parent_num) = match path::resolve(&self.alloc, path) {
            Ok(pair) => pair,
            Err(FsError::NotFound) => {
                let (parent_num, name) = path::resolve_parent(&self.alloc, path)?;
                let parent_inode = self.alloc.get_inode(parent_num)?;
                if parent_inode.kind != InodeKind::Directory {
                    return Err(FsError::InvalidPath);
                }
                if !dir::has_free_slot(&self.alloc, &parent_inode)? {
                    warn!("open_file {path}: parent directory is full");
                    return Err(FsError::NoSpace);
                }
                let new_inode_num = self.alloc.get_free_inode().ok_or(FsError::NoSpace)?;
                self.alloc.set_inode(new_inode_num, &Inode::new_file())?;
                dir::add_entry(&self.alloc, &parent_inode, &name, new_inode_num)?;
                trace!("created new file {path} as inode {new_inode_num}");
                (new_inode_num as i32, parent_num)
            }
            Err(e) => return Err(e),
        };
        let _ = parent_num;
        let inode = self.alloc.get_inode(inode_num)?;
        if inode.kind != InodeKind::File {
            return Err(FsError::WrongKind);
        }
        self.session = Some(OpenFile::new(inode_num, inode));
        Ok(())
    }

    fn open_file_mut(&mut self) -> Result<&mut OpenFile> {
        self.session.as_mut().ok_or(FsError::ConflictingState)
    }

    /// Moves the write head to `n` bytes from the start of the open file.
    pub fn seekw(&mut self, n: u32) -> Result<()> {
        self.open_file_mut()?.seekw(n)
    }

    /// Moves the read head to `n` bytes from the start of the open file.
    pub fn seekr(&mut self, n: u32) -> Result<()> {
        self.open_file_mut()?.seekr(n)
    }

    /// Writes `buf` at the open file's write head, growing the file if
    /// needed.
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        let alloc = &mut self.alloc;
        self.session.as_mut().ok_or(FsError::ConflictingState)?.write(alloc, buf)
    }

    /// Reads `buf.len()` bytes from the open file's read head.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let alloc = &self.alloc;
        self.session.as_mut().ok_or(FsError::ConflictingState)?.read(alloc, buf)
    }

    /// Closes the currently open file, persisting its inode.
    pub fn close(&mut self) -> Result<()> {
        let file = self.session.take().ok_or(FsError::ConflictingState)?;
        file.close(&mut self.alloc)
    }

    /// Removes the file at `path`, freeing its inode and every block it
    /// references. Fails if the file is currently open.
    pub fn remove(&mut self, path: &str) -> Result<()> {
        let (inode_num, parent_num) = path::resolve(&self.alloc, path)?;
        if inode_num == -1 {
            return Err(FsError::WrongKind);
        }
        if let Some(open) = &self.session {
            if open.inode_num == inode_num {
                return Err(FsError::ConflictingState);
            }
        }
        let target = self.alloc.get_inode(inode_num)?;
        if target.kind != InodeKind::File {
            return Err(FsError::WrongKind);
        }
        crate::indirect::free_all_blocks(&mut self.alloc, &target)?;
        self.alloc.free_inode(inode_num as u32)?;
        let parent_inode = self.alloc.get_inode(parent_num)?;
        dir::remove_entry_by_inode(&self.alloc, &parent_inode, inode_num as u32)?;
        debug!("removed {path}");
        Ok(())
    }

    /// The open file's size, or `None` if no file is open.
    pub fn open_file_size(&self) -> Option<u64> {
        self.session.as_ref().map(|f| f.size() as u64)
    }
}

impl std::fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystem")
            .field("path", &self.alloc.disk_path())
            .field("file_open", &self.session.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fresh_fs() -> (tempfile::TempDir, FileSystem) {
        let dir = tempdir().unwrap();
        let fs = FileSystem::open(dir.path().join("vdisk")).unwrap();
        (dir, fs)
    }

    #[test]
    fn scenario_1_format_on_first_run() {
        let dir = tempdir().unwrap();
        let vdisk = dir.path().join("vdisk");
        assert!(!vdisk.exists());
        let _fs = FileSystem::open(&vdisk).unwrap();
        assert!(vdisk.exists());
        assert_eq!(
            std::fs::metadata(&vdisk).unwrap().len(),
            crate::NUM_BLOCKS as u64 * crate::BLOCK_SIZE as u64
        );

        let bytes = std::fs::read(&vdisk).unwrap();
        let magic = i32::from_le_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(magic, crate::MAGIC);
    }

    #[test]
    fn scenario_2_directory_nesting() {
        let (_dir, mut fs) = fresh_fs();
        fs.mkdir("/a").unwrap();
        assert!(matches!(fs.mkdir("/a").unwrap_err(), FsError::AlreadyExists));
        assert!(matches!(fs.mkdir("a").unwrap_err(), FsError::InvalidPath));
        fs.mkdir("/a/b").unwrap();
    }

    #[test]
    fn scenario_3_small_file_round_trip() {
        let (_dir, mut fs) = fresh_fs();
        fs.mkdir("/a").unwrap();
        fs.mkdir("/a/b").unwrap();
        fs.open_file("/a/b/f").unwrap();

        let line = b"hello darkness my old friend\n";
        for _ in 0..10 {
            fs.write(line).unwrap();
        }
        assert_eq!(fs.open_file_size(), Some(290));

        fs.seekr(0).unwrap();
        let mut buf = [0u8; 290];
        fs.read(&mut buf).unwrap();
        let expected: Vec<u8> = line.repeat(10);
        assert_eq!(&buf[..], &expected[..]);
        fs.close().unwrap();
    }

    #[test]
    fn scenario_4_large_file_spanning_indirects() {
        let (_dir, mut fs) = fresh_fs();
        fs.mkdir("/a").unwrap();
        fs.mkdir("/a/b").unwrap();
        fs.open_file("/a/b/f").unwrap();

        let chunk = [7u8; 290];
        for _ in 0..500 {
            fs.write(&chunk).unwrap();
            fs.write(&chunk).unwrap();
        }
        assert_eq!(fs.open_file_size(), Some(290_000));

        fs.seekr(0).unwrap();
        let mut buf = vec![0u8; 290_000];
        fs.read(&mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 7));
        fs.close().unwrap();
    }

    #[test]
    fn scenario_5_remove_file_reclaims_space() {
        let (_dir, mut fs) = fresh_fs();
        fs.mkdir("/a").unwrap();
        fs.mkdir("/a/b").unwrap();
        fs.open_file("/a/b/f").unwrap();
        let chunk = [1u8; 290];
        for _ in 0..500 {
            fs.write(&chunk).unwrap();
            fs.write(&chunk).unwrap();
        }
        fs.close().unwrap();

        fs.remove("/a/b/f").unwrap();
        assert!(matches!(
            path::resolve(&fs.alloc, "/a/b/f").unwrap_err(),
            FsError::NotFound
        ));
    }

    #[test]
    fn scenario_6_rmdir_ordering() {
        let (_dir, mut fs) = fresh_fs();
        fs.mkdir("/a").unwrap();
        fs.mkdir("/a/b").unwrap();
        assert!(matches!(fs.rmdir("/a").unwrap_err(), FsError::NotEmpty));
        fs.rmdir("/a/b").unwrap();
        fs.rmdir("/a").unwrap();
        assert!(matches!(fs.rmdir("/a").unwrap_err(), FsError::NotFound));
    }

    #[test]
    fn open_fails_while_another_file_is_open() {
        let (_dir, mut fs) = fresh_fs();
        fs.mkdir("/a").unwrap();
        fs.open_file("/a/f").unwrap();
        assert!(matches!(
            fs.open_file("/a/g").unwrap_err(),
            FsError::ConflictingState
        ));
    }

    #[test]
    fn remove_fails_on_the_currently_open_file() {
        let (_dir, mut fs) = fresh_fs();
        fs.open_file("/f").unwrap();
        assert!(matches!(fs.remove("/f").unwrap_err(), FsError::ConflictingState));
    }

    #[test]
    fn write_at_unaligned_offset_preserves_surrounding_bytes() {
        let (_dir, mut fs) = fresh_fs();
        fs.open_file("/f").unwrap();
        fs.write(&[0u8; 20]).unwrap();
        fs.seekw(5).unwrap();
        fs.write(b"XXXXX").unwrap();
        fs.close().unwrap();

        fs.open_file("/f").unwrap();
        let mut buf = [0u8; 20];
        fs.read(&mut buf).unwrap();
        assert_eq!(&buf[0..5], &[0u8; 5]);
        assert_eq!(&buf[5..10], b"XXXXX");
        assert_eq!(&buf[10..20], &[0u8; 10]);
    }

    #[test]
    fn mkdir_then_rmdir_restores_free_counts() {
        let (_dir, mut fs) = fresh_fs();
        let free_blocks_before = fs.alloc.get_free_block();
        if let Some(b) = free_blocks_before {
            fs.alloc.free_block(b).unwrap();
        }
        let free_inode_before = fs.alloc.get_free_inode();

        fs.mkdir("/tmp").unwrap();
        fs.rmdir("/tmp").unwrap();

        assert_eq!(fs.alloc.get_free_inode(), free_inode_before);
    }

    #[test]
    fn path_resolver_rejects_relative_and_empty_components() {
        let (_dir, fs) = fresh_fs();
        assert!(matches!(path::resolve(&fs.alloc, "rel").unwrap_err(), FsError::InvalidPath));
        assert!(matches!(path::resolve(&fs.alloc, "/a//b").unwrap_err(), FsError::InvalidPath));
    }
}
