//! Disk backend: aligned block-sized I/O against the backing file.
//!
//! No persistent file handle is kept between calls — each primitive opens,
//! seeks, transfers, and closes, mirroring how this corpus's userspace disk
//! tools never hold a device open across operations.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::{
    BLOCK_SIZE, INODE_SIZE, NUM_INODES, SUPERBLOCK_FREE_INODES_OFFSET, SUPERBLOCK_ROOT_INODE_OFFSET,
    SUPERBLOCK_SIZE,
};

/// Handle to the backing file. Cheap to clone-by-reference since it holds only
/// a path.
pub(crate) struct DiskBackend {
    path: PathBuf,
}

impl DiskBackend {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn exists(&self) -> bool {
        self.path.as_path().exists()
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut f = OpenOptions::new().read(true).open(&self.path)?;
        f.seek(SeekFrom::Start(offset))?;
        f.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<()> {
        let mut f = OpenOptions::new().read(true).write(true).open(&self.path)?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(buf)?;
        Ok(())
    }

    /// Creates the backing file (truncating it if present) and extends it to
    /// the full disk size by writing zeroed blocks.
    pub(crate) fn create_zeroed(&self, num_blocks: u32) -> Result<()> {
        let mut f = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        let zero = [0u8; BLOCK_SIZE];
        for _ in 0..num_blocks {
            f.write_all(&zero)?;
        }
        Ok(())
    }

    pub(crate) fn read_block(&self, b: u32) -> Result<[u8; BLOCK_SIZE]> {
        let mut buf = [0u8; BLOCK_SIZE];
        self.read_at(block_offset(b), &mut buf)?;
        Ok(buf)
    }

    pub(crate) fn write_block(&self, b: u32, data: &[u8; BLOCK_SIZE]) -> Result<()> {
        self.write_at(block_offset(b), data)
    }

    pub(crate) fn read_inode_slot(&self, i: u32) -> Result<[u8; INODE_SIZE]> {
        let mut buf = [0u8; INODE_SIZE];
        self.read_at(inode_slot_offset(i), &mut buf)?;
        Ok(buf)
    }

    pub(crate) fn write_inode_slot(&self, i: u32, data: &[u8; INODE_SIZE]) -> Result<()> {
        self.write_at(inode_slot_offset(i), data)
    }

    pub(crate) fn read_bitmap_byte(&self, byte_idx: usize) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_at(block_offset(1) + byte_idx as u64, &mut buf)?;
        Ok(buf[0])
    }

    pub(crate) fn write_bitmap_byte(&self, byte_idx: usize, v: u8) -> Result<()> {
        self.write_at(block_offset(1) + byte_idx as u64, &[v])
    }

    pub(crate) fn read_superblock(&self) -> Result<[u8; SUPERBLOCK_SIZE]> {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        self.read_at(0, &mut buf)?;
        Ok(buf)
    }

    pub(crate) fn write_superblock(&self, data: &[u8; SUPERBLOCK_SIZE]) -> Result<()> {
        self.write_at(0, data)
    }

    /// Reads just the root inode record embedded at the tail of the superblock.
    pub(crate) fn read_root_inode(&self) -> Result<[u8; INODE_SIZE]> {
        let mut buf = [0u8; INODE_SIZE];
        self.read_at(SUPERBLOCK_ROOT_INODE_OFFSET as u64, &mut buf)?;
        Ok(buf)
    }

    /// Writes just the root inode record embedded at the tail of the superblock.
    pub(crate) fn write_root_inode(&self, data: &[u8; INODE_SIZE]) -> Result<()> {
        self.write_at(SUPERBLOCK_ROOT_INODE_OFFSET as u64, data)
    }

    pub(crate) fn read_super_free_inode_byte(&self, i: u32) -> Result<u8> {
        debug_assert!((1..=NUM_INODES).contains(&i));
        let mut buf = [0u8; 1];
        self.read_at(
            SUPERBLOCK_FREE_INODES_OFFSET as u64 + (i - 1) as u64,
            &mut buf,
        )?;
        Ok(buf[0])
    }

    pub(crate) fn write_super_free_inode_byte(&self, i: u32, v: u8) -> Result<()> {
        debug_assert!((1..=NUM_INODES).contains(&i));
        self.write_at(SUPERBLOCK_FREE_INODES_OFFSET as u64 + (i - 1) as u64, &[v])
    }
}

fn block_offset(b: u32) -> u64 {
    b as u64 * BLOCK_SIZE as u64
}

fn inode_slot_offset(i: u32) -> u64 {
    2 * BLOCK_SIZE as u64 + (i - 1) as u64 * INODE_SIZE as u64
}
