//! A miniature Unix-style inode/block filesystem backed by a single host file.
//!
//! The on-disk layout is fixed at compile time: a superblock (magic number,
//! geometry, free-inode table, and the root inode) in block 0, a free-block
//! bitmap in block 1, an inode table spanning blocks 2 through 9, and data
//! blocks from block 10 onward. Block 10 itself is reserved for the root
//! directory's entries, so the allocator never hands it out.
//!
//! Callers go through [`FileSystem`], which wraps directory operations
//! (`mkdir`/`rmdir`) and a single-slot open-file session
//! (`open_file`/`read`/`write`/`seekr`/`seekw`/`close`/`remove`). Every
//! fallible operation returns [`FsError`].

mod alloc;
mod dir;
mod disk;
mod error;
mod fs;
mod indirect;
mod path;
mod session;

pub use alloc::InodeKind;
pub use error::FsError;
pub use fs::FileSystem;

/// Size in bytes of one disk block.
pub const BLOCK_SIZE: usize = 512;
/// Total number of blocks on the backing disk.
pub const NUM_BLOCKS: u32 = 4096;
/// Total number of inode slots.
pub const NUM_INODES: u32 = 128;
/// Blocks 0..META_BLOCKS are reserved for the superblock, the free-block
/// bitmap, and the inode table.
pub const META_BLOCKS: u32 = 10;
/// Superblock magic number, written on format and checked on mount.
pub const MAGIC: i32 = 7428;
/// Size in bytes of one on-disk inode record.
pub const INODE_SIZE: usize = 32;
/// Number of direct block pointers per inode.
pub const DIRECT_PTRS: usize = 10;
/// Number of block pointers that fit in one indirect block.
pub const PTRS_PER_INDIRECT: usize = BLOCK_SIZE / 2;
/// Number of directory entries that fit in one directory block.
pub const DIR_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / 32;
/// Maximum length of a path component's name, not counting the terminator.
pub const MAX_NAME_LEN: usize = 30;
/// Fixed data block holding the root directory's entries.
pub const ROOT_DIR_BLOCK: u16 = META_BLOCKS as u16;

/// Size in bytes of the on-disk superblock record (block 0).
pub(crate) const SUPERBLOCK_SIZE: usize = 4 + 4 + 4 + NUM_INODES as usize + INODE_SIZE;
/// Byte offset of the free-inode table within the superblock.
pub(crate) const SUPERBLOCK_FREE_INODES_OFFSET: usize = 4 + 4 + 4;
/// Byte offset of the root inode record within the superblock.
pub(crate) const SUPERBLOCK_ROOT_INODE_OFFSET: usize = SUPERBLOCK_SIZE - INODE_SIZE;

/// First logical block index addressed through the single-indirect pointer.
pub(crate) const SINGLE_INDIRECT_START: u32 = DIRECT_PTRS as u32;
/// First logical block index addressed through the double-indirect pointer.
pub(crate) const DOUBLE_INDIRECT_START: u32 = SINGLE_INDIRECT_START + PTRS_PER_INDIRECT as u32;
/// One past the last logical block index a double-indirect pointer can reach.
pub(crate) const DOUBLE_INDIRECT_END: u32 =
    DOUBLE_INDIRECT_START + (PTRS_PER_INDIRECT as u32) * (PTRS_PER_INDIRECT as u32);

#[cfg(test)]
mod layout_tests {
    use super::*;

    #[test]
    fn superblock_size_matches_fixed_layout() {
        assert_eq!(SUPERBLOCK_SIZE, 172);
        assert_eq!(SUPERBLOCK_FREE_INODES_OFFSET, 12);
        assert_eq!(SUPERBLOCK_ROOT_INODE_OFFSET, 140);
    }

    #[test]
    fn indirect_ranges_are_contiguous() {
        assert_eq!(SINGLE_INDIRECT_START, 10);
        assert_eq!(DOUBLE_INDIRECT_START, 266);
        assert_eq!(DOUBLE_INDIRECT_END, 266 + 256 * 256);
    }
}
