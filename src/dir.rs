//! Directory blocks: fixed 16-entry slot arrays addressed through an
//! inode's first direct pointer. Directories in this filesystem never grow
//! past one block.

use crate::alloc::{Allocator, Inode};
use crate::error::{FsError, Result};
use crate::{BLOCK_SIZE, DIR_ENTRIES_PER_BLOCK, MAX_NAME_LEN};

/// What a directory entry slot holds. `0` and `-1` are on-disk sentinels for
/// "free" and "the root directory" respectively; everything else names a
/// regular inode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EntryInode {
    Free,
    Root,
    Num(u8),
}

impl EntryInode {
    fn from_raw(v: i8) -> Self {
        if v == 0 {
            EntryInode::Free
        } else if v == -1 {
            EntryInode::Root
        } else {
            EntryInode::Num(v as u8)
        }
    }

    fn to_raw(self) -> i8 {
        match self {
            EntryInode::Free => 0,
            EntryInode::Root => -1,
            EntryInode::Num(n) => n as i8,
        }
    }

    fn from_num(n: i32) -> Self {
        if n == -1 {
            EntryInode::Root
        } else {
            EntryInode::Num(n as u8)
        }
    }
}

#[derive(Clone, Debug)]
struct DirEntry {
    inode: EntryInode,
    name: String,
}

fn encode_name(name: &str) -> [u8; MAX_NAME_LEN + 1] {
    let mut buf = [0u8; MAX_NAME_LEN + 1];
    let bytes = name.as_bytes();
    let n = bytes.len().min(MAX_NAME_LEN);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

fn decode_name(buf: &[u8; MAX_NAME_LEN + 1]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

const ENTRY_SIZE: usize = MAX_NAME_LEN + 1 + 1;

fn decode_block(buf: &[u8; BLOCK_SIZE]) -> Vec<DirEntry> {
    let mut out = Vec::with_capacity(DIR_ENTRIES_PER_BLOCK);
    for slot in 0..DIR_ENTRIES_PER_BLOCK {
        let off = slot * ENTRY_SIZE;
        let inode_raw = buf[off] as i8;
        let name_bytes: [u8; MAX_NAME_LEN + 1] = buf[off + 1..off + ENTRY_SIZE].try_into().unwrap();
        out.push(DirEntry {
            inode: EntryInode::from_raw(inode_raw),
            name: decode_name(&name_bytes),
        });
    }
    out
}

fn encode_block(entries: &[DirEntry]) -> [u8; BLOCK_SIZE] {
    let mut buf = [0u8; BLOCK_SIZE];
    for (slot, e) in entries.iter().enumerate() {
        let off = slot * ENTRY_SIZE;
        buf[off] = e.inode.to_raw() as u8;
        buf[off + 1..off + ENTRY_SIZE].copy_from_slice(&encode_name(&e.name));
    }
    buf
}

/// Builds a fresh directory block containing only `.` and `..`, pointing at
/// `self_inode` and `parent_inode` (`-1` for the root directory).
pub(crate) fn new_dir_block(self_inode: i32, parent_inode: i32) -> [u8; BLOCK_SIZE] {
    let mut entries = vec![
        DirEntry {
            inode: EntryInode::Free,
            name: String::new(),
        };
        DIR_ENTRIES_PER_BLOCK
    ];
    entries[0] = DirEntry {
        inode: EntryInode::from_num(self_inode),
        name: ".".to_string(),
    };
    entries[1] = DirEntry {
        inode: EntryInode::from_num(parent_inode),
        name: "..".to_string(),
    };
    encode_block(&entries)
}

fn data_block(dir: &Inode) -> Result<u16> {
    dir.direct[0].get().ok_or(FsError::InvariantViolation)
}

/// Looks up `name` among `dir`'s entries, returning its inode number if a
/// live (non-`.`/`..`) entry matches.
pub(crate) fn find_entry(alloc: &Allocator, dir: &Inode, name: &str) -> Result<Option<u32>> {
    let block = data_block(dir)?;
    let entries = decode_block(&alloc.read_block(block)?);
    for e in entries {
        if let EntryInode::Num(n) = e.inode {
            if e.name == name {
                return Ok(Some(n as u32));
            }
        }
    }
    Ok(None)
}

/// True if `dir`'s block has a slot free for a new entry.
pub(crate) fn has_free_slot(alloc: &Allocator, dir: &Inode) -> Result<bool> {
    let block = data_block(dir)?;
    let entries = decode_block(&alloc.read_block(block)?);
    Ok(entries.iter().any(|e| matches!(e.inode, EntryInode::Free)))
}

/// Writes a new `name -> inode_num` entry into the first free slot.
pub(crate) fn add_entry(alloc: &Allocator, dir: &Inode, name: &str, inode_num: u32) -> Result<()> {
    let block = data_block(dir)?;
    let mut entries = decode_block(&alloc.read_block(block)?);
    let slot = entries
        .iter()
        .position(|e| matches!(e.inode, EntryInode::Free))
        .ok_or(FsError::NoSpace)?;
    entries[slot] = DirEntry {
        inode: EntryInode::Num(inode_num as u8),
        name: name.to_string(),
    };
    alloc.update_block(block, &encode_block(&entries))
}

/// Frees the slot whose inode is `inode_num`, leaving `.`/`..` untouched.
pub(crate) fn remove_entry_by_inode(alloc: &Allocator, dir: &Inode, inode_num: u32) -> Result<()> {
    let block = data_block(dir)?;
    let mut entries = decode_block(&alloc.read_block(block)?);
    let slot = entries
        .iter()
        .position(|e| e.inode == EntryInode::Num(inode_num as u8))
        .ok_or(FsError::NotFound)?;
    entries[slot] = DirEntry {
        inode: EntryInode::Free,
        name: String::new(),
    };
    alloc.update_block(block, &encode_block(&entries))
}

/// True once only `.` and `..` remain. Entries 0 and 1 always hold those two
/// (never `Free`/`Root` for a non-root directory), so only the rest count.
pub(crate) fn is_empty(alloc: &Allocator, dir: &Inode) -> Result<bool> {
    let block = data_block(dir)?;
    let entries = decode_block(&alloc.read_block(block)?);
    Ok(entries[2..DIR_ENTRIES_PER_BLOCK]
        .iter()
        .all(|e| matches!(e.inode, EntryInode::Free)))
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
    fn add_find_and_remove_round_trip_on_root() {
        let (_dir, mut alloc) = fresh();
        let root = alloc.get_inode(-1).unwrap();
        assert!(has_free_slot(&alloc, &root).unwrap());
        add_entry(&alloc, &root, "a", 1).unwrap();
        assert_eq!(find_entry(&alloc, &root, "a").unwrap(), Some(1));
        remove_entry_by_inode(&alloc, &root, 1).unwrap();
        assert_eq!(find_entry(&alloc, &root, "a").unwrap(), None);
    }

    #[test]
    fn directory_fills_up_after_fourteen_live_entries() {
        let (_dir, mut alloc) = fresh();
        let root = alloc.get_inode(-1).unwrap();
        for i in 1..=14u32 {
            add_entry(&alloc, &root, &format!("e{i}"), i).unwrap();
        }
        assert!(!has_free_slot(&alloc, &root).unwrap());
        assert!(matches!(add_entry(&alloc, &root, "overflow", 15).unwrap_err(), FsError::NoSpace));
    }

    #[test]
    fn name_round_trips_through_encode_decode() {
        let encoded = encode_name("folder");
        assert_eq!(decode_name(&encoded), "folder");
    }

    #[test]
    fn name_longer_than_max_is_truncated() {
        let long = "a".repeat(MAX_NAME_LEN + 10);
        let encoded = encode_name(&long);
        assert_eq!(decode_name(&encoded).len(), MAX_NAME_LEN);
    }

    #[test]
    fn root_block_has_self_referencing_dot_entries() {
        let block = new_dir_block(-1, -1);
        let entries = decode_block(&block);
        assert_eq!(entries[0].name, ".");
        assert_eq!(entries[0].inode, EntryInode::Root);
        assert_eq!(entries[1].name, "..");
        assert_eq!(entries[1].inode, EntryInode::Root);
        assert!(entries[2..].iter().all(|e| e.inode == EntryInode::Free));
    }
}
