//! Logical-block addressing: maps a file's logical block index onto its
//! direct, single-indirect, or double-indirect pointers, allocating
//! indirect blocks on demand.

use crate::alloc::{Allocator, BlockPtr, Inode};
use crate::error::{FsError, Result};
use crate::{BLOCK_SIZE, DOUBLE_INDIRECT_END, DOUBLE_INDIRECT_START, PTRS_PER_INDIRECT, SINGLE_INDIRECT_START};

enum Addr {
    Direct(usize),
    Single(usize),
    Double(usize, usize),
}

fn logical_to_addr(logical_block: u32) -> Result<Addr> {
    if logical_block < SINGLE_INDIRECT_START {
        Ok(Addr::Direct(logical_block as usize))
    } else if logical_block < DOUBLE_INDIRECT_START {
        Ok(Addr::Single((logical_block - SINGLE_INDIRECT_START) as usize))
    } else if logical_block < DOUBLE_INDIRECT_END {
        let rel = logical_block - DOUBLE_INDIRECT_START;
        let outer = (rel / PTRS_PER_INDIRECT as u32) as usize;
        let inner = (rel % PTRS_PER_INDIRECT as u32) as usize;
        Ok(Addr::Double(outer, inner))
    } else {
        Err(FsError::OutOfRange)
    }
}

fn decode_indirect(buf: &[u8; BLOCK_SIZE]) -> [BlockPtr; PTRS_PER_INDIRECT] {
    let mut ptrs = [BlockPtr::NONE; PTRS_PER_INDIRECT];
    for (i, slot) in ptrs.iter_mut().enumerate() {
        let raw = i16::from_le_bytes([buf[i * 2], buf[i * 2 + 1]]);
        *slot = if raw < 0 {
            BlockPtr::NONE
        } else {
            BlockPtr::some(raw as u16)
        };
    }
    ptrs
}

fn encode_indirect(ptrs: &[BlockPtr; PTRS_PER_INDIRECT]) -> [u8; BLOCK_SIZE] {
    let mut buf = [0u8; BLOCK_SIZE];
    for (i, p) in ptrs.iter().enumerate() {
        let raw: i16 = match p.get() {
            Some(b) => b as i16,
            None => -1,
        };
        buf[i * 2..i * 2 + 2].copy_from_slice(&raw.to_le_bytes());
    }
    buf
}

fn write_through_ptr(alloc: &mut Allocator, ptr: &mut BlockPtr, block_offset: usize, data: &[u8]) -> Result<()> {
    match ptr.get() {
        None => {
            let b = alloc.get_free_block().ok_or(FsError::NoSpace)?;
            let mut block = [0u8; BLOCK_SIZE];
            block[block_offset..block_offset + data.len()].copy_from_slice(data);
            alloc.write_block(b, &block)?;
            *ptr = BlockPtr::some(b);
            Ok(())
        }
        Some(b) => {
            if data.len() == BLOCK_SIZE {
                let mut block = [0u8; BLOCK_SIZE];
                block.copy_from_slice(data);
                alloc.update_block(b, &block)
            } else {
                let mut block = alloc.read_block(b)?;
                block[block_offset..block_offset + data.len()].copy_from_slice(data);
                alloc.update_block(b, &block)
            }
        }
    }
}

fn write_through_single(
    alloc: &mut Allocator,
    ptr: &mut BlockPtr,
    index: usize,
    block_offset: usize,
    data: &[u8],
) -> Result<()> {
    match ptr.get() {
        None => {
            let single_block = alloc.get_free_block().ok_or(FsError::NoSpace)?;
            let mut ptrs = [BlockPtr::NONE; PTRS_PER_INDIRECT];
            write_through_ptr(alloc, &mut ptrs[index], block_offset, data)?;
            alloc.write_block(single_block, &encode_indirect(&ptrs))?;
            *ptr = BlockPtr::some(single_block);
        }
        Some(b) => {
            let mut ptrs = decode_indirect(&alloc.read_block(b)?);
            write_through_ptr(alloc, &mut ptrs[index], block_offset, data)?;
            alloc.update_block(b, &encode_indirect(&ptrs))?;
        }
    }
    Ok(())
}

fn write_through_double(
    alloc: &mut Allocator,
    ptr: &mut BlockPtr,
    outer: usize,
    inner: usize,
    block_offset: usize,
    data: &[u8],
) -> Result<()> {
    match ptr.get() {
        None => {
            let double_block = alloc.get_free_block().ok_or(FsError::NoSpace)?;
            let mut outer_ptrs = [BlockPtr::NONE; PTRS_PER_INDIRECT];
            write_through_single(alloc, &mut outer_ptrs[outer], inner, block_offset, data)?;
            alloc.write_block(double_block, &encode_indirect(&outer_ptrs))?;
            *ptr = BlockPtr::some(double_block);
        }
        Some(b) => {
            let mut outer_ptrs = decode_indirect(&alloc.read_block(b)?);
            write_through_single(alloc, &mut outer_ptrs[outer], inner, block_offset, data)?;
            alloc.update_block(b, &encode_indirect(&outer_ptrs))?;
        }
    }
    Ok(())
}

/// Writes `data` (no larger than one block, already sliced by the caller)
/// at `block_offset` within the file's `logical_block`-th block, allocating
/// direct/indirect blocks as needed.
pub(crate) fn write_chunk(
    alloc: &mut Allocator,
    inode: &mut Inode,
    logical_block: u32,
    block_offset: usize,
    data: &[u8],
) -> Result<()> {
    match logical_to_addr(logical_block)? {
        Addr::Direct(idx) => write_through_ptr(alloc, &mut inode.direct[idx], block_offset, data),
        Addr::Single(idx) => write_through_single(alloc, &mut inode.single_indirect, idx, block_offset, data),
        Addr::Double(outer, inner) => {
            write_through_double(alloc, &mut inode.double_indirect, outer, inner, block_offset, data)
        }
    }
}

fn read_through_ptr(alloc: &Allocator, ptr: BlockPtr, block_offset: usize, buf: &mut [u8]) -> Result<()> {
    let b = ptr.get().ok_or(FsError::InvariantViolation)?;
    if buf.len() == BLOCK_SIZE {
        buf.copy_from_slice(&alloc.read_block(b)?);
    } else {
        let block = alloc.read_block(b)?;
        buf.copy_from_slice(&block[block_offset..block_offset + buf.len()]);
    }
    Ok(())
}

fn read_through_single(alloc: &Allocator, ptr: BlockPtr, index: usize, block_offset: usize, buf: &mut [u8]) -> Result<()> {
    let b = ptr.get().ok_or(FsError::InvariantViolation)?;
    let ptrs = decode_indirect(&alloc.read_block(b)?);
    read_through_ptr(alloc, ptrs[index], block_offset, buf)
}

fn read_through_double(
    alloc: &Allocator,
    ptr: BlockPtr,
    outer: usize,
    inner: usize,
    block_offset: usize,
    buf: &mut [u8],
) -> Result<()> {
    let b = ptr.get().ok_or(FsError::InvariantViolation)?;
    let outer_ptrs = decode_indirect(&alloc.read_block(b)?);
    read_through_single(alloc, outer_ptrs[outer], inner, block_offset, buf)
}

/// Reads one block's worth (or less, at `block_offset`) of file data.
/// Fails with [`FsError::InvariantViolation`] on a hole: callers must keep
/// reads within the file's recorded size.
pub(crate) fn read_chunk(
    alloc: &Allocator,
    inode: &Inode,
    logical_block: u32,
    block_offset: usize,
    buf: &mut [u8],
) -> Result<()> {
    match logical_to_addr(logical_block)? {
        Addr::Direct(idx) => read_through_ptr(alloc, inode.direct[idx], block_offset, buf),
        Addr::Single(idx) => read_through_single(alloc, inode.single_indirect, idx, block_offset, buf),
        Addr::Double(outer, inner) => read_through_double(alloc, inode.double_indirect, outer, inner, block_offset, buf),
    }
}

fn free_single_subtree(alloc: &mut Allocator, single: u16) -> Result<()> {
    let ptrs = decode_indirect(&alloc.read_block(single)?);
    for p in ptrs {
        if let Some(b) = p.get() {
            alloc.free_block(b)?;
        }
    }
    alloc.free_block(single)
}

/// Frees every block reachable from `inode`'s direct, single-indirect, and
/// double-indirect pointers, including the indirect blocks themselves.
pub(crate) fn free_all_blocks(alloc: &mut Allocator, inode: &Inode) -> Result<()> {
    for p in inode.direct {
        if let Some(b) = p.get() {
            alloc.free_block(b)?;
        }
    }
    if let Some(single) = inode.single_indirect.get() {
        free_single_subtree(alloc, single)?;
    }
    if let Some(double) = inode.double_indirect.get() {
        let outer_ptrs = decode_indirect(&alloc.read_block(double)?);
        for p in outer_ptrs {
            if let Some(single) = p.get() {
                free_single_subtree(alloc, single)?;
            }
        }
        alloc.free_block(double)?;
    }
    Ok(())
}
