//! The single-slot open-file session: at most one file may be open at a
//! time, with independent read and write heads into its data.

use crate::alloc::{Allocator, Inode};
use crate::error::{FsError, Result};
use crate::indirect;
use crate::BLOCK_SIZE;

/// State for the one file a [`crate::FileSystem`] may have open at a time.
pub(crate) struct OpenFile {
    pub(crate) inode_num: i32,
    pub(crate) inode: Inode,
    pub(crate) read_head: u32,
    pub(crate) write_head: u32,
}

impl OpenFile {
    pub(crate) fn new(inode_num: i32, inode: Inode) -> Self {
        OpenFile {
            inode_num,
            inode,
            read_head: 0,
            write_head: 0,
        }
    }

    pub(crate) fn size(&self) -> u32 {
        self.inode.size
    }

    pub(crate) fn seekw(&mut self, n: u32) -> Result<()> {
        if n > self.inode.size {
            return Err(FsError::OutOfRange);
        }
        self.write_head = n;
        Ok(())
    }

    pub(crate) fn seekr(&mut self, n: u32) -> Result<()> {
        if n > self.inode.size {
            return Err(FsError::OutOfRange);
        }
        self.read_head = n;
        Ok(())
    }

    /// Writes `buf` at the current write head, allocating blocks as needed,
    /// advancing the write head, growing `size` if the write extends past
    /// it, and persisting the inode.
    pub(crate) fn write(&mut self, alloc: &mut Allocator, buf: &[u8]) -> Result<()> {
        let mut remaining = buf.len();
        let mut written = 0usize;
        let mut head = self.write_head;
        while remaining > 0 {
            let logical_block = head / BLOCK_SIZE as u32;
            let block_offset = (head % BLOCK_SIZE as u32) as usize;
            let chunk_len = (BLOCK_SIZE - block_offset).min(remaining);
            indirect::write_chunk(
                alloc,
                &mut self.inode,
                logical_block,
                block_offset,
                &buf[written..written + chunk_len],
            )?;
            head += chunk_len as u32;
            written += chunk_len;
            remaining -= chunk_len;
        }
        self.write_head = head;
        if self.write_head > self.inode.size {
            self.inode.size = self.write_head;
        }
        alloc.update_inode(self.inode_num, &self.inode)
    }

    /// Reads `buf.len()` bytes starting at the read head. Fails without
    /// touching disk if the read would run past the file's size.
    pub(crate) fn read(&mut self, alloc: &Allocator, buf: &mut [u8]) -> Result<()> {
        if self.read_head as u64 + buf.len() as u64 > self.inode.size as u64 {
            return Err(FsError::OutOfRange);
        }
        let mut remaining = buf.len();
        let mut filled = 0usize;
        let mut head = self.read_head;
        while remaining > 0 {
            let logical_block = head / BLOCK_SIZE as u32;
            let block_offset = (head % BLOCK_SIZE as u32) as usize;
            let chunk_len = (BLOCK_SIZE - block_offset).min(remaining);
            indirect::read_chunk(
                alloc,
                &self.inode,
                logical_block,
                block_offset,
                &mut buf[filled..filled + chunk_len],
            )?;
            head += chunk_len as u32;
            filled += chunk_len;
            remaining -= chunk_len;
        }
        self.read_head = head;
        Ok(())
    }

    pub(crate) fn close(self, alloc: &mut Allocator) -> Result<()> {
        alloc.update_inode(self.inode_num, &self.inode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::Allocator;
    use crate::disk::DiskBackend;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_back_at_rewound_head() {
        let dir = tempdir().unwrap();
        let mut alloc = Allocator::format(DiskBackend::new(dir.path().join("vdisk"))).unwrap();
        let inode_num = alloc.get_free_inode().unwrap();
        alloc.set_inode(inode_num, &Inode::new_file()).unwrap();
        let mut file = OpenFile::new(inode_num as i32, alloc.get_inode(inode_num as i32).unwrap());

        file.write(&mut alloc, b"hello darkness").unwrap();
        assert_eq!(file.size(), 14);

        file.seekr(0).unwrap();
        let mut buf = [0u8; 14];
        file.read(&alloc, &mut buf).unwrap();
        assert_eq!(&buf, b"hello darkness");
    }

    #[test]
    fn read_past_size_fails_without_touching_disk() {
        let dir = tempdir().unwrap();
        let mut alloc = Allocator::format(DiskBackend::new(dir.path().join("vdisk"))).unwrap();
        let inode_num = alloc.get_free_inode().unwrap();
        alloc.set_inode(inode_num, &Inode::new_file()).unwrap();
        let mut file = OpenFile::new(inode_num as i32, alloc.get_inode(inode_num as i32).unwrap());
        file.write(&mut alloc, b"hi").unwrap();

        let mut buf = [0u8; 10];
        let err = file.read(&alloc, &mut buf).unwrap_err();
        assert!(matches!(err, FsError::OutOfRange));
    }

    #[test]
    fn seek_past_size_is_out_of_range() {
        let dir = tempdir().unwrap();
        let mut alloc = Allocator::format(DiskBackend::new(dir.path().join("vdisk"))).unwrap();
        let inode_num = alloc.get_free_inode().unwrap();
        alloc.set_inode(inode_num, &Inode::new_file()).unwrap();
        let mut file = OpenFile::new(inode_num as i32, alloc.get_inode(inode_num as i32).unwrap());
        assert!(matches!(file.seekw(1).unwrap_err(), FsError::OutOfRange));
    }
}
