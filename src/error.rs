//! The crate's single error currency.

use thiserror::Error;

/// Every fallible operation in this crate returns one of these kinds.
///
/// The original driver this crate replaces collapsed all of these into a single
/// non-zero return code; an embedding binary that needs that contract can map
/// `Ok` to `0` and `Err` to `1`.
#[derive(Debug, Error)]
pub enum FsError {
    /// The path is not absolute, has an empty component, or walks through a
    /// non-directory.
    #[error("invalid path")]
    InvalidPath,
    /// The final path component does not exist in its parent.
    #[error("not found")]
    NotFound,
    /// `mkdir` (or file creation) targeted a path that already exists.
    #[error("already exists")]
    AlreadyExists,
    /// `rmdir` targeted a non-empty directory.
    #[error("directory not empty")]
    NotEmpty,
    /// A file operation targeted a directory, a directory operation targeted a
    /// file, or a removal targeted the root.
    #[error("wrong kind of inode")]
    WrongKind,
    /// No free block, no free inode, or the target directory is full.
    #[error("no space left")]
    NoSpace,
    /// `open` was called while a file is already open, or `remove` targeted the
    /// currently open file.
    #[error("conflicting open-file state")]
    ConflictingState,
    /// A seek landed past the end of the file, or an offset fell outside the
    /// range addressable by direct/single/double indirect pointers.
    #[error("offset out of range")]
    OutOfRange,
    /// The backing file could not be read or written, or its magic number did
    /// not match on mount.
    #[error("backing file I/O failed")]
    IoFailure(#[from] std::io::Error),
    /// Defensive: an attempt to read a block or inode that the allocator
    /// considers free, or a hole in file data.
    #[error("invariant violation")]
    InvariantViolation,
}

pub type Result<T> = std::result::Result<T, FsError>;
