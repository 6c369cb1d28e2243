//! FAT-specific error type, generalized from `kernel/src/fs/error.rs`'s
//! `FsError` (typed enum + `Display`) into the narrower set this crate's
//! operations can actually fail with.
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatError {
    NotFound,
    AlreadyExists,
    NotADirectory,
    IsADirectory,
    InvalidBootSector,
    IoError,
    NoSpace,
    NameTooLong,
    DirectoryFull,
}

impl fmt::Display for FatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FatError::NotFound => write!(f, "No such file or directory"),
            FatError::AlreadyExists => write!(f, "File exists"),
            FatError::NotADirectory => write!(f, "Not a directory"),
            FatError::IsADirectory => write!(f, "Is a directory"),
            FatError::InvalidBootSector => write!(f, "Invalid FAT boot sector"),
            FatError::IoError => write!(f, "I/O error"),
            FatError::NoSpace => write!(f, "No space left on device"),
            FatError::NameTooLong => write!(f, "File name too long"),
            FatError::DirectoryFull => write!(f, "Directory is full"),
        }
    }
}

pub type FatResult<T> = Result<T, FatError>;
