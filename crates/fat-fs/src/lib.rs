//! FAT12/16/32 filesystem driver (§4.7), generalized from the teacher's
//! FAT32-only `kernel/src/fs/fat32/fat32.rs` into a width-agnostic driver:
//! boot-sector/layout parsing, the block-cache trait seam, cluster-chain
//! walking with allocation and freeing, LFN encode/decode, and directory
//! entry alloc/free. Grounded throughout on
//! `original_source/kernel/fs/fatfs.c`.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod block_cache;
pub mod dir;
pub mod error;
pub mod layout;
pub mod lfn;
pub mod volume;

pub use block_cache::{BlockDevice, CachedPage};
pub use dir::DirEntry;
pub use error::{FatError, FatResult};
pub use layout::{BootSector, FatType, RawDirEntry};
pub use volume::{BmapFlags, FatVolume};
