//! The block-cache integration seam (§3 "Cached disk page"), generalized
//! from the teacher's direct `PRIMARY_ATA.lock()` sector reads in
//! `kernel/src/fs/fat32/fat32.rs` into a trait so the FAT algorithms never
//! talk to ATA registers directly.
//!
//! A real kernel's `get_cached_page` returns a page mapped at some
//! `virtual_address` inside the kernel's address space; this crate has no
//! MMU of its own to model that mapping, so `CachedPage` carries the
//! block's bytes directly in an owned buffer instead of a raw pointer —
//! the caller still "releases" it and must set `dirty` before release to
//! have writes persisted, preserving the same protocol shape.
use alloc::vec;
use alloc::vec::Vec;

use crate::error::FatResult;

/// One cached block, checked out from a `BlockDevice` and returned via
/// `BlockDevice::release`.
pub struct CachedPage {
    pub device: u32,
    pub logical_block: u64,
    pub data: Vec<u8>,
    pub dirty: bool,
    pub ref_count: u32,
}

impl CachedPage {
    pub fn new(device: u32, logical_block: u64, block_size: usize) -> Self {
        CachedPage {
            device,
            logical_block,
            data: vec![0u8; block_size],
            dirty: false,
            ref_count: 1,
        }
    }
}

/// Block-device seam the FAT driver is built against. A real implementation
/// backs this with the ATA/AHCI strategy routine's page cache; tests back
/// it with a plain in-memory `Vec<Vec<u8>>`.
pub trait BlockDevice {
    fn block_size(&self) -> usize;

    /// Number of addressable blocks on this device.
    fn block_count(&self) -> u64;

    /// Fetch (or fault in) the cache page for `logical_block`. The caller
    /// releases it via `release` exactly once.
    fn get_cached_page(&mut self, logical_block: u64) -> FatResult<CachedPage>;

    /// Release a previously fetched page. If `page.dirty` is set, the
    /// implementation writes the block back before dropping it.
    fn release(&mut self, page: CachedPage) -> FatResult<()>;
}

/// A trivial in-memory `BlockDevice`, used by this crate's own unit tests
/// and by `tests/` integration tests that need a device without real
/// hardware. Not `cfg(test)`-gated so external integration-test binaries
/// (which link this crate built without the `test` cfg) can still use it.
pub mod test_support {
    use super::*;
    use alloc::vec;

    /// An owned `Vec` of fixed-size blocks; a `dirty` release overwrites
    /// the backing block so tests can assert the write actually landed.
    pub struct MemBlockDevice {
        pub block_size: usize,
        pub blocks: Vec<Vec<u8>>,
    }

    impl MemBlockDevice {
        pub fn new(block_size: usize, block_count: usize) -> Self {
            MemBlockDevice { block_size, blocks: vec![vec![0u8; block_size]; block_count] }
        }
    }

    impl BlockDevice for MemBlockDevice {
        fn block_size(&self) -> usize {
            self.block_size
        }

        fn block_count(&self) -> u64 {
            self.blocks.len() as u64
        }

        fn get_cached_page(&mut self, logical_block: u64) -> FatResult<CachedPage> {
            let idx = logical_block as usize;
            let data = self
                .blocks
                .get(idx)
                .cloned()
                .ok_or(crate::error::FatError::IoError)?;
            Ok(CachedPage { device: 0, logical_block, data, dirty: false, ref_count: 1 })
        }

        fn release(&mut self, page: CachedPage) -> FatResult<()> {
            if page.dirty {
                let idx = page.logical_block as usize;
                if idx >= self.blocks.len() {
                    return Err(crate::error::FatError::IoError);
                }
                self.blocks[idx] = page.data;
            }
            Ok(())
        }
    }
}
