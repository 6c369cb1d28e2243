//! FAT32 disk filesystem, backed by the `fat-fs` crate's volume/directory
//! primitives instead of the hand-rolled BPB/cluster-chain code this module
//! used to carry directly. The ATA glue (`AtaBlockDevice`) is the only
//! hardware-specific part left; everything else — FAT entry get/set,
//! cluster-chain walks, 8.3/LFN directory entries — lives in `fat_fs` and is
//! shared with any other block device this kernel might grow.
use alloc::vec::Vec;
use spin::Mutex;

use fat_fs::block_cache::{BlockDevice, CachedPage};
use fat_fs::layout::{BootSector, RawDirEntry, ATTR_ARCHIVE, ATTR_DIRECTORY};
use fat_fs::volume::FatVolume;
use fat_fs::{dir, FatError};

use crate::drivers::ata::PRIMARY_ATA;
use crate::fs::dentry::DirEntry as VfsDirEntry;
use crate::fs::error::{FsError, FsResult};
use crate::fs::inode::{FileType, Inode};
use crate::fs::mount::FileSystem;

const SECTOR_SIZE: usize = 512;

fn map_err(e: FatError) -> FsError {
    match e {
        FatError::NotFound => FsError::NotFound,
        FatError::AlreadyExists => FsError::AlreadyExists,
        FatError::NotADirectory => FsError::NotADirectory,
        FatError::IsADirectory => FsError::IsADirectory,
        FatError::InvalidBootSector => FsError::InvalidPath,
        FatError::IoError => FsError::IoError,
        FatError::NoSpace | FatError::DirectoryFull => FsError::NoSpace,
        FatError::NameTooLong => FsError::InvalidPath,
    }
}

/// Adapts the primary ATA PIO disk to `fat_fs::BlockDevice`, one 512-byte
/// sector per block.
struct AtaBlockDevice {
    total_sectors: u64,
}

impl BlockDevice for AtaBlockDevice {
    fn block_size(&self) -> usize {
        SECTOR_SIZE
    }

    fn block_count(&self) -> u64 {
        self.total_sectors
    }

    fn get_cached_page(&mut self, logical_block: u64) -> fat_fs::FatResult<CachedPage> {
        let mut buf = [0u8; SECTOR_SIZE];
        PRIMARY_ATA
            .lock()
            .read_sector(logical_block as u32, &mut buf)
            .map_err(|_| FatError::IoError)?;
        Ok(CachedPage {
            device: 0,
            logical_block,
            data: buf.to_vec(),
            dirty: false,
            ref_count: 1,
        })
    }

    fn release(&mut self, page: CachedPage) -> fat_fs::FatResult<()> {
        if page.dirty {
            let mut buf = [0u8; SECTOR_SIZE];
            buf.copy_from_slice(&page.data[..SECTOR_SIZE]);
            PRIMARY_ATA
                .lock()
                .write_sector(page.logical_block as u32, &buf)
                .map_err(|_| FatError::IoError)?;
        }
        Ok(())
    }
}

struct Fat32Inner {
    vol: FatVolume,
    dev: AtaBlockDevice,
    root_cluster: u32,
}

pub struct Fat32Fs {
    inner: Mutex<Fat32Inner>,
}

impl Fat32Fs {
    /// Read the boot sector off the primary ATA disk and mount it.
    pub fn init() -> FsResult<Self> {
        let mut sector = [0u8; SECTOR_SIZE];
        PRIMARY_ATA
            .lock()
            .read_sector(0, &mut sector)
            .map_err(|_| FsError::IoError)?;

        let bs = BootSector::parse(&sector).map_err(map_err)?;
        let total_sectors = bs.total_sectors as u64;
        let vol = FatVolume::from_boot_sector(&bs);
        let root_cluster = vol.first_root_dir_cluster.ok_or(FsError::InvalidPath)?;

        crate::log_info!(
            "FAT32: bps={} spc={} fats={} fatsz={} root_clus={} data_start={}",
            vol.block_size,
            vol.sectors_per_cluster,
            vol.num_fats,
            vol.fat_size,
            root_cluster,
            vol.first_data_sector
        );

        Ok(Fat32Fs {
            inner: Mutex::new(Fat32Inner {
                vol,
                dev: AtaBlockDevice { total_sectors },
                root_cluster,
            }),
        })
    }

    fn split_path(path: &str) -> Vec<&str> {
        path.trim_start_matches('/').split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Resolve a path to its directory entry and the cluster of its
    /// containing directory. The root itself has no entry of its own;
    /// callers special-case an empty path before calling this.
    fn resolve(inner: &mut Fat32Inner, path: &str) -> FsResult<(dir::DirEntry, u32)> {
        let segments = Self::split_path(path);
        let mut cluster = inner.root_cluster;

        for (idx, segment) in segments.iter().enumerate() {
            let entry = dir::find_entry(&mut inner.vol, &mut inner.dev, cluster, segment).map_err(map_err)?;
            if idx == segments.len() - 1 {
                return Ok((entry, cluster));
            }
            if !entry.raw.is_directory() {
                return Err(FsError::NotADirectory);
            }
            cluster = entry.raw.first_cluster();
        }
        Err(FsError::NotFound)
    }

    fn resolve_parent_and_name<'a>(inner: &mut Fat32Inner, path: &'a str) -> FsResult<(u32, &'a str)> {
        let segments = Self::split_path(path);
        let (name, dirs) = segments.split_last().ok_or(FsError::InvalidPath)?;
        let mut cluster = inner.root_cluster;
        for segment in dirs {
            let entry = dir::find_entry(&mut inner.vol, &mut inner.dev, cluster, segment).map_err(map_err)?;
            if !entry.raw.is_directory() {
                return Err(FsError::NotADirectory);
            }
            cluster = entry.raw.first_cluster();
        }
        Ok((cluster, name))
    }

    fn read_chain(inner: &mut Fat32Inner, start_cluster: u32) -> FsResult<Vec<u8>> {
        let mut data = Vec::new();
        if start_cluster < 2 {
            return Ok(data);
        }
        let mut cluster = start_cluster;
        loop {
            let first_sector = inner.vol.first_sector_of_cluster(cluster);
            for i in 0..inner.vol.sectors_per_cluster as u64 {
                let page = inner.dev.get_cached_page(first_sector as u64 + i).map_err(map_err)?;
                data.extend_from_slice(&page.data);
                inner.dev.release(page).map_err(map_err)?;
            }
            let next = inner.vol.fat_get(&mut inner.dev, cluster).map_err(map_err)?;
            if inner.vol.is_end_of_chain(next) {
                break;
            }
            cluster = next;
        }
        Ok(data)
    }

    /// Write `data` into the cluster chain starting at `start_cluster`
    /// (allocating a first cluster if there wasn't one), extending the
    /// chain as needed. Returns the chain's first cluster.
    fn write_chain(inner: &mut Fat32Inner, start_cluster: u32, data: &[u8]) -> FsResult<u32> {
        let start = if start_cluster < 2 {
            inner.vol.alloc_free_cluster(&mut inner.dev).map_err(map_err)?
        } else {
            start_cluster
        };

        let mut cluster = start;
        let mut offset = 0usize;
        let block_size = inner.vol.block_size;

        loop {
            let first_sector = inner.vol.first_sector_of_cluster(cluster);
            for i in 0..inner.vol.sectors_per_cluster as u64 {
                let mut page = inner.dev.get_cached_page(first_sector as u64 + i).map_err(map_err)?;
                let block_start = offset;
                let block_end = (offset + block_size).min(data.len());
                if block_start < data.len() {
                    let len = block_end - block_start;
                    page.data[..len].copy_from_slice(&data[block_start..block_end]);
                    for b in &mut page.data[len..] {
                        *b = 0;
                    }
                } else {
                    for b in page.data.iter_mut() {
                        *b = 0;
                    }
                }
                page.dirty = true;
                inner.dev.release(page).map_err(map_err)?;
                offset += block_size;
            }

            if offset >= data.len() {
                inner
                    .vol
                    .fat_set(&mut inner.dev, cluster, inner.vol.fat_type.eoc_value())
                    .map_err(map_err)?;
                break;
            }

            let next = inner.vol.fat_get(&mut inner.dev, cluster).map_err(map_err)?;
            if inner.vol.is_end_of_chain(next) {
                let new_cluster = inner.vol.alloc_free_cluster(&mut inner.dev).map_err(map_err)?;
                inner.vol.fat_set(&mut inner.dev, cluster, new_cluster).map_err(map_err)?;
                cluster = new_cluster;
            } else {
                cluster = next;
            }
        }

        Ok(start)
    }
}

impl FileSystem for Fat32Fs {
    fn name(&self) -> &str {
        "fat32"
    }

    fn create(&self, path: &str) -> FsResult<Inode> {
        let mut inner = self.inner.lock();
        let (parent_cluster, name) = Self::resolve_parent_and_name(&mut inner, path)?;
        dir::create_entry(&mut inner.vol, &mut inner.dev, parent_cluster, name, ATTR_ARCHIVE, 0).map_err(map_err)?;
        Ok(Inode { id: 0, file_type: FileType::File, size: 0 })
    }

    fn mkdir(&self, path: &str) -> FsResult<Inode> {
        let mut inner = self.inner.lock();
        let (parent_cluster, name) = Self::resolve_parent_and_name(&mut inner, path)?;

        let cluster = inner.vol.alloc_free_cluster(&mut inner.dev).map_err(map_err)?;
        // Zero the new directory's first cluster before seeding `.`/`..`.
        let first_sector = inner.vol.first_sector_of_cluster(cluster);
        for i in 0..inner.vol.sectors_per_cluster as u64 {
            let mut page = inner.dev.get_cached_page(first_sector as u64 + i).map_err(map_err)?;
            for b in page.data.iter_mut() {
                *b = 0;
            }
            page.dirty = true;
            inner.dev.release(page).map_err(map_err)?;
        }

        let dot = RawDirEntry { name: *b".          ", attribs: ATTR_DIRECTORY, cluster_hi: 0, cluster_lo: 0, file_size: 0 }.with_cluster(cluster);
        let dotdot = RawDirEntry { name: *b"..         ", attribs: ATTR_DIRECTORY, cluster_hi: 0, cluster_lo: 0, file_size: 0 }.with_cluster(parent_cluster);
        dir::create_raw_entry(&mut inner.vol, &mut inner.dev, cluster, dot).map_err(map_err)?;
        dir::create_raw_entry(&mut inner.vol, &mut inner.dev, cluster, dotdot).map_err(map_err)?;
        dir::create_entry(&mut inner.vol, &mut inner.dev, parent_cluster, name, ATTR_DIRECTORY, cluster).map_err(map_err)?;
        inner.vol.note_parent(cluster, parent_cluster);

        Ok(Inode { id: cluster as u64, file_type: FileType::Directory, size: 0 })
    }

    fn lookup(&self, path: &str) -> FsResult<Inode> {
        let mut inner = self.inner.lock();
        if Self::split_path(path).is_empty() {
            let size = inner.vol.directory_size(&mut inner.dev, inner.root_cluster).map_err(map_err)?;
            return Ok(Inode { id: inner.root_cluster as u64, file_type: FileType::Directory, size: size as usize });
        }
        let (entry, _) = Self::resolve(&mut inner, path)?;
        let ft = if entry.raw.is_directory() { FileType::Directory } else { FileType::File };
        Ok(Inode {
            id: entry.raw.first_cluster() as u64,
            file_type: ft,
            size: entry.raw.file_size as usize,
        })
    }

    fn read(&self, path: &str, offset: usize, buf: &mut [u8]) -> FsResult<usize> {
        let mut inner = self.inner.lock();
        let (entry, _) = Self::resolve(&mut inner, path)?;
        if entry.raw.is_directory() {
            return Err(FsError::IsADirectory);
        }

        let file_size = entry.raw.file_size as usize;
        if offset >= file_size {
            return Ok(0);
        }

        let data = Self::read_chain(&mut inner, entry.raw.first_cluster())?;
        let available = &data[offset..file_size.min(data.len())];
        let to_read = buf.len().min(available.len());
        buf[..to_read].copy_from_slice(&available[..to_read]);
        Ok(to_read)
    }

    fn write(&self, path: &str, offset: usize, data: &[u8]) -> FsResult<usize> {
        let mut inner = self.inner.lock();
        let (entry, parent_cluster) = Self::resolve(&mut inner, path)?;
        if entry.raw.is_directory() {
            return Err(FsError::IsADirectory);
        }

        let cluster = entry.raw.first_cluster();
        let mut file_data = if entry.raw.file_size > 0 {
            let existing = Self::read_chain(&mut inner, cluster)?;
            existing[..(entry.raw.file_size as usize).min(existing.len())].to_vec()
        } else {
            Vec::new()
        };

        let end = offset + data.len();
        if end > file_data.len() {
            file_data.resize(end, 0);
        }
        file_data[offset..end].copy_from_slice(data);

        let new_cluster = Self::write_chain(&mut inner, cluster, &file_data)?;

        let segments = Self::split_path(path);
        let name = segments.last().copied().ok_or(FsError::InvalidPath)?;
        dir::update_entry(&mut inner.vol, &mut inner.dev, parent_cluster, name, new_cluster, file_data.len() as u32)
            .map_err(map_err)?;

        Ok(data.len())
    }

    fn readdir(&self, path: &str) -> FsResult<Vec<VfsDirEntry>> {
        let mut inner = self.inner.lock();
        let dir_cluster = if Self::split_path(path).is_empty() {
            inner.root_cluster
        } else {
            let (entry, _) = Self::resolve(&mut inner, path)?;
            if !entry.raw.is_directory() {
                return Err(FsError::NotADirectory);
            }
            entry.raw.first_cluster()
        };

        let entries = dir::read_dir(&mut inner.vol, &mut inner.dev, dir_cluster).map_err(map_err)?;
        let mut result = Vec::new();
        for e in &entries {
            if e.name == "." || e.name == ".." {
                continue;
            }
            let ft = if e.raw.is_directory() { FileType::Directory } else { FileType::File };
            result.push(VfsDirEntry {
                name: e.name.to_lowercase(),
                inode: Inode {
                    id: e.raw.first_cluster() as u64,
                    file_type: ft,
                    size: e.raw.file_size as usize,
                },
            });
        }
        Ok(result)
    }

    fn unlink(&self, path: &str) -> FsResult<()> {
        let mut inner = self.inner.lock();
        let (entry, parent_cluster) = Self::resolve(&mut inner, path)?;

        if entry.raw.is_directory() {
            let children = dir::read_dir(&mut inner.vol, &mut inner.dev, entry.raw.first_cluster()).map_err(map_err)?;
            if children.iter().any(|c| c.name != "." && c.name != "..") {
                return Err(FsError::IsADirectory);
            }
        }

        let segments = Self::split_path(path);
        let name = segments.last().copied().ok_or(FsError::InvalidPath)?;
        dir::delete_entry(&mut inner.vol, &mut inner.dev, parent_cluster, name).map_err(map_err)
    }
}
