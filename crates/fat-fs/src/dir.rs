//! Directory entry allocation/lookup (§4.7 "directory entry alloc/free",
//! "finddir"), tying `layout`, `lfn` and `volume` together. Grounded on
//! `original_source/kernel/fs/fatfs.c`'s directory scan/entry-allocation
//! routines and the teacher's `kernel/src/fs/fat32/fat32.rs` directory walk.
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::block_cache::BlockDevice;
use crate::error::{FatError, FatResult};
use crate::layout::{RawDirEntry, ATTR_DIRECTORY, DIR_ENTRY_SIZE};
use crate::lfn;
use crate::volume::{BmapFlags, FatVolume};

/// One fully-resolved directory entry: its long name (or the 8.3 name
/// re-rendered as a string, if it has no LFN), the raw 8.3 record, and
/// where in the directory's cluster chain it lives (used by `delete` to
/// mark the right on-disk bytes).
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub raw: RawDirEntry,
    /// Directory-relative entry offsets spanned by this record: the LFN
    /// fragments (if any) followed by the 8.3 entry itself, oldest
    /// (lowest-order LFN) first.
    pub slot_range: (usize, usize),
}

fn short_name_to_display(raw: &RawDirEntry) -> String {
    let base = core::str::from_utf8(&raw.name[0..8]).unwrap_or("").trim_end();
    let ext = core::str::from_utf8(&raw.name[8..11]).unwrap_or("").trim_end();
    if ext.is_empty() {
        base.to_string()
    } else {
        alloc::format!("{base}.{ext}")
    }
}

/// Read every directory-entry slot of the cluster chain rooted at
/// `start_cluster` and resolve them into `DirEntry`s, skipping deleted
/// slots and volume-id records, and reconstructing long names from any
/// preceding LFN fragment run.
pub fn read_dir(vol: &mut FatVolume, dev: &mut dyn BlockDevice, start_cluster: u32) -> FatResult<Vec<DirEntry>> {
    let raw_slots = read_raw_slots(vol, dev, start_cluster)?;
    let mut out = Vec::new();
    let mut lfn_run: Vec<[u8; DIR_ENTRY_SIZE]> = Vec::new();
    let mut run_start = 0usize;

    for (idx, slot) in raw_slots.iter().enumerate() {
        if slot[0] == crate::layout::END_MARKER {
            break;
        }
        if slot[0] == crate::layout::DELETED_MARKER {
            lfn_run.clear();
            continue;
        }
        let attribs = slot[11];
        if lfn::is_lfn_fragment(attribs) {
            if lfn_run.is_empty() {
                run_start = idx;
            }
            lfn_run.push(*slot);
            continue;
        }

        let raw = RawDirEntry::from_bytes(slot);
        if raw.attribs & crate::layout::ATTR_VOLUME_ID != 0 {
            lfn_run.clear();
            continue;
        }

        let name = if lfn_run.is_empty() {
            short_name_to_display(&raw)
        } else {
            lfn::decode_fragments(&lfn_run)
        };
        let slot_range = if lfn_run.is_empty() { (idx, idx) } else { (run_start, idx) };
        lfn_run.clear();
        out.push(DirEntry { name, raw, slot_range });
    }

    Ok(out)
}

/// Find a single named entry without materializing the whole directory.
pub fn find_entry(vol: &mut FatVolume, dev: &mut dyn BlockDevice, start_cluster: u32, name: &str) -> FatResult<DirEntry> {
    read_dir(vol, dev, start_cluster)?
        .into_iter()
        .find(|e| e.name.eq_ignore_ascii_case(name))
        .ok_or(FatError::NotFound)
}

/// Read every 32-byte slot across the directory's cluster chain into one
/// flat buffer of raw records (not yet filtered by attribute).
fn read_raw_slots(vol: &mut FatVolume, dev: &mut dyn BlockDevice, start_cluster: u32) -> FatResult<Vec<[u8; DIR_ENTRY_SIZE]>> {
    let mut slots = Vec::new();
    let mut cluster = start_cluster;
    let per_cluster = vol.bytes_per_cluster() / DIR_ENTRY_SIZE;

    loop {
        let first_sector = vol.first_sector_of_cluster(cluster);
        for i in 0..vol.sectors_per_cluster as u64 {
            let page = dev.get_cached_page(first_sector as u64 + i)?;
            for chunk in page.data.chunks_exact(DIR_ENTRY_SIZE) {
                let mut rec = [0u8; DIR_ENTRY_SIZE];
                rec.copy_from_slice(chunk);
                slots.push(rec);
            }
            dev.release(page)?;
        }
        if slots.len() >= per_cluster && slots.last().map(|s| s[0] == crate::layout::END_MARKER).unwrap_or(false) {
            break;
        }
        let next = vol.fat_get(dev, cluster)?;
        if vol.is_end_of_chain(next) {
            break;
        }
        cluster = next;
    }
    Ok(slots)
}

/// Allocate `n_lfn_fragments + 1` contiguous free slots starting from the
/// lowest run of deleted/end-marker entries found, extending the chain
/// with a freshly allocated cluster if none is found (§4.7 "directory
/// entry alloc/free" step: `⌈len/13⌉ + 1` contiguous unused entries).
fn alloc_contiguous_slots(
    vol: &mut FatVolume,
    dev: &mut dyn BlockDevice,
    start_cluster: u32,
    needed: usize,
) -> FatResult<usize> {
    let slots = read_raw_slots(vol, dev, start_cluster)?;
    let mut run_start: Option<usize> = None;
    let mut run_len = 0usize;

    for (idx, slot) in slots.iter().enumerate() {
        let free = slot[0] == crate::layout::DELETED_MARKER || slot[0] == crate::layout::END_MARKER;
        if free {
            if run_start.is_none() {
                run_start = Some(idx);
            }
            run_len += 1;
            if run_len >= needed {
                return Ok(run_start.unwrap());
            }
            if slot[0] == crate::layout::END_MARKER {
                break;
            }
        } else {
            run_start = None;
            run_len = 0;
        }
    }

    // No run long enough: grow the chain by one cluster and use its start.
    let per_cluster = vol.bytes_per_cluster() / DIR_ENTRY_SIZE;
    if needed > per_cluster {
        return Err(FatError::DirectoryFull);
    }
    let total_slots = slots.len();
    let last_cluster_count = (total_slots / per_cluster).max(1);
    let mut cluster = start_cluster;
    for _ in 1..last_cluster_count {
        cluster = vol.fat_get(dev, cluster)?;
    }
    vol.bmap(dev, cluster, 1, BmapFlags::CREATE)?;
    Ok(total_slots)
}

fn write_slot(vol: &FatVolume, dev: &mut dyn BlockDevice, start_cluster: u32, slot_index: usize, rec: &[u8; DIR_ENTRY_SIZE]) -> FatResult<()> {
    let per_cluster = vol.bytes_per_cluster() / DIR_ENTRY_SIZE;
    let per_sector = vol.block_size / DIR_ENTRY_SIZE;
    let cluster_index = slot_index / per_cluster;
    let within_cluster = slot_index % per_cluster;
    let sector_in_cluster = within_cluster / per_sector;
    let offset_in_sector = (within_cluster % per_sector) * DIR_ENTRY_SIZE;

    let mut cluster = start_cluster;
    for _ in 0..cluster_index {
        cluster = vol.fat_get(dev, cluster)?;
    }
    let sector = vol.first_sector_of_cluster(cluster) as u64 + sector_in_cluster as u64;

    let mut page = dev.get_cached_page(sector)?;
    page.data[offset_in_sector..offset_in_sector + DIR_ENTRY_SIZE].copy_from_slice(rec);
    page.dirty = true;
    dev.release(page)
}

/// Create a new entry named `name` in the directory rooted at
/// `start_cluster`, trying successive `-N` short-name suffixes until one
/// doesn't collide, writing its LFN fragments (if the long name needs
/// any) followed by the 8.3 record.
pub fn create_entry(
    vol: &mut FatVolume,
    dev: &mut dyn BlockDevice,
    start_cluster: u32,
    name: &str,
    attribs: u8,
    first_cluster: u32,
) -> FatResult<()> {
    if name.len() > 255 {
        return Err(FatError::NameTooLong);
    }
    if find_entry(vol, dev, start_cluster, name).is_ok() {
        return Err(FatError::AlreadyExists);
    }

    let existing = read_dir(vol, dev, start_cluster)?;
    let (base, ext) = lfn::derive_base_ext(name);
    let mut short = lfn::short_name_for_attempt(&base, &ext, 1);
    let mut attempt = 1u32;
    while existing.iter().any(|e| e.raw.name == short) {
        attempt += 1;
        short = lfn::short_name_for_attempt(&base, &ext, attempt);
    }

    let needs_lfn = short_name_to_display(&RawDirEntry { name: short, attribs: 0, cluster_hi: 0, cluster_lo: 0, file_size: 0 })
        .to_ascii_uppercase()
        != name.to_ascii_uppercase();

    let checksum = lfn::short_name_checksum(&short);
    let lfn_frags = if needs_lfn { lfn::encode_fragments(name, checksum) } else { Vec::new() };
    let needed = lfn_frags.len() + 1;

    let slot_start = alloc_contiguous_slots(vol, dev, start_cluster, needed)?;
    for (i, frag) in lfn_frags.iter().enumerate() {
        write_slot(vol, dev, start_cluster, slot_start + i, frag)?;
    }

    let entry = RawDirEntry { name: short, attribs, cluster_hi: 0, cluster_lo: 0, file_size: 0 }.with_cluster(first_cluster);
    write_slot(vol, dev, start_cluster, slot_start + lfn_frags.len(), &entry.to_bytes())?;

    if attribs & ATTR_DIRECTORY != 0 {
        vol.note_parent(first_cluster, start_cluster);
    }
    Ok(())
}

/// Write a fully-formed 8.3 record verbatim, with no LFN fragments and no
/// short-name derivation — used for the literal `.`/`..` entries a new
/// directory's first cluster needs, whose 11-byte names are fixed by
/// convention rather than derived from some long name.
pub fn create_raw_entry(
    vol: &mut FatVolume,
    dev: &mut dyn BlockDevice,
    start_cluster: u32,
    entry: RawDirEntry,
) -> FatResult<()> {
    let slot = alloc_contiguous_slots(vol, dev, start_cluster, 1)?;
    write_slot(vol, dev, start_cluster, slot, &entry.to_bytes())
}

/// Rewrite the 8.3 record of an existing entry in place (its size and/or
/// first cluster), leaving any preceding LFN fragments untouched. Used
/// after a write extends a file's chain or its length changes.
pub fn update_entry(
    vol: &mut FatVolume,
    dev: &mut dyn BlockDevice,
    start_cluster: u32,
    name: &str,
    first_cluster: u32,
    file_size: u32,
) -> FatResult<()> {
    let entry = find_entry(vol, dev, start_cluster, name)?;
    let updated = RawDirEntry { file_size, ..entry.raw }.with_cluster(first_cluster);
    write_slot(vol, dev, start_cluster, entry.slot_range.1, &updated.to_bytes())
}

/// Mark an entry (and any LFN fragments preceding it) deleted, and free
/// its cluster chain.
pub fn delete_entry(vol: &mut FatVolume, dev: &mut dyn BlockDevice, start_cluster: u32, name: &str) -> FatResult<()> {
    let entry = find_entry(vol, dev, start_cluster, name)?;
    let (lo, hi) = entry.slot_range;
    for slot_index in lo..=hi {
        let mut rec = [0u8; DIR_ENTRY_SIZE];
        rec[0] = crate::layout::DELETED_MARKER;
        write_slot(vol, dev, start_cluster, slot_index, &rec)?;
    }
    let first = entry.raw.first_cluster();
    if first != 0 {
        vol.bmap(dev, first, 0, BmapFlags::FREE)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_cache::test_support::MemBlockDevice;
    use crate::layout::{ATTR_ARCHIVE, BootSector};

    fn fresh_volume() -> (FatVolume, MemBlockDevice, u32) {
        let mut sector = [0u8; 512];
        sector[11..13].copy_from_slice(&512u16.to_le_bytes());
        sector[13] = 1;
        sector[14..16].copy_from_slice(&1u16.to_le_bytes());
        sector[16] = 1;
        sector[17..19].copy_from_slice(&16u16.to_le_bytes());
        sector[19..21].copy_from_slice(&10000u16.to_le_bytes());
        sector[22..24].copy_from_slice(&16u16.to_le_bytes());
        sector[510] = 0x55;
        sector[511] = 0xAA;
        let bs = BootSector::parse(&sector).unwrap();
        let mut vol = FatVolume::from_boot_sector(&bs);
        let mut dev = MemBlockDevice::new(512, 10000);
        let root = vol.alloc_free_cluster(&mut dev).unwrap();
        (vol, dev, root)
    }

    #[test]
    fn create_then_find_short_name_entry() {
        let (mut vol, mut dev, root) = fresh_volume();
        create_entry(&mut vol, &mut dev, root, "a.txt", ATTR_ARCHIVE, 0).unwrap();
        let found = find_entry(&mut vol, &mut dev, root, "a.txt").unwrap();
        assert_eq!(found.name, "A.TXT");
    }

    #[test]
    fn create_long_name_writes_lfn_fragments_and_resolves_back() {
        let (mut vol, mut dev, root) = fresh_volume();
        let long = "a rather long document name.txt";
        create_entry(&mut vol, &mut dev, root, long, ATTR_ARCHIVE, 0).unwrap();
        let found = find_entry(&mut vol, &mut dev, root, long).unwrap();
        assert_eq!(found.name, long);
        assert!(found.slot_range.0 < found.slot_range.1);
    }

    #[test]
    fn create_rejects_duplicate_name() {
        let (mut vol, mut dev, root) = fresh_volume();
        create_entry(&mut vol, &mut dev, root, "a.txt", ATTR_ARCHIVE, 0).unwrap();
        let err = create_entry(&mut vol, &mut dev, root, "a.txt", ATTR_ARCHIVE, 0).unwrap_err();
        assert_eq!(err, FatError::AlreadyExists);
    }

    #[test]
    fn short_name_collisions_increment_suffix() {
        let (mut vol, mut dev, root) = fresh_volume();
        create_entry(&mut vol, &mut dev, root, "same name one.txt", ATTR_ARCHIVE, 0).unwrap();
        create_entry(&mut vol, &mut dev, root, "same name two.txt", ATTR_ARCHIVE, 0).unwrap();
        let one = find_entry(&mut vol, &mut dev, root, "same name one.txt").unwrap();
        let two = find_entry(&mut vol, &mut dev, root, "same name two.txt").unwrap();
        assert_ne!(one.raw.name, two.raw.name);
    }

    #[test]
    fn delete_marks_slots_free_and_frees_chain() {
        let (mut vol, mut dev, root) = fresh_volume();
        let file_cluster = vol.alloc_free_cluster(&mut dev).unwrap();
        create_entry(&mut vol, &mut dev, root, "a.txt", ATTR_ARCHIVE, file_cluster).unwrap();
        delete_entry(&mut vol, &mut dev, root, "a.txt").unwrap();
        assert_eq!(find_entry(&mut vol, &mut dev, root, "a.txt").unwrap_err(), FatError::NotFound);
        assert_eq!(vol.fat_get(&mut dev, file_cluster).unwrap(), 0);
    }

    #[test]
    fn read_dir_skips_deleted_and_volume_id_entries() {
        let (mut vol, mut dev, root) = fresh_volume();
        create_entry(&mut vol, &mut dev, root, "keep.txt", ATTR_ARCHIVE, 0).unwrap();
        create_entry(&mut vol, &mut dev, root, "gone.txt", ATTR_ARCHIVE, 0).unwrap();
        delete_entry(&mut vol, &mut dev, root, "gone.txt").unwrap();
        let entries = read_dir(&mut vol, &mut dev, root).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "KEEP.TXT");
    }
}
