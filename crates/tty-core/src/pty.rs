//! Pseudo-terminal master/slave pairing and the devpts synthetic directory
//! (§4.6), grounded on `original_source/kernel/fs/devpts.c`
//! (`pty_slaves[MAX_PTY_DEVICES]`, `ROOT_INODE`/`FIRST_INODE`, the
//! `TTY_FLAG_LOCKED`/`TTY_FLAG_MASTER_CLOSED` lifecycle).
use alloc::string::String;
use alloc::vec::Vec;

use crate::tty::{ProcessDirectory, Tty};

/// Upper bound on simultaneously open pty pairs. The original kernel header
/// does not ship in this pack's retrieved source set; this value is a
/// reasonable fixed-table size in the same spirit as `NWAITERS`.
pub const MAX_PTY_DEVICES: usize = 64;

/// `SIGHUP`/`SIGCONT` sent to the slave's process group when the master
/// closes (§4.6 "Closing the master").
pub const SIGHUP: u32 = 1;
pub const SIGCONT: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtyError {
    NoFreeSlot,
    Locked,
    NoSuchSlot,
}

/// A slave pty device, installed in a fixed-size table (§3 "Pty pair").
pub struct PtySlave {
    pub index: usize,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub tty: Tty,
    pub refs: u32,
    pub locked: bool,
    pub master_closed: bool,
}

impl PtySlave {
    fn new(index: usize, uid: u32, gid: u32, mode: u32) -> Self {
        PtySlave {
            index,
            uid,
            gid,
            mode,
            tty: Tty::new(),
            refs: 0,
            locked: true,
            master_closed: false,
        }
    }
}

/// The multiplexor device's view of one pairing: just the slot index, which
/// is what a real device number would encode in its minor field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtyMaster {
    pub index: usize,
}

/// Fixed-size slave table backing `/dev/ptmx` allocation and `/dev/pts`
/// lookups.
pub struct PtySlaveTable {
    slots: [Option<PtySlave>; MAX_PTY_DEVICES],
}

impl PtySlaveTable {
    pub fn new() -> Self {
        PtySlaveTable { slots: core::array::from_fn(|_| None) }
    }

    fn alloc_free_slot(&mut self) -> Result<usize, PtyError> {
        self.slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(PtyError::NoFreeSlot)
    }

    pub fn get(&self, index: usize) -> Option<&PtySlave> {
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut PtySlave> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Indices of all currently allocated slots, ascending — the devpts
    /// readdir enumeration order.
    pub fn allocated_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
    }

    fn remove(&mut self, index: usize) {
        self.slots[index] = None;
    }
}

impl Default for PtySlaveTable {
    fn default() -> Self {
        Self::new()
    }
}

/// `pty_master_create`: allocate a free slot, install a locked slave there,
/// and return the master pairing with it.
pub fn pty_master_create(
    table: &mut PtySlaveTable,
    uid: u32,
    gid: u32,
    mode: u32,
) -> Result<PtyMaster, PtyError> {
    let index = table.alloc_free_slot()?;
    table.slots[index] = Some(PtySlave::new(index, uid, gid, mode));
    Ok(PtyMaster { index })
}

/// `unlockpt` (`TIOCSPTLCK` with arg 0): clear the slave's locked flag so
/// `open("/dev/pts/N")` is permitted.
pub fn unlockpt(table: &mut PtySlaveTable, master: PtyMaster) -> Result<(), PtyError> {
    let slave = table.get_mut(master.index).ok_or(PtyError::NoSuchSlot)?;
    slave.locked = false;
    Ok(())
}

/// `open("/dev/pts/N")`: refused while the slave is locked (`TIOCSPTLCK`
/// not yet cleared) or while the master side has already hung up.
pub fn slave_open(table: &mut PtySlaveTable, index: usize) -> Result<(), PtyError> {
    let slave = table.get_mut(index).ok_or(PtyError::NoSuchSlot)?;
    if slave.locked {
        return Err(PtyError::Locked);
    }
    slave.refs += 1;
    Ok(())
}

/// `close()` on the slave descriptor: drop a reference, freeing the slot
/// once both sides are gone.
pub fn slave_close(table: &mut PtySlaveTable, index: usize) -> Result<(), PtyError> {
    let done = {
        let slave = table.get_mut(index).ok_or(PtyError::NoSuchSlot)?;
        slave.refs = slave.refs.saturating_sub(1);
        slave.refs == 0 && slave.master_closed
    };
    if done {
        table.remove(index);
    }
    Ok(())
}

/// `close()` on the master descriptor: hang up the slave's process group
/// and free the slot immediately if the slave side already has zero
/// references (otherwise `slave_close` will finish the teardown later).
pub fn master_close(
    table: &mut PtySlaveTable,
    master: PtyMaster,
    dir: &mut impl ProcessDirectory,
) -> Result<(), PtyError> {
    let (pgid, refs) = {
        let slave = table.get_mut(master.index).ok_or(PtyError::NoSuchSlot)?;
        slave.master_closed = true;
        (slave.tty.pgid, slave.refs)
    };
    if pgid != 0 {
        dir.send_signal_to_pgroup(pgid, SIGHUP);
        dir.send_signal_to_pgroup(pgid, SIGCONT);
    }
    if refs == 0 {
        table.remove(master.index);
    }
    Ok(())
}

/// Master write: the multiplexor side feeds raw bytes into the slave's
/// input path exactly as a keyboard IRQ would, so the slave's line
/// discipline cooks them normally (§4.6 "Master's ... write vectors ...
/// producing into the slave's read_q").
pub fn master_write(
    table: &mut PtySlaveTable,
    master: PtyMaster,
    data: &[u8],
    dir: &mut impl ProcessDirectory,
) -> Result<usize, PtyError> {
    let slave = table.get_mut(master.index).ok_or(PtyError::NoSuchSlot)?;
    if slave.master_closed {
        return Err(PtyError::NoSuchSlot);
    }
    for &b in data {
        slave.tty.input_byte(b, dir);
    }
    Ok(data.len())
}

/// Master read: consumes already-cooked output the slave wrote
/// (`ttyx_write`'s sink), i.e. the slave's `write_q`, without going back
/// through a line discipline.
pub fn master_read(table: &mut PtySlaveTable, master: PtyMaster, out: &mut [u8]) -> Result<usize, PtyError> {
    let slave = table.get_mut(master.index).ok_or(PtyError::NoSuchSlot)?;
    let mut n = 0;
    while n < out.len() {
        match slave.tty.write_q.dequeue() {
            Some(b) => {
                out[n] = b;
                n += 1;
            }
            None => break,
        }
    }
    Ok(n)
}

/// Synthetic `/dev/pts` directory layout (§4.6, §6 "Devpts layout").
pub mod devpts {
    use super::*;

    /// Fixed root inode for `/dev/pts` itself.
    pub const ROOT_INODE: u64 = 2;
    /// First inode assigned to slot 0; inode numbers for slots are
    /// contiguous from here.
    pub const FIRST_INODE: u64 = 3;

    pub fn slot_to_inode(slot: usize) -> u64 {
        slot as u64 + FIRST_INODE
    }

    pub fn inode_to_slot(inode: u64) -> Option<usize> {
        if inode < FIRST_INODE {
            None
        } else {
            Some((inode - FIRST_INODE) as usize)
        }
    }

    /// `name → slot` parsing: base-10 only, no leading zeros except the
    /// literal name `"0"`.
    pub fn name_to_slot(name: &str) -> Option<usize> {
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if name.len() > 1 && name.as_bytes()[0] == b'0' {
            return None;
        }
        name.parse::<usize>().ok()
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct DirEntry {
        pub name: String,
        pub inode: u64,
    }

    /// Synthetic `readdir`: `"."`, `".."`, then the base-10 names of every
    /// allocated slot in ascending order.
    pub fn readdir(table: &PtySlaveTable) -> Vec<DirEntry> {
        let mut out = Vec::with_capacity(2 + MAX_PTY_DEVICES);
        out.push(DirEntry { name: String::from("."), inode: ROOT_INODE });
        out.push(DirEntry { name: String::from(".."), inode: ROOT_INODE });
        for slot in table.allocated_slots() {
            out.push(DirEntry {
                name: alloc::format!("{slot}"),
                inode: slot_to_inode(slot),
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::termios::LFlag;

    struct FakeDirectory {
        signals: Vec<(u32, u32)>,
    }
    impl ProcessDirectory for FakeDirectory {
        fn send_signal_to_pgroup(&mut self, pgid: u32, signo: u32) {
            self.signals.push((pgid, signo));
        }
        fn caller_pgid(&self) -> u32 {
            0
        }
    }

    #[test]
    fn lifecycle_loopback_write_master_read_slave() {
        let mut table = PtySlaveTable::new();
        let mut dir = FakeDirectory { signals: Vec::new() };
        let master = pty_master_create(&mut table, 0, 0, 0o620).unwrap();

        assert_eq!(slave_open(&mut table, master.index), Err(PtyError::Locked));
        unlockpt(&mut table, master).unwrap();
        slave_open(&mut table, master.index).unwrap();

        // raw mode so a lone byte is visible without a terminating newline
        table.get_mut(master.index).unwrap().tty.termios.lflag &= !LFlag::ICANON;

        master_write(&mut table, master, b"x", &mut dir).unwrap();
        let mut buf = [0u8; 8];
        let n = {
            let slave = table.get_mut(master.index).unwrap();
            slave.tty.ttyx_read(&mut buf, 8, &mut dir, false).unwrap()
        };
        assert_eq!(&buf[..n], b"x");
    }

    #[test]
    fn master_close_signals_pgroup_and_frees_when_slave_also_gone() {
        let mut table = PtySlaveTable::new();
        let mut dir = FakeDirectory { signals: Vec::new() };
        let master = pty_master_create(&mut table, 0, 0, 0).unwrap();
        unlockpt(&mut table, master).unwrap();
        slave_open(&mut table, master.index).unwrap();
        table.get_mut(master.index).unwrap().tty.pgid = 42;

        slave_close(&mut table, master.index).unwrap(); // refs -> 0, master still open
        assert!(table.get(master.index).is_some());

        master_close(&mut table, master, &mut dir).unwrap();
        assert_eq!(dir.signals, alloc::vec![(42, SIGHUP), (42, SIGCONT)]);
        assert!(table.get(master.index).is_none());
    }

    #[test]
    fn devpts_readdir_lists_allocated_slots_with_offset_inodes() {
        let mut table = PtySlaveTable::new();
        let m0 = pty_master_create(&mut table, 0, 0, 0).unwrap();
        let entries = devpts::readdir(&table);
        assert_eq!(entries[0].name, ".");
        assert_eq!(entries[1].name, "..");
        assert_eq!(entries[2].name, alloc::format!("{}", m0.index));
        assert_eq!(entries[2].inode, devpts::slot_to_inode(m0.index));
    }

    #[test]
    fn name_to_slot_rejects_leading_zeros_except_bare_zero() {
        assert_eq!(devpts::name_to_slot("0"), Some(0));
        assert_eq!(devpts::name_to_slot("00"), None);
        assert_eq!(devpts::name_to_slot("07"), None);
        assert_eq!(devpts::name_to_slot("12"), Some(12));
        assert_eq!(devpts::name_to_slot("-1"), None);
        assert_eq!(devpts::name_to_slot(""), None);
    }
}
